//! Contacts against heightfields and triangle meshes.
//!
//! A heightfield is never handled as a whole: the cells under the query
//! shape's bounds are turned, one triangle at a time, into convex pillars and
//! run through the regular convex algorithms.

use alloc::vec::Vec;

use crate::aabb::Aabb;
use crate::math::{closest_point_on_segment, direction_or, point_in_polygon, Quat, Vec3};
use crate::narrowphase::convex::{convex_convex, sphere_convex};
use crate::narrowphase::primitives::plane_points;
use crate::narrowphase::{push_contact, CollisionScratch, Manifold};
use crate::shape::{ConvexPolyhedron, Heightfield, Trimesh};

/// Squared distance under which two contact points count as the same point.
const DUPLICATE_DIST_SQ: f32 = 1e-8;

/// Drop contacts added after `from` that repeat an earlier point of the same batch.
fn dedupe_tail(out: &mut Manifold, start: usize, from: usize) {
    let mut k = from;
    while k < out.len() {
        let p = out[k].point_b;
        if out[start..k].iter().any(|c| (c.point_b - p).norm_squared() < DUPLICATE_DIST_SQ) {
            out.remove(k);
        } else {
            k += 1;
        }
    }
}

/// Call `visit(pillar, pillar_position)` for both triangles of every cell the
/// local box `query` may touch.
fn for_each_pillar<F>(hf: &Heightfield, ph: &Vec3, qh: &Quat, query: &Aabb, pillar: &mut ConvexPolyhedron, mut visit: F)
where
    F: FnMut(&ConvexPolyhedron, &Vec3),
{
    let range = match hf.cell_range(query) {
        Some(range) => range,
        None => return,
    };
    for i in range.i0..=range.i1 {
        for j in range.j0..=range.j1 {
            let (_, max) = hf.cell_height_range(i, j);
            if query.lower.y > max {
                continue;
            }
            for upper in [false, true] {
                let center = hf.fill_pillar(i, j, upper, pillar);
                let position = ph + qh * center;
                visit(pillar, &position);
            }
        }
    }
}

fn local_bounds(center: &Vec3, radius: f32, ph: &Vec3, qh: &Quat) -> Aabb {
    let local = qh.inverse_transform_vector(&(center - ph));
    let r = Vec3::repeat(radius);
    Aabb::new(local - r, local + r)
}

/// Sphere (A) against a heightfield (B).
pub(crate) fn sphere_heightfield(
    radius: f32,
    ps: &Vec3,
    hf: &Heightfield,
    ph: &Vec3,
    qh: &Quat,
    scratch: &mut CollisionScratch,
    out: &mut Manifold,
) {
    let query = local_bounds(ps, radius, ph, qh);
    let CollisionScratch {
        pillar,
        world_verts,
        face_verts,
        ..
    } = scratch;
    let start = out.len();
    for_each_pillar(hf, ph, qh, &query, pillar, |pillar, position| {
        let before = out.len();
        sphere_convex(radius, ps, pillar, position, qh, world_verts, face_verts, out);
        dedupe_tail(out, start, before);
    });
}

/// Hull (A) against a heightfield (B).
#[allow(clippy::too_many_arguments)]
pub(crate) fn convex_heightfield(
    hull: &ConvexPolyhedron,
    pa: &Vec3,
    qa: &Quat,
    hf: &Heightfield,
    ph: &Vec3,
    qh: &Quat,
    scratch: &mut CollisionScratch,
    out: &mut Manifold,
) {
    let query = local_bounds(pa, hull.bounding_sphere_radius(), ph, qh);
    let CollisionScratch { pillar, clip, .. } = scratch;
    let start = out.len();
    for_each_pillar(hf, ph, qh, &query, pillar, |pillar, position| {
        let before = out.len();
        convex_convex(hull, pa, qa, pillar, position, qh, clip, out);
        dedupe_tail(out, start, before);
    });
}

/// Particle (A) against the heightfield surface (B).
pub(crate) fn particle_heightfield(particle: &Vec3, hf: &Heightfield, ph: &Vec3, qh: &Quat, out: &mut Manifold) {
    let local = qh.inverse_transform_vector(&(particle - ph));
    let (height, up) = match hf.height_at(local.x, local.z) {
        Some(sample) => sample,
        None => return,
    };
    if local.y >= height {
        return;
    }
    let dist = up.y * (local.y - height);
    let on_surface = local - up * dist;
    push_contact(out, *particle, ph + qh * on_surface, -(qh * up));
}

/// Sphere (A) against a triangle mesh (B).
#[allow(clippy::too_many_arguments)]
pub(crate) fn sphere_trimesh(
    radius: f32,
    ps: &Vec3,
    mesh: &Trimesh,
    pm: &Vec3,
    qm: &Quat,
    triangles: &mut Vec<usize>,
    out: &mut Manifold,
) {
    let query = local_bounds(ps, radius, pm, qm);
    let local = query.center();
    triangles.clear();
    mesh.triangles_in_aabb(&query, triangles);

    let r2 = radius * radius;
    let start = out.len();
    for &t in triangles.iter() {
        let normal = mesh.normal(t);
        if normal == Vec3::zeros() {
            continue;
        }
        let tri = mesh.triangle(t);
        let dist = (local - tri[0]).dot(&normal);
        if dist.abs() >= radius {
            continue;
        }
        let projected = local - normal * dist;
        let closest = if point_in_polygon(&tri, &normal, &projected) {
            projected
        } else {
            let mut best = tri[0];
            let mut best_d2 = f32::INFINITY;
            for k in 0..3 {
                let c = closest_point_on_segment(&tri[k], &tri[(k + 1) % 3], &local);
                let d2 = (c - local).norm_squared();
                if d2 < best_d2 {
                    best_d2 = d2;
                    best = c;
                }
            }
            best
        };
        if (closest - local).norm_squared() >= r2 {
            continue;
        }

        let on_mesh = pm + qm * closest;
        if out[start..]
            .iter()
            .any(|c| (c.point_b - on_mesh).norm_squared() < DUPLICATE_DIST_SQ)
        {
            continue;
        }
        let n = direction_or(ps, &on_mesh, -(qm * normal));
        push_contact(out, ps + n * radius, on_mesh, n);
    }
}

/// Plane (A) against every mesh vertex below it (B).
pub(crate) fn plane_trimesh(pp: &Vec3, qp: &Quat, mesh: &Trimesh, pm: &Vec3, qm: &Quat, out: &mut Manifold) {
    plane_points(pp, qp, mesh.vertices().iter().map(|v| pm + qm * v), out);
}
