//! Contacts involving convex hulls (boxes, cylinders, polyhedra and
//! heightfield pillars).

use alloc::vec::Vec;

use crate::math::{closest_point_on_segment, direction_or, point_in_polygon, Quat, Vec3};
use crate::narrowphase::primitives::FALLBACK_NORMAL;
use crate::narrowphase::{push_contact, Manifold};
use crate::shape::convex::{ClipBuffers, ConvexPolyhedron};

/// Clipped points deeper than this are clamped.
const CLIP_MIN_DEPTH: f32 = -100.0;
/// Clipped points above the reference face are dropped.
const CLIP_MAX_DEPTH: f32 = 0.0;

/// Hull vertices in world space, written into `out`.
pub(crate) fn world_vertices(hull: &ConvexPolyhedron, pos: &Vec3, quat: &Quat, out: &mut Vec<Vec3>) {
    out.clear();
    out.extend(hull.vertices().iter().map(|v| pos + quat * v));
}

/// Sphere (A) against a hull (B).
///
/// Cases are tried in order and the first that applies wins: a hull vertex
/// inside the sphere, a face whose polygon lies under the sphere center, the
/// closest edge inside the sphere, and finally a center inside the hull,
/// pushed out through the face of least penetration.
#[allow(clippy::too_many_arguments)]
pub(crate) fn sphere_convex(
    radius: f32,
    ps: &Vec3,
    hull: &ConvexPolyhedron,
    ph: &Vec3,
    qh: &Quat,
    verts: &mut Vec<Vec3>,
    face_verts: &mut Vec<Vec3>,
    out: &mut Manifold,
) {
    if (ph - ps).norm() > radius + hull.bounding_sphere_radius() {
        return;
    }
    world_vertices(hull, ph, qh, verts);
    let r2 = radius * radius;

    // Vertices.
    let closest_vertex = verts
        .iter()
        .map(|v| (v, (v - ps).norm_squared()))
        .filter(|(_, d2)| *d2 < r2)
        .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(core::cmp::Ordering::Equal));
    if let Some((v, _)) = closest_vertex {
        let n = direction_or(ps, v, FALLBACK_NORMAL);
        push_contact(out, ps + n * radius, *v, n);
        return;
    }

    // Faces.
    let mut inside = true;
    let mut least_penetration: Option<(f32, Vec3)> = None;
    for (face, local_n) in hull.faces().iter().zip(hull.face_normals()) {
        let n = qh * local_n;
        let dist = (ps - verts[face[0]]).dot(&n);
        if dist > 0.0 {
            inside = false;
            if dist < radius {
                face_verts.clear();
                face_verts.extend(face.iter().map(|&i| verts[i]));
                if point_in_polygon(face_verts, &n, ps) {
                    push_contact(out, ps - n * radius, ps - n * dist, -n);
                    return;
                }
            }
        } else if least_penetration.map_or(true, |(best, _)| dist > best) {
            least_penetration = Some((dist, n));
        }
    }

    // Edges.
    let mut best_edge: Option<(f32, Vec3)> = None;
    for face in hull.faces() {
        for k in 0..face.len() {
            let a = verts[face[k]];
            let b = verts[face[(k + 1) % face.len()]];
            let c = closest_point_on_segment(&a, &b, ps);
            let d2 = (c - ps).norm_squared();
            if d2 < r2 && best_edge.map_or(true, |(best, _)| d2 < best) {
                best_edge = Some((d2, c));
            }
        }
    }
    if let Some((_, c)) = best_edge {
        let n = direction_or(ps, &c, FALLBACK_NORMAL);
        push_contact(out, ps + n * radius, c, n);
        return;
    }

    // Center inside the hull.
    if inside {
        if let Some((dist, n)) = least_penetration {
            push_contact(out, ps - n * radius, ps - n * dist, -n);
        }
    }
}

/// Hull (A) against hull (B): SAT for the contact axis, then face clipping.
#[allow(clippy::too_many_arguments)]
pub(crate) fn convex_convex(
    a: &ConvexPolyhedron,
    pa: &Vec3,
    qa: &Quat,
    b: &ConvexPolyhedron,
    pb: &Vec3,
    qb: &Quat,
    buffers: &mut ClipBuffers,
    out: &mut Manifold,
) {
    if (pb - pa).norm() > a.bounding_sphere_radius() + b.bounding_sphere_radius() {
        return;
    }
    let axis = match a.find_separating_axis(b, pa, qa, pb, qb) {
        Some(axis) => axis,
        None => return,
    };
    let mut full = false;
    a.clip_against_hull(pa, qa, b, pb, qb, &axis, CLIP_MIN_DEPTH, CLIP_MAX_DEPTH, buffers, |on_a, on_b, _| {
        if !full {
            full = !push_contact(out, on_a, on_b, axis);
        }
    });
}

/// Hull (A) against a particle (B) inside it: pushed out through the nearest face.
pub(crate) fn convex_particle(hull: &ConvexPolyhedron, ph: &Vec3, qh: &Quat, particle: &Vec3, out: &mut Manifold) {
    let local = qh.inverse_transform_vector(&(particle - ph));
    let mut best: Option<(f32, Vec3)> = None;
    for (face, n) in hull.faces().iter().zip(hull.face_normals()) {
        let dist = (local - hull.vertices()[face[0]]).dot(n);
        if dist > 0.0 {
            return;
        }
        if best.map_or(true, |(d, _)| dist > d) {
            best = Some((dist, *n));
        }
    }
    if let Some((dist, n)) = best {
        let n = qh * n;
        push_contact(out, particle - n * dist, *particle, n);
    }
}
