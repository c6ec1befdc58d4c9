//! Narrowphase: exact contact points for a candidate body pair.
//!
//! Every shape pair goes through [`collide`], which orders the two shapes by
//! [`ShapeKind`] so each algorithm only exists once, then flips the result
//! back for the caller. [`Narrowphase`] turns the resulting contact points
//! into contact and friction equations for the solver.

pub mod convex;
pub mod primitives;
pub mod terrain;

use alloc::vec::Vec;

use log::warn;

use crate::body::{Body, BodyType, ShapeId};
use crate::equation::{Equation, FrictionLink};
use crate::material::{resolve_contact_material, ContactMaterial, ContactMaterialTable};
use crate::math::{tangents, Quat, Vec3};
use crate::shape::convex::ClipBuffers;
use crate::shape::{ConvexPolyhedron, Shape};

/// One point of contact between shape A and shape B, in world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactPoint {
    /// Deepest point of A's surface toward B.
    pub point_a: Vec3,
    /// Deepest point of B's surface toward A.
    pub point_b: Vec3,
    /// Unit normal pointing out of A toward B.
    pub normal: Vec3,
}

impl ContactPoint {
    /// Signed separation along the normal; negative while penetrating.
    pub fn depth(&self) -> f32 {
        (self.point_b - self.point_a).dot(&self.normal)
    }
}

/// Upper bound of contact points kept for one shape pair.
pub const MAX_MANIFOLD_POINTS: usize = 32;

/// Contact points of one shape pair. Holds at most [`MAX_MANIFOLD_POINTS`];
/// a pair producing more (a finely segmented cylinder cap lying on a plane,
/// say) keeps the first ones found and logs a warning.
pub type Manifold = heapless::Vec<ContactPoint, MAX_MANIFOLD_POINTS>;

/// Returns `false`, after logging, when the manifold is already full.
#[inline]
pub(crate) fn push_contact(out: &mut Manifold, point_a: Vec3, point_b: Vec3, normal: Vec3) -> bool {
    let pushed = out
        .push(ContactPoint {
            point_a,
            point_b,
            normal,
        })
        .is_ok();
    if !pushed {
        warn!("Contact manifold full at {} points, dropping the rest", MAX_MANIFOLD_POINTS);
    }
    pushed
}

/// Buffers reused across shape pairs so that collision tests do not allocate
/// once they have warmed up.
pub struct CollisionScratch {
    pub(crate) clip: ClipBuffers,
    pub(crate) pillar: ConvexPolyhedron,
    pub(crate) world_verts: Vec<Vec3>,
    pub(crate) face_verts: Vec<Vec3>,
    pub(crate) triangles: Vec<usize>,
}

impl Default for CollisionScratch {
    fn default() -> Self {
        Self {
            clip: ClipBuffers::default(),
            pillar: ConvexPolyhedron::empty(),
            world_verts: Vec::new(),
            face_verts: Vec::new(),
            triangles: Vec::new(),
        }
    }
}

/// Append the contacts between two posed shapes to `out`.
///
/// Contacts are always reported with `a` as "A", whatever order the
/// underlying algorithm needed.
#[allow(clippy::too_many_arguments)]
pub fn collide(
    a: &Shape,
    pa: &Vec3,
    qa: &Quat,
    b: &Shape,
    pb: &Vec3,
    qb: &Quat,
    scratch: &mut CollisionScratch,
    out: &mut Manifold,
) {
    if a.kind() <= b.kind() {
        collide_ordered(a, pa, qa, b, pb, qb, scratch, out);
        return;
    }
    let start = out.len();
    collide_ordered(b, pb, qb, a, pa, qa, scratch, out);
    for c in out[start..].iter_mut() {
        core::mem::swap(&mut c.point_a, &mut c.point_b);
        c.normal = -c.normal;
    }
}

/// Dispatch for `a.kind() <= b.kind()`.
#[allow(clippy::too_many_arguments)]
fn collide_ordered(
    a: &Shape,
    pa: &Vec3,
    qa: &Quat,
    b: &Shape,
    pb: &Vec3,
    qb: &Quat,
    scratch: &mut CollisionScratch,
    out: &mut Manifold,
) {
    use self::convex::{convex_convex, convex_particle, sphere_convex};
    use self::primitives::{plane_particle, plane_points, sphere_particle, sphere_plane, sphere_sphere};
    use self::terrain::{convex_heightfield, particle_heightfield, plane_trimesh, sphere_heightfield, sphere_trimesh};

    match (a, b) {
        (Shape::Sphere(s1), Shape::Sphere(s2)) => sphere_sphere(s1.radius, pa, s2.radius, pb, out),
        (Shape::Sphere(s), Shape::Plane(_)) => sphere_plane(s.radius, pa, pb, qb, out),
        (Shape::Sphere(s), Shape::Particle) => sphere_particle(s.radius, pa, pb, out),
        (Shape::Sphere(s), Shape::Heightfield(hf)) => sphere_heightfield(s.radius, pa, hf, pb, qb, scratch, out),
        (Shape::Sphere(s), Shape::Trimesh(mesh)) => {
            sphere_trimesh(s.radius, pa, mesh, pb, qb, &mut scratch.triangles, out)
        }
        (Shape::Sphere(s), other) => {
            if let Some(hull) = other.hull() {
                sphere_convex(
                    s.radius,
                    pa,
                    hull,
                    pb,
                    qb,
                    &mut scratch.world_verts,
                    &mut scratch.face_verts,
                    out,
                );
            }
        }
        (Shape::Plane(_), Shape::Particle) => plane_particle(pa, qa, pb, out),
        (Shape::Plane(_), Shape::Trimesh(mesh)) => plane_trimesh(pa, qa, mesh, pb, qb, out),
        (Shape::Plane(_), other) => {
            if let Some(hull) = other.hull() {
                plane_points(pa, qa, hull.vertices().iter().map(|v| pb + qb * v), out);
            }
        }
        (Shape::Particle, Shape::Heightfield(hf)) => particle_heightfield(pa, hf, pb, qb, out),
        (_, Shape::Particle) => {
            if let Some(hull) = a.hull() {
                convex_particle(hull, pa, qa, pb, out);
            }
        }
        (_, Shape::Heightfield(hf)) => {
            if let Some(hull) = a.hull() {
                convex_heightfield(hull, pa, qa, hf, pb, qb, scratch, out);
            }
        }
        _ => {
            if let (Some(ha), Some(hb)) = (a.hull(), b.hull()) {
                convex_convex(ha, pa, qa, hb, pb, qb, &mut scratch.clip, out);
            }
        }
    }
}

/// Material lookup and timestep shared by every pair of one step.
pub struct ContactContext<'a> {
    pub table: &'a ContactMaterialTable,
    pub default_material: &'a ContactMaterial,
    pub dt: f32,
}

/// Two shapes that touched this step, identified by dense body indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShapePairContact {
    pub body_a: usize,
    pub body_b: usize,
    pub shape_a: ShapeId,
    pub shape_b: ShapeId,
}

#[derive(Default)]
pub struct Narrowphase {
    scratch: CollisionScratch,
    manifold: Manifold,
}

impl Narrowphase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Test every shape of body `ia` against every shape of body `ib`.
    ///
    /// Contact equations (each followed by its two friction equations when
    /// the pair has friction) are appended to `equations`, and touching shape
    /// pairs to `shape_contacts`. Returns whether any shapes touched.
    ///
    /// Pairs without a dynamic body are only tested; they never get
    /// equations.
    pub fn collide_pair(
        &mut self,
        ia: usize,
        ib: usize,
        bodies: &[Body],
        ctx: &ContactContext<'_>,
        equations: &mut Vec<Equation>,
        shape_contacts: &mut Vec<ShapePairContact>,
    ) -> bool {
        let bi = &bodies[ia];
        let bj = &bodies[ib];
        let test_only = bi.body_type() != BodyType::Dynamic && bj.body_type() != BodyType::Dynamic;
        let enabled = bi.collision_response && bj.collision_response;
        let cm = resolve_contact_material(ctx.table, ctx.default_material, bi.material.as_ref(), bj.material.as_ref());

        let mut touched = false;
        for si in bi.shapes() {
            let (pa, qa) = bi.shape_world_pose(si);
            for sj in bj.shapes() {
                let (pb, qb) = bj.shape_world_pose(sj);
                if (pb - pa).norm() > si.shape.bounding_sphere_radius() + sj.shape.bounding_sphere_radius() {
                    continue;
                }

                self.manifold.clear();
                collide(&si.shape, &pa, &qa, &sj.shape, &pb, &qb, &mut self.scratch, &mut self.manifold);
                if self.manifold.is_empty() {
                    continue;
                }
                touched = true;
                shape_contacts.push(ShapePairContact {
                    body_a: ia,
                    body_b: ib,
                    shape_a: si.id(),
                    shape_b: sj.id(),
                });
                if test_only {
                    continue;
                }

                for c in self.manifold.iter() {
                    let ri = c.point_a - bi.position;
                    let rj = c.point_b - bj.position;
                    let mut contact = Equation::contact(ia, ib, c.normal, ri, rj, c.depth());
                    contact.restitution = cm.restitution;
                    contact.set_spook_params(cm.contact_equation_stiffness, cm.contact_equation_relaxation, ctx.dt);
                    contact.enabled = enabled;
                    let link = FrictionLink {
                        contact: equations.len(),
                        mu: cm.friction,
                    };
                    equations.push(contact);

                    if cm.friction > 0.0 {
                        let (t1, t2) = tangents(&c.normal);
                        for t in [t1, t2] {
                            let mut friction = Equation::friction(ia, ib, t, ri, rj, link);
                            friction.set_spook_params(
                                cm.friction_equation_stiffness,
                                cm.friction_equation_relaxation,
                                ctx.dt,
                            );
                            friction.enabled = enabled;
                            equations.push(friction);
                        }
                    }
                }
            }
        }
        touched
    }
}

#[cfg(test)]
mod tests {
    extern crate std;
    use super::*;
    use crate::equation::EquationKind;
    use crate::material::Material;
    use std::vec;
    use std::vec::Vec;

    const EPSILON: f32 = 1e-4;

    fn approx_eq(a: f32, b: f32) -> bool {
        (a - b).abs() < EPSILON
    }

    fn approx_vec_eq(a: &Vec3, b: &Vec3) -> bool {
        approx_eq(a.x, b.x) && approx_eq(a.y, b.y) && approx_eq(a.z, b.z)
    }

    fn ball(y: f32) -> Body {
        Body::new(1.0)
            .with_shape(Shape::sphere(0.5).unwrap())
            .with_position(Vec3::new(0.0, y, 0.0))
    }

    fn ground() -> Body {
        Body::new_static().with_shape(Shape::plane())
    }

    fn run(bodies: &[Body], table: &ContactMaterialTable) -> (bool, Vec<Equation>, Vec<ShapePairContact>) {
        let default_material = ContactMaterial::default();
        let ctx = ContactContext {
            table,
            default_material: &default_material,
            dt: 1.0 / 60.0,
        };
        let mut equations = vec![];
        let mut shapes = vec![];
        let touched = Narrowphase::new().collide_pair(0, 1, bodies, &ctx, &mut equations, &mut shapes);
        (touched, equations, shapes)
    }

    #[test]
    fn test_swapped_pair_flips_normal() {
        let mut scratch = CollisionScratch::default();
        let q = Quat::identity();
        let sphere = Shape::sphere(1.0).unwrap();
        let plane = Shape::plane();

        let mut forward = Manifold::new();
        collide(&sphere, &Vec3::new(0.0, 0.9, 0.0), &q, &plane, &Vec3::zeros(), &q, &mut scratch, &mut forward);
        let mut reverse = Manifold::new();
        collide(&plane, &Vec3::zeros(), &q, &sphere, &Vec3::new(0.0, 0.9, 0.0), &q, &mut scratch, &mut reverse);

        assert_eq!(forward.len(), 1);
        assert_eq!(reverse.len(), 1);
        assert!(approx_vec_eq(&forward[0].normal, &-reverse[0].normal));
        assert!(approx_vec_eq(&forward[0].point_a, &reverse[0].point_b));
        assert!(approx_eq(forward[0].depth(), reverse[0].depth()));
    }

    #[test]
    fn test_box_resting_on_plane_gives_four_points() {
        let mut scratch = CollisionScratch::default();
        let q = Quat::identity();
        let mut out = Manifold::new();
        collide(
            &Shape::cuboid(Vec3::repeat(1.0)).unwrap(),
            &Vec3::new(0.0, 0.98, 0.0),
            &q,
            &Shape::plane(),
            &Vec3::zeros(),
            &q,
            &mut scratch,
            &mut out,
        );
        assert_eq!(out.len(), 4);
        for c in out.iter() {
            assert!(approx_vec_eq(&c.normal, &-Vec3::y()));
            assert!(approx_eq(c.depth(), -0.02));
        }
    }

    #[test]
    fn test_unsupported_pairs_are_silent() {
        let mut scratch = CollisionScratch::default();
        let q = Quat::identity();
        let mut out = Manifold::new();
        collide(&Shape::plane(), &Vec3::zeros(), &q, &Shape::plane(), &Vec3::zeros(), &q, &mut scratch, &mut out);
        collide(&Shape::Particle, &Vec3::zeros(), &q, &Shape::Particle, &Vec3::zeros(), &q, &mut scratch, &mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn test_contact_and_friction_equations() {
        let bodies = [ball(0.45), ground()];
        let (touched, equations, shapes) = run(&bodies, &ContactMaterialTable::new());
        assert!(touched);
        assert_eq!(shapes.len(), 1);
        assert_eq!(equations.len(), 3);

        let contact = &equations[0];
        assert_eq!(contact.kind, EquationKind::Contact);
        assert!(approx_vec_eq(&contact.ni, &-Vec3::y()));
        assert!(approx_eq(contact.g, -0.05));
        assert!(approx_vec_eq(&contact.ri, &Vec3::new(0.0, -0.5, 0.0)));
        assert!(contact.enabled);

        for friction in &equations[1..] {
            assert_eq!(friction.kind, EquationKind::Friction);
            assert!(approx_eq(friction.ni.dot(&contact.ni), 0.0));
            let link = friction.friction.unwrap();
            assert_eq!(link.contact, 0);
            assert!(approx_eq(link.mu, 0.3));
        }
    }

    #[test]
    fn test_frictionless_materials_skip_friction() {
        let ice = Material::new("ice").with_friction(0.0);
        let bodies = [ball(0.45).with_material(ice.clone()), ground().with_material(ice)];
        let (_, equations, _) = run(&bodies, &ContactMaterialTable::new());
        assert_eq!(equations.len(), 1);
    }

    #[test]
    fn test_collision_response_disables_equations() {
        let bodies = [ball(0.45).with_collision_response(false), ground()];
        let (touched, equations, _) = run(&bodies, &ContactMaterialTable::new());
        assert!(touched);
        assert!(!equations.is_empty());
        assert!(equations.iter().all(|eq| !eq.enabled));
    }

    #[test]
    fn test_kinematic_on_static_only_reports_overlap() {
        let kinematic = Body::new_kinematic()
            .with_shape(Shape::sphere(0.5).unwrap())
            .with_position(Vec3::new(0.0, 0.45, 0.0));
        let bodies = [kinematic, ground()];
        let (touched, equations, shapes) = run(&bodies, &ContactMaterialTable::new());
        assert!(touched);
        assert_eq!(shapes.len(), 1);
        assert!(equations.is_empty());
    }

    #[test]
    fn test_offset_shape_contact_offsets() {
        let body = Body::new(1.0)
            .with_shape_at(Shape::sphere(0.5).unwrap(), Vec3::new(1.0, 0.0, 0.0), Quat::identity())
            .with_position(Vec3::new(0.0, 0.45, 0.0));
        let bodies = [body, ground()];
        let (_, equations, _) = run(&bodies, &ContactMaterialTable::new());
        assert!(approx_vec_eq(&equations[0].ri, &Vec3::new(1.0, -0.5, 0.0)));
    }
}
