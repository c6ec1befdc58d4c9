//! Contacts between spheres, planes and particles.

use log::warn;

use crate::math::{direction_or, Quat, Vec3};
use crate::narrowphase::{push_contact, Manifold};
use crate::shape::Plane;

/// Normal used when two centers coincide exactly.
pub(crate) const FALLBACK_NORMAL: Vec3 = Vec3::new(0.0, 1.0, 0.0);

fn separation_normal(from: &Vec3, to: &Vec3) -> Vec3 {
    if (to - from).norm_squared() <= 1e-12 {
        warn!("coincident centers at {:?}, using fallback normal", from);
    }
    direction_or(from, to, FALLBACK_NORMAL)
}

pub(crate) fn sphere_sphere(ra: f32, pa: &Vec3, rb: f32, pb: &Vec3, out: &mut Manifold) {
    let r = ra + rb;
    if (pb - pa).norm_squared() >= r * r {
        return;
    }
    let n = separation_normal(pa, pb);
    push_contact(out, pa + n * ra, pb - n * rb, n);
}

/// Sphere against the half-space below a plane (normal `q * +Y`).
pub(crate) fn sphere_plane(radius: f32, ps: &Vec3, pp: &Vec3, qp: &Quat, out: &mut Manifold) {
    let normal = Plane::world_normal(qp);
    let dist = (ps - pp).dot(&normal);
    if dist >= radius {
        return;
    }
    let on_sphere = ps - normal * radius;
    let on_plane = ps - normal * dist;
    push_contact(out, on_sphere, on_plane, -normal);
}

pub(crate) fn sphere_particle(radius: f32, ps: &Vec3, pp: &Vec3, out: &mut Manifold) {
    if (pp - ps).norm_squared() >= radius * radius {
        return;
    }
    let n = separation_normal(ps, pp);
    push_contact(out, ps + n * radius, *pp, n);
}

pub(crate) fn plane_particle(pp: &Vec3, qp: &Quat, particle: &Vec3, out: &mut Manifold) {
    let normal = Plane::world_normal(qp);
    let dist = (particle - pp).dot(&normal);
    if dist >= 0.0 {
        return;
    }
    push_contact(out, particle - normal * dist, *particle, normal);
}

/// Every point below the plane becomes one contact (multi-point resting contact).
pub(crate) fn plane_points<I>(pp: &Vec3, qp: &Quat, points: I, out: &mut Manifold)
where
    I: IntoIterator<Item = Vec3>,
{
    let normal = Plane::world_normal(qp);
    for v in points {
        let dist = (v - pp).dot(&normal);
        if dist < 0.0 && !push_contact(out, v - normal * dist, v, normal) {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::narrowphase::{ContactPoint, MAX_MANIFOLD_POINTS};

    const EPSILON: f32 = 1e-4;

    fn approx_eq(a: f32, b: f32) -> bool {
        (a - b).abs() < EPSILON
    }

    fn approx_vec_eq(a: &Vec3, b: &Vec3) -> bool {
        approx_eq(a.x, b.x) && approx_eq(a.y, b.y) && approx_eq(a.z, b.z)
    }

    #[test]
    fn test_sphere_sphere_no_collision() {
        let mut out = Manifold::new();
        sphere_sphere(1.0, &Vec3::zeros(), 1.0, &Vec3::new(3.0, 0.0, 0.0), &mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn test_sphere_sphere_overlapping() {
        let mut out = Manifold::new();
        sphere_sphere(1.0, &Vec3::zeros(), 1.0, &Vec3::new(1.5, 0.0, 0.0), &mut out);
        assert_eq!(out.len(), 1);
        let c = &out[0];
        assert!(approx_vec_eq(&c.normal, &Vec3::x()));
        assert!(approx_vec_eq(&c.point_a, &Vec3::new(1.0, 0.0, 0.0)));
        assert!(approx_vec_eq(&c.point_b, &Vec3::new(0.5, 0.0, 0.0)));
        assert!(approx_eq(c.depth(), -0.5));
    }

    #[test]
    fn test_sphere_sphere_coincident_uses_fallback() {
        let mut out = Manifold::new();
        sphere_sphere(1.0, &Vec3::zeros(), 0.5, &Vec3::zeros(), &mut out);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].normal, FALLBACK_NORMAL);
        assert!(out[0].depth() < 0.0);
    }

    #[test]
    fn test_sphere_plane() {
        let mut out = Manifold::new();
        let q = Quat::identity();
        sphere_plane(1.0, &Vec3::new(0.0, 0.9, 0.0), &Vec3::zeros(), &q, &mut out);
        assert_eq!(out.len(), 1);
        let c: &ContactPoint = &out[0];
        assert!(approx_vec_eq(&c.normal, &-Vec3::y()));
        assert!(approx_vec_eq(&c.point_b, &Vec3::zeros()));
        assert!(approx_eq(c.depth(), -0.1));

        out.clear();
        sphere_plane(1.0, &Vec3::new(0.0, 1.5, 0.0), &Vec3::zeros(), &q, &mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn test_sphere_exactly_touching_plane_has_no_contact() {
        let q = Quat::identity();
        let mut out = Manifold::new();
        sphere_plane(1.0, &Vec3::new(0.0, 1.0, 0.0), &Vec3::zeros(), &q, &mut out);
        assert!(out.is_empty());
        // Same rule as two spheres just touching.
        sphere_sphere(1.0, &Vec3::zeros(), 1.0, &Vec3::new(0.0, 2.0, 0.0), &mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn test_plane_points_stop_at_manifold_capacity() {
        let q = Quat::identity();
        let mut out = Manifold::new();
        let points = (0..MAX_MANIFOLD_POINTS + 10).map(|i| Vec3::new(i as f32, -0.1, 0.0));
        plane_points(&Vec3::zeros(), &q, points, &mut out);
        assert_eq!(out.len(), MAX_MANIFOLD_POINTS);
        assert!(approx_eq(out[MAX_MANIFOLD_POINTS - 1].point_b.x, (MAX_MANIFOLD_POINTS - 1) as f32));
    }

    #[test]
    fn test_tilted_plane_normal() {
        // Plane facing +X.
        let q = Quat::from_axis_angle(&Vec3::z_axis(), -core::f32::consts::FRAC_PI_2);
        let mut out = Manifold::new();
        sphere_plane(1.0, &Vec3::new(0.5, 3.0, 0.0), &Vec3::zeros(), &q, &mut out);
        assert_eq!(out.len(), 1);
        assert!(approx_vec_eq(&out[0].normal, &-Vec3::x()));
    }

    #[test]
    fn test_plane_particle_and_points() {
        let q = Quat::identity();
        let mut out = Manifold::new();
        plane_particle(&Vec3::zeros(), &q, &Vec3::new(1.0, 0.5, 0.0), &mut out);
        assert!(out.is_empty());
        plane_particle(&Vec3::zeros(), &q, &Vec3::new(1.0, -0.5, 0.0), &mut out);
        assert_eq!(out.len(), 1);
        assert!(approx_vec_eq(&out[0].point_a, &Vec3::new(1.0, 0.0, 0.0)));

        out.clear();
        let points = [Vec3::new(0.0, -0.1, 0.0), Vec3::new(1.0, 0.2, 0.0), Vec3::new(2.0, -0.3, 0.0)];
        plane_points(&Vec3::zeros(), &q, points.iter().copied(), &mut out);
        assert_eq!(out.len(), 2);
        assert!(approx_eq(out[1].depth(), -0.3));
    }

    #[test]
    fn test_sphere_particle() {
        let mut out = Manifold::new();
        sphere_particle(1.0, &Vec3::zeros(), &Vec3::new(0.0, 0.0, 0.5), &mut out);
        assert_eq!(out.len(), 1);
        assert!(approx_vec_eq(&out[0].normal, &Vec3::z()));
    }
}
