//! Collision shapes.
//!
//! Every shape answers the same three questions with consistent units:
//! a conservative bounding radius, a diagonal local inertia for a given mass,
//! and a world-space AABB for a given pose.
//!
//! Boxes and cylinders also carry a [`ConvexPolyhedron`] so that every
//! hull-like pair goes through the general convex–convex path.

pub mod convex;
pub mod heightfield;
pub mod trimesh;

use crate::aabb::Aabb;
use crate::error::{require_positive, PhysicsError, Result};
use crate::math::{Quat, Vec3};

pub use convex::{box_inertia, ConvexPolyhedron};
pub use heightfield::Heightfield;
pub use trimesh::Trimesh;

/// Shape type tags. Their numeric order is the narrowphase's canonical order:
/// for a pair, the shape with the lower tag is always treated as "A".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u16)]
pub enum ShapeKind {
    Sphere = 1,
    Plane = 2,
    Box = 4,
    Cylinder = 8,
    ConvexPolyhedron = 16,
    Particle = 32,
    Heightfield = 64,
    Trimesh = 128,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sphere {
    pub radius: f32,
}

impl Sphere {
    pub fn new(radius: f32) -> Result<Self> {
        Ok(Self {
            radius: require_positive("Sphere", "radius", radius)?,
        })
    }
}

/// An infinite half-space. The local normal is +Y, so an unrotated plane is a floor.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Plane;

impl Plane {
    pub fn world_normal(quaternion: &Quat) -> Vec3 {
        quaternion * Vec3::y()
    }
}

/// A box given by its half extents, with its cached hull.
#[derive(Debug, Clone, PartialEq)]
pub struct Cuboid {
    half_extents: Vec3,
    hull: ConvexPolyhedron,
}

impl Cuboid {
    pub fn new(half_extents: Vec3) -> Result<Self> {
        require_positive("Box", "half_extents.x", half_extents.x)?;
        require_positive("Box", "half_extents.y", half_extents.y)?;
        require_positive("Box", "half_extents.z", half_extents.z)?;
        Ok(Self {
            half_extents,
            hull: ConvexPolyhedron::cuboid(&half_extents),
        })
    }

    pub fn half_extents(&self) -> &Vec3 {
        &self.half_extents
    }
}

/// A cylinder (or frustum) along local Y, approximated by a `segments`-sided prism.
#[derive(Debug, Clone, PartialEq)]
pub struct Cylinder {
    pub radius_top: f32,
    pub radius_bottom: f32,
    pub height: f32,
    pub segments: usize,
    hull: ConvexPolyhedron,
}

impl Cylinder {
    pub fn new(radius_top: f32, radius_bottom: f32, height: f32, segments: usize) -> Result<Self> {
        require_positive("Cylinder", "radius_top", radius_top)?;
        require_positive("Cylinder", "radius_bottom", radius_bottom)?;
        require_positive("Cylinder", "height", height)?;
        if segments < 3 {
            return Err(PhysicsError::InvalidShapeParameter {
                shape: "Cylinder",
                param: "segments",
                value: segments as f32,
            });
        }
        Ok(Self {
            radius_top,
            radius_bottom,
            height,
            segments,
            hull: ConvexPolyhedron::cylinder(radius_top, radius_bottom, height, segments),
        })
    }

    /// Solid-cylinder inertia about its center using the mean radius.
    fn local_inertia(&self, mass: f32) -> Vec3 {
        let r = 0.5 * (self.radius_top + self.radius_bottom);
        let h = self.height;
        let perpendicular = mass * (3.0 * r * r + h * h) / 12.0;
        Vec3::new(perpendicular, 0.5 * mass * r * r, perpendicular)
    }
}

/// Shapes that can be handled by the general convex algorithms.
pub trait AsConvexHull {
    fn convex_hull(&self) -> &ConvexPolyhedron;
}

impl AsConvexHull for ConvexPolyhedron {
    fn convex_hull(&self) -> &ConvexPolyhedron {
        self
    }
}

impl AsConvexHull for Cuboid {
    fn convex_hull(&self) -> &ConvexPolyhedron {
        &self.hull
    }
}

impl AsConvexHull for Cylinder {
    fn convex_hull(&self) -> &ConvexPolyhedron {
        &self.hull
    }
}

/// A collision shape. Shape definitions are plain values; bodies share them
/// through `Arc` and place them with a local offset and orientation.
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Sphere(Sphere),
    Plane(Plane),
    Box(Cuboid),
    Cylinder(Cylinder),
    ConvexPolyhedron(ConvexPolyhedron),
    Heightfield(Heightfield),
    Trimesh(Trimesh),
    /// A point mass; collides but has no extent.
    Particle,
}

impl Shape {
    pub fn sphere(radius: f32) -> Result<Self> {
        Sphere::new(radius).map(Shape::Sphere)
    }

    pub fn plane() -> Self {
        Shape::Plane(Plane)
    }

    pub fn cuboid(half_extents: Vec3) -> Result<Self> {
        Cuboid::new(half_extents).map(Shape::Box)
    }

    pub fn cylinder(radius_top: f32, radius_bottom: f32, height: f32, segments: usize) -> Result<Self> {
        Cylinder::new(radius_top, radius_bottom, height, segments).map(Shape::Cylinder)
    }

    pub fn kind(&self) -> ShapeKind {
        match self {
            Shape::Sphere(_) => ShapeKind::Sphere,
            Shape::Plane(_) => ShapeKind::Plane,
            Shape::Box(_) => ShapeKind::Box,
            Shape::Cylinder(_) => ShapeKind::Cylinder,
            Shape::ConvexPolyhedron(_) => ShapeKind::ConvexPolyhedron,
            Shape::Heightfield(_) => ShapeKind::Heightfield,
            Shape::Trimesh(_) => ShapeKind::Trimesh,
            Shape::Particle => ShapeKind::Particle,
        }
    }

    /// The hull used by the convex algorithms, for boxes, cylinders and polyhedra.
    pub fn hull(&self) -> Option<&ConvexPolyhedron> {
        match self {
            Shape::Box(b) => Some(b.convex_hull()),
            Shape::Cylinder(c) => Some(c.convex_hull()),
            Shape::ConvexPolyhedron(c) => Some(c.convex_hull()),
            _ => None,
        }
    }

    pub fn bounding_sphere_radius(&self) -> f32 {
        match self {
            Shape::Sphere(s) => s.radius,
            Shape::Plane(_) => f32::INFINITY,
            Shape::Box(b) => b.half_extents.norm(),
            Shape::Cylinder(c) => c.hull.bounding_sphere_radius(),
            Shape::ConvexPolyhedron(c) => c.bounding_sphere_radius(),
            Shape::Heightfield(h) => h.bounding_sphere_radius(),
            Shape::Trimesh(t) => t.bounding_sphere_radius(),
            Shape::Particle => 0.0,
        }
    }

    /// Diagonal of the local inertia tensor for `mass`.
    pub fn calculate_local_inertia(&self, mass: f32) -> Vec3 {
        match self {
            Shape::Sphere(s) => Vec3::repeat(0.4 * mass * s.radius * s.radius),
            // Planes and particles only ever make sense without rotational inertia.
            Shape::Plane(_) | Shape::Particle => Vec3::zeros(),
            Shape::Box(b) => box_inertia(&b.half_extents, mass),
            Shape::Cylinder(c) => c.local_inertia(mass),
            Shape::ConvexPolyhedron(c) => c.local_inertia(mass),
            Shape::Heightfield(h) => h.local_inertia(mass),
            Shape::Trimesh(t) => t.local_inertia(mass),
        }
    }

    /// World AABB of the shape placed at `position` with `quaternion`.
    pub fn calculate_world_aabb(&self, position: &Vec3, quaternion: &Quat) -> Aabb {
        match self {
            Shape::Sphere(s) => {
                let r = Vec3::repeat(s.radius);
                Aabb::new(position - r, position + r)
            }
            Shape::Plane(_) => plane_aabb(position, quaternion),
            Shape::Box(b) => b.hull.world_aabb(position, quaternion),
            Shape::Cylinder(c) => c.hull.world_aabb(position, quaternion),
            Shape::ConvexPolyhedron(c) => c.world_aabb(position, quaternion),
            Shape::Heightfield(h) => h.world_aabb(position, quaternion),
            Shape::Trimesh(t) => t.world_aabb(position, quaternion),
            Shape::Particle => Aabb::new(*position, *position),
        }
    }
}

/// Unbounded half-space box; only an axis-aligned normal gives a finite face.
fn plane_aabb(position: &Vec3, quaternion: &Quat) -> Aabb {
    let n = Plane::world_normal(quaternion);
    let mut aabb = Aabb::new(Vec3::repeat(f32::NEG_INFINITY), Vec3::repeat(f32::INFINITY));
    for axis in 0..3 {
        if (n[axis] - 1.0).abs() < 1e-6 {
            aabb.upper[axis] = position[axis];
        } else if (n[axis] + 1.0).abs() < 1e-6 {
            aabb.lower[axis] = position[axis];
        }
    }
    aabb
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_parameters_fail_at_construction() {
        assert!(Shape::sphere(-1.0).is_err());
        assert!(Shape::cuboid(Vec3::new(1.0, 0.0, 1.0)).is_err());
        assert!(Shape::cylinder(-1.0, 1.0, 2.0, 8).is_err());
        assert!(Shape::cylinder(1.0, 1.0, 2.0, 2).is_err());
        assert!(Shape::cylinder(1.0, 0.5, 2.0, 12).is_ok());
    }

    #[test]
    fn test_kind_order_is_canonical_order() {
        assert!(ShapeKind::Sphere < ShapeKind::Plane);
        assert!(ShapeKind::ConvexPolyhedron < ShapeKind::Particle);
        assert!(ShapeKind::Heightfield < ShapeKind::Trimesh);
        assert_eq!(Shape::Particle.kind() as u16, 32);
    }

    #[test]
    fn test_box_inertia_and_radius() {
        let b = Shape::cuboid(Vec3::new(1.0, 1.0, 1.0)).unwrap();
        let i = b.calculate_local_inertia(1.0);
        assert!((i.x - 8.0 / 12.0).abs() < 1e-6);
        assert!((b.bounding_sphere_radius() - 3.0f32.sqrt()).abs() < 1e-6);
        assert!(b.hull().is_some());
    }

    #[test]
    fn test_sphere_aabb() {
        let s = Shape::sphere(2.0).unwrap();
        let aabb = s.calculate_world_aabb(&Vec3::new(1.0, 2.0, 3.0), &Quat::identity());
        assert_eq!(aabb.lower, Vec3::new(-1.0, 0.0, 1.0));
        assert_eq!(aabb.upper, Vec3::new(3.0, 4.0, 5.0));
    }

    #[test]
    fn test_plane_aabb_is_half_space() {
        let aabb = Shape::plane().calculate_world_aabb(&Vec3::new(0.0, -2.0, 0.0), &Quat::identity());
        assert_eq!(aabb.upper.y, -2.0);
        assert_eq!(aabb.lower.y, f32::NEG_INFINITY);
        assert_eq!(aabb.upper.x, f32::INFINITY);

        let tilted = Quat::from_axis_angle(&Vec3::z_axis(), 0.3);
        let aabb = Shape::plane().calculate_world_aabb(&Vec3::zeros(), &tilted);
        assert_eq!(aabb.upper.y, f32::INFINITY);
    }

    #[test]
    fn test_rotated_box_aabb_uses_corners() {
        let b = Shape::cuboid(Vec3::new(1.0, 1.0, 1.0)).unwrap();
        let q = Quat::from_axis_angle(&Vec3::z_axis(), core::f32::consts::FRAC_PI_4);
        let aabb = b.calculate_world_aabb(&Vec3::zeros(), &q);
        assert!((aabb.upper.x - 2.0f32.sqrt()).abs() < 1e-5);
        assert!((aabb.upper.z - 1.0).abs() < 1e-5);
    }
}
