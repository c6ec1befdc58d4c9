//! Axis-aligned bounding boxes.

use crate::math::{Quat, Vec3};

/// An axis-aligned box given by its lower and upper corners.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub lower: Vec3,
    pub upper: Vec3,
}

impl Default for Aabb {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl Aabb {
    /// An inverted box that any `extend` call turns into a real one.
    pub const EMPTY: Aabb = Aabb {
        lower: Vec3::new(f32::INFINITY, f32::INFINITY, f32::INFINITY),
        upper: Vec3::new(f32::NEG_INFINITY, f32::NEG_INFINITY, f32::NEG_INFINITY),
    };

    pub fn new(lower: Vec3, upper: Vec3) -> Self {
        Self { lower, upper }
    }

    /// Smallest box containing all `points`. Empty input yields [`Aabb::EMPTY`].
    pub fn from_points<'a, I>(points: I) -> Self
    where
        I: IntoIterator<Item = &'a Vec3>,
    {
        let mut aabb = Self::EMPTY;
        for p in points {
            aabb.extend_point(p);
        }
        aabb
    }

    pub fn is_empty(&self) -> bool {
        self.lower.x > self.upper.x || self.lower.y > self.upper.y || self.lower.z > self.upper.z
    }

    pub fn extend_point(&mut self, p: &Vec3) {
        self.lower = self.lower.inf(p);
        self.upper = self.upper.sup(p);
    }

    /// Grow this box to also contain `other`.
    pub fn extend(&mut self, other: &Aabb) {
        self.lower = self.lower.inf(&other.lower);
        self.upper = self.upper.sup(&other.upper);
    }

    /// Whether the two boxes intersect (touching counts). Symmetric in its arguments.
    pub fn overlaps(&self, other: &Aabb) -> bool {
        self.lower.x <= other.upper.x
            && other.lower.x <= self.upper.x
            && self.lower.y <= other.upper.y
            && other.lower.y <= self.upper.y
            && self.lower.z <= other.upper.z
            && other.lower.z <= self.upper.z
    }

    /// Whether `other` lies completely inside this box.
    pub fn contains(&self, other: &Aabb) -> bool {
        self.lower.x <= other.lower.x
            && self.lower.y <= other.lower.y
            && self.lower.z <= other.lower.z
            && other.upper.x <= self.upper.x
            && other.upper.y <= self.upper.y
            && other.upper.z <= self.upper.z
    }

    pub fn contains_point(&self, p: &Vec3) -> bool {
        p.x >= self.lower.x
            && p.x <= self.upper.x
            && p.y >= self.lower.y
            && p.y <= self.upper.y
            && p.z >= self.lower.z
            && p.z <= self.upper.z
    }

    pub fn center(&self) -> Vec3 {
        (self.lower + self.upper) * 0.5
    }

    pub fn half_extents(&self) -> Vec3 {
        (self.upper - self.lower) * 0.5
    }

    pub fn corners(&self) -> [Vec3; 8] {
        let (l, u) = (self.lower, self.upper);
        [
            Vec3::new(l.x, l.y, l.z),
            Vec3::new(u.x, l.y, l.z),
            Vec3::new(u.x, u.y, l.z),
            Vec3::new(l.x, u.y, l.z),
            Vec3::new(l.x, l.y, u.z),
            Vec3::new(u.x, l.y, u.z),
            Vec3::new(u.x, u.y, u.z),
            Vec3::new(l.x, u.y, u.z),
        ]
    }

    /// World box of this local box after rotating by `quaternion` and moving to `position`.
    pub fn transformed(&self, position: &Vec3, quaternion: &Quat) -> Aabb {
        let mut out = Aabb::EMPTY;
        for corner in self.corners().iter() {
            out.extend_point(&(position + quaternion * corner));
        }
        out
    }

    /// Slab test for the segment `from..to`.
    pub fn overlaps_ray(&self, from: &Vec3, to: &Vec3) -> bool {
        let dir = to - from;
        let mut t_min = 0.0f32;
        let mut t_max = 1.0f32;
        for axis in 0..3 {
            if dir[axis] == 0.0 {
                if from[axis] < self.lower[axis] || from[axis] > self.upper[axis] {
                    return false;
                }
                continue;
            }
            let inv = 1.0 / dir[axis];
            let mut t1 = (self.lower[axis] - from[axis]) * inv;
            let mut t2 = (self.upper[axis] - from[axis]) * inv;
            if t1 > t2 {
                core::mem::swap(&mut t1, &mut t2);
            }
            t_min = t_min.max(t1);
            t_max = t_max.min(t2);
            if t_min > t_max {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_at(x: f32, y: f32, z: f32) -> Aabb {
        let c = Vec3::new(x, y, z);
        Aabb::new(c - Vec3::repeat(1.0), c + Vec3::repeat(1.0))
    }

    #[test]
    fn test_overlap_is_symmetric() {
        let boxes = [
            unit_at(0.0, 0.0, 0.0),
            unit_at(1.5, 0.0, 0.0),
            unit_at(2.0, 0.0, 0.0),
            unit_at(3.0, 0.0, 0.0),
            unit_at(0.0, -1.9, 1.9),
        ];
        for a in boxes.iter() {
            for b in boxes.iter() {
                assert_eq!(a.overlaps(b), b.overlaps(a));
            }
        }
        assert!(boxes[0].overlaps(&boxes[2]));
        assert!(!boxes[0].overlaps(&boxes[3]));
    }

    #[test]
    fn test_extend_and_contains() {
        let mut a = Aabb::EMPTY;
        assert!(a.is_empty());
        a.extend(&unit_at(0.0, 0.0, 0.0));
        a.extend_point(&Vec3::new(5.0, 0.0, 0.0));
        assert_eq!(a.upper.x, 5.0);
        assert!(a.contains(&unit_at(2.0, 0.0, 0.0)));
        assert!(!a.contains(&unit_at(5.0, 0.0, 0.0)));
        assert!(a.contains_point(&Vec3::new(4.0, 0.5, -0.5)));
    }

    #[test]
    fn test_transformed_rotated_box_grows() {
        let local = unit_at(0.0, 0.0, 0.0);
        let q = Quat::from_axis_angle(&Vec3::y_axis(), core::f32::consts::FRAC_PI_4);
        let world = local.transformed(&Vec3::new(10.0, 0.0, 0.0), &q);
        let diag = core::f32::consts::SQRT_2;
        assert!((world.upper.x - (10.0 + diag)).abs() < 1e-4);
        assert!((world.upper.y - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_ray_overlap() {
        let b = unit_at(0.0, 0.0, 0.0);
        assert!(b.overlaps_ray(&Vec3::new(-5.0, 0.0, 0.0), &Vec3::new(5.0, 0.0, 0.0)));
        assert!(!b.overlaps_ray(&Vec3::new(-5.0, 2.0, 0.0), &Vec3::new(5.0, 2.0, 0.0)));
        assert!(!b.overlaps_ray(&Vec3::new(-5.0, 0.0, 0.0), &Vec3::new(-3.0, 0.0, 0.0)));
        assert!(b.overlaps_ray(&Vec3::new(0.0, 5.0, 0.0), &Vec3::new(0.0, -5.0, 0.0)));
    }
}
