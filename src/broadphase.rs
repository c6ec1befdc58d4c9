//! Broadphase: cheap reduction of all body pairs to plausible candidates.
//!
//! Both implementations share the same pair rules (see
//! [`need_broadphase_collision`]) and return pairs of dense body indices with
//! `a < b`, in ascending order, so swapping one for the other never changes
//! the simulation.

use alloc::vec::Vec;

use log::trace;

use crate::aabb::Aabb;
use crate::body::{Body, BodyType, SleepState};

/// Which built-in broadphase a [`WorldConfig`](crate::world::WorldConfig) selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BroadphaseKind {
    #[default]
    Naive,
    SweepAndPrune,
}

pub trait Broadphase {
    /// Fill `pairs` with candidate pairs of indices into `bodies`.
    fn collision_pairs(&mut self, bodies: &mut [Body], pairs: &mut Vec<(usize, usize)>);

    /// Indices of bodies whose world AABB overlaps `aabb`.
    fn aabb_query(&mut self, bodies: &mut [Body], aabb: &Aabb, out: &mut Vec<usize>) {
        for (i, body) in bodies.iter_mut().enumerate() {
            if !body.shapes().is_empty() && body.aabb().overlaps(aabb) {
                out.push(i);
            }
        }
    }
}

/// Filter rules every broadphase applies before any geometric test.
///
/// The groups must accept each other both ways, and at least one body must be
/// able to move.
pub fn need_broadphase_collision(a: &Body, b: &Body) -> bool {
    if a.collision_filter_group & b.collision_filter_mask == 0
        || b.collision_filter_group & a.collision_filter_mask == 0
    {
        return false;
    }
    let inert = |body: &Body| body.body_type() == BodyType::Static || body.sleep_state() == SleepState::Sleeping;
    if inert(a) && inert(b) {
        return false;
    }
    !a.shapes().is_empty() && !b.shapes().is_empty()
}

fn bounding_spheres_overlap(a: &Body, b: &Body) -> bool {
    let r = a.bounding_radius() + b.bounding_radius();
    (b.position - a.position).norm_squared() < r * r
}

/// Tests every pair: O(n²), fine for scene-sized worlds.
#[derive(Debug, Clone, Default)]
pub struct NaiveBroadphase {
    /// Use full AABB overlap instead of bounding spheres.
    pub use_bounding_boxes: bool,
}

impl NaiveBroadphase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bounding_boxes(mut self, enabled: bool) -> Self {
        self.use_bounding_boxes = enabled;
        self
    }
}

impl Broadphase for NaiveBroadphase {
    fn collision_pairs(&mut self, bodies: &mut [Body], pairs: &mut Vec<(usize, usize)>) {
        pairs.clear();
        if self.use_bounding_boxes {
            for body in bodies.iter_mut() {
                body.aabb();
            }
        }
        let n = bodies.len();
        for i in 0..n {
            for j in (i + 1)..n {
                let (a, b) = (&bodies[i], &bodies[j]);
                if !need_broadphase_collision(a, b) {
                    continue;
                }
                let hit = if self.use_bounding_boxes {
                    a.cached_aabb().overlaps(b.cached_aabb())
                } else {
                    bounding_spheres_overlap(a, b)
                };
                if hit {
                    pairs.push((i, j));
                }
            }
        }
        trace!("NaiveBroadphase: {} bodies -> {} pairs", n, pairs.len());
    }
}

/// Sort-and-sweep along one axis, confirmed by full AABB overlap.
#[derive(Debug, Clone, Default)]
pub struct SapBroadphase {
    /// 0 = X, 1 = Y, 2 = Z.
    pub axis: usize,
    /// Pick the axis with the largest spread of body centers before each sweep.
    pub auto_detect_axis: bool,
    order: Vec<usize>,
}

impl SapBroadphase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_axis(mut self, axis: usize) -> Self {
        self.axis = axis.min(2);
        self
    }

    pub fn with_auto_detect_axis(mut self, enabled: bool) -> Self {
        self.auto_detect_axis = enabled;
        self
    }

    /// Choose the axis with the largest variance of (finite) AABB centers.
    fn detect_axis(&mut self, bodies: &[Body]) {
        let mut sum = [0.0f32; 3];
        let mut sum_sq = [0.0f32; 3];
        let mut count = 0.0f32;
        for body in bodies {
            let c = body.cached_aabb().center();
            if !(c.x.is_finite() && c.y.is_finite() && c.z.is_finite()) {
                continue;
            }
            for axis in 0..3 {
                sum[axis] += c[axis];
                sum_sq[axis] += c[axis] * c[axis];
            }
            count += 1.0;
        }
        if count < 2.0 {
            return;
        }
        let variance = |axis: usize| sum_sq[axis] - sum[axis] * sum[axis] / count;
        let (vx, vy, vz) = (variance(0), variance(1), variance(2));
        self.axis = if vx >= vy && vx >= vz {
            0
        } else if vy >= vz {
            1
        } else {
            2
        };
    }
}

impl Broadphase for SapBroadphase {
    fn collision_pairs(&mut self, bodies: &mut [Body], pairs: &mut Vec<(usize, usize)>) {
        pairs.clear();
        for body in bodies.iter_mut() {
            body.aabb();
        }
        if self.auto_detect_axis {
            self.detect_axis(bodies);
        }

        let axis = self.axis;
        self.order.clear();
        self.order.extend(0..bodies.len());
        self.order.sort_by(|&a, &b| {
            bodies[a].cached_aabb().lower[axis]
                .partial_cmp(&bodies[b].cached_aabb().lower[axis])
                .unwrap_or(core::cmp::Ordering::Equal)
                .then(a.cmp(&b))
        });

        for (k, &i) in self.order.iter().enumerate() {
            let upper = bodies[i].cached_aabb().upper[axis];
            for &j in self.order[k + 1..].iter() {
                if bodies[j].cached_aabb().lower[axis] > upper {
                    break;
                }
                let (a, b) = (&bodies[i], &bodies[j]);
                if need_broadphase_collision(a, b) && a.cached_aabb().overlaps(b.cached_aabb()) {
                    pairs.push((i.min(j), i.max(j)));
                }
            }
        }
        pairs.sort_unstable();
        trace!("SapBroadphase: axis {} -> {} pairs", axis, pairs.len());
    }
}

#[cfg(test)]
mod tests {
    extern crate std;
    use super::*;
    use crate::math::Vec3;
    use crate::shape::Shape;
    use std::vec;
    use std::vec::Vec;

    fn sphere_at(x: f32, y: f32, z: f32) -> Body {
        Body::new(1.0)
            .with_shape(Shape::sphere(1.0).unwrap())
            .with_position(Vec3::new(x, y, z))
    }

    fn scene() -> Vec<Body> {
        vec![
            Body::new_static().with_shape(Shape::plane()),
            sphere_at(0.0, 0.5, 0.0),
            sphere_at(1.5, 0.5, 0.0),
            sphere_at(10.0, 5.0, 0.0),
            sphere_at(10.0, 6.5, 0.5),
            Body::new(1.0).with_position(Vec3::new(0.0, 0.5, 0.0)),
        ]
    }

    #[test]
    fn test_naive_finds_overlapping_pairs() {
        let mut bodies = scene();
        let mut pairs = vec![];
        NaiveBroadphase::new().collision_pairs(&mut bodies, &mut pairs);
        // Shapeless body 5 never shows up.
        assert_eq!(pairs, vec![(0, 1), (0, 2), (0, 3), (0, 4), (1, 2), (3, 4)]);
    }

    #[test]
    fn test_naive_aabb_mode_rejects_far_sphere_from_floor() {
        let mut bodies = scene();
        let mut pairs = vec![];
        NaiveBroadphase::new()
            .with_bounding_boxes(true)
            .collision_pairs(&mut bodies, &mut pairs);
        assert!(pairs.contains(&(0, 1)));
        assert!(!pairs.contains(&(0, 3)));
        assert!(pairs.contains(&(3, 4)));
    }

    #[test]
    fn test_sap_matches_naive_aabb_mode() {
        let mut bodies = scene();
        let mut naive = vec![];
        let mut sap = vec![];
        NaiveBroadphase::new()
            .with_bounding_boxes(true)
            .collision_pairs(&mut bodies, &mut naive);
        for axis in 0..3 {
            SapBroadphase::new().with_axis(axis).collision_pairs(&mut bodies, &mut sap);
            assert_eq!(sap, naive, "axis {}", axis);
        }
        SapBroadphase::new()
            .with_auto_detect_axis(true)
            .collision_pairs(&mut bodies, &mut sap);
        assert_eq!(sap, naive);
    }

    #[test]
    fn test_filter_and_static_rules() {
        let a = sphere_at(0.0, 0.0, 0.0).with_collision_filter(1, 2);
        let b = sphere_at(0.5, 0.0, 0.0).with_collision_filter(2, 1);
        assert!(need_broadphase_collision(&a, &b));
        let c = sphere_at(0.5, 0.0, 0.0).with_collision_filter(4, u32::MAX);
        assert!(!need_broadphase_collision(&a, &c));
        assert!(!need_broadphase_collision(&c, &a));

        let floor = Body::new_static().with_shape(Shape::plane());
        let wall = Body::new_static().with_shape(Shape::plane());
        assert!(!need_broadphase_collision(&floor, &wall));
        let mut sleeper = sphere_at(0.0, 0.0, 0.0);
        sleeper.sleep();
        assert!(!need_broadphase_collision(&floor, &sleeper));
    }

    #[test]
    fn test_aabb_query() {
        let mut bodies = scene();
        let mut out = vec![];
        let query = Aabb::new(Vec3::new(9.0, 4.0, -1.0), Vec3::new(11.0, 6.0, 1.0));
        NaiveBroadphase::new().aabb_query(&mut bodies, &query, &mut out);
        assert_eq!(out, vec![3, 4]);
    }
}
