//! Joints between two bodies.
//!
//! Each constraint stores body-local anchor points, so it follows the bodies
//! as they move and rotate, and turns into one or more [`Equation`]s every
//! step.

use alloc::vec::Vec;

use crate::body::{Body, BodyHandle};
use crate::equation::{Equation, EquationKind, DEFAULT_MAX_FORCE};
use crate::math::Vec3;

/// Unique identifier for a constraint within a [`World`](crate::world::World).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConstraintId(pub(crate) u32);

#[derive(Debug, Clone, PartialEq)]
pub enum ConstraintKind {
    /// Keeps the two anchors `distance` apart, like a rigid rod.
    Distance { distance: f32 },
    /// Ball-socket joint: the two anchors coincide.
    PointToPoint,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    pub kind: ConstraintKind,
    pub body_a: BodyHandle,
    pub body_b: BodyHandle,
    /// Anchor offset in body A's local space.
    pub anchor_a: Vec3,
    /// Anchor offset in body B's local space.
    pub anchor_b: Vec3,
    pub max_force: f32,
    /// Whether the two bodies may still collide with each other.
    pub collide_connected: bool,
    pub stiffness: f32,
    pub relaxation: f32,
}

impl Constraint {
    fn with_kind(kind: ConstraintKind, body_a: BodyHandle, anchor_a: Vec3, body_b: BodyHandle, anchor_b: Vec3) -> Self {
        Self {
            kind,
            body_a,
            body_b,
            anchor_a,
            anchor_b,
            max_force: DEFAULT_MAX_FORCE,
            collide_connected: true,
            stiffness: 1e7,
            relaxation: 4.0,
        }
    }

    /// Rod of length `distance` between the two anchors.
    pub fn distance(body_a: BodyHandle, anchor_a: Vec3, body_b: BodyHandle, anchor_b: Vec3, distance: f32) -> Self {
        Self::with_kind(ConstraintKind::Distance { distance }, body_a, anchor_a, body_b, anchor_b)
    }

    pub fn point_to_point(body_a: BodyHandle, anchor_a: Vec3, body_b: BodyHandle, anchor_b: Vec3) -> Self {
        Self::with_kind(ConstraintKind::PointToPoint, body_a, anchor_a, body_b, anchor_b)
    }

    pub fn with_max_force(mut self, max_force: f32) -> Self {
        self.max_force = max_force;
        self
    }

    pub fn with_collide_connected(mut self, collide: bool) -> Self {
        self.collide_connected = collide;
        self
    }

    /// Softness of the joint as Spook stiffness and relaxation.
    pub fn with_stiffness(mut self, stiffness: f32, relaxation: f32) -> Self {
        self.stiffness = stiffness;
        self.relaxation = relaxation;
        self
    }

    /// Append this step's equations for bodies at dense indices `ia`/`ib`.
    pub(crate) fn build_equations(&self, ia: usize, ib: usize, bodies: &[Body], h: f32, out: &mut Vec<Equation>) {
        let bi = &bodies[ia];
        let bj = &bodies[ib];
        let ri = bi.quaternion * self.anchor_a;
        let rj = bj.quaternion * self.anchor_b;
        let separation = (bj.position + rj) - (bi.position + ri);

        let mut push = |n: Vec3, g: f32| {
            let mut eq = Equation::new(EquationKind::Constraint, ia, ib, -self.max_force, self.max_force);
            eq.set_along_normal(n, ri, rj, g);
            eq.set_spook_params(self.stiffness, self.relaxation, h);
            out.push(eq);
        };

        match self.kind {
            ConstraintKind::Distance { distance } => {
                let len = separation.norm();
                let n = if len > 1e-6 { separation / len } else { Vec3::y() };
                push(n, len - distance);
            }
            ConstraintKind::PointToPoint => {
                for axis in [Vec3::x(), Vec3::y(), Vec3::z()] {
                    push(axis, separation.dot(&axis));
                }
            }
        }
    }

    /// Number of equations produced per step.
    pub fn equation_count(&self) -> usize {
        match self.kind {
            ConstraintKind::Distance { .. } => 1,
            ConstraintKind::PointToPoint => 3,
        }
    }

    pub fn involves(&self, handle: BodyHandle) -> bool {
        self.body_a == handle || self.body_b == handle
    }
}

#[cfg(test)]
mod tests {
    extern crate std;
    use super::*;
    use std::vec;

    const EPSILON: f32 = 1e-4;

    fn approx_eq(a: f32, b: f32) -> bool {
        (a - b).abs() < EPSILON
    }

    fn handle(index: u32) -> BodyHandle {
        BodyHandle { index, generation: 0 }
    }

    #[test]
    fn test_distance_violation() {
        let bodies = vec![
            Body::new(1.0),
            Body::new(1.0).with_position(Vec3::new(3.0, 0.0, 0.0)),
        ];
        let c = Constraint::distance(handle(0), Vec3::zeros(), handle(1), Vec3::zeros(), 2.0);
        let mut out = vec![];
        c.build_equations(0, 1, &bodies, 1.0 / 60.0, &mut out);
        assert_eq!(out.len(), 1);
        assert!(approx_eq(out[0].g, 1.0));
        assert_eq!(out[0].ni, Vec3::x());
        assert!(approx_eq(out[0].min_force, -DEFAULT_MAX_FORCE));
    }

    #[test]
    fn test_point_to_point_uses_rotated_anchors() {
        let q = crate::math::Quat::from_axis_angle(&Vec3::z_axis(), core::f32::consts::FRAC_PI_2);
        let bodies = vec![
            Body::new(1.0).with_quaternion(q),
            Body::new(1.0).with_position(Vec3::new(0.0, 1.0, 0.0)),
        ];
        // A's local +X anchor ends up at world (0, 1, 0), on top of B.
        let c = Constraint::point_to_point(handle(0), Vec3::x(), handle(1), Vec3::zeros());
        let mut out = vec![];
        c.build_equations(0, 1, &bodies, 1.0 / 60.0, &mut out);
        assert_eq!(out.len(), c.equation_count());
        for eq in out.iter() {
            assert!(approx_eq(eq.g, 0.0));
        }
    }

    #[test]
    fn test_involves() {
        let c = Constraint::point_to_point(handle(0), Vec3::zeros(), handle(1), Vec3::zeros())
            .with_collide_connected(false);
        assert!(c.involves(handle(1)));
        assert!(!c.involves(handle(2)));
        assert!(!c.collide_connected);
    }
}
