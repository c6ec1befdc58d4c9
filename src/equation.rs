//! Solver equations.
//!
//! Every contact, friction direction and joint axis becomes one [`Equation`]:
//! a pair of Jacobian rows acting on two bodies, a position violation `g`,
//! force bounds and the Spook stabilization terms for the current timestep.

use crate::body::Body;
use crate::math::Vec3;

/// Default upper bound for contact and joint forces (N).
pub const DEFAULT_MAX_FORCE: f32 = 1e6;

/// One Jacobian row for one body: linear and angular parts.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct JacobianElement {
    pub spatial: Vec3,
    pub rotational: Vec3,
}

impl JacobianElement {
    pub fn new(spatial: Vec3, rotational: Vec3) -> Self {
        Self { spatial, rotational }
    }

    #[inline]
    pub fn multiply_vectors(&self, spatial: &Vec3, rotational: &Vec3) -> f32 {
        self.spatial.dot(spatial) + self.rotational.dot(rotational)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EquationKind {
    Contact,
    Friction,
    Constraint,
}

/// Links a friction equation to the contact equation whose normal impulse
/// bounds it (`|λ_friction| <= mu · λ_normal`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrictionLink {
    /// Index of the contact equation in the same equation list.
    pub contact: usize,
    pub mu: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Equation {
    pub kind: EquationKind,
    /// Dense body indices for the step that built this equation.
    pub bi: usize,
    pub bj: usize,
    pub jacobian_a: JacobianElement,
    pub jacobian_b: JacobianElement,
    /// Position violation; negative means penetration for contacts.
    pub g: f32,
    /// Bounce factor applied to the linear part of the relative velocity.
    pub restitution: f32,
    pub min_force: f32,
    pub max_force: f32,
    pub stiffness: f32,
    pub relaxation: f32,
    pub(crate) a: f32,
    pub(crate) b: f32,
    pub(crate) eps: f32,
    /// Disabled equations are kept for inspection but skipped by the solver.
    pub enabled: bool,
    pub friction: Option<FrictionLink>,
    /// Force found by the last solve (`λ / dt`).
    pub multiplier: f32,

    /// Contact normal (out of `bi`, toward `bj`) or friction tangent.
    pub ni: Vec3,
    /// World-oriented offsets from each body's center to its contact point.
    pub ri: Vec3,
    pub rj: Vec3,
}

impl Equation {
    /// A bare equation with zero Jacobians; callers fill in the rows.
    pub fn new(kind: EquationKind, bi: usize, bj: usize, min_force: f32, max_force: f32) -> Self {
        Self {
            kind,
            bi,
            bj,
            jacobian_a: JacobianElement::default(),
            jacobian_b: JacobianElement::default(),
            g: 0.0,
            restitution: 0.0,
            min_force,
            max_force,
            stiffness: 1e7,
            relaxation: 4.0,
            a: 0.0,
            b: 0.0,
            eps: 0.0,
            enabled: true,
            friction: None,
            multiplier: 0.0,
            ni: Vec3::zeros(),
            ri: Vec3::zeros(),
            rj: Vec3::zeros(),
        }
    }

    /// Non-penetration along `ni` between the contact points `ri`/`rj`.
    pub fn contact(bi: usize, bj: usize, ni: Vec3, ri: Vec3, rj: Vec3, g: f32) -> Self {
        let mut eq = Self::new(EquationKind::Contact, bi, bj, 0.0, DEFAULT_MAX_FORCE);
        eq.set_along_normal(ni, ri, rj, g);
        eq
    }

    /// Friction along tangent `t`; bounds are refreshed from the linked contact.
    pub fn friction(bi: usize, bj: usize, t: Vec3, ri: Vec3, rj: Vec3, link: FrictionLink) -> Self {
        let mut eq = Self::new(EquationKind::Friction, bi, bj, 0.0, 0.0);
        eq.set_along_normal(t, ri, rj, 0.0);
        eq.friction = Some(link);
        eq
    }

    /// Rows of a one-dimensional constraint along `n` through the two points.
    pub fn set_along_normal(&mut self, n: Vec3, ri: Vec3, rj: Vec3, g: f32) {
        self.jacobian_a = JacobianElement::new(-n, -ri.cross(&n));
        self.jacobian_b = JacobianElement::new(n, rj.cross(&n));
        self.ni = n;
        self.ri = ri;
        self.rj = rj;
        self.g = g;
    }

    /// Convert stiffness/relaxation into Spook parameters for timestep `h`.
    pub fn set_spook_params(&mut self, stiffness: f32, relaxation: f32, h: f32) {
        self.stiffness = stiffness;
        self.relaxation = relaxation;
        self.a = 4.0 / (h * (1.0 + 4.0 * relaxation));
        self.b = (4.0 * relaxation) / (1.0 + 4.0 * relaxation);
        self.eps = 4.0 / (h * h * stiffness * (1.0 + 4.0 * relaxation));
    }

    pub fn spook_params(&self) -> (f32, f32, f32) {
        (self.a, self.b, self.eps)
    }

    /// `G·W` with restitution applied to the linear part.
    fn compute_gw(&self, bi: &Body, bj: &Body) -> f32 {
        let e1 = 1.0 + self.restitution;
        e1 * (self.jacobian_a.spatial.dot(&bi.velocity) + self.jacobian_b.spatial.dot(&bj.velocity))
            + self.jacobian_a.rotational.dot(&bi.angular_velocity)
            + self.jacobian_b.rotational.dot(&bj.angular_velocity)
    }

    /// `G·M⁻¹·f` for the external forces and torques.
    fn compute_gimf(&self, bi: &Body, bj: &Body) -> f32 {
        let fi = bi.force * bi.inv_mass_solve;
        let fj = bj.force * bj.inv_mass_solve;
        let ti = bi.inv_inertia_world_solve * bi.torque;
        let tj = bj.inv_inertia_world_solve * bj.torque;
        self.jacobian_a.multiply_vectors(&fi, &ti) + self.jacobian_b.multiply_vectors(&fj, &tj)
    }

    /// Right-hand side `B = -g·a - GW·b - h·GiMf`.
    pub(crate) fn compute_b(&self, h: f32, bi: &Body, bj: &Body) -> f32 {
        -self.g * self.a - self.compute_gw(bi, bj) * self.b - h * self.compute_gimf(bi, bj)
    }

    /// Effective inverse mass `G·M⁻¹·Gᵀ`.
    pub(crate) fn compute_gimgt(&self, bi: &Body, bj: &Body) -> f32 {
        let ga = &self.jacobian_a;
        let gb = &self.jacobian_b;
        bi.inv_mass_solve * ga.spatial.norm_squared()
            + bj.inv_mass_solve * gb.spatial.norm_squared()
            + ga.rotational.dot(&(bi.inv_inertia_world_solve * ga.rotational))
            + gb.rotational.dot(&(bj.inv_inertia_world_solve * gb.rotational))
    }

    /// Relative velocity of the solver's accumulated impulses along this row.
    pub(crate) fn compute_gw_lambda(&self, bi: &Body, bj: &Body) -> f32 {
        self.jacobian_a.multiply_vectors(&bi.vlambda, &bi.wlambda)
            + self.jacobian_b.multiply_vectors(&bj.vlambda, &bj.wlambda)
    }

    /// Apply an impulse delta to one side's solver velocities.
    pub(crate) fn add_to_lambda(jacobian: &JacobianElement, body: &mut Body, delta: f32) {
        body.vlambda += jacobian.spatial * (body.inv_mass_solve * delta);
        body.wlambda += body.inv_inertia_world_solve * jacobian.rotational * delta;
    }

    /// Relative velocity along the row using the bodies' real velocities.
    pub fn relative_velocity(&self, bi: &Body, bj: &Body) -> f32 {
        self.jacobian_a.multiply_vectors(&bi.velocity, &bi.angular_velocity)
            + self.jacobian_b.multiply_vectors(&bj.velocity, &bj.angular_velocity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f32 = 1e-4;

    fn approx_eq(a: f32, b: f32) -> bool {
        (a - b).abs() < EPSILON
    }

    fn solve_ready(mut body: Body) -> Body {
        body.update_solve_mass_properties();
        body
    }

    #[test]
    fn test_spook_params() {
        let mut eq = Equation::contact(0, 1, Vec3::y(), Vec3::zeros(), Vec3::zeros(), 0.0);
        let h = 1.0 / 60.0;
        eq.set_spook_params(1e7, 3.0, h);
        let (a, b, eps) = eq.spook_params();
        assert!(approx_eq(a, 4.0 / (h * 13.0)));
        assert!(approx_eq(b, 12.0 / 13.0));
        assert!((eps - 4.0 / (h * h * 1e7 * 13.0)).abs() < 1e-9);
    }

    #[test]
    fn test_contact_jacobian_signs() {
        let n = Vec3::y();
        let ri = Vec3::new(1.0, 0.0, 0.0);
        let eq = Equation::contact(0, 1, n, ri, Vec3::zeros(), -0.1);
        assert_eq!(eq.jacobian_a.spatial, -n);
        assert_eq!(eq.jacobian_b.spatial, n);
        assert_eq!(eq.jacobian_a.rotational, -ri.cross(&n));
        assert_eq!(eq.kind, EquationKind::Contact);
        assert_eq!(eq.min_force, 0.0);
    }

    #[test]
    fn test_gimgt_two_unit_masses() {
        let a = solve_ready(Body::new(1.0));
        let b = solve_ready(Body::new(1.0));
        let eq = Equation::contact(0, 1, Vec3::x(), Vec3::zeros(), Vec3::zeros(), 0.0);
        assert!(approx_eq(eq.compute_gimgt(&a, &b), 2.0));
        let ground = solve_ready(Body::new_static());
        assert!(approx_eq(eq.compute_gimgt(&ground, &b), 1.0));
    }

    #[test]
    fn test_approach_velocity_with_restitution() {
        let a = Body::new(1.0).with_velocity(Vec3::new(1.0, 0.0, 0.0));
        let b = Body::new(1.0).with_velocity(Vec3::new(-1.0, 0.0, 0.0));
        let mut eq = Equation::contact(0, 1, Vec3::x(), Vec3::zeros(), Vec3::zeros(), 0.0);
        assert!(approx_eq(eq.relative_velocity(&a, &b), -2.0));
        eq.restitution = 1.0;
        assert!(approx_eq(eq.compute_gw(&a, &b), -4.0));
    }

    #[test]
    fn test_add_to_lambda_scales_by_inverse_mass() {
        let mut body = solve_ready(Body::new(2.0));
        let jac = JacobianElement::new(Vec3::y(), Vec3::zeros());
        Equation::add_to_lambda(&jac, &mut body, 4.0);
        assert!(approx_eq(body.vlambda.y, 2.0));
    }
}
