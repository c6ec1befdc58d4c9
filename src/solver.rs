//! Projected Gauss-Seidel solver.
//!
//! Equations are relaxed one at a time and every impulse is applied to the
//! bodies' solver velocities right away, so later equations in the same pass
//! already see it. Solving never fails: it stops after `iterations` passes or
//! when a pass changes the impulses by less than `tolerance`.

use alloc::vec::Vec;

use log::trace;

use crate::body::Body;
use crate::equation::Equation;
use crate::math::Vec3;

#[derive(Debug, Clone)]
pub struct GsSolver {
    /// Most passes over the equations per solve.
    pub iterations: usize,
    /// Stop once the summed squared impulse change of a pass drops below this.
    pub tolerance: f32,
    lambda: Vec<f32>,
    b: Vec<f32>,
    inv_c: Vec<f32>,
}

impl Default for GsSolver {
    fn default() -> Self {
        Self::new(10, 1e-7)
    }
}

impl GsSolver {
    pub fn new(iterations: usize, tolerance: f32) -> Self {
        Self {
            iterations,
            tolerance,
            lambda: Vec::new(),
            b: Vec::new(),
            inv_c: Vec::new(),
        }
    }

    /// Solve `equations` for timestep `h` and add the resulting velocity
    /// changes to `bodies`. Returns the number of passes run.
    ///
    /// Bodies must have up-to-date solve mass properties; equation body
    /// indices point into `bodies`.
    pub fn solve(&mut self, h: f32, bodies: &mut [Body], equations: &mut [Equation]) -> usize {
        let n = equations.len();
        for body in bodies.iter_mut() {
            body.vlambda = Vec3::zeros();
            body.wlambda = Vec3::zeros();
        }

        self.lambda.clear();
        self.lambda.resize(n, 0.0);
        self.b.clear();
        self.inv_c.clear();
        for eq in equations.iter() {
            let (bi, bj) = (&bodies[eq.bi], &bodies[eq.bj]);
            self.b.push(eq.compute_b(h, bi, bj));
            self.inv_c.push(1.0 / (eq.compute_gimgt(bi, bj) + eq.eps));
        }

        let mut passes = 0;
        if n > 0 {
            let tolerance_sq = self.tolerance * self.tolerance;
            for _ in 0..self.iterations {
                passes += 1;
                let mut delta_total = 0.0f32;

                for k in 0..n {
                    if !equations[k].enabled {
                        continue;
                    }
                    // Friction is bounded by the impulse of its contact found so far.
                    if let Some(link) = equations[k].friction {
                        let bound = link.mu * self.lambda[link.contact];
                        equations[k].max_force = bound / h;
                        equations[k].min_force = -bound / h;
                    }

                    let eq = &equations[k];
                    let lambda = self.lambda[k];
                    let gw_lambda = eq.compute_gw_lambda(&bodies[eq.bi], &bodies[eq.bj]);
                    let mut delta = self.inv_c[k] * (self.b[k] - gw_lambda - eq.eps * lambda);

                    let (min, max) = (eq.min_force * h, eq.max_force * h);
                    if lambda + delta < min {
                        delta = min - lambda;
                    } else if lambda + delta > max {
                        delta = max - lambda;
                    }
                    self.lambda[k] += delta;
                    delta_total += delta.abs();

                    Equation::add_to_lambda(&eq.jacobian_a, &mut bodies[eq.bi], delta);
                    Equation::add_to_lambda(&eq.jacobian_b, &mut bodies[eq.bj], delta);
                }

                if delta_total * delta_total < tolerance_sq {
                    break;
                }
            }
        }

        for body in bodies.iter_mut() {
            body.velocity += body.vlambda.component_mul(&body.linear_factor);
            body.angular_velocity += body.wlambda.component_mul(&body.angular_factor);
            body.vlambda = Vec3::zeros();
            body.wlambda = Vec3::zeros();
        }
        for (eq, lambda) in equations.iter_mut().zip(self.lambda.iter()) {
            eq.multiplier = lambda / h;
        }

        trace!("GsSolver: {} equations, {} passes", n, passes);
        passes
    }
}
