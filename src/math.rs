//! Small math helpers on top of nalgebra's fixed-size types.
//!
//! All hot-path math works on stack values (`Vector3`, `UnitQuaternion`,
//! `Matrix3`), so no scratch buffers are shared between calls.

use nalgebra::{Matrix3, Quaternion, UnitQuaternion, Vector3};

// ComplexField provides sqrt()/abs() for f32 in no_std via libm
#[allow(unused_imports)]
use nalgebra::ComplexField;

use crate::error::{PhysicsError, Result};

pub type Vec3 = Vector3<f32>;
pub type Quat = UnitQuaternion<f32>;
pub type Mat3 = Matrix3<f32>;

/// Solve `a * x = b` with Gaussian elimination and partial pivoting.
///
/// Returns [`PhysicsError::SingularMatrix`] with the full system attached
/// when a pivot column is zero.
pub fn solve3(a: &Mat3, b: &Vec3) -> Result<Vec3> {
    let mut m = [[0.0f32; 4]; 3];
    for r in 0..3 {
        for c in 0..3 {
            m[r][c] = a[(r, c)];
        }
        m[r][3] = b[r];
    }

    for col in 0..3 {
        let mut pivot = col;
        for r in (col + 1)..3 {
            if m[r][col].abs() > m[pivot][col].abs() {
                pivot = r;
            }
        }
        if m[pivot][col] == 0.0 {
            return Err(singular(a, b));
        }
        m.swap(col, pivot);

        for r in (col + 1)..3 {
            let factor = m[r][col] / m[col][col];
            for c in col..4 {
                m[r][c] -= factor * m[col][c];
            }
        }
    }

    let mut x = Vec3::zeros();
    for r in (0..3).rev() {
        let mut sum = m[r][3];
        for c in (r + 1)..3 {
            sum -= m[r][c] * x[c];
        }
        x[r] = sum / m[r][r];
    }
    Ok(x)
}

/// Invert a 3x3 matrix column by column via [`solve3`].
pub fn invert3(a: &Mat3) -> Result<Mat3> {
    let mut inv = Mat3::zeros();
    for c in 0..3 {
        let mut e = Vec3::zeros();
        e[c] = 1.0;
        let col = solve3(a, &e)?;
        inv.set_column(c, &col);
    }
    Ok(inv)
}

fn singular(a: &Mat3, b: &Vec3) -> PhysicsError {
    let mut matrix = [[0.0; 3]; 3];
    for (r, row) in matrix.iter_mut().enumerate() {
        for (c, v) in row.iter_mut().enumerate() {
            *v = a[(r, c)];
        }
    }
    PhysicsError::SingularMatrix {
        matrix,
        rhs: [b.x, b.y, b.z],
    }
}

/// Two unit vectors that complete `n` (assumed unit length) to an orthonormal basis.
pub fn tangents(n: &Vec3) -> (Vec3, Vec3) {
    let t1 = if n.x.abs() < 0.9 {
        Vec3::x().cross(n).normalize()
    } else {
        Vec3::y().cross(n).normalize()
    };
    let t2 = n.cross(&t1);
    (t1, t2)
}

/// One explicit step of `q' = q + 0.5 * dt * (ω ⊗ q)`, left unnormalized.
///
/// `angular_factor` masks the rotation per axis (axis-locked bodies).
pub fn integrate_quaternion(q: &Quat, angular_velocity: &Vec3, angular_factor: &Vec3, dt: f32) -> Quaternion<f32> {
    let w = angular_velocity.component_mul(angular_factor) * (0.5 * dt);
    let dq = Quaternion::new(0.0, w.x, w.y, w.z);
    let q = q.into_inner();
    q + dq * q
}

/// First-order renormalization: cheap and accurate while `|q|` stays near 1.
pub fn normalize_fast(q: Quaternion<f32>) -> Quaternion<f32> {
    let f = (3.0 - q.norm_squared()) * 0.5;
    q * f
}

/// Whether `p` lies inside the convex polygon `verts` (wound counter-clockwise
/// around `normal`). Points on an edge count as inside.
pub fn point_in_polygon(verts: &[Vec3], normal: &Vec3, p: &Vec3) -> bool {
    let n = verts.len();
    let mut positive: Option<bool> = None;
    for i in 0..n {
        let v = verts[i];
        let edge = verts[(i + 1) % n] - v;
        let side = edge.cross(normal).dot(&(p - v));
        if side == 0.0 {
            continue;
        }
        let is_positive = side > 0.0;
        match positive {
            None => positive = Some(is_positive),
            Some(prev) if prev != is_positive => return false,
            _ => {}
        }
    }
    true
}

/// Closest point to `p` on the segment `a..b`.
pub fn closest_point_on_segment(a: &Vec3, b: &Vec3, p: &Vec3) -> Vec3 {
    let ab = b - a;
    let len_sq = ab.norm_squared();
    if len_sq <= f32::EPSILON {
        return *a;
    }
    let t = ((p - a).dot(&ab) / len_sq).clamp(0.0, 1.0);
    a + ab * t
}

/// Unit direction from `from` to `to`, or `fallback` when the points coincide.
pub fn direction_or(from: &Vec3, to: &Vec3, fallback: Vec3) -> Vec3 {
    let d = to - from;
    let len = d.norm();
    if len > 1e-6 {
        d / len
    } else {
        fallback
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f32 = 1e-4;

    fn approx_eq(a: f32, b: f32) -> bool {
        (a - b).abs() < EPSILON
    }

    fn approx_vec_eq(a: &Vec3, b: &Vec3) -> bool {
        approx_eq(a.x, b.x) && approx_eq(a.y, b.y) && approx_eq(a.z, b.z)
    }

    #[test]
    fn test_solve3_diagonal() {
        let a = Mat3::from_diagonal(&Vec3::new(2.0, 4.0, 8.0));
        let x = solve3(&a, &Vec3::new(2.0, 2.0, 2.0)).unwrap();
        assert!(approx_vec_eq(&x, &Vec3::new(1.0, 0.5, 0.25)));
    }

    #[test]
    fn test_solve3_needs_pivoting() {
        // Zero on the first diagonal entry forces a row swap.
        let a = Mat3::new(0.0, 1.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 3.0);
        let x = solve3(&a, &Vec3::new(5.0, 7.0, 9.0)).unwrap();
        assert!(approx_vec_eq(&x, &Vec3::new(7.0, 5.0, 3.0)));
    }

    #[test]
    fn test_solve3_singular_reports_state() {
        let a = Mat3::new(1.0, 2.0, 3.0, 2.0, 4.0, 6.0, 0.0, 0.0, 0.0);
        match solve3(&a, &Vec3::new(1.0, 2.0, 3.0)) {
            Err(PhysicsError::SingularMatrix { matrix, rhs }) => {
                assert_eq!(matrix[1], [2.0, 4.0, 6.0]);
                assert_eq!(rhs, [1.0, 2.0, 3.0]);
            }
            other => panic!("expected singular matrix error, got {:?}", other),
        }
    }

    #[test]
    fn test_invert3_roundtrip() {
        let a = Mat3::new(4.0, 1.0, 0.0, 1.0, 3.0, 1.0, 0.0, 1.0, 2.0);
        let inv = invert3(&a).unwrap();
        let id = a * inv;
        assert!(approx_vec_eq(&id.column(0).into_owned(), &Vec3::x()));
        assert!(approx_vec_eq(&id.column(1).into_owned(), &Vec3::y()));
        assert!(approx_vec_eq(&id.column(2).into_owned(), &Vec3::z()));
    }

    #[test]
    fn test_tangents_orthonormal() {
        for n in [Vec3::x(), Vec3::y(), Vec3::new(1.0, 2.0, -3.0).normalize()] {
            let (t1, t2) = tangents(&n);
            assert!(approx_eq(t1.norm(), 1.0));
            assert!(approx_eq(t2.norm(), 1.0));
            assert!(approx_eq(t1.dot(&n), 0.0));
            assert!(approx_eq(t2.dot(&n), 0.0));
            assert!(approx_eq(t1.dot(&t2), 0.0));
        }
    }

    #[test]
    fn test_integrate_quaternion_matches_rotation() {
        // Many small steps about Y should approach a quarter turn.
        let mut q = Quat::identity();
        let w = Vec3::new(0.0, core::f32::consts::FRAC_PI_2, 0.0);
        for _ in 0..1000 {
            q = Quat::new_normalize(integrate_quaternion(&q, &w, &Vec3::repeat(1.0), 0.001));
        }
        let expected = Quat::from_axis_angle(&Vec3::y_axis(), core::f32::consts::FRAC_PI_2);
        assert!(q.angle_to(&expected) < 1e-2);
    }

    #[test]
    fn test_angular_factor_locks_axis() {
        let q = Quat::identity();
        let next = integrate_quaternion(&q, &Vec3::new(5.0, 0.0, 0.0), &Vec3::new(0.0, 1.0, 1.0), 0.1);
        assert_eq!(next, q.into_inner());
    }

    #[test]
    fn test_normalize_fast_close_to_exact() {
        let q = Quaternion::new(1.01, 0.0, 0.0, 0.0);
        let fast = normalize_fast(q);
        assert!((fast.norm() - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_point_in_polygon() {
        let square = [
            Vec3::new(-1.0, 0.0, -1.0),
            Vec3::new(-1.0, 0.0, 1.0),
            Vec3::new(1.0, 0.0, 1.0),
            Vec3::new(1.0, 0.0, -1.0),
        ];
        let n = Vec3::y();
        assert!(point_in_polygon(&square, &n, &Vec3::new(0.2, 0.0, 0.3)));
        assert!(point_in_polygon(&square, &n, &Vec3::new(1.0, 0.0, 0.0)));
        assert!(!point_in_polygon(&square, &n, &Vec3::new(1.5, 0.0, 0.0)));
    }

    #[test]
    fn test_closest_point_on_segment_clamps() {
        let a = Vec3::zeros();
        let b = Vec3::new(2.0, 0.0, 0.0);
        assert!(approx_vec_eq(&closest_point_on_segment(&a, &b, &Vec3::new(1.0, 1.0, 0.0)), &Vec3::new(1.0, 0.0, 0.0)));
        assert!(approx_vec_eq(&closest_point_on_segment(&a, &b, &Vec3::new(-3.0, 1.0, 0.0)), &a));
        assert!(approx_vec_eq(&closest_point_on_segment(&a, &b, &Vec3::new(5.0, 0.0, 0.0)), &b));
    }
}
