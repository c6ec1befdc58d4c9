//! Error type shared by shape construction, matrix solves and world lookups.
//!
//! Stepping the world never fails; errors only surface when building
//! geometry, solving a singular system or referring to a body that is gone.

use thiserror::Error;

use crate::body::BodyHandle;

/// Errors reported by the physics core.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PhysicsError {
    /// A scalar shape parameter is out of range (negative, zero or not finite).
    #[error("invalid {shape} parameter `{param}`: {value}")]
    InvalidShapeParameter {
        shape: &'static str,
        param: &'static str,
        value: f32,
    },

    /// A polygon face has fewer than three vertices.
    #[error("face {face} has {count} vertices, at least 3 are required")]
    DegenerateFace { face: usize, count: usize },

    /// A face or triangle refers to a vertex that does not exist.
    #[error("index {index} in element {element} is out of range for {vertex_count} vertices")]
    IndexOutOfRange {
        element: usize,
        index: usize,
        vertex_count: usize,
    },

    /// Triangle index buffers must hold a multiple of three entries.
    #[error("index buffer length {0} is not a multiple of 3")]
    IncompleteTriangle(usize),

    /// Heightfield data must be a rectangular grid of at least 2x2 samples.
    #[error("heightfield data must be a rectangular grid of at least 2x2 samples (row {row} has {len} samples)")]
    MalformedHeightfield { row: usize, len: usize },

    /// Gaussian elimination hit a zero pivot.
    #[error("could not solve {matrix:?} * x = {rhs:?}: matrix is singular")]
    SingularMatrix { matrix: [[f32; 3]; 3], rhs: [f32; 3] },

    /// The handle does not refer to a live body of this world.
    #[error("body {0:?} is not part of the world")]
    UnknownBody(BodyHandle),
}

/// Convenience alias used across the crate.
pub type Result<T> = core::result::Result<T, PhysicsError>;

/// Reject negative, zero or non-finite scalar shape parameters.
pub(crate) fn require_positive(shape: &'static str, param: &'static str, value: f32) -> Result<f32> {
    if value > 0.0 && value.is_finite() {
        Ok(value)
    } else {
        Err(PhysicsError::InvalidShapeParameter { shape, param, value })
    }
}
