#![no_std]
//! Rigid-body physics for `no_std` targets.
//!
//! Bodies carry one or more collision [`Shape`]s and live in a [`World`].
//! Every step the world finds overlapping pairs (broadphase), generates
//! contact points for them (narrowphase), turns contacts and joints into
//! [`Equation`]s and relaxes them with a Gauss-Seidel solver before
//! integrating velocities and poses. Slow bodies fall asleep and skip
//! integration until something wakes them.
//!
//! All math is `f32` on top of `nalgebra`; the crate only needs `alloc`.

extern crate alloc;

pub mod aabb;
pub mod body;
pub mod broadphase;
pub mod constraint;
pub mod equation;
pub mod error;
pub mod material;
pub mod math;
pub mod narrowphase;
mod overlap;
pub mod raycast;
pub mod shape;
pub mod solver;
pub mod world;

pub use aabb::Aabb;
pub use body::{Body, BodyHandle, BodyType, ShapeId, SleepState};
pub use broadphase::{Broadphase, BroadphaseKind, NaiveBroadphase, SapBroadphase};
pub use constraint::{Constraint, ConstraintId};
pub use equation::Equation;
pub use error::{PhysicsError, Result};
pub use material::{ContactMaterial, Material};
pub use math::{Quat, Vec3};
pub use raycast::{RayMode, RayOptions, RaycastResult};
pub use shape::Shape;
pub use solver::GsSolver;
pub use world::{EventHandler, Subsystem, World, WorldConfig, WorldEvent};
