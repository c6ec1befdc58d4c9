//! Rigid bodies.
//!
//! A [`Body`] owns its pose, velocities, force accumulators, mass properties,
//! sleep state and a list of shapes placed in the body frame. Bodies are built
//! with a builder chain and handed to a [`World`](crate::world::World), which
//! returns a generation-checked [`BodyHandle`].
//!
//! # Example
//! ```
//! use embedded_3dphysics::body::{Body, BodyType};
//! use embedded_3dphysics::shape::Shape;
//! use nalgebra::Vector3;
//!
//! let ball = Body::new(1.0)
//!     .with_position(Vector3::new(0.0, 10.0, 0.0))
//!     .with_shape(Shape::sphere(0.5).unwrap());
//! assert_eq!(ball.body_type(), BodyType::Dynamic);
//!
//! let floor = Body::new_static().with_shape(Shape::plane());
//! assert_eq!(floor.inv_mass(), 0.0);
//! ```

use alloc::sync::Arc;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicU32, Ordering};

// ComplexField provides sqrt() for f32 in no_std via libm
#[allow(unused_imports)]
use nalgebra::ComplexField;

use log::warn;

use crate::aabb::Aabb;
use crate::material::Material;
use crate::math::{integrate_quaternion, normalize_fast, Mat3, Quat, Vec3};
use crate::shape::{box_inertia, Shape};

static NEXT_SHAPE_ID: AtomicU32 = AtomicU32::new(1);

/// Pending sleep notifications per body between two event drains. Past
/// this the oldest notification is dropped.
const MAX_PENDING_SLEEP_EVENTS: usize = 8;

/// Handle of a body inside a [`World`](crate::world::World).
///
/// The generation makes handles of removed bodies stale instead of silently
/// pointing at whatever body reuses the slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BodyHandle {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

impl BodyHandle {
    /// Slot index inside the world's body arena.
    pub fn index(&self) -> usize {
        self.index as usize
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }
}

/// Determines how a body participates in the simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BodyType {
    /// Fully simulated: affected by gravity, forces and contacts.
    Dynamic,
    /// Never moves. Floors, walls and terrain.
    Static,
    /// Moves with its own velocity but is not pushed by anything.
    Kinematic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SleepState {
    Awake,
    Sleepy,
    Sleeping,
}

/// Sleep transitions recorded by a body and forwarded by the world as events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SleepEvent {
    Sleepy,
    Sleep,
    WakeUp,
}

/// Process-unique id of one shape slot on one body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ShapeId(u32);

impl ShapeId {
    fn next() -> Self {
        Self(NEXT_SHAPE_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(&self) -> u32 {
        self.0
    }
}

/// A shape placed in a body's local frame.
#[derive(Debug, Clone)]
pub struct ShapeSlot {
    id: ShapeId,
    pub shape: Arc<Shape>,
    pub offset: Vec3,
    pub orientation: Quat,
}

impl ShapeSlot {
    pub fn id(&self) -> ShapeId {
        self.id
    }
}

/// A rigid body with linear and angular dynamics.
#[derive(Debug, Clone)]
pub struct Body {
    // -- Pose and motion --
    /// World position of the body origin (also its center of mass).
    pub position: Vec3,
    /// World orientation, kept unit length by the world.
    pub quaternion: Quat,
    /// Linear velocity in world space (meters per second).
    pub velocity: Vec3,
    /// Angular velocity in world space (radians per second).
    pub angular_velocity: Vec3,

    /// Pose before the last internal step.
    pub previous_position: Vec3,
    pub previous_quaternion: Quat,
    /// Pose blended between the last two internal steps by [`World::step`](crate::world::World::step).
    pub interpolated_position: Vec3,
    pub interpolated_quaternion: Quat,

    /// Pose and velocity at the time the body was added to a world.
    pub init_position: Vec3,
    pub init_quaternion: Quat,
    pub init_velocity: Vec3,
    pub init_angular_velocity: Vec3,

    /// Accumulated force, cleared after every internal step.
    pub force: Vec3,
    /// Accumulated torque, cleared after every internal step.
    pub torque: Vec3,

    // -- Mass properties --
    mass: f32,
    inv_mass: f32,
    inertia: Vec3,
    inv_inertia: Vec3,
    inv_inertia_world: Mat3,
    pub(crate) inv_mass_solve: f32,
    pub(crate) inv_inertia_world_solve: Mat3,
    body_type: BodyType,
    fixed_rotation: bool,

    /// Per-axis multiplier on linear motion (0 locks an axis).
    pub linear_factor: Vec3,
    /// Per-axis multiplier on angular motion (0 locks an axis).
    pub angular_factor: Vec3,
    /// Fraction of linear velocity lost per second.
    pub linear_damping: f32,
    /// Fraction of angular velocity lost per second.
    pub angular_damping: f32,

    // -- Collision --
    /// When false the body still reports contacts but is never pushed by them.
    pub collision_response: bool,
    /// Group bits. Two bodies collide when each one's group overlaps the other's mask.
    pub collision_filter_group: u32,
    pub collision_filter_mask: u32,
    /// Looked up with the partner's material in the world's contact-material table.
    pub material: Option<Material>,
    shapes: Vec<ShapeSlot>,
    bounding_radius: f32,
    aabb: Aabb,
    aabb_needs_update: bool,

    // -- Sleeping --
    /// Still needs [`WorldConfig::allow_sleep`](crate::world::WorldConfig::allow_sleep) to take effect.
    pub allow_sleep: bool,
    /// Below this speed (linear and angular combined) the body turns sleepy.
    pub sleep_speed_limit: f32,
    /// Seconds a body stays sleepy before falling asleep.
    pub sleep_time_limit: f32,
    sleep_state: SleepState,
    time_last_sleepy: f32,
    pub(crate) wake_up_after_narrowphase: bool,
    pending: heapless::Vec<SleepEvent, MAX_PENDING_SLEEP_EVENTS>,

    // -- Solver scratch --
    pub(crate) vlambda: Vec3,
    pub(crate) wlambda: Vec3,

    handle: Option<BodyHandle>,
}

impl Body {
    /// Create a body with the given mass (in kg). Zero mass makes it static.
    ///
    /// # Panics
    /// Panics if `mass` is negative or not finite.
    pub fn new(mass: f32) -> Self {
        assert!(mass >= 0.0 && mass.is_finite(), "mass must be non-negative and finite");
        let body_type = if mass > 0.0 { BodyType::Dynamic } else { BodyType::Static };
        let mut body = Self::with_type(mass, body_type);
        body.update_mass_properties();
        body
    }

    /// Create a static body (infinite mass, never moves).
    pub fn new_static() -> Self {
        Self::new(0.0)
    }

    /// Create a kinematic body; it moves only by its own velocity.
    pub fn new_kinematic() -> Self {
        let mut body = Self::with_type(0.0, BodyType::Kinematic);
        body.update_mass_properties();
        body
    }

    fn with_type(mass: f32, body_type: BodyType) -> Self {
        Self {
            position: Vec3::zeros(),
            quaternion: Quat::identity(),
            velocity: Vec3::zeros(),
            angular_velocity: Vec3::zeros(),
            previous_position: Vec3::zeros(),
            previous_quaternion: Quat::identity(),
            interpolated_position: Vec3::zeros(),
            interpolated_quaternion: Quat::identity(),
            init_position: Vec3::zeros(),
            init_quaternion: Quat::identity(),
            init_velocity: Vec3::zeros(),
            init_angular_velocity: Vec3::zeros(),
            force: Vec3::zeros(),
            torque: Vec3::zeros(),
            mass,
            inv_mass: 0.0,
            inertia: Vec3::zeros(),
            inv_inertia: Vec3::zeros(),
            inv_inertia_world: Mat3::zeros(),
            inv_mass_solve: 0.0,
            inv_inertia_world_solve: Mat3::zeros(),
            body_type,
            fixed_rotation: false,
            linear_factor: Vec3::repeat(1.0),
            angular_factor: Vec3::repeat(1.0),
            linear_damping: 0.01,
            angular_damping: 0.01,
            collision_response: true,
            collision_filter_group: 1,
            collision_filter_mask: u32::MAX,
            material: None,
            shapes: Vec::new(),
            bounding_radius: 0.0,
            aabb: Aabb::EMPTY,
            aabb_needs_update: true,
            allow_sleep: true,
            sleep_speed_limit: 0.1,
            sleep_time_limit: 1.0,
            sleep_state: SleepState::Awake,
            time_last_sleepy: 0.0,
            wake_up_after_narrowphase: false,
            pending: heapless::Vec::new(),
            vlambda: Vec3::zeros(),
            wlambda: Vec3::zeros(),
            handle: None,
        }
    }

    /// Builder: set initial position.
    pub fn with_position(mut self, position: Vec3) -> Self {
        self.set_position(position);
        self
    }

    /// Builder: set initial orientation.
    pub fn with_quaternion(mut self, quaternion: Quat) -> Self {
        self.quaternion = quaternion;
        self.previous_quaternion = quaternion;
        self.interpolated_quaternion = quaternion;
        self.aabb_needs_update = true;
        self.update_inertia_world(true);
        self
    }

    pub fn with_velocity(mut self, velocity: Vec3) -> Self {
        self.velocity = velocity;
        self
    }

    pub fn with_angular_velocity(mut self, angular_velocity: Vec3) -> Self {
        self.angular_velocity = angular_velocity;
        self
    }

    /// Builder: attach a shape centered on the body.
    pub fn with_shape(self, shape: impl Into<Arc<Shape>>) -> Self {
        self.with_shape_at(shape, Vec3::zeros(), Quat::identity())
    }

    /// Builder: attach a shape with a local offset and orientation.
    pub fn with_shape_at(mut self, shape: impl Into<Arc<Shape>>, offset: Vec3, orientation: Quat) -> Self {
        self.add_shape(shape, offset, orientation);
        self
    }

    pub fn with_material(mut self, material: Material) -> Self {
        self.material = Some(material);
        self
    }

    /// Builder: set linear and angular damping (each clamped to `0.0..=1.0`).
    pub fn with_damping(mut self, linear: f32, angular: f32) -> Self {
        self.linear_damping = linear.clamp(0.0, 1.0);
        self.angular_damping = angular.clamp(0.0, 1.0);
        self
    }

    pub fn with_collision_filter(mut self, group: u32, mask: u32) -> Self {
        self.collision_filter_group = group;
        self.collision_filter_mask = mask;
        self
    }

    pub fn with_collision_response(mut self, enabled: bool) -> Self {
        self.collision_response = enabled;
        self
    }

    /// Builder: forbid all rotation (zero inverse inertia).
    pub fn with_fixed_rotation(mut self, fixed: bool) -> Self {
        self.fixed_rotation = fixed;
        self.update_mass_properties();
        self
    }

    pub fn with_linear_factor(mut self, factor: Vec3) -> Self {
        self.linear_factor = factor;
        self
    }

    pub fn with_angular_factor(mut self, factor: Vec3) -> Self {
        self.angular_factor = factor;
        self
    }

    pub fn with_allow_sleep(mut self, allow: bool) -> Self {
        self.allow_sleep = allow;
        self
    }

    /// Builder: speed below which the body gets sleepy, and how long it must
    /// stay below it before falling asleep.
    pub fn with_sleep_limits(mut self, speed_limit: f32, time_limit: f32) -> Self {
        self.sleep_speed_limit = speed_limit;
        self.sleep_time_limit = time_limit;
        self
    }

    /// Attach a shape after construction. Returns the id of the new slot.
    pub fn add_shape(&mut self, shape: impl Into<Arc<Shape>>, offset: Vec3, orientation: Quat) -> ShapeId {
        let id = ShapeId::next();
        self.shapes.push(ShapeSlot {
            id,
            shape: shape.into(),
            offset,
            orientation,
        });
        self.update_mass_properties();
        self.update_bounding_radius();
        self.aabb_needs_update = true;
        id
    }

    /// Detach a shape. Returns `false` if the body has no slot with that id.
    pub fn remove_shape(&mut self, id: ShapeId) -> bool {
        let before = self.shapes.len();
        self.shapes.retain(|slot| slot.id != id);
        if self.shapes.len() == before {
            return false;
        }
        self.update_mass_properties();
        self.update_bounding_radius();
        self.aabb_needs_update = true;
        true
    }

    pub fn shapes(&self) -> &[ShapeSlot] {
        &self.shapes
    }

    /// World position and orientation of one shape slot.
    pub fn shape_world_pose(&self, slot: &ShapeSlot) -> (Vec3, Quat) {
        (self.position + self.quaternion * slot.offset, self.quaternion * slot.orientation)
    }

    pub fn body_type(&self) -> BodyType {
        self.body_type
    }

    pub fn is_dynamic(&self) -> bool {
        self.body_type == BodyType::Dynamic
    }

    /// Static bodies and kinematic bodies cannot be pushed.
    pub fn is_static_or_kinematic(&self) -> bool {
        self.body_type != BodyType::Dynamic
    }

    pub fn mass(&self) -> f32 {
        self.mass
    }

    pub fn inv_mass(&self) -> f32 {
        self.inv_mass
    }

    /// Diagonal of the local inertia tensor.
    pub fn inertia(&self) -> Vec3 {
        self.inertia
    }

    pub fn inv_inertia(&self) -> Vec3 {
        self.inv_inertia
    }

    pub fn inv_inertia_world(&self) -> &Mat3 {
        &self.inv_inertia_world
    }

    /// Change the mass of a dynamic body. Ignored for static and kinematic bodies.
    ///
    /// # Panics
    /// Panics if `mass` is not positive and finite.
    pub fn set_mass(&mut self, mass: f32) {
        assert!(mass > 0.0 && mass.is_finite(), "mass must be positive and finite");
        if self.body_type == BodyType::Dynamic {
            self.mass = mass;
            self.update_mass_properties();
        }
    }

    /// Teleport the body. Also resets the interpolation history.
    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
        self.previous_position = position;
        self.interpolated_position = position;
        self.aabb_needs_update = true;
    }

    /// Recompute inverse mass and inertia from the mass and the attached shapes.
    ///
    /// A single centered shape uses its own inertia; anything else uses the
    /// box inertia of the body's local bounding box.
    pub fn update_mass_properties(&mut self) {
        self.inv_mass = if self.body_type == BodyType::Dynamic && self.mass > 0.0 {
            1.0 / self.mass
        } else {
            0.0
        };

        self.inertia = match self.shapes.as_slice() {
            [] => Vec3::zeros(),
            [slot] if slot.offset == Vec3::zeros() && slot.orientation == Quat::identity() => {
                slot.shape.calculate_local_inertia(self.mass)
            }
            slots => {
                let mut local = Aabb::EMPTY;
                for slot in slots {
                    local.extend(&slot.shape.calculate_world_aabb(&slot.offset, &slot.orientation));
                }
                box_inertia(&local.half_extents(), self.mass)
            }
        };

        let invert = |i: f32| if i > 0.0 && i.is_finite() { 1.0 / i } else { 0.0 };
        self.inv_inertia = if self.fixed_rotation || self.body_type != BodyType::Dynamic {
            Vec3::zeros()
        } else {
            self.inertia.map(invert)
        };
        self.update_inertia_world(true);
    }

    /// Rotate the inverse inertia into world space: `R * I⁻¹ * Rᵀ`.
    ///
    /// Skipped for isotropic inertia unless `force` is set.
    pub fn update_inertia_world(&mut self, force: bool) {
        let i = self.inv_inertia;
        if i.x == i.y && i.y == i.z && !force {
            return;
        }
        let r = self.quaternion.to_rotation_matrix();
        self.inv_inertia_world = r.matrix() * Mat3::from_diagonal(&i) * r.matrix().transpose();
    }

    /// Mass properties seen by the solver; static and sleeping bodies are immovable.
    pub(crate) fn update_solve_mass_properties(&mut self) {
        if self.body_type == BodyType::Static || self.sleep_state == SleepState::Sleeping {
            self.inv_mass_solve = 0.0;
            self.inv_inertia_world_solve = Mat3::zeros();
        } else {
            self.inv_mass_solve = self.inv_mass;
            self.inv_inertia_world_solve = self.inv_inertia_world;
        }
    }

    fn update_bounding_radius(&mut self) {
        self.bounding_radius = self
            .shapes
            .iter()
            .map(|slot| slot.offset.norm() + slot.shape.bounding_sphere_radius())
            .fold(0.0, f32::max);
    }

    /// Radius of a sphere around the body origin enclosing every shape.
    pub fn bounding_radius(&self) -> f32 {
        self.bounding_radius
    }

    /// World AABB of all shapes, recomputed lazily after the body moved.
    pub fn aabb(&mut self) -> Aabb {
        if self.aabb_needs_update {
            self.update_aabb();
        }
        self.aabb
    }

    /// Last computed world AABB, possibly stale.
    pub fn cached_aabb(&self) -> &Aabb {
        &self.aabb
    }

    pub fn aabb_needs_update(&self) -> bool {
        self.aabb_needs_update
    }

    pub fn update_aabb(&mut self) {
        let mut aabb = Aabb::EMPTY;
        for slot in self.shapes.iter() {
            let (pos, quat) = self.shape_world_pose(slot);
            aabb.extend(&slot.shape.calculate_world_aabb(&pos, &quat));
        }
        self.aabb = aabb;
        self.aabb_needs_update = false;
    }

    // -- Forces --

    /// Apply a world-space force at a world-space point. Accumulates until the next step.
    pub fn apply_force(&mut self, force: Vec3, world_point: Vec3) {
        if self.body_type != BodyType::Dynamic {
            return;
        }
        self.force += force;
        self.torque += (world_point - self.position).cross(&force);
    }

    /// Apply a force given in the body frame at a point given in the body frame.
    pub fn apply_local_force(&mut self, local_force: Vec3, local_point: Vec3) {
        let force = self.quaternion * local_force;
        let point = self.position + self.quaternion * local_point;
        self.apply_force(force, point);
    }

    pub fn apply_torque(&mut self, torque: Vec3) {
        if self.body_type == BodyType::Dynamic {
            self.torque += torque;
        }
    }

    /// Apply an instantaneous impulse at a world-space point.
    pub fn apply_impulse(&mut self, impulse: Vec3, world_point: Vec3) {
        if self.body_type != BodyType::Dynamic {
            return;
        }
        self.velocity += impulse.component_mul(&self.linear_factor) * self.inv_mass;
        let r = world_point - self.position;
        let dw = self.inv_inertia_world * r.cross(&impulse);
        self.angular_velocity += dw.component_mul(&self.angular_factor);
    }

    /// Velocity of the body material at a world-space point.
    pub fn point_velocity(&self, world_point: &Vec3) -> Vec3 {
        self.velocity + self.angular_velocity.cross(&(world_point - self.position))
    }

    pub fn point_to_world(&self, local_point: &Vec3) -> Vec3 {
        self.position + self.quaternion * local_point
    }

    pub fn point_to_local(&self, world_point: &Vec3) -> Vec3 {
        self.quaternion.inverse_transform_vector(&(world_point - self.position))
    }

    /// Translational plus rotational kinetic energy.
    pub fn kinetic_energy(&self) -> f32 {
        let w_local = self.quaternion.inverse_transform_vector(&self.angular_velocity);
        0.5 * self.mass * self.velocity.norm_squared() + 0.5 * w_local.dot(&self.inertia.component_mul(&w_local))
    }

    // -- Sleeping --

    pub fn sleep_state(&self) -> SleepState {
        self.sleep_state
    }

    pub fn is_sleeping(&self) -> bool {
        self.sleep_state == SleepState::Sleeping
    }

    /// Wake the body. A [`SleepEvent::WakeUp`] is recorded if it was asleep.
    pub fn wake_up(&mut self) {
        let was = self.sleep_state;
        self.sleep_state = SleepState::Awake;
        self.wake_up_after_narrowphase = false;
        if was == SleepState::Sleeping {
            self.record_sleep_event(SleepEvent::WakeUp);
        }
    }

    /// Put the body to sleep immediately and stop it.
    pub fn sleep(&mut self) {
        self.sleep_state = SleepState::Sleeping;
        self.velocity = Vec3::zeros();
        self.angular_velocity = Vec3::zeros();
        self.wake_up_after_narrowphase = false;
    }

    /// Advance the sleep state machine at simulation time `time` (seconds).
    pub fn sleep_tick(&mut self, time: f32) {
        if !self.allow_sleep {
            return;
        }
        let speed_sq = self.velocity.norm_squared() + self.angular_velocity.norm_squared();
        let limit_sq = self.sleep_speed_limit * self.sleep_speed_limit;
        match self.sleep_state {
            SleepState::Awake if speed_sq < limit_sq => {
                self.sleep_state = SleepState::Sleepy;
                self.time_last_sleepy = time;
                self.record_sleep_event(SleepEvent::Sleepy);
            }
            SleepState::Sleepy if speed_sq > limit_sq => self.wake_up(),
            SleepState::Sleepy if time - self.time_last_sleepy > self.sleep_time_limit => {
                self.sleep();
                self.record_sleep_event(SleepEvent::Sleep);
            }
            _ => {}
        }
    }

    fn record_sleep_event(&mut self, event: SleepEvent) {
        if self.pending.is_full() {
            let dropped = self.pending.remove(0);
            warn!("Sleep events not collected, dropping {:?}", dropped);
        }
        // Room was made above.
        let _ = self.pending.push(event);
    }

    /// Take the sleep transitions recorded since the last call.
    pub fn take_sleep_events(&mut self) -> heapless::Vec<SleepEvent, MAX_PENDING_SLEEP_EVENTS> {
        core::mem::take(&mut self.pending)
    }

    // -- World bookkeeping --

    pub fn handle(&self) -> Option<BodyHandle> {
        self.handle
    }

    pub(crate) fn attach(&mut self, handle: BodyHandle) {
        self.handle = Some(handle);
        self.init_position = self.position;
        self.init_quaternion = self.quaternion;
        self.init_velocity = self.velocity;
        self.init_angular_velocity = self.angular_velocity;
        self.previous_position = self.position;
        self.previous_quaternion = self.quaternion;
        self.interpolated_position = self.position;
        self.interpolated_quaternion = self.quaternion;
        self.aabb_needs_update = true;
    }

    pub(crate) fn detach(&mut self) {
        self.handle = None;
    }

    /// Semi-implicit Euler step of velocity then pose.
    ///
    /// `normalize` is `None` to leave the quaternion as integrated, otherwise
    /// `Some(fast)` to renormalize with the first-order or exact method.
    pub(crate) fn integrate(&mut self, dt: f32, normalize: Option<bool>) {
        let inv_mass = self.inv_mass;
        self.velocity += (self.force * inv_mass * dt).component_mul(&self.linear_factor);
        self.angular_velocity += (self.inv_inertia_world * self.torque * dt).component_mul(&self.angular_factor);

        self.position += self.velocity * dt;

        let q = integrate_quaternion(&self.quaternion, &self.angular_velocity, &self.angular_factor, dt);
        self.quaternion = match normalize {
            Some(true) => Quat::new_unchecked(normalize_fast(q)),
            Some(false) => Quat::new_normalize(q),
            None => Quat::new_unchecked(q),
        };

        self.aabb_needs_update = true;
        self.update_inertia_world(false);
    }

    /// Decay velocities by `(1 - damping)^dt`.
    pub(crate) fn apply_damping(&mut self, dt: f32) {
        self.velocity *= (1.0 - self.linear_damping).powf(dt);
        self.angular_velocity *= (1.0 - self.angular_damping).powf(dt);
    }

    pub(crate) fn clear_forces(&mut self) {
        self.force = Vec3::zeros();
        self.torque = Vec3::zeros();
    }
}

#[cfg(test)]
mod tests {
    extern crate std;
    use super::*;

    const EPSILON: f32 = 1e-4;

    fn approx_eq(a: f32, b: f32) -> bool {
        (a - b).abs() < EPSILON
    }

    fn approx_vec_eq(a: &Vec3, b: &Vec3) -> bool {
        approx_eq(a.x, b.x) && approx_eq(a.y, b.y) && approx_eq(a.z, b.z)
    }

    fn unit_box() -> Shape {
        Shape::cuboid(Vec3::repeat(1.0)).unwrap()
    }

    #[test]
    fn test_body_creation() {
        let body = Body::new(5.0);
        assert_eq!(body.mass(), 5.0);
        assert!(approx_eq(body.inv_mass(), 0.2));
        assert_eq!(body.body_type(), BodyType::Dynamic);
        assert_eq!(body.sleep_state(), SleepState::Awake);
        assert!(approx_vec_eq(&body.position, &Vec3::zeros()));
    }

    #[test]
    fn test_zero_mass_is_static() {
        let body = Body::new(0.0);
        assert_eq!(body.body_type(), BodyType::Static);
        assert_eq!(body.inv_mass(), 0.0);
        assert_eq!(Body::new_kinematic().inv_mass(), 0.0);
    }

    #[test]
    #[should_panic]
    fn test_body_negative_mass_panics() {
        Body::new(-1.0);
    }

    #[test]
    #[should_panic]
    fn test_body_nan_mass_panics() {
        Body::new(f32::NAN);
    }

    #[test]
    fn test_single_centered_shape_inertia() {
        let body = Body::new(1.0).with_shape(unit_box());
        assert!(approx_eq(body.inertia().x, 8.0 / 12.0));
        assert!(approx_eq(body.inv_inertia().y, 12.0 / 8.0));
    }

    #[test]
    fn test_offset_shapes_use_aabb_inertia() {
        let body = Body::new(2.0)
            .with_shape_at(unit_box(), Vec3::new(1.0, 0.0, 0.0), Quat::identity())
            .with_shape_at(unit_box(), Vec3::new(-1.0, 0.0, 0.0), Quat::identity());
        // Combined box is 4 x 2 x 2.
        let expected = box_inertia(&Vec3::new(2.0, 1.0, 1.0), 2.0);
        assert!(approx_vec_eq(&body.inertia(), &expected));
        assert!(approx_eq(body.bounding_radius(), 1.0 + 3.0f32.sqrt()));
    }

    #[test]
    fn test_fixed_rotation_zeroes_inverse_inertia() {
        let body = Body::new(1.0).with_shape(unit_box()).with_fixed_rotation(true);
        assert_eq!(body.inv_inertia(), Vec3::zeros());
        assert_eq!(*body.inv_inertia_world(), Mat3::zeros());
    }

    #[test]
    fn test_remove_shape() {
        let mut body = Body::new(1.0);
        let id = body.add_shape(unit_box(), Vec3::zeros(), Quat::identity());
        assert_eq!(body.shapes().len(), 1);
        assert!(body.remove_shape(id));
        assert!(!body.remove_shape(id));
        assert_eq!(body.bounding_radius(), 0.0);
    }

    #[test]
    fn test_aabb_follows_pose() {
        let mut body = Body::new(1.0)
            .with_shape(unit_box())
            .with_position(Vec3::new(0.0, 5.0, 0.0));
        let aabb = body.aabb();
        assert!(approx_vec_eq(&aabb.lower, &Vec3::new(-1.0, 4.0, -1.0)));
        body.set_position(Vec3::new(3.0, 0.0, 0.0));
        assert!(body.aabb_needs_update());
        assert!(approx_eq(body.aabb().upper.x, 4.0));
    }

    #[test]
    fn test_apply_force_off_center_adds_torque() {
        let mut body = Body::new(1.0);
        body.apply_force(Vec3::new(0.0, 1.0, 0.0), Vec3::new(1.0, 0.0, 0.0));
        assert!(approx_vec_eq(&body.force, &Vec3::new(0.0, 1.0, 0.0)));
        assert!(approx_vec_eq(&body.torque, &Vec3::new(0.0, 0.0, 1.0)));
    }

    #[test]
    fn test_impulse_on_static_body_ignored() {
        let mut body = Body::new_static();
        body.apply_impulse(Vec3::new(10.0, 0.0, 0.0), Vec3::zeros());
        assert_eq!(body.velocity, Vec3::zeros());
    }

    #[test]
    fn test_point_velocity() {
        let body = Body::new(1.0)
            .with_velocity(Vec3::new(1.0, 0.0, 0.0))
            .with_angular_velocity(Vec3::new(0.0, 0.0, 2.0));
        let v = body.point_velocity(&Vec3::new(0.0, 1.0, 0.0));
        assert!(approx_vec_eq(&v, &Vec3::new(-1.0, 0.0, 0.0)));
    }

    #[test]
    fn test_sleep_tick_transitions() {
        let mut body = Body::new(1.0).with_velocity(Vec3::new(0.01, 0.0, 0.0));
        body.sleep_tick(0.0);
        assert_eq!(body.sleep_state(), SleepState::Sleepy);
        body.sleep_tick(0.5);
        assert_eq!(body.sleep_state(), SleepState::Sleepy);
        body.sleep_tick(1.01);
        assert_eq!(body.sleep_state(), SleepState::Sleeping);
        assert_eq!(body.velocity, Vec3::zeros());
        let events = body.take_sleep_events();
        assert_eq!(events.as_slice(), &[SleepEvent::Sleepy, SleepEvent::Sleep]);

        body.wake_up();
        assert_eq!(body.take_sleep_events().as_slice(), &[SleepEvent::WakeUp]);
    }

    #[test]
    fn test_uncollected_sleep_events_keep_the_newest() {
        let mut body = Body::new(1.0);
        for _ in 0..20 {
            body.sleep();
            body.wake_up();
        }
        body.sleep_tick(0.0);
        let events = body.take_sleep_events();
        assert_eq!(events.len(), MAX_PENDING_SLEEP_EVENTS);
        assert_eq!(events.last(), Some(&SleepEvent::Sleepy));
        assert!(events[..events.len() - 1].iter().all(|e| *e == SleepEvent::WakeUp));
        assert!(body.take_sleep_events().is_empty());
    }

    #[test]
    fn test_sleepy_body_wakes_on_speed_spike() {
        let mut body = Body::new(1.0);
        body.sleep_tick(0.0);
        assert_eq!(body.sleep_state(), SleepState::Sleepy);
        body.velocity = Vec3::new(1.0, 0.0, 0.0);
        body.sleep_tick(0.1);
        assert_eq!(body.sleep_state(), SleepState::Awake);
        // Sleepy -> Awake is not a wake-up from sleep.
        assert_eq!(body.take_sleep_events().as_slice(), &[SleepEvent::Sleepy]);
    }

    #[test]
    fn test_integrate_respects_linear_factor() {
        let mut body = Body::new(1.0).with_linear_factor(Vec3::new(1.0, 0.0, 1.0));
        body.force = Vec3::new(1.0, 1.0, 0.0);
        body.integrate(1.0, Some(false));
        assert!(approx_vec_eq(&body.velocity, &Vec3::new(1.0, 0.0, 0.0)));
        assert!(approx_vec_eq(&body.position, &Vec3::new(1.0, 0.0, 0.0)));
    }

    #[test]
    fn test_damping_is_per_second() {
        let mut body = Body::new(1.0).with_velocity(Vec3::new(1.0, 0.0, 0.0)).with_damping(0.5, 0.5);
        body.apply_damping(1.0);
        assert!(approx_eq(body.velocity.x, 0.5));
        body.apply_damping(0.5);
        assert!(approx_eq(body.velocity.x, 0.5 * 0.5f32.sqrt()));
    }
}
