//! The simulation world.
//!
//! A [`World`] owns every body, constraint and contact material and advances
//! them with [`World::step`]. Each internal step runs, in order: gravity,
//! subsystems, broadphase, narrowphase, constraint equations, the solver,
//! damping, integration and finally sleep and contact bookkeeping.
//!
//! # Example
//! ```
//! use embedded_3dphysics::body::Body;
//! use embedded_3dphysics::shape::Shape;
//! use embedded_3dphysics::world::{World, WorldEvent};
//! use nalgebra::Vector3;
//!
//! let mut world = World::new(Vector3::new(0.0, -9.82, 0.0));
//! world.add_body(Body::new_static().with_shape(Shape::plane()));
//! let ball = world.add_body(
//!     Body::new(1.0)
//!         .with_shape(Shape::sphere(0.5).unwrap())
//!         .with_position(Vector3::new(0.0, 3.0, 0.0)),
//! );
//!
//! let mut touched_down = false;
//! for _ in 0..120 {
//!     world.step(1.0 / 60.0, None, 10);
//!     for event in world.drain_events() {
//!         if let WorldEvent::BeginContact { .. } = event {
//!             touched_down = true;
//!         }
//!     }
//! }
//! assert!(touched_down);
//! assert!(world.body(ball).unwrap().position.y < 3.0);
//! ```

use alloc::boxed::Box;
use alloc::collections::VecDeque;
use alloc::vec::Vec;

use log::{debug, trace, warn};

use crate::body::{Body, BodyHandle, BodyType, ShapeId, SleepEvent, SleepState};
use crate::broadphase::{Broadphase, BroadphaseKind, NaiveBroadphase, SapBroadphase};
use crate::constraint::{Constraint, ConstraintId};
use crate::equation::Equation;
use crate::error::{PhysicsError, Result};
use crate::material::{ContactMaterial, ContactMaterialTable, Material};
use crate::math::Vec3;
use crate::narrowphase::{ContactContext, Narrowphase, ShapePairContact};
use crate::overlap::OverlapKeeper;
use crate::raycast::{Ray, RayMode, RayOptions, RaycastResult};
use crate::solver::GsSolver;

/// World-wide simulation settings.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WorldConfig {
    /// Acceleration applied to every dynamic body each step.
    pub gravity: Vec3,
    /// Let slow bodies fall asleep.
    pub allow_sleep: bool,
    /// Renormalize orientations every `quat_normalize_skip + 1` steps.
    pub quat_normalize_skip: u32,
    /// Use the first-order renormalization instead of the exact one.
    pub quat_normalize_fast: bool,
    /// Upper bound on Gauss-Seidel passes per step.
    pub solver_iterations: usize,
    /// The solver stops early once the squared change of all multipliers
    /// in one pass falls below this.
    pub solver_tolerance: f32,
    /// Used for every pair without an entry in the contact-material table.
    pub default_contact_material: ContactMaterial,
    /// Pair finder built by [`World::with_config`].
    pub broadphase: BroadphaseKind,
    /// Most events kept for [`World::drain_events`]. When the queue is full
    /// the oldest event is dropped. Unused while an event handler is set.
    pub event_queue_capacity: usize,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            gravity: Vec3::zeros(),
            allow_sleep: true,
            quat_normalize_skip: 0,
            quat_normalize_fast: false,
            solver_iterations: 10,
            solver_tolerance: 1e-7,
            default_contact_material: ContactMaterial::default(),
            broadphase: BroadphaseKind::Naive,
            event_queue_capacity: 1024,
        }
    }
}

impl WorldConfig {
    pub fn with_gravity(mut self, gravity: Vec3) -> Self {
        self.gravity = gravity;
        self
    }

    pub fn with_allow_sleep(mut self, allow: bool) -> Self {
        self.allow_sleep = allow;
        self
    }

    pub fn with_quat_normalization(mut self, skip: u32, fast: bool) -> Self {
        self.quat_normalize_skip = skip;
        self.quat_normalize_fast = fast;
        self
    }

    pub fn with_solver(mut self, iterations: usize, tolerance: f32) -> Self {
        self.solver_iterations = iterations;
        self.solver_tolerance = tolerance;
        self
    }

    pub fn with_default_contact_material(mut self, material: ContactMaterial) -> Self {
        self.default_contact_material = material;
        self
    }

    pub fn with_broadphase(mut self, kind: BroadphaseKind) -> Self {
        self.broadphase = kind;
        self
    }

    pub fn with_event_queue_capacity(mut self, capacity: usize) -> Self {
        self.event_queue_capacity = capacity;
        self
    }
}

/// Something that happened during a step.
///
/// At the end of every internal step the step's events go to the handler
/// installed with [`World::set_event_handler`], or, without one, into a
/// bounded queue read with [`World::drain_events`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorldEvent {
    /// Two bodies started touching.
    BeginContact { body_a: BodyHandle, body_b: BodyHandle },
    /// Two bodies stopped touching.
    EndContact { body_a: BodyHandle, body_b: BodyHandle },
    BeginShapeContact {
        body_a: BodyHandle,
        body_b: BodyHandle,
        shape_a: ShapeId,
        shape_b: ShapeId,
    },
    EndShapeContact {
        body_a: BodyHandle,
        body_b: BodyHandle,
        shape_a: ShapeId,
        shape_b: ShapeId,
    },
    /// Two bodies are touching in this step. Sent every step they touch.
    Collide { body_a: BodyHandle, body_b: BodyHandle },
    Sleepy(BodyHandle),
    Sleep(BodyHandle),
    WakeUp(BodyHandle),
}

/// Receives every event as soon as its step finishes.
pub type EventHandler = Box<dyn FnMut(&WorldEvent)>;

/// User code run once per internal step, before collision detection.
pub trait Subsystem {
    fn update(&mut self, dt: f32, bodies: &mut [Body]);
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    generation: u32,
    dense: Option<u32>,
}

type ShapeKey = (ShapeId, ShapeId, BodyHandle, BodyHandle);

fn dense_of(entries: &[Entry], handle: BodyHandle) -> Option<usize> {
    let entry = entries.get(handle.index())?;
    if entry.generation != handle.generation {
        return None;
    }
    entry.dense.map(|d| d as usize)
}

fn make_broadphase(kind: BroadphaseKind) -> Box<dyn Broadphase> {
    match kind {
        BroadphaseKind::Naive => Box::new(NaiveBroadphase::new()),
        BroadphaseKind::SweepAndPrune => Box::new(SapBroadphase::new().with_auto_detect_axis(true)),
    }
}

pub struct World {
    config: WorldConfig,
    bodies: Vec<Body>,
    handles: Vec<BodyHandle>,
    entries: Vec<Entry>,
    free: Vec<u32>,

    constraints: Vec<(ConstraintId, Constraint)>,
    next_constraint_id: u32,
    contact_materials: ContactMaterialTable,
    subsystems: Vec<Box<dyn Subsystem>>,

    broadphase: Box<dyn Broadphase>,
    narrowphase: Narrowphase,
    solver: GsSolver,

    time: f32,
    accumulator: f32,
    step_number: u64,
    events: Vec<WorldEvent>,
    event_queue: VecDeque<WorldEvent>,
    event_handler: Option<EventHandler>,
    event_overflow_warned: bool,

    // Per-step buffers, cleared and refilled every step.
    pairs: Vec<(usize, usize)>,
    excluded: Vec<(usize, usize)>,
    touching: Vec<(usize, usize)>,
    equations: Vec<Equation>,
    shape_contacts: Vec<ShapePairContact>,
    body_overlaps: OverlapKeeper<(BodyHandle, BodyHandle)>,
    shape_overlaps: OverlapKeeper<ShapeKey>,
    began: Vec<(BodyHandle, BodyHandle)>,
    ended: Vec<(BodyHandle, BodyHandle)>,
    shapes_began: Vec<ShapeKey>,
    shapes_ended: Vec<ShapeKey>,
    candidates: Vec<usize>,
}

impl Default for World {
    fn default() -> Self {
        Self::with_config(WorldConfig::default())
    }
}

impl World {
    /// Create an empty world with the given gravity and default settings.
    pub fn new(gravity: Vec3) -> Self {
        Self::with_config(WorldConfig::default().with_gravity(gravity))
    }

    pub fn with_config(config: WorldConfig) -> Self {
        Self {
            broadphase: make_broadphase(config.broadphase),
            solver: GsSolver::new(config.solver_iterations, config.solver_tolerance),
            config,
            bodies: Vec::new(),
            handles: Vec::new(),
            entries: Vec::new(),
            free: Vec::new(),
            constraints: Vec::new(),
            next_constraint_id: 0,
            contact_materials: ContactMaterialTable::new(),
            subsystems: Vec::new(),
            narrowphase: Narrowphase::new(),
            time: 0.0,
            accumulator: 0.0,
            step_number: 0,
            events: Vec::new(),
            event_queue: VecDeque::new(),
            event_handler: None,
            event_overflow_warned: false,
            pairs: Vec::new(),
            excluded: Vec::new(),
            touching: Vec::new(),
            equations: Vec::new(),
            shape_contacts: Vec::new(),
            body_overlaps: OverlapKeeper::default(),
            shape_overlaps: OverlapKeeper::default(),
            began: Vec::new(),
            ended: Vec::new(),
            shapes_began: Vec::new(),
            shapes_ended: Vec::new(),
            candidates: Vec::new(),
        }
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    pub fn gravity(&self) -> Vec3 {
        self.config.gravity
    }

    pub fn set_gravity(&mut self, gravity: Vec3) {
        self.config.gravity = gravity;
    }

    pub fn set_allow_sleep(&mut self, allow: bool) {
        self.config.allow_sleep = allow;
    }

    /// Simulated time in seconds.
    pub fn time(&self) -> f32 {
        self.time
    }

    /// Number of internal steps taken so far.
    pub fn step_number(&self) -> u64 {
        self.step_number
    }

    pub fn solver(&self) -> &GsSolver {
        &self.solver
    }

    pub fn solver_mut(&mut self) -> &mut GsSolver {
        &mut self.solver
    }

    /// Replace the broadphase. Pair results are identical across the built-in
    /// ones; only their cost differs.
    pub fn set_broadphase<B: Broadphase + 'static>(&mut self, broadphase: B) {
        self.broadphase = Box::new(broadphase);
    }

    // -- Bodies --

    /// Add a body and return its handle.
    pub fn add_body(&mut self, mut body: Body) -> BodyHandle {
        let dense = self.bodies.len() as u32;
        let handle = match self.free.pop() {
            Some(index) => {
                let entry = &mut self.entries[index as usize];
                entry.dense = Some(dense);
                BodyHandle {
                    index,
                    generation: entry.generation,
                }
            }
            None => {
                self.entries.push(Entry {
                    generation: 0,
                    dense: Some(dense),
                });
                BodyHandle {
                    index: (self.entries.len() - 1) as u32,
                    generation: 0,
                }
            }
        };
        body.attach(handle);
        self.bodies.push(body);
        self.handles.push(handle);
        debug!("World: added body {:?} ({} bodies)", handle, self.bodies.len());
        handle
    }

    /// Remove a body and hand it back. Constraints attached to it are removed
    /// too. Returns `None` for a stale handle.
    pub fn remove_body(&mut self, handle: BodyHandle) -> Option<Body> {
        let dense = dense_of(&self.entries, handle)?;
        let mut body = self.bodies.swap_remove(dense);
        self.handles.swap_remove(dense);
        if let Some(moved) = self.handles.get(dense) {
            self.entries[moved.index()].dense = Some(dense as u32);
        }

        let entry = &mut self.entries[handle.index()];
        entry.dense = None;
        entry.generation = entry.generation.wrapping_add(1);
        self.free.push(handle.index);

        let before = self.constraints.len();
        self.constraints.retain(|(_, c)| !c.involves(handle));
        self.body_overlaps.retain(|&(a, b)| a != handle && b != handle);
        self.shape_overlaps.retain(|&(_, _, a, b)| a != handle && b != handle);

        body.detach();
        debug!(
            "World: removed body {:?} and {} constraints ({} bodies)",
            handle,
            before - self.constraints.len(),
            self.bodies.len()
        );
        Some(body)
    }

    pub fn contains(&self, handle: BodyHandle) -> bool {
        dense_of(&self.entries, handle).is_some()
    }

    pub fn body(&self, handle: BodyHandle) -> Option<&Body> {
        dense_of(&self.entries, handle).map(|d| &self.bodies[d])
    }

    pub fn body_mut(&mut self, handle: BodyHandle) -> Option<&mut Body> {
        dense_of(&self.entries, handle).map(move |d| &mut self.bodies[d])
    }

    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    pub fn bodies(&self) -> impl Iterator<Item = (BodyHandle, &Body)> {
        self.handles.iter().copied().zip(self.bodies.iter())
    }

    pub fn bodies_mut(&mut self) -> impl Iterator<Item = (BodyHandle, &mut Body)> {
        self.handles.iter().copied().zip(self.bodies.iter_mut())
    }

    /// Handle of the body at a dense index, as used by [`Equation::bi`] and
    /// [`Equation::bj`]. Dense indices change when bodies are removed.
    pub fn handle_at(&self, dense: usize) -> Option<BodyHandle> {
        self.handles.get(dense).copied()
    }

    // -- Constraints --

    pub fn add_constraint(&mut self, constraint: Constraint) -> Result<ConstraintId> {
        for handle in [constraint.body_a, constraint.body_b] {
            if !self.contains(handle) {
                return Err(PhysicsError::UnknownBody(handle));
            }
        }
        let id = ConstraintId(self.next_constraint_id);
        self.next_constraint_id += 1;
        self.constraints.push((id, constraint));
        Ok(id)
    }

    pub fn remove_constraint(&mut self, id: ConstraintId) -> Option<Constraint> {
        let pos = self.constraints.iter().position(|(cid, _)| *cid == id)?;
        Some(self.constraints.remove(pos).1)
    }

    pub fn constraint(&self, id: ConstraintId) -> Option<&Constraint> {
        self.constraints.iter().find(|(cid, _)| *cid == id).map(|(_, c)| c)
    }

    pub fn constraint_count(&self) -> usize {
        self.constraints.len()
    }

    // -- Materials and subsystems --

    pub fn add_contact_material(&mut self, material: ContactMaterial) {
        self.contact_materials.insert(material);
    }

    pub fn get_contact_material(&self, a: &Material, b: &Material) -> Option<&ContactMaterial> {
        self.contact_materials.get(a.id(), b.id())
    }

    pub fn contact_materials(&self) -> &ContactMaterialTable {
        &self.contact_materials
    }

    pub fn add_subsystem<S: Subsystem + 'static>(&mut self, subsystem: S) {
        self.subsystems.push(Box::new(subsystem));
    }

    // -- Results --

    /// Equations built in the last step: contacts, their friction rows and
    /// constraint rows, with the solved multipliers.
    pub fn contacts(&self) -> &[Equation] {
        &self.equations
    }

    /// Take every event queued since the last call, oldest first.
    pub fn drain_events(&mut self) -> impl Iterator<Item = WorldEvent> + '_ {
        self.event_overflow_warned = false;
        self.event_queue.drain(..)
    }

    /// Number of events waiting in the queue.
    pub fn queued_events(&self) -> usize {
        self.event_queue.len()
    }

    /// Send events to `handler` at the end of each internal step instead of
    /// queueing them. Events already queued stay queued.
    pub fn set_event_handler<H>(&mut self, handler: H)
    where
        H: FnMut(&WorldEvent) + 'static,
    {
        self.event_handler = Some(Box::new(handler));
    }

    /// Remove the handler, returning to the queue.
    pub fn clear_event_handler(&mut self) -> Option<EventHandler> {
        self.event_handler.take()
    }

    // -- Stepping --

    /// Advance the simulation.
    ///
    /// Without `elapsed`, exactly one step of `dt` is taken. With `elapsed`
    /// (wall time since the last call), fixed steps of `dt` are taken until
    /// the accumulated time is used up, at most `max_sub_steps` of them, and
    /// every body's interpolated pose is set between its last two states.
    ///
    /// A `dt` that is not a positive finite number leaves the world as is.
    pub fn step(&mut self, dt: f32, elapsed: Option<f32>, max_sub_steps: u32) {
        if !(dt.is_finite() && dt > 0.0) {
            warn!("Ignoring step with invalid dt {}", dt);
            return;
        }
        if elapsed.is_some_and(|e| !(e.is_finite() && e >= 0.0)) {
            warn!("Ignoring step with invalid elapsed time {:?}", elapsed);
            return;
        }
        let Some(elapsed) = elapsed else {
            self.internal_step(dt);
            for body in self.bodies.iter_mut() {
                body.interpolated_position = body.position;
                body.interpolated_quaternion = body.quaternion;
            }
            return;
        };

        self.accumulator += elapsed;
        let mut substeps = 0;
        while self.accumulator >= dt && substeps < max_sub_steps {
            self.internal_step(dt);
            self.accumulator -= dt;
            substeps += 1;
        }
        self.accumulator %= dt;

        let t = self.accumulator / dt;
        for body in self.bodies.iter_mut() {
            body.interpolated_position = body.previous_position.lerp(&body.position, t);
            body.interpolated_quaternion = body
                .previous_quaternion
                .try_slerp(&body.quaternion, t, 1e-6)
                .unwrap_or(body.quaternion);
        }
    }

    fn internal_step(&mut self, dt: f32) {
        let gravity = self.config.gravity;
        for body in self.bodies.iter_mut() {
            body.previous_position = body.position;
            body.previous_quaternion = body.quaternion;
            if body.body_type() == BodyType::Dynamic {
                body.force += gravity * body.mass();
            }
        }

        for subsystem in self.subsystems.iter_mut() {
            subsystem.update(dt, &mut self.bodies);
        }

        self.broadphase.collision_pairs(&mut self.bodies, &mut self.pairs);
        self.remove_connected_pairs();

        self.detect_contacts(dt);
        self.wake_touched_sleepers();

        for (_, constraint) in self.constraints.iter() {
            let ia = dense_of(&self.entries, constraint.body_a);
            let ib = dense_of(&self.entries, constraint.body_b);
            if let (Some(ia), Some(ib)) = (ia, ib) {
                constraint.build_equations(ia, ib, &self.bodies, dt, &mut self.equations);
            }
        }

        for body in self.bodies.iter_mut() {
            body.update_solve_mass_properties();
        }
        let passes = self.solver.solve(dt, &mut self.bodies, &mut self.equations);

        let normalize = if self.step_number % (u64::from(self.config.quat_normalize_skip) + 1) == 0 {
            Some(self.config.quat_normalize_fast)
        } else {
            None
        };
        for body in self.bodies.iter_mut() {
            if body.body_type() == BodyType::Dynamic {
                body.apply_damping(dt);
            }
            if body.body_type() != BodyType::Static && !body.is_sleeping() {
                body.integrate(dt, normalize);
            }
            body.clear_forces();
        }

        self.time += dt;
        self.step_number += 1;

        if self.config.allow_sleep {
            for body in self.bodies.iter_mut() {
                if body.body_type() == BodyType::Dynamic {
                    body.sleep_tick(self.time);
                }
            }
        }
        self.emit_events();
        self.dispatch_events();

        trace!(
            "World step {}: {} pairs, {} touching, {} equations, {} solver passes",
            self.step_number,
            self.pairs.len(),
            self.touching.len(),
            self.equations.len(),
            passes
        );
    }

    /// Drop pairs joined by a constraint that disables their collisions.
    fn remove_connected_pairs(&mut self) {
        self.excluded.clear();
        for (_, c) in self.constraints.iter().filter(|(_, c)| !c.collide_connected) {
            if let (Some(a), Some(b)) = (dense_of(&self.entries, c.body_a), dense_of(&self.entries, c.body_b)) {
                self.excluded.push((a.min(b), a.max(b)));
            }
        }
        if !self.excluded.is_empty() {
            let excluded = &self.excluded;
            self.pairs.retain(|pair| !excluded.contains(pair));
        }
    }

    fn detect_contacts(&mut self, dt: f32) {
        self.equations.clear();
        self.shape_contacts.clear();
        self.touching.clear();
        self.body_overlaps.tick();
        self.shape_overlaps.tick();

        let ctx = ContactContext {
            table: &self.contact_materials,
            default_material: &self.config.default_contact_material,
            dt,
        };
        for &(ia, ib) in self.pairs.iter() {
            if self
                .narrowphase
                .collide_pair(ia, ib, &self.bodies, &ctx, &mut self.equations, &mut self.shape_contacts)
            {
                self.touching.push((ia, ib));
            }
        }

        for &(ia, ib) in self.touching.iter() {
            let (ha, hb) = (self.handles[ia], self.handles[ib]);
            self.body_overlaps.set((ha.min(hb), ha.max(hb)));
            self.events.push(WorldEvent::Collide { body_a: ha, body_b: hb });
        }
        for c in self.shape_contacts.iter() {
            let (ha, hb) = (self.handles[c.body_a], self.handles[c.body_b]);
            let key = if c.shape_a <= c.shape_b {
                (c.shape_a, c.shape_b, ha, hb)
            } else {
                (c.shape_b, c.shape_a, hb, ha)
            };
            self.shape_overlaps.set(key);
        }
    }

    /// A sleeping body hit by an awake, fast enough partner wakes up.
    fn wake_touched_sleepers(&mut self) {
        for &(ia, ib) in self.touching.iter() {
            for (me, other) in [(ia, ib), (ib, ia)] {
                let partner = &self.bodies[other];
                let limit_sq = partner.sleep_speed_limit * partner.sleep_speed_limit;
                let speed_sq = partner.velocity.norm_squared() + partner.angular_velocity.norm_squared();
                let pushes = partner.sleep_state() == SleepState::Awake
                    && partner.body_type() != BodyType::Static
                    && speed_sq >= 2.0 * limit_sq;

                let body = &mut self.bodies[me];
                if pushes && body.allow_sleep && body.body_type() == BodyType::Dynamic && body.is_sleeping() {
                    body.wake_up_after_narrowphase = true;
                }
            }
        }
        for body in self.bodies.iter_mut() {
            if body.wake_up_after_narrowphase {
                body.wake_up();
            }
        }
    }

    fn emit_events(&mut self) {
        for (body, &handle) in self.bodies.iter_mut().zip(self.handles.iter()) {
            for event in body.take_sleep_events() {
                self.events.push(match event {
                    SleepEvent::Sleepy => WorldEvent::Sleepy(handle),
                    SleepEvent::Sleep => WorldEvent::Sleep(handle),
                    SleepEvent::WakeUp => WorldEvent::WakeUp(handle),
                });
            }
        }

        self.body_overlaps.diff(&mut self.began, &mut self.ended);
        for &(body_a, body_b) in self.began.iter() {
            self.events.push(WorldEvent::BeginContact { body_a, body_b });
        }
        for &(body_a, body_b) in self.ended.iter() {
            self.events.push(WorldEvent::EndContact { body_a, body_b });
        }

        self.shape_overlaps.diff(&mut self.shapes_began, &mut self.shapes_ended);
        for &(shape_a, shape_b, body_a, body_b) in self.shapes_began.iter() {
            self.events.push(WorldEvent::BeginShapeContact {
                body_a,
                body_b,
                shape_a,
                shape_b,
            });
        }
        for &(shape_a, shape_b, body_a, body_b) in self.shapes_ended.iter() {
            self.events.push(WorldEvent::EndShapeContact {
                body_a,
                body_b,
                shape_a,
                shape_b,
            });
        }
    }

    /// Hand this step's events to the handler, or queue them.
    fn dispatch_events(&mut self) {
        if let Some(handler) = self.event_handler.as_mut() {
            for event in self.events.iter() {
                handler(event);
            }
            self.events.clear();
            return;
        }

        let capacity = self.config.event_queue_capacity;
        for event in self.events.drain(..) {
            if capacity == 0 {
                break;
            }
            if self.event_queue.len() >= capacity {
                self.event_queue.pop_front();
                if !self.event_overflow_warned {
                    warn!("Event queue full at {} events, dropping the oldest", capacity);
                    self.event_overflow_warned = true;
                }
            }
            self.event_queue.push_back(event);
        }
    }

    // -- Ray casting --

    /// Nearest hit along `from..to`. Returns whether anything was hit.
    pub fn raycast_closest(&mut self, from: Vec3, to: Vec3, options: &RayOptions, result: &mut RaycastResult) -> bool {
        *result = self.raycast(from, to, RayMode::Closest, options, &mut |_: &RaycastResult| {});
        result.has_hit
    }

    /// Any hit along `from..to`, stopping at the first one found.
    pub fn raycast_any(&mut self, from: Vec3, to: Vec3, options: &RayOptions, result: &mut RaycastResult) -> bool {
        *result = self.raycast(from, to, RayMode::Any, options, &mut |_: &RaycastResult| {});
        result.has_hit
    }

    /// Call `on_hit` for every surface crossing along `from..to`.
    pub fn raycast_all<F: FnMut(&RaycastResult)>(
        &mut self,
        from: Vec3,
        to: Vec3,
        options: &RayOptions,
        mut on_hit: F,
    ) -> bool {
        self.raycast(from, to, RayMode::All, options, &mut on_hit).has_hit
    }

    fn raycast<F: FnMut(&RaycastResult)>(
        &mut self,
        from: Vec3,
        to: Vec3,
        mode: RayMode,
        options: &RayOptions,
        on_hit: &mut F,
    ) -> RaycastResult {
        let mut ray = Ray::new(from, to, mode, *options);
        self.candidates.clear();
        self.broadphase.aabb_query(&mut self.bodies, &ray.aabb(), &mut self.candidates);
        for &i in self.candidates.iter() {
            ray.intersect_body(&self.bodies[i], on_hit);
            if ray.is_terminated() {
                break;
            }
        }
        ray.result
    }
}
