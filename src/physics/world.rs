//! Physics simulation using rapier3d

use std::sync::Mutex;

use glam::{Quat, Vec3};
use rapier3d::na::{Quaternion, Translation3, UnitQuaternion};
use rapier3d::prelude::*;

/// Handle to a rigid body in the physics world
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RigidBodyHandle(pub rapier3d::dynamics::RigidBodyHandle);

/// Handle to a collider in the physics world
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ColliderHandle(pub rapier3d::geometry::ColliderHandle);

/// Convert glam Quat to rapier3d UnitQuaternion
pub(crate) fn quat_to_rapier(q: Quat) -> UnitQuaternion<f32> {
    UnitQuaternion::from_quaternion(Quaternion::new(q.w, q.x, q.y, q.z))
}

/// Convert rapier3d UnitQuaternion to glam Quat
fn rapier_to_quat(uq: &UnitQuaternion<f32>) -> Quat {
    let q = uq.quaternion();
    Quat::from_xyzw(q.i, q.j, q.k, q.w)
}

/// Build an isometry from a glam pose
pub(crate) fn isometry(position: Vec3, rotation: Quat) -> Isometry<f32> {
    Isometry::from_parts(
        Translation3::new(position.x, position.y, position.z),
        quat_to_rapier(rotation),
    )
}

/// Collects collision events raised during a step
#[derive(Default)]
struct EventCollector {
    events: Mutex<Vec<CollisionEvent>>,
}

impl EventHandler for EventCollector {
    fn handle_collision_event(
        &self,
        _bodies: &RigidBodySet,
        _colliders: &ColliderSet,
        event: CollisionEvent,
        _contact_pair: Option<&ContactPair>,
    ) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }

    fn handle_contact_force_event(
        &self,
        _dt: Real,
        _bodies: &RigidBodySet,
        _colliders: &ColliderSet,
        _contact_pair: &ContactPair,
        _total_force_magnitude: Real,
    ) {
    }
}

/// Rapier world plus the collision events of the steps not yet drained
pub struct Physics {
    pub gravity: Vec3,
    pipeline: PhysicsPipeline,
    islands: IslandManager,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    bodies: RigidBodySet,
    colliders: ColliderSet,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd: CCDSolver,
    queries: QueryPipeline,
    params: IntegrationParameters,
    collector: EventCollector,
}

impl Physics {
    /// World with earth gravity
    pub fn new() -> Self {
        Self::with_gravity(Vec3::new(0.0, -9.81, 0.0))
    }

    pub fn with_gravity(gravity: Vec3) -> Self {
        Self {
            gravity,
            pipeline: PhysicsPipeline::new(),
            islands: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd: CCDSolver::new(),
            queries: QueryPipeline::new(),
            params: IntegrationParameters::default(),
            collector: EventCollector::default(),
        }
    }

    /// Advance by one step of `dt` seconds
    pub fn step(&mut self, dt: f32) {
        self.params.dt = dt;

        self.pipeline.step(
            &vector![self.gravity.x, self.gravity.y, self.gravity.z],
            &self.params,
            &mut self.islands,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            &mut self.ccd,
            Some(&mut self.queries),
            &(),
            &self.collector,
        );
    }

    /// Take the collision events raised since the last drain
    pub fn drain_events(&mut self) -> Vec<CollisionEvent> {
        self.collector
            .events
            .get_mut()
            .map(std::mem::take)
            .unwrap_or_default()
    }

    /// Insert a body with one attached collider
    pub fn insert(&mut self, body: RigidBody, collider: Collider) -> (RigidBodyHandle, ColliderHandle) {
        let body = self.bodies.insert(body);
        let collider = self
            .colliders
            .insert_with_parent(collider, body, &mut self.bodies);
        (RigidBodyHandle(body), ColliderHandle(collider))
    }

    /// Remove a rigid body and its colliders
    pub fn remove_body(&mut self, body: RigidBodyHandle) {
        self.bodies.remove(
            body.0,
            &mut self.islands,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            true,
        );
    }

    /// Number of bodies in the world
    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    /// Body a collider is attached to
    pub fn collider_parent(&self, collider: ColliderHandle) -> Option<RigidBodyHandle> {
        self.colliders
            .get(collider.0)
            .and_then(Collider::parent)
            .map(RigidBodyHandle)
    }

    /// Get the position of a rigid body
    pub fn get_position(&self, body: RigidBodyHandle) -> Option<Vec3> {
        self.bodies.get(body.0).map(|rb| {
            let pos = rb.translation();
            Vec3::new(pos.x, pos.y, pos.z)
        })
    }

    /// Get the rotation of a rigid body
    pub fn get_rotation(&self, body: RigidBodyHandle) -> Option<Quat> {
        self.bodies
            .get(body.0)
            .map(|rb| rapier_to_quat(rb.rotation()))
    }

    /// Move a body to a pose. Kinematic bodies get it as their next target,
    /// every other kind is teleported.
    pub fn set_pose(&mut self, body: RigidBodyHandle, position: Vec3, rotation: Quat) {
        if let Some(rb) = self.bodies.get_mut(body.0) {
            let pose = isometry(position, rotation);
            if rb.is_kinematic() {
                rb.set_next_kinematic_position(pose);
            } else {
                rb.set_position(pose, true);
            }
        }
    }

    /// Apply an impulse to a dynamic body
    pub fn apply_impulse(&mut self, body: RigidBodyHandle, impulse: Vec3) {
        if let Some(rb) = self.bodies.get_mut(body.0) {
            rb.apply_impulse(vector![impulse.x, impulse.y, impulse.z], true);
        }
    }

    /// Set the linear velocity of a body
    pub fn set_linear_velocity(&mut self, body: RigidBodyHandle, velocity: Vec3) {
        if let Some(rb) = self.bodies.get_mut(body.0) {
            rb.set_linvel(vector![velocity.x, velocity.y, velocity.z], true);
        }
    }

    /// Get the linear velocity of a body
    pub fn get_linear_velocity(&self, body: RigidBodyHandle) -> Option<Vec3> {
        self.bodies.get(body.0).map(|rb| {
            let vel = rb.linvel();
            Vec3::new(vel.x, vel.y, vel.z)
        })
    }
}

impl Default for Physics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ball(y: f32) -> (RigidBody, Collider) {
        (
            RigidBodyBuilder::dynamic()
                .position(isometry(Vec3::new(0.0, y, 0.0), Quat::IDENTITY))
                .build(),
            ColliderBuilder::ball(0.5)
                .active_events(ActiveEvents::COLLISION_EVENTS)
                .build(),
        )
    }

    #[test]
    fn test_dynamic_body_falls() {
        let mut physics = Physics::new();
        let (body, collider) = ball(10.0);
        let (handle, _) = physics.insert(body, collider);

        for _ in 0..30 {
            physics.step(1.0 / 60.0);
        }
        assert!(physics.get_position(handle).unwrap().y < 10.0);
        assert!(physics.get_linear_velocity(handle).unwrap().y < 0.0);
    }

    #[test]
    fn test_contact_events_collected() {
        let mut physics = Physics::new();
        let floor = RigidBodyBuilder::fixed().build();
        let floor_collider = ColliderBuilder::cuboid(10.0, 0.1, 10.0).build();
        physics.insert(floor, floor_collider);
        let (body, collider) = ball(1.0);
        physics.insert(body, collider);

        let mut started = 0;
        for _ in 0..120 {
            physics.step(1.0 / 60.0);
            started += physics.drain_events().iter().filter(|e| e.started()).count();
        }
        assert!(started >= 1);
        assert!(physics.drain_events().is_empty());
    }

    #[test]
    fn test_remove_body() {
        let mut physics = Physics::new();
        let (body, collider) = ball(0.0);
        let (handle, collider) = physics.insert(body, collider);
        assert_eq!(physics.collider_parent(collider), Some(handle));

        physics.remove_body(handle);
        assert_eq!(physics.body_count(), 0);
        assert!(physics.get_position(handle).is_none());
        assert!(physics.collider_parent(collider).is_none());
    }

    #[test]
    fn test_set_pose_teleports() {
        let mut physics = Physics::with_gravity(Vec3::ZERO);
        let (body, collider) = ball(0.0);
        let (handle, _) = physics.insert(body, collider);
        physics.set_pose(handle, Vec3::new(3.0, 0.0, 0.0), Quat::IDENTITY);
        assert_eq!(physics.get_position(handle), Some(Vec3::new(3.0, 0.0, 0.0)));
    }
}
