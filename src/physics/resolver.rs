//! Keeps simulation bodies in step with the resolved scene
//!
//! Every node with a Physics component (outside disabled subtrees) owns one
//! body. Bodies are keyed by node id; collider handles are mapped back to node
//! ids so that simulation callbacks can be republished as contact events.
//! A node that disappears from the scene loses its body and its table entries
//! in the same sync.

use std::sync::Arc;

use glam::{Mat4, Quat, Vec3};
use rapier3d::prelude::CollisionEvent;
use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;

use super::descriptor::BodyDescriptor;
use super::error::PhysicsError;
use super::world::{ColliderHandle, Physics, RigidBodyHandle};
use crate::components::{BodyKind, ResolvedNode, ResolvedScene};
use crate::events::{
    CollisionEnter, CollisionExit, ContactEvent, EventBus, EventKind, SensorEnter, SensorExit,
};

/// Instanced bodies sharing a parent, model file and body kind
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BatchKey {
    pub parent_id: String,
    pub filename: String,
    pub kind: BodyKind,
}

struct BodyEntry {
    body: RigidBodyHandle,
    collider: ColliderHandle,
    descriptor: BodyDescriptor,
    batch: Option<BatchKey>,
}

/// What a sync changed, by node id
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub added: Vec<String>,
    /// Body recreated because its properties or shape changed
    pub rebuilt: Vec<String>,
    /// Body moved to a new authored pose
    pub moved: Vec<String>,
    pub removed: Vec<String>,
}

impl SyncReport {
    /// Check if nothing changed
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty()
            && self.rebuilt.is_empty()
            && self.moved.is_empty()
            && self.removed.is_empty()
    }
}

struct Desired {
    id: String,
    descriptor: BodyDescriptor,
    batch: Option<BatchKey>,
    has_geometry: bool,
}

enum Action {
    Keep,
    Move,
    Rebuild,
    Add,
}

/// Owns the simulation world and the node id tables around it
pub struct PhysicsResolver {
    physics: Physics,
    bodies: FxHashMap<String, BodyEntry>,
    colliders: FxHashMap<ColliderHandle, String>,
    batches: FxHashMap<BatchKey, Vec<String>>,
}

impl PhysicsResolver {
    /// Wrap a simulation world
    #[must_use]
    pub fn new(physics: Physics) -> Self {
        Self {
            physics,
            bodies: FxHashMap::default(),
            colliders: FxHashMap::default(),
            batches: FxHashMap::default(),
        }
    }

    /// The simulation world
    #[must_use]
    pub fn physics(&self) -> &Physics {
        &self.physics
    }

    /// Bring bodies in line with a resolved scene
    pub fn sync(&mut self, scene: &ResolvedScene) -> SyncReport {
        let mut desired = Vec::new();
        collect(&scene.root, None, Mat4::IDENTITY, &mut desired);

        let mut report = SyncReport::default();
        let mut seen = FxHashSet::default();
        for want in desired {
            seen.insert(want.id.clone());
            let action = match self.bodies.get(&want.id) {
                None => Action::Add,
                Some(entry) if entry.batch != want.batch => Action::Rebuild,
                Some(entry) if entry.descriptor == want.descriptor => Action::Keep,
                Some(entry) if entry.descriptor.same_body(&want.descriptor) => Action::Move,
                Some(_) => Action::Rebuild,
            };

            match action {
                Action::Keep => {}
                Action::Move => {
                    if let Some(entry) = self.bodies.get_mut(&want.id) {
                        let d = &want.descriptor;
                        self.physics.set_pose(entry.body, d.position, d.rotation);
                        entry.descriptor = want.descriptor;
                    }
                    report.moved.push(want.id);
                }
                Action::Rebuild => {
                    self.remove_body(&want.id);
                    report.rebuilt.push(want.id.clone());
                    self.insert_body(want);
                }
                Action::Add => {
                    report.added.push(want.id.clone());
                    self.insert_body(want);
                }
            }
        }

        let stale: Vec<String> = self
            .bodies
            .keys()
            .filter(|id| !seen.contains(*id))
            .cloned()
            .collect();
        for id in stale {
            self.remove_body(&id);
            report.removed.push(id);
        }

        self.batches.clear();
        for (id, entry) in &self.bodies {
            if let Some(key) = &entry.batch {
                self.batches.entry(key.clone()).or_default().push(id.clone());
            }
        }
        for ids in self.batches.values_mut() {
            ids.sort_unstable();
        }

        if !report.is_empty() {
            log::debug!(
                "Physics sync: {} added, {} rebuilt, {} moved, {} removed",
                report.added.len(),
                report.rebuilt.len(),
                report.moved.len(),
                report.removed.len()
            );
        }
        report
    }

    fn insert_body(&mut self, want: Desired) {
        if !want.has_geometry {
            log::warn!("Node '{}' has no usable geometry, using a unit cube collider", want.id);
        }
        let (body, collider) = self
            .physics
            .insert(want.descriptor.rigid_body(), want.descriptor.collider());
        self.colliders.insert(collider, want.id.clone());
        self.bodies.insert(
            want.id,
            BodyEntry {
                body,
                collider,
                descriptor: want.descriptor,
                batch: want.batch,
            },
        );
    }

    fn remove_body(&mut self, id: &str) -> bool {
        let Some(entry) = self.bodies.remove(id) else {
            return false;
        };
        self.colliders.remove(&entry.collider);
        self.physics.remove_body(entry.body);
        true
    }

    /// Advance the simulation
    pub fn step(&mut self, dt: f32) {
        self.physics.step(dt);
    }

    /// Translate pending simulation callbacks into named contact events
    pub fn drain_contacts(&mut self) -> Vec<(&'static str, ContactEvent)> {
        let mut out = Vec::new();
        for event in self.physics.drain_events() {
            out.extend(self.translate(&event));
        }
        out
    }

    /// Publish pending contacts on the bus; returns the number of events
    pub fn dispatch(&mut self, bus: &EventBus) -> usize {
        let contacts = self.drain_contacts();
        for (name, payload) in &contacts {
            bus.emit(name, payload);
        }
        contacts.len()
    }

    fn translate(&self, event: &CollisionEvent) -> SmallVec<[(&'static str, ContactEvent); 2]> {
        let mut out = SmallVec::new();
        let a = ColliderHandle(event.collider1());
        let b = ColliderHandle(event.collider2());
        let (Some((a_id, a_entry)), Some((b_id, b_entry))) = (self.entry_of(a), self.entry_of(b)) else {
            log::debug!("Dropping contact for a collider that is no longer tracked");
            return out;
        };

        let sides = [(a_id, a_entry, b_id, b_entry), (b_id, b_entry, a_id, a_entry)];
        if event.sensor() {
            let name = if event.started() {
                SensorEnter::NAME
            } else {
                SensorExit::NAME
            };
            for (source, source_entry, target, target_entry) in sides {
                if source_entry.descriptor.props.sensor {
                    out.push((name, contact(source, target, target_entry)));
                }
            }
        } else {
            let name = if event.started() {
                CollisionEnter::NAME
            } else {
                CollisionExit::NAME
            };
            for (source, source_entry, target, target_entry) in sides {
                if source_entry.descriptor.kind() != BodyKind::Fixed {
                    out.push((name, contact(source, target, target_entry)));
                }
            }
        }
        out
    }

    fn entry_of(&self, collider: ColliderHandle) -> Option<(&str, &BodyEntry)> {
        let id = self.colliders.get(&collider)?;
        self.bodies.get(id).map(|entry| (id.as_str(), entry))
    }

    fn addressable(&self, node_id: &str) -> Result<&BodyEntry, PhysicsError> {
        let entry = self
            .bodies
            .get(node_id)
            .ok_or_else(|| PhysicsError::NoBody(node_id.to_string()))?;
        if entry.batch.is_some() {
            return Err(PhysicsError::InstancedBody(node_id.to_string()));
        }
        Ok(entry)
    }

    /// Body of a node
    pub fn body_handle(&self, node_id: &str) -> Result<RigidBodyHandle, PhysicsError> {
        self.addressable(node_id).map(|entry| entry.body)
    }

    /// Apply an impulse to a node's body
    pub fn apply_impulse(&mut self, node_id: &str, impulse: Vec3) -> Result<(), PhysicsError> {
        let body = self.body_handle(node_id)?;
        self.physics.apply_impulse(body, impulse);
        Ok(())
    }

    /// Set the linear velocity of a node's body
    pub fn set_linear_velocity(&mut self, node_id: &str, velocity: Vec3) -> Result<(), PhysicsError> {
        let body = self.body_handle(node_id)?;
        self.physics.set_linear_velocity(body, velocity);
        Ok(())
    }

    /// Linear velocity of a node's body
    pub fn linear_velocity(&self, node_id: &str) -> Result<Vec3, PhysicsError> {
        let body = self.body_handle(node_id)?;
        self.physics
            .get_linear_velocity(body)
            .ok_or_else(|| PhysicsError::NoBody(node_id.to_string()))
    }

    /// Simulated world pose of a node's body
    pub fn pose(&self, node_id: &str) -> Result<(Vec3, Quat), PhysicsError> {
        let body = self.body_handle(node_id)?;
        self.pose_of(body)
            .ok_or_else(|| PhysicsError::NoBody(node_id.to_string()))
    }

    fn pose_of(&self, body: RigidBodyHandle) -> Option<(Vec3, Quat)> {
        Some((self.physics.get_position(body)?, self.physics.get_rotation(body)?))
    }

    /// Node ids of an instanced batch, sorted
    #[must_use]
    pub fn batch(&self, key: &BatchKey) -> Option<&[String]> {
        self.batches.get(key).map(Vec::as_slice)
    }

    /// All instanced batches
    pub fn batches(&self) -> impl Iterator<Item = (&BatchKey, &[String])> {
        self.batches.iter().map(|(k, v)| (k, v.as_slice()))
    }

    /// Simulated poses of a whole batch, for the render batch to consume
    #[must_use]
    pub fn batch_poses(&self, key: &BatchKey) -> Vec<(String, Vec3, Quat)> {
        let Some(ids) = self.batches.get(key) else {
            return Vec::new();
        };
        ids.iter()
            .filter_map(|id| {
                let entry = self.bodies.get(id)?;
                let (position, rotation) = self.pose_of(entry.body)?;
                Some((id.clone(), position, rotation))
            })
            .collect()
    }

    /// Node that owns a collider
    #[must_use]
    pub fn node_of_collider(&self, collider: ColliderHandle) -> Option<&str> {
        self.colliders.get(&collider).map(String::as_str)
    }

    /// Check if a node currently owns a body
    #[must_use]
    pub fn has_body(&self, node_id: &str) -> bool {
        self.bodies.contains_key(node_id)
    }

    /// Number of tracked bodies
    #[must_use]
    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    /// Remove every body
    pub fn clear(&mut self) {
        let ids: Vec<String> = self.bodies.keys().cloned().collect();
        for id in ids {
            self.remove_body(&id);
        }
        self.batches.clear();
        self.physics.drain_events();
    }
}

impl Default for PhysicsResolver {
    fn default() -> Self {
        Self::new(Physics::new())
    }
}

fn contact(source: &str, target: &str, target_entry: &BodyEntry) -> ContactEvent {
    ContactEvent {
        source_entity_id: source.to_string(),
        target_entity_id: target.to_string(),
        target_body_ref: target_entry.batch.is_none().then_some(target_entry.body),
    }
}

/// Gather body descriptors, skipping disabled subtrees
fn collect(node: &Arc<ResolvedNode>, parent_id: Option<&str>, parent: Mat4, out: &mut Vec<Desired>) {
    if node.disabled {
        return;
    }
    let world = parent * node.transform().matrix();

    if let Some(props) = node.physics() {
        let geometry = node.geometry();
        let batch = node.model().filter(|m| m.instanced).map(|m| BatchKey {
            parent_id: parent_id.unwrap_or_default().to_string(),
            filename: m.filename.clone(),
            kind: props.kind,
        });
        out.push(Desired {
            id: node.id.clone(),
            descriptor: BodyDescriptor::new(props, world, geometry),
            batch,
            has_geometry: geometry.is_some(),
        });
    }

    for child in &node.children {
        collect(child, Some(node.id.as_str()), world, out);
    }
}
