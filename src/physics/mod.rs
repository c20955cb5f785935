//! Physics simulation module
//!
//! Built on top of rapier3d. Physics components become bodies, simulation
//! callbacks come back out as contact events on the bus.

mod descriptor;
mod error;
mod resolver;
mod world;

pub use descriptor::{BodyDescriptor, ColliderShape, interaction_groups};
pub use error::PhysicsError;
pub use resolver::{BatchKey, PhysicsResolver, SyncReport};
pub use world::{ColliderHandle, Physics, RigidBodyHandle};
