//! Declarative prefab scenes in Rust
//!
//! This crate provides:
//! - A JSON/RON prefab schema with an immutable, structurally shared tree
//! - A component registry that resolves loosely-typed entries into typed components
//! - Physics bodies with rapier3d and contact events on an event bus
//! - Export of a resolved scene to a binary glTF (GLB) buffer

pub mod assets;
pub mod components;
pub mod core;
pub mod events;
pub mod export;
pub mod physics;
pub mod scene;

// Re-exports for convenience
pub use glam;
pub use gltf;
pub use rapier3d;

/// Prelude module for common imports
pub mod prelude {
    pub use crate::assets::{AssetPath, AssetSource, DirectoryAssets, InMemoryAssets, NoAssets};
    pub use crate::components::{
        Component, ComponentRegistry, ComponentType, ResolvedNode, ResolvedScene, SceneResolver,
    };
    pub use crate::core::{SceneConfig, SceneContext, SceneRuntime};
    pub use crate::events::{
        CollisionEnter, CollisionExit, ContactEvent, EventBus, EventKind, ScopedSubscription,
        SensorEnter, SensorExit,
    };
    pub use crate::export::{ExportConfig, GlbExport, export_glb, export_glb_blocking};
    pub use crate::physics::{PhysicsResolver, RigidBodyHandle};
    pub use crate::scene::{
        ComponentEntry, GameObject, Prefab, clone_node, delete_node, find_node, update_node,
        update_node_by_id,
    };
    pub use glam::{Mat4, Quat, Vec3};
}
