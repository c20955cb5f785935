//! Component types and their resolution
//!
//! A node declares components as loosely-typed entries; the registry turns
//! each entry into a typed [`Component`] and the resolver does so for a
//! whole tree, caching by subtree identity.

mod props;
mod registry;
mod resolve;
mod schema;

pub use props::{
    AmbientLightProps, BodyKind, Component, CustomComponent, DirectionalLightProps, GeometryKind,
    GeometryProps, MaterialProps, ModelProps, PhysicsProps, SpotLightProps, TextProps,
    TransformProps, parse_color, srgb_to_linear,
};
pub use registry::{ComponentRegistry, ComponentType, ResolveContext, ResolveFn, ResolveIssue};
pub use resolve::{
    ResolveStats, ResolveWarning, ResolvedComponent, ResolvedNode, ResolvedScene, SceneResolver,
    find_resolved,
};
pub use schema::{FieldKind, FieldSpec};
