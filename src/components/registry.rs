//! Component type registry
//!
//! Maps a component type name to its default properties, inspector schema
//! and the function that materializes a [`Component`] from a properties
//! record. Built-in types come from a fixed table of constructors; hosts can
//! register their own types at runtime.

use rustc_hash::FxHashMap;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::props::{
    AmbientLightProps, BodyKind, Component, CustomComponent, DirectionalLightProps, GeometryKind,
    GeometryProps, MaterialProps, ModelProps, PhysicsProps, SpotLightProps, TextProps,
    TransformProps,
};
use super::schema::{FieldKind, FieldSpec};
use crate::assets::AssetPath;
use crate::scene::{ComponentEntry, Properties};

/// Data available to a resolve function besides the properties
#[derive(Debug, Clone, Copy)]
pub struct ResolveContext<'a> {
    /// Public asset directory, stripped from asset references
    pub asset_root: &'a str,
}

/// Turns merged properties into a component, or explains why it cannot
pub type ResolveFn =
    fn(&ComponentType, Properties, &ResolveContext<'_>) -> Result<Component, String>;

/// Why a component entry was not materialized
#[derive(Debug, Clone, PartialEq)]
pub enum ResolveIssue {
    /// No type with this name is registered
    UnknownType(String),
    /// The properties do not fit the type
    InvalidProperties { type_name: String, message: String },
    /// A non-composable component sits on a node with children
    NonComposable(String),
    /// Another entry of the same type, under `kept_key`, already resolved
    DuplicateType { type_name: String, kept_key: String },
}

impl std::fmt::Display for ResolveIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownType(name) => write!(f, "unknown component type '{name}'"),
            Self::InvalidProperties { type_name, message } => {
                write!(f, "invalid properties for '{type_name}': {message}")
            }
            Self::NonComposable(name) => {
                write!(f, "component '{name}' cannot be combined with child content")
            }
            Self::DuplicateType { type_name, kept_key } => {
                write!(f, "second '{type_name}' entry, '{kept_key}' is used instead")
            }
        }
    }
}

/// A registered component type
#[derive(Debug, Clone)]
pub struct ComponentType {
    pub name: String,
    pub default_properties: Properties,
    pub fields: Vec<FieldSpec>,
    /// Shown in inspectors
    pub editable: bool,
    /// Produces something at runtime (visual, physical or behavioral)
    pub runtime_effect: bool,
    /// May be combined with child content on the same node
    pub composable: bool,
    resolver: ResolveFn,
}

impl ComponentType {
    /// Create a custom type that resolves to [`Component::Custom`]
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default_properties: Properties::new(),
            fields: Vec::new(),
            editable: true,
            runtime_effect: true,
            composable: true,
            resolver: resolve_custom,
        }
    }

    /// Create a type whose defaults come from a typed property record
    fn builtin<T: Serialize>(name: &str, defaults: &T, resolver: ResolveFn) -> Self {
        Self {
            default_properties: to_properties(defaults),
            resolver,
            ..Self::new(name)
        }
    }

    /// Add a default property
    #[must_use]
    pub fn with_default(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.default_properties.insert(key.into(), value.into());
        self
    }

    /// Add an inspector field
    #[must_use]
    pub fn with_field(mut self, field: FieldSpec) -> Self {
        self.fields.push(field);
        self
    }

    /// Replace the resolve function
    #[must_use]
    pub fn with_resolver(mut self, resolver: ResolveFn) -> Self {
        self.resolver = resolver;
        self
    }

    /// Mark as not combinable with child content
    #[must_use]
    pub fn non_composable(mut self) -> Self {
        self.composable = false;
        self
    }

    /// Mark as hidden from inspectors
    #[must_use]
    pub fn hidden_from_inspector(mut self) -> Self {
        self.editable = false;
        self
    }

    /// Defaults overlaid with `properties`, key by key
    #[must_use]
    pub fn merged_properties(&self, properties: &Properties) -> Properties {
        let mut merged = self.default_properties.clone();
        for (key, value) in properties {
            merged.insert(key.clone(), value.clone());
        }
        merged
    }

    /// A fresh entry of this type carrying the defaults
    #[must_use]
    pub fn default_entry(&self) -> ComponentEntry {
        ComponentEntry {
            type_name: self.name.clone(),
            properties: self.default_properties.clone(),
        }
    }

    /// Materialize already merged properties
    pub fn resolve(
        &self,
        properties: Properties,
        ctx: &ResolveContext<'_>,
    ) -> Result<Component, String> {
        (self.resolver)(self, properties, ctx)
    }
}

fn to_properties<T: Serialize>(value: &T) -> Properties {
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => map,
        _ => Properties::new(),
    }
}

fn typed<T: DeserializeOwned>(properties: Properties) -> Result<T, String> {
    serde_json::from_value(Value::Object(properties)).map_err(|e| e.to_string())
}

fn resolve_custom(
    ty: &ComponentType,
    properties: Properties,
    _ctx: &ResolveContext<'_>,
) -> Result<Component, String> {
    Ok(Component::Custom(CustomComponent {
        type_name: ty.name.clone(),
        properties,
    }))
}

/// Rewrite an asset reference into canonical form
fn normalize_asset(raw: &str, ctx: &ResolveContext<'_>) -> Result<String, String> {
    let path = AssetPath::parse(raw, ctx.asset_root).map_err(|e| e.to_string())?;
    if path.had_root_prefix() {
        log::warn!("Asset path '{raw}' includes the asset directory prefix, using '{path}'");
    }
    Ok(path.as_str().to_string())
}

fn transform_type() -> ComponentType {
    ComponentType::builtin("Transform", &TransformProps::default(), |_, p, _| {
        typed(p).map(Component::Transform)
    })
    .with_field(FieldSpec::new("position", FieldKind::Vector3))
    .with_field(FieldSpec::new("rotation", FieldKind::Vector3))
    .with_field(FieldSpec::new("scale", FieldKind::Vector3))
}

fn geometry_type() -> ComponentType {
    let kinds: Vec<&str> = GeometryKind::ALL.iter().map(|k| k.as_str()).collect();
    ComponentType::builtin("Geometry", &GeometryProps::default(), |_, p, _| {
        typed(p).map(Component::Geometry)
    })
    .with_field(FieldSpec::new("type", FieldKind::select(&kinds)))
    .with_field(FieldSpec::new("args", FieldKind::NumberList))
}

fn material_type() -> ComponentType {
    ComponentType::builtin("Material", &MaterialProps::default(), |_, p, ctx| {
        let mut material: MaterialProps = typed(p)?;
        if let Some(map) = material.map.take().filter(|m| !m.trim().is_empty()) {
            material.map = Some(normalize_asset(&map, ctx)?);
        }
        Ok(Component::Material(material))
    })
    .with_field(FieldSpec::new("color", FieldKind::Color))
    .with_field(FieldSpec::new("opacity", FieldKind::range(0.0, 1.0)))
    .with_field(FieldSpec::new("transparent", FieldKind::Boolean))
    .with_field(FieldSpec::new("metalness", FieldKind::range(0.0, 1.0)))
    .with_field(FieldSpec::new("roughness", FieldKind::range(0.0, 1.0)))
    .with_field(FieldSpec::new("emissive", FieldKind::Color))
    .with_field(FieldSpec::new("emissiveIntensity", FieldKind::number()))
    .with_field(FieldSpec::new("map", FieldKind::AssetPath).with_label("Texture"))
    .with_field(FieldSpec::new("doubleSided", FieldKind::Boolean))
    .with_field(FieldSpec::new("wireframe", FieldKind::Boolean))
}

fn physics_type() -> ComponentType {
    let kinds = [
        BodyKind::Fixed,
        BodyKind::Dynamic,
        BodyKind::KinematicPosition,
        BodyKind::KinematicVelocity,
    ]
    .map(BodyKind::as_str);
    ComponentType::builtin("Physics", &PhysicsProps::default(), |_, p, _| {
        let physics: PhysicsProps = typed(p)?;
        if physics.mass.is_some_and(|m| m < 0.0) {
            return Err("mass must not be negative".to_string());
        }
        Ok(Component::Physics(physics))
    })
    .with_field(FieldSpec::new("type", FieldKind::select(&kinds)))
    .with_field(FieldSpec::new("mass", FieldKind::range(0.0, f32::MAX)))
    .with_field(FieldSpec::new("restitution", FieldKind::range(0.0, 1.0)))
    .with_field(FieldSpec::new("friction", FieldKind::range(0.0, f32::MAX)))
    .with_field(FieldSpec::new("linearDamping", FieldKind::number()))
    .with_field(FieldSpec::new("angularDamping", FieldKind::number()))
    .with_field(FieldSpec::new("gravityScale", FieldKind::number()))
    .with_field(FieldSpec::new("enabledTranslations", FieldKind::AxisLocks))
    .with_field(FieldSpec::new("enabledRotations", FieldKind::AxisLocks))
    .with_field(FieldSpec::new("ccd", FieldKind::Boolean).with_label("Continuous Collision"))
    .with_field(FieldSpec::new("sensor", FieldKind::Boolean))
    .with_field(FieldSpec::new("collisionGroups", FieldKind::Bits))
    .with_field(FieldSpec::new("solverGroups", FieldKind::Bits))
}

fn model_type() -> ComponentType {
    ComponentType::builtin("Model", &ModelProps::default(), |_, p, ctx| {
        let mut model: ModelProps = typed(p)?;
        model.filename = normalize_asset(&model.filename, ctx)?;
        Ok(Component::Model(model))
    })
    .with_field(FieldSpec::new("filename", FieldKind::AssetPath))
    .with_field(FieldSpec::new("instanced", FieldKind::Boolean))
}

fn spot_light_type() -> ComponentType {
    ComponentType::builtin("SpotLight", &SpotLightProps::default(), |_, p, _| {
        typed(p).map(Component::SpotLight)
    })
    .with_field(FieldSpec::new("color", FieldKind::Color))
    .with_field(FieldSpec::new("intensity", FieldKind::number()))
    .with_field(FieldSpec::new("distance", FieldKind::number()))
    .with_field(FieldSpec::new("angle", FieldKind::range(0.0, std::f32::consts::FRAC_PI_2)))
    .with_field(FieldSpec::new("penumbra", FieldKind::range(0.0, 1.0)))
    .with_field(FieldSpec::new("decay", FieldKind::number()))
    .with_field(FieldSpec::new("castShadow", FieldKind::Boolean))
}

fn directional_light_type() -> ComponentType {
    ComponentType::builtin("DirectionalLight", &DirectionalLightProps::default(), |_, p, _| {
        typed(p).map(Component::DirectionalLight)
    })
    .with_field(FieldSpec::new("color", FieldKind::Color))
    .with_field(FieldSpec::new("intensity", FieldKind::number()))
    .with_field(FieldSpec::new("castShadow", FieldKind::Boolean))
}

fn ambient_light_type() -> ComponentType {
    ComponentType::builtin("AmbientLight", &AmbientLightProps::default(), |_, p, _| {
        typed(p).map(Component::AmbientLight)
    })
    .with_field(FieldSpec::new("color", FieldKind::Color))
    .with_field(FieldSpec::new("intensity", FieldKind::number()))
}

fn text_type() -> ComponentType {
    ComponentType::builtin("Text", &TextProps::default(), |_, p, ctx| {
        let mut text: TextProps = typed(p)?;
        if let Some(font) = text.font.take().filter(|f| !f.trim().is_empty()) {
            text.font = Some(normalize_asset(&font, ctx)?);
        }
        Ok(Component::Text(text))
    })
    .with_field(FieldSpec::new("text", FieldKind::Text))
    .with_field(FieldSpec::new("font", FieldKind::AssetPath))
    .with_field(FieldSpec::new("fontSize", FieldKind::range(0.0, f32::MAX)))
    .with_field(FieldSpec::new("color", FieldKind::Color))
    .non_composable()
}

/// Constructors of the built-in types
const BUILTIN_TYPES: [fn() -> ComponentType; 9] = [
    transform_type,
    geometry_type,
    material_type,
    physics_type,
    model_type,
    spot_light_type,
    directional_light_type,
    ambient_light_type,
    text_type,
];

/// Name-keyed table of component types
///
/// Every mutation bumps [`generation`](Self::generation) so cached
/// resolutions know to recompute on their next pass.
#[derive(Debug, Clone)]
pub struct ComponentRegistry {
    types: FxHashMap<String, ComponentType>,
    asset_root: String,
    generation: u64,
}

impl Default for ComponentRegistry {
    fn default() -> Self {
        Self {
            types: FxHashMap::default(),
            asset_root: "public".to_string(),
            generation: 0,
        }
    }
}

impl ComponentRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with every built-in type registered
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register_builtins();
        registry
    }

    /// Register (or re-register) the built-in types
    pub fn register_builtins(&mut self) {
        for build in BUILTIN_TYPES {
            self.register(build());
        }
    }

    /// Add a type, replacing any type of the same name
    pub fn register(&mut self, component_type: ComponentType) -> Option<ComponentType> {
        self.generation += 1;
        let name = component_type.name.clone();
        let previous = self.types.insert(name.clone(), component_type);
        if previous.is_some() {
            log::debug!("Replaced component type '{name}'");
        }
        previous
    }

    /// Remove a type
    pub fn unregister(&mut self, name: &str) -> Option<ComponentType> {
        let removed = self.types.remove(name);
        if removed.is_some() {
            self.generation += 1;
        }
        removed
    }

    /// Remove every type
    pub fn clear(&mut self) {
        self.types.clear();
        self.generation += 1;
    }

    /// Look up a type by name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ComponentType> {
        self.types.get(name)
    }

    /// Check if a type is registered
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    /// Registered type names, sorted
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.types.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Number of registered types
    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Check if nothing is registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Counter bumped by every mutation
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Public asset directory used to normalize asset references
    #[must_use]
    pub fn asset_root(&self) -> &str {
        &self.asset_root
    }

    /// Change the asset directory
    pub fn set_asset_root(&mut self, asset_root: impl Into<String>) {
        self.asset_root = asset_root.into();
        self.generation += 1;
    }

    /// Whether components of this type may sit on a node with children.
    /// Unknown types are never materialized, so they do not restrict anything.
    #[must_use]
    pub fn is_composable(&self, type_name: &str) -> bool {
        self.types.get(type_name).is_none_or(|t| t.composable)
    }

    /// Materialize one component entry
    ///
    /// # Errors
    ///
    /// Returns an issue for unknown types and properties that do not fit the
    /// type; neither is fatal for the node carrying the entry.
    pub fn resolve(&self, entry: &ComponentEntry) -> Result<Component, ResolveIssue> {
        let ty = self
            .types
            .get(&entry.type_name)
            .ok_or_else(|| ResolveIssue::UnknownType(entry.type_name.clone()))?;
        let ctx = ResolveContext {
            asset_root: &self.asset_root,
        };
        ty.resolve(ty.merged_properties(&entry.properties), &ctx)
            .map_err(|message| ResolveIssue::InvalidProperties {
                type_name: ty.name.clone(),
                message,
            })
    }
}
