//! Typed property records of the built-in component types
//!
//! Every struct deserializes from the loosely-typed `properties` record of a
//! component entry. Missing fields fall back to `Default`, unknown fields are
//! ignored (they stay on the source node untouched).

use glam::{EulerRot, Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::scene::Properties;

/// Transform: position, rotation (radians, XYZ order), scale
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TransformProps {
    pub position: [f32; 3],
    pub rotation: [f32; 3],
    pub scale: [f32; 3],
}

impl Default for TransformProps {
    fn default() -> Self {
        Self {
            position: [0.0; 3],
            rotation: [0.0; 3],
            scale: [1.0; 3],
        }
    }
}

impl TransformProps {
    /// Create a transform with just a position
    #[must_use]
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position: position.into(),
            ..Default::default()
        }
    }

    /// Rotation as a quaternion
    #[must_use]
    pub fn quat(&self) -> Quat {
        let [x, y, z] = self.rotation;
        Quat::from_euler(EulerRot::XYZ, x, y, z)
    }

    /// Local matrix, applied as scale, then rotation, then translation
    #[must_use]
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(
            Vec3::from(self.scale),
            self.quat(),
            Vec3::from(self.position),
        )
    }

    /// Check if this is the identity transform
    #[must_use]
    pub fn is_identity(&self) -> bool {
        *self == Self::default()
    }
}

/// Primitive shape generated for a Geometry component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeometryKind {
    #[default]
    Box,
    Sphere,
    Plane,
    Cylinder,
    Cone,
    Capsule,
}

impl GeometryKind {
    /// All kinds, in inspector order
    pub const ALL: [GeometryKind; 6] = [
        GeometryKind::Box,
        GeometryKind::Sphere,
        GeometryKind::Plane,
        GeometryKind::Cylinder,
        GeometryKind::Cone,
        GeometryKind::Capsule,
    ];

    /// Serialized name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Box => "box",
            Self::Sphere => "sphere",
            Self::Plane => "plane",
            Self::Cylinder => "cylinder",
            Self::Cone => "cone",
            Self::Capsule => "capsule",
        }
    }
}

/// Geometry: a primitive kind plus positional constructor arguments
///
/// | kind       | args                                        |
/// |------------|---------------------------------------------|
/// | `box`      | width, height, depth                        |
/// | `sphere`   | radius, widthSegments, heightSegments       |
/// | `plane`    | width, height                               |
/// | `cylinder` | radiusTop, radiusBottom, height, segments   |
/// | `cone`     | radius, height, segments                    |
/// | `capsule`  | radius, length, capSegments, radialSegments |
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GeometryProps {
    #[serde(rename = "type")]
    pub kind: GeometryKind,
    pub args: Vec<f32>,
}

impl GeometryProps {
    /// Positional argument `index`, or `default` when absent
    #[must_use]
    pub fn arg(&self, index: usize, default: f32) -> f32 {
        self.args.get(index).copied().unwrap_or(default)
    }

    /// Half extents of the shape's bounding box, before scaling
    #[must_use]
    pub fn half_extents(&self) -> Vec3 {
        match self.kind {
            GeometryKind::Box => {
                Vec3::new(self.arg(0, 1.0), self.arg(1, 1.0), self.arg(2, 1.0)) / 2.0
            }
            GeometryKind::Sphere => Vec3::splat(self.arg(0, 1.0)),
            GeometryKind::Plane => Vec3::new(self.arg(0, 1.0) / 2.0, self.arg(1, 1.0) / 2.0, 0.0),
            GeometryKind::Cylinder => {
                let radius = self.arg(0, 1.0).max(self.arg(1, 1.0));
                Vec3::new(radius, self.arg(2, 1.0) / 2.0, radius)
            }
            GeometryKind::Cone => {
                let radius = self.arg(0, 1.0);
                Vec3::new(radius, self.arg(1, 1.0) / 2.0, radius)
            }
            GeometryKind::Capsule => {
                let radius = self.arg(0, 1.0);
                Vec3::new(radius, radius + self.arg(1, 1.0) / 2.0, radius)
            }
        }
    }
}

/// Surface appearance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MaterialProps {
    pub color: String,
    pub opacity: f32,
    pub transparent: bool,
    pub metalness: f32,
    pub roughness: f32,
    pub emissive: String,
    pub emissive_intensity: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub map: Option<String>,
    pub double_sided: bool,
    pub wireframe: bool,
}

impl Default for MaterialProps {
    fn default() -> Self {
        Self {
            color: "#ffffff".to_string(),
            opacity: 1.0,
            transparent: false,
            metalness: 0.0,
            roughness: 1.0,
            emissive: "#000000".to_string(),
            emissive_intensity: 1.0,
            map: None,
            double_sided: false,
            wireframe: false,
        }
    }
}

/// Simulation body kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BodyKind {
    /// Immovable, cheapest case
    Fixed,
    #[default]
    Dynamic,
    KinematicPosition,
    KinematicVelocity,
}

impl BodyKind {
    /// Serialized name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fixed => "fixed",
            Self::Dynamic => "dynamic",
            Self::KinematicPosition => "kinematicPosition",
            Self::KinematicVelocity => "kinematicVelocity",
        }
    }
}

/// Physical intent: body kind plus material properties
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PhysicsProps {
    #[serde(rename = "type")]
    pub kind: BodyKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mass: Option<f32>,
    pub restitution: f32,
    pub friction: f32,
    pub linear_damping: f32,
    pub angular_damping: f32,
    pub gravity_scale: f32,
    pub enabled_translations: [bool; 3],
    pub enabled_rotations: [bool; 3],
    pub ccd: bool,
    pub sensor: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collision_groups: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub solver_groups: Option<u32>,
}

impl Default for PhysicsProps {
    fn default() -> Self {
        Self {
            kind: BodyKind::Dynamic,
            mass: None,
            restitution: 0.0,
            friction: 0.5,
            linear_damping: 0.0,
            angular_damping: 0.0,
            gravity_scale: 1.0,
            enabled_translations: [true; 3],
            enabled_rotations: [true; 3],
            ccd: false,
            sensor: false,
            collision_groups: None,
            solver_groups: None,
        }
    }
}

/// Reference to an external binary model
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ModelProps {
    pub filename: String,
    pub instanced: bool,
}

/// Cone-shaped light
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SpotLightProps {
    pub color: String,
    pub intensity: f32,
    pub distance: f32,
    pub angle: f32,
    pub penumbra: f32,
    pub decay: f32,
    pub cast_shadow: bool,
}

impl Default for SpotLightProps {
    fn default() -> Self {
        Self {
            color: "#ffffff".to_string(),
            intensity: 1.0,
            distance: 0.0,
            angle: std::f32::consts::FRAC_PI_3,
            penumbra: 0.0,
            decay: 2.0,
            cast_shadow: false,
        }
    }
}

/// Parallel light
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DirectionalLightProps {
    pub color: String,
    pub intensity: f32,
    pub cast_shadow: bool,
}

impl Default for DirectionalLightProps {
    fn default() -> Self {
        Self {
            color: "#ffffff".to_string(),
            intensity: 1.0,
            cast_shadow: false,
        }
    }
}

/// Uniform light
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AmbientLightProps {
    pub color: String,
    pub intensity: f32,
}

impl Default for AmbientLightProps {
    fn default() -> Self {
        Self {
            color: "#ffffff".to_string(),
            intensity: 1.0,
        }
    }
}

/// Rendered text; cannot be composed with child content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TextProps {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font: Option<String>,
    pub font_size: f32,
    pub color: String,
}

impl Default for TextProps {
    fn default() -> Self {
        Self {
            text: String::new(),
            font: None,
            font_size: 1.0,
            color: "#ffffff".to_string(),
        }
    }
}

/// A runtime-registered component type, defaults already merged in
#[derive(Debug, Clone, PartialEq)]
pub struct CustomComponent {
    pub type_name: String,
    pub properties: Properties,
}

impl CustomComponent {
    /// Numeric property
    #[must_use]
    pub fn number(&self, key: &str) -> Option<f64> {
        self.properties.get(key).and_then(serde_json::Value::as_f64)
    }

    /// Boolean property
    #[must_use]
    pub fn flag(&self, key: &str) -> Option<bool> {
        self.properties.get(key).and_then(serde_json::Value::as_bool)
    }

    /// String property
    #[must_use]
    pub fn text(&self, key: &str) -> Option<&str> {
        self.properties.get(key).and_then(serde_json::Value::as_str)
    }
}

/// A materialized component: closed set of built-in variants plus custom types
#[derive(Debug, Clone, PartialEq)]
pub enum Component {
    Transform(TransformProps),
    Geometry(GeometryProps),
    Material(MaterialProps),
    Physics(PhysicsProps),
    Model(ModelProps),
    SpotLight(SpotLightProps),
    DirectionalLight(DirectionalLightProps),
    AmbientLight(AmbientLightProps),
    Text(TextProps),
    Custom(CustomComponent),
}

impl Component {
    /// Registered type name of this variant
    #[must_use]
    pub fn type_name(&self) -> &str {
        match self {
            Self::Transform(_) => "Transform",
            Self::Geometry(_) => "Geometry",
            Self::Material(_) => "Material",
            Self::Physics(_) => "Physics",
            Self::Model(_) => "Model",
            Self::SpotLight(_) => "SpotLight",
            Self::DirectionalLight(_) => "DirectionalLight",
            Self::AmbientLight(_) => "AmbientLight",
            Self::Text(_) => "Text",
            Self::Custom(custom) => &custom.type_name,
        }
    }

    /// Check if the component emits light
    #[must_use]
    pub fn is_light(&self) -> bool {
        matches!(
            self,
            Self::SpotLight(_) | Self::DirectionalLight(_) | Self::AmbientLight(_)
        )
    }
}

/// Parse `#rgb`, `#rrggbb` or a basic color name into linear-free sRGB floats
#[must_use]
pub fn parse_color(value: &str) -> Option<[f32; 3]> {
    let value = value.trim();
    let named = match value.to_ascii_lowercase().as_str() {
        "white" => Some([1.0, 1.0, 1.0]),
        "black" => Some([0.0, 0.0, 0.0]),
        "red" => Some([1.0, 0.0, 0.0]),
        "green" => Some([0.0, 128.0 / 255.0, 0.0]),
        "blue" => Some([0.0, 0.0, 1.0]),
        "yellow" => Some([1.0, 1.0, 0.0]),
        "gray" | "grey" => Some([128.0 / 255.0; 3]),
        _ => None,
    };
    if named.is_some() {
        return named;
    }

    let hex = value.strip_prefix('#')?;
    let channel = |s: &str| u8::from_str_radix(s, 16).ok().map(|v| f32::from(v) / 255.0);
    match hex.len() {
        3 => {
            let mut out = [0.0; 3];
            for (i, c) in hex.chars().enumerate() {
                out[i] = channel(&format!("{c}{c}"))?;
            }
            Some(out)
        }
        6 if hex.is_ascii() => Some([
            channel(&hex[0..2])?,
            channel(&hex[2..4])?,
            channel(&hex[4..6])?,
        ]),
        _ => None,
    }
}

/// sRGB transfer function to linear, per channel
#[must_use]
pub fn srgb_to_linear(c: f32) -> f32 {
    if c <= 0.040_45 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}
