//! Scene export to binary glTF
//!
//! Export runs in three passes over a resolved scene: a synchronous plan that
//! decides what each visible node contributes, an asynchronous fetch of the
//! referenced models and textures (in path order), and a synchronous build
//! of the GLB container. Only the fetch pass suspends, so identical inputs
//! always produce identical bytes.

mod error;
mod glb;
mod mesh;

pub use error::{ExportError, ExportWarning};
pub use mesh::{Mesh, Vertex};

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::assets::{AssetPath, AssetSource, TextureData};
use crate::components::{
    GeometryKind, GeometryProps, MaterialProps, ResolveIssue, ResolvedNode, ResolvedScene,
    TransformProps, parse_color, srgb_to_linear,
};
use glb::{GlbBuilder, MaterialFactors};

/// Export settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Written to `asset.generator`
    pub generator: String,
    /// Export hidden subtrees as well
    pub include_hidden: bool,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            generator: "prefab_engine".to_string(),
            include_hidden: false,
        }
    }
}

impl ExportConfig {
    /// Set the generator string
    #[must_use]
    pub fn with_generator(mut self, generator: impl Into<String>) -> Self {
        self.generator = generator.into();
        self
    }

    /// Include hidden subtrees
    #[must_use]
    pub fn with_include_hidden(mut self, include_hidden: bool) -> Self {
        self.include_hidden = include_hidden;
        self
    }
}

/// Exported GLB bytes and everything that was left out of them
#[derive(Debug, Clone)]
pub struct GlbExport {
    pub data: Vec<u8>,
    pub warnings: Vec<ExportWarning>,
}

enum Shape {
    Primitive(GeometryProps),
    Model {
        path: AssetPath,
        fallback: Option<GeometryProps>,
    },
}

struct Visual {
    shape: Shape,
    material: MaterialProps,
    texture: Option<AssetPath>,
}

struct Planned {
    id: String,
    transform: TransformProps,
    visual: Option<Visual>,
    children: Vec<Planned>,
}

#[derive(Default)]
struct Fetched {
    models: BTreeMap<AssetPath, Option<Arc<Mesh>>>,
    textures: BTreeMap<AssetPath, Option<Arc<TextureData>>>,
}

/// Export a resolved scene as a self-contained GLB
///
/// Disabled subtrees are never exported; hidden subtrees only when
/// `config.include_hidden` is set. Nodes that cannot be fully exported are
/// kept as plain transform nodes and reported in [`GlbExport::warnings`].
///
/// # Errors
///
/// Fails only if the root's Transform or Geometry does not resolve, or if
/// the document cannot be serialized.
pub async fn export_glb<A: AssetSource>(
    scene: &ResolvedScene,
    assets: &A,
    config: &ExportConfig,
) -> Result<GlbExport, ExportError> {
    check_root(&scene.root)?;

    let mut warnings = Vec::new();
    let plan = plan_node(&scene.root, config, &mut warnings);

    let mut fetched = Fetched::default();
    if let Some(plan) = &plan {
        collect_assets(plan, &mut fetched);
    }
    for (path, slot) in &mut fetched.models {
        *slot = assets.fetch_model(path).await;
    }
    for (path, slot) in &mut fetched.textures {
        *slot = assets.fetch_texture(path).await;
    }

    let mut builder = GlbBuilder::new(&config.generator);
    let scene_nodes = match &plan {
        Some(plan) => vec![emit_node(&mut builder, plan, &fetched, &mut warnings)],
        None => Vec::new(),
    };
    let data = builder.finish(scene_nodes)?;

    for warning in &warnings {
        log::warn!("Export: {warning}");
    }
    log::info!("Exported GLB ({} bytes, {} warning(s))", data.len(), warnings.len());

    Ok(GlbExport { data, warnings })
}

/// Run [`export_glb`] to completion on the current thread
///
/// # Errors
///
/// See [`export_glb`]
pub fn export_glb_blocking<A: AssetSource>(
    scene: &ResolvedScene,
    assets: &A,
    config: &ExportConfig,
) -> Result<GlbExport, ExportError> {
    pollster::block_on(export_glb(scene, assets, config))
}

fn invalid_reason(node: &ResolvedNode, type_name: &str) -> Option<String> {
    node.warnings.iter().find_map(|w| match &w.issue {
        ResolveIssue::InvalidProperties { type_name: t, message } if t == type_name => {
            Some(message.clone())
        }
        _ => None,
    })
}

fn check_root(root: &ResolvedNode) -> Result<(), ExportError> {
    for type_name in ["Transform", "Geometry"] {
        if let Some(reason) = invalid_reason(root, type_name) {
            return Err(ExportError::UnresolvableRoot {
                node_id: root.id.clone(),
                reason: format!("{type_name}: {reason}"),
            });
        }
    }
    Ok(())
}

fn plan_node(
    node: &ResolvedNode,
    config: &ExportConfig,
    warnings: &mut Vec<ExportWarning>,
) -> Option<Planned> {
    if node.disabled || (node.hidden && !config.include_hidden) {
        return None;
    }

    if let Some(reason) = invalid_reason(node, "Geometry") {
        warnings.push(ExportWarning::SkippedGeometry {
            node_id: node.id.clone(),
            reason,
        });
    }

    let geometry = node.geometry().cloned();
    let shape = match node.model() {
        Some(model) => match AssetPath::parse(&model.filename, "") {
            Ok(path) => Some(Shape::Model {
                path,
                fallback: geometry,
            }),
            Err(_) => {
                warnings.push(ExportWarning::MissingModel {
                    node_id: node.id.clone(),
                    path: model.filename.clone(),
                });
                geometry.map(Shape::Primitive)
            }
        },
        None => geometry.map(Shape::Primitive),
    };

    let visual = shape.map(|shape| {
        let material = node.material().cloned().unwrap_or_default();
        let texture = material.map.as_deref().and_then(|raw| {
            let parsed = AssetPath::parse(raw, "").ok();
            if parsed.is_none() {
                warnings.push(ExportWarning::MissingTexture {
                    node_id: node.id.clone(),
                    path: raw.to_string(),
                });
            }
            parsed
        });
        Visual {
            shape,
            material,
            texture,
        }
    });

    let children = node
        .children
        .iter()
        .filter_map(|child| plan_node(child, config, warnings))
        .collect();

    Some(Planned {
        id: node.id.clone(),
        transform: node.transform(),
        visual,
        children,
    })
}

fn collect_assets(plan: &Planned, fetched: &mut Fetched) {
    if let Some(visual) = &plan.visual {
        if let Shape::Model { path, .. } = &visual.shape {
            fetched.models.entry(path.clone()).or_insert(None);
        }
        if let Some(texture) = &visual.texture {
            fetched.textures.entry(texture.clone()).or_insert(None);
        }
    }
    for child in &plan.children {
        collect_assets(child, fetched);
    }
}

fn emit_node(
    builder: &mut GlbBuilder,
    plan: &Planned,
    fetched: &Fetched,
    warnings: &mut Vec<ExportWarning>,
) -> u32 {
    let idx = builder.reserve_node();
    let mesh = plan
        .visual
        .as_ref()
        .and_then(|visual| emit_visual(builder, &plan.id, visual, fetched, warnings));
    let children = plan
        .children
        .iter()
        .map(|child| emit_node(builder, child, fetched, warnings))
        .collect();
    builder.set_node(idx, &plan.id, &plan.transform, mesh, children);
    idx
}

fn emit_visual(
    builder: &mut GlbBuilder,
    node_id: &str,
    visual: &Visual,
    fetched: &Fetched,
    warnings: &mut Vec<ExportWarning>,
) -> Option<u32> {
    let (key, mesh) = match &visual.shape {
        Shape::Model { path, fallback } => {
            match fetched.models.get(path).cloned().flatten().filter(|m| !m.is_empty()) {
                Some(mesh) => (format!("model:{path}"), mesh),
                None => {
                    warnings.push(ExportWarning::MissingModel {
                        node_id: node_id.to_string(),
                        path: path.to_string(),
                    });
                    primitive_for(node_id, fallback.as_ref()?, warnings)?
                }
            }
        }
        Shape::Primitive(geometry) => primitive_for(node_id, geometry, warnings)?,
    };

    let texture = visual.texture.as_ref().and_then(|path| {
        match fetched.textures.get(path).cloned().flatten().filter(|t| t.is_embeddable()) {
            Some(data) => Some(builder.push_texture(path.as_str(), &data)),
            None => {
                warnings.push(ExportWarning::MissingTexture {
                    node_id: node_id.to_string(),
                    path: path.to_string(),
                });
                None
            }
        }
    });

    let factors = material_factors(node_id, &visual.material, texture, warnings);
    let material = builder.push_material(&factors);
    Some(builder.push_mesh(key, &mesh, material))
}

fn primitive_for(
    node_id: &str,
    geometry: &GeometryProps,
    warnings: &mut Vec<ExportWarning>,
) -> Option<(String, Arc<Mesh>)> {
    match primitive_mesh(geometry) {
        Ok(mesh) => Some((
            format!("{}:{:?}", geometry.kind.as_str(), geometry.args),
            Arc::new(mesh),
        )),
        Err(reason) => {
            warnings.push(ExportWarning::SkippedGeometry {
                node_id: node_id.to_string(),
                reason,
            });
            None
        }
    }
}

/// Tessellate a primitive, rejecting non-finite or degenerate arguments
fn primitive_mesh(geometry: &GeometryProps) -> Result<Mesh, String> {
    let kind = geometry.kind.as_str();
    if let Some(bad) = geometry.args.iter().find(|a| !a.is_finite()) {
        return Err(format!("{kind} has a non-finite argument ({bad})"));
    }
    let size = |index: usize, default: f32| {
        let value = geometry.arg(index, default);
        if value > 0.0 {
            Ok(value)
        } else {
            Err(format!("{kind} argument {index} must be positive, got {value}"))
        }
    };
    let count = |index: usize, default: f32| {
        let value = geometry.arg(index, default).max(0.0);
        if value <= Mesh::MAX_SEGMENTS as f32 {
            Ok(value as u32)
        } else {
            Err(format!(
                "{kind} argument {index} exceeds {} segments, got {value}",
                Mesh::MAX_SEGMENTS
            ))
        }
    };

    Ok(match geometry.kind {
        GeometryKind::Box => Mesh::cuboid(size(0, 1.0)?, size(1, 1.0)?, size(2, 1.0)?),
        GeometryKind::Sphere => Mesh::sphere(size(0, 1.0)?, count(1, 32.0)?, count(2, 16.0)?),
        GeometryKind::Plane => Mesh::plane(size(0, 1.0)?, size(1, 1.0)?),
        GeometryKind::Cylinder => {
            let top = geometry.arg(0, 1.0);
            let bottom = geometry.arg(1, 1.0);
            if top < 0.0 || bottom < 0.0 || (top == 0.0 && bottom == 0.0) {
                return Err(format!("{kind} radii must be non-negative and not both zero"));
            }
            Mesh::cylinder(top, bottom, size(2, 1.0)?, count(3, 32.0)?)
        }
        GeometryKind::Cone => Mesh::cylinder(0.0, size(0, 1.0)?, size(1, 1.0)?, count(2, 32.0)?),
        GeometryKind::Capsule => {
            let length = geometry.arg(1, 1.0);
            if length < 0.0 {
                return Err(format!("{kind} length must be non-negative, got {length}"));
            }
            Mesh::capsule(size(0, 1.0)?, length, count(3, 8.0)?, count(2, 4.0)? * 2)
        }
    })
}

fn linear_color(
    node_id: &str,
    value: &str,
    fallback: [f32; 3],
    warnings: &mut Vec<ExportWarning>,
) -> [f32; 3] {
    match parse_color(value) {
        Some(rgb) => rgb.map(srgb_to_linear),
        None => {
            warnings.push(ExportWarning::InvalidColor {
                node_id: node_id.to_string(),
                value: value.to_string(),
            });
            fallback
        }
    }
}

fn material_factors(
    node_id: &str,
    material: &MaterialProps,
    texture: Option<u32>,
    warnings: &mut Vec<ExportWarning>,
) -> MaterialFactors {
    let [r, g, b] = linear_color(node_id, &material.color, [1.0; 3], warnings);
    let opacity = material.opacity.clamp(0.0, 1.0);
    let intensity = material.emissive_intensity.max(0.0);
    let emissive = linear_color(node_id, &material.emissive, [0.0; 3], warnings)
        .map(|c| (c * intensity).clamp(0.0, 1.0));

    MaterialFactors {
        base_color: [r, g, b, opacity],
        emissive,
        metallic: material.metalness.clamp(0.0, 1.0),
        roughness: material.roughness.clamp(0.0, 1.0),
        blend: material.transparent || opacity < 1.0,
        double_sided: material.double_sided,
        texture,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::{InMemoryAssets, NoAssets};
    use crate::components::{ComponentRegistry, SceneResolver};
    use crate::scene::{ComponentEntry, GameObject};
    use serde_json::json;

    fn geometry(kind: &str, args: serde_json::Value) -> ComponentEntry {
        ComponentEntry::new("Geometry")
            .with_property("type", json!(kind))
            .with_property("args", args)
    }

    fn transform(position: [f32; 3]) -> ComponentEntry {
        ComponentEntry::new("Transform").with_property("position", json!(position))
    }

    fn resolve(root: GameObject) -> ResolvedScene {
        let registry = ComponentRegistry::with_builtins();
        SceneResolver::new().resolve(&root.into_shared(), &registry)
    }

    fn node_names(gltf: &gltf::Gltf) -> Vec<String> {
        gltf.nodes()
            .filter_map(|n| n.name().map(str::to_string))
            .collect()
    }

    fn scenario_e() -> GameObject {
        GameObject::new("root")
            .with_child(
                GameObject::new("disabled")
                    .with_disabled(true)
                    .with_component("geometry", geometry("box", json!([1, 1, 1]))),
            )
            .with_child(
                GameObject::new("hidden")
                    .with_hidden(true)
                    .with_component("geometry", geometry("sphere", json!([1]))),
            )
            .with_child(
                GameObject::new("visible")
                    .with_component("transform", transform([0.0, 2.0, 0.0]))
                    .with_component("geometry", geometry("cylinder", json!([0.5, 0.5, 2]))),
            )
    }

    #[test]
    fn test_disabled_and_hidden_children_excluded() {
        let scene = resolve(scenario_e());
        let export = export_glb_blocking(&scene, &NoAssets, &ExportConfig::default()).unwrap();
        assert!(export.warnings.is_empty());

        let gltf = gltf::Gltf::from_slice(&export.data).unwrap();
        assert_eq!(node_names(&gltf), vec!["root", "visible"]);
        assert_eq!(gltf.meshes().count(), 1);

        let visible = gltf.nodes().find(|n| n.name() == Some("visible")).unwrap();
        assert!(visible.mesh().is_some());
        let (translation, _, _) = visible.transform().decomposed();
        assert_eq!(translation, [0.0, 2.0, 0.0]);

        let root = gltf.default_scene().unwrap().nodes().next().unwrap();
        assert_eq!(root.name(), Some("root"));
        assert_eq!(root.children().count(), 1);
    }

    #[test]
    fn test_include_hidden() {
        let scene = resolve(scenario_e());
        let config = ExportConfig::default().with_include_hidden(true);
        let export = export_glb_blocking(&scene, &NoAssets, &config).unwrap();
        let gltf = gltf::Gltf::from_slice(&export.data).unwrap();
        assert_eq!(node_names(&gltf), vec!["root", "hidden", "visible"]);
    }

    #[test]
    fn test_export_is_deterministic() {
        let scene = resolve(scenario_e());
        let config = ExportConfig::default();
        let a = export_glb_blocking(&scene, &NoAssets, &config).unwrap();
        let b = export_glb_blocking(&scene, &NoAssets, &config).unwrap();
        assert_eq!(a.data, b.data);
    }

    #[test]
    fn test_shared_meshes_and_materials() {
        let root = GameObject::new("root")
            .with_child(GameObject::new("a").with_component("geometry", geometry("box", json!([1, 1, 1]))))
            .with_child(GameObject::new("b").with_component("geometry", geometry("box", json!([1, 1, 1]))))
            .with_child(
                GameObject::new("c")
                    .with_component("geometry", geometry("box", json!([2, 1, 1])))
                    .with_component(
                        "material",
                        ComponentEntry::new("Material").with_property("opacity", json!(0.5)),
                    ),
            );
        let export = export_glb_blocking(&resolve(root), &NoAssets, &ExportConfig::default()).unwrap();
        let gltf = gltf::Gltf::from_slice(&export.data).unwrap();
        assert_eq!(gltf.meshes().count(), 2);
        assert_eq!(gltf.materials().count(), 2);

        let blended = gltf
            .materials()
            .filter(|m| m.alpha_mode() == gltf::material::AlphaMode::Blend)
            .count();
        assert_eq!(blended, 1);
    }

    #[test]
    fn test_material_color_is_linear() {
        let root = GameObject::new("root")
            .with_component("geometry", geometry("plane", json!([1, 1])))
            .with_component(
                "material",
                ComponentEntry::new("Material").with_property("color", json!("#ff0000")),
            );
        let export = export_glb_blocking(&resolve(root), &NoAssets, &ExportConfig::default()).unwrap();
        let gltf = gltf::Gltf::from_slice(&export.data).unwrap();
        let material = gltf.materials().next().unwrap();
        let [r, g, b, a] = material.pbr_metallic_roughness().base_color_factor();
        assert!((r - 1.0).abs() < 1e-6);
        assert_eq!([g, b, a], [0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_invalid_color_warns() {
        let root = GameObject::new("root")
            .with_component("geometry", geometry("box", json!([])))
            .with_component(
                "material",
                ComponentEntry::new("Material").with_property("color", json!("not-a-color")),
            );
        let export = export_glb_blocking(&resolve(root), &NoAssets, &ExportConfig::default()).unwrap();
        assert!(matches!(
            export.warnings.as_slice(),
            [ExportWarning::InvalidColor { value, .. }] if value == "not-a-color"
        ));
    }

    #[test]
    fn test_degenerate_geometry_skipped() {
        let root = GameObject::new("root")
            .with_child(GameObject::new("flat").with_component("geometry", geometry("box", json!([1, 0, 1]))))
            .with_child(GameObject::new("ok").with_component("geometry", geometry("sphere", json!([1]))));
        let export = export_glb_blocking(&resolve(root), &NoAssets, &ExportConfig::default()).unwrap();

        assert_eq!(export.warnings.len(), 1);
        assert_eq!(export.warnings[0].node_id(), "flat");

        let gltf = gltf::Gltf::from_slice(&export.data).unwrap();
        let flat = gltf.nodes().find(|n| n.name() == Some("flat")).unwrap();
        assert!(flat.mesh().is_none());
        assert_eq!(gltf.meshes().count(), 1);
    }

    #[test]
    fn test_unresolvable_root_fails() {
        let root = GameObject::new("root").with_component(
            "transform",
            ComponentEntry::new("Transform").with_property("position", json!("up")),
        );
        let err = export_glb_blocking(&resolve(root), &NoAssets, &ExportConfig::default()).unwrap_err();
        assert!(matches!(err, ExportError::UnresolvableRoot { node_id, .. } if node_id == "root"));
    }

    #[test]
    fn test_invalid_child_geometry_is_a_warning() {
        let root = GameObject::new("root").with_child(
            GameObject::new("bad").with_component("geometry", geometry("torus", json!([1]))),
        );
        let export = export_glb_blocking(&resolve(root), &NoAssets, &ExportConfig::default()).unwrap();
        assert!(matches!(
            export.warnings.as_slice(),
            [ExportWarning::SkippedGeometry { node_id, .. }] if node_id == "bad"
        ));
    }

    #[test]
    fn test_models_and_textures() {
        let mut assets = InMemoryAssets::new();
        let tree = AssetPath::parse("/models/tree.glb", "public").unwrap();
        assets.add_model(tree, Mesh::cuboid(1.0, 3.0, 1.0));
        let bark = AssetPath::parse("/textures/bark.png", "public").unwrap();
        assets.add_texture(bark, TextureData::png(vec![0x89, b'P', b'N', b'G', 0, 0, 0, 0]));

        let model = |id: &str, file: &str| {
            GameObject::new(id)
                .with_component(
                    "model",
                    ComponentEntry::new("Model").with_property("filename", json!(file)),
                )
                .with_component(
                    "material",
                    ComponentEntry::new("Material").with_property("map", json!("/textures/bark.png")),
                )
        };
        let root = GameObject::new("root")
            .with_child(model("tree-1", "/models/tree.glb"))
            .with_child(model("tree-2", "public/models/tree.glb"))
            .with_child(model("rock", "/models/rock.glb"));

        let export = export_glb_blocking(&resolve(root), &assets, &ExportConfig::default()).unwrap();
        assert!(matches!(
            export.warnings.as_slice(),
            [ExportWarning::MissingModel { node_id, path }] if node_id == "rock" && path == "/models/rock.glb"
        ));

        let gltf = gltf::Gltf::from_slice(&export.data).unwrap();
        assert_eq!(gltf.meshes().count(), 1);
        assert_eq!(gltf.images().count(), 1);
        let material = gltf.materials().next().unwrap();
        assert!(material.pbr_metallic_roughness().base_color_texture().is_some());

        let rock = gltf.nodes().find(|n| n.name() == Some("rock")).unwrap();
        assert!(rock.mesh().is_none());
    }

    #[test]
    fn test_missing_model_falls_back_to_geometry() {
        let root = GameObject::new("root")
            .with_component(
                "model",
                ComponentEntry::new("Model").with_property("filename", json!("/models/gone.glb")),
            )
            .with_component("geometry", geometry("capsule", json!([0.5, 1])));
        let export = export_glb_blocking(&resolve(root), &NoAssets, &ExportConfig::default()).unwrap();
        assert_eq!(export.warnings.len(), 1);

        let gltf = gltf::Gltf::from_slice(&export.data).unwrap();
        assert!(gltf.nodes().next().unwrap().mesh().is_some());
    }

    #[test]
    fn test_primitive_mesh_rejects_non_finite() {
        let geometry = GeometryProps {
            kind: GeometryKind::Sphere,
            args: vec![f32::NAN],
        };
        assert!(primitive_mesh(&geometry).is_err());

        let cone = GeometryProps {
            kind: GeometryKind::Cone,
            args: vec![1.0, 2.0],
        };
        assert!(!primitive_mesh(&cone).unwrap().is_empty());
    }

    #[test]
    fn test_oversized_segment_counts_skipped() {
        let root = GameObject::new("root")
            .with_child(
                GameObject::new("pill").with_component("geometry", geometry("capsule", json!([0.5, 1.0, 3e9, 8]))),
            )
            .with_child(
                GameObject::new("ball").with_component("geometry", geometry("sphere", json!([1, 100000, 8]))),
            )
            .with_child(GameObject::new("ok").with_component("geometry", geometry("capsule", json!([0.5, 1.0, 4, 8]))));
        let export = export_glb_blocking(&resolve(root), &NoAssets, &ExportConfig::default()).unwrap();

        let skipped: Vec<&str> = export.warnings.iter().map(ExportWarning::node_id).collect();
        assert_eq!(skipped, vec!["pill", "ball"]);
        assert!(
            export
                .warnings
                .iter()
                .all(|w| matches!(w, ExportWarning::SkippedGeometry { .. }))
        );

        let gltf = gltf::Gltf::from_slice(&export.data).unwrap();
        assert_eq!(gltf.meshes().count(), 1);
    }

    #[test]
    fn test_config_defaults() {
        let config: ExportConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, ExportConfig::default());
        assert_eq!(config.generator, "prefab_engine");
        assert!(!config.include_hidden);
    }
}
