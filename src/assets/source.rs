//! Asset sources consumed by resolution and export
//!
//! A source hands back decoded meshes for models and encoded bytes for
//! textures.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use super::path::AssetPath;
use crate::export::Mesh;

/// Encoded image bytes plus their mime type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureData {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl TextureData {
    /// PNG-encoded texture
    #[must_use]
    pub fn png(bytes: Vec<u8>) -> Self {
        Self {
            mime_type: "image/png".to_string(),
            bytes,
        }
    }

    /// Identify PNG or JPEG data by its signature
    ///
    /// Other formats cannot be embedded in a GLB and are rejected.
    #[must_use]
    pub fn from_encoded(bytes: Vec<u8>) -> Option<Self> {
        let mime_type = match image::guess_format(&bytes).ok()? {
            image::ImageFormat::Png => "image/png",
            image::ImageFormat::Jpeg => "image/jpeg",
            _ => return None,
        };
        Some(Self {
            mime_type: mime_type.to_string(),
            bytes,
        })
    }

    /// Whether the data can be embedded as a glTF image
    #[must_use]
    pub fn is_embeddable(&self) -> bool {
        matches!(self.mime_type.as_str(), "image/png" | "image/jpeg")
    }

    /// Guess the mime type from a path's extension
    #[must_use]
    pub fn mime_for(path: &AssetPath) -> Option<&'static str> {
        match path.extension()?.as_str() {
            "png" => Some("image/png"),
            "jpg" | "jpeg" => Some("image/jpeg"),
            _ => None,
        }
    }
}

/// Something that can provide decoded assets by path
///
/// Fetches may suspend; `None` means the asset is missing, which callers
/// treat as a non-fatal condition.
pub trait AssetSource {
    /// Fetch a decoded model mesh
    fn fetch_model(&self, path: &AssetPath) -> impl Future<Output = Option<Arc<Mesh>>>;

    /// Fetch encoded texture bytes
    fn fetch_texture(&self, path: &AssetPath) -> impl Future<Output = Option<Arc<TextureData>>>;
}

/// Source with nothing in it
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAssets;

impl AssetSource for NoAssets {
    async fn fetch_model(&self, _path: &AssetPath) -> Option<Arc<Mesh>> {
        None
    }

    async fn fetch_texture(&self, _path: &AssetPath) -> Option<Arc<TextureData>> {
        None
    }
}

/// Preloaded assets indexed by canonical path
#[derive(Debug, Default)]
pub struct InMemoryAssets {
    models: FxHashMap<AssetPath, Arc<Mesh>>,
    textures: FxHashMap<AssetPath, Arc<TextureData>>,
}

impl InMemoryAssets {
    /// Create an empty source
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a model. If the path is already present the existing one is kept.
    pub fn add_model(&mut self, path: AssetPath, mesh: Mesh) -> Arc<Mesh> {
        self.models.entry(path).or_insert_with(|| Arc::new(mesh)).clone()
    }

    /// Add a texture. If the path is already present the existing one is kept.
    pub fn add_texture(&mut self, path: AssetPath, texture: TextureData) -> Arc<TextureData> {
        self.textures
            .entry(path)
            .or_insert_with(|| Arc::new(texture))
            .clone()
    }

    /// Check if a model or texture exists at `path`
    #[must_use]
    pub fn contains(&self, path: &AssetPath) -> bool {
        self.models.contains_key(path) || self.textures.contains_key(path)
    }

    /// Remove whatever is stored at `path`
    pub fn remove(&mut self, path: &AssetPath) -> bool {
        let model = self.models.remove(path).is_some();
        let texture = self.textures.remove(path).is_some();
        model || texture
    }

    /// Number of stored assets
    #[must_use]
    pub fn len(&self) -> usize {
        self.models.len() + self.textures.len()
    }

    /// Check if nothing is stored
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop everything
    pub fn clear(&mut self) {
        self.models.clear();
        self.textures.clear();
    }
}

impl AssetSource for InMemoryAssets {
    async fn fetch_model(&self, path: &AssetPath) -> Option<Arc<Mesh>> {
        self.models.get(path).cloned()
    }

    async fn fetch_texture(&self, path: &AssetPath) -> Option<Arc<TextureData>> {
        self.textures.get(path).cloned()
    }
}

/// Reads model and texture files from the public asset directory on disk
///
/// Models must be GLB or glTF with embedded buffers; they are flattened into
/// one mesh.
#[derive(Debug, Clone)]
pub struct DirectoryAssets {
    asset_dir: PathBuf,
}

impl DirectoryAssets {
    /// Serve files below `asset_dir`
    #[must_use]
    pub fn new(asset_dir: impl Into<PathBuf>) -> Self {
        Self {
            asset_dir: asset_dir.into(),
        }
    }
}

impl AssetSource for DirectoryAssets {
    async fn fetch_model(&self, path: &AssetPath) -> Option<Arc<Mesh>> {
        let disk_path = path.to_disk_path(&self.asset_dir);
        let bytes = match std::fs::read(&disk_path) {
            Ok(bytes) => bytes,
            Err(e) => {
                log::debug!("Failed to read model {}: {e}", disk_path.display());
                return None;
            }
        };
        match Mesh::from_gltf_slice(&bytes) {
            Ok(mesh) if !mesh.is_empty() => Some(Arc::new(mesh)),
            Ok(_) => {
                log::warn!("Model {} has no triangles", disk_path.display());
                None
            }
            Err(e) => {
                log::warn!("Failed to decode model {}: {e}", disk_path.display());
                None
            }
        }
    }

    async fn fetch_texture(&self, path: &AssetPath) -> Option<Arc<TextureData>> {
        TextureData::mime_for(path)?;
        let disk_path = path.to_disk_path(&self.asset_dir);
        let bytes = match std::fs::read(&disk_path) {
            Ok(bytes) => bytes,
            Err(e) => {
                log::debug!("Failed to read texture {}: {e}", disk_path.display());
                return None;
            }
        };
        let texture = TextureData::from_encoded(bytes);
        if texture.is_none() {
            log::warn!("Texture {} is neither PNG nor JPEG", disk_path.display());
        }
        texture.map(Arc::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(p: &str) -> AssetPath {
        AssetPath::parse(p, "public").unwrap()
    }

    #[test]
    fn test_path_deduplication() {
        let mut assets = InMemoryAssets::new();
        let first = assets.add_model(path("/models/box.glb"), Mesh::cuboid(1.0, 1.0, 1.0));
        let second = assets.add_model(path("public/models/box.glb"), Mesh::plane(1.0, 1.0));

        // Same canonical path, first one wins
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(assets.len(), 1);
    }

    #[test]
    fn test_fetch() {
        let mut assets = InMemoryAssets::new();
        assets.add_texture(path("/textures/floor.png"), TextureData::png(vec![1, 2, 3]));

        let texture = pollster::block_on(assets.fetch_texture(&path("/textures/floor.png")));
        assert_eq!(texture.unwrap().bytes, vec![1, 2, 3]);
        assert!(pollster::block_on(assets.fetch_model(&path("/textures/floor.png"))).is_none());
        assert!(pollster::block_on(NoAssets.fetch_texture(&path("/textures/floor.png"))).is_none());
    }

    #[test]
    fn test_remove_and_clear() {
        let mut assets = InMemoryAssets::new();
        assets.add_texture(path("/a.png"), TextureData::png(vec![]));
        assets.add_model(path("/a.glb"), Mesh::new());
        assert!(assets.remove(&path("/a.png")));
        assert!(!assets.contains(&path("/a.png")));
        assets.clear();
        assert!(assets.is_empty());
    }

    #[test]
    fn test_mime_for() {
        assert_eq!(TextureData::mime_for(&path("/a.PNG")), Some("image/png"));
        assert_eq!(TextureData::mime_for(&path("/a.jpeg")), Some("image/jpeg"));
        assert_eq!(TextureData::mime_for(&path("/a.ttf")), None);
    }

    #[test]
    fn test_from_encoded() {
        let png = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];
        let texture = TextureData::from_encoded(png.to_vec()).unwrap();
        assert_eq!(texture.mime_type, "image/png");
        assert!(texture.is_embeddable());

        let jpeg = [0xFF, 0xD8, 0xFF, 0xE0, 0, 0x10];
        assert_eq!(TextureData::from_encoded(jpeg.to_vec()).unwrap().mime_type, "image/jpeg");
        assert!(TextureData::from_encoded(b"plain text".to_vec()).is_none());
    }

    #[test]
    fn test_directory_reads_texture() {
        let dir = std::env::temp_dir().join("prefab_engine_directory_assets");
        std::fs::create_dir_all(dir.join("textures")).unwrap();
        let png = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];
        std::fs::write(dir.join("textures/floor.png"), png).unwrap();

        let assets = DirectoryAssets::new(&dir);
        let texture = pollster::block_on(assets.fetch_texture(&path("/textures/floor.png"))).unwrap();
        assert_eq!(texture.bytes, png);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_directory_missing_file() {
        let assets = DirectoryAssets::new("/nonexistent-asset-dir");
        assert!(pollster::block_on(assets.fetch_texture(&path("/a.png"))).is_none());
        assert!(pollster::block_on(assets.fetch_model(&path("/a.glb"))).is_none());
    }

    #[test]
    fn test_directory_decodes_exported_model() {
        use crate::components::{ComponentRegistry, SceneResolver};
        use crate::export::{ExportConfig, export_glb_blocking};
        use crate::scene::{ComponentEntry, GameObject};
        use serde_json::json;

        let root = GameObject::new("rock")
            .with_component(
                "transform",
                ComponentEntry::new("Transform").with_property("position", json!([0.0, 2.0, 0.0])),
            )
            .with_component(
                "geometry",
                ComponentEntry::new("Geometry")
                    .with_property("type", json!("box"))
                    .with_property("args", json!([1.0, 1.0, 1.0])),
            )
            .into_shared();
        let scene = SceneResolver::new().resolve(&root, &ComponentRegistry::with_builtins());
        let glb = export_glb_blocking(&scene, &NoAssets, &ExportConfig::default()).unwrap();

        let dir = std::env::temp_dir().join("prefab_engine_directory_models");
        std::fs::create_dir_all(dir.join("models")).unwrap();
        std::fs::write(dir.join("models/rock.glb"), &glb.data).unwrap();
        std::fs::write(dir.join("models/broken.glb"), b"glTF garbage").unwrap();

        let assets = DirectoryAssets::new(&dir);
        let mesh = pollster::block_on(assets.fetch_model(&path("/models/rock.glb"))).unwrap();
        let cube = Mesh::cuboid(1.0, 1.0, 1.0);
        assert_eq!(mesh.vertices.len(), cube.vertices.len());
        assert_eq!(mesh.indices, cube.indices);
        // node translation is baked in
        let (min, max) = mesh.bounds().unwrap();
        assert!((min[1] - 1.5).abs() < 1e-5);
        assert!((max[1] - 2.5).abs() < 1e-5);

        assert!(pollster::block_on(assets.fetch_model(&path("/models/broken.glb"))).is_none());
        std::fs::remove_dir_all(&dir).ok();
    }
}
