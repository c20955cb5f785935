//! Binary glTF assembly
//!
//! Accumulates the JSON document and a single binary buffer, then writes the
//! GLB container (header, JSON chunk, BIN chunk).

use std::collections::BTreeMap;

use gltf::json as gj;
use gj::validation::{Checked, USize64};
use rustc_hash::FxHashMap;

use super::error::ExportError;
use super::mesh::{Mesh, Vertex};
use crate::assets::TextureData;
use crate::components::TransformProps;

/// Material factors after color conversion
#[derive(Debug, Clone, PartialEq)]
pub(super) struct MaterialFactors {
    /// Linear RGB plus opacity
    pub base_color: [f32; 4],
    /// Linear RGB, already scaled by intensity
    pub emissive: [f32; 3],
    pub metallic: f32,
    pub roughness: f32,
    pub blend: bool,
    pub double_sided: bool,
    pub texture: Option<u32>,
}

pub(super) struct GlbBuilder {
    root: gj::Root,
    buffer_data: Vec<u8>,
    material_map: FxHashMap<String, u32>,
    mesh_map: FxHashMap<String, u32>,
    texture_map: FxHashMap<String, u32>,
}

impl GlbBuilder {
    pub(super) fn new(generator: &str) -> Self {
        let mut root = gj::Root::default();
        root.asset = gj::Asset {
            generator: Some(generator.into()),
            version: "2.0".into(),
            ..Default::default()
        };
        Self {
            root,
            buffer_data: Vec::new(),
            material_map: FxHashMap::default(),
            mesh_map: FxHashMap::default(),
            texture_map: FxHashMap::default(),
        }
    }

    /// Embed an image and return its texture index, once per path
    pub(super) fn push_texture(&mut self, path: &str, texture: &TextureData) -> u32 {
        if let Some(&idx) = self.texture_map.get(path) {
            return idx;
        }

        let view_idx = self.push_buffer_view(&texture.bytes, None, None);
        let image_idx = self.root.images.len() as u32;
        self.root.images.push(gj::Image {
            buffer_view: Some(gj::Index::new(view_idx)),
            mime_type: Some(gj::image::MimeType(texture.mime_type.clone())),
            name: Some(path.to_string()),
            uri: None,
            extensions: None,
            extras: gj::Extras::default(),
        });

        let tex_idx = self.root.textures.len() as u32;
        self.root.textures.push(gj::Texture {
            name: None,
            sampler: None,
            source: gj::Index::new(image_idx),
            extensions: None,
            extras: gj::Extras::default(),
        });
        self.texture_map.insert(path.to_string(), tex_idx);
        tex_idx
    }

    /// Add a material, reusing an identical one
    pub(super) fn push_material(&mut self, factors: &MaterialFactors) -> u32 {
        let key = format!("{factors:?}");
        if let Some(&idx) = self.material_map.get(&key) {
            return idx;
        }

        let alpha_mode = if factors.blend {
            gj::material::AlphaMode::Blend
        } else {
            gj::material::AlphaMode::Opaque
        };
        let base_color_texture = factors.texture.map(|idx| gj::texture::Info {
            index: gj::Index::new(idx),
            tex_coord: 0,
            extensions: None,
            extras: gj::Extras::default(),
        });

        let pbr = gj::material::PbrMetallicRoughness {
            base_color_factor: gj::material::PbrBaseColorFactor(factors.base_color),
            base_color_texture,
            metallic_factor: gj::material::StrengthFactor(factors.metallic),
            roughness_factor: gj::material::StrengthFactor(factors.roughness),
            metallic_roughness_texture: None,
            extensions: None,
            extras: gj::Extras::default(),
        };

        let idx = self.root.materials.len() as u32;
        self.root.materials.push(gj::Material {
            name: None,
            alpha_cutoff: None,
            alpha_mode: Checked::Valid(alpha_mode),
            double_sided: factors.double_sided,
            pbr_metallic_roughness: pbr,
            normal_texture: None,
            occlusion_texture: None,
            emissive_texture: None,
            emissive_factor: gj::material::EmissiveFactor(factors.emissive),
            extensions: None,
            extras: gj::Extras::default(),
        });
        self.material_map.insert(key, idx);
        idx
    }

    /// Add a mesh under `key`, reusing the one already stored under it
    pub(super) fn push_mesh(&mut self, key: String, mesh: &Mesh, material: u32) -> u32 {
        let key = format!("{key}|{material}");
        if let Some(&idx) = self.mesh_map.get(&key) {
            return idx;
        }

        let vertex_count = mesh.vertices.len() as u32;
        let vertex_view = self.push_buffer_view(
            mesh.vertex_bytes(),
            Some(Vertex::STRIDE),
            Some(gj::buffer::Target::ArrayBuffer),
        );
        let (min, max) = mesh
            .bounds()
            .map(|(min, max)| (json_f32_array(&min), json_f32_array(&max)))
            .unzip();

        let mut attributes = BTreeMap::new();
        let layout = [
            (gj::mesh::Semantic::Positions, 0, gj::accessor::Type::Vec3, min, max),
            (gj::mesh::Semantic::Normals, 12, gj::accessor::Type::Vec3, None, None),
            (gj::mesh::Semantic::TexCoords(0), 24, gj::accessor::Type::Vec2, None, None),
        ];
        for (semantic, offset, type_, min, max) in layout {
            let acc_idx = self.push_accessor(
                vertex_view,
                offset,
                vertex_count,
                gj::accessor::ComponentType::F32,
                type_,
                min,
                max,
            );
            attributes.insert(Checked::Valid(semantic), gj::Index::new(acc_idx));
        }

        let index_view = self.push_buffer_view(
            mesh.index_bytes(),
            None,
            Some(gj::buffer::Target::ElementArrayBuffer),
        );
        let indices = self.push_accessor(
            index_view,
            0,
            mesh.index_count(),
            gj::accessor::ComponentType::U32,
            gj::accessor::Type::Scalar,
            None,
            None,
        );

        let primitive = gj::mesh::Primitive {
            attributes,
            extensions: None,
            extras: gj::Extras::default(),
            indices: Some(gj::Index::new(indices)),
            material: Some(gj::Index::new(material)),
            mode: Checked::Valid(gj::mesh::Mode::Triangles),
            targets: None,
        };

        let idx = self.root.meshes.len() as u32;
        self.root.meshes.push(gj::Mesh {
            name: None,
            primitives: vec![primitive],
            weights: None,
            extensions: None,
            extras: gj::Extras::default(),
        });
        self.mesh_map.insert(key, idx);
        idx
    }

    /// Reserve a node slot so parents precede their children
    pub(super) fn reserve_node(&mut self) -> u32 {
        let idx = self.root.nodes.len() as u32;
        self.root.nodes.push(gj::Node::default());
        idx
    }

    /// Fill a reserved node
    pub(super) fn set_node(
        &mut self,
        idx: u32,
        name: &str,
        transform: &TransformProps,
        mesh: Option<u32>,
        children: Vec<u32>,
    ) {
        let is_identity = transform.is_identity();
        let rotation = transform.quat();
        self.root.nodes[idx as usize] = gj::Node {
            name: Some(name.to_string()),
            children: if children.is_empty() {
                None
            } else {
                Some(children.into_iter().map(gj::Index::new).collect())
            },
            mesh: mesh.map(gj::Index::new),
            translation: (!is_identity).then_some(transform.position),
            rotation: (!is_identity).then_some(gj::scene::UnitQuaternion(rotation.to_array())),
            scale: (!is_identity).then_some(transform.scale),
            ..gj::Node::default()
        };
    }

    /// Close the document with one scene and write the GLB container
    pub(super) fn finish(mut self, scene_nodes: Vec<u32>) -> Result<Vec<u8>, ExportError> {
        self.root.scenes.push(gj::Scene {
            name: None,
            nodes: scene_nodes.into_iter().map(gj::Index::new).collect(),
            extensions: None,
            extras: gj::Extras::default(),
        });
        self.root.scene = Some(gj::Index::new(0));

        self.align_buffer();
        if !self.buffer_data.is_empty() {
            self.root.buffers.push(gj::Buffer {
                byte_length: USize64(self.buffer_data.len() as u64),
                name: None,
                uri: None,
                extensions: None,
                extras: gj::Extras::default(),
            });
        }

        let json_bytes = self
            .root
            .to_vec()
            .map_err(|e| ExportError::SerializeError(e.to_string()))?;

        let json_pad = (4 - (json_bytes.len() % 4)) % 4;
        let json_chunk_len = json_bytes.len() + json_pad;

        let has_bin = !self.buffer_data.is_empty();
        let bin_chunk_len = self.buffer_data.len();
        let total_length = 12 + 8 + json_chunk_len + if has_bin { 8 + bin_chunk_len } else { 0 };

        let mut glb = Vec::with_capacity(total_length);

        // Header
        glb.extend_from_slice(&0x4654_6C67_u32.to_le_bytes()); // magic "glTF"
        glb.extend_from_slice(&2_u32.to_le_bytes()); // version
        glb.extend_from_slice(&(total_length as u32).to_le_bytes());

        // JSON chunk
        glb.extend_from_slice(&(json_chunk_len as u32).to_le_bytes());
        glb.extend_from_slice(&0x4E4F_534A_u32.to_le_bytes()); // "JSON"
        glb.extend_from_slice(&json_bytes);
        glb.extend(std::iter::repeat_n(b' ', json_pad));

        // BIN chunk, already 4-byte aligned
        if has_bin {
            glb.extend_from_slice(&(bin_chunk_len as u32).to_le_bytes());
            glb.extend_from_slice(&0x004E_4942_u32.to_le_bytes()); // "BIN\0"
            glb.extend_from_slice(&self.buffer_data);
        }

        Ok(glb)
    }

    fn align_buffer(&mut self) {
        let padding = (4 - (self.buffer_data.len() % 4)) % 4;
        self.buffer_data.extend(std::iter::repeat_n(0_u8, padding));
    }

    fn push_buffer_view(
        &mut self,
        data: &[u8],
        stride: Option<usize>,
        target: Option<gj::buffer::Target>,
    ) -> u32 {
        self.align_buffer();
        let offset = self.buffer_data.len();
        self.buffer_data.extend_from_slice(data);

        let view_idx = self.root.buffer_views.len() as u32;
        self.root.buffer_views.push(gj::buffer::View {
            buffer: gj::Index::new(0),
            byte_offset: Some(USize64(offset as u64)),
            byte_length: USize64(data.len() as u64),
            byte_stride: stride.map(gj::buffer::Stride),
            target: target.map(Checked::Valid),
            name: None,
            extensions: None,
            extras: gj::Extras::default(),
        });
        view_idx
    }

    #[allow(clippy::too_many_arguments)]
    fn push_accessor(
        &mut self,
        buffer_view: u32,
        byte_offset: u32,
        count: u32,
        component_type: gj::accessor::ComponentType,
        type_: gj::accessor::Type,
        min: Option<gj::Value>,
        max: Option<gj::Value>,
    ) -> u32 {
        let acc_idx = self.root.accessors.len() as u32;
        self.root.accessors.push(gj::Accessor {
            buffer_view: Some(gj::Index::new(buffer_view)),
            byte_offset: Some(USize64(u64::from(byte_offset))),
            count: USize64(u64::from(count)),
            component_type: Checked::Valid(gj::accessor::GenericComponentType(component_type)),
            type_: Checked::Valid(type_),
            min,
            max,
            normalized: false,
            name: None,
            sparse: None,
            extensions: None,
            extras: gj::Extras::default(),
        });
        acc_idx
    }
}

fn json_f32_array(values: &[f32]) -> gj::Value {
    gj::Value::Array(values.iter().map(|&v| gj::Value::from(f64::from(v))).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn factors() -> MaterialFactors {
        MaterialFactors {
            base_color: [1.0; 4],
            emissive: [0.0; 3],
            metallic: 0.0,
            roughness: 1.0,
            blend: false,
            double_sided: false,
            texture: None,
        }
    }

    #[test]
    fn test_glb_header_and_alignment() {
        let mut builder = GlbBuilder::new("test");
        let material = builder.push_material(&factors());
        let mesh = builder.push_mesh("box".to_string(), &Mesh::cuboid(1.0, 1.0, 1.0), material);
        let node = builder.reserve_node();
        builder.set_node(node, "cube", &TransformProps::default(), Some(mesh), Vec::new());
        let glb = builder.finish(vec![node]).unwrap();

        assert_eq!(&glb[0..4], b"glTF");
        assert_eq!(u32::from_le_bytes([glb[4], glb[5], glb[6], glb[7]]), 2);
        assert_eq!(u32::from_le_bytes([glb[8], glb[9], glb[10], glb[11]]) as usize, glb.len());
        assert_eq!(glb.len() % 4, 0);
        assert_eq!(&glb[16..20], b"JSON");
    }

    #[test]
    fn test_dedup() {
        let mut builder = GlbBuilder::new("test");
        let a = builder.push_material(&factors());
        let b = builder.push_material(&factors());
        let c = builder.push_material(&MaterialFactors {
            double_sided: true,
            ..factors()
        });
        assert_eq!(a, b);
        assert_ne!(a, c);

        let cube = Mesh::cuboid(1.0, 1.0, 1.0);
        let m1 = builder.push_mesh("box".to_string(), &cube, a);
        let m2 = builder.push_mesh("box".to_string(), &cube, a);
        let m3 = builder.push_mesh("box".to_string(), &cube, c);
        assert_eq!(m1, m2);
        assert_ne!(m1, m3);

        let texture = TextureData::png(vec![0x89, b'P', b'N', b'G']);
        assert_eq!(
            builder.push_texture("/a.png", &texture),
            builder.push_texture("/a.png", &texture)
        );
    }

    #[test]
    fn test_empty_document_parses() {
        let builder = GlbBuilder::new("test");
        let glb = builder.finish(Vec::new()).unwrap();
        let gltf = gltf::Gltf::from_slice(&glb).unwrap();
        assert_eq!(gltf.nodes().count(), 0);
        assert!(gltf.blob.is_none());
    }
}
