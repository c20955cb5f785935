//! Mesh and vertex definitions
//!
//! CPU-side triangle meshes generated from Geometry components, laid out so
//! that the vertex array can be copied straight into a binary buffer.

use bytemuck::{Pod, Zeroable};
use glam::{Mat3, Mat4, Vec3};

/// Vertex with position, normal, and UV coordinates
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

impl Vertex {
    /// Create a new vertex
    pub const fn new(position: [f32; 3], normal: [f32; 3], uv: [f32; 2]) -> Self {
        Self {
            position,
            normal,
            uv,
        }
    }

    /// Byte size of one interleaved vertex
    pub const STRIDE: usize = std::mem::size_of::<Vertex>();
}

/// A triangle mesh with vertices and indices
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl Mesh {
    /// Create a new empty mesh
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mesh from vertices and indices
    pub fn from_data(vertices: Vec<Vertex>, indices: Vec<u32>) -> Self {
        Self { vertices, indices }
    }

    /// Create a box centered at origin
    pub fn cuboid(width: f32, height: f32, depth: f32) -> Self {
        let (x, y, z) = (width / 2.0, height / 2.0, depth / 2.0);
        let vertices = vec![
            // Front face
            Vertex::new([-x, -y, z], [0.0, 0.0, 1.0], [0.0, 0.0]),
            Vertex::new([x, -y, z], [0.0, 0.0, 1.0], [1.0, 0.0]),
            Vertex::new([x, y, z], [0.0, 0.0, 1.0], [1.0, 1.0]),
            Vertex::new([-x, y, z], [0.0, 0.0, 1.0], [0.0, 1.0]),
            // Back face
            Vertex::new([x, -y, -z], [0.0, 0.0, -1.0], [0.0, 0.0]),
            Vertex::new([-x, -y, -z], [0.0, 0.0, -1.0], [1.0, 0.0]),
            Vertex::new([-x, y, -z], [0.0, 0.0, -1.0], [1.0, 1.0]),
            Vertex::new([x, y, -z], [0.0, 0.0, -1.0], [0.0, 1.0]),
            // Top face
            Vertex::new([-x, y, z], [0.0, 1.0, 0.0], [0.0, 0.0]),
            Vertex::new([x, y, z], [0.0, 1.0, 0.0], [1.0, 0.0]),
            Vertex::new([x, y, -z], [0.0, 1.0, 0.0], [1.0, 1.0]),
            Vertex::new([-x, y, -z], [0.0, 1.0, 0.0], [0.0, 1.0]),
            // Bottom face
            Vertex::new([-x, -y, -z], [0.0, -1.0, 0.0], [0.0, 0.0]),
            Vertex::new([x, -y, -z], [0.0, -1.0, 0.0], [1.0, 0.0]),
            Vertex::new([x, -y, z], [0.0, -1.0, 0.0], [1.0, 1.0]),
            Vertex::new([-x, -y, z], [0.0, -1.0, 0.0], [0.0, 1.0]),
            // Right face
            Vertex::new([x, -y, z], [1.0, 0.0, 0.0], [0.0, 0.0]),
            Vertex::new([x, -y, -z], [1.0, 0.0, 0.0], [1.0, 0.0]),
            Vertex::new([x, y, -z], [1.0, 0.0, 0.0], [1.0, 1.0]),
            Vertex::new([x, y, z], [1.0, 0.0, 0.0], [0.0, 1.0]),
            // Left face
            Vertex::new([-x, -y, -z], [-1.0, 0.0, 0.0], [0.0, 0.0]),
            Vertex::new([-x, -y, z], [-1.0, 0.0, 0.0], [1.0, 0.0]),
            Vertex::new([-x, y, z], [-1.0, 0.0, 0.0], [1.0, 1.0]),
            Vertex::new([-x, y, -z], [-1.0, 0.0, 0.0], [0.0, 1.0]),
        ];

        let indices = vec![
            0, 1, 2, 2, 3, 0, // Front
            4, 5, 6, 6, 7, 4, // Back
            8, 9, 10, 10, 11, 8, // Top
            12, 13, 14, 14, 15, 12, // Bottom
            16, 17, 18, 18, 19, 16, // Right
            20, 21, 22, 22, 23, 20, // Left
        ];

        Self::from_data(vertices, indices)
    }

    /// Create a plane in the XY plane facing +Z
    pub fn plane(width: f32, height: f32) -> Self {
        let (x, y) = (width / 2.0, height / 2.0);
        let vertices = vec![
            Vertex::new([-x, -y, 0.0], [0.0, 0.0, 1.0], [0.0, 0.0]),
            Vertex::new([x, -y, 0.0], [0.0, 0.0, 1.0], [1.0, 0.0]),
            Vertex::new([x, y, 0.0], [0.0, 0.0, 1.0], [1.0, 1.0]),
            Vertex::new([-x, y, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0]),
        ];

        let indices = vec![0, 1, 2, 2, 3, 0];

        Self::from_data(vertices, indices)
    }

    /// Upper bound on segments and rings of the round primitives
    pub const MAX_SEGMENTS: u32 = 256;

    /// Create a UV sphere
    pub fn sphere(radius: f32, segments: u32, rings: u32) -> Self {
        Self::capsule(radius, 0.0, segments, rings)
    }

    /// Create a capsule along Y: a sphere split at the equator and stretched by `length`
    pub fn capsule(radius: f32, length: f32, segments: u32, rings: u32) -> Self {
        let segments = segments.clamp(3, Self::MAX_SEGMENTS);
        let rings = rings.clamp(2, 2 * Self::MAX_SEGMENTS);
        let mut vertices = Vec::new();
        let mut indices = Vec::new();

        for ring in 0..=rings {
            let phi = std::f32::consts::PI * ring as f32 / rings as f32;
            let offset = if phi < std::f32::consts::FRAC_PI_2 {
                length / 2.0
            } else {
                -length / 2.0
            };
            let y = radius * phi.cos();
            let ring_radius = radius * phi.sin();

            for segment in 0..=segments {
                let theta = 2.0 * std::f32::consts::PI * segment as f32 / segments as f32;
                let x = ring_radius * theta.cos();
                let z = ring_radius * theta.sin();

                let normal = Vec3::new(x, y, z).normalize_or_zero();

                vertices.push(Vertex::new(
                    [x, y + offset, z],
                    normal.into(),
                    [segment as f32 / segments as f32, ring as f32 / rings as f32],
                ));
            }
        }

        for ring in 0..rings {
            for segment in 0..segments {
                let current = ring * (segments + 1) + segment;
                let next = current + segments + 1;

                indices.push(current);
                indices.push(current + 1);
                indices.push(next);

                indices.push(current + 1);
                indices.push(next + 1);
                indices.push(next);
            }
        }

        Self::from_data(vertices, indices)
    }

    /// Create a capped cylinder along Y (a cone when `radius_top` is 0)
    pub fn cylinder(radius_top: f32, radius_bottom: f32, height: f32, segments: u32) -> Self {
        let segments = segments.clamp(3, Self::MAX_SEGMENTS);
        let half = height / 2.0;
        let slope = (radius_bottom - radius_top) / height.max(f32::EPSILON);
        let mut vertices = Vec::new();
        let mut indices = Vec::new();

        // Side
        for (row, (y, radius)) in [(half, radius_top), (-half, radius_bottom)]
            .into_iter()
            .enumerate()
        {
            for segment in 0..=segments {
                let theta = 2.0 * std::f32::consts::PI * segment as f32 / segments as f32;
                let (sin, cos) = theta.sin_cos();
                let normal = Vec3::new(sin, slope, cos).normalize_or_zero();
                vertices.push(Vertex::new(
                    [radius * sin, y, radius * cos],
                    normal.into(),
                    [segment as f32 / segments as f32, row as f32],
                ));
            }
        }
        for segment in 0..segments {
            let top = segment;
            let bottom = segment + segments + 1;
            indices.extend_from_slice(&[top, bottom, top + 1, top + 1, bottom, bottom + 1]);
        }

        // Caps
        for (y, radius, normal_y) in [(half, radius_top, 1.0_f32), (-half, radius_bottom, -1.0)] {
            if radius <= 0.0 {
                continue;
            }
            let center = vertices.len() as u32;
            vertices.push(Vertex::new([0.0, y, 0.0], [0.0, normal_y, 0.0], [0.5, 0.5]));
            for segment in 0..=segments {
                let theta = 2.0 * std::f32::consts::PI * segment as f32 / segments as f32;
                let (sin, cos) = theta.sin_cos();
                vertices.push(Vertex::new(
                    [radius * sin, y, radius * cos],
                    [0.0, normal_y, 0.0],
                    [0.5 + 0.5 * sin, 0.5 + 0.5 * cos],
                ));
            }
            for segment in 0..segments {
                let a = center + 1 + segment;
                let b = a + 1;
                if normal_y > 0.0 {
                    indices.extend_from_slice(&[center, a, b]);
                } else {
                    indices.extend_from_slice(&[center, b, a]);
                }
            }
        }

        Self::from_data(vertices, indices)
    }

    /// Decode a GLB (or glTF with embedded buffers) into one mesh
    ///
    /// Triangle primitives of the default scene are baked with their node's
    /// world transform. Primitives without positions or with out-of-range
    /// indices are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be parsed or its buffers resolved
    pub fn from_gltf_slice(bytes: &[u8]) -> Result<Self, gltf::Error> {
        let (document, buffers, _) = gltf::import_slice(bytes)?;
        let mut mesh = Self::new();
        if let Some(scene) = document.default_scene().or_else(|| document.scenes().next()) {
            for node in scene.nodes() {
                mesh.append_gltf_node(&node, Mat4::IDENTITY, &buffers);
            }
        }
        Ok(mesh)
    }

    fn append_gltf_node(&mut self, node: &gltf::Node<'_>, parent: Mat4, buffers: &[gltf::buffer::Data]) {
        let world = parent * Mat4::from_cols_array_2d(&node.transform().matrix());
        if let Some(source) = node.mesh() {
            let normal_matrix = Mat3::from_mat4(world).inverse().transpose();
            for primitive in source.primitives() {
                if !matches!(primitive.mode(), gltf::mesh::Mode::Triangles) {
                    continue;
                }
                let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(|data| data.0.as_slice()));
                let Some(positions) = reader.read_positions() else {
                    continue;
                };
                let positions: Vec<[f32; 3]> = positions.collect();
                let count = positions.len() as u32;
                let indices: Vec<u32> = match reader.read_indices() {
                    Some(indices) => indices.into_u32().collect(),
                    None => (0..count).collect(),
                };
                if indices.iter().any(|&i| i >= count) {
                    log::warn!("Skipping primitive with out-of-range indices in mesh {}", source.index());
                    continue;
                }
                let normals: Vec<[f32; 3]> = reader.read_normals().map(Iterator::collect).unwrap_or_default();
                let uvs: Vec<[f32; 2]> = reader
                    .read_tex_coords(0)
                    .map(|uvs| uvs.into_f32().collect())
                    .unwrap_or_default();

                let base = self.vertices.len() as u32;
                for (i, position) in positions.iter().enumerate() {
                    let normal = normals
                        .get(i)
                        .map_or(Vec3::Y, |n| (normal_matrix * Vec3::from(*n)).normalize_or_zero());
                    self.vertices.push(Vertex::new(
                        world.transform_point3(Vec3::from(*position)).into(),
                        normal.into(),
                        uvs.get(i).copied().unwrap_or_default(),
                    ));
                }
                self.indices.extend(indices.into_iter().map(|i| base + i));
            }
        }
        for child in node.children() {
            self.append_gltf_node(&child, world, buffers);
        }
    }

    /// Get the number of indices
    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }

    /// Check if the mesh has anything to draw
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() || self.indices.is_empty()
    }

    /// Axis-aligned bounds of the vertex positions
    pub fn bounds(&self) -> Option<([f32; 3], [f32; 3])> {
        let first = self.vertices.first()?;
        let mut min = Vec3::from(first.position);
        let mut max = min;
        for vertex in &self.vertices[1..] {
            let p = Vec3::from(vertex.position);
            min = min.min(p);
            max = max.max(p);
        }
        Some((min.into(), max.into()))
    }

    /// Interleaved vertex bytes
    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    /// Index bytes (u32, little endian on every supported target)
    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }
}
