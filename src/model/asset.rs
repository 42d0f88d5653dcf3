//! CPU-side model data

use crate::gpu::{TextureFormat, VertexAttribute, VertexLayout};
use glam::Vec3;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("failed to read '{path}': {message}")]
    Load { path: String, message: String },

    #[error("invalid asset: {0}")]
    Invalid(String),
}

/// Interleaved vertex as uploaded to the GPU.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct VertexData {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

impl VertexData {
    pub const STRIDE: u32 = std::mem::size_of::<VertexData>() as u32;
    pub const NORMAL_OFFSET: u32 = std::mem::size_of::<[f32; 3]>() as u32;
    pub const UV_OFFSET: u32 = std::mem::size_of::<[f32; 6]>() as u32;

    pub fn new(position: [f32; 3], normal: [f32; 3], uv: [f32; 2]) -> Self {
        Self {
            position,
            normal,
            uv,
        }
    }

    /// Vertex layout: position at location 0, normal at 1, UV at 2.
    pub fn layout() -> VertexLayout {
        VertexLayout {
            stride: Self::STRIDE,
            attributes: vec![
                // position
                VertexAttribute {
                    location: 0,
                    components: 3,
                    offset: 0,
                },
                // normal
                VertexAttribute {
                    location: 1,
                    components: 3,
                    offset: Self::NORMAL_OFFSET,
                },
                // uv
                VertexAttribute {
                    location: 2,
                    components: 2,
                    offset: Self::UV_OFFSET,
                },
            ],
        }
    }
}

/// Surface description of one material.
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub name: String,
    pub ambient: Vec3,
    pub diffuse: Vec3,
    pub specular: Vec3,
    pub shininess: f32,
    /// Index into [`Asset3D::textures`] of the diffuse texture.
    pub texture: Option<usize>,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            ambient: Vec3::splat(0.2),
            diffuse: Vec3::splat(0.8),
            specular: Vec3::ONE,
            shininess: 32.0,
            texture: None,
        }
    }
}

/// Decoded image, uploaded as is.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTexture {
    pub width: u32,
    pub height: u32,
    /// `Rgb8` or `Rgba8`.
    pub format: TextureFormat,
    pub pixels: Vec<u8>,
}

impl RawTexture {
    /// A single-pixel RGBA texture.
    pub fn solid(rgba: [u8; 4]) -> Self {
        Self {
            width: 1,
            height: 1,
            format: TextureFormat::Rgba8,
            pixels: rgba.to_vec(),
        }
    }
}

/// The slice of the index buffer drawn with one material.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaterialRange {
    pub material: usize,
    /// First index, counted in indices.
    pub offset: u32,
    pub count: u32,
}

/// Geometry, materials and textures of a model, ready for upload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Asset3D {
    pub vertices: Vec<VertexData>,
    pub indices: Vec<u32>,
    pub materials: Vec<Material>,
    pub textures: Vec<RawTexture>,
    pub ranges: Vec<MaterialRange>,
}

impl Asset3D {
    /// Geometry drawn with a single default material.
    pub fn from_geometry(vertices: Vec<VertexData>, indices: Vec<u32>) -> Self {
        let count = indices.len() as u32;
        Self {
            vertices,
            indices,
            materials: vec![Material::default()],
            textures: Vec::new(),
            ranges: vec![MaterialRange {
                material: 0,
                offset: 0,
                count,
            }],
        }
    }

    /// Replace the material of every range with `material`, textured with `texture`.
    pub fn with_material(mut self, mut material: Material, texture: Option<RawTexture>) -> Self {
        material.texture = texture.map(|texture| {
            self.textures.push(texture);
            self.textures.len() - 1
        });
        self.materials = vec![material];
        for range in &mut self.ranges {
            range.material = 0;
        }
        self
    }

    /// Check that every index, range, material and texture reference is in bounds.
    pub fn validate(&self) -> Result<(), AssetError> {
        let vertex_count = self.vertices.len() as u32;
        if let Some(index) = self.indices.iter().find(|&&i| i >= vertex_count) {
            return Err(AssetError::Invalid(format!(
                "index {index} out of {vertex_count} vertices"
            )));
        }

        for range in &self.ranges {
            let end = range.offset as u64 + range.count as u64;
            if end > self.indices.len() as u64 {
                return Err(AssetError::Invalid(format!(
                    "range {}..{} out of {} indices",
                    range.offset,
                    end,
                    self.indices.len()
                )));
            }
            if range.material >= self.materials.len() {
                return Err(AssetError::Invalid(format!(
                    "range refers to material {} of {}",
                    range.material,
                    self.materials.len()
                )));
            }
        }

        for material in &self.materials {
            if material.texture.is_some_and(|t| t >= self.textures.len()) {
                return Err(AssetError::Invalid(format!(
                    "material '{}' refers to a missing texture",
                    material.name
                )));
            }
        }

        for (i, texture) in self.textures.iter().enumerate() {
            let expected = (texture.width as usize)
                .checked_mul(texture.height as usize)
                .and_then(|pixels| pixels.checked_mul(texture.format.pixel_size()));
            let Some(expected) = expected else {
                return Err(AssetError::Invalid(format!(
                    "texture {i} of {}x{} is too large",
                    texture.width, texture.height
                )));
            };
            if texture.format.is_depth() || texture.pixels.len() != expected {
                return Err(AssetError::Invalid(format!(
                    "texture {i} has {} bytes for {}x{} {:?}",
                    texture.pixels.len(),
                    texture.width,
                    texture.height,
                    texture.format
                )));
            }
        }
        Ok(())
    }

    /// Mean of the vertex positions.
    pub fn center_of_mass(&self) -> Vec3 {
        if self.vertices.is_empty() {
            return Vec3::ZERO;
        }
        let sum: Vec3 = self
            .vertices
            .iter()
            .map(|v| Vec3::from(v.position))
            .sum();
        sum / self.vertices.len() as f32
    }

    /// Move the geometry so its center of mass sits at the origin.
    ///
    /// Bounding volumes assume a centered model, so call this first on
    /// geometry that is not.
    pub fn normalize(&mut self) {
        let center = self.center_of_mass();
        for vertex in &mut self.vertices {
            vertex.position = (Vec3::from(vertex.position) - center).to_array();
        }
    }
}

/// Source of [`Asset3D`]s.
pub trait AssetLoader {
    fn load(&self, path: &Path) -> Result<Asset3D, AssetError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle() -> Asset3D {
        Asset3D::from_geometry(
            vec![
                VertexData::new([0.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 0.0]),
                VertexData::new([3.0, 0.0, 0.0], [0.0, 0.0, 1.0], [1.0, 0.0]),
                VertexData::new([0.0, 3.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0]),
            ],
            vec![0, 1, 2],
        )
    }

    #[test]
    fn test_vertex_layout() {
        assert_eq!(std::mem::size_of::<VertexData>(), 32);
        let layout = VertexData::layout();
        assert_eq!(layout.stride, 32);
        let offsets: Vec<_> = layout.attributes.iter().map(|a| a.offset).collect();
        assert_eq!(offsets, vec![0, 12, 24]);
    }

    #[test]
    fn test_from_geometry_single_range() {
        let asset = triangle();
        assert_eq!(
            asset.ranges,
            vec![MaterialRange {
                material: 0,
                offset: 0,
                count: 3
            }]
        );
        assert!(asset.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_index() {
        let mut asset = triangle();
        asset.indices[2] = 7;
        assert!(matches!(asset.validate(), Err(AssetError::Invalid(_))));
    }

    #[test]
    fn test_validate_rejects_bad_range() {
        let mut asset = triangle();
        asset.ranges[0].count = 4;
        assert!(asset.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_short_texture() {
        let mut texture = RawTexture::solid([255, 0, 0, 255]);
        texture.pixels.pop();
        let asset = triangle().with_material(Material::default(), Some(texture));
        assert!(asset.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_oversized_texture() {
        let texture = RawTexture {
            width: 65536,
            height: 65536,
            format: TextureFormat::Rgba8,
            pixels: Vec::new(),
        };
        let asset = triangle().with_material(Material::default(), Some(texture));
        assert!(matches!(asset.validate(), Err(AssetError::Invalid(_))));
    }

    #[test]
    fn test_normalize_centers_geometry() {
        let mut asset = triangle();
        assert_eq!(asset.center_of_mass(), Vec3::new(1.0, 1.0, 0.0));
        asset.normalize();
        assert!(asset.center_of_mass().length() < 1e-6);
        assert_eq!(asset.vertices[1].position, [2.0, -1.0, 0.0]);
    }
}
