//! Wavefront OBJ loader

use super::asset::{Asset3D, AssetError, AssetLoader, Material, MaterialRange, RawTexture, VertexData};
use crate::gpu::TextureFormat;
use glam::Vec3;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Loads `.obj` geometry with its `.mtl` materials and diffuse textures.
#[derive(Debug, Clone, Default)]
pub struct ObjLoader {
    /// Recenter the geometry on its center of mass after loading.
    pub normalize: bool,
}

impl ObjLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn normalized() -> Self {
        Self { normalize: true }
    }
}

fn load_error(path: &Path, message: impl ToString) -> AssetError {
    AssetError::Load {
        path: path.display().to_string(),
        message: message.to_string(),
    }
}

fn load_texture(path: &Path) -> Result<RawTexture, AssetError> {
    let image = image::open(path).map_err(|e| load_error(path, e))?.to_rgba8();
    Ok(RawTexture {
        width: image.width(),
        height: image.height(),
        format: TextureFormat::Rgba8,
        pixels: image.into_raw(),
    })
}

impl AssetLoader for ObjLoader {
    fn load(&self, path: &Path) -> Result<Asset3D, AssetError> {
        let (models, materials) = tobj::load_obj(
            path,
            &tobj::LoadOptions {
                single_index: true,
                triangulate: true,
                ..Default::default()
            },
        )
        .map_err(|e| load_error(path, e))?;

        let materials = materials.unwrap_or_else(|e| {
            tracing::warn!("no materials for {}: {}", path.display(), e);
            Vec::new()
        });
        let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();

        let mut asset = Asset3D::default();
        let mut texture_slots: HashMap<PathBuf, usize> = HashMap::new();
        for material in &materials {
            let texture = match &material.diffuse_texture {
                Some(name) if !name.is_empty() => {
                    let texture_path = base_dir.join(name);
                    if let Some(&slot) = texture_slots.get(&texture_path) {
                        Some(slot)
                    } else {
                        match load_texture(&texture_path) {
                            Ok(texture) => {
                                asset.textures.push(texture);
                                let slot = asset.textures.len() - 1;
                                texture_slots.insert(texture_path, slot);
                                Some(slot)
                            }
                            Err(e) => {
                                tracing::warn!("skipping texture of '{}': {}", material.name, e);
                                None
                            }
                        }
                    }
                }
                _ => None,
            };

            let defaults = Material::default();
            asset.materials.push(Material {
                name: material.name.clone(),
                ambient: material.ambient.map_or(defaults.ambient, Vec3::from),
                diffuse: material.diffuse.map_or(defaults.diffuse, Vec3::from),
                specular: material.specular.map_or(defaults.specular, Vec3::from),
                shininess: material.shininess.unwrap_or(defaults.shininess),
                texture,
            });
        }

        let mut fallback_material = None;
        for model in &models {
            let mesh = &model.mesh;
            let base = asset.vertices.len() as u32;
            let offset = asset.indices.len() as u32;

            for i in 0..mesh.positions.len() / 3 {
                let position = [
                    mesh.positions[3 * i],
                    mesh.positions[3 * i + 1],
                    mesh.positions[3 * i + 2],
                ];
                let normal = if mesh.normals.len() >= 3 * (i + 1) {
                    [
                        mesh.normals[3 * i],
                        mesh.normals[3 * i + 1],
                        mesh.normals[3 * i + 2],
                    ]
                } else {
                    [0.0, 0.0, 0.0]
                };
                // OBJ texture rows run bottom to top
                let uv = if mesh.texcoords.len() >= 2 * (i + 1) {
                    [mesh.texcoords[2 * i], 1.0 - mesh.texcoords[2 * i + 1]]
                } else {
                    [0.0, 0.0]
                };
                asset.vertices.push(VertexData::new(position, normal, uv));
            }
            asset
                .indices
                .extend(mesh.indices.iter().map(|index| base + index));

            let material = match mesh.material_id.filter(|&id| id < materials.len()) {
                Some(id) => id,
                None => *fallback_material.get_or_insert_with(|| {
                    asset.materials.push(Material::default());
                    asset.materials.len() - 1
                }),
            };
            asset.ranges.push(MaterialRange {
                material,
                offset,
                count: mesh.indices.len() as u32,
            });
        }

        if self.normalize {
            asset.normalize();
        }
        asset.validate()?;

        tracing::info!(
            "loaded {}: {} vertices, {} materials, {} textures",
            path.display(),
            asset.vertices.len(),
            asset.materials.len(),
            asset.textures.len()
        );
        Ok(asset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OBJ: &str = "\
v 0.0 0.0 0.0
v 2.0 0.0 0.0
v 2.0 2.0 0.0
v 0.0 2.0 0.0
vt 0.0 0.0
vt 1.0 0.0
vt 1.0 1.0
vt 0.0 1.0
vn 0.0 0.0 1.0
f 1/1/1 2/2/1 3/3/1 4/4/1
";

    fn write_obj(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("lumen-obj-{}-{}", name, std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("quad.obj");
        std::fs::write(&path, OBJ).unwrap();
        path
    }

    #[test]
    fn test_load_quad() {
        let path = write_obj("quad");
        let asset = ObjLoader::new().load(&path).unwrap();
        assert_eq!(asset.vertices.len(), 4);
        assert_eq!(asset.indices.len(), 6);
        assert_eq!(asset.ranges.len(), 1);
        assert_eq!(asset.ranges[0].count, 6);
        assert_eq!(asset.materials.len(), 1);
        assert_eq!(asset.vertices[0].uv, [0.0, 1.0]);
        assert_eq!(asset.vertices[0].normal, [0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_load_normalized() {
        let path = write_obj("normalized");
        let asset = ObjLoader::normalized().load(&path).unwrap();
        assert_eq!(asset.vertices[0].position, [-1.0, -1.0, 0.0]);
    }

    #[test]
    fn test_missing_file() {
        let err = ObjLoader::new()
            .load(Path::new("/nonexistent/model.obj"))
            .unwrap_err();
        assert!(matches!(err, AssetError::Load { .. }));
    }
}
