//! GPU copy of an [`Asset3D`]

use super::asset::{Asset3D, AssetError, Material, MaterialRange, VertexData};
use crate::gpu::{
    BufferDesc, BufferId, BufferKind, BufferUsage, DrawCall, DrawRange, Filter, GpuDevice, Owned,
    Primitive, ProgramId, TextureDesc, TextureId, VertexArrayDesc, VertexArrayId, Wrap,
};
use crate::object::ObjectError;

/// Uploaded geometry, material textures and per-material index ranges.
///
/// Fields drop in declaration order: textures, vertex array, index buffer,
/// vertex buffer.
pub struct GpuModel3D {
    textures: Box<[Owned<TextureId>]>,
    vertex_array: Owned<VertexArrayId>,
    index_buffer: Owned<BufferId>,
    vertex_buffer: Owned<BufferId>,
    materials: Vec<Material>,
    ranges: Vec<MaterialRange>,
}

impl GpuModel3D {
    pub fn init(device: &GpuDevice, asset: &Asset3D) -> Result<Self, ObjectError> {
        asset.validate()?;
        if asset.vertices.is_empty() || asset.indices.is_empty() {
            return Err(AssetError::Invalid("no geometry to upload".into()).into());
        }

        let vertex_bytes: &[u8] = bytemuck::cast_slice(&asset.vertices);
        let vertex_buffer = device.create_buffer(
            &BufferDesc {
                kind: BufferKind::Vertex,
                usage: BufferUsage::Static,
                size: vertex_bytes.len() as u64,
            },
            Some(vertex_bytes),
        )?;

        let index_bytes: &[u8] = bytemuck::cast_slice(&asset.indices);
        let index_buffer = device.create_buffer(
            &BufferDesc {
                kind: BufferKind::Index,
                usage: BufferUsage::Static,
                size: index_bytes.len() as u64,
            },
            Some(index_bytes),
        )?;

        let vertex_array = device.create_vertex_array(&VertexArrayDesc {
            vertex_buffer: vertex_buffer.id(),
            layout: VertexData::layout(),
            index_buffer: Some(index_buffer.id()),
        })?;

        let textures = asset
            .textures
            .iter()
            .map(|texture| {
                device.create_texture(
                    &TextureDesc {
                        width: texture.width,
                        height: texture.height,
                        format: texture.format,
                        filter: Filter::Linear,
                        wrap: Wrap::Repeat,
                    },
                    Some(&texture.pixels),
                )
            })
            .collect::<Result<Vec<_>, _>>()?
            .into_boxed_slice();

        tracing::debug!(
            "uploaded model {}: {} vertices, {} indices, {} textures",
            vertex_array.id(),
            asset.vertices.len(),
            asset.indices.len(),
            textures.len()
        );

        Ok(Self {
            textures,
            vertex_array,
            index_buffer,
            vertex_buffer,
            materials: asset.materials.clone(),
            ranges: asset.ranges.clone(),
        })
    }

    pub fn device(&self) -> &GpuDevice {
        self.vertex_array.device()
    }

    pub fn vertex_array(&self) -> VertexArrayId {
        self.vertex_array.id()
    }

    pub fn vertex_buffer(&self) -> BufferId {
        self.vertex_buffer.id()
    }

    pub fn index_buffer(&self) -> BufferId {
        self.index_buffer.id()
    }

    pub fn textures(&self) -> impl Iterator<Item = TextureId> + '_ {
        self.textures.iter().map(Owned::id)
    }

    pub fn materials(&self) -> &[Material] {
        &self.materials
    }

    pub fn ranges(&self) -> &[MaterialRange] {
        &self.ranges
    }

    /// Diffuse texture of `material`, if it has one.
    pub fn material_texture(&self, material: usize) -> Option<TextureId> {
        self.materials
            .get(material)
            .and_then(|m| m.texture)
            .and_then(|t| self.textures.get(t))
            .map(Owned::id)
    }

    /// One indexed draw per material range.
    ///
    /// Unit 0 gets the material texture, or `fallback` when the material has
    /// none; `extra` fills the following units.
    pub fn draw(
        &self,
        program: ProgramId,
        fallback: TextureId,
        extra: &[TextureId],
    ) -> Result<(), ObjectError> {
        self.draw_with(program, fallback, extra, |_| Ok(()))
    }

    /// Like [`draw`](Self::draw), calling `per_material` before each range.
    pub fn draw_with(
        &self,
        program: ProgramId,
        fallback: TextureId,
        extra: &[TextureId],
        mut per_material: impl FnMut(&Material) -> Result<(), ObjectError>,
    ) -> Result<(), ObjectError> {
        let device = self.device();
        let mut textures = Vec::with_capacity(1 + extra.len());
        for range in &self.ranges {
            if range.count == 0 {
                continue;
            }
            if let Some(material) = self.materials.get(range.material) {
                per_material(material)?;
            }

            textures.clear();
            textures.push(self.material_texture(range.material).unwrap_or(fallback));
            textures.extend_from_slice(extra);

            device.draw(&DrawCall {
                program,
                vertex_array: self.vertex_array.id(),
                primitive: Primitive::Triangles,
                range: DrawRange::Indexed {
                    byte_offset: range.offset as u64 * 4,
                    count: range.count,
                },
                textures: &textures,
            })?;
        }
        Ok(())
    }

    /// Release every GPU resource of the model.
    pub fn destroy(self) {
        tracing::debug!("destroying model {}", self.vertex_array.id());
        drop(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::{GpuEvent, ResourceKind, TextureFormat};
    use crate::model::asset::RawTexture;
    use crate::shader::{names, Shader};

    fn quad_asset() -> Asset3D {
        let n = [0.0, 0.0, 1.0];
        Asset3D::from_geometry(
            vec![
                VertexData::new([-1.0, -1.0, 0.0], n, [0.0, 0.0]),
                VertexData::new([1.0, -1.0, 0.0], n, [1.0, 0.0]),
                VertexData::new([1.0, 1.0, 0.0], n, [1.0, 1.0]),
                VertexData::new([-1.0, 1.0, 0.0], n, [0.0, 1.0]),
            ],
            vec![0, 1, 2, 0, 2, 3],
        )
    }

    /// Two materials: the first textured red, the second untextured.
    fn two_material_asset() -> Asset3D {
        let mut asset = quad_asset().with_material(
            Material::default(),
            Some(RawTexture {
                width: 1,
                height: 1,
                format: TextureFormat::Rgb8,
                pixels: vec![255, 0, 0],
            }),
        );
        asset.materials.push(Material {
            name: "plain".into(),
            ..Default::default()
        });
        asset.ranges = vec![
            MaterialRange {
                material: 0,
                offset: 0,
                count: 3,
            },
            MaterialRange {
                material: 1,
                offset: 3,
                count: 3,
            },
        ];
        asset
    }

    #[test]
    fn test_upload_round_trip() {
        let (device, gpu) = GpuDevice::tracking();
        let asset = quad_asset();
        let model = GpuModel3D::init(&device, &asset).unwrap();

        let vertices = gpu.buffer_data(model.vertex_buffer()).unwrap();
        assert_eq!(vertices.len(), 4 * 32);
        let read_back: Vec<VertexData> = vertices
            .chunks_exact(32)
            .map(bytemuck::pod_read_unaligned)
            .collect();
        assert_eq!(read_back, asset.vertices);

        let indices: Vec<u32> = gpu
            .buffer_data(model.index_buffer())
            .unwrap()
            .chunks_exact(4)
            .map(bytemuck::pod_read_unaligned)
            .collect();
        assert_eq!(indices, asset.indices);

        let desc = gpu.vertex_array(model.vertex_array()).unwrap();
        assert_eq!(desc.layout, VertexData::layout());
        assert_eq!(desc.index_buffer, Some(model.index_buffer()));
        assert_eq!(
            gpu.buffer_desc(model.vertex_buffer()).unwrap().usage,
            BufferUsage::Static
        );
    }

    #[test]
    fn test_textures_linear_repeat() {
        let (device, gpu) = GpuDevice::tracking();
        let model = GpuModel3D::init(&device, &two_material_asset()).unwrap();
        let texture = model.material_texture(0).unwrap();
        let desc = gpu.texture_desc(texture).unwrap();
        assert_eq!(desc.filter, Filter::Linear);
        assert_eq!(desc.wrap, Wrap::Repeat);
        assert_eq!(desc.format, TextureFormat::Rgb8);
        assert_eq!(model.material_texture(1), None);
    }

    #[test]
    fn test_draw_per_material_range() {
        let (device, gpu) = GpuDevice::tracking();
        let mut shader = Shader::new(&device);
        shader.use_program(names::BASIC).unwrap();
        let white = device
            .create_texture(
                &TextureDesc {
                    width: 1,
                    height: 1,
                    format: TextureFormat::Rgba8,
                    filter: Filter::Nearest,
                    wrap: Wrap::Repeat,
                },
                Some(&[255; 4]),
            )
            .unwrap();
        let model = GpuModel3D::init(&device, &two_material_asset()).unwrap();
        gpu.clear_events();

        let mut seen = Vec::new();
        model
            .draw_with(shader.program().unwrap(), white.id(), &[], |m| {
                seen.push(m.name.clone());
                Ok(())
            })
            .unwrap();
        assert_eq!(seen, vec!["default".to_string(), "plain".to_string()]);

        let draws: Vec<_> = gpu
            .events()
            .into_iter()
            .filter_map(|e| match e {
                GpuEvent::Draw {
                    range, textures, ..
                } => Some((range, textures)),
                _ => None,
            })
            .collect();
        assert_eq!(
            draws,
            vec![
                (
                    DrawRange::Indexed {
                        byte_offset: 0,
                        count: 3
                    },
                    vec![model.material_texture(0).unwrap()]
                ),
                (
                    DrawRange::Indexed {
                        byte_offset: 12,
                        count: 3
                    },
                    vec![white.id()]
                ),
            ]
        );
    }

    #[test]
    fn test_destroy_releases_every_handle() {
        let (device, gpu) = GpuDevice::tracking();
        let model = GpuModel3D::init(&device, &two_material_asset()).unwrap();
        assert_eq!(gpu.total_live(), 4);
        model.destroy();
        assert_eq!(gpu.total_live(), 0);
        assert!(gpu.violations().is_empty());
    }

    #[test]
    fn test_failed_upload_releases_partial_allocation() {
        let (device, gpu) = GpuDevice::tracking();
        gpu.fail_next(ResourceKind::Texture);
        assert!(GpuModel3D::init(&device, &two_material_asset()).is_err());
        assert_eq!(gpu.total_live(), 0);
    }

    #[test]
    fn test_empty_asset_rejected() {
        let (device, gpu) = GpuDevice::tracking();
        let err = GpuModel3D::init(&device, &Asset3D::default()).err().unwrap();
        assert!(matches!(err, ObjectError::Asset(AssetError::Invalid(_))));
        assert_eq!(gpu.total_created(), 0);
    }
}
