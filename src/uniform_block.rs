//! UniformBlock - named parameter block of one program
//!
//! The block schema (block name plus field names) is declared first. Preparing
//! it for a program resolves the block and every field against the program's
//! reflected layout, then allocates a CPU-side copy and a dynamic uniform
//! buffer of the block size. Field writes only touch the CPU copy; [`bind`]
//! uploads it in one transfer.
//!
//! [`bind`]: UniformBlock::bind

use crate::gpu::{
    BufferDesc, BufferId, BufferKind, BufferUsage, GpuDevice, GpuError, Owned, ProgramId,
    UniformField, UniformValue,
};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum UniformBlockError {
    #[error("program has no uniform block '{0}'")]
    BlockNotFound(String),

    #[error("uniform block '{block}' has no field '{field}'")]
    FieldNotFound { block: String, field: String },

    #[error("uniform block '{0}' is not prepared for a program")]
    NotPrepared(String),

    #[error("'{0}' is not a declared parameter")]
    UnknownParam(String),

    #[error("{size} bytes do not fit '{field}' at element {index}")]
    OutOfRange {
        field: String,
        index: usize,
        size: usize,
    },

    #[error(transparent)]
    Gpu(#[from] GpuError),
}

struct Prepared {
    program: ProgramId,
    index: u32,
    fields: HashMap<String, UniformField>,
    params: Box<[u8]>,
    buffer: Owned<BufferId>,
}

/// Write-then-bind access to a uniform block.
#[derive(Default)]
pub struct UniformBlock {
    block_name: String,
    param_names: Vec<String>,
    prepared: Option<Prepared>,
}

impl UniformBlock {
    pub fn new(block_name: impl Into<String>) -> Self {
        Self {
            block_name: block_name.into(),
            ..Default::default()
        }
    }

    pub fn set_block_name(&mut self, name: impl Into<String>) {
        self.block_name = name.into();
    }

    pub fn block_name(&self) -> &str {
        &self.block_name
    }

    /// Declare a field to resolve at preparation. Repeated names are kept once.
    pub fn add_param_name(&mut self, name: impl Into<String>) {
        let name = name.into();
        if !self.param_names.contains(&name) {
            self.param_names.push(name);
        }
    }

    /// Resolve the schema against `program` and allocate the block storage.
    ///
    /// Nothing is allocated unless the block and every declared field exist.
    /// A block already prepared for another program is replaced on success.
    pub fn prepare_for_shader(
        &mut self,
        device: &GpuDevice,
        program: ProgramId,
    ) -> Result<(), UniformBlockError> {
        let Some(layout) = device.uniform_block_layout(program, &self.block_name)? else {
            tracing::error!("program {} has no uniform block '{}'", program, self.block_name);
            return Err(UniformBlockError::BlockNotFound(self.block_name.clone()));
        };

        let mut fields = HashMap::with_capacity(self.param_names.len());
        for name in &self.param_names {
            let Some(field) = layout.field(name) else {
                tracing::error!("uniform block '{}' has no field '{}'", self.block_name, name);
                return Err(UniformBlockError::FieldNotFound {
                    block: self.block_name.clone(),
                    field: name.clone(),
                });
            };
            fields.insert(name.clone(), field.clone());
        }

        let buffer = device.create_buffer(
            &BufferDesc {
                kind: BufferKind::Uniform,
                usage: BufferUsage::Dynamic,
                size: layout.size as u64,
            },
            None,
        )?;
        device.bind_uniform_block(program, layout.index, buffer.id())?;

        tracing::debug!(
            "uniform block '{}' prepared for {}: {} bytes, {} fields",
            self.block_name,
            program,
            layout.size,
            fields.len()
        );

        self.prepared = Some(Prepared {
            program,
            index: layout.index,
            fields,
            params: vec![0u8; layout.size as usize].into_boxed_slice(),
            buffer,
        });
        Ok(())
    }

    /// Program the block is prepared for.
    pub fn program(&self) -> Option<ProgramId> {
        self.prepared.as_ref().map(|p| p.program)
    }

    pub fn is_prepared(&self) -> bool {
        self.prepared.is_some()
    }

    /// Block size in bytes, once prepared.
    pub fn size(&self) -> Option<usize> {
        self.prepared.as_ref().map(|p| p.params.len())
    }

    /// Resolved byte offset of a declared field.
    pub fn offset(&self, name: &str) -> Option<u32> {
        self.prepared
            .as_ref()
            .and_then(|p| p.fields.get(name))
            .map(|field| field.offset)
    }

    /// CPU-side contents, once prepared.
    pub fn bytes(&self) -> Option<&[u8]> {
        self.prepared.as_ref().map(|p| &p.params[..])
    }

    pub fn buffer(&self) -> Option<BufferId> {
        self.prepared.as_ref().map(|p| p.buffer.id())
    }

    pub fn set(&mut self, name: &str, value: impl Into<UniformValue>) -> Result<(), UniformBlockError> {
        self.write(name, 0, value.into())
    }

    /// Write element `index` of an array field. Non-array fields only have element 0.
    pub fn set_element(
        &mut self,
        name: &str,
        index: usize,
        value: impl Into<UniformValue>,
    ) -> Result<(), UniformBlockError> {
        self.write(name, index, value.into())
    }

    fn write(&mut self, name: &str, index: usize, value: UniformValue) -> Result<(), UniformBlockError> {
        let prepared = self
            .prepared
            .as_mut()
            .ok_or_else(|| UniformBlockError::NotPrepared(self.block_name.clone()))?;
        let field = prepared
            .fields
            .get(name)
            .ok_or_else(|| UniformBlockError::UnknownParam(name.to_string()))?;

        let size = value.size();
        let start = if index == 0 {
            0
        } else if field.array_stride > 0 {
            index * field.array_stride as usize
        } else {
            usize::MAX
        };
        let in_range = start
            .checked_add(size)
            .is_some_and(|end| end <= field.size as usize);
        if !in_range {
            return Err(UniformBlockError::OutOfRange {
                field: name.to_string(),
                index,
                size,
            });
        }

        let offset = field.offset as usize + start;
        value.write_to(&mut prepared.params[offset..offset + size]);
        Ok(())
    }

    /// Upload the whole block in one write and attach it to the program.
    pub fn bind(&self) -> Result<(), UniformBlockError> {
        let prepared = self
            .prepared
            .as_ref()
            .ok_or_else(|| UniformBlockError::NotPrepared(self.block_name.clone()))?;
        let device = prepared.buffer.device();
        device.write_buffer(prepared.buffer.id(), 0, &prepared.params)?;
        device.bind_uniform_block(prepared.program, prepared.index, prepared.buffer.id())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::{GpuEvent, ResourceKind};
    use glam::Vec4;

    const SOURCE: &str = r#"
struct Material {
    tint: vec4<f32>,
    gloss: f32,
    colors: array<vec4<f32>, 3>,
}

@group(0) @binding(0) var<uniform> material: Material;

@vertex
fn vs_main(@location(0) position: vec3<f32>) -> @builtin(position) vec4<f32> {
    return vec4<f32>(position, 1.0);
}

@fragment
fn fs_main() -> @location(0) vec4<f32> {
    return material.tint * material.gloss + material.colors[2];
}
"#;

    fn block() -> UniformBlock {
        let mut block = UniformBlock::default();
        block.set_block_name("Material");
        block.add_param_name("tint");
        block.add_param_name("gloss");
        block.add_param_name("colors");
        block
    }

    #[test]
    fn test_missing_block_allocates_nothing() {
        let (device, gpu) = GpuDevice::tracking();
        let program = device.create_program("material", SOURCE).unwrap();
        let mut block = block();
        block.set_block_name("Lights");
        let err = block.prepare_for_shader(&device, program.id()).unwrap_err();
        assert!(matches!(err, UniformBlockError::BlockNotFound(_)));
        assert!(!block.is_prepared());
        assert_eq!(gpu.created_count(ResourceKind::Buffer), 0);
    }

    #[test]
    fn test_missing_field_allocates_nothing() {
        let (device, gpu) = GpuDevice::tracking();
        let program = device.create_program("material", SOURCE).unwrap();
        let mut block = block();
        block.add_param_name("roughness");
        let err = block.prepare_for_shader(&device, program.id()).unwrap_err();
        assert!(matches!(err, UniformBlockError::FieldNotFound { ref field, .. } if field == "roughness"));
        assert_eq!(gpu.created_count(ResourceKind::Buffer), 0);
    }

    #[test]
    fn test_write_then_bind_uploads_at_offset() {
        let (device, gpu) = GpuDevice::tracking();
        let program = device.create_program("material", SOURCE).unwrap();
        let mut block = block();
        block.prepare_for_shader(&device, program.id()).unwrap();
        assert_eq!(block.offset("gloss"), Some(16));

        block.set("gloss", 0.75f32).unwrap();
        block
            .set_element("colors", 2, Vec4::new(1.0, 2.0, 3.0, 4.0))
            .unwrap();
        gpu.clear_events();
        block.bind().unwrap();

        let buffer = block.buffer().unwrap();
        let writes: Vec<_> = gpu
            .events()
            .into_iter()
            .filter(|e| matches!(e, GpuEvent::BufferWrite { .. }))
            .collect();
        assert_eq!(writes.len(), 1);

        let data = gpu.buffer_data(buffer).unwrap();
        assert_eq!(&data[16..20], &0.75f32.to_ne_bytes());
        let colors = block.offset("colors").unwrap() as usize + 2 * 16;
        assert_eq!(&data[colors..colors + 4], &1.0f32.to_ne_bytes());
        assert_eq!(&data[colors + 12..colors + 16], &4.0f32.to_ne_bytes());
        assert_eq!(gpu.bound_uniform_buffer(program.id(), 0), Some(buffer));
    }

    #[test]
    fn test_writes_before_prepare_fail() {
        let mut block = block();
        assert!(matches!(
            block.set("gloss", 1.0f32),
            Err(UniformBlockError::NotPrepared(_))
        ));
        assert!(matches!(block.bind(), Err(UniformBlockError::NotPrepared(_))));
    }

    #[test]
    fn test_element_out_of_range() {
        let (device, _gpu) = GpuDevice::tracking();
        let program = device.create_program("material", SOURCE).unwrap();
        let mut block = block();
        block.prepare_for_shader(&device, program.id()).unwrap();
        assert!(block.set_element("colors", 3, Vec4::ONE).is_err());
        assert!(block.set_element("gloss", 1, 1.0f32).is_err());
        assert!(block.set("gloss", Vec4::ONE).is_err());
        assert!(matches!(
            block.set("unknown", 1.0f32),
            Err(UniformBlockError::UnknownParam(_))
        ));
    }

    #[test]
    fn test_drop_releases_buffer() {
        let (device, gpu) = GpuDevice::tracking();
        let program = device.create_program("material", SOURCE).unwrap();
        let mut block = block();
        block.prepare_for_shader(&device, program.id()).unwrap();
        assert_eq!(gpu.live_count(ResourceKind::Buffer), 1);
        drop(block);
        assert_eq!(gpu.live_count(ResourceKind::Buffer), 0);
    }
}
