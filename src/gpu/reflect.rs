//! WGSL program reflection
//!
//! Programs are compiled from WGSL. Reflection parses and validates the source
//! with naga and extracts what the engine needs to address uniforms by name:
//! uniform blocks (named after their struct type) with per-member offsets,
//! plus texture and sampler slots in declaration order. Texture unit `n`
//! is the `n`-th declared texture; sampler `n` samples texture unit `n`.

use super::error::GpuError;

/// Entry point names every program must provide.
pub const VERTEX_ENTRY: &str = "vs_main";
pub const FRAGMENT_ENTRY: &str = "fs_main";

/// One member of a uniform block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformField {
    pub name: String,
    pub offset: u32,
    pub size: u32,
    /// Byte stride between elements when the member is an array, zero otherwise.
    pub array_stride: u32,
}

/// Layout of a uniform block as seen by one program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformBlockLayout {
    pub name: String,
    /// Index of the block in declaration order.
    pub index: u32,
    pub group: u32,
    pub binding: u32,
    pub size: u32,
    pub fields: Vec<UniformField>,
}

impl UniformBlockLayout {
    pub fn field(&self, name: &str) -> Option<&UniformField> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// A texture binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureSlot {
    pub group: u32,
    pub binding: u32,
    pub depth: bool,
    pub multisampled: bool,
}

/// A sampler binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplerSlot {
    pub group: u32,
    pub binding: u32,
    pub comparison: bool,
}

/// Everything reflected from a program's source.
#[derive(Debug, Clone)]
pub struct ProgramInfo {
    pub name: String,
    pub blocks: Vec<UniformBlockLayout>,
    pub textures: Vec<TextureSlot>,
    pub samplers: Vec<SamplerSlot>,
    /// Color locations written by the fragment entry point.
    pub fragment_outputs: Vec<u32>,
}

impl ProgramInfo {
    /// Parse, validate and reflect a WGSL program.
    pub fn from_wgsl(name: &str, source: &str) -> Result<Self, GpuError> {
        let module = naga::front::wgsl::parse_str(source).map_err(|e| GpuError::ShaderCompile {
            name: name.to_string(),
            message: e.emit_to_string(source),
        })?;

        naga::valid::Validator::new(
            naga::valid::ValidationFlags::all(),
            naga::valid::Capabilities::empty(),
        )
        .validate(&module)
        .map_err(|e| GpuError::ShaderCompile {
            name: name.to_string(),
            message: e.emit_to_string(source),
        })?;

        for entry in [VERTEX_ENTRY, FRAGMENT_ENTRY] {
            if !module.entry_points.iter().any(|ep| ep.name == entry) {
                return Err(GpuError::ShaderCompile {
                    name: name.to_string(),
                    message: format!("missing entry point '{entry}'"),
                });
            }
        }

        let mut blocks = Vec::new();
        let mut textures = Vec::new();
        let mut samplers = Vec::new();

        for (_, global) in module.global_variables.iter() {
            let Some(binding) = &global.binding else {
                continue;
            };
            let ty = &module.types[global.ty];

            match (&global.space, &ty.inner) {
                (naga::AddressSpace::Uniform, naga::TypeInner::Struct { members, span }) => {
                    let fields = members
                        .iter()
                        .filter_map(|member| {
                            let name = member.name.clone()?;
                            let inner = &module.types[member.ty].inner;
                            let array_stride = match inner {
                                naga::TypeInner::Array { stride, .. } => *stride,
                                _ => 0,
                            };
                            Some(UniformField {
                                name,
                                offset: member.offset,
                                size: inner.size(module.to_ctx()),
                                array_stride,
                            })
                        })
                        .collect();

                    blocks.push(UniformBlockLayout {
                        name: ty.name.clone().unwrap_or_default(),
                        index: blocks.len() as u32,
                        group: binding.group,
                        binding: binding.binding,
                        size: *span,
                        fields,
                    });
                }
                (naga::AddressSpace::Handle, naga::TypeInner::Image { class, .. }) => {
                    let (depth, multisampled) = match class {
                        naga::ImageClass::Depth { multi } => (true, *multi),
                        naga::ImageClass::Sampled { multi, .. } => (false, *multi),
                        _ => (false, false),
                    };
                    textures.push(TextureSlot {
                        group: binding.group,
                        binding: binding.binding,
                        depth,
                        multisampled,
                    });
                }
                (naga::AddressSpace::Handle, naga::TypeInner::Sampler { comparison }) => {
                    samplers.push(SamplerSlot {
                        group: binding.group,
                        binding: binding.binding,
                        comparison: *comparison,
                    });
                }
                _ => {}
            }
        }

        Ok(Self {
            name: name.to_string(),
            blocks,
            textures,
            samplers,
            fragment_outputs: fragment_outputs(&module),
        })
    }

    pub fn block(&self, name: &str) -> Option<&UniformBlockLayout> {
        self.blocks.iter().find(|b| b.name == name)
    }

    /// Find the block declaring a loose uniform `name`.
    pub fn find_uniform(&self, name: &str) -> Option<(&UniformBlockLayout, &UniformField)> {
        self.blocks
            .iter()
            .find_map(|block| block.field(name).map(|field| (block, field)))
    }
}

fn fragment_outputs(module: &naga::Module) -> Vec<u32> {
    let Some(result) = module
        .entry_points
        .iter()
        .find(|ep| ep.name == FRAGMENT_ENTRY)
        .and_then(|ep| ep.function.result.as_ref())
    else {
        return Vec::new();
    };

    match &result.binding {
        Some(naga::Binding::Location { location, .. }) => vec![*location],
        Some(_) => Vec::new(),
        None => match &module.types[result.ty].inner {
            naga::TypeInner::Struct { members, .. } => members
                .iter()
                .filter_map(|member| match &member.binding {
                    Some(naga::Binding::Location { location, .. }) => Some(*location),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        },
    }
}
