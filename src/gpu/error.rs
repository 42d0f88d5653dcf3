use super::handle::ResourceKind;
use thiserror::Error;

/// Errors reported by a [`Gpu`](super::Gpu) backend.
#[derive(Debug, Error)]
pub enum GpuError {
    #[error("unknown {kind} handle {raw}")]
    UnknownHandle { kind: ResourceKind, raw: u32 },

    #[error("framebuffer incomplete: {0}")]
    FramebufferIncomplete(String),

    #[error("{requested} color attachments requested, device supports {max}")]
    UnsupportedAttachmentCount { requested: u32, max: u32 },

    #[error("{requested} samples requested, device supports {max}")]
    UnsupportedSamples { requested: u32, max: u32 },

    #[error("{width}x{height} exceeds the maximum texture size {max}")]
    TextureTooLarge { width: u32, height: u32, max: u32 },

    #[error("failed to compile shader '{name}': {message}")]
    ShaderCompile { name: String, message: String },

    #[error("no default framebuffer is available")]
    NoDefaultFramebuffer,

    #[error("program has no uniform '{0}'")]
    UnknownUniform(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("failed to allocate {0}")]
    OutOfMemory(ResourceKind),

    #[error("backend error: {0}")]
    Backend(String),
}

impl GpuError {
    pub(crate) fn unknown<H: super::handle::Handle>(handle: H) -> Self {
        GpuError::UnknownHandle {
            kind: H::KIND,
            raw: handle.raw(),
        }
    }
}
