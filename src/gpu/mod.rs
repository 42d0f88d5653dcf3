//! GPU abstraction layer
//!
//! Every component of the engine talks to the graphics API through the [`Gpu`]
//! trait: a small, GL-shaped command set over typed handles. Two backends
//! implement it:
//!
//! - [`WgpuGpu`] renders with wgpu
//! - [`TrackingGpu`] records resources and commands without a GPU, for tests
//!   and headless runs
//!
//! Components hold a [`GpuDevice`], the shared single-threaded handle to the
//! active backend, and own their resources through [`Owned`] handles.

pub mod device;
pub mod error;
pub mod handle;
pub mod reflect;
pub mod tracking;
pub mod uniform;
pub mod wgpu_backend;

pub use device::{BackendKind, GpuDevice};
pub use error::GpuError;
pub use handle::{
    BufferId, FramebufferId, Handle, Owned, ProgramId, RenderbufferId, ResourceKind, TextureId,
    VertexArrayId,
};
pub use reflect::{ProgramInfo, UniformBlockLayout, UniformField};
pub use tracking::{GpuEvent, TrackingGpu};
pub use uniform::UniformValue;
pub use wgpu_backend::WgpuGpu;

/// Device capabilities relevant to render targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpuLimits {
    pub max_color_attachments: u32,
    pub max_samples: u32,
    pub max_texture_size: u32,
}

impl Default for GpuLimits {
    fn default() -> Self {
        Self {
            max_color_attachments: 8,
            max_samples: 4,
            max_texture_size: 8192,
        }
    }
}

/// What a buffer is bound as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferKind {
    Vertex,
    Index,
    Uniform,
}

/// Update-frequency hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferUsage {
    /// Uploaded once, never written again.
    Static,
    /// Rewritten frequently.
    Dynamic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferDesc {
    pub kind: BufferKind,
    pub usage: BufferUsage,
    /// Size in bytes.
    pub size: u64,
}

/// One float attribute inside an interleaved vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexAttribute {
    pub location: u32,
    /// Number of f32 components, 1 to 4.
    pub components: u32,
    /// Byte offset inside the vertex.
    pub offset: u32,
}

/// Interleaved vertex layout.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VertexLayout {
    pub stride: u32,
    pub attributes: Vec<VertexAttribute>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexArrayDesc {
    pub vertex_buffer: BufferId,
    pub layout: VertexLayout,
    /// u32 indices, if the geometry is indexed.
    pub index_buffer: Option<BufferId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    Rgba8,
    /// Uploaded as RGB, stored as RGBA.
    Rgb8,
    Depth32,
}

impl TextureFormat {
    pub fn is_depth(self) -> bool {
        matches!(self, TextureFormat::Depth32)
    }

    /// Bytes per pixel of upload data.
    pub fn pixel_size(self) -> usize {
        match self {
            TextureFormat::Rgba8 | TextureFormat::Depth32 => 4,
            TextureFormat::Rgb8 => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Filter {
    Nearest,
    #[default]
    Linear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Wrap {
    Repeat,
    #[default]
    ClampToEdge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureDesc {
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    pub filter: Filter,
    pub wrap: Wrap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderbufferDesc {
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    pub samples: u32,
}

/// Storage attached to a framebuffer slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attachment {
    Texture(TextureId),
    Renderbuffer(RenderbufferId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FramebufferDesc {
    pub color: Vec<Attachment>,
    pub depth: Option<Attachment>,
}

/// Pixel rectangle with a bottom-left origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn from_size(width: u32, height: u32) -> Self {
        Self::new(0, 0, width, height)
    }
}

/// Framebuffer-to-framebuffer color copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlitDesc {
    pub src: FramebufferId,
    pub src_attachment: u32,
    pub src_rect: Rect,
    /// `None` is the default framebuffer.
    pub dst: Option<FramebufferId>,
    pub dst_rect: Rect,
    pub filter: Filter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    Triangles,
    TriangleStrip,
    Lines,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawRange {
    /// `count` indices starting `byte_offset` bytes into the index buffer.
    Indexed { byte_offset: u64, count: u32 },
    Arrays { first: u32, count: u32 },
}

/// Fixed-function state. Global to the device, like GL's capability flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderState {
    pub depth_test: bool,
    pub depth_write: bool,
    pub blend: bool,
    pub cull_back: bool,
}

impl Default for RenderState {
    fn default() -> Self {
        Self {
            depth_test: true,
            depth_write: true,
            blend: false,
            cull_back: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DrawCall<'a> {
    pub program: ProgramId,
    pub vertex_array: VertexArrayId,
    pub primitive: Primitive,
    pub range: DrawRange,
    /// Texture bound at each unit, in program declaration order.
    pub textures: &'a [TextureId],
}

/// The graphics API seam.
///
/// Calls execute in order. Binding and render state are global: a draw goes to
/// whatever framebuffer is bound, with whatever state was last set.
pub trait Gpu {
    fn limits(&self) -> GpuLimits;

    fn create_buffer(&mut self, desc: &BufferDesc, contents: Option<&[u8]>)
        -> Result<BufferId, GpuError>;
    fn write_buffer(&mut self, buffer: BufferId, offset: u64, data: &[u8]) -> Result<(), GpuError>;
    fn delete_buffer(&mut self, buffer: BufferId) -> Result<(), GpuError>;

    fn create_vertex_array(&mut self, desc: &VertexArrayDesc) -> Result<VertexArrayId, GpuError>;
    fn delete_vertex_array(&mut self, vertex_array: VertexArrayId) -> Result<(), GpuError>;

    fn create_texture(&mut self, desc: &TextureDesc, pixels: Option<&[u8]>)
        -> Result<TextureId, GpuError>;
    fn delete_texture(&mut self, texture: TextureId) -> Result<(), GpuError>;

    fn create_renderbuffer(&mut self, desc: &RenderbufferDesc) -> Result<RenderbufferId, GpuError>;
    fn delete_renderbuffer(&mut self, renderbuffer: RenderbufferId) -> Result<(), GpuError>;

    fn create_framebuffer(&mut self, desc: &FramebufferDesc) -> Result<FramebufferId, GpuError>;
    fn delete_framebuffer(&mut self, framebuffer: FramebufferId) -> Result<(), GpuError>;

    /// `None` binds the default framebuffer.
    fn bind_framebuffer(&mut self, framebuffer: Option<FramebufferId>) -> Result<(), GpuError>;
    fn bound_framebuffer(&self) -> Option<FramebufferId>;

    fn set_viewport(&mut self, viewport: Rect);
    fn viewport(&self) -> Rect;

    fn set_render_state(&mut self, state: RenderState);
    fn render_state(&self) -> RenderState;

    /// Clear every attachment of the bound framebuffer.
    fn clear(&mut self, color: [f32; 4], depth: f32) -> Result<(), GpuError>;

    fn blit_framebuffer(&mut self, desc: &BlitDesc) -> Result<(), GpuError>;

    fn create_program(&mut self, name: &str, source: &str) -> Result<ProgramId, GpuError>;
    fn delete_program(&mut self, program: ProgramId) -> Result<(), GpuError>;
    fn program_info(&self, program: ProgramId) -> Result<std::rc::Rc<ProgramInfo>, GpuError>;

    /// Attach `buffer` as the storage of the program's block `index`.
    fn bind_uniform_block(
        &mut self,
        program: ProgramId,
        index: u32,
        buffer: BufferId,
    ) -> Result<(), GpuError>;

    /// Set a loose uniform, a member of a block with no attached buffer.
    fn set_uniform(
        &mut self,
        program: ProgramId,
        name: &str,
        value: UniformValue,
    ) -> Result<(), GpuError>;

    fn draw(&mut self, call: &DrawCall<'_>) -> Result<(), GpuError>;

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any;
}

/// Checks shared by every backend before a framebuffer is created.
///
/// `attachments` yields `(width, height, samples, format)` of each color
/// attachment followed by the depth attachment, if any.
pub(crate) fn validate_framebuffer(
    desc: &FramebufferDesc,
    limits: &GpuLimits,
    mut describe: impl FnMut(Attachment) -> Result<(u32, u32, u32, TextureFormat), GpuError>,
) -> Result<(u32, u32, u32), GpuError> {
    if desc.color.is_empty() && desc.depth.is_none() {
        return Err(GpuError::FramebufferIncomplete("no attachments".into()));
    }
    let requested = desc.color.len() as u32;
    if requested > limits.max_color_attachments {
        return Err(GpuError::UnsupportedAttachmentCount {
            requested,
            max: limits.max_color_attachments,
        });
    }

    let mut shape: Option<(u32, u32, u32)> = None;
    for (i, attachment) in desc.color.iter().chain(desc.depth.iter()).enumerate() {
        let is_depth_slot = i >= desc.color.len();
        let (width, height, samples, format) = describe(*attachment)?;
        if format.is_depth() != is_depth_slot {
            return Err(GpuError::FramebufferIncomplete(format!(
                "attachment {i} has format {format:?}"
            )));
        }
        match shape {
            None => shape = Some((width, height, samples)),
            Some(expected) if expected != (width, height, samples) => {
                return Err(GpuError::FramebufferIncomplete(format!(
                    "attachment {i} is {width}x{height}x{samples}, expected {}x{}x{}",
                    expected.0, expected.1, expected.2
                )));
            }
            Some(_) => {}
        }
    }

    shape.ok_or_else(|| GpuError::FramebufferIncomplete("no attachments".into()))
}
