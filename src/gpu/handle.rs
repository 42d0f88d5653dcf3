//! Typed GPU handles and their owners
//!
//! Handles are plain ids handed out by a [`Gpu`](super::Gpu) backend. Ownership
//! of the underlying resource lives in [`Owned`], which releases it exactly once
//! when dropped.

use super::device::GpuDevice;
use std::fmt;

/// Kind of GPU resource a handle refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Buffer,
    Texture,
    Renderbuffer,
    Framebuffer,
    VertexArray,
    Program,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResourceKind::Buffer => "buffer",
            ResourceKind::Texture => "texture",
            ResourceKind::Renderbuffer => "renderbuffer",
            ResourceKind::Framebuffer => "framebuffer",
            ResourceKind::VertexArray => "vertex array",
            ResourceKind::Program => "program",
        };
        f.write_str(name)
    }
}

/// A raw id of a specific resource kind.
pub trait Handle: Copy + Eq + std::hash::Hash + fmt::Debug {
    const KIND: ResourceKind;

    fn from_raw(raw: u32) -> Self;

    fn raw(self) -> u32;
}

macro_rules! define_handle {
    ($(#[$meta:meta])* $name:ident => $kind:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u32);

        impl Handle for $name {
            const KIND: ResourceKind = ResourceKind::$kind;

            fn from_raw(raw: u32) -> Self {
                Self(raw)
            }

            fn raw(self) -> u32 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}#{}", ResourceKind::$kind, self.0)
            }
        }
    };
}

define_handle!(
    /// Vertex, index or uniform buffer.
    BufferId => Buffer
);
define_handle!(
    /// Sampleable 2D texture.
    TextureId => Texture
);
define_handle!(
    /// Render-only storage, possibly multisampled.
    RenderbufferId => Renderbuffer
);
define_handle!(
    /// Set of color and depth attachments.
    FramebufferId => Framebuffer
);
define_handle!(
    /// Vertex buffer + layout + optional index buffer.
    VertexArrayId => VertexArray
);
define_handle!(
    /// Linked shader program.
    ProgramId => Program
);

/// Move-only owner of a GPU handle.
///
/// Dropping the owner releases the resource through the device that created it.
/// There is no `Clone`: a handle has exactly one owner for its whole life.
pub struct Owned<H: Handle> {
    handle: H,
    device: GpuDevice,
}

impl<H: Handle> Owned<H> {
    pub(crate) fn new(device: GpuDevice, handle: H) -> Self {
        Self { handle, device }
    }

    /// The underlying id. Valid as long as this owner is alive.
    pub fn id(&self) -> H {
        self.handle
    }

    pub fn device(&self) -> &GpuDevice {
        &self.device
    }
}

impl<H: Handle> Drop for Owned<H> {
    fn drop(&mut self) {
        self.device.release(H::KIND, self.handle.raw());
    }
}

impl<H: Handle> fmt::Debug for Owned<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Owned").field(&self.handle).finish()
    }
}
