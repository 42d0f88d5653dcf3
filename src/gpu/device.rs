//! GpuDevice - shared handle to the active backend

use super::error::GpuError;
use super::handle::*;
use super::reflect::{ProgramInfo, UniformBlockLayout};
use super::tracking::TrackingGpu;
use super::uniform::UniformValue;
use super::wgpu_backend::WgpuGpu;
use super::*;
use crate::context::WgpuContext;
use crate::shader::ShaderLibrary;
use std::any::{Any, TypeId};
use std::cell::{Ref, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};
use std::str::FromStr;

/// Which [`Gpu`] implementation a device is built on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendKind {
    /// Headless wgpu device.
    #[default]
    Wgpu,
    /// Resource-tracking stub, no GPU required.
    Tracking,
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "wgpu" => Ok(BackendKind::Wgpu),
            "tracking" | "null" => Ok(BackendKind::Tracking),
            other => Err(format!("unknown backend '{other}'")),
        }
    }
}

struct DeviceInner {
    gpu: RefCell<Box<dyn Gpu>>,
    shaders: RefCell<ShaderLibrary>,
    shared: RefCell<HashMap<TypeId, Weak<dyn Any>>>,
}

/// Single-threaded handle to a GPU backend.
///
/// Cloning is cheap; every clone drives the same backend. All calls go
/// through in program order, which mirrors a GL context bound to one thread.
#[derive(Clone)]
pub struct GpuDevice {
    inner: Rc<DeviceInner>,
}

impl GpuDevice {
    /// Wrap a backend.
    pub fn new(gpu: impl Gpu + 'static) -> Self {
        Self {
            inner: Rc::new(DeviceInner {
                gpu: RefCell::new(Box::new(gpu)),
                shaders: RefCell::new(ShaderLibrary::with_builtins()),
                shared: RefCell::new(HashMap::new()),
            }),
        }
    }

    /// Build a device for the given backend kind.
    pub fn from_backend(kind: BackendKind) -> anyhow::Result<Self> {
        match kind {
            BackendKind::Wgpu => {
                let ctx = WgpuContext::new_blocking(None)?;
                Ok(Self::new(WgpuGpu::new(ctx)))
            }
            BackendKind::Tracking => Ok(Self::new(TrackingGpu::new())),
        }
    }

    /// A device over a fresh [`TrackingGpu`], returned alongside for inspection.
    pub fn tracking() -> (Self, TrackingGpu) {
        let gpu = TrackingGpu::new();
        (Self::new(gpu.clone()), gpu)
    }

    /// Run `f` against the backend.
    ///
    /// Must not be nested, and nothing that owns a handle may be dropped inside `f`.
    pub fn with<R>(&self, f: impl FnOnce(&mut dyn Gpu) -> R) -> R {
        let mut gpu = self.inner.gpu.borrow_mut();
        f(gpu.as_mut())
    }

    /// Run `f` against the concrete backend, if it is a `B`.
    pub fn with_backend<B: Gpu + 'static, R>(&self, f: impl FnOnce(&mut B) -> R) -> Option<R> {
        let mut gpu = self.inner.gpu.borrow_mut();
        gpu.as_any_mut().downcast_mut::<B>().map(f)
    }

    pub fn limits(&self) -> GpuLimits {
        self.inner.gpu.borrow().limits()
    }

    pub fn shaders(&self) -> Ref<'_, ShaderLibrary> {
        self.inner.shaders.borrow()
    }

    /// Add or replace a shader source under a logical name.
    pub fn register_shader(&self, name: impl Into<String>, source: impl Into<String>) {
        self.inner.shaders.borrow_mut().register(name, source);
    }

    /// Get the shared instance of `T`, creating it if no live instance exists.
    ///
    /// The device only keeps a weak reference: the instance lives as long as
    /// some caller holds the returned `Rc`.
    pub fn shared<T: 'static, E>(
        &self,
        create: impl FnOnce(&GpuDevice) -> Result<T, E>,
    ) -> Result<Rc<T>, E> {
        let key = TypeId::of::<T>();
        let existing = self
            .inner
            .shared
            .borrow()
            .get(&key)
            .and_then(Weak::upgrade)
            .and_then(|any| any.downcast::<T>().ok());
        if let Some(existing) = existing {
            return Ok(existing);
        }

        let created = Rc::new(create(self)?);
        let erased: Rc<dyn Any> = created.clone();
        self.inner
            .shared
            .borrow_mut()
            .insert(key, Rc::downgrade(&erased));
        Ok(created)
    }

    pub fn create_buffer(
        &self,
        desc: &BufferDesc,
        contents: Option<&[u8]>,
    ) -> Result<Owned<BufferId>, GpuError> {
        let id = self.with(|gpu| gpu.create_buffer(desc, contents))?;
        Ok(Owned::new(self.clone(), id))
    }

    pub fn write_buffer(&self, buffer: BufferId, offset: u64, data: &[u8]) -> Result<(), GpuError> {
        self.with(|gpu| gpu.write_buffer(buffer, offset, data))
    }

    pub fn create_vertex_array(
        &self,
        desc: &VertexArrayDesc,
    ) -> Result<Owned<VertexArrayId>, GpuError> {
        let id = self.with(|gpu| gpu.create_vertex_array(desc))?;
        Ok(Owned::new(self.clone(), id))
    }

    pub fn create_texture(
        &self,
        desc: &TextureDesc,
        pixels: Option<&[u8]>,
    ) -> Result<Owned<TextureId>, GpuError> {
        let id = self.with(|gpu| gpu.create_texture(desc, pixels))?;
        Ok(Owned::new(self.clone(), id))
    }

    pub fn create_renderbuffer(
        &self,
        desc: &RenderbufferDesc,
    ) -> Result<Owned<RenderbufferId>, GpuError> {
        let id = self.with(|gpu| gpu.create_renderbuffer(desc))?;
        Ok(Owned::new(self.clone(), id))
    }

    pub fn create_framebuffer(
        &self,
        desc: &FramebufferDesc,
    ) -> Result<Owned<FramebufferId>, GpuError> {
        let id = self.with(|gpu| gpu.create_framebuffer(desc))?;
        Ok(Owned::new(self.clone(), id))
    }

    pub fn create_program(&self, name: &str, source: &str) -> Result<Owned<ProgramId>, GpuError> {
        let id = self.with(|gpu| gpu.create_program(name, source))?;
        Ok(Owned::new(self.clone(), id))
    }

    pub fn program_info(&self, program: ProgramId) -> Result<Rc<ProgramInfo>, GpuError> {
        self.inner.gpu.borrow().program_info(program)
    }

    pub fn uniform_block_layout(
        &self,
        program: ProgramId,
        block: &str,
    ) -> Result<Option<UniformBlockLayout>, GpuError> {
        Ok(self.program_info(program)?.block(block).cloned())
    }

    pub fn bind_uniform_block(
        &self,
        program: ProgramId,
        index: u32,
        buffer: BufferId,
    ) -> Result<(), GpuError> {
        self.with(|gpu| gpu.bind_uniform_block(program, index, buffer))
    }

    pub fn set_uniform(
        &self,
        program: ProgramId,
        name: &str,
        value: UniformValue,
    ) -> Result<(), GpuError> {
        self.with(|gpu| gpu.set_uniform(program, name, value))
    }

    pub fn bind_framebuffer(&self, framebuffer: Option<FramebufferId>) -> Result<(), GpuError> {
        self.with(|gpu| gpu.bind_framebuffer(framebuffer))
    }

    pub fn bound_framebuffer(&self) -> Option<FramebufferId> {
        self.inner.gpu.borrow().bound_framebuffer()
    }

    pub fn set_viewport(&self, viewport: Rect) {
        self.with(|gpu| gpu.set_viewport(viewport));
    }

    pub fn viewport(&self) -> Rect {
        self.inner.gpu.borrow().viewport()
    }

    pub fn set_render_state(&self, state: RenderState) {
        self.with(|gpu| gpu.set_render_state(state));
    }

    pub fn render_state(&self) -> RenderState {
        self.inner.gpu.borrow().render_state()
    }

    pub fn clear(&self, color: [f32; 4], depth: f32) -> Result<(), GpuError> {
        self.with(|gpu| gpu.clear(color, depth))
    }

    pub fn blit_framebuffer(&self, desc: &BlitDesc) -> Result<(), GpuError> {
        self.with(|gpu| gpu.blit_framebuffer(desc))
    }

    pub fn draw(&self, call: &DrawCall<'_>) -> Result<(), GpuError> {
        self.with(|gpu| gpu.draw(call))
    }

    pub(crate) fn release(&self, kind: ResourceKind, raw: u32) {
        let Ok(mut gpu) = self.inner.gpu.try_borrow_mut() else {
            tracing::error!("device busy, leaking {} {}", kind, raw);
            return;
        };
        let result = match kind {
            ResourceKind::Buffer => gpu.delete_buffer(BufferId::from_raw(raw)),
            ResourceKind::Texture => gpu.delete_texture(TextureId::from_raw(raw)),
            ResourceKind::Renderbuffer => gpu.delete_renderbuffer(RenderbufferId::from_raw(raw)),
            ResourceKind::Framebuffer => gpu.delete_framebuffer(FramebufferId::from_raw(raw)),
            ResourceKind::VertexArray => gpu.delete_vertex_array(VertexArrayId::from_raw(raw)),
            ResourceKind::Program => gpu.delete_program(ProgramId::from_raw(raw)),
        };
        match result {
            Ok(()) => tracing::trace!("released {} {}", kind, raw),
            Err(e) => tracing::warn!("failed to release {} {}: {}", kind, raw, e),
        }
    }

    /// Whether both handles drive the same backend.
    pub fn same_device(&self, other: &GpuDevice) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for GpuDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GpuDevice").finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owned_releases_on_drop() {
        let (device, gpu) = GpuDevice::tracking();
        let buffer = device
            .create_buffer(
                &BufferDesc {
                    kind: BufferKind::Vertex,
                    usage: BufferUsage::Static,
                    size: 16,
                },
                Some(&[0u8; 16]),
            )
            .unwrap();
        assert_eq!(gpu.live_count(ResourceKind::Buffer), 1);
        drop(buffer);
        assert_eq!(gpu.live_count(ResourceKind::Buffer), 0);
        assert!(gpu.violations().is_empty());
    }

    #[test]
    fn test_shared_instance_is_reused_while_alive() {
        let (device, _gpu) = GpuDevice::tracking();
        let mut calls = 0;
        let a = device
            .shared(|_| {
                calls += 1;
                Ok::<_, GpuError>(42u32)
            })
            .unwrap();
        let b = device
            .shared(|_| {
                calls += 1;
                Ok::<_, GpuError>(7u32)
            })
            .unwrap();
        assert_eq!(calls, 1);
        assert_eq!(*b, 42);
        drop(a);
        drop(b);
        let c = device.shared(|_| Ok::<_, GpuError>(7u32)).unwrap();
        assert_eq!(*c, 7);
    }

    #[test]
    fn test_backend_kind_from_str() {
        assert_eq!("wgpu".parse::<BackendKind>().unwrap(), BackendKind::Wgpu);
        assert_eq!("Tracking".parse::<BackendKind>().unwrap(), BackendKind::Tracking);
        assert!("vulkan".parse::<BackendKind>().is_err());
    }
}
