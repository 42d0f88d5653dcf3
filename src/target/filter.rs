//! Filter targets: a plain target re-rendered through a post-process shader
//!
//! [`FilterTarget`] composes a [`NoAaTarget`] with a [`Shader`], the
//! device-wide [`FullscreenQuad`] and a [`FilterParams`] implementation that
//! configures the shader around the quad draw.

use super::{BlitRegion, NoAaTarget, RenderTarget, TargetError};
use crate::gpu::{
    BufferDesc, BufferId, BufferKind, BufferUsage, DrawCall, DrawRange, FramebufferId, GpuDevice,
    GpuError, Owned, Primitive, ProgramId, Rect, TextureId, VertexArrayDesc, VertexArrayId,
    VertexAttribute, VertexLayout,
};
use crate::shader::Shader;
use std::rc::Rc;

/// Two triangles covering clip space, as a 4-vertex strip of `vec2` positions.
const QUAD_VERTICES: [f32; 8] = [-1.0, -1.0, 1.0, -1.0, -1.0, 1.0, 1.0, 1.0];

/// Clip-space quad shared by every filter target on a device.
pub struct FullscreenQuad {
    vertex_array: Owned<VertexArrayId>,
    vertex_buffer: Owned<BufferId>,
}

impl FullscreenQuad {
    pub fn new(device: &GpuDevice) -> Result<Self, GpuError> {
        let bytes: &[u8] = bytemuck::cast_slice(&QUAD_VERTICES);
        let vertex_buffer = device.create_buffer(
            &BufferDesc {
                kind: BufferKind::Vertex,
                usage: BufferUsage::Static,
                size: bytes.len() as u64,
            },
            Some(bytes),
        )?;
        let vertex_array = device.create_vertex_array(&VertexArrayDesc {
            vertex_buffer: vertex_buffer.id(),
            layout: VertexLayout {
                stride: 8,
                attributes: vec![VertexAttribute {
                    location: 0,
                    components: 2,
                    offset: 0,
                }],
            },
            index_buffer: None,
        })?;
        tracing::debug!("created fullscreen quad {}", vertex_array.id());
        Ok(Self {
            vertex_array,
            vertex_buffer,
        })
    }

    /// The quad of `device`, created on first use and kept while any holder lives.
    pub fn shared(device: &GpuDevice) -> Result<Rc<Self>, GpuError> {
        device.shared(Self::new)
    }

    pub fn vertex_buffer(&self) -> BufferId {
        self.vertex_buffer.id()
    }

    /// Draw the quad into the bound framebuffer.
    pub fn draw(
        &self,
        device: &GpuDevice,
        program: ProgramId,
        textures: &[TextureId],
    ) -> Result<(), GpuError> {
        device.draw(&DrawCall {
            program,
            vertex_array: self.vertex_array.id(),
            primitive: Primitive::TriangleStrip,
            range: DrawRange::Arrays { first: 0, count: 4 },
            textures,
        })
    }
}

/// What a filter's parameter hooks get to work with.
pub struct FilterContext<'a> {
    pub device: &'a GpuDevice,
    pub shader: &'a Shader,
    /// Size of the filtered target.
    pub width: u32,
    pub height: u32,
}

/// Variant hooks of a filter target.
pub trait FilterParams {
    /// Select the shader. Runs once, after the base target and quad exist.
    fn custom_init(&mut self, shader: &mut Shader) -> Result<(), TargetError>;

    /// Set uniforms and render state before the quad draw.
    fn set_custom_params(&self, ctx: &FilterContext<'_>) -> Result<(), TargetError>;

    /// Undo render state changes after the quad draw.
    fn unset_custom_params(&self, ctx: &FilterContext<'_>) -> Result<(), TargetError>;
}

pub struct FilterTarget<P: FilterParams> {
    params: P,
    shader: Shader,
    quad: Rc<FullscreenQuad>,
    base: NoAaTarget,
}

impl<P: FilterParams + Default> FilterTarget<P> {
    pub fn init(device: &GpuDevice, width: u32, height: u32) -> Result<Self, TargetError> {
        Self::with_params(device, width, height, P::default())
    }
}

impl<P: FilterParams> FilterTarget<P> {
    pub fn with_params(
        device: &GpuDevice,
        width: u32,
        height: u32,
        mut params: P,
    ) -> Result<Self, TargetError> {
        let base = NoAaTarget::init(device, width, height)?;
        let quad = FullscreenQuad::shared(device)?;
        let mut shader = Shader::new(device);
        params.custom_init(&mut shader)?;
        Ok(Self {
            params,
            shader,
            quad,
            base,
        })
    }

    pub fn base(&self) -> &NoAaTarget {
        &self.base
    }

    pub fn params(&self) -> &P {
        &self.params
    }

    pub fn shader(&self) -> &Shader {
        &self.shader
    }

    pub fn quad(&self) -> &Rc<FullscreenQuad> {
        &self.quad
    }
}

impl<P: FilterParams> RenderTarget for FilterTarget<P> {
    fn width(&self) -> u32 {
        self.base.width()
    }

    fn height(&self) -> u32 {
        self.base.height()
    }

    fn framebuffer(&self) -> FramebufferId {
        self.base.framebuffer()
    }

    fn clear_color(&self) -> [f32; 4] {
        self.base.clear_color()
    }

    fn set_clear_color(&mut self, color: [f32; 4]) {
        self.base.set_clear_color(color);
    }

    fn bind(&self) -> Result<(), TargetError> {
        self.base.bind()
    }

    fn unbind(&self) -> Result<(), TargetError> {
        self.base.unbind()
    }

    fn clear(&self) -> Result<(), TargetError> {
        self.base.clear()
    }

    /// Draw the base color through the filter shader into the region.
    fn blit(&self, region: &BlitRegion) -> Result<(), TargetError> {
        if region.attachment != 0 {
            tracing::error!(
                "ERROR wrong target number {} in filter blit, max. is 0",
                region.attachment
            );
            return Err(TargetError::AttachmentIndex {
                index: region.attachment,
                count: 1,
            });
        }
        let device = self.base.device();
        let program = self.shader.require_program()?;
        let source = self.base.color();

        let previous = device.bound_framebuffer();
        let dst = if region.bind_default { None } else { previous };
        if dst == Some(self.framebuffer()) {
            tracing::error!("filter blit of {} into itself", self.framebuffer());
            return Err(TargetError::SelfBlit);
        }
        let previous_viewport = device.viewport();
        device.bind_framebuffer(dst)?;
        device.set_viewport(Rect::new(region.x, region.y, region.width, region.height));

        let ctx = FilterContext {
            device,
            shader: &self.shader,
            width: self.width(),
            height: self.height(),
        };
        let drawn = self
            .params
            .set_custom_params(&ctx)
            .and_then(|()| {
                self.quad
                    .draw(device, program, &[source])
                    .map_err(TargetError::from)
            });
        let unset = self.params.unset_custom_params(&ctx);
        device.set_viewport(previous_viewport);

        drawn.inspect_err(|e| tracing::error!("ERROR applying filter: {}", e))?;
        unset
    }

    fn color_texture(&self) -> Option<TextureId> {
        self.base.color_texture()
    }

    fn depth_texture(&self) -> Option<TextureId> {
        self.base.depth_texture()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::{GpuEvent, RenderState, ResourceKind};
    use crate::shader::names;
    use std::cell::Cell;

    #[derive(Default)]
    struct Invert {
        set: Cell<u32>,
        unset: Cell<u32>,
    }

    impl FilterParams for Invert {
        fn custom_init(&mut self, shader: &mut Shader) -> Result<(), TargetError> {
            Ok(shader.use_program(names::FXAA)?)
        }

        fn set_custom_params(&self, ctx: &FilterContext<'_>) -> Result<(), TargetError> {
            self.set.set(self.set.get() + 1);
            ctx.device.set_render_state(RenderState {
                blend: true,
                ..ctx.device.render_state()
            });
            Ok(())
        }

        fn unset_custom_params(&self, ctx: &FilterContext<'_>) -> Result<(), TargetError> {
            self.unset.set(self.unset.get() + 1);
            ctx.device.set_render_state(RenderState {
                blend: false,
                ..ctx.device.render_state()
            });
            Ok(())
        }
    }

    #[test]
    fn test_quad_is_created_once_per_device() {
        let (device, gpu) = GpuDevice::tracking();
        let a = FilterTarget::<Invert>::init(&device, 16, 16).unwrap();
        let b = FilterTarget::<Invert>::init(&device, 32, 32).unwrap();
        assert!(Rc::ptr_eq(a.quad(), b.quad()));
        assert_eq!(gpu.created_count(ResourceKind::VertexArray), 1);

        drop(a);
        assert_eq!(gpu.live_count(ResourceKind::VertexArray), 1);
        drop(b);
        assert_eq!(gpu.live_count(ResourceKind::VertexArray), 0);
        assert_eq!(gpu.total_live(), 0);
    }

    #[test]
    fn test_quad_layout() {
        let (device, gpu) = GpuDevice::tracking();
        let quad = FullscreenQuad::new(&device).unwrap();
        let data = gpu.buffer_data(quad.vertex_buffer()).unwrap();
        assert_eq!(data.len(), 32);
        assert_eq!(&data[8..12], &1.0f32.to_ne_bytes());
    }

    #[test]
    fn test_blit_wraps_params_around_quad_draw() {
        let (device, gpu) = GpuDevice::tracking();
        let target = FilterTarget::<Invert>::init(&device, 16, 16).unwrap();
        gpu.fill(
            crate::gpu::Attachment::Texture(target.color_texture().unwrap()),
            [0.5, 0.5, 0.5, 1.0],
        );
        gpu.clear_events();

        target.blit(&BlitRegion::screen(16, 16)).unwrap();

        assert_eq!(target.params().set.get(), 1);
        assert_eq!(target.params().unset.get(), 1);
        assert_eq!(gpu.screen_color(), [0.5, 0.5, 0.5, 1.0]);
        let draw = gpu
            .events()
            .into_iter()
            .find_map(|e| match e {
                GpuEvent::Draw {
                    framebuffer,
                    primitive,
                    state,
                    textures,
                    ..
                } => Some((framebuffer, primitive, state, textures)),
                _ => None,
            })
            .unwrap();
        assert_eq!(draw.0, None);
        assert_eq!(draw.1, Primitive::TriangleStrip);
        assert!(draw.2.blend);
        assert_eq!(draw.3, vec![target.color_texture().unwrap()]);
        assert!(!device.render_state().blend);
    }

    #[test]
    fn test_blit_into_bound_target_restores_viewport() {
        let (device, _gpu) = GpuDevice::tracking();
        let filter = FilterTarget::<Invert>::init(&device, 16, 16).unwrap();
        let other = NoAaTarget::init(&device, 64, 64).unwrap();
        other.bind().unwrap();

        filter
            .blit(&BlitRegion::new(8, 8, 16, 16).into_bound())
            .unwrap();

        assert_eq!(device.bound_framebuffer(), Some(other.framebuffer()));
        assert_eq!(device.viewport(), Rect::from_size(64, 64));
    }

    #[test]
    fn test_blit_to_screen_leaves_default_bound() {
        let (device, gpu) = GpuDevice::tracking();
        let filter = FilterTarget::<Invert>::init(&device, 16, 16).unwrap();
        let other = NoAaTarget::init(&device, 64, 64).unwrap();
        other.bind().unwrap();
        gpu.clear_events();

        filter.blit(&BlitRegion::screen(16, 16)).unwrap();

        assert_eq!(device.bound_framebuffer(), None);
        assert_eq!(device.viewport(), Rect::from_size(64, 64));
        assert!(gpu
            .events()
            .iter()
            .all(|e| e.written_framebuffer() != Some(Some(other.framebuffer()))));
    }

    #[test]
    fn test_blit_rejects_second_attachment() {
        let (device, _gpu) = GpuDevice::tracking();
        let filter = FilterTarget::<Invert>::init(&device, 16, 16).unwrap();
        let err = filter
            .blit(&BlitRegion::screen(16, 16).with_attachment(1))
            .unwrap_err();
        assert!(matches!(
            err,
            TargetError::AttachmentIndex { index: 1, count: 1 }
        ));
        assert_eq!(device.bound_framebuffer(), None);
    }
}
