//! wgpu backend
//!
//! Maps the GL-shaped [`Gpu`] command set onto wgpu. Every draw, clear and
//! blit records and submits its own render pass with `LoadOp::Load`, so
//! commands land in exactly the order they were issued. The default
//! framebuffer is the window surface texture handed in through
//! [`WgpuGpu::set_screen`] each frame.

mod blit;
mod pipeline;

use crate::context::WgpuContext;
use crate::gpu::handle::*;
use crate::gpu::reflect::ProgramInfo;
use crate::gpu::*;
use blit::{BlitTarget, Blitter};
use pipeline::{PipelineCache, PipelineKey};
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;
use wgpu::util::DeviceExt;

/// Storage format of color images.
pub const COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;
/// Storage format of depth images.
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// Sample counts every wgpu adapter supports for the formats above.
const SUPPORTED_SAMPLES: [u32; 2] = [1, 4];

struct BufferEntry {
    buffer: wgpu::Buffer,
}

struct ImageEntry {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    format: wgpu::TextureFormat,
    width: u32,
    height: u32,
    samples: u32,
}

struct TextureEntry {
    image: ImageEntry,
    sampler: wgpu::Sampler,
}

struct FramebufferEntry {
    desc: FramebufferDesc,
    width: u32,
    height: u32,
}

struct BlockStorage {
    data: Vec<u8>,
    buffer: wgpu::Buffer,
    external: Option<BufferId>,
    dirty: bool,
}

struct ProgramEntry {
    info: Rc<ProgramInfo>,
    module: wgpu::ShaderModule,
    blocks: Vec<BlockStorage>,
}

struct Screen {
    view: wgpu::TextureView,
    format: wgpu::TextureFormat,
    width: u32,
    height: u32,
}

/// Attachments of the framebuffer a pass renders into.
struct PassTarget {
    color: Vec<wgpu::TextureView>,
    formats: Vec<wgpu::TextureFormat>,
    depth: Option<wgpu::TextureView>,
    depth_format: Option<wgpu::TextureFormat>,
    samples: u32,
    width: u32,
    height: u32,
}

/// [`Gpu`] implementation on wgpu.
pub struct WgpuGpu {
    ctx: WgpuContext,
    limits: GpuLimits,
    next_id: u32,
    buffers: HashMap<BufferId, BufferEntry>,
    vertex_arrays: HashMap<VertexArrayId, VertexArrayDesc>,
    textures: HashMap<TextureId, TextureEntry>,
    renderbuffers: HashMap<RenderbufferId, ImageEntry>,
    framebuffers: HashMap<FramebufferId, FramebufferEntry>,
    resolves: HashMap<(FramebufferId, u32), ImageEntry>,
    programs: HashMap<ProgramId, ProgramEntry>,
    pipelines: PipelineCache,
    blitter: Option<Blitter>,
    comparison_sampler: wgpu::Sampler,
    screen: Option<Screen>,
    screen_depth: Option<ImageEntry>,
    bound: Option<FramebufferId>,
    viewport: Rect,
    state: RenderState,
}

impl WgpuGpu {
    pub fn new(ctx: WgpuContext) -> Self {
        let device_limits = ctx.device.limits();
        let limits = GpuLimits {
            max_color_attachments: device_limits.max_color_attachments,
            max_samples: 4,
            max_texture_size: device_limits.max_texture_dimension_2d,
        };
        let comparison_sampler = ctx.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("comparison sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::MipmapFilterMode::Nearest,
            compare: Some(wgpu::CompareFunction::LessEqual),
            ..Default::default()
        });

        Self {
            ctx,
            limits,
            next_id: 1,
            buffers: HashMap::new(),
            vertex_arrays: HashMap::new(),
            textures: HashMap::new(),
            renderbuffers: HashMap::new(),
            framebuffers: HashMap::new(),
            resolves: HashMap::new(),
            programs: HashMap::new(),
            pipelines: PipelineCache::default(),
            blitter: None,
            comparison_sampler,
            screen: None,
            screen_depth: None,
            bound: None,
            viewport: Rect::default(),
            state: RenderState::default(),
        }
    }

    pub fn context(&self) -> &WgpuContext {
        &self.ctx
    }

    /// Use `view` as the default framebuffer until [`release_screen`](Self::release_screen).
    pub fn set_screen(
        &mut self,
        view: wgpu::TextureView,
        width: u32,
        height: u32,
        format: wgpu::TextureFormat,
    ) {
        self.screen = Some(Screen {
            view,
            format,
            width,
            height,
        });
    }

    /// Drop the surface view so the surface texture can be presented.
    pub fn release_screen(&mut self) {
        self.screen = None;
    }

    fn next<H: Handle>(&mut self) -> H {
        let raw = self.next_id;
        self.next_id += 1;
        H::from_raw(raw)
    }

    fn create_image(
        &self,
        label: &str,
        width: u32,
        height: u32,
        format: TextureFormat,
        samples: u32,
        sampled: bool,
    ) -> Result<ImageEntry, GpuError> {
        let max = self.limits.max_texture_size;
        if width == 0 || height == 0 || width > max || height > max {
            return Err(GpuError::TextureTooLarge { width, height, max });
        }
        let wgpu_format = if format.is_depth() {
            DEPTH_FORMAT
        } else {
            COLOR_FORMAT
        };
        let mut usage = wgpu::TextureUsages::RENDER_ATTACHMENT;
        if sampled && samples == 1 {
            usage |= wgpu::TextureUsages::TEXTURE_BINDING;
            if !format.is_depth() {
                usage |= wgpu::TextureUsages::COPY_DST | wgpu::TextureUsages::COPY_SRC;
            }
        }
        let texture = self.ctx.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: samples,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu_format,
            usage,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Ok(ImageEntry {
            texture,
            view,
            format: wgpu_format,
            width,
            height,
            samples,
        })
    }

    fn attachment(&self, attachment: Attachment) -> Result<&ImageEntry, GpuError> {
        match attachment {
            Attachment::Texture(id) => self
                .textures
                .get(&id)
                .map(|entry| &entry.image)
                .ok_or_else(|| GpuError::unknown(id)),
            Attachment::Renderbuffer(id) => self
                .renderbuffers
                .get(&id)
                .ok_or_else(|| GpuError::unknown(id)),
        }
    }

    fn pass_target(&mut self) -> Result<PassTarget, GpuError> {
        if let Some(fb) = self.bound {
            let entry = self
                .framebuffers
                .get(&fb)
                .ok_or_else(|| GpuError::unknown(fb))?;
            let mut color = Vec::with_capacity(entry.desc.color.len());
            let mut formats = Vec::with_capacity(entry.desc.color.len());
            let mut samples = 1;
            for attachment in &entry.desc.color {
                let image = self.attachment(*attachment)?;
                color.push(image.view.clone());
                formats.push(image.format);
                samples = image.samples;
            }
            let depth = entry
                .desc
                .depth
                .map(|attachment| self.attachment(attachment))
                .transpose()?;
            if let Some(depth) = depth {
                samples = depth.samples;
            }
            return Ok(PassTarget {
                color,
                formats,
                depth: depth.map(|image| image.view.clone()),
                depth_format: depth.map(|image| image.format),
                samples,
                width: entry.width,
                height: entry.height,
            });
        }

        let (width, height) = match &self.screen {
            Some(screen) => (screen.width, screen.height),
            None => return Err(GpuError::NoDefaultFramebuffer),
        };
        let stale = self
            .screen_depth
            .as_ref()
            .is_none_or(|depth| depth.width != width || depth.height != height);
        if stale {
            self.screen_depth = Some(self.create_image(
                "screen depth",
                width,
                height,
                TextureFormat::Depth32,
                1,
                false,
            )?);
        }
        let screen = self.screen.as_ref().ok_or(GpuError::NoDefaultFramebuffer)?;
        let depth = self.screen_depth.as_ref();
        Ok(PassTarget {
            color: vec![screen.view.clone()],
            formats: vec![screen.format],
            depth: depth.map(|image| image.view.clone()),
            depth_format: depth.map(|image| image.format),
            samples: 1,
            width,
            height,
        })
    }

    fn bind_groups(
        &self,
        pipeline: &wgpu::RenderPipeline,
        program: &ProgramEntry,
        textures: &[TextureId],
    ) -> Result<Vec<(u32, wgpu::BindGroup)>, GpuError> {
        let info = &program.info;
        let mut groups: BTreeMap<u32, Vec<wgpu::BindGroupEntry<'_>>> = BTreeMap::new();

        for (layout, storage) in info.blocks.iter().zip(&program.blocks) {
            let buffer = match storage.external {
                Some(id) => {
                    &self
                        .buffers
                        .get(&id)
                        .ok_or_else(|| GpuError::unknown(id))?
                        .buffer
                }
                None => &storage.buffer,
            };
            groups
                .entry(layout.group)
                .or_default()
                .push(wgpu::BindGroupEntry {
                    binding: layout.binding,
                    resource: buffer.as_entire_binding(),
                });
        }

        for (slot, texture) in info.textures.iter().zip(textures) {
            let entry = self
                .textures
                .get(texture)
                .ok_or_else(|| GpuError::unknown(*texture))?;
            groups
                .entry(slot.group)
                .or_default()
                .push(wgpu::BindGroupEntry {
                    binding: slot.binding,
                    resource: wgpu::BindingResource::TextureView(&entry.image.view),
                });
        }

        for (unit, slot) in info.samplers.iter().enumerate() {
            let sampler = if slot.comparison {
                &self.comparison_sampler
            } else {
                let texture = textures.get(unit).ok_or_else(|| {
                    GpuError::InvalidArgument(format!("no texture bound for sampler {unit}"))
                })?;
                &self
                    .textures
                    .get(texture)
                    .ok_or_else(|| GpuError::unknown(*texture))?
                    .sampler
            };
            groups
                .entry(slot.group)
                .or_default()
                .push(wgpu::BindGroupEntry {
                    binding: slot.binding,
                    resource: wgpu::BindingResource::Sampler(sampler),
                });
        }

        Ok(groups
            .into_iter()
            .map(|(group, entries)| {
                let layout = pipeline.get_bind_group_layout(group);
                let bind_group = self.ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some(&info.name),
                    layout: &layout,
                    entries: &entries,
                });
                (group, bind_group)
            })
            .collect())
    }

    /// Single-sample copy of a multisampled attachment, refreshed on each call.
    fn resolve(&mut self, fb: FramebufferId, index: u32, source: &wgpu::TextureView, width: u32, height: u32)
        -> Result<wgpu::TextureView, GpuError> {
        let stale = self
            .resolves
            .get(&(fb, index))
            .is_none_or(|image| image.width != width || image.height != height);
        if stale {
            let image =
                self.create_image("resolve", width, height, TextureFormat::Rgba8, 1, true)?;
            self.resolves.insert((fb, index), image);
        }
        let target = self
            .resolves
            .get(&(fb, index))
            .map(|image| image.view.clone())
            .ok_or_else(|| GpuError::Backend("resolve texture missing".into()))?;

        let mut encoder = self.ctx.create_encoder(Some("resolve encoder"));
        {
            let _pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("resolve pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: source,
                    resolve_target: Some(&target),
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });
        }
        self.ctx.submit([encoder.finish()]);
        Ok(target)
    }
}

/// Convert a bottom-left rectangle into a top-left viewport clamped to the target.
pub(super) fn viewport_in(rect: Rect, width: u32, height: u32) -> Option<(f32, f32, f32, f32)> {
    let x = rect.x.min(width);
    let y = rect.y.min(height);
    let w = rect.width.min(width - x);
    let h = rect.height.min(height - y);
    if w == 0 || h == 0 {
        return None;
    }
    let top = height - (y + h);
    Some((x as f32, top as f32, w as f32, h as f32))
}

fn begin_pass<'e>(
    encoder: &'e mut wgpu::CommandEncoder,
    target: &PassTarget,
    clear: Option<([f32; 4], f32)>,
) -> wgpu::RenderPass<'e> {
    let color_load = match clear {
        Some((c, _)) => wgpu::LoadOp::Clear(wgpu::Color {
            r: c[0] as f64,
            g: c[1] as f64,
            b: c[2] as f64,
            a: c[3] as f64,
        }),
        None => wgpu::LoadOp::Load,
    };
    let depth_load = match clear {
        Some((_, depth)) => wgpu::LoadOp::Clear(depth),
        None => wgpu::LoadOp::Load,
    };

    let color_attachments: Vec<Option<wgpu::RenderPassColorAttachment<'_>>> = target
        .color
        .iter()
        .map(|view| {
            Some(wgpu::RenderPassColorAttachment {
                view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: color_load,
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })
        })
        .collect();

    let depth_stencil_attachment =
        target
            .depth
            .as_ref()
            .map(|view| wgpu::RenderPassDepthStencilAttachment {
                view,
                depth_ops: Some(wgpu::Operations {
                    load: depth_load,
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            });

    encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some("lumen pass"),
        color_attachments: &color_attachments,
        depth_stencil_attachment,
        timestamp_writes: None,
        occlusion_query_set: None,
        multiview_mask: None,
    })
}

fn filter_mode(filter: Filter) -> wgpu::FilterMode {
    match filter {
        Filter::Nearest => wgpu::FilterMode::Nearest,
        Filter::Linear => wgpu::FilterMode::Linear,
    }
}

fn address_mode(wrap: Wrap) -> wgpu::AddressMode {
    match wrap {
        Wrap::Repeat => wgpu::AddressMode::Repeat,
        Wrap::ClampToEdge => wgpu::AddressMode::ClampToEdge,
    }
}

impl Gpu for WgpuGpu {
    fn limits(&self) -> GpuLimits {
        self.limits
    }

    fn create_buffer(
        &mut self,
        desc: &BufferDesc,
        contents: Option<&[u8]>,
    ) -> Result<BufferId, GpuError> {
        let usage = wgpu::BufferUsages::COPY_DST
            | match desc.kind {
                BufferKind::Vertex => wgpu::BufferUsages::VERTEX,
                BufferKind::Index => wgpu::BufferUsages::INDEX,
                BufferKind::Uniform => wgpu::BufferUsages::UNIFORM,
            };
        let buffer = match contents {
            Some(bytes) => self
                .ctx
                .device
                .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("lumen buffer"),
                    contents: bytes,
                    usage,
                }),
            None => self.ctx.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("lumen buffer"),
                size: desc.size.next_multiple_of(wgpu::COPY_BUFFER_ALIGNMENT),
                usage,
                mapped_at_creation: false,
            }),
        };
        let id = self.next();
        self.buffers.insert(id, BufferEntry { buffer });
        Ok(id)
    }

    fn write_buffer(&mut self, buffer: BufferId, offset: u64, data: &[u8]) -> Result<(), GpuError> {
        let entry = self
            .buffers
            .get(&buffer)
            .ok_or_else(|| GpuError::unknown(buffer))?;
        if data.len() as u64 % wgpu::COPY_BUFFER_ALIGNMENT != 0 {
            let mut padded = data.to_vec();
            padded.resize(
                (data.len() as u64).next_multiple_of(wgpu::COPY_BUFFER_ALIGNMENT) as usize,
                0,
            );
            self.ctx.queue.write_buffer(&entry.buffer, offset, &padded);
        } else {
            self.ctx.queue.write_buffer(&entry.buffer, offset, data);
        }
        Ok(())
    }

    fn delete_buffer(&mut self, buffer: BufferId) -> Result<(), GpuError> {
        let entry = self
            .buffers
            .remove(&buffer)
            .ok_or_else(|| GpuError::unknown(buffer))?;
        entry.buffer.destroy();
        Ok(())
    }

    fn create_vertex_array(&mut self, desc: &VertexArrayDesc) -> Result<VertexArrayId, GpuError> {
        if !self.buffers.contains_key(&desc.vertex_buffer) {
            return Err(GpuError::unknown(desc.vertex_buffer));
        }
        if let Some(index_buffer) = desc.index_buffer {
            if !self.buffers.contains_key(&index_buffer) {
                return Err(GpuError::unknown(index_buffer));
            }
        }
        let id = self.next();
        self.vertex_arrays.insert(id, desc.clone());
        Ok(id)
    }

    fn delete_vertex_array(&mut self, vertex_array: VertexArrayId) -> Result<(), GpuError> {
        self.vertex_arrays
            .remove(&vertex_array)
            .map(|_| ())
            .ok_or_else(|| GpuError::unknown(vertex_array))
    }

    fn create_texture(
        &mut self,
        desc: &TextureDesc,
        pixels: Option<&[u8]>,
    ) -> Result<TextureId, GpuError> {
        let image = self.create_image(
            "lumen texture",
            desc.width,
            desc.height,
            desc.format,
            1,
            true,
        )?;

        if let Some(pixels) = pixels {
            let expected = (desc.width * desc.height) as usize * desc.format.pixel_size();
            if pixels.len() != expected {
                return Err(GpuError::InvalidArgument(format!(
                    "expected {} bytes of pixels, got {}",
                    expected,
                    pixels.len()
                )));
            }
            if desc.format.is_depth() {
                return Err(GpuError::InvalidArgument(
                    "depth textures cannot be uploaded".into(),
                ));
            }
            let rgba: std::borrow::Cow<'_, [u8]> = match desc.format {
                TextureFormat::Rgb8 => pixels
                    .chunks_exact(3)
                    .flat_map(|rgb| [rgb[0], rgb[1], rgb[2], 255])
                    .collect::<Vec<u8>>()
                    .into(),
                _ => pixels.into(),
            };
            self.ctx.queue.write_texture(
                wgpu::TexelCopyTextureInfo {
                    texture: &image.texture,
                    mip_level: 0,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                &rgba,
                wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(4 * desc.width),
                    rows_per_image: Some(desc.height),
                },
                wgpu::Extent3d {
                    width: desc.width,
                    height: desc.height,
                    depth_or_array_layers: 1,
                },
            );
        }

        let sampler = self.ctx.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("lumen sampler"),
            address_mode_u: address_mode(desc.wrap),
            address_mode_v: address_mode(desc.wrap),
            address_mode_w: address_mode(desc.wrap),
            mag_filter: filter_mode(desc.filter),
            min_filter: filter_mode(desc.filter),
            mipmap_filter: wgpu::MipmapFilterMode::Nearest,
            ..Default::default()
        });

        let id = self.next();
        self.textures.insert(id, TextureEntry { image, sampler });
        Ok(id)
    }

    fn delete_texture(&mut self, texture: TextureId) -> Result<(), GpuError> {
        let entry = self
            .textures
            .remove(&texture)
            .ok_or_else(|| GpuError::unknown(texture))?;
        entry.image.texture.destroy();
        Ok(())
    }

    fn create_renderbuffer(&mut self, desc: &RenderbufferDesc) -> Result<RenderbufferId, GpuError> {
        if !SUPPORTED_SAMPLES.contains(&desc.samples) {
            return Err(GpuError::UnsupportedSamples {
                requested: desc.samples,
                max: self.limits.max_samples,
            });
        }
        let image = self.create_image(
            "lumen renderbuffer",
            desc.width,
            desc.height,
            desc.format,
            desc.samples,
            true,
        )?;
        let id = self.next();
        self.renderbuffers.insert(id, image);
        Ok(id)
    }

    fn delete_renderbuffer(&mut self, renderbuffer: RenderbufferId) -> Result<(), GpuError> {
        let image = self
            .renderbuffers
            .remove(&renderbuffer)
            .ok_or_else(|| GpuError::unknown(renderbuffer))?;
        image.texture.destroy();
        Ok(())
    }

    fn create_framebuffer(&mut self, desc: &FramebufferDesc) -> Result<FramebufferId, GpuError> {
        let limits = self.limits;
        let (width, height, _) = validate_framebuffer(desc, &limits, |attachment| {
            let image = self.attachment(attachment)?;
            let format = if image.format == DEPTH_FORMAT {
                TextureFormat::Depth32
            } else {
                TextureFormat::Rgba8
            };
            Ok((image.width, image.height, image.samples, format))
        })?;
        let id = self.next();
        self.framebuffers.insert(
            id,
            FramebufferEntry {
                desc: desc.clone(),
                width,
                height,
            },
        );
        Ok(id)
    }

    fn delete_framebuffer(&mut self, framebuffer: FramebufferId) -> Result<(), GpuError> {
        self.framebuffers
            .remove(&framebuffer)
            .ok_or_else(|| GpuError::unknown(framebuffer))?;
        self.resolves.retain(|(fb, _), _| *fb != framebuffer);
        if self.bound == Some(framebuffer) {
            self.bound = None;
        }
        Ok(())
    }

    fn bind_framebuffer(&mut self, framebuffer: Option<FramebufferId>) -> Result<(), GpuError> {
        if let Some(fb) = framebuffer {
            if !self.framebuffers.contains_key(&fb) {
                return Err(GpuError::unknown(fb));
            }
        }
        self.bound = framebuffer;
        Ok(())
    }

    fn bound_framebuffer(&self) -> Option<FramebufferId> {
        self.bound
    }

    fn set_viewport(&mut self, viewport: Rect) {
        self.viewport = viewport;
    }

    fn viewport(&self) -> Rect {
        self.viewport
    }

    fn set_render_state(&mut self, state: RenderState) {
        self.state = state;
    }

    fn render_state(&self) -> RenderState {
        self.state
    }

    fn clear(&mut self, color: [f32; 4], depth: f32) -> Result<(), GpuError> {
        let target = self.pass_target()?;
        let mut encoder = self.ctx.create_encoder(Some("clear encoder"));
        {
            let _pass = begin_pass(&mut encoder, &target, Some((color, depth)));
        }
        self.ctx.submit([encoder.finish()]);
        Ok(())
    }

    fn blit_framebuffer(&mut self, desc: &BlitDesc) -> Result<(), GpuError> {
        let src = self
            .framebuffers
            .get(&desc.src)
            .ok_or_else(|| GpuError::unknown(desc.src))?;
        let attachment = src
            .desc
            .color
            .get(desc.src_attachment as usize)
            .copied()
            .ok_or_else(|| {
                GpuError::InvalidArgument(format!(
                    "source has {} color attachments, asked for {}",
                    src.desc.color.len(),
                    desc.src_attachment
                ))
            })?;
        let image = self.attachment(attachment)?;
        let (view, width, height, samples) =
            (image.view.clone(), image.width, image.height, image.samples);
        let source = if samples > 1 {
            self.resolve(desc.src, desc.src_attachment, &view, width, height)?
        } else {
            view
        };

        let previous = self.bound;
        self.bound = desc.dst;
        let target = self.pass_target();
        self.bound = previous;
        let target = target?;
        let dst_view = target
            .color
            .first()
            .ok_or_else(|| GpuError::InvalidArgument("destination has no color".into()))?;

        let blitter = self.blitter.get_or_insert_with(|| Blitter::new(&self.ctx));
        blitter.blit(
            &self.ctx,
            &source,
            (width, height),
            desc.src_rect,
            &BlitTarget {
                view: dst_view,
                format: target.formats[0],
                samples: target.samples,
                width: target.width,
                height: target.height,
            },
            desc.dst_rect,
            desc.filter,
        );
        Ok(())
    }

    fn create_program(&mut self, name: &str, source: &str) -> Result<ProgramId, GpuError> {
        let info = ProgramInfo::from_wgsl(name, source)?;
        let module = self
            .ctx
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(name),
                source: wgpu::ShaderSource::Wgsl(source.into()),
            });
        let blocks = info
            .blocks
            .iter()
            .map(|block| BlockStorage {
                data: vec![0; block.size as usize],
                buffer: self.ctx.device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some(&block.name),
                    size: (block.size as u64).max(16),
                    usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                    mapped_at_creation: false,
                }),
                external: None,
                dirty: true,
            })
            .collect();
        let id = self.next();
        self.programs.insert(
            id,
            ProgramEntry {
                info: Rc::new(info),
                module,
                blocks,
            },
        );
        Ok(id)
    }

    fn delete_program(&mut self, program: ProgramId) -> Result<(), GpuError> {
        self.programs
            .remove(&program)
            .ok_or_else(|| GpuError::unknown(program))?;
        self.pipelines.forget_program(program);
        Ok(())
    }

    fn program_info(&self, program: ProgramId) -> Result<Rc<ProgramInfo>, GpuError> {
        self.programs
            .get(&program)
            .map(|entry| entry.info.clone())
            .ok_or_else(|| GpuError::unknown(program))
    }

    fn bind_uniform_block(
        &mut self,
        program: ProgramId,
        index: u32,
        buffer: BufferId,
    ) -> Result<(), GpuError> {
        if !self.buffers.contains_key(&buffer) {
            return Err(GpuError::unknown(buffer));
        }
        let entry = self
            .programs
            .get_mut(&program)
            .ok_or_else(|| GpuError::unknown(program))?;
        let storage = entry.blocks.get_mut(index as usize).ok_or_else(|| {
            GpuError::InvalidArgument(format!(
                "program '{}' has no uniform block {}",
                entry.info.name, index
            ))
        })?;
        storage.external = Some(buffer);
        Ok(())
    }

    fn set_uniform(
        &mut self,
        program: ProgramId,
        name: &str,
        value: UniformValue,
    ) -> Result<(), GpuError> {
        let entry = self
            .programs
            .get_mut(&program)
            .ok_or_else(|| GpuError::unknown(program))?;
        let (block, field) = entry
            .info
            .find_uniform(name)
            .ok_or_else(|| GpuError::UnknownUniform(name.to_string()))?;
        if value.size() > field.size as usize {
            return Err(GpuError::InvalidArgument(format!(
                "{} bytes do not fit uniform '{}' of {} bytes",
                value.size(),
                name,
                field.size
            )));
        }
        let storage = &mut entry.blocks[block.index as usize];
        value.write_to(&mut storage.data[field.offset as usize..]);
        storage.dirty = true;
        Ok(())
    }

    fn draw(&mut self, call: &DrawCall<'_>) -> Result<(), GpuError> {
        let target = self.pass_target()?;
        let vertex_array = self
            .vertex_arrays
            .get(&call.vertex_array)
            .cloned()
            .ok_or_else(|| GpuError::unknown(call.vertex_array))?;
        let program = self
            .programs
            .get_mut(&call.program)
            .ok_or_else(|| GpuError::unknown(call.program))?;
        if call.textures.len() < program.info.textures.len() {
            return Err(GpuError::InvalidArgument(format!(
                "program '{}' samples {} textures, {} bound",
                program.info.name,
                program.info.textures.len(),
                call.textures.len()
            )));
        }

        for storage in program
            .blocks
            .iter_mut()
            .filter(|storage| storage.dirty && storage.external.is_none())
        {
            self.ctx.queue.write_buffer(&storage.buffer, 0, &storage.data);
            storage.dirty = false;
        }

        let key = PipelineKey {
            program: call.program,
            layout: vertex_array.layout.clone(),
            primitive: call.primitive,
            color_formats: target.formats.clone(),
            depth_format: target.depth_format,
            samples: target.samples,
            state: self.state,
        };
        let pipeline =
            self.pipelines
                .get_or_create(&self.ctx.device, key, &program.module, &program.info);

        let program = self
            .programs
            .get(&call.program)
            .ok_or_else(|| GpuError::unknown(call.program))?;
        let bind_groups = self.bind_groups(&pipeline, program, call.textures)?;

        let vertex_buffer = self
            .buffers
            .get(&vertex_array.vertex_buffer)
            .ok_or_else(|| GpuError::unknown(vertex_array.vertex_buffer))?;
        let index_buffer = vertex_array
            .index_buffer
            .map(|id| self.buffers.get(&id).ok_or_else(|| GpuError::unknown(id)))
            .transpose()?;

        let Some((x, y, width, height)) = viewport_in(self.viewport, target.width, target.height)
        else {
            return Ok(());
        };

        let mut encoder = self.ctx.create_encoder(Some("draw encoder"));
        {
            let mut pass = begin_pass(&mut encoder, &target, None);
            pass.set_viewport(x, y, width, height, 0.0, 1.0);
            pass.set_pipeline(&pipeline);
            for (group, bind_group) in &bind_groups {
                pass.set_bind_group(*group, bind_group, &[]);
            }
            pass.set_vertex_buffer(0, vertex_buffer.buffer.slice(..));
            match call.range {
                DrawRange::Indexed { byte_offset, count } => {
                    let index_buffer = index_buffer.ok_or_else(|| {
                        GpuError::InvalidArgument("indexed draw without an index buffer".into())
                    })?;
                    pass.set_index_buffer(index_buffer.buffer.slice(..), wgpu::IndexFormat::Uint32);
                    let first = (byte_offset / 4) as u32;
                    pass.draw_indexed(first..first + count, 0, 0..1);
                }
                DrawRange::Arrays { first, count } => {
                    pass.draw(first..first + count, 0..1);
                }
            }
        }
        self.ctx.submit([encoder.finish()]);
        Ok(())
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_viewport_flips_to_top_left() {
        let viewport = viewport_in(Rect::new(0, 0, 100, 50), 100, 200).unwrap();
        assert_eq!(viewport, (0.0, 150.0, 100.0, 50.0));
    }

    #[test]
    fn test_viewport_clamps_to_target() {
        let viewport = viewport_in(Rect::new(50, 0, 100, 100), 80, 80).unwrap();
        assert_eq!(viewport, (50.0, 0.0, 30.0, 80.0));
        assert!(viewport_in(Rect::new(90, 0, 10, 10), 80, 80).is_none());
    }
}
