//! Framebuffer blits
//!
//! wgpu has no scaled framebuffer copy, so a blit is a fullscreen-triangle
//! pass that samples the source rectangle into the destination viewport.

use super::viewport_in;
use crate::context::WgpuContext;
use crate::gpu::{Filter, Rect};
use std::collections::HashMap;
use wgpu::util::DeviceExt;

const BLIT_SHADER: &str = include_str!("../../shaders/blit.wgsl");

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct BlitParams {
    uv_offset: [f32; 2],
    uv_scale: [f32; 2],
}

/// Destination of a blit.
pub(super) struct BlitTarget<'a> {
    pub view: &'a wgpu::TextureView,
    pub format: wgpu::TextureFormat,
    pub samples: u32,
    pub width: u32,
    pub height: u32,
}

pub(super) struct Blitter {
    module: wgpu::ShaderModule,
    linear: wgpu::Sampler,
    nearest: wgpu::Sampler,
    pipelines: HashMap<(wgpu::TextureFormat, u32), wgpu::RenderPipeline>,
}

impl Blitter {
    pub fn new(ctx: &WgpuContext) -> Self {
        let module = ctx
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("blit shader"),
                source: wgpu::ShaderSource::Wgsl(BLIT_SHADER.into()),
            });

        let sampler = |filter: wgpu::FilterMode, label: &str| {
            ctx.device.create_sampler(&wgpu::SamplerDescriptor {
                label: Some(label),
                address_mode_u: wgpu::AddressMode::ClampToEdge,
                address_mode_v: wgpu::AddressMode::ClampToEdge,
                address_mode_w: wgpu::AddressMode::ClampToEdge,
                mag_filter: filter,
                min_filter: filter,
                mipmap_filter: wgpu::MipmapFilterMode::Nearest,
                ..Default::default()
            })
        };

        Self {
            module,
            linear: sampler(wgpu::FilterMode::Linear, "blit linear sampler"),
            nearest: sampler(wgpu::FilterMode::Nearest, "blit nearest sampler"),
            pipelines: HashMap::new(),
        }
    }

    fn pipeline(
        &mut self,
        device: &wgpu::Device,
        format: wgpu::TextureFormat,
        samples: u32,
    ) -> wgpu::RenderPipeline {
        let module = &self.module;
        self.pipelines
            .entry((format, samples))
            .or_insert_with(|| {
                device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                    label: Some("blit pipeline"),
                    layout: None,
                    vertex: wgpu::VertexState {
                        module,
                        entry_point: Some("vs_main"),
                        buffers: &[],
                        compilation_options: wgpu::PipelineCompilationOptions::default(),
                    },
                    fragment: Some(wgpu::FragmentState {
                        module,
                        entry_point: Some("fs_main"),
                        targets: &[Some(wgpu::ColorTargetState {
                            format,
                            blend: None,
                            write_mask: wgpu::ColorWrites::ALL,
                        })],
                        compilation_options: wgpu::PipelineCompilationOptions::default(),
                    }),
                    primitive: wgpu::PrimitiveState {
                        topology: wgpu::PrimitiveTopology::TriangleList,
                        strip_index_format: None,
                        front_face: wgpu::FrontFace::Ccw,
                        cull_mode: None,
                        unclipped_depth: false,
                        polygon_mode: wgpu::PolygonMode::Fill,
                        conservative: false,
                    },
                    depth_stencil: None,
                    multisample: wgpu::MultisampleState {
                        count: samples,
                        mask: !0,
                        alpha_to_coverage_enabled: false,
                    },
                    multiview_mask: None,
                    cache: None,
                })
            })
            .clone()
    }

    /// Copy `src_rect` of `source` into `dst_rect` of `dst`.
    #[allow(clippy::too_many_arguments)]
    pub fn blit(
        &mut self,
        ctx: &WgpuContext,
        source: &wgpu::TextureView,
        src_size: (u32, u32),
        src_rect: Rect,
        dst: &BlitTarget<'_>,
        dst_rect: Rect,
        filter: Filter,
    ) {
        let Some((x, y, width, height)) = viewport_in(dst_rect, dst.width, dst.height) else {
            tracing::trace!("blit to an empty rectangle skipped");
            return;
        };

        let (src_w, src_h) = (src_size.0.max(1) as f32, src_size.1.max(1) as f32);
        let params = BlitParams {
            uv_offset: [
                src_rect.x as f32 / src_w,
                1.0 - (src_rect.y + src_rect.height) as f32 / src_h,
            ],
            uv_scale: [src_rect.width as f32 / src_w, src_rect.height as f32 / src_h],
        };
        let params_buffer = ctx
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("blit params"),
                contents: bytemuck::bytes_of(&params),
                usage: wgpu::BufferUsages::UNIFORM,
            });

        let pipeline = self.pipeline(&ctx.device, dst.format, dst.samples);
        let sampler = match filter {
            Filter::Linear => &self.linear,
            Filter::Nearest => &self.nearest,
        };
        let layout = pipeline.get_bind_group_layout(0);
        let bind_group = ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("blit bind group"),
            layout: &layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: params_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(source),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
            ],
        });

        let mut encoder = ctx.create_encoder(Some("blit encoder"));
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("blit pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: dst.view,
                    resolve_target: None,
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
            pass.set_viewport(x, y, width, height, 0.0, 1.0);
            pass.set_pipeline(&pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.draw(0..3, 0..1);
        }
        ctx.submit([encoder.finish()]);
    }
}
