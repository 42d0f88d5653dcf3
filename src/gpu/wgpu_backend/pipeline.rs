//! Render pipeline cache
//!
//! GL-style draws carry no pipeline object, so the backend derives one from
//! the program, vertex layout, topology, bound attachments and render state,
//! and keeps it for reuse.

use crate::gpu::reflect::{ProgramInfo, FRAGMENT_ENTRY, VERTEX_ENTRY};
use crate::gpu::{Primitive, ProgramId, RenderState, VertexLayout};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(super) struct PipelineKey {
    pub program: ProgramId,
    pub layout: VertexLayout,
    pub primitive: Primitive,
    pub color_formats: Vec<wgpu::TextureFormat>,
    pub depth_format: Option<wgpu::TextureFormat>,
    pub samples: u32,
    pub state: RenderState,
}

#[derive(Default)]
pub(super) struct PipelineCache {
    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,
}

impl PipelineCache {
    pub fn get_or_create(
        &mut self,
        device: &wgpu::Device,
        key: PipelineKey,
        module: &wgpu::ShaderModule,
        info: &ProgramInfo,
    ) -> wgpu::RenderPipeline {
        if let Some(pipeline) = self.pipelines.get(&key) {
            return pipeline.clone();
        }
        tracing::debug!(
            "building pipeline for '{}' ({:?}, {} samples)",
            info.name,
            key.primitive,
            key.samples
        );
        let pipeline = build(device, &key, module, info);
        self.pipelines.insert(key, pipeline.clone());
        pipeline
    }

    pub fn forget_program(&mut self, program: ProgramId) {
        self.pipelines.retain(|key, _| key.program != program);
    }
}

fn vertex_format(components: u32) -> wgpu::VertexFormat {
    match components {
        1 => wgpu::VertexFormat::Float32,
        2 => wgpu::VertexFormat::Float32x2,
        3 => wgpu::VertexFormat::Float32x3,
        _ => wgpu::VertexFormat::Float32x4,
    }
}

fn topology(primitive: Primitive) -> (wgpu::PrimitiveTopology, Option<wgpu::IndexFormat>) {
    match primitive {
        Primitive::Triangles => (wgpu::PrimitiveTopology::TriangleList, None),
        Primitive::TriangleStrip => (
            wgpu::PrimitiveTopology::TriangleStrip,
            Some(wgpu::IndexFormat::Uint32),
        ),
        Primitive::Lines => (wgpu::PrimitiveTopology::LineList, None),
    }
}

fn build(
    device: &wgpu::Device,
    key: &PipelineKey,
    module: &wgpu::ShaderModule,
    info: &ProgramInfo,
) -> wgpu::RenderPipeline {
    let attributes: Vec<wgpu::VertexAttribute> = key
        .layout
        .attributes
        .iter()
        .map(|attribute| wgpu::VertexAttribute {
            offset: attribute.offset as wgpu::BufferAddress,
            shader_location: attribute.location,
            format: vertex_format(attribute.components),
        })
        .collect();

    let buffers = [wgpu::VertexBufferLayout {
        array_stride: key.layout.stride as wgpu::BufferAddress,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &attributes,
    }];

    let blend = key.state.blend.then_some(wgpu::BlendState::ALPHA_BLENDING);
    let targets: Vec<Option<wgpu::ColorTargetState>> = key
        .color_formats
        .iter()
        .enumerate()
        .map(|(location, format)| {
            let write_mask = if info.fragment_outputs.contains(&(location as u32)) {
                wgpu::ColorWrites::ALL
            } else {
                wgpu::ColorWrites::empty()
            };
            Some(wgpu::ColorTargetState {
                format: *format,
                blend,
                write_mask,
            })
        })
        .collect();

    let depth_stencil = key.depth_format.map(|format| wgpu::DepthStencilState {
        format,
        depth_write_enabled: key.state.depth_test && key.state.depth_write,
        depth_compare: if key.state.depth_test {
            wgpu::CompareFunction::Less
        } else {
            wgpu::CompareFunction::Always
        },
        stencil: wgpu::StencilState::default(),
        bias: wgpu::DepthBiasState::default(),
    });

    let (topology, strip_index_format) = topology(key.primitive);

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(&info.name),
        layout: None,
        vertex: wgpu::VertexState {
            module,
            entry_point: Some(VERTEX_ENTRY),
            buffers: &buffers,
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module,
            entry_point: Some(FRAGMENT_ENTRY),
            targets: &targets,
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology,
            strip_index_format,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: key.state.cull_back.then_some(wgpu::Face::Back),
            unclipped_depth: false,
            polygon_mode: wgpu::PolygonMode::Fill,
            conservative: false,
        },
        depth_stencil,
        multisample: wgpu::MultisampleState {
            count: key.samples,
            mask: !0,
            alpha_to_coverage_enabled: false,
        },
        multiview_mask: None,
        cache: None,
    })
}
