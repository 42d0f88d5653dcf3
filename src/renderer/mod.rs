//! Renderer - object list, lit and shadow passes
//!
//! The renderer owns a flat list of [`Object3D`]s drawn by [`Renderer::render`],
//! and drives the multi-pass frame of a shadowed scene:
//!
//! 1. clear the sun's shadow map
//! 2. render every model's depth from the sun
//! 3. clear the main target
//! 4. render every model with Blinn-Phong lighting, sampling the shadow map
//! 5. optionally overlay bounding boxes
//! 6. blit the main target to the screen

mod camera;
mod light;
mod motion;

pub use camera::{Camera, Projection, Viewer};
pub use light::{DirectLight, PointLight, ShadowMap, ShadowPass, SpotLight};
pub use motion::FlyMotion;

use crate::gpu::{
    BufferDesc, BufferId, BufferKind, BufferUsage, DrawCall, DrawRange, GpuDevice, GpuError, Owned,
    Primitive, ProgramId, RenderState, TextureId, VertexArrayDesc, VertexArrayId, VertexAttribute,
    VertexLayout,
};
use crate::model::{AssetError, AssetLoader, Asset3D, Model3D, WhiteTexture, BOX_EDGES};
use crate::object::{Object3D, ObjectError};
use crate::shader::{names, Shader, ShaderError};
use crate::target::{BlitRegion, NoAaTarget, RenderTarget, TargetError};
use crate::uniform_block::{UniformBlock, UniformBlockError};
use glam::{Mat4, Vec3, Vec4};
use std::path::Path;
use std::rc::Rc;
use thiserror::Error;

/// Point and spot lights each, as sized in the lighting shader.
pub const MAX_LIGHTS: usize = 4;

const OBB_COLOR: Vec4 = Vec4::new(0.0, 1.0, 0.0, 1.0);
const AABB_COLOR: Vec4 = Vec4::new(1.0, 0.0, 0.0, 1.0);

const LIGHT_PARAMS: [&str; 14] = [
    "sun_direction",
    "sun_ambient",
    "sun_diffuse",
    "sun_specular",
    "point_position",
    "point_diffuse",
    "point_specular",
    "point_attenuation",
    "spot_position",
    "spot_direction",
    "spot_diffuse",
    "spot_specular",
    "num_point_lights",
    "num_spot_lights",
];

#[derive(Debug, Error)]
pub enum RendererError {
    #[error("shadow map was not rendered this frame")]
    ShadowMapNotReady,

    #[error("shadow map was not cleared this frame")]
    ShadowMapNotCleared,

    #[error(transparent)]
    Object(#[from] ObjectError),

    #[error(transparent)]
    Target(#[from] TargetError),

    #[error(transparent)]
    Shader(#[from] ShaderError),

    #[error(transparent)]
    UniformBlock(#[from] UniformBlockError),

    #[error(transparent)]
    Asset(#[from] AssetError),

    #[error(transparent)]
    Gpu(#[from] GpuError),
}

/// Models and extra lights of a shadowed frame.
#[derive(Clone, Copy, Default)]
pub struct Scene<'a> {
    pub models: &'a [&'a Model3D],
    pub point_lights: &'a [PointLight],
    pub spot_lights: &'a [SpotLight],
}

/// Programs of a shadowed frame: Blinn-Phong and shadow depth.
pub struct FrameShaders<'a> {
    pub lighting: &'a Shader,
    pub shadow: &'a Shader,
}

/// Line overlay of unit cube `[0, 1]^3` edges, placed by a matrix per box.
struct BoundingBoxPass {
    shader: Shader,
    vertex_array: Owned<VertexArrayId>,
    index_buffer: Owned<BufferId>,
    vertex_buffer: Owned<BufferId>,
}

impl BoundingBoxPass {
    fn new(device: &GpuDevice) -> Result<Self, RendererError> {
        let mut shader = Shader::new(device);
        shader.use_program(names::BOUNDING_BOX)?;

        let corners: [[f32; 3]; 8] =
            std::array::from_fn(|i| [(i & 1) as f32, ((i >> 1) & 1) as f32, ((i >> 2) & 1) as f32]);
        let vertex_bytes: &[u8] = bytemuck::cast_slice(&corners);
        let vertex_buffer = device.create_buffer(
            &BufferDesc {
                kind: BufferKind::Vertex,
                usage: BufferUsage::Static,
                size: vertex_bytes.len() as u64,
            },
            Some(vertex_bytes),
        )?;
        let index_bytes: &[u8] = bytemuck::cast_slice(&BOX_EDGES);
        let index_buffer = device.create_buffer(
            &BufferDesc {
                kind: BufferKind::Index,
                usage: BufferUsage::Static,
                size: index_bytes.len() as u64,
            },
            Some(index_bytes),
        )?;
        let vertex_array = device.create_vertex_array(&VertexArrayDesc {
            vertex_buffer: vertex_buffer.id(),
            layout: VertexLayout {
                stride: 12,
                attributes: vec![VertexAttribute {
                    location: 0,
                    components: 3,
                    offset: 0,
                }],
            },
            index_buffer: Some(index_buffer.id()),
        })?;
        Ok(Self {
            shader,
            vertex_array,
            index_buffer,
            vertex_buffer,
        })
    }

    /// Draw one box into the bound framebuffer.
    fn draw(&self, device: &GpuDevice, mvp: Mat4, color: Vec4) -> Result<(), RendererError> {
        self.shader.set_uniform_mat4("mvp", mvp)?;
        self.shader.set_uniform_vec4("color", color)?;
        device.draw(&DrawCall {
            program: self.shader.require_program()?,
            vertex_array: self.vertex_array.id(),
            primitive: Primitive::Lines,
            range: DrawRange::Indexed {
                byte_offset: 0,
                count: BOX_EDGES.len() as u32,
            },
            textures: &[],
        })?;
        Ok(())
    }
}

pub struct Renderer {
    objects: Vec<Box<dyn Object3D>>,
    lights: Option<UniformBlock>,
    boxes: Option<BoundingBoxPass>,
    fallback_shadow: Option<NoAaTarget>,
    white: Option<Rc<WhiteTexture>>,
    device: GpuDevice,
    width: u32,
    height: u32,
    clear_color: [f32; 4],
}

impl Renderer {
    pub fn new(device: &GpuDevice) -> Self {
        device.set_render_state(RenderState::default());
        Self {
            objects: Vec::new(),
            lights: None,
            boxes: None,
            fallback_shadow: None,
            white: None,
            device: device.clone(),
            width: 0,
            height: 0,
            clear_color: [1.0, 1.0, 1.0, 1.0],
        }
    }

    pub fn device(&self) -> &GpuDevice {
        &self.device
    }

    pub fn set_clear_color(&mut self, color: [f32; 4]) {
        self.clear_color = color;
    }

    pub fn clear_color(&self) -> [f32; 4] {
        self.clear_color
    }

    /// Record the viewport size. Nothing is reallocated.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Initialise `object` and take ownership of it. A failed object is not kept.
    pub fn add_object(&mut self, mut object: Box<dyn Object3D>) -> Result<(), RendererError> {
        object
            .init(&self.device)
            .inspect_err(|e| tracing::error!("ERROR initializing object: {}", e))?;
        self.objects.push(object);
        Ok(())
    }

    pub fn objects(&self) -> &[Box<dyn Object3D>] {
        &self.objects
    }

    pub fn objects_mut(&mut self) -> &mut [Box<dyn Object3D>] {
        &mut self.objects
    }

    /// Clear the bound framebuffer and draw every object in insertion order.
    pub fn render(&self, projection: &Mat4, view: &Mat4) -> Result<(), RendererError> {
        self.device.clear(self.clear_color, 1.0)?;
        for object in &self.objects {
            object.render(projection, view)?;
        }
        Ok(())
    }

    /// Upload `asset` as a model owned by the caller.
    pub fn prepare_model(&self, asset: Asset3D) -> Result<Model3D, RendererError> {
        let mut model = Model3D::new(asset);
        model.init(&self.device)?;
        Ok(model)
    }

    pub fn load_model_obj(
        &self,
        loader: &dyn AssetLoader,
        path: impl AsRef<Path>,
    ) -> Result<Model3D, RendererError> {
        let asset = loader
            .load(path.as_ref())
            .inspect_err(|e| tracing::error!("ERROR loading model: {}", e))?;
        self.prepare_model(asset)
    }

    fn white_texture(&mut self) -> Result<Rc<WhiteTexture>, GpuError> {
        if let Some(white) = &self.white {
            return Ok(white.clone());
        }
        let white = WhiteTexture::shared(&self.device)?;
        self.white = Some(white.clone());
        Ok(white)
    }

    /// Depth texture that never shadows, for lit passes without a sun.
    fn fallback_shadow_depth(&mut self) -> Result<TextureId, TargetError> {
        if let Some(target) = &self.fallback_shadow {
            return Ok(target.depth());
        }
        let target = NoAaTarget::init(&self.device, 1, 1)?;
        target.clear()?;
        let depth = target.depth();
        self.fallback_shadow = Some(target);
        Ok(depth)
    }

    fn lights_block(&mut self, program: ProgramId) -> Result<&mut UniformBlock, UniformBlockError> {
        let lights = self.lights.get_or_insert_with(|| {
            let mut block = UniformBlock::new("Lights");
            for name in LIGHT_PARAMS {
                block.add_param_name(name);
            }
            block
        });
        if lights.program() != Some(program) {
            lights.prepare_for_shader(&self.device, program)?;
        }
        Ok(lights)
    }

    fn write_lights(
        &mut self,
        program: ProgramId,
        sun: Option<&DirectLight>,
        point_lights: &[PointLight],
        spot_lights: &[SpotLight],
    ) -> Result<(), UniformBlockError> {
        if point_lights.len() > MAX_LIGHTS || spot_lights.len() > MAX_LIGHTS {
            tracing::warn!(
                "{} point and {} spot lights, only {} of each are used",
                point_lights.len(),
                spot_lights.len(),
                MAX_LIGHTS
            );
        }
        let lights = self.lights_block(program)?;

        match sun {
            Some(sun) => {
                lights.set("sun_direction", sun.direction().extend(1.0))?;
                lights.set("sun_ambient", sun.ambient.extend(1.0))?;
                lights.set("sun_diffuse", sun.diffuse.extend(1.0))?;
                lights.set("sun_specular", sun.specular.extend(1.0))?;
            }
            None => lights.set("sun_direction", Vec4::ZERO)?,
        }

        let points = &point_lights[..point_lights.len().min(MAX_LIGHTS)];
        for (i, light) in points.iter().enumerate() {
            lights.set_element("point_position", i, light.position.extend(1.0))?;
            lights.set_element("point_diffuse", i, light.diffuse.extend(1.0))?;
            lights.set_element("point_specular", i, light.specular.extend(1.0))?;
            lights.set_element(
                "point_attenuation",
                i,
                Vec4::new(light.constant, light.linear, light.quadratic, 0.0),
            )?;
        }
        lights.set("num_point_lights", points.len() as i32)?;

        let spots = &spot_lights[..spot_lights.len().min(MAX_LIGHTS)];
        for (i, light) in spots.iter().enumerate() {
            lights.set_element("spot_position", i, light.position.extend(1.0))?;
            lights.set_element(
                "spot_direction",
                i,
                light.direction.normalize_or_zero().extend(light.cutoff.cos()),
            )?;
            lights.set_element("spot_diffuse", i, light.diffuse.extend(1.0))?;
            lights.set_element("spot_specular", i, light.specular.extend(1.0))?;
        }
        lights.set("num_spot_lights", spots.len() as i32)?;

        lights.bind()
    }

    /// Draw `model` lit by `sun` and the given point and spot lights into `target`.
    ///
    /// With a sun, its shadow map must have been rendered this frame, otherwise
    /// this fails with [`RendererError::ShadowMapNotReady`] before the target is touched.
    #[allow(clippy::too_many_arguments)]
    pub fn render_model_3d(
        &mut self,
        model: &Model3D,
        camera: &dyn Viewer,
        shader: &Shader,
        sun: Option<&DirectLight>,
        point_lights: &[PointLight],
        spot_lights: &[SpotLight],
        ambient_k: f32,
        target: &dyn RenderTarget,
    ) -> Result<(), RendererError> {
        let gpu = model.require_gpu("render_model_3d")?;
        let program = shader.require_program()?;

        let shadow_depth = match sun {
            Some(sun) => {
                let ready = sun
                    .shadow_map()
                    .filter(|map| map.pass() == ShadowPass::Rendered);
                let Some(map) = ready else {
                    tracing::error!("lit pass before the sun's shadow map was rendered");
                    return Err(RendererError::ShadowMapNotReady);
                };
                map.depth_texture()
            }
            None => self.fallback_shadow_depth()?,
        };
        let white = self.white_texture()?;

        self.write_lights(program, sun, point_lights, spot_lights)?;
        shader.set_uniform_mat4("projection", camera.projection())?;
        shader.set_uniform_mat4("view", camera.view())?;
        shader.set_uniform_mat4("model", model.model_matrix())?;
        shader.set_uniform_mat4(
            "light_space",
            sun.map_or(Mat4::IDENTITY, DirectLight::light_space),
        )?;
        shader.set_uniform_vec4("eye_position", camera.position().extend(1.0))?;
        shader.set_uniform_float("ambient_k", ambient_k)?;

        target.bind()?;
        self.device.set_render_state(RenderState::default());
        let drawn = gpu.draw_with(program, white.id(), &[shadow_depth], |material| {
            shader.set_uniform_float("shininess", material.shininess)?;
            Ok(())
        });
        target.unbind()?;
        Ok(drawn?)
    }

    /// Render `model`'s depth from `light` into the light's shadow map.
    pub fn render_to_shadow_map(
        &mut self,
        model: &Model3D,
        light: &DirectLight,
        shader: &Shader,
    ) -> Result<(), RendererError> {
        let gpu = model.require_gpu("render_to_shadow_map")?;
        let program = shader.require_program()?;
        let Some(map) = light.shadow_map() else {
            tracing::error!("light has no shadow map");
            return Err(RendererError::ShadowMapNotReady);
        };
        if map.pass() == ShadowPass::Idle {
            tracing::error!("shadow pass before the shadow map was cleared");
            return Err(RendererError::ShadowMapNotCleared);
        }
        let white = self.white_texture()?;

        shader.set_uniform_mat4("light_space", light.light_space())?;
        shader.set_uniform_mat4("model", model.model_matrix())?;

        map.target().bind()?;
        self.device.set_render_state(RenderState::default());
        let drawn = gpu.draw(program, white.id(), &[]);
        map.target().unbind()?;
        drawn?;
        map.mark_rendered();
        Ok(())
    }

    /// Overlay the oriented box (green) and world-axis box (red) of `model`.
    pub fn render_model_bounding_boxes(
        &mut self,
        model: &Model3D,
        camera: &dyn Viewer,
        target: &dyn RenderTarget,
    ) -> Result<(), RendererError> {
        model.require_gpu("render_model_bounding_boxes")?;
        let boxes = match &self.boxes {
            Some(boxes) => boxes,
            None => self.boxes.insert(BoundingBoxPass::new(&self.device)?),
        };

        let placement = Mat4::from_translation(model.position())
            * Mat4::from_scale(Vec3::splat(model.scale_factor()));
        let view_projection = camera.view_projection() * placement;

        target.bind()?;
        self.device.set_render_state(RenderState::default());
        let drawn = boxes
            .draw(
                &self.device,
                view_projection * model.bounds().oriented().unit_transform(),
                OBB_COLOR,
            )
            .and_then(|_| {
                boxes.draw(
                    &self.device,
                    view_projection * model.bounds().aabb().unit_transform(),
                    AABB_COLOR,
                )
            });
        target.unbind()?;
        drawn
    }

    /// The full shadowed frame, blitted to the screen at the renderer's size
    /// (the target's size before the first [`resize`](Self::resize)).
    pub fn render_shadowed_frame(
        &mut self,
        scene: &Scene<'_>,
        camera: &dyn Viewer,
        sun: &DirectLight,
        shaders: &FrameShaders<'_>,
        ambient_k: f32,
        target: &dyn RenderTarget,
        bounding_boxes: bool,
    ) -> Result<(), RendererError> {
        let Some(map) = sun.shadow_map() else {
            tracing::error!("shadowed frame without a sun shadow map");
            return Err(RendererError::ShadowMapNotReady);
        };

        map.clear()?;
        for model in scene.models {
            self.render_to_shadow_map(model, sun, shaders.shadow)?;
        }

        target.clear()?;
        for model in scene.models {
            self.render_model_3d(
                model,
                camera,
                shaders.lighting,
                Some(sun),
                scene.point_lights,
                scene.spot_lights,
                ambient_k,
                target,
            )?;
        }

        if bounding_boxes {
            for model in scene.models {
                self.render_model_bounding_boxes(model, camera, target)?;
            }
        }

        map.end_frame();
        let (width, height) = if self.width == 0 || self.height == 0 {
            (target.width(), target.height())
        } else {
            (self.width, self.height)
        };
        target.blit(&BlitRegion::screen(width, height))?;
        Ok(())
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        for object in &mut self.objects {
            if object.lifecycle() == crate::object::Lifecycle::Ready {
                if let Err(e) = object.destroy() {
                    tracing::warn!("failed to destroy object: {}", e);
                }
            }
        }
    }
}
