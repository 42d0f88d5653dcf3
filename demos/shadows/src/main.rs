//! Shadows - A model lit by a shadow-casting sun over a floor plane
//!
//! Usage: cargo run -- [model.obj] [--aa none|ssaa:2|msaa:4|fxaa2] [--shadow-map 2048]
//!
//! Without a model a sphere is shown.
//!
//! Controls:
//! - WASD: Move
//! - Mouse: Look around
//! - B: Toggle bounding boxes
//! - Escape: Quit

use glam::{Quat, Vec3};
use lumen::shader::names;
use lumen::{
    init_logging, Camera, DirectLight, EngineConfig, FlyMotion, FrameInput, FrameOutput,
    FrameShaders, GpuDevice, Key, LoggingConfig, Model3D, ObjLoader, Plane, RenderTarget,
    Renderer, Scene, Shader, Sphere, Window,
};
use std::f32::consts::PI;
use std::path::PathBuf;

const MOUSE_SENSITIVITY: f32 = 10.0;
/// World units per millisecond.
const KEYBOARD_SENSITIVITY: f32 = 0.1;
const AMBIENT_K: f32 = 0.2;

struct Demo {
    renderer: Renderer,
    target: Box<dyn RenderTarget>,
    model: Model3D,
    floor: Model3D,
    lighting: Shader,
    shadow: Shader,
    sun: DirectLight,
    camera: Camera,
    motion: FlyMotion,
    bounding_boxes: bool,
    b_was_down: bool,
}

impl Demo {
    fn new(
        device: &GpuDevice,
        config: &EngineConfig,
        model_path: Option<&PathBuf>,
        width: u32,
        height: u32,
    ) -> anyhow::Result<Self> {
        let mut renderer = Renderer::new(device);
        renderer.resize(width, height);
        let mut target = config.anti_aliasing.build(device, width, height)?;
        target.set_clear_color(config.clear_color);

        let mut model = match model_path {
            Some(path) => renderer.load_model_obj(&ObjLoader::normalized(), path)?,
            None => renderer.prepare_model(Sphere::new(32, 32).into())?,
        };
        model.set_scale_factor(100.0);
        model.set_rotation(Quat::from_rotation_y(45f32.to_radians()));
        model.set_position(Vec3::new(100.0, 0.0, 0.0));

        let mut floor = renderer.prepare_model(Plane::new(1, 1).into())?;
        floor.set_scale_factor(500.0);
        floor.set_position(Vec3::new(0.0, -70.0, 0.0));

        let mut lighting = Shader::new(device);
        lighting.use_program(names::BLINN_PHONG)?;
        let mut shadow = Shader::new(device);
        shadow.use_program(names::SHADOW_MAP)?;

        let mut sun = DirectLight::new(
            Vec3::splat(1.4),
            Vec3::splat(1.4),
            Vec3::new(1.4, 1.4, 0.0),
            Vec3::new(245.0, 300.0, 170.0),
        );
        sun.set_projection(width as f32 / 4.0, height as f32 / 4.0, 0.1, 1000.0);
        sun.init_shadow_map(device, config.shadow_map_size, config.shadow_map_size)?;

        let camera = Camera::perspective(width, height, 45.0, 0.1, 1000.0);
        let mut motion = FlyMotion::new();
        motion.set_position(Vec3::new(150.0, 100.0, 150.0));
        motion.rotate_yaw(-45f32.to_radians());

        Ok(Self {
            renderer,
            target,
            model,
            floor,
            lighting,
            shadow,
            sun,
            camera,
            motion,
            bounding_boxes: true,
            b_was_down: false,
        })
    }

    fn resize(&mut self, config: &EngineConfig, width: u32, height: u32) -> anyhow::Result<()> {
        let mut target = config
            .anti_aliasing
            .build(self.renderer.device(), width, height)?;
        target.set_clear_color(config.clear_color);
        self.target = target;
        self.renderer.resize(width, height);
        self.camera.set_viewport(width, height);
        self.sun
            .set_projection(width as f32 / 4.0, height as f32 / 4.0, 0.1, 1000.0);
        Ok(())
    }

    fn tick(&mut self, frame: &FrameInput<'_>) {
        let input = frame.input;
        let step = KEYBOARD_SENSITIVITY * (frame.delta_time * 1000.0) as f32;
        if input.is_key_down(Key::W) {
            self.motion.forward(step);
        }
        if input.is_key_down(Key::S) {
            self.motion.forward(-step);
        }
        if input.is_key_down(Key::A) {
            self.motion.right(-step);
        }
        if input.is_key_down(Key::D) {
            self.motion.right(step);
        }

        let b_down = input.is_key_down(Key::B);
        if b_down && !self.b_was_down {
            self.bounding_boxes = !self.bounding_boxes;
        }
        self.b_was_down = b_down;

        let delta = input.cursor_delta();
        let (width, height) = (frame.width().max(1) as f32, frame.height().max(1) as f32);
        if delta.x != 0.0 {
            self.motion
                .rotate_yaw(-MOUSE_SENSITIVITY * PI * delta.x / width);
        }
        if delta.y != 0.0 {
            self.motion
                .rotate_pitch(-MOUSE_SENSITIVITY * PI * delta.y / height);
        }
    }

    fn render(&mut self) -> anyhow::Result<()> {
        self.motion.apply_to(&mut self.camera);
        self.sun.look_at(self.model.position());

        let models = [&self.model, &self.floor];
        let scene = Scene {
            models: &models,
            point_lights: &[],
            spot_lights: &[],
        };
        let shaders = FrameShaders {
            lighting: &self.lighting,
            shadow: &self.shadow,
        };
        self.renderer.render_shadowed_frame(
            &scene,
            &self.camera,
            &self.sun,
            &shaders,
            AMBIENT_K,
            self.target.as_ref(),
            self.bounding_boxes,
        )?;
        Ok(())
    }
}

fn main() -> anyhow::Result<()> {
    init_logging(LoggingConfig::default());

    let mut args: Vec<String> = std::env::args().skip(1).collect();
    let model_path = match args.first() {
        Some(first) if !first.starts_with("--") => Some(PathBuf::from(args.remove(0))),
        _ => None,
    };
    let config = EngineConfig::new()
        .with_args(&args)
        .map_err(anyhow::Error::msg)?;
    let window = Window::new(config.window.clone().title("Shadows").size(800, 600))?;

    window.render_loop(None::<Demo>, move |state, frame| {
        if frame.input.is_key_down(Key::Escape) {
            return FrameOutput::exit();
        }

        if state.is_none() {
            let demo = Demo::new(
                frame.device,
                &config,
                model_path.as_ref(),
                frame.width(),
                frame.height(),
            );
            match demo {
                Ok(demo) => *state = Some(demo),
                Err(e) => {
                    tracing::error!("failed to set up the demo: {:#}", e);
                    return FrameOutput::exit();
                }
            }
        }
        let Some(demo) = state.as_mut() else {
            return FrameOutput::exit();
        };

        if let Some((width, height)) = frame.input.resized() {
            if let Err(e) = demo.resize(&config, width, height) {
                tracing::error!("failed to resize: {:#}", e);
                return FrameOutput::exit();
            }
        }

        demo.tick(&frame);
        if let Err(e) = demo.render() {
            tracing::error!("frame failed: {:#}", e);
            return FrameOutput::exit();
        }
        FrameOutput::default()
    })
}
