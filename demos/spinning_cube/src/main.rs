//! Spinning Cube - One textured cube through a selectable anti-aliasing target
//!
//! Usage: cargo run -- [--aa none|ssaa:2|msaa:4|fxaa2]
//!
//! Escape quits.

use glam::{Mat4, Vec3};
use lumen::{
    init_logging, AntiAliasing, BlitRegion, Cube, EngineConfig, FrameOutput, GpuDevice, Key,
    LoggingConfig, Model3D, RenderTarget, Renderer, Window,
};

struct Scene {
    renderer: Renderer,
    target: Box<dyn RenderTarget>,
}

impl Scene {
    fn new(device: &GpuDevice, aa: AntiAliasing, width: u32, height: u32) -> anyhow::Result<Self> {
        let mut renderer = Renderer::new(device);
        renderer.set_clear_color([0.1, 0.1, 0.12, 1.0]);
        renderer.resize(width, height);
        renderer.add_object(Box::new(Model3D::new(Cube::new().into())))?;
        let target = aa.build(device, width, height)?;
        Ok(Self { renderer, target })
    }

    fn resize(&mut self, aa: AntiAliasing, width: u32, height: u32) -> anyhow::Result<()> {
        self.target = aa.build(self.renderer.device(), width, height)?;
        self.renderer.resize(width, height);
        Ok(())
    }

    fn draw(&self, elapsed: f32) -> anyhow::Result<()> {
        let (width, height) = self.renderer.size();
        let projection = Mat4::perspective_rh(
            45f32.to_radians(),
            width.max(1) as f32 / height.max(1) as f32,
            0.1,
            100.0,
        );
        let view = Mat4::look_at_rh(Vec3::new(0.0, 2.0, 5.0), Vec3::ZERO, Vec3::Y)
            * Mat4::from_rotation_y(elapsed)
            * Mat4::from_rotation_x(elapsed * 0.5);

        self.target.bind()?;
        let drawn = self.renderer.render(&projection, &view);
        self.target.unbind()?;
        drawn?;
        self.target.blit(&BlitRegion::screen(width, height))?;
        Ok(())
    }
}

fn main() -> anyhow::Result<()> {
    init_logging(LoggingConfig::default());

    let config = EngineConfig::new()
        .with_args(std::env::args().skip(1))
        .map_err(anyhow::Error::msg)?;
    tracing::info!("anti-aliasing: {}", config.anti_aliasing);
    let aa = config.anti_aliasing;

    let window = Window::new(config.window.title("Spinning Cube").size(800, 600))?;

    window.render_loop(None::<Scene>, move |state, frame| {
        if frame.input.is_key_down(Key::Escape) {
            return FrameOutput::exit();
        }

        if state.is_none() {
            match Scene::new(frame.device, aa, frame.width(), frame.height()) {
                Ok(scene) => *state = Some(scene),
                Err(e) => {
                    tracing::error!("failed to set up the scene: {:#}", e);
                    return FrameOutput::exit();
                }
            }
        }
        let Some(scene) = state.as_mut() else {
            return FrameOutput::exit();
        };

        if let Some((width, height)) = frame.input.resized() {
            if let Err(e) = scene.resize(aa, width, height) {
                tracing::error!("failed to resize: {:#}", e);
                return FrameOutput::exit();
            }
        }

        if let Err(e) = scene.draw(frame.elapsed_time as f32) {
            tracing::error!("frame failed: {:#}", e);
            return FrameOutput::exit();
        }
        FrameOutput::default()
    })
}
