//! Window and render loop on winit
//!
//! The window surface is the device's default framebuffer: each redraw hands
//! the surface texture to the wgpu backend, runs the frame callback and
//! presents.

pub mod frame_io;
pub mod input;

pub use crate::config::WindowSettings;
pub use frame_io::{FrameInput, FrameOutput};
pub use input::{InputState, Key, MouseButton};

use crate::context::WgpuContext;
use crate::gpu::{GpuDevice, Rect, WgpuGpu};
use glam::Vec2;
use std::sync::Arc;
use std::time::Instant;
use winit::application::ApplicationHandler;
use winit::event::{ElementState, MouseScrollDelta, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::WindowId;

/// A window with a GPU device drawing into it.
pub struct Window {
    settings: WindowSettings,
}

impl Window {
    pub fn new(settings: WindowSettings) -> anyhow::Result<Self> {
        Ok(Self { settings })
    }

    /// Run until the window closes or the callback asks to exit.
    ///
    /// `state` is handed to every call of `callback`. The device is created
    /// once the window exists, so state holding GPU resources is usually
    /// built lazily inside the first frame.
    pub fn render_loop<S, F>(self, state: S, callback: F) -> anyhow::Result<()>
    where
        F: FnMut(&mut S, FrameInput<'_>) -> FrameOutput + 'static,
        S: 'static,
    {
        let event_loop = EventLoop::new()?;
        event_loop.set_control_flow(ControlFlow::Poll);

        let mut app = App {
            settings: self.settings,
            state,
            callback,
            graphics: None,
            input: InputState::new(),
            start_time: Instant::now(),
            last_frame_time: Instant::now(),
            error: None,
        };

        event_loop.run_app(&mut app)?;
        match app.error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

struct Graphics {
    window: Arc<winit::window::Window>,
    surface: wgpu::Surface<'static>,
    config: wgpu::SurfaceConfiguration,
    ctx: WgpuContext,
    device: GpuDevice,
}

impl Graphics {
    fn new(settings: &WindowSettings, event_loop: &ActiveEventLoop) -> anyhow::Result<Self> {
        let attributes = winit::window::WindowAttributes::default()
            .with_title(&settings.title)
            .with_inner_size(winit::dpi::LogicalSize::new(settings.size.0, settings.size.1))
            .with_resizable(settings.resizable);
        let window = Arc::new(event_loop.create_window(attributes)?);

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let surface = instance.create_surface(window.clone())?;
        let adapter = pollster::block_on(WgpuContext::request_adapter(&instance, Some(&surface)))?;
        let ctx = pollster::block_on(WgpuContext::from_adapter(&adapter))?;

        let adapter_caps = surface.get_capabilities(&adapter);
        let format = adapter_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .or_else(|| adapter_caps.formats.first())
            .copied()
            .ok_or_else(|| anyhow::anyhow!("surface supports no texture format"))?;
        let alpha_mode = adapter_caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let size = window.inner_size();
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: if settings.vsync {
                wgpu::PresentMode::AutoVsync
            } else {
                wgpu::PresentMode::AutoNoVsync
            },
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&ctx.device, &config);
        tracing::info!(
            "window {}x{} surface format {:?}",
            config.width,
            config.height,
            format
        );

        let device = GpuDevice::new(WgpuGpu::new(ctx.clone()));
        Ok(Self {
            window,
            surface,
            config,
            ctx,
            device,
        })
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.config.width = width;
        self.config.height = height;
        self.surface.configure(&self.ctx.device, &self.config);
    }

    fn viewport(&self) -> Rect {
        Rect::from_size(self.config.width, self.config.height)
    }
}

struct App<S, F> {
    settings: WindowSettings,
    state: S,
    callback: F,
    graphics: Option<Graphics>,
    input: InputState,
    start_time: Instant,
    last_frame_time: Instant,
    error: Option<anyhow::Error>,
}

impl<S, F> App<S, F>
where
    F: FnMut(&mut S, FrameInput<'_>) -> FrameOutput,
{
    /// Returns true when the loop should exit.
    fn redraw(&mut self) -> bool {
        let Some(graphics) = &mut self.graphics else {
            return false;
        };

        let now = Instant::now();
        let elapsed_time = (now - self.start_time).as_secs_f64();
        let delta_time = (now - self.last_frame_time).as_secs_f64();
        self.last_frame_time = now;

        let surface_texture = match graphics.surface.get_current_texture() {
            Ok(texture) => texture,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                graphics.surface.configure(&graphics.ctx.device, &graphics.config);
                return false;
            }
            Err(e) => {
                tracing::error!("Surface error: {:?}", e);
                return false;
            }
        };
        let view = surface_texture
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let viewport = graphics.viewport();
        let format = graphics.config.format;
        graphics.device.with_backend::<WgpuGpu, _>(|gpu| {
            gpu.set_screen(view, viewport.width, viewport.height, format)
        });
        graphics.device.set_viewport(viewport);

        let output = (self.callback)(
            &mut self.state,
            FrameInput {
                device: &graphics.device,
                viewport,
                elapsed_time,
                delta_time,
                input: &self.input,
            },
        );

        graphics
            .device
            .with_backend::<WgpuGpu, _>(WgpuGpu::release_screen);
        surface_texture.present();
        self.input.end_frame();
        output.exit
    }
}

impl<S, F> ApplicationHandler for App<S, F>
where
    F: FnMut(&mut S, FrameInput<'_>) -> FrameOutput + 'static,
    S: 'static,
{
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.graphics.is_some() {
            return;
        }
        match Graphics::new(&self.settings, event_loop) {
            Ok(graphics) => {
                self.graphics = Some(graphics);
                self.start_time = Instant::now();
                self.last_frame_time = Instant::now();
            }
            Err(e) => {
                tracing::error!("failed to open window: {:#}", e);
                self.error = Some(e);
                event_loop.exit();
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        let Some(graphics) = &mut self.graphics else {
            return;
        };

        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => {
                if size.width > 0 && size.height > 0 {
                    graphics.resize(size.width, size.height);
                    self.input.resize(size.width, size.height);
                }
            }
            WindowEvent::Focused(false) => self.input.release_all(),
            WindowEvent::CursorMoved { position, .. } => {
                self.input
                    .move_cursor(Vec2::new(position.x as f32, position.y as f32));
            }
            WindowEvent::CursorLeft { .. } => self.input.cursor_left(),
            WindowEvent::MouseInput { state, button, .. } => {
                if let Some(button) = MouseButton::from_winit(button) {
                    match state {
                        ElementState::Pressed => self.input.press_button(button),
                        ElementState::Released => self.input.release_button(button),
                    }
                }
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let lines = match delta {
                    MouseScrollDelta::LineDelta(_, y) => y,
                    MouseScrollDelta::PixelDelta(pos) => pos.y as f32 / 20.0,
                };
                self.input.scroll_by(lines);
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if let Some(key) = Key::from_winit(event.physical_key) {
                    match event.state {
                        ElementState::Pressed => self.input.press_key(key),
                        ElementState::Released => self.input.release_key(key),
                    }
                }
            }
            WindowEvent::RedrawRequested => {
                if self.redraw() {
                    event_loop.exit();
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(graphics) = &self.graphics {
            graphics.window.request_redraw();
        }
    }
}
