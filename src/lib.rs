//! lumen 3D engine
//!
//! A small real-time renderer: interchangeable anti-aliasing render targets,
//! textured models with bounding volumes, Blinn-Phong lighting with a shadowed
//! sun, and procedural meshes.
//!
//! # Architecture
//!
//! The library is organized into layers:
//!
//! 1. **gpu** - The [`Gpu`](gpu::Gpu) command set, its wgpu backend and a
//!    resource-tracking backend for tests
//! 2. **shader** / **uniform_block** - Programs, loose uniforms and shared uniform blocks
//! 3. **target** - Off-screen render targets (none, SSAA, MSAA, FXAA2)
//! 4. **model** - Assets, GPU upload and bounding volumes
//! 5. **procedural** - Cube, plane and sphere meshes
//! 6. **renderer** - Cameras, lights, shadow maps and the frame passes
//! 7. **window** - winit window and render loop (feature = "window")

pub mod config;
pub mod context;
pub mod gpu;
pub mod logging;
pub mod model;
pub mod object;
pub mod procedural;
pub mod renderer;
pub mod shader;
pub mod target;
pub mod uniform_block;

#[cfg(feature = "window")]
pub mod window;

pub use config::{EngineConfig, WindowSettings};
pub use context::WgpuContext;
pub use gpu::{BackendKind, GpuDevice, GpuError, TrackingGpu, WgpuGpu};
pub use logging::{init_logging, LoggingConfig};

pub use model::{Aabb, Asset3D, AssetError, AssetLoader, BoundingVolumes, Material, Model3D, OrientedBox};
#[cfg(feature = "obj")]
pub use model::ObjLoader;
pub use object::{Lifecycle, Object3D, ObjectError};
pub use procedural::{Cube, Plane, Sphere};

pub use renderer::{
    Camera, DirectLight, FlyMotion, FrameShaders, PointLight, Projection, Renderer, RendererError,
    Scene, ShadowMap, ShadowPass, SpotLight, Viewer,
};
pub use shader::{Shader, ShaderError};
pub use target::{
    AntiAliasing, BlitRegion, FilterTarget, Fxaa2Target, MsaaTarget, NoAaTarget, RenderTarget,
    SsaaTarget, TargetError,
};
pub use uniform_block::{UniformBlock, UniformBlockError};

#[cfg(feature = "window")]
pub use window::{FrameInput, FrameOutput, InputState, Key, MouseButton, Window};

// Re-export glam for convenience
pub use glam;
