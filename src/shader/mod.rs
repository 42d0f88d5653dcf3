//! Shader programs by logical name
//!
//! A [`ShaderLibrary`] maps logical names such as `"anti-aliasing/fxaa"` to
//! WGSL sources. A [`Shader`] compiles one of them on demand and sets its
//! loose uniforms by name.

use crate::gpu::{GpuDevice, GpuError, Owned, ProgramId, ProgramInfo, UniformValue};
use glam::{Mat4, Vec2, Vec3, Vec4};
use std::collections::HashMap;
use std::rc::Rc;
use thiserror::Error;

/// Names of the shaders every device knows about.
pub mod names {
    pub const BASIC: &str = "basic";
    pub const BLINN_PHONG: &str = "blinn-phong";
    pub const SHADOW_MAP: &str = "shadow-map";
    pub const BOUNDING_BOX: &str = "bounding-box";
    pub const FXAA: &str = "anti-aliasing/fxaa";
}

const BUILTINS: [(&str, &str); 5] = [
    (names::BASIC, include_str!("../shaders/basic.wgsl")),
    (names::BLINN_PHONG, include_str!("../shaders/blinn-phong.wgsl")),
    (names::SHADOW_MAP, include_str!("../shaders/shadow-map.wgsl")),
    (names::BOUNDING_BOX, include_str!("../shaders/bounding-box.wgsl")),
    (names::FXAA, include_str!("../shaders/anti-aliasing/fxaa.wgsl")),
];

#[derive(Debug, Error)]
pub enum ShaderError {
    #[error("no shader named '{0}'")]
    NotFound(String),

    #[error("shader '{name}' failed to compile: {message}")]
    Compile { name: String, message: String },

    #[error("no program in use")]
    NoProgram,

    #[error(transparent)]
    Gpu(#[from] GpuError),
}

/// WGSL sources by logical name.
#[derive(Debug, Clone, Default)]
pub struct ShaderLibrary {
    sources: HashMap<String, String>,
}

impl ShaderLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// A library holding the built-in shaders.
    pub fn with_builtins() -> Self {
        let mut library = Self::new();
        for (name, source) in BUILTINS {
            library.register(name, source);
        }
        library
    }

    pub fn register(&mut self, name: impl Into<String>, source: impl Into<String>) {
        self.sources.insert(name.into(), source.into());
    }

    pub fn source(&self, name: &str) -> Option<&str> {
        self.sources.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.sources.contains_key(name)
    }
}

/// A compiled program selected by logical name.
pub struct Shader {
    device: GpuDevice,
    name: Option<String>,
    program: Option<Owned<ProgramId>>,
}

impl Shader {
    pub fn new(device: &GpuDevice) -> Self {
        Self {
            device: device.clone(),
            name: None,
            program: None,
        }
    }

    /// Compile and select the shader `name`.
    ///
    /// Selecting the shader already in use does nothing. On failure the
    /// previous program stays selected.
    pub fn use_program(&mut self, name: &str) -> Result<(), ShaderError> {
        if self.name.as_deref() == Some(name) && self.program.is_some() {
            return Ok(());
        }

        let source = self
            .device
            .shaders()
            .source(name)
            .map(str::to_owned)
            .ok_or_else(|| ShaderError::NotFound(name.to_string()))
            .inspect_err(|e| tracing::error!("{}", e))?;

        let program = self
            .device
            .create_program(name, &source)
            .map_err(|e| match e {
                GpuError::ShaderCompile { name, message } => ShaderError::Compile { name, message },
                other => ShaderError::Gpu(other),
            })
            .inspect_err(|e| tracing::error!("ERROR loading shader {}: {}", name, e))?;

        tracing::debug!("using shader '{}' as {}", name, program.id());
        self.program = Some(program);
        self.name = Some(name.to_string());
        Ok(())
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn program(&self) -> Option<ProgramId> {
        self.program.as_ref().map(Owned::id)
    }

    /// The selected program, or [`ShaderError::NoProgram`].
    pub fn require_program(&self) -> Result<ProgramId, ShaderError> {
        self.program().ok_or(ShaderError::NoProgram)
    }

    pub fn info(&self) -> Result<Rc<ProgramInfo>, ShaderError> {
        Ok(self.device.program_info(self.require_program()?)?)
    }

    pub fn device(&self) -> &GpuDevice {
        &self.device
    }

    pub fn set_uniform(&self, name: &str, value: impl Into<UniformValue>) -> Result<(), ShaderError> {
        let program = self.require_program()?;
        self.device.set_uniform(program, name, value.into())?;
        Ok(())
    }

    pub fn set_uniform_float(&self, name: &str, value: f32) -> Result<(), ShaderError> {
        self.set_uniform(name, value)
    }

    pub fn set_uniform_int(&self, name: &str, value: i32) -> Result<(), ShaderError> {
        self.set_uniform(name, value)
    }

    pub fn set_uniform_vec2(&self, name: &str, value: Vec2) -> Result<(), ShaderError> {
        self.set_uniform(name, value)
    }

    pub fn set_uniform_vec3(&self, name: &str, value: Vec3) -> Result<(), ShaderError> {
        self.set_uniform(name, value)
    }

    pub fn set_uniform_vec4(&self, name: &str, value: Vec4) -> Result<(), ShaderError> {
        self.set_uniform(name, value)
    }

    pub fn set_uniform_mat4(&self, name: &str, value: Mat4) -> Result<(), ShaderError> {
        self.set_uniform(name, value)
    }
}

impl std::fmt::Debug for Shader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shader")
            .field("name", &self.name)
            .field("program", &self.program())
            .finish()
    }
}
