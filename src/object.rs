//! Scene objects
//!
//! An [`Object3D`] is anything the [`Renderer`](crate::renderer::Renderer) can
//! own and draw each frame. Objects move through a fixed lifecycle:
//!
//! ```text
//! Uninitialized --init--> Ready --destroy--> Destroyed
//! ```
//!
//! Calls made out of that order fail with [`ObjectError::InvalidState`].

use crate::gpu::{GpuDevice, GpuError};
use crate::model::AssetError;
use crate::shader::ShaderError;
use glam::Mat4;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Lifecycle {
    #[default]
    Uninitialized,
    Ready,
    Destroyed,
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Lifecycle::Uninitialized => "uninitialized",
            Lifecycle::Ready => "ready",
            Lifecycle::Destroyed => "destroyed",
        };
        f.write_str(name)
    }
}

impl Lifecycle {
    /// Check that the object is in `expected` before running `operation`.
    pub fn require(self, expected: Lifecycle, operation: &'static str) -> Result<(), ObjectError> {
        if self == expected {
            return Ok(());
        }
        tracing::error!("{} on an object that is {}", operation, self);
        Err(ObjectError::InvalidState {
            operation,
            state: self,
        })
    }
}

#[derive(Debug, Error)]
pub enum ObjectError {
    #[error("{operation} is not allowed while the object is {state}")]
    InvalidState {
        operation: &'static str,
        state: Lifecycle,
    },

    #[error(transparent)]
    Asset(#[from] AssetError),

    #[error(transparent)]
    Shader(#[from] ShaderError),

    #[error(transparent)]
    Gpu(#[from] GpuError),
}

/// Something the renderer owns and draws.
pub trait Object3D {
    /// Allocate the GPU resources. Only valid once, on a fresh object.
    fn init(&mut self, device: &GpuDevice) -> Result<(), ObjectError>;

    /// Draw into the bound framebuffer.
    fn render(&self, projection: &Mat4, view: &Mat4) -> Result<(), ObjectError>;

    /// Release the GPU resources. The object cannot be used afterwards.
    fn destroy(&mut self) -> Result<(), ObjectError>;

    fn lifecycle(&self) -> Lifecycle;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_matching_state() {
        assert!(Lifecycle::Ready.require(Lifecycle::Ready, "render").is_ok());
    }

    #[test]
    fn test_require_rejects_other_state() {
        let err = Lifecycle::Destroyed
            .require(Lifecycle::Ready, "render")
            .unwrap_err();
        assert!(matches!(
            err,
            ObjectError::InvalidState {
                operation: "render",
                state: Lifecycle::Destroyed
            }
        ));
        assert_eq!(
            err.to_string(),
            "render is not allowed while the object is destroyed"
        );
    }
}
