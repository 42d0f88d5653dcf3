//! Frame input/output types

use super::input::InputState;
use crate::gpu::{GpuDevice, Rect};

/// What the render loop hands the frame callback.
pub struct FrameInput<'a> {
    /// Device whose default framebuffer is this frame's surface texture.
    pub device: &'a GpuDevice,
    pub viewport: Rect,
    /// Seconds since the loop started.
    pub elapsed_time: f64,
    /// Seconds since the previous frame.
    pub delta_time: f64,
    pub input: &'a InputState,
}

impl FrameInput<'_> {
    pub fn width(&self) -> u32 {
        self.viewport.width
    }

    pub fn height(&self) -> u32 {
        self.viewport.height
    }

    pub fn aspect(&self) -> f32 {
        self.viewport.width.max(1) as f32 / self.viewport.height.max(1) as f32
    }
}

#[derive(Debug, Clone, Default)]
pub struct FrameOutput {
    /// Leave the loop after this frame.
    pub exit: bool,
}

impl FrameOutput {
    pub fn new() -> Self {
        Self { exit: false }
    }

    pub fn exit() -> Self {
        Self { exit: true }
    }
}
