//! FXAA 2 post-process target

use super::{FilterContext, FilterParams, FilterTarget, TargetError};
use crate::gpu::RenderState;
use crate::shader::{names, Shader};
use glam::Vec2;

/// Fast approximate anti-aliasing over the base target's color.
#[derive(Debug, Clone, Copy, Default)]
pub struct Fxaa2;

pub type Fxaa2Target = FilterTarget<Fxaa2>;

impl FilterParams for Fxaa2 {
    fn custom_init(&mut self, shader: &mut Shader) -> Result<(), TargetError> {
        shader.use_program(names::FXAA)?;
        Ok(())
    }

    fn set_custom_params(&self, ctx: &FilterContext<'_>) -> Result<(), TargetError> {
        let rpc_frame = Vec2::new(1.0 / ctx.width as f32, 1.0 / ctx.height as f32);
        ctx.shader.set_uniform_vec2("rpc_frame", rpc_frame)?;
        ctx.device.set_render_state(RenderState {
            blend: false,
            depth_test: false,
            ..ctx.device.render_state()
        });
        Ok(())
    }

    fn unset_custom_params(&self, ctx: &FilterContext<'_>) -> Result<(), TargetError> {
        ctx.device.set_render_state(RenderState {
            depth_test: true,
            ..ctx.device.render_state()
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::{Attachment, GpuDevice, GpuEvent, UniformValue};
    use crate::target::{BlitRegion, RenderTarget};

    #[test]
    fn test_fxaa_sets_reciprocal_frame() {
        let (device, gpu) = GpuDevice::tracking();
        let target = Fxaa2Target::init(&device, 200, 100).unwrap();
        target.blit(&BlitRegion::screen(200, 100)).unwrap();
        let program = target.shader().program().unwrap();
        assert_eq!(
            gpu.uniform_value(program, "rpc_frame"),
            Some(UniformValue::Vec2(Vec2::new(0.005, 0.01)))
        );
    }

    #[test]
    fn test_fxaa_draws_without_depth_and_restores_it() {
        let (device, gpu) = GpuDevice::tracking();
        device.set_render_state(RenderState {
            blend: true,
            ..RenderState::default()
        });
        let target = Fxaa2Target::init(&device, 64, 64).unwrap();
        gpu.fill(Attachment::Texture(target.base().color()), [0.0, 0.0, 1.0, 1.0]);
        target.blit(&BlitRegion::screen(64, 64)).unwrap();

        let state = gpu
            .events()
            .into_iter()
            .find_map(|e| match e {
                GpuEvent::Draw { state, .. } => Some(state),
                _ => None,
            })
            .unwrap();
        assert!(!state.depth_test);
        assert!(!state.blend);

        let after = device.render_state();
        assert!(after.depth_test);
        assert!(!after.blend);
        assert_eq!(gpu.screen_color(), [0.0, 0.0, 1.0, 1.0]);
    }
}
