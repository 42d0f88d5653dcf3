//! Lights and shadow maps

use crate::gpu::{GpuDevice, TextureId};
use crate::target::{NoAaTarget, RenderTarget, TargetError};
use glam::{Mat4, Vec3};
use std::cell::Cell;

/// Progress of a shadow map through one frame.
///
/// `Idle --clear--> Cleared --render_to_shadow_map--> Rendered`. The lit pass
/// only reads a `Rendered` map; finishing the frame returns it to `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShadowPass {
    #[default]
    Idle,
    Cleared,
    Rendered,
}

/// Depth render target seen from a light.
pub struct ShadowMap {
    target: NoAaTarget,
    pass: Cell<ShadowPass>,
}

impl ShadowMap {
    pub fn init(device: &GpuDevice, width: u32, height: u32) -> Result<Self, TargetError> {
        let mut target = NoAaTarget::init(device, width, height)?;
        target.set_clear_color([1.0, 1.0, 1.0, 1.0]);
        Ok(Self {
            target,
            pass: Cell::new(ShadowPass::Idle),
        })
    }

    pub fn target(&self) -> &NoAaTarget {
        &self.target
    }

    /// Depth texture sampled by the lit pass.
    pub fn depth_texture(&self) -> TextureId {
        self.target.depth()
    }

    pub fn pass(&self) -> ShadowPass {
        self.pass.get()
    }

    /// Start a frame: clear depth and accept shadow casters.
    pub fn clear(&self) -> Result<(), TargetError> {
        self.target.clear()?;
        self.pass.set(ShadowPass::Cleared);
        Ok(())
    }

    pub(crate) fn mark_rendered(&self) {
        self.pass.set(ShadowPass::Rendered);
    }

    /// Done reading this frame's map.
    pub fn end_frame(&self) {
        self.pass.set(ShadowPass::Idle);
    }
}

/// Directional light with an optional shadow map.
pub struct DirectLight {
    pub ambient: Vec3,
    pub diffuse: Vec3,
    pub specular: Vec3,
    position: Vec3,
    target: Vec3,
    projection: Mat4,
    shadow_map: Option<ShadowMap>,
}

impl DirectLight {
    pub fn new(ambient: Vec3, diffuse: Vec3, specular: Vec3, position: Vec3) -> Self {
        Self {
            ambient,
            diffuse,
            specular,
            position,
            target: Vec3::ZERO,
            projection: Mat4::orthographic_rh(-100.0, 100.0, -100.0, 100.0, 0.1, 1000.0),
            shadow_map: None,
        }
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
    }

    pub fn look_at(&mut self, target: Vec3) {
        self.target = target;
    }

    /// Direction the light travels in.
    pub fn direction(&self) -> Vec3 {
        (self.target - self.position).normalize_or(Vec3::NEG_Y)
    }

    /// Orthographic light frustum of `width` x `height` world units.
    pub fn set_projection(&mut self, width: f32, height: f32, near: f32, far: f32) {
        self.projection = Mat4::orthographic_rh(
            -width * 0.5,
            width * 0.5,
            -height * 0.5,
            height * 0.5,
            near,
            far,
        );
    }

    pub fn projection(&self) -> Mat4 {
        self.projection
    }

    pub fn view(&self) -> Mat4 {
        let direction = self.direction();
        let up = if direction.cross(Vec3::Y).length_squared() < 1e-6 {
            Vec3::Z
        } else {
            Vec3::Y
        };
        Mat4::look_at_rh(self.position, self.position + direction, up)
    }

    /// World to light clip space.
    pub fn light_space(&self) -> Mat4 {
        self.projection * self.view()
    }

    /// Allocate the shadow map, replacing any previous one.
    pub fn init_shadow_map(
        &mut self,
        device: &GpuDevice,
        width: u32,
        height: u32,
    ) -> Result<(), TargetError> {
        self.shadow_map = Some(ShadowMap::init(device, width, height)?);
        tracing::debug!("shadow map {}x{}", width, height);
        Ok(())
    }

    pub fn shadow_map(&self) -> Option<&ShadowMap> {
        self.shadow_map.as_ref()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointLight {
    pub position: Vec3,
    pub diffuse: Vec3,
    pub specular: Vec3,
    pub constant: f32,
    pub linear: f32,
    pub quadratic: f32,
}

impl PointLight {
    pub fn new(position: Vec3, diffuse: Vec3, specular: Vec3) -> Self {
        Self {
            position,
            diffuse,
            specular,
            constant: 1.0,
            linear: 0.0,
            quadratic: 0.0,
        }
    }

    pub fn with_attenuation(mut self, constant: f32, linear: f32, quadratic: f32) -> Self {
        self.constant = constant;
        self.linear = linear;
        self.quadratic = quadratic;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpotLight {
    pub position: Vec3,
    pub direction: Vec3,
    /// Half angle of the cone in radians.
    pub cutoff: f32,
    pub diffuse: Vec3,
    pub specular: Vec3,
}

impl SpotLight {
    pub fn new(position: Vec3, direction: Vec3, cutoff: f32, diffuse: Vec3, specular: Vec3) -> Self {
        Self {
            position,
            direction,
            cutoff,
            diffuse,
            specular,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::ResourceKind;

    #[test]
    fn test_light_space_centers_target() {
        let mut sun = DirectLight::new(Vec3::ONE, Vec3::ONE, Vec3::ONE, Vec3::new(245.0, 300.0, 170.0));
        sun.set_projection(256.0, 192.0, 0.1, 1000.0);
        sun.look_at(Vec3::new(100.0, 0.0, 0.0));
        let p = sun.light_space().project_point3(Vec3::new(100.0, 0.0, 0.0));
        assert!(p.x.abs() < 1e-4 && p.y.abs() < 1e-4);
        assert!(p.z > 0.0 && p.z < 1.0);
    }

    #[test]
    fn test_vertical_light_has_valid_view() {
        let mut sun = DirectLight::new(Vec3::ONE, Vec3::ONE, Vec3::ONE, Vec3::new(0.0, 10.0, 0.0));
        sun.look_at(Vec3::ZERO);
        assert!(sun.view().is_finite());
    }

    #[test]
    fn test_shadow_map_pass_states() {
        let (device, gpu) = GpuDevice::tracking();
        let mut sun = DirectLight::new(Vec3::ONE, Vec3::ONE, Vec3::ONE, Vec3::Y);
        assert!(sun.shadow_map().is_none());
        sun.init_shadow_map(&device, 64, 64).unwrap();

        let map = sun.shadow_map().unwrap();
        assert_eq!(map.pass(), ShadowPass::Idle);
        map.clear().unwrap();
        assert_eq!(map.pass(), ShadowPass::Cleared);
        map.mark_rendered();
        map.end_frame();
        assert_eq!(map.pass(), ShadowPass::Idle);

        sun.init_shadow_map(&device, 32, 32).unwrap();
        assert_eq!(gpu.live_count(ResourceKind::Framebuffer), 1);
    }
}
