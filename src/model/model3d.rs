//! Model3D - a placed, drawable model

use super::asset::Asset3D;
use super::bounds::BoundingVolumes;
use super::gpu_model::GpuModel3D;
use super::WhiteTexture;
use crate::gpu::GpuDevice;
use crate::object::{Lifecycle, Object3D, ObjectError};
use crate::shader::{names, Shader};
use glam::{Mat4, Quat, Vec3};
use std::rc::Rc;

/// An asset with a transform, bounding volumes and, once initialised, its GPU copy.
///
/// As a plain [`Object3D`] it draws with the `basic` shader. The renderer's
/// lit and shadow passes draw the same GPU copy with their own programs.
pub struct Model3D {
    gpu: Option<GpuModel3D>,
    shader: Option<Shader>,
    white: Option<Rc<WhiteTexture>>,
    asset: Asset3D,
    bounds: BoundingVolumes,
    position: Vec3,
    scale_factor: f32,
    rotation: Quat,
    lifecycle: Lifecycle,
}

impl Model3D {
    pub fn new(asset: Asset3D) -> Self {
        let bounds = BoundingVolumes::compute(asset.vertices.iter().map(|v| Vec3::from(v.position)));
        Self {
            gpu: None,
            shader: None,
            white: None,
            asset,
            bounds,
            position: Vec3::ZERO,
            scale_factor: 1.0,
            rotation: Quat::IDENTITY,
            lifecycle: Lifecycle::Uninitialized,
        }
    }

    pub fn asset(&self) -> &Asset3D {
        &self.asset
    }

    /// GPU copy, present while the model is ready.
    pub fn gpu(&self) -> Option<&GpuModel3D> {
        self.gpu.as_ref()
    }

    pub(crate) fn require_gpu(&self, operation: &'static str) -> Result<&GpuModel3D, ObjectError> {
        self.lifecycle.require(Lifecycle::Ready, operation)?;
        self.gpu.as_ref().ok_or(ObjectError::InvalidState {
            operation,
            state: self.lifecycle,
        })
    }

    pub fn bounds(&self) -> &BoundingVolumes {
        &self.bounds
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
    }

    pub fn scale_factor(&self) -> f32 {
        self.scale_factor
    }

    pub fn set_scale_factor(&mut self, factor: f32) {
        self.scale_factor = factor;
    }

    pub fn rotation(&self) -> Quat {
        self.rotation
    }

    /// Rotate by `angle` radians around `axis`, on top of the current rotation.
    pub fn rotate(&mut self, angle: f32, axis: Vec3) {
        let Some(axis) = axis.try_normalize() else {
            tracing::warn!("ignoring rotation around a zero axis");
            return;
        };
        self.set_rotation(Quat::from_axis_angle(axis, angle) * self.rotation);
    }

    pub fn set_rotation(&mut self, rotation: Quat) {
        self.rotation = rotation.normalize();
        self.bounds.update(self.rotation);
    }

    /// Translation * rotation * uniform scale.
    pub fn model_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(
            Vec3::splat(self.scale_factor),
            self.rotation,
            self.position,
        )
    }
}

impl Object3D for Model3D {
    fn init(&mut self, device: &GpuDevice) -> Result<(), ObjectError> {
        self.lifecycle.require(Lifecycle::Uninitialized, "init")?;

        let gpu = GpuModel3D::init(device, &self.asset)?;
        let mut shader = Shader::new(device);
        shader.use_program(names::BASIC)?;
        let white = WhiteTexture::shared(device)?;

        self.gpu = Some(gpu);
        self.shader = Some(shader);
        self.white = Some(white);
        self.lifecycle = Lifecycle::Ready;
        Ok(())
    }

    fn render(&self, projection: &Mat4, view: &Mat4) -> Result<(), ObjectError> {
        let gpu = self.require_gpu("render")?;
        let (Some(shader), Some(white)) = (&self.shader, &self.white) else {
            return Err(ObjectError::InvalidState {
                operation: "render",
                state: self.lifecycle,
            });
        };

        shader.set_uniform_mat4("projection", *projection)?;
        shader.set_uniform_mat4("view", *view)?;
        shader.set_uniform_mat4("model", self.model_matrix())?;
        gpu.draw(shader.require_program()?, white.id(), &[])
    }

    fn destroy(&mut self) -> Result<(), ObjectError> {
        self.lifecycle.require(Lifecycle::Ready, "destroy")?;
        if let Some(gpu) = self.gpu.take() {
            gpu.destroy();
        }
        self.shader = None;
        self.white = None;
        self.lifecycle = Lifecycle::Destroyed;
        Ok(())
    }

    fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::{GpuEvent, ResourceKind};
    use crate::procedural::Cube;

    #[test]
    fn test_lifecycle() {
        let (device, gpu) = GpuDevice::tracking();
        let mut model = Model3D::new(Cube::new().into());
        assert!(matches!(
            model.render(&Mat4::IDENTITY, &Mat4::IDENTITY),
            Err(ObjectError::InvalidState { .. })
        ));
        assert!(model.destroy().is_err());

        model.init(&device).unwrap();
        assert_eq!(model.lifecycle(), Lifecycle::Ready);
        assert!(matches!(
            model.init(&device),
            Err(ObjectError::InvalidState {
                operation: "init",
                ..
            })
        ));
        // a second init allocates nothing
        assert_eq!(gpu.created_count(ResourceKind::VertexArray), 1);

        model.render(&Mat4::IDENTITY, &Mat4::IDENTITY).unwrap();
        model.destroy().unwrap();
        assert_eq!(model.lifecycle(), Lifecycle::Destroyed);
        assert!(model.render(&Mat4::IDENTITY, &Mat4::IDENTITY).is_err());
        assert!(model.destroy().is_err());
    }

    #[test]
    fn test_destroy_releases_every_handle() {
        let (device, gpu) = GpuDevice::tracking();
        let mut model = Model3D::new(Cube::new().into());
        model.init(&device).unwrap();
        assert!(gpu.total_live() > 0);
        model.destroy().unwrap();
        assert_eq!(gpu.total_live(), 0);
        assert!(gpu.violations().is_empty());
    }

    #[test]
    fn test_render_sets_transform() {
        let (device, gpu) = GpuDevice::tracking();
        let mut model = Model3D::new(Cube::new().into());
        model.set_position(Vec3::new(1.0, 2.0, 3.0));
        model.init(&device).unwrap();
        gpu.clear_events();

        let projection = Mat4::perspective_rh(1.0, 1.5, 0.1, 100.0);
        model.render(&projection, &Mat4::IDENTITY).unwrap();

        let program = model.shader.as_ref().unwrap().program().unwrap();
        assert_eq!(
            gpu.uniform_value(program, "model"),
            Some(model.model_matrix().into())
        );
        assert_eq!(gpu.uniform_value(program, "projection"), Some(projection.into()));
        let draws = gpu
            .events()
            .iter()
            .filter(|e| matches!(e, GpuEvent::Draw { .. }))
            .count();
        assert_eq!(draws, 1);
    }

    #[test]
    fn test_rotation_updates_bounds() {
        let mut model = Model3D::new(Cube::new().into());
        assert_eq!(model.bounds().aabb().max, Vec3::ONE);
        model.rotate(std::f32::consts::FRAC_PI_4, Vec3::Y);
        assert!((model.bounds().aabb().max.x - 2.0f32.sqrt()).abs() < 1e-5);
        assert!((model.bounds().max_length() - 3.0f32.sqrt()).abs() < 1e-6);
    }

    #[test]
    fn test_model_matrix() {
        let mut model = Model3D::new(Cube::new().into());
        model.set_position(Vec3::new(0.0, 5.0, 0.0));
        model.set_scale_factor(2.0);
        let p = model.model_matrix().transform_point3(Vec3::ONE);
        assert_eq!(p, Vec3::new(2.0, 7.0, 2.0));
    }
}
