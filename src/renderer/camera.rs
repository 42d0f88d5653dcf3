//! Cameras

use glam::{Mat4, Vec3};

/// Anything a scene can be viewed from.
pub trait Viewer {
    fn position(&self) -> Vec3;

    fn view(&self) -> Mat4;

    fn projection(&self) -> Mat4;

    fn view_projection(&self) -> Mat4 {
        self.projection() * self.view()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Projection {
    Perspective {
        /// Vertical field of view in radians.
        fov_y: f32,
        aspect: f32,
        near: f32,
        far: f32,
    },
    Orthographic {
        width: f32,
        height: f32,
        near: f32,
        far: f32,
    },
}

impl Projection {
    pub fn matrix(&self) -> Mat4 {
        match *self {
            Projection::Perspective {
                fov_y,
                aspect,
                near,
                far,
            } => Mat4::perspective_rh(fov_y, aspect, near, far),
            Projection::Orthographic {
                width,
                height,
                near,
                far,
            } => Mat4::orthographic_rh(
                -width * 0.5,
                width * 0.5,
                -height * 0.5,
                height * 0.5,
                near,
                far,
            ),
        }
    }
}

/// Look-at camera.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub position: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    pub projection: Projection,
}

impl Camera {
    /// Perspective camera for a `width` x `height` viewport, `fov_y_degrees` vertically.
    pub fn perspective(width: u32, height: u32, fov_y_degrees: f32, near: f32, far: f32) -> Self {
        Self {
            position: Vec3::new(0.0, 0.0, 5.0),
            target: Vec3::ZERO,
            up: Vec3::Y,
            projection: Projection::Perspective {
                fov_y: fov_y_degrees.to_radians(),
                aspect: aspect(width, height),
                near,
                far,
            },
        }
    }

    pub fn orthographic(width: f32, height: f32, near: f32, far: f32) -> Self {
        Self {
            position: Vec3::new(0.0, 0.0, 5.0),
            target: Vec3::ZERO,
            up: Vec3::Y,
            projection: Projection::Orthographic {
                width,
                height,
                near,
                far,
            },
        }
    }

    pub fn look_at(&mut self, position: Vec3, target: Vec3) {
        self.position = position;
        self.target = target;
    }

    /// Follow a viewport resize. Orthographic extents are left alone.
    pub fn set_viewport(&mut self, width: u32, height: u32) {
        if let Projection::Perspective { aspect: a, .. } = &mut self.projection {
            *a = aspect(width, height);
        }
    }

    pub fn direction(&self) -> Vec3 {
        (self.target - self.position).normalize_or_zero()
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::perspective(1, 1, 45.0, 0.1, 1000.0)
    }
}

impl Viewer for Camera {
    fn position(&self) -> Vec3 {
        self.position
    }

    fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, self.up)
    }

    fn projection(&self) -> Mat4 {
        self.projection.matrix()
    }
}

fn aspect(width: u32, height: u32) -> f32 {
    width.max(1) as f32 / height.max(1) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_view_looks_down_negative_z() {
        let mut camera = Camera::perspective(800, 600, 45.0, 0.1, 100.0);
        camera.look_at(Vec3::new(0.0, 0.0, 10.0), Vec3::ZERO);
        let p = camera.view().transform_point3(Vec3::ZERO);
        assert!((p - Vec3::new(0.0, 0.0, -10.0)).length() < 1e-5);
        assert_eq!(camera.direction(), Vec3::NEG_Z);
    }

    #[test]
    fn test_resize_updates_aspect() {
        let mut camera = Camera::perspective(800, 600, 45.0, 0.1, 100.0);
        camera.set_viewport(1000, 500);
        assert!(matches!(
            camera.projection,
            Projection::Perspective { aspect, .. } if aspect == 2.0
        ));
        camera.set_viewport(0, 0);
        assert!(matches!(
            camera.projection,
            Projection::Perspective { aspect, .. } if aspect == 1.0
        ));
    }

    #[test]
    fn test_orthographic_extent() {
        let m = Projection::Orthographic {
            width: 20.0,
            height: 10.0,
            near: 0.1,
            far: 100.0,
        }
        .matrix();
        let p = m.project_point3(Vec3::new(10.0, 5.0, -1.0));
        assert!((p.x - 1.0).abs() < 1e-6 && (p.y - 1.0).abs() < 1e-6);
    }
}
