//! Fly motion for cameras
//!
//! Yaw turns around the world up axis and pitch around the camera's
//! horizontal right axis, so the horizon never rolls.

use super::camera::Camera;
use glam::{Quat, Vec3};

/// Pitch stays short of straight up or down.
const MAX_PITCH: f32 = std::f32::consts::FRAC_PI_2 - 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FlyMotion {
    position: Vec3,
    yaw: f32,
    pitch: f32,
}

impl FlyMotion {
    pub fn new() -> Self {
        Self::default()
    }

    /// Back to the origin, looking down -Z.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
    }

    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    pub fn orientation(&self) -> Quat {
        Quat::from_rotation_y(self.yaw) * Quat::from_rotation_x(self.pitch)
    }

    pub fn forward_direction(&self) -> Vec3 {
        self.orientation() * Vec3::NEG_Z
    }

    pub fn right_direction(&self) -> Vec3 {
        self.orientation() * Vec3::X
    }

    /// Move along the view direction. Negative moves back.
    pub fn forward(&mut self, amount: f32) {
        self.position += self.forward_direction() * amount;
    }

    /// Strafe. Negative moves left.
    pub fn right(&mut self, amount: f32) {
        self.position += self.right_direction() * amount;
    }

    /// Radians, positive looks up.
    pub fn rotate_pitch(&mut self, angle: f32) {
        self.pitch = (self.pitch + angle).clamp(-MAX_PITCH, MAX_PITCH);
    }

    /// Radians, positive turns left.
    pub fn rotate_yaw(&mut self, angle: f32) {
        self.yaw = (self.yaw + angle).rem_euclid(std::f32::consts::TAU);
    }

    /// Place `camera` at the motion's position and orientation.
    pub fn apply_to(&self, camera: &mut Camera) {
        let orientation = self.orientation();
        camera.position = self.position;
        camera.target = self.position + orientation * Vec3::NEG_Z;
        camera.up = orientation * Vec3::Y;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    fn close(a: Vec3, b: Vec3) -> bool {
        (a - b).length() < 1e-5
    }

    #[test]
    fn test_forward_and_right() {
        let mut motion = FlyMotion::new();
        motion.forward(2.0);
        assert!(close(motion.position(), Vec3::new(0.0, 0.0, -2.0)));
        motion.right(-1.0);
        assert!(close(motion.position(), Vec3::new(-1.0, 0.0, -2.0)));
    }

    #[test]
    fn test_yaw_turns_around_world_up() {
        let mut motion = FlyMotion::new();
        motion.rotate_pitch(0.5);
        motion.rotate_yaw(FRAC_PI_2);
        // right stays horizontal whatever the pitch
        assert!(motion.right_direction().y.abs() < 1e-6);
        assert!(close(motion.right_direction(), Vec3::NEG_Z));
    }

    #[test]
    fn test_pitch_is_clamped() {
        let mut motion = FlyMotion::new();
        motion.rotate_pitch(10.0);
        assert_eq!(motion.pitch(), MAX_PITCH);
        motion.rotate_pitch(-20.0);
        assert_eq!(motion.pitch(), -MAX_PITCH);
    }

    #[test]
    fn test_apply_to_camera() {
        let mut motion = FlyMotion::new();
        motion.set_position(Vec3::new(150.0, 100.0, 150.0));
        motion.rotate_yaw(-FRAC_PI_2);
        let mut camera = Camera::default();
        motion.apply_to(&mut camera);
        assert_eq!(camera.position, Vec3::new(150.0, 100.0, 150.0));
        assert!(close(camera.direction(), Vec3::X));
        assert!(close(camera.up, Vec3::Y));
    }

    #[test]
    fn test_reset() {
        let mut motion = FlyMotion::new();
        motion.set_position(Vec3::ONE);
        motion.rotate_yaw(1.0);
        motion.reset();
        assert_eq!(motion, FlyMotion::default());
    }
}
