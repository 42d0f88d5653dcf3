//! Uniform values written into uniform block memory.

use glam::{Mat4, Vec2, Vec3, Vec4};

/// A single uniform value in its std140-compatible byte form.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Int(i32),
    UInt(u32),
    Float(f32),
    Vec2(Vec2),
    Vec3(Vec3),
    Vec4(Vec4),
    Mat4(Mat4),
}

impl UniformValue {
    /// Size in bytes of the encoded value.
    pub fn size(&self) -> usize {
        match self {
            UniformValue::Int(_) | UniformValue::UInt(_) | UniformValue::Float(_) => 4,
            UniformValue::Vec2(_) => 8,
            UniformValue::Vec3(_) => 12,
            UniformValue::Vec4(_) => 16,
            UniformValue::Mat4(_) => 64,
        }
    }

    /// Write the value at the start of `dst`, which must hold at least [`size`](Self::size) bytes.
    pub fn write_to(&self, dst: &mut [u8]) {
        let size = self.size();
        match self {
            UniformValue::Int(v) => dst[..size].copy_from_slice(bytemuck::bytes_of(v)),
            UniformValue::UInt(v) => dst[..size].copy_from_slice(bytemuck::bytes_of(v)),
            UniformValue::Float(v) => dst[..size].copy_from_slice(bytemuck::bytes_of(v)),
            UniformValue::Vec2(v) => dst[..size].copy_from_slice(bytemuck::cast_slice(&v.to_array())),
            UniformValue::Vec3(v) => dst[..size].copy_from_slice(bytemuck::cast_slice(&v.to_array())),
            UniformValue::Vec4(v) => dst[..size].copy_from_slice(bytemuck::cast_slice(&v.to_array())),
            UniformValue::Mat4(v) => {
                dst[..size].copy_from_slice(bytemuck::cast_slice(&v.to_cols_array()))
            }
        }
    }

    /// Encoded bytes of the value.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = vec![0u8; self.size()];
        self.write_to(&mut bytes);
        bytes
    }
}

impl From<f32> for UniformValue {
    fn from(v: f32) -> Self {
        UniformValue::Float(v)
    }
}

impl From<i32> for UniformValue {
    fn from(v: i32) -> Self {
        UniformValue::Int(v)
    }
}

impl From<u32> for UniformValue {
    fn from(v: u32) -> Self {
        UniformValue::UInt(v)
    }
}

impl From<Vec2> for UniformValue {
    fn from(v: Vec2) -> Self {
        UniformValue::Vec2(v)
    }
}

impl From<Vec3> for UniformValue {
    fn from(v: Vec3) -> Self {
        UniformValue::Vec3(v)
    }
}

impl From<Vec4> for UniformValue {
    fn from(v: Vec4) -> Self {
        UniformValue::Vec4(v)
    }
}

impl From<Mat4> for UniformValue {
    fn from(v: Mat4) -> Self {
        UniformValue::Mat4(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_sizes() {
        assert_eq!(UniformValue::Float(1.0).size(), 4);
        assert_eq!(UniformValue::Vec3(Vec3::ONE).size(), 12);
        assert_eq!(UniformValue::Mat4(Mat4::IDENTITY).size(), 64);
    }

    #[test]
    fn test_vec2_bytes() {
        let bytes = UniformValue::Vec2(Vec2::new(0.5, 2.0)).to_bytes();
        assert_eq!(&bytes[0..4], &0.5f32.to_ne_bytes());
        assert_eq!(&bytes[4..8], &2.0f32.to_ne_bytes());
    }

    #[test]
    fn test_mat4_is_column_major() {
        let m = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0));
        let bytes = UniformValue::Mat4(m).to_bytes();
        let floats: Vec<f32> = bytes
            .chunks_exact(4)
            .map(|c| f32::from_ne_bytes(c.try_into().unwrap()))
            .collect();
        assert_eq!(&floats[12..15], &[1.0, 2.0, 3.0]);
    }
}
