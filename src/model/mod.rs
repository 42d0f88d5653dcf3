//! Models: CPU assets, bounding volumes and their GPU copies
//!
//! An [`Asset3D`] comes from an [`AssetLoader`] or a procedural mesh.
//! [`Model3D`] places it in the scene and uploads it as a [`GpuModel3D`].

mod asset;
mod bounds;
mod gpu_model;
mod model3d;
#[cfg(feature = "obj")]
mod obj;

pub use asset::{Asset3D, AssetError, AssetLoader, Material, MaterialRange, RawTexture, VertexData};
pub use bounds::{Aabb, BoundingVolumes, OrientedBox, BOX_EDGES};
pub use gpu_model::GpuModel3D;
pub use model3d::Model3D;
#[cfg(feature = "obj")]
pub use obj::ObjLoader;

use crate::gpu::{Filter, GpuDevice, GpuError, Owned, TextureDesc, TextureFormat, TextureId, Wrap};
use std::rc::Rc;

/// 1x1 opaque white texture, bound in place of a missing diffuse map.
pub struct WhiteTexture {
    texture: Owned<TextureId>,
}

impl WhiteTexture {
    pub fn new(device: &GpuDevice) -> Result<Self, GpuError> {
        let texture = device.create_texture(
            &TextureDesc {
                width: 1,
                height: 1,
                format: TextureFormat::Rgba8,
                filter: Filter::Nearest,
                wrap: Wrap::Repeat,
            },
            Some(&[255, 255, 255, 255]),
        )?;
        Ok(Self { texture })
    }

    /// The white texture of `device`, shared while any holder lives.
    pub fn shared(device: &GpuDevice) -> Result<Rc<Self>, GpuError> {
        device.shared(Self::new)
    }

    pub fn id(&self) -> TextureId {
        self.texture.id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::ResourceKind;

    #[test]
    fn test_white_texture_shared() {
        let (device, gpu) = GpuDevice::tracking();
        let a = WhiteTexture::shared(&device).unwrap();
        let b = WhiteTexture::shared(&device).unwrap();
        assert_eq!(a.id(), b.id());
        assert_eq!(gpu.created_count(ResourceKind::Texture), 1);
        drop((a, b));
        assert_eq!(gpu.live_count(ResourceKind::Texture), 0);
    }
}
