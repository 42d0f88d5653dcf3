//! Plain render target without anti-aliasing

use super::{check_size, BlitRegion, RenderTarget, TargetCore, TargetError};
use crate::gpu::{
    Attachment, Filter, FramebufferDesc, FramebufferId, GpuDevice, Owned, TextureDesc, TextureFormat,
    TextureId, Wrap,
};

/// One color texture and one depth texture at window resolution.
///
/// Both attachments are textures, so the target can feed a later pass: the
/// color as a post-process input, the depth as a shadow map.
pub struct NoAaTarget {
    color: Owned<TextureId>,
    depth: Owned<TextureId>,
    core: TargetCore,
}

impl NoAaTarget {
    pub fn init(device: &GpuDevice, width: u32, height: u32) -> Result<Self, TargetError> {
        check_size(device, width, height)?;

        let color = device.create_texture(
            &TextureDesc {
                width,
                height,
                format: TextureFormat::Rgba8,
                filter: Filter::Linear,
                wrap: Wrap::ClampToEdge,
            },
            None,
        )?;
        let depth = device.create_texture(
            &TextureDesc {
                width,
                height,
                format: TextureFormat::Depth32,
                filter: Filter::Nearest,
                wrap: Wrap::ClampToEdge,
            },
            None,
        )?;
        let core = TargetCore::new(
            device,
            &FramebufferDesc {
                color: vec![Attachment::Texture(color.id())],
                depth: Some(Attachment::Texture(depth.id())),
            },
            width,
            height,
        )?;

        tracing::debug!("no-AA target {}x{} as {}", width, height, core.id());
        Ok(Self { color, depth, core })
    }

    pub fn device(&self) -> &GpuDevice {
        self.core.device()
    }

    pub fn color(&self) -> TextureId {
        self.color.id()
    }

    pub fn depth(&self) -> TextureId {
        self.depth.id()
    }
}

impl RenderTarget for NoAaTarget {
    fn width(&self) -> u32 {
        self.core.width()
    }

    fn height(&self) -> u32 {
        self.core.height()
    }

    fn framebuffer(&self) -> FramebufferId {
        self.core.id()
    }

    fn clear_color(&self) -> [f32; 4] {
        self.core.clear_color()
    }

    fn set_clear_color(&mut self, color: [f32; 4]) {
        self.core.set_clear_color(color);
    }

    fn bind(&self) -> Result<(), TargetError> {
        self.core.bind()
    }

    fn unbind(&self) -> Result<(), TargetError> {
        self.core.unbind()
    }

    fn clear(&self) -> Result<(), TargetError> {
        self.core.clear()
    }

    fn blit(&self, region: &BlitRegion) -> Result<(), TargetError> {
        if region.attachment != 0 {
            return Err(TargetError::AttachmentIndex {
                index: region.attachment,
                count: 1,
            });
        }
        self.core
            .blit_attachment(0, region, self.core.copy_filter(region))
    }

    fn color_texture(&self) -> Option<TextureId> {
        Some(self.color.id())
    }

    fn depth_texture(&self) -> Option<TextureId> {
        Some(self.depth.id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::{GpuEvent, ResourceKind};

    #[test]
    fn test_init_allocates_textures_and_framebuffer() {
        let (device, gpu) = GpuDevice::tracking();
        let target = NoAaTarget::init(&device, 40, 30).unwrap();
        assert_eq!(gpu.live_count(ResourceKind::Texture), 2);
        assert_eq!(gpu.live_count(ResourceKind::Framebuffer), 1);
        let depth = gpu.texture_desc(target.depth_texture().unwrap()).unwrap();
        assert_eq!(depth.format, TextureFormat::Depth32);
        assert_eq!((target.width(), target.height()), (40, 30));
    }

    #[test]
    fn test_zero_size_fails_before_allocation() {
        let (device, gpu) = GpuDevice::tracking();
        assert!(matches!(
            NoAaTarget::init(&device, 0, 10),
            Err(TargetError::InvalidSize { .. })
        ));
        assert_eq!(gpu.total_created(), 0);
    }

    #[test]
    fn test_blit_copies_to_screen() {
        let (device, gpu) = GpuDevice::tracking();
        let mut target = NoAaTarget::init(&device, 16, 16).unwrap();
        target.set_clear_color([1.0, 0.0, 0.0, 1.0]);
        target.clear().unwrap();
        target.bind().unwrap();
        target.blit(&BlitRegion::screen(16, 16)).unwrap();

        assert_eq!(gpu.screen_color(), [1.0, 0.0, 0.0, 1.0]);
        assert_eq!(device.bound_framebuffer(), None);
        let blit = gpu
            .events()
            .into_iter()
            .find_map(|e| match e {
                GpuEvent::Blit(desc) => Some(desc),
                _ => None,
            })
            .unwrap();
        assert_eq!(blit.filter, Filter::Nearest);
        assert_eq!(blit.dst, None);
    }

    #[test]
    fn test_scaled_blit_is_linear() {
        let (device, gpu) = GpuDevice::tracking();
        let target = NoAaTarget::init(&device, 16, 16).unwrap();
        target.blit(&BlitRegion::new(0, 0, 8, 8)).unwrap();
        assert!(gpu
            .events()
            .iter()
            .any(|e| matches!(e, GpuEvent::Blit(desc) if desc.filter == Filter::Linear)));
        assert!(matches!(
            target.blit(&BlitRegion::screen(16, 16).with_attachment(1)),
            Err(TargetError::AttachmentIndex { index: 1, count: 1 })
        ));
    }
}
