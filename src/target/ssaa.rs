//! Super-sampled render target

use super::{check_size, BlitRegion, RenderTarget, TargetCore, TargetError};
use crate::gpu::{
    Attachment, Filter, FramebufferDesc, FramebufferId, GpuDevice, Owned, RenderbufferDesc,
    RenderbufferId, TextureDesc, TextureFormat, TextureId, Wrap,
};

/// Renders at `factor` times the requested size into one or more color
/// textures and downsamples with a linear filter on blit.
pub struct SsaaTarget {
    colors: Box<[Owned<TextureId>]>,
    depth: Owned<RenderbufferId>,
    core: TargetCore,
    factor: u32,
}

impl SsaaTarget {
    /// Allocate `num_targets` color attachments of `width*factor` x `height*factor`.
    ///
    /// Arguments are validated before anything is allocated.
    pub fn init(
        device: &GpuDevice,
        width: u32,
        height: u32,
        factor: u32,
        num_targets: u32,
    ) -> Result<Self, TargetError> {
        let max = device.limits().max_color_attachments;
        if num_targets == 0 || num_targets > max {
            tracing::error!(
                "Number of targets for render target ({}) not supported. Max. is {}",
                num_targets,
                max
            );
            return Err(TargetError::UnsupportedAttachmentCount {
                requested: num_targets,
                max,
            });
        }
        if factor == 0 {
            tracing::error!("supersampling factor must be at least 1");
            return Err(TargetError::InvalidFactor(factor));
        }
        let scaled = width.checked_mul(factor).zip(height.checked_mul(factor));
        let Some((scaled_width, scaled_height)) = scaled else {
            tracing::error!(
                "supersampled size of {}x{} by {} overflows",
                width,
                height,
                factor
            );
            return Err(TargetError::InvalidSize {
                width,
                height,
                max: device.limits().max_texture_size,
            });
        };
        check_size(device, scaled_width, scaled_height)?;

        let colors = (0..num_targets)
            .map(|_| {
                device.create_texture(
                    &TextureDesc {
                        width: scaled_width,
                        height: scaled_height,
                        format: TextureFormat::Rgba8,
                        filter: Filter::Linear,
                        wrap: Wrap::ClampToEdge,
                    },
                    None,
                )
            })
            .collect::<Result<Box<[_]>, _>>()?;
        let depth = device.create_renderbuffer(&RenderbufferDesc {
            width: scaled_width,
            height: scaled_height,
            format: TextureFormat::Depth32,
            samples: 1,
        })?;
        let core = TargetCore::new(
            device,
            &FramebufferDesc {
                color: colors.iter().map(|c| Attachment::Texture(c.id())).collect(),
                depth: Some(Attachment::Renderbuffer(depth.id())),
            },
            scaled_width,
            scaled_height,
        )?;

        tracing::debug!(
            "SSAA x{} target {}x{} with {} color targets as {}",
            factor,
            scaled_width,
            scaled_height,
            num_targets,
            core.id()
        );
        Ok(Self {
            colors,
            depth,
            core,
            factor,
        })
    }

    pub fn factor(&self) -> u32 {
        self.factor
    }

    pub fn num_targets(&self) -> u32 {
        self.colors.len() as u32
    }

    /// Color texture of attachment `index`.
    pub fn color_attachment(&self, index: u32) -> Option<TextureId> {
        self.colors.get(index as usize).map(Owned::id)
    }

    pub fn depth_renderbuffer(&self) -> RenderbufferId {
        self.depth.id()
    }
}

impl RenderTarget for SsaaTarget {
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
        let count = self.num_targets();
        if region.attachment >= count {
            tracing::error!(
                "ERROR wrong target number {} in SSAA blit, max. is {}",
                region.attachment,
                count - 1
            );
            return Err(TargetError::AttachmentIndex {
                index: region.attachment,
                count,
            });
        }
        self.core
            .blit_attachment(region.attachment, region, Filter::Linear)
    }

    fn color_texture(&self) -> Option<TextureId> {
        self.color_attachment(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::{GpuLimits, ResourceKind, TrackingGpu};

    #[test]
    fn test_too_many_targets_allocates_nothing() {
        let gpu = TrackingGpu::with_limits(GpuLimits {
            max_color_attachments: 4,
            ..GpuLimits::default()
        });
        let device = GpuDevice::new(gpu.clone());
        let err = SsaaTarget::init(&device, 64, 64, 2, 5).err().unwrap();
        assert!(matches!(
            err,
            TargetError::UnsupportedAttachmentCount {
                requested: 5,
                max: 4
            }
        ));
        assert!(SsaaTarget::init(&device, 64, 64, 2, 0).is_err());
        assert!(SsaaTarget::init(&device, 64, 64, 0, 1).is_err());
        assert_eq!(gpu.total_created(), 0);
    }

    #[test]
    fn test_scaled_size_over_limit_fails() {
        let gpu = TrackingGpu::with_limits(GpuLimits {
            max_texture_size: 256,
            ..GpuLimits::default()
        });
        let device = GpuDevice::new(gpu.clone());
        assert!(matches!(
            SsaaTarget::init(&device, 200, 100, 2, 1),
            Err(TargetError::InvalidSize { width: 400, .. })
        ));
        assert_eq!(gpu.total_created(), 0);
    }

    #[test]
    fn test_overflowing_scaled_size_fails() {
        let (device, gpu) = GpuDevice::tracking();
        assert!(matches!(
            SsaaTarget::init(&device, u32::MAX, 16, 2, 1),
            Err(TargetError::InvalidSize { width: u32::MAX, .. })
        ));
        assert_eq!(gpu.total_created(), 0);
    }

    #[test]
    fn test_allocates_supersized_attachments() {
        let (device, gpu) = GpuDevice::tracking();
        let target = SsaaTarget::init(&device, 100, 50, 2, 3).unwrap();
        assert_eq!((target.width(), target.height()), (200, 100));
        assert_eq!(gpu.live_count(ResourceKind::Texture), 3);
        assert_eq!(gpu.live_count(ResourceKind::Renderbuffer), 1);
        let desc = gpu.framebuffer_desc(target.framebuffer()).unwrap();
        assert_eq!(desc.color.len(), 3);
        let texture = gpu.texture_desc(target.color_attachment(2).unwrap()).unwrap();
        assert_eq!((texture.width, texture.height), (200, 100));
    }

    #[test]
    fn test_blit_selects_attachment() {
        let (device, gpu) = GpuDevice::tracking();
        let target = SsaaTarget::init(&device, 32, 32, 2, 2).unwrap();
        gpu.fill(
            Attachment::Texture(target.color_attachment(0).unwrap()),
            [1.0, 0.0, 0.0, 1.0],
        );
        gpu.fill(
            Attachment::Texture(target.color_attachment(1).unwrap()),
            [0.0, 1.0, 0.0, 1.0],
        );

        target
            .blit(&BlitRegion::screen(32, 32).with_attachment(1))
            .unwrap();
        assert_eq!(gpu.screen_color(), [0.0, 1.0, 0.0, 1.0]);

        target.blit(&BlitRegion::screen(32, 32)).unwrap();
        assert_eq!(gpu.screen_color(), [1.0, 0.0, 0.0, 1.0]);

        let err = target
            .blit(&BlitRegion::screen(32, 32).with_attachment(2))
            .unwrap_err();
        assert!(matches!(err, TargetError::AttachmentIndex { index: 2, count: 2 }));
    }
}
