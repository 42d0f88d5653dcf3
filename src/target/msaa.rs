//! Multisampled render target

use super::{check_size, BlitRegion, RenderTarget, TargetCore, TargetError};
use crate::gpu::{
    Attachment, FramebufferDesc, FramebufferId, GpuDevice, Owned, RenderbufferDesc, RenderbufferId,
    TextureFormat,
};

/// Multisampled color and depth stores, resolved into the destination on blit.
pub struct MsaaTarget {
    color: Owned<RenderbufferId>,
    depth: Owned<RenderbufferId>,
    core: TargetCore,
    samples: u32,
}

impl MsaaTarget {
    /// Largest sample count the device supports.
    pub fn max_samples(device: &GpuDevice) -> u32 {
        device.limits().max_samples
    }

    pub fn init(
        device: &GpuDevice,
        width: u32,
        height: u32,
        samples: u32,
    ) -> Result<Self, TargetError> {
        let max = Self::max_samples(device);
        if samples == 0 || samples > max {
            tracing::error!("{} samples not supported. Max. is {}", samples, max);
            return Err(TargetError::UnsupportedSamples {
                requested: samples,
                max,
            });
        }
        check_size(device, width, height)?;

        let store = |format| {
            device.create_renderbuffer(&RenderbufferDesc {
                width,
                height,
                format,
                samples,
            })
        };
        let color = store(TextureFormat::Rgba8)?;
        let depth = store(TextureFormat::Depth32)?;
        let core = TargetCore::new(
            device,
            &FramebufferDesc {
                color: vec![Attachment::Renderbuffer(color.id())],
                depth: Some(Attachment::Renderbuffer(depth.id())),
            },
            width,
            height,
        )?;

        tracing::debug!("MSAA x{} target {}x{} as {}", samples, width, height, core.id());
        Ok(Self {
            color,
            depth,
            core,
            samples,
        })
    }

    pub fn samples(&self) -> u32 {
        self.samples
    }

    pub fn color_renderbuffer(&self) -> RenderbufferId {
        self.color.id()
    }

    pub fn depth_renderbuffer(&self) -> RenderbufferId {
        self.depth.id()
    }
}

impl RenderTarget for MsaaTarget {
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
            tracing::error!(
                "ERROR wrong target number {} in MSAA blit, max. is 0",
                region.attachment
            );
            return Err(TargetError::AttachmentIndex {
                index: region.attachment,
                count: 1,
            });
        }
        self.core
            .blit_attachment(0, region, self.core.copy_filter(region))
    }
}
