//! Off-screen render targets
//!
//! Every target owns a framebuffer and its attachments and implements
//! [`RenderTarget`]. The anti-aliasing strategies are interchangeable:
//!
//! - [`NoAaTarget`] renders at window resolution
//! - [`SsaaTarget`] renders at a multiple of it and downsamples on blit
//! - [`MsaaTarget`] renders multisampled and resolves on blit
//! - [`Fxaa2Target`] post-processes a plain target through the FXAA shader
//!
//! Binding is global device state. `bind` replaces whatever was bound and
//! nothing is stacked: `unbind` of the bound target leaves the default
//! framebuffer bound, and `unbind` of any other target is an error.

mod filter;
mod fxaa2;
mod msaa;
mod noaa;
mod ssaa;

pub use filter::{FilterContext, FilterParams, FilterTarget, FullscreenQuad};
pub use fxaa2::{Fxaa2, Fxaa2Target};
pub use msaa::MsaaTarget;
pub use noaa::NoAaTarget;
pub use ssaa::SsaaTarget;

use crate::gpu::{
    BlitDesc, Filter, FramebufferDesc, FramebufferId, GpuDevice, GpuError, Owned, Rect, TextureId,
};
use crate::shader::ShaderError;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TargetError {
    #[error("{requested} color targets requested, supported range is 1..={max}")]
    UnsupportedAttachmentCount { requested: u32, max: u32 },

    #[error("{requested} samples requested, supported range is 1..={max}")]
    UnsupportedSamples { requested: u32, max: u32 },

    #[error("invalid supersampling factor {0}")]
    InvalidFactor(u32),

    #[error("{width}x{height} is not a valid target size (max {max})")]
    InvalidSize { width: u32, height: u32, max: u32 },

    #[error("wrong target number {index}, the target has {count}")]
    AttachmentIndex { index: u32, count: u32 },

    #[error("target is not bound")]
    NotBound,

    #[error("target cannot blit into itself")]
    SelfBlit,

    #[error(transparent)]
    Shader(#[from] ShaderError),

    #[error(transparent)]
    Gpu(#[from] GpuError),
}

/// Destination rectangle of a blit, bottom-left origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlitRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    /// Color attachment to copy from.
    pub attachment: u32,
    /// Copy into the default framebuffer and leave it bound. Otherwise copy
    /// into whatever framebuffer is currently bound.
    pub bind_default: bool,
}

impl BlitRegion {
    /// The whole `width` x `height` screen.
    pub fn screen(width: u32, height: u32) -> Self {
        Self::new(0, 0, width, height)
    }

    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
            attachment: 0,
            bind_default: true,
        }
    }

    pub fn with_attachment(mut self, attachment: u32) -> Self {
        self.attachment = attachment;
        self
    }

    /// Copy into the currently bound framebuffer instead of the default one.
    pub fn into_bound(mut self) -> Self {
        self.bind_default = false;
        self
    }

    fn rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }
}

/// An off-screen rendering surface.
pub trait RenderTarget {
    /// Size of the attachments in pixels.
    fn width(&self) -> u32;
    fn height(&self) -> u32;

    fn framebuffer(&self) -> FramebufferId;

    fn clear_color(&self) -> [f32; 4];
    fn set_clear_color(&mut self, color: [f32; 4]);

    /// Redirect draws to this target and its full viewport.
    fn bind(&self) -> Result<(), TargetError>;

    /// Bind the default framebuffer. Fails with [`TargetError::NotBound`] if
    /// this target is not the one bound.
    fn unbind(&self) -> Result<(), TargetError>;

    /// Clear color and depth, leaving the previous binding in place.
    fn clear(&self) -> Result<(), TargetError>;

    fn blit(&self, region: &BlitRegion) -> Result<(), TargetError>;

    /// Sampleable color texture, for targets that have one.
    fn color_texture(&self) -> Option<TextureId> {
        None
    }

    /// Sampleable depth texture, for targets that have one.
    fn depth_texture(&self) -> Option<TextureId> {
        None
    }
}

/// Framebuffer, size and clear color shared by every target.
///
/// Targets declare it after their attachments so the attachments are
/// released first and the framebuffer last.
pub(crate) struct TargetCore {
    device: GpuDevice,
    framebuffer: Owned<FramebufferId>,
    width: u32,
    height: u32,
    clear_color: [f32; 4],
}

impl TargetCore {
    pub(crate) fn new(
        device: &GpuDevice,
        desc: &FramebufferDesc,
        width: u32,
        height: u32,
    ) -> Result<Self, TargetError> {
        let framebuffer = device
            .create_framebuffer(desc)
            .inspect_err(|e| tracing::error!("ERROR creating render target framebuffer: {}", e))?;
        Ok(Self {
            device: device.clone(),
            framebuffer,
            width,
            height,
            clear_color: [0.0, 0.0, 0.0, 1.0],
        })
    }

    pub(crate) fn device(&self) -> &GpuDevice {
        &self.device
    }

    pub(crate) fn id(&self) -> FramebufferId {
        self.framebuffer.id()
    }

    pub(crate) fn width(&self) -> u32 {
        self.width
    }

    pub(crate) fn height(&self) -> u32 {
        self.height
    }

    pub(crate) fn clear_color(&self) -> [f32; 4] {
        self.clear_color
    }

    pub(crate) fn set_clear_color(&mut self, color: [f32; 4]) {
        self.clear_color = color;
    }

    pub(crate) fn is_bound(&self) -> bool {
        self.device.bound_framebuffer() == Some(self.id())
    }

    pub(crate) fn bind(&self) -> Result<(), TargetError> {
        self.device.bind_framebuffer(Some(self.id()))?;
        self.device
            .set_viewport(Rect::from_size(self.width, self.height));
        tracing::trace!("bound {}", self.id());
        Ok(())
    }

    pub(crate) fn unbind(&self) -> Result<(), TargetError> {
        if !self.is_bound() {
            tracing::warn!("unbind of {} which is not bound", self.id());
            return Err(TargetError::NotBound);
        }
        self.device.bind_framebuffer(None)?;
        Ok(())
    }

    pub(crate) fn clear(&self) -> Result<(), TargetError> {
        let previous = self.device.bound_framebuffer();
        self.device.bind_framebuffer(Some(self.id()))?;
        let cleared = self.device.clear(self.clear_color, 1.0);
        self.device.bind_framebuffer(previous)?;
        Ok(cleared?)
    }

    /// Framebuffer copy of `attachment` into the region's destination.
    pub(crate) fn blit_attachment(
        &self,
        attachment: u32,
        region: &BlitRegion,
        filter: Filter,
    ) -> Result<(), TargetError> {
        let dst = self.destination(region)?;
        self.device
            .blit_framebuffer(&BlitDesc {
                src: self.id(),
                src_attachment: attachment,
                src_rect: Rect::from_size(self.width, self.height),
                dst,
                dst_rect: region.rect(),
                filter,
            })
            .inspect_err(|e| tracing::error!("ERROR blitting {}: {}", self.id(), e))?;
        if region.bind_default {
            self.device.bind_framebuffer(None)?;
        }
        Ok(())
    }

    pub(crate) fn destination(&self, region: &BlitRegion) -> Result<Option<FramebufferId>, TargetError> {
        if region.bind_default {
            return Ok(None);
        }
        let bound = self.device.bound_framebuffer();
        if bound == Some(self.id()) {
            tracing::error!("blit of {} into itself", self.id());
            return Err(TargetError::SelfBlit);
        }
        Ok(bound)
    }

    /// Nearest filtering for 1:1 copies, linear when scaling.
    pub(crate) fn copy_filter(&self, region: &BlitRegion) -> Filter {
        if region.width == self.width && region.height == self.height {
            Filter::Nearest
        } else {
            Filter::Linear
        }
    }
}

/// Validate a target size against the device limit.
pub(crate) fn check_size(device: &GpuDevice, width: u32, height: u32) -> Result<(), TargetError> {
    let max = device.limits().max_texture_size;
    if width == 0 || height == 0 || width > max || height > max {
        tracing::error!("render target size {}x{} not supported, max. is {}", width, height, max);
        return Err(TargetError::InvalidSize { width, height, max });
    }
    Ok(())
}

/// Anti-aliasing strategy, selectable from configuration strings such as
/// `none`, `ssaa:2`, `msaa:4` or `fxaa2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AntiAliasing {
    #[default]
    None,
    Ssaa { factor: u32, targets: u32 },
    Msaa { samples: u32 },
    Fxaa2,
}

impl AntiAliasing {
    /// Allocate a target of this kind.
    pub fn build(
        &self,
        device: &GpuDevice,
        width: u32,
        height: u32,
    ) -> Result<Box<dyn RenderTarget>, TargetError> {
        tracing::debug!("building {} target {}x{}", self, width, height);
        Ok(match *self {
            AntiAliasing::None => Box::new(NoAaTarget::init(device, width, height)?),
            AntiAliasing::Ssaa { factor, targets } => {
                Box::new(SsaaTarget::init(device, width, height, factor, targets)?)
            }
            AntiAliasing::Msaa { samples } => {
                Box::new(MsaaTarget::init(device, width, height, samples)?)
            }
            AntiAliasing::Fxaa2 => Box::new(Fxaa2Target::init(device, width, height)?),
        })
    }
}

impl fmt::Display for AntiAliasing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AntiAliasing::None => f.write_str("none"),
            AntiAliasing::Ssaa { factor, .. } => write!(f, "ssaa:{factor}"),
            AntiAliasing::Msaa { samples } => write!(f, "msaa:{samples}"),
            AntiAliasing::Fxaa2 => f.write_str("fxaa2"),
        }
    }
}

impl FromStr for AntiAliasing {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        let (kind, arg) = match lower.split_once(':') {
            Some((kind, arg)) => (kind, Some(arg)),
            None => (lower.as_str(), None),
        };
        let number = |default: u32| -> Result<u32, String> {
            arg.map_or(Ok(default), |a| {
                a.parse::<u32>()
                    .map_err(|_| format!("invalid number '{a}' in '{s}'"))
            })
        };
        match kind {
            "none" | "noaa" => Ok(AntiAliasing::None),
            "ssaa" => Ok(AntiAliasing::Ssaa {
                factor: number(2)?,
                targets: 1,
            }),
            "msaa" => Ok(AntiAliasing::Msaa {
                samples: number(4)?,
            }),
            "fxaa" | "fxaa2" => Ok(AntiAliasing::Fxaa2),
            other => Err(format!("unknown anti-aliasing '{other}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::{GpuEvent, ResourceKind, TrackingGpu};

    #[test]
    fn test_parse_anti_aliasing() {
        assert_eq!("none".parse::<AntiAliasing>(), Ok(AntiAliasing::None));
        assert_eq!(
            "SSAA:3".parse::<AntiAliasing>(),
            Ok(AntiAliasing::Ssaa {
                factor: 3,
                targets: 1
            })
        );
        assert_eq!(
            "msaa".parse::<AntiAliasing>(),
            Ok(AntiAliasing::Msaa { samples: 4 })
        );
        assert_eq!("fxaa2".parse::<AntiAliasing>(), Ok(AntiAliasing::Fxaa2));
        assert!("msaa:x".parse::<AntiAliasing>().is_err());
        assert!("taa".parse::<AntiAliasing>().is_err());
    }

    #[test]
    fn test_every_strategy_releases_all_handles() {
        let strategies = [
            AntiAliasing::None,
            AntiAliasing::Ssaa {
                factor: 2,
                targets: 3,
            },
            AntiAliasing::Msaa { samples: 4 },
            AntiAliasing::Fxaa2,
        ];
        for strategy in strategies {
            let (device, gpu) = GpuDevice::tracking();
            let target = strategy.build(&device, 64, 48).unwrap();
            assert!(gpu.total_live() > 0, "{strategy} allocated nothing");
            drop(target);
            assert_eq!(gpu.total_live(), 0, "{strategy} leaked handles");
            assert!(gpu.violations().is_empty(), "{strategy}: {:?}", gpu.violations());
        }
    }

    #[test]
    fn test_bind_is_not_reentrant() {
        let (device, gpu) = GpuDevice::tracking();
        let a = NoAaTarget::init(&device, 32, 32).unwrap();
        let b = NoAaTarget::init(&device, 16, 16).unwrap();

        a.bind().unwrap();
        b.bind().unwrap();
        b.unbind().unwrap();

        assert_eq!(device.bound_framebuffer(), None);
        let binds: Vec<_> = gpu
            .events()
            .into_iter()
            .filter(|e| matches!(e, GpuEvent::BindFramebuffer(_)))
            .collect();
        assert_eq!(
            binds,
            vec![
                GpuEvent::BindFramebuffer(Some(a.framebuffer())),
                GpuEvent::BindFramebuffer(Some(b.framebuffer())),
                GpuEvent::BindFramebuffer(None),
            ]
        );
    }

    #[test]
    fn test_unbind_when_not_bound_changes_nothing() {
        let (device, _gpu) = GpuDevice::tracking();
        let a = NoAaTarget::init(&device, 32, 32).unwrap();
        let b = NoAaTarget::init(&device, 32, 32).unwrap();

        a.bind().unwrap();
        assert!(matches!(b.unbind(), Err(TargetError::NotBound)));
        assert_eq!(device.bound_framebuffer(), Some(a.framebuffer()));
    }

    #[test]
    fn test_clear_restores_previous_binding() {
        let (device, gpu) = GpuDevice::tracking();
        let mut a = NoAaTarget::init(&device, 8, 8).unwrap();
        let b = NoAaTarget::init(&device, 8, 8).unwrap();
        a.set_clear_color([0.0, 0.0, 1.0, 1.0]);

        b.bind().unwrap();
        a.clear().unwrap();

        assert_eq!(device.bound_framebuffer(), Some(b.framebuffer()));
        let color = gpu
            .color_of(crate::gpu::Attachment::Texture(a.color_texture().unwrap()))
            .unwrap();
        assert_eq!(color, [0.0, 0.0, 1.0, 1.0]);
    }

    #[test]
    fn test_blit_into_itself_is_rejected() {
        let (device, _gpu) = GpuDevice::tracking();
        let a = NoAaTarget::init(&device, 8, 8).unwrap();
        a.bind().unwrap();
        let err = a.blit(&BlitRegion::screen(8, 8).into_bound()).unwrap_err();
        assert!(matches!(err, TargetError::SelfBlit));
    }

    #[test]
    fn test_partial_allocation_failure_releases_everything() {
        let gpu = TrackingGpu::new();
        let device = GpuDevice::new(gpu.clone());
        gpu.fail_next(ResourceKind::Framebuffer);
        assert!(NoAaTarget::init(&device, 8, 8).is_err());
        assert_eq!(gpu.total_live(), 0);

        gpu.fail_next(ResourceKind::Renderbuffer);
        assert!(SsaaTarget::init(&device, 8, 8, 2, 2).is_err());
        assert_eq!(gpu.total_live(), 0);
        assert!(gpu.violations().is_empty());
    }
}
