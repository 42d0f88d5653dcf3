//! Engine and window settings

use crate::gpu::BackendKind;
use crate::target::AntiAliasing;

/// Settings for creating a window.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowSettings {
    pub title: String,
    /// Initial size in logical pixels.
    pub size: (u32, u32),
    pub resizable: bool,
    pub vsync: bool,
}

impl Default for WindowSettings {
    fn default() -> Self {
        Self {
            title: "lumen".to_string(),
            size: (1280, 720),
            resizable: true,
            vsync: true,
        }
    }
}

impl WindowSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn size(mut self, width: u32, height: u32) -> Self {
        self.size = (width, height);
        self
    }

    pub fn resizable(mut self, resizable: bool) -> Self {
        self.resizable = resizable;
        self
    }

    pub fn vsync(mut self, vsync: bool) -> Self {
        self.vsync = vsync;
        self
    }
}

/// Everything an application picks before the first frame.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub anti_aliasing: AntiAliasing,
    pub backend: BackendKind,
    pub clear_color: [f32; 4],
    /// Side of the square sun shadow map in texels.
    pub shadow_map_size: u32,
    pub window: WindowSettings,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            anti_aliasing: AntiAliasing::None,
            backend: BackendKind::Wgpu,
            clear_color: [1.0, 1.0, 1.0, 1.0],
            shadow_map_size: 2048,
            window: WindowSettings::default(),
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn anti_aliasing(mut self, anti_aliasing: AntiAliasing) -> Self {
        self.anti_aliasing = anti_aliasing;
        self
    }

    pub fn backend(mut self, backend: BackendKind) -> Self {
        self.backend = backend;
        self
    }

    pub fn clear_color(mut self, color: [f32; 4]) -> Self {
        self.clear_color = color;
        self
    }

    pub fn shadow_map_size(mut self, size: u32) -> Self {
        self.shadow_map_size = size.max(1);
        self
    }

    pub fn window(mut self, window: WindowSettings) -> Self {
        self.window = window;
        self
    }

    /// Apply `--aa <kind>`, `--backend <kind>` and `--shadow-map <size>`
    /// from command-line arguments, program name excluded.
    pub fn with_args<I, S>(mut self, args: I) -> Result<Self, String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut args = args.into_iter();
        while let Some(flag) = args.next() {
            let flag = flag.as_ref().to_owned();
            let value = args
                .next()
                .ok_or_else(|| format!("missing value after '{flag}'"))?;
            let value = value.as_ref();
            match flag.as_str() {
                "--aa" => self.anti_aliasing = value.parse()?,
                "--backend" => self.backend = value.parse()?,
                "--shadow-map" => {
                    let size = value
                        .parse::<u32>()
                        .map_err(|_| format!("invalid shadow map size '{value}'"))?;
                    self = self.shadow_map_size(size);
                }
                other => return Err(format!("unknown argument '{other}'")),
            }
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let config = EngineConfig::new()
            .anti_aliasing(AntiAliasing::Fxaa2)
            .backend(BackendKind::Tracking)
            .shadow_map_size(0)
            .window(WindowSettings::new().title("demo").size(640, 480).vsync(false));
        assert_eq!(config.anti_aliasing, AntiAliasing::Fxaa2);
        assert_eq!(config.backend, BackendKind::Tracking);
        assert_eq!(config.shadow_map_size, 1);
        assert_eq!(config.window.size, (640, 480));
        assert!(!config.window.vsync);
        assert_eq!(config.clear_color, [1.0; 4]);
    }

    #[test]
    fn test_with_args() {
        let config = EngineConfig::new()
            .with_args(["--aa", "msaa:4", "--backend", "tracking", "--shadow-map", "512"])
            .unwrap();
        assert_eq!(config.anti_aliasing, AntiAliasing::Msaa { samples: 4 });
        assert_eq!(config.backend, BackendKind::Tracking);
        assert_eq!(config.shadow_map_size, 512);
    }

    #[test]
    fn test_with_args_errors() {
        assert!(EngineConfig::new().with_args(["--aa"]).is_err());
        assert!(EngineConfig::new().with_args(["--aa", "blurry"]).is_err());
        assert!(EngineConfig::new().with_args(["--fullscreen", "yes"]).is_err());
        assert!(EngineConfig::new()
            .with_args(["--shadow-map", "big"])
            .is_err());
    }
}
