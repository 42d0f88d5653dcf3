//! Logging setup

use std::sync::Once;
use tracing_subscriber::EnvFilter;

/// Subscriber configuration.
///
/// `env_filter` uses the `RUST_LOG` directive syntax, e.g.
/// `"info"` or `"lumen=debug,wgpu=warn"`.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub env_filter: Option<String>,
    pub ansi: bool,
    pub with_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            env_filter: None,
            ansi: true,
            with_target: true,
        }
    }
}

impl LoggingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn env_filter(mut self, filter: impl Into<String>) -> Self {
        self.env_filter = Some(filter.into());
        self
    }

    pub fn ansi(mut self, ansi: bool) -> Self {
        self.ansi = ansi;
        self
    }

    pub fn with_target(mut self, with_target: bool) -> Self {
        self.with_target = with_target;
        self
    }

    /// Filter from the config, else `RUST_LOG`, else `info`.
    pub fn filter(&self) -> EnvFilter {
        let configured = self
            .env_filter
            .as_deref()
            .and_then(|directives| match EnvFilter::try_new(directives) {
                Ok(filter) => Some(filter),
                Err(e) => {
                    eprintln!("invalid log filter '{directives}': {e}");
                    None
                }
            });
        configured
            .or_else(|| EnvFilter::try_from_default_env().ok())
            .unwrap_or_else(|| EnvFilter::new("info"))
    }
}

static INIT: Once = Once::new();

/// Install the global fmt subscriber.
///
/// Only the first call has any effect. Call it early in `main`.
pub fn init_logging(config: LoggingConfig) {
    INIT.call_once(|| {
        let installed = tracing_subscriber::fmt()
            .with_env_filter(config.filter())
            .with_ansi(config.ansi)
            .with_target(config.with_target)
            .try_init();

        match installed {
            Ok(()) => tracing::debug!("logging initialized"),
            // another subscriber got there first, keep it
            Err(e) => eprintln!("logging not initialized: {e}"),
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configured_filter_wins() {
        let config = LoggingConfig::new().env_filter("lumen=debug");
        assert_eq!(config.filter().to_string(), "lumen=debug");
    }

    #[test]
    fn test_invalid_filter_falls_back() {
        let config = LoggingConfig::new().env_filter("lumen=[");
        // either RUST_LOG or the info default, never a panic
        let _ = config.filter();
    }

    #[test]
    fn test_init_is_idempotent() {
        init_logging(LoggingConfig::new().env_filter("warn").ansi(false));
        init_logging(LoggingConfig::new());
        tracing::warn!("still logging");
    }
}
