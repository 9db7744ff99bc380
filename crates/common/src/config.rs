//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Environment variable overriding [`BackendConfig::base_url`].
pub const BACKEND_URL_ENV: &str = "FLOWBOARD_BACKEND_URL";

/// Global application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Generation and merge backend settings.
    pub backend: BackendConfig,

    /// Job polling behaviour.
    pub poller: PollerConfig,

    /// Client-side merge settings.
    pub compositor: CompositorConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Where the generation backend lives and how long to wait for it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Base URL, e.g. `http://localhost:8000`. Paths such as
    /// `/api/jobs/video` are appended to it.
    pub base_url: String,

    /// TCP connect timeout in seconds.
    pub connect_timeout_secs: u64,

    /// Whole-request timeout in seconds.
    pub request_timeout_secs: u64,
}

/// Job poller parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollerConfig {
    /// Interval between polling ticks in milliseconds.
    pub interval_ms: u64,

    /// Stop polling every job after the first transport failure.
    /// When false, only the failing job is torn down.
    pub halt_on_transport_error: bool,
}

/// Merge output container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// WebM container, VP9 video.
    #[default]
    Webm,
    /// MP4 container, H.264 video.
    Mp4,
}

impl OutputFormat {
    /// Conventional file extension for the container.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Webm => "webm",
            Self::Mp4 => "mp4",
        }
    }
}

/// Sequential compositor parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompositorConfig {
    /// Capture frame rate of the shared canvas.
    pub fps: u32,

    /// Output container.
    pub format: OutputFormat,

    /// Letterbox colour as hex string (for example `#000000`).
    pub background: String,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "flowboard=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            connect_timeout_secs: 10,
            request_timeout_secs: 30,
        }
    }
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval_ms: 2000,
            halt_on_transport_error: true,
        }
    }
}

impl Default for CompositorConfig {
    fn default() -> Self {
        Self {
            fps: 30,
            format: OutputFormat::Webm,
            background: "#000000".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl CompositorConfig {
    /// Parse [`Self::background`] into an opaque RGBA colour.
    pub fn background_rgba(&self) -> Result<[u8; 4], crate::FlowboardError> {
        parse_hex_color(&self.background)
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    ///
    /// The backend URL can be overridden with `FLOWBOARD_BACKEND_URL`.
    pub fn load() -> Self {
        let config_path = config_file_path();
        let mut config = Self::default();
        if config_path.exists() {
            match std::fs::read_to_string(&config_path) {
                Ok(content) => match serde_json::from_str(&content) {
                    Ok(parsed) => config = parsed,
                    Err(e) => {
                        tracing::warn!("Failed to parse config at {:?}: {}", config_path, e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read config at {:?}: {}", config_path, e);
                }
            }
        }
        if let Ok(url) = std::env::var(BACKEND_URL_ENV) {
            if !url.trim().is_empty() {
                config.backend.base_url = url.trim().to_string();
            }
        }
        config
    }

    /// Save config to the standard location.
    pub fn save(&self) -> Result<(), std::io::Error> {
        let config_path = config_file_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(config_path, json)
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), crate::FlowboardError> {
        if self.backend.base_url.trim().is_empty() {
            return Err(crate::FlowboardError::config("backend.base_url is empty"));
        }
        if self.poller.interval_ms == 0 {
            return Err(crate::FlowboardError::config(
                "poller.interval_ms must be non-zero",
            ));
        }
        if self.compositor.fps == 0 {
            return Err(crate::FlowboardError::config(
                "compositor.fps must be non-zero",
            ));
        }
        self.compositor.background_rgba()?;
        Ok(())
    }
}

/// Standard config file location.
pub fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("flowboard").join("config.json")
}

fn parse_hex_color(raw: &str) -> Result<[u8; 4], crate::FlowboardError> {
    let hex = raw.trim().trim_start_matches('#');
    if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(crate::FlowboardError::config(format!(
            "invalid colour '{raw}', expected #rrggbb"
        )));
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).unwrap_or(0);
    Ok([channel(0), channel(2), channel(4), 255])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_reference_behaviour() {
        let config = AppConfig::default();
        assert_eq!(config.poller.interval_ms, 2000);
        assert!(config.poller.halt_on_transport_error);
        assert_eq!(config.compositor.fps, 30);
        assert_eq!(config.compositor.format, OutputFormat::Webm);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let parsed: AppConfig =
            serde_json::from_str(r#"{"poller": {"interval_ms": 500}}"#).unwrap();
        assert_eq!(parsed.poller.interval_ms, 500);
        assert!(parsed.poller.halt_on_transport_error);
        assert_eq!(parsed.backend.base_url, "http://localhost:8000");
    }

    #[test]
    fn test_background_colour_parsing() {
        let mut config = CompositorConfig::default();
        config.background = "#1a2B3c".to_string();
        assert_eq!(config.background_rgba().unwrap(), [0x1a, 0x2b, 0x3c, 255]);

        config.background = "blue".to_string();
        assert!(config.background_rgba().is_err());
    }

    #[test]
    fn test_zero_fps_is_rejected() {
        let mut config = AppConfig::default();
        config.compositor.fps = 0;
        assert!(config.validate().is_err());
    }
}
