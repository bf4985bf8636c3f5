//! TOML-based configuration for the device server.
//!
//! Every field has a default, so the server runs without a config file and
//! older files keep working when new keys are added. Example:
//!
//! ```toml
//! [connection]
//! address = "127.0.0.1:27183"
//!
//! [device]
//! name = "tapcast"
//! width = 1080
//! height = 1920
//! rotation = 0
//! content_crop = { left = 0, top = 0, width = 1080, height = 1600 }
//!
//! [video]
//! crop = { left = 0, top = 0, width = 1080, height = 1080 }
//! max_fps = 30
//!
//! [logging]
//! level = "debug"
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tapcast_core::{DisplayInfo, Rect, Size};
use thiserror::Error;

use crate::application::stream_video::{EncoderSettings, StreamSettings};

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be serialized to TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// A value parsed but is out of range.
    #[error("invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level server configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    #[serde(default)]
    pub connection: ConnectionConfig,
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default)]
    pub video: VideoConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Where the controller listens.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConnectionConfig {
    /// Address of the controller; the device connects out to it.
    #[serde(default = "default_address")]
    pub address: SocketAddr,
}

/// The device's display as it is reported to the controller.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeviceConfig {
    /// Name sent in the handshake. At most 63 bytes of it are used.
    #[serde(default = "default_device_name")]
    pub name: String,
    /// Display width in pixels, in the current rotation.
    #[serde(default = "default_width")]
    pub width: u32,
    /// Display height in pixels, in the current rotation.
    #[serde(default = "default_height")]
    pub height: u32,
    /// Device rotation in quarter turns (0..=3).
    #[serde(default)]
    pub rotation: u8,
    #[serde(default)]
    pub layer_stack: u32,
    /// Fixed video orientation in quarter turns, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locked_video_orientation: Option<u8>,
    /// Part of the display used as the video content; the whole display
    /// when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_crop: Option<CropConfig>,
}

/// A crop region, as written in the config file.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct CropConfig {
    pub left: i32,
    pub top: i32,
    pub width: u32,
    pub height: u32,
}

/// Capture and encoder settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VideoConfig {
    /// Region of the video to encode; the whole video when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crop: Option<CropConfig>,
    #[serde(default = "default_bit_rate")]
    pub bit_rate: u32,
    #[serde(default = "default_max_fps")]
    pub max_fps: u32,
    #[serde(default = "default_i_frame_interval_secs")]
    pub i_frame_interval_secs: u32,
    #[serde(default = "default_repeat_previous_frame_after_us")]
    pub repeat_previous_frame_after_us: u64,
    /// First delay before restarting a failed capture session.
    #[serde(default = "default_restart_backoff_ms")]
    pub restart_backoff_ms: u64,
    #[serde(default = "default_max_restart_backoff_ms")]
    pub max_restart_backoff_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// `tracing` filter directive used when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl CropConfig {
    pub fn to_rect(self) -> Rect {
        Rect::new(
            self.left,
            self.top,
            self.left.saturating_add(i32::try_from(self.width).unwrap_or(i32::MAX)),
            self.top.saturating_add(i32::try_from(self.height).unwrap_or(i32::MAX)),
        )
    }
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 27183))
}
fn default_device_name() -> String {
    "tapcast".to_string()
}
fn default_width() -> u32 {
    1080
}
fn default_height() -> u32 {
    1920
}
fn default_bit_rate() -> u32 {
    EncoderSettings::default().bit_rate
}
fn default_max_fps() -> u32 {
    EncoderSettings::default().max_fps
}
fn default_i_frame_interval_secs() -> u32 {
    EncoderSettings::default().i_frame_interval_secs
}
fn default_repeat_previous_frame_after_us() -> u64 {
    EncoderSettings::default().repeat_previous_frame_after_us
}
fn default_restart_backoff_ms() -> u64 {
    100
}
fn default_max_restart_backoff_ms() -> u64 {
    2000
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
        }
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            name: default_device_name(),
            width: default_width(),
            height: default_height(),
            rotation: 0,
            layer_stack: 0,
            locked_video_orientation: None,
            content_crop: None,
        }
    }
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            crop: None,
            bit_rate: default_bit_rate(),
            max_fps: default_max_fps(),
            i_frame_interval_secs: default_i_frame_interval_secs(),
            repeat_previous_frame_after_us: default_repeat_previous_frame_after_us(),
            restart_backoff_ms: default_restart_backoff_ms(),
            max_restart_backoff_ms: default_max_restart_backoff_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// ── Conversions ───────────────────────────────────────────────────────────────

impl ServerConfig {
    /// Checks ranges serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.device.rotation > 3 {
            return Err(invalid("device.rotation", "must be between 0 and 3"));
        }
        if self.device.locked_video_orientation.is_some_and(|o| o > 3) {
            return Err(invalid("device.locked_video_orientation", "must be between 0 and 3"));
        }
        if self.device.width == 0 || self.device.height == 0 {
            return Err(invalid("device", "width and height must be non-zero"));
        }
        if self.video.max_fps == 0 {
            return Err(invalid("video.max_fps", "must be non-zero"));
        }
        if self.video.restart_backoff_ms == 0 {
            return Err(invalid("video.restart_backoff_ms", "must be non-zero"));
        }
        if self.video.max_restart_backoff_ms < self.video.restart_backoff_ms {
            return Err(invalid(
                "video.max_restart_backoff_ms",
                "must not be smaller than restart_backoff_ms",
            ));
        }
        Ok(())
    }

    pub fn display_info(&self) -> DisplayInfo {
        DisplayInfo {
            size: Size::new(self.device.width, self.device.height),
            rotation: self.device.rotation,
            layer_stack: self.device.layer_stack,
        }
    }

    /// Display region the video content is taken from, in device pixels.
    pub fn content_crop(&self) -> Option<Rect> {
        self.device.content_crop.map(CropConfig::to_rect)
    }

    pub fn stream_settings(&self) -> StreamSettings {
        StreamSettings {
            crop: self.video.crop.map(CropConfig::to_rect),
            encoder: EncoderSettings {
                bit_rate: self.video.bit_rate,
                max_fps: self.video.max_fps,
                i_frame_interval_secs: self.video.i_frame_interval_secs,
                repeat_previous_frame_after_us: self.video.repeat_previous_frame_after_us,
            },
            restart_backoff: Duration::from_millis(self.video.restart_backoff_ms),
            max_restart_backoff: Duration::from_millis(self.video.max_restart_backoff_ms),
        }
    }

    /// Pretty TOML for `--gen-config`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Serialize`] if serialization fails.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.to_string(),
    }
}

// ── Loading ───────────────────────────────────────────────────────────────────

/// Parses and validates a config from TOML text.
///
/// # Errors
///
/// Returns [`ConfigError::Parse`] for malformed TOML and
/// [`ConfigError::Invalid`] for out-of-range values.
pub fn parse_config(content: &str) -> Result<ServerConfig, ConfigError> {
    let cfg: ServerConfig = toml::from_str(content)?;
    cfg.validate()?;
    Ok(cfg)
}

/// Loads the config at `path`, returning defaults if the file does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and the errors of [`parse_config`] for bad content.
pub fn load_config(path: &Path) -> Result<ServerConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => parse_config(&content),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ServerConfig::default()),
        Err(source) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_has_expected_address_and_encoder() {
        // Arrange / Act
        let cfg = ServerConfig::default();

        // Assert
        assert_eq!(cfg.connection.address.port(), 27183);
        assert_eq!(cfg.video.bit_rate, 8_000_000);
        assert_eq!(cfg.video.max_fps, 60);
        assert_eq!(cfg.logging.level, "info");
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let cfg = parse_config("").expect("empty config must parse");
        assert_eq!(cfg, ServerConfig::default());
    }

    #[test]
    fn test_partial_section_overrides_only_given_keys() {
        // Arrange
        let toml_str = r#"
[video]
max_fps = 30
crop = { left = 10, top = 20, width = 100, height = 50 }
"#;

        // Act
        let cfg = parse_config(toml_str).expect("deserialize partial");

        // Assert
        assert_eq!(cfg.video.max_fps, 30);
        assert_eq!(cfg.video.bit_rate, 8_000_000);
        assert_eq!(cfg.stream_settings().crop, Some(Rect::new(10, 20, 110, 70)));
        assert_eq!(cfg.content_crop(), None);
    }

    #[test]
    fn test_content_crop_is_separate_from_video_crop() {
        let toml_str = "[device]\ncontent_crop = { left = 0, top = 160, width = 1080, height = 1600 }\n";

        let cfg = parse_config(toml_str).unwrap();

        assert_eq!(cfg.content_crop(), Some(Rect::new(0, 160, 1080, 1760)));
        assert_eq!(cfg.stream_settings().crop, None);
    }

    #[test]
    fn test_config_serializes_and_deserializes_round_trip() {
        let mut cfg = ServerConfig::default();
        cfg.device.name = "Pixel 7".to_string();
        cfg.device.locked_video_orientation = Some(1);
        cfg.video.crop = Some(CropConfig { left: 0, top: 0, width: 64, height: 64 });

        let restored = parse_config(&cfg.to_toml_string().unwrap()).unwrap();

        assert_eq!(cfg, restored);
    }

    #[test]
    fn test_rotation_out_of_range_is_rejected() {
        let result = parse_config("[device]\nrotation = 4\n");

        assert!(matches!(result, Err(ConfigError::Invalid { field: "device.rotation", .. })));
    }

    #[test]
    fn test_backoff_cap_below_start_is_rejected() {
        let result = parse_config("[video]\nrestart_backoff_ms = 500\nmax_restart_backoff_ms = 100\n");

        assert!(matches!(result, Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn test_invalid_toml_returns_parse_error() {
        assert!(matches!(parse_config("[[[ not valid toml"), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_stream_settings_carry_backoff_and_crop() {
        let mut cfg = ServerConfig::default();
        cfg.video.restart_backoff_ms = 50;
        cfg.video.max_restart_backoff_ms = 400;

        let settings = cfg.stream_settings();

        assert_eq!(settings.restart_backoff, Duration::from_millis(50));
        assert_eq!(settings.max_restart_backoff, Duration::from_millis(400));
        assert_eq!(settings.crop, None);
    }

    #[test]
    fn test_display_info_follows_device_section() {
        let mut cfg = ServerConfig::default();
        cfg.device.rotation = 1;
        cfg.device.layer_stack = 2;

        let display = cfg.display_info();

        assert_eq!(display.size, Size::new(1080, 1920));
        assert_eq!(display.rotation, 1);
        assert_eq!(display.layer_stack, 2);
    }

    #[test]
    fn test_load_config_returns_default_when_file_absent() {
        let path = Path::new("/nonexistent/path/that/cannot/exist/tapcast.toml");

        let cfg = load_config(path).expect("missing file falls back to defaults");

        assert_eq!(cfg, ServerConfig::default());
    }

    #[test]
    fn test_load_config_reads_file_from_disk() {
        // Arrange
        let dir = std::env::temp_dir().join(format!("tapcast_test_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("tapcast.toml");
        std::fs::write(&path, "[logging]\nlevel = \"debug\"\n").unwrap();

        // Act
        let cfg = load_config(&path).unwrap();

        // Assert
        assert_eq!(cfg.logging.level, "debug");

        // Cleanup
        std::fs::remove_dir_all(&dir).ok();
    }
}
