//! Configuration file support.
//!
//! This module provides serialization and deserialization of exam settings:
//! where images are served from, the drawing surface size, marker and
//! outline styling, history depth and log verbosity.

use serde::{Deserialize, Serialize};

use crate::canvas::{MarkerStyle, OutlineStyle};
use crate::constants::{DEFAULT_ASSET_BASE_URL, DEFAULT_HISTORY_LIMIT};
use crate::geometry::DisplaySize;

/// Log level setting for the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Show only errors
    Error,
    /// Show errors and warnings
    Warn,
    /// Show errors, warnings, and info messages
    #[default]
    Info,
    /// Show debug-level logging
    Debug,
    /// Show all log messages including trace
    Trace,
}

impl LogLevel {
    /// Convert to log crate's LevelFilter.
    pub fn to_level_filter(&self) -> log::LevelFilter {
        match self {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

/// Current configuration file format version.
/// Increment this when making breaking changes to the config format.
pub const CONFIG_VERSION: u32 = 1;

/// Exam configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExamConfig {
    /// Version of the configuration file format
    pub version: u32,

    /// Base URL that image paths from the server are appended to
    #[serde(default = "default_asset_base_url")]
    pub asset_base_url: String,

    /// Logical size of the drawing surface
    #[serde(default)]
    pub display: DisplaySize,

    /// Point marker appearance
    #[serde(default)]
    pub marker: MarkerStyle,

    /// Polygon outline appearance
    #[serde(default)]
    pub outline: OutlineStyle,

    /// Maximum number of undo steps per image
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,

    /// Log verbosity level
    #[serde(default)]
    pub log_level: LogLevel,
}

fn default_asset_base_url() -> String {
    DEFAULT_ASSET_BASE_URL.to_string()
}

fn default_history_limit() -> usize {
    DEFAULT_HISTORY_LIMIT
}

impl ExamConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self {
            version: CONFIG_VERSION,
            asset_base_url: default_asset_base_url(),
            display: DisplaySize::default(),
            marker: MarkerStyle::default(),
            outline: OutlineStyle::default(),
            history_limit: default_history_limit(),
            log_level: LogLevel::default(),
        }
    }

    /// Serialize the configuration to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;

        // Validate version compatibility
        if config.version > CONFIG_VERSION {
            return Err(ConfigError::VersionTooNew {
                file_version: config.version,
                supported_version: CONFIG_VERSION,
            });
        }

        if !(config.display.width > 0.0 && config.display.height > 0.0) {
            return Err(ConfigError::InvalidDisplay {
                width: config.display.width,
                height: config.display.height,
            });
        }

        Ok(config)
    }

    /// Get the default filename for the config file.
    pub fn default_filename() -> &'static str {
        "exam-canvas.json"
    }

    /// Get the default config file path.
    /// Returns None on WASM (no filesystem access).
    #[cfg(not(target_arch = "wasm32"))]
    pub fn default_path() -> Option<std::path::PathBuf> {
        // Try to use XDG config directory, fall back to home directory
        if let Some(config_dir) = dirs::config_dir() {
            Some(config_dir.join("exam_canvas").join(Self::default_filename()))
        } else {
            dirs::home_dir().map(|home_dir| {
                home_dir
                    .join(".config")
                    .join("exam_canvas")
                    .join(Self::default_filename())
            })
        }
    }

    /// Load configuration from a file, falling back to defaults if the file
    /// is missing or unreadable.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn load_or_default(path: &std::path::Path) -> Self {
        if !path.exists() {
            log::debug!("No config file found at {:?}", path);
            return Self::default();
        }

        match std::fs::read_to_string(path) {
            Ok(json) => match Self::from_json(&json) {
                Ok(config) => {
                    log::info!("Loaded configuration from {:?}", path);
                    config
                }
                Err(e) => {
                    log::warn!("Failed to parse config file {:?}: {}", path, e);
                    Self::default()
                }
            },
            Err(e) => {
                log::warn!("Failed to read config file {:?}: {}", path, e);
                Self::default()
            }
        }
    }

    /// Load configuration from the default path.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn load_from_default_path() -> Self {
        match Self::default_path() {
            Some(path) => Self::load_or_default(&path),
            None => Self::default(),
        }
    }

    /// Save configuration to a file.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn save_to(&self, path: &std::path::Path) -> Result<(), ConfigError> {
        // Create parent directories if needed
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = self.to_json()?;
        std::fs::write(path, json)?;
        log::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// LocalStorage key for WASM config persistence.
    #[cfg(target_arch = "wasm32")]
    const LOCALSTORAGE_KEY: &'static str = "exam-canvas-config";

    /// Load configuration from localStorage (WASM only), falling back to defaults.
    #[cfg(target_arch = "wasm32")]
    pub fn load_from_local_storage() -> Self {
        let Some(storage) = web_sys::window().and_then(|w| w.local_storage().ok().flatten()) else {
            log::debug!("localStorage not available, using default config");
            return Self::default();
        };

        match storage.get_item(Self::LOCALSTORAGE_KEY) {
            Ok(Some(json)) => match Self::from_json(&json) {
                Ok(config) => {
                    log::info!("Loaded configuration from localStorage");
                    config
                }
                Err(e) => {
                    log::warn!("Failed to parse config from localStorage: {}", e);
                    Self::default()
                }
            },
            Ok(None) => {
                log::debug!("No config found in localStorage");
                Self::default()
            }
            Err(e) => {
                log::warn!("Failed to read from localStorage: {:?}", e);
                Self::default()
            }
        }
    }
}

impl Default for ExamConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// JSON parsing error
    #[error("Failed to parse configuration: {0}")]
    ParseError(#[from] serde_json::Error),

    /// Configuration version is newer than supported
    #[error(
        "Configuration file version {file_version} is newer than supported version {supported_version}"
    )]
    VersionTooNew {
        file_version: u32,
        supported_version: u32,
    },

    /// Display surface must have a positive size
    #[error("Invalid display size {width}x{height}")]
    InvalidDisplay { width: f32, height: f32 },

    /// I/O error when reading/writing config
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ExamConfig::default();
        assert_eq!(config.display, DisplaySize::new(800.0, 600.0));
        assert_eq!(config.asset_base_url, "https://wghtstudio.cn/app/static/");
        assert_eq!(config.marker.radius, 4.0);
        assert_eq!(config.outline.fill, "#00D2FF");
        assert_eq!(config.log_level, LogLevel::Info);
    }

    #[test]
    fn test_json_roundtrip() {
        let mut config = ExamConfig::default();
        config.asset_base_url = "http://localhost/static/".to_string();
        config.log_level = LogLevel::Debug;
        let json = config.to_json().unwrap();
        assert!(json.contains("\"debug\""));
        assert_eq!(ExamConfig::from_json(&json).unwrap(), config);
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let config = ExamConfig::from_json(r#"{"version": 1}"#).unwrap();
        assert_eq!(config, ExamConfig::default());
    }

    #[test]
    fn test_rejects_newer_version() {
        let err = ExamConfig::from_json(r#"{"version": 99}"#).unwrap_err();
        assert!(matches!(err, ConfigError::VersionTooNew { file_version: 99, .. }));
    }

    #[test]
    fn test_rejects_empty_display() {
        let err = ExamConfig::from_json(r#"{"version": 1, "display": {"width": 0, "height": 600}}"#)
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidDisplay { .. }));
    }

    #[cfg(not(target_arch = "wasm32"))]
    #[test]
    fn test_load_missing_file_uses_defaults() {
        let path = std::env::temp_dir().join("exam_canvas_missing_config_test.json");
        let _ = std::fs::remove_file(&path);
        assert_eq!(ExamConfig::load_or_default(&path), ExamConfig::default());
    }

    #[cfg(not(target_arch = "wasm32"))]
    #[test]
    fn test_save_then_load() {
        let dir = std::env::temp_dir().join(format!("exam_canvas_config_{}", std::process::id()));
        let path = dir.join(ExamConfig::default_filename());
        let mut config = ExamConfig::default();
        config.history_limit = 7;
        config.save_to(&path).unwrap();
        assert_eq!(ExamConfig::load_or_default(&path).history_limit, 7);
        let _ = std::fs::remove_dir_all(&dir);
    }
}
