//! Configuration management for colometry
//!
//! Provides configuration loading, saving, and validation for the camera,
//! capture session, illumination, and artifact storage settings.

use crate::errors::ColometryError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColometryConfig {
    pub camera: CameraConfig,
    pub session: SessionConfig,
    pub illumination: IlluminationConfig,
    pub storage: StorageConfig,
}

/// Camera-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraConfig {
    /// Capture device index as enumerated by the OS
    pub device_index: u32,
    /// Requested capture resolution [width, height]
    pub resolution: [u32; 2],
    /// Frames discarded after the stream opens, while exposure settles
    pub warmup_frames: u32,
}

/// Capture session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Number of captures per session
    pub capture_count: u32,
    /// Delay between consecutive captures in milliseconds
    pub inter_capture_delay_ms: u64,
}

/// Sample illumination configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IlluminationConfig {
    /// Drive an LED during the session
    pub enabled: bool,
    /// LED class device name under /sys/class/leds
    pub led_name: Option<String>,
    /// Illumination color [r, g, b]
    pub color: [u8; 3],
}

/// Artifact storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root of the captures_image/histogram/pdf tree
    pub output_root: String,
    /// JPEG quality for stored frames (1-100)
    pub jpeg_quality: u8,
}

impl Default for ColometryConfig {
    fn default() -> Self {
        Self {
            camera: CameraConfig {
                device_index: 0,
                resolution: [1920, 1080],
                warmup_frames: 5,
            },
            session: SessionConfig::default(),
            illumination: IlluminationConfig {
                enabled: false,
                led_name: None,
                color: [255, 255, 255],
            },
            storage: StorageConfig {
                output_root: "history".to_string(),
                jpeg_quality: 95,
            },
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            capture_count: 5,
            inter_capture_delay_ms: 5000,
        }
    }
}

impl SessionConfig {
    pub fn inter_capture_delay(&self) -> Duration {
        Duration::from_millis(self.inter_capture_delay_ms)
    }
}

impl ColometryConfig {
    /// Load configuration from TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ColometryError> {
        let path = path.as_ref();

        if !path.exists() {
            log::info!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .map_err(|e| ColometryError::Config(format!("Failed to read config file: {}", e)))?;

        let config: ColometryConfig = toml::from_str(&contents)?;

        log::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ColometryError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    ColometryError::Config(format!("Failed to create config directory: {}", e))
                })?;
            }
        }

        let toml_string = toml::to_string_pretty(self)?;

        fs::write(path, toml_string)
            .map_err(|e| ColometryError::Config(format!("Failed to write config file: {}", e)))?;

        log::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Get default config file path
    pub fn default_path() -> PathBuf {
        PathBuf::from("colometry.toml")
    }

    /// Load from default location or fall back to defaults
    pub fn load_or_default() -> Self {
        Self::load_from_file(Self::default_path()).unwrap_or_else(|e| {
            log::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), String> {
        if self.camera.resolution[0] == 0 || self.camera.resolution[1] == 0 {
            return Err("Invalid camera resolution".to_string());
        }
        if self.camera.warmup_frames > 100 {
            return Err("Warmup frames must be at most 100".to_string());
        }

        if self.session.capture_count == 0 || self.session.capture_count > 100 {
            return Err("Capture count must be between 1 and 100".to_string());
        }

        if self.illumination.enabled && self.illumination.led_name.is_none() {
            return Err("Illumination enabled without an LED name".to_string());
        }

        if self.storage.output_root.trim().is_empty() {
            return Err("Output root must not be empty".to_string());
        }
        if self.storage.jpeg_quality == 0 || self.storage.jpeg_quality > 100 {
            return Err("JPEG quality must be between 1 and 100".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ColometryConfig::default();
        assert_eq!(config.camera.resolution, [1920, 1080]);
        assert_eq!(config.session.capture_count, 5);
        assert_eq!(config.session.inter_capture_delay(), Duration::from_secs(5));
        assert_eq!(config.storage.output_root, "history");
        assert!(!config.illumination.enabled);
    }

    #[test]
    fn test_config_validation() {
        let config = ColometryConfig::default();
        assert!(config.validate().is_ok());

        let mut bad_resolution = config.clone();
        bad_resolution.camera.resolution = [0, 0];
        assert!(bad_resolution.validate().is_err());

        let mut bad_count = ColometryConfig::default();
        bad_count.session.capture_count = 0;
        assert!(bad_count.validate().is_err());

        let mut bad_led = ColometryConfig::default();
        bad_led.illumination.enabled = true;
        assert!(bad_led.validate().is_err());

        let mut bad_quality = ColometryConfig::default();
        bad_quality.storage.jpeg_quality = 0;
        assert!(bad_quality.validate().is_err());
    }

    #[test]
    fn test_config_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("nested").join("colometry.toml");

        let mut config = ColometryConfig::default();
        config.session.capture_count = 3;
        config.illumination.led_name = Some("rgb:status".to_string());
        assert!(config.save_to_file(&config_path).is_ok());

        let loaded = ColometryConfig::load_from_file(&config_path).unwrap();
        assert_eq!(loaded.session.capture_count, 3);
        assert_eq!(loaded.illumination.led_name.as_deref(), Some("rgb:status"));
        assert_eq!(loaded.storage.jpeg_quality, config.storage.jpeg_quality);
    }

    #[test]
    fn test_config_toml_format() {
        let config = ColometryConfig::default();
        let toml_string = toml::to_string_pretty(&config).unwrap();

        assert!(toml_string.contains("[camera]"));
        assert!(toml_string.contains("[session]"));
        assert!(toml_string.contains("[illumination]"));
        assert!(toml_string.contains("[storage]"));
        assert!(toml_string.contains("inter_capture_delay_ms"));
    }

    #[test]
    fn test_load_nonexistent_file() {
        let result = ColometryConfig::load_from_file("nonexistent_colometry.toml");
        assert!(result.is_ok());
        assert_eq!(result.unwrap().session.capture_count, 5);
    }

    #[test]
    fn test_load_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        fs::write(&path, "[session]\ncapture_count = \"five\"\n").unwrap();

        let result = ColometryConfig::load_from_file(&path);
        assert!(matches!(result, Err(ColometryError::Config(_))));
    }
}
