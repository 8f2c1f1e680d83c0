//! Configuration management for photocamera
//!
//! Provides configuration loading, saving and validation for session startup,
//! zoom behaviour and photo capture preferences.

use crate::capture::QualityPrioritization;
use crate::errors::CameraError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PhotoCameraConfig {
    pub session: SessionConfig,
    pub zoom: ZoomConfig,
    pub capture: CaptureConfig,
}

/// Session startup and recovery
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Start on the front camera when one exists
    pub prefer_front_camera: bool,
    /// Restart a stopped session after the media server resets
    pub restart_on_media_reset: bool,
}

/// Zoom behaviour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoomConfig {
    /// Factors offered in addition to the device's switch-over factors
    pub standard_factors: Vec<f32>,
    /// Default duration of a smooth zoom in milliseconds
    pub smooth_zoom_duration_ms: u64,
    /// Distance within which the current factor counts as sitting on an optical stop
    pub optical_match_tolerance: f32,
}

/// Photo capture preferences
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Capture HEVC when the output supports it
    pub prefer_hevc: bool,
    pub quality_prioritization: QualityPrioritization,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            prefer_front_camera: false,
            restart_on_media_reset: true,
        }
    }
}

impl Default for ZoomConfig {
    fn default() -> Self {
        Self {
            standard_factors: vec![1.0, 2.0],
            smooth_zoom_duration_ms: 300,
            optical_match_tolerance: 0.1,
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            prefer_hevc: true,
            quality_prioritization: QualityPrioritization::Quality,
        }
    }
}

impl ZoomConfig {
    pub fn smooth_zoom_duration(&self) -> Duration {
        Duration::from_millis(self.smooth_zoom_duration_ms)
    }
}

impl PhotoCameraConfig {
    /// Load configuration from TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, CameraError> {
        let path = path.as_ref();

        if !path.exists() {
            log::info!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .map_err(|e| CameraError::Config(format!("Failed to read config file: {}", e)))?;

        let config: PhotoCameraConfig = toml::from_str(&contents)
            .map_err(|e| CameraError::Config(format!("Failed to parse config file: {}", e)))?;

        config.validate().map_err(CameraError::Config)?;

        log::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), CameraError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                CameraError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let toml_string = toml::to_string_pretty(self)
            .map_err(|e| CameraError::Config(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, toml_string)
            .map_err(|e| CameraError::Config(format!("Failed to write config file: {}", e)))?;

        log::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Get default config file path
    pub fn default_path() -> PathBuf {
        PathBuf::from("photocamera.toml")
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
        if !(self.zoom.optical_match_tolerance > 0.0 && self.zoom.optical_match_tolerance <= 1.0) {
            return Err("Optical match tolerance must be in (0.0, 1.0]".to_string());
        }
        if self.zoom.smooth_zoom_duration_ms > 10_000 {
            return Err("Smooth zoom duration must be at most 10000 ms".to_string());
        }
        if self
            .zoom
            .standard_factors
            .iter()
            .any(|f| !f.is_finite() || *f < 1.0)
        {
            return Err("Standard zoom factors must be finite and at least 1.0".to_string());
        }
        Ok(())
    }
}
