//! Photo output configuration and per-request photo settings.

use crate::types::{CaptureDevice, PhotoDimensions};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Codec of the primary photo
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PhotoCodec {
    Jpeg,
    Hevc,
}

/// Pixel format of the embedded preview image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PreviewPixelFormat {
    Bgra8,
    Nv12,
    Rgb8,
}

/// Trade-off between capture latency and image quality
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityPrioritization {
    Speed,
    Balanced,
    #[default]
    Quality,
}

/// What the photo output can do, as reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputCapabilities {
    pub available_codecs: Vec<PhotoCodec>,
    /// Preview formats in order of compatibility with the primary image
    pub preview_pixel_formats: Vec<PreviewPixelFormat>,
    pub responsive_capture_supported: bool,
    pub fast_capture_prioritization_supported: bool,
}

impl Default for OutputCapabilities {
    fn default() -> Self {
        Self {
            available_codecs: vec![PhotoCodec::Jpeg],
            preview_pixel_formats: vec![PreviewPixelFormat::Bgra8],
            responsive_capture_supported: false,
            fast_capture_prioritization_supported: false,
        }
    }
}

/// Configuration pushed to the photo output whenever the active device changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PhotoOutputConfig {
    pub max_photo_dimensions: PhotoDimensions,
    pub quality_prioritization: QualityPrioritization,
    pub responsive_capture_enabled: bool,
    pub fast_capture_prioritization_enabled: bool,
}

impl PhotoOutputConfig {
    /// Enable every supported feature for the given device.
    pub fn for_device(
        device: &CaptureDevice,
        capabilities: &OutputCapabilities,
        quality_prioritization: QualityPrioritization,
    ) -> Self {
        Self {
            max_photo_dimensions: device.capabilities.max_photo_dimensions(),
            quality_prioritization,
            responsive_capture_enabled: capabilities.responsive_capture_supported,
            fast_capture_prioritization_enabled: capabilities.fast_capture_prioritization_supported,
        }
    }
}

/// Settings for exactly one capture request. Never reused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoSettings {
    pub id: Uuid,
    pub codec: PhotoCodec,
    pub preview_format: Option<PreviewPixelFormat>,
    pub max_photo_dimensions: PhotoDimensions,
    pub quality_prioritization: QualityPrioritization,
}

impl PhotoSettings {
    /// Build fresh settings against the current output configuration.
    ///
    /// HEVC is used when the output offers it and `prefer_hevc` is set.
    pub fn for_output(
        output: &PhotoOutputConfig,
        capabilities: &OutputCapabilities,
        prefer_hevc: bool,
    ) -> Self {
        let codec = if prefer_hevc && capabilities.available_codecs.contains(&PhotoCodec::Hevc) {
            PhotoCodec::Hevc
        } else {
            PhotoCodec::Jpeg
        };

        Self {
            id: Uuid::new_v4(),
            codec,
            preview_format: capabilities.preview_pixel_formats.first().copied(),
            max_photo_dimensions: output.max_photo_dimensions,
            quality_prioritization: output.quality_prioritization,
        }
    }
}
