//! Synthetic photo data and device profiles
//!
//! Lets the session and capture paths run end to end without camera
//! hardware. Images are small so tests stay fast.

use crate::types::{CaptureDevice, DeviceCapabilities, DevicePosition, PhotoDimensions};
use bytes::Bytes;
use image::{DynamicImage, ImageFormat, RgbImage};
use std::io::Cursor;

/// Create a synthetic photo with a gradient that varies per frame
pub fn synthetic_photo(frame_number: u64, width: u32, height: u32) -> DynamicImage {
    let base = (frame_number % 256) as u8;
    let image = RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([
            base.wrapping_add((x % 256) as u8),
            base.wrapping_add((y % 256) as u8),
            base.wrapping_add(((x + y) % 256) as u8),
        ])
    });
    DynamicImage::ImageRgb8(image)
}

/// Encode an image the way a camera delivers its file representation
pub fn encode_jpeg(image: &DynamicImage) -> Option<Bytes> {
    let mut buffer = Cursor::new(Vec::new());
    match image.to_rgb8().write_to(&mut buffer, ImageFormat::Jpeg) {
        Ok(()) => Some(Bytes::from(buffer.into_inner())),
        Err(e) => {
            log::warn!("Failed to encode synthetic JPEG: {}", e);
            None
        }
    }
}

/// Characteristics of the simulated phone cameras
pub struct SimulatedCameraProfile {
    pub back_zoom_range: (f32, f32),
    /// Zoom factors where the back camera hands over to another lens
    pub back_switch_over_factors: Vec<f32>,
    pub front_zoom_range: (f32, f32),
    pub photo_dimensions: Vec<PhotoDimensions>,
}

impl Default for SimulatedCameraProfile {
    fn default() -> Self {
        Self {
            back_zoom_range: (1.0, 15.0),
            back_switch_over_factors: vec![2.0, 5.0],
            front_zoom_range: (1.0, 4.0),
            photo_dimensions: vec![
                PhotoDimensions::new(1920, 1080),
                PhotoDimensions::new(4032, 3024),
                PhotoDimensions::new(8064, 6048),
            ],
        }
    }
}

impl SimulatedCameraProfile {
    /// Triple-lens back camera
    pub fn back_camera(&self) -> CaptureDevice {
        let (min, max) = self.back_zoom_range;
        CaptureDevice::new("sim-back", "Back Triple Camera", DevicePosition::Back).with_capabilities(
            DeviceCapabilities::default()
                .with_zoom_range(min, max)
                .with_switch_over_factors(self.back_switch_over_factors.clone())
                .with_photo_dimensions(self.photo_dimensions.clone())
                .with_constituents(true, true),
        )
    }

    /// Front camera; its exposure point of interest is fixed
    pub fn front_camera(&self) -> CaptureDevice {
        let (min, max) = self.front_zoom_range;
        CaptureDevice::new("sim-front", "Front Camera", DevicePosition::Front).with_capabilities(
            DeviceCapabilities::default()
                .with_zoom_range(min, max)
                .with_photo_dimensions(self.photo_dimensions[..2].to_vec())
                .with_points_of_interest(true, false),
        )
    }

    pub fn external_camera(&self) -> CaptureDevice {
        CaptureDevice::new("sim-usb", "USB Camera", DevicePosition::External).with_capabilities(
            DeviceCapabilities::default()
                .with_zoom_range(1.0, 1.0)
                .with_photo_dimensions(vec![PhotoDimensions::new(1920, 1080)])
                .with_points_of_interest(false, false),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthetic_photo_correct_size() {
        let photo = synthetic_photo(0, 64, 48);
        assert_eq!(photo.width(), 64);
        assert_eq!(photo.height(), 48);
    }

    #[test]
    fn test_synthetic_photos_differ() {
        let first = synthetic_photo(0, 8, 8).to_rgb8();
        let second = synthetic_photo(1, 8, 8).to_rgb8();
        assert_ne!(first.get_pixel(0, 0), second.get_pixel(0, 0));
    }

    #[test]
    fn test_encode_jpeg_decodes() {
        let data = encode_jpeg(&synthetic_photo(3, 32, 24)).unwrap();
        let decoded = image::load_from_memory(&data).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (32, 24));
    }

    #[test]
    fn test_profile_devices() {
        let profile = SimulatedCameraProfile::default();
        let back = profile.back_camera();
        assert!(back.capabilities.has_ultra_wide);
        assert_eq!(back.capabilities.max_photo_dimensions(), PhotoDimensions::new(8064, 6048));
        assert!(!profile.front_camera().capabilities.exposure_point_of_interest_supported);
    }
}
