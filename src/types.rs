//! Core data types shared by the catalog, the session coordinator and the facade.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a camera sits relative to the host device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DevicePosition {
    Back,
    Front,
    External,
}

impl DevicePosition {
    pub fn as_str(&self) -> &'static str {
        match self {
            DevicePosition::Back => "back",
            DevicePosition::Front => "front",
            DevicePosition::External => "external",
        }
    }
}

impl fmt::Display for DevicePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Photo dimensions in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct PhotoDimensions {
    pub width: u32,
    pub height: u32,
}

impl PhotoDimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn pixel_count(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

impl fmt::Display for PhotoDimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Focus behaviour requested from a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FocusMode {
    Locked,
    /// Focus once, then lock
    AutoFocus,
    ContinuousAutoFocus,
}

/// Exposure behaviour requested from a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExposureMode {
    Locked,
    /// Expose once, then lock
    AutoExpose,
    ContinuousAutoExposure,
}

/// Hardware limits reported by a capture device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceCapabilities {
    /// Supported photo dimensions, smallest first
    pub supported_photo_dimensions: Vec<PhotoDimensions>,
    pub min_zoom_factor: f32,
    pub max_zoom_factor: f32,
    /// Zoom factors at which a virtual device changes its active lens
    pub switch_over_zoom_factors: Vec<f32>,
    pub has_ultra_wide: bool,
    pub has_telephoto: bool,
    pub focus_point_of_interest_supported: bool,
    pub exposure_point_of_interest_supported: bool,
    pub focus_modes: Vec<FocusMode>,
    pub exposure_modes: Vec<ExposureMode>,
}

impl Default for DeviceCapabilities {
    fn default() -> Self {
        Self {
            supported_photo_dimensions: vec![
                PhotoDimensions::new(1920, 1080),
                PhotoDimensions::new(4032, 3024),
            ],
            min_zoom_factor: 1.0,
            max_zoom_factor: 10.0,
            switch_over_zoom_factors: Vec::new(),
            has_ultra_wide: false,
            has_telephoto: false,
            focus_point_of_interest_supported: true,
            exposure_point_of_interest_supported: true,
            focus_modes: vec![
                FocusMode::Locked,
                FocusMode::AutoFocus,
                FocusMode::ContinuousAutoFocus,
            ],
            exposure_modes: vec![
                ExposureMode::Locked,
                ExposureMode::AutoExpose,
                ExposureMode::ContinuousAutoExposure,
            ],
        }
    }
}

impl DeviceCapabilities {
    pub fn with_zoom_range(mut self, min: f32, max: f32) -> Self {
        self.min_zoom_factor = min;
        self.max_zoom_factor = max;
        self
    }

    pub fn with_switch_over_factors(mut self, factors: Vec<f32>) -> Self {
        self.switch_over_zoom_factors = factors;
        self
    }

    pub fn with_photo_dimensions(mut self, dimensions: Vec<PhotoDimensions>) -> Self {
        self.supported_photo_dimensions = dimensions;
        self
    }

    pub fn with_constituents(mut self, ultra_wide: bool, telephoto: bool) -> Self {
        self.has_ultra_wide = ultra_wide;
        self.has_telephoto = telephoto;
        self
    }

    pub fn with_points_of_interest(mut self, focus: bool, exposure: bool) -> Self {
        self.focus_point_of_interest_supported = focus;
        self.exposure_point_of_interest_supported = exposure;
        self
    }

    pub fn supports_focus_mode(&self, mode: FocusMode) -> bool {
        self.focus_modes.contains(&mode)
    }

    pub fn supports_exposure_mode(&self, mode: ExposureMode) -> bool {
        self.exposure_modes.contains(&mode)
    }

    /// Largest photo the device can produce
    pub fn max_photo_dimensions(&self) -> PhotoDimensions {
        self.supported_photo_dimensions
            .last()
            .copied()
            .unwrap_or_default()
    }
}

/// A physical or virtual camera exposed by the platform.
///
/// Devices are immutable snapshots; the catalog looks them up fresh on every query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureDevice {
    pub id: String,
    pub name: String,
    pub position: DevicePosition,
    pub capabilities: DeviceCapabilities,
}

impl CaptureDevice {
    pub fn new(id: impl Into<String>, name: impl Into<String>, position: DevicePosition) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            position,
            capabilities: DeviceCapabilities::default(),
        }
    }

    pub fn with_capabilities(mut self, capabilities: DeviceCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Devices compare by identity, not by their capability snapshot.
    pub fn same_device(&self, other: &CaptureDevice) -> bool {
        self.id == other.id
    }
}

/// A point in normalized device coordinates, (0,0) top-left to (1,1) bottom-right.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const CENTER: Point = Point { x: 0.5, y: 0.5 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Clamp into the unit square; non-finite coordinates collapse to the center.
    pub fn clamped(self) -> Self {
        let clamp = |v: f64| if v.is_finite() { v.clamp(0.0, 1.0) } else { 0.5 };
        Self {
            x: clamp(self.x),
            y: clamp(self.y),
        }
    }
}

/// Physical orientation of the host device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DeviceOrientation {
    #[default]
    Unknown,
    Portrait,
    PortraitUpsideDown,
    /// Rotated counter-clockwise, top of the device on the left
    LandscapeLeft,
    /// Rotated clockwise, top of the device on the right
    LandscapeRight,
    FaceUp,
    FaceDown,
}

/// Orientation of the user interface showing the preview
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum InterfaceOrientation {
    #[default]
    Portrait,
    PortraitUpsideDown,
    LandscapeLeft,
    LandscapeRight,
}

/// Current device and interface orientation as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OrientationSnapshot {
    pub device: DeviceOrientation,
    pub interface: InterfaceOrientation,
}

impl OrientationSnapshot {
    pub fn new(device: DeviceOrientation, interface: InterfaceOrientation) -> Self {
        Self { device, interface }
    }
}

/// Externally observable camera status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CameraStatus {
    /// Initial status before `start`
    #[default]
    Unknown,
    /// Camera access was denied
    Unauthorized,
    /// The session failed to start
    Failed,
    Running,
    /// Higher-priority media processing interrupted the session
    Interrupted,
}

impl fmt::Display for CameraStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CameraStatus::Unknown => "unknown",
            CameraStatus::Unauthorized => "unauthorized",
            CameraStatus::Failed => "failed",
            CameraStatus::Running => "running",
            CameraStatus::Interrupted => "interrupted",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_clamped() {
        assert_eq!(Point::new(1.5, -0.2).clamped(), Point::new(1.0, 0.0));
        assert_eq!(Point::new(f64::NAN, 0.3).clamped(), Point::new(0.5, 0.3));
    }

    #[test]
    fn test_max_photo_dimensions_uses_last() {
        let caps = DeviceCapabilities::default();
        assert_eq!(caps.max_photo_dimensions(), PhotoDimensions::new(4032, 3024));

        let empty = caps.with_photo_dimensions(vec![]);
        assert_eq!(empty.max_photo_dimensions(), PhotoDimensions::default());
    }

    #[test]
    fn test_device_identity() {
        let a = CaptureDevice::new("cam-1", "Back Camera", DevicePosition::Back);
        let b = a
            .clone()
            .with_capabilities(DeviceCapabilities::default().with_zoom_range(1.0, 2.0));
        assert!(a.same_device(&b));
        assert_ne!(a, b);
    }

    #[test]
    fn test_status_display() {
        assert_eq!(CameraStatus::Interrupted.to_string(), "interrupted");
        assert_eq!(DevicePosition::External.to_string(), "external");
    }
}
