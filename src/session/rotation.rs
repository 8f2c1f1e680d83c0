//! Rotation angles for preview and capture.
//!
//! Angles are degrees of clockwise rotation applied to the sensor image so the
//! horizon stays level. Built-in sensors are mounted landscape, so an upright
//! portrait device needs 90°. The front camera mirrors the two landscape
//! cases. External cameras do not move with the device.

use crate::types::{DeviceOrientation, DevicePosition, InterfaceOrientation, OrientationSnapshot};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RotationState {
    /// Angle for the preview connection, from the interface orientation
    pub preview_angle: f64,
    /// Angle for the photo output connection, from the device orientation
    pub capture_angle: f64,
}

impl Default for RotationState {
    fn default() -> Self {
        Self {
            preview_angle: 90.0,
            capture_angle: 90.0,
        }
    }
}

impl RotationState {
    pub fn compute(position: DevicePosition, orientation: OrientationSnapshot) -> Self {
        let interface_equivalent = device_equivalent(orientation.interface);
        let capture_orientation = match orientation.device {
            // Flat or unknown: trust the interface instead
            DeviceOrientation::Unknown | DeviceOrientation::FaceUp | DeviceOrientation::FaceDown => {
                interface_equivalent
            }
            other => other,
        };

        Self {
            preview_angle: angle_for(position, interface_equivalent),
            capture_angle: angle_for(position, capture_orientation),
        }
    }
}

/// Interface landscape-left has the device's top on the right, and vice versa.
fn device_equivalent(interface: InterfaceOrientation) -> DeviceOrientation {
    match interface {
        InterfaceOrientation::Portrait => DeviceOrientation::Portrait,
        InterfaceOrientation::PortraitUpsideDown => DeviceOrientation::PortraitUpsideDown,
        InterfaceOrientation::LandscapeLeft => DeviceOrientation::LandscapeRight,
        InterfaceOrientation::LandscapeRight => DeviceOrientation::LandscapeLeft,
    }
}

fn angle_for(position: DevicePosition, orientation: DeviceOrientation) -> f64 {
    if position == DevicePosition::External {
        return 0.0;
    }
    let front = position == DevicePosition::Front;
    match orientation {
        DeviceOrientation::PortraitUpsideDown => 270.0,
        DeviceOrientation::LandscapeLeft if front => 180.0,
        DeviceOrientation::LandscapeLeft => 0.0,
        DeviceOrientation::LandscapeRight if front => 0.0,
        DeviceOrientation::LandscapeRight => 180.0,
        _ => 90.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(device: DeviceOrientation, interface: InterfaceOrientation) -> OrientationSnapshot {
        OrientationSnapshot::new(device, interface)
    }

    #[test]
    fn test_portrait_back_camera() {
        let state = RotationState::compute(
            DevicePosition::Back,
            snapshot(DeviceOrientation::Portrait, InterfaceOrientation::Portrait),
        );
        assert_eq!(state, RotationState::default());
    }

    #[test]
    fn test_landscape_mirrors_for_front() {
        let orientation = snapshot(
            DeviceOrientation::LandscapeLeft,
            InterfaceOrientation::LandscapeRight,
        );
        let back = RotationState::compute(DevicePosition::Back, orientation);
        let front = RotationState::compute(DevicePosition::Front, orientation);
        assert_eq!(back.capture_angle, 0.0);
        assert_eq!(back.preview_angle, 0.0);
        assert_eq!(front.capture_angle, 180.0);
        assert_eq!(front.preview_angle, 180.0);
    }

    #[test]
    fn test_flat_device_uses_interface() {
        let state = RotationState::compute(
            DevicePosition::Back,
            snapshot(DeviceOrientation::FaceUp, InterfaceOrientation::LandscapeLeft),
        );
        assert_eq!(state.capture_angle, 180.0);
        assert_eq!(state.preview_angle, 180.0);
    }

    #[test]
    fn test_capture_follows_device_when_interface_locked() {
        let state = RotationState::compute(
            DevicePosition::Back,
            snapshot(DeviceOrientation::PortraitUpsideDown, InterfaceOrientation::Portrait),
        );
        assert_eq!(state.preview_angle, 90.0);
        assert_eq!(state.capture_angle, 270.0);
    }

    #[test]
    fn test_external_never_rotates() {
        let state = RotationState::compute(
            DevicePosition::External,
            snapshot(DeviceOrientation::LandscapeRight, InterfaceOrientation::LandscapeLeft),
        );
        assert_eq!(state.preview_angle, 0.0);
        assert_eq!(state.capture_angle, 0.0);
    }
}
