//! Device discovery.

use crate::errors::CameraError;
use crate::platform::CaptureBackend;
use crate::types::{CaptureDevice, DevicePosition};
use std::sync::Arc;

/// Fixed priority order used both for listing and for cyclic switching.
const DEVICE_ORDER: [DevicePosition; 3] = [
    DevicePosition::Back,
    DevicePosition::Front,
    DevicePosition::External,
];

/// Looks up capture devices fresh from the backend on every query.
#[derive(Clone)]
pub struct DeviceCatalog {
    backend: Arc<dyn CaptureBackend>,
}

impl DeviceCatalog {
    pub fn new(backend: Arc<dyn CaptureBackend>) -> Self {
        Self { backend }
    }

    fn first_at(&self, position: DevicePosition) -> Option<CaptureDevice> {
        self.backend.discover_devices(position).into_iter().next()
    }

    /// The device to start with: front when preferred and present, else back,
    /// else any external camera.
    pub fn default_device(&self, prefer_front: bool) -> Result<CaptureDevice, CameraError> {
        let preferred = if prefer_front {
            self.first_at(DevicePosition::Front)
        } else {
            None
        };

        preferred
            .or_else(|| self.first_at(DevicePosition::Back))
            .or_else(|| self.first_at(DevicePosition::External))
            .ok_or(CameraError::DeviceUnavailable)
    }

    /// One device per position: back, then front, then external.
    pub fn list_devices(&self) -> Vec<CaptureDevice> {
        let devices: Vec<CaptureDevice> = DEVICE_ORDER
            .iter()
            .filter_map(|position| self.first_at(*position))
            .collect();

        if devices.is_empty() {
            log::warn!("No camera devices found on this system");
        }
        devices
    }

    /// The device after `current` in list order, wrapping at the end.
    ///
    /// A current device missing from the list is treated as index 0.
    pub fn next_device(&self, current: &CaptureDevice) -> Option<CaptureDevice> {
        let devices = self.list_devices();
        next_in_cycle(&devices, current).cloned()
    }
}

pub(crate) fn next_in_cycle<'a>(
    devices: &'a [CaptureDevice],
    current: &CaptureDevice,
) -> Option<&'a CaptureDevice> {
    if devices.is_empty() {
        return None;
    }
    let selected = devices
        .iter()
        .position(|d| d.same_device(current))
        .unwrap_or(0);
    devices.get((selected + 1) % devices.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::SimulatedBackend;

    fn catalog(backend: SimulatedBackend) -> DeviceCatalog {
        DeviceCatalog::new(Arc::new(backend))
    }

    #[test]
    fn test_default_prefers_front_when_asked() {
        let backend = SimulatedBackend::with_standard_devices();
        let catalog = catalog(backend);
        assert_eq!(catalog.default_device(true).unwrap().position, DevicePosition::Front);
        assert_eq!(catalog.default_device(false).unwrap().position, DevicePosition::Back);
    }

    #[test]
    fn test_default_falls_back_to_back_then_external() {
        let backend = SimulatedBackend::new();
        backend.add_device(CaptureDevice::new("usb", "USB Camera", DevicePosition::External));
        let catalog = catalog(backend);
        assert_eq!(catalog.default_device(true).unwrap().id, "usb");
    }

    #[test]
    fn test_no_devices_is_unavailable() {
        let catalog = catalog(SimulatedBackend::new());
        assert_eq!(catalog.default_device(false), Err(CameraError::DeviceUnavailable));
        assert!(catalog.list_devices().is_empty());
    }

    #[test]
    fn test_list_order_is_fixed() {
        let backend = SimulatedBackend::new();
        backend.add_device(CaptureDevice::new("usb", "USB", DevicePosition::External));
        backend.add_device(CaptureDevice::new("front", "Front", DevicePosition::Front));
        backend.add_device(CaptureDevice::new("back", "Back", DevicePosition::Back));
        backend.add_device(CaptureDevice::new("back-2", "Back 2", DevicePosition::Back));

        let ids: Vec<String> = catalog(backend).list_devices().into_iter().map(|d| d.id).collect();
        assert_eq!(ids, vec!["back", "front", "usb"]);
    }

    #[test]
    fn test_next_wraps_and_handles_unknown() {
        let devices = vec![
            CaptureDevice::new("back", "Back", DevicePosition::Back),
            CaptureDevice::new("front", "Front", DevicePosition::Front),
        ];
        assert_eq!(next_in_cycle(&devices, &devices[0]).unwrap().id, "front");
        assert_eq!(next_in_cycle(&devices, &devices[1]).unwrap().id, "back");

        let gone = CaptureDevice::new("unplugged", "USB", DevicePosition::External);
        assert_eq!(next_in_cycle(&devices, &gone).unwrap().id, "front");
        assert!(next_in_cycle(&[], &gone).is_none());
    }
}
