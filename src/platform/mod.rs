//! The platform boundary.
//!
//! The session coordinator never talks to camera hardware directly. It drives a
//! [`CaptureBackend`] through a fixed operation set: inputs and outputs,
//! configuration batches, device locks, focus/exposure/zoom properties,
//! rotation sinks and delegate-based photo capture. Observation sources are
//! exposed as tokio channels so listeners can be torn down by dropping them.

#[cfg(feature = "native")]
pub mod native;

use crate::capture::settings::{OutputCapabilities, PhotoOutputConfig, PhotoSettings};
use crate::errors::CameraError;
use crate::permissions::PermissionStatus;
use crate::types::{CaptureDevice, DevicePosition, ExposureMode, FocusMode, OrientationSnapshot, Point};
use bytes::Bytes;
use image::DynamicImage;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use uuid::Uuid;

/// A device input created for one capture device.
///
/// Inputs are cheap handles; the backend decides whether one can join the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInput {
    pub id: Uuid,
    pub device_id: String,
}

impl DeviceInput {
    pub fn new(device: &CaptureDevice) -> Self {
        Self {
            id: Uuid::new_v4(),
            device_id: device.id.clone(),
        }
    }
}

/// Metadata attached to a processed photo
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhotoMetadata {
    /// Raw EXIF orientation tag, when present
    pub orientation: Option<u32>,
}

/// The payload delivered by the processing callback.
#[derive(Debug, Clone, Default)]
pub struct CapturedPhoto {
    /// Decoded image representation, if the backend could produce one
    pub image: Option<DynamicImage>,
    /// Encoded file representation (JPEG/HEIF container)
    pub file_data: Option<Bytes>,
    pub metadata: PhotoMetadata,
}

/// Session-level notifications raised by the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeEvent {
    /// The media server was reset and the session has stopped running
    MediaServicesReset,
    InterruptionBegan,
    InterruptionEnded,
    Error(String),
}

/// Receives the life-cycle callbacks of one photo capture.
///
/// The backend calls `will_capture_photo` before the shutter fires, then
/// `did_finish_processing_photo` with the payload, then `did_finish_capture`
/// with the terminal status. Callbacks may arrive on any thread.
pub trait PhotoCaptureDelegate: Send + Sync {
    fn will_capture_photo(&self, settings_id: Uuid);
    fn did_finish_processing_photo(&self, result: Result<CapturedPhoto, CameraError>);
    fn did_finish_capture(&self, error: Option<CameraError>);
}

/// Opaque capability driving camera hardware.
pub trait CaptureBackend: Send + Sync {
    // Authorization
    fn authorization_status(&self) -> PermissionStatus;
    /// Prompt for access; returns the resulting status.
    fn request_access(&self) -> PermissionStatus;

    // Discovery
    fn discover_devices(&self, position: DevicePosition) -> Vec<CaptureDevice>;
    fn set_user_preferred_camera(&self, device: &CaptureDevice);

    // Session topology
    fn begin_configuration(&self);
    fn commit_configuration(&self);
    fn create_input(&self, device: &CaptureDevice) -> Result<DeviceInput, CameraError>;
    fn can_add_input(&self, input: &DeviceInput) -> bool;
    fn add_input(&self, input: &DeviceInput);
    fn remove_input(&self, input: &DeviceInput);
    fn can_add_photo_output(&self) -> bool;
    fn add_photo_output(&self);

    // Running state
    fn start_running(&self);
    fn stop_running(&self);
    fn is_running(&self) -> bool;

    // Device configuration, only valid while the device lock is held
    fn lock_for_configuration(&self, device: &CaptureDevice) -> Result<(), CameraError>;
    fn unlock_for_configuration(&self, device: &CaptureDevice);
    fn set_focus(&self, device: &CaptureDevice, point: Point, mode: FocusMode);
    fn set_exposure(&self, device: &CaptureDevice, point: Point, mode: ExposureMode);
    fn set_subject_area_change_monitoring(&self, device: &CaptureDevice, enabled: bool);
    fn set_zoom_factor(&self, device: &CaptureDevice, factor: f32);

    // Rotation sinks
    fn set_preview_rotation(&self, angle: f64);
    fn set_capture_rotation(&self, angle: f64);

    // Photo output
    fn photo_output_capabilities(&self) -> OutputCapabilities;
    fn configure_photo_output(&self, config: &PhotoOutputConfig);
    fn capture_photo(&self, settings: PhotoSettings, delegate: Arc<dyn PhotoCaptureDelegate>);

    // Observation sources
    fn orientation_updates(&self) -> watch::Receiver<OrientationSnapshot>;
    fn subject_area_changes(&self, device: &CaptureDevice) -> broadcast::Receiver<()>;
    fn runtime_events(&self) -> broadcast::Receiver<RuntimeEvent>;
}

/// Brackets session topology changes in a begin/commit pair.
///
/// The commit runs when the guard drops, on every exit path.
pub struct ConfigurationBatch<'a> {
    backend: &'a dyn CaptureBackend,
}

impl<'a> ConfigurationBatch<'a> {
    pub fn begin(backend: &'a dyn CaptureBackend) -> Self {
        backend.begin_configuration();
        Self { backend }
    }
}

impl Drop for ConfigurationBatch<'_> {
    fn drop(&mut self) {
        self.backend.commit_configuration();
    }
}

/// Exclusive configuration lock on one device, released on drop.
pub struct DeviceLock<'a> {
    backend: &'a dyn CaptureBackend,
    device: &'a CaptureDevice,
}

impl<'a> DeviceLock<'a> {
    pub fn acquire(
        backend: &'a dyn CaptureBackend,
        device: &'a CaptureDevice,
    ) -> Result<Self, CameraError> {
        backend.lock_for_configuration(device)?;
        Ok(Self { backend, device })
    }

    pub fn device(&self) -> &CaptureDevice {
        self.device
    }
}

impl Drop for DeviceLock<'_> {
    fn drop(&mut self) {
        self.backend.unlock_for_configuration(self.device);
    }
}
