//! Hardware backend built on nokhwa.
//!
//! nokhwa exposes plain video devices, so every camera is reported as an
//! external device with a fixed 1x zoom and no focus or exposure points of
//! interest. A photo is the next frame polled from the open stream.

use crate::capture::{OutputCapabilities, PhotoCodec, PhotoOutputConfig, PhotoSettings, PreviewPixelFormat};
use crate::errors::CameraError;
use crate::permissions::PermissionStatus;
use crate::platform::{
    CaptureBackend, CapturedPhoto, DeviceInput, PhotoCaptureDelegate, PhotoMetadata, RuntimeEvent,
};
use crate::types::{
    CaptureDevice, DeviceCapabilities, DevicePosition, ExposureMode, FocusMode, OrientationSnapshot,
    PhotoDimensions, Point,
};
use bytes::Bytes;
use image::{DynamicImage, ImageFormat, RgbImage};
use nokhwa::{
    pixel_format::RgbFormat,
    query,
    utils::{ApiBackend, CameraIndex, RequestedFormat, RequestedFormatType},
    CallbackCamera,
};
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{broadcast, watch};
use uuid::Uuid;

type SharedCamera = Arc<Mutex<CallbackCamera>>;

struct AttachedInput {
    input_id: Uuid,
    camera: SharedCamera,
}

#[derive(Default)]
struct NativeState {
    /// Cameras opened by `create_input` but not yet attached
    pending: HashMap<Uuid, SharedCamera>,
    active: Option<AttachedInput>,
    running: bool,
    output_added: bool,
}

/// Drives real cameras through nokhwa's callback camera.
pub struct NativeBackend {
    state: Mutex<NativeState>,
    orientation: watch::Sender<OrientationSnapshot>,
    runtime: broadcast::Sender<RuntimeEvent>,
    subject_area: broadcast::Sender<()>,
}

impl Default for NativeBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl NativeBackend {
    pub fn new() -> Self {
        let (orientation, _) = watch::channel(OrientationSnapshot::default());
        let (runtime, _) = broadcast::channel(16);
        let (subject_area, _) = broadcast::channel(1);
        Self {
            state: Mutex::new(NativeState::default()),
            orientation,
            runtime,
            subject_area,
        }
    }

    fn state(&self) -> MutexGuard<'_, NativeState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn report(&self, error: CameraError) {
        log::error!("{}", error);
        let _ = self.runtime.send(RuntimeEvent::Error(error.to_string()));
    }
}

fn open_camera(index: u32) -> Result<CallbackCamera, CameraError> {
    let requested_format = RequestedFormat::new::<RgbFormat>(RequestedFormatType::None);
    CallbackCamera::new(CameraIndex::Index(index), requested_format, |_| {})
        .map_err(|e| CameraError::Backend(format!("Failed to open camera {}: {}", index, e)))
}

fn with_camera<T>(
    camera: &SharedCamera,
    f: impl FnOnce(&mut CallbackCamera) -> Result<T, nokhwa::NokhwaError>,
) -> Result<T, CameraError> {
    let mut camera = camera
        .lock()
        .map_err(|_| CameraError::Backend("Failed to lock camera".to_string()))?;
    f(&mut camera).map_err(|e| CameraError::Backend(e.to_string()))
}

/// Poll one frame and convert it into a delegate payload.
fn grab_photo(camera: &SharedCamera) -> Result<CapturedPhoto, CameraError> {
    let (width, height, raw) = with_camera(camera, |camera| {
        let frame = camera.poll_frame()?;
        let resolution = frame.resolution();
        let decoded = frame.decode_image::<RgbFormat>()?;
        Ok((resolution.width_x, resolution.height_y, decoded.into_raw()))
    })?;

    let image = RgbImage::from_raw(width, height, raw)
        .map(DynamicImage::ImageRgb8)
        .ok_or_else(|| CameraError::Backend("Frame size does not match its resolution".to_string()))?;

    let mut encoded = Cursor::new(Vec::new());
    let file_data = match image.write_to(&mut encoded, ImageFormat::Jpeg) {
        Ok(()) => Some(Bytes::from(encoded.into_inner())),
        Err(e) => {
            log::warn!("Failed to encode captured frame: {}", e);
            None
        }
    };

    Ok(CapturedPhoto {
        image: Some(image),
        file_data,
        // Frames come off the sensor upright
        metadata: PhotoMetadata { orientation: Some(1) },
    })
}

impl CaptureBackend for NativeBackend {
    fn authorization_status(&self) -> PermissionStatus {
        PermissionStatus::Granted
    }

    fn request_access(&self) -> PermissionStatus {
        PermissionStatus::Granted
    }

    fn discover_devices(&self, position: DevicePosition) -> Vec<CaptureDevice> {
        if position != DevicePosition::External {
            return Vec::new();
        }

        match query(ApiBackend::Auto) {
            Ok(cameras) => cameras
                .into_iter()
                .map(|info| {
                    CaptureDevice::new(info.index().to_string(), info.human_name(), position)
                        .with_capabilities(
                            DeviceCapabilities::default()
                                .with_zoom_range(1.0, 1.0)
                                .with_photo_dimensions(vec![PhotoDimensions::new(1920, 1080)])
                                .with_points_of_interest(false, false),
                        )
                })
                .collect(),
            Err(e) => {
                log::warn!("Failed to query cameras: {}", e);
                Vec::new()
            }
        }
    }

    fn set_user_preferred_camera(&self, device: &CaptureDevice) {
        log::debug!("Preferred camera is now {}", device.name);
    }

    fn begin_configuration(&self) {}

    fn commit_configuration(&self) {}

    fn create_input(&self, device: &CaptureDevice) -> Result<DeviceInput, CameraError> {
        let index = device
            .id
            .parse::<u32>()
            .map_err(|_| CameraError::Backend(format!("Invalid device ID {}", device.id)))?;
        let camera = open_camera(index)?;

        let input = DeviceInput::new(device);
        self.state()
            .pending
            .insert(input.id, Arc::new(Mutex::new(camera)));
        Ok(input)
    }

    fn can_add_input(&self, input: &DeviceInput) -> bool {
        let state = self.state();
        state.active.is_none() && state.pending.contains_key(&input.id)
    }

    fn add_input(&self, input: &DeviceInput) {
        let mut state = self.state();
        let Some(camera) = state.pending.remove(&input.id) else {
            log::warn!("No opened camera for input {}", input.id);
            return;
        };
        let running = state.running;
        state.active = Some(AttachedInput {
            input_id: input.id,
            camera: Arc::clone(&camera),
        });
        drop(state);

        if running {
            if let Err(e) = with_camera(&camera, |c| c.open_stream()) {
                self.report(e);
            }
        }
    }

    fn remove_input(&self, input: &DeviceInput) {
        let mut state = self.state();
        let detached = match &state.active {
            Some(active) if active.input_id == input.id => state.active.take(),
            _ => None,
        };
        drop(state);

        if let Some(detached) = detached {
            // Keep the camera reusable in case the input is re-added.
            if let Err(e) = with_camera(&detached.camera, |c| c.stop_stream()) {
                log::debug!("Stopping detached camera: {}", e);
            }
            self.state().pending.insert(input.id, detached.camera);
        }
    }

    fn can_add_photo_output(&self) -> bool {
        !self.state().output_added
    }

    fn add_photo_output(&self) {
        self.state().output_added = true;
    }

    fn start_running(&self) {
        let camera = {
            let mut state = self.state();
            state.running = true;
            state.active.as_ref().map(|active| Arc::clone(&active.camera))
        };
        if let Some(camera) = camera {
            if let Err(e) = with_camera(&camera, |c| c.open_stream()) {
                self.state().running = false;
                self.report(e);
            }
        }
    }

    fn stop_running(&self) {
        let camera = {
            let mut state = self.state();
            state.running = false;
            state.active.as_ref().map(|active| Arc::clone(&active.camera))
        };
        if let Some(camera) = camera {
            if let Err(e) = with_camera(&camera, |c| c.stop_stream()) {
                log::warn!("Failed to stop stream: {}", e);
            }
        }
    }

    fn is_running(&self) -> bool {
        self.state().running
    }

    fn lock_for_configuration(&self, _device: &CaptureDevice) -> Result<(), CameraError> {
        Ok(())
    }

    fn unlock_for_configuration(&self, _device: &CaptureDevice) {}

    fn set_focus(&self, device: &CaptureDevice, _point: Point, mode: FocusMode) {
        log::debug!("{} has no focus point control ({:?} ignored)", device.name, mode);
    }

    fn set_exposure(&self, device: &CaptureDevice, _point: Point, mode: ExposureMode) {
        log::debug!("{} has no exposure point control ({:?} ignored)", device.name, mode);
    }

    fn set_subject_area_change_monitoring(&self, _device: &CaptureDevice, _enabled: bool) {}

    fn set_zoom_factor(&self, device: &CaptureDevice, factor: f32) {
        if factor != 1.0 {
            log::debug!("{} has fixed zoom, ignoring {}x", device.name, factor);
        }
    }

    fn set_preview_rotation(&self, _angle: f64) {}

    fn set_capture_rotation(&self, _angle: f64) {}

    fn photo_output_capabilities(&self) -> OutputCapabilities {
        OutputCapabilities {
            available_codecs: vec![PhotoCodec::Jpeg],
            preview_pixel_formats: vec![PreviewPixelFormat::Rgb8],
            responsive_capture_supported: false,
            fast_capture_prioritization_supported: false,
        }
    }

    fn configure_photo_output(&self, config: &PhotoOutputConfig) {
        log::debug!("Photo output limited to {}", config.max_photo_dimensions);
    }

    fn capture_photo(&self, settings: PhotoSettings, delegate: Arc<dyn PhotoCaptureDelegate>) {
        let camera = self
            .state()
            .active
            .as_ref()
            .map(|active| Arc::clone(&active.camera));

        // Polling blocks until the next frame arrives.
        std::thread::spawn(move || {
            delegate.will_capture_photo(settings.id);
            let result = match camera {
                Some(camera) => grab_photo(&camera),
                None => Err(CameraError::NotRunning),
            };
            let finish_error = result.as_ref().err().cloned();
            delegate.did_finish_processing_photo(result);
            delegate.did_finish_capture(finish_error);
        });
    }

    fn orientation_updates(&self) -> watch::Receiver<OrientationSnapshot> {
        self.orientation.subscribe()
    }

    fn subject_area_changes(&self, _device: &CaptureDevice) -> broadcast::Receiver<()> {
        self.subject_area.subscribe()
    }

    fn runtime_events(&self) -> broadcast::Receiver<RuntimeEvent> {
        self.runtime.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opener_yields_callback_camera() {
        let _opener: fn(u32) -> Result<CallbackCamera, CameraError> = open_camera;
    }

    #[test]
    fn test_non_numeric_device_id_is_rejected() {
        let backend = NativeBackend::new();
        let device = CaptureDevice::new("usb-cam", "USB Camera", DevicePosition::External);

        let err = backend.create_input(&device).unwrap_err();
        assert!(matches!(err, CameraError::Backend(ref reason) if reason.contains("usb-cam")));
        assert!(backend.state().pending.is_empty());
    }

    #[test]
    fn test_authorization_is_always_granted() {
        let backend = NativeBackend::new();
        assert_eq!(backend.authorization_status(), PermissionStatus::Granted);
        assert!(!backend.is_running());
    }
}
