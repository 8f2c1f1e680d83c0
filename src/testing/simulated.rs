//! In-process capture backend.
//!
//! `SimulatedBackend` behaves like a single-input phone camera session and
//! records every call made against it. Faults can be injected per device or
//! per capture so failure paths are reachable without hardware.

use super::synthetic_data::{encode_jpeg, synthetic_photo, SimulatedCameraProfile};
use crate::capture::{OutputCapabilities, PhotoCodec, PhotoOutputConfig, PhotoSettings, PreviewPixelFormat};
use crate::errors::CameraError;
use crate::permissions::PermissionStatus;
use crate::platform::{
    CaptureBackend, CapturedPhoto, DeviceInput, PhotoCaptureDelegate, PhotoMetadata, RuntimeEvent,
};
use crate::types::{
    CaptureDevice, DeviceOrientation, DevicePosition, ExposureMode, FocusMode, InterfaceOrientation,
    OrientationSnapshot, Point,
};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{broadcast, watch};
use uuid::Uuid;

/// How the next capture request plays out
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureScript {
    /// All three callbacks, with a synthetic image
    Success,
    /// Processing reports an error
    ProcessingError(String),
    /// Processing succeeds without an image representation
    MissingImage,
    /// Processing succeeds without an orientation tag
    MissingOrientation,
    /// Processing succeeds with the given out-of-range orientation tag
    UnknownOrientation(u32),
    /// Processing succeeds, then the finish callback reports an error
    SuccessThenFinishError(String),
    /// Only the finish callback fires
    FinishOnly,
    /// The delegate is dropped without a single callback
    Abandon,
    /// The delegate is held until `complete_deferred`
    Deferred,
}

/// Everything the session asked the backend to do
#[derive(Debug, Clone, Default)]
pub struct BackendCalls {
    pub access_requests: usize,
    pub configuration_batches: usize,
    pub open_batches: usize,
    pub inputs_added: Vec<String>,
    pub inputs_removed: Vec<String>,
    pub outputs_added: usize,
    pub preferred_camera: Option<String>,
    pub start_running: usize,
    pub locks: usize,
    pub unlocks: usize,
    /// Device property writes made without holding the device lock
    pub unlocked_writes: usize,
    pub focus: Vec<(String, Point, FocusMode)>,
    pub exposure: Vec<(String, Point, ExposureMode)>,
    pub subject_area_monitoring: Vec<(String, bool)>,
    pub zoom_factors: Vec<f32>,
    pub preview_rotations: Vec<f64>,
    pub capture_rotations: Vec<f64>,
    pub output_configs: Vec<PhotoOutputConfig>,
    pub captures: Vec<PhotoSettings>,
}

struct SimulatedState {
    authorization: PermissionStatus,
    access_result: PermissionStatus,
    devices: Vec<CaptureDevice>,
    session_inputs: Vec<DeviceInput>,
    rejected_devices: HashSet<String>,
    unavailable_devices: HashSet<String>,
    refuse_output: bool,
    fail_lock: bool,
    locked: HashSet<String>,
    running: bool,
    output_capabilities: OutputCapabilities,
    capture_scripts: VecDeque<CaptureScript>,
    capture_orientation: u32,
    deferred: Vec<(PhotoSettings, Arc<dyn PhotoCaptureDelegate>)>,
    frames: u64,
    calls: BackendCalls,
}

/// A scriptable backend for tests and the demo CLI.
pub struct SimulatedBackend {
    state: Mutex<SimulatedState>,
    orientation: watch::Sender<OrientationSnapshot>,
    runtime: broadcast::Sender<RuntimeEvent>,
    subject_area: Mutex<HashMap<String, broadcast::Sender<()>>>,
}

impl Default for SimulatedBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedBackend {
    /// A backend with no devices, authorized, portrait orientation
    pub fn new() -> Self {
        let (orientation, _) = watch::channel(OrientationSnapshot::new(
            DeviceOrientation::Portrait,
            InterfaceOrientation::Portrait,
        ));
        let (runtime, _) = broadcast::channel(16);

        Self {
            state: Mutex::new(SimulatedState {
                authorization: PermissionStatus::Granted,
                access_result: PermissionStatus::Granted,
                devices: Vec::new(),
                session_inputs: Vec::new(),
                rejected_devices: HashSet::new(),
                unavailable_devices: HashSet::new(),
                refuse_output: false,
                fail_lock: false,
                locked: HashSet::new(),
                running: false,
                output_capabilities: OutputCapabilities {
                    available_codecs: vec![PhotoCodec::Jpeg, PhotoCodec::Hevc],
                    preview_pixel_formats: vec![PreviewPixelFormat::Bgra8, PreviewPixelFormat::Nv12],
                    responsive_capture_supported: true,
                    fast_capture_prioritization_supported: true,
                },
                capture_scripts: VecDeque::new(),
                capture_orientation: 6,
                deferred: Vec::new(),
                frames: 0,
                calls: BackendCalls::default(),
            }),
            orientation,
            runtime,
            subject_area: Mutex::new(HashMap::new()),
        }
    }

    /// Back and front cameras from the default profile
    pub fn with_standard_devices() -> Self {
        let backend = Self::new();
        let profile = SimulatedCameraProfile::default();
        backend.add_device(profile.back_camera());
        backend.add_device(profile.front_camera());
        backend
    }

    fn state(&self) -> MutexGuard<'_, SimulatedState> {
        // A panicking test thread must not hide the recorded calls from others.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn add_device(&self, device: CaptureDevice) {
        self.state().devices.push(device);
    }

    pub fn remove_device(&self, device_id: &str) {
        self.state().devices.retain(|d| d.id != device_id);
    }

    pub fn set_authorization(&self, status: PermissionStatus, request_result: PermissionStatus) {
        let mut state = self.state();
        state.authorization = status;
        state.access_result = request_result;
    }

    /// Inputs for this device are created but refused by the session
    pub fn reject_input_for(&self, device_id: &str) {
        self.state().rejected_devices.insert(device_id.to_string());
    }

    /// Creating an input for this device fails outright
    pub fn make_unavailable(&self, device_id: &str) {
        self.state().unavailable_devices.insert(device_id.to_string());
    }

    pub fn refuse_output(&self) {
        self.state().refuse_output = true;
    }

    pub fn set_lock_failure(&self, fail: bool) {
        self.state().fail_lock = fail;
    }

    pub fn set_output_capabilities(&self, capabilities: OutputCapabilities) {
        self.state().output_capabilities = capabilities;
    }

    /// EXIF orientation attached to successful captures
    pub fn set_capture_orientation(&self, orientation: u32) {
        self.state().capture_orientation = orientation;
    }

    /// Queue the behaviour of an upcoming capture; unscripted captures succeed
    pub fn script_capture(&self, script: CaptureScript) {
        self.state().capture_scripts.push_back(script);
    }

    pub fn set_orientation(&self, device: DeviceOrientation, interface: InterfaceOrientation) {
        self.orientation
            .send_replace(OrientationSnapshot::new(device, interface));
    }

    /// Signal a subject area change on one device
    pub fn emit_subject_area_change(&self, device_id: &str) {
        if let Some(sender) = self.subject_area_sender(device_id, false) {
            let _ = sender.send(());
        }
    }

    pub fn emit_runtime_event(&self, event: RuntimeEvent) {
        let _ = self.runtime.send(event);
    }

    /// The media server resets: the session stops and the event fires
    pub fn simulate_media_reset(&self) {
        self.state().running = false;
        self.emit_runtime_event(RuntimeEvent::MediaServicesReset);
    }

    /// Number of receivers still listening for subject area changes on a device
    pub fn subject_area_listeners(&self, device_id: &str) -> usize {
        self.subject_area_sender(device_id, false)
            .map(|sender| sender.receiver_count())
            .unwrap_or(0)
    }

    /// Device ids of the inputs currently attached
    pub fn session_inputs(&self) -> Vec<String> {
        self.state()
            .session_inputs
            .iter()
            .map(|input| input.device_id.clone())
            .collect()
    }

    pub fn calls(&self) -> BackendCalls {
        self.state().calls.clone()
    }

    pub fn deferred_captures(&self) -> Vec<Uuid> {
        self.state().deferred.iter().map(|(settings, _)| settings.id).collect()
    }

    /// Run a deferred capture to success. Returns false when no such capture is held.
    pub fn complete_deferred(&self, settings_id: Uuid) -> bool {
        let held = {
            let mut state = self.state();
            let index = state.deferred.iter().position(|(s, _)| s.id == settings_id);
            index.map(|i| state.deferred.remove(i))
        };
        match held {
            Some((settings, delegate)) => {
                self.run_script(CaptureScript::Success, &settings, delegate);
                true
            }
            None => false,
        }
    }

    fn subject_area_sender(&self, device_id: &str, create: bool) -> Option<broadcast::Sender<()>> {
        let mut senders = self
            .subject_area
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if create {
            Some(
                senders
                    .entry(device_id.to_string())
                    .or_insert_with(|| broadcast::channel(8).0)
                    .clone(),
            )
        } else {
            senders.get(device_id).cloned()
        }
    }

    fn record_device_write(&self, device: &CaptureDevice) -> MutexGuard<'_, SimulatedState> {
        let mut state = self.state();
        if !state.locked.contains(&device.id) {
            state.calls.unlocked_writes += 1;
        }
        state
    }

    fn synthetic_capture(&self, orientation: Option<u32>, with_image: bool) -> CapturedPhoto {
        let frame = {
            let mut state = self.state();
            state.frames += 1;
            state.frames
        };
        let image = synthetic_photo(frame, 64, 48);
        CapturedPhoto {
            file_data: encode_jpeg(&image),
            image: with_image.then_some(image),
            metadata: PhotoMetadata { orientation },
        }
    }

    fn run_script(
        &self,
        script: CaptureScript,
        settings: &PhotoSettings,
        delegate: Arc<dyn PhotoCaptureDelegate>,
    ) {
        let orientation = self.state().capture_orientation;

        match script {
            CaptureScript::Abandon => {
                log::debug!("Simulated capture {} abandoned", settings.id);
            }
            CaptureScript::Deferred => {
                self.state().deferred.push((settings.clone(), delegate));
            }
            CaptureScript::FinishOnly => {
                delegate.will_capture_photo(settings.id);
                delegate.did_finish_capture(None);
            }
            CaptureScript::ProcessingError(message) => {
                delegate.will_capture_photo(settings.id);
                delegate.did_finish_processing_photo(Err(CameraError::Backend(message.clone())));
                delegate.did_finish_capture(Some(CameraError::Backend(message)));
            }
            CaptureScript::Success
            | CaptureScript::MissingImage
            | CaptureScript::MissingOrientation
            | CaptureScript::UnknownOrientation(_)
            | CaptureScript::SuccessThenFinishError(_) => {
                let payload = match &script {
                    CaptureScript::MissingImage => self.synthetic_capture(Some(orientation), false),
                    CaptureScript::MissingOrientation => self.synthetic_capture(None, true),
                    CaptureScript::UnknownOrientation(tag) => self.synthetic_capture(Some(*tag), true),
                    _ => self.synthetic_capture(Some(orientation), true),
                };
                let finish_error = match script {
                    CaptureScript::SuccessThenFinishError(message) => {
                        Some(CameraError::Backend(message))
                    }
                    _ => None,
                };

                delegate.will_capture_photo(settings.id);
                delegate.did_finish_processing_photo(Ok(payload));
                delegate.did_finish_capture(finish_error);
            }
        }
    }
}

impl CaptureBackend for SimulatedBackend {
    fn authorization_status(&self) -> PermissionStatus {
        self.state().authorization
    }

    fn request_access(&self) -> PermissionStatus {
        let mut state = self.state();
        state.calls.access_requests += 1;
        state.authorization = state.access_result;
        state.authorization
    }

    fn discover_devices(&self, position: DevicePosition) -> Vec<CaptureDevice> {
        self.state()
            .devices
            .iter()
            .filter(|d| d.position == position)
            .cloned()
            .collect()
    }

    fn set_user_preferred_camera(&self, device: &CaptureDevice) {
        self.state().calls.preferred_camera = Some(device.id.clone());
    }

    fn begin_configuration(&self) {
        let mut state = self.state();
        state.calls.configuration_batches += 1;
        state.calls.open_batches += 1;
    }

    fn commit_configuration(&self) {
        let mut state = self.state();
        state.calls.open_batches = state.calls.open_batches.saturating_sub(1);
    }

    fn create_input(&self, device: &CaptureDevice) -> Result<DeviceInput, CameraError> {
        if self.state().unavailable_devices.contains(&device.id) {
            return Err(CameraError::Backend(format!("{} is in use", device.name)));
        }
        Ok(DeviceInput::new(device))
    }

    fn can_add_input(&self, input: &DeviceInput) -> bool {
        let state = self.state();
        // One camera input per session
        state.session_inputs.is_empty() && !state.rejected_devices.contains(&input.device_id)
    }

    fn add_input(&self, input: &DeviceInput) {
        let mut state = self.state();
        state.session_inputs.push(input.clone());
        state.calls.inputs_added.push(input.device_id.clone());
    }

    fn remove_input(&self, input: &DeviceInput) {
        let mut state = self.state();
        state.session_inputs.retain(|i| i.id != input.id);
        state.calls.inputs_removed.push(input.device_id.clone());
    }

    fn can_add_photo_output(&self) -> bool {
        let state = self.state();
        !state.refuse_output && state.calls.outputs_added == 0
    }

    fn add_photo_output(&self) {
        self.state().calls.outputs_added += 1;
    }

    fn start_running(&self) {
        let mut state = self.state();
        state.running = true;
        state.calls.start_running += 1;
    }

    fn stop_running(&self) {
        self.state().running = false;
    }

    fn is_running(&self) -> bool {
        self.state().running
    }

    fn lock_for_configuration(&self, device: &CaptureDevice) -> Result<(), CameraError> {
        let mut state = self.state();
        if state.fail_lock {
            return Err(CameraError::LockFailed(format!("{} is busy", device.name)));
        }
        state.locked.insert(device.id.clone());
        state.calls.locks += 1;
        Ok(())
    }

    fn unlock_for_configuration(&self, device: &CaptureDevice) {
        let mut state = self.state();
        state.locked.remove(&device.id);
        state.calls.unlocks += 1;
    }

    fn set_focus(&self, device: &CaptureDevice, point: Point, mode: FocusMode) {
        self.record_device_write(device)
            .calls
            .focus
            .push((device.id.clone(), point, mode));
    }

    fn set_exposure(&self, device: &CaptureDevice, point: Point, mode: ExposureMode) {
        self.record_device_write(device)
            .calls
            .exposure
            .push((device.id.clone(), point, mode));
    }

    fn set_subject_area_change_monitoring(&self, device: &CaptureDevice, enabled: bool) {
        self.record_device_write(device)
            .calls
            .subject_area_monitoring
            .push((device.id.clone(), enabled));
    }

    fn set_zoom_factor(&self, device: &CaptureDevice, factor: f32) {
        self.record_device_write(device).calls.zoom_factors.push(factor);
    }

    fn set_preview_rotation(&self, angle: f64) {
        self.state().calls.preview_rotations.push(angle);
    }

    fn set_capture_rotation(&self, angle: f64) {
        self.state().calls.capture_rotations.push(angle);
    }

    fn photo_output_capabilities(&self) -> OutputCapabilities {
        self.state().output_capabilities.clone()
    }

    fn configure_photo_output(&self, config: &PhotoOutputConfig) {
        self.state().calls.output_configs.push(*config);
    }

    fn capture_photo(&self, settings: PhotoSettings, delegate: Arc<dyn PhotoCaptureDelegate>) {
        let script = {
            let mut state = self.state();
            state.calls.captures.push(settings.clone());
            state.capture_scripts.pop_front().unwrap_or(CaptureScript::Success)
        };
        self.run_script(script, &settings, delegate);
    }

    fn orientation_updates(&self) -> watch::Receiver<OrientationSnapshot> {
        self.orientation.subscribe()
    }

    fn subject_area_changes(&self, device: &CaptureDevice) -> broadcast::Receiver<()> {
        match self.subject_area_sender(&device.id, true) {
            Some(sender) => sender.subscribe(),
            None => broadcast::channel(1).1,
        }
    }

    fn runtime_events(&self) -> broadcast::Receiver<RuntimeEvent> {
        self.runtime.subscribe()
    }
}
