//! Capture session coordination.
//!
//! [`SessionCoordinator`] owns the single capture session: the active device
//! input, the photo output configuration, rotation state and zoom state. Every
//! mutating operation runs while holding one async mutex, so a device switch
//! can never interleave with a zoom step or a focus change on the same
//! hardware.

pub(crate) mod listeners;
pub mod rotation;
pub mod zoom;

pub use rotation::RotationState;
pub use zoom::{ZoomState, SMOOTH_ZOOM_STEPS};

use crate::capture::{
    CaptureActivity, CaptureRequestBroker, Photo, PhotoOutputConfig, PhotoSettings,
};
use crate::catalog::{next_in_cycle, DeviceCatalog};
use crate::config::PhotoCameraConfig;
use crate::errors::CameraError;
use crate::platform::{
    CaptureBackend, ConfigurationBatch, DeviceInput, DeviceLock, RuntimeEvent,
};
use crate::types::{CaptureDevice, ExposureMode, FocusMode, Point};
use listeners::{DeviceListeners, ListenerTask};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch, Mutex};

/// Life cycle of the capture session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    NotConfigured,
    Configuring,
    Running,
    Switching,
    /// Setup failed; the session cannot be used again
    Failed,
}

/// Notifications raised by the session outside of any caller's request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Interrupted,
    InterruptionEnded,
    /// The session was restarted after a media services reset
    Restarted,
    RuntimeError(String),
}

struct SessionInner {
    state: SessionState,
    active_device: Option<CaptureDevice>,
    active_input: Option<DeviceInput>,
    rotation: RotationState,
    zoom: ZoomState,
    /// False until `zoom.current` has been written to the active device
    zoom_synced: bool,
    output: PhotoOutputConfig,
    listeners: DeviceListeners,
    runtime_listener: Option<ListenerTask>,
}

impl SessionInner {
    fn new() -> Self {
        Self {
            state: SessionState::NotConfigured,
            active_device: None,
            active_input: None,
            rotation: RotationState::default(),
            zoom: ZoomState::default(),
            zoom_synced: false,
            output: PhotoOutputConfig::default(),
            listeners: DeviceListeners::default(),
            runtime_listener: None,
        }
    }

    fn running_device(&self) -> Result<&CaptureDevice, CameraError> {
        if self.state != SessionState::Running {
            return Err(CameraError::NotRunning);
        }
        self.active_device.as_ref().ok_or(CameraError::NotRunning)
    }

    fn is_active(&self, device_id: &str) -> bool {
        self.active_device
            .as_ref()
            .is_some_and(|device| device.id == device_id)
    }
}

/// Serializes every operation on the capture session.
#[derive(Clone)]
pub struct SessionCoordinator {
    backend: Arc<dyn CaptureBackend>,
    catalog: DeviceCatalog,
    config: Arc<PhotoCameraConfig>,
    inner: Arc<Mutex<SessionInner>>,
    broker: CaptureRequestBroker,
    activity: broadcast::Sender<CaptureActivity>,
    events: broadcast::Sender<SessionEvent>,
    zoom_tx: Arc<watch::Sender<ZoomState>>,
    device_tx: Arc<watch::Sender<Option<CaptureDevice>>>,
    zoom_generation: Arc<AtomicU64>,
}

impl SessionCoordinator {
    pub fn new(backend: Arc<dyn CaptureBackend>, config: PhotoCameraConfig) -> Self {
        let (activity, _) = broadcast::channel(16);
        let (events, _) = broadcast::channel(16);
        let (zoom_tx, _) = watch::channel(ZoomState::default());
        let (device_tx, _) = watch::channel(None);

        Self {
            catalog: DeviceCatalog::new(Arc::clone(&backend)),
            broker: CaptureRequestBroker::new(Arc::clone(&backend), activity.clone()),
            backend,
            config: Arc::new(config),
            inner: Arc::new(Mutex::new(SessionInner::new())),
            activity,
            events,
            zoom_tx: Arc::new(zoom_tx),
            device_tx: Arc::new(device_tx),
            zoom_generation: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn config(&self) -> &PhotoCameraConfig {
        &self.config
    }

    pub fn backend(&self) -> &Arc<dyn CaptureBackend> {
        &self.backend
    }

    pub fn catalog(&self) -> &DeviceCatalog {
        &self.catalog
    }

    pub async fn state(&self) -> SessionState {
        self.inner.lock().await.state
    }

    pub async fn active_device(&self) -> Option<CaptureDevice> {
        self.inner.lock().await.active_device.clone()
    }

    pub async fn zoom_state(&self) -> ZoomState {
        self.inner.lock().await.zoom.clone()
    }

    pub async fn rotation(&self) -> RotationState {
        self.inner.lock().await.rotation
    }

    pub async fn output_config(&self) -> PhotoOutputConfig {
        self.inner.lock().await.output
    }

    /// Whether per-device listeners are currently installed and alive
    pub async fn listeners_active(&self) -> bool {
        self.inner.lock().await.listeners.is_active()
    }

    pub fn subscribe_zoom(&self) -> watch::Receiver<ZoomState> {
        self.zoom_tx.subscribe()
    }

    pub fn subscribe_device(&self) -> watch::Receiver<Option<CaptureDevice>> {
        self.device_tx.subscribe()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn subscribe_activity(&self) -> broadcast::Receiver<CaptureActivity> {
        self.activity.subscribe()
    }

    pub(crate) fn activity_sender(&self) -> &broadcast::Sender<CaptureActivity> {
        &self.activity
    }

    // MARK: session life cycle

    /// Configure the session on first use and start it running.
    ///
    /// Idempotent once running. A failed setup is terminal.
    pub async fn start(&self) -> Result<(), CameraError> {
        let mut inner = self.inner.lock().await;

        match inner.state {
            SessionState::Running => {
                if !self.backend.is_running() {
                    log::info!("Session configured but stopped, restarting");
                    self.backend.start_running();
                }
                return Ok(());
            }
            SessionState::Failed => {
                return Err(CameraError::SetupFailed(
                    "session previously failed to configure".to_string(),
                ));
            }
            SessionState::NotConfigured | SessionState::Configuring | SessionState::Switching => {}
        }

        inner.state = SessionState::Configuring;
        match self.set_up_session(&mut inner) {
            Ok(()) => {
                inner.state = SessionState::Running;
                self.backend.start_running();
                log::info!(
                    "Capture session running on {}",
                    inner
                        .active_device
                        .as_ref()
                        .map(|d| d.name.as_str())
                        .unwrap_or("<none>")
                );
                Ok(())
            }
            Err(e) => {
                log::error!("Capture session setup failed: {}", e);
                inner.state = SessionState::Failed;
                inner.listeners.clear();
                Err(CameraError::setup(&e))
            }
        }
    }

    fn set_up_session(&self, inner: &mut SessionInner) -> Result<(), CameraError> {
        if inner.runtime_listener.is_none() {
            inner.runtime_listener = Some(self.spawn_runtime_listener());
        }

        let device = self
            .catalog
            .default_device(self.config.session.prefer_front_camera)?;

        {
            let _batch = ConfigurationBatch::begin(self.backend.as_ref());
            let input = self.add_input(&device)?;
            inner.active_input = Some(input);
            self.add_photo_output()?;
        }

        inner.active_device = Some(device.clone());
        self.activate_device(inner, &device)
    }

    fn add_input(&self, device: &CaptureDevice) -> Result<DeviceInput, CameraError> {
        let input = self.backend.create_input(device)?;
        if !self.backend.can_add_input(&input) {
            return Err(CameraError::AddInputFailed);
        }
        self.backend.add_input(&input);
        Ok(input)
    }

    fn add_photo_output(&self) -> Result<(), CameraError> {
        if !self.backend.can_add_photo_output() {
            return Err(CameraError::AddOutputFailed);
        }
        self.backend.add_photo_output();
        Ok(())
    }

    /// Bring rotation, listeners, output capabilities and zoom in line with a
    /// newly active device.
    fn activate_device(
        &self,
        inner: &mut SessionInner,
        device: &CaptureDevice,
    ) -> Result<(), CameraError> {
        inner.listeners.clear();

        let orientation = *self.backend.orientation_updates().borrow();
        let rotation = RotationState::compute(device.position, orientation);
        self.backend.set_preview_rotation(rotation.preview_angle);
        self.backend.set_capture_rotation(rotation.capture_angle);
        inner.rotation = rotation;

        let rotation_listener = self.spawn_rotation_listener(device);
        let subject_area_listener = self.spawn_subject_area_listener(device);
        inner.listeners.install(rotation_listener, subject_area_listener);

        self.update_capture_capabilities(inner, device);

        self.device_tx.send_replace(Some(device.clone()));

        // New bounds apply at once; the readout waits for the hardware write.
        inner.zoom = ZoomState::for_device(device, &self.config.zoom.standard_factors);
        inner.zoom_synced = false;
        {
            let _lock = DeviceLock::acquire(self.backend.as_ref(), device)
                .map_err(|e| CameraError::ZoomOperationFailed(e.to_string()))?;
            self.backend.set_zoom_factor(device, inner.zoom.current);
        }
        inner.zoom_synced = true;
        self.zoom_tx.send_replace(inner.zoom.clone());
        Ok(())
    }

    fn update_capture_capabilities(&self, inner: &mut SessionInner, device: &CaptureDevice) {
        let capabilities = self.backend.photo_output_capabilities();
        let output = PhotoOutputConfig::for_device(
            device,
            &capabilities,
            self.config.capture.quality_prioritization,
        );
        self.backend.configure_photo_output(&output);
        inner.output = output;
    }

    // MARK: device selection

    /// Switch to the next device in catalog order, wrapping at the end.
    ///
    /// When the new input is rejected, the previous input is restored and
    /// `DeviceChangeFailed` is returned; the session keeps running on the
    /// previous device.
    pub async fn select_next_device(&self) -> Result<CaptureDevice, CameraError> {
        self.cancel_zoom();
        let mut inner = self.inner.lock().await;

        let current_device = inner.running_device()?.clone();
        let current_input = inner.active_input.clone().ok_or(CameraError::NotRunning)?;

        let devices = self.catalog.list_devices();
        let next = next_in_cycle(&devices, &current_device)
            .cloned()
            .ok_or(CameraError::DeviceUnavailable)?;

        if next.same_device(&current_device) {
            log::debug!("Only one camera available, nothing to switch to");
            return Ok(current_device);
        }

        log::info!("Switching camera: {} -> {}", current_device.name, next.name);
        inner.state = SessionState::Switching;
        let result = self.change_device(&mut inner, &current_input, &next);
        inner.state = SessionState::Running;
        result
    }

    fn change_device(
        &self,
        inner: &mut SessionInner,
        current_input: &DeviceInput,
        next: &CaptureDevice,
    ) -> Result<CaptureDevice, CameraError> {
        let _batch = ConfigurationBatch::begin(self.backend.as_ref());

        // The old input must leave before the new one can join.
        self.backend.remove_input(current_input);

        match self.add_input(next) {
            Ok(input) => {
                inner.active_input = Some(input);
                inner.active_device = Some(next.clone());
                if let Err(e) = self.activate_device(inner, next) {
                    log::warn!("Switched to {} with degraded zoom support: {}", next.name, e);
                }
                self.backend.set_user_preferred_camera(next);
                Ok(next.clone())
            }
            Err(e) => {
                self.backend.add_input(current_input);
                log::error!(
                    "Failed to switch to {} ({}), restored previous camera",
                    next.name,
                    e
                );
                Err(CameraError::DeviceChangeFailed(e.to_string()))
            }
        }
    }

    // MARK: focus and exposure

    /// Focus and expose at a normalized device point.
    pub async fn focus_and_expose(
        &self,
        point: Point,
        user_initiated: bool,
    ) -> Result<(), CameraError> {
        let inner = self.inner.lock().await;
        let device = inner.running_device()?;
        focus_and_expose_on(self.backend.as_ref(), device, point.clamped(), user_initiated)
    }

    // MARK: zoom

    /// Stop any smooth zoom in flight.
    pub fn cancel_zoom(&self) {
        self.zoom_generation.fetch_add(1, Ordering::SeqCst);
    }

    /// Set the zoom factor, clamped to the device bounds.
    pub async fn set_zoom(&self, factor: f32) -> Result<f32, CameraError> {
        self.cancel_zoom();
        let applied = self.apply_zoom(factor, None).await?;
        // Without a generation an apply is never superseded.
        Ok(applied.unwrap_or(factor))
    }

    /// One zoom application. Returns `None` when `generation` has been superseded.
    async fn apply_zoom(
        &self,
        factor: f32,
        generation: Option<u64>,
    ) -> Result<Option<f32>, CameraError> {
        let mut inner = self.inner.lock().await;
        if let Some(generation) = generation {
            if self.zoom_generation.load(Ordering::SeqCst) != generation {
                return Ok(None);
            }
        }

        let device = inner.running_device()?.clone();
        let clamped = inner.zoom.clamp(factor);
        if inner.zoom_synced && clamped == inner.zoom.current {
            return Ok(Some(clamped));
        }

        {
            let _lock = DeviceLock::acquire(self.backend.as_ref(), &device)
                .map_err(|e| CameraError::ZoomOperationFailed(e.to_string()))?;
            self.backend.set_zoom_factor(&device, clamped);
        }

        inner.zoom.set_current(clamped);
        inner.zoom_synced = true;
        self.zoom_tx.send_replace(inner.zoom.clone());
        Ok(Some(clamped))
    }

    /// Animate to `target` in `SMOOTH_ZOOM_STEPS` linear steps over `duration`.
    ///
    /// Finishes on the exact clamped target. A later zoom call, a device
    /// switch or `cancel_zoom` stops the animation between steps; the factor
    /// then stays at the last applied step.
    pub async fn smooth_zoom(&self, target: f32, duration: Duration) -> Result<f32, CameraError> {
        let generation = self.zoom_generation.fetch_add(1, Ordering::SeqCst) + 1;

        let (start, clamped) = {
            let inner = self.inner.lock().await;
            inner.running_device()?;
            (inner.zoom.current, inner.zoom.clamp(target))
        };
        if start == clamped {
            // Still written when the readout has not reached the hardware yet
            return Ok(self.apply_zoom(clamped, Some(generation)).await?.unwrap_or(clamped));
        }

        let step_delay = duration / SMOOTH_ZOOM_STEPS;
        for (i, factor) in zoom::ramp(start, clamped, SMOOTH_ZOOM_STEPS).into_iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(step_delay).await;
            }
            if self.apply_zoom(factor, Some(generation)).await?.is_none() {
                log::debug!("Smooth zoom to {} superseded", clamped);
                return Ok(self.zoom_state().await.current);
            }
        }

        // Land exactly on the target regardless of accumulated rounding.
        match self.apply_zoom(clamped, Some(generation)).await? {
            Some(factor) => Ok(factor),
            None => Ok(self.zoom_state().await.current),
        }
    }

    /// The available factor nearest to `value`.
    pub async fn nearest_available_zoom(&self, value: f32) -> f32 {
        self.inner.lock().await.zoom.nearest_available(value)
    }

    /// Smooth-zoom to the next optical stop, cycling back to the first.
    pub async fn toggle_optical_zoom(&self) -> Result<f32, CameraError> {
        let (current, target) = {
            let inner = self.inner.lock().await;
            inner.running_device()?;
            (
                inner.zoom.current,
                inner
                    .zoom
                    .next_optical_factor(self.config.zoom.optical_match_tolerance),
            )
        };

        match target {
            Some(target) => {
                log::debug!("Optical zoom toggle {} -> {}", current, target);
                self.smooth_zoom(target, self.config.zoom.smooth_zoom_duration())
                    .await
            }
            None => Ok(current),
        }
    }

    // MARK: photo capture

    /// Capture one photo with fresh settings.
    ///
    /// Settings are built under the session lock; the capture itself is
    /// awaited outside it so requests proceed independently.
    pub async fn capture_photo(&self) -> Result<Photo, CameraError> {
        let settings = {
            let inner = self.inner.lock().await;
            inner.running_device()?;
            PhotoSettings::for_output(
                &inner.output,
                &self.backend.photo_output_capabilities(),
                self.config.capture.prefer_hevc,
            )
        };
        self.broker.capture(settings).await
    }

    /// Capture with caller-provided settings.
    pub async fn capture_with_settings(&self, settings: PhotoSettings) -> Result<Photo, CameraError> {
        self.inner.lock().await.running_device()?;
        self.broker.capture(settings).await
    }

    pub fn captures_in_flight(&self) -> usize {
        self.broker.in_flight()
    }

    // MARK: listeners

    fn spawn_rotation_listener(&self, device: &CaptureDevice) -> ListenerTask {
        let mut updates = self.backend.orientation_updates();
        let weak = Arc::downgrade(&self.inner);
        let backend = Arc::clone(&self.backend);
        let device_id = device.id.clone();
        let position = device.position;

        ListenerTask::spawn("rotation", async move {
            while updates.changed().await.is_ok() {
                let orientation = *updates.borrow_and_update();
                let Some(inner) = weak.upgrade() else { break };
                let mut inner = inner.lock().await;
                if !inner.is_active(&device_id) {
                    break;
                }

                let rotation = RotationState::compute(position, orientation);
                if rotation.preview_angle != inner.rotation.preview_angle {
                    backend.set_preview_rotation(rotation.preview_angle);
                }
                if rotation.capture_angle != inner.rotation.capture_angle {
                    backend.set_capture_rotation(rotation.capture_angle);
                }
                inner.rotation = rotation;
            }
        })
    }

    fn spawn_subject_area_listener(&self, device: &CaptureDevice) -> ListenerTask {
        let mut changes = self.backend.subject_area_changes(device);
        let weak: Weak<Mutex<SessionInner>> = Arc::downgrade(&self.inner);
        let backend = Arc::clone(&self.backend);
        let device_id = device.id.clone();

        ListenerTask::spawn("subject-area", async move {
            loop {
                match changes.recv().await {
                    Ok(()) | Err(RecvError::Lagged(_)) => {}
                    Err(RecvError::Closed) => break,
                }
                let Some(inner) = weak.upgrade() else { break };
                let inner = inner.lock().await;
                if !inner.is_active(&device_id) {
                    break;
                }
                let Ok(device) = inner.running_device() else { continue };

                // Return to continuous focus and exposure at the center.
                if let Err(e) = focus_and_expose_on(backend.as_ref(), device, Point::CENTER, false) {
                    log::debug!("Unable to reset focus after subject area change: {}", e);
                }
            }
        })
    }

    fn spawn_runtime_listener(&self) -> ListenerTask {
        let mut runtime = self.backend.runtime_events();
        let weak = Arc::downgrade(&self.inner);
        let backend = Arc::clone(&self.backend);
        let events = self.events.clone();
        let restart = self.config.session.restart_on_media_reset;

        ListenerTask::spawn("runtime-events", async move {
            loop {
                let event = match runtime.recv().await {
                    Ok(event) => event,
                    Err(RecvError::Lagged(skipped)) => {
                        log::warn!("Missed {} session runtime events", skipped);
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                };

                match event {
                    RuntimeEvent::MediaServicesReset => {
                        let Some(inner) = weak.upgrade() else { break };
                        let inner = inner.lock().await;
                        if restart && inner.state == SessionState::Running && !backend.is_running() {
                            log::warn!("Media services were reset, restarting session");
                            backend.start_running();
                            let _ = events.send(SessionEvent::Restarted);
                        }
                    }
                    RuntimeEvent::InterruptionBegan => {
                        log::info!("Capture session interrupted");
                        let _ = events.send(SessionEvent::Interrupted);
                    }
                    RuntimeEvent::InterruptionEnded => {
                        log::info!("Capture session interruption ended");
                        let _ = events.send(SessionEvent::InterruptionEnded);
                    }
                    RuntimeEvent::Error(message) => {
                        log::error!("Capture session runtime error: {}", message);
                        let _ = events.send(SessionEvent::RuntimeError(message));
                    }
                }
            }
        })
    }
}

/// Apply focus and exposure independently, each only when the device supports it.
///
/// User-initiated requests focus once and enable subject-area monitoring;
/// system-initiated ones return the device to continuous modes.
fn focus_and_expose_on(
    backend: &dyn CaptureBackend,
    device: &CaptureDevice,
    point: Point,
    user_initiated: bool,
) -> Result<(), CameraError> {
    let lock = DeviceLock::acquire(backend, device)?;
    let caps = &lock.device().capabilities;

    let focus_mode = if user_initiated {
        FocusMode::AutoFocus
    } else {
        FocusMode::ContinuousAutoFocus
    };
    if caps.focus_point_of_interest_supported && caps.supports_focus_mode(focus_mode) {
        backend.set_focus(device, point, focus_mode);
    }

    let exposure_mode = if user_initiated {
        ExposureMode::AutoExpose
    } else {
        ExposureMode::ContinuousAutoExposure
    };
    if caps.exposure_point_of_interest_supported && caps.supports_exposure_mode(exposure_mode) {
        backend.set_exposure(device, point, exposure_mode);
    }

    backend.set_subject_area_change_monitoring(device, user_initiated);
    Ok(())
}
