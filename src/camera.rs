//! The application-facing camera.
//!
//! `Camera` wraps the session coordinator with observable state for a UI:
//! a status, a device-switching flag, capture activity and the zoom readout.
//! Operations a user triggers directly (switching, tap to focus) log their
//! failures instead of returning them.

use crate::capture::{CaptureActivity, Photo};
use crate::config::PhotoCameraConfig;
use crate::errors::CameraError;
use crate::permissions::ensure_authorized;
use crate::platform::CaptureBackend;
use crate::session::listeners::ListenerTask;
use crate::session::{SessionCoordinator, SessionEvent, ZoomState};
use crate::types::{CameraStatus, CaptureDevice, Point};
use bytes::Bytes;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch};

pub struct Camera {
    session: SessionCoordinator,
    status: Arc<watch::Sender<CameraStatus>>,
    switching: watch::Sender<bool>,
    status_listener: Mutex<Option<ListenerTask>>,
}

impl Camera {
    pub fn new(backend: Arc<dyn CaptureBackend>, config: PhotoCameraConfig) -> Self {
        let (status, _) = watch::channel(CameraStatus::Unknown);
        let (switching, _) = watch::channel(false);
        Self {
            session: SessionCoordinator::new(backend, config),
            status: Arc::new(status),
            switching,
            status_listener: Mutex::new(None),
        }
    }

    pub fn with_default_config(backend: Arc<dyn CaptureBackend>) -> Self {
        Self::new(backend, PhotoCameraConfig::default())
    }

    pub fn session(&self) -> &SessionCoordinator {
        &self.session
    }

    pub fn status(&self) -> CameraStatus {
        *self.status.borrow()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<CameraStatus> {
        self.status.subscribe()
    }

    pub fn is_switching_devices(&self) -> bool {
        *self.switching.borrow()
    }

    pub fn subscribe_switching(&self) -> watch::Receiver<bool> {
        self.switching.subscribe()
    }

    pub fn subscribe_activity(&self) -> broadcast::Receiver<CaptureActivity> {
        self.session.subscribe_activity()
    }

    pub fn subscribe_zoom(&self) -> watch::Receiver<ZoomState> {
        self.session.subscribe_zoom()
    }

    /// Check authorization, then configure and start the session.
    pub async fn start(&self) -> Result<(), CameraError> {
        if !ensure_authorized(self.session.backend().as_ref()).await {
            log::warn!("Camera access not authorized");
            self.status.send_replace(CameraStatus::Unauthorized);
            return Err(CameraError::Unauthorized);
        }

        self.watch_session_events();

        match self.session.start().await {
            Ok(()) => {
                self.status.send_replace(CameraStatus::Running);
                Ok(())
            }
            Err(e) => {
                self.status.send_replace(CameraStatus::Failed);
                Err(e)
            }
        }
    }

    /// Mirror session interruptions into the status.
    fn watch_session_events(&self) {
        let mut listener = match self.status_listener.lock() {
            Ok(listener) => listener,
            Err(poisoned) => poisoned.into_inner(),
        };
        if listener.is_some() {
            return;
        }

        let mut events = self.session.subscribe_events();
        let status = Arc::clone(&self.status);
        *listener = Some(ListenerTask::spawn("camera-status", async move {
            loop {
                let next = match events.recv().await {
                    Ok(SessionEvent::Interrupted) => CameraStatus::Interrupted,
                    Ok(SessionEvent::InterruptionEnded) | Ok(SessionEvent::Restarted) => {
                        CameraStatus::Running
                    }
                    Ok(SessionEvent::RuntimeError(_)) | Err(RecvError::Lagged(_)) => continue,
                    Err(RecvError::Closed) => break,
                };
                // Only a live session moves between running and interrupted.
                status.send_if_modified(|current| {
                    let live = matches!(current, CameraStatus::Running | CameraStatus::Interrupted);
                    if live && *current != next {
                        *current = next;
                        true
                    } else {
                        false
                    }
                });
            }
        }));
    }

    pub fn devices(&self) -> Vec<CaptureDevice> {
        self.session.catalog().list_devices()
    }

    pub async fn current_device(&self) -> Option<CaptureDevice> {
        self.session.active_device().await
    }

    /// Move to the next camera. Returns the device active afterwards.
    pub async fn switch_video_devices(&self) -> Option<CaptureDevice> {
        let _switching = SwitchingFlag::raise(&self.switching);
        if let Err(e) = self.session.select_next_device().await {
            log::warn!("Unable to switch cameras: {}", e);
        }
        self.session.active_device().await
    }

    /// Tap to focus at a normalized device point.
    pub async fn focus_and_expose(&self, point: Point) {
        if let Err(e) = self.session.focus_and_expose(point, true).await {
            log::warn!("Unable to focus at ({:.2}, {:.2}): {}", point.x, point.y, e);
        }
    }

    pub async fn capture_photo(&self) -> Result<Photo, CameraError> {
        self.session.capture_photo().await
    }

    pub async fn zoom_state(&self) -> ZoomState {
        self.session.zoom_state().await
    }

    pub async fn set_zoom(&self, factor: f32) -> Result<f32, CameraError> {
        self.session.set_zoom(factor).await
    }

    pub async fn smooth_zoom(&self, target: f32, duration: Duration) -> Result<f32, CameraError> {
        self.session.smooth_zoom(target, duration).await
    }

    pub fn cancel_zoom(&self) {
        self.session.cancel_zoom();
    }

    pub async fn nearest_available_zoom(&self, value: f32) -> f32 {
        self.session.nearest_available_zoom(value).await
    }

    pub async fn toggle_optical_zoom(&self) -> Result<f32, CameraError> {
        self.session.toggle_optical_zoom().await
    }

    /// Decode an externally provided image and publish it as imported.
    pub async fn import_image(&self, data: impl Into<Bytes>) -> Result<Arc<Photo>, CameraError> {
        let data: Bytes = data.into();
        let decode_data = data.clone();
        let image = tokio::task::spawn_blocking(move || image::load_from_memory(&decode_data))
            .await
            .map_err(|e| CameraError::ImportFailed(format!("decode task failed: {}", e)))?
            .map_err(|e| CameraError::ImportFailed(e.to_string()))?;

        let photo = Arc::new(Photo::imported(image).with_file_data(Some(data)));
        log::info!("Imported photo {}x{}", photo.width(), photo.height());
        let _ = self
            .session
            .activity_sender()
            .send(CaptureActivity::DidImport(Arc::clone(&photo)));
        Ok(photo)
    }
}

/// Holds the switching flag up for the duration of a switch.
struct SwitchingFlag<'a> {
    flag: &'a watch::Sender<bool>,
}

impl<'a> SwitchingFlag<'a> {
    fn raise(flag: &'a watch::Sender<bool>) -> Self {
        flag.send_replace(true);
        Self { flag }
    }
}

impl Drop for SwitchingFlag<'_> {
    fn drop(&mut self) {
        self.flag.send_replace(false);
    }
}
