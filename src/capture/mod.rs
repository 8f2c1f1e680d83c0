//! One-shot photo capture.
//!
//! The backend reports a capture through three delegate callbacks. The
//! [`CaptureRequestBroker`] binds a fresh handler to every request and turns
//! those callbacks into a single awaited result. The processing callback is
//! authoritative: once it resolves the request, a later finish-stage error is
//! only logged.

pub mod photo;
pub mod settings;

pub use photo::{Photo, PhotoOrientation};
pub use settings::{
    OutputCapabilities, PhotoCodec, PhotoOutputConfig, PhotoSettings, PreviewPixelFormat,
    QualityPrioritization,
};

use crate::errors::CameraError;
use crate::platform::{CaptureBackend, CapturedPhoto, PhotoCaptureDelegate};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, oneshot};
use uuid::Uuid;

/// One-shot notifications for UI feedback
#[derive(Debug, Clone)]
pub enum CaptureActivity {
    Idle,
    /// The shutter is about to fire
    WillCapture,
    DidCapture(Arc<Photo>),
    DidImport(Arc<Photo>),
}

type PhotoResult = Result<Photo, CameraError>;

/// Turns delegate-callback captures into awaited results.
#[derive(Clone)]
pub struct CaptureRequestBroker {
    backend: Arc<dyn CaptureBackend>,
    activity: broadcast::Sender<CaptureActivity>,
    in_flight: Arc<Mutex<HashSet<Uuid>>>,
}

impl CaptureRequestBroker {
    pub fn new(backend: Arc<dyn CaptureBackend>, activity: broadcast::Sender<CaptureActivity>) -> Self {
        Self {
            backend,
            activity,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Capture one photo with the given settings.
    ///
    /// Each call is independent; concurrent requests resolve on their own.
    pub async fn capture(&self, settings: PhotoSettings) -> PhotoResult {
        let request_id = settings.id;
        let _registration = InFlight::register(&self.in_flight, request_id)?;

        let (tx, rx) = oneshot::channel();
        let handler = PhotoCaptureHandler::new(request_id, tx, self.activity.clone());

        log::debug!(
            "Capturing photo {} ({:?}, max {})",
            request_id,
            settings.codec,
            settings.max_photo_dimensions
        );
        // The backend holds the only reference to the handler. If it drops it
        // without resolving, the receiver observes a closed channel.
        self.backend.capture_photo(settings, Arc::new(handler));

        let result = match rx.await {
            Ok(result) => result,
            Err(_) => Err(CameraError::PhotoCaptureFailed(
                "capture abandoned before completion".to_string(),
            )),
        };

        match &result {
            Ok(photo) => {
                log::info!(
                    "Captured photo {}: {}x{} {:?}",
                    request_id,
                    photo.width(),
                    photo.height(),
                    photo.orientation
                );
                let _ = self
                    .activity
                    .send(CaptureActivity::DidCapture(Arc::new(photo.clone())));
            }
            Err(e) => log::warn!("Photo {} failed: {}", request_id, e),
        }

        result
    }

    /// Number of requests awaiting their result
    pub fn in_flight(&self) -> usize {
        self.in_flight.lock().map(|set| set.len()).unwrap_or(0)
    }
}

/// Keeps a settings id registered while its request is outstanding.
struct InFlight {
    set: Arc<Mutex<HashSet<Uuid>>>,
    id: Uuid,
}

impl InFlight {
    fn register(set: &Arc<Mutex<HashSet<Uuid>>>, id: Uuid) -> Result<Self, CameraError> {
        let mut guard = set
            .lock()
            .map_err(|_| CameraError::PhotoCaptureFailed("request registry poisoned".to_string()))?;
        if !guard.insert(id) {
            return Err(CameraError::PhotoCaptureFailed(format!(
                "settings {} already belong to an outstanding request",
                id
            )));
        }
        Ok(Self {
            set: Arc::clone(set),
            id,
        })
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        if let Ok(mut guard) = self.set.lock() {
            guard.remove(&self.id);
        }
    }
}

/// Delegate bound 1:1 to a single capture request.
struct PhotoCaptureHandler {
    request_id: Uuid,
    slot: Mutex<Option<oneshot::Sender<PhotoResult>>>,
    activity: broadcast::Sender<CaptureActivity>,
}

impl PhotoCaptureHandler {
    fn new(
        request_id: Uuid,
        sender: oneshot::Sender<PhotoResult>,
        activity: broadcast::Sender<CaptureActivity>,
    ) -> Self {
        Self {
            request_id,
            slot: Mutex::new(Some(sender)),
            activity,
        }
    }

    fn is_resolved(&self) -> bool {
        self.slot.lock().map(|slot| slot.is_none()).unwrap_or(true)
    }

    /// Deliver the result. Only the first call has any effect.
    fn resolve(&self, result: PhotoResult) -> bool {
        let sender = match self.slot.lock() {
            Ok(mut slot) => slot.take(),
            Err(_) => None,
        };
        match sender {
            Some(sender) => {
                if sender.send(result).is_err() {
                    log::debug!("Photo {} resolved after its caller went away", self.request_id);
                }
                true
            }
            None => {
                log::debug!("Photo {} already resolved, ignoring", self.request_id);
                false
            }
        }
    }
}

impl PhotoCaptureDelegate for PhotoCaptureHandler {
    fn will_capture_photo(&self, settings_id: Uuid) {
        log::trace!("Shutter firing for {}", settings_id);
        let _ = self.activity.send(CaptureActivity::WillCapture);
    }

    fn did_finish_processing_photo(&self, result: Result<CapturedPhoto, CameraError>) {
        let outcome = result
            .map_err(capture_failure)
            .and_then(|captured| assemble_photo(self.request_id, captured));
        self.resolve(outcome);
    }

    fn did_finish_capture(&self, error: Option<CameraError>) {
        match error {
            Some(error) => {
                log::error!("Capture {} finished with error: {}", self.request_id, error);
                if !self.is_resolved() {
                    self.resolve(Err(capture_failure(error)));
                }
            }
            None => {
                if !self.is_resolved() {
                    self.resolve(Err(CameraError::PhotoCaptureFailed(
                        "capture finished without delivering a photo".to_string(),
                    )));
                }
            }
        }
    }
}

fn capture_failure(error: CameraError) -> CameraError {
    match error {
        CameraError::PhotoCaptureFailed(_) => error,
        other => CameraError::PhotoCaptureFailed(other.to_string()),
    }
}

/// Validate the processing payload: image data and a recognized orientation are both required.
fn assemble_photo(request_id: Uuid, captured: CapturedPhoto) -> PhotoResult {
    let image = captured
        .image
        .ok_or_else(|| CameraError::PhotoCaptureFailed("missing image data".to_string()))?;
    let raw = captured.metadata.orientation.ok_or_else(|| {
        CameraError::PhotoCaptureFailed("missing orientation metadata".to_string())
    })?;
    let orientation = PhotoOrientation::from_exif(raw).ok_or_else(|| {
        CameraError::PhotoCaptureFailed(format!("unrecognized orientation {}", raw))
    })?;

    Ok(Photo::new(request_id, image, orientation).with_file_data(captured.file_data))
}
