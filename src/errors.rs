use thiserror::Error;

/// Errors produced by the capture session, its devices and the photo pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CameraError {
    #[error("No camera device is available")]
    DeviceUnavailable,
    #[error("Capture session rejected the device input")]
    AddInputFailed,
    #[error("Capture session rejected the photo output")]
    AddOutputFailed,
    #[error("Capture session setup failed: {0}")]
    SetupFailed(String),
    #[error("Device change failed: {0}")]
    DeviceChangeFailed(String),
    #[error("Photo capture failed: {0}")]
    PhotoCaptureFailed(String),
    #[error("Zoom operation failed: {0}")]
    ZoomOperationFailed(String),
    #[error("Could not lock device for configuration: {0}")]
    LockFailed(String),
    #[error("Camera access is not authorized")]
    Unauthorized,
    #[error("Capture session is not running")]
    NotRunning,
    #[error("Image import failed: {0}")]
    ImportFailed(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Capture backend error: {0}")]
    Backend(String),
}

impl CameraError {
    /// Wrap any failure raised during first-time configuration.
    pub fn setup(cause: &CameraError) -> Self {
        match cause {
            CameraError::SetupFailed(_) => cause.clone(),
            other => CameraError::SetupFailed(other.to_string()),
        }
    }

    /// Whether the error leaves the session permanently unusable.
    pub fn is_terminal(&self) -> bool {
        matches!(self, CameraError::SetupFailed(_) | CameraError::Unauthorized)
    }
}
