//! photocamera: photo camera session coordination
//!
//! This crate drives a photo capture session over a pluggable platform
//! backend: device discovery and cyclic switching, tap-to-focus, zoom with
//! optical stops and smooth ramps, rotation tracking, and one-shot photo
//! capture resolved from delegate callbacks.
//!
//! # Features
//! - Serialized session coordination safe to call from any task
//! - Device switching with rollback to the previous input
//! - Clamped zoom, smooth zoom and optical-stop toggling
//! - Concurrent photo captures, each resolved exactly once
//! - A simulated backend for offline testing
//! - A nokhwa-backed hardware backend behind the `native` feature
//!
//! # Usage
//! ```rust,no_run
//! use photocamera::testing::SimulatedBackend;
//! use photocamera::Camera;
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), photocamera::CameraError> {
//! let camera = Camera::with_default_config(Arc::new(SimulatedBackend::with_standard_devices()));
//! camera.start().await?;
//! camera.toggle_optical_zoom().await?;
//! let photo = camera.capture_photo().await?;
//! println!("{}x{}", photo.width(), photo.height());
//! # Ok(())
//! # }
//! ```
pub mod camera;
pub mod capture;
pub mod catalog;
pub mod config;
pub mod errors;
pub mod invariant_ppt;
pub mod permissions;
pub mod platform;
pub mod session;
pub mod types;

// Testing utilities - simulated backend and synthetic photos
pub mod testing;

// Re-exports for convenience
pub use camera::Camera;
pub use capture::{CaptureActivity, Photo, PhotoOrientation, PhotoSettings};
pub use catalog::DeviceCatalog;
pub use config::PhotoCameraConfig;
pub use errors::CameraError;
pub use permissions::PermissionStatus;
pub use platform::{CaptureBackend, PhotoCaptureDelegate, RuntimeEvent};
pub use session::{RotationState, SessionCoordinator, SessionEvent, SessionState, ZoomState};
pub use types::{
    CameraStatus, CaptureDevice, DeviceCapabilities, DeviceOrientation, DevicePosition,
    InterfaceOrientation, OrientationSnapshot, Point,
};

/// Initialize logging for the camera system
pub fn init_logging() {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "photocamera=info");
    }
    let _ = env_logger::try_init();
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Get crate information
pub fn get_info() -> CrateInfo {
    CrateInfo {
        name: NAME.to_string(),
        version: VERSION.to_string(),
        description: DESCRIPTION.to_string(),
        native_backend: cfg!(feature = "native"),
    }
}

/// Crate information structure
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CrateInfo {
    pub name: String,
    pub version: String,
    pub description: String,
    /// Whether the hardware backend was compiled in
    pub native_backend: bool,
}

#[cfg(test)]
mod lib_tests {
    use super::*;

    #[test]
    fn test_crate_info() {
        let info = get_info();
        assert_eq!(info.name, "photocamera");
        assert!(!info.version.is_empty());
        assert!(!info.description.is_empty());
    }

    #[test]
    fn test_init_logging_is_repeatable() {
        init_logging();
        init_logging();
        log::info!("logging initialized");
    }
}
