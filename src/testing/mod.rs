//! Testing utilities for photocamera
//!
//! Provides a simulated capture backend and synthetic photo data so the
//! session, zoom and capture paths can be exercised offline.

pub mod simulated;
pub mod synthetic_data;

pub use simulated::{BackendCalls, CaptureScript, SimulatedBackend};
pub use synthetic_data::{encode_jpeg, synthetic_photo, SimulatedCameraProfile};
