//! Photo capture through the session: settings, callback ordering and
//! concurrent requests.

use photocamera::capture::{
    OutputCapabilities, PhotoCodec, PhotoSettings, PreviewPixelFormat, QualityPrioritization,
};
use photocamera::testing::{CaptureScript, SimulatedBackend};
use photocamera::types::PhotoDimensions;
use photocamera::{
    CameraError, CaptureActivity, CaptureBackend, PhotoCameraConfig, PhotoOrientation,
    SessionCoordinator,
};
use std::sync::Arc;
use std::time::Duration;

async fn started() -> (Arc<SimulatedBackend>, SessionCoordinator) {
    let backend = Arc::new(SimulatedBackend::with_standard_devices());
    let session = SessionCoordinator::new(backend.clone(), PhotoCameraConfig::default());
    session.start().await.unwrap();
    (backend, session)
}

fn assert_capture_failed(result: Result<photocamera::Photo, CameraError>, needle: &str) {
    match result {
        Err(CameraError::PhotoCaptureFailed(reason)) => {
            assert!(reason.contains(needle), "unexpected reason: {}", reason)
        }
        other => panic!("expected PhotoCaptureFailed, got {:?}", other.map(|p| p.request_id)),
    }
}

#[tokio::test]
async fn test_capture_before_start() {
    let backend = Arc::new(SimulatedBackend::with_standard_devices());
    let session = SessionCoordinator::new(backend.clone(), PhotoCameraConfig::default());
    assert!(matches!(session.capture_photo().await, Err(CameraError::NotRunning)));
    assert!(backend.calls().captures.is_empty());
}

#[tokio::test]
async fn test_capture_success() {
    let (backend, session) = started().await;

    let photo = session.capture_photo().await.unwrap();
    assert_eq!(photo.orientation, PhotoOrientation::Right);
    assert_eq!((photo.width(), photo.height()), (64, 48));
    assert!(photo.file_data.is_some());

    let upright = photo.upright();
    assert_eq!((upright.width(), upright.height()), (48, 64));

    let calls = backend.calls();
    let settings = &calls.captures[0];
    assert_eq!(settings.id, photo.request_id);
    assert_eq!(settings.codec, PhotoCodec::Hevc);
    assert_eq!(settings.preview_format, Some(PreviewPixelFormat::Bgra8));
    assert_eq!(settings.max_photo_dimensions, PhotoDimensions::new(8064, 6048));
    assert_eq!(settings.quality_prioritization, QualityPrioritization::Quality);
    assert_eq!(session.captures_in_flight(), 0);
}

#[tokio::test]
async fn test_every_capture_gets_fresh_settings() {
    let (backend, session) = started().await;
    session.capture_photo().await.unwrap();
    session.capture_photo().await.unwrap();

    let calls = backend.calls();
    assert_eq!(calls.captures.len(), 2);
    assert_ne!(calls.captures[0].id, calls.captures[1].id);
}

#[tokio::test]
async fn test_jpeg_when_hevc_unavailable() {
    let (backend, session) = started().await;
    backend.set_output_capabilities(OutputCapabilities::default());

    session.capture_photo().await.unwrap();
    let settings = backend.calls().captures.pop().unwrap();
    assert_eq!(settings.codec, PhotoCodec::Jpeg);
}

#[tokio::test]
async fn test_jpeg_when_hevc_not_preferred() {
    let backend = Arc::new(SimulatedBackend::with_standard_devices());
    let mut config = PhotoCameraConfig::default();
    config.capture.prefer_hevc = false;
    let session = SessionCoordinator::new(backend.clone(), config);
    session.start().await.unwrap();

    session.capture_photo().await.unwrap();
    assert_eq!(backend.calls().captures[0].codec, PhotoCodec::Jpeg);
}

#[tokio::test]
async fn test_finish_error_after_success_keeps_photo() {
    let (backend, session) = started().await;
    backend.script_capture(CaptureScript::SuccessThenFinishError("late".to_string()));

    let photo = session.capture_photo().await.unwrap();
    assert_eq!(photo.orientation, PhotoOrientation::Right);
}

#[tokio::test]
async fn test_processing_error_fails_request() {
    let (backend, session) = started().await;
    backend.script_capture(CaptureScript::ProcessingError("sensor overheated".to_string()));
    assert_capture_failed(session.capture_photo().await, "sensor overheated");
}

#[tokio::test]
async fn test_incomplete_payloads_fail_request() {
    let (backend, session) = started().await;

    backend.script_capture(CaptureScript::MissingImage);
    assert_capture_failed(session.capture_photo().await, "missing image");

    backend.script_capture(CaptureScript::MissingOrientation);
    assert_capture_failed(session.capture_photo().await, "missing orientation");

    backend.script_capture(CaptureScript::UnknownOrientation(9));
    assert_capture_failed(session.capture_photo().await, "unrecognized orientation 9");

    // The session keeps working afterwards
    assert!(session.capture_photo().await.is_ok());
}

#[tokio::test]
async fn test_finish_without_processing_fails_request() {
    let (backend, session) = started().await;
    backend.script_capture(CaptureScript::FinishOnly);
    assert_capture_failed(session.capture_photo().await, "without delivering");
}

#[tokio::test]
async fn test_abandoned_capture_fails_request() {
    let (backend, session) = started().await;
    backend.script_capture(CaptureScript::Abandon);
    assert_capture_failed(session.capture_photo().await, "abandoned");
    assert_eq!(session.captures_in_flight(), 0);
}

#[tokio::test]
async fn test_concurrent_captures_resolve_independently() {
    let (backend, session) = started().await;
    backend.script_capture(CaptureScript::Deferred);
    backend.script_capture(CaptureScript::Deferred);

    let first = tokio::spawn({
        let session = session.clone();
        async move { session.capture_photo().await }
    });
    let second = tokio::spawn({
        let session = session.clone();
        async move { session.capture_photo().await }
    });

    for _ in 0..200 {
        if backend.deferred_captures().len() == 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    let pending = backend.deferred_captures();
    assert_eq!(pending.len(), 2);
    assert_eq!(session.captures_in_flight(), 2);

    // Complete in reverse order of issue
    assert!(backend.complete_deferred(pending[1]));
    assert!(backend.complete_deferred(pending[0]));
    assert!(!backend.complete_deferred(pending[0]));

    let first = first.await.unwrap().unwrap();
    let second = second.await.unwrap().unwrap();
    assert_ne!(first.request_id, second.request_id);
    assert!(pending.contains(&first.request_id));
    assert!(pending.contains(&second.request_id));
    assert_eq!(session.captures_in_flight(), 0);
}

#[tokio::test]
async fn test_settings_cannot_be_reused_while_in_flight() {
    let (backend, session) = started().await;
    let settings = PhotoSettings::for_output(
        &session.output_config().await,
        &backend.photo_output_capabilities(),
        true,
    );

    backend.script_capture(CaptureScript::Deferred);
    let outstanding = tokio::spawn({
        let session = session.clone();
        let settings = settings.clone();
        async move { session.capture_with_settings(settings).await }
    });
    while backend.deferred_captures().is_empty() {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    assert_capture_failed(
        session.capture_with_settings(settings.clone()).await,
        "outstanding",
    );

    backend.complete_deferred(settings.id);
    assert_eq!(outstanding.await.unwrap().unwrap().request_id, settings.id);
}

#[tokio::test]
async fn test_capture_activity_is_published() {
    let (_backend, session) = started().await;
    let mut activity = session.subscribe_activity();

    let photo = session.capture_photo().await.unwrap();

    assert!(matches!(activity.recv().await.unwrap(), CaptureActivity::WillCapture));
    match activity.recv().await.unwrap() {
        CaptureActivity::DidCapture(published) => assert_eq!(published.request_id, photo.request_id),
        other => panic!("expected DidCapture, got {:?}", other),
    }
}

#[tokio::test]
async fn test_failed_capture_publishes_no_photo() {
    let (backend, session) = started().await;
    let mut activity = session.subscribe_activity();
    backend.script_capture(CaptureScript::ProcessingError("blocked".to_string()));

    assert!(session.capture_photo().await.is_err());
    assert!(matches!(activity.try_recv(), Ok(CaptureActivity::WillCapture)));
    assert!(activity.try_recv().is_err());
}
