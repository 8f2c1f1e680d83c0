//! Zoom behaviour: clamping, optical stops and smooth ramps with cancellation.
//!
//! Timing tests run on tokio's paused clock.

use photocamera::testing::SimulatedBackend;
use photocamera::{
    CameraError, CaptureDevice, DeviceCapabilities, DevicePosition, PhotoCameraConfig,
    SessionCoordinator,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Back camera with bounds [1, 10] and stops [1, 2, 5, 10]
fn ten_x_backend() -> Arc<SimulatedBackend> {
    let backend = SimulatedBackend::new();
    backend.add_device(
        CaptureDevice::new("tele", "Telephoto Camera", DevicePosition::Back).with_capabilities(
            DeviceCapabilities::default()
                .with_zoom_range(1.0, 10.0)
                .with_switch_over_factors(vec![2.0, 5.0, 10.0]),
        ),
    );
    backend.add_device(
        CaptureDevice::new("front", "Front Camera", DevicePosition::Front)
            .with_capabilities(DeviceCapabilities::default().with_zoom_range(1.0, 3.0)),
    );
    Arc::new(backend)
}

async fn started(backend: &Arc<SimulatedBackend>) -> SessionCoordinator {
    let session = SessionCoordinator::new(backend.clone(), PhotoCameraConfig::default());
    session.start().await.unwrap();
    session
}

#[tokio::test]
async fn test_available_factors() {
    let backend = ten_x_backend();
    let session = started(&backend).await;
    assert_eq!(session.zoom_state().await.available, vec![1.0, 2.0, 5.0, 10.0]);
}

#[tokio::test]
async fn test_set_zoom_clamps_to_max() {
    let backend = ten_x_backend();
    let session = started(&backend).await;

    assert_eq!(session.set_zoom(15.0).await.unwrap(), 10.0);
    assert_eq!(session.zoom_state().await.current, 10.0);
    assert_eq!(backend.calls().zoom_factors.last(), Some(&10.0));

    assert_eq!(session.set_zoom(0.1).await.unwrap(), 1.0);
    assert_eq!(session.zoom_state().await.current, 1.0);
}

#[tokio::test]
async fn test_set_zoom_to_current_is_noop() {
    let backend = ten_x_backend();
    let session = started(&backend).await;
    session.set_zoom(4.0).await.unwrap();
    let writes = backend.calls().zoom_factors.len();

    session.set_zoom(4.0).await.unwrap();
    assert_eq!(backend.calls().zoom_factors.len(), writes);

    session.set_zoom(10.0).await.unwrap();
    // Clamps onto the current factor
    session.set_zoom(25.0).await.unwrap();
    assert_eq!(backend.calls().zoom_factors.len(), writes + 1);
}

#[tokio::test]
async fn test_set_zoom_lock_failure() {
    let backend = ten_x_backend();
    let session = started(&backend).await;
    backend.set_lock_failure(true);

    let err = session.set_zoom(3.0).await.unwrap_err();
    assert!(matches!(err, CameraError::ZoomOperationFailed(_)));
    assert_eq!(session.zoom_state().await.current, 1.0);
}

#[tokio::test]
async fn test_zoom_requires_running_session() {
    let backend = ten_x_backend();
    let session = SessionCoordinator::new(backend.clone(), PhotoCameraConfig::default());
    assert_eq!(session.set_zoom(2.0).await, Err(CameraError::NotRunning));
    assert_eq!(session.toggle_optical_zoom().await, Err(CameraError::NotRunning));
}

#[tokio::test]
async fn test_zoom_readout_is_published() {
    let backend = ten_x_backend();
    let session = started(&backend).await;
    let mut readout = session.subscribe_zoom();

    session.set_zoom(3.5).await.unwrap();
    assert!(readout.has_changed().unwrap());
    assert_eq!(readout.borrow_and_update().current, 3.5);
}

#[tokio::test]
async fn test_nearest_available_zoom() {
    let backend = ten_x_backend();
    let session = started(&backend).await;

    assert_eq!(session.nearest_available_zoom(3.4).await, 2.0);
    // Equidistant from 2 and 5: the earlier factor wins
    assert_eq!(session.nearest_available_zoom(3.5).await, 2.0);
    assert_eq!(session.nearest_available_zoom(8.0).await, 10.0);
    assert_eq!(session.nearest_available_zoom(0.2).await, 1.0);
}

#[tokio::test(start_paused = true)]
async fn test_toggle_optical_zoom_advances() {
    let backend = ten_x_backend();
    let session = started(&backend).await;
    session.set_zoom(2.0).await.unwrap();

    assert_eq!(session.toggle_optical_zoom().await.unwrap(), 5.0);
    assert_eq!(session.zoom_state().await.current, 5.0);

    assert_eq!(session.toggle_optical_zoom().await.unwrap(), 10.0);
    assert_eq!(session.toggle_optical_zoom().await.unwrap(), 1.0);
}

#[tokio::test(start_paused = true)]
async fn test_toggle_between_stops() {
    let backend = ten_x_backend();
    let session = started(&backend).await;
    session.set_zoom(3.0).await.unwrap();

    // 3x sits past the 2x stop, so the next stop is 5x
    assert_eq!(session.toggle_optical_zoom().await.unwrap(), 5.0);
}

#[tokio::test(start_paused = true)]
async fn test_smooth_zoom_lands_on_target() {
    let backend = ten_x_backend();
    let session = started(&backend).await;
    let before = backend.calls().zoom_factors.len();
    let started_at = Instant::now();

    let factor = session
        .smooth_zoom(7.3, Duration::from_millis(2000))
        .await
        .unwrap();

    assert_eq!(factor, 7.3);
    assert_eq!(session.zoom_state().await.current, 7.3);

    let writes = &backend.calls().zoom_factors[before..];
    assert_eq!(writes.len(), 20);
    assert_eq!(writes.last(), Some(&7.3));
    assert!(writes.windows(2).all(|pair| pair[0] < pair[1]));

    // Nineteen pauses between twenty steps
    assert!(started_at.elapsed() >= Duration::from_millis(1900));
}

#[tokio::test(start_paused = true)]
async fn test_smooth_zoom_target_is_clamped() {
    let backend = ten_x_backend();
    let session = started(&backend).await;

    let factor = session.smooth_zoom(40.0, Duration::from_millis(200)).await.unwrap();
    assert_eq!(factor, 10.0);

    let factor = session.smooth_zoom(10.0, Duration::from_millis(200)).await.unwrap();
    assert_eq!(factor, 10.0);
}

#[tokio::test(start_paused = true)]
async fn test_new_zoom_supersedes_smooth_zoom() {
    let backend = ten_x_backend();
    let session = started(&backend).await;

    let animation = tokio::spawn({
        let session = session.clone();
        async move { session.smooth_zoom(10.0, Duration::from_millis(2000)).await }
    });
    tokio::time::sleep(Duration::from_millis(500)).await;

    assert_eq!(session.set_zoom(3.0).await.unwrap(), 3.0);
    let result = animation.await.unwrap().unwrap();

    assert_eq!(result, 3.0);
    assert_eq!(session.zoom_state().await.current, 3.0);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_zoom_stops_between_steps() {
    let backend = ten_x_backend();
    let session = started(&backend).await;

    let animation = tokio::spawn({
        let session = session.clone();
        async move { session.smooth_zoom(10.0, Duration::from_millis(2000)).await }
    });
    tokio::time::sleep(Duration::from_millis(650)).await;
    session.cancel_zoom();

    let stopped_at = animation.await.unwrap().unwrap();
    assert!(stopped_at > 1.0 && stopped_at < 10.0, "stopped at {}", stopped_at);
    assert_eq!(session.zoom_state().await.current, stopped_at);

    tokio::time::sleep(Duration::from_millis(2000)).await;
    assert_eq!(session.zoom_state().await.current, stopped_at);
}

#[tokio::test(start_paused = true)]
async fn test_device_switch_supersedes_smooth_zoom() {
    let backend = ten_x_backend();
    let session = started(&backend).await;

    let animation = tokio::spawn({
        let session = session.clone();
        async move { session.smooth_zoom(10.0, Duration::from_millis(2000)).await }
    });
    tokio::time::sleep(Duration::from_millis(500)).await;

    let front = session.select_next_device().await.unwrap();
    assert_eq!(front.id, "front");
    animation.await.unwrap().unwrap();

    let zoom = session.zoom_state().await;
    assert_eq!(zoom.current, 1.0);
    assert_eq!(zoom.max, 3.0);
}

#[tokio::test]
async fn test_switch_with_refused_zoom_lock_keeps_readout() {
    let backend = ten_x_backend();
    let session = started(&backend).await;
    session.set_zoom(4.0).await.unwrap();
    let mut readout = session.subscribe_zoom();
    let writes = backend.calls().zoom_factors.len();

    backend.set_lock_failure(true);
    assert_eq!(session.select_next_device().await.unwrap().id, "front");

    // Nothing reached the hardware, so nothing is published
    assert_eq!(backend.calls().zoom_factors.len(), writes);
    assert!(!readout.has_changed().unwrap());
    assert_eq!(readout.borrow().current, 4.0);
    // New bounds govern clamping straight away
    assert_eq!(session.zoom_state().await.max, 3.0);

    // 1x is the nominal factor, but it was never written and must not be skipped
    backend.set_lock_failure(false);
    assert_eq!(session.set_zoom(1.0).await.unwrap(), 1.0);
    assert_eq!(backend.calls().zoom_factors.len(), writes + 1);
    let published = readout.borrow_and_update().clone();
    assert_eq!((published.current, published.max), (1.0, 3.0));
}
