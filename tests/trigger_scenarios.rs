use image::{DynamicImage, ImageBuffer, Rgb};
use pawshot::camera::{
    CapturedImage, FixedLightMeter, PoseDetector, ScriptedDetector, SimulatedCamera,
};
use pawshot::common::{Detection, Frame, Keypoint};
use pawshot::pipeline::orchestration::{PerformanceMonitor, PhotoSink};
use pawshot::{Configuration, Coordinator, CoordinatorBuilder, EngineHandle};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;

const FRAME_INTERVAL: Duration = Duration::from_millis(33);

fn face(nose_y: f32) -> Option<Detection> {
    Some(Detection::full(
        Keypoint::new(0.4, 0.6, 0.9),
        Keypoint::new(0.6, 0.6, 0.9),
        Keypoint::new(0.5, nose_y, 0.9),
    ))
}

/// Nose bouncing by 0.01 every frame: stable in daylight, too fast at night.
fn drifting_face(frames: usize) -> Vec<Option<Detection>> {
    (0..frames)
        .map(|i| face(if i % 2 == 0 { 0.50 } else { 0.51 }))
        .collect()
}

fn still_detector() -> Arc<ScriptedDetector> {
    Arc::new(ScriptedDetector::new(Vec::<Option<Detection>>::new()).with_fallback(face(0.5)))
}

struct Session {
    coordinator: Coordinator,
    handle: EngineHandle,
    monitor: PerformanceMonitor,
    photos: UnboundedReceiver<CapturedImage>,
}

fn start(
    detector: Arc<dyn PoseDetector>,
    camera: Arc<SimulatedCamera>,
    light_meter: Arc<FixedLightMeter>,
) -> Session {
    let monitor = PerformanceMonitor::new();
    let (photo_tx, photos) = tokio::sync::mpsc::unbounded_channel();
    let coordinator = CoordinatorBuilder::new(Configuration::default())
        .detector(detector)
        .camera(camera)
        .light_meter(light_meter)
        .observer(Box::new(monitor.clone()))
        .observer(Box::new(PhotoSink::new(photo_tx)))
        .build()
        .expect("Failed to build coordinator");
    let handle = coordinator.handle();
    Session {
        coordinator,
        handle,
        monitor,
        photos,
    }
}

async fn stream_frames(handle: &EngineHandle, count: usize) {
    for _ in 0..count {
        let image = DynamicImage::ImageRgb8(ImageBuffer::<Rgb<u8>, Vec<u8>>::from_pixel(
            16,
            12,
            Rgb([90, 90, 90]),
        ));
        handle.submit_frame(Frame::new(image, tokio::time::Instant::now().into_std()));
        tokio::time::sleep(FRAME_INTERVAL).await;
    }
}

fn drain(photos: &mut UnboundedReceiver<CapturedImage>) -> usize {
    let mut delivered = 0;
    while photos.try_recv().is_ok() {
        delivered += 1;
    }
    delivered
}

#[tokio::test(start_paused = true)]
async fn still_pet_gets_one_photo_per_cooldown() {
    let detector = still_detector();
    let camera = Arc::new(SimulatedCamera::new());
    let mut session = start(detector, camera.clone(), Arc::new(FixedLightMeter::new(100.0)));

    session.handle.set_scanning(true).await.unwrap();
    // ~1.3s of preview, shorter than the 1.5s cooldown
    stream_frames(&session.handle, 40).await;

    assert_eq!(camera.captures(), 1);
    assert_eq!(camera.speed_captures(), 0);
    assert_eq!(drain(&mut session.photos), 1);

    let stats = session.monitor.get_stats();
    assert_eq!(stats.single_shots, 1);
    assert_eq!(stats.bursts, 0);
    assert_eq!(stats.total_frames_processed, 40);
    session.coordinator.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn drifting_pet_gets_best_frame_of_a_burst() {
    let detector = Arc::new(ScriptedDetector::new(drifting_face(200)));
    let camera = Arc::new(SimulatedCamera::new().with_latency(Duration::from_millis(50)));
    let mut session = start(detector, camera.clone(), Arc::new(FixedLightMeter::new(100.0)));

    session.handle.set_scanning(true).await.unwrap();
    stream_frames(&session.handle, 40).await;

    assert_eq!(camera.speed_captures(), 4);
    assert_eq!(drain(&mut session.photos), 1);

    let stats = session.monitor.get_stats();
    assert_eq!(stats.bursts, 1);
    assert_eq!(stats.photos_delivered, 1);
    assert!(!session.handle.snapshot().await.unwrap().burst_active);
    session.coordinator.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn dim_light_tightens_the_motion_ceiling() {
    let detector = Arc::new(ScriptedDetector::new(drifting_face(200)));
    let camera = Arc::new(SimulatedCamera::new());
    let light_meter = Arc::new(FixedLightMeter::new(1000.0));
    let mut session = start(detector, camera.clone(), light_meter.clone());

    session.handle.set_scanning(true).await.unwrap();
    stream_frames(&session.handle, 20).await;
    assert_eq!(camera.captures(), 0);
    assert_eq!(
        session
            .monitor
            .get_stats()
            .disqualified_frames
            .get("moving_too_fast"),
        Some(&19)
    );

    light_meter.set_iso(100.0);
    stream_frames(&session.handle, 10).await;
    assert_eq!(camera.speed_captures(), 4);
    assert_eq!(drain(&mut session.photos), 1);
    session.coordinator.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn failed_capture_is_reported_and_next_trigger_recovers() {
    let detector = still_detector();
    let camera = Arc::new(SimulatedCamera::new().with_failures(1));
    let mut session = start(detector, camera.clone(), Arc::new(FixedLightMeter::new(100.0)));

    session.handle.set_scanning(true).await.unwrap();
    // two cooldown windows worth of preview
    stream_frames(&session.handle, 60).await;

    let stats = session.monitor.get_stats();
    assert_eq!(stats.single_shots, 2);
    assert_eq!(stats.captures_failed, 1);
    assert_eq!(drain(&mut session.photos), 1);
    session.coordinator.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn scanning_off_stops_all_captures() {
    let detector = still_detector();
    let camera = Arc::new(SimulatedCamera::new());
    let light_meter = Arc::new(FixedLightMeter::new(100.0));
    let session = start(detector.clone(), camera.clone(), light_meter);

    session.handle.set_scanning(true).await.unwrap();
    stream_frames(&session.handle, 2).await;
    session.handle.set_scanning(false).await.unwrap();
    stream_frames(&session.handle, 20).await;

    assert_eq!(detector.calls(), 2);
    assert_eq!(camera.captures(), 0);
    let snapshot = session.handle.snapshot().await.unwrap();
    assert!(!snapshot.scanning);
    assert_eq!(snapshot.streak, 0);
    session.coordinator.shutdown().await.unwrap();
}
