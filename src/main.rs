use pawshot::camera::simulated::settling_pet_script;
use pawshot::camera::{FixedLightMeter, ScriptedDetector, SimulatedCamera, SyntheticFrameSource};
use pawshot::pipeline::orchestration::{PerformanceMonitor, PerformanceStats, PhotoSink};
use pawshot::{AppError, Configuration, CoordinatorBuilder};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, Level};

const PREVIEW_FPS: u32 = 30;
const PREVIEW_FRAMES: usize = 300;
const SETTLE_AFTER_FRAMES: usize = 90;

#[derive(Serialize)]
struct SessionSummary {
    stats: PerformanceStats,
    frames_dropped_at_source: usize,
    photos: Vec<String>,
}

fn init_logging(level: Level) {
    tracing_subscriber::fmt().with_max_level(level).init();
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let configuration = Configuration::load(config_path.as_deref())?;
    init_logging(configuration.runtime.tracing_level());
    info!("Loaded configuration: {:?}", configuration);

    let drain_time = configuration.burst.capture_timeout() + configuration.burst.rearm_delay();
    let detector = Arc::new(ScriptedDetector::new(settling_pet_script(
        PREVIEW_FRAMES,
        SETTLE_AFTER_FRAMES,
        42,
    )));
    let camera = Arc::new(SimulatedCamera::new().with_latency(Duration::from_millis(80)));
    let light_meter = Arc::new(FixedLightMeter::new(150.0));

    let monitor = PerformanceMonitor::new();
    let (photo_tx, mut photo_rx) = tokio::sync::mpsc::unbounded_channel();

    let coordinator = CoordinatorBuilder::new(configuration)
        .detector(detector)
        .camera(camera)
        .light_meter(light_meter)
        .observer(Box::new(monitor.clone()))
        .observer(Box::new(PhotoSink::new(photo_tx)))
        .build()?;
    let handle = coordinator.handle();

    handle.set_scanning(true).await?;
    let source = SyntheticFrameSource::start(handle.frame_sender(), PREVIEW_FPS, PREVIEW_FRAMES);
    let frames_dropped_at_source = tokio::task::spawn_blocking(move || source.join())
        .await
        .map_err(|e| AppError::Engine(format!("frame source failed: {}", e)))?;

    // Give outstanding captures and burst selection time to land
    tokio::time::sleep(drain_time).await;
    handle.set_scanning(false).await?;
    coordinator.shutdown().await?;

    let mut photos = Vec::new();
    while let Ok(photo) = photo_rx.try_recv() {
        photos.push(photo.id.to_string());
    }

    let summary = SessionSummary {
        stats: monitor.get_stats(),
        frames_dropped_at_source,
        photos,
    };
    let json = serde_json::to_string_pretty(&summary)
        .map_err(|e| AppError::Engine(format!("failed to serialize summary: {}", e)))?;
    println!("{}", json);
    Ok(())
}
