use crate::{
    camera::{CameraDevice, LightMeter, PoseDetector},
    common::{Detection, Frame},
    config::Configuration,
    error::{AppError, CaptureError},
    pipeline::{
        capture::{
            BurstFrameSelector, CaptureCompletion, CaptureDispatcher, CaptureRequest, ScoredFrame,
        },
        orchestration::{EngineObserver, SelectionJob, TriggerEngine},
        stability::DebouncerPhase,
    },
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::mpsc::{Receiver, Sender};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Everything that mutates engine state arrives here, one message at a time.
enum EngineCommand {
    SetScanning(bool),
    PoseAnalyzed {
        epoch: u64,
        captured_at: Instant,
        light_level: f32,
        detection: Option<Detection>,
    },
    CaptureCompleted(CaptureCompletion),
    SelectionFinished {
        session: Uuid,
        best: Option<ScoredFrame>,
    },
    Snapshot {
        responder: oneshot::Sender<EngineSnapshot>,
    },
}

/// Point-in-time view of the engine, e.g. for a status overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSnapshot {
    pub scanning: bool,
    pub phase: DebouncerPhase,
    pub streak: u32,
    pub burst_active: bool,
    pub frames_dropped: usize,
}

// Follows the tokio clock so paused-time tests see consistent timestamps.
fn now() -> Instant {
    tokio::time::Instant::now().into_std()
}

/// Runs each capture on its own task and posts the result back to the actor.
struct SpawningDispatcher {
    camera: Arc<dyn CameraDevice>,
    completions: Sender<EngineCommand>,
    timeout: Duration,
}

impl CaptureDispatcher for SpawningDispatcher {
    fn dispatch(&mut self, request: CaptureRequest) {
        let camera = Arc::clone(&self.camera);
        let completions = self.completions.clone();
        let timeout = self.timeout;

        tokio::spawn(async move {
            let capture = tokio::spawn(async move {
                tokio::time::timeout(timeout, camera.capture(request.quality)).await
            });
            // A capture that never reports back would pin the burst session open
            let result = match capture.await {
                Ok(Ok(result)) => result,
                Ok(Err(_)) => Err(CaptureError::Timeout(timeout.as_millis() as u64)),
                Err(e) => Err(CaptureError::Hardware(format!("capture task failed: {}", e))),
            };
            let completion = CaptureCompletion { request, result };
            if completions
                .send(EngineCommand::CaptureCompleted(completion))
                .await
                .is_err()
            {
                debug!("Engine stopped before capture #{} returned", request.sequence);
            }
        });
    }
}

struct EngineActor {
    engine: TriggerEngine,
    detector: Arc<dyn PoseDetector>,
    selector: Arc<BurstFrameSelector>,
    light_meter: Arc<dyn LightMeter>,
    command_tx: Sender<EngineCommand>,
    analysis_timeout: Duration,
    /// Epoch of the analysis currently running, if any.
    analysis_in_flight: Option<u64>,
    frames_dropped: usize,
}

impl EngineActor {
    async fn run(
        mut self,
        mut command_rx: Receiver<EngineCommand>,
        mut frame_rx: Receiver<Frame>,
        cancel_token: CancellationToken,
    ) {
        info!("Trigger engine started - waiting for frames...");
        loop {
            tokio::select! {
                biased;
                _ = cancel_token.cancelled() => break,
                Some(command) = command_rx.recv() => self.handle_command(command),
                Some(frame) = frame_rx.recv() => self.handle_frame(frame),
                else => break,
            }
        }
        info!("Trigger engine stopped");
    }

    fn handle_frame(&mut self, frame: Frame) {
        if !self.engine.is_scanning() {
            return;
        }
        if self.analysis_in_flight.is_some() {
            // Stale decisions are worse than missed frames
            self.frames_dropped += 1;
            debug!("Dropping frame {}: analysis in flight", frame.frame_id());
            return;
        }

        let epoch = self.engine.epoch();
        self.analysis_in_flight = Some(epoch);

        // Judged against the light the frame was taken in
        let light_level = self.light_meter.current_light_proxy();
        let captured_at = frame.captured_at();
        let detector = Arc::clone(&self.detector);
        let command_tx = self.command_tx.clone();
        let timeout = self.analysis_timeout;

        tokio::spawn(async move {
            let analysis = tokio::spawn(async move {
                tokio::time::timeout(timeout, detector.detect_pose(frame.image())).await
            });
            let detection = match analysis.await {
                Ok(Ok(detection)) => detection,
                Ok(Err(_)) => {
                    warn!("Pose detection exceeded {:?}, treating as no detection", timeout);
                    None
                }
                Err(e) => {
                    error!("Pose detection task failed: {}", e);
                    None
                }
            };
            let analyzed = EngineCommand::PoseAnalyzed {
                epoch,
                captured_at,
                light_level,
                detection,
            };
            if command_tx.send(analyzed).await.is_err() {
                debug!("Engine stopped before analysis returned");
            }
        });
    }

    fn handle_command(&mut self, command: EngineCommand) {
        match command {
            EngineCommand::SetScanning(scanning) => {
                // Any pending result now carries an old epoch and is discarded on arrival
                self.analysis_in_flight = None;
                self.engine.set_scanning(scanning);
            }
            EngineCommand::PoseAnalyzed {
                epoch,
                captured_at,
                light_level,
                detection,
            } => {
                if self.analysis_in_flight == Some(epoch) {
                    self.analysis_in_flight = None;
                }
                if let Err(e) =
                    self.engine
                        .process_detection(epoch, detection, captured_at, light_level)
                {
                    error!("Frame analysis error: {}", e);
                }
            }
            EngineCommand::CaptureCompleted(completion) => {
                if let Some(job) = self.engine.on_capture_completed(completion, now()) {
                    self.spawn_selection(job);
                }
            }
            EngineCommand::SelectionFinished { session, best } => {
                self.engine.on_selection_finished(session, best, now());
            }
            EngineCommand::Snapshot { responder } => {
                let _ = responder.send(self.snapshot());
            }
        }
    }

    fn spawn_selection(&self, job: SelectionJob) {
        let selector = Arc::clone(&self.selector);
        let command_tx = self.command_tx.clone();

        let session = job.session;
        tokio::spawn(async move {
            let selection = tokio::spawn(async move { selector.select_best(job.frames).await });
            let best = match selection.await {
                Ok(best) => best,
                Err(e) => {
                    error!("Selection for burst {} failed: {}", session, e);
                    None
                }
            };
            let finished = EngineCommand::SelectionFinished { session, best };
            if command_tx.send(finished).await.is_err() {
                debug!("Engine stopped before burst {} was selected", session);
            }
        });
    }

    fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            scanning: self.engine.is_scanning(),
            phase: self.engine.phase(now()),
            streak: self.engine.stability().consecutive_qualifying_frames,
            burst_active: self.engine.orchestrator().is_burst_active(),
            frames_dropped: self.frames_dropped,
        }
    }
}

/// Cloneable front door to a running engine.
#[derive(Clone)]
pub struct EngineHandle {
    commands: Sender<EngineCommand>,
    frames: Sender<Frame>,
}

impl EngineHandle {
    /// Never blocks. Returns `false` if the frame was dropped.
    pub fn submit_frame(&self, frame: Frame) -> bool {
        match self.frames.try_send(frame) {
            Ok(()) => true,
            Err(TrySendError::Full(frame)) => {
                warn!("Dropping frame {}: channel full", frame.frame_id());
                false
            }
            Err(TrySendError::Closed(_)) => {
                warn!("Frame channel closed, engine is not running");
                false
            }
        }
    }

    /// Sender for producers that push frames themselves.
    pub fn frame_sender(&self) -> Sender<Frame> {
        self.frames.clone()
    }

    pub async fn set_scanning(&self, scanning: bool) -> Result<(), AppError> {
        self.commands
            .send(EngineCommand::SetScanning(scanning))
            .await
            .map_err(|_| AppError::ChannelClosed)
    }

    pub async fn snapshot(&self) -> Result<EngineSnapshot, AppError> {
        let (responder, response) = oneshot::channel();
        self.commands
            .send(EngineCommand::Snapshot { responder })
            .await
            .map_err(|_| AppError::ChannelClosed)?;
        response.await.map_err(|_| AppError::ChannelClosed)
    }
}

pub struct Coordinator {
    engine_task: Option<tokio::task::JoinHandle<()>>,
    cancel_token: CancellationToken,
    handle: EngineHandle,
}

impl Coordinator {
    pub fn handle(&self) -> EngineHandle {
        self.handle.clone()
    }

    pub fn stop(&self) {
        self.cancel_token.cancel();
    }

    /// Stops the engine and waits for its task to finish.
    pub async fn shutdown(mut self) -> Result<(), AppError> {
        self.cancel_token.cancel();
        if let Some(task) = self.engine_task.take() {
            task.await
                .map_err(|e| AppError::Engine(format!("engine task failed: {}", e)))?;
        }
        Ok(())
    }
}

impl Drop for Coordinator {
    fn drop(&mut self) {
        self.stop();
    }
}

pub struct CoordinatorBuilder {
    configuration: Configuration,
    detector: Option<Arc<dyn PoseDetector>>,
    camera: Option<Arc<dyn CameraDevice>>,
    light_meter: Option<Arc<dyn LightMeter>>,
    observers: Vec<Box<dyn EngineObserver>>,
}

impl CoordinatorBuilder {
    pub fn new(configuration: Configuration) -> Self {
        Self {
            configuration,
            detector: None,
            camera: None,
            light_meter: None,
            observers: Vec::new(),
        }
    }

    pub fn detector(mut self, detector: Arc<dyn PoseDetector>) -> Self {
        self.detector = Some(detector);
        self
    }

    pub fn camera(mut self, camera: Arc<dyn CameraDevice>) -> Self {
        self.camera = Some(camera);
        self
    }

    pub fn light_meter(mut self, light_meter: Arc<dyn LightMeter>) -> Self {
        self.light_meter = Some(light_meter);
        self
    }

    pub fn observer(mut self, observer: Box<dyn EngineObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    // Sets the stability threshold, this will override the default configuration.
    pub fn stability_threshold(mut self, threshold: u32) -> Self {
        self.configuration.stability.threshold = threshold;
        self
    }

    // Sets the trigger cooldown, this will override the default configuration.
    pub fn cooldown(mut self, cooldown: Duration) -> Self {
        self.configuration.stability.cooldown_ms = cooldown.as_millis() as u64;
        self
    }

    // Adjusts the burst size, this will override the default configuration.
    pub fn burst_size(mut self, target_count: usize) -> Self {
        self.configuration.burst.target_count = target_count;
        self
    }

    // Adjusts the frame buffer size, this will override the default configuration.
    pub fn frame_buffer_size(mut self, frame_buffer_size: usize) -> Self {
        self.configuration.runtime.frame_buffer_size = frame_buffer_size;
        self
    }

    /// Spawns the engine task. Must be called from within a tokio runtime.
    pub fn build(self) -> Result<Coordinator, AppError> {
        self.configuration.validate()?;
        let detector = self
            .detector
            .ok_or(AppError::Engine("Pose detector not set".to_string()))?;
        let camera = self
            .camera
            .ok_or(AppError::Engine("Camera not set".to_string()))?;
        let light_meter = self
            .light_meter
            .ok_or(AppError::Engine("Light meter not set".to_string()))?;

        let runtime = &self.configuration.runtime;
        let (command_tx, command_rx) = tokio::sync::mpsc::channel(runtime.command_buffer_size);
        let (frame_tx, frame_rx) = tokio::sync::mpsc::channel(runtime.frame_buffer_size);

        let dispatcher = SpawningDispatcher {
            camera,
            completions: command_tx.clone(),
            timeout: self.configuration.burst.capture_timeout(),
        };
        let mut engine = TriggerEngine::new(&self.configuration, Box::new(dispatcher));
        for observer in self.observers {
            engine.add_observer(observer);
        }

        let actor = EngineActor {
            engine,
            selector: Arc::new(BurstFrameSelector::new(Arc::clone(&detector))),
            detector,
            light_meter,
            command_tx: command_tx.clone(),
            analysis_timeout: runtime.analysis_timeout(),
            analysis_in_flight: None,
            frames_dropped: 0,
        };

        let cancel_token = CancellationToken::new();
        let engine_task = tokio::spawn(actor.run(command_rx, frame_rx, cancel_token.clone()));

        Ok(Coordinator {
            engine_task: Some(engine_task),
            cancel_token,
            handle: EngineHandle {
                commands: command_tx,
                frames: frame_tx,
            },
        })
    }
}
