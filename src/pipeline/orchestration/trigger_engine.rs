use super::frame_context::FrameContext;
use super::metrics::{EngineObserver, EngineObservers};
use super::processing_step::ProcessingPipeline;
use crate::camera::CapturedImage;
use crate::common::Detection;
use crate::config::Configuration;
use crate::error::AppError;
use crate::pipeline::analysis::{GeometryValidator, MotionAnalyzer};
use crate::pipeline::capture::{
    CaptureCompletion, CaptureDispatcher, CaptureOrchestrator, CompletionOutcome, ScoredFrame,
};
use crate::pipeline::stability::{
    DebouncerPhase, StabilityDebouncer, StabilityState, TriggerDecision,
};
use crate::pipeline::steps::{ConfidenceGateStep, GeometryStep, MotionStep};
use std::time::{Duration, Instant};
use tracing::{debug, info};
use uuid::Uuid;

/// Frames of a finished burst waiting to be scored.
#[derive(Debug)]
pub struct SelectionJob {
    pub session: Uuid,
    pub frames: Vec<CapturedImage>,
}

/// The single owner of all mutable trigger state: the stability streak, the
/// cooldown clock and the burst session.
///
/// Everything here is synchronous and takes explicit timestamps. The async
/// side (detection, capture, selection) lives in the coordinator, which feeds
/// results back in one at a time.
pub struct TriggerEngine {
    pipeline: ProcessingPipeline,
    debouncer: StabilityDebouncer,
    orchestrator: CaptureOrchestrator,
    observers: EngineObservers,
    rearm_delay: Duration,
    epoch: u64,
}

impl TriggerEngine {
    pub fn new(configuration: &Configuration, dispatcher: Box<dyn CaptureDispatcher>) -> Self {
        let pipeline = ProcessingPipeline::new()
            .add_step(Box::new(ConfidenceGateStep::new(
                configuration.confidence.keypoint_threshold,
            )))
            .add_step(Box::new(GeometryStep::new(GeometryValidator::new(
                configuration.geometry.clone(),
            ))))
            .add_step(Box::new(MotionStep::new(MotionAnalyzer::new(
                configuration.motion.clone(),
            ))));

        Self {
            pipeline,
            debouncer: StabilityDebouncer::new(configuration.stability.clone()),
            orchestrator: CaptureOrchestrator::new(configuration.burst.clone(), dispatcher),
            observers: EngineObservers::new(),
            rearm_delay: configuration.burst.rearm_delay(),
            epoch: 0,
        }
    }

    pub fn with_observer(mut self, observer: Box<dyn EngineObserver>) -> Self {
        self.observers.add_observer(observer);
        self
    }

    pub fn add_observer(&mut self, observer: Box<dyn EngineObserver>) {
        self.observers.add_observer(observer);
    }

    /// Incremented on every scanning toggle. Analysis results stamped with an
    /// older epoch are discarded.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn is_scanning(&self) -> bool {
        self.debouncer.is_scanning()
    }

    pub fn stability(&self) -> StabilityState {
        self.debouncer.state()
    }

    pub fn phase(&self, now: Instant) -> DebouncerPhase {
        self.debouncer.phase(now)
    }

    pub fn orchestrator(&self) -> &CaptureOrchestrator {
        &self.orchestrator
    }

    /// Stopping lets captures already in flight finish and be delivered.
    /// Starting a new session abandons whatever burst is still open.
    pub fn set_scanning(&mut self, scanning: bool) {
        self.epoch += 1;
        self.debouncer.set_scanning(scanning);
        self.pipeline.reset();
        if scanning {
            self.orchestrator.clear();
        }
        info!("Scanning {}", if scanning { "started" } else { "stopped" });
        self.observers.notify_scanning_changed(scanning);
    }

    /// Commits one analyzed frame. Returns the trigger decision if this frame
    /// completed a streak.
    pub fn process_detection(
        &mut self,
        epoch: u64,
        detection: Option<Detection>,
        timestamp: Instant,
        light_level: f32,
    ) -> Result<Option<TriggerDecision>, AppError> {
        if epoch != self.epoch || !self.is_scanning() {
            debug!(
                "Discarding analysis from epoch {} (current {}, scanning={})",
                epoch,
                self.epoch,
                self.is_scanning()
            );
            return Ok(None);
        }

        let context = self
            .pipeline
            .process(FrameContext::new(timestamp, detection, light_level))?;
        let verdict = context.verdict();
        self.observers.notify_frame_processed(&context.metrics, &verdict);

        let Some(decision) = self.debouncer.observe(verdict, timestamp) else {
            return Ok(None);
        };

        let outcome = self.orchestrator.on_trigger(decision.prefer_burst);
        self.observers.notify_trigger(&decision, outcome);
        Ok(Some(decision))
    }

    /// Returns a job when a burst has all of its frames.
    pub fn on_capture_completed(
        &mut self,
        completion: CaptureCompletion,
        now: Instant,
    ) -> Option<SelectionJob> {
        match self.orchestrator.on_capture_completed(completion) {
            CompletionOutcome::SingleShot(image) => {
                info!("Single capture {} delivered", image.id);
                self.observers.notify_best_frame(&image);
                None
            }
            CompletionOutcome::SingleShotFailed(error) => {
                self.observers.notify_capture_failed(&error);
                None
            }
            CompletionOutcome::BurstProgress { received, expected } => {
                debug!("Burst progress {}/{}", received, expected);
                None
            }
            CompletionOutcome::BurstReady { session, frames } => {
                Some(SelectionJob { session, frames })
            }
            CompletionOutcome::BurstFailed { session } => {
                info!("Burst {} failed entirely, re-arming", session);
                self.debouncer.hold_until(now + self.rearm_delay);
                None
            }
            CompletionOutcome::Stale => None,
        }
    }

    pub fn on_selection_finished(
        &mut self,
        session: Uuid,
        best: Option<ScoredFrame>,
        now: Instant,
    ) {
        if !self.orchestrator.on_selection_finished(session) {
            debug!("Selection for stale burst {} discarded", session);
            return;
        }

        if let Some(best) = best {
            info!(
                "Burst {} selected frame {} (score {:.3})",
                session, best.image.id, best.score
            );
            self.observers.notify_best_frame(&best.image);
        }
        self.debouncer.hold_until(now + self.rearm_delay);
    }
}
