use crate::camera::{CaptureQuality, CapturedImage};
use crate::config::BurstConfig;
use crate::error::CaptureError;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// One capture command handed to the hardware side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureRequest {
    /// Burst this capture belongs to, `None` for single shots.
    pub burst: Option<Uuid>,
    pub sequence: usize,
    pub quality: CaptureQuality,
}

#[derive(Debug)]
pub struct CaptureCompletion {
    pub request: CaptureRequest,
    pub result: Result<CapturedImage, CaptureError>,
}

/// Issues capture commands without waiting for them. Completions must be fed
/// back through [`CaptureOrchestrator::on_capture_completed`].
pub trait CaptureDispatcher: Send {
    fn dispatch(&mut self, request: CaptureRequest);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BurstPhase {
    Collecting,
    /// All captures are in; the selector is running.
    Selecting,
}

#[derive(Debug)]
pub struct BurstSession {
    pub id: Uuid,
    pub buffer: Vec<CapturedImage>,
    pub expected_count: usize,
    pub target_count: usize,
    pub phase: BurstPhase,
}

impl BurstSession {
    fn new(target_count: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            buffer: Vec::with_capacity(target_count),
            expected_count: target_count,
            target_count,
            phase: BurstPhase::Collecting,
        }
    }

    fn is_complete(&self) -> bool {
        self.buffer.len() >= self.expected_count
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// A burst is already running.
    Ignored,
    SingleShot,
    BurstStarted(Uuid),
}

#[derive(Debug)]
pub enum CompletionOutcome {
    SingleShot(CapturedImage),
    SingleShotFailed(CaptureError),
    BurstProgress { received: usize, expected: usize },
    BurstReady { session: Uuid, frames: Vec<CapturedImage> },
    /// Every capture of the burst failed; nothing to select from.
    BurstFailed { session: Uuid },
    /// Completion for a session that no longer exists.
    Stale,
}

/// Turns trigger decisions into capture commands and collects burst frames.
///
/// At most one burst session exists at a time; triggers while one is open are
/// dropped.
pub struct CaptureOrchestrator {
    config: BurstConfig,
    dispatcher: Box<dyn CaptureDispatcher>,
    burst: Option<BurstSession>,
    single_shots: usize,
}

impl CaptureOrchestrator {
    pub fn new(config: BurstConfig, dispatcher: Box<dyn CaptureDispatcher>) -> Self {
        Self {
            config,
            dispatcher,
            burst: None,
            single_shots: 0,
        }
    }

    pub fn burst(&self) -> Option<&BurstSession> {
        self.burst.as_ref()
    }

    pub fn is_burst_active(&self) -> bool {
        self.burst.is_some()
    }

    pub fn on_trigger(&mut self, prefer_burst: bool) -> TriggerOutcome {
        if let Some(session) = &self.burst {
            debug!("Trigger ignored, burst {} still active", session.id);
            return TriggerOutcome::Ignored;
        }

        if !prefer_burst {
            let sequence = self.single_shots;
            self.single_shots += 1;
            info!("Issuing single capture #{}", sequence);
            self.dispatcher.dispatch(CaptureRequest {
                burst: None,
                sequence,
                quality: CaptureQuality::Balanced,
            });
            return TriggerOutcome::SingleShot;
        }

        let session = BurstSession::new(self.config.target_count);
        let id = session.id;
        info!("Starting burst {} of {} frames", id, session.target_count);
        self.burst = Some(session);

        for sequence in 0..self.config.target_count {
            self.dispatcher.dispatch(CaptureRequest {
                burst: Some(id),
                sequence,
                quality: CaptureQuality::Speed,
            });
        }
        TriggerOutcome::BurstStarted(id)
    }

    pub fn on_capture_completed(&mut self, completion: CaptureCompletion) -> CompletionOutcome {
        let Some(burst_id) = completion.request.burst else {
            return match completion.result {
                Ok(image) => CompletionOutcome::SingleShot(image),
                Err(error) => {
                    warn!("Single capture failed: {}", error);
                    CompletionOutcome::SingleShotFailed(error)
                }
            };
        };

        let Some(session) = self
            .burst
            .as_mut()
            .filter(|session| session.id == burst_id && session.phase == BurstPhase::Collecting)
        else {
            debug!("Dropping completion for stale burst {}", burst_id);
            return CompletionOutcome::Stale;
        };

        match completion.result {
            Ok(image) => session.buffer.push(image),
            Err(error) => {
                warn!(
                    "Burst {} capture #{} failed: {}",
                    burst_id, completion.request.sequence, error
                );
                session.expected_count = session.expected_count.saturating_sub(1);
            }
        }

        if !session.is_complete() {
            return CompletionOutcome::BurstProgress {
                received: session.buffer.len(),
                expected: session.expected_count,
            };
        }

        if session.buffer.is_empty() {
            warn!("Burst {} produced no frames", burst_id);
            self.burst = None;
            return CompletionOutcome::BurstFailed { session: burst_id };
        }

        session.phase = BurstPhase::Selecting;
        let frames = std::mem::take(&mut session.buffer);
        info!("Burst {} complete with {} frames", burst_id, frames.len());
        CompletionOutcome::BurstReady {
            session: burst_id,
            frames,
        }
    }

    /// Closes the session once its best frame has been picked.
    pub fn on_selection_finished(&mut self, session: Uuid) -> bool {
        match &self.burst {
            Some(active) if active.id == session => {
                self.burst = None;
                true
            }
            _ => false,
        }
    }

    /// Abandons any open burst. Late completions for it become stale.
    pub fn clear(&mut self) {
        if let Some(session) = self.burst.take() {
            info!("Discarding burst {}", session.id);
        }
    }
}
