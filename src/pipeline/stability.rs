use crate::config::{StabilityConfig, StreakFailurePolicy};
use crate::pipeline::analysis::GeometryRejection;
use std::time::Instant;
use tracing::{debug, info};

/// Why a frame did not count towards the stability streak.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disqualification {
    DetectionAbsent,
    LowConfidence,
    NotFrontal(GeometryRejection),
    /// First sample of a session; motion cannot be judged yet.
    NoMotionBaseline,
    MovingTooFast,
    /// Frame timestamp went backwards.
    OutOfOrder,
}

/// Outcome of analyzing one frame, as seen by the debouncer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameVerdict {
    Qualifying { prefer_burst: bool },
    Disqualified(Disqualification),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerDecision {
    pub prefer_burst: bool,
    pub fired_at: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebouncerPhase {
    Idle,
    Scanning,
    Accumulating,
    CoolingDown,
    /// Waiting out the post-burst delay before scanning re-arms.
    Rearming,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StabilityState {
    pub consecutive_qualifying_frames: u32,
    pub last_trigger_time: Option<Instant>,
    pub is_scanning: bool,
}

/// Hysteresis between "subject looks good" and "fire the shutter".
///
/// A trigger needs `threshold` consecutive qualifying frames outside the
/// cooldown window of the previous trigger. While the cooldown (or a post
/// burst hold) is open the streak is frozen at zero.
#[derive(Debug, Clone)]
pub struct StabilityDebouncer {
    config: StabilityConfig,
    state: StabilityState,
    hold_until: Option<Instant>,
    last_frame_at: Option<Instant>,
}

impl StabilityDebouncer {
    pub fn new(config: StabilityConfig) -> Self {
        Self {
            config,
            state: StabilityState::default(),
            hold_until: None,
            last_frame_at: None,
        }
    }

    pub fn state(&self) -> StabilityState {
        self.state
    }

    pub fn is_scanning(&self) -> bool {
        self.state.is_scanning
    }

    pub fn phase(&self, now: Instant) -> DebouncerPhase {
        if !self.state.is_scanning {
            DebouncerPhase::Idle
        } else if self.is_held(now) {
            DebouncerPhase::Rearming
        } else if self.in_cooldown(now) {
            DebouncerPhase::CoolingDown
        } else if self.state.consecutive_qualifying_frames > 0 {
            DebouncerPhase::Accumulating
        } else {
            DebouncerPhase::Scanning
        }
    }

    /// Starting or stopping a session wipes the streak. The cooldown survives
    /// so toggling cannot be used to bypass it.
    pub fn set_scanning(&mut self, scanning: bool) {
        self.state.consecutive_qualifying_frames = 0;
        self.state.is_scanning = scanning;
        self.hold_until = None;
        self.last_frame_at = None;
    }

    /// Freezes the streak until `until`. Used after a burst completes.
    pub fn hold_until(&mut self, until: Instant) {
        self.state.consecutive_qualifying_frames = 0;
        self.hold_until = Some(until);
    }

    pub fn in_cooldown(&self, now: Instant) -> bool {
        self.state
            .last_trigger_time
            .is_some_and(|last| now.saturating_duration_since(last) < self.config.cooldown())
    }

    fn is_held(&self, now: Instant) -> bool {
        self.hold_until.is_some_and(|until| now < until)
    }

    pub fn observe(&mut self, verdict: FrameVerdict, now: Instant) -> Option<TriggerDecision> {
        if !self.state.is_scanning {
            return None;
        }

        let verdict = match self.last_frame_at {
            Some(last) if now < last => FrameVerdict::Disqualified(Disqualification::OutOfOrder),
            _ => {
                self.last_frame_at = Some(now);
                verdict
            }
        };

        match verdict {
            FrameVerdict::Disqualified(reason) => {
                self.break_streak(reason);
                None
            }
            FrameVerdict::Qualifying { prefer_burst } => self.count_qualifying(prefer_burst, now),
        }
    }

    fn break_streak(&mut self, reason: Disqualification) {
        let streak = &mut self.state.consecutive_qualifying_frames;
        if *streak == 0 {
            return;
        }
        *streak = match self.config.failure_policy {
            StreakFailurePolicy::Reset => 0,
            StreakFailurePolicy::DecayByOne => *streak - 1,
        };
        debug!("Streak broken by {:?}, now {}", reason, streak);
    }

    fn count_qualifying(&mut self, prefer_burst: bool, now: Instant) -> Option<TriggerDecision> {
        if self.is_held(now) || self.in_cooldown(now) {
            return None;
        }
        self.hold_until = None;

        self.state.consecutive_qualifying_frames += 1;
        if self.state.consecutive_qualifying_frames < self.config.threshold {
            debug!(
                "Qualifying frame {}/{}",
                self.state.consecutive_qualifying_frames, self.config.threshold
            );
            return None;
        }

        self.state.consecutive_qualifying_frames = 0;
        self.state.last_trigger_time = Some(now);
        info!("Trigger fired (prefer_burst={})", prefer_burst);
        Some(TriggerDecision {
            prefer_burst,
            fired_at: now,
        })
    }
}
