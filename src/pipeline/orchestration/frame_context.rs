use crate::common::{Detection, PoseSample};
use crate::pipeline::analysis::MotionAssessment;
use crate::pipeline::stability::{Disqualification, FrameVerdict};
use indexmap::IndexMap;
use serde::Serialize;
use std::time::Instant;

/// Context object that flows through the processing pipeline
/// Contains all the state needed for judging a single frame
#[derive(Debug, Clone)]
pub struct FrameContext {
    pub timestamp: Instant,
    pub detection: Option<Detection>,
    /// Set by the confidence gate when all three landmarks are usable.
    pub sample: Option<PoseSample>,
    pub light_level: f32,
    pub motion: Option<MotionAssessment>,
    pub disqualification: Option<Disqualification>,
    pub metrics: FrameMetrics,
    pub processing_start: Instant,
}

impl FrameContext {
    pub fn new(timestamp: Instant, detection: Option<Detection>, light_level: f32) -> Self {
        Self {
            timestamp,
            detection,
            sample: None,
            light_level,
            motion: None,
            disqualification: None,
            metrics: FrameMetrics::new(),
            processing_start: Instant::now(),
        }
    }

    /// Only the first reason is kept.
    pub fn disqualify(&mut self, reason: Disqualification) {
        self.disqualification.get_or_insert(reason);
    }

    pub fn is_disqualified(&self) -> bool {
        self.disqualification.is_some()
    }

    pub fn verdict(&self) -> FrameVerdict {
        if let Some(reason) = self.disqualification {
            return FrameVerdict::Disqualified(reason);
        }
        match self.motion {
            Some(motion) if motion.stable => FrameVerdict::Qualifying {
                prefer_burst: motion.needs_burst_safety_net,
            },
            Some(_) => FrameVerdict::Disqualified(Disqualification::MovingTooFast),
            None => FrameVerdict::Disqualified(Disqualification::NoMotionBaseline),
        }
    }
}

/// Metrics collected during frame processing
#[derive(Debug, Clone, Default, Serialize)]
pub struct FrameMetrics {
    /// Per-step durations in pipeline order.
    pub step_durations_us: IndexMap<&'static str, u64>,
    pub total_processing_duration_us: u64,
}

impl FrameMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_duration(&mut self, step: &'static str, duration_us: u64) {
        self.step_durations_us.insert(step, duration_us);
    }

    pub fn finalize(&mut self, start_time: Instant) {
        self.total_processing_duration_us = start_time.elapsed().as_micros() as u64;
    }
}
