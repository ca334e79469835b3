use super::frame_context::FrameMetrics;
use crate::camera::CapturedImage;
use crate::error::CaptureError;
use crate::pipeline::capture::TriggerOutcome;
use crate::pipeline::stability::{Disqualification, FrameVerdict, TriggerDecision};
use indexmap::IndexMap;
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};

/// Hooks the engine exposes to the UI, persistence and metrics.
///
/// Every method has a no-op default so observers only implement what they
/// care about.
pub trait EngineObserver: Send {
    fn on_session_scanning_changed(&mut self, _scanning: bool) {}
    fn on_trigger_decision(&mut self, _decision: &TriggerDecision, _outcome: TriggerOutcome) {}
    fn on_best_frame_selected(&mut self, _image: &CapturedImage) {}
    fn on_capture_failed(&mut self, _error: &CaptureError) {}
    fn on_frame_processed(&mut self, _metrics: &FrameMetrics, _verdict: &FrameVerdict) {}
}

/// Fans engine events out to every registered observer
pub struct EngineObservers {
    observers: Vec<Box<dyn EngineObserver>>,
}

impl EngineObservers {
    pub fn new() -> Self {
        Self {
            observers: Vec::new(),
        }
    }

    pub fn add_observer(&mut self, observer: Box<dyn EngineObserver>) {
        self.observers.push(observer);
    }

    pub fn notify_scanning_changed(&mut self, scanning: bool) {
        for observer in &mut self.observers {
            observer.on_session_scanning_changed(scanning);
        }
    }

    pub fn notify_trigger(&mut self, decision: &TriggerDecision, outcome: TriggerOutcome) {
        for observer in &mut self.observers {
            observer.on_trigger_decision(decision, outcome);
        }
    }

    pub fn notify_best_frame(&mut self, image: &CapturedImage) {
        for observer in &mut self.observers {
            observer.on_best_frame_selected(image);
        }
    }

    pub fn notify_capture_failed(&mut self, error: &CaptureError) {
        for observer in &mut self.observers {
            observer.on_capture_failed(error);
        }
    }

    pub fn notify_frame_processed(&mut self, metrics: &FrameMetrics, verdict: &FrameVerdict) {
        for observer in &mut self.observers {
            observer.on_frame_processed(metrics, verdict);
        }
    }
}

impl Default for EngineObservers {
    fn default() -> Self {
        Self::new()
    }
}

impl Disqualification {
    pub fn label(&self) -> &'static str {
        match self {
            Disqualification::DetectionAbsent => "detection_absent",
            Disqualification::LowConfidence => "low_confidence",
            Disqualification::NotFrontal(_) => "not_frontal",
            Disqualification::NoMotionBaseline => "no_motion_baseline",
            Disqualification::MovingTooFast => "moving_too_fast",
            Disqualification::OutOfOrder => "out_of_order",
        }
    }
}

/// Performance monitoring observer. Clones share the same stats.
#[derive(Clone)]
pub struct PerformanceMonitor {
    stats: Arc<Mutex<PerformanceStats>>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PerformanceStats {
    pub total_frames_processed: usize,
    pub qualifying_frames: usize,
    pub disqualified_frames: IndexMap<&'static str, usize>,
    pub triggers: usize,
    pub ignored_triggers: usize,
    pub single_shots: usize,
    pub bursts: usize,
    pub photos_delivered: usize,
    pub captures_failed: usize,
    pub is_scanning: bool,

    // EWMA of the per-frame analysis time
    pub average_frame_time_us: f32,
    pub max_frame_time_us: u64,
}

impl PerformanceMonitor {
    pub fn new() -> Self {
        Self {
            stats: Arc::new(Mutex::new(PerformanceStats::default())),
        }
    }

    pub fn get_stats(&self) -> PerformanceStats {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, PerformanceStats> {
        self.stats
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn update_ewma(current: f32, new_value: u64, alpha: f32) -> f32 {
        current * (1.0 - alpha) + new_value as f32 * alpha
    }
}

impl Default for PerformanceMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineObserver for PerformanceMonitor {
    fn on_session_scanning_changed(&mut self, scanning: bool) {
        self.lock().is_scanning = scanning;
    }

    fn on_trigger_decision(&mut self, _decision: &TriggerDecision, outcome: TriggerOutcome) {
        let mut stats = self.lock();
        stats.triggers += 1;
        match outcome {
            TriggerOutcome::Ignored => stats.ignored_triggers += 1,
            TriggerOutcome::SingleShot => stats.single_shots += 1,
            TriggerOutcome::BurstStarted(_) => stats.bursts += 1,
        }
    }

    fn on_best_frame_selected(&mut self, _image: &CapturedImage) {
        self.lock().photos_delivered += 1;
    }

    fn on_capture_failed(&mut self, _error: &CaptureError) {
        self.lock().captures_failed += 1;
    }

    fn on_frame_processed(&mut self, metrics: &FrameMetrics, verdict: &FrameVerdict) {
        let mut stats = self.lock();
        stats.total_frames_processed += 1;
        match verdict {
            FrameVerdict::Qualifying { .. } => stats.qualifying_frames += 1,
            FrameVerdict::Disqualified(reason) => {
                *stats.disqualified_frames.entry(reason.label()).or_insert(0) += 1;
            }
        }

        const ALPHA: f32 = 0.1; // EWMA smoothing factor
        stats.average_frame_time_us = if stats.total_frames_processed == 1 {
            metrics.total_processing_duration_us as f32
        } else {
            Self::update_ewma(
                stats.average_frame_time_us,
                metrics.total_processing_duration_us,
                ALPHA,
            )
        };
        stats.max_frame_time_us = stats
            .max_frame_time_us
            .max(metrics.total_processing_duration_us);
    }
}

/// Hands each selected photo to a channel, e.g. for persistence.
pub struct PhotoSink {
    photos: tokio::sync::mpsc::UnboundedSender<CapturedImage>,
}

impl PhotoSink {
    pub fn new(photos: tokio::sync::mpsc::UnboundedSender<CapturedImage>) -> Self {
        Self { photos }
    }
}

impl EngineObserver for PhotoSink {
    fn on_best_frame_selected(&mut self, image: &CapturedImage) {
        if self.photos.send(image.clone()).is_err() {
            tracing::warn!("Photo receiver dropped, discarding photo {}", image.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn monitor_counts_verdicts_and_triggers() {
        let monitor = PerformanceMonitor::new();
        let mut observers = EngineObservers::new();
        observers.add_observer(Box::new(monitor.clone()));

        let metrics = FrameMetrics {
            total_processing_duration_us: 40,
            ..FrameMetrics::default()
        };
        observers.notify_frame_processed(
            &metrics,
            &FrameVerdict::Qualifying {
                prefer_burst: false,
            },
        );
        observers.notify_frame_processed(
            &metrics,
            &FrameVerdict::Disqualified(Disqualification::LowConfidence),
        );
        observers.notify_trigger(
            &TriggerDecision {
                prefer_burst: false,
                fired_at: Instant::now(),
            },
            TriggerOutcome::SingleShot,
        );

        let stats = monitor.get_stats();
        assert_eq!(stats.total_frames_processed, 2);
        assert_eq!(stats.qualifying_frames, 1);
        assert_eq!(stats.disqualified_frames.get("low_confidence"), Some(&1));
        assert_eq!(stats.single_shots, 1);
        assert!((stats.average_frame_time_us - 40.0).abs() < 1e-3);
        assert_eq!(stats.max_frame_time_us, 40);
    }
}
