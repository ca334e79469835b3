use crate::camera::{CapturedImage, PoseDetector};
use crate::common::Detection;
use std::sync::Arc;
use tracing::debug;

/// Score for a frame where something was detected but not both eyes.
pub const PARTIAL_DETECTION_SCORE: f32 = 0.1;
/// Score for a frame where nothing was detected.
pub const UNDETECTED_SCORE: f32 = 0.0;

#[derive(Debug, Clone)]
pub struct ScoredFrame {
    pub image: CapturedImage,
    pub score: f32,
}

/// Picks the best frame of a burst.
///
/// The score is a proxy for "eyes open, looking at the camera": the summed
/// confidence of both eyes. It does no sharpness or exposure analysis and
/// should not be read as an image-quality metric.
pub struct BurstFrameSelector {
    detector: Arc<dyn PoseDetector>,
}

impl BurstFrameSelector {
    pub fn new(detector: Arc<dyn PoseDetector>) -> Self {
        Self { detector }
    }

    pub fn score(detection: Option<&Detection>) -> f32 {
        match detection {
            Some(Detection {
                left_eye: Some(left),
                right_eye: Some(right),
                ..
            }) => left.confidence + right.confidence,
            Some(detection) if !detection.is_empty() => PARTIAL_DETECTION_SCORE,
            _ => UNDETECTED_SCORE,
        }
    }

    /// Returns `None` only for an empty burst. Ties go to the later frame, so
    /// a burst where nothing was detected falls back to the most recent one.
    pub async fn select_best(&self, frames: Vec<CapturedImage>) -> Option<ScoredFrame> {
        if frames.len() <= 1 {
            return frames.into_iter().next().map(|image| ScoredFrame { image, score: 0.0 });
        }

        let mut best: Option<ScoredFrame> = None;
        for (index, image) in frames.into_iter().enumerate() {
            let detection = self.detector.detect_pose(&image.image).await;
            let score = Self::score(detection.as_ref());
            debug!("Burst frame {} scored {:.3}", index, score);

            if best.as_ref().is_none_or(|current| score >= current.score) {
                best = Some(ScoredFrame { image, score });
            }
        }
        best
    }
}
