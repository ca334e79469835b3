use serde::{Deserialize, Serialize};
use std::time::Instant;

/// A single detected landmark.
///
/// Coordinates are normalized to `[0, 1]` with the origin at the bottom-left
/// of the frame, so a larger `y` is higher up in the image. The whole
/// pipeline relies on this convention.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
    pub confidence: f32,
}

impl Keypoint {
    pub fn new(x: f32, y: f32, confidence: f32) -> Self {
        Self { x, y, confidence }
    }

    pub fn distance_to(&self, other: &Keypoint) -> f32 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Raw detector output. Individual landmarks may be missing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub left_eye: Option<Keypoint>,
    pub right_eye: Option<Keypoint>,
    pub nose: Option<Keypoint>,
}

impl Detection {
    pub fn full(left_eye: Keypoint, right_eye: Keypoint, nose: Keypoint) -> Self {
        Self {
            left_eye: Some(left_eye),
            right_eye: Some(right_eye),
            nose: Some(nose),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.left_eye.is_none() && self.right_eye.is_none() && self.nose.is_none()
    }
}

/// The three landmarks of one analyzed frame, stamped with the frame time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseSample {
    pub left_eye: Keypoint,
    pub right_eye: Keypoint,
    pub nose: Keypoint,
    pub timestamp: Instant,
}

impl PoseSample {
    /// Returns `None` unless all three landmarks were detected.
    pub fn from_detection(detection: &Detection, timestamp: Instant) -> Option<Self> {
        Some(Self {
            left_eye: detection.left_eye?,
            right_eye: detection.right_eye?,
            nose: detection.nose?,
            timestamp,
        })
    }

    pub fn min_confidence(&self) -> f32 {
        self.left_eye
            .confidence
            .min(self.right_eye.confidence)
            .min(self.nose.confidence)
    }
}
