//! Seams to the hardware side of the app.
//!
//! The trigger engine never talks to a capture device directly; it goes
//! through these traits so that the state machine can be driven by synthetic
//! keypoint sequences in tests.

pub mod simulated;

use crate::common::Detection;
use crate::error::CaptureError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

pub use simulated::{FixedLightMeter, ScriptedDetector, SimulatedCamera, SyntheticFrameSource};

/// Capture settings requested from the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CaptureQuality {
    /// Lowest shutter latency. Used for burst members.
    Speed,
    /// Default still quality. Used for single shots.
    Balanced,
}

/// A full-resolution still returned by the camera.
#[derive(Clone)]
pub struct CapturedImage {
    pub id: Uuid,
    pub image: Arc<DynamicImage>,
    pub captured_at: DateTime<Utc>,
    pub quality: CaptureQuality,
}

impl CapturedImage {
    pub fn new(image: DynamicImage, quality: CaptureQuality) -> Self {
        Self {
            id: Uuid::new_v4(),
            image: Arc::new(image),
            captured_at: Utc::now(),
            quality,
        }
    }
}

impl std::fmt::Debug for CapturedImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapturedImage")
            .field("id", &self.id)
            .field("captured_at", &self.captured_at)
            .field("quality", &self.quality)
            .finish()
    }
}

/// Animal keypoint detector. Treated as a black box.
#[async_trait]
pub trait PoseDetector: Send + Sync {
    async fn detect_pose(&self, image: &DynamicImage) -> Option<Detection>;
}

#[async_trait]
pub trait CameraDevice: Send + Sync {
    async fn capture(&self, quality: CaptureQuality) -> Result<CapturedImage, CaptureError>;
}

/// Current sensor gain, used as a stand-in for ambient light.
pub trait LightMeter: Send + Sync {
    fn current_light_proxy(&self) -> f32;
}
