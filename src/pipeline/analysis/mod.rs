pub mod geometry;
pub mod motion;

pub use geometry::{GeometryRejection, GeometryValidator};
pub use motion::{LightTier, MotionAnalyzer, MotionAssessment, MotionContext};
