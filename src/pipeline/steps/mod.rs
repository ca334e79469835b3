pub mod confidence_gate_step;
pub mod geometry_step;
pub mod motion_step;

pub use confidence_gate_step::ConfidenceGateStep;
pub use geometry_step::GeometryStep;
pub use motion_step::MotionStep;
