pub mod analysis;
pub mod capture;
pub mod orchestration;
pub mod stability;
pub mod steps;

pub use capture::{BurstFrameSelector, CaptureOrchestrator};
pub use orchestration::{EngineObserver, PerformanceMonitor, TriggerEngine};
pub use stability::{FrameVerdict, StabilityDebouncer, TriggerDecision};
