pub mod frame_context;
pub mod metrics;
pub mod processing_step;
pub mod trigger_engine;

pub use frame_context::{FrameContext, FrameMetrics};
pub use metrics::{
    EngineObserver, EngineObservers, PerformanceMonitor, PerformanceStats, PhotoSink,
};
pub use processing_step::{ProcessingPipeline, ProcessingStep};
pub use trigger_engine::{SelectionJob, TriggerEngine};
