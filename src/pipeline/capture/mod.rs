pub mod orchestrator;
pub mod selector;

pub use orchestrator::{
    BurstPhase, BurstSession, CaptureCompletion, CaptureDispatcher, CaptureOrchestrator,
    CaptureRequest, CompletionOutcome, TriggerOutcome,
};
pub use selector::{BurstFrameSelector, ScoredFrame};
