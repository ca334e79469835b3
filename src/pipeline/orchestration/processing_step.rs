use super::frame_context::FrameContext;
use crate::error::AppError;
use std::time::Instant;

/// Chain of Responsibility pattern for processing pipeline
pub trait ProcessingStep: Send {
    fn process(&mut self, context: &mut FrameContext) -> Result<(), AppError>;
    fn name(&self) -> &'static str;

    /// Drops any per-session memory. Called when scanning is toggled.
    fn reset(&mut self) {}
}

/// A pipeline that processes frames through a chain of steps
pub struct ProcessingPipeline {
    steps: Vec<Box<dyn ProcessingStep>>,
}

impl ProcessingPipeline {
    pub fn new() -> Self {
        Self { steps: Vec::new() }
    }

    pub fn add_step(mut self, step: Box<dyn ProcessingStep>) -> Self {
        self.steps.push(step);
        self
    }

    pub fn step_names(&self) -> Vec<&'static str> {
        self.steps.iter().map(|step| step.name()).collect()
    }

    pub fn process(&mut self, mut context: FrameContext) -> Result<FrameContext, AppError> {
        for step in &mut self.steps {
            tracing::debug!("Processing step: {}", step.name());
            let step_start = Instant::now();
            step.process(&mut context)?;
            context
                .metrics
                .record_duration(step.name(), step_start.elapsed().as_micros() as u64);
        }
        let start = context.processing_start;
        context.metrics.finalize(start);
        Ok(context)
    }

    pub fn reset(&mut self) {
        for step in &mut self.steps {
            step.reset();
        }
    }
}

impl Default for ProcessingPipeline {
    fn default() -> Self {
        Self::new()
    }
}
