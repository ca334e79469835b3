use crate::common::PoseSample;
use crate::error::AppError;
use crate::pipeline::orchestration::{FrameContext, ProcessingStep};
use crate::pipeline::stability::Disqualification;

/// Turns a raw detection into a usable [`PoseSample`], or marks the frame as
/// having no detection. Frames below the confidence threshold are treated the
/// same as frames where nothing was found.
pub struct ConfidenceGateStep {
    threshold: f32,
}

impl ConfidenceGateStep {
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }
}

impl ProcessingStep for ConfidenceGateStep {
    fn process(&mut self, context: &mut FrameContext) -> Result<(), AppError> {
        let Some(sample) = context
            .detection
            .as_ref()
            .and_then(|detection| PoseSample::from_detection(detection, context.timestamp))
        else {
            context.disqualify(Disqualification::DetectionAbsent);
            return Ok(());
        };

        if sample.min_confidence() < self.threshold {
            context.disqualify(Disqualification::LowConfidence);
            return Ok(());
        }

        context.sample = Some(sample);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "ConfidenceGateStep"
    }
}
