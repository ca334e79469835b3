use crate::error::AppError;
use crate::pipeline::analysis::{MotionAnalyzer, MotionContext};
use crate::pipeline::orchestration::{FrameContext, ProcessingStep};

/// Owns the per-session [`MotionContext`].
///
/// Every confidently detected nose becomes the next baseline, even when the
/// pose itself was not frontal. A frame without a usable detection clears the
/// baseline, so motion is never measured across a gap.
pub struct MotionStep {
    analyzer: MotionAnalyzer,
    motion_context: MotionContext,
}

impl MotionStep {
    pub fn new(analyzer: MotionAnalyzer) -> Self {
        Self {
            analyzer,
            motion_context: MotionContext::default(),
        }
    }

    pub fn motion_context(&self) -> &MotionContext {
        &self.motion_context
    }
}

impl ProcessingStep for MotionStep {
    fn process(&mut self, context: &mut FrameContext) -> Result<(), AppError> {
        let Some(sample) = context.sample.as_ref() else {
            self.motion_context.reset();
            return Ok(());
        };

        let assessment =
            self.analyzer
                .advance(&mut self.motion_context, &sample.nose, context.light_level);
        context.motion = Some(assessment);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "MotionStep"
    }

    fn reset(&mut self) {
        self.motion_context.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{Detection, Keypoint};
    use crate::pipeline::orchestration::ProcessingPipeline;
    use crate::pipeline::stability::{Disqualification, FrameVerdict};
    use crate::pipeline::steps::{ConfidenceGateStep, GeometryStep};
    use crate::pipeline::analysis::GeometryValidator;
    use std::time::{Duration, Instant};

    fn face(nose_y: f32) -> Option<Detection> {
        Some(Detection::full(
            Keypoint::new(0.4, 0.6, 0.7),
            Keypoint::new(0.6, 0.6, 0.7),
            Keypoint::new(0.5, nose_y, 0.7),
        ))
    }

    fn pipeline() -> ProcessingPipeline {
        ProcessingPipeline::new()
            .add_step(Box::new(ConfidenceGateStep::new(0.6)))
            .add_step(Box::new(GeometryStep::new(GeometryValidator::default())))
            .add_step(Box::new(MotionStep::new(MotionAnalyzer::default())))
    }

    #[test]
    fn second_still_frame_qualifies() {
        let mut pipeline = pipeline();
        let t0 = Instant::now();

        let first = pipeline
            .process(FrameContext::new(t0, face(0.5), 100.0))
            .unwrap();
        assert_eq!(
            first.verdict(),
            FrameVerdict::Disqualified(Disqualification::NoMotionBaseline)
        );
        assert_eq!(
            first.metrics.step_durations_us.keys().copied().collect::<Vec<_>>(),
            pipeline.step_names()
        );

        let second = pipeline
            .process(FrameContext::new(
                t0 + Duration::from_millis(33),
                face(0.501),
                100.0,
            ))
            .unwrap();
        assert_eq!(
            second.verdict(),
            FrameVerdict::Qualifying {
                prefer_burst: false
            }
        );
    }

    #[test]
    fn gap_clears_baseline() {
        let mut pipeline = pipeline();
        let t0 = Instant::now();
        pipeline
            .process(FrameContext::new(t0, face(0.5), 100.0))
            .unwrap();
        pipeline
            .process(FrameContext::new(t0, None, 100.0))
            .unwrap();
        let after_gap = pipeline
            .process(FrameContext::new(t0, face(0.5), 100.0))
            .unwrap();
        assert_eq!(
            after_gap.verdict(),
            FrameVerdict::Disqualified(Disqualification::NoMotionBaseline)
        );
    }

    #[test]
    fn reset_clears_baseline() {
        let mut step = MotionStep::new(MotionAnalyzer::default());
        let mut context = FrameContext::new(Instant::now(), face(0.5), 100.0);
        ConfidenceGateStep::new(0.6).process(&mut context).unwrap();
        step.process(&mut context).unwrap();
        assert!(step.motion_context().previous_nose.is_some());

        step.reset();
        assert!(step.motion_context().previous_nose.is_none());
    }
}
