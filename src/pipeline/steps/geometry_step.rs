use crate::error::AppError;
use crate::pipeline::analysis::GeometryValidator;
use crate::pipeline::orchestration::{FrameContext, ProcessingStep};
use crate::pipeline::stability::Disqualification;

pub struct GeometryStep {
    validator: GeometryValidator,
}

impl GeometryStep {
    pub fn new(validator: GeometryValidator) -> Self {
        Self { validator }
    }
}

impl ProcessingStep for GeometryStep {
    fn process(&mut self, context: &mut FrameContext) -> Result<(), AppError> {
        let Some(sample) = context.sample.as_ref() else {
            return Ok(());
        };

        if let Err(rejection) =
            self.validator
                .check(&sample.left_eye, &sample.right_eye, &sample.nose)
        {
            tracing::debug!("Pose rejected: {:?}", rejection);
            context.disqualify(Disqualification::NotFrontal(rejection));
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "GeometryStep"
    }
}
