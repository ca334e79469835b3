use crate::common::Keypoint;
use crate::config::MotionConfig;

/// Light tier derived from the ISO proxy. Higher gain amplifies apparent
/// keypoint jitter, so darker tiers get tighter velocity ceilings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightTier {
    Bright,
    Mid,
    Dark,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionAssessment {
    pub stable: bool,
    pub needs_burst_safety_net: bool,
    /// Nose displacement since the previous sample, if there was one.
    pub displacement: Option<f32>,
}

impl MotionAssessment {
    fn no_baseline() -> Self {
        Self {
            stable: false,
            needs_burst_safety_net: false,
            displacement: None,
        }
    }
}

/// Per-session memory for the motion analyzer.
#[derive(Debug, Clone, Default)]
pub struct MotionContext {
    pub previous_nose: Option<Keypoint>,
    pub light_level_proxy: f32,
}

impl MotionContext {
    pub fn reset(&mut self) {
        self.previous_nose = None;
    }
}

#[derive(Debug, Clone)]
pub struct MotionAnalyzer {
    config: MotionConfig,
}

impl MotionAnalyzer {
    pub fn new(config: MotionConfig) -> Self {
        Self { config }
    }

    pub fn light_tier(&self, iso: f32) -> LightTier {
        if iso < self.config.bright_iso_limit {
            LightTier::Bright
        } else if iso < self.config.mid_iso_limit {
            LightTier::Mid
        } else {
            LightTier::Dark
        }
    }

    pub fn velocity_ceiling(&self, iso: f32) -> f32 {
        match self.light_tier(iso) {
            LightTier::Bright => self.config.bright_ceiling,
            LightTier::Mid => self.config.mid_ceiling,
            LightTier::Dark => self.config.dark_ceiling,
        }
    }

    /// Displacement equal to the ceiling still counts as stable; only
    /// strictly greater motion is too fast.
    pub fn analyze_motion(
        &self,
        current_nose: &Keypoint,
        previous_nose: Option<&Keypoint>,
        iso: f32,
    ) -> MotionAssessment {
        let Some(previous_nose) = previous_nose else {
            return MotionAssessment::no_baseline();
        };

        let displacement = current_nose.distance_to(previous_nose);
        self.classify(displacement, iso)
    }

    pub fn classify(&self, displacement: f32, iso: f32) -> MotionAssessment {
        if displacement > self.velocity_ceiling(iso) {
            return MotionAssessment {
                stable: false,
                needs_burst_safety_net: false,
                displacement: Some(displacement),
            };
        }

        MotionAssessment {
            stable: true,
            needs_burst_safety_net: displacement > self.config.small_motion_threshold,
            displacement: Some(displacement),
        }
    }

    /// Analyzes against the context and then records the current nose and
    /// light level into it.
    pub fn advance(
        &self,
        context: &mut MotionContext,
        current_nose: &Keypoint,
        iso: f32,
    ) -> MotionAssessment {
        let assessment = self.analyze_motion(current_nose, context.previous_nose.as_ref(), iso);
        context.previous_nose = Some(*current_nose);
        context.light_level_proxy = iso;
        assessment
    }
}

impl Default for MotionAnalyzer {
    fn default() -> Self {
        Self::new(MotionConfig::default())
    }
}
