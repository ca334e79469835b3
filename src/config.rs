use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Environment variable prefix, e.g. `PAWSHOT_STABILITY__COOLDOWN_MS=2000`.
pub const ENV_PREFIX: &str = "PAWSHOT";

/// Top level configuration for the trigger engine.
///
/// Every numeric threshold in here was tuned empirically on real pets and is
/// meant to be recalibrated per deployment, so nothing downstream hardcodes it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    pub confidence: ConfidenceConfig,
    pub geometry: GeometryConfig,
    pub motion: MotionConfig,
    pub stability: StabilityConfig,
    pub burst: BurstConfig,
    pub runtime: RuntimeConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfidenceConfig {
    /// Minimum confidence each of the eyes and nose must reach.
    pub keypoint_threshold: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeometryConfig {
    /// Max horizontal offset of the nose from the eye midpoint, as a fraction
    /// of the inter-eye distance.
    pub symmetry_ratio: f32,
    /// Accepted range for (eye-to-nose vertical distance / inter-eye distance).
    pub min_aspect_ratio: f32,
    pub max_aspect_ratio: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionConfig {
    /// ISO below this is the bright tier.
    pub bright_iso_limit: f32,
    /// ISO below this (and at least `bright_iso_limit`) is the mid tier.
    pub mid_iso_limit: f32,
    pub bright_ceiling: f32,
    pub mid_ceiling: f32,
    pub dark_ceiling: f32,
    /// Displacement above this, while still stable, asks for a burst.
    pub small_motion_threshold: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreakFailurePolicy {
    /// A single disqualifying frame drops the streak to zero.
    Reset,
    /// A disqualifying frame removes one frame from the streak.
    DecayByOne,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StabilityConfig {
    /// Consecutive qualifying frames needed to fire.
    pub threshold: u32,
    pub cooldown_ms: u64,
    pub failure_policy: StreakFailurePolicy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BurstConfig {
    pub target_count: usize,
    pub rearm_delay_ms: u64,
    pub capture_timeout_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub frame_buffer_size: usize,
    pub command_buffer_size: usize,
    pub analysis_timeout_ms: u64,
    pub log_level: String,
}

impl Default for ConfidenceConfig {
    fn default() -> Self {
        Self {
            keypoint_threshold: 0.6,
        }
    }
}

impl Default for GeometryConfig {
    fn default() -> Self {
        Self {
            symmetry_ratio: 0.35,
            min_aspect_ratio: 0.2,
            max_aspect_ratio: 1.6,
        }
    }
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            bright_iso_limit: 200.0,
            mid_iso_limit: 800.0,
            bright_ceiling: 0.04,
            mid_ceiling: 0.02,
            dark_ceiling: 0.005,
            small_motion_threshold: 0.003,
        }
    }
}

impl Default for StabilityConfig {
    fn default() -> Self {
        Self {
            threshold: 3,
            cooldown_ms: 1500,
            failure_policy: StreakFailurePolicy::Reset,
        }
    }
}

impl Default for BurstConfig {
    fn default() -> Self {
        Self {
            target_count: 4,
            rearm_delay_ms: 1000,
            capture_timeout_ms: 3000,
        }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            frame_buffer_size: 2,
            command_buffer_size: 64,
            analysis_timeout_ms: 60,
            log_level: "info".to_string(),
        }
    }
}

impl StabilityConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }
}

impl BurstConfig {
    pub fn rearm_delay(&self) -> Duration {
        Duration::from_millis(self.rearm_delay_ms)
    }

    pub fn capture_timeout(&self) -> Duration {
        Duration::from_millis(self.capture_timeout_ms)
    }
}

impl RuntimeConfig {
    pub fn analysis_timeout(&self) -> Duration {
        Duration::from_millis(self.analysis_timeout_ms)
    }

    pub fn tracing_level(&self) -> tracing::Level {
        self.log_level.parse().unwrap_or(tracing::Level::INFO)
    }
}

impl Configuration {
    /// Layered load: built-in defaults, then the optional file, then
    /// `PAWSHOT_*` environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder =
            config::Config::builder().add_source(config::Config::try_from(&Self::default())?);

        builder = match path {
            Some(path) => builder.add_source(config::File::from(path).required(true)),
            None => builder.add_source(config::File::with_name("pawshot").required(false)),
        };

        let configuration: Self = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        configuration.validate()?;
        Ok(configuration)
    }

    /// Dim indoor deployments: longer cooldown, since captures take longer to
    /// come back at high gain.
    pub fn low_light() -> Self {
        Self {
            stability: StabilityConfig {
                cooldown_ms: 2000,
                ..StabilityConfig::default()
            },
            ..Self::default()
        }
    }

    /// Fast-reacting preset for bright outdoor sessions.
    pub fn responsive() -> Self {
        Self {
            stability: StabilityConfig {
                threshold: 2,
                cooldown_ms: 1500,
                ..StabilityConfig::default()
            },
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.confidence.validate()?;
        self.geometry.validate()?;
        self.motion.validate()?;
        self.stability.validate()?;
        self.burst.validate()?;
        self.runtime.validate()
    }
}

impl ConfidenceConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.keypoint_threshold) {
            return Err(ConfigError::invalid(
                "confidence",
                "keypoint threshold must be between 0.0 and 1.0",
            ));
        }
        Ok(())
    }
}

impl GeometryConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.symmetry_ratio <= 0.0 {
            return Err(ConfigError::invalid(
                "geometry",
                "symmetry ratio must be greater than 0",
            ));
        }
        if self.min_aspect_ratio < 0.0 || self.min_aspect_ratio > self.max_aspect_ratio {
            return Err(ConfigError::invalid(
                "geometry",
                format!(
                    "aspect range [{}, {}] is empty or negative",
                    self.min_aspect_ratio, self.max_aspect_ratio
                ),
            ));
        }
        Ok(())
    }
}

impl MotionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bright_iso_limit >= self.mid_iso_limit {
            return Err(ConfigError::invalid(
                "motion",
                "bright ISO limit must be below the mid ISO limit",
            ));
        }
        if !(self.bright_ceiling >= self.mid_ceiling && self.mid_ceiling >= self.dark_ceiling) {
            return Err(ConfigError::invalid(
                "motion",
                "velocity ceilings must tighten as ISO rises",
            ));
        }
        if self.dark_ceiling <= 0.0 || self.small_motion_threshold < 0.0 {
            return Err(ConfigError::invalid(
                "motion",
                "ceilings must be positive and the small motion threshold non-negative",
            ));
        }
        Ok(())
    }
}

impl StabilityConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.threshold == 0 {
            return Err(ConfigError::invalid(
                "stability",
                "threshold must be greater than 0",
            ));
        }
        Ok(())
    }
}

impl BurstConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.target_count < 2 {
            return Err(ConfigError::invalid(
                "burst",
                "a burst needs at least 2 frames",
            ));
        }
        if self.capture_timeout_ms == 0 {
            return Err(ConfigError::invalid(
                "burst",
                "capture timeout must be greater than 0",
            ));
        }
        Ok(())
    }
}

impl RuntimeConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.frame_buffer_size == 0 || self.command_buffer_size == 0 {
            return Err(ConfigError::invalid(
                "runtime",
                "channel capacities must be greater than 0",
            ));
        }
        if self.analysis_timeout_ms == 0 {
            return Err(ConfigError::invalid(
                "runtime",
                "analysis timeout must be greater than 0",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(Configuration::default().validate().is_ok());
        assert!(Configuration::low_light().validate().is_ok());
        assert!(Configuration::responsive().validate().is_ok());
    }

    #[test]
    fn rejects_inverted_ceilings() {
        let mut configuration = Configuration::default();
        configuration.motion.dark_ceiling = 0.1;
        assert!(matches!(
            configuration.validate(),
            Err(ConfigError::Invalid {
                section: "motion",
                ..
            })
        ));
    }

    #[test]
    fn rejects_zero_threshold() {
        let mut configuration = Configuration::default();
        configuration.stability.threshold = 0;
        assert!(configuration.validate().is_err());
    }

    #[test]
    fn loads_overrides_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pawshot.toml");
        std::fs::write(
            &path,
            "[stability]\nthreshold = 2\nfailure_policy = \"decay_by_one\"\n\n[burst]\ntarget_count = 6\n",
        )
        .unwrap();

        let configuration = Configuration::load(Some(&path)).unwrap();
        assert_eq!(configuration.stability.threshold, 2);
        assert_eq!(
            configuration.stability.failure_policy,
            StreakFailurePolicy::DecayByOne
        );
        assert_eq!(configuration.burst.target_count, 6);
        assert_eq!(configuration.geometry, GeometryConfig::default());
    }
}
