use crate::common::Keypoint;
use crate::config::GeometryConfig;

/// Why a pose was judged not frontal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeometryRejection {
    /// Eyes are not above the nose: back of the head or upside down.
    EyesBelowNose,
    /// Eyes coincide, so no ratio can be formed.
    DegenerateEyes,
    /// Nose too far off the eye midline: profile or three-quarter view.
    Asymmetric,
    /// Eye-to-nose height out of proportion with the eye spacing.
    AspectOutOfRange,
}

/// Decides whether a subject is facing the camera from its eyes and nose.
///
/// Inputs are expected to have passed the confidence gate already.
#[derive(Debug, Clone)]
pub struct GeometryValidator {
    config: GeometryConfig,
}

impl GeometryValidator {
    pub fn new(config: GeometryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &GeometryConfig {
        &self.config
    }

    pub fn is_frontal_pose(
        &self,
        left_eye: &Keypoint,
        right_eye: &Keypoint,
        nose: &Keypoint,
    ) -> bool {
        self.check(left_eye, right_eye, nose).is_ok()
    }

    /// Same as [`is_frontal_pose`](Self::is_frontal_pose), reporting the first
    /// failed check.
    pub fn check(
        &self,
        left_eye: &Keypoint,
        right_eye: &Keypoint,
        nose: &Keypoint,
    ) -> Result<(), GeometryRejection> {
        let eye_mid_x = (left_eye.x + right_eye.x) / 2.0;
        let eye_mid_y = (left_eye.y + right_eye.y) / 2.0;

        if eye_mid_y <= nose.y {
            return Err(GeometryRejection::EyesBelowNose);
        }

        let eye_distance = left_eye.distance_to(right_eye);
        if eye_distance <= f32::EPSILON {
            return Err(GeometryRejection::DegenerateEyes);
        }

        let deviation = (eye_mid_x - nose.x).abs();
        if deviation > self.config.symmetry_ratio * eye_distance {
            return Err(GeometryRejection::Asymmetric);
        }

        let aspect = (eye_mid_y - nose.y) / eye_distance;
        if aspect < self.config.min_aspect_ratio || aspect > self.config.max_aspect_ratio {
            return Err(GeometryRejection::AspectOutOfRange);
        }

        Ok(())
    }
}

impl Default for GeometryValidator {
    fn default() -> Self {
        Self::new(GeometryConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn kp(x: f32, y: f32) -> Keypoint {
        Keypoint::new(x, y, 0.9)
    }

    #[test]
    fn accepts_frontal_face() {
        let validator = GeometryValidator::default();
        assert!(validator.is_frontal_pose(&kp(0.4, 0.6), &kp(0.6, 0.6), &kp(0.5, 0.5)));
    }

    #[test]
    fn rejects_nose_above_eyes() {
        let validator = GeometryValidator::default();
        assert_eq!(
            validator.check(&kp(0.4, 0.5), &kp(0.6, 0.5), &kp(0.5, 0.6)),
            Err(GeometryRejection::EyesBelowNose)
        );
        // level with the eyes is rejected too
        assert!(!validator.is_frontal_pose(&kp(0.4, 0.5), &kp(0.6, 0.5), &kp(0.5, 0.5)));
    }

    #[test]
    fn rejects_profile() {
        let validator = GeometryValidator::default();
        // eye distance 0.2, allowed deviation 0.07
        assert_eq!(
            validator.check(&kp(0.4, 0.6), &kp(0.6, 0.6), &kp(0.58, 0.5)),
            Err(GeometryRejection::Asymmetric)
        );
        assert!(validator.is_frontal_pose(&kp(0.4, 0.6), &kp(0.6, 0.6), &kp(0.56, 0.5)));
    }

    #[test]
    fn rejects_degenerate_and_extreme_pitch() {
        let validator = GeometryValidator::default();
        assert_eq!(
            validator.check(&kp(0.5, 0.6), &kp(0.5, 0.6), &kp(0.5, 0.5)),
            Err(GeometryRejection::DegenerateEyes)
        );
        // aspect 0.02 / 0.2 = 0.1
        assert_eq!(
            validator.check(&kp(0.4, 0.6), &kp(0.6, 0.6), &kp(0.5, 0.58)),
            Err(GeometryRejection::AspectOutOfRange)
        );
        // aspect 0.4 / 0.2 = 2.0
        assert_eq!(
            validator.check(&kp(0.4, 0.8), &kp(0.6, 0.8), &kp(0.5, 0.4)),
            Err(GeometryRejection::AspectOutOfRange)
        );
    }

    #[test]
    fn thresholds_come_from_config() {
        let strict = GeometryValidator::new(GeometryConfig {
            symmetry_ratio: 0.1,
            ..GeometryConfig::default()
        });
        assert!(!strict.is_frontal_pose(&kp(0.4, 0.6), &kp(0.6, 0.6), &kp(0.54, 0.5)));
        assert!(GeometryValidator::default().is_frontal_pose(
            &kp(0.4, 0.6),
            &kp(0.6, 0.6),
            &kp(0.54, 0.5)
        ));
    }

    #[test]
    fn never_frontal_when_nose_not_below_eyes() {
        let validator = GeometryValidator::default();
        let mut rng = StdRng::seed_from_u64(0x5eed);

        for _ in 0..10_000 {
            let left = kp(rng.random_range(0.0..=1.0), rng.random_range(0.0..=1.0));
            let right = kp(rng.random_range(0.0..=1.0), rng.random_range(0.0..=1.0));
            let eye_y = (left.y + right.y) / 2.0;
            let nose = kp(rng.random_range(0.0..=1.0), rng.random_range(eye_y..=1.0));
            assert!(
                !validator.is_frontal_pose(&left, &right, &nose),
                "accepted {:?} {:?} {:?}",
                left,
                right,
                nose
            );
        }
    }
}
