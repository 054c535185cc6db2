//! Tracker configuration
//!
//! Calibration constants, landmark index scheme, and loop policies live in an
//! explicit configuration structure rather than module-level globals, so each
//! deployment can recalibrate and tests can run with synthetic ranges.
//!
//! The defaults are the empirically calibrated values from the reference
//! deployment (webcam at desk distance, MediaPipe Face Mesh numbering).

use crate::error::TrackerError;
use serde::{Deserialize, Serialize};

/// Default head-angle proxy at which the head counts as fully turned away
pub const DEFAULT_ANGLE_MIN: f64 = 0.035;
/// Default head-angle proxy when looking straight at the camera
pub const DEFAULT_ANGLE_MAX: f64 = 0.060;
/// Default EAR with eyes closed
pub const DEFAULT_EAR_MIN: f64 = 0.10;
/// Default EAR with eyes fully open
pub const DEFAULT_EAR_MAX: f64 = 0.40;
/// Default weight for the head-angle sub-score (coarse signal, low weight)
pub const DEFAULT_ANGLE_WEIGHT: f64 = 0.2;
/// Default weight for the eye-openness sub-score (the main indicator)
pub const DEFAULT_EAR_WEIGHT: f64 = 0.8;
/// Default smoothing window capacity in frames
pub const DEFAULT_HISTORY_SIZE: usize = 5;
/// Default minimum interval between accepted emissions
pub const DEFAULT_MIN_EMIT_INTERVAL_MS: u64 = 500;

/// Landmark indices used by the geometry stage.
///
/// Indices follow the external detector's anatomical numbering. Defaults are
/// MediaPipe Face Mesh: the six left-eye contour points in canonical EAR
/// order (inner corner, two upper-lid, outer corner, two lower-lid) and the
/// two eye-corner points used as the gaze reference pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LandmarkScheme {
    /// Exactly six indices forming the eye contour, in EAR order p1..p6
    pub eye_contour: [usize; 6],
    /// The (left, right) reference pair for the head-angle proxy
    pub gaze_reference: (usize, usize),
}

impl Default for LandmarkScheme {
    fn default() -> Self {
        Self {
            eye_contour: [33, 160, 158, 133, 153, 144],
            gaze_reference: (33, 133),
        }
    }
}

/// Retry policy for detector initialization.
///
/// Replaces indefinite readiness polling with a bounded backoff: attempts are
/// spaced by an exponentially growing delay, and exhausting them is an
/// explicit [`TrackerError::DetectorInit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadinessPolicy {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for ReadinessPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 30,
            initial_backoff_ms: 100,
            max_backoff_ms: 1_000,
        }
    }
}

impl ReadinessPolicy {
    /// Backoff before the given retry attempt (0-based), capped at the maximum.
    pub fn backoff_ms(&self, attempt: u32) -> u64 {
        let factor = 1u64 << attempt.min(16);
        self.initial_backoff_ms
            .saturating_mul(factor)
            .min(self.max_backoff_ms)
    }
}

/// Full tracker configuration.
///
/// Note the dual role of `ear_min` and `angle_min`: they are both the lower
/// normalization bounds for the continuous score and the hard Distracted
/// cutoffs in the state classifier. Recalibrating one moves both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub angle_min: f64,
    pub angle_max: f64,
    pub ear_min: f64,
    pub ear_max: f64,
    pub angle_weight: f64,
    pub ear_weight: f64,
    pub history_size: usize,
    pub min_emit_interval_ms: u64,
    pub landmarks: LandmarkScheme,
    pub readiness: ReadinessPolicy,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            angle_min: DEFAULT_ANGLE_MIN,
            angle_max: DEFAULT_ANGLE_MAX,
            ear_min: DEFAULT_EAR_MIN,
            ear_max: DEFAULT_EAR_MAX,
            angle_weight: DEFAULT_ANGLE_WEIGHT,
            ear_weight: DEFAULT_EAR_WEIGHT,
            history_size: DEFAULT_HISTORY_SIZE,
            min_emit_interval_ms: DEFAULT_MIN_EMIT_INTERVAL_MS,
            landmarks: LandmarkScheme::default(),
            readiness: ReadinessPolicy::default(),
        }
    }
}

impl TrackerConfig {
    /// Validate the configuration.
    ///
    /// Rejects inverted or degenerate calibration ranges, non-finite values,
    /// weights that do not sum to 1, and a zero-capacity smoothing window.
    pub fn validate(&self) -> Result<(), TrackerError> {
        let ranges = [
            ("angle", self.angle_min, self.angle_max),
            ("ear", self.ear_min, self.ear_max),
        ];
        for (name, min, max) in ranges {
            if !min.is_finite() || !max.is_finite() {
                return Err(TrackerError::InvalidConfig(format!(
                    "{name} calibration range must be finite"
                )));
            }
            if min < 0.0 {
                return Err(TrackerError::InvalidConfig(format!(
                    "{name}_min must be non-negative, got {min}"
                )));
            }
            if max <= min {
                return Err(TrackerError::InvalidConfig(format!(
                    "{name}_max ({max}) must exceed {name}_min ({min})"
                )));
            }
        }

        if !self.angle_weight.is_finite() || !self.ear_weight.is_finite() {
            return Err(TrackerError::InvalidConfig(
                "weights must be finite".to_string(),
            ));
        }
        if self.angle_weight < 0.0 || self.ear_weight < 0.0 {
            return Err(TrackerError::InvalidConfig(
                "weights must be non-negative".to_string(),
            ));
        }
        let weight_sum = self.angle_weight + self.ear_weight;
        if (weight_sum - 1.0).abs() > 1e-6 {
            return Err(TrackerError::InvalidConfig(format!(
                "angle_weight + ear_weight must sum to 1.0, got {weight_sum}"
            )));
        }

        if self.history_size == 0 {
            return Err(TrackerError::InvalidConfig(
                "history_size must be at least 1".to_string(),
            ));
        }
        if self.readiness.max_attempts == 0 {
            return Err(TrackerError::InvalidConfig(
                "readiness.max_attempts must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    /// Load configuration from JSON, applying defaults for missing fields
    pub fn from_json(json: &str) -> Result<Self, TrackerError> {
        let config: TrackerConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to JSON
    pub fn to_json(&self) -> Result<String, TrackerError> {
        serde_json::to_string_pretty(self).map_err(TrackerError::JsonError)
    }
}
