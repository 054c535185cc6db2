//! Score normalization
//!
//! Maps raw geometric metrics onto bounded [0,1] sub-scores against the
//! calibrated ranges, then combines them into a single integer attention
//! score. Linear min-max normalization is deliberately simple and
//! inspectable; values outside the calibration range are clamped, never
//! extrapolated.

use crate::config::TrackerConfig;
use crate::types::{AttentionScore, RawMetrics};

/// Normalizer for converting raw metrics to a combined attention score
#[derive(Debug, Clone)]
pub struct ScoreNormalizer {
    angle_min: f64,
    angle_max: f64,
    ear_min: f64,
    ear_max: f64,
    angle_weight: f64,
    ear_weight: f64,
}

impl ScoreNormalizer {
    pub fn new(config: &TrackerConfig) -> Self {
        Self {
            angle_min: config.angle_min,
            angle_max: config.angle_max,
            ear_min: config.ear_min,
            ear_max: config.ear_max,
            angle_weight: config.angle_weight,
            ear_weight: config.ear_weight,
        }
    }

    /// Head-angle sub-score in [0,1]
    pub fn angle_score(&self, metrics: &RawMetrics) -> f64 {
        normalize(metrics.head_angle_proxy, self.angle_min, self.angle_max)
    }

    /// Eye-openness sub-score in [0,1]
    pub fn ear_score(&self, metrics: &RawMetrics) -> f64 {
        normalize(metrics.eye_openness_ratio, self.ear_min, self.ear_max)
    }

    /// Combined attention score: weighted sub-scores scaled to [0,100].
    ///
    /// The eye-openness weight dominates (0.8 vs 0.2 by default) because the
    /// head-angle proxy is a much coarser signal.
    pub fn normalize(&self, metrics: &RawMetrics) -> AttentionScore {
        let combined =
            self.angle_weight * self.angle_score(metrics) + self.ear_weight * self.ear_score(metrics);
        (combined * 100.0).round() as AttentionScore
    }
}

/// Linear min-max normalization clamped to [0,1]
fn normalize(value: f64, min: f64, max: f64) -> f64 {
    ((value - min) / (max - min)).clamp(0.0, 1.0)
}
