//! Engagement state classification
//!
//! Maps raw metrics and face presence onto the discrete engagement state.
//! The thresholds are the raw calibration floors (`ear_min`, `angle_min`)
//! applied as hard cutoffs, independent of the smoothed score; the displayed
//! percentage and the state label are allowed to diverge at the boundaries.

use crate::config::TrackerConfig;
use crate::types::{EngagementState, RawMetrics};

/// Threshold classifier over raw (pre-normalization) metrics
#[derive(Debug, Clone)]
pub struct StateClassifier {
    ear_floor: f64,
    angle_floor: f64,
}

impl StateClassifier {
    pub fn new(config: &TrackerConfig) -> Self {
        Self {
            ear_floor: config.ear_min,
            angle_floor: config.angle_min,
        }
    }

    /// Classify one frame. `None` metrics means no face was detected.
    pub fn classify(&self, metrics: Option<&RawMetrics>) -> EngagementState {
        match metrics {
            None => EngagementState::Absent,
            Some(m) => {
                if m.eye_openness_ratio < self.ear_floor || m.head_angle_proxy < self.angle_floor {
                    EngagementState::Distracted
                } else {
                    EngagementState::Attentive
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn make_classifier() -> StateClassifier {
        StateClassifier::new(&TrackerConfig::default())
    }

    #[test]
    fn test_no_face_is_absent() {
        assert_eq!(make_classifier().classify(None), EngagementState::Absent);
    }

    #[test]
    fn test_closed_eyes_distracted() {
        // ear 0.05 < ear_min 0.10, even with the head facing the camera
        let metrics = RawMetrics {
            eye_openness_ratio: 0.05,
            head_angle_proxy: 0.055,
        };
        assert_eq!(
            make_classifier().classify(Some(&metrics)),
            EngagementState::Distracted
        );
    }

    #[test]
    fn test_turned_head_distracted() {
        let metrics = RawMetrics {
            eye_openness_ratio: 0.30,
            head_angle_proxy: 0.020,
        };
        assert_eq!(
            make_classifier().classify(Some(&metrics)),
            EngagementState::Distracted
        );
    }

    #[test]
    fn test_above_both_floors_attentive() {
        // Barely above both floors: middling score but still Attentive
        let metrics = RawMetrics {
            eye_openness_ratio: 0.11,
            head_angle_proxy: 0.036,
        };
        assert_eq!(
            make_classifier().classify(Some(&metrics)),
            EngagementState::Attentive
        );
    }

    #[test]
    fn test_floor_values_are_attentive() {
        // The cutoff is strict less-than, matching the reference behavior
        let metrics = RawMetrics {
            eye_openness_ratio: 0.10,
            head_angle_proxy: 0.035,
        };
        assert_eq!(
            make_classifier().classify(Some(&metrics)),
            EngagementState::Attentive
        );
    }
}
