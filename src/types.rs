//! Core types for the attention-inference pipeline
//!
//! This module defines the data structures that flow through each stage of the
//! per-frame pipeline: landmarks, raw geometric metrics, engagement states,
//! and emission records.

use serde::{Deserialize, Serialize};

/// A single detected facial keypoint.
///
/// Coordinates are normalized to [0,1] relative to frame dimensions, as
/// produced by the external landmark detector. The depth component is
/// optional; the pipeline only uses x/y.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f64,
    pub y: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z: Option<f64>,
}

impl Landmark {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y, z: None }
    }

    /// Euclidean distance to another landmark in normalized coordinate space.
    ///
    /// Distance is planar; the optional depth component is ignored so that
    /// detectors with and without depth estimation produce comparable metrics.
    pub fn distance(&self, other: &Landmark) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// An ordered set of landmarks for one detected face.
///
/// Landmarks are indexed by the detector's fixed anatomical numbering scheme
/// (e.g. MediaPipe Face Mesh's 468 points). Which indices form the eye
/// contour and gaze reference pair is part of [`crate::config::LandmarkScheme`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LandmarkSet {
    points: Vec<Landmark>,
}

impl LandmarkSet {
    pub fn new(points: Vec<Landmark>) -> Self {
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Landmark> {
        self.points.get(index)
    }

    /// Select landmarks by index, in the given order.
    ///
    /// Returns `None` if any index is out of range; a partial selection is
    /// never produced.
    pub fn select(&self, indices: &[usize]) -> Option<Vec<Landmark>> {
        indices
            .iter()
            .map(|&i| self.points.get(i).copied())
            .collect()
    }
}

/// Raw geometric metrics derived from one frame's landmark set.
///
/// Ephemeral: lives only for the duration of one frame's processing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawMetrics {
    /// Eye-openness ratio (EAR). Lower values indicate more closed eyes.
    pub eye_openness_ratio: f64,
    /// Absolute horizontal distance between the gaze reference pair; a coarse
    /// proxy for head/gaze deviation from facing the camera.
    pub head_angle_proxy: f64,
}

/// Combined attention score for one frame, an integer in [0,100].
pub type AttentionScore = u8;

/// Discrete engagement state for one frame.
///
/// `Absent` is assigned only when no face was detected that frame. The
/// Attentive/Distracted split comes from raw-metric thresholds and is
/// intentionally independent of the smoothed score shown alongside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngagementState {
    Attentive,
    Distracted,
    Absent,
}

/// One accepted (state, score) update, as delivered to subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmissionRecord {
    pub state: EngagementState,
    pub score: AttentionScore,
    pub timestamp_ms: u64,
}
