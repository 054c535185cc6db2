//! Geometry metrics
//!
//! Pure functions that turn one frame's landmark set into raw geometric
//! metrics:
//! - Eye-openness ratio (EAR) over the 6-point eye contour
//! - Head-angle proxy over the gaze reference pair
//!
//! A malformed landmark set (missing indices, degenerate eye geometry) yields
//! no metrics at all: the frame is treated downstream as "no face", which is
//! a different condition from a detected face with zero openness.

use crate::config::LandmarkScheme;
use crate::types::{LandmarkSet, RawMetrics};

/// Horizontal eye spans below this are degenerate detections, not real faces
const MIN_HORIZONTAL_SPAN: f64 = 1e-6;

/// Compute raw metrics from a landmark set using the given index scheme.
///
/// Returns `None` when the required indices are not present or the eye
/// contour is degenerate.
pub fn compute(landmarks: &LandmarkSet, scheme: &LandmarkScheme) -> Option<RawMetrics> {
    let eye_openness_ratio = eye_openness_ratio(landmarks, scheme)?;
    let head_angle_proxy = head_angle_proxy(landmarks, scheme)?;

    Some(RawMetrics {
        eye_openness_ratio,
        head_angle_proxy,
    })
}

/// Eye-openness ratio over the canonical 6-point contour.
///
/// `EAR = (|p2 - p6| + |p3 - p5|) / (2 * |p1 - p4|)` where p1/p4 are the eye
/// corners, p2/p3 the upper lid, and p5/p6 the lower lid, in the detector's
/// numbering order.
pub fn eye_openness_ratio(landmarks: &LandmarkSet, scheme: &LandmarkScheme) -> Option<f64> {
    let contour = landmarks.select(&scheme.eye_contour)?;
    debug_assert_eq!(contour.len(), 6);

    let horizontal = contour[0].distance(&contour[3]);
    if horizontal < MIN_HORIZONTAL_SPAN {
        return None;
    }

    let vertical_a = contour[1].distance(&contour[5]);
    let vertical_b = contour[2].distance(&contour[4]);

    Some((vertical_a + vertical_b) / (2.0 * horizontal))
}

/// Head-angle proxy: absolute horizontal distance between the gaze reference
/// pair. Shrinks as the head turns away from the camera.
pub fn head_angle_proxy(landmarks: &LandmarkSet, scheme: &LandmarkScheme) -> Option<f64> {
    let (left_idx, right_idx) = scheme.gaze_reference;
    let left = landmarks.get(left_idx)?;
    let right = landmarks.get(right_idx)?;

    Some((left.x - right.x).abs())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Landmark;
    use pretty_assertions::assert_eq;

    /// Scheme addressing a compact 8-point set so fixtures stay small
    fn test_scheme() -> LandmarkScheme {
        LandmarkScheme {
            eye_contour: [0, 1, 2, 3, 4, 5],
            gaze_reference: (6, 7),
        }
    }

    /// Eye contour with the given vertical lid gap and unit-ish horizontal span
    fn make_landmarks(lid_gap: f64, corner_dx: f64) -> LandmarkSet {
        LandmarkSet::new(vec![
            Landmark::new(0.30, 0.50),           // p1 inner corner
            Landmark::new(0.33, 0.50 - lid_gap), // p2 upper lid
            Landmark::new(0.37, 0.50 - lid_gap), // p3 upper lid
            Landmark::new(0.40, 0.50),           // p4 outer corner
            Landmark::new(0.37, 0.50 + lid_gap), // p5 lower lid
            Landmark::new(0.33, 0.50 + lid_gap), // p6 lower lid
            Landmark::new(0.30, 0.50),           // gaze reference left
            Landmark::new(0.30 + corner_dx, 0.50), // gaze reference right
        ])
    }

    #[test]
    fn test_ear_formula() {
        // Lid gap 0.0125 per side gives vertical distances of 0.025 each,
        // horizontal span 0.1: EAR = (0.025 + 0.025) / (2 * 0.1) = 0.25
        let landmarks = make_landmarks(0.0125, 0.05);
        let scheme = test_scheme();

        let ear = eye_openness_ratio(&landmarks, &scheme).unwrap();
        assert!((ear - 0.25).abs() < 1e-9, "ear = {ear}");
    }

    #[test]
    fn test_closed_eye_has_zero_ear() {
        let landmarks = make_landmarks(0.0, 0.05);
        let ear = eye_openness_ratio(&landmarks, &test_scheme()).unwrap();
        assert_eq!(ear, 0.0);
    }

    #[test]
    fn test_head_angle_proxy() {
        let landmarks = make_landmarks(0.01, 0.045);
        let dx = head_angle_proxy(&landmarks, &test_scheme()).unwrap();
        assert!((dx - 0.045).abs() < 1e-12);
    }

    #[test]
    fn test_metrics_non_negative_and_deterministic() {
        let landmarks = make_landmarks(0.02, 0.05);
        let scheme = test_scheme();

        let first = compute(&landmarks, &scheme).unwrap();
        let second = compute(&landmarks, &scheme).unwrap();

        assert!(first.eye_openness_ratio >= 0.0);
        assert!(first.head_angle_proxy >= 0.0);
        assert_eq!(first, second);
    }

    #[test]
    fn test_missing_indices_yield_no_metrics() {
        // Too few points for the default MediaPipe indices
        let landmarks = LandmarkSet::new(vec![Landmark::new(0.5, 0.5); 10]);
        assert!(compute(&landmarks, &LandmarkScheme::default()).is_none());
    }

    #[test]
    fn test_degenerate_contour_yields_no_metrics() {
        // All contour points coincide: horizontal span is zero
        let landmarks = LandmarkSet::new(vec![Landmark::new(0.5, 0.5); 8]);
        assert!(compute(&landmarks, &test_scheme()).is_none());
    }
}
