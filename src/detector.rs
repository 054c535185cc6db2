//! External collaborator seams
//!
//! The engine does not own a camera driver or a landmark model; it requires
//! only two capabilities, expressed as traits:
//! - [`FrameSource`]: a continuous video frame source (camera)
//! - [`LandmarkDetector`]: given a frame, yield zero-or-one landmark set
//!
//! A recorded-frame implementation of both is provided for replay, testing,
//! and the CLI.

use crate::error::TrackerError;
use crate::types::{Landmark, LandmarkSet};
use serde::{Deserialize, Serialize};
use std::rc::Rc;
use thiserror::Error;

/// Per-frame detector faults.
///
/// These never stop the loop: the frame loop controller treats any of them
/// as "no face this frame".
#[derive(Debug, Error)]
pub enum DetectorError {
    #[error("Detector not ready: {0}")]
    NotReady(String),

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Malformed detector output: {0}")]
    MalformedOutput(String),
}

/// One displayable video frame.
///
/// Pixel data stays inside the collaborator; the engine only needs the
/// source-assigned sequence number (for the detector to address the frame)
/// and the capture timestamp that drives the emission gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    pub seq: u64,
    pub timestamp_ms: u64,
}

/// A continuous video frame source, exclusively owned by one tracker.
pub trait FrameSource {
    /// Open the underlying stream. Failures here are acquisition faults.
    fn acquire(&mut self) -> Result<(), TrackerError>;

    /// The next displayable frame, or `None` once the stream ends.
    ///
    /// Implementations may block (or internally await) until a frame is
    /// available; the controller runs one cycle per returned frame.
    fn next_frame(&mut self) -> Option<Frame>;

    /// Release the stream. Must be safe to call more than once.
    fn release(&mut self);
}

/// An external landmark-detection capability (single-face mode).
pub trait LandmarkDetector {
    /// Prepare the detector. Called repeatedly under the readiness policy
    /// until it succeeds or attempts are exhausted.
    fn initialize(&mut self) -> Result<(), DetectorError>;

    /// Detect zero or one face in the given frame.
    fn detect(&mut self, frame: &Frame) -> Result<Option<LandmarkSet>, DetectorError>;

    /// Dispose the detector. Must be safe to call more than once.
    fn close(&mut self);
}

/// One recorded frame: a capture timestamp plus the landmarks the detector
/// produced for it (`None` when no face was detected).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedFrame {
    pub timestamp_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub landmarks: Option<Vec<Landmark>>,
}

impl RecordedFrame {
    /// Check the frame for out-of-contract values.
    pub fn validate(&self) -> Result<(), String> {
        if let Some(points) = &self.landmarks {
            for (i, p) in points.iter().enumerate() {
                if !p.x.is_finite() || !p.y.is_finite() {
                    return Err(format!("landmark {i} has non-finite coordinates"));
                }
                if !(0.0..=1.0).contains(&p.x) || !(0.0..=1.0).contains(&p.y) {
                    return Err(format!(
                        "landmark {i} outside normalized range: ({}, {})",
                        p.x, p.y
                    ));
                }
            }
        }
        Ok(())
    }
}

/// A recorded session: an ordered sequence of frames.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Recording {
    pub frames: Vec<RecordedFrame>,
}

/// A validation finding for one recorded frame
#[derive(Debug, Clone, Serialize)]
pub struct RecordingIssue {
    pub index: usize,
    pub error: String,
}

impl Recording {
    pub fn new(frames: Vec<RecordedFrame>) -> Self {
        Self { frames }
    }

    /// Parse newline-delimited JSON, one frame per line. Blank lines are
    /// skipped.
    pub fn from_ndjson(input: &str) -> Result<Self, TrackerError> {
        let mut frames = Vec::new();
        for line in input.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            frames.push(serde_json::from_str(trimmed)?);
        }
        Ok(Self { frames })
    }

    /// Serialize to newline-delimited JSON
    pub fn to_ndjson(&self) -> Result<String, TrackerError> {
        let mut lines = Vec::with_capacity(self.frames.len());
        for frame in &self.frames {
            lines.push(serde_json::to_string(frame)?);
        }
        Ok(lines.join("\n") + "\n")
    }

    /// Validate every frame, plus timestamp monotonicity across frames.
    pub fn validate(&self) -> Vec<RecordingIssue> {
        let mut issues = Vec::new();
        let mut last_ts = None;

        for (index, frame) in self.frames.iter().enumerate() {
            if let Err(error) = frame.validate() {
                issues.push(RecordingIssue { index, error });
            }
            if let Some(prev) = last_ts {
                if frame.timestamp_ms < prev {
                    issues.push(RecordingIssue {
                        index,
                        error: format!(
                            "timestamp {} goes backwards (previous {prev})",
                            frame.timestamp_ms
                        ),
                    });
                }
            }
            last_ts = Some(frame.timestamp_ms);
        }

        issues
    }
}

/// Number of distinct frames named by a set of validation issues.
///
/// A single frame can carry more than one issue (bad coordinates and a
/// backwards timestamp), so this is the per-frame count, not `issues.len()`.
pub fn distinct_frame_count(issues: &[RecordingIssue]) -> usize {
    let mut indices: Vec<usize> = issues.iter().map(|issue| issue.index).collect();
    indices.sort_unstable();
    indices.dedup();
    indices.len()
}

/// Build a paired frame source and detector over one recording.
pub fn replay_pair(recording: Recording) -> (ReplaySource, ReplayDetector) {
    let shared = Rc::new(recording);
    (
        ReplaySource {
            recording: Rc::clone(&shared),
            cursor: 0,
            acquired: false,
        },
        ReplayDetector {
            recording: shared,
            initialized: false,
        },
    )
}

/// Frame source that replays a recording at its recorded timestamps
pub struct ReplaySource {
    recording: Rc<Recording>,
    cursor: usize,
    acquired: bool,
}

impl FrameSource for ReplaySource {
    fn acquire(&mut self) -> Result<(), TrackerError> {
        self.acquired = true;
        self.cursor = 0;
        Ok(())
    }

    fn next_frame(&mut self) -> Option<Frame> {
        if !self.acquired {
            return None;
        }
        let recorded = self.recording.frames.get(self.cursor)?;
        let frame = Frame {
            seq: self.cursor as u64,
            timestamp_ms: recorded.timestamp_ms,
        };
        self.cursor += 1;
        Some(frame)
    }

    fn release(&mut self) {
        self.acquired = false;
    }
}

/// Detector that looks recorded landmarks up by frame sequence number
pub struct ReplayDetector {
    recording: Rc<Recording>,
    initialized: bool,
}

impl LandmarkDetector for ReplayDetector {
    fn initialize(&mut self) -> Result<(), DetectorError> {
        self.initialized = true;
        Ok(())
    }

    fn detect(&mut self, frame: &Frame) -> Result<Option<LandmarkSet>, DetectorError> {
        if !self.initialized {
            return Err(DetectorError::NotReady("replay detector closed".to_string()));
        }
        let recorded = self
            .recording
            .frames
            .get(frame.seq as usize)
            .ok_or_else(|| DetectorError::Inference(format!("unknown frame seq {}", frame.seq)))?;

        Ok(recorded
            .landmarks
            .as_ref()
            .map(|points| LandmarkSet::new(points.clone())))
    }

    fn close(&mut self) {
        self.initialized = false;
    }
}
