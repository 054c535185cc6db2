//! Frame loop controller
//!
//! Owns the camera stream, the landmark detector, and the per-frame pipeline:
//! detect → geometry metrics → score normalization → temporal smoothing →
//! state classification → emission gate. One cooperative processing cycle at
//! a time, driven by the frame source's cadence.
//!
//! Failure semantics: acquisition faults (camera, detector initialization)
//! are fatal and surface once through [`AttentionTracker::start`]; per-frame
//! detector faults degrade to "no face this frame" and never stop the loop.

use crate::classifier::StateClassifier;
use crate::config::TrackerConfig;
use crate::detector::{Frame, FrameSource, LandmarkDetector};
use crate::emitter::{AttentionSink, EmissionGate};
use crate::error::TrackerError;
use crate::metrics;
use crate::normalizer::ScoreNormalizer;
use crate::smoother::TemporalSmoother;
use crate::types::{EmissionRecord, EngagementState};
use std::cell::Cell;
use std::rc::Rc;
use std::thread;
use std::time::Duration;
use uuid::Uuid;

/// Lifecycle phase of a tracker instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerPhase {
    Idle,
    Acquiring,
    Running,
    Stopped,
    Failed,
}

/// Cooperative cancellation flag shared with the running loop.
///
/// Requesting a stop interrupts the frame-request loop before the next
/// detector invocation; an in-flight detection completes but its result is
/// discarded.
#[derive(Clone, Default)]
pub struct StopHandle(Rc<Cell<bool>>);

impl StopHandle {
    pub fn request_stop(&self) {
        self.0.set(true);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.0.get()
    }

    fn reset(&self) {
        self.0.set(false);
    }
}

/// Attention tracker for one participant.
///
/// Exclusively owns its frame source and detector for its lifetime; multiple
/// tracker instances are independent and share no mutable state.
pub struct AttentionTracker<S: FrameSource, D: LandmarkDetector> {
    id: String,
    config: TrackerConfig,
    source: S,
    detector: D,
    normalizer: ScoreNormalizer,
    smoother: TemporalSmoother,
    classifier: StateClassifier,
    gate: EmissionGate,
    phase: TrackerPhase,
    stop: StopHandle,
    released: bool,
}

impl<S: FrameSource, D: LandmarkDetector> AttentionTracker<S, D> {
    /// Create a tracker over the given collaborators. Validates the
    /// configuration; no resources are acquired until [`start`](Self::start).
    pub fn new(config: TrackerConfig, source: S, detector: D) -> Result<Self, TrackerError> {
        config.validate()?;

        let normalizer = ScoreNormalizer::new(&config);
        let smoother = TemporalSmoother::new(config.history_size);
        let classifier = StateClassifier::new(&config);
        let gate = EmissionGate::new(config.min_emit_interval_ms);

        Ok(Self {
            id: Uuid::new_v4().to_string(),
            config,
            source,
            detector,
            normalizer,
            smoother,
            classifier,
            gate,
            phase: TrackerPhase::Idle,
            stop: StopHandle::default(),
            released: false,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn phase(&self) -> TrackerPhase {
        self.phase
    }

    /// Handle for requesting a stop from a subscriber or another owner of the
    /// handle while [`run`](Self::run) is looping.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Register a subscriber for accepted updates.
    pub fn subscribe(&mut self, sink: Box<dyn AttentionSink>) {
        self.gate.subscribe(sink);
    }

    /// The most recently emitted record, if any
    pub fn last_emitted(&self) -> Option<&EmissionRecord> {
        self.gate.last_emitted()
    }

    /// Acquire the frame source and initialize the detector.
    ///
    /// Idle → Acquiring → Running. Acquisition failures transition to the
    /// terminal Failed phase, release anything already acquired, and are
    /// reported once to the caller. A tracker that was stopped (or failed)
    /// may be restarted; smoothing and gate state start fresh.
    pub fn start(&mut self) -> Result<(), TrackerError> {
        if self.phase == TrackerPhase::Running {
            return Ok(());
        }

        self.phase = TrackerPhase::Acquiring;
        self.stop.reset();
        self.smoother.clear();
        self.gate.reset();
        self.released = false;

        if let Err(e) = self.source.acquire() {
            self.fail();
            return Err(e);
        }

        if let Err(e) = self.initialize_detector() {
            self.fail();
            return Err(e);
        }

        self.phase = TrackerPhase::Running;
        Ok(())
    }

    /// Initialize the detector under the bounded retry/backoff policy.
    fn initialize_detector(&mut self) -> Result<(), TrackerError> {
        let policy = self.config.readiness;
        let mut last_error = String::new();

        for attempt in 0..policy.max_attempts {
            match self.detector.initialize() {
                Ok(()) => return Ok(()),
                Err(e) => {
                    last_error = e.to_string();
                    if attempt + 1 < policy.max_attempts {
                        thread::sleep(Duration::from_millis(policy.backoff_ms(attempt)));
                    }
                }
            }
        }

        Err(TrackerError::DetectorInit(format!(
            "gave up after {} attempts: {last_error}",
            policy.max_attempts
        )))
    }

    /// Run the frame loop until the source ends or a stop is requested, then
    /// release resources.
    pub fn run(&mut self) -> Result<(), TrackerError> {
        if self.phase != TrackerPhase::Running {
            self.start()?;
        }

        while !self.stop.is_stop_requested() {
            match self.source.next_frame() {
                Some(frame) => {
                    self.process_frame(&frame);
                }
                None => break,
            }
        }

        self.stop();
        Ok(())
    }

    /// Run one per-frame cycle. Returns the emitted record when the gate
    /// accepts the update.
    ///
    /// Exposed so hosts that own the frame timing (display refresh callbacks)
    /// can drive cycles themselves instead of using [`run`](Self::run).
    pub fn process_frame(&mut self, frame: &Frame) -> Option<EmissionRecord> {
        if self.phase != TrackerPhase::Running {
            return None;
        }

        // Per-frame detector faults degrade to "no face".
        let detection = self.detector.detect(frame).unwrap_or(None);

        // Stop requested while the detection was in flight: discard.
        if self.stop.is_stop_requested() {
            return None;
        }

        let raw_metrics = detection
            .as_ref()
            .and_then(|landmarks| metrics::compute(landmarks, &self.config.landmarks));

        match raw_metrics {
            Some(m) => {
                let raw = self.normalizer.normalize(&m);
                let smoothed = self.smoother.observe(raw);
                let state = self.classifier.classify(Some(&m));
                self.gate.offer(state, smoothed, frame.timestamp_ms)
            }
            None => {
                // Absence must not be smoothed away by stale history.
                self.smoother.clear();
                self.gate
                    .offer(EngagementState::Absent, 0, frame.timestamp_ms)
            }
        }
    }

    /// Stop processing and release the camera stream and detector.
    ///
    /// Idempotent: calling stop twice has the same effect as calling it once.
    pub fn stop(&mut self) {
        self.stop.request_stop();
        self.release_resources();
        if self.phase != TrackerPhase::Failed {
            self.phase = TrackerPhase::Stopped;
        }
    }

    fn fail(&mut self) {
        self.release_resources();
        self.phase = TrackerPhase::Failed;
    }

    fn release_resources(&mut self) {
        if self.released {
            return;
        }
        self.source.release();
        self.detector.close();
        self.released = true;
    }
}

impl<S: FrameSource, D: LandmarkDetector> Drop for AttentionTracker<S, D> {
    fn drop(&mut self) {
        self.release_resources();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LandmarkScheme, ReadinessPolicy};
    use crate::detector::{replay_pair, DetectorError, Recording, RecordedFrame};
    use crate::types::Landmark;
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;

    /// Compact 8-point scheme used by the test recordings
    fn test_config() -> TrackerConfig {
        TrackerConfig {
            landmarks: LandmarkScheme {
                eye_contour: [0, 1, 2, 3, 4, 5],
                gaze_reference: (6, 7),
            },
            ..Default::default()
        }
    }

    /// A face with the given lid gap and gaze-reference spread.
    ///
    /// lid_gap 0.0125 / corner_dx 0.060 gives EAR 0.25 and a saturated angle
    /// sub-score: raw attention 60.
    fn face(lid_gap: f64, corner_dx: f64) -> Vec<Landmark> {
        vec![
            Landmark::new(0.30, 0.50),
            Landmark::new(0.33, 0.50 - lid_gap),
            Landmark::new(0.37, 0.50 - lid_gap),
            Landmark::new(0.40, 0.50),
            Landmark::new(0.37, 0.50 + lid_gap),
            Landmark::new(0.33, 0.50 + lid_gap),
            Landmark::new(0.30, 0.50),
            Landmark::new(0.30 + corner_dx, 0.50),
        ]
    }

    fn recording_of(frames: Vec<(u64, Option<Vec<Landmark>>)>) -> Recording {
        Recording::new(
            frames
                .into_iter()
                .map(|(timestamp_ms, landmarks)| RecordedFrame {
                    timestamp_ms,
                    landmarks,
                })
                .collect(),
        )
    }

    fn collect_emissions<S: FrameSource, D: LandmarkDetector>(
        tracker: &mut AttentionTracker<S, D>,
    ) -> Rc<RefCell<Vec<EmissionRecord>>> {
        let seen: Rc<RefCell<Vec<EmissionRecord>>> = Rc::new(RefCell::new(Vec::new()));
        let sink_seen = Rc::clone(&seen);
        tracker.subscribe(Box::new(move |record: &EmissionRecord| {
            sink_seen.borrow_mut().push(*record);
        }));
        seen
    }

    #[test]
    fn test_replay_end_to_end() {
        // Five steady frames at 60, spaced past the emit interval where a
        // change occurs, then an empty frame.
        let recording = recording_of(vec![
            (0, Some(face(0.0125, 0.060))),
            (600, Some(face(0.0125, 0.060))),
            (1200, Some(face(0.0125, 0.060))),
            (1800, None),
            (2400, Some(face(0.0125, 0.060))),
        ]);

        let (source, detector) = replay_pair(recording);
        let mut tracker = AttentionTracker::new(test_config(), source, detector).unwrap();
        let seen = collect_emissions(&mut tracker);

        tracker.run().unwrap();
        assert_eq!(tracker.phase(), TrackerPhase::Stopped);

        let seen = seen.borrow();
        // Frame 0 emits (attentive, 60); frames 1-2 are duplicates; frame 3
        // emits (absent, 0); frame 4 restarts the window at 60.
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[0].state, EngagementState::Attentive);
        assert_eq!(seen[0].score, 60);
        assert_eq!(seen[1].state, EngagementState::Absent);
        assert_eq!(seen[1].score, 0);
        assert_eq!(seen[2].state, EngagementState::Attentive);
        assert_eq!(seen[2].score, 60);
    }

    #[test]
    fn test_closed_eyes_classified_distracted_with_smoothed_score() {
        // EAR 0.05 < ear_min: Distracted regardless of the smoothed score.
        let recording = recording_of(vec![(0, Some(face(0.0025, 0.060)))]);
        let (source, detector) = replay_pair(recording);
        let mut tracker = AttentionTracker::new(test_config(), source, detector).unwrap();

        tracker.run().unwrap();
        let last = tracker.last_emitted().copied().unwrap();
        assert_eq!(last.state, EngagementState::Distracted);
        // angle saturated (0.2), ear clamped to 0 below ear_min: score 20
        assert_eq!(last.score, 20);
    }

    #[test]
    fn test_absence_resets_smoothing_window() {
        // Two low frames, an absence, then one high frame: the final smoothed
        // score must come from the high frame alone.
        let recording = recording_of(vec![
            (0, Some(face(0.0025, 0.060))),
            (600, Some(face(0.0025, 0.060))),
            (1200, None),
            (1800, Some(face(0.0125, 0.060))),
        ]);

        let (source, detector) = replay_pair(recording);
        let mut tracker = AttentionTracker::new(test_config(), source, detector).unwrap();
        tracker.run().unwrap();

        let last = tracker.last_emitted().copied().unwrap();
        assert_eq!(last.score, 60);
    }

    #[test]
    fn test_stop_is_idempotent() {
        let recording = recording_of(vec![(0, Some(face(0.0125, 0.060)))]);
        let (source, detector) = replay_pair(recording);
        let mut tracker = AttentionTracker::new(test_config(), source, detector).unwrap();

        tracker.start().unwrap();
        tracker.stop();
        assert_eq!(tracker.phase(), TrackerPhase::Stopped);
        tracker.stop();
        assert_eq!(tracker.phase(), TrackerPhase::Stopped);
    }

    #[test]
    fn test_restart_emits_fresh_after_stop() {
        let recording = recording_of(vec![(0, Some(face(0.0125, 0.060)))]);
        let (source, detector) = replay_pair(recording);
        let mut tracker = AttentionTracker::new(test_config(), source, detector).unwrap();
        let seen = collect_emissions(&mut tracker);

        tracker.run().unwrap();
        assert_eq!(tracker.phase(), TrackerPhase::Stopped);

        // The same recording replays from the top. Its first update matches
        // the previous session's final record in state, score, and timestamp;
        // the restarted gate must accept it anyway.
        tracker.run().unwrap();

        let seen = seen.borrow();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[1].state, EngagementState::Attentive);
        assert_eq!(seen[1].score, 60);
        assert_eq!(seen[1].timestamp_ms, 0);
    }

    #[test]
    fn test_stop_from_subscriber_interrupts_run() {
        let recording = recording_of(vec![
            (0, Some(face(0.0125, 0.060))),
            (600, None),
            (1200, Some(face(0.0125, 0.060))),
        ]);

        let (source, detector) = replay_pair(recording);
        let mut tracker = AttentionTracker::new(test_config(), source, detector).unwrap();

        let handle = tracker.stop_handle();
        let count = Rc::new(Cell::new(0u32));
        let sink_count = Rc::clone(&count);
        tracker.subscribe(Box::new(move |_: &EmissionRecord| {
            sink_count.set(sink_count.get() + 1);
            handle.request_stop();
        }));

        tracker.run().unwrap();
        // The first accepted update requested the stop; the remaining frames
        // were never processed.
        assert_eq!(count.get(), 1);
        assert_eq!(tracker.phase(), TrackerPhase::Stopped);
    }

    #[test]
    fn test_process_frame_after_stop_is_ignored() {
        let recording = recording_of(vec![(0, Some(face(0.0125, 0.060)))]);
        let (mut source, detector) = replay_pair(recording);
        source.acquire().unwrap();
        let frame = source.next_frame().unwrap();
        source.release();

        let (source, _) = replay_pair(Recording::default());
        let mut tracker = AttentionTracker::new(test_config(), source, detector).unwrap();
        tracker.start().unwrap();
        tracker.stop();

        assert!(tracker.process_frame(&frame).is_none());
    }

    struct FailingSource;

    impl FrameSource for FailingSource {
        fn acquire(&mut self) -> Result<(), TrackerError> {
            Err(TrackerError::PermissionDenied("user dismissed prompt".to_string()))
        }

        fn next_frame(&mut self) -> Option<Frame> {
            None
        }

        fn release(&mut self) {}
    }

    #[test]
    fn test_acquisition_failure_is_fatal() {
        let (_, detector) = replay_pair(Recording::default());
        let mut tracker = AttentionTracker::new(test_config(), FailingSource, detector).unwrap();

        let err = tracker.start().unwrap_err();
        assert!(err.is_acquisition_fault());
        assert_eq!(tracker.phase(), TrackerPhase::Failed);
    }

    struct NeverReadyDetector {
        attempts: Rc<Cell<u32>>,
    }

    impl LandmarkDetector for NeverReadyDetector {
        fn initialize(&mut self) -> Result<(), DetectorError> {
            self.attempts.set(self.attempts.get() + 1);
            Err(DetectorError::NotReady("model still loading".to_string()))
        }

        fn detect(&mut self, _frame: &Frame) -> Result<Option<crate::types::LandmarkSet>, DetectorError> {
            Ok(None)
        }

        fn close(&mut self) {}
    }

    #[test]
    fn test_detector_init_retries_then_fails() {
        let attempts = Rc::new(Cell::new(0u32));
        let detector = NeverReadyDetector {
            attempts: Rc::clone(&attempts),
        };
        let (source, _) = replay_pair(Recording::default());

        let config = TrackerConfig {
            readiness: ReadinessPolicy {
                max_attempts: 3,
                initial_backoff_ms: 1,
                max_backoff_ms: 2,
            },
            ..test_config()
        };
        let mut tracker = AttentionTracker::new(config, source, detector).unwrap();

        let err = tracker.start().unwrap_err();
        assert!(matches!(err, TrackerError::DetectorInit(_)));
        assert_eq!(attempts.get(), 3);
        assert_eq!(tracker.phase(), TrackerPhase::Failed);
    }

    struct FlakyDetector {
        inner: crate::detector::ReplayDetector,
        fail_on: u64,
    }

    impl LandmarkDetector for FlakyDetector {
        fn initialize(&mut self) -> Result<(), DetectorError> {
            self.inner.initialize()
        }

        fn detect(&mut self, frame: &Frame) -> Result<Option<crate::types::LandmarkSet>, DetectorError> {
            if frame.seq == self.fail_on {
                return Err(DetectorError::Inference("transient fault".to_string()));
            }
            self.inner.detect(frame)
        }

        fn close(&mut self) {
            self.inner.close()
        }
    }

    #[test]
    fn test_per_frame_detector_error_becomes_absent() {
        let recording = recording_of(vec![
            (0, Some(face(0.0125, 0.060))),
            (600, Some(face(0.0125, 0.060))),
        ]);
        let (source, inner) = replay_pair(recording);
        let detector = FlakyDetector { inner, fail_on: 1 };

        let mut tracker = AttentionTracker::new(test_config(), source, detector).unwrap();
        let seen = collect_emissions(&mut tracker);

        tracker.run().unwrap();

        let seen = seen.borrow();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[1].state, EngagementState::Absent);
    }
}
