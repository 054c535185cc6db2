//! EduPulse Attention - on-device attention inference for webcam learning sessions
//!
//! The engine turns per-frame facial landmark geometry into a bounded,
//! smoothed, rate-limited attention signal through a deterministic pipeline:
//! landmark detection (external) → geometry metrics → score normalization →
//! temporal smoothing → state classification → emission gating.
//!
//! ## Modules
//!
//! - **Tracker**: the frame loop controller owning the camera and detector seams
//! - **Session**: aggregation of accepted updates into session reports

pub mod classifier;
pub mod config;
pub mod detector;
pub mod emitter;
pub mod error;
pub mod metrics;
pub mod normalizer;
pub mod session;
pub mod smoother;
pub mod tracker;
pub mod types;

pub use config::TrackerConfig;
pub use error::TrackerError;
pub use tracker::{AttentionTracker, StopHandle, TrackerPhase};

// Pipeline exports
pub use classifier::StateClassifier;
pub use emitter::{AttentionSink, EmissionGate};
pub use normalizer::ScoreNormalizer;
pub use smoother::TemporalSmoother;

// Data-model exports
pub use types::{AttentionScore, EmissionRecord, EngagementState, Landmark, LandmarkSet, RawMetrics};

// Session exports
pub use session::{SessionAggregator, SessionReport};

/// Engine version embedded in all session reports
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for session reports
pub const PRODUCER_NAME: &str = "edupulse-attention";
