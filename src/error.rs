//! Error types for the attention engine
//!
//! Only acquisition-time faults cross the core/consumer boundary. Per-frame
//! detector failures are recovered locally as "no face this frame" and never
//! appear here.

use thiserror::Error;

/// Errors that can occur while acquiring resources or configuring a tracker
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("Camera unavailable: {0}")]
    CameraUnavailable(String),

    #[error("Camera permission denied: {0}")]
    PermissionDenied(String),

    #[error("Landmark detector failed to initialize: {0}")]
    DetectorInit(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl TrackerError {
    /// Whether this error is fatal to the tracker instance.
    ///
    /// All variants surfaced by the frame loop controller are acquisition
    /// faults and therefore fatal; config/JSON errors occur before a tracker
    /// ever starts.
    pub fn is_acquisition_fault(&self) -> bool {
        matches!(
            self,
            TrackerError::CameraUnavailable(_)
                | TrackerError::PermissionDenied(_)
                | TrackerError::DetectorInit(_)
        )
    }
}
