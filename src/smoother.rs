//! Temporal smoothing
//!
//! Maintains a bounded rolling window of recent raw attention scores and
//! produces a moving-average output to suppress per-frame jitter from
//! landmark detection noise. The window is cleared whenever a frame has no
//! detected face, so absence is never smoothed away by stale history.

use crate::types::AttentionScore;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Moving-average smoother over a fixed-capacity score history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemporalSmoother {
    history: VecDeque<AttentionScore>,
    capacity: usize,
}

impl TemporalSmoother {
    pub fn new(capacity: usize) -> Self {
        Self {
            history: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Push a raw score and return the smoothed (mean) score.
    ///
    /// Evicts exactly the oldest entry when the window is at capacity.
    pub fn observe(&mut self, raw: AttentionScore) -> AttentionScore {
        self.history.push_back(raw);
        while self.history.len() > self.capacity {
            self.history.pop_front();
        }

        let sum: u32 = self.history.iter().map(|&s| s as u32).sum();
        (sum as f64 / self.history.len() as f64).round() as AttentionScore
    }

    /// Clear the window. Called on every frame with no detected face.
    pub fn clear(&mut self) {
        self.history.clear();
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }
}
