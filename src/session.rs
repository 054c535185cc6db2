//! Session aggregation
//!
//! Consumes the emission gate's accepted updates and aggregates them into a
//! serializable session report: average and peak attention, the engagement
//! distribution across states, and the full update timeline. This is the
//! crate-side counterpart of the dashboards that consume the tracker's
//! output; persistence and rendering stay with the host application.

use crate::emitter::AttentionSink;
use crate::error::TrackerError;
use crate::types::{AttentionScore, EmissionRecord, EngagementState};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::rc::Rc;
use uuid::Uuid;

/// Report producer metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportProducer {
    pub name: String,
    pub version: String,
    pub instance_id: String,
}

/// Update counts and percentages per engagement state.
///
/// Percentages are over accepted (rate-limited) updates, not raw frames.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngagementBreakdown {
    pub attentive: usize,
    pub distracted: usize,
    pub absent: usize,
    pub attentive_pct: f64,
    pub distracted_pct: f64,
    pub absent_pct: f64,
}

/// Aggregated view of one tracking session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionReport {
    pub producer: ReportProducer,
    pub generated_at_utc: String,
    /// Timestamp of the first accepted update, if any
    pub started_at_ms: Option<u64>,
    /// Timestamp of the last accepted update, if any
    pub ended_at_ms: Option<u64>,
    pub update_count: usize,
    /// Mean score across all updates (Absent updates count as 0)
    pub average_score: f64,
    pub peak_score: AttentionScore,
    pub breakdown: EngagementBreakdown,
    pub timeline: Vec<EmissionRecord>,
}

impl SessionReport {
    pub fn to_json(&self) -> Result<String, TrackerError> {
        serde_json::to_string_pretty(self).map_err(TrackerError::JsonError)
    }
}

/// Accumulates accepted updates for one session.
#[derive(Debug, Clone)]
pub struct SessionAggregator {
    instance_id: String,
    timeline: Vec<EmissionRecord>,
}

impl Default for SessionAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionAggregator {
    pub fn new() -> Self {
        Self {
            instance_id: Uuid::new_v4().to_string(),
            timeline: Vec::new(),
        }
    }

    /// Shared handle that can be subscribed to a tracker and read afterwards
    pub fn shared() -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Self::new()))
    }

    /// Subscriber over a shared handle, for [`crate::emitter::EmissionGate::subscribe`]
    pub fn sink(this: &Rc<RefCell<Self>>) -> Box<dyn AttentionSink> {
        let handle = Rc::clone(this);
        Box::new(move |record: &EmissionRecord| handle.borrow_mut().record(record))
    }

    /// Record one accepted update
    pub fn record(&mut self, record: &EmissionRecord) {
        self.timeline.push(*record);
    }

    pub fn update_count(&self) -> usize {
        self.timeline.len()
    }

    /// Build the report for the updates seen so far.
    pub fn report(&self) -> SessionReport {
        let mut breakdown = EngagementBreakdown::default();
        let mut score_sum: u64 = 0;
        let mut peak_score: AttentionScore = 0;

        for record in &self.timeline {
            match record.state {
                EngagementState::Attentive => breakdown.attentive += 1,
                EngagementState::Distracted => breakdown.distracted += 1,
                EngagementState::Absent => breakdown.absent += 1,
            }
            score_sum += record.score as u64;
            peak_score = peak_score.max(record.score);
        }

        let count = self.timeline.len();
        if count > 0 {
            let total = count as f64;
            breakdown.attentive_pct = breakdown.attentive as f64 / total * 100.0;
            breakdown.distracted_pct = breakdown.distracted as f64 / total * 100.0;
            breakdown.absent_pct = breakdown.absent as f64 / total * 100.0;
        }

        SessionReport {
            producer: ReportProducer {
                name: crate::PRODUCER_NAME.to_string(),
                version: crate::ENGINE_VERSION.to_string(),
                instance_id: self.instance_id.clone(),
            },
            generated_at_utc: Utc::now().to_rfc3339(),
            started_at_ms: self.timeline.first().map(|r| r.timestamp_ms),
            ended_at_ms: self.timeline.last().map(|r| r.timestamp_ms),
            update_count: count,
            average_score: if count > 0 {
                score_sum as f64 / count as f64
            } else {
                0.0
            },
            peak_score,
            breakdown,
            timeline: self.timeline.clone(),
        }
    }
}
