//! Emission gating
//!
//! Rate-limits and de-duplicates outgoing (state, score) updates so that
//! downstream consumers see a bounded update frequency regardless of the
//! detection loop's frame rate. Accepted updates fan out to every registered
//! subscriber.

use crate::types::{AttentionScore, EmissionRecord, EngagementState};

/// Consumer of accepted attention updates.
///
/// Implemented for closures, so `gate.subscribe(|record| ...)` works; state
/// aggregators implement it directly.
pub trait AttentionSink {
    fn on_update(&mut self, record: &EmissionRecord);
}

impl<F: FnMut(&EmissionRecord)> AttentionSink for F {
    fn on_update(&mut self, record: &EmissionRecord) {
        self(record)
    }
}

/// Gate holding the last emitted record and the subscriber list
pub struct EmissionGate {
    min_interval_ms: u64,
    last_emitted: Option<EmissionRecord>,
    sinks: Vec<Box<dyn AttentionSink>>,
}

impl EmissionGate {
    pub fn new(min_interval_ms: u64) -> Self {
        Self {
            min_interval_ms,
            last_emitted: None,
            sinks: Vec::new(),
        }
    }

    /// Register a subscriber. Every accepted update is delivered to each
    /// subscriber exactly once, in registration order.
    pub fn subscribe(&mut self, sink: Box<dyn AttentionSink>) {
        self.sinks.push(sink);
    }

    /// Offer a candidate update at the given frame timestamp.
    ///
    /// The candidate is suppressed if it matches the last emitted record in
    /// both state and score, or if less than the minimum interval has elapsed
    /// since the last emission, regardless of whether the value changed.
    /// Returns the emitted record when accepted.
    pub fn offer(
        &mut self,
        state: EngagementState,
        score: AttentionScore,
        timestamp_ms: u64,
    ) -> Option<EmissionRecord> {
        if let Some(last) = &self.last_emitted {
            if last.state == state && last.score == score {
                return None;
            }
            if timestamp_ms.saturating_sub(last.timestamp_ms) < self.min_interval_ms {
                return None;
            }
        }

        let record = EmissionRecord {
            state,
            score,
            timestamp_ms,
        };
        self.last_emitted = Some(record);

        for sink in &mut self.sinks {
            sink.on_update(&record);
        }

        Some(record)
    }

    /// The most recently emitted record, if any
    pub fn last_emitted(&self) -> Option<&EmissionRecord> {
        self.last_emitted.as_ref()
    }

    /// Forget the last emitted record so the next offer is always accepted.
    ///
    /// Subscribers stay registered. Called when a stopped tracker restarts:
    /// a fresh session must not de-duplicate or rate-limit against the
    /// previous session's final record.
    pub fn reset(&mut self) {
        self.last_emitted = None;
    }
}

impl std::fmt::Debug for EmissionGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmissionGate")
            .field("min_interval_ms", &self.min_interval_ms)
            .field("last_emitted", &self.last_emitted)
            .field("sinks", &self.sinks.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_first_offer_always_emits() {
        let mut gate = EmissionGate::new(500);
        let emitted = gate.offer(EngagementState::Attentive, 60, 0);
        assert!(emitted.is_some());
        assert_eq!(gate.last_emitted().unwrap().score, 60);
    }

    #[test]
    fn test_duplicate_suppressed() {
        let mut gate = EmissionGate::new(500);
        gate.offer(EngagementState::Attentive, 60, 0);
        // Same pair, well past the interval: still suppressed
        assert!(gate.offer(EngagementState::Attentive, 60, 5_000).is_none());
    }

    #[test]
    fn test_rate_limit_suppresses_changed_value() {
        let mut gate = EmissionGate::new(500);
        gate.offer(EngagementState::Attentive, 60, 1_000);
        assert!(gate.offer(EngagementState::Attentive, 61, 1_200).is_none());
        assert!(gate.offer(EngagementState::Attentive, 61, 1_499).is_none());
        assert!(gate.offer(EngagementState::Attentive, 61, 1_500).is_some());
    }

    #[test]
    fn test_state_change_still_rate_limited() {
        let mut gate = EmissionGate::new(500);
        gate.offer(EngagementState::Attentive, 60, 1_000);
        assert!(gate.offer(EngagementState::Absent, 0, 1_100).is_none());
        assert!(gate.offer(EngagementState::Absent, 0, 1_600).is_some());
    }

    #[test]
    fn test_subscribers_see_each_accepted_update_once() {
        let seen: Rc<RefCell<Vec<EmissionRecord>>> = Rc::new(RefCell::new(Vec::new()));
        let sink_seen = Rc::clone(&seen);

        let mut gate = EmissionGate::new(500);
        gate.subscribe(Box::new(move |record: &EmissionRecord| {
            sink_seen.borrow_mut().push(*record);
        }));

        gate.offer(EngagementState::Attentive, 60, 0);
        gate.offer(EngagementState::Attentive, 60, 600); // duplicate
        gate.offer(EngagementState::Distracted, 40, 700); // too soon
        gate.offer(EngagementState::Distracted, 40, 900);

        let seen = seen.borrow();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].score, 60);
        assert_eq!(seen[1].state, EngagementState::Distracted);
    }

    #[test]
    fn test_reset_clears_last_emitted_but_keeps_subscribers() {
        let seen: Rc<RefCell<Vec<EmissionRecord>>> = Rc::new(RefCell::new(Vec::new()));
        let sink_seen = Rc::clone(&seen);

        let mut gate = EmissionGate::new(500);
        gate.subscribe(Box::new(move |record: &EmissionRecord| {
            sink_seen.borrow_mut().push(*record);
        }));

        gate.offer(EngagementState::Attentive, 60, 5_000);
        gate.reset();
        assert!(gate.last_emitted().is_none());

        // Identical pair at an earlier timestamp: accepted and delivered
        assert!(gate.offer(EngagementState::Attentive, 60, 0).is_some());
        assert_eq!(seen.borrow().len(), 2);
    }

    #[test]
    fn test_no_back_to_back_identical_pairs() {
        let mut gate = EmissionGate::new(100);
        let mut emissions = Vec::new();

        // Alternate a few values at a generous spacing, with duplicates mixed in
        let candidates = [
            (EngagementState::Attentive, 60u8),
            (EngagementState::Attentive, 60),
            (EngagementState::Distracted, 40),
            (EngagementState::Distracted, 40),
            (EngagementState::Attentive, 60),
        ];
        for (i, (state, score)) in candidates.into_iter().enumerate() {
            if let Some(record) = gate.offer(state, score, (i as u64 + 1) * 200) {
                emissions.push(record);
            }
        }

        for pair in emissions.windows(2) {
            assert!(pair[0].state != pair[1].state || pair[0].score != pair[1].score);
            assert!(pair[1].timestamp_ms - pair[0].timestamp_ms >= 100);
        }
    }
}
