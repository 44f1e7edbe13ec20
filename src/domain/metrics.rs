//! Process-local outcome counters exposed at `GET /metrics`.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use utoipa::ToSchema;

use super::decision::DecisionOutcome;

/// Monotonic counters for review, decision and final-upload outcomes.
#[derive(Debug, Default)]
pub struct OutcomeCounters {
    reviews_submitted: AtomicU64,
    decisions_accept: AtomicU64,
    decisions_reject: AtomicU64,
    final_uploads: AtomicU64,
}

/// Point-in-time copy of [`OutcomeCounters`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct CountersSnapshot {
    /// Reviews submitted or overwritten, internal and external.
    pub reviews_submitted: u64,
    /// Accept decisions recorded.
    pub decisions_accept: u64,
    /// Reject decisions recorded.
    pub decisions_reject: u64,
    /// Camera-ready uploads accepted.
    pub final_uploads: u64,
}

impl OutcomeCounters {
    /// Creates zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts one stored review.
    pub fn review_submitted(&self) {
        self.reviews_submitted.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts one recorded decision.
    pub fn decision(&self, outcome: DecisionOutcome) {
        let counter = match outcome {
            DecisionOutcome::Accept => &self.decisions_accept,
            DecisionOutcome::Reject => &self.decisions_reject,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts one accepted camera-ready upload.
    pub fn final_uploaded(&self) {
        self.final_uploads.fetch_add(1, Ordering::Relaxed);
    }

    /// Reads every counter.
    #[must_use]
    pub fn snapshot(&self) -> CountersSnapshot {
        CountersSnapshot {
            reviews_submitted: self.reviews_submitted.load(Ordering::Relaxed),
            decisions_accept: self.decisions_accept.load(Ordering::Relaxed),
            decisions_reject: self.decisions_reject.load(Ordering::Relaxed),
            final_uploads: self.final_uploads.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_by_outcome() {
        let counters = OutcomeCounters::new();
        counters.decision(DecisionOutcome::Accept);
        counters.decision(DecisionOutcome::Accept);
        counters.decision(DecisionOutcome::Reject);
        counters.review_submitted();
        counters.final_uploaded();

        let snap = counters.snapshot();
        assert_eq!(snap.decisions_accept, 2);
        assert_eq!(snap.decisions_reject, 1);
        assert_eq!(snap.reviews_submitted, 1);
        assert_eq!(snap.final_uploads, 1);
    }
}
