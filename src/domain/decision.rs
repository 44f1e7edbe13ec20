//! Accept/reject verdicts and the decision backlog.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::ids::{SubmissionId, UserId};

/// The two possible verdicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DecisionOutcome {
    /// Paper accepted; a camera-ready upload is now required.
    Accept,
    /// Paper rejected.
    Reject,
}

impl DecisionOutcome {
    /// Database / wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Accept => "accept",
            Self::Reject => "reject",
        }
    }
}

impl fmt::Display for DecisionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DecisionOutcome {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "accept" => Ok(Self::Accept),
            "reject" => Ok(Self::Reject),
            other => Err(format!("unknown decision: {other}")),
        }
    }
}

/// The immutable verdict row. At most one exists per submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Decision {
    /// Decided submission.
    pub submission_id: SubmissionId,
    /// Verdict.
    pub decision: DecisionOutcome,
    /// Optional free-text justification.
    pub reason: Option<String>,
    /// Chair or admin who decided.
    pub decider_user_id: UserId,
    /// Insert timestamp.
    pub decided_at: DateTime<Utc>,
}

/// Values for inserting a [`Decision`].
#[derive(Debug, Clone)]
pub struct NewDecision {
    /// Decided submission.
    pub submission_id: SubmissionId,
    /// Verdict.
    pub decision: DecisionOutcome,
    /// Optional justification, already sanitized.
    pub reason: Option<String>,
    /// Acting user.
    pub decider_user_id: UserId,
}

/// One row of the decision backlog.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct QueueEntry {
    /// Waiting submission.
    pub submission_id: SubmissionId,
    /// Submission title.
    pub title: String,
    /// Number of submitted reviews.
    pub n_reviews: i64,
    /// Mean overall score over submitted reviews, 0 when there are none.
    pub avg_score: f64,
    /// Submission time; the queue is ordered by it, oldest first.
    pub created_at: DateTime<Utc>,
}
