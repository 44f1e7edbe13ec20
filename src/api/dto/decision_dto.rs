//! Decision DTOs.

use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

use crate::domain::{DecisionOutcome, SubmissionId};
use crate::service::DecideRequest;

/// Request body for `POST .../decisions/{submission_id}`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct DecideBody {
    /// `accept` or `reject`.
    pub decision: DecisionOutcome,
    /// Optional reason, up to 2000 characters.
    #[serde(default)]
    pub reason: Option<String>,
    /// Quorum of submitted reviews; the server default when omitted.
    #[serde(default)]
    pub min_reviews: Option<i64>,
    /// Skip the quorum check (administrators only).
    #[serde(default)]
    pub force: bool,
}

impl DecideBody {
    /// Binds the body to its submission.
    #[must_use]
    pub fn into_request(self, submission_id: SubmissionId) -> DecideRequest {
        DecideRequest {
            submission_id,
            decision: self.decision,
            reason: self.reason,
            min_reviews: self.min_reviews,
            force: self.force,
        }
    }
}

/// Query string of `GET .../decisions/queue`.
#[derive(Debug, Clone, Copy, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct QueueQuery {
    /// Quorum of submitted reviews; the server default when omitted.
    #[serde(default)]
    pub min_reviews: Option<i64>,
}
