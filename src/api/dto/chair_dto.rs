//! Chair assignment DTOs.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use utoipa::ToSchema;

use crate::domain::{SubmissionId, UserId};
use crate::service::{AssignRequest, InviteRequest, UnassignRequest};

/// Request body for `POST .../chair/submissions/{submission_id}/assign`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct AssignBody {
    /// Candidate reviewers.
    pub reviewer_ids: Vec<UserId>,
    /// Review deadline.
    #[serde(default)]
    pub due_at: Option<DateTime<Utc>>,
    /// Assign even after a decision.
    #[serde(default)]
    pub force: bool,
}

impl AssignBody {
    /// Binds the body to its submission.
    #[must_use]
    pub fn into_request(self, submission_id: SubmissionId) -> AssignRequest {
        AssignRequest {
            submission_id,
            reviewer_ids: self.reviewer_ids,
            due_at: self.due_at,
            force: self.force,
        }
    }
}

/// Request body for `POST .../chair/submissions/{submission_id}/unassign`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct UnassignBody {
    /// Reviewers to remove.
    pub reviewer_ids: Vec<UserId>,
    /// Also delete already submitted reviews.
    #[serde(default)]
    pub force: bool,
}

impl UnassignBody {
    /// Binds the body to its submission.
    #[must_use]
    pub fn into_request(self, submission_id: SubmissionId) -> UnassignRequest {
        UnassignRequest {
            submission_id,
            reviewer_ids: self.reviewer_ids,
            force: self.force,
        }
    }
}

/// Request body for `POST .../chair/submissions/{submission_id}/external-invite`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct InviteBody {
    /// Reviewer name.
    pub name: String,
    /// Reviewer email.
    pub email: String,
    /// Review deadline.
    #[serde(default)]
    pub due_at: Option<DateTime<Utc>>,
    /// Invite even after a decision.
    #[serde(default)]
    pub force: bool,
}

impl InviteBody {
    /// Binds the body to its submission.
    #[must_use]
    pub fn into_request(self, submission_id: SubmissionId) -> InviteRequest {
        InviteRequest {
            submission_id,
            name: self.name,
            email: self.email,
            due_at: self.due_at,
            force: self.force,
        }
    }
}
