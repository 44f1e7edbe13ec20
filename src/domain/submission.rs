//! Events, submissions and the listing filters over them.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::decision::DecisionOutcome;
use super::ids::{EventId, SubmissionId, UserId};
use super::role::EventRole;
use super::status::SubmissionStatus;

/// A conference instance. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Event {
    /// Event identifier.
    pub id: EventId,
    /// Display name.
    pub name: String,
    /// Optional description.
    pub description: Option<String>,
    /// First day of the event window.
    pub starts_on: Option<NaiveDate>,
    /// Last day of the event window.
    pub ends_on: Option<NaiveDate>,
    /// Administrator who created it.
    pub created_by: UserId,
    /// Insert timestamp.
    pub created_at: DateTime<Utc>,
}

/// Values for inserting an [`Event`].
#[derive(Debug, Clone)]
pub struct NewEvent {
    /// Sanitized name.
    pub name: String,
    /// Sanitized description.
    pub description: Option<String>,
    /// Window start.
    pub starts_on: Option<NaiveDate>,
    /// Window end.
    pub ends_on: Option<NaiveDate>,
    /// Acting administrator.
    pub created_by: UserId,
}

/// One `(event, user, role)` grant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct EventMember {
    /// Member account.
    pub user_id: UserId,
    /// Account email.
    pub email: String,
    /// Account display name.
    pub name: String,
    /// Granted role.
    pub role: EventRole,
}

/// A reviewer-role holder together with their workload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ReviewerSummary {
    /// Reviewer account.
    pub user_id: UserId,
    /// Account email.
    pub email: String,
    /// Account display name.
    pub name: String,
    /// Assignments held across all events.
    pub n_assigned_total: i64,
}

/// A co-author listed on the paper. Not necessarily an account holder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct AuthorEntry {
    /// Full name.
    pub name: String,
    /// Contact email, dropped when malformed.
    #[serde(default)]
    pub email: Option<String>,
    /// Affiliation.
    #[serde(default)]
    pub organization: Option<String>,
}

/// A paper submitted to an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Submission {
    /// Submission identifier.
    pub id: SubmissionId,
    /// Owning event.
    pub event_id: EventId,
    /// Submitting account; never allowed to review this paper.
    pub author_user_id: UserId,
    /// Paper title.
    pub title: String,
    /// Paper abstract.
    pub abstract_text: Option<String>,
    /// Comma-separated keywords as entered.
    pub keywords: Option<String>,
    /// Author list in paper order.
    pub authors: Vec<AuthorEntry>,
    /// Opaque reference returned by the file store for the review copy.
    pub file_ref: String,
    /// Lifecycle state.
    pub status: SubmissionStatus,
    /// Email to use for the membership check instead of the account email.
    pub membership_email: Option<String>,
    /// Insert timestamp.
    pub created_at: DateTime<Utc>,
    /// Camera-ready file reference.
    pub final_file_ref: Option<String>,
    /// Camera-ready upload time.
    pub final_submitted_at: Option<DateTime<Utc>>,
}

/// Values for inserting a [`Submission`].
#[derive(Debug, Clone)]
pub struct NewSubmission {
    /// Target event.
    pub event_id: EventId,
    /// Submitting account.
    pub author_user_id: UserId,
    /// Sanitized title.
    pub title: String,
    /// Sanitized abstract.
    pub abstract_text: Option<String>,
    /// Sanitized keywords.
    pub keywords: Option<String>,
    /// Sanitized author list.
    pub authors: Vec<AuthorEntry>,
    /// File store reference.
    pub file_ref: String,
    /// Validated membership email.
    pub membership_email: Option<String>,
}

/// Typed filter for the chair's submission listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmissionFilter {
    /// Only submissions in this status.
    pub status: Option<SubmissionStatus>,
    /// Case-insensitive substring of the title.
    pub title_query: Option<String>,
    /// 1-based page.
    pub page: u32,
    /// Page size, 1..=100.
    pub per_page: u32,
}

impl SubmissionFilter {
    /// Largest accepted page size.
    pub const MAX_PER_PAGE: u32 = 100;

    /// Clamps paging into the accepted range and drops a blank title query.
    #[must_use]
    pub fn normalized(self) -> Self {
        Self {
            status: self.status,
            title_query: self
                .title_query
                .map(|q| q.trim().to_lowercase())
                .filter(|q| !q.is_empty()),
            page: self.page.max(1),
            per_page: self.per_page.clamp(1, Self::MAX_PER_PAGE),
        }
    }

    /// Rows to skip for the current page.
    #[must_use]
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.per_page)
    }

    /// Whether a submission passes the status and title predicates.
    #[must_use]
    pub fn matches(&self, submission: &Submission) -> bool {
        if let Some(status) = self.status
            && submission.status != status
        {
            return false;
        }
        match &self.title_query {
            Some(q) => submission.title.to_lowercase().contains(q.as_str()),
            None => true,
        }
    }
}

/// Chair listing row with review aggregates.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct SubmissionOverview {
    /// Submission identifier.
    pub id: SubmissionId,
    /// Title.
    pub title: String,
    /// Lifecycle state.
    pub status: SubmissionStatus,
    /// Insert timestamp.
    pub created_at: DateTime<Utc>,
    /// Verdict, when one exists.
    pub decision: Option<DecisionOutcome>,
    /// Assignment rows.
    pub n_assigned: i64,
    /// Submitted reviews.
    pub n_submitted: i64,
    /// Mean overall score over submitted reviews.
    pub avg_score: f64,
}
