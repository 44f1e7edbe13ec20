//! Database row types and their conversion into domain values.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::FromRow;
use sqlx::types::Json;

use crate::domain::{
    AssignmentView, AuthorEntry, Decision, Event, EventMember, EventRole, ExternalReviewer,
    ExternalReviewerId, QueueEntry, Review, ReviewStatus, ReviewerAssignment, ReviewerRef,
    ReviewerSummary, Scores, Submission, SubmissionOverview, SubmissionStatus,
};
use crate::error::ReviewError;

/// An account as the review service sees it. Accounts are owned by the
/// upstream authentication system; only these columns are read.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct UserRecord {
    /// Account id.
    pub id: i64,
    /// Login email.
    pub email: String,
    /// Display name.
    pub name: String,
    /// Global administrator flag.
    pub is_admin: bool,
}

/// One row of `membership_validations`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MembershipValidation {
    /// Checked submission.
    pub submission_id: i64,
    /// Uploading user.
    pub user_id: i64,
    /// Email that was checked.
    pub email: String,
    /// Verdict.
    pub ok: bool,
    /// Reason code when not ok, or `unconfigured`.
    pub reason: Option<String>,
}

fn parse_status(raw: &str) -> Result<SubmissionStatus, ReviewError> {
    raw.parse()
        .map_err(|e: crate::domain::status::UnknownStatus| ReviewError::Persistence(e.to_string()))
}

fn parse_outcome<T: std::str::FromStr<Err = String>>(raw: &str) -> Result<T, ReviewError> {
    raw.parse().map_err(ReviewError::Persistence)
}

fn reviewer_ref(user: Option<i64>, external: Option<i64>) -> Result<ReviewerRef, ReviewError> {
    match (user, external) {
        (Some(id), None) => Ok(ReviewerRef::User(id.into())),
        (None, Some(id)) => Ok(ReviewerRef::External(ExternalReviewerId::new(id))),
        _ => Err(ReviewError::Persistence(
            "review row must reference exactly one reviewer".to_string(),
        )),
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct EventRow {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub starts_on: Option<NaiveDate>,
    pub ends_on: Option<NaiveDate>,
    pub created_by: i64,
    pub created_at: DateTime<Utc>,
}

impl From<EventRow> for Event {
    fn from(row: EventRow) -> Self {
        Self {
            id: row.id.into(),
            name: row.name,
            description: row.description,
            starts_on: row.starts_on,
            ends_on: row.ends_on,
            created_by: row.created_by.into(),
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct SubmissionRow {
    pub id: i64,
    pub event_id: i64,
    pub author_user_id: i64,
    pub title: String,
    #[sqlx(rename = "abstract")]
    pub abstract_text: Option<String>,
    pub keywords: Option<String>,
    pub authors: Json<Vec<AuthorEntry>>,
    pub file_ref: String,
    pub status: String,
    pub membership_email: Option<String>,
    pub created_at: DateTime<Utc>,
    pub final_file_ref: Option<String>,
    pub final_submitted_at: Option<DateTime<Utc>>,
}

impl TryFrom<SubmissionRow> for Submission {
    type Error = ReviewError;

    fn try_from(row: SubmissionRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id.into(),
            event_id: row.event_id.into(),
            author_user_id: row.author_user_id.into(),
            title: row.title,
            abstract_text: row.abstract_text,
            keywords: row.keywords,
            authors: row.authors.0,
            file_ref: row.file_ref,
            status: parse_status(&row.status)?,
            membership_email: row.membership_email,
            created_at: row.created_at,
            final_file_ref: row.final_file_ref,
            final_submitted_at: row.final_submitted_at,
        })
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct DecisionRow {
    pub submission_id: i64,
    pub decision: String,
    pub reason: Option<String>,
    pub decider_user_id: i64,
    pub decided_at: DateTime<Utc>,
}

impl TryFrom<DecisionRow> for Decision {
    type Error = ReviewError;

    fn try_from(row: DecisionRow) -> Result<Self, Self::Error> {
        Ok(Self {
            submission_id: row.submission_id.into(),
            decision: parse_outcome(&row.decision)?,
            reason: row.reason,
            decider_user_id: row.decider_user_id.into(),
            decided_at: row.decided_at,
        })
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct ReviewRow {
    pub submission_id: i64,
    pub reviewer_user_id: Option<i64>,
    pub external_reviewer_id: Option<i64>,
    pub reviewer_name: Option<String>,
    pub status: String,
    pub score_technical: Option<i32>,
    pub score_relevance: Option<i32>,
    pub score_innovation: Option<i32>,
    pub score_writing: Option<i32>,
    pub score_overall: Option<f64>,
    pub comments_for_author: Option<String>,
    pub comments_committee: Option<String>,
    pub submitted_at: Option<DateTime<Utc>>,
}

impl TryFrom<ReviewRow> for Review {
    type Error = ReviewError;

    fn try_from(row: ReviewRow) -> Result<Self, Self::Error> {
        let scores = match (
            row.score_technical,
            row.score_relevance,
            row.score_innovation,
            row.score_writing,
        ) {
            (Some(technical), Some(relevance), Some(innovation), Some(writing)) => Some(Scores {
                technical,
                relevance,
                innovation,
                writing,
            }),
            _ => None,
        };
        Ok(Self {
            submission_id: row.submission_id.into(),
            reviewer: reviewer_ref(row.reviewer_user_id, row.external_reviewer_id)?,
            reviewer_name: row.reviewer_name,
            status: parse_outcome::<ReviewStatus>(&row.status)?,
            scores,
            overall: row.score_overall,
            comments_for_author: row.comments_for_author,
            comments_committee: row.comments_committee,
            submitted_at: row.submitted_at,
        })
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct AssignmentRow {
    pub reviewer_user_id: Option<i64>,
    pub external_reviewer_id: Option<i64>,
    pub reviewer_name: Option<String>,
    pub reviewer_email: Option<String>,
    pub assigned_at: DateTime<Utc>,
    pub due_at: Option<DateTime<Utc>>,
    pub review_status: Option<String>,
    pub submitted_at: Option<DateTime<Utc>>,
}

impl TryFrom<AssignmentRow> for AssignmentView {
    type Error = ReviewError;

    fn try_from(row: AssignmentRow) -> Result<Self, Self::Error> {
        Ok(Self {
            reviewer: reviewer_ref(row.reviewer_user_id, row.external_reviewer_id)?,
            reviewer_name: row.reviewer_name,
            reviewer_email: row.reviewer_email,
            assigned_at: row.assigned_at,
            due_at: row.due_at,
            review_status: row
                .review_status
                .as_deref()
                .map(parse_outcome::<ReviewStatus>)
                .transpose()?,
            submitted_at: row.submitted_at,
        })
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct ReviewerAssignmentRow {
    pub submission_id: i64,
    pub title: String,
    pub status: String,
    pub assigned_at: DateTime<Utc>,
    pub due_at: Option<DateTime<Utc>>,
    pub review_status: Option<String>,
}

impl TryFrom<ReviewerAssignmentRow> for ReviewerAssignment {
    type Error = ReviewError;

    fn try_from(row: ReviewerAssignmentRow) -> Result<Self, Self::Error> {
        Ok(Self {
            submission_id: row.submission_id.into(),
            title: row.title,
            status: parse_status(&row.status)?,
            assigned_at: row.assigned_at,
            due_at: row.due_at,
            review_status: row
                .review_status
                .as_deref()
                .map(parse_outcome::<ReviewStatus>)
                .transpose()?,
        })
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct QueueRow {
    pub submission_id: i64,
    pub title: String,
    pub n_reviews: i64,
    pub avg_score: f64,
    pub created_at: DateTime<Utc>,
}

impl From<QueueRow> for QueueEntry {
    fn from(row: QueueRow) -> Self {
        Self {
            submission_id: row.submission_id.into(),
            title: row.title,
            n_reviews: row.n_reviews,
            avg_score: row.avg_score,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct OverviewRow {
    pub id: i64,
    pub title: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub decision: Option<String>,
    pub n_assigned: i64,
    pub n_submitted: i64,
    pub avg_score: f64,
}

impl TryFrom<OverviewRow> for SubmissionOverview {
    type Error = ReviewError;

    fn try_from(row: OverviewRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id.into(),
            title: row.title,
            status: parse_status(&row.status)?,
            created_at: row.created_at,
            decision: row.decision.as_deref().map(parse_outcome::<crate::domain::DecisionOutcome>).transpose()?,
            n_assigned: row.n_assigned,
            n_submitted: row.n_submitted,
            avg_score: row.avg_score,
        })
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct MemberRow {
    pub user_id: i64,
    pub email: String,
    pub name: String,
    pub role: String,
}

impl TryFrom<MemberRow> for EventMember {
    type Error = ReviewError;

    fn try_from(row: MemberRow) -> Result<Self, Self::Error> {
        Ok(Self {
            user_id: row.user_id.into(),
            email: row.email,
            name: row.name,
            role: parse_outcome::<EventRole>(&row.role)?,
        })
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct ReviewerSummaryRow {
    pub user_id: i64,
    pub email: String,
    pub name: String,
    pub n_assigned_total: i64,
}

impl From<ReviewerSummaryRow> for ReviewerSummary {
    fn from(row: ReviewerSummaryRow) -> Self {
        Self {
            user_id: row.user_id.into(),
            email: row.email,
            name: row.name,
            n_assigned_total: row.n_assigned_total,
        }
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct ExternalReviewerRow {
    pub id: i64,
    pub event_id: i64,
    pub name: String,
    pub email: String,
    pub invite_token: String,
    pub expires_at: DateTime<Utc>,
}

impl From<ExternalReviewerRow> for ExternalReviewer {
    fn from(row: ExternalReviewerRow) -> Self {
        Self {
            id: ExternalReviewerId::new(row.id),
            event_id: row.event_id.into(),
            name: row.name,
            email: row.email,
            invite_token: row.invite_token,
            expires_at: row.expires_at,
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn review_row_without_scores_has_none() {
        let row = ReviewRow {
            submission_id: 1,
            reviewer_user_id: Some(2),
            external_reviewer_id: None,
            reviewer_name: None,
            status: "assigned".to_string(),
            score_technical: None,
            score_relevance: None,
            score_innovation: None,
            score_writing: None,
            score_overall: None,
            comments_for_author: None,
            comments_committee: None,
            submitted_at: None,
        };
        let Ok(review) = Review::try_from(row) else {
            panic!("row should convert");
        };
        assert_eq!(review.scores, None);
        assert_eq!(review.status, ReviewStatus::Assigned);
        assert_eq!(review.reviewer, ReviewerRef::User(2.into()));
    }

    #[test]
    fn review_row_with_unknown_status_is_rejected() {
        let row = ReviewRow {
            submission_id: 1,
            reviewer_user_id: Some(2),
            external_reviewer_id: None,
            reviewer_name: None,
            status: "draft".to_string(),
            score_technical: None,
            score_relevance: None,
            score_innovation: None,
            score_writing: None,
            score_overall: None,
            comments_for_author: None,
            comments_committee: None,
            submitted_at: None,
        };
        let Err(err) = Review::try_from(row) else {
            panic!("draft is not a review status");
        };
        assert!(err.is_server_error());
    }

    #[test]
    fn review_row_needs_exactly_one_reviewer() {
        assert!(reviewer_ref(Some(1), Some(2)).is_err());
        assert!(reviewer_ref(None, None).is_err());
    }

    #[test]
    fn unknown_status_is_a_persistence_error() {
        let Err(err) = parse_status("archived") else {
            panic!("archived is not a status");
        };
        assert!(err.is_server_error());
    }
}
