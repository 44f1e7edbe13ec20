//! Reviewer assignments, review rows and scoring.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::ids::{EventId, ExternalReviewerId, SubmissionId, UserId};
use super::status::SubmissionStatus;

/// Who a review or assignment belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ReviewerRef {
    /// Account holder with the reviewer role.
    User(UserId),
    /// Invited reviewer acting through a token.
    External(ExternalReviewerId),
}

impl ReviewerRef {
    /// The account id, if this is an account holder.
    #[must_use]
    pub const fn user_id(self) -> Option<UserId> {
        match self {
            Self::User(id) => Some(id),
            Self::External(_) => None,
        }
    }
}

/// Review row lifecycle: created `assigned`, flipped to `submitted` on scoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    /// Placeholder created by assignment.
    Assigned,
    /// Scores recorded.
    Submitted,
}

impl ReviewStatus {
    /// Database / wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Assigned => "assigned",
            Self::Submitted => "submitted",
        }
    }
}

impl FromStr for ReviewStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "assigned" => Ok(Self::Assigned),
            "submitted" => Ok(Self::Submitted),
            other => Err(format!("unknown review status: {other}")),
        }
    }
}

/// Lowest accepted sub-score.
pub const MIN_SCORE: i32 = 1;
/// Highest accepted sub-score.
pub const MAX_SCORE: i32 = 5;

/// The four validated sub-scores of a review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Scores {
    /// Technical quality.
    pub technical: i32,
    /// Relevance to the event.
    pub relevance: i32,
    /// Novelty.
    pub innovation: i32,
    /// Presentation quality.
    pub writing: i32,
}

/// A sub-score outside `MIN_SCORE..=MAX_SCORE`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field} must be an integer between 1 and 5, got {value}")]
pub struct ScoreOutOfRange {
    /// Offending field name.
    pub field: &'static str,
    /// Rejected value.
    pub value: i64,
}

impl Scores {
    /// Validates every sub-score.
    ///
    /// # Errors
    ///
    /// Returns [`ScoreOutOfRange`] for the first sub-score outside 1..=5.
    pub fn new(
        technical: i64,
        relevance: i64,
        innovation: i64,
        writing: i64,
    ) -> Result<Self, ScoreOutOfRange> {
        Ok(Self {
            technical: check("score_technical", technical)?,
            relevance: check("score_relevance", relevance)?,
            innovation: check("score_innovation", innovation)?,
            writing: check("score_writing", writing)?,
        })
    }

    /// Mean of the four sub-scores rounded to two decimals.
    #[must_use]
    pub fn overall(&self) -> f64 {
        let sum = self.technical + self.relevance + self.innovation + self.writing;
        (f64::from(sum) / 4.0 * 100.0).round() / 100.0
    }
}

fn check(field: &'static str, value: i64) -> Result<i32, ScoreOutOfRange> {
    i32::try_from(value)
        .ok()
        .filter(|v| (MIN_SCORE..=MAX_SCORE).contains(v))
        .ok_or(ScoreOutOfRange { field, value })
}

/// One review row, including committee-only fields.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct Review {
    /// Reviewed submission.
    pub submission_id: SubmissionId,
    /// Review owner.
    pub reviewer: ReviewerRef,
    /// Reviewer display name, when known.
    pub reviewer_name: Option<String>,
    /// Row lifecycle.
    pub status: ReviewStatus,
    /// Sub-scores, present once submitted.
    pub scores: Option<Scores>,
    /// Rounded mean of the sub-scores.
    pub overall: Option<f64>,
    /// Comments shown to the author.
    pub comments_for_author: Option<String>,
    /// Comments visible to the committee only.
    pub comments_committee: Option<String>,
    /// Last submission time.
    pub submitted_at: Option<DateTime<Utc>>,
}

/// Author-facing projection of a [`Review`]: no reviewer identity, no
/// committee comments.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct AuthorReview {
    /// Sub-scores.
    pub scores: Option<Scores>,
    /// Rounded mean.
    pub overall: Option<f64>,
    /// Comments addressed to the author.
    pub comments_for_author: Option<String>,
    /// Row lifecycle.
    pub status: ReviewStatus,
    /// Submission time.
    pub submitted_at: Option<DateTime<Utc>>,
}

impl From<Review> for AuthorReview {
    fn from(review: Review) -> Self {
        Self {
            scores: review.scores,
            overall: review.overall,
            comments_for_author: review.comments_for_author,
            status: review.status,
            submitted_at: review.submitted_at,
        }
    }
}

/// Scores and comments written by a reviewer.
#[derive(Debug, Clone)]
pub struct ReviewContent {
    /// Validated sub-scores.
    pub scores: Scores,
    /// Sanitized author comments.
    pub comments_for_author: Option<String>,
    /// Sanitized committee comments.
    pub comments_committee: Option<String>,
}

/// Values for upserting a reviewer link.
#[derive(Debug, Clone)]
pub struct NewAssignment {
    /// Target submission.
    pub submission_id: SubmissionId,
    /// Assigned reviewer.
    pub reviewer: ReviewerRef,
    /// Acting chair.
    pub assigned_by: UserId,
    /// Review deadline; `None` keeps any existing deadline.
    pub due_at: Option<DateTime<Utc>>,
}

/// Chair view of one reviewer link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct AssignmentView {
    /// Assigned reviewer.
    pub reviewer: ReviewerRef,
    /// Reviewer display name.
    pub reviewer_name: Option<String>,
    /// Reviewer email.
    pub reviewer_email: Option<String>,
    /// Assignment time.
    pub assigned_at: DateTime<Utc>,
    /// Deadline.
    pub due_at: Option<DateTime<Utc>>,
    /// State of the matching review row.
    pub review_status: Option<ReviewStatus>,
    /// Review submission time.
    pub submitted_at: Option<DateTime<Utc>>,
}

/// Reviewer's own queue entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ReviewerAssignment {
    /// Assigned submission.
    pub submission_id: SubmissionId,
    /// Submission title.
    pub title: String,
    /// Submission lifecycle state.
    pub status: SubmissionStatus,
    /// Assignment time.
    pub assigned_at: DateTime<Utc>,
    /// Deadline.
    pub due_at: Option<DateTime<Utc>>,
    /// State of the reviewer's review row.
    pub review_status: Option<ReviewStatus>,
}

/// Invited reviewer without an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ExternalReviewer {
    /// Identifier.
    pub id: ExternalReviewerId,
    /// Inviting event.
    pub event_id: EventId,
    /// Display name.
    pub name: String,
    /// Contact email.
    pub email: String,
    /// Invitation token. Never serialized back to reviewers other than on creation.
    #[serde(skip)]
    pub invite_token: String,
    /// Token expiry.
    pub expires_at: DateTime<Utc>,
}

impl ExternalReviewer {
    /// Whether the invitation is still usable at `now`.
    #[must_use]
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

/// Values for inserting an [`ExternalReviewer`].
#[derive(Debug, Clone)]
pub struct NewExternalReviewer {
    /// Inviting event.
    pub event_id: EventId,
    /// Sanitized name.
    pub name: String,
    /// Validated email.
    pub email: String,
    /// Random token.
    pub invite_token: String,
    /// Expiry.
    pub expires_at: DateTime<Utc>,
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn review_status_parse_rejects_unknown_values() {
        assert_eq!("submitted".parse::<ReviewStatus>(), Ok(ReviewStatus::Submitted));
        assert_eq!("assigned".parse::<ReviewStatus>(), Ok(ReviewStatus::Assigned));
        assert!("draft".parse::<ReviewStatus>().is_err());
        assert!("".parse::<ReviewStatus>().is_err());
    }

    #[test]
    fn overall_is_rounded_mean() {
        let Ok(scores) = Scores::new(4, 5, 3, 4) else {
            panic!("valid scores");
        };
        assert!((scores.overall() - 4.0).abs() < f64::EPSILON);

        let Ok(scores) = Scores::new(5, 4, 4, 4) else {
            panic!("valid scores");
        };
        assert!((scores.overall() - 4.25).abs() < f64::EPSILON);
    }

    #[test]
    fn rejects_out_of_range_scores() {
        let Err(err) = Scores::new(4, 6, 3, 4) else {
            panic!("6 must be rejected");
        };
        assert_eq!(err.field, "score_relevance");
        assert_eq!(err.value, 6);

        assert!(Scores::new(0, 1, 1, 1).is_err());
        assert!(Scores::new(1, 1, 1, i64::MAX).is_err());
    }

    #[test]
    fn author_projection_hides_committee_fields() {
        let review = Review {
            submission_id: SubmissionId::new(1),
            reviewer: ReviewerRef::User(UserId::new(9)),
            reviewer_name: Some("R. Viewer".to_string()),
            status: ReviewStatus::Submitted,
            scores: None,
            overall: Some(3.5),
            comments_for_author: Some("clear".to_string()),
            comments_committee: Some("borderline".to_string()),
            submitted_at: None,
        };
        let projected = AuthorReview::from(review);
        let json = serde_json::to_string(&projected).unwrap_or_default();
        assert!(json.contains("clear"));
        assert!(!json.contains("borderline"));
        assert!(!json.contains("R. Viewer"));
    }

    #[test]
    fn external_invite_expires() {
        let now = Utc::now();
        let reviewer = ExternalReviewer {
            id: ExternalReviewerId::new(1),
            event_id: EventId::new(1),
            name: "Ext".to_string(),
            email: "ext@example.org".to_string(),
            invite_token: "t".to_string(),
            expires_at: now,
        };
        assert!(!reviewer.is_live(now));
        assert!(reviewer.is_live(now - chrono::Duration::seconds(1)));
    }
}
