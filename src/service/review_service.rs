//! Review engine: score submission by assigned reviewers and invited
//! externals, plus the chair and author views of reviews.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use utoipa::ToSchema;

use crate::domain::text::{MAX_COMMENT_CHARS, clean_opt};
use crate::domain::{
    AuditAction, AuditEntry, AuditSink, AuthorReview, EntityType, EventId, EventRole,
    ExternalReviewer, OutcomeCounters, Review, ReviewContent, ReviewStatus, ReviewerRef, Scores,
    Submission, SubmissionId,
};
use crate::error::ReviewError;
use crate::persistence::ReviewStore;

use super::authz::EventAccess;
use super::submission_in_event;

/// Raw scores and comments as sent by a reviewer.
#[derive(Debug, Clone, Default)]
pub struct ReviewInput {
    /// Technical quality, 1..=5.
    pub technical: i64,
    /// Relevance, 1..=5.
    pub relevance: i64,
    /// Innovation, 1..=5.
    pub innovation: i64,
    /// Writing quality, 1..=5.
    pub writing: i64,
    /// Comments shown to the author.
    pub comments_for_author: Option<String>,
    /// Comments shown to the committee only.
    pub comments_committee: Option<String>,
}

impl ReviewInput {
    fn into_content(self) -> Result<ReviewContent, ReviewError> {
        let scores = Scores::new(self.technical, self.relevance, self.innovation, self.writing)?;
        Ok(ReviewContent {
            scores,
            comments_for_author: clean_opt(self.comments_for_author.as_deref(), MAX_COMMENT_CHARS),
            comments_committee: clean_opt(self.comments_committee.as_deref(), MAX_COMMENT_CHARS),
        })
    }
}

/// Result of a review submission.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, ToSchema)]
pub struct ReviewReceipt {
    /// Reviewed submission.
    pub submission_id: SubmissionId,
    /// Mean of the sub-scores, two decimals.
    pub overall: f64,
}

/// What an invited reviewer sees behind their token.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ExternalReviewContext {
    /// The invitation.
    pub reviewer: ExternalReviewer,
    /// The submission to review.
    pub submission: Submission,
    /// The reviewer's current review row, if any.
    pub review: Option<Review>,
}

/// Writes and reads reviews.
#[derive(Debug, Clone)]
pub struct ReviewService {
    store: Arc<dyn ReviewStore>,
    audit: Arc<dyn AuditSink>,
    counters: Arc<OutcomeCounters>,
}

impl ReviewService {
    /// Creates a new `ReviewService`.
    #[must_use]
    pub fn new(
        store: Arc<dyn ReviewStore>,
        audit: Arc<dyn AuditSink>,
        counters: Arc<OutcomeCounters>,
    ) -> Self {
        Self {
            store,
            audit,
            counters,
        }
    }

    /// Stores the caller's review of `submission` and marks it `submitted`.
    ///
    /// Resubmission overwrites the caller's previous review. The submission
    /// status is never touched here.
    ///
    /// # Errors
    ///
    /// - [`ReviewError::Validation`] for a sub-score outside 1..=5.
    /// - [`ReviewError::Forbidden`] if the caller is not assigned to the
    ///   submission in this event.
    pub async fn submit_review(
        &self,
        access: &EventAccess,
        submission: SubmissionId,
        input: ReviewInput,
    ) -> Result<ReviewReceipt, ReviewError> {
        let content = input.into_content()?;
        let reviewer = ReviewerRef::User(access.actor());
        let overall = self
            .write(access.event_id(), submission, reviewer, &content)
            .await?;
        self.audit.record(AuditEntry::new(
            Some(access.actor()),
            AuditAction::ReviewSubmitted,
            EntityType::Submission,
            submission,
            json!({ "overall": overall }),
        ));
        tracing::info!(%submission, user_id = %access.actor(), overall, "review submitted");
        Ok(ReviewReceipt {
            submission_id: submission,
            overall,
        })
    }

    /// Resolves a live invitation token to its reviewer and submission.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewError::NotFound`] for unknown or expired tokens.
    pub async fn external_review_context(
        &self,
        token: &str,
    ) -> Result<ExternalReviewContext, ReviewError> {
        let (reviewer, submission) = self.resolve_token(token).await?;
        let review = self
            .store
            .list_reviews(submission.id)
            .await?
            .into_iter()
            .find(|r| r.reviewer == ReviewerRef::External(reviewer.id));
        Ok(ExternalReviewContext {
            reviewer,
            submission,
            review,
        })
    }

    /// Stores an invited reviewer's review. Same rules as
    /// [`submit_review`](Self::submit_review), keyed by token.
    ///
    /// # Errors
    ///
    /// - [`ReviewError::Validation`] for a sub-score outside 1..=5.
    /// - [`ReviewError::NotFound`] for unknown or expired tokens.
    pub async fn submit_external_review(
        &self,
        token: &str,
        input: ReviewInput,
    ) -> Result<ReviewReceipt, ReviewError> {
        let content = input.into_content()?;
        let (reviewer, submission) = self.resolve_token(token).await?;
        let overall = self
            .write(
                submission.event_id,
                submission.id,
                ReviewerRef::External(reviewer.id),
                &content,
            )
            .await?;

        self.audit.record(AuditEntry::new(
            None,
            AuditAction::ExternalReviewSubmitted,
            EntityType::Submission,
            submission.id,
            json!({ "external_reviewer_id": reviewer.id, "overall": overall }),
        ));
        tracing::info!(
            submission_id = %submission.id,
            external_reviewer_id = %reviewer.id,
            overall,
            "external review submitted"
        );
        Ok(ReviewReceipt {
            submission_id: submission.id,
            overall,
        })
    }

    /// Every review of a submission, with reviewer identity and committee
    /// comments.
    ///
    /// # Errors
    ///
    /// - [`ReviewError::Forbidden`] without the chair role.
    /// - [`ReviewError::NotFound`] if the submission is not in the event.
    pub async fn reviews_for_chair(
        &self,
        access: &EventAccess,
        submission: SubmissionId,
    ) -> Result<Vec<Review>, ReviewError> {
        access.require_role(&[EventRole::Chair])?;
        submission_in_event(self.store.as_ref(), access, submission).await?;
        self.store.list_reviews(submission).await
    }

    /// Submitted reviews of the caller's own submission, without reviewer
    /// identity or committee comments.
    ///
    /// # Errors
    ///
    /// - [`ReviewError::NotFound`] if the submission is not in the event.
    /// - [`ReviewError::Forbidden`] if the caller is not its author.
    pub async fn reviews_for_author(
        &self,
        access: &EventAccess,
        submission: SubmissionId,
    ) -> Result<Vec<AuthorReview>, ReviewError> {
        let found = submission_in_event(self.store.as_ref(), access, submission).await?;
        if found.author_user_id != access.actor() {
            return Err(ReviewError::Forbidden(
                "only the author may read these reviews".into(),
            ));
        }
        Ok(self
            .store
            .list_reviews(submission)
            .await?
            .into_iter()
            .filter(|r| r.status == ReviewStatus::Submitted)
            .map(AuthorReview::from)
            .collect())
    }

    async fn resolve_token(
        &self,
        token: &str,
    ) -> Result<(ExternalReviewer, Submission), ReviewError> {
        let not_found = || ReviewError::NotFound("invitation".into());
        let reviewer = self
            .store
            .find_external_by_token(token.trim())
            .await?
            .filter(|r| r.is_live(Utc::now()))
            .ok_or_else(not_found)?;
        let submission_id = self
            .store
            .external_assignment(reviewer.id)
            .await?
            .ok_or_else(not_found)?;
        let submission = self
            .store
            .find_submission(submission_id)
            .await?
            .filter(|s| s.event_id == reviewer.event_id)
            .ok_or_else(not_found)?;
        Ok((reviewer, submission))
    }

    /// Checks the assignment and writes the review under the submission lock.
    async fn write(
        &self,
        event: EventId,
        submission: SubmissionId,
        reviewer: ReviewerRef,
        content: &ReviewContent,
    ) -> Result<f64, ReviewError> {
        let mut tx = self.store.begin().await?;
        let in_event = tx
            .lock_submission(submission)
            .await?
            .is_some_and(|s| s.event_id == event);
        if !in_event || !tx.is_assigned(submission, reviewer).await? {
            tracing::warn!(%submission, ?reviewer, "review by unassigned reviewer");
            return Err(ReviewError::Forbidden("not assigned".into()));
        }
        tx.upsert_review_content(submission, reviewer, content)
            .await?;
        tx.commit().await?;
        self.counters.review_submitted();
        Ok(content.scores.overall())
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::SubmissionStatus;
    use crate::service::assignment_service::{
        AssignRequest, AssignmentService, InviteRequest, UnassignRequest,
    };
    use crate::service::fixture::Fixture;

    fn service(fx: &Fixture) -> ReviewService {
        ReviewService::new(fx.review_store(), fx.sink(), Arc::clone(&fx.counters))
    }

    fn input(scores: [i64; 4]) -> ReviewInput {
        let [technical, relevance, innovation, writing] = scores;
        ReviewInput {
            technical,
            relevance,
            innovation,
            writing,
            comments_for_author: Some("<p>Clear and solid.</p>".into()),
            comments_committee: Some("Borderline novelty.".into()),
        }
    }

    async fn assigned(fx: &Fixture) -> SubmissionId {
        let submission = fx.submission().await;
        let chair = fx.access(fx.chair, &[EventRole::Chair]).await;
        let Ok(_) = AssignmentService::new(fx.review_store(), fx.role_store(), fx.sink(), 24)
            .assign(
                &chair,
                AssignRequest {
                    submission_id: submission.id,
                    reviewer_ids: vec![fx.reviewers[0]],
                    due_at: None,
                    force: false,
                },
            )
            .await
        else {
            panic!("assign should succeed");
        };
        submission.id
    }

    #[tokio::test]
    async fn assigned_reviewer_submits_scores() {
        let fx = Fixture::new().await;
        let submission = assigned(&fx).await;
        let access = fx.access(fx.reviewers[0], &[EventRole::Reviewer]).await;

        let Ok(receipt) = service(&fx)
            .submit_review(&access, submission, input([4, 5, 3, 4]))
            .await
        else {
            panic!("review should be accepted");
        };
        assert!((receipt.overall - 4.0).abs() < f64::EPSILON);
        assert_eq!(fx.counters.snapshot().reviews_submitted, 1);

        let Ok(reviews) = fx.store.list_reviews(submission).await else {
            panic!("reviews should list");
        };
        let Some(review) = reviews.first() else {
            panic!("review row should exist");
        };
        assert_eq!(review.status, ReviewStatus::Submitted);
        assert_eq!(review.comments_for_author.as_deref(), Some("Clear and solid."));
    }

    #[tokio::test]
    async fn out_of_range_score_names_the_field() {
        let fx = Fixture::new().await;
        let submission = assigned(&fx).await;
        let access = fx.access(fx.reviewers[0], &[EventRole::Reviewer]).await;
        let result = service(&fx)
            .submit_review(&access, submission, input([4, 6, 3, 4]))
            .await;
        assert!(matches!(
            result,
            Err(ReviewError::Validation {
                field: "score_relevance",
                ..
            })
        ));
    }

    #[tokio::test]
    async fn unassigned_reviewer_is_forbidden_and_nothing_changes() {
        let fx = Fixture::new().await;
        let submission = assigned(&fx).await;
        let access = fx.access(fx.reviewers[1], &[EventRole::Reviewer]).await;

        let result = service(&fx)
            .submit_review(&access, submission, input([3, 3, 3, 3]))
            .await;
        assert_eq!(result, Err(ReviewError::Forbidden("not assigned".into())));

        let Ok(reviews) = fx.store.list_reviews(submission).await else {
            panic!("reviews should list");
        };
        assert_eq!(reviews.len(), 1);
        assert!(
            reviews
                .iter()
                .all(|r| r.reviewer == ReviewerRef::User(fx.reviewers[0]))
        );
        let Ok(Some(after)) = fx.store.find_submission(submission).await else {
            panic!("submission should exist");
        };
        assert_eq!(after.status, SubmissionStatus::UnderReview);
    }

    #[tokio::test]
    async fn review_racing_an_unassign_leaves_no_orphan() {
        let fx = Fixture::new().await;
        let submission = assigned(&fx).await;
        let reviewer = ReviewerRef::User(fx.reviewers[0]);
        let chair = fx.access(fx.chair, &[EventRole::Chair]).await;

        // The chair unassigns after the reviewer passed the gate but before
        // the write lands.
        let Ok(_) = AssignmentService::new(fx.review_store(), fx.role_store(), fx.sink(), 24)
            .unassign(
                &chair,
                UnassignRequest {
                    submission_id: submission,
                    reviewer_ids: vec![fx.reviewers[0]],
                    force: false,
                },
            )
            .await
        else {
            panic!("unassign should succeed");
        };
        let Ok(content) = input([3, 3, 3, 3]).into_content() else {
            panic!("scores are in range");
        };
        let result = service(&fx)
            .write(fx.event, submission, reviewer, &content)
            .await;
        assert_eq!(result, Err(ReviewError::Forbidden("not assigned".into())));

        let Ok(reviews) = fx.store.list_reviews(submission).await else {
            panic!("reviews should list");
        };
        assert!(reviews.is_empty());
        assert_eq!(fx.store.count_submitted_reviews(submission).await, Ok(0));
        assert_eq!(fx.counters.snapshot().reviews_submitted, 0);
        let Ok(Some(after)) = fx.store.find_submission(submission).await else {
            panic!("submission should exist");
        };
        assert_eq!(after.status, SubmissionStatus::Submitted);
    }

    #[tokio::test]
    async fn review_for_submission_in_another_event_is_forbidden() {
        let fx = Fixture::new().await;
        let submission = assigned(&fx).await;
        let Ok(content) = input([3, 3, 3, 3]).into_content() else {
            panic!("scores are in range");
        };
        let other = EventId::new(fx.event.get() + 1000);
        let result = service(&fx)
            .write(other, submission, ReviewerRef::User(fx.reviewers[0]), &content)
            .await;
        assert_eq!(result, Err(ReviewError::Forbidden("not assigned".into())));
    }

    #[tokio::test]
    async fn resubmission_overwrites_previous_review() {
        let fx = Fixture::new().await;
        let submission = assigned(&fx).await;
        let access = fx.access(fx.reviewers[0], &[EventRole::Reviewer]).await;
        let svc = service(&fx);

        assert!(
            svc.submit_review(&access, submission, input([2, 2, 2, 2]))
                .await
                .is_ok()
        );
        let Ok(second) = svc
            .submit_review(&access, submission, input([5, 5, 5, 4]))
            .await
        else {
            panic!("resubmission should be accepted");
        };
        assert!((second.overall - 4.75).abs() < f64::EPSILON);
        let Ok(reviews) = fx.store.list_reviews(submission).await else {
            panic!("reviews should list");
        };
        assert_eq!(reviews.len(), 1);
        assert_eq!(reviews.first().and_then(|r| r.overall), Some(4.75));
    }

    #[tokio::test]
    async fn author_view_masks_committee_fields() {
        let fx = Fixture::new().await;
        let submission = assigned(&fx).await;
        let reviewer = fx.access(fx.reviewers[0], &[EventRole::Reviewer]).await;
        let svc = service(&fx);
        assert!(
            svc.submit_review(&reviewer, submission, input([4, 4, 4, 4]))
                .await
                .is_ok()
        );

        let author = fx.access(fx.author, &[]).await;
        let Ok(masked) = svc.reviews_for_author(&author, submission).await else {
            panic!("author should read reviews");
        };
        assert_eq!(masked.len(), 1);
        let Ok(body) = serde_json::to_value(&masked) else {
            panic!("author reviews should serialize");
        };
        let text = body.to_string();
        assert!(!text.contains("Borderline"));
        assert!(!text.contains("reviewer"));

        let chair = fx.access(fx.chair, &[EventRole::Chair]).await;
        assert!(matches!(
            svc.reviews_for_author(&chair, submission).await,
            Err(ReviewError::Forbidden(_))
        ));
        let Ok(full) = svc.reviews_for_chair(&chair, submission).await else {
            panic!("chair should read reviews");
        };
        assert_eq!(
            full.first().and_then(|r| r.comments_committee.as_deref()),
            Some("Borderline novelty.")
        );
    }

    #[tokio::test]
    async fn external_reviewer_submits_with_token() {
        let fx = Fixture::new().await;
        let submission = fx.submission().await;
        let chair = fx.access(fx.chair, &[EventRole::Chair]).await;
        let Ok(invitation) = AssignmentService::new(fx.review_store(), fx.role_store(), fx.sink(), 24)
            .invite_external_reviewer(
                &chair,
                InviteRequest {
                    submission_id: submission.id,
                    name: "Guest".into(),
                    email: "guest@lab.org".into(),
                    due_at: None,
                    force: false,
                },
            )
            .await
        else {
            panic!("invite should succeed");
        };
        let svc = service(&fx);

        let Ok(context) = svc.external_review_context(&invitation.token).await else {
            panic!("token should resolve");
        };
        assert_eq!(context.submission.id, submission.id);
        assert_eq!(
            context.review.map(|r| r.status),
            Some(ReviewStatus::Assigned)
        );

        let Ok(receipt) = svc
            .submit_external_review(&invitation.token, input([3, 4, 3, 4]))
            .await
        else {
            panic!("external review should be accepted");
        };
        assert!((receipt.overall - 3.5).abs() < f64::EPSILON);
        assert_eq!(fx.store.count_submitted_reviews(submission.id).await, Ok(1));
    }

    #[tokio::test]
    async fn unknown_token_is_not_found() {
        let fx = Fixture::new().await;
        let result = service(&fx)
            .submit_external_review("deadbeef", input([3, 3, 3, 3]))
            .await;
        assert_eq!(result, Err(ReviewError::NotFound("invitation".into())));
    }
}
