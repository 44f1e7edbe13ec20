//! Decision engine: the quorum-gated, single-shot accept/reject verdict.
//!
//! The one-decision-per-submission rule is settled by the store's conditional
//! insert ([`StoreTx::insert_decision`](crate::persistence::StoreTx::insert_decision)),
//! never by a prior read: of two concurrent deciders exactly one insert
//! lands, and the other gets a conflict carrying the winning decision.

use std::sync::Arc;

use serde::Serialize;
use serde_json::json;
use utoipa::ToSchema;

use crate::domain::text::{MAX_REASON_CHARS, clean_opt};
use crate::domain::{
    AuditAction, AuditEntry, AuditSink, Decision, DecisionOutcome, EntityType, EventRole,
    LifecycleTrigger, NewDecision, OutcomeCounters, QueueEntry, Review, ReviewStatus,
    Severity, StatusChange, Submission, SubmissionId, SubmissionStatus, next_status,
};
use crate::error::{ConflictKind, ReviewError};
use crate::persistence::ReviewStore;

use super::authz::EventAccess;
use super::submission_in_event;

/// Roles allowed to read the queue and decide.
pub const DECIDER_ROLES: [EventRole; 2] = [EventRole::Chair, EventRole::DecisionMaker];

/// Input for [`DecisionService::decide`].
#[derive(Debug, Clone)]
pub struct DecideRequest {
    /// Target submission.
    pub submission_id: SubmissionId,
    /// Verdict.
    pub decision: DecisionOutcome,
    /// Free-text reason.
    pub reason: Option<String>,
    /// Quorum; the configured default when `None`.
    pub min_reviews: Option<i64>,
    /// Skip the quorum check. Administrators only.
    pub force: bool,
}

/// Result of [`DecisionService::decide`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct DecisionResult {
    /// The stored decision.
    pub decision: Decision,
    /// Submission status after the decision.
    pub submission_status: SubmissionStatus,
}

/// Everything a chair needs to decide one submission.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct DecisionDetail {
    /// The submission.
    pub submission: Submission,
    /// Its submitted reviews.
    pub reviews: Vec<Review>,
    /// Number of submitted reviews.
    pub n_reviews: i64,
    /// Mean overall score, two decimals; `0` without reviews.
    pub avg_score: f64,
    /// Existing decision, if any.
    pub decision: Option<Decision>,
}

/// Lists the decision backlog and records decisions.
#[derive(Debug, Clone)]
pub struct DecisionService {
    store: Arc<dyn ReviewStore>,
    audit: Arc<dyn AuditSink>,
    counters: Arc<OutcomeCounters>,
    default_min_reviews: i64,
}

impl DecisionService {
    /// Creates a new `DecisionService`.
    #[must_use]
    pub fn new(
        store: Arc<dyn ReviewStore>,
        audit: Arc<dyn AuditSink>,
        counters: Arc<OutcomeCounters>,
        default_min_reviews: i64,
    ) -> Self {
        Self {
            store,
            audit,
            counters,
            default_min_reviews: default_min_reviews.max(1),
        }
    }

    fn quorum(&self, requested: Option<i64>) -> i64 {
        requested.unwrap_or(self.default_min_reviews).max(1)
    }

    /// Undecided submissions that reached the quorum, oldest first.
    ///
    /// # Errors
    ///
    /// - [`ReviewError::Forbidden`] without the chair or decision maker role.
    /// - [`ReviewError::Persistence`] if the store fails.
    pub async fn list_queue(
        &self,
        access: &EventAccess,
        min_reviews: Option<i64>,
    ) -> Result<Vec<QueueEntry>, ReviewError> {
        access.require_role(&DECIDER_ROLES)?;
        self.store
            .decision_queue(access.event_id(), self.quorum(min_reviews))
            .await
    }

    /// Records the decision for a submission and moves it to
    /// `final_required` (accept) or `decision_made` (reject).
    ///
    /// # Errors
    ///
    /// - [`ReviewError::Forbidden`] without the chair or decision maker
    ///   role, or when `force` is requested by a non-administrator.
    /// - [`ReviewError::NotFound`] if the submission is not in the event.
    /// - [`ReviewError::Conflict`] with `have`/`want` below quorum, with the
    ///   existing decision when one is already stored, or for a status that
    ///   cannot be decided.
    pub async fn decide(
        &self,
        access: &EventAccess,
        request: DecideRequest,
    ) -> Result<DecisionResult, ReviewError> {
        access.require_role(&DECIDER_ROLES)?;
        if request.force && !access.is_admin() {
            tracing::warn!(user_id = %access.actor(), "forced decision by non-admin");
            return Err(ReviewError::Forbidden(
                "force requires an administrator".into(),
            ));
        }
        let submission =
            submission_in_event(self.store.as_ref(), access, request.submission_id).await?;

        if !request.force {
            let want = self.quorum(request.min_reviews);
            let have = self.store.count_submitted_reviews(submission.id).await?;
            if have < want {
                return Err(ReviewError::Conflict(ConflictKind::InsufficientReviews {
                    have,
                    want,
                }));
            }
        }

        let decision = NewDecision {
            submission_id: submission.id,
            decision: request.decision,
            reason: clean_opt(request.reason.as_deref(), MAX_REASON_CHARS),
            decider_user_id: access.actor(),
        };
        let result = match self.persist(&decision).await {
            Ok(result) => result,
            Err(err) => {
                if err.is_server_error() {
                    self.audit.record(
                        AuditEntry::new(
                            Some(access.actor()),
                            AuditAction::DecisionFailed,
                            EntityType::Submission,
                            submission.id,
                            json!({ "error": err.to_string() }),
                        )
                        .with_severity(Severity::Error),
                    );
                }
                return Err(err);
            }
        };

        self.counters.decision(request.decision);
        self.audit.record(AuditEntry::new(
            Some(access.actor()),
            AuditAction::DecisionMade,
            EntityType::Submission,
            submission.id,
            json!({
                "decision": result.decision.decision,
                "status": result.submission_status,
                "force": request.force,
            }),
        ));
        tracing::info!(
            submission_id = %submission.id,
            decision = %result.decision.decision,
            status = %result.submission_status,
            "decision recorded"
        );
        Ok(result)
    }

    async fn persist(&self, decision: &NewDecision) -> Result<DecisionResult, ReviewError> {
        let id = decision.submission_id;
        let mut tx = self.store.begin().await?;
        let Some(stored) = tx.insert_decision(decision).await? else {
            drop(tx);
            let existing = self
                .store
                .find_decision(id)
                .await?
                .ok_or_else(|| ReviewError::Internal(format!("decision for {id} vanished")))?;
            tracing::warn!(submission_id = %id, existing = %existing.decision, "already decided");
            return Err(ReviewError::Conflict(ConflictKind::AlreadyDecided(existing)));
        };

        let current = tx
            .lock_submission(id)
            .await?
            .ok_or_else(|| ReviewError::NotFound(format!("submission {id}")))?
            .status;
        let change = next_status(current, LifecycleTrigger::Decided(decision.decision))?;
        if let StatusChange::To(next) = change {
            tx.set_status(id, next).await?;
        }
        tx.commit().await?;
        Ok(DecisionResult {
            decision: stored,
            submission_status: change.resolve(current),
        })
    }

    /// Submission, submitted reviews, aggregates and decision in one view.
    ///
    /// # Errors
    ///
    /// - [`ReviewError::Forbidden`] without the chair or decision maker role.
    /// - [`ReviewError::NotFound`] if the submission is not in the event.
    pub async fn decision_detail(
        &self,
        access: &EventAccess,
        submission: SubmissionId,
    ) -> Result<DecisionDetail, ReviewError> {
        access.require_role(&DECIDER_ROLES)?;
        let found = submission_in_event(self.store.as_ref(), access, submission).await?;
        let reviews: Vec<Review> = self
            .store
            .list_reviews(submission)
            .await?
            .into_iter()
            .filter(|r| r.status == ReviewStatus::Submitted)
            .collect();
        let scores: Vec<f64> = reviews.iter().filter_map(|r| r.overall).collect();
        let avg_score = if scores.is_empty() {
            0.0
        } else {
            let mean = scores.iter().sum::<f64>() / scores.len() as f64;
            (mean * 100.0).round() / 100.0
        };
        let decision = self.store.find_decision(submission).await?;
        Ok(DecisionDetail {
            submission: found,
            n_reviews: i64::try_from(reviews.len()).unwrap_or(i64::MAX),
            reviews,
            avg_score,
            decision,
        })
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::{ReviewContent, ReviewerRef, Scores, UserId};
    use crate::service::assignment_service::{AssignRequest, AssignmentService};
    use crate::service::authz::{Actor, EventScope};
    use crate::service::fixture::Fixture;

    fn service(fx: &Fixture) -> DecisionService {
        DecisionService::new(fx.review_store(), fx.sink(), Arc::clone(&fx.counters), 1)
    }

    fn decide(submission: SubmissionId, decision: DecisionOutcome) -> DecideRequest {
        DecideRequest {
            submission_id: submission,
            decision,
            reason: None,
            min_reviews: Some(1),
            force: false,
        }
    }

    async fn reviewed(fx: &Fixture, reviews: &[(UserId, [i64; 4])]) -> SubmissionId {
        let submission = fx.submission().await;
        let chair = fx.access(fx.chair, &[EventRole::Chair]).await;
        let Ok(_) = AssignmentService::new(fx.review_store(), fx.role_store(), fx.sink(), 24)
            .assign(
                &chair,
                AssignRequest {
                    submission_id: submission.id,
                    reviewer_ids: fx.reviewers.to_vec(),
                    due_at: None,
                    force: false,
                },
            )
            .await
        else {
            panic!("assign should succeed");
        };
        add_reviews(fx, submission.id, reviews).await;
        submission.id
    }

    async fn add_reviews(
        fx: &Fixture,
        submission: SubmissionId,
        reviews: &[(UserId, [i64; 4])],
    ) {
        for (reviewer, [a, b, c, d]) in reviews {
            let Ok(scores) = Scores::new(*a, *b, *c, *d) else {
                panic!("scores should be valid");
            };
            let Ok(mut tx) = fx.store.begin().await else {
                panic!("tx should open");
            };
            let content = ReviewContent {
                scores,
                comments_for_author: None,
                comments_committee: None,
            };
            let Ok(()) = tx
                .upsert_review_content(submission, ReviewerRef::User(*reviewer), &content)
                .await
            else {
                panic!("review should be written");
            };
            let Ok(()) = tx.commit().await else {
                panic!("commit should succeed");
            };
        }
    }

    #[tokio::test]
    async fn accept_moves_to_final_required_and_second_decision_conflicts() {
        let fx = Fixture::new().await;
        let submission = reviewed(&fx, &[(fx.reviewers[0], [4, 5, 3, 4])]).await;
        let chair = fx.access(fx.chair, &[EventRole::Chair]).await;
        let svc = service(&fx);

        let Ok(result) = svc
            .decide(&chair, decide(submission, DecisionOutcome::Accept))
            .await
        else {
            panic!("decision should be recorded");
        };
        assert_eq!(result.submission_status, SubmissionStatus::FinalRequired);
        assert_eq!(result.decision.decision, DecisionOutcome::Accept);
        assert_eq!(fx.counters.snapshot().decisions_accept, 1);

        let second = svc
            .decide(&chair, decide(submission, DecisionOutcome::Reject))
            .await;
        let Err(ReviewError::Conflict(ConflictKind::AlreadyDecided(existing))) = second else {
            panic!("second decision should conflict");
        };
        assert_eq!(existing.decision, DecisionOutcome::Accept);
        let Ok(Some(after)) = fx.store.find_submission(submission).await else {
            panic!("submission should exist");
        };
        assert_eq!(after.status, SubmissionStatus::FinalRequired);
    }

    #[tokio::test]
    async fn reject_moves_to_decision_made() {
        let fx = Fixture::new().await;
        let submission = reviewed(&fx, &[(fx.reviewers[0], [1, 2, 1, 2])]).await;
        let chair = fx.access(fx.chair, &[EventRole::Chair]).await;
        let Ok(result) = service(&fx)
            .decide(&chair, decide(submission, DecisionOutcome::Reject))
            .await
        else {
            panic!("decision should be recorded");
        };
        assert_eq!(result.submission_status, SubmissionStatus::DecisionMade);
        assert_eq!(fx.counters.snapshot().decisions_reject, 1);
    }

    #[tokio::test]
    async fn concurrent_decisions_have_one_winner() {
        let fx = Fixture::new().await;
        let submission = reviewed(&fx, &[(fx.reviewers[0], [4, 4, 4, 4])]).await;
        let chair = fx.access(fx.chair, &[EventRole::Chair]).await;
        let admin = fx.access(fx.admin, &[EventRole::Chair]).await;
        let svc = service(&fx);

        let (a, b) = tokio::join!(
            svc.decide(&chair, decide(submission, DecisionOutcome::Accept)),
            svc.decide(&admin, decide(submission, DecisionOutcome::Reject)),
        );
        let (winner, loser) = match (a, b) {
            (Ok(w), Err(l)) | (Err(l), Ok(w)) => (w, l),
            other => panic!("exactly one decision should win: {other:?}"),
        };
        let ReviewError::Conflict(ConflictKind::AlreadyDecided(existing)) = loser else {
            panic!("loser should see the winning decision");
        };
        assert_eq!(existing, winner.decision);
        let Ok(Some(stored)) = fx.store.find_decision(submission).await else {
            panic!("decision should be stored");
        };
        assert_eq!(stored, winner.decision);
    }

    #[tokio::test]
    async fn quorum_shortfall_reports_counts() {
        let fx = Fixture::new().await;
        let submission = reviewed(&fx, &[(fx.reviewers[0], [3, 3, 3, 3])]).await;
        let chair = fx.access(fx.chair, &[EventRole::Chair]).await;
        let mut request = decide(submission, DecisionOutcome::Accept);
        request.min_reviews = Some(3);

        let result = service(&fx).decide(&chair, request).await;
        assert_eq!(
            result,
            Err(ReviewError::Conflict(ConflictKind::InsufficientReviews {
                have: 1,
                want: 3
            }))
        );
        let Ok(Some(after)) = fx.store.find_submission(submission).await else {
            panic!("submission should exist");
        };
        assert_eq!(after.status, SubmissionStatus::UnderReview);
    }

    #[tokio::test]
    async fn force_is_reserved_for_admins() {
        let fx = Fixture::new().await;
        let submission = fx.submission().await;
        let svc = service(&fx);
        let mut request = decide(submission.id, DecisionOutcome::Reject);
        request.force = true;

        let chair = fx.access(fx.chair, &[EventRole::Chair]).await;
        assert!(matches!(
            svc.decide(&chair, request.clone()).await,
            Err(ReviewError::Forbidden(_))
        ));

        let admin = fx.access(fx.admin, &[EventRole::Chair]).await;
        let Ok(result) = svc.decide(&admin, request).await else {
            panic!("admin force should bypass quorum");
        };
        assert_eq!(result.submission_status, SubmissionStatus::DecisionMade);
    }

    #[tokio::test]
    async fn queue_holds_undecided_submissions_at_quorum() {
        let fx = Fixture::new().await;
        let ready = reviewed(&fx, &[(fx.reviewers[0], [4, 4, 5, 5])]).await;
        let _waiting = fx.submission().await;
        let chair = fx.access(fx.chair, &[EventRole::Chair]).await;
        let svc = service(&fx);

        let Ok(queue) = svc.list_queue(&chair, Some(0)).await else {
            panic!("queue should list");
        };
        assert_eq!(queue.len(), 1);
        let Some(entry) = queue.first() else {
            panic!("queue should have an entry");
        };
        assert_eq!(entry.submission_id, ready);
        assert_eq!(entry.n_reviews, 1);
        assert!((entry.avg_score - 4.5).abs() < f64::EPSILON);

        assert!(
            svc.decide(&chair, decide(ready, DecisionOutcome::Accept))
                .await
                .is_ok()
        );
        let Ok(after) = svc.list_queue(&chair, None).await else {
            panic!("queue should list");
        };
        assert!(after.is_empty());
    }

    #[tokio::test]
    async fn queue_is_oldest_first_and_skips_submissions_below_quorum() {
        let fx = Fixture::new().await;
        let both = [(fx.reviewers[0], [4, 4, 4, 4]), (fx.reviewers[1], [3, 3, 3, 3])];
        let oldest = reviewed(&fx, &[]).await;
        let newer = reviewed(&fx, &both).await;
        let short = reviewed(&fx, &[(fx.reviewers[0], [5, 5, 5, 5])]).await;
        // Reviews of the oldest land last; order follows submission age.
        add_reviews(&fx, oldest, &both).await;

        let chair = fx.access(fx.chair, &[EventRole::Chair]).await;
        let Ok(queue) = service(&fx).list_queue(&chair, Some(2)).await else {
            panic!("queue should list");
        };
        let ids: Vec<SubmissionId> = queue.iter().map(|q| q.submission_id).collect();
        assert_eq!(ids, vec![oldest, newer]);
        assert!(!ids.contains(&short));
        assert!(queue.iter().all(|q| q.n_reviews == 2));
        assert!(
            queue
                .windows(2)
                .all(|w| matches!(w, [a, b] if a.created_at <= b.created_at))
        );
    }

    #[tokio::test]
    async fn decision_maker_reads_queue_and_decides() {
        let fx = Fixture::new().await;
        let submission = reviewed(&fx, &[(fx.reviewers[0], [4, 4, 4, 4])]).await;
        let decider = fx.access(fx.decider, &DECIDER_ROLES).await;
        let svc = service(&fx);

        let Ok(queue) = svc.list_queue(&decider, None).await else {
            panic!("decision maker should read the queue");
        };
        assert_eq!(queue.len(), 1);
        let Ok(detail) = svc.decision_detail(&decider, submission).await else {
            panic!("decision maker should read the detail");
        };
        assert_eq!(detail.n_reviews, 1);
        let Ok(result) = svc
            .decide(&decider, decide(submission, DecisionOutcome::Accept))
            .await
        else {
            panic!("decision maker should decide");
        };
        assert_eq!(result.decision.decider_user_id, fx.decider);
        assert_eq!(result.submission_status, SubmissionStatus::FinalRequired);
    }

    #[tokio::test]
    async fn decision_maker_stays_out_of_chair_work() {
        let fx = Fixture::new().await;
        let submission = fx.submission().await;
        let chair_gate = fx
            .gate
            .require_event_role(
                Actor::new(fx.decider),
                EventScope::Event(fx.event),
                &[EventRole::Chair],
            )
            .await;
        assert!(matches!(chair_gate, Err(ReviewError::Forbidden(_))));

        let decider = fx.access(fx.decider, &DECIDER_ROLES).await;
        let assign = AssignmentService::new(fx.review_store(), fx.role_store(), fx.sink(), 24)
            .assign(
                &decider,
                AssignRequest {
                    submission_id: submission.id,
                    reviewer_ids: vec![fx.reviewers[0]],
                    due_at: None,
                    force: false,
                },
            )
            .await;
        assert!(matches!(assign, Err(ReviewError::Forbidden(_))));
    }

    #[tokio::test]
    async fn users_without_decider_role_are_refused() {
        let fx = Fixture::new().await;
        for user in [fx.reviewers[0], fx.author, fx.outsider] {
            let result = fx
                .gate
                .require_event_role(
                    Actor::new(user),
                    EventScope::Event(fx.event),
                    &DECIDER_ROLES,
                )
                .await;
            assert!(
                matches!(result, Err(ReviewError::Forbidden(_))),
                "{user} should be refused"
            );
        }
        let reviewer = fx.access(fx.reviewers[0], &[EventRole::Reviewer]).await;
        assert!(matches!(
            service(&fx).list_queue(&reviewer, None).await,
            Err(ReviewError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn detail_aggregates_submitted_reviews() {
        let fx = Fixture::new().await;
        let submission = reviewed(
            &fx,
            &[(fx.reviewers[0], [4, 4, 4, 4]), (fx.reviewers[1], [3, 3, 3, 2])],
        )
        .await;
        let chair = fx.access(fx.chair, &[EventRole::Chair]).await;
        let Ok(detail) = service(&fx).decision_detail(&chair, submission).await else {
            panic!("detail should load");
        };
        assert_eq!(detail.n_reviews, 2);
        assert!((detail.avg_score - 3.38).abs() < 1e-9);
        assert_eq!(detail.decision, None);
    }
}
