//! Assignment engine: links reviewers to submissions and keeps the
//! `submitted` / `under_review` edge of the lifecycle in step.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde_json::json;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::domain::text::{clean_text, normalize_email};
use crate::domain::{
    AuditAction, AuditEntry, AuditSink, EntityType, EventRole, ExternalReviewer,
    LifecycleTrigger, NewAssignment, NewExternalReviewer, ReviewerRef, StatusChange,
    Submission, SubmissionId, SubmissionStatus, UserId, next_status,
};
use crate::error::{ConflictKind, ReviewError};
use crate::persistence::{ReviewStore, RoleStore, StoreTx};

use super::authz::EventAccess;
use super::submission_in_event;

const MAX_EXTERNAL_NAME_CHARS: usize = 120;

/// Input for [`AssignmentService::assign`].
#[derive(Debug, Clone)]
pub struct AssignRequest {
    /// Target submission.
    pub submission_id: SubmissionId,
    /// Candidate reviewers; duplicates are ignored.
    pub reviewer_ids: Vec<UserId>,
    /// Deadline; `None` keeps existing deadlines.
    pub due_at: Option<DateTime<Utc>>,
    /// Allow assignment after a decision.
    pub force: bool,
}

/// Candidates that were not assigned, by reason.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct RejectedReviewers {
    /// No `reviewer` role in the event.
    pub not_reviewer: Vec<UserId>,
    /// The submission's own author.
    pub author: Vec<UserId>,
}

/// Result of [`AssignmentService::assign`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct AssignOutcome {
    /// Reviewers now assigned.
    pub accepted: Vec<UserId>,
    /// Reviewers left out.
    pub rejected: RejectedReviewers,
    /// Submission status after the call.
    pub status: SubmissionStatus,
}

/// Input for [`AssignmentService::unassign`].
#[derive(Debug, Clone)]
pub struct UnassignRequest {
    /// Target submission.
    pub submission_id: SubmissionId,
    /// Reviewers to remove.
    pub reviewer_ids: Vec<UserId>,
    /// Also delete submitted reviews.
    pub force: bool,
}

/// Result of [`AssignmentService::unassign`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct UnassignOutcome {
    /// Reviewers removed.
    pub unassigned: Vec<UserId>,
    /// Submission status after the call.
    pub status: SubmissionStatus,
}

/// Input for [`AssignmentService::invite_external_reviewer`].
#[derive(Debug, Clone)]
pub struct InviteRequest {
    /// Target submission.
    pub submission_id: SubmissionId,
    /// Reviewer name.
    pub name: String,
    /// Reviewer email.
    pub email: String,
    /// Deadline.
    pub due_at: Option<DateTime<Utc>>,
    /// Allow invitation after a decision.
    pub force: bool,
}

/// A created invitation. The token is only ever returned here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct Invitation {
    /// The invited reviewer.
    pub reviewer: ExternalReviewer,
    /// Secret for the external review routes.
    pub token: String,
    /// Submission status after the call.
    pub status: SubmissionStatus,
}

/// Creates and removes reviewer assignments.
#[derive(Debug, Clone)]
pub struct AssignmentService {
    store: Arc<dyn ReviewStore>,
    roles: Arc<dyn RoleStore>,
    audit: Arc<dyn AuditSink>,
    invite_ttl: Duration,
}

impl AssignmentService {
    /// Creates a new `AssignmentService`. Invitations expire after
    /// `invite_ttl_hours`.
    #[must_use]
    pub fn new(
        store: Arc<dyn ReviewStore>,
        roles: Arc<dyn RoleStore>,
        audit: Arc<dyn AuditSink>,
        invite_ttl_hours: i64,
    ) -> Self {
        Self {
            store,
            roles,
            audit,
            invite_ttl: Duration::hours(invite_ttl_hours.max(1)),
        }
    }

    /// Assigns eligible reviewers and creates their `assigned` review rows.
    ///
    /// The author is never assigned. Candidates without the `reviewer` role
    /// at call time are reported back instead. Re-assigning an existing
    /// reviewer is a no-op apart from a newly supplied deadline.
    ///
    /// # Errors
    ///
    /// - [`ReviewError::Forbidden`] without the chair role.
    /// - [`ReviewError::Validation`] for an empty reviewer list.
    /// - [`ReviewError::NotFound`] if the submission is not in the event.
    /// - [`ReviewError::Conflict`] if a decision exists and `force` is off.
    pub async fn assign(
        &self,
        access: &EventAccess,
        request: AssignRequest,
    ) -> Result<AssignOutcome, ReviewError> {
        access.require_role(&[EventRole::Chair])?;
        let candidates = dedup(&request.reviewer_ids);
        if candidates.is_empty() {
            return Err(ReviewError::validation(
                "reviewer_ids",
                "at least one reviewer is required",
            ));
        }

        let submission =
            submission_in_event(self.store.as_ref(), access, request.submission_id).await?;
        let (author, others): (Vec<UserId>, Vec<UserId>) = candidates
            .into_iter()
            .partition(|id| *id == submission.author_user_id);
        let eligible = self
            .roles
            .reviewers_among(access.event_id(), &others)
            .await?;
        let (accepted, not_reviewer): (Vec<UserId>, Vec<UserId>) =
            others.into_iter().partition(|id| eligible.contains(id));

        let mut tx = self.store.begin().await?;
        let current = locked(&mut *tx, &submission).await?;
        if !request.force {
            reject_if_decided(&mut *tx, submission.id).await?;
        }
        for reviewer in &accepted {
            let reviewer = ReviewerRef::User(*reviewer);
            tx.upsert_assignment(&NewAssignment {
                submission_id: submission.id,
                reviewer,
                assigned_by: access.actor(),
                due_at: request.due_at,
            })
            .await?;
            tx.ensure_review_placeholder(submission.id, reviewer).await?;
        }
        let assignments = tx.count_assignments(submission.id).await?;
        let status = apply(
            &mut *tx,
            submission.id,
            current,
            LifecycleTrigger::ReviewersAssigned { assignments },
        )
        .await?;
        tx.commit().await?;

        let rejected = RejectedReviewers {
            not_reviewer,
            author,
        };
        self.audit.record(AuditEntry::new(
            Some(access.actor()),
            AuditAction::ReviewersAssigned,
            EntityType::Submission,
            submission.id,
            json!({
                "accepted": accepted,
                "rejected": rejected,
                "due_at": request.due_at,
                "force": request.force,
            }),
        ));
        tracing::info!(
            submission_id = %submission.id,
            accepted = accepted.len(),
            rejected = rejected.not_reviewer.len() + rejected.author.len(),
            %status,
            "reviewers assigned"
        );
        Ok(AssignOutcome {
            accepted,
            rejected,
            status,
        })
    }

    /// Removes reviewers from a submission.
    ///
    /// Reviews already submitted are protected unless `force` is set; with
    /// `force` they are deleted too. When nothing is left the submission goes
    /// back to `submitted`.
    ///
    /// # Errors
    ///
    /// - [`ReviewError::Forbidden`] without the chair role.
    /// - [`ReviewError::NotFound`] if the submission is not in the event.
    /// - [`ReviewError::Conflict`] listing reviewers whose reviews are
    ///   submitted, when `force` is off. Nothing is changed in that case.
    pub async fn unassign(
        &self,
        access: &EventAccess,
        request: UnassignRequest,
    ) -> Result<UnassignOutcome, ReviewError> {
        access.require_role(&[EventRole::Chair])?;
        let reviewers = dedup(&request.reviewer_ids);
        if reviewers.is_empty() {
            return Err(ReviewError::validation(
                "reviewer_ids",
                "at least one reviewer is required",
            ));
        }
        let submission =
            submission_in_event(self.store.as_ref(), access, request.submission_id).await?;

        let mut tx = self.store.begin().await?;
        let current = locked(&mut *tx, &submission).await?;
        let submitted = tx.submitted_reviewers(submission.id, &reviewers).await?;
        if !submitted.is_empty() && !request.force {
            tracing::warn!(
                submission_id = %submission.id,
                reviewers = ?submitted,
                "unassign blocked by submitted reviews"
            );
            return Err(ReviewError::Conflict(
                ConflictKind::ReviewsAlreadySubmitted(submitted),
            ));
        }
        tx.delete_assignments(submission.id, &reviewers).await?;
        tx.delete_reviews(submission.id, &reviewers, request.force)
            .await?;
        let assignments = tx.count_assignments(submission.id).await?;
        let submitted_reviews = tx.count_submitted_reviews(submission.id).await?;
        let status = apply(
            &mut *tx,
            submission.id,
            current,
            LifecycleTrigger::ReviewersRemoved {
                assignments,
                submitted_reviews,
            },
        )
        .await?;
        tx.commit().await?;

        let deleted_submitted = if request.force { submitted } else { Vec::new() };
        self.audit.record(AuditEntry::new(
            Some(access.actor()),
            AuditAction::ReviewersUnassigned,
            EntityType::Submission,
            submission.id,
            json!({
                "reviewer_ids": reviewers,
                "force": request.force,
                "deleted_submitted": deleted_submitted,
            }),
        ));
        tracing::info!(
            submission_id = %submission.id,
            removed = reviewers.len(),
            %status,
            "reviewers unassigned"
        );
        Ok(UnassignOutcome {
            unassigned: reviewers,
            status,
        })
    }

    /// Invites a reviewer without an account and assigns them.
    ///
    /// # Errors
    ///
    /// - [`ReviewError::Forbidden`] without the chair role.
    /// - [`ReviewError::Validation`] for an empty name or malformed email.
    /// - [`ReviewError::NotFound`] if the submission is not in the event.
    /// - [`ReviewError::Conflict`] if a decision exists and `force` is off.
    pub async fn invite_external_reviewer(
        &self,
        access: &EventAccess,
        request: InviteRequest,
    ) -> Result<Invitation, ReviewError> {
        access.require_role(&[EventRole::Chair])?;
        let name = clean_text(&request.name, MAX_EXTERNAL_NAME_CHARS)
            .ok_or_else(|| ReviewError::validation("name", "name is required"))?;
        let email = normalize_email(&request.email)
            .ok_or_else(|| ReviewError::validation("email", "not a valid email address"))?;
        let submission =
            submission_in_event(self.store.as_ref(), access, request.submission_id).await?;

        let mut tx = self.store.begin().await?;
        let current = locked(&mut *tx, &submission).await?;
        if !request.force {
            reject_if_decided(&mut *tx, submission.id).await?;
        }
        let reviewer = tx
            .create_external_reviewer(&NewExternalReviewer {
                event_id: access.event_id(),
                name,
                email,
                invite_token: invite_token(),
                expires_at: Utc::now() + self.invite_ttl,
            })
            .await?;
        let link = ReviewerRef::External(reviewer.id);
        tx.upsert_assignment(&NewAssignment {
            submission_id: submission.id,
            reviewer: link,
            assigned_by: access.actor(),
            due_at: request.due_at,
        })
        .await?;
        tx.ensure_review_placeholder(submission.id, link).await?;
        let assignments = tx.count_assignments(submission.id).await?;
        let status = apply(
            &mut *tx,
            submission.id,
            current,
            LifecycleTrigger::ReviewersAssigned { assignments },
        )
        .await?;
        tx.commit().await?;

        self.audit.record(AuditEntry::new(
            Some(access.actor()),
            AuditAction::ExternalReviewerInvited,
            EntityType::Submission,
            submission.id,
            json!({
                "external_reviewer_id": reviewer.id,
                "email": reviewer.email,
                "expires_at": reviewer.expires_at,
            }),
        ));
        tracing::info!(
            submission_id = %submission.id,
            external_reviewer_id = %reviewer.id,
            "external reviewer invited"
        );
        Ok(Invitation {
            token: reviewer.invite_token.clone(),
            reviewer,
            status,
        })
    }
}

fn dedup(ids: &[UserId]) -> Vec<UserId> {
    let mut seen = HashSet::with_capacity(ids.len());
    ids.iter().copied().filter(|id| seen.insert(*id)).collect()
}

fn invite_token() -> String {
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}

async fn locked(
    tx: &mut dyn StoreTx,
    submission: &Submission,
) -> Result<SubmissionStatus, ReviewError> {
    tx.lock_submission(submission.id)
        .await?
        .map(|s| s.status)
        .ok_or_else(|| ReviewError::NotFound(format!("submission {}", submission.id)))
}

async fn reject_if_decided(tx: &mut dyn StoreTx, id: SubmissionId) -> Result<(), ReviewError> {
    match tx.find_decision(id).await? {
        Some(existing) => Err(ReviewError::Conflict(ConflictKind::AlreadyDecided(existing))),
        None => Ok(()),
    }
}

async fn apply(
    tx: &mut dyn StoreTx,
    id: SubmissionId,
    current: SubmissionStatus,
    trigger: LifecycleTrigger,
) -> Result<SubmissionStatus, ReviewError> {
    let change = next_status(current, trigger)?;
    if let StatusChange::To(next) = change {
        tx.set_status(id, next).await?;
    }
    Ok(change.resolve(current))
}
