//! Final-submission gate: accepts the camera-ready file of an accepted
//! paper and closes its lifecycle.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use utoipa::ToSchema;

use crate::domain::{
    AuditAction, AuditEntry, AuditSink, EntityType, LifecycleTrigger, OutcomeCounters, Severity,
    StatusChange, Submission, SubmissionId, SubmissionStatus, next_status,
};
use crate::error::ReviewError;
use crate::persistence::{MembershipValidation, ReviewStore};

use super::authz::EventAccess;
use super::membership::{MembershipCheck, MembershipVerdict};
use super::submission_in_event;

/// Result of an accepted final upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct FinalReceipt {
    /// The submission.
    pub submission_id: SubmissionId,
    /// Always `final_submitted`.
    pub status: SubmissionStatus,
    /// Upload time.
    pub final_submitted_at: Option<DateTime<Utc>>,
}

/// Checks ownership, lifecycle and membership before storing a camera-ready
/// reference.
#[derive(Debug, Clone)]
pub struct FinalSubmissionGate {
    store: Arc<dyn ReviewStore>,
    membership: Arc<dyn MembershipCheck>,
    audit: Arc<dyn AuditSink>,
    counters: Arc<OutcomeCounters>,
    enforce_membership: bool,
}

impl FinalSubmissionGate {
    /// Creates a new `FinalSubmissionGate`. With `enforce_membership` off the
    /// membership collaborator is never consulted.
    #[must_use]
    pub fn new(
        store: Arc<dyn ReviewStore>,
        membership: Arc<dyn MembershipCheck>,
        audit: Arc<dyn AuditSink>,
        counters: Arc<OutcomeCounters>,
        enforce_membership: bool,
    ) -> Self {
        Self {
            store,
            membership,
            audit,
            counters,
            enforce_membership,
        }
    }

    /// Pre-flight checks an upload handler runs before storing any bytes:
    /// the submission exists in the event, the caller owns it (or is an
    /// administrator), and it is waiting for its final version.
    ///
    /// # Errors
    ///
    /// - [`ReviewError::NotFound`] if the submission is not in the event.
    /// - [`ReviewError::Forbidden`] for anyone but the author or an admin.
    /// - [`ReviewError::Conflict`] outside `final_required`.
    pub async fn check_upload(
        &self,
        access: &EventAccess,
        submission: SubmissionId,
    ) -> Result<Submission, ReviewError> {
        let found = submission_in_event(self.store.as_ref(), access, submission).await?;
        if found.author_user_id != access.actor() && !access.is_admin() {
            return Err(ReviewError::Forbidden(
                "only the author may upload the final version".into(),
            ));
        }
        next_status(found.status, LifecycleTrigger::FinalUploaded)?;
        Ok(found)
    }

    /// Stores `file_ref` as the camera-ready version and moves the
    /// submission to `final_submitted`.
    ///
    /// # Errors
    ///
    /// - Everything [`check_upload`](Self::check_upload) returns.
    /// - [`ReviewError::Forbidden`] with the verdict reason when the
    ///   membership check fails.
    pub async fn final_upload(
        &self,
        access: &EventAccess,
        submission: SubmissionId,
        file_ref: &str,
    ) -> Result<FinalReceipt, ReviewError> {
        let found = self.check_upload(access, submission).await?;
        let file_ref = file_ref.trim();
        if file_ref.is_empty() {
            return Err(ReviewError::validation("file", "a PDF file is required"));
        }

        let email = match &found.membership_email {
            Some(email) => Some(email.clone()),
            None => self
                .store
                .find_user(found.author_user_id)
                .await?
                .map(|u| u.email),
        };
        let verdict = if self.enforce_membership {
            self.membership.check(email.as_deref()).await
        } else {
            MembershipVerdict::unconfigured()
        };
        let record = MembershipValidation {
            submission_id: submission.get(),
            user_id: access.actor().get(),
            email: email.clone().unwrap_or_default(),
            ok: verdict.ok,
            reason: verdict.reason.clone(),
        };
        if let Err(e) = self.store.record_membership_validation(&record).await {
            tracing::warn!(%submission, error = %e, "membership verdict not recorded");
        }
        if !verdict.ok {
            let reason = verdict.reason.unwrap_or_else(|| "invalid".into());
            self.audit.record(
                AuditEntry::new(
                    Some(access.actor()),
                    AuditAction::FinalCheckFailed,
                    EntityType::Submission,
                    submission,
                    json!({ "reason": reason, "email": email }),
                )
                .with_severity(Severity::Warn),
            );
            tracing::warn!(%submission, reason = %reason, "membership check failed");
            return Err(ReviewError::Forbidden(format!(
                "membership check failed: {reason}"
            )));
        }

        let mut tx = self.store.begin().await?;
        let current = tx
            .lock_submission(submission)
            .await?
            .ok_or_else(|| ReviewError::NotFound(format!("submission {submission}")))?
            .status;
        let change = next_status(current, LifecycleTrigger::FinalUploaded)?;
        tx.record_final_upload(submission, file_ref).await?;
        if let StatusChange::To(next) = change {
            tx.set_status(submission, next).await?;
        }
        tx.commit().await?;

        let stored = self.store.find_submission(submission).await?;
        self.counters.final_uploaded();
        self.audit.record(AuditEntry::new(
            Some(access.actor()),
            AuditAction::FinalUploaded,
            EntityType::Submission,
            submission,
            json!({ "file": file_ref, "email": email }),
        ));
        tracing::info!(%submission, "final version accepted");
        Ok(FinalReceipt {
            submission_id: submission,
            status: change.resolve(current),
            final_submitted_at: stored.and_then(|s| s.final_submitted_at),
        })
    }
}
