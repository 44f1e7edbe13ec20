//! Submission repository operations: author intake and chair listings.

use std::sync::Arc;

use serde_json::json;

use crate::domain::text::{clean_opt, clean_text, normalize_email};
use crate::domain::{
    AssignmentView, AuditAction, AuditEntry, AuditSink, AuthorEntry, EntityType, EventRole,
    NewSubmission, ReviewerAssignment, Submission, SubmissionFilter, SubmissionId,
    SubmissionOverview,
};
use crate::error::ReviewError;
use crate::persistence::ReviewStore;

use super::authz::EventAccess;
use super::submission_in_event;

const MAX_TITLE_CHARS: usize = 200;
const MAX_ABSTRACT_CHARS: usize = 2000;
const MAX_KEYWORDS_CHARS: usize = 300;
const MAX_AUTHOR_NAME_CHARS: usize = 100;
const MAX_ORGANIZATION_CHARS: usize = 150;

/// Raw input for [`SubmissionService::create_submission`].
#[derive(Debug, Clone, Default)]
pub struct SubmissionDraft {
    /// Title as typed.
    pub title: String,
    /// Abstract as typed.
    pub abstract_text: Option<String>,
    /// Keywords as typed.
    pub keywords: Option<String>,
    /// Author list as typed.
    pub authors: Vec<AuthorEntry>,
    /// Reference returned by the file store.
    pub file_ref: String,
    /// Email to check membership against at final upload.
    pub membership_email: Option<String>,
}

/// Author intake and the chair's view of submissions.
#[derive(Debug, Clone)]
pub struct SubmissionService {
    store: Arc<dyn ReviewStore>,
    audit: Arc<dyn AuditSink>,
}

impl SubmissionService {
    /// Creates a new `SubmissionService`.
    #[must_use]
    pub fn new(store: Arc<dyn ReviewStore>, audit: Arc<dyn AuditSink>) -> Self {
        Self { store, audit }
    }

    /// Stores a new submission in status `submitted`.
    ///
    /// Text fields are sanitized and truncated; malformed author emails are
    /// dropped rather than rejected.
    ///
    /// # Errors
    ///
    /// - [`ReviewError::Forbidden`] without the author role.
    /// - [`ReviewError::Validation`] for an empty title, file reference, or a
    ///   malformed membership email.
    pub async fn create_submission(
        &self,
        access: &EventAccess,
        draft: SubmissionDraft,
    ) -> Result<Submission, ReviewError> {
        access.require_role(&[EventRole::Author])?;

        let title = clean_text(&draft.title, MAX_TITLE_CHARS)
            .ok_or_else(|| ReviewError::validation("title", "title is required"))?;
        let file_ref = draft.file_ref.trim().to_string();
        if file_ref.is_empty() {
            return Err(ReviewError::validation("file", "a PDF file is required"));
        }
        let membership_email = match draft.membership_email.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(normalize_email(raw).ok_or_else(|| {
                ReviewError::validation("membership_email", "not a valid email address")
            })?),
        };
        let authors = draft
            .authors
            .iter()
            .filter_map(|a| {
                Some(AuthorEntry {
                    name: clean_text(&a.name, MAX_AUTHOR_NAME_CHARS)?,
                    email: a.email.as_deref().and_then(normalize_email),
                    organization: clean_opt(a.organization.as_deref(), MAX_ORGANIZATION_CHARS),
                })
            })
            .collect();

        let submission = self
            .store
            .create_submission(NewSubmission {
                event_id: access.event_id(),
                author_user_id: access.actor(),
                title,
                abstract_text: clean_opt(draft.abstract_text.as_deref(), MAX_ABSTRACT_CHARS),
                keywords: clean_opt(draft.keywords.as_deref(), MAX_KEYWORDS_CHARS),
                authors,
                file_ref,
                membership_email,
            })
            .await?;

        self.audit.record(AuditEntry::new(
            Some(access.actor()),
            AuditAction::SubmissionCreated,
            EntityType::Submission,
            submission.id,
            json!({ "event_id": submission.event_id, "title": submission.title }),
        ));
        tracing::info!(
            submission_id = %submission.id,
            event_id = %submission.event_id,
            "submission created"
        );
        Ok(submission)
    }

    /// The caller's own submissions in the event.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewError::Persistence`] if the store fails.
    pub async fn list_my_submissions(
        &self,
        access: &EventAccess,
    ) -> Result<Vec<Submission>, ReviewError> {
        self.store
            .list_author_submissions(access.event_id(), access.actor())
            .await
    }

    /// One of the caller's own submissions.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewError::NotFound`] for unknown ids, other events, and
    /// other authors' submissions alike.
    pub async fn get_my_submission(
        &self,
        access: &EventAccess,
        id: SubmissionId,
    ) -> Result<Submission, ReviewError> {
        self.store
            .find_submission(id)
            .await?
            .filter(|s| s.event_id == access.event_id() && s.author_user_id == access.actor())
            .ok_or_else(|| ReviewError::NotFound(format!("submission {id}")))
    }

    /// Chair listing with review aggregates.
    ///
    /// # Errors
    ///
    /// - [`ReviewError::Forbidden`] without the chair role.
    /// - [`ReviewError::Persistence`] if the store fails.
    pub async fn list_submissions(
        &self,
        access: &EventAccess,
        filter: SubmissionFilter,
    ) -> Result<Vec<SubmissionOverview>, ReviewError> {
        access.require_role(&[EventRole::Chair])?;
        self.store
            .list_submissions(access.event_id(), &filter.normalized())
            .await
    }

    /// Reviewer links of one submission.
    ///
    /// # Errors
    ///
    /// - [`ReviewError::Forbidden`] without the chair role.
    /// - [`ReviewError::NotFound`] if the submission is not in the event.
    pub async fn list_assignments(
        &self,
        access: &EventAccess,
        submission: SubmissionId,
    ) -> Result<Vec<AssignmentView>, ReviewError> {
        access.require_role(&[EventRole::Chair])?;
        submission_in_event(self.store.as_ref(), access, submission).await?;
        self.store.list_assignments(submission).await
    }

    /// The caller's review queue in the event.
    ///
    /// # Errors
    ///
    /// - [`ReviewError::Forbidden`] without the reviewer role.
    /// - [`ReviewError::Persistence`] if the store fails.
    pub async fn list_reviewer_assignments(
        &self,
        access: &EventAccess,
    ) -> Result<Vec<ReviewerAssignment>, ReviewError> {
        access.require_role(&[EventRole::Reviewer])?;
        self.store
            .list_reviewer_assignments(access.event_id(), access.actor())
            .await
    }
}
