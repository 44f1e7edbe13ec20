//! Persistence layer: the relational seam every engine writes through.
//!
//! [`ReviewStore`] covers reads and single-statement writes,
//! [`StoreTx`] covers the multi-statement mutations that must commit or roll
//! back as one unit, and [`RoleStore`] answers the role questions the
//! authorization gate and the assignment engine ask. [`PostgresStore`]
//! implements all three on `sqlx`; [`MemoryStore`] implements them in
//! process with serialized transactions.
//!
//! Uniqueness of `(submission, reviewer)` assignment and review rows and of
//! the decision per submission is the store's job, never the caller's:
//! [`StoreTx::insert_decision`] reports a lost race by returning `None`.

pub mod audit_writer;
pub mod files;
pub mod memory;
pub mod models;
pub mod postgres;

use std::collections::HashSet;
use std::fmt;

use async_trait::async_trait;

pub use audit_writer::AuditWriter;
pub use files::{FileStore, LocalFileStore};
pub use memory::MemoryStore;
pub use models::{MembershipValidation, UserRecord};
pub use postgres::PostgresStore;

use crate::domain::{
    AssignmentView, AuditEntry, Decision, Event, EventId, EventMember, EventRole,
    ExternalReviewer, ExternalReviewerId, NewAssignment, NewDecision, NewEvent,
    NewExternalReviewer, NewSubmission, QueueEntry, Review, ReviewContent, ReviewerAssignment,
    ReviewerRef, ReviewerSummary, RoleSet, Submission, SubmissionFilter, SubmissionId,
    SubmissionOverview, SubmissionStatus, UserId,
};
use crate::error::ReviewError;

/// Resolves and edits event-scoped roles.
#[async_trait]
pub trait RoleStore: Send + Sync + fmt::Debug {
    /// Roles `user` holds in `event`, from `event_roles` only.
    async fn roles_for(&self, event: EventId, user: UserId) -> Result<RoleSet, ReviewError>;

    /// Whether `user` carries the global administrator flag.
    async fn is_global_admin(&self, user: UserId) -> Result<bool, ReviewError>;

    /// The subset of `candidates` that hold `reviewer` in `event` right now.
    async fn reviewers_among(
        &self,
        event: EventId,
        candidates: &[UserId],
    ) -> Result<HashSet<UserId>, ReviewError>;

    /// Inserts a grant. Returns `false` when it already existed.
    async fn grant_role(
        &self,
        event: EventId,
        user: UserId,
        role: EventRole,
    ) -> Result<bool, ReviewError>;

    /// Deletes a grant. Returns `false` when there was nothing to delete.
    async fn revoke_role(
        &self,
        event: EventId,
        user: UserId,
        role: EventRole,
    ) -> Result<bool, ReviewError>;

    /// Every grant in `event`, ordered by role then name.
    async fn list_members(&self, event: EventId) -> Result<Vec<EventMember>, ReviewError>;

    /// Reviewer-role holders in `event` with their total assignment count.
    async fn list_reviewers(&self, event: EventId) -> Result<Vec<ReviewerSummary>, ReviewError>;
}

/// Reads and single-statement writes.
///
/// Never call these while a [`StoreTx`] from the same store is open; the
/// in-memory store serializes on one lock.
#[async_trait]
pub trait ReviewStore: Send + Sync + fmt::Debug {
    /// Opens a transaction. Dropping it without [`StoreTx::commit`] rolls back.
    async fn begin(&self) -> Result<Box<dyn StoreTx>, ReviewError>;

    /// Looks up an account.
    async fn find_user(&self, user: UserId) -> Result<Option<UserRecord>, ReviewError>;

    /// Inserts an event.
    async fn create_event(&self, event: NewEvent) -> Result<Event, ReviewError>;

    /// All events, newest first.
    async fn list_events(&self) -> Result<Vec<Event>, ReviewError>;

    /// Looks up an event.
    async fn find_event(&self, event: EventId) -> Result<Option<Event>, ReviewError>;

    /// Inserts a submission in status `submitted`.
    async fn create_submission(&self, submission: NewSubmission)
    -> Result<Submission, ReviewError>;

    /// Looks up a submission regardless of event.
    async fn find_submission(&self, id: SubmissionId) -> Result<Option<Submission>, ReviewError>;

    /// `author`'s submissions in `event`, newest first.
    async fn list_author_submissions(
        &self,
        event: EventId,
        author: UserId,
    ) -> Result<Vec<Submission>, ReviewError>;

    /// Chair listing with aggregates, newest first, one page.
    async fn list_submissions(
        &self,
        event: EventId,
        filter: &SubmissionFilter,
    ) -> Result<Vec<SubmissionOverview>, ReviewError>;

    /// The decision for a submission, if any.
    async fn find_decision(&self, id: SubmissionId) -> Result<Option<Decision>, ReviewError>;

    /// Number of `submitted` reviews.
    async fn count_submitted_reviews(&self, id: SubmissionId) -> Result<i64, ReviewError>;

    /// Chair view of a submission's reviewer links, oldest first.
    async fn list_assignments(
        &self,
        submission: SubmissionId,
    ) -> Result<Vec<AssignmentView>, ReviewError>;

    /// `reviewer`'s queue in `event`, by due date.
    async fn list_reviewer_assignments(
        &self,
        event: EventId,
        reviewer: UserId,
    ) -> Result<Vec<ReviewerAssignment>, ReviewError>;

    /// Every review row of a submission.
    async fn list_reviews(&self, submission: SubmissionId) -> Result<Vec<Review>, ReviewError>;

    /// Undecided submissions with at least `min_reviews` submitted reviews,
    /// oldest first.
    async fn decision_queue(
        &self,
        event: EventId,
        min_reviews: i64,
    ) -> Result<Vec<QueueEntry>, ReviewError>;

    /// Looks up an invitation by token, expired or not.
    async fn find_external_by_token(
        &self,
        token: &str,
    ) -> Result<Option<ExternalReviewer>, ReviewError>;

    /// The submission an external reviewer was invited for.
    async fn external_assignment(
        &self,
        reviewer: ExternalReviewerId,
    ) -> Result<Option<SubmissionId>, ReviewError>;

    /// Appends a row to `membership_validations`.
    async fn record_membership_validation(
        &self,
        record: &MembershipValidation,
    ) -> Result<(), ReviewError>;

    /// Appends a row to `audit_logs`.
    async fn save_audit_entry(&self, entry: &AuditEntry) -> Result<(), ReviewError>;
}

/// An open transaction. Every write of a multi-statement mutation goes
/// through one of these.
#[async_trait]
pub trait StoreTx: Send {
    /// Reads a submission and locks it until commit or rollback.
    async fn lock_submission(&mut self, id: SubmissionId)
    -> Result<Option<Submission>, ReviewError>;

    /// The decision for a submission, if any.
    async fn find_decision(&mut self, id: SubmissionId) -> Result<Option<Decision>, ReviewError>;

    /// Whether an assignment row links `reviewer` to `submission`.
    async fn is_assigned(
        &mut self,
        submission: SubmissionId,
        reviewer: ReviewerRef,
    ) -> Result<bool, ReviewError>;

    /// The subset of `reviewers` whose review of `submission` is `submitted`.
    async fn submitted_reviewers(
        &mut self,
        submission: SubmissionId,
        reviewers: &[UserId],
    ) -> Result<Vec<UserId>, ReviewError>;

    /// Upserts an assignment. On conflict only a supplied `due_at` overwrites
    /// the stored one.
    async fn upsert_assignment(&mut self, assignment: &NewAssignment) -> Result<(), ReviewError>;

    /// Creates an `assigned` review row unless one already exists.
    async fn ensure_review_placeholder(
        &mut self,
        submission: SubmissionId,
        reviewer: ReviewerRef,
    ) -> Result<(), ReviewError>;

    /// Deletes assignment rows. Returns the number deleted.
    async fn delete_assignments(
        &mut self,
        submission: SubmissionId,
        reviewers: &[UserId],
    ) -> Result<u64, ReviewError>;

    /// Deletes review rows; `submitted` ones only when `include_submitted`.
    async fn delete_reviews(
        &mut self,
        submission: SubmissionId,
        reviewers: &[UserId],
        include_submitted: bool,
    ) -> Result<u64, ReviewError>;

    /// Assignment rows linked to the submission.
    async fn count_assignments(&mut self, submission: SubmissionId) -> Result<i64, ReviewError>;

    /// `submitted` reviews linked to the submission.
    async fn count_submitted_reviews(
        &mut self,
        submission: SubmissionId,
    ) -> Result<i64, ReviewError>;

    /// Writes the status column.
    async fn set_status(
        &mut self,
        submission: SubmissionId,
        status: SubmissionStatus,
    ) -> Result<(), ReviewError>;

    /// Inserts the decision unless one exists. `None` means another decision
    /// already holds the slot and nothing was written.
    async fn insert_decision(
        &mut self,
        decision: &NewDecision,
    ) -> Result<Option<Decision>, ReviewError>;

    /// Writes scores and comments and marks the review `submitted`, creating
    /// the row if the placeholder is missing.
    async fn upsert_review_content(
        &mut self,
        submission: SubmissionId,
        reviewer: ReviewerRef,
        content: &ReviewContent,
    ) -> Result<(), ReviewError>;

    /// Stores the camera-ready reference and its upload time.
    async fn record_final_upload(
        &mut self,
        submission: SubmissionId,
        file_ref: &str,
    ) -> Result<(), ReviewError>;

    /// Inserts an invitation.
    async fn create_external_reviewer(
        &mut self,
        reviewer: &NewExternalReviewer,
    ) -> Result<ExternalReviewer, ReviewError>;

    /// Makes every write visible.
    async fn commit(self: Box<Self>) -> Result<(), ReviewError>;
}
