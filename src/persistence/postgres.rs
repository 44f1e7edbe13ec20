//! PostgreSQL implementation of the store traits.
//!
//! The uniqueness rules the engines rely on are enforced by the schema in
//! `migrations/`: one decision per submission (primary key), one assignment
//! and one review per `(submission, reviewer)` (partial unique indexes, one
//! for account reviewers and one for external reviewers), one grant per
//! `(event, user, role)`. Upserts name those constraints as conflict targets.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, Transaction};

use super::models::{
    AssignmentRow, DecisionRow, EventRow, ExternalReviewerRow, MemberRow, MembershipValidation,
    OverviewRow, QueueRow, ReviewRow, ReviewerAssignmentRow, ReviewerSummaryRow, SubmissionRow,
    UserRecord,
};
use super::{ReviewStore, RoleStore, StoreTx};
use crate::domain::{
    AssignmentView, AuditEntry, Decision, Event, EventId, EventMember, EventRole,
    ExternalReviewer, ExternalReviewerId, NewAssignment, NewDecision, NewEvent,
    NewExternalReviewer, NewSubmission, QueueEntry, Review, ReviewContent, ReviewerAssignment,
    ReviewerRef, ReviewerSummary, RoleSet, Submission, SubmissionFilter, SubmissionId,
    SubmissionOverview, SubmissionStatus, UserId,
};
use crate::error::ReviewError;

macro_rules! submission_columns {
    () => {
        "id, event_id, author_user_id, title, abstract, keywords, authors, file_ref, status, \
         membership_email, created_at, final_file_ref, final_submitted_at"
    };
}

macro_rules! decision_columns {
    () => {
        "submission_id, decision, reason, decider_user_id, decided_at"
    };
}

macro_rules! external_columns {
    () => {
        "id, event_id, name, email, invite_token, expires_at"
    };
}

/// Column holding the reviewer key and the partial index predicate that
/// makes it unique per submission.
fn reviewer_column(reviewer: ReviewerRef) -> (&'static str, i64) {
    match reviewer {
        ReviewerRef::User(id) => ("reviewer_user_id", id.get()),
        ReviewerRef::External(id) => ("external_reviewer_id", id.get()),
    }
}

fn raw_ids(ids: &[UserId]) -> Vec<i64> {
    ids.iter().map(|id| id.get()).collect()
}

fn persistence(e: sqlx::Error) -> ReviewError {
    ReviewError::Persistence(e.to_string())
}

/// PostgreSQL-backed store using `sqlx::PgPool`.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Wraps an existing connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a connection pool.
    ///
    /// # Errors
    ///
    /// Returns a [`ReviewError::Persistence`] if the database is unreachable.
    pub async fn connect(
        url: &str,
        max_connections: u32,
        min_connections: u32,
        connect_timeout: Duration,
    ) -> Result<Self, ReviewError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(connect_timeout)
            .connect(url)
            .await
            .map_err(persistence)?;
        Ok(Self { pool })
    }

    /// Applies the embedded migrations.
    ///
    /// # Errors
    ///
    /// Returns a [`ReviewError::Persistence`] if a migration fails.
    pub async fn migrate(&self) -> Result<(), ReviewError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| ReviewError::Persistence(e.to_string()))
    }

    /// The underlying pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl RoleStore for PostgresStore {
    async fn roles_for(&self, event: EventId, user: UserId) -> Result<RoleSet, ReviewError> {
        let rows = sqlx::query_scalar::<_, String>(
            "SELECT role FROM event_roles WHERE event_id = $1 AND user_id = $2",
        )
        .bind(event.get())
        .bind(user.get())
        .fetch_all(&self.pool)
        .await
        .map_err(persistence)?;

        rows.iter()
            .map(|r| r.parse::<EventRole>().map_err(ReviewError::Persistence))
            .collect()
    }

    async fn is_global_admin(&self, user: UserId) -> Result<bool, ReviewError> {
        let flag = sqlx::query_scalar::<_, bool>("SELECT is_admin FROM users WHERE id = $1")
            .bind(user.get())
            .fetch_optional(&self.pool)
            .await
            .map_err(persistence)?;
        Ok(flag.unwrap_or(false))
    }

    async fn reviewers_among(
        &self,
        event: EventId,
        candidates: &[UserId],
    ) -> Result<HashSet<UserId>, ReviewError> {
        if candidates.is_empty() {
            return Ok(HashSet::new());
        }
        let rows = sqlx::query_scalar::<_, i64>(
            "SELECT user_id FROM event_roles \
             WHERE event_id = $1 AND role = 'reviewer' AND user_id = ANY($2)",
        )
        .bind(event.get())
        .bind(raw_ids(candidates))
        .fetch_all(&self.pool)
        .await
        .map_err(persistence)?;
        Ok(rows.into_iter().map(UserId::new).collect())
    }

    async fn grant_role(
        &self,
        event: EventId,
        user: UserId,
        role: EventRole,
    ) -> Result<bool, ReviewError> {
        let result = sqlx::query(
            "INSERT INTO event_roles (event_id, user_id, role) VALUES ($1, $2, $3) \
             ON CONFLICT (event_id, user_id, role) DO NOTHING",
        )
        .bind(event.get())
        .bind(user.get())
        .bind(role.as_str())
        .execute(&self.pool)
        .await
        .map_err(persistence)?;
        Ok(result.rows_affected() > 0)
    }

    async fn revoke_role(
        &self,
        event: EventId,
        user: UserId,
        role: EventRole,
    ) -> Result<bool, ReviewError> {
        let result = sqlx::query(
            "DELETE FROM event_roles WHERE event_id = $1 AND user_id = $2 AND role = $3",
        )
        .bind(event.get())
        .bind(user.get())
        .bind(role.as_str())
        .execute(&self.pool)
        .await
        .map_err(persistence)?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_members(&self, event: EventId) -> Result<Vec<EventMember>, ReviewError> {
        let rows = sqlx::query_as::<_, MemberRow>(
            "SELECT er.user_id, u.email, u.name, er.role \
             FROM event_roles er JOIN users u ON u.id = er.user_id \
             WHERE er.event_id = $1 \
             ORDER BY CASE er.role WHEN 'author' THEN 0 WHEN 'reviewer' THEN 1 ELSE 2 END, u.name",
        )
        .bind(event.get())
        .fetch_all(&self.pool)
        .await
        .map_err(persistence)?;
        rows.into_iter().map(EventMember::try_from).collect()
    }

    async fn list_reviewers(&self, event: EventId) -> Result<Vec<ReviewerSummary>, ReviewError> {
        let rows = sqlx::query_as::<_, ReviewerSummaryRow>(
            "SELECT u.id AS user_id, u.email, u.name, \
                    (SELECT COUNT(*) FROM assignments a WHERE a.reviewer_user_id = u.id) \
                        AS n_assigned_total \
             FROM event_roles er JOIN users u ON u.id = er.user_id \
             WHERE er.event_id = $1 AND er.role = 'reviewer' \
             ORDER BY u.name",
        )
        .bind(event.get())
        .fetch_all(&self.pool)
        .await
        .map_err(persistence)?;
        Ok(rows.into_iter().map(ReviewerSummary::from).collect())
    }
}

#[async_trait]
impl ReviewStore for PostgresStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>, ReviewError> {
        let tx = self.pool.begin().await.map_err(persistence)?;
        Ok(Box::new(PgTx { tx }))
    }

    async fn find_user(&self, user: UserId) -> Result<Option<UserRecord>, ReviewError> {
        sqlx::query_as::<_, UserRecord>("SELECT id, email, name, is_admin FROM users WHERE id = $1")
            .bind(user.get())
            .fetch_optional(&self.pool)
            .await
            .map_err(persistence)
    }

    async fn create_event(&self, event: NewEvent) -> Result<Event, ReviewError> {
        let row = sqlx::query_as::<_, EventRow>(
            "INSERT INTO events (name, description, starts_on, ends_on, created_by) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING id, name, description, starts_on, ends_on, created_by, created_at",
        )
        .bind(&event.name)
        .bind(&event.description)
        .bind(event.starts_on)
        .bind(event.ends_on)
        .bind(event.created_by.get())
        .fetch_one(&self.pool)
        .await
        .map_err(persistence)?;
        Ok(row.into())
    }

    async fn list_events(&self) -> Result<Vec<Event>, ReviewError> {
        let rows = sqlx::query_as::<_, EventRow>(
            "SELECT id, name, description, starts_on, ends_on, created_by, created_at \
             FROM events ORDER BY id DESC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(persistence)?;
        Ok(rows.into_iter().map(Event::from).collect())
    }

    async fn find_event(&self, event: EventId) -> Result<Option<Event>, ReviewError> {
        let row = sqlx::query_as::<_, EventRow>(
            "SELECT id, name, description, starts_on, ends_on, created_by, created_at \
             FROM events WHERE id = $1",
        )
        .bind(event.get())
        .fetch_optional(&self.pool)
        .await
        .map_err(persistence)?;
        Ok(row.map(Event::from))
    }

    async fn create_submission(
        &self,
        submission: NewSubmission,
    ) -> Result<Submission, ReviewError> {
        let row = sqlx::query_as::<_, SubmissionRow>(concat!(
            "INSERT INTO submissions \
             (event_id, author_user_id, title, abstract, keywords, authors, file_ref, \
              membership_email) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING ",
            submission_columns!()
        ))
        .bind(submission.event_id.get())
        .bind(submission.author_user_id.get())
        .bind(&submission.title)
        .bind(&submission.abstract_text)
        .bind(&submission.keywords)
        .bind(sqlx::types::Json(&submission.authors))
        .bind(&submission.file_ref)
        .bind(&submission.membership_email)
        .fetch_one(&self.pool)
        .await
        .map_err(persistence)?;
        Submission::try_from(row)
    }

    async fn find_submission(&self, id: SubmissionId) -> Result<Option<Submission>, ReviewError> {
        let row = sqlx::query_as::<_, SubmissionRow>(concat!(
            "SELECT ",
            submission_columns!(),
            " FROM submissions WHERE id = $1"
        ))
        .bind(id.get())
        .fetch_optional(&self.pool)
        .await
        .map_err(persistence)?;
        row.map(Submission::try_from).transpose()
    }

    async fn list_author_submissions(
        &self,
        event: EventId,
        author: UserId,
    ) -> Result<Vec<Submission>, ReviewError> {
        let rows = sqlx::query_as::<_, SubmissionRow>(concat!(
            "SELECT ",
            submission_columns!(),
            " FROM submissions WHERE event_id = $1 AND author_user_id = $2 \
              ORDER BY created_at DESC, id DESC"
        ))
        .bind(event.get())
        .bind(author.get())
        .fetch_all(&self.pool)
        .await
        .map_err(persistence)?;
        rows.into_iter().map(Submission::try_from).collect()
    }

    async fn list_submissions(
        &self,
        event: EventId,
        filter: &SubmissionFilter,
    ) -> Result<Vec<SubmissionOverview>, ReviewError> {
        let rows = sqlx::query_as::<_, OverviewRow>(
            "SELECT s.id, s.title, s.status, s.created_at, d.decision, \
                    (SELECT COUNT(*) FROM assignments a WHERE a.submission_id = s.id) \
                        AS n_assigned, \
                    (SELECT COUNT(*) FROM reviews r \
                        WHERE r.submission_id = s.id AND r.status = 'submitted') AS n_submitted, \
                    COALESCE((SELECT ROUND(AVG(r.score_overall)::numeric, 2)::float8 \
                        FROM reviews r \
                        WHERE r.submission_id = s.id AND r.status = 'submitted'), 0) AS avg_score \
             FROM submissions s \
             LEFT JOIN decisions d ON d.submission_id = s.id \
             WHERE s.event_id = $1 \
               AND ($2::text IS NULL OR s.status = $2) \
               AND ($3::text IS NULL OR POSITION($3 IN LOWER(s.title)) > 0) \
             ORDER BY s.created_at DESC, s.id DESC \
             LIMIT $4 OFFSET $5",
        )
        .bind(event.get())
        .bind(filter.status.map(SubmissionStatus::as_str))
        .bind(filter.title_query.as_deref())
        .bind(i64::from(filter.per_page))
        .bind(i64::try_from(filter.offset()).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await
        .map_err(persistence)?;
        rows.into_iter().map(SubmissionOverview::try_from).collect()
    }

    async fn find_decision(&self, id: SubmissionId) -> Result<Option<Decision>, ReviewError> {
        let row = sqlx::query_as::<_, DecisionRow>(concat!(
            "SELECT ",
            decision_columns!(),
            " FROM decisions WHERE submission_id = $1"
        ))
        .bind(id.get())
        .fetch_optional(&self.pool)
        .await
        .map_err(persistence)?;
        row.map(Decision::try_from).transpose()
    }

    async fn count_submitted_reviews(&self, id: SubmissionId) -> Result<i64, ReviewError> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM reviews WHERE submission_id = $1 AND status = 'submitted'",
        )
        .bind(id.get())
        .fetch_one(&self.pool)
        .await
        .map_err(persistence)
    }

    async fn list_assignments(
        &self,
        submission: SubmissionId,
    ) -> Result<Vec<AssignmentView>, ReviewError> {
        let rows = sqlx::query_as::<_, AssignmentRow>(
            "SELECT a.reviewer_user_id, a.external_reviewer_id, \
                    COALESCE(u.name, x.name) AS reviewer_name, \
                    COALESCE(u.email, x.email) AS reviewer_email, \
                    a.assigned_at, a.due_at, r.status AS review_status, r.submitted_at \
             FROM assignments a \
             LEFT JOIN users u ON u.id = a.reviewer_user_id \
             LEFT JOIN external_reviewers x ON x.id = a.external_reviewer_id \
             LEFT JOIN reviews r ON r.submission_id = a.submission_id \
                 AND r.reviewer_user_id IS NOT DISTINCT FROM a.reviewer_user_id \
                 AND r.external_reviewer_id IS NOT DISTINCT FROM a.external_reviewer_id \
             WHERE a.submission_id = $1 \
             ORDER BY a.assigned_at ASC, a.id ASC",
        )
        .bind(submission.get())
        .fetch_all(&self.pool)
        .await
        .map_err(persistence)?;
        rows.into_iter().map(AssignmentView::try_from).collect()
    }

    async fn list_reviewer_assignments(
        &self,
        event: EventId,
        reviewer: UserId,
    ) -> Result<Vec<ReviewerAssignment>, ReviewError> {
        let rows = sqlx::query_as::<_, ReviewerAssignmentRow>(
            "SELECT s.id AS submission_id, s.title, s.status, a.assigned_at, a.due_at, \
                    r.status AS review_status \
             FROM assignments a \
             JOIN submissions s ON s.id = a.submission_id \
             LEFT JOIN reviews r ON r.submission_id = a.submission_id \
                 AND r.reviewer_user_id = a.reviewer_user_id \
             WHERE a.reviewer_user_id = $1 AND s.event_id = $2 \
             ORDER BY a.due_at ASC NULLS LAST, a.assigned_at ASC",
        )
        .bind(reviewer.get())
        .bind(event.get())
        .fetch_all(&self.pool)
        .await
        .map_err(persistence)?;
        rows.into_iter().map(ReviewerAssignment::try_from).collect()
    }

    async fn list_reviews(&self, submission: SubmissionId) -> Result<Vec<Review>, ReviewError> {
        let rows = sqlx::query_as::<_, ReviewRow>(
            "SELECT r.submission_id, r.reviewer_user_id, r.external_reviewer_id, \
                    COALESCE(u.name, x.name) AS reviewer_name, r.status, \
                    r.score_technical, r.score_relevance, r.score_innovation, r.score_writing, \
                    r.score_overall, r.comments_for_author, r.comments_committee, r.submitted_at \
             FROM reviews r \
             LEFT JOIN users u ON u.id = r.reviewer_user_id \
             LEFT JOIN external_reviewers x ON x.id = r.external_reviewer_id \
             WHERE r.submission_id = $1 \
             ORDER BY (r.external_reviewer_id IS NOT NULL), \
                      COALESCE(r.reviewer_user_id, r.external_reviewer_id)",
        )
        .bind(submission.get())
        .fetch_all(&self.pool)
        .await
        .map_err(persistence)?;
        rows.into_iter().map(Review::try_from).collect()
    }

    async fn decision_queue(
        &self,
        event: EventId,
        min_reviews: i64,
    ) -> Result<Vec<QueueEntry>, ReviewError> {
        let rows = sqlx::query_as::<_, QueueRow>(
            "SELECT s.id AS submission_id, s.title, COUNT(r.submission_id) AS n_reviews, \
                    COALESCE(ROUND(AVG(r.score_overall)::numeric, 2)::float8, 0) AS avg_score, \
                    s.created_at \
             FROM submissions s \
             LEFT JOIN reviews r ON r.submission_id = s.id AND r.status = 'submitted' \
             LEFT JOIN decisions d ON d.submission_id = s.id \
             WHERE s.event_id = $1 \
               AND s.status IN ('submitted', 'under_review') \
               AND d.submission_id IS NULL \
             GROUP BY s.id \
             HAVING COUNT(r.submission_id) >= $2 \
             ORDER BY s.created_at ASC, s.id ASC",
        )
        .bind(event.get())
        .bind(min_reviews)
        .fetch_all(&self.pool)
        .await
        .map_err(persistence)?;
        Ok(rows.into_iter().map(QueueEntry::from).collect())
    }

    async fn find_external_by_token(
        &self,
        token: &str,
    ) -> Result<Option<ExternalReviewer>, ReviewError> {
        let row = sqlx::query_as::<_, ExternalReviewerRow>(concat!(
            "SELECT ",
            external_columns!(),
            " FROM external_reviewers WHERE invite_token = $1"
        ))
        .bind(token)
        .fetch_optional(&self.pool)
        .await
        .map_err(persistence)?;
        Ok(row.map(ExternalReviewer::from))
    }

    async fn external_assignment(
        &self,
        reviewer: ExternalReviewerId,
    ) -> Result<Option<SubmissionId>, ReviewError> {
        let row = sqlx::query_scalar::<_, i64>(
            "SELECT submission_id FROM assignments WHERE external_reviewer_id = $1 \
             ORDER BY assigned_at ASC LIMIT 1",
        )
        .bind(reviewer.get())
        .fetch_optional(&self.pool)
        .await
        .map_err(persistence)?;
        Ok(row.map(SubmissionId::new))
    }

    async fn record_membership_validation(
        &self,
        record: &MembershipValidation,
    ) -> Result<(), ReviewError> {
        sqlx::query(
            "INSERT INTO membership_validations (submission_id, user_id, email, ok, reason) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(record.submission_id)
        .bind(record.user_id)
        .bind(&record.email)
        .bind(record.ok)
        .bind(&record.reason)
        .execute(&self.pool)
        .await
        .map_err(persistence)?;
        Ok(())
    }

    async fn save_audit_entry(&self, entry: &AuditEntry) -> Result<(), ReviewError> {
        sqlx::query(
            "INSERT INTO audit_logs \
             (trace_id, actor_user_id, action, entity_type, entity_id, severity, details, \
              created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(entry.trace_id)
        .bind(entry.actor.map(UserId::get))
        .bind(entry.action.as_str())
        .bind(entry.entity_type.as_str())
        .bind(&entry.entity_id)
        .bind(entry.severity.as_str())
        .bind(&entry.details)
        .bind(entry.timestamp)
        .execute(&self.pool)
        .await
        .map_err(persistence)?;
        Ok(())
    }
}

/// An open PostgreSQL transaction. Rolled back by `sqlx` when dropped.
#[derive(Debug)]
struct PgTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTx for PgTx {
    async fn lock_submission(
        &mut self,
        id: SubmissionId,
    ) -> Result<Option<Submission>, ReviewError> {
        let row = sqlx::query_as::<_, SubmissionRow>(concat!(
            "SELECT ",
            submission_columns!(),
            " FROM submissions WHERE id = $1 FOR UPDATE"
        ))
        .bind(id.get())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(persistence)?;
        row.map(Submission::try_from).transpose()
    }

    async fn find_decision(&mut self, id: SubmissionId) -> Result<Option<Decision>, ReviewError> {
        let row = sqlx::query_as::<_, DecisionRow>(concat!(
            "SELECT ",
            decision_columns!(),
            " FROM decisions WHERE submission_id = $1"
        ))
        .bind(id.get())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(persistence)?;
        row.map(Decision::try_from).transpose()
    }

    async fn is_assigned(
        &mut self,
        submission: SubmissionId,
        reviewer: ReviewerRef,
    ) -> Result<bool, ReviewError> {
        let (column, key) = reviewer_column(reviewer);
        let sql = format!(
            "SELECT EXISTS (SELECT 1 FROM assignments \
             WHERE submission_id = $1 AND {column} = $2)"
        );
        sqlx::query_scalar::<_, bool>(&sql)
            .bind(submission.get())
            .bind(key)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(persistence)
    }

    async fn submitted_reviewers(
        &mut self,
        submission: SubmissionId,
        reviewers: &[UserId],
    ) -> Result<Vec<UserId>, ReviewError> {
        let rows = sqlx::query_scalar::<_, i64>(
            "SELECT reviewer_user_id FROM reviews \
             WHERE submission_id = $1 AND reviewer_user_id = ANY($2) AND status = 'submitted' \
             ORDER BY reviewer_user_id",
        )
        .bind(submission.get())
        .bind(raw_ids(reviewers))
        .fetch_all(&mut *self.tx)
        .await
        .map_err(persistence)?;
        Ok(rows.into_iter().map(UserId::new).collect())
    }

    async fn upsert_assignment(&mut self, assignment: &NewAssignment) -> Result<(), ReviewError> {
        let (column, key) = reviewer_column(assignment.reviewer);
        let sql = format!(
            "INSERT INTO assignments (submission_id, {column}, assigned_by_user_id, due_at) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (submission_id, {column}) WHERE {column} IS NOT NULL \
             DO UPDATE SET due_at = COALESCE(EXCLUDED.due_at, assignments.due_at)"
        );
        sqlx::query(&sql)
            .bind(assignment.submission_id.get())
            .bind(key)
            .bind(assignment.assigned_by.get())
            .bind(assignment.due_at)
            .execute(&mut *self.tx)
            .await
            .map_err(persistence)?;
        Ok(())
    }

    async fn ensure_review_placeholder(
        &mut self,
        submission: SubmissionId,
        reviewer: ReviewerRef,
    ) -> Result<(), ReviewError> {
        let (column, key) = reviewer_column(reviewer);
        let sql = format!(
            "INSERT INTO reviews (submission_id, {column}, status) VALUES ($1, $2, 'assigned') \
             ON CONFLICT (submission_id, {column}) WHERE {column} IS NOT NULL DO NOTHING"
        );
        sqlx::query(&sql)
            .bind(submission.get())
            .bind(key)
            .execute(&mut *self.tx)
            .await
            .map_err(persistence)?;
        Ok(())
    }

    async fn delete_assignments(
        &mut self,
        submission: SubmissionId,
        reviewers: &[UserId],
    ) -> Result<u64, ReviewError> {
        let result = sqlx::query(
            "DELETE FROM assignments WHERE submission_id = $1 AND reviewer_user_id = ANY($2)",
        )
        .bind(submission.get())
        .bind(raw_ids(reviewers))
        .execute(&mut *self.tx)
        .await
        .map_err(persistence)?;
        Ok(result.rows_affected())
    }

    async fn delete_reviews(
        &mut self,
        submission: SubmissionId,
        reviewers: &[UserId],
        include_submitted: bool,
    ) -> Result<u64, ReviewError> {
        let result = sqlx::query(
            "DELETE FROM reviews WHERE submission_id = $1 AND reviewer_user_id = ANY($2) \
             AND ($3 OR status <> 'submitted')",
        )
        .bind(submission.get())
        .bind(raw_ids(reviewers))
        .bind(include_submitted)
        .execute(&mut *self.tx)
        .await
        .map_err(persistence)?;
        Ok(result.rows_affected())
    }

    async fn count_assignments(&mut self, submission: SubmissionId) -> Result<i64, ReviewError> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM assignments WHERE submission_id = $1")
            .bind(submission.get())
            .fetch_one(&mut *self.tx)
            .await
            .map_err(persistence)
    }

    async fn count_submitted_reviews(
        &mut self,
        submission: SubmissionId,
    ) -> Result<i64, ReviewError> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM reviews WHERE submission_id = $1 AND status = 'submitted'",
        )
        .bind(submission.get())
        .fetch_one(&mut *self.tx)
        .await
        .map_err(persistence)
    }

    async fn set_status(
        &mut self,
        submission: SubmissionId,
        status: SubmissionStatus,
    ) -> Result<(), ReviewError> {
        let result = sqlx::query("UPDATE submissions SET status = $2 WHERE id = $1")
            .bind(submission.get())
            .bind(status.as_str())
            .execute(&mut *self.tx)
            .await
            .map_err(persistence)?;
        if result.rows_affected() == 0 {
            return Err(ReviewError::NotFound(format!("submission {submission}")));
        }
        Ok(())
    }

    async fn insert_decision(
        &mut self,
        decision: &NewDecision,
    ) -> Result<Option<Decision>, ReviewError> {
        let row = sqlx::query_as::<_, DecisionRow>(concat!(
            "INSERT INTO decisions (submission_id, decision, reason, decider_user_id) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (submission_id) DO NOTHING RETURNING ",
            decision_columns!()
        ))
        .bind(decision.submission_id.get())
        .bind(decision.decision.as_str())
        .bind(&decision.reason)
        .bind(decision.decider_user_id.get())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(persistence)?;
        row.map(Decision::try_from).transpose()
    }

    async fn upsert_review_content(
        &mut self,
        submission: SubmissionId,
        reviewer: ReviewerRef,
        content: &ReviewContent,
    ) -> Result<(), ReviewError> {
        let (column, key) = reviewer_column(reviewer);
        let sql = format!(
            "INSERT INTO reviews (submission_id, {column}, status, score_technical, \
              score_relevance, score_innovation, score_writing, score_overall, \
              comments_for_author, comments_committee, submitted_at) \
             VALUES ($1, $2, 'submitted', $3, $4, $5, $6, $7, $8, $9, NOW()) \
             ON CONFLICT (submission_id, {column}) WHERE {column} IS NOT NULL \
             DO UPDATE SET status = 'submitted', \
                 score_technical = EXCLUDED.score_technical, \
                 score_relevance = EXCLUDED.score_relevance, \
                 score_innovation = EXCLUDED.score_innovation, \
                 score_writing = EXCLUDED.score_writing, \
                 score_overall = EXCLUDED.score_overall, \
                 comments_for_author = EXCLUDED.comments_for_author, \
                 comments_committee = EXCLUDED.comments_committee, \
                 submitted_at = NOW()"
        );
        sqlx::query(&sql)
            .bind(submission.get())
            .bind(key)
            .bind(content.scores.technical)
            .bind(content.scores.relevance)
            .bind(content.scores.innovation)
            .bind(content.scores.writing)
            .bind(content.scores.overall())
            .bind(&content.comments_for_author)
            .bind(&content.comments_committee)
            .execute(&mut *self.tx)
            .await
            .map_err(persistence)?;
        Ok(())
    }

    async fn record_final_upload(
        &mut self,
        submission: SubmissionId,
        file_ref: &str,
    ) -> Result<(), ReviewError> {
        let result = sqlx::query(
            "UPDATE submissions SET final_file_ref = $2, final_submitted_at = NOW() WHERE id = $1",
        )
        .bind(submission.get())
        .bind(file_ref)
        .execute(&mut *self.tx)
        .await
        .map_err(persistence)?;
        if result.rows_affected() == 0 {
            return Err(ReviewError::NotFound(format!("submission {submission}")));
        }
        Ok(())
    }

    async fn create_external_reviewer(
        &mut self,
        reviewer: &NewExternalReviewer,
    ) -> Result<ExternalReviewer, ReviewError> {
        let row = sqlx::query_as::<_, ExternalReviewerRow>(concat!(
            "INSERT INTO external_reviewers (event_id, name, email, invite_token, expires_at) \
             VALUES ($1, $2, $3, $4, $5) RETURNING ",
            external_columns!()
        ))
        .bind(reviewer.event_id.get())
        .bind(&reviewer.name)
        .bind(&reviewer.email)
        .bind(&reviewer.invite_token)
        .bind(reviewer.expires_at)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(persistence)?;
        Ok(row.into())
    }

    async fn commit(self: Box<Self>) -> Result<(), ReviewError> {
        self.tx.commit().await.map_err(persistence)
    }
}
