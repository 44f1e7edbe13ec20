//! In-memory implementation of the store traits.
//!
//! All tables live behind one `tokio::sync::Mutex`. A transaction takes the
//! lock for its whole lifetime and works on a copy of the tables; commit
//! swaps the copy in, drop discards it. Transactions are therefore fully
//! serialized, which gives the same observable outcome as the unique
//! constraints of the PostgreSQL schema.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::models::{MembershipValidation, UserRecord};
use super::{ReviewStore, RoleStore, StoreTx};
use crate::domain::{
    AssignmentView, AuditEntry, Decision, Event, EventId, EventMember, EventRole,
    ExternalReviewer, ExternalReviewerId, NewAssignment, NewDecision, NewEvent,
    NewExternalReviewer, NewSubmission, QueueEntry, Review, ReviewContent, ReviewStatus,
    ReviewerAssignment, ReviewerRef, ReviewerSummary, RoleSet, Submission, SubmissionFilter,
    SubmissionId, SubmissionOverview, SubmissionStatus, UserId,
};
use crate::error::ReviewError;

#[derive(Debug, Clone)]
struct AssignmentRecord {
    assigned_at: DateTime<Utc>,
    due_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default)]
struct Tables {
    next_id: i64,
    users: BTreeMap<UserId, UserRecord>,
    events: BTreeMap<EventId, Event>,
    roles: BTreeSet<(EventId, UserId, EventRole)>,
    submissions: BTreeMap<SubmissionId, Submission>,
    assignments: HashMap<(SubmissionId, ReviewerRef), AssignmentRecord>,
    reviews: HashMap<(SubmissionId, ReviewerRef), Review>,
    decisions: BTreeMap<SubmissionId, Decision>,
    externals: BTreeMap<ExternalReviewerId, ExternalReviewer>,
    membership_validations: Vec<MembershipValidation>,
    audit_log: Vec<AuditEntry>,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn sort_key(reviewer: ReviewerRef) -> (bool, i64) {
    match reviewer {
        ReviewerRef::User(id) => (false, id.get()),
        ReviewerRef::External(id) => (true, id.get()),
    }
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn submitted_overalls(&self, submission: SubmissionId) -> Vec<f64> {
        self.reviews
            .iter()
            .filter(|((sub, _), r)| *sub == submission && r.status == ReviewStatus::Submitted)
            .map(|(_, r)| r.overall.unwrap_or(0.0))
            .collect()
    }

    fn count_submitted(&self, submission: SubmissionId) -> i64 {
        i64::try_from(self.submitted_overalls(submission).len()).unwrap_or(i64::MAX)
    }

    fn average_overall(&self, submission: SubmissionId) -> f64 {
        let overalls = self.submitted_overalls(submission);
        if overalls.is_empty() {
            return 0.0;
        }
        let n = overalls.len() as f64;
        round2(overalls.iter().sum::<f64>() / n)
    }

    fn count_assignments(&self, submission: SubmissionId) -> i64 {
        let n = self
            .assignments
            .keys()
            .filter(|(sub, _)| *sub == submission)
            .count();
        i64::try_from(n).unwrap_or(i64::MAX)
    }

    fn reviewer_identity(&self, reviewer: ReviewerRef) -> (Option<String>, Option<String>) {
        match reviewer {
            ReviewerRef::User(id) => self
                .users
                .get(&id)
                .map(|u| (Some(u.name.clone()), Some(u.email.clone())))
                .unwrap_or_default(),
            ReviewerRef::External(id) => self
                .externals
                .get(&id)
                .map(|x| (Some(x.name.clone()), Some(x.email.clone())))
                .unwrap_or_default(),
        }
    }

    fn submission_mut(&mut self, id: SubmissionId) -> Result<&mut Submission, ReviewError> {
        self.submissions
            .get_mut(&id)
            .ok_or_else(|| ReviewError::NotFound(format!("submission {id}")))
    }
}

/// In-memory store implementing [`ReviewStore`] and [`RoleStore`].
///
/// Accounts are normally owned by the authentication system; here they are
/// created with [`MemoryStore::add_user`].
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an account and returns its id.
    pub async fn add_user(&self, email: &str, name: &str, is_admin: bool) -> UserId {
        let mut tables = self.tables.lock().await;
        let id = UserId::new(tables.next_id());
        tables.users.insert(
            id,
            UserRecord {
                id: id.get(),
                email: email.to_string(),
                name: name.to_string(),
                is_admin,
            },
        );
        id
    }

    /// Audit entries persisted so far, oldest first.
    pub async fn audit_entries(&self) -> Vec<AuditEntry> {
        self.tables.lock().await.audit_log.clone()
    }

    /// Membership verdicts recorded so far, oldest first.
    pub async fn membership_validations(&self) -> Vec<MembershipValidation> {
        self.tables.lock().await.membership_validations.clone()
    }
}

#[async_trait]
impl RoleStore for MemoryStore {
    async fn roles_for(&self, event: EventId, user: UserId) -> Result<RoleSet, ReviewError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .roles
            .iter()
            .filter(|(e, u, _)| *e == event && *u == user)
            .map(|(_, _, role)| *role)
            .collect())
    }

    async fn is_global_admin(&self, user: UserId) -> Result<bool, ReviewError> {
        let tables = self.tables.lock().await;
        Ok(tables.users.get(&user).is_some_and(|u| u.is_admin))
    }

    async fn reviewers_among(
        &self,
        event: EventId,
        candidates: &[UserId],
    ) -> Result<HashSet<UserId>, ReviewError> {
        let tables = self.tables.lock().await;
        Ok(candidates
            .iter()
            .copied()
            .filter(|u| tables.roles.contains(&(event, *u, EventRole::Reviewer)))
            .collect())
    }

    async fn grant_role(
        &self,
        event: EventId,
        user: UserId,
        role: EventRole,
    ) -> Result<bool, ReviewError> {
        let mut tables = self.tables.lock().await;
        Ok(tables.roles.insert((event, user, role)))
    }

    async fn revoke_role(
        &self,
        event: EventId,
        user: UserId,
        role: EventRole,
    ) -> Result<bool, ReviewError> {
        let mut tables = self.tables.lock().await;
        Ok(tables.roles.remove(&(event, user, role)))
    }

    async fn list_members(&self, event: EventId) -> Result<Vec<EventMember>, ReviewError> {
        let tables = self.tables.lock().await;
        let mut members: Vec<EventMember> = tables
            .roles
            .iter()
            .filter(|(e, _, _)| *e == event)
            .filter_map(|(_, user, role)| {
                tables.users.get(user).map(|u| EventMember {
                    user_id: *user,
                    email: u.email.clone(),
                    name: u.name.clone(),
                    role: *role,
                })
            })
            .collect();
        members.sort_by(|a, b| a.role.cmp(&b.role).then_with(|| a.name.cmp(&b.name)));
        Ok(members)
    }

    async fn list_reviewers(&self, event: EventId) -> Result<Vec<ReviewerSummary>, ReviewError> {
        let tables = self.tables.lock().await;
        let mut reviewers: Vec<ReviewerSummary> = tables
            .roles
            .iter()
            .filter(|(e, _, role)| *e == event && *role == EventRole::Reviewer)
            .filter_map(|(_, user, _)| {
                let account = tables.users.get(user)?;
                let total = tables
                    .assignments
                    .keys()
                    .filter(|(_, r)| *r == ReviewerRef::User(*user))
                    .count();
                Some(ReviewerSummary {
                    user_id: *user,
                    email: account.email.clone(),
                    name: account.name.clone(),
                    n_assigned_total: i64::try_from(total).unwrap_or(i64::MAX),
                })
            })
            .collect();
        reviewers.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(reviewers)
    }
}

#[async_trait]
impl ReviewStore for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>, ReviewError> {
        let guard = Arc::clone(&self.tables).lock_owned().await;
        let work = guard.clone();
        Ok(Box::new(MemoryTx { guard, work }))
    }

    async fn find_user(&self, user: UserId) -> Result<Option<UserRecord>, ReviewError> {
        Ok(self.tables.lock().await.users.get(&user).cloned())
    }

    async fn create_event(&self, event: NewEvent) -> Result<Event, ReviewError> {
        let mut tables = self.tables.lock().await;
        let created = Event {
            id: EventId::new(tables.next_id()),
            name: event.name,
            description: event.description,
            starts_on: event.starts_on,
            ends_on: event.ends_on,
            created_by: event.created_by,
            created_at: Utc::now(),
        };
        tables.events.insert(created.id, created.clone());
        Ok(created)
    }

    async fn list_events(&self) -> Result<Vec<Event>, ReviewError> {
        let tables = self.tables.lock().await;
        Ok(tables.events.values().rev().cloned().collect())
    }

    async fn find_event(&self, event: EventId) -> Result<Option<Event>, ReviewError> {
        Ok(self.tables.lock().await.events.get(&event).cloned())
    }

    async fn create_submission(
        &self,
        submission: NewSubmission,
    ) -> Result<Submission, ReviewError> {
        let mut tables = self.tables.lock().await;
        if !tables.events.contains_key(&submission.event_id) {
            return Err(ReviewError::NotFound(format!("event {}", submission.event_id)));
        }
        let created = Submission {
            id: SubmissionId::new(tables.next_id()),
            event_id: submission.event_id,
            author_user_id: submission.author_user_id,
            title: submission.title,
            abstract_text: submission.abstract_text,
            keywords: submission.keywords,
            authors: submission.authors,
            file_ref: submission.file_ref,
            status: SubmissionStatus::Submitted,
            membership_email: submission.membership_email,
            created_at: Utc::now(),
            final_file_ref: None,
            final_submitted_at: None,
        };
        tables.submissions.insert(created.id, created.clone());
        Ok(created)
    }

    async fn find_submission(&self, id: SubmissionId) -> Result<Option<Submission>, ReviewError> {
        Ok(self.tables.lock().await.submissions.get(&id).cloned())
    }

    async fn list_author_submissions(
        &self,
        event: EventId,
        author: UserId,
    ) -> Result<Vec<Submission>, ReviewError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .submissions
            .values()
            .rev()
            .filter(|s| s.event_id == event && s.author_user_id == author)
            .cloned()
            .collect())
    }

    async fn list_submissions(
        &self,
        event: EventId,
        filter: &SubmissionFilter,
    ) -> Result<Vec<SubmissionOverview>, ReviewError> {
        let tables = self.tables.lock().await;
        let skip = usize::try_from(filter.offset()).unwrap_or(usize::MAX);
        let take = usize::try_from(filter.per_page).unwrap_or(usize::MAX);
        Ok(tables
            .submissions
            .values()
            .rev()
            .filter(|s| s.event_id == event && filter.matches(s))
            .skip(skip)
            .take(take)
            .map(|s| SubmissionOverview {
                id: s.id,
                title: s.title.clone(),
                status: s.status,
                created_at: s.created_at,
                decision: tables.decisions.get(&s.id).map(|d| d.decision),
                n_assigned: tables.count_assignments(s.id),
                n_submitted: tables.count_submitted(s.id),
                avg_score: tables.average_overall(s.id),
            })
            .collect())
    }

    async fn find_decision(&self, id: SubmissionId) -> Result<Option<Decision>, ReviewError> {
        Ok(self.tables.lock().await.decisions.get(&id).cloned())
    }

    async fn count_submitted_reviews(&self, id: SubmissionId) -> Result<i64, ReviewError> {
        Ok(self.tables.lock().await.count_submitted(id))
    }

    async fn list_assignments(
        &self,
        submission: SubmissionId,
    ) -> Result<Vec<AssignmentView>, ReviewError> {
        let tables = self.tables.lock().await;
        let mut views: Vec<AssignmentView> = tables
            .assignments
            .iter()
            .filter(|((sub, _), _)| *sub == submission)
            .map(|((sub, reviewer), record)| {
                let (reviewer_name, reviewer_email) = tables.reviewer_identity(*reviewer);
                let review = tables.reviews.get(&(*sub, *reviewer));
                AssignmentView {
                    reviewer: *reviewer,
                    reviewer_name,
                    reviewer_email,
                    assigned_at: record.assigned_at,
                    due_at: record.due_at,
                    review_status: review.map(|r| r.status),
                    submitted_at: review.and_then(|r| r.submitted_at),
                }
            })
            .collect();
        views.sort_by(|a, b| {
            a.assigned_at
                .cmp(&b.assigned_at)
                .then_with(|| sort_key(a.reviewer).cmp(&sort_key(b.reviewer)))
        });
        Ok(views)
    }

    async fn list_reviewer_assignments(
        &self,
        event: EventId,
        reviewer: UserId,
    ) -> Result<Vec<ReviewerAssignment>, ReviewError> {
        let tables = self.tables.lock().await;
        let me = ReviewerRef::User(reviewer);
        let mut queue: Vec<ReviewerAssignment> = tables
            .assignments
            .iter()
            .filter(|((_, r), _)| *r == me)
            .filter_map(|((sub, _), record)| {
                let submission = tables.submissions.get(sub)?;
                if submission.event_id != event {
                    return None;
                }
                Some(ReviewerAssignment {
                    submission_id: *sub,
                    title: submission.title.clone(),
                    status: submission.status,
                    assigned_at: record.assigned_at,
                    due_at: record.due_at,
                    review_status: tables.reviews.get(&(*sub, me)).map(|r| r.status),
                })
            })
            .collect();
        queue.sort_by(|a, b| match (a.due_at, b.due_at) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => a.assigned_at.cmp(&b.assigned_at),
        });
        Ok(queue)
    }

    async fn list_reviews(&self, submission: SubmissionId) -> Result<Vec<Review>, ReviewError> {
        let tables = self.tables.lock().await;
        let mut reviews: Vec<Review> = tables
            .reviews
            .iter()
            .filter(|((sub, _), _)| *sub == submission)
            .map(|((_, reviewer), review)| Review {
                reviewer_name: tables.reviewer_identity(*reviewer).0,
                ..review.clone()
            })
            .collect();
        reviews.sort_by_key(|r| sort_key(r.reviewer));
        Ok(reviews)
    }

    async fn decision_queue(
        &self,
        event: EventId,
        min_reviews: i64,
    ) -> Result<Vec<QueueEntry>, ReviewError> {
        let tables = self.tables.lock().await;
        let mut queue: Vec<QueueEntry> = tables
            .submissions
            .values()
            .filter(|s| {
                s.event_id == event
                    && s.status.is_undecided()
                    && !tables.decisions.contains_key(&s.id)
            })
            .map(|s| QueueEntry {
                submission_id: s.id,
                title: s.title.clone(),
                n_reviews: tables.count_submitted(s.id),
                avg_score: tables.average_overall(s.id),
                created_at: s.created_at,
            })
            .filter(|q| q.n_reviews >= min_reviews)
            .collect();
        queue.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.submission_id.cmp(&b.submission_id))
        });
        Ok(queue)
    }

    async fn find_external_by_token(
        &self,
        token: &str,
    ) -> Result<Option<ExternalReviewer>, ReviewError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .externals
            .values()
            .find(|x| x.invite_token == token)
            .cloned())
    }

    async fn external_assignment(
        &self,
        reviewer: ExternalReviewerId,
    ) -> Result<Option<SubmissionId>, ReviewError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .assignments
            .keys()
            .find(|(_, r)| *r == ReviewerRef::External(reviewer))
            .map(|(sub, _)| *sub))
    }

    async fn record_membership_validation(
        &self,
        record: &MembershipValidation,
    ) -> Result<(), ReviewError> {
        self.tables
            .lock()
            .await
            .membership_validations
            .push(record.clone());
        Ok(())
    }

    async fn save_audit_entry(&self, entry: &AuditEntry) -> Result<(), ReviewError> {
        self.tables.lock().await.audit_log.push(entry.clone());
        Ok(())
    }
}

/// Transaction over a private copy of the tables.
#[derive(Debug)]
struct MemoryTx {
    guard: OwnedMutexGuard<Tables>,
    work: Tables,
}

fn user_refs(reviewers: &[UserId]) -> HashSet<ReviewerRef> {
    reviewers.iter().copied().map(ReviewerRef::User).collect()
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn lock_submission(
        &mut self,
        id: SubmissionId,
    ) -> Result<Option<Submission>, ReviewError> {
        Ok(self.work.submissions.get(&id).cloned())
    }

    async fn find_decision(&mut self, id: SubmissionId) -> Result<Option<Decision>, ReviewError> {
        Ok(self.work.decisions.get(&id).cloned())
    }

    async fn is_assigned(
        &mut self,
        submission: SubmissionId,
        reviewer: ReviewerRef,
    ) -> Result<bool, ReviewError> {
        Ok(self.work.assignments.contains_key(&(submission, reviewer)))
    }

    async fn submitted_reviewers(
        &mut self,
        submission: SubmissionId,
        reviewers: &[UserId],
    ) -> Result<Vec<UserId>, ReviewError> {
        let mut done: Vec<UserId> = reviewers
            .iter()
            .copied()
            .filter(|u| {
                self.work
                    .reviews
                    .get(&(submission, ReviewerRef::User(*u)))
                    .is_some_and(|r| r.status == ReviewStatus::Submitted)
            })
            .collect();
        done.sort();
        done.dedup();
        Ok(done)
    }

    async fn upsert_assignment(&mut self, assignment: &NewAssignment) -> Result<(), ReviewError> {
        let key = (assignment.submission_id, assignment.reviewer);
        match self.work.assignments.get_mut(&key) {
            Some(existing) => {
                if assignment.due_at.is_some() {
                    existing.due_at = assignment.due_at;
                }
            }
            None => {
                self.work.assignments.insert(
                    key,
                    AssignmentRecord {
                        assigned_at: Utc::now(),
                        due_at: assignment.due_at,
                    },
                );
            }
        }
        Ok(())
    }

    async fn ensure_review_placeholder(
        &mut self,
        submission: SubmissionId,
        reviewer: ReviewerRef,
    ) -> Result<(), ReviewError> {
        self.work
            .reviews
            .entry((submission, reviewer))
            .or_insert_with(|| Review {
                submission_id: submission,
                reviewer,
                reviewer_name: None,
                status: ReviewStatus::Assigned,
                scores: None,
                overall: None,
                comments_for_author: None,
                comments_committee: None,
                submitted_at: None,
            });
        Ok(())
    }

    async fn delete_assignments(
        &mut self,
        submission: SubmissionId,
        reviewers: &[UserId],
    ) -> Result<u64, ReviewError> {
        let targets = user_refs(reviewers);
        let before = self.work.assignments.len();
        self.work
            .assignments
            .retain(|(sub, r), _| !(*sub == submission && targets.contains(r)));
        Ok(u64::try_from(before - self.work.assignments.len()).unwrap_or(0))
    }

    async fn delete_reviews(
        &mut self,
        submission: SubmissionId,
        reviewers: &[UserId],
        include_submitted: bool,
    ) -> Result<u64, ReviewError> {
        let targets = user_refs(reviewers);
        let before = self.work.reviews.len();
        self.work.reviews.retain(|(sub, r), review| {
            let targeted = *sub == submission && targets.contains(r);
            let deletable = include_submitted || review.status != ReviewStatus::Submitted;
            !(targeted && deletable)
        });
        Ok(u64::try_from(before - self.work.reviews.len()).unwrap_or(0))
    }

    async fn count_assignments(&mut self, submission: SubmissionId) -> Result<i64, ReviewError> {
        Ok(self.work.count_assignments(submission))
    }

    async fn count_submitted_reviews(
        &mut self,
        submission: SubmissionId,
    ) -> Result<i64, ReviewError> {
        Ok(self.work.count_submitted(submission))
    }

    async fn set_status(
        &mut self,
        submission: SubmissionId,
        status: SubmissionStatus,
    ) -> Result<(), ReviewError> {
        self.work.submission_mut(submission)?.status = status;
        Ok(())
    }

    async fn insert_decision(
        &mut self,
        decision: &NewDecision,
    ) -> Result<Option<Decision>, ReviewError> {
        if self.work.decisions.contains_key(&decision.submission_id) {
            return Ok(None);
        }
        let row = Decision {
            submission_id: decision.submission_id,
            decision: decision.decision,
            reason: decision.reason.clone(),
            decider_user_id: decision.decider_user_id,
            decided_at: Utc::now(),
        };
        self.work.decisions.insert(row.submission_id, row.clone());
        Ok(Some(row))
    }

    async fn upsert_review_content(
        &mut self,
        submission: SubmissionId,
        reviewer: ReviewerRef,
        content: &ReviewContent,
    ) -> Result<(), ReviewError> {
        self.ensure_review_placeholder(submission, reviewer).await?;
        if let Some(review) = self.work.reviews.get_mut(&(submission, reviewer)) {
            review.scores = Some(content.scores);
            review.overall = Some(content.scores.overall());
            review.comments_for_author = content.comments_for_author.clone();
            review.comments_committee = content.comments_committee.clone();
            review.status = ReviewStatus::Submitted;
            review.submitted_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn record_final_upload(
        &mut self,
        submission: SubmissionId,
        file_ref: &str,
    ) -> Result<(), ReviewError> {
        let row = self.work.submission_mut(submission)?;
        row.final_file_ref = Some(file_ref.to_string());
        row.final_submitted_at = Some(Utc::now());
        Ok(())
    }

    async fn create_external_reviewer(
        &mut self,
        reviewer: &NewExternalReviewer,
    ) -> Result<ExternalReviewer, ReviewError> {
        let created = ExternalReviewer {
            id: ExternalReviewerId::new(self.work.next_id()),
            event_id: reviewer.event_id,
            name: reviewer.name.clone(),
            email: reviewer.email.clone(),
            invite_token: reviewer.invite_token.clone(),
            expires_at: reviewer.expires_at,
        };
        self.work.externals.insert(created.id, created.clone());
        Ok(created)
    }

    async fn commit(self: Box<Self>) -> Result<(), ReviewError> {
        let Self { mut guard, work } = *self;
        *guard = work;
        Ok(())
    }
}
