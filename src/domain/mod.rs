//! Domain layer: identifiers, lifecycle state machine, and audit events.
//!
//! Everything here is free of I/O. The submission lifecycle lives in
//! [`status`] as a pure transition function, so every engine asks the same
//! table what a trigger does before persisting anything.

pub mod audit;
pub mod audit_bus;
pub mod decision;
pub mod ids;
pub mod metrics;
pub mod review;
pub mod role;
pub mod status;
pub mod submission;
pub mod text;

pub use audit::{AuditAction, AuditEntry, EntityType, Severity};
pub use audit_bus::{AuditBus, AuditSink};
pub use decision::{Decision, DecisionOutcome, NewDecision, QueueEntry};
pub use ids::{EventId, ExternalReviewerId, SubmissionId, UserId};
pub use metrics::{CountersSnapshot, OutcomeCounters};
pub use review::{
    AssignmentView, AuthorReview, ExternalReviewer, NewAssignment, NewExternalReviewer, Review,
    ReviewContent, ReviewStatus, ReviewerAssignment, ReviewerRef, Scores,
};
pub use role::{EventRole, RoleSet};
pub use status::{LifecycleTrigger, StatusChange, SubmissionStatus, next_status};
pub use submission::{
    AuthorEntry, Event, EventMember, NewEvent, NewSubmission, ReviewerSummary, Submission,
    SubmissionFilter, SubmissionOverview,
};
