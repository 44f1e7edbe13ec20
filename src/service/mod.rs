//! Service layer: the engines every HTTP route delegates to.
//!
//! Every mutating operation takes an [`EventAccess`] issued by the
//! [`AuthorizationGate`], re-checks the roles it needs, runs its writes in one
//! [`StoreTx`](crate::persistence::StoreTx), and emits an audit entry after
//! commit. Status changes go through [`next_status`](crate::domain::next_status)
//! only.

pub mod assignment_service;
pub mod authz;
pub mod decision_service;
pub mod event_service;
pub mod final_service;
pub mod membership;
pub mod review_service;
pub mod submission_service;

#[cfg(test)]
pub(crate) mod fixture;

pub use assignment_service::{
    AssignOutcome, AssignRequest, AssignmentService, Invitation, InviteRequest,
    RejectedReviewers, UnassignOutcome, UnassignRequest,
};
pub use authz::{Actor, AuthorizationGate, EventAccess, EventScope};
pub use decision_service::{
    DECIDER_ROLES, DecideRequest, DecisionDetail, DecisionResult, DecisionService,
};
pub use event_service::{CreateEvent, EventService};
pub use final_service::{FinalReceipt, FinalSubmissionGate};
pub use membership::{
    MembershipCheck, MembershipVerdict, PostgresMembershipCheck, StaticMembershipCheck,
};
pub use review_service::{ExternalReviewContext, ReviewInput, ReviewReceipt, ReviewService};
pub use submission_service::{SubmissionDraft, SubmissionService};

use crate::domain::{Submission, SubmissionId};
use crate::error::ReviewError;
use crate::persistence::ReviewStore;

/// Loads a submission that must belong to the event of `access`. Unknown ids
/// and other events' submissions are both `NotFound`.
pub(crate) async fn submission_in_event(
    store: &dyn ReviewStore,
    access: &EventAccess,
    id: SubmissionId,
) -> Result<Submission, ReviewError> {
    store
        .find_submission(id)
        .await?
        .filter(|s| s.event_id == access.event_id())
        .ok_or_else(|| ReviewError::NotFound(format!("submission {id}")))
}
