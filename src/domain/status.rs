//! Submission lifecycle state machine.
//!
//! ```text
//!              first assignment              accept
//!  submitted ───────────────────► under_review ─────► final_required ──► final_submitted
//!      ▲  │                          │                      ▲   (final upload)
//!      │  │ accept / reject          │ reject               │
//!      │  └──────────────────────────┼──────────────────────┘
//!      │                             ▼
//!      └── all assignments   decision_made
//!          and submitted
//!          reviews removed
//! ```
//!
//! Engines never write a status directly. They describe what happened as a
//! [`LifecycleTrigger`], ask [`next_status`] for the outcome and persist
//! whatever it returns. A trigger that has no edge from the current state is
//! an error, never a silent no-op.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::decision::DecisionOutcome;

/// Lifecycle state of a submission. Stored in `submissions.status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    /// Received, no reviewer assigned yet.
    Submitted,
    /// At least one reviewer assignment exists.
    UnderReview,
    /// Rejected. Terminal.
    DecisionMade,
    /// Accepted, waiting for the camera-ready upload.
    FinalRequired,
    /// Camera-ready uploaded. Terminal.
    FinalSubmitted,
}

impl SubmissionStatus {
    /// Database / wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Submitted => "submitted",
            Self::UnderReview => "under_review",
            Self::DecisionMade => "decision_made",
            Self::FinalRequired => "final_required",
            Self::FinalSubmitted => "final_submitted",
        }
    }

    /// `true` while the submission still waits for a decision.
    #[must_use]
    pub const fn is_undecided(self) -> bool {
        matches!(self, Self::Submitted | Self::UnderReview)
    }
}

impl fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a stored status string is not one of the fixed states.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown submission status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for SubmissionStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "submitted" => Ok(Self::Submitted),
            "under_review" => Ok(Self::UnderReview),
            "decision_made" => Ok(Self::DecisionMade),
            "final_required" => Ok(Self::FinalRequired),
            "final_submitted" => Ok(Self::FinalSubmitted),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// Something that happened to a submission, together with the guard data
/// the transition table needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleTrigger {
    /// Reviewers were (re)assigned. Carries the assignment count after the write.
    ReviewersAssigned {
        /// Assignment rows now linked to the submission.
        assignments: i64,
    },
    /// Reviewers were unassigned. Carries the counts left after the delete.
    ReviewersRemoved {
        /// Assignment rows still linked to the submission.
        assignments: i64,
        /// Reviews in `submitted` state still linked to the submission.
        submitted_reviews: i64,
    },
    /// A decision row was written.
    Decided(DecisionOutcome),
    /// A camera-ready file was stored.
    FinalUploaded,
}

impl LifecycleTrigger {
    /// Short name used in conflict messages and audit details.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::ReviewersAssigned { .. } => "reviewers_assigned",
            Self::ReviewersRemoved { .. } => "reviewers_removed",
            Self::Decided(DecisionOutcome::Accept) => "decided_accept",
            Self::Decided(DecisionOutcome::Reject) => "decided_reject",
            Self::FinalUploaded => "final_uploaded",
        }
    }
}

/// Outcome of applying a trigger to a status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusChange {
    /// Persist the new status.
    To(SubmissionStatus),
    /// The trigger is valid here but its guard keeps the status as is.
    Unchanged,
}

impl StatusChange {
    /// Resolves the change against the status it was computed from.
    #[must_use]
    pub const fn resolve(self, current: SubmissionStatus) -> SubmissionStatus {
        match self {
            Self::To(next) => next,
            Self::Unchanged => current,
        }
    }
}

/// A trigger with no edge from the current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("transition {trigger} not allowed from status {from}")]
pub struct InvalidTransition {
    /// Status the submission was in.
    pub from: SubmissionStatus,
    /// Name of the rejected trigger.
    pub trigger: &'static str,
}

/// Transition table for the submission lifecycle.
///
/// Assignment bookkeeping is valid in every state (forced reassignment after
/// a decision is allowed) but only moves the status on the two edges between
/// `submitted` and `under_review`. Decisions and final uploads have exactly
/// one source set each.
///
/// # Errors
///
/// Returns [`InvalidTransition`] when the trigger has no edge from `current`.
pub fn next_status(
    current: SubmissionStatus,
    trigger: LifecycleTrigger,
) -> Result<StatusChange, InvalidTransition> {
    use SubmissionStatus as S;

    match (current, trigger) {
        (S::Submitted, LifecycleTrigger::ReviewersAssigned { assignments }) if assignments > 0 => {
            Ok(StatusChange::To(S::UnderReview))
        }
        (_, LifecycleTrigger::ReviewersAssigned { .. }) => Ok(StatusChange::Unchanged),

        (
            S::UnderReview,
            LifecycleTrigger::ReviewersRemoved {
                assignments: 0,
                submitted_reviews: 0,
            },
        ) => Ok(StatusChange::To(S::Submitted)),
        (_, LifecycleTrigger::ReviewersRemoved { .. }) => Ok(StatusChange::Unchanged),

        (S::Submitted | S::UnderReview, LifecycleTrigger::Decided(DecisionOutcome::Accept)) => {
            Ok(StatusChange::To(S::FinalRequired))
        }
        (S::Submitted | S::UnderReview, LifecycleTrigger::Decided(DecisionOutcome::Reject)) => {
            Ok(StatusChange::To(S::DecisionMade))
        }

        (S::FinalRequired, LifecycleTrigger::FinalUploaded) => {
            Ok(StatusChange::To(S::FinalSubmitted))
        }

        (from, trigger) => Err(InvalidTransition {
            from,
            trigger: trigger.name(),
        }),
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    const ALL: [SubmissionStatus; 5] = [
        SubmissionStatus::Submitted,
        SubmissionStatus::UnderReview,
        SubmissionStatus::DecisionMade,
        SubmissionStatus::FinalRequired,
        SubmissionStatus::FinalSubmitted,
    ];

    #[test]
    fn first_assignment_moves_to_under_review() {
        let change = next_status(
            SubmissionStatus::Submitted,
            LifecycleTrigger::ReviewersAssigned { assignments: 1 },
        );
        assert_eq!(change, Ok(StatusChange::To(SubmissionStatus::UnderReview)));
    }

    #[test]
    fn assignment_without_rows_keeps_submitted() {
        let change = next_status(
            SubmissionStatus::Submitted,
            LifecycleTrigger::ReviewersAssigned { assignments: 0 },
        );
        assert_eq!(change, Ok(StatusChange::Unchanged));
    }

    #[test]
    fn assignment_never_moves_decided_submissions() {
        for status in [
            SubmissionStatus::UnderReview,
            SubmissionStatus::DecisionMade,
            SubmissionStatus::FinalRequired,
            SubmissionStatus::FinalSubmitted,
        ] {
            let change = next_status(status, LifecycleTrigger::ReviewersAssigned { assignments: 3 });
            assert_eq!(change, Ok(StatusChange::Unchanged), "from {status}");
        }
    }

    #[test]
    fn removal_reverts_only_when_nothing_is_left() {
        let cleared = LifecycleTrigger::ReviewersRemoved {
            assignments: 0,
            submitted_reviews: 0,
        };
        assert_eq!(
            next_status(SubmissionStatus::UnderReview, cleared),
            Ok(StatusChange::To(SubmissionStatus::Submitted))
        );

        let with_review = LifecycleTrigger::ReviewersRemoved {
            assignments: 0,
            submitted_reviews: 1,
        };
        assert_eq!(
            next_status(SubmissionStatus::UnderReview, with_review),
            Ok(StatusChange::Unchanged)
        );

        let with_assignment = LifecycleTrigger::ReviewersRemoved {
            assignments: 1,
            submitted_reviews: 0,
        };
        assert_eq!(
            next_status(SubmissionStatus::UnderReview, with_assignment),
            Ok(StatusChange::Unchanged)
        );
    }

    #[test]
    fn removal_does_not_reopen_decided_submissions() {
        let cleared = LifecycleTrigger::ReviewersRemoved {
            assignments: 0,
            submitted_reviews: 0,
        };
        for status in [
            SubmissionStatus::DecisionMade,
            SubmissionStatus::FinalRequired,
            SubmissionStatus::FinalSubmitted,
        ] {
            assert_eq!(next_status(status, cleared), Ok(StatusChange::Unchanged));
        }
    }

    #[test]
    fn decisions_apply_before_or_during_review() {
        for from in [SubmissionStatus::Submitted, SubmissionStatus::UnderReview] {
            assert_eq!(
                next_status(from, LifecycleTrigger::Decided(DecisionOutcome::Accept)),
                Ok(StatusChange::To(SubmissionStatus::FinalRequired))
            );
            assert_eq!(
                next_status(from, LifecycleTrigger::Decided(DecisionOutcome::Reject)),
                Ok(StatusChange::To(SubmissionStatus::DecisionMade))
            );
        }
    }

    #[test]
    fn second_decision_is_rejected() {
        for from in [
            SubmissionStatus::DecisionMade,
            SubmissionStatus::FinalRequired,
            SubmissionStatus::FinalSubmitted,
        ] {
            let Err(err) = next_status(from, LifecycleTrigger::Decided(DecisionOutcome::Reject))
            else {
                panic!("decision from {from} must fail");
            };
            assert_eq!(err.from, from);
            assert_eq!(err.trigger, "decided_reject");
        }
    }

    #[test]
    fn final_upload_only_from_final_required() {
        for from in ALL {
            let result = next_status(from, LifecycleTrigger::FinalUploaded);
            if from == SubmissionStatus::FinalRequired {
                assert_eq!(result, Ok(StatusChange::To(SubmissionStatus::FinalSubmitted)));
            } else {
                assert!(result.is_err(), "final upload from {from} must fail");
            }
        }
    }

    #[test]
    fn status_strings_round_trip() {
        for status in ALL {
            assert_eq!(status.as_str().parse::<SubmissionStatus>(), Ok(status));
        }
        assert!("approved".parse::<SubmissionStatus>().is_err());
    }

    #[test]
    fn unchanged_resolves_to_current() {
        assert_eq!(
            StatusChange::Unchanged.resolve(SubmissionStatus::UnderReview),
            SubmissionStatus::UnderReview
        );
    }
}
