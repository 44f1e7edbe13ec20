//! Review error types with HTTP status code mapping.
//!
//! [`ReviewError`] is the single error type every engine returns. Each
//! variant maps to an HTTP status and a structured JSON error body; conflict
//! variants carry enough typed context for the caller to decide whether to
//! retry with `force`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::{Value, json};
use utoipa::ToSchema;

use crate::domain::review::ScoreOutOfRange;
use crate::domain::status::{InvalidTransition, SubmissionStatus};
use crate::domain::{Decision, UserId};

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 2102,
///     "message": "insufficient reviews: have 1, want 3",
///     "details": { "have": 1, "want": 3 }
///   }
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Numeric error code.
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Machine-readable context.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub details: Option<Value>,
}

/// Why a request conflicts with current state.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConflictKind {
    /// A decision row already exists. Carries the winning decision.
    #[error("submission already decided: {}", .0.decision)]
    AlreadyDecided(Decision),

    /// Quorum not met.
    #[error("insufficient reviews: have {have}, want {want}")]
    InsufficientReviews {
        /// Submitted reviews present.
        have: i64,
        /// Quorum requested.
        want: i64,
    },

    /// Targeted reviewers already submitted their review.
    #[error("reviews already submitted by {} reviewer(s)", .0.len())]
    ReviewsAlreadySubmitted(Vec<UserId>),

    /// The lifecycle has no edge for this trigger.
    #[error("transition {trigger} not allowed from status {from}")]
    InvalidTransition {
        /// Current status.
        from: SubmissionStatus,
        /// Rejected trigger name.
        trigger: &'static str,
    },

    /// A unique row already exists.
    #[error("{0} already exists")]
    AlreadyExists(String),
}

/// Server-side error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category          | HTTP Status               |
/// |-----------|-------------------|---------------------------|
/// | 1000–1999 | Validation        | 400 Bad Request           |
/// | 2000–2099 | Not found         | 404 Not Found             |
/// | 2100–2199 | Conflict          | 409 Conflict              |
/// | 3000–3999 | Server            | 500 Internal Server Error |
/// | 4000–4999 | Identity / access | 401 / 403                 |
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ReviewError {
    /// Malformed input.
    #[error("invalid {field}: {message}")]
    Validation {
        /// Offending field.
        field: &'static str,
        /// What is wrong with it.
        message: String,
    },

    /// Entity missing, or not part of the addressed event.
    #[error("{0} not found")]
    NotFound(String),

    /// No acting identity on the request.
    #[error("authentication required")]
    Unauthorized,

    /// Role or ownership check failed.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Request conflicts with current state.
    #[error(transparent)]
    Conflict(ConflictKind),

    /// Database failure. Detail is logged, never returned.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Anything else that is the server's fault.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ReviewError {
    /// Shorthand for [`ReviewError::Validation`].
    #[must_use]
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::Validation { .. } => 1001,
            Self::NotFound(_) => 2001,
            Self::Conflict(kind) => match kind {
                ConflictKind::AlreadyDecided(_) => 2101,
                ConflictKind::InsufficientReviews { .. } => 2102,
                ConflictKind::ReviewsAlreadySubmitted(_) => 2103,
                ConflictKind::InvalidTransition { .. } => 2104,
                ConflictKind::AlreadyExists(_) => 2105,
            },
            Self::Internal(_) => 3000,
            Self::Persistence(_) => 3001,
            Self::Unauthorized => 4001,
            Self::Forbidden(_) => 4003,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation { .. } => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Persistence(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// `true` for failures that are the server's fault.
    #[must_use]
    pub const fn is_server_error(&self) -> bool {
        matches!(self, Self::Persistence(_) | Self::Internal(_))
    }

    /// Machine-readable context for the response body.
    #[must_use]
    pub fn details(&self) -> Option<Value> {
        match self {
            Self::Validation { field, .. } => Some(json!({ "field": field })),
            Self::Conflict(ConflictKind::AlreadyDecided(existing)) => {
                Some(json!({ "existing": existing }))
            }
            Self::Conflict(ConflictKind::InsufficientReviews { have, want }) => {
                Some(json!({ "have": have, "want": want }))
            }
            Self::Conflict(ConflictKind::ReviewsAlreadySubmitted(ids)) => {
                Some(json!({ "reviewer_ids": ids }))
            }
            Self::Conflict(ConflictKind::InvalidTransition { from, trigger }) => {
                Some(json!({ "from": from, "trigger": trigger }))
            }
            _ => None,
        }
    }
}

impl From<InvalidTransition> for ReviewError {
    fn from(err: InvalidTransition) -> Self {
        Self::Conflict(ConflictKind::InvalidTransition {
            from: err.from,
            trigger: err.trigger,
        })
    }
}

impl From<ScoreOutOfRange> for ReviewError {
    fn from(err: ScoreOutOfRange) -> Self {
        Self::Validation {
            field: err.field,
            message: err.to_string(),
        }
    }
}

impl From<sqlx::Error> for ReviewError {
    fn from(err: sqlx::Error) -> Self {
        Self::Persistence(err.to_string())
    }
}

impl IntoResponse for ReviewError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = if self.is_server_error() {
            tracing::error!(error = %self, "request failed");
            "internal server error".to_string()
        } else {
            self.to_string()
        };
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message,
                details: self.details(),
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}

#[cfg(test)]
#[allow(clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::domain::{DecisionOutcome, SubmissionId};
    use chrono::Utc;

    #[test]
    fn status_codes_follow_taxonomy() {
        assert_eq!(
            ReviewError::validation("title", "empty").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ReviewError::NotFound("submission".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ReviewError::Forbidden("not assigned".into()).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(ReviewError::Unauthorized.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            ReviewError::Conflict(ConflictKind::AlreadyExists("role".into())).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ReviewError::Persistence("boom".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn insufficient_reviews_carries_counts() {
        let err = ReviewError::Conflict(ConflictKind::InsufficientReviews { have: 1, want: 3 });
        assert_eq!(err.error_code(), 2102);
        assert_eq!(err.details(), Some(json!({ "have": 1, "want": 3 })));
        assert_eq!(err.to_string(), "insufficient reviews: have 1, want 3");
    }

    #[test]
    fn already_decided_carries_existing_decision() {
        let existing = Decision {
            submission_id: SubmissionId::new(5),
            decision: DecisionOutcome::Accept,
            reason: None,
            decider_user_id: UserId::new(2),
            decided_at: Utc::now(),
        };
        let err = ReviewError::Conflict(ConflictKind::AlreadyDecided(existing));
        let details = err.details().unwrap_or_default();
        assert_eq!(details["existing"]["decision"], "accept");
    }

    #[test]
    fn invalid_transition_converts_to_conflict() {
        let err: ReviewError = InvalidTransition {
            from: SubmissionStatus::DecisionMade,
            trigger: "final_uploaded",
        }
        .into();
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        assert_eq!(err.error_code(), 2104);
    }

    #[test]
    fn server_errors_hide_detail() {
        let response = ReviewError::Persistence("password auth failed".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
