//! Reviewer handlers: own queue and review submission.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::dto::ReviewBody;
use crate::app_state::AppState;
use crate::domain::{EventId, EventRole, ReviewerAssignment, SubmissionId};
use crate::error::{ErrorResponse, ReviewError};
use crate::service::{Actor, EventScope, ReviewReceipt};

/// `GET /events/{event_id}/reviewer/assignments` — The caller's queue.
///
/// # Errors
///
/// Returns [`ReviewError::Forbidden`] without the reviewer role.
#[utoipa::path(
    get,
    path = "/api/v1/events/{event_id}/reviewer/assignments",
    tag = "Reviews",
    summary = "List own assignments",
    params(("event_id" = i64, Path, description = "Event id")),
    responses(
        (status = 200, description = "Assigned submissions with review status", body = Vec<ReviewerAssignment>),
        (status = 403, description = "Caller is not a reviewer", body = ErrorResponse),
    )
)]
pub async fn assignments(
    State(state): State<AppState>,
    actor: Actor,
    Path(event_id): Path<EventId>,
) -> Result<impl IntoResponse, ReviewError> {
    let access = state
        .gate
        .require_event_role(actor, EventScope::Event(event_id), &[EventRole::Reviewer])
        .await?;
    Ok(Json(
        state.submissions.list_reviewer_assignments(&access).await?,
    ))
}

/// `POST /events/{event_id}/reviewer/submissions/{submission_id}/review`
///
/// # Errors
///
/// - [`ReviewError::Validation`] for a score outside 1..=5.
/// - [`ReviewError::Forbidden`] when the caller is not assigned.
#[utoipa::path(
    post,
    path = "/api/v1/events/{event_id}/reviewer/submissions/{submission_id}/review",
    tag = "Reviews",
    summary = "Submit a review",
    description = "Stores the caller's scores and comments. Resubmitting overwrites the previous review.",
    params(
        ("event_id" = i64, Path, description = "Event id"),
        ("submission_id" = i64, Path, description = "Submission id"),
    ),
    request_body = ReviewBody,
    responses(
        (status = 200, description = "Review stored", body = ReviewReceipt),
        (status = 400, description = "Score out of range", body = ErrorResponse),
        (status = 403, description = "Caller is not assigned", body = ErrorResponse),
    )
)]
pub async fn submit_review(
    State(state): State<AppState>,
    actor: Actor,
    Path((event_id, submission_id)): Path<(EventId, SubmissionId)>,
    Json(body): Json<ReviewBody>,
) -> Result<impl IntoResponse, ReviewError> {
    let access = state
        .gate
        .require_event_role(actor, EventScope::Event(event_id), &[EventRole::Reviewer])
        .await?;
    let receipt = state
        .reviews
        .submit_review(&access, submission_id, body.into())
        .await?;
    Ok(Json(receipt))
}

/// `POST /submissions/{submission_id}/review` — Same as the event-scoped
/// route, with the event resolved from the submission.
///
/// Unknown submissions and submissions outside the caller's events answer
/// like an existing one the caller is not assigned to.
///
/// # Errors
///
/// Returns [`ReviewError::Forbidden`] unless the caller is assigned.
#[utoipa::path(
    post,
    path = "/api/v1/submissions/{submission_id}/review",
    tag = "Reviews",
    summary = "Submit a review by submission id",
    params(("submission_id" = i64, Path, description = "Submission id")),
    request_body = ReviewBody,
    responses(
        (status = 200, description = "Review stored", body = ReviewReceipt),
        (status = 400, description = "Score out of range", body = ErrorResponse),
        (status = 403, description = "Caller is not assigned", body = ErrorResponse),
    )
)]
pub async fn submit_review_by_submission(
    State(state): State<AppState>,
    actor: Actor,
    Path(submission_id): Path<SubmissionId>,
    Json(body): Json<ReviewBody>,
) -> Result<impl IntoResponse, ReviewError> {
    let access = state
        .gate
        .require_event_role(
            actor,
            EventScope::Submission(submission_id),
            &[EventRole::Reviewer],
        )
        .await
        .map_err(|e| match e {
            ReviewError::NotFound(_) | ReviewError::Forbidden(_) => not_assigned(),
            other => other,
        })?;
    let receipt = state
        .reviews
        .submit_review(&access, submission_id, body.into())
        .await?;
    Ok(Json(receipt))
}

fn not_assigned() -> ReviewError {
    ReviewError::Forbidden("not assigned".into())
}

/// Reviewer routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/events/{event_id}/reviewer/assignments", get(assignments))
        .route(
            "/events/{event_id}/reviewer/submissions/{submission_id}/review",
            post(submit_review),
        )
        .route(
            "/submissions/{submission_id}/review",
            post(submit_review_by_submission),
        )
}
