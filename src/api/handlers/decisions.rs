//! Decision queue and decision handlers.

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::api::dto::{DecideBody, QueueQuery};
use crate::app_state::AppState;
use crate::domain::{EventId, QueueEntry, SubmissionId};
use crate::error::{ErrorResponse, ReviewError};
use crate::service::{Actor, DECIDER_ROLES, DecisionDetail, DecisionResult, EventScope};

/// `GET /events/{event_id}/decisions/queue` — Submissions ready for a verdict.
///
/// # Errors
///
/// Returns [`ReviewError::Forbidden`] unless the caller chairs the event or
/// holds the decision maker role.
#[utoipa::path(
    get,
    path = "/api/v1/events/{event_id}/decisions/queue",
    tag = "Decisions",
    summary = "Decision queue",
    description = "Undecided submissions with at least `min_reviews` submitted reviews, oldest first.",
    params(
        ("event_id" = i64, Path, description = "Event id"),
        QueueQuery,
    ),
    responses(
        (status = 200, description = "Queue entries", body = Vec<QueueEntry>),
        (status = 403, description = "Caller is neither chair nor decision maker", body = ErrorResponse),
    )
)]
pub async fn queue(
    State(state): State<AppState>,
    actor: Actor,
    Path(event_id): Path<EventId>,
    Query(query): Query<QueueQuery>,
) -> Result<impl IntoResponse, ReviewError> {
    let access = state
        .gate
        .require_event_role(actor, EventScope::Event(event_id), &DECIDER_ROLES)
        .await?;
    Ok(Json(
        state
            .decisions
            .list_queue(&access, query.min_reviews)
            .await?,
    ))
}

/// `GET /events/{event_id}/decisions/{submission_id}` — Decision context.
///
/// # Errors
///
/// Returns [`ReviewError::NotFound`] when the submission is not in the event.
#[utoipa::path(
    get,
    path = "/api/v1/events/{event_id}/decisions/{submission_id}",
    tag = "Decisions",
    summary = "Decision detail",
    params(
        ("event_id" = i64, Path, description = "Event id"),
        ("submission_id" = i64, Path, description = "Submission id"),
    ),
    responses(
        (status = 200, description = "Submission, submitted reviews and existing decision", body = DecisionDetail),
        (status = 404, description = "Submission not in event", body = ErrorResponse),
    )
)]
pub async fn detail(
    State(state): State<AppState>,
    actor: Actor,
    Path((event_id, submission_id)): Path<(EventId, SubmissionId)>,
) -> Result<impl IntoResponse, ReviewError> {
    let access = state
        .gate
        .require_event_role(actor, EventScope::Event(event_id), &DECIDER_ROLES)
        .await?;
    Ok(Json(
        state
            .decisions
            .decision_detail(&access, submission_id)
            .await?,
    ))
}

/// `POST /events/{event_id}/decisions/{submission_id}` — Accept or reject.
///
/// # Errors
///
/// - [`ReviewError::Conflict`] when already decided (the body carries the
///   existing decision) or the quorum is not met.
/// - [`ReviewError::Forbidden`] for `force` from a non-administrator.
#[utoipa::path(
    post,
    path = "/api/v1/events/{event_id}/decisions/{submission_id}",
    tag = "Decisions",
    summary = "Decide a submission",
    description = "Records the single decision of a submission. Accept moves it to `final_required`, reject to `rejected`.",
    params(
        ("event_id" = i64, Path, description = "Event id"),
        ("submission_id" = i64, Path, description = "Submission id"),
    ),
    request_body = DecideBody,
    responses(
        (status = 200, description = "Decision recorded", body = DecisionResult),
        (status = 403, description = "Not a decider, or force without admin", body = ErrorResponse),
        (status = 409, description = "Already decided or not enough reviews", body = ErrorResponse),
    )
)]
pub async fn decide(
    State(state): State<AppState>,
    actor: Actor,
    Path((event_id, submission_id)): Path<(EventId, SubmissionId)>,
    Json(body): Json<DecideBody>,
) -> Result<impl IntoResponse, ReviewError> {
    let access = state
        .gate
        .require_event_role(actor, EventScope::Event(event_id), &DECIDER_ROLES)
        .await?;
    let result = state
        .decisions
        .decide(&access, body.into_request(submission_id))
        .await?;
    Ok(Json(result))
}

/// Decision routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/events/{event_id}/decisions/queue", get(queue))
        .route(
            "/events/{event_id}/decisions/{submission_id}",
            get(detail).post(decide),
        )
}
