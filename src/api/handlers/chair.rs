//! Chair handlers: submission overview, reviewer assignment and the
//! committee view of reviews.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::dto::{AssignBody, InviteBody, ListSubmissionsQuery, UnassignBody};
use crate::app_state::AppState;
use crate::domain::{
    AssignmentView, EventId, EventRole, Review, SubmissionId, SubmissionOverview,
};
use crate::error::{ErrorResponse, ReviewError};
use crate::service::{Actor, AssignOutcome, EventAccess, EventScope, Invitation, UnassignOutcome};

async fn chair_access(
    state: &AppState,
    actor: Actor,
    event_id: EventId,
) -> Result<EventAccess, ReviewError> {
    state
        .gate
        .require_event_role(actor, EventScope::Event(event_id), &[EventRole::Chair])
        .await
}

/// `GET /events/{event_id}/chair/submissions` — Paged submission overview.
///
/// # Errors
///
/// Returns [`ReviewError::Forbidden`] unless the caller chairs the event.
#[utoipa::path(
    get,
    path = "/api/v1/events/{event_id}/chair/submissions",
    tag = "Chair",
    summary = "List submissions",
    description = "Submissions of the event, newest first, with assignment and review aggregates and the decision if any.",
    params(
        ("event_id" = i64, Path, description = "Event id"),
        ListSubmissionsQuery,
    ),
    responses(
        (status = 200, description = "One page of submissions", body = Vec<SubmissionOverview>),
        (status = 403, description = "Caller is not a chair", body = ErrorResponse),
    )
)]
pub async fn list_submissions(
    State(state): State<AppState>,
    actor: Actor,
    Path(event_id): Path<EventId>,
    Query(query): Query<ListSubmissionsQuery>,
) -> Result<impl IntoResponse, ReviewError> {
    let access = chair_access(&state, actor, event_id).await?;
    Ok(Json(
        state
            .submissions
            .list_submissions(&access, query.into())
            .await?,
    ))
}

/// `GET /events/{event_id}/chair/submissions/{submission_id}/assignments`
///
/// # Errors
///
/// Returns [`ReviewError::NotFound`] when the submission is not in the event.
#[utoipa::path(
    get,
    path = "/api/v1/events/{event_id}/chair/submissions/{submission_id}/assignments",
    tag = "Chair",
    summary = "List assignments",
    params(
        ("event_id" = i64, Path, description = "Event id"),
        ("submission_id" = i64, Path, description = "Submission id"),
    ),
    responses(
        (status = 200, description = "Assignments with review status", body = Vec<AssignmentView>),
        (status = 404, description = "Submission not in event", body = ErrorResponse),
    )
)]
pub async fn list_assignments(
    State(state): State<AppState>,
    actor: Actor,
    Path((event_id, submission_id)): Path<(EventId, SubmissionId)>,
) -> Result<impl IntoResponse, ReviewError> {
    let access = chair_access(&state, actor, event_id).await?;
    Ok(Json(
        state
            .submissions
            .list_assignments(&access, submission_id)
            .await?,
    ))
}

/// `POST /events/{event_id}/chair/submissions/{submission_id}/assign`
///
/// # Errors
///
/// - [`ReviewError::Validation`] for an empty reviewer list.
/// - [`ReviewError::Conflict`] after a decision unless `force` is set.
#[utoipa::path(
    post,
    path = "/api/v1/events/{event_id}/chair/submissions/{submission_id}/assign",
    tag = "Chair",
    summary = "Assign reviewers",
    description = "Assigns every candidate holding the reviewer role who is not the author. Repeated assignment is idempotent.",
    params(
        ("event_id" = i64, Path, description = "Event id"),
        ("submission_id" = i64, Path, description = "Submission id"),
    ),
    request_body = AssignBody,
    responses(
        (status = 200, description = "Accepted and rejected candidates", body = AssignOutcome),
        (status = 400, description = "Empty reviewer list", body = ErrorResponse),
        (status = 409, description = "Submission already decided", body = ErrorResponse),
    )
)]
pub async fn assign(
    State(state): State<AppState>,
    actor: Actor,
    Path((event_id, submission_id)): Path<(EventId, SubmissionId)>,
    Json(body): Json<AssignBody>,
) -> Result<impl IntoResponse, ReviewError> {
    let access = chair_access(&state, actor, event_id).await?;
    let outcome = state
        .assignments
        .assign(&access, body.into_request(submission_id))
        .await?;
    Ok(Json(outcome))
}

/// `POST /events/{event_id}/chair/submissions/{submission_id}/unassign`
///
/// # Errors
///
/// Returns [`ReviewError::Conflict`] when a targeted reviewer already
/// submitted and `force` is not set.
#[utoipa::path(
    post,
    path = "/api/v1/events/{event_id}/chair/submissions/{submission_id}/unassign",
    tag = "Chair",
    summary = "Unassign reviewers",
    params(
        ("event_id" = i64, Path, description = "Event id"),
        ("submission_id" = i64, Path, description = "Submission id"),
    ),
    request_body = UnassignBody,
    responses(
        (status = 200, description = "Removed reviewers", body = UnassignOutcome),
        (status = 409, description = "Reviews already submitted", body = ErrorResponse),
    )
)]
pub async fn unassign(
    State(state): State<AppState>,
    actor: Actor,
    Path((event_id, submission_id)): Path<(EventId, SubmissionId)>,
    Json(body): Json<UnassignBody>,
) -> Result<impl IntoResponse, ReviewError> {
    let access = chair_access(&state, actor, event_id).await?;
    let outcome = state
        .assignments
        .unassign(&access, body.into_request(submission_id))
        .await?;
    Ok(Json(outcome))
}

/// `POST /events/{event_id}/chair/submissions/{submission_id}/external-invite`
///
/// # Errors
///
/// Returns [`ReviewError::Validation`] for a missing name or bad email.
#[utoipa::path(
    post,
    path = "/api/v1/events/{event_id}/chair/submissions/{submission_id}/external-invite",
    tag = "Chair",
    summary = "Invite an external reviewer",
    description = "Creates a time-limited invitation token for a reviewer without an account.",
    params(
        ("event_id" = i64, Path, description = "Event id"),
        ("submission_id" = i64, Path, description = "Submission id"),
    ),
    request_body = InviteBody,
    responses(
        (status = 201, description = "Invitation created", body = Invitation),
        (status = 400, description = "Invalid name or email", body = ErrorResponse),
        (status = 409, description = "Submission already decided", body = ErrorResponse),
    )
)]
pub async fn invite_external(
    State(state): State<AppState>,
    actor: Actor,
    Path((event_id, submission_id)): Path<(EventId, SubmissionId)>,
    Json(body): Json<InviteBody>,
) -> Result<impl IntoResponse, ReviewError> {
    let access = chair_access(&state, actor, event_id).await?;
    let invitation = state
        .assignments
        .invite_external_reviewer(&access, body.into_request(submission_id))
        .await?;
    Ok((StatusCode::CREATED, Json(invitation)))
}

/// `GET /events/{event_id}/chair/submissions/{submission_id}/reviews`
///
/// # Errors
///
/// Returns [`ReviewError::NotFound`] when the submission is not in the event.
#[utoipa::path(
    get,
    path = "/api/v1/events/{event_id}/chair/submissions/{submission_id}/reviews",
    tag = "Chair",
    summary = "Committee view of reviews",
    params(
        ("event_id" = i64, Path, description = "Event id"),
        ("submission_id" = i64, Path, description = "Submission id"),
    ),
    responses(
        (status = 200, description = "All reviews with reviewer identity", body = Vec<Review>),
        (status = 404, description = "Submission not in event", body = ErrorResponse),
    )
)]
pub async fn reviews(
    State(state): State<AppState>,
    actor: Actor,
    Path((event_id, submission_id)): Path<(EventId, SubmissionId)>,
) -> Result<impl IntoResponse, ReviewError> {
    let access = chair_access(&state, actor, event_id).await?;
    Ok(Json(
        state
            .reviews
            .reviews_for_chair(&access, submission_id)
            .await?,
    ))
}

/// Chair routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/events/{event_id}/chair/submissions", get(list_submissions))
        .route(
            "/events/{event_id}/chair/submissions/{submission_id}/assignments",
            get(list_assignments),
        )
        .route(
            "/events/{event_id}/chair/submissions/{submission_id}/assign",
            post(assign),
        )
        .route(
            "/events/{event_id}/chair/submissions/{submission_id}/unassign",
            post(unassign),
        )
        .route(
            "/events/{event_id}/chair/submissions/{submission_id}/external-invite",
            post(invite_external),
        )
        .route(
            "/events/{event_id}/chair/submissions/{submission_id}/reviews",
            get(reviews),
        )
}
