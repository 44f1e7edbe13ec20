//! Event and role administration handlers.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{delete, get, post};
use axum::{Json, Router};

use crate::api::dto::{AckResponse, CreateEventRequest, RoleGrantRequest};
use crate::app_state::AppState;
use crate::domain::{Event, EventId, EventMember, EventRole, ReviewerSummary, UserId};
use crate::error::{ErrorResponse, ReviewError};
use crate::service::{Actor, EventScope};

/// `POST /events` — Create an event.
///
/// # Errors
///
/// Returns [`ReviewError::Forbidden`] for non-administrators and
/// [`ReviewError::Validation`] for a bad name or date range.
#[utoipa::path(
    post,
    path = "/api/v1/events",
    tag = "Events",
    summary = "Create an event",
    description = "Creates a conference event. Global administrators only.",
    request_body = CreateEventRequest,
    responses(
        (status = 201, description = "Event created", body = Event),
        (status = 400, description = "Invalid name or dates", body = ErrorResponse),
        (status = 403, description = "Caller is not an administrator", body = ErrorResponse),
    )
)]
pub async fn create_event(
    State(state): State<AppState>,
    actor: Actor,
    Json(req): Json<CreateEventRequest>,
) -> Result<impl IntoResponse, ReviewError> {
    let event = state.events.create_event(actor, req.into()).await?;
    Ok((StatusCode::CREATED, Json(event)))
}

/// `GET /events` — List events.
///
/// # Errors
///
/// Returns [`ReviewError::Unauthorized`] without an acting user.
#[utoipa::path(
    get,
    path = "/api/v1/events",
    tag = "Events",
    summary = "List events",
    responses(
        (status = 200, description = "All events", body = Vec<Event>),
        (status = 401, description = "No acting user", body = ErrorResponse),
    )
)]
pub async fn list_events(
    State(state): State<AppState>,
    _actor: Actor,
) -> Result<impl IntoResponse, ReviewError> {
    Ok(Json(state.events.list_events().await?))
}

/// `GET /events/{event_id}` — Get one event.
///
/// # Errors
///
/// Returns [`ReviewError::NotFound`] for an unknown event.
#[utoipa::path(
    get,
    path = "/api/v1/events/{event_id}",
    tag = "Events",
    summary = "Get event",
    params(("event_id" = i64, Path, description = "Event id")),
    responses(
        (status = 200, description = "Event", body = Event),
        (status = 404, description = "Event not found", body = ErrorResponse),
    )
)]
pub async fn get_event(
    State(state): State<AppState>,
    _actor: Actor,
    Path(event_id): Path<EventId>,
) -> Result<impl IntoResponse, ReviewError> {
    Ok(Json(state.events.get_event(event_id).await?))
}

/// `POST /events/{event_id}/register` — Register the caller as an author.
///
/// # Errors
///
/// Returns [`ReviewError::Conflict`] when already registered.
#[utoipa::path(
    post,
    path = "/api/v1/events/{event_id}/register",
    tag = "Events",
    summary = "Register as author",
    description = "Grants the calling user the author role in the event.",
    params(("event_id" = i64, Path, description = "Event id")),
    responses(
        (status = 201, description = "Registered", body = AckResponse),
        (status = 404, description = "Event not found", body = ErrorResponse),
        (status = 409, description = "Already registered", body = ErrorResponse),
    )
)]
pub async fn register(
    State(state): State<AppState>,
    actor: Actor,
    Path(event_id): Path<EventId>,
) -> Result<impl IntoResponse, ReviewError> {
    state.events.register_as_author(actor, event_id).await?;
    Ok((StatusCode::CREATED, Json(AckResponse::OK)))
}

/// `GET /events/{event_id}/members` — Everyone holding a role in the event.
///
/// # Errors
///
/// Returns [`ReviewError::Forbidden`] unless the caller chairs the event.
#[utoipa::path(
    get,
    path = "/api/v1/events/{event_id}/members",
    tag = "Events",
    summary = "List event members",
    params(("event_id" = i64, Path, description = "Event id")),
    responses(
        (status = 200, description = "Members with their roles", body = Vec<EventMember>),
        (status = 403, description = "Caller is not a chair", body = ErrorResponse),
    )
)]
pub async fn list_members(
    State(state): State<AppState>,
    actor: Actor,
    Path(event_id): Path<EventId>,
) -> Result<impl IntoResponse, ReviewError> {
    let access = state
        .gate
        .require_event_role(actor, EventScope::Event(event_id), &[EventRole::Chair])
        .await?;
    Ok(Json(state.events.list_event_members(&access).await?))
}

/// `GET /events/{event_id}/reviewers` — Reviewers with their load.
///
/// # Errors
///
/// Returns [`ReviewError::Forbidden`] unless the caller chairs the event.
#[utoipa::path(
    get,
    path = "/api/v1/events/{event_id}/reviewers",
    tag = "Events",
    summary = "List event reviewers",
    params(("event_id" = i64, Path, description = "Event id")),
    responses(
        (status = 200, description = "Reviewers and assignment counts", body = Vec<ReviewerSummary>),
        (status = 403, description = "Caller is not a chair", body = ErrorResponse),
    )
)]
pub async fn list_reviewers(
    State(state): State<AppState>,
    actor: Actor,
    Path(event_id): Path<EventId>,
) -> Result<impl IntoResponse, ReviewError> {
    let access = state
        .gate
        .require_event_role(actor, EventScope::Event(event_id), &[EventRole::Chair])
        .await?;
    Ok(Json(state.events.list_event_reviewers(&access).await?))
}

/// `POST /events/{event_id}/roles` — Grant a role.
///
/// # Errors
///
/// Returns [`ReviewError::Conflict`] when the grant already exists.
#[utoipa::path(
    post,
    path = "/api/v1/events/{event_id}/roles",
    tag = "Events",
    summary = "Grant a role",
    params(("event_id" = i64, Path, description = "Event id")),
    request_body = RoleGrantRequest,
    responses(
        (status = 201, description = "Role granted", body = AckResponse),
        (status = 403, description = "Caller is not a chair", body = ErrorResponse),
        (status = 404, description = "Unknown user", body = ErrorResponse),
        (status = 409, description = "Role already held", body = ErrorResponse),
    )
)]
pub async fn grant_role(
    State(state): State<AppState>,
    actor: Actor,
    Path(event_id): Path<EventId>,
    Json(req): Json<RoleGrantRequest>,
) -> Result<impl IntoResponse, ReviewError> {
    let access = state
        .gate
        .require_event_role(actor, EventScope::Event(event_id), &[EventRole::Chair])
        .await?;
    state.events.grant_role(&access, req.user_id, req.role).await?;
    Ok((StatusCode::CREATED, Json(AckResponse::OK)))
}

/// `DELETE /events/{event_id}/roles/{user_id}/{role}` — Revoke a role.
///
/// # Errors
///
/// Returns [`ReviewError::NotFound`] when the grant does not exist.
#[utoipa::path(
    delete,
    path = "/api/v1/events/{event_id}/roles/{user_id}/{role}",
    tag = "Events",
    summary = "Revoke a role",
    description = "Removes the grant. Reviews already written by the user are kept.",
    params(
        ("event_id" = i64, Path, description = "Event id"),
        ("user_id" = i64, Path, description = "User id"),
        ("role" = EventRole, Path, description = "Role to revoke"),
    ),
    responses(
        (status = 200, description = "Role revoked", body = AckResponse),
        (status = 403, description = "Caller is not a chair", body = ErrorResponse),
        (status = 404, description = "No such grant", body = ErrorResponse),
    )
)]
pub async fn revoke_role(
    State(state): State<AppState>,
    actor: Actor,
    Path((event_id, user_id, role)): Path<(EventId, UserId, EventRole)>,
) -> Result<impl IntoResponse, ReviewError> {
    let access = state
        .gate
        .require_event_role(actor, EventScope::Event(event_id), &[EventRole::Chair])
        .await?;
    state.events.revoke_role(&access, user_id, role).await?;
    Ok(Json(AckResponse::OK))
}

/// Event routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/events", post(create_event).get(list_events))
        .route("/events/{event_id}", get(get_event))
        .route("/events/{event_id}/register", post(register))
        .route("/events/{event_id}/members", get(list_members))
        .route("/events/{event_id}/reviewers", get(list_reviewers))
        .route("/events/{event_id}/roles", post(grant_role))
        .route(
            "/events/{event_id}/roles/{user_id}/{role}",
            delete(revoke_role),
        )
}
