//! Author-facing submission handlers: intake, own listings, review
//! feedback, and the camera-ready upload.

use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::dto::{FinalUploadForm, SubmissionUploadForm};
use crate::api::multipart::read_upload_form;
use crate::app_state::AppState;
use crate::domain::{AuthorEntry, AuthorReview, EventId, EventRole, Submission, SubmissionId};
use crate::error::{ErrorResponse, ReviewError};
use crate::service::{Actor, EventScope, FinalReceipt, SubmissionDraft};

/// `POST /events/{event_id}/submissions` — Submit a paper.
///
/// # Errors
///
/// Returns [`ReviewError::Validation`] for a missing title, malformed author
/// list, or a missing, oversized or non-PDF file.
#[utoipa::path(
    post,
    path = "/api/v1/events/{event_id}/submissions",
    tag = "Submissions",
    summary = "Submit a paper",
    description = "Multipart upload of the paper PDF plus its metadata. The caller must hold the author role in the event.",
    params(("event_id" = i64, Path, description = "Event id")),
    request_body(content = SubmissionUploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Submission stored", body = Submission),
        (status = 400, description = "Invalid form", body = ErrorResponse),
        (status = 403, description = "Caller is not an author in the event", body = ErrorResponse),
    )
)]
pub async fn create_submission(
    State(state): State<AppState>,
    actor: Actor,
    Path(event_id): Path<EventId>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ReviewError> {
    let access = state
        .gate
        .require_event_role(actor, EventScope::Event(event_id), &[EventRole::Author])
        .await?;
    let mut form = read_upload_form(&mut multipart, state.max_upload_bytes).await?;
    let title = form
        .text("title")
        .ok_or_else(|| ReviewError::validation("title", "title is required"))?;
    let authors = match form.text("authors") {
        Some(raw) => serde_json::from_str::<Vec<AuthorEntry>>(&raw)
            .map_err(|e| ReviewError::validation("authors", e.to_string()))?,
        None => Vec::new(),
    };
    let pdf = form.require_pdf()?;
    let file_ref = state.files.store_pdf(&pdf).await?;

    let submission = state
        .submissions
        .create_submission(
            &access,
            SubmissionDraft {
                title,
                abstract_text: form.text("abstract_text"),
                keywords: form.text("keywords"),
                authors,
                file_ref,
                membership_email: form.text("membership_email"),
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(submission)))
}

/// `GET /events/{event_id}/submissions/mine` — The caller's submissions.
///
/// # Errors
///
/// Returns [`ReviewError::Forbidden`] without the author role.
#[utoipa::path(
    get,
    path = "/api/v1/events/{event_id}/submissions/mine",
    tag = "Submissions",
    summary = "List own submissions",
    params(("event_id" = i64, Path, description = "Event id")),
    responses(
        (status = 200, description = "Own submissions, newest first", body = Vec<Submission>),
        (status = 403, description = "Caller is not an author in the event", body = ErrorResponse),
    )
)]
pub async fn list_mine(
    State(state): State<AppState>,
    actor: Actor,
    Path(event_id): Path<EventId>,
) -> Result<impl IntoResponse, ReviewError> {
    let access = state
        .gate
        .require_event_role(actor, EventScope::Event(event_id), &[EventRole::Author])
        .await?;
    Ok(Json(state.submissions.list_my_submissions(&access).await?))
}

/// `GET /events/{event_id}/submissions/mine/{submission_id}` — One own submission.
///
/// # Errors
///
/// Returns [`ReviewError::NotFound`] for submissions of other users.
#[utoipa::path(
    get,
    path = "/api/v1/events/{event_id}/submissions/mine/{submission_id}",
    tag = "Submissions",
    summary = "Get own submission",
    params(
        ("event_id" = i64, Path, description = "Event id"),
        ("submission_id" = i64, Path, description = "Submission id"),
    ),
    responses(
        (status = 200, description = "Submission", body = Submission),
        (status = 404, description = "Not one of the caller's submissions", body = ErrorResponse),
    )
)]
pub async fn get_mine(
    State(state): State<AppState>,
    actor: Actor,
    Path((event_id, submission_id)): Path<(EventId, SubmissionId)>,
) -> Result<impl IntoResponse, ReviewError> {
    let access = state
        .gate
        .require_event_role(actor, EventScope::Event(event_id), &[EventRole::Author])
        .await?;
    Ok(Json(
        state
            .submissions
            .get_my_submission(&access, submission_id)
            .await?,
    ))
}

/// `GET /events/{event_id}/submissions/{submission_id}/reviews` — Reviews as
/// the author sees them.
///
/// # Errors
///
/// Returns [`ReviewError::Forbidden`] unless the caller wrote the submission.
#[utoipa::path(
    get,
    path = "/api/v1/events/{event_id}/submissions/{submission_id}/reviews",
    tag = "Submissions",
    summary = "Reviews of own submission",
    description = "Submitted reviews with reviewer identity and committee comments removed.",
    params(
        ("event_id" = i64, Path, description = "Event id"),
        ("submission_id" = i64, Path, description = "Submission id"),
    ),
    responses(
        (status = 200, description = "Masked reviews", body = Vec<AuthorReview>),
        (status = 403, description = "Caller is not the author", body = ErrorResponse),
        (status = 404, description = "Submission not in event", body = ErrorResponse),
    )
)]
pub async fn author_reviews(
    State(state): State<AppState>,
    actor: Actor,
    Path((event_id, submission_id)): Path<(EventId, SubmissionId)>,
) -> Result<impl IntoResponse, ReviewError> {
    let access = state
        .gate
        .require_event_role(actor, EventScope::Event(event_id), &[EventRole::Author])
        .await?;
    Ok(Json(
        state
            .reviews
            .reviews_for_author(&access, submission_id)
            .await?,
    ))
}

/// `POST /events/{event_id}/submissions/{submission_id}/final` — Upload the
/// camera-ready version.
///
/// Ownership and lifecycle are checked before any bytes are stored.
///
/// # Errors
///
/// - [`ReviewError::Forbidden`] for anyone but the author or an admin, or a
///   failed membership check.
/// - [`ReviewError::Conflict`] unless the submission is `final_required`.
#[utoipa::path(
    post,
    path = "/api/v1/events/{event_id}/submissions/{submission_id}/final",
    tag = "Submissions",
    summary = "Upload final version",
    params(
        ("event_id" = i64, Path, description = "Event id"),
        ("submission_id" = i64, Path, description = "Submission id"),
    ),
    request_body(content = FinalUploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Final version accepted", body = FinalReceipt),
        (status = 400, description = "Missing or invalid PDF", body = ErrorResponse),
        (status = 403, description = "Not the author, or membership check failed", body = ErrorResponse),
        (status = 409, description = "Submission is not awaiting its final version", body = ErrorResponse),
    )
)]
pub async fn final_upload(
    State(state): State<AppState>,
    actor: Actor,
    Path((event_id, submission_id)): Path<(EventId, SubmissionId)>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ReviewError> {
    let access = state
        .gate
        .require_event_role(actor, EventScope::Event(event_id), &[EventRole::Author])
        .await?;
    state.finals.check_upload(&access, submission_id).await?;
    let mut form = read_upload_form(&mut multipart, state.max_upload_bytes).await?;
    let pdf = form.require_pdf()?;
    let file_ref = state.files.store_pdf(&pdf).await?;
    let receipt = state
        .finals
        .final_upload(&access, submission_id, &file_ref)
        .await?;
    Ok(Json(receipt))
}

/// Author submission routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/events/{event_id}/submissions", post(create_submission))
        .route("/events/{event_id}/submissions/mine", get(list_mine))
        .route(
            "/events/{event_id}/submissions/mine/{submission_id}",
            get(get_mine),
        )
        .route(
            "/events/{event_id}/submissions/{submission_id}/reviews",
            get(author_reviews),
        )
        .route(
            "/events/{event_id}/submissions/{submission_id}/final",
            post(final_upload),
        )
}
