//! Invitation-token routes for reviewers without an account. The token is
//! the only credential; no `x-user-id` is read here.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::dto::ReviewBody;
use crate::app_state::AppState;
use crate::error::{ErrorResponse, ReviewError};
use crate::service::{ExternalReviewContext, ReviewReceipt};

/// `GET /external/{token}` — What the invited reviewer should review.
///
/// # Errors
///
/// Returns [`ReviewError::NotFound`] for an unknown or expired token.
#[utoipa::path(
    get,
    path = "/api/v1/external/{token}",
    tag = "External",
    summary = "Resolve an invitation",
    params(("token" = String, Path, description = "Invitation token")),
    responses(
        (status = 200, description = "Invitation, submission and current review", body = ExternalReviewContext),
        (status = 404, description = "Unknown or expired token", body = ErrorResponse),
    )
)]
pub async fn context(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<impl IntoResponse, ReviewError> {
    Ok(Json(state.reviews.external_review_context(&token).await?))
}

/// `POST /external/{token}/review` — Submit the invited review.
///
/// # Errors
///
/// - [`ReviewError::NotFound`] for an unknown or expired token.
/// - [`ReviewError::Validation`] for a score outside 1..=5.
#[utoipa::path(
    post,
    path = "/api/v1/external/{token}/review",
    tag = "External",
    summary = "Submit an invited review",
    params(("token" = String, Path, description = "Invitation token")),
    request_body = ReviewBody,
    responses(
        (status = 200, description = "Review stored", body = ReviewReceipt),
        (status = 400, description = "Score out of range", body = ErrorResponse),
        (status = 404, description = "Unknown or expired token", body = ErrorResponse),
    )
)]
pub async fn submit(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Json(body): Json<ReviewBody>,
) -> Result<impl IntoResponse, ReviewError> {
    let receipt = state
        .reviews
        .submit_external_review(&token, body.into())
        .await?;
    Ok(Json(receipt))
}

/// External reviewer routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/external/{token}", get(context))
        .route("/external/{token}/review", post(submit))
}
