//! REST API layer: route handlers, DTOs, and router composition.
//!
//! Review endpoints are mounted under `/api/v1`; `/health` and `/metrics`
//! sit at the root. The acting user arrives in the [`extract::USER_ID_HEADER`]
//! header.

pub mod dto;
pub mod extract;
pub mod handlers;
pub mod multipart;
pub mod openapi;

use axum::Router;
use axum::extract::DefaultBodyLimit;

use crate::app_state::AppState;

/// Room left for form fields next to the PDF.
const FORM_OVERHEAD_BYTES: usize = 1024 * 1024;

/// Builds the complete API router with all REST endpoints.
///
/// Request bodies may be up to `max_upload_bytes` plus room for the other
/// form fields.
pub fn build_router(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .nest("/api/v1", handlers::routes())
        .merge(handlers::system::routes())
        .layer(DefaultBodyLimit::max(
            max_upload_bytes.saturating_add(FORM_OVERHEAD_BYTES),
        ))
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode, header};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use super::*;
    use crate::config::ReviewConfig;
    use crate::domain::{AuthorEntry, EventRole, NewEvent, NewSubmission, SubmissionId, UserId};
    use crate::persistence::{LocalFileStore, MemoryStore, ReviewStore, RoleStore};
    use crate::service::{MembershipVerdict, StaticMembershipCheck};

    fn app_with(store: MemoryStore) -> Router {
        let config = ReviewConfig::default();
        let state = AppState::new(
            Arc::new(store.clone()),
            Arc::new(store),
            Arc::new(LocalFileStore::new(std::env::temp_dir())),
            Arc::new(StaticMembershipCheck::new(MembershipVerdict::pass())),
            &config,
        );
        build_router(config.max_upload_bytes).with_state(state)
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = match app.oneshot(request).await {
            Ok(response) => response,
            Err(never) => match never {},
        };
        let status = response.status();
        let Ok(bytes) = axum::body::to_bytes(response.into_body(), usize::MAX).await else {
            panic!("body should be readable");
        };
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    async fn call(uri: &str, user: Option<&str>) -> (StatusCode, Value) {
        let mut builder = Request::builder().uri(uri);
        if let Some(user) = user {
            builder = builder.header(extract::USER_ID_HEADER, user);
        }
        let Ok(request) = builder.body(Body::empty()) else {
            panic!("request should build");
        };
        send(app_with(MemoryStore::new()), request).await
    }

    fn review_request(user: UserId, submission: SubmissionId) -> Request<Body> {
        let body = json!({
            "score_technical": 3,
            "score_relevance": 3,
            "score_innovation": 3,
            "score_writing": 3,
        });
        let Ok(request) = Request::builder()
            .method(Method::POST)
            .uri(format!("/api/v1/submissions/{submission}/review"))
            .header(extract::USER_ID_HEADER, user.to_string())
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
        else {
            panic!("request should build");
        };
        request
    }

    #[tokio::test]
    async fn missing_identity_renders_error_body() {
        let (status, body) = call("/api/v1/events", None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["code"], 4001);
    }

    #[tokio::test]
    async fn unknown_event_is_not_found() {
        let (status, body) = call("/api/v1/events/999/members", Some("1")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], 2001);
    }

    #[tokio::test]
    async fn metrics_start_at_zero() {
        let (status, body) = call("/metrics", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["reviews_submitted"], 0);
        assert_eq!(body["final_uploads"], 0);
    }

    #[tokio::test]
    async fn review_route_answers_alike_for_unknown_and_unassigned_submissions() {
        let store = MemoryStore::new();
        let author = store.add_user("author@uni.edu", "Author", false).await;
        let reviewer = store.add_user("r1@uni.edu", "Reviewer", false).await;
        let Ok(event) = store
            .create_event(NewEvent {
                name: "ICRC 2026".into(),
                description: None,
                starts_on: None,
                ends_on: None,
                created_by: author,
            })
            .await
        else {
            panic!("event should be created");
        };
        let Ok(true) = store
            .grant_role(event.id, reviewer, EventRole::Reviewer)
            .await
        else {
            panic!("grant should be new");
        };
        let Ok(submission) = store
            .create_submission(NewSubmission {
                event_id: event.id,
                author_user_id: author,
                title: "Unassigned paper".into(),
                abstract_text: None,
                keywords: None,
                authors: vec![AuthorEntry {
                    name: "Author".into(),
                    email: None,
                    organization: None,
                }],
                file_ref: "paper.pdf".into(),
                membership_email: None,
            })
            .await
        else {
            panic!("submission should be created");
        };

        let app = app_with(store);
        let existing = send(app.clone(), review_request(reviewer, submission.id)).await;
        let unknown = send(app, review_request(reviewer, SubmissionId::new(99_999))).await;

        assert_eq!(existing.0, StatusCode::FORBIDDEN);
        assert_eq!(existing, unknown);
    }
}
