//! End-to-end review workflow over HTTP against the in-memory store.

#![allow(clippy::panic)]

use std::sync::Arc;

use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response, StatusCode};
use serde_json::{Value, json};

use conference_review::api;
use conference_review::api::extract::USER_ID_HEADER;
use conference_review::app_state::AppState;
use conference_review::config::ReviewConfig;
use conference_review::domain::UserId;
use conference_review::persistence::{LocalFileStore, MemoryStore};
use conference_review::service::{MembershipVerdict, StaticMembershipCheck};

const PDF: &[u8] = b"%PDF-1.4\n1 0 obj <<>> endobj\ntrailer <<>>\n%%EOF\n";

struct Server {
    base: String,
    client: Client,
    admin: UserId,
    chair: UserId,
    author: UserId,
    reviewers: [UserId; 2],
}

impl Server {
    async fn start() -> Self {
        let store = MemoryStore::new();
        let admin = store.add_user("admin@conf.org", "Admin", true).await;
        let chair = store.add_user("chair@conf.org", "Chair", false).await;
        let author = store.add_user("author@uni.edu", "Author", false).await;
        let r1 = store.add_user("r1@uni.edu", "Reviewer One", false).await;
        let r2 = store.add_user("r2@uni.edu", "Reviewer Two", false).await;

        let upload_dir =
            std::env::temp_dir().join(format!("review-flow-{}", uuid::Uuid::new_v4().simple()));
        let config = ReviewConfig {
            upload_dir: upload_dir.clone(),
            ..ReviewConfig::default()
        };
        let state = AppState::new(
            Arc::new(store.clone()),
            Arc::new(store),
            Arc::new(LocalFileStore::new(upload_dir)),
            Arc::new(StaticMembershipCheck::new(MembershipVerdict::pass())),
            &config,
        );
        let app = api::build_router(config.max_upload_bytes).with_state(state);

        let Ok(listener) = tokio::net::TcpListener::bind("127.0.0.1:0").await else {
            panic!("listener should bind");
        };
        let Ok(addr) = listener.local_addr() else {
            panic!("listener should have an address");
        };
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            base: format!("http://{addr}"),
            client: Client::new(),
            admin,
            chair,
            author,
            reviewers: [r1, r2],
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }

    async fn get(&self, user: Option<UserId>, path: &str) -> Response {
        let mut request = self.client.get(self.url(path));
        if let Some(user) = user {
            request = request.header(USER_ID_HEADER, user.to_string());
        }
        let Ok(response) = request.send().await else {
            panic!("GET {path} should complete");
        };
        response
    }

    async fn post(&self, user: UserId, path: &str, body: Value) -> Response {
        let Ok(response) = self
            .client
            .post(self.url(path))
            .header(USER_ID_HEADER, user.to_string())
            .json(&body)
            .send()
            .await
        else {
            panic!("POST {path} should complete");
        };
        response
    }

    async fn upload(&self, user: UserId, path: &str, form: Form) -> Response {
        let Ok(response) = self
            .client
            .post(self.url(path))
            .header(USER_ID_HEADER, user.to_string())
            .multipart(form)
            .send()
            .await
        else {
            panic!("upload to {path} should complete");
        };
        response
    }

    /// Event with the chair and both reviewers granted, and the author
    /// registered.
    async fn event(&self) -> i64 {
        let created = json_of(
            self.post(self.admin, "/api/v1/events", json!({ "name": "ICRC 2026" }))
                .await,
            StatusCode::CREATED,
        )
        .await;
        let Some(event) = created["id"].as_i64() else {
            panic!("event id should be a number");
        };

        let grants = [
            (self.admin, self.chair, "chair"),
            (self.chair, self.reviewers[0], "reviewer"),
            (self.chair, self.reviewers[1], "reviewer"),
        ];
        for (granter, user, role) in grants {
            let response = self
                .post(
                    granter,
                    &format!("/api/v1/events/{event}/roles"),
                    json!({ "user_id": user, "role": role }),
                )
                .await;
            assert_eq!(response.status(), StatusCode::CREATED);
        }
        let response = self
            .post(
                self.author,
                &format!("/api/v1/events/{event}/register"),
                json!({}),
            )
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        event
    }

    async fn submit_paper(&self, event: i64) -> i64 {
        let form = Form::new()
            .text("title", "Graph Sparsification at Scale")
            .text("abstract_text", "We sparsify <b>large</b> graphs.")
            .text(
                "authors",
                r#"[{"name": "Ada Author", "email": "ADA@uni.edu"}]"#,
            )
            .part("file", pdf_part());
        let submission = json_of(
            self.upload(
                self.author,
                &format!("/api/v1/events/{event}/submissions"),
                form,
            )
            .await,
            StatusCode::CREATED,
        )
        .await;
        assert_eq!(submission["status"], "submitted");
        assert_eq!(submission["abstract_text"], "We sparsify large graphs.");
        let Some(id) = submission["id"].as_i64() else {
            panic!("submission id should be a number");
        };
        id
    }
}

fn pdf_part() -> Part {
    let Ok(part) = Part::bytes(PDF.to_vec())
        .file_name("paper.pdf")
        .mime_str("application/pdf")
    else {
        panic!("pdf mime should parse");
    };
    part
}

async fn json_of(response: Response, expected: StatusCode) -> Value {
    let status = response.status();
    let Ok(body) = response.json::<Value>().await else {
        panic!("response body should be JSON");
    };
    assert_eq!(status, expected, "unexpected status, body: {body}");
    body
}

fn review(technical: i64, committee: &str) -> Value {
    json!({
        "score_technical": technical,
        "score_relevance": 4,
        "score_innovation": 3,
        "score_writing": 4,
        "comments_for_author": "Solid evaluation.",
        "comments_committee": committee,
    })
}

#[tokio::test]
async fn submission_is_reviewed_decided_and_finalized() {
    let server = Server::start().await;
    let event = server.event().await;
    let submission = server.submit_paper(event).await;
    let [r1, r2] = server.reviewers;

    let chair_base = format!("/api/v1/events/{event}/chair/submissions/{submission}");
    let outcome = json_of(
        server
            .post(
                server.chair,
                &format!("{chair_base}/assign"),
                json!({ "reviewer_ids": [r1, r2, server.author] }),
            )
            .await,
        StatusCode::OK,
    )
    .await;
    assert_eq!(outcome["accepted"], json!([r1, r2]));
    assert_eq!(outcome["rejected"]["author"], json!([server.author]));
    assert_eq!(outcome["status"], "under_review");

    let receipt = json_of(
        server
            .post(
                r1,
                &format!("/api/v1/events/{event}/reviewer/submissions/{submission}/review"),
                review(5, "Strong accept."),
            )
            .await,
        StatusCode::OK,
    )
    .await;
    assert_eq!(receipt["overall"], 4.0);
    let response = server
        .post(
            r2,
            &format!("/api/v1/submissions/{submission}/review"),
            review(3, "Borderline."),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let queue = json_of(
        server
            .get(
                Some(server.chair),
                &format!("/api/v1/events/{event}/decisions/queue?min_reviews=2"),
            )
            .await,
        StatusCode::OK,
    )
    .await;
    assert_eq!(queue[0]["submission_id"], submission);
    assert_eq!(queue[0]["n_reviews"], 2);

    let decision_path = format!("/api/v1/events/{event}/decisions/{submission}");
    let decided = json_of(
        server
            .post(
                server.chair,
                &decision_path,
                json!({ "decision": "accept", "min_reviews": 2 }),
            )
            .await,
        StatusCode::OK,
    )
    .await;
    assert_eq!(decided["decision"]["decision"], "accept");
    assert_eq!(decided["submission_status"], "final_required");

    let again = json_of(
        server
            .post(server.chair, &decision_path, json!({ "decision": "reject" }))
            .await,
        StatusCode::CONFLICT,
    )
    .await;
    assert_eq!(again["error"]["code"], 2101);

    let author_view = json_of(
        server
            .get(
                Some(server.author),
                &format!("/api/v1/events/{event}/submissions/{submission}/reviews"),
            )
            .await,
        StatusCode::OK,
    )
    .await;
    let Some(reviews) = author_view.as_array() else {
        panic!("author view should be a list");
    };
    assert_eq!(reviews.len(), 2);
    assert!(reviews.iter().all(|r| r.get("comments_committee").is_none()));
    assert!(reviews.iter().all(|r| r.get("reviewer").is_none()));

    let final_receipt = json_of(
        server
            .upload(
                server.author,
                &format!("/api/v1/events/{event}/submissions/{submission}/final"),
                Form::new().part("file", pdf_part()),
            )
            .await,
        StatusCode::OK,
    )
    .await;
    assert_eq!(final_receipt["status"], "final_submitted");

    let metrics = json_of(server.get(None, "/metrics").await, StatusCode::OK).await;
    assert_eq!(metrics["reviews_submitted"], 2);
    assert_eq!(metrics["decisions_accept"], 1);
    assert_eq!(metrics["final_uploads"], 1);
}

#[tokio::test]
async fn invited_reviewer_reviews_through_token() {
    let server = Server::start().await;
    let event = server.event().await;
    let submission = server.submit_paper(event).await;

    let invitation = json_of(
        server
            .post(
                server.chair,
                &format!(
                    "/api/v1/events/{event}/chair/submissions/{submission}/external-invite"
                ),
                json!({ "name": "Guest Expert", "email": "guest@lab.org" }),
            )
            .await,
        StatusCode::CREATED,
    )
    .await;
    assert_eq!(invitation["status"], "under_review");
    let Some(token) = invitation["token"].as_str() else {
        panic!("invitation should carry a token");
    };

    let context = json_of(
        server.get(None, &format!("/api/v1/external/{token}")).await,
        StatusCode::OK,
    )
    .await;
    assert_eq!(context["submission"]["id"], submission);

    let Ok(response) = server
        .client
        .post(server.url(&format!("/api/v1/external/{token}/review")))
        .json(&review(4, "Fine."))
        .send()
        .await
    else {
        panic!("external review should complete");
    };
    assert_eq!(response.status(), StatusCode::OK);

    let unknown = server.get(None, "/api/v1/external/not-a-token").await;
    assert_eq!(unknown.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn identity_and_roles_are_enforced() {
    let server = Server::start().await;
    let event = server.event().await;
    let submission = server.submit_paper(event).await;

    let anonymous = server.get(None, "/api/v1/events").await;
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);

    let forbidden = json_of(
        server
            .post(
                server.author,
                &format!("/api/v1/events/{event}/chair/submissions/{submission}/assign"),
                json!({ "reviewer_ids": [server.reviewers[0]] }),
            )
            .await,
        StatusCode::FORBIDDEN,
    )
    .await;
    assert_eq!(forbidden["error"]["code"], 4003);

    let early_final = server
        .upload(
            server.author,
            &format!("/api/v1/events/{event}/submissions/{submission}/final"),
            Form::new().part("file", pdf_part()),
        )
        .await;
    assert_eq!(early_final.status(), StatusCode::CONFLICT);

    let not_pdf = server
        .upload(
            server.author,
            &format!("/api/v1/events/{event}/submissions"),
            Form::new()
                .text("title", "Plain text")
                .part("file", Part::bytes(b"hello".to_vec()).file_name("x.txt")),
        )
        .await;
    assert_eq!(not_pdf.status(), StatusCode::BAD_REQUEST);

    let health = json_of(server.get(None, "/health").await, StatusCode::OK).await;
    assert_eq!(health["status"], "healthy");
}
