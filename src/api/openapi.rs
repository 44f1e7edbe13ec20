//! OpenAPI document for every route.

use utoipa::OpenApi;

use super::handlers::{chair, decisions, events, external, reviewer, submissions, system};

/// Generated OpenAPI description, served by Swagger UI when the
/// `swagger-ui` feature is on.
#[derive(Debug, OpenApi)]
#[openapi(
    info(
        title = "Conference Review API",
        description = "Submission, assignment, review and decision workflow for conference events."
    ),
    paths(
        system::health_handler,
        system::metrics_handler,
        events::create_event,
        events::list_events,
        events::get_event,
        events::register,
        events::list_members,
        events::list_reviewers,
        events::grant_role,
        events::revoke_role,
        submissions::create_submission,
        submissions::list_mine,
        submissions::get_mine,
        submissions::author_reviews,
        submissions::final_upload,
        chair::list_submissions,
        chair::list_assignments,
        chair::assign,
        chair::unassign,
        chair::invite_external,
        chair::reviews,
        decisions::queue,
        decisions::detail,
        decisions::decide,
        reviewer::assignments,
        reviewer::submit_review,
        reviewer::submit_review_by_submission,
        external::context,
        external::submit,
    ),
    tags(
        (name = "System", description = "Health and counters"),
        (name = "Events", description = "Events and role administration"),
        (name = "Submissions", description = "Author intake and final upload"),
        (name = "Chair", description = "Assignment and committee review view"),
        (name = "Decisions", description = "Decision queue and verdicts"),
        (name = "Reviews", description = "Reviewer queue and review submission"),
        (name = "External", description = "Invitation-token reviews"),
    )
)]
pub struct ApiDoc;
