//! Submission intake, listing and final-upload DTOs.

use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

use crate::domain::{SubmissionFilter, SubmissionStatus};

/// Multipart body of `POST /events/{event_id}/submissions`.
///
/// Only used for the OpenAPI schema; the handler reads the form field by
/// field.
#[derive(Debug, ToSchema)]
pub struct SubmissionUploadForm {
    /// Paper title.
    pub title: String,
    /// Abstract.
    pub abstract_text: Option<String>,
    /// Comma-separated keywords.
    pub keywords: Option<String>,
    /// JSON array of `{name, email, organization}` objects.
    pub authors: Option<String>,
    /// Email checked against the membership database at final upload.
    pub membership_email: Option<String>,
    /// The paper as PDF.
    #[schema(value_type = String, format = Binary)]
    pub file: Vec<u8>,
}

/// Multipart body of `POST .../submissions/{submission_id}/final`.
#[derive(Debug, ToSchema)]
pub struct FinalUploadForm {
    /// The camera-ready PDF.
    #[schema(value_type = String, format = Binary)]
    pub file: Vec<u8>,
}

/// Query string of the chair's submission listing.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListSubmissionsQuery {
    /// Only submissions in this status.
    #[serde(default)]
    pub status: Option<SubmissionStatus>,
    /// Case-insensitive title search.
    #[serde(default)]
    pub q: Option<String>,
    /// Page number (1-indexed). Defaults to 1.
    #[serde(default = "default_page")]
    pub page: u32,
    /// Items per page (max 100). Defaults to 20.
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

fn default_page() -> u32 {
    1
}

fn default_per_page() -> u32 {
    20
}

impl From<ListSubmissionsQuery> for SubmissionFilter {
    fn from(query: ListSubmissionsQuery) -> Self {
        Self {
            status: query.status,
            title_query: query.q,
            page: query.page,
            per_page: query.per_page,
        }
    }
}
