//! Review DTOs.

use serde::Deserialize;
use utoipa::ToSchema;

use crate::service::ReviewInput;

/// Request body of both review routes (account and invitation token).
#[derive(Debug, Deserialize, ToSchema)]
pub struct ReviewBody {
    /// Technical quality, 1..=5.
    pub score_technical: i64,
    /// Relevance, 1..=5.
    pub score_relevance: i64,
    /// Innovation, 1..=5.
    pub score_innovation: i64,
    /// Writing quality, 1..=5.
    pub score_writing: i64,
    /// Shown to the author.
    #[serde(default)]
    pub comments_for_author: Option<String>,
    /// Shown to the committee only.
    #[serde(default)]
    pub comments_committee: Option<String>,
}

impl From<ReviewBody> for ReviewInput {
    fn from(body: ReviewBody) -> Self {
        Self {
            technical: body.score_technical,
            relevance: body.score_relevance,
            innovation: body.score_innovation,
            writing: body.score_writing,
            comments_for_author: body.comments_for_author,
            comments_committee: body.comments_committee,
        }
    }
}
