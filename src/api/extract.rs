//! Request extractors shared by the handlers.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::domain::UserId;
use crate::error::ReviewError;
use crate::service::Actor;

/// Header the upstream auth layer puts the authenticated account id in.
pub const USER_ID_HEADER: &str = "x-user-id";

impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = ReviewError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or(ReviewError::Unauthorized)?;
        let id = raw
            .trim()
            .parse::<i64>()
            .ok()
            .filter(|id| *id > 0)
            .ok_or(ReviewError::Unauthorized)?;
        Ok(Self::new(UserId::new(id)))
    }
}
