//! REST endpoint handlers organized by audience.

pub mod chair;
pub mod decisions;
pub mod events;
pub mod external;
pub mod reviewer;
pub mod submissions;
pub mod system;

use axum::Router;

use crate::app_state::AppState;

/// Composes all resource routes under `/api/v1`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(events::routes())
        .merge(submissions::routes())
        .merge(chair::routes())
        .merge(decisions::routes())
        .merge(reviewer::routes())
        .merge(external::routes())
}
