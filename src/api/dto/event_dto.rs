//! Event and role administration DTOs.

use chrono::NaiveDate;
use serde::Deserialize;
use utoipa::ToSchema;

use crate::domain::{EventRole, UserId};
use crate::service::CreateEvent;

/// Request body for `POST /events`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateEventRequest {
    /// Display name, 1..=120 characters.
    pub name: String,
    /// Optional description, up to 500 characters.
    #[serde(default)]
    pub description: Option<String>,
    /// First day (`YYYY-MM-DD`).
    #[serde(default)]
    pub starts_on: Option<NaiveDate>,
    /// Last day; must not precede `starts_on`.
    #[serde(default)]
    pub ends_on: Option<NaiveDate>,
}

impl From<CreateEventRequest> for CreateEvent {
    fn from(req: CreateEventRequest) -> Self {
        Self {
            name: req.name,
            description: req.description,
            starts_on: req.starts_on,
            ends_on: req.ends_on,
        }
    }
}

/// Request body for `POST /events/{event_id}/roles`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct RoleGrantRequest {
    /// Account receiving the role.
    pub user_id: UserId,
    /// Role to grant.
    pub role: EventRole,
}
