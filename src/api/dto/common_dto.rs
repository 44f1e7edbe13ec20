//! Shared DTO types used across multiple endpoints.

use serde::Serialize;
use utoipa::ToSchema;

/// Body of mutations that have nothing else to report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct AckResponse {
    /// Always `true`.
    pub ok: bool,
}

impl AckResponse {
    /// The successful acknowledgement.
    pub const OK: Self = Self { ok: true };
}
