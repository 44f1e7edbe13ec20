//! Data Transfer Objects for REST request/response serialization.
//!
//! Engine results that already derive `Serialize` are returned as-is; the
//! types here cover request bodies, query strings and upload forms.

pub mod chair_dto;
pub mod common_dto;
pub mod decision_dto;
pub mod event_dto;
pub mod review_dto;
pub mod submission_dto;

pub use chair_dto::*;
pub use common_dto::*;
pub use decision_dto::*;
pub use event_dto::*;
pub use review_dto::*;
pub use submission_dto::*;
