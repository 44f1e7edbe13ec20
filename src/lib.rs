//! # conference-review
//!
//! Peer-review workflow service for conference paper submissions.
//!
//! Authors submit papers to an event, chairs assign reviewers, reviewers
//! score the papers, chairs decide, and accepted authors upload a
//! camera-ready version behind a membership check. Every step is scoped to
//! one event and gated by the roles the caller holds there.
//!
//! ## Architecture
//!
//! ```text
//! Clients (HTTP)
//!     │
//!     ├── REST Handlers (api/)
//!     │
//!     ├── AuthorizationGate ─ EventAccess (service/)
//!     ├── Assignment / Review / Decision engines (service/)
//!     ├── FinalSubmissionGate ─ MembershipCheck (service/)
//!     │
//!     ├── next_status state machine, AuditBus (domain/)
//!     │
//!     └── ReviewStore: PostgreSQL or in-memory (persistence/)
//! ```

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod persistence;
pub mod service;
