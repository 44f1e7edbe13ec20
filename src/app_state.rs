//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::config::ReviewConfig;
use crate::domain::{AuditBus, AuditSink, OutcomeCounters};
use crate::persistence::{FileStore, ReviewStore, RoleStore};
use crate::service::{
    AssignmentService, AuthorizationGate, DecisionService, EventService, FinalSubmissionGate,
    MembershipCheck, ReviewService, SubmissionService,
};

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Role checks for every event-scoped route.
    pub gate: AuthorizationGate,
    /// Events and role grants.
    pub events: Arc<EventService>,
    /// Submission intake and listings.
    pub submissions: Arc<SubmissionService>,
    /// Reviewer assignment.
    pub assignments: Arc<AssignmentService>,
    /// Review submission and reads.
    pub reviews: Arc<ReviewService>,
    /// Decision queue and decisions.
    pub decisions: Arc<DecisionService>,
    /// Camera-ready uploads.
    pub finals: Arc<FinalSubmissionGate>,
    /// PDF storage.
    pub files: Arc<dyn FileStore>,
    /// Outcome counters behind `/metrics`.
    pub counters: Arc<OutcomeCounters>,
    /// Audit entries of every engine.
    pub audit_bus: AuditBus,
    /// Largest accepted PDF.
    pub max_upload_bytes: usize,
}

impl AppState {
    /// Wires every engine onto the given stores.
    #[must_use]
    pub fn new(
        store: Arc<dyn ReviewStore>,
        roles: Arc<dyn RoleStore>,
        files: Arc<dyn FileStore>,
        membership: Arc<dyn MembershipCheck>,
        config: &ReviewConfig,
    ) -> Self {
        let audit_bus = AuditBus::new(config.audit_bus_capacity);
        let sink: Arc<dyn AuditSink> = Arc::new(audit_bus.clone());
        let counters = Arc::new(OutcomeCounters::new());
        let gate = AuthorizationGate::new(
            Arc::clone(&roles),
            Arc::clone(&store),
            Arc::clone(&sink),
        );

        Self {
            events: Arc::new(EventService::new(
                Arc::clone(&store),
                Arc::clone(&roles),
                gate.clone(),
                Arc::clone(&sink),
            )),
            submissions: Arc::new(SubmissionService::new(
                Arc::clone(&store),
                Arc::clone(&sink),
            )),
            assignments: Arc::new(AssignmentService::new(
                Arc::clone(&store),
                roles,
                Arc::clone(&sink),
                config.external_invite_ttl_hours,
            )),
            reviews: Arc::new(ReviewService::new(
                Arc::clone(&store),
                Arc::clone(&sink),
                Arc::clone(&counters),
            )),
            decisions: Arc::new(DecisionService::new(
                Arc::clone(&store),
                Arc::clone(&sink),
                Arc::clone(&counters),
                config.default_min_reviews,
            )),
            finals: Arc::new(FinalSubmissionGate::new(
                store,
                membership,
                sink,
                Arc::clone(&counters),
                config.membership_enforce,
            )),
            gate,
            files,
            counters,
            audit_bus,
            max_upload_bytes: config.max_upload_bytes,
        }
    }
}
