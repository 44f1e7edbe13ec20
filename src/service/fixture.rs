//! Shared in-memory setup for engine tests.

#![allow(clippy::panic)]

use std::sync::Arc;

use crate::domain::{
    AuditBus, AuditSink, AuthorEntry, EventId, EventRole, NewEvent, NewSubmission,
    OutcomeCounters, Submission, UserId,
};
use crate::persistence::{MemoryStore, ReviewStore, RoleStore};

use super::authz::{Actor, AuthorizationGate, EventAccess, EventScope};

/// One event with an admin, a chair, an author, two reviewers, a decision
/// maker and a user holding no role.
#[derive(Debug)]
pub(crate) struct Fixture {
    pub store: MemoryStore,
    pub bus: AuditBus,
    pub counters: Arc<OutcomeCounters>,
    pub gate: AuthorizationGate,
    pub event: EventId,
    pub admin: UserId,
    pub chair: UserId,
    pub author: UserId,
    pub reviewers: [UserId; 2],
    pub decider: UserId,
    pub outsider: UserId,
}

impl Fixture {
    pub async fn new() -> Self {
        let store = MemoryStore::new();
        let bus = AuditBus::new(64);

        let admin = store.add_user("admin@conf.org", "Admin", true).await;
        let chair = store.add_user("chair@conf.org", "Chair", false).await;
        let author = store.add_user("author@uni.edu", "Author", false).await;
        let r1 = store.add_user("r1@uni.edu", "Reviewer One", false).await;
        let r2 = store.add_user("r2@uni.edu", "Reviewer Two", false).await;
        let outsider = store.add_user("nobody@uni.edu", "Nobody", false).await;
        let decider = store.add_user("pc@conf.org", "Program Committee", false).await;

        let Ok(event) = store
            .create_event(NewEvent {
                name: "ICRC 2026".into(),
                description: None,
                starts_on: None,
                ends_on: None,
                created_by: admin,
            })
            .await
        else {
            panic!("event should be created");
        };

        for (user, role) in [
            (chair, EventRole::Chair),
            (author, EventRole::Author),
            (r1, EventRole::Reviewer),
            (r2, EventRole::Reviewer),
            (decider, EventRole::DecisionMaker),
        ] {
            let Ok(true) = store.grant_role(event.id, user, role).await else {
                panic!("grant should be new");
            };
        }

        let gate = AuthorizationGate::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            Arc::new(bus.clone()),
        );

        Self {
            store,
            bus,
            counters: Arc::new(OutcomeCounters::new()),
            gate,
            event: event.id,
            admin,
            chair,
            author,
            reviewers: [r1, r2],
            decider,
            outsider,
        }
    }

    pub fn review_store(&self) -> Arc<dyn ReviewStore> {
        Arc::new(self.store.clone())
    }

    pub fn role_store(&self) -> Arc<dyn RoleStore> {
        Arc::new(self.store.clone())
    }

    pub fn sink(&self) -> Arc<dyn AuditSink> {
        Arc::new(self.bus.clone())
    }

    /// Passes the gate for `user` in the fixture event, panicking on denial.
    pub async fn access(&self, user: UserId, allowed: &[EventRole]) -> EventAccess {
        let Ok(access) = self
            .gate
            .require_event_role(Actor::new(user), EventScope::Event(self.event), allowed)
            .await
        else {
            panic!("{user} should pass the gate");
        };
        access
    }

    /// A fresh submission by the fixture author in status `submitted`.
    pub async fn submission(&self) -> Submission {
        let Ok(submission) = self
            .store
            .create_submission(NewSubmission {
                event_id: self.event,
                author_user_id: self.author,
                title: "Graph Sparsification at Scale".into(),
                abstract_text: Some("We study sparsifiers.".into()),
                keywords: Some("graphs".into()),
                authors: vec![AuthorEntry {
                    name: "Author".into(),
                    email: Some("author@uni.edu".into()),
                    organization: None,
                }],
                file_ref: "paper.pdf".into(),
                membership_email: None,
            })
            .await
        else {
            panic!("submission should be created");
        };
        submission
    }
}
