//! Authorization gate: resolves event-scoped roles and hands out
//! [`EventAccess`] capabilities.
//!
//! Global administrators are resolved to every role in one place
//! ([`AuthorizationGate::resolve_effective_roles`]); no engine checks the
//! admin flag for scoping on its own.

use std::sync::Arc;

use serde_json::json;

use crate::domain::{
    AuditAction, AuditEntry, AuditSink, EntityType, EventId, EventRole, RoleSet, Severity,
    SubmissionId, UserId,
};
use crate::error::ReviewError;
use crate::persistence::{ReviewStore, RoleStore};

/// The authenticated caller, as established by the outer auth layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    /// Account id of the caller.
    pub user_id: UserId,
}

impl Actor {
    /// Wraps an authenticated user id.
    #[must_use]
    pub const fn new(user_id: UserId) -> Self {
        Self { user_id }
    }
}

/// Where the event of a request comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventScope {
    /// The event id was given directly.
    Event(EventId),
    /// Only a submission id is known; its owning event is looked up.
    Submission(SubmissionId),
}

impl EventScope {
    /// Picks the first present source: path event, body event, submission.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewError::Validation`] when none is present.
    pub fn resolve(
        path: Option<EventId>,
        body: Option<EventId>,
        submission: Option<SubmissionId>,
    ) -> Result<Self, ReviewError> {
        path.or(body)
            .map(Self::Event)
            .or_else(|| submission.map(Self::Submission))
            .ok_or_else(|| ReviewError::validation("event_id", "event id is required"))
    }
}

/// Proof that an actor passed the gate for one event.
///
/// Only [`AuthorizationGate`] builds these. Engines re-check the event id
/// and the roles they need before touching anything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventAccess {
    actor: UserId,
    event_id: EventId,
    roles: RoleSet,
    is_admin: bool,
}

impl EventAccess {
    /// Acting user.
    #[must_use]
    pub const fn actor(&self) -> UserId {
        self.actor
    }

    /// Event the access was granted for.
    #[must_use]
    pub const fn event_id(&self) -> EventId {
        self.event_id
    }

    /// Whether the actor is a global administrator.
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        self.is_admin
    }

    /// Fails unless the actor holds one of `allowed`.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewError::Forbidden`] when no role matches.
    pub fn require_role(&self, allowed: &[EventRole]) -> Result<(), ReviewError> {
        if self.roles.intersects(allowed) {
            Ok(())
        } else {
            Err(ReviewError::Forbidden(missing_role_message(allowed)))
        }
    }
}

fn missing_role_message(allowed: &[EventRole]) -> String {
    let names: Vec<&str> = allowed.iter().map(|r| r.as_str()).collect();
    format!("requires one of: {}", names.join(", "))
}

/// Checks event-scoped roles before any engine runs.
#[derive(Debug, Clone)]
pub struct AuthorizationGate {
    roles: Arc<dyn RoleStore>,
    store: Arc<dyn ReviewStore>,
    audit: Arc<dyn AuditSink>,
}

impl AuthorizationGate {
    /// Creates a new `AuthorizationGate`.
    #[must_use]
    pub fn new(
        roles: Arc<dyn RoleStore>,
        store: Arc<dyn ReviewStore>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            roles,
            store,
            audit,
        }
    }

    /// Roles `user` effectively holds in `event`: every role for global
    /// administrators, the stored grants otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewError::Persistence`] if the role store fails.
    pub async fn resolve_effective_roles(
        &self,
        user: UserId,
        event: EventId,
    ) -> Result<RoleSet, ReviewError> {
        Ok(self.resolve(user, event).await?.0)
    }

    async fn resolve(&self, user: UserId, event: EventId) -> Result<(RoleSet, bool), ReviewError> {
        if self.roles.is_global_admin(user).await? {
            return Ok((RoleSet::all(), true));
        }
        Ok((self.roles.roles_for(event, user).await?, false))
    }

    /// Fails unless `actor` is a global administrator.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewError::Forbidden`] for everyone else.
    pub async fn require_admin(&self, actor: Actor) -> Result<(), ReviewError> {
        if self.roles.is_global_admin(actor.user_id).await? {
            return Ok(());
        }
        self.deny(actor, None, "administrator required");
        Err(ReviewError::Forbidden("administrator required".into()))
    }

    /// Resolves the event of `scope` and checks that `actor` holds one of
    /// `allowed` there. An empty `allowed` accepts any role in the event.
    ///
    /// # Errors
    ///
    /// - [`ReviewError::NotFound`] if the event or submission does not exist.
    /// - [`ReviewError::Forbidden`] if the role check fails.
    pub async fn require_event_role(
        &self,
        actor: Actor,
        scope: EventScope,
        allowed: &[EventRole],
    ) -> Result<EventAccess, ReviewError> {
        let event_id = match scope {
            EventScope::Event(id) => {
                self.store
                    .find_event(id)
                    .await?
                    .ok_or_else(|| ReviewError::NotFound(format!("event {id}")))?
                    .id
            }
            EventScope::Submission(id) => {
                self.store
                    .find_submission(id)
                    .await?
                    .ok_or_else(|| ReviewError::NotFound(format!("submission {id}")))?
                    .event_id
            }
        };

        let (roles, is_admin) = self.resolve(actor.user_id, event_id).await?;
        let granted = if allowed.is_empty() {
            !roles.is_empty()
        } else {
            roles.intersects(allowed)
        };
        if !granted {
            let message = if allowed.is_empty() {
                "no role in this event".to_string()
            } else {
                missing_role_message(allowed)
            };
            self.deny(actor, Some(event_id), &message);
            return Err(ReviewError::Forbidden(message));
        }

        Ok(EventAccess {
            actor: actor.user_id,
            event_id,
            roles,
            is_admin,
        })
    }

    fn deny(&self, actor: Actor, event: Option<EventId>, reason: &str) {
        tracing::warn!(user_id = %actor.user_id, ?event, reason, "access denied");
        self.audit.record(
            AuditEntry::new(
                Some(actor.user_id),
                AuditAction::AccessDenied,
                EntityType::Event,
                event.map_or_else(String::new, |e| e.to_string()),
                json!({ "reason": reason }),
            )
            .with_severity(Severity::Warn),
        );
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::service::fixture::Fixture;

    #[test]
    fn scope_prefers_path_then_body_then_submission() {
        let path = Some(EventId::new(1));
        let body = Some(EventId::new(2));
        let sub = Some(SubmissionId::new(3));
        assert_eq!(
            EventScope::resolve(path, body, sub),
            Ok(EventScope::Event(EventId::new(1)))
        );
        assert_eq!(
            EventScope::resolve(None, body, sub),
            Ok(EventScope::Event(EventId::new(2)))
        );
        assert_eq!(
            EventScope::resolve(None, None, sub),
            Ok(EventScope::Submission(SubmissionId::new(3)))
        );
        assert!(matches!(
            EventScope::resolve(None, None, None),
            Err(ReviewError::Validation { field: "event_id", .. })
        ));
    }

    #[tokio::test]
    async fn admin_holds_every_role() {
        let fx = Fixture::new().await;
        let Ok(roles) = fx.gate.resolve_effective_roles(fx.admin, fx.event).await else {
            panic!("roles should resolve");
        };
        assert_eq!(roles, RoleSet::all());
    }

    #[tokio::test]
    async fn chair_passes_chair_gate() {
        let fx = Fixture::new().await;
        let Ok(access) = fx
            .gate
            .require_event_role(
                Actor::new(fx.chair),
                EventScope::Event(fx.event),
                &[EventRole::Chair],
            )
            .await
        else {
            panic!("chair should pass");
        };
        assert_eq!(access.event_id(), fx.event);
        assert!(!access.is_admin());
        assert!(access.require_role(&[EventRole::Chair]).is_ok());
        assert!(access.require_role(&[EventRole::Reviewer]).is_err());
    }

    #[tokio::test]
    async fn reviewer_is_denied_chair_gate_and_audited() {
        let fx = Fixture::new().await;
        let mut rx = fx.bus.subscribe();
        let result = fx
            .gate
            .require_event_role(
                Actor::new(fx.reviewers[0]),
                EventScope::Event(fx.event),
                &[EventRole::Chair],
            )
            .await;
        assert!(matches!(result, Err(ReviewError::Forbidden(_))));
        let Ok(entry) = rx.try_recv() else {
            panic!("denial should be audited");
        };
        assert_eq!(entry.action, AuditAction::AccessDenied);
        assert_eq!(entry.severity, Severity::Warn);
    }

    #[tokio::test]
    async fn empty_allowed_list_needs_some_role() {
        let fx = Fixture::new().await;
        let any_role = fx
            .gate
            .require_event_role(Actor::new(fx.author), EventScope::Event(fx.event), &[])
            .await;
        assert!(any_role.is_ok());

        let none = fx
            .gate
            .require_event_role(Actor::new(fx.outsider), EventScope::Event(fx.event), &[])
            .await;
        assert!(matches!(none, Err(ReviewError::Forbidden(_))));
    }

    #[tokio::test]
    async fn submission_scope_resolves_owning_event() {
        let fx = Fixture::new().await;
        let submission = fx.submission().await;
        let Ok(access) = fx
            .gate
            .require_event_role(
                Actor::new(fx.chair),
                EventScope::Submission(submission.id),
                &[EventRole::Chair],
            )
            .await
        else {
            panic!("chair should pass via submission scope");
        };
        assert_eq!(access.event_id(), fx.event);

        let missing = fx
            .gate
            .require_event_role(
                Actor::new(fx.chair),
                EventScope::Submission(SubmissionId::new(9_999)),
                &[EventRole::Chair],
            )
            .await;
        assert!(matches!(missing, Err(ReviewError::NotFound(_))));
    }

    #[tokio::test]
    async fn only_admins_pass_admin_gate() {
        let fx = Fixture::new().await;
        assert!(fx.gate.require_admin(Actor::new(fx.admin)).await.is_ok());
        assert!(matches!(
            fx.gate.require_admin(Actor::new(fx.chair)).await,
            Err(ReviewError::Forbidden(_))
        ));
    }
}
