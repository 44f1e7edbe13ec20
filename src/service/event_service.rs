//! Event creation and event-scoped role administration.

use std::sync::Arc;

use chrono::NaiveDate;
use serde_json::json;

use crate::domain::text::{clean_opt, clean_text};
use crate::domain::{
    AuditAction, AuditEntry, AuditSink, EntityType, Event, EventId, EventMember, EventRole,
    NewEvent, ReviewerSummary, UserId,
};
use crate::error::{ConflictKind, ReviewError};
use crate::persistence::{ReviewStore, RoleStore};

use super::authz::{Actor, AuthorizationGate, EventAccess};

const MAX_EVENT_NAME_CHARS: usize = 120;
const MAX_EVENT_DESCRIPTION_CHARS: usize = 500;

/// Input for [`EventService::create_event`].
#[derive(Debug, Clone, Default)]
pub struct CreateEvent {
    /// Display name.
    pub name: String,
    /// Optional description.
    pub description: Option<String>,
    /// First day.
    pub starts_on: Option<NaiveDate>,
    /// Last day.
    pub ends_on: Option<NaiveDate>,
}

/// Events and the roles people hold in them.
#[derive(Debug, Clone)]
pub struct EventService {
    store: Arc<dyn ReviewStore>,
    roles: Arc<dyn RoleStore>,
    gate: AuthorizationGate,
    audit: Arc<dyn AuditSink>,
}

impl EventService {
    /// Creates a new `EventService`.
    #[must_use]
    pub fn new(
        store: Arc<dyn ReviewStore>,
        roles: Arc<dyn RoleStore>,
        gate: AuthorizationGate,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            store,
            roles,
            gate,
            audit,
        }
    }

    /// Creates an event. Administrators only.
    ///
    /// # Errors
    ///
    /// - [`ReviewError::Forbidden`] for non-administrators.
    /// - [`ReviewError::Validation`] for an empty name or inverted dates.
    pub async fn create_event(&self, actor: Actor, input: CreateEvent) -> Result<Event, ReviewError> {
        self.gate.require_admin(actor).await?;

        let name = clean_text(&input.name, MAX_EVENT_NAME_CHARS)
            .ok_or_else(|| ReviewError::validation("name", "name is required"))?;
        let description = clean_opt(input.description.as_deref(), MAX_EVENT_DESCRIPTION_CHARS);
        if let (Some(start), Some(end)) = (input.starts_on, input.ends_on)
            && end < start
        {
            return Err(ReviewError::validation(
                "ends_on",
                "end date must not precede start date",
            ));
        }

        let event = self
            .store
            .create_event(NewEvent {
                name,
                description,
                starts_on: input.starts_on,
                ends_on: input.ends_on,
                created_by: actor.user_id,
            })
            .await?;

        self.audit.record(AuditEntry::new(
            Some(actor.user_id),
            AuditAction::EventCreated,
            EntityType::Event,
            event.id,
            json!({ "name": event.name }),
        ));
        tracing::info!(event_id = %event.id, name = %event.name, "event created");
        Ok(event)
    }

    /// All events, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewError::Persistence`] if the store fails.
    pub async fn list_events(&self) -> Result<Vec<Event>, ReviewError> {
        self.store.list_events().await
    }

    /// One event.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewError::NotFound`] if it does not exist.
    pub async fn get_event(&self, id: EventId) -> Result<Event, ReviewError> {
        self.store
            .find_event(id)
            .await?
            .ok_or_else(|| ReviewError::NotFound(format!("event {id}")))
    }

    /// Grants the caller the `author` role in `event`. Open to any
    /// authenticated user.
    ///
    /// # Errors
    ///
    /// - [`ReviewError::NotFound`] if the event does not exist.
    /// - [`ReviewError::Conflict`] if the caller is already an author there.
    pub async fn register_as_author(&self, actor: Actor, event: EventId) -> Result<(), ReviewError> {
        self.get_event(event).await?;
        if !self
            .roles
            .grant_role(event, actor.user_id, EventRole::Author)
            .await?
        {
            return Err(ReviewError::Conflict(ConflictKind::AlreadyExists(
                "already registered as author".into(),
            )));
        }
        self.audit.record(AuditEntry::new(
            Some(actor.user_id),
            AuditAction::AuthorRegistered,
            EntityType::EventRole,
            event,
            json!({ "role": EventRole::Author.as_str() }),
        ));
        tracing::info!(event_id = %event, user_id = %actor.user_id, "author registered");
        Ok(())
    }

    /// Grants `role` to `user`. Chairs and administrators only.
    ///
    /// # Errors
    ///
    /// - [`ReviewError::Forbidden`] without the chair role.
    /// - [`ReviewError::NotFound`] if the user does not exist.
    /// - [`ReviewError::Conflict`] if the grant already exists.
    pub async fn grant_role(
        &self,
        access: &EventAccess,
        user: UserId,
        role: EventRole,
    ) -> Result<(), ReviewError> {
        access.require_role(&[EventRole::Chair])?;
        if self.store.find_user(user).await?.is_none() {
            return Err(ReviewError::NotFound(format!("user {user}")));
        }
        if !self.roles.grant_role(access.event_id(), user, role).await? {
            return Err(ReviewError::Conflict(ConflictKind::AlreadyExists(format!(
                "user {user} already holds {role}"
            ))));
        }
        self.record_role_change(access, AuditAction::RoleGranted, user, role);
        tracing::info!(event_id = %access.event_id(), %user, role = role.as_str(), "role granted");
        Ok(())
    }

    /// Revokes `role` from `user`. Reviews the user already wrote are kept.
    ///
    /// # Errors
    ///
    /// - [`ReviewError::Forbidden`] without the chair role.
    /// - [`ReviewError::NotFound`] if the grant does not exist.
    pub async fn revoke_role(
        &self,
        access: &EventAccess,
        user: UserId,
        role: EventRole,
    ) -> Result<(), ReviewError> {
        access.require_role(&[EventRole::Chair])?;
        if !self.roles.revoke_role(access.event_id(), user, role).await? {
            return Err(ReviewError::NotFound(format!(
                "user {user} does not hold {role}"
            )));
        }
        self.record_role_change(access, AuditAction::RoleRevoked, user, role);
        tracing::info!(event_id = %access.event_id(), %user, role = role.as_str(), "role revoked");
        Ok(())
    }

    fn record_role_change(
        &self,
        access: &EventAccess,
        action: AuditAction,
        user: UserId,
        role: EventRole,
    ) {
        self.audit.record(AuditEntry::new(
            Some(access.actor()),
            action,
            EntityType::EventRole,
            access.event_id(),
            json!({ "user_id": user, "role": role.as_str() }),
        ));
    }

    /// Every role grant in the event.
    ///
    /// # Errors
    ///
    /// - [`ReviewError::Forbidden`] without the chair role.
    /// - [`ReviewError::Persistence`] if the store fails.
    pub async fn list_event_members(
        &self,
        access: &EventAccess,
    ) -> Result<Vec<EventMember>, ReviewError> {
        access.require_role(&[EventRole::Chair])?;
        self.roles.list_members(access.event_id()).await
    }

    /// Reviewers of the event with their total assignment count.
    ///
    /// # Errors
    ///
    /// - [`ReviewError::Forbidden`] without the chair role.
    /// - [`ReviewError::Persistence`] if the store fails.
    pub async fn list_event_reviewers(
        &self,
        access: &EventAccess,
    ) -> Result<Vec<ReviewerSummary>, ReviewError> {
        access.require_role(&[EventRole::Chair])?;
        self.roles.list_reviewers(access.event_id()).await
    }
}
