//! Fire-and-forget audit sink backed by a broadcast channel.
//!
//! [`AuditBus`] wraps a [`tokio::sync::broadcast`] channel. Engines record
//! through the [`AuditSink`] trait; the binary subscribes an
//! [`crate::persistence::AuditWriter`] that persists entries to
//! `audit_logs`. Tests subscribe directly to assert on what was recorded.

use std::fmt;

use tokio::sync::broadcast;

use super::audit::{AuditEntry, Severity};

/// Destination for audit records.
///
/// `record` never fails from the caller's point of view. Implementations
/// swallow and log their own errors so that auditing can never mask or
/// replace the result of the operation being audited.
pub trait AuditSink: Send + Sync + fmt::Debug {
    /// Records one entry.
    fn record(&self, entry: AuditEntry);
}

/// Broadcast bus for [`AuditEntry`]s.
///
/// Backed by a `tokio::broadcast` channel with a configurable capacity.
/// When the ring buffer is full, the oldest entries are dropped for lagging
/// receivers. Every entry is also emitted as a `tracing` event, so nothing
/// is lost from the logs when no writer is attached.
#[derive(Debug, Clone)]
pub struct AuditBus {
    sender: broadcast::Sender<AuditEntry>,
}

impl AuditBus {
    /// Creates a new `AuditBus` with the given channel capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes an entry to all subscribers.
    ///
    /// Returns the number of receivers that got it. With no receivers the
    /// entry is silently dropped.
    pub fn publish(&self, entry: AuditEntry) -> usize {
        self.sender.send(entry).unwrap_or(0)
    }

    /// Creates a receiver for all future entries.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<AuditEntry> {
        self.sender.subscribe()
    }

    /// Returns the current number of active receivers.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl AuditSink for AuditBus {
    fn record(&self, entry: AuditEntry) {
        let trace_id = entry.trace_id;
        let action = entry.action.as_str();
        let actor = entry.actor.map(|a| a.get());
        let entity = entry.entity_id.as_str();
        match entry.severity {
            Severity::Error => {
                tracing::error!(%trace_id, action, ?actor, entity, details = %entry.details, "audit");
            }
            Severity::Warn => {
                tracing::warn!(%trace_id, action, ?actor, entity, details = %entry.details, "audit");
            }
            Severity::Info => {
                tracing::info!(%trace_id, action, ?actor, entity, details = %entry.details, "audit");
            }
            Severity::Debug => {
                tracing::debug!(%trace_id, action, ?actor, entity, details = %entry.details, "audit");
            }
        }
        let _ = self.publish(entry);
    }
}
