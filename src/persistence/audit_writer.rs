//! Background task persisting audit entries from the bus into `audit_logs`.

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use super::ReviewStore;
use crate::domain::{AuditBus, AuditEntry};

/// Drains an [`AuditBus`] subscription into a [`ReviewStore`].
///
/// Write failures are logged and dropped; the writer only stops when the bus
/// closes.
#[derive(Debug)]
pub struct AuditWriter {
    store: Arc<dyn ReviewStore>,
    rx: broadcast::Receiver<AuditEntry>,
}

impl AuditWriter {
    /// Subscribes to `bus`. Entries published before this call are not seen.
    #[must_use]
    pub fn new(store: Arc<dyn ReviewStore>, bus: &AuditBus) -> Self {
        Self {
            store,
            rx: bus.subscribe(),
        }
    }

    /// Runs the writer on the current runtime.
    #[must_use]
    pub fn spawn(self) -> JoinHandle<u64> {
        tokio::spawn(self.run())
    }

    /// Persists entries until the bus closes. Returns the number written.
    pub async fn run(mut self) -> u64 {
        let mut written = 0_u64;
        loop {
            match self.rx.recv().await {
                Ok(entry) => match self.store.save_audit_entry(&entry).await {
                    Ok(()) => written += 1,
                    Err(e) => {
                        tracing::warn!(
                            trace_id = %entry.trace_id,
                            action = entry.action.as_str(),
                            error = %e,
                            "audit entry not persisted"
                        );
                    }
                },
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(lagged = n, "audit writer lagged behind audit bus");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
        tracing::debug!(written, "audit writer stopped");
        written
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::{AuditAction, AuditSink, EntityType};
    use crate::persistence::MemoryStore;

    #[tokio::test]
    async fn persists_until_bus_closes() {
        let store = MemoryStore::new();
        let bus = AuditBus::new(8);
        let handle = AuditWriter::new(Arc::new(store.clone()), &bus).spawn();

        bus.record(AuditEntry::new(
            None,
            AuditAction::ExternalReviewSubmitted,
            EntityType::Submission,
            3,
            serde_json::json!({ "token": "secret" }),
        ));
        drop(bus);

        let Ok(written) = handle.await else {
            panic!("writer task panicked");
        };
        assert_eq!(written, 1);
        let entries = store.audit_entries().await;
        assert_eq!(entries.len(), 1);
        assert_eq!(
            entries.first().map(|e| e.details.clone()),
            Some(serde_json::json!({ "token": "[REDACTED]" }))
        );
    }
}
