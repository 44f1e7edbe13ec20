//! Audit records emitted after every state-changing operation.
//!
//! Every mutation publishes an [`AuditEntry`] through an
//! [`super::AuditSink`]. Entries are fire-and-forget: a sink may drop them,
//! and a failure to record one never reaches the caller of the operation.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use uuid::Uuid;

use super::ids::UserId;

/// Longest string kept verbatim in audit details.
const MAX_DETAIL_STR: usize = 1000;
/// Longest array kept in audit details.
const MAX_DETAIL_ITEMS: usize = 100;
/// Detail keys whose values are never recorded.
const REDACTED_KEYS: [&str; 6] = [
    "password",
    "token",
    "session_token",
    "authorization",
    "cookie",
    "set-cookie",
];

/// Severity of an audit record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Diagnostic detail.
    Debug,
    /// Normal operation.
    Info,
    /// Refused or suspicious operation.
    Warn,
    /// Operation failed server-side.
    Error,
}

impl Severity {
    /// Database representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// What was done.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// Administrator created an event.
    EventCreated,
    /// Role granted inside an event.
    RoleGranted,
    /// Role revoked inside an event.
    RoleRevoked,
    /// User registered as author for an event.
    AuthorRegistered,
    /// Author created a submission.
    SubmissionCreated,
    /// Chair assigned reviewers.
    ReviewersAssigned,
    /// Chair unassigned reviewers.
    ReviewersUnassigned,
    /// Chair invited an external reviewer.
    ExternalReviewerInvited,
    /// Reviewer submitted or overwrote a review.
    ReviewSubmitted,
    /// External reviewer submitted or overwrote a review.
    ExternalReviewSubmitted,
    /// Decision recorded.
    DecisionMade,
    /// Decision transaction failed.
    DecisionFailed,
    /// Camera-ready accepted.
    FinalUploaded,
    /// Camera-ready blocked by the membership check.
    FinalCheckFailed,
    /// Authorization gate refused a request.
    AccessDenied,
}

impl AuditAction {
    /// Dotted action name stored in `audit_logs.action`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::EventCreated => "admin.create_event",
            Self::RoleGranted => "event.role_grant",
            Self::RoleRevoked => "event.role_revoke",
            Self::AuthorRegistered => "event.register",
            Self::SubmissionCreated => "submission.create",
            Self::ReviewersAssigned => "chair.assign",
            Self::ReviewersUnassigned => "chair.unassign",
            Self::ExternalReviewerInvited => "chair.external_invite",
            Self::ReviewSubmitted => "review.submit",
            Self::ExternalReviewSubmitted => "external_review.submit",
            Self::DecisionMade => "chair.decision",
            Self::DecisionFailed => "chair.decision.error",
            Self::FinalUploaded => "final.upload_ok",
            Self::FinalCheckFailed => "final.check_failed",
            Self::AccessDenied => "authz.forbidden",
        }
    }
}

/// Entity kind an audit record refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    /// An event.
    Event,
    /// A submission.
    Submission,
    /// An event role grant.
    EventRole,
}

impl EntityType {
    /// Database representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Event => "event",
            Self::Submission => "submission",
            Self::EventRole => "event_role",
        }
    }
}

/// One audit record.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    /// Correlates all records written for one request.
    pub trace_id: Uuid,
    /// Acting user; `None` for token-authenticated external reviewers.
    pub actor: Option<UserId>,
    /// What was done.
    pub action: AuditAction,
    /// Kind of entity touched.
    pub entity_type: EntityType,
    /// Key of the entity touched.
    pub entity_id: String,
    /// Severity.
    pub severity: Severity,
    /// Sanitized, action-specific details.
    pub details: Value,
    /// Emission time.
    pub timestamp: DateTime<Utc>,
}

impl AuditEntry {
    /// Builds an `info` record with a fresh trace id. Details are sanitized.
    #[must_use]
    pub fn new(
        actor: Option<UserId>,
        action: AuditAction,
        entity_type: EntityType,
        entity_id: impl ToString,
        details: Value,
    ) -> Self {
        Self {
            trace_id: Uuid::new_v4(),
            actor,
            action,
            entity_type,
            entity_id: entity_id.to_string(),
            severity: Severity::Info,
            details: sanitize_details(details),
            timestamp: Utc::now(),
        }
    }

    /// Overrides the severity.
    #[must_use]
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    /// Reuses an existing trace id.
    #[must_use]
    pub fn with_trace(mut self, trace_id: Uuid) -> Self {
        self.trace_id = trace_id;
        self
    }
}

/// Redacts secret-looking keys, trims long strings and caps arrays.
///
/// Non-object input is wrapped as `{"value": ...}`. Nested objects are kept
/// one level deep; deeper values collapse to `"[object]"`.
#[must_use]
pub fn sanitize_details(details: Value) -> Value {
    let source = match details {
        Value::Object(map) => map,
        other => {
            let mut map = Map::new();
            map.insert("value".to_string(), other);
            map
        }
    };

    let mut out = Map::with_capacity(source.len());
    for (key, value) in source {
        if is_redacted(&key) {
            out.insert(key, Value::String("[REDACTED]".to_string()));
            continue;
        }
        let cleaned = match value {
            Value::Object(inner) => Value::Object(
                inner
                    .into_iter()
                    .map(|(k, v)| {
                        let v = match v {
                            Value::Object(_) | Value::Array(_) => {
                                Value::String("[object]".to_string())
                            }
                            scalar => trim_scalar(scalar),
                        };
                        (k, v)
                    })
                    .collect(),
            ),
            Value::Array(items) => {
                Value::Array(items.into_iter().take(MAX_DETAIL_ITEMS).collect())
            }
            scalar => trim_scalar(scalar),
        };
        out.insert(key, cleaned);
    }
    Value::Object(out)
}

fn is_redacted(key: &str) -> bool {
    let lower = key.to_ascii_lowercase();
    REDACTED_KEYS.contains(&lower.as_str())
}

fn trim_scalar(value: Value) -> Value {
    match value {
        Value::String(s) if s.chars().count() > MAX_DETAIL_STR => {
            let total = s.chars().count();
            let kept: String = s.chars().take(MAX_DETAIL_STR).collect();
            Value::String(format!("{kept}…[trimmed {}]", total - MAX_DETAIL_STR))
        }
        other => other,
    }
}

#[cfg(test)]
#[allow(clippy::indexing_slicing)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn redacts_secret_keys() {
        let cleaned = sanitize_details(json!({
            "Token": "abc",
            "password": "hunter2",
            "event_id": 4,
        }));
        assert_eq!(cleaned["Token"], "[REDACTED]");
        assert_eq!(cleaned["password"], "[REDACTED]");
        assert_eq!(cleaned["event_id"], 4);
    }

    #[test]
    fn trims_long_strings_and_arrays() {
        let long = "x".repeat(1500);
        let many: Vec<u32> = (0..250).collect();
        let cleaned = sanitize_details(json!({ "text": long, "ids": many }));
        let text = cleaned["text"].as_str().unwrap_or_default();
        assert!(text.ends_with("…[trimmed 500]"));
        assert_eq!(cleaned["ids"].as_array().map(Vec::len), Some(100));
    }

    #[test]
    fn wraps_scalars_and_flattens_nesting() {
        assert_eq!(sanitize_details(json!(5)), json!({ "value": 5 }));
        let cleaned = sanitize_details(json!({ "outer": { "inner": { "deep": 1 }, "n": 2 } }));
        assert_eq!(cleaned["outer"]["inner"], "[object]");
        assert_eq!(cleaned["outer"]["n"], 2);
    }

    #[test]
    fn action_names_are_dotted() {
        assert_eq!(AuditAction::ReviewersAssigned.as_str(), "chair.assign");
        assert_eq!(AuditAction::FinalUploaded.as_str(), "final.upload_ok");
    }
}
