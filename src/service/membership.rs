//! Membership check collaborator consulted by the final-submission gate.

use std::fmt;

use async_trait::async_trait;
use serde::Serialize;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use crate::domain::text::normalize_email;
use crate::error::ReviewError;

/// Outcome of a membership lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MembershipVerdict {
    /// Whether the upload may proceed.
    pub ok: bool,
    /// Why not, or why the check was skipped.
    pub reason: Option<String>,
}

impl MembershipVerdict {
    /// A passing verdict.
    #[must_use]
    pub fn pass() -> Self {
        Self {
            ok: true,
            reason: None,
        }
    }

    /// A failing verdict with `reason`.
    #[must_use]
    pub fn fail(reason: impl Into<String>) -> Self {
        Self {
            ok: false,
            reason: Some(reason.into()),
        }
    }

    /// The verdict used when enforcement is switched off.
    #[must_use]
    pub fn unconfigured() -> Self {
        Self {
            ok: true,
            reason: Some("unconfigured".into()),
        }
    }
}

/// Answers whether an email belongs to a member in good standing.
///
/// Lookup failures are verdicts (`reason = "error"`), never errors.
#[async_trait]
pub trait MembershipCheck: Send + Sync + fmt::Debug {
    /// Checks `email`.
    async fn check(&self, email: Option<&str>) -> MembershipVerdict;
}

/// Fixed verdict for every email.
#[derive(Debug, Clone)]
pub struct StaticMembershipCheck {
    verdict: MembershipVerdict,
}

impl StaticMembershipCheck {
    /// Returns `verdict` for every lookup.
    #[must_use]
    pub const fn new(verdict: MembershipVerdict) -> Self {
        Self { verdict }
    }

    /// Fails every lookup with `unconfigured`; used when enforcement is on
    /// but no membership database is set.
    #[must_use]
    pub fn unavailable() -> Self {
        Self::new(MembershipVerdict::fail("unconfigured"))
    }
}

#[async_trait]
impl MembershipCheck for StaticMembershipCheck {
    async fn check(&self, _email: Option<&str>) -> MembershipVerdict {
        self.verdict.clone()
    }
}

/// Reads `member_status_v` from a read-only membership database.
///
/// A member passes when their account is `active` or `approved` and paid.
#[derive(Debug, Clone)]
pub struct PostgresMembershipCheck {
    pool: PgPool,
}

#[derive(Debug, sqlx::FromRow)]
struct MemberStatusRow {
    account_status: Option<String>,
    is_paid: Option<bool>,
}

impl PostgresMembershipCheck {
    /// Wraps an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a small lazy pool against `url`.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewError::Internal`] if the URL cannot be parsed.
    pub fn connect_lazy(url: &str) -> Result<Self, ReviewError> {
        let pool = PgPoolOptions::new()
            .max_connections(3)
            .connect_lazy(url)
            .map_err(|e| ReviewError::Internal(format!("membership database: {e}")))?;
        Ok(Self::new(pool))
    }
}

#[async_trait]
impl MembershipCheck for PostgresMembershipCheck {
    async fn check(&self, email: Option<&str>) -> MembershipVerdict {
        let Some(email) = email.and_then(normalize_email) else {
            return MembershipVerdict::fail("invalid_email");
        };
        let row = sqlx::query_as::<_, MemberStatusRow>(
            "SELECT account_status, is_paid FROM public.member_status_v \
             WHERE LOWER(email) = $1 LIMIT 1",
        )
        .bind(&email)
        .fetch_optional(&self.pool)
        .await;

        match row {
            Ok(Some(row)) => verdict_for(row.account_status.as_deref(), row.is_paid),
            Ok(None) => MembershipVerdict::fail("invalid"),
            Err(e) => {
                tracing::error!(error = %e, "membership lookup failed");
                MembershipVerdict::fail("error")
            }
        }
    }
}

fn verdict_for(account_status: Option<&str>, is_paid: Option<bool>) -> MembershipVerdict {
    let status_ok = account_status
        .map(str::to_lowercase)
        .is_some_and(|s| s == "active" || s == "approved");
    if status_ok && is_paid.unwrap_or(false) {
        MembershipVerdict::pass()
    } else {
        MembershipVerdict::fail("invalid")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paid_active_members_pass() {
        assert!(verdict_for(Some("Active"), Some(true)).ok);
        assert!(verdict_for(Some("approved"), Some(true)).ok);
    }

    #[test]
    fn unpaid_or_inactive_members_fail() {
        assert_eq!(
            verdict_for(Some("active"), Some(false)),
            MembershipVerdict::fail("invalid")
        );
        assert!(!verdict_for(Some("suspended"), Some(true)).ok);
        assert!(!verdict_for(None, None).ok);
    }

    #[tokio::test]
    async fn static_check_returns_its_verdict() {
        let check = StaticMembershipCheck::unavailable();
        assert_eq!(
            check.check(Some("a@b.org")).await,
            MembershipVerdict::fail("unconfigured")
        );
    }
}
