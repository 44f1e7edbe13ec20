//! Event-scoped roles.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Role a user holds inside one event. Stored in `event_roles.role`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum EventRole {
    /// May submit papers to the event.
    Author,
    /// May be assigned papers and score them.
    Reviewer,
    /// May read the decision queue and record decisions, nothing else.
    DecisionMaker,
    /// Runs the event: assigns reviewers, decides, manages roles.
    Chair,
}

impl EventRole {
    /// Every role, in privilege order.
    pub const ALL: [Self; 4] = [
        Self::Author,
        Self::Reviewer,
        Self::DecisionMaker,
        Self::Chair,
    ];

    /// Database / wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Author => "author",
            Self::Reviewer => "reviewer",
            Self::DecisionMaker => "decision_maker",
            Self::Chair => "chair",
        }
    }
}

impl fmt::Display for EventRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "author" => Ok(Self::Author),
            "reviewer" => Ok(Self::Reviewer),
            "decision_maker" => Ok(Self::DecisionMaker),
            "chair" => Ok(Self::Chair),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// The roles a user effectively holds in one event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct RoleSet(BTreeSet<EventRole>);

impl RoleSet {
    /// The empty set.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Every role. What an administrator resolves to.
    #[must_use]
    pub fn all() -> Self {
        Self(EventRole::ALL.into_iter().collect())
    }

    /// Whether `role` is held.
    #[must_use]
    pub fn contains(&self, role: EventRole) -> bool {
        self.0.contains(&role)
    }

    /// Whether any of `allowed` is held.
    #[must_use]
    pub fn intersects(&self, allowed: &[EventRole]) -> bool {
        allowed.iter().any(|r| self.0.contains(r))
    }

    /// `true` when no role is held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates roles in privilege order.
    pub fn iter(&self) -> impl Iterator<Item = EventRole> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<EventRole> for RoleSet {
    fn from_iter<I: IntoIterator<Item = EventRole>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_contains_every_role() {
        let set = RoleSet::all();
        for role in EventRole::ALL {
            assert!(set.contains(role));
        }
    }

    #[test]
    fn intersects_any_allowed_role() {
        let set: RoleSet = [EventRole::Author].into_iter().collect();
        assert!(set.intersects(&[EventRole::Chair, EventRole::Author]));
        assert!(!set.intersects(&[EventRole::Reviewer]));
        assert!(!set.intersects(&[]));
    }

    #[test]
    fn parses_role_names() {
        assert_eq!("Reviewer".parse::<EventRole>(), Ok(EventRole::Reviewer));
        assert_eq!(
            "decision_maker".parse::<EventRole>(),
            Ok(EventRole::DecisionMaker)
        );
        assert!("committee".parse::<EventRole>().is_err());
    }

    #[test]
    fn serializes_as_sorted_list() {
        let set: RoleSet = [EventRole::Chair, EventRole::Author].into_iter().collect();
        let json = serde_json::to_string(&set).unwrap_or_default();
        assert_eq!(json, r#"["author","chair"]"#);
    }
}
