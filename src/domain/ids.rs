//! Type-safe identifiers.
//!
//! Every entity key is a newtype around the `BIGSERIAL` value the database
//! hands out, so a [`SubmissionId`] can never be passed where a [`UserId`]
//! is expected. All of them serialize as plain JSON integers.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
            utoipa::ToSchema,
        )]
        #[serde(transparent)]
        #[schema(value_type = i64)]
        pub struct $name(i64);

        impl $name {
            /// Wraps a raw database key.
            #[must_use]
            pub const fn new(raw: i64) -> Self {
                Self(raw)
            }

            /// Returns the raw database key.
            #[must_use]
            pub const fn get(self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(raw: i64) -> Self {
                Self(raw)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

id_type!(
    /// Account identifier. Authors, reviewers, chairs and admins share this space.
    UserId
);
id_type!(
    /// Conference event identifier.
    EventId
);
id_type!(
    /// Paper submission identifier.
    SubmissionId
);
id_type!(
    /// Invited reviewer without an account, addressed by invitation token.
    ExternalReviewerId
);

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn display_is_raw_number() {
        assert_eq!(SubmissionId::new(42).to_string(), "42");
    }

    #[test]
    fn serializes_transparently() {
        let Ok(json) = serde_json::to_string(&UserId::new(7)) else {
            panic!("serialization failed");
        };
        assert_eq!(json, "7");
        let Ok(back) = serde_json::from_str::<UserId>("7") else {
            panic!("deserialization failed");
        };
        assert_eq!(back, UserId::new(7));
    }

    #[test]
    fn ordering_follows_raw_value() {
        let mut ids = vec![EventId::new(3), EventId::new(1), EventId::new(2)];
        ids.sort();
        assert_eq!(ids, vec![EventId::new(1), EventId::new(2), EventId::new(3)]);
    }
}
