//! Identifiers for users, catalog services, linked accounts, AREAs and
//! executions.
//!
//! Each id is a random v4 UUID. Storage and the CLI carry them as the
//! canonical lowercase hyphenated text produced by `Display`, and parse them
//! back with `FromStr`; JSON views serialize them as that same bare string.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

macro_rules! define_id {
    ($($(#[doc = $doc:expr])* $name:ident;)+) => {$(
        $(#[doc = $doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(uuid::Uuid);

        impl Default for $name {
            fn default() -> Self {
                Self(uuid::Uuid::new_v4())
            }
        }

        impl $name {
            /// Assign a fresh random id.
            #[must_use]
            pub fn new() -> Self {
                Self::default()
            }

            #[must_use]
            pub fn from_uuid(uuid: uuid::Uuid) -> Self {
                Self(uuid)
            }

            #[must_use]
            pub fn as_uuid(self) -> uuid::Uuid {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.as_hyphenated().fmt(f)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                uuid::Uuid::parse_str(s).map(Self)
            }
        }
    )+};
}

define_id! {
    /// A platform [`User`](crate::user::User). Owned by the user store and
    /// only read here.
    UserId;

    /// A catalog [`Service`](crate::service::Service) such as Google or
    /// GitHub.
    ServiceId;

    /// Surrogate key of a [`ServiceAccountLink`](crate::account_link::ServiceAccountLink).
    ///
    /// Stable across relinks: the (user, service) pair keeps the id it got on
    /// first link.
    ServiceAccountId;

    /// An AREA, the pairing of a trigger action with a reaction.
    AreaId;

    /// One run of an AREA, see
    /// [`ExecutionRecord`](crate::execution::ExecutionRecord).
    ExecutionId;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_assign_distinct_execution_ids() {
        assert_ne!(ExecutionId::new(), ExecutionId::new());
    }

    #[test]
    fn should_display_canonical_lowercase_text() {
        let uuid = uuid::Uuid::parse_str("6F9619FF-8B86-D011-B42D-00C04FC964FF").unwrap();
        let id = ServiceAccountId::from_uuid(uuid);

        assert_eq!(id.to_string(), "6f9619ff-8b86-d011-b42d-00c04fc964ff");
        assert_eq!(id.as_uuid(), uuid);
    }

    #[test]
    fn should_parse_back_what_storage_writes() {
        let id = ServiceId::new();
        let parsed: ServiceId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn should_serialize_as_bare_string() {
        let id = AreaId::new();
        let json = serde_json::to_value(id).unwrap();

        assert_eq!(json, serde_json::Value::String(id.to_string()));
        assert_eq!(serde_json::from_value::<AreaId>(json).unwrap(), id);
    }

    #[test]
    fn should_reject_malformed_user_id() {
        assert!(UserId::from_str("not-a-uuid").is_err());
        assert!(UserId::from_str("").is_err());
    }
}
