//! User — a platform account that owns service links and AREAs.

use serde::{Deserialize, Serialize};

use crate::id::UserId;

/// A platform user, consumed read-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub name: Option<String>,
}

impl User {
    /// Non-secret summary embedded in read-side representations.
    #[must_use]
    pub fn summary(&self) -> UserSummary {
        UserSummary {
            id: self.id,
            email: self.email.clone(),
            name: self.name.clone(),
        }
    }
}

/// Identity fields of a [`User`] exposed next to a linked account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: UserId,
    pub email: String,
    pub name: Option<String>,
}
