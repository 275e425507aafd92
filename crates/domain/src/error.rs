//! Common error types used across the workspace.
//!
//! Every layer defines its own typed errors and converts into
//! [`AreaFlowError`] via `From`. Callers branch on [`AreaFlowError::kind`]
//! rather than on the concrete source type.

use std::fmt;

/// Discriminant describing which family an [`AreaFlowError`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    Provider,
    Storage,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Validation => "validation",
            Self::NotFound => "not_found",
            Self::Conflict => "conflict",
            Self::Provider => "provider",
            Self::Storage => "storage",
        };
        f.write_str(label)
    }
}

/// Top-level error returned by every fallible operation in areaflow.
#[derive(Debug, thiserror::Error)]
pub enum AreaFlowError {
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("{0}")]
    NotFound(#[from] NotFoundError),

    #[error("conflict: {0}")]
    Conflict(#[from] ConflictError),

    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("storage error")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl AreaFlowError {
    /// The family this error belongs to.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::Provider(_) => ErrorKind::Provider,
            Self::Storage(_) => ErrorKind::Storage,
        }
    }
}

/// Malformed input rejected before reaching storage or a provider.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("name must not be empty")]
    EmptyName,

    #[error("access token must not be empty")]
    EmptyAccessToken,

    #[error("authorization code must not be empty")]
    EmptyAuthorizationCode,
}

/// A record looked up by key does not exist.
///
/// `entity` names what was looked up; two lookups of the same link can fail
/// with different entities (for example a missing link versus a link that
/// holds no refresh token) while sharing the same [`ErrorKind`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{entity} not found: {id}")]
pub struct NotFoundError {
    pub entity: &'static str,
    pub id: String,
}

/// The operation would violate a uniqueness or linkability rule.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConflictError {
    #[error("service account already linked for user {user_id} and service {service_id}")]
    AlreadyLinked { user_id: String, service_id: String },

    #[error("Cannot create OAuth2 account for a service that does not require authentication")]
    AuthenticationNotRequired { service_id: String },

    #[error("authorization code required")]
    AuthorizationCodeRequired,
}

/// An OAuth2 provider could not produce tokens or a profile.
///
/// Messages summarize the cause only. Client secrets and tokens are never
/// part of any variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    #[error("OAuth2 provider {provider} is not configured")]
    Unconfigured { provider: String },

    #[error("token exchange failed: {provider} responded {status}: {detail}")]
    ExchangeRejected {
        provider: String,
        status: u16,
        detail: String,
    },

    #[error("token refresh failed: {provider} responded {status}: {detail}")]
    RefreshRejected {
        provider: String,
        status: u16,
        detail: String,
    },

    #[error("user info request failed: {provider} responded {status}: {detail}")]
    UserInfoRejected {
        provider: String,
        status: u16,
        detail: String,
    },

    #[error("{provider} request failed: {detail}")]
    Transport { provider: String, detail: String },

    #[error("{provider} returned an unreadable response: {detail}")]
    InvalidResponse { provider: String, detail: String },
}
