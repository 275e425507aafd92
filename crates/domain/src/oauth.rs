//! OAuth2 value objects shared by the link coordinator and provider clients.

use crate::secret::SecretString;
use crate::time::{Timestamp, seconds_after};

/// Tokens issued by a provider, normalized across providers.
#[derive(Debug, Clone)]
pub struct TokenGrant {
    pub access_token: SecretString,
    /// Absent when the provider does not issue or rotate refresh tokens.
    pub refresh_token: Option<SecretString>,
    /// Absent when the provider reports no lifetime for the access token.
    pub expires_at: Option<Timestamp>,
    pub extras: TokenExtras,
}

impl TokenGrant {
    /// Build a grant whose expiry is `issued_at + expires_in` seconds.
    ///
    /// A lifetime too large to represent leaves the expiry unknown; token
    /// response parsers reject such values before getting here.
    #[must_use]
    pub fn issued(
        access_token: SecretString,
        refresh_token: Option<SecretString>,
        expires_in: Option<i64>,
        issued_at: Timestamp,
    ) -> Self {
        Self {
            access_token,
            refresh_token,
            expires_at: expires_in.and_then(|secs| seconds_after(issued_at, secs)),
            extras: TokenExtras::default(),
        }
    }

    #[must_use]
    pub fn with_extras(mut self, extras: TokenExtras) -> Self {
        self.extras = extras;
        self
    }
}

/// Provider-specific fields kept beside the core token triple.
#[derive(Debug, Clone, Default)]
pub struct TokenExtras {
    pub id_token: Option<SecretString>,
    pub scope: Option<String>,
    pub token_type: Option<String>,
}

/// Input of an authorization-code exchange.
#[derive(Debug, Clone)]
pub struct CodeExchange {
    pub code: SecretString,
    /// Overrides the redirect URI configured for the provider.
    pub redirect_uri: Option<String>,
    /// PKCE verifier matching the challenge sent with the authorize request.
    pub code_verifier: Option<SecretString>,
}

impl CodeExchange {
    #[must_use]
    pub fn new(code: impl Into<SecretString>) -> Self {
        Self {
            code: code.into(),
            redirect_uri: None,
            code_verifier: None,
        }
    }
}

/// Display-only profile of the account behind an access token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderProfile {
    pub account_id: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_compute_expiry_from_issue_time_and_ttl() {
        let issued_at: Timestamp = "2024-01-01T12:00:00Z".parse().unwrap();
        let grant = TokenGrant::issued("at".into(), None, Some(3600), issued_at);
        assert_eq!(
            grant.expires_at,
            Some("2024-01-01T13:00:00Z".parse().unwrap())
        );
    }

    #[test]
    fn should_not_panic_on_unrepresentable_ttl() {
        let grant = TokenGrant::issued("at".into(), None, Some(i64::MAX), crate::time::now());
        assert!(grant.expires_at.is_none());
    }

    #[test]
    fn should_leave_expiry_empty_without_ttl() {
        let grant = TokenGrant::issued("at".into(), Some("rt".into()), None, crate::time::now());
        assert!(grant.expires_at.is_none());
        assert!(grant.refresh_token.is_some());
    }
}
