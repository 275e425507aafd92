//! Service account link — the stored OAuth2 credential tying a platform user
//! to one external provider account.
//!
//! There is at most one link per `(user_id, service_id)`. The write side
//! ([`ServiceAccountLink`]) holds raw tokens inside [`SecretString`]s and is
//! deliberately not `Serialize`; everything returned across the component
//! boundary goes through [`ServiceAccountView`], which carries identity
//! fields only.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::error::{AreaFlowError, ValidationError};
use crate::id::{ServiceAccountId, ServiceId, UserId};
use crate::oauth::{ProviderProfile, TokenGrant};
use crate::secret::SecretString;
use crate::service::{Service, ServiceSummary};
use crate::time::Timestamp;
use crate::user::{User, UserSummary};

/// Stored credential for one `(user, service)` pair.
#[derive(Debug, Clone)]
pub struct ServiceAccountLink {
    pub id: ServiceAccountId,
    pub user_id: UserId,
    pub service_id: ServiceId,
    pub access_token: SecretString,
    pub refresh_token: Option<SecretString>,
    pub token_expires_at: Option<Timestamp>,
    pub provider_account_id: Option<String>,
    pub email: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl ServiceAccountLink {
    /// Build a fresh link from a successful code exchange.
    #[must_use]
    pub fn from_grant(
        user_id: UserId,
        service_id: ServiceId,
        grant: TokenGrant,
        at: Timestamp,
    ) -> Self {
        Self {
            id: ServiceAccountId::new(),
            user_id,
            service_id,
            access_token: grant.access_token,
            refresh_token: grant.refresh_token,
            token_expires_at: grant.expires_at,
            provider_account_id: None,
            email: None,
            created_at: at,
            updated_at: at,
        }
    }

    /// Store the tokens of a refresh response.
    ///
    /// Providers that never rotate refresh tokens omit them from refresh
    /// responses; the previous refresh token is kept in that case.
    pub fn apply_refresh(&mut self, grant: TokenGrant, at: Timestamp) {
        self.access_token = grant.access_token;
        if let Some(refresh_token) = grant.refresh_token {
            self.refresh_token = Some(refresh_token);
        }
        self.token_expires_at = grant.expires_at;
        self.updated_at = at;
    }

    /// Record the display identity reported by the provider.
    pub fn apply_profile(&mut self, profile: &ProviderProfile) {
        self.provider_account_id = Some(profile.account_id.clone());
        if profile.email.is_some() {
            self.email.clone_from(&profile.email);
        }
    }

    /// Whether the access token is expired or expires within `skew`.
    ///
    /// Tokens without a known expiry are treated as valid.
    #[must_use]
    pub fn expires_within(&self, at: Timestamp, skew: Duration) -> bool {
        self.token_expires_at
            .is_some_and(|expires_at| expires_at <= at + skew)
    }

    /// `user_id/service_id`, used as the identifier in error messages.
    #[must_use]
    pub fn key_label(user_id: UserId, service_id: ServiceId) -> String {
        format!("{user_id}/{service_id}")
    }

    /// Read-side representation with every token secret stripped.
    #[must_use]
    pub fn view(&self, user: &User, service: &Service) -> ServiceAccountView {
        ServiceAccountView {
            id: self.id,
            provider_account_id: self.provider_account_id.clone(),
            email: self.email.clone(),
            token_expires_at: self.token_expires_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
            user: user.summary(),
            service: service.summary(),
        }
    }
}

/// Input of the user-level account creation path, which receives tokens
/// obtained elsewhere instead of exchanging a code.
#[derive(Debug, Clone)]
pub struct NewServiceAccount {
    pub user_id: UserId,
    pub service_id: ServiceId,
    pub access_token: SecretString,
    pub refresh_token: Option<SecretString>,
    pub token_expires_at: Option<Timestamp>,
    pub provider_account_id: Option<String>,
    pub email: Option<String>,
}

impl NewServiceAccount {
    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`AreaFlowError::Validation`] when the access token is empty.
    pub fn validate(&self) -> Result<(), AreaFlowError> {
        if self.access_token.is_empty() {
            return Err(ValidationError::EmptyAccessToken.into());
        }
        Ok(())
    }

    #[must_use]
    pub fn into_link(self, at: Timestamp) -> ServiceAccountLink {
        ServiceAccountLink {
            id: ServiceAccountId::new(),
            user_id: self.user_id,
            service_id: self.service_id,
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            token_expires_at: self.token_expires_at,
            provider_account_id: self.provider_account_id,
            email: self.email,
            created_at: at,
            updated_at: at,
        }
    }
}

/// What callers outside the core get to see of a linked account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceAccountView {
    pub id: ServiceAccountId,
    pub provider_account_id: Option<String>,
    pub email: Option<String>,
    pub token_expires_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub user: UserSummary,
    pub service: ServiceSummary,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oauth::TokenExtras;
    use crate::time::now;

    fn grant(access: &str, refresh: Option<&str>) -> TokenGrant {
        TokenGrant {
            access_token: access.into(),
            refresh_token: refresh.map(SecretString::from),
            expires_at: None,
            extras: TokenExtras::default(),
        }
    }

    fn link() -> ServiceAccountLink {
        ServiceAccountLink::from_grant(
            UserId::new(),
            ServiceId::new(),
            grant("first", Some("refresh-1")),
            now(),
        )
    }

    #[test]
    fn should_keep_previous_refresh_token_when_refresh_omits_it() {
        let mut link = link();
        link.apply_refresh(grant("second", None), now());
        assert_eq!(link.access_token.expose(), "second");
        assert_eq!(link.refresh_token.unwrap().expose(), "refresh-1");
    }

    #[test]
    fn should_rotate_refresh_token_when_provider_returns_one() {
        let mut link = link();
        link.apply_refresh(grant("second", Some("refresh-2")), now());
        assert_eq!(link.refresh_token.unwrap().expose(), "refresh-2");
    }

    #[test]
    fn should_report_expiry_within_skew() {
        let at: Timestamp = "2024-01-01T12:00:00Z".parse().unwrap();
        let mut link = link();
        link.token_expires_at = Some("2024-01-01T12:00:30Z".parse().unwrap());
        assert!(link.expires_within(at, Duration::seconds(60)));
        assert!(!link.expires_within(at, Duration::seconds(10)));

        link.token_expires_at = None;
        assert!(!link.expires_within(at, Duration::seconds(60)));
    }

    #[test]
    fn should_not_leak_tokens_in_view_or_debug() {
        let link = link();
        let user = User {
            id: link.user_id,
            email: "ada@example.com".to_string(),
            name: None,
        };
        let service = Service::builder()
            .id(link.service_id)
            .name("google")
            .build()
            .unwrap();

        let json = serde_json::to_string(&link.view(&user, &service)).unwrap();
        assert!(!json.contains("first"));
        assert!(!json.contains("refresh-1"));
        assert!(json.contains("ada@example.com"));

        let debug = format!("{link:?}");
        assert!(!debug.contains("refresh-1"));
    }

    #[test]
    fn should_reject_new_account_without_access_token() {
        let account = NewServiceAccount {
            user_id: UserId::new(),
            service_id: ServiceId::new(),
            access_token: SecretString::new(""),
            refresh_token: None,
            token_expires_at: None,
            provider_account_id: None,
            email: None,
        };
        assert!(matches!(
            account.validate(),
            Err(AreaFlowError::Validation(ValidationError::EmptyAccessToken))
        ));
    }
}
