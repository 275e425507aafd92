//! Service link service — links, refreshes and unlinks OAuth2 accounts.
//!
//! Every operation on a `(user, service)` pair runs under that pair's lock
//! (see [`KeyedLocks`]) and writes through a single repository call, so no
//! partially written token state is ever observable.

use chrono::Duration;

use areaflow_domain::account_link::{NewServiceAccount, ServiceAccountLink, ServiceAccountView};
use areaflow_domain::error::{AreaFlowError, ConflictError, NotFoundError, ValidationError};
use areaflow_domain::id::{ServiceAccountId, ServiceId, UserId};
use areaflow_domain::oauth::CodeExchange;
use areaflow_domain::secret::SecretString;
use areaflow_domain::service::Service;
use areaflow_domain::time::{Timestamp, now};
use areaflow_domain::user::User;

use crate::keyed_lock::KeyedLocks;
use crate::ports::{
    OAuth2Provider, ProviderSet, ServiceAccountRepository, ServiceRepository, UserRepository,
};

/// Access tokens expiring within this window are refreshed before use.
pub const EXPIRY_SKEW_SECONDS: i64 = 60;

/// Input of [`ServiceLinkService::link`].
#[derive(Debug, Clone)]
pub struct LinkRequest {
    pub user_id: UserId,
    pub service_id: ServiceId,
    pub authorization_code: Option<SecretString>,
    pub redirect_uri: Option<String>,
    pub code_verifier: Option<SecretString>,
}

impl LinkRequest {
    #[must_use]
    pub fn new(user_id: UserId, service_id: ServiceId) -> Self {
        Self {
            user_id,
            service_id,
            authorization_code: None,
            redirect_uri: None,
            code_verifier: None,
        }
    }

    #[must_use]
    pub fn authorization_code(mut self, code: impl Into<SecretString>) -> Self {
        self.authorization_code = Some(code.into());
        self
    }

    #[must_use]
    pub fn redirect_uri(mut self, redirect_uri: impl Into<String>) -> Self {
        self.redirect_uri = Some(redirect_uri.into());
        self
    }

    #[must_use]
    pub fn code_verifier(mut self, verifier: impl Into<SecretString>) -> Self {
        self.code_verifier = Some(verifier.into());
        self
    }
}

/// What [`ServiceLinkService::link`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkOutcome {
    /// A new link was stored.
    Created(ServiceAccountId),
    /// An existing link received fresh tokens.
    Relinked(ServiceAccountId),
    /// No code was supplied and the pair was already linked; nothing changed.
    AlreadyLinked(ServiceAccountId),
}

impl LinkOutcome {
    #[must_use]
    pub fn account_id(self) -> ServiceAccountId {
        match self {
            Self::Created(id) | Self::Relinked(id) | Self::AlreadyLinked(id) => id,
        }
    }
}

/// Result of a successful refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshOutcome {
    pub account_id: ServiceAccountId,
    pub token_expires_at: Option<Timestamp>,
    /// Whether the provider issued a new refresh token.
    pub rotated: bool,
}

/// Application service coordinating OAuth2 providers and the token store.
pub struct ServiceLinkService<A, S, U, P> {
    accounts: A,
    services: S,
    users: U,
    providers: ProviderSet<P>,
    locks: KeyedLocks<(UserId, ServiceId)>,
}

impl<A, S, U, P> ServiceLinkService<A, S, U, P>
where
    A: ServiceAccountRepository,
    S: ServiceRepository,
    U: UserRepository,
    P: OAuth2Provider,
{
    /// Create a new service backed by the given repositories and providers.
    pub fn new(accounts: A, services: S, users: U, providers: ProviderSet<P>) -> Self {
        Self {
            accounts,
            services,
            users,
            providers,
            locks: KeyedLocks::new(),
        }
    }

    /// Link a user's provider account to a service.
    ///
    /// Without an authorization code this only confirms an existing link.
    /// With one, the code is exchanged and the tokens are upserted: a new
    /// link is created, or the token fields of the existing one are
    /// overwritten in place. The provider profile is then fetched on a best
    /// effort basis.
    ///
    /// # Errors
    ///
    /// - [`AreaFlowError::NotFound`] when the service or the user does not
    ///   exist; the code is not exchanged in that case.
    /// - [`AreaFlowError::Conflict`] when no code is given and no link
    ///   exists, or when the service does not require authentication.
    /// - [`AreaFlowError::Provider`] when the provider is unconfigured or
    ///   rejects the exchange.
    #[tracing::instrument(
        skip(self, request),
        fields(user_id = %request.user_id, service_id = %request.service_id)
    )]
    pub async fn link(&self, request: LinkRequest) -> Result<LinkOutcome, AreaFlowError> {
        let LinkRequest {
            user_id,
            service_id,
            authorization_code,
            redirect_uri,
            code_verifier,
        } = request;

        let service = self.get_service(service_id).await?;
        self.get_user(user_id).await?;
        let _guard = self.locks.lock(&(user_id, service_id)).await;
        let existing = self.accounts.get(user_id, service_id).await?;

        let Some(code) = authorization_code else {
            return match existing {
                Some(link) => {
                    tracing::debug!("service already linked, nothing to exchange");
                    Ok(LinkOutcome::AlreadyLinked(link.id))
                }
                None => Err(ConflictError::AuthorizationCodeRequired.into()),
            };
        };
        if code.is_empty() {
            return Err(ValidationError::EmptyAuthorizationCode.into());
        }
        if !service.requires_auth {
            return Err(ConflictError::AuthenticationNotRequired {
                service_id: service_id.to_string(),
            }
            .into());
        }

        let provider = self.providers.resolve(&service.name)?;
        let grant = provider
            .exchange_code(CodeExchange {
                code,
                redirect_uri,
                code_verifier,
            })
            .await?;

        let stored = self
            .accounts
            .upsert_tokens(ServiceAccountLink::from_grant(
                user_id, service_id, grant, now(),
            ))
            .await?;
        self.sync_profile(provider, stored.clone()).await;

        if existing.is_some() {
            tracing::info!(account_id = %stored.id, "service account relinked");
            Ok(LinkOutcome::Relinked(stored.id))
        } else {
            tracing::info!(account_id = %stored.id, "service account linked");
            Ok(LinkOutcome::Created(stored.id))
        }
    }

    /// Create a link from tokens obtained outside the code exchange flow.
    ///
    /// # Errors
    ///
    /// - [`AreaFlowError::Validation`] when the access token is empty.
    /// - [`AreaFlowError::NotFound`] when the user or the service does not exist.
    /// - [`AreaFlowError::Conflict`] when the service does not require
    ///   authentication or the pair is already linked.
    #[tracing::instrument(
        skip(self, account),
        fields(user_id = %account.user_id, service_id = %account.service_id)
    )]
    pub async fn create_account(
        &self,
        account: NewServiceAccount,
    ) -> Result<ServiceAccountView, AreaFlowError> {
        account.validate()?;
        let user = self.get_user(account.user_id).await?;
        let service = self.get_service(account.service_id).await?;
        if !service.requires_auth {
            return Err(ConflictError::AuthenticationNotRequired {
                service_id: service.id.to_string(),
            }
            .into());
        }

        let _guard = self.locks.lock(&(user.id, service.id)).await;
        if self.accounts.get(user.id, service.id).await?.is_some() {
            return Err(ConflictError::AlreadyLinked {
                user_id: user.id.to_string(),
                service_id: service.id.to_string(),
            }
            .into());
        }

        let link = self.accounts.create(account.into_link(now())).await?;
        tracing::info!(account_id = %link.id, "service account created");
        Ok(link.view(&user, &service))
    }

    /// Remove the link between a user and a service.
    ///
    /// # Errors
    ///
    /// Returns [`AreaFlowError::NotFound`] when no link exists.
    #[tracing::instrument(skip(self))]
    pub async fn unlink(
        &self,
        user_id: UserId,
        service_id: ServiceId,
    ) -> Result<(), AreaFlowError> {
        let _guard = self.locks.lock(&(user_id, service_id)).await;
        if !self.accounts.delete(user_id, service_id).await? {
            return Err(link_not_found(user_id, service_id).into());
        }
        tracing::info!("service account unlinked");
        Ok(())
    }

    /// Exchange the stored refresh token for a new access token.
    ///
    /// # Errors
    ///
    /// - [`AreaFlowError::NotFound`] when no link exists, when the link holds
    ///   no refresh token, or when the link disappears before the write.
    /// - [`AreaFlowError::Provider`] when the provider rejects the refresh.
    #[tracing::instrument(skip(self))]
    pub async fn refresh(
        &self,
        user_id: UserId,
        service_id: ServiceId,
    ) -> Result<RefreshOutcome, AreaFlowError> {
        let _guard = self.locks.lock(&(user_id, service_id)).await;
        let link = self.require_link(user_id, service_id).await?;
        let (stored, rotated) = self.refresh_link(link).await?;
        Ok(RefreshOutcome {
            account_id: stored.id,
            token_expires_at: stored.token_expires_at,
            rotated,
        })
    }

    /// Return an access token that is valid for at least
    /// [`EXPIRY_SKEW_SECONDS`], refreshing it first when needed.
    ///
    /// Tokens without a known expiry are returned as stored.
    ///
    /// # Errors
    ///
    /// - [`AreaFlowError::NotFound`] when no link exists, or when the token
    ///   is expiring and no refresh token is stored.
    /// - [`AreaFlowError::Provider`] when the provider rejects the refresh.
    #[tracing::instrument(skip(self))]
    pub async fn access_token(
        &self,
        user_id: UserId,
        service_id: ServiceId,
    ) -> Result<SecretString, AreaFlowError> {
        let _guard = self.locks.lock(&(user_id, service_id)).await;
        let link = self.require_link(user_id, service_id).await?;
        if !link.expires_within(now(), Duration::seconds(EXPIRY_SKEW_SECONDS)) {
            return Ok(link.access_token);
        }

        tracing::debug!("access token expiring, refreshing before use");
        let (stored, _) = self.refresh_link(link).await?;
        Ok(stored.access_token)
    }

    /// Secret-free view of the link between a user and a service.
    ///
    /// # Errors
    ///
    /// Returns [`AreaFlowError::NotFound`] when the link, its user or its
    /// service does not exist.
    pub async fn find_one(
        &self,
        user_id: UserId,
        service_id: ServiceId,
    ) -> Result<ServiceAccountView, AreaFlowError> {
        let link = self.require_link(user_id, service_id).await?;
        self.view(&link).await
    }

    /// Secret-free view of a link looked up by its surrogate id.
    ///
    /// # Errors
    ///
    /// Returns [`AreaFlowError::NotFound`] when the link, its user or its
    /// service does not exist.
    pub async fn find_by_service_account_id(
        &self,
        id: ServiceAccountId,
    ) -> Result<ServiceAccountView, AreaFlowError> {
        let link = self.accounts.get_by_id(id).await?.ok_or_else(|| NotFoundError {
            entity: "Service account",
            id: id.to_string(),
        })?;
        self.view(&link).await
    }

    /// Secret-free views of every link owned by a user.
    ///
    /// # Errors
    ///
    /// Returns [`AreaFlowError::NotFound`] when the user does not exist, or a
    /// storage error from the repositories.
    pub async fn find_by_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<ServiceAccountView>, AreaFlowError> {
        let user = self.get_user(user_id).await?;
        let links = self.accounts.find_by_user(user_id).await?;
        let mut views = Vec::with_capacity(links.len());
        for link in &links {
            let service = self.get_service(link.service_id).await?;
            views.push(link.view(&user, &service));
        }
        Ok(views)
    }

    /// Refresh `link` through its provider and store the result.
    ///
    /// Must be called with the pair's lock held.
    async fn refresh_link(
        &self,
        mut link: ServiceAccountLink,
    ) -> Result<(ServiceAccountLink, bool), AreaFlowError> {
        let refresh_token = link.refresh_token.clone().ok_or_else(|| NotFoundError {
            entity: "Refresh token",
            id: ServiceAccountLink::key_label(link.user_id, link.service_id),
        })?;
        let service = self.get_service(link.service_id).await?;
        let provider = self.providers.resolve(&service.name)?;

        let grant = provider.refresh_token(&refresh_token).await?;
        let rotated = grant.refresh_token.is_some();
        link.apply_refresh(grant, now());

        let stored = self
            .accounts
            .update_tokens(&link)
            .await?
            .ok_or_else(|| link_not_found(link.user_id, link.service_id))?;
        tracing::info!(account_id = %stored.id, rotated, "service account tokens refreshed");
        Ok((stored, rotated))
    }

    /// Store the provider profile of a freshly linked account.
    ///
    /// Failures are logged and never affect the link.
    async fn sync_profile(&self, provider: &P, mut link: ServiceAccountLink) {
        match provider.get_user_info(&link.access_token).await {
            Ok(profile) => {
                link.apply_profile(&profile);
                if let Err(err) = self.accounts.update_profile(&link).await {
                    tracing::warn!(error = %err, "failed to store provider profile");
                }
            }
            Err(err) => tracing::warn!(error = %err, "failed to fetch provider profile"),
        }
    }

    async fn view(&self, link: &ServiceAccountLink) -> Result<ServiceAccountView, AreaFlowError> {
        let user = self.get_user(link.user_id).await?;
        let service = self.get_service(link.service_id).await?;
        Ok(link.view(&user, &service))
    }

    async fn require_link(
        &self,
        user_id: UserId,
        service_id: ServiceId,
    ) -> Result<ServiceAccountLink, AreaFlowError> {
        self.accounts
            .get(user_id, service_id)
            .await?
            .ok_or_else(|| link_not_found(user_id, service_id).into())
    }

    async fn get_service(&self, id: ServiceId) -> Result<Service, AreaFlowError> {
        self.services.get_by_id(id).await?.ok_or_else(|| {
            NotFoundError {
                entity: "Service",
                id: id.to_string(),
            }
            .into()
        })
    }

    async fn get_user(&self, id: UserId) -> Result<User, AreaFlowError> {
        self.users.get_by_id(id).await?.ok_or_else(|| {
            NotFoundError {
                entity: "User",
                id: id.to_string(),
            }
            .into()
        })
    }
}

fn link_not_found(user_id: UserId, service_id: ServiceId) -> NotFoundError {
    NotFoundError {
        entity: "Service account",
        id: ServiceAccountLink::key_label(user_id, service_id),
    }
}
