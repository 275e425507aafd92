//! OAuth2 provider port — one implementation instance per provider.

use std::collections::HashMap;
use std::future::Future;

use areaflow_domain::error::{AreaFlowError, ProviderError};
use areaflow_domain::oauth::{CodeExchange, ProviderProfile, TokenGrant};
use areaflow_domain::secret::SecretString;

/// Token endpoint and profile lookup of a single OAuth2 provider.
///
/// Implementations check their own configuration before any network call
/// and report a missing client id/secret as
/// [`ProviderError::Unconfigured`].
pub trait OAuth2Provider {
    /// Exchange an authorization code for tokens.
    fn exchange_code(
        &self,
        exchange: CodeExchange,
    ) -> impl Future<Output = Result<TokenGrant, AreaFlowError>> + Send;

    /// Obtain a new access token. The returned grant carries no refresh
    /// token when the provider does not rotate it.
    fn refresh_token(
        &self,
        refresh_token: &SecretString,
    ) -> impl Future<Output = Result<TokenGrant, AreaFlowError>> + Send;

    /// Fetch the profile behind an access token, for display only.
    fn get_user_info(
        &self,
        access_token: &SecretString,
    ) -> impl Future<Output = Result<ProviderProfile, AreaFlowError>> + Send;
}

/// Provider instances keyed by the name of the catalog service they serve.
pub struct ProviderSet<P> {
    providers: HashMap<String, P>,
}

impl<P> Default for ProviderSet<P> {
    fn default() -> Self {
        Self {
            providers: HashMap::new(),
        }
    }
}

impl<P> ProviderSet<P> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `provider` for the service called `service_name`.
    #[must_use]
    pub fn with(mut self, service_name: impl Into<String>, provider: P) -> Self {
        self.insert(service_name, provider);
        self
    }

    pub fn insert(&mut self, service_name: impl Into<String>, provider: P) {
        self.providers.insert(service_name.into(), provider);
    }

    #[must_use]
    pub fn get(&self, service_name: &str) -> Option<&P> {
        self.providers.get(service_name)
    }

    /// Provider for `service_name`, or an unconfigured-provider error.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Unconfigured`] when nothing is registered.
    pub fn resolve(&self, service_name: &str) -> Result<&P, AreaFlowError> {
        self.get(service_name).ok_or_else(|| {
            ProviderError::Unconfigured {
                provider: service_name.to_string(),
            }
            .into()
        })
    }

    /// Registered service names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.providers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
