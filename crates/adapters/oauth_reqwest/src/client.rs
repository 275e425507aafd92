//! reqwest implementation of [`OAuth2Provider`].

use std::future::Future;
use std::time::Duration;

use reqwest::header::{ACCEPT, HeaderValue};

use areaflow_app::ports::OAuth2Provider;
use areaflow_domain::error::AreaFlowError;
use areaflow_domain::oauth::{CodeExchange, ProviderProfile, TokenGrant};
use areaflow_domain::secret::SecretString;
use areaflow_domain::time::now;

use crate::config::{ProviderConfig, ProviderKind};
use crate::error::{OAuthError, Operation, rejection_detail};
use crate::responses::{TokenResponse, Unusable, parse_profile};

const USER_AGENT: &str = concat!("areaflow/", env!("CARGO_PKG_VERSION"));

struct Credentials {
    client_id: String,
    client_secret: SecretString,
}

/// OAuth2 client for one provider.
pub struct ReqwestOAuth2Client {
    name: String,
    kind: ProviderKind,
    credentials: Option<Credentials>,
    token_url: Option<String>,
    userinfo_url: Option<String>,
    redirect_uri: Option<String>,
    http: reqwest::Client,
}

impl ReqwestOAuth2Client {
    /// Build a client for the catalog service called `name`.
    ///
    /// Missing credentials or endpoints do not fail construction; calls on
    /// such a client fail with [`OAuthError::Unconfigured`] before any
    /// request is sent.
    ///
    /// # Errors
    ///
    /// Returns [`OAuthError::Transport`] if the HTTP client cannot be built.
    pub fn new(name: impl Into<String>, config: ProviderConfig) -> Result<Self, OAuthError> {
        let name = name.into();
        let kind = config.resolve_kind(&name);
        let credentials = if config.has_credentials() {
            config
                .client_id
                .clone()
                .zip(config.client_secret.clone())
                .map(|(client_id, client_secret)| Credentials {
                    client_id,
                    client_secret: SecretString::from(client_secret),
                })
        } else {
            None
        };

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|err| OAuthError::transport(&name, &err))?;

        Ok(Self {
            token_url: config
                .token_url
                .or_else(|| kind.default_token_url().map(str::to_string)),
            userinfo_url: config
                .userinfo_url
                .or_else(|| kind.default_userinfo_url().map(str::to_string)),
            redirect_uri: config.redirect_uri,
            name,
            kind,
            credentials,
            http,
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn kind(&self) -> ProviderKind {
        self.kind
    }

    /// Whether token calls can be attempted at all.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.credentials.is_some() && self.token_url.is_some()
    }

    fn unconfigured(&self) -> OAuthError {
        OAuthError::Unconfigured {
            provider: self.name.clone(),
        }
    }

    fn token_endpoint(&self) -> Result<(&Credentials, &str), OAuthError> {
        match (&self.credentials, &self.token_url) {
            (Some(credentials), Some(url)) => Ok((credentials, url)),
            _ => Err(self.unconfigured()),
        }
    }

    #[tracing::instrument(skip(self, exchange), fields(provider = %self.name))]
    async fn exchange(&self, exchange: CodeExchange) -> Result<TokenGrant, OAuthError> {
        let (credentials, url) = self.token_endpoint()?;
        let redirect_uri = exchange.redirect_uri.or_else(|| self.redirect_uri.clone());

        let mut form = vec![
            ("grant_type", "authorization_code".to_string()),
            ("code", exchange.code.expose().to_string()),
            ("client_id", credentials.client_id.clone()),
            ("client_secret", credentials.client_secret.expose().to_string()),
        ];
        if let Some(redirect_uri) = redirect_uri {
            form.push(("redirect_uri", redirect_uri));
        }
        if let Some(verifier) = exchange.code_verifier {
            form.push(("code_verifier", verifier.expose().to_string()));
        }

        self.request_tokens(Operation::Exchange, url, &form).await
    }

    #[tracing::instrument(skip(self, refresh_token), fields(provider = %self.name))]
    async fn refresh(&self, refresh_token: &SecretString) -> Result<TokenGrant, OAuthError> {
        let (credentials, url) = self.token_endpoint()?;
        let form = [
            ("grant_type", "refresh_token".to_string()),
            ("refresh_token", refresh_token.expose().to_string()),
            ("client_id", credentials.client_id.clone()),
            ("client_secret", credentials.client_secret.expose().to_string()),
        ];

        self.request_tokens(Operation::Refresh, url, &form).await
    }

    #[tracing::instrument(skip(self, access_token), fields(provider = %self.name))]
    async fn user_info(&self, access_token: &SecretString) -> Result<ProviderProfile, OAuthError> {
        if self.credentials.is_none() {
            return Err(self.unconfigured());
        }
        let url = self.userinfo_url.as_deref().ok_or_else(|| self.unconfigured())?;

        tracing::debug!("requesting user info");
        let response = self
            .http
            .get(url)
            .bearer_auth(access_token.expose())
            .header(ACCEPT, HeaderValue::from_static("application/json"))
            .send()
            .await
            .map_err(|err| OAuthError::transport(&self.name, &err))?;
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|err| OAuthError::transport(&self.name, &err))?;

        if !status.is_success() {
            return Err(OAuthError::Rejected {
                operation: Operation::UserInfo,
                provider: self.name.clone(),
                status: status.as_u16(),
                detail: rejection_detail(status, &body),
            });
        }

        parse_profile(self.kind, &body)
            .map_err(|_| self.invalid_response("malformed user info"))?
            .ok_or_else(|| self.invalid_response("user info carries no account id"))
    }

    /// POST `form` to the token endpoint and normalize the answer.
    async fn request_tokens(
        &self,
        operation: Operation,
        url: &str,
        form: &[(&str, String)],
    ) -> Result<TokenGrant, OAuthError> {
        tracing::debug!(%operation, "requesting tokens");
        let response = self
            .http
            .post(url)
            .header(ACCEPT, HeaderValue::from_static("application/json"))
            .form(form)
            .send()
            .await
            .map_err(|err| OAuthError::transport(&self.name, &err))?;
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|err| OAuthError::transport(&self.name, &err))?;

        if !status.is_success() {
            tracing::debug!(%operation, status = status.as_u16(), "token request rejected");
            return Err(OAuthError::Rejected {
                operation,
                provider: self.name.clone(),
                status: status.as_u16(),
                detail: rejection_detail(status, &body),
            });
        }

        let parsed = TokenResponse::parse(self.kind, &body)
            .map_err(|_| self.invalid_response("malformed token response"))?;
        parsed.into_grant(now()).map_err(|unusable| match unusable {
            Unusable::Rejected(error) => OAuthError::Rejected {
                operation,
                provider: self.name.clone(),
                status: status.as_u16(),
                detail: error.summary(),
            },
            Unusable::MissingAccessToken => self.invalid_response("no access token in response"),
            Unusable::ExpiryOutOfRange => self.invalid_response("expires_in out of range"),
        })
    }

    fn invalid_response(&self, detail: &str) -> OAuthError {
        OAuthError::InvalidResponse {
            provider: self.name.clone(),
            detail: detail.to_string(),
        }
    }
}

impl OAuth2Provider for ReqwestOAuth2Client {
    fn exchange_code(
        &self,
        exchange: CodeExchange,
    ) -> impl Future<Output = Result<TokenGrant, AreaFlowError>> + Send {
        async move { Ok(self.exchange(exchange).await?) }
    }

    fn refresh_token(
        &self,
        refresh_token: &SecretString,
    ) -> impl Future<Output = Result<TokenGrant, AreaFlowError>> + Send {
        async move { Ok(self.refresh(refresh_token).await?) }
    }

    fn get_user_info(
        &self,
        access_token: &SecretString,
    ) -> impl Future<Output = Result<ProviderProfile, AreaFlowError>> + Send {
        async move { Ok(self.user_info(access_token).await?) }
    }
}
