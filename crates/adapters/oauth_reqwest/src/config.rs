//! OAuth2 provider configuration.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// Token endpoint dialect spoken by a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Google,
    Github,
    Microsoft,
    Discord,
    /// Any RFC 6749 compliant provider; endpoints must be configured.
    Generic,
}

impl ProviderKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Google => "google",
            Self::Github => "github",
            Self::Microsoft => "microsoft",
            Self::Discord => "discord",
            Self::Generic => "generic",
        }
    }

    /// Well-known token endpoint, if the provider has one.
    #[must_use]
    pub fn default_token_url(self) -> Option<&'static str> {
        match self {
            Self::Google => Some("https://oauth2.googleapis.com/token"),
            Self::Github => Some("https://github.com/login/oauth/access_token"),
            Self::Microsoft => Some("https://login.microsoftonline.com/common/oauth2/v2.0/token"),
            Self::Discord => Some("https://discord.com/api/oauth2/token"),
            Self::Generic => None,
        }
    }

    /// Well-known profile endpoint, if the provider has one.
    #[must_use]
    pub fn default_userinfo_url(self) -> Option<&'static str> {
        match self {
            Self::Google => Some("https://openidconnect.googleapis.com/v1/userinfo"),
            Self::Github => Some("https://api.github.com/user"),
            Self::Microsoft => Some("https://graph.microsoft.com/v1.0/me"),
            Self::Discord => Some("https://discord.com/api/users/@me"),
            Self::Generic => None,
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a name matches no [`ProviderKind`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown provider kind: {0}")]
pub struct UnknownProviderKind(pub String);

impl FromStr for ProviderKind {
    type Err = UnknownProviderKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "google" => Ok(Self::Google),
            "github" => Ok(Self::Github),
            "microsoft" | "outlook" => Ok(Self::Microsoft),
            "discord" => Ok(Self::Discord),
            "generic" => Ok(Self::Generic),
            _ => Err(UnknownProviderKind(s.to_string())),
        }
    }
}

/// Configuration of one OAuth2 provider client.
///
/// Client id and secret are optional so that a provider can be declared
/// before it is provisioned; such a client reports itself as unconfigured
/// instead of calling out.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Dialect; inferred from the service name when absent.
    pub kind: Option<ProviderKind>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    /// Overrides the well-known token endpoint of `kind`.
    pub token_url: Option<String>,
    /// Overrides the well-known profile endpoint of `kind`.
    pub userinfo_url: Option<String>,
    /// Redirect URI registered with the provider, sent with code exchanges.
    pub redirect_uri: Option<String>,
    /// Scopes requested at authorization time, kept for reference.
    pub scopes: Vec<String>,
    /// Timeout applied to every request, in seconds.
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: None,
            client_id: None,
            client_secret: None,
            token_url: None,
            userinfo_url: None,
            redirect_uri: None,
            scopes: Vec::new(),
            timeout_secs: 10,
        }
    }
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("kind", &self.kind)
            .field("client_id", &self.client_id)
            .field(
                "client_secret",
                &self.client_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .field("token_url", &self.token_url)
            .field("userinfo_url", &self.userinfo_url)
            .field("redirect_uri", &self.redirect_uri)
            .field("scopes", &self.scopes)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl ProviderConfig {
    /// The configured kind, else the one named by `service_name`, else
    /// [`ProviderKind::Generic`].
    #[must_use]
    pub fn resolve_kind(&self, service_name: &str) -> ProviderKind {
        self.kind
            .or_else(|| service_name.parse().ok())
            .unwrap_or(ProviderKind::Generic)
    }

    /// Whether both client credentials are present and non-empty.
    #[must_use]
    pub fn has_credentials(&self) -> bool {
        let present = |value: &Option<String>| value.as_deref().is_some_and(|v| !v.is_empty());
        present(&self.client_id) && present(&self.client_secret)
    }
}
