//! Provider response shapes and their normalization.
//!
//! None of the token shapes implement `Debug`, so raw tokens cannot end up
//! in a log line through them.

use serde::{Deserialize, Deserializer};

use areaflow_domain::oauth::{ProviderProfile, TokenExtras, TokenGrant};
use areaflow_domain::secret::SecretString;
use areaflow_domain::time::{Timestamp, seconds_after};

use crate::config::ProviderKind;
use crate::error::ErrorBody;

/// Token endpoint response, one variant per provider dialect.
pub(crate) enum TokenResponse {
    Google(GoogleToken),
    Github(GithubToken),
    Microsoft(MicrosoftToken),
    Discord(DiscordToken),
    Generic(StandardToken),
}

/// Why a token response could not become a [`TokenGrant`].
pub(crate) enum Unusable {
    /// The provider reported an error inside a success response.
    Rejected(ErrorBody),
    /// The response carried no access token.
    MissingAccessToken,
    /// `expires_in` does not describe a representable instant.
    ExpiryOutOfRange,
}

impl TokenResponse {
    pub(crate) fn parse(kind: ProviderKind, body: &[u8]) -> Result<Self, serde_json::Error> {
        Ok(match kind {
            ProviderKind::Google => Self::Google(serde_json::from_slice(body)?),
            ProviderKind::Github => Self::Github(serde_json::from_slice(body)?),
            ProviderKind::Microsoft => Self::Microsoft(serde_json::from_slice(body)?),
            ProviderKind::Discord => Self::Discord(serde_json::from_slice(body)?),
            ProviderKind::Generic => Self::Generic(serde_json::from_slice(body)?),
        })
    }

    pub(crate) fn into_grant(self, issued_at: Timestamp) -> Result<TokenGrant, Unusable> {
        let standard = match self {
            Self::Google(token) => StandardToken {
                access_token: token.access_token,
                refresh_token: token.refresh_token,
                expires_in: token.expires_in,
                scope: token.scope,
                token_type: token.token_type,
                id_token: token.id_token,
            },
            Self::Github(GithubToken::Error(body)) => return Err(Unusable::Rejected(body)),
            Self::Github(GithubToken::Issued(token)) => StandardToken {
                access_token: token.access_token,
                refresh_token: token.refresh_token,
                expires_in: token.expires_in,
                scope: token.scope,
                token_type: token.token_type,
                id_token: None,
            },
            Self::Microsoft(token) => StandardToken {
                access_token: token.access_token,
                refresh_token: token.refresh_token,
                expires_in: token.expires_in,
                scope: token.scope,
                token_type: token.token_type,
                id_token: token.id_token,
            },
            Self::Discord(token) => StandardToken {
                access_token: token.access_token,
                refresh_token: token.refresh_token,
                expires_in: token.expires_in,
                scope: token.scope,
                token_type: token.token_type,
                id_token: None,
            },
            Self::Generic(token) => token,
        };
        standard.into_grant(issued_at)
    }
}

/// RFC 6749 §5.1 access token response.
#[derive(Deserialize)]
pub(crate) struct StandardToken {
    #[serde(default)]
    access_token: String,
    refresh_token: Option<String>,
    #[serde(default, deserialize_with = "lenient_seconds")]
    expires_in: Option<i64>,
    scope: Option<String>,
    token_type: Option<String>,
    id_token: Option<String>,
}

impl StandardToken {
    fn into_grant(self, issued_at: Timestamp) -> Result<TokenGrant, Unusable> {
        if self.access_token.is_empty() {
            return Err(Unusable::MissingAccessToken);
        }
        if let Some(secs) = self.expires_in
            && seconds_after(issued_at, secs).is_none()
        {
            return Err(Unusable::ExpiryOutOfRange);
        }
        let refresh_token = self
            .refresh_token
            .filter(|token| !token.is_empty())
            .map(SecretString::from);
        Ok(TokenGrant::issued(
            SecretString::from(self.access_token),
            refresh_token,
            self.expires_in,
            issued_at,
        )
        .with_extras(TokenExtras {
            id_token: self.id_token.map(SecretString::from),
            scope: self.scope,
            token_type: self.token_type,
        }))
    }
}

#[derive(Deserialize)]
pub(crate) struct GoogleToken {
    access_token: String,
    refresh_token: Option<String>,
    #[serde(default, deserialize_with = "lenient_seconds")]
    expires_in: Option<i64>,
    scope: Option<String>,
    token_type: Option<String>,
    id_token: Option<String>,
}

/// GitHub answers `200 OK` with an error body when a code is bad or expired.
#[derive(Deserialize)]
#[serde(untagged)]
pub(crate) enum GithubToken {
    Error(ErrorBody),
    Issued(GithubIssued),
}

#[derive(Deserialize)]
pub(crate) struct GithubIssued {
    access_token: String,
    /// Only present for GitHub Apps with expiring user tokens.
    refresh_token: Option<String>,
    #[serde(default, deserialize_with = "lenient_seconds")]
    expires_in: Option<i64>,
    scope: Option<String>,
    token_type: Option<String>,
}

#[derive(Deserialize)]
pub(crate) struct MicrosoftToken {
    access_token: String,
    refresh_token: Option<String>,
    #[serde(default, deserialize_with = "lenient_seconds")]
    expires_in: Option<i64>,
    scope: Option<String>,
    token_type: Option<String>,
    id_token: Option<String>,
}

#[derive(Deserialize)]
pub(crate) struct DiscordToken {
    access_token: String,
    refresh_token: Option<String>,
    #[serde(default, deserialize_with = "lenient_seconds")]
    expires_in: Option<i64>,
    scope: Option<String>,
    token_type: Option<String>,
}

/// Accept `expires_in` as a number or a numeric string.
fn lenient_seconds<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Seconds {
        Number(i64),
        Text(String),
    }

    match Option::<Seconds>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Seconds::Number(secs)) => Ok(Some(secs)),
        Some(Seconds::Text(text)) => text
            .trim()
            .parse()
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

#[derive(Deserialize)]
struct GoogleProfile {
    sub: String,
    email: Option<String>,
    name: Option<String>,
}

#[derive(Deserialize)]
struct GithubProfile {
    id: u64,
    login: String,
    email: Option<String>,
    name: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MicrosoftProfile {
    id: String,
    mail: Option<String>,
    user_principal_name: Option<String>,
    display_name: Option<String>,
}

#[derive(Deserialize)]
struct DiscordProfile {
    id: String,
    username: String,
    email: Option<String>,
    global_name: Option<String>,
}

/// Parse a profile response into the provider-neutral shape.
pub(crate) fn parse_profile(
    kind: ProviderKind,
    body: &[u8],
) -> Result<Option<ProviderProfile>, serde_json::Error> {
    let profile = match kind {
        ProviderKind::Google => {
            let p: GoogleProfile = serde_json::from_slice(body)?;
            ProviderProfile {
                account_id: p.sub,
                email: p.email,
                display_name: p.name,
            }
        }
        ProviderKind::Github => {
            let p: GithubProfile = serde_json::from_slice(body)?;
            ProviderProfile {
                account_id: p.id.to_string(),
                email: p.email,
                display_name: p.name.or(Some(p.login)),
            }
        }
        ProviderKind::Microsoft => {
            let p: MicrosoftProfile = serde_json::from_slice(body)?;
            ProviderProfile {
                account_id: p.id,
                email: p.mail.or(p.user_principal_name),
                display_name: p.display_name,
            }
        }
        ProviderKind::Discord => {
            let p: DiscordProfile = serde_json::from_slice(body)?;
            ProviderProfile {
                account_id: p.id,
                email: p.email,
                display_name: p.global_name.or(Some(p.username)),
            }
        }
        ProviderKind::Generic => return generic_profile(body),
    };
    Ok(Some(profile))
}

/// OpenID Connect style profile, falling back to `id` when `sub` is absent.
fn generic_profile(body: &[u8]) -> Result<Option<ProviderProfile>, serde_json::Error> {
    let value: serde_json::Value = serde_json::from_slice(body)?;
    let text = |key: &str| match value.get(key) {
        Some(serde_json::Value::String(s)) => Some(s.clone()),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    };
    Ok(text("sub").or_else(|| text("id")).map(|account_id| ProviderProfile {
        account_id,
        email: text("email"),
        display_name: text("name").or_else(|| text("preferred_username")),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issued_at() -> Timestamp {
        "2024-01-01T10:00:00Z".parse().unwrap()
    }

    fn grant(kind: ProviderKind, body: &str) -> Result<TokenGrant, Unusable> {
        let Ok(response) = TokenResponse::parse(kind, body.as_bytes()) else {
            panic!("unparseable {kind} body");
        };
        response.into_grant(issued_at())
    }

    #[test]
    fn should_normalize_google_token_with_extras() {
        let Ok(grant) = grant(
            ProviderKind::Google,
            concat!(
                r#"{"access_token":"ya29","expires_in":3599,"refresh_token":"1//r","#,
                r#""scope":"email","token_type":"Bearer","id_token":"eyJ"}"#,
            ),
        ) else {
            panic!("expected a grant");
        };
        assert_eq!(grant.access_token.expose(), "ya29");
        assert_eq!(grant.refresh_token.unwrap().expose(), "1//r");
        assert_eq!(
            grant.expires_at,
            Some("2024-01-01T10:59:59Z".parse().unwrap())
        );
        assert_eq!(grant.extras.scope.as_deref(), Some("email"));
        assert!(grant.extras.id_token.is_some());
    }

    #[test]
    fn should_treat_github_error_body_as_rejection() {
        let result = grant(
            ProviderKind::Github,
            concat!(
                r#"{"error":"bad_verification_code","#,
                r#""error_description":"The code passed is incorrect or expired."}"#,
            ),
        );
        let Err(Unusable::Rejected(body)) = result else {
            panic!("expected a rejection");
        };
        assert_eq!(body.error, "bad_verification_code");
    }

    #[test]
    fn should_accept_github_token_without_expiry() {
        let Ok(grant) = grant(
            ProviderKind::Github,
            r#"{"access_token":"gho_x","scope":"repo","token_type":"bearer"}"#,
        ) else {
            panic!("expected a grant");
        };
        assert!(grant.refresh_token.is_none());
        assert!(grant.expires_at.is_none());
    }

    #[test]
    fn should_accept_expires_in_as_string() {
        let Ok(grant) = grant(
            ProviderKind::Microsoft,
            r#"{"access_token":"eyJ0","expires_in":"3600","token_type":"Bearer"}"#,
        ) else {
            panic!("expected a grant");
        };
        assert_eq!(
            grant.expires_at,
            Some("2024-01-01T11:00:00Z".parse().unwrap())
        );
    }

    #[test]
    fn should_reject_unrepresentable_expiry() {
        assert!(matches!(
            grant(
                ProviderKind::Google,
                r#"{"access_token":"at","expires_in":9223372036854775807}"#,
            ),
            Err(Unusable::ExpiryOutOfRange)
        ));
        assert!(matches!(
            grant(
                ProviderKind::Generic,
                r#"{"access_token":"at","expires_in":"400000000000"}"#,
            ),
            Err(Unusable::ExpiryOutOfRange)
        ));
    }

    #[test]
    fn should_reject_generic_response_without_access_token() {
        assert!(matches!(
            grant(ProviderKind::Generic, r#"{"token_type":"Bearer"}"#),
            Err(Unusable::MissingAccessToken)
        ));
    }

    #[test]
    fn should_parse_provider_profiles() {
        let github = parse_profile(
            ProviderKind::Github,
            br#"{"id":42,"login":"octocat","email":null,"name":null}"#,
        )
        .unwrap()
        .unwrap();
        assert_eq!(github.account_id, "42");
        assert_eq!(github.display_name.as_deref(), Some("octocat"));

        let microsoft = parse_profile(
            ProviderKind::Microsoft,
            concat!(
                r#"{"id":"abc","mail":null,"#,
                r#""userPrincipalName":"ada@contoso.com","displayName":"Ada"}"#,
            )
            .as_bytes(),
        )
        .unwrap()
        .unwrap();
        assert_eq!(microsoft.email.as_deref(), Some("ada@contoso.com"));

        let generic = parse_profile(ProviderKind::Generic, br#"{"id":7,"email":"a@b.c"}"#)
            .unwrap()
            .unwrap();
        assert_eq!(generic.account_id, "7");

        assert!(parse_profile(ProviderKind::Generic, br#"{"email":"a@b.c"}"#)
            .unwrap()
            .is_none());
    }
}
