//! OAuth2 client error type and failure summaries.
//!
//! Nothing in this module ever formats a request, a URL, a response body or
//! a credential. Details are built from a fixed vocabulary plus the
//! provider's own `error` / `error_description` fields.

use std::fmt;

use serde::Deserialize;

use areaflow_domain::error::{AreaFlowError, ProviderError};

/// Longest provider-supplied detail kept in an error message.
const MAX_DETAIL_CHARS: usize = 200;

/// The provider call an [`OAuthError`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Exchange,
    Refresh,
    UserInfo,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Exchange => "code exchange",
            Self::Refresh => "token refresh",
            Self::UserInfo => "user info",
        })
    }
}

/// Errors originating from the OAuth2 client.
#[derive(Debug, thiserror::Error)]
pub enum OAuthError {
    #[error("{provider} is not configured")]
    Unconfigured { provider: String },

    #[error("{provider} rejected the {operation} request with {status}: {detail}")]
    Rejected {
        operation: Operation,
        provider: String,
        status: u16,
        detail: String,
    },

    #[error("{provider} request failed: {detail}")]
    Transport { provider: String, detail: String },

    #[error("{provider} returned an unreadable response: {detail}")]
    InvalidResponse { provider: String, detail: String },
}

impl OAuthError {
    /// Summarize a reqwest failure as timeout, connection failure or request
    /// failure. The reqwest error itself is dropped since it embeds the URL.
    pub(crate) fn transport(provider: &str, err: &reqwest::Error) -> Self {
        let detail = if err.is_timeout() {
            "request timed out"
        } else if err.is_connect() {
            "connection failed"
        } else if err.is_decode() || err.is_body() {
            "failed to read response body"
        } else {
            "request failed"
        };
        Self::Transport {
            provider: provider.to_string(),
            detail: detail.to_string(),
        }
    }
}

impl From<OAuthError> for ProviderError {
    fn from(err: OAuthError) -> Self {
        match err {
            OAuthError::Unconfigured { provider } => Self::Unconfigured { provider },
            OAuthError::Rejected {
                operation,
                provider,
                status,
                detail,
            } => match operation {
                Operation::Exchange => Self::ExchangeRejected {
                    provider,
                    status,
                    detail,
                },
                Operation::Refresh => Self::RefreshRejected {
                    provider,
                    status,
                    detail,
                },
                Operation::UserInfo => Self::UserInfoRejected {
                    provider,
                    status,
                    detail,
                },
            },
            OAuthError::Transport { provider, detail } => Self::Transport { provider, detail },
            OAuthError::InvalidResponse { provider, detail } => {
                Self::InvalidResponse { provider, detail }
            }
        }
    }
}

impl From<OAuthError> for AreaFlowError {
    fn from(err: OAuthError) -> Self {
        Self::Provider(err.into())
    }
}

/// Standard OAuth2 error body (RFC 6749 §5.2).
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ErrorBody {
    pub error: String,
    pub error_description: Option<String>,
}

impl ErrorBody {
    pub(crate) fn summary(&self) -> String {
        let summary = match &self.error_description {
            Some(description) if !description.is_empty() => {
                format!("{}: {description}", self.error)
            }
            _ => self.error.clone(),
        };
        truncate(summary)
    }
}

/// Detail for a non-success response: the provider's error fields when the
/// body carries them, else the HTTP reason phrase.
pub(crate) fn rejection_detail(status: reqwest::StatusCode, body: &[u8]) -> String {
    match serde_json::from_slice::<ErrorBody>(body) {
        Ok(parsed) => parsed.summary(),
        Err(_) => status
            .canonical_reason()
            .unwrap_or("unexpected status")
            .to_string(),
    }
}

fn truncate(value: String) -> String {
    if value.chars().count() <= MAX_DETAIL_CHARS {
        return value;
    }
    let mut cut: String = value.chars().take(MAX_DETAIL_CHARS).collect();
    cut.push('…');
    cut
}

#[cfg(test)]
mod tests {
    use super::*;
    use areaflow_domain::error::ErrorKind;
    use reqwest::StatusCode;

    #[test]
    fn should_summarize_error_fields() {
        let body = br#"{"error":"invalid_grant","error_description":"Bad Request"}"#;
        assert_eq!(
            rejection_detail(StatusCode::BAD_REQUEST, body),
            "invalid_grant: Bad Request"
        );
        assert_eq!(
            rejection_detail(StatusCode::BAD_REQUEST, br#"{"error":"invalid_client"}"#),
            "invalid_client"
        );
    }

    #[test]
    fn should_fall_back_to_reason_phrase_for_unstructured_body() {
        let body = b"<html>token=abc123 client_secret=shh</html>";
        let detail = rejection_detail(StatusCode::BAD_GATEWAY, body);
        assert_eq!(detail, "Bad Gateway");
    }

    #[test]
    fn should_truncate_long_descriptions() {
        let body = ErrorBody {
            error: "invalid_request".to_string(),
            error_description: Some("x".repeat(500)),
        };
        assert!(body.summary().chars().count() <= MAX_DETAIL_CHARS + 1);
    }

    #[test]
    fn should_map_rejections_per_operation() {
        let refresh: ProviderError = OAuthError::Rejected {
            operation: Operation::Refresh,
            provider: "google".to_string(),
            status: 400,
            detail: "invalid_grant".to_string(),
        }
        .into();
        assert!(matches!(refresh, ProviderError::RefreshRejected { status: 400, .. }));

        let err: AreaFlowError = OAuthError::Unconfigured {
            provider: "github".to_string(),
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::Provider);
    }
}
