//! Redacted string wrapper for OAuth2 tokens and client secrets.

use std::fmt;

/// A string that must never be printed, logged, or serialized.
///
/// `Debug` and `Display` both render `[REDACTED]`. The inner value is only
/// reachable through [`SecretString::expose`], which keeps every place that
/// touches the raw token greppable.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretString(String);

impl SecretString {
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Borrow the raw secret.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<String> for SecretString {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for SecretString {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretString([REDACTED])")
    }
}

impl fmt::Display for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_redact_debug_and_display() {
        let secret = SecretString::new("ya29.live-token");
        assert_eq!(format!("{secret}"), "[REDACTED]");
        assert!(!format!("{secret:?}").contains("ya29"));
    }

    #[test]
    fn should_expose_raw_value_on_request() {
        let secret = SecretString::from("abc");
        assert_eq!(secret.expose(), "abc");
        assert!(!secret.is_empty());
    }
}
