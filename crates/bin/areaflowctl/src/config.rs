//! Configuration loading — TOML file with environment variable overrides.
//!
//! Looks for `areaflow.toml` in the working directory unless a path is
//! given. Every field has a sensible default so the file is optional.
//! Environment variables take precedence over file values.

use std::collections::BTreeMap;
use std::path::Path;

use areaflow_adapter_oauth_reqwest::ProviderConfig;
use serde::Deserialize;

const DEFAULT_PATH: &str = "areaflow.toml";

/// Providers whose client credentials can come from the environment alone.
const WELL_KNOWN_PROVIDERS: [&str; 4] = ["google", "github", "microsoft", "discord"];

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Database settings.
    pub database: DatabaseConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
    /// OAuth2 providers keyed by the catalog service name they serve.
    pub providers: BTreeMap<String, ProviderConfig>,
}

/// `SQLite` database configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// `SQLite` connection URL or file path.
    pub url: String,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

impl Config {
    /// Load configuration from `path`, or from `areaflow.toml` if present,
    /// then apply environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is malformed, if an explicitly given
    /// file cannot be read, or if the result fails validation.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path, false)?,
            None => Self::from_file(Path::new(DEFAULT_PATH), true)?,
        };
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &Path, optional: bool) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if optional && err.kind() == std::io::ErrorKind::NotFound => {
                Ok(Self::default())
            }
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_env_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(val) = var("AREAFLOW_DATABASE_URL") {
            self.database.url = val;
        }
        if let Some(val) = var("AREAFLOW_LOG") {
            self.logging.filter = val;
        }
        if let Some(val) = var("RUST_LOG") {
            self.logging.filter = val;
        }

        let mut names: Vec<String> = self.providers.keys().cloned().collect();
        for name in WELL_KNOWN_PROVIDERS {
            if !self.providers.contains_key(name) {
                names.push(name.to_string());
            }
        }
        for name in names {
            let prefix = env_prefix(&name);
            let client_id = var(&format!("{prefix}_CLIENT_ID"));
            let client_secret = var(&format!("{prefix}_CLIENT_SECRET"));
            if client_id.is_none() && client_secret.is_none() {
                continue;
            }
            let provider = self.providers.entry(name).or_default();
            if client_id.is_some() {
                provider.client_id = client_id;
            }
            if client_secret.is_some() {
                provider.client_secret = client_secret;
            }
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.database.url.trim().is_empty() {
            return Err(ConfigError::Validation(
                "database url must not be empty".to_string(),
            ));
        }
        if let Some((name, _)) = self.providers.iter().find(|(_, p)| p.timeout_secs == 0) {
            return Err(ConfigError::Validation(format!(
                "provider {name}: timeout_secs must be non-zero"
            )));
        }
        Ok(())
    }

    /// Return the database URL in `sqlx`-compatible format.
    #[must_use]
    pub fn database_url(&self) -> &str {
        &self.database.url
    }
}

/// `AREAFLOW_<NAME>` with the service name upper-cased and non-alphanumerics
/// replaced by underscores.
fn env_prefix(name: &str) -> String {
    let name: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect();
    format!("AREAFLOW_{name}")
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite:areaflow.db?mode=rwc".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "areaflowctl=info,areaflow=info,warn".to_string(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}
