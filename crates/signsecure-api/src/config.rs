//! # Configuration
//!
//! `AppConfig` is assembled in two layers:
//!
//! 1. An optional YAML file named by `SIGNSECURE_CONFIG`.
//! 2. Environment variables, which override the file.
//!
//! | Variable                     | Field              | Default                  |
//! |------------------------------|--------------------|--------------------------|
//! | `PORT`                       | `port`             | `8080`                   |
//! | `SIGNSECURE_AUTH_SECRET`     | `auth_secret`      | unset (dev mode)         |
//! | `SIGNSECURE_TOKEN_SECRET`    | `token_secret`     | unset (ephemeral)        |
//! | `SIGNSECURE_TOKEN_TTL_DAYS`  | `token_ttl_days`   | `30`                     |
//! | `FRONTEND_URL`               | `frontend_url`     | `http://localhost:5173`  |
//! | `DEFAULT_FROM_EMAIL`         | `from_email`       | `noreply@signsecure.local` |
//! | `DATABASE_URL`               | `database_url`     | unset (in-memory only)   |
//! | `SIGNSECURE_TRUST_FORWARDED` | `trust_forwarded`  | `false`                  |

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;
use zeroize::Zeroizing;

use signsecure_crypto::DEFAULT_TOKEN_VALIDITY_DAYS;

/// Default frontend base used in signing links.
pub const DEFAULT_FRONTEND_URL: &str = "http://localhost:5173";
/// Default sender address for invitations.
pub const DEFAULT_FROM_EMAIL: &str = "noreply@signsecure.local";

/// Errors raised while loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Read {
        /// File path.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The config file is not valid YAML for [`FileConfig`].
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        /// File path.
        path: String,
        /// Underlying parser error.
        source: serde_yaml::Error,
    },

    /// An environment variable or file value is out of range.
    #[error("invalid value for {key}: {reason}")]
    Invalid {
        /// Setting name.
        key: &'static str,
        /// Why it was rejected.
        reason: String,
    },
}

/// A secret string. Zeroized on drop, redacted in `Debug`.
#[derive(Clone)]
pub struct SecretString(Zeroizing<String>);

impl SecretString {
    /// Wrap a secret.
    pub fn new(value: impl Into<String>) -> Self {
        Self(Zeroizing::new(value.into()))
    }

    /// The secret value.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for SecretString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("[REDACTED]")
    }
}

/// Shape of the optional YAML config file. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub port: Option<u16>,
    pub auth_secret: Option<String>,
    pub token_secret: Option<String>,
    pub token_ttl_days: Option<i64>,
    pub frontend_url: Option<String>,
    pub from_email: Option<String>,
    pub database_url: Option<String>,
    pub trust_forwarded: Option<bool>,
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Port to bind the HTTP server to.
    pub port: u16,
    /// Shared secret for the bearer authenticator. `None` disables the
    /// secret check (development only).
    pub auth_secret: Option<SecretString>,
    /// HMAC key for signer tokens. `None` means an ephemeral key is
    /// generated at startup.
    pub token_secret: Option<SecretString>,
    /// Signer token validity window.
    pub token_ttl_days: i64,
    /// Base URL of the frontend, used to build signing links.
    pub frontend_url: String,
    /// Sender address for invitations.
    pub from_email: String,
    /// Postgres connection string. `None` runs in-memory only.
    pub database_url: Option<SecretString>,
    /// Take the audit client address from `X-Forwarded-For`. Enable only
    /// behind a proxy that overwrites the header.
    pub trust_forwarded: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            auth_secret: None,
            token_secret: None,
            token_ttl_days: DEFAULT_TOKEN_VALIDITY_DAYS,
            frontend_url: DEFAULT_FRONTEND_URL.to_string(),
            from_email: DEFAULT_FROM_EMAIL.to_string(),
            database_url: None,
            trust_forwarded: false,
        }
    }
}

impl AppConfig {
    /// Load from `SIGNSECURE_CONFIG` (if set) and the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        let file = match std::env::var("SIGNSECURE_CONFIG") {
            Ok(path) => FileConfig::read(Path::new(&path))?,
            Err(_) => FileConfig::default(),
        };
        Self::resolve(file, |key| std::env::var(key).ok())
    }

    /// Merge a file config with an environment lookup. Environment wins.
    pub fn resolve(
        file: FileConfig,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let port = match env("PORT") {
            Some(raw) => raw.trim().parse().map_err(|e| ConfigError::Invalid {
                key: "PORT",
                reason: format!("{raw:?}: {e}"),
            })?,
            None => file.port.unwrap_or(defaults.port),
        };

        let token_ttl_days = match env("SIGNSECURE_TOKEN_TTL_DAYS") {
            Some(raw) => raw.trim().parse().map_err(|e| ConfigError::Invalid {
                key: "SIGNSECURE_TOKEN_TTL_DAYS",
                reason: format!("{raw:?}: {e}"),
            })?,
            None => file.token_ttl_days.unwrap_or(defaults.token_ttl_days),
        };
        if token_ttl_days < 1 {
            return Err(ConfigError::Invalid {
                key: "SIGNSECURE_TOKEN_TTL_DAYS",
                reason: format!("must be at least 1, got {token_ttl_days}"),
            });
        }

        let frontend_url = env("FRONTEND_URL")
            .or(file.frontend_url)
            .unwrap_or(defaults.frontend_url)
            .trim_end_matches('/')
            .to_string();
        if !(frontend_url.starts_with("http://") || frontend_url.starts_with("https://")) {
            return Err(ConfigError::Invalid {
                key: "FRONTEND_URL",
                reason: format!("{frontend_url:?} is not an http(s) URL"),
            });
        }

        let trust_forwarded = match env("SIGNSECURE_TRUST_FORWARDED") {
            Some(raw) => parse_flag(&raw).ok_or_else(|| ConfigError::Invalid {
                key: "SIGNSECURE_TRUST_FORWARDED",
                reason: format!("{raw:?} is not a boolean"),
            })?,
            None => file.trust_forwarded.unwrap_or(defaults.trust_forwarded),
        };

        let non_empty = |v: String| (!v.trim().is_empty()).then_some(v);

        Ok(Self {
            port,
            auth_secret: env("SIGNSECURE_AUTH_SECRET")
                .or(file.auth_secret)
                .and_then(non_empty)
                .map(SecretString::new),
            token_secret: env("SIGNSECURE_TOKEN_SECRET")
                .or(file.token_secret)
                .and_then(non_empty)
                .map(SecretString::new),
            token_ttl_days,
            frontend_url,
            from_email: env("DEFAULT_FROM_EMAIL")
                .or(file.from_email)
                .unwrap_or(defaults.from_email),
            database_url: env("DATABASE_URL")
                .or(file.database_url)
                .and_then(non_empty)
                .map(SecretString::new),
            trust_forwarded,
        })
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl FileConfig {
    /// Read and parse a YAML config file.
    pub fn read(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Parse YAML text.
    pub fn parse(raw: &str) -> Result<Self, serde_yaml::Error> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(raw)
    }
}
