//! Process configuration, read once at startup.

use std::path::PathBuf;

use thiserror::Error;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),

    #[error("{0} must not be empty")]
    Empty(&'static str),

    #[error("failed to read seed file {path}: {reason}")]
    Seed { path: String, reason: String },
}

/// Configuration consumed by the core.
///
/// The signing secret is required: a missing or blank secret is a startup
/// error, never silently defaulted.
#[derive(Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub jwt_secret: String,
    pub bind_addr: String,
    /// Token accepted when a legacy client sends no `Authorization` header.
    pub legacy_token: Option<String>,
    pub seed_path: Option<PathBuf>,
    /// When set, audit and timeline rows go to Postgres.
    pub database_url: Option<String>,
    /// Record the first `X-Forwarded-For` hop as the client address. Only
    /// enable behind a proxy that overwrites the header.
    pub trust_forwarded_for: bool,
}

impl core::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AppConfig")
            .field("jwt_secret", &"<redacted>")
            .field("bind_addr", &self.bind_addr)
            .field("legacy_token", &self.legacy_token.as_ref().map(|_| "<redacted>"))
            .field("seed_path", &self.seed_path)
            .field("database_url", &self.database_url.as_ref().map(|_| "<redacted>"))
            .field("trust_forwarded_for", &self.trust_forwarded_for)
            .finish()
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (tests pass a map).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_blank = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let jwt_secret = lookup("LEXDESK_JWT_SECRET").ok_or(ConfigError::Missing("LEXDESK_JWT_SECRET"))?;
        if jwt_secret.trim().is_empty() {
            return Err(ConfigError::Empty("LEXDESK_JWT_SECRET"));
        }

        Ok(Self {
            jwt_secret,
            bind_addr: non_blank("LEXDESK_BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            legacy_token: non_blank("LEXDESK_LEGACY_TOKEN"),
            seed_path: non_blank("LEXDESK_SEED_PATH").map(PathBuf::from),
            database_url: non_blank("DATABASE_URL"),
            trust_forwarded_for: non_blank("LEXDESK_TRUST_FORWARDED_FOR")
                .is_some_and(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes")),
        })
    }
}
