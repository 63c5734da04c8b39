//! API server configuration.

use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8083";
pub const DEFAULT_DATABASE_URL: &str = "postgres://localhost:5432/team";
pub const DEFAULT_AUD: &str = "app.delivc.com";
pub const DEFAULT_IDENTITY_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{var} is invalid: {reason}")]
    Invalid { var: &'static str, reason: String },
}

/// Configuration for the API server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    /// Address to bind the HTTP listener.
    pub bind_addr: String,
    /// PostgreSQL connection URL.
    pub pg_connection_url: String,
    /// Base URL of the identity service; `/user` is appended.
    pub identity_endpoint: String,
    /// Deadline for one identity-service call.
    pub identity_timeout: Duration,
    /// Header carrying an upstream request id, if any.
    pub request_id_header: Option<String>,
    /// Audience used when a request has no `X-JWT-AUD` header.
    pub default_aud: String,
    /// Allowed CORS origins. Empty allows any origin.
    pub cors_allowed_origins: Vec<String>,
    pub db_max_connections: u32,
}

impl ApiConfig {
    /// Reads configuration from environment variables.
    ///
    /// | Variable                | Default                           |
    /// |-------------------------|-----------------------------------|
    /// | `BIND_ADDR`             | `0.0.0.0:8083`                    |
    /// | `DATABASE_URL`          | `postgres://localhost:5432/team`  |
    /// | `IDENTITY_ENDPOINT`     | required                          |
    /// | `IDENTITY_TIMEOUT_SECS` | `10`                              |
    /// | `REQUEST_ID_HEADER`     | unset                             |
    /// | `DEFAULT_AUD`           | `app.delivc.com`                  |
    /// | `CORS_ALLOWED_ORIGINS`  | unset (any origin)                |
    /// | `DB_MAX_CONNECTIONS`    | `5`                               |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an arbitrary variable source.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str| get(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let identity_endpoint =
            var("IDENTITY_ENDPOINT").ok_or(ConfigError::Missing("IDENTITY_ENDPOINT"))?;
        url::Url::parse(&identity_endpoint).map_err(|e| ConfigError::Invalid {
            var: "IDENTITY_ENDPOINT",
            reason: e.to_string(),
        })?;

        let identity_timeout_secs = match var("IDENTITY_TIMEOUT_SECS") {
            Some(raw) => raw.parse::<u64>().map_err(|e| ConfigError::Invalid {
                var: "IDENTITY_TIMEOUT_SECS",
                reason: e.to_string(),
            })?,
            None => DEFAULT_IDENTITY_TIMEOUT_SECS,
        };

        let db_max_connections = match var("DB_MAX_CONNECTIONS") {
            Some(raw) => raw.parse::<u32>().map_err(|e| ConfigError::Invalid {
                var: "DB_MAX_CONNECTIONS",
                reason: e.to_string(),
            })?,
            None => DEFAULT_DB_MAX_CONNECTIONS,
        };

        Ok(Self {
            bind_addr: var("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.into()),
            pg_connection_url: var("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.into()),
            identity_endpoint,
            identity_timeout: Duration::from_secs(identity_timeout_secs),
            request_id_header: var("REQUEST_ID_HEADER"),
            default_aud: var("DEFAULT_AUD").unwrap_or_else(|| DEFAULT_AUD.into()),
            cors_allowed_origins: var("CORS_ALLOWED_ORIGINS")
                .map(|raw| {
                    raw.split(',')
                        .map(str::trim)
                        .filter(|o| !o.is_empty())
                        .map(String::from)
                        .collect()
                })
                .unwrap_or_default(),
            db_max_connections,
        })
    }

    /// Defaults pointing at `identity_endpoint`, for tests and tooling.
    pub fn with_identity_endpoint(identity_endpoint: impl Into<String>) -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.into(),
            pg_connection_url: DEFAULT_DATABASE_URL.into(),
            identity_endpoint: identity_endpoint.into(),
            identity_timeout: Duration::from_secs(DEFAULT_IDENTITY_TIMEOUT_SECS),
            request_id_header: None,
            default_aud: DEFAULT_AUD.into(),
            cors_allowed_origins: Vec::new(),
            db_max_connections: DEFAULT_DB_MAX_CONNECTIONS,
        }
    }
}
