//! Centralized server configuration.
//!
//! This module provides strongly-typed configuration for the server,
//! loaded via the `config` crate from environment variables.
//!
//! See [`DefraIdConfig`](epr_frontend_defra_id::DefraIdConfig) for the
//! Defra ID provider configuration.

use epr_frontend_defra_id::DefraIdConfig;
use serde::Deserialize;
use std::time::Duration;

/// Minimum length of the cookie password, in bytes.
///
/// The password seeds the key that encrypts session cookies; anything
/// shorter cannot be stretched into a usable key.
pub const MIN_COOKIE_PASSWORD_BYTES: usize = 32;

/// Server configuration composed from library configs.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Address the server binds to.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Public base URL of this service, without a trailing slash.
    /// The OAuth2 callback and the post-logout redirect are built on it.
    pub app_base_url: String,

    /// Base URL of the EPR backend API, without a trailing slash.
    pub epr_backend_url: String,

    /// Outbound HTTP configuration.
    #[serde(default)]
    pub http: HttpConfig,

    /// Session configuration.
    pub session: SessionConfig,

    /// Defra ID provider configuration.
    pub defra_id: DefraIdConfig,
}

/// Outbound HTTP configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    /// Timeout applied to outbound requests, in seconds.
    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,
}

impl HttpConfig {
    /// Request timeout as a [`Duration`].
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

/// Session-related configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Password the session and sign-in flow cookies are encrypted with.
    /// Must be at least [`MIN_COOKIE_PASSWORD_BYTES`] bytes.
    pub cookie_password: String,

    /// Whether to set the Secure flag on cookies (requires HTTPS).
    /// Defaults to true for production safety; set to false for local HTTP development.
    #[serde(default = "default_secure_cookies")]
    pub secure_cookies: bool,

    /// How long session records are retained, in minutes.
    #[serde(default = "default_ttl_minutes")]
    pub ttl_minutes: i64,

    /// Interval between expired-session purge runs, in seconds.
    #[serde(default = "default_cleanup_interval_seconds")]
    pub cleanup_interval_seconds: u64,

    /// Session store engine configuration.
    #[serde(default)]
    pub store: StoreConfig,
}

/// Session store engine configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StoreConfig {
    /// Which store engine holds session records.
    #[serde(default)]
    pub engine: StoreEngine,

    /// PostgreSQL connection URL; required by the postgres engine.
    #[serde(default)]
    pub database_url: Option<String>,
}

/// Available session store engines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreEngine {
    /// Process-local store. Sessions do not survive a restart.
    #[default]
    Memory,
    /// PostgreSQL-backed store shared across instances.
    Postgres,
}

fn default_bind_address() -> String {
    "127.0.0.1:3000".to_string()
}

fn default_request_timeout_seconds() -> u64 {
    30
}

fn default_secure_cookies() -> bool {
    true
}

fn default_ttl_minutes() -> i64 {
    240
}

fn default_cleanup_interval_seconds() -> u64 {
    300
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout_seconds: default_request_timeout_seconds(),
        }
    }
}

impl ServerConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required configuration is missing or invalid.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        let config: Self = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), config::ConfigError> {
        if self.session.cookie_password.len() < MIN_COOKIE_PASSWORD_BYTES {
            return Err(config::ConfigError::Message(format!(
                "session.cookie_password must be at least {MIN_COOKIE_PASSWORD_BYTES} bytes"
            )));
        }
        if self.session.store.engine == StoreEngine::Postgres
            && self.session.store.database_url.is_none()
        {
            return Err(config::ConfigError::Message(
                "session.store.database_url is required by the postgres store engine".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use epr_frontend_defra_id::DefraIdConfig;

    fn config_with_password(password: &str) -> ServerConfig {
        ServerConfig {
            bind_address: default_bind_address(),
            app_base_url: "http://localhost:3000".to_string(),
            epr_backend_url: "http://localhost:3001".to_string(),
            http: HttpConfig::default(),
            session: SessionConfig {
                cookie_password: password.to_string(),
                secure_cookies: false,
                ttl_minutes: default_ttl_minutes(),
                cleanup_interval_seconds: default_cleanup_interval_seconds(),
                store: StoreConfig::default(),
            },
            defra_id: DefraIdConfig::new(
                "https://idm.example/.well-known/openid-configuration".to_string(),
                "service-1".to_string(),
                "client-1".to_string(),
                "secret-1".to_string(),
            ),
        }
    }

    #[test]
    fn http_config_has_correct_defaults() {
        let config = HttpConfig::default();
        assert_eq!(config.request_timeout_seconds, 30);
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn store_config_defaults_to_memory_engine() {
        let config = StoreConfig::default();
        assert_eq!(config.engine, StoreEngine::Memory);
        assert!(config.database_url.is_none());
    }

    #[test]
    fn validate_rejects_short_cookie_password() {
        let config = config_with_password("too-short");
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_accepts_long_cookie_password() {
        let config = config_with_password("a-cookie-password-of-at-least-32-bytes");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_requires_database_url_for_postgres_engine() {
        let mut config = config_with_password("a-cookie-password-of-at-least-32-bytes");
        config.session.store.engine = StoreEngine::Postgres;
        assert!(config.validate().is_err());

        config.session.store.database_url = Some("postgres://localhost/epr".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn store_engine_parses_lowercase_names() {
        let engine: StoreEngine =
            serde_json::from_value(serde_json::json!("postgres")).expect("parse engine");
        assert_eq!(engine, StoreEngine::Postgres);
    }
}
