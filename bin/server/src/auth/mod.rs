//! Authentication module for the EPR frontend server.
//!
//! This module provides:
//! - Defra ID OIDC discovery and the OAuth2 authorization-code strategy
//! - Server-side session records behind an encrypted session-id cookie
//! - Transparent access-token refresh near expiry
//! - Authentication extractors for Axum routes
//! - Bearer-authenticated backend calls with organisation-linking
//!   interception
//!
//! # Session model
//!
//! The cookie names a record in the session store; everything else (tokens,
//! claims, the provider endpoints captured at sign-in) lives server side.
//! Signing in rewrites the whole record, refresh merges into it, signing
//! out deletes it. Handlers read it only through the [`Authenticated`]
//! extractor, which refreshes first, so a session a handler holds is always
//! usable for the rest of the request.

pub mod discovery;
pub mod fetch;
pub mod middleware;
pub mod refresh;
pub mod routes;
pub mod session;
pub mod store;
pub mod strategy;

use axum::extract::FromRef;
use axum_extra::extract::cookie::Key;
use std::sync::Arc;

use crate::config::ServerConfig;

pub use discovery::{OidcConfiguration, fetch_oidc_configuration};
pub use fetch::{BackendClient, FetchError, FetchOutcome};
pub use middleware::{Authenticated, MaybeAuthenticated};
pub use routes::{callback, login, logout};
pub use store::{MemorySessionStore, PostgresSessionStore, SessionStore};
pub use strategy::DefraIdStrategy;

/// Shared application state.
pub struct AppState {
    /// Loaded server configuration.
    pub config: ServerConfig,
    /// Session store engine.
    pub session_store: Arc<dyn SessionStore>,
    /// Defra ID sign-in strategy.
    pub strategy: DefraIdStrategy,
    /// Client for the EPR backend API.
    pub backend: BackendClient,
    /// Key the session and flow cookies are encrypted with.
    pub cookie_key: Key,
}

impl AppState {
    /// Creates a new application state.
    ///
    /// The cookie key is derived from the configured cookie password, and
    /// the backend client shares the given HTTP client.
    pub fn new(
        config: ServerConfig,
        session_store: Arc<dyn SessionStore>,
        strategy: DefraIdStrategy,
        http_client: reqwest::Client,
    ) -> Self {
        let cookie_key = Key::derive_from(config.session.cookie_password.as_bytes());
        let backend = BackendClient::new(
            http_client,
            config.epr_backend_url.clone(),
            config.defra_id.registration_base_url().to_string(),
        );

        Self {
            config,
            session_store,
            strategy,
            backend,
            cookie_key,
        }
    }
}

/// The state's cookie key, as its own type.
///
/// The orphan rule forbids `impl FromRef<Arc<AppState>> for Key`, so the
/// jar extractors name this local key type instead.
pub struct CookieKey(Key);

impl FromRef<Arc<AppState>> for CookieKey {
    fn from_ref(state: &Arc<AppState>) -> Self {
        CookieKey(state.cookie_key.clone())
    }
}

impl From<CookieKey> for Key {
    fn from(key: CookieKey) -> Self {
        key.0
    }
}
