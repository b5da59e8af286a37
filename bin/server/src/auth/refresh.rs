//! Access-token refresh.
//!
//! Refresh goes to the token endpoint embedded in the session record at
//! sign-in, not to freshly discovered configuration, so a session keeps
//! working against the endpoints it was created with. The client is built
//! per call because the endpoint comes from the session.

use epr_frontend_defra_id::{DefraIdConfig, TokenSet, UserSession};
use oauth2::{AuthType, ClientId, ClientSecret, RefreshToken, Scope, TokenUrl};
use std::time::Duration;

use super::strategy::{AUTH_SCOPES, DefraIdOAuthClient, token_set_from_response};

/// Token refresh errors.
#[derive(Debug)]
pub enum RefreshError {
    /// The session holds no refresh token to present.
    NoRefreshToken,
    /// The token endpoint stored in the session was invalid.
    Configuration(String),
    /// The `refresh_token` grant failed.
    Grant(String),
}

impl std::fmt::Display for RefreshError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoRefreshToken => write!(f, "Session has no refresh token"),
            Self::Configuration(msg) => write!(f, "Configuration error: {msg}"),
            Self::Grant(msg) => write!(f, "Token refresh error: {msg}"),
        }
    }
}

impl std::error::Error for RefreshError {}

/// Presents the session's refresh token for a new token set.
///
/// # Errors
///
/// Returns an error if the session has no refresh token, its stored token
/// endpoint is invalid, or the provider rejects the grant.
pub async fn refresh_access_token(
    config: &DefraIdConfig,
    session: &UserSession,
    request_timeout: Duration,
) -> Result<TokenSet, RefreshError> {
    let refresh_token = session
        .refresh_token
        .as_ref()
        .ok_or(RefreshError::NoRefreshToken)?;

    let token_url = TokenUrl::new(session.token_url.clone())
        .map_err(|e| RefreshError::Configuration(format!("invalid token endpoint: {e}")))?;

    let client = DefraIdOAuthClient::new(ClientId::new(config.client_id().to_string()))
        .set_client_secret(ClientSecret::new(config.client_secret().to_string()))
        .set_auth_type(AuthType::RequestBody)
        .set_token_uri(token_url);

    let http_client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .timeout(request_timeout)
        .build()
        .map_err(|e| RefreshError::Configuration(format!("HTTP client error: {e}")))?;

    let token_result = client
        .exchange_refresh_token(&RefreshToken::new(refresh_token.clone()))
        .add_scopes(AUTH_SCOPES.iter().map(|s| Scope::new((*s).to_string())))
        .request_async(&http_client)
        .await
        .map_err(|e| RefreshError::Grant(e.to_string()))?;

    Ok(token_set_from_response(&token_result))
}
