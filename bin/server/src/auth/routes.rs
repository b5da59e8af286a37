//! Authentication routes for login, callback, and logout.
//!
//! Sign-in state that must survive the round trip to the provider (the
//! CSRF `state` and the page to return to) travels in a short-lived
//! encrypted flow cookie, consumed exactly once by the callback.

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::PrivateCookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};
use serde::Deserialize;
use std::sync::Arc;
use time::Duration as TimeDuration;

use super::session::{SESSION_COOKIE, SessionError, get_user_session, remove_user_session};
use super::{AppState, CookieKey};

/// Sign-in flow cookie name.
const FLOW_COOKIE: &str = "bell-defra-id";

/// How long a sign-in attempt may take before its flow cookie lapses.
const FLOW_COOKIE_MINUTES: i64 = 10;

/// Serializable sign-in flow state for cookie storage.
#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct FlowStateData {
    /// CSRF `state` echoed back by the provider.
    state: String,
    /// Page to return the user to after sign-in, replayed once.
    referrer: Option<String>,
}

/// Query parameters for the sign-in callback.
#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    code: String,
    state: String,
}

/// Initiates sign-in by redirecting to the identity provider.
pub async fn login(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    jar: PrivateCookieJar<CookieKey>,
) -> impl IntoResponse {
    let (auth_url, csrf_state) = state.strategy.authorization_redirect();

    let referrer = headers
        .get(header::REFERER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);

    let flow_state = serde_json::to_string(&FlowStateData {
        state: csrf_state,
        referrer,
    })
    .expect("serialize sign-in flow state");

    let cookie = Cookie::build((FLOW_COOKIE, flow_state))
        .path("/")
        .http_only(true)
        .secure(state.config.session.secure_cookies)
        .same_site(SameSite::Lax)
        .max_age(TimeDuration::minutes(FLOW_COOKIE_MINUTES));

    (jar.add(cookie), Redirect::to(&auth_url))
}

/// Handles the provider callback after the user authenticates.
pub async fn callback(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CallbackQuery>,
    jar: PrivateCookieJar<CookieKey>,
) -> Result<impl IntoResponse, AuthError> {
    let flow_cookie = jar.get(FLOW_COOKIE).ok_or(AuthError::MissingFlowState)?;

    let flow_state: FlowStateData =
        serde_json::from_str(flow_cookie.value()).map_err(|_| AuthError::InvalidFlowState)?;

    // Validate the CSRF state
    if query.state != flow_state.state {
        return Err(AuthError::StateMismatch);
    }

    // Exchange the authorization code and build the session record
    let tokens = state
        .strategy
        .exchange_code(&query.code)
        .await
        .map_err(|e| AuthError::TokenExchange(e.to_string()))?;
    let session = state
        .strategy
        .profile_resolver()
        .resolve(&tokens)
        .map_err(|e| AuthError::Profile(e.to_string()))?;

    state
        .session_store
        .put(&session)
        .await
        .map_err(|e| AuthError::Store(e.to_string()))?;

    tracing::info!(user = %session.id, "User signed in");

    // Set the session cookie
    let session_cookie = Cookie::build((SESSION_COOKIE, session.session_id.to_string()))
        .path("/")
        .http_only(true)
        .secure(state.config.session.secure_cookies)
        .same_site(SameSite::Lax)
        .max_age(TimeDuration::minutes(state.config.session.ttl_minutes));

    // The flow cookie is one-shot; remove it
    let remove_flow_state = Cookie::build((FLOW_COOKIE, ""))
        .path("/")
        .max_age(TimeDuration::ZERO);

    let jar = jar.add(session_cookie).add(remove_flow_state);

    let destination = flow_state.referrer.unwrap_or_else(|| "/".to_string());

    Ok((jar, Redirect::to(&destination)))
}

/// Signs the user out here and at the identity provider.
///
/// The provider's end-session URL is built from the endpoints captured in
/// the session; the provider sends the user back to the app base URL
/// afterwards. Without a session there is nothing to end and the user just
/// goes home.
pub async fn logout(
    State(state): State<Arc<AppState>>,
    jar: PrivateCookieJar<CookieKey>,
) -> Result<(PrivateCookieJar<CookieKey>, Redirect), AuthError> {
    let session = match get_user_session(state.session_store.as_ref(), &jar).await {
        Ok(session) => session,
        Err(SessionError::NotFound) => return Ok((jar, Redirect::to("/"))),
        Err(e) => return Err(AuthError::Store(e.to_string())),
    };

    let end_session_url = session
        .end_session_url(&state.config.app_base_url)
        .map_err(|e| AuthError::Logout(e.to_string()))?;

    let jar = remove_user_session(state.session_store.as_ref(), jar)
        .await
        .map_err(|e| AuthError::Store(e.to_string()))?;

    tracing::info!(user = %session.id, "User signed out");

    Ok((jar, Redirect::to(&end_session_url)))
}

/// Authentication errors.
#[derive(Debug)]
pub enum AuthError {
    MissingFlowState,
    InvalidFlowState,
    StateMismatch,
    TokenExchange(String),
    Profile(String),
    Store(String),
    Logout(String),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        match self {
            // A broken or stale flow cookie means the sign-in attempt
            // cannot be completed; start a fresh one
            Self::MissingFlowState | Self::InvalidFlowState => {
                tracing::warn!("Sign-in flow state missing or unreadable, restarting sign-in");
                Redirect::to("/login").into_response()
            }
            Self::StateMismatch => {
                tracing::warn!("Sign-in state mismatch, restarting sign-in");
                Redirect::to("/login").into_response()
            }
            Self::TokenExchange(msg) => {
                tracing::error!(error = %msg, "Token exchange failed");
                Redirect::to("/unauthorized").into_response()
            }
            Self::Profile(msg) => {
                tracing::error!(error = %msg, "Could not resolve a profile from the token");
                Redirect::to("/unauthorized").into_response()
            }
            Self::Store(msg) => {
                tracing::error!(error = %msg, "Session store error");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
            }
            Self::Logout(msg) => {
                tracing::error!(error = %msg, "Could not build the end-session URL");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
            }
        }
    }
}
