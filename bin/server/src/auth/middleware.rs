//! Authentication middleware and extractors for Axum.
//!
//! [`Authenticated`] is the only way handlers obtain a session: it reads the
//! store through the session accessor, transparently refreshes a token
//! nearing expiry, and derives the per-request [`SessionContext`]. Handlers
//! therefore never observe a half-refreshed session.

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::PrivateCookieJar;
use epr_frontend_defra_id::{SessionContext, UserSession};
use std::sync::Arc;

use super::AppState;
use super::refresh::refresh_access_token;
use super::session::{SessionError, get_user_session, update_user_session};

/// Extractor requiring a signed-in user.
///
/// If the user is not signed in, they are redirected to the login route.
pub struct Authenticated {
    /// The stored session record, refreshed if it was nearing expiry.
    pub session: UserSession,
    /// Per-request view derived from the session.
    pub context: SessionContext,
}

impl<S> FromRequestParts<S> for Authenticated
where
    Arc<AppState>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = Arc::<AppState>::from_ref(state);
        let jar = PrivateCookieJar::from_headers(&parts.headers, app_state.cookie_key.clone());

        let mut session = get_user_session(app_state.session_store.as_ref(), &jar)
            .await
            .map_err(|e| match e {
                SessionError::NotFound => AuthRejection::NotAuthenticated,
                other => {
                    tracing::error!(error = %other, "Failed to read user session");
                    AuthRejection::InternalError
                }
            })?;

        if session.needs_refresh() {
            session = refresh_session(&app_state, &jar, session).await?;
        }

        let context = SessionContext::from_session(&session);

        Ok(Authenticated { session, context })
    }
}

/// Refreshes the session's tokens and rewrites the stored record.
///
/// A failed refresh ends the session: the record is removed so the next
/// request starts a clean sign-in.
async fn refresh_session(
    app_state: &Arc<AppState>,
    jar: &PrivateCookieJar,
    session: UserSession,
) -> Result<UserSession, AuthRejection> {
    let refreshed = match refresh_access_token(
        &app_state.config.defra_id,
        &session,
        app_state.config.http.request_timeout(),
    )
    .await
    {
        Ok(refreshed) => refreshed,
        Err(e) => {
            tracing::info!(user = %session.id, error = %e, "Token refresh failed, ending session");
            let _ = app_state.session_store.remove(&session.session_id).await;
            return Err(AuthRejection::SessionExpired);
        }
    };

    update_user_session(
        app_state.session_store.as_ref(),
        jar,
        app_state.config.defra_id.preferred_name_claim(),
        &refreshed,
    )
    .await
    .map_err(|e| match e {
        SessionError::Store(e) => {
            tracing::error!(error = %e, "Failed to store refreshed session");
            AuthRejection::InternalError
        }
        other => {
            tracing::warn!(error = %other, "Refreshed tokens unusable, ending session");
            AuthRejection::SessionExpired
        }
    })
}

/// Extractor for optionally getting the signed-in user.
///
/// Returns None if the user is not signed in.
pub struct MaybeAuthenticated(pub Option<Authenticated>);

impl<S> FromRequestParts<S> for MaybeAuthenticated
where
    Arc<AppState>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Authenticated::from_request_parts(parts, state).await {
            Ok(auth) => Ok(MaybeAuthenticated(Some(auth))),
            Err(_) => Ok(MaybeAuthenticated(None)),
        }
    }
}

/// Rejection type for authentication extractors.
#[derive(Debug)]
pub enum AuthRejection {
    NotAuthenticated,
    SessionExpired,
    InternalError,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            Self::NotAuthenticated | Self::SessionExpired => {
                Redirect::to("/login").into_response()
            }
            Self::InternalError => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
            }
        }
    }
}
