//! Reading, rewriting, and removing the user session for a request.
//!
//! The session cookie carries only the session id; the record itself lives
//! in the session store. Everything here goes through the same three
//! operations so every call site agrees on what "signed in" means:
//! - [`get_user_session`] reads without side effects
//! - [`update_user_session`] merges refreshed tokens and re-reads
//! - [`remove_user_session`] deletes the record and expires the cookie

use axum_extra::extract::PrivateCookieJar;
use axum_extra::extract::cookie::Cookie;
use epr_frontend_defra_id::{
    IdentityClaims, ProfileError, SessionId, TokenDecodeError, TokenSet, UserSession,
};
use time::Duration as TimeDuration;

use super::store::{SessionStore, StoreError};

/// Cookie holding the session id.
pub const SESSION_COOKIE: &str = "user-session";

/// Session access errors.
#[derive(Debug)]
pub enum SessionError {
    /// No live session: the cookie is missing or unreadable, or the store
    /// has no live record under its id.
    NotFound,
    /// The refreshed access token payload could not be decoded.
    TokenDecode(TokenDecodeError),
    /// The refreshed claims could not be resolved into a profile.
    Profile(ProfileError),
    /// The session store failed.
    Store(StoreError),
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound => write!(f, "No user session"),
            Self::TokenDecode(e) => write!(f, "Token decode error: {e}"),
            Self::Profile(e) => write!(f, "Profile error: {e}"),
            Self::Store(e) => write!(f, "Session store error: {e}"),
        }
    }
}

impl std::error::Error for SessionError {}

impl From<StoreError> for SessionError {
    fn from(e: StoreError) -> Self {
        Self::Store(e)
    }
}

impl From<TokenDecodeError> for SessionError {
    fn from(e: TokenDecodeError) -> Self {
        Self::TokenDecode(e)
    }
}

impl From<ProfileError> for SessionError {
    fn from(e: ProfileError) -> Self {
        Self::Profile(e)
    }
}

/// Reads the session the request's cookie points at.
///
/// Safe to call any number of times per request: it never writes, so
/// repeated calls observe the same record.
///
/// # Errors
///
/// Fails with [`SessionError::NotFound`] when the cookie is absent or
/// unreadable, or the store holds no live record for it.
pub async fn get_user_session<K>(
    store: &dyn SessionStore,
    jar: &PrivateCookieJar<K>,
) -> Result<UserSession, SessionError> {
    let cookie = jar.get(SESSION_COOKIE).ok_or(SessionError::NotFound)?;
    let session_id = SessionId::from(cookie.value());

    store.get(&session_id).await?.ok_or(SessionError::NotFound)
}

/// Merges a refreshed token set into the stored session.
///
/// The record is rewritten under its existing session id and then read
/// back, so the caller observes exactly what later requests will see.
///
/// # Errors
///
/// Fails when there is no session to update, the refreshed access token
/// cannot be decoded, or the store rejects the write.
pub async fn update_user_session<K>(
    store: &dyn SessionStore,
    jar: &PrivateCookieJar<K>,
    preferred_name_claim: Option<&str>,
    refreshed: &TokenSet,
) -> Result<UserSession, SessionError> {
    let current = get_user_session(store, jar).await?;

    let claims = IdentityClaims::from_token(&refreshed.access_token)?;
    let updated = current.apply_refresh(&claims, refreshed, preferred_name_claim)?;
    store.put(&updated).await?;

    get_user_session(store, jar).await
}

/// Removes the session record and expires the session cookie.
///
/// Calling this with no session (or an already-removed one) succeeds: the
/// store delete is a no-op and the cookie is expired regardless.
///
/// # Errors
///
/// Fails only when the store delete itself fails.
pub async fn remove_user_session<K>(
    store: &dyn SessionStore,
    jar: PrivateCookieJar<K>,
) -> Result<PrivateCookieJar<K>, SessionError> {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        let session_id = SessionId::from(cookie.value());
        store.remove(&session_id).await?;
    }

    let removal = Cookie::build((SESSION_COOKIE, ""))
        .path("/")
        .max_age(TimeDuration::ZERO);

    Ok(jar.add(removal))
}
