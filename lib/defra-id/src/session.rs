//! Server-side session records for Defra ID sign-ins.
//!
//! A `UserSession` is created after the authorization-code exchange, stored
//! under the provider's `sessionId` claim, rewritten by token refresh, and
//! deleted on sign-out. The record embeds the token and end-session endpoints
//! captured at sign-in so refresh and sign-out never re-run discovery.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::claims::IdentityClaims;
use crate::display::display_name;
use crate::error::ProfileError;
use crate::relationship::{Relationship, current_relationship, parse_relationships};

/// How close to access-token expiry a session is refreshed.
///
/// Refreshing a minute early keeps a token obtained from `getUserSession`
/// usable for the remainder of the request that fetched it.
const REFRESH_SKEW_SECONDS: i64 = 60;

/// Unique identifier for a stored session.
///
/// This is the provider's `sessionId` claim, treated as opaque.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Creates a session ID from a string.
    #[must_use]
    pub fn new(id: String) -> Self {
        Self(id)
    }

    /// Returns the session ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for SessionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// The tokens returned by the provider's token endpoint.
///
/// The same shape comes back from the authorization-code exchange and from a
/// `refresh_token` grant; a refresh response may omit the id or refresh token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSet {
    pub access_token: String,
    pub id_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_in_secs: i64,
}

/// The persisted session record for a signed-in user.
///
/// Serialized camelCase for the session store. The raw relationship strings
/// are authoritative; parsed [`Relationship`] values are derived on demand so
/// they can never drift from the claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSession {
    /// Defra ID user id (the token's subject).
    pub id: String,
    pub correlation_id: Option<String>,
    /// Store key; fixed for the lifetime of the provider session.
    pub session_id: SessionId,
    pub contact_id: Option<String>,
    pub service_id: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub display_name: String,
    pub email: Option<String>,
    pub unique_reference: Option<String>,
    pub loa: Option<i64>,
    pub aal: Option<i64>,
    pub enrolment_count: Option<i64>,
    pub enrolment_request_count: Option<i64>,
    pub current_relationship_id: Option<String>,
    /// Raw `relationshipId:organisationId:organisationName` claim strings.
    pub relationships: Vec<String>,
    pub roles: Vec<String>,
    pub is_authenticated: bool,
    /// Identity token, replayed as the `id_token_hint` at sign-out.
    pub id_token: String,
    /// Access token for bearer-authenticated backend calls.
    pub token: String,
    pub refresh_token: Option<String>,
    /// Access-token lifetime at issue, in milliseconds.
    #[serde(rename = "expiresIn")]
    pub expires_in_ms: i64,
    pub expires_at: DateTime<Utc>,
    /// Provider token endpoint, captured at sign-in for refresh.
    pub token_url: String,
    /// Provider end-session endpoint, captured at sign-in for sign-out.
    pub logout_url: String,
}

impl UserSession {
    /// Builds the session record for a fresh sign-in.
    ///
    /// # Errors
    ///
    /// Fails when the claims lack a `sessionId` (nothing to key the store
    /// by), the token response lacks an `id_token`, or no display name can
    /// be derived.
    pub fn create(
        claims: &IdentityClaims,
        tokens: &TokenSet,
        preferred_name_claim: Option<&str>,
        token_url: String,
        logout_url: String,
    ) -> Result<Self, ProfileError> {
        let session_id = claims
            .session_id
            .clone()
            .ok_or_else(|| ProfileError::MissingClaim {
                claim: "sessionId".to_string(),
            })?;
        let id_token = tokens
            .id_token
            .clone()
            .ok_or_else(|| ProfileError::MissingTokenField {
                field: "id_token".to_string(),
            })?;
        let display_name = display_name(claims, preferred_name_claim)?;

        Ok(Self {
            id: claims.sub.clone(),
            correlation_id: claims.correlation_id.clone(),
            session_id: SessionId::new(session_id),
            contact_id: claims.contact_id.clone(),
            service_id: claims.service_id.clone(),
            first_name: claims.first_name.clone(),
            last_name: claims.last_name.clone(),
            display_name,
            email: claims.email.clone(),
            unique_reference: claims.unique_reference.clone(),
            loa: claims.loa,
            aal: claims.aal,
            enrolment_count: claims.enrolment_count,
            enrolment_request_count: claims.enrolment_request_count,
            current_relationship_id: claims.current_relationship_id.clone(),
            relationships: claims.relationships.clone(),
            roles: claims.roles.clone(),
            is_authenticated: true,
            id_token,
            token: tokens.access_token.clone(),
            refresh_token: tokens.refresh_token.clone(),
            expires_in_ms: tokens.expires_in_secs * 1000,
            expires_at: Utc::now() + Duration::seconds(tokens.expires_in_secs),
            token_url,
            logout_url,
        })
    }

    /// Merges a refreshed token set into this session.
    ///
    /// Claim-derived fields are replaced from the refreshed access token's
    /// payload and the display name is recomputed. The store key and the
    /// endpoints captured at sign-in are preserved, as are the id and
    /// refresh tokens when the refresh response omits them.
    ///
    /// # Errors
    ///
    /// Fails when no display name can be derived from the refreshed claims.
    pub fn apply_refresh(
        &self,
        claims: &IdentityClaims,
        tokens: &TokenSet,
        preferred_name_claim: Option<&str>,
    ) -> Result<Self, ProfileError> {
        let display_name = display_name(claims, preferred_name_claim)?;

        Ok(Self {
            id: claims.sub.clone(),
            correlation_id: claims.correlation_id.clone(),
            session_id: self.session_id.clone(),
            contact_id: claims.contact_id.clone(),
            service_id: claims.service_id.clone(),
            first_name: claims.first_name.clone(),
            last_name: claims.last_name.clone(),
            display_name,
            email: claims.email.clone(),
            unique_reference: claims.unique_reference.clone(),
            loa: claims.loa,
            aal: claims.aal,
            enrolment_count: claims.enrolment_count,
            enrolment_request_count: claims.enrolment_request_count,
            current_relationship_id: claims.current_relationship_id.clone(),
            relationships: claims.relationships.clone(),
            roles: claims.roles.clone(),
            is_authenticated: true,
            id_token: tokens.id_token.clone().unwrap_or_else(|| self.id_token.clone()),
            token: tokens.access_token.clone(),
            refresh_token: tokens
                .refresh_token
                .clone()
                .or_else(|| self.refresh_token.clone()),
            expires_in_ms: tokens.expires_in_secs * 1000,
            expires_at: Utc::now() + Duration::seconds(tokens.expires_in_secs),
            token_url: self.token_url.clone(),
            logout_url: self.logout_url.clone(),
        })
    }

    /// Returns true once the access token has expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    /// Returns true when the access token is within the refresh skew of
    /// expiry and the session should be refreshed before use.
    #[must_use]
    pub fn needs_refresh(&self) -> bool {
        Utc::now() + Duration::seconds(REFRESH_SKEW_SECONDS) >= self.expires_at
    }

    /// Parses the raw relationship strings into typed relationships.
    #[must_use]
    pub fn parsed_relationships(&self) -> Vec<Relationship> {
        parse_relationships(&self.relationships, self.current_relationship_id.as_deref())
    }

    /// Returns the relationship the user currently acts under, if any.
    #[must_use]
    pub fn current_relationship(&self) -> Option<Relationship> {
        let relationships = self.parsed_relationships();
        current_relationship(&relationships).cloned()
    }

    /// Builds the provider end-session URL for signing this session out.
    ///
    /// # Errors
    ///
    /// Fails when the stored end-session endpoint is not a valid URL.
    pub fn end_session_url(
        &self,
        post_logout_redirect_uri: &str,
    ) -> Result<String, url::ParseError> {
        let mut url = Url::parse(&self.logout_url)?;
        url.query_pairs_mut()
            .append_pair("id_token_hint", &self.id_token)
            .append_pair("post_logout_redirect_uri", post_logout_redirect_uri);
        Ok(url.into())
    }
}

/// The signed-in user as page handlers see them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionUser {
    pub id: String,
    pub name: String,
}

/// Per-request view of the session for page handlers.
///
/// Recomputed from the authoritative [`UserSession`] on every request rather
/// than cached, so it can never diverge from the store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionContext {
    pub user: SessionUser,
    pub relationships: Vec<Relationship>,
    pub current_relationship: Option<Relationship>,
    pub logout_url: String,
}

impl SessionContext {
    /// Derives the per-request view from a stored session.
    #[must_use]
    pub fn from_session(session: &UserSession) -> Self {
        let relationships = session.parsed_relationships();
        let current_relationship = current_relationship(&relationships).cloned();

        Self {
            user: SessionUser {
                id: session.id.clone(),
                name: session.display_name.clone(),
            },
            relationships,
            current_relationship,
            logout_url: session.logout_url.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn claims() -> IdentityClaims {
        serde_json::from_value(json!({
            "sub": "user-123",
            "correlationId": "corr-1",
            "sessionId": "sess-1",
            "contactId": "contact-1",
            "serviceId": "service-1",
            "firstName": "Jo",
            "lastName": "Bloggs",
            "email": "jo.bloggs@example.com",
            "currentRelationshipId": "rel-1",
            "relationships": ["rel-1:org-1:Acme Ltd", "rel-2:org-2:Globex"],
            "roles": ["rel-1:employee:3"]
        }))
        .expect("claims")
    }

    fn tokens() -> TokenSet {
        TokenSet {
            access_token: "access-1".to_string(),
            id_token: Some("id-1".to_string()),
            refresh_token: Some("refresh-1".to_string()),
            expires_in_secs: 3600,
        }
    }

    fn session() -> UserSession {
        UserSession::create(
            &claims(),
            &tokens(),
            None,
            "https://idm.example.com/token".to_string(),
            "https://idm.example.com/logout".to_string(),
        )
        .expect("session")
    }

    #[test]
    fn create_captures_claims_and_tokens() {
        let before = Utc::now();
        let session = session();
        let after = Utc::now();

        assert_eq!(session.id, "user-123");
        assert_eq!(session.session_id.as_str(), "sess-1");
        assert_eq!(session.display_name, "Jo Bloggs");
        assert_eq!(session.email.as_deref(), Some("jo.bloggs@example.com"));
        assert!(session.is_authenticated);
        assert_eq!(session.id_token, "id-1");
        assert_eq!(session.token, "access-1");
        assert_eq!(session.refresh_token.as_deref(), Some("refresh-1"));
        assert_eq!(session.expires_in_ms, 3_600_000);
        assert!(session.expires_at >= before + Duration::seconds(3600));
        assert!(session.expires_at <= after + Duration::seconds(3600));
        assert_eq!(session.token_url, "https://idm.example.com/token");
        assert_eq!(session.logout_url, "https://idm.example.com/logout");
    }

    #[test]
    fn create_requires_session_id_claim() {
        let mut claims = claims();
        claims.session_id = None;

        let err = UserSession::create(
            &claims,
            &tokens(),
            None,
            "https://idm.example.com/token".to_string(),
            "https://idm.example.com/logout".to_string(),
        )
        .expect_err("must fail");

        assert_eq!(
            err,
            ProfileError::MissingClaim {
                claim: "sessionId".to_string()
            }
        );
    }

    #[test]
    fn create_requires_id_token() {
        let mut tokens = tokens();
        tokens.id_token = None;

        let err = UserSession::create(
            &claims(),
            &tokens,
            None,
            "https://idm.example.com/token".to_string(),
            "https://idm.example.com/logout".to_string(),
        )
        .expect_err("must fail");

        assert_eq!(
            err,
            ProfileError::MissingTokenField {
                field: "id_token".to_string()
            }
        );
    }

    #[test]
    fn refresh_replaces_tokens_and_claims() {
        let session = session();

        let mut refreshed_claims = claims();
        refreshed_claims.first_name = Some("Josephine".to_string());
        refreshed_claims.current_relationship_id = Some("rel-2".to_string());
        let refreshed_tokens = TokenSet {
            access_token: "access-2".to_string(),
            id_token: Some("id-2".to_string()),
            refresh_token: Some("refresh-2".to_string()),
            expires_in_secs: 1800,
        };

        let updated = session
            .apply_refresh(&refreshed_claims, &refreshed_tokens, None)
            .expect("refresh");

        assert_eq!(updated.display_name, "Josephine Bloggs");
        assert_eq!(updated.current_relationship_id.as_deref(), Some("rel-2"));
        assert_eq!(updated.id_token, "id-2");
        assert_eq!(updated.token, "access-2");
        assert_eq!(updated.refresh_token.as_deref(), Some("refresh-2"));
        assert_eq!(updated.expires_in_ms, 1_800_000);
        // Sign-in-scoped fields survive the merge
        assert_eq!(updated.session_id, session.session_id);
        assert_eq!(updated.token_url, session.token_url);
        assert_eq!(updated.logout_url, session.logout_url);
    }

    #[test]
    fn refresh_keeps_tokens_the_response_omits() {
        let session = session();

        let refreshed_tokens = TokenSet {
            access_token: "access-2".to_string(),
            id_token: None,
            refresh_token: None,
            expires_in_secs: 1800,
        };

        let updated = session
            .apply_refresh(&claims(), &refreshed_tokens, None)
            .expect("refresh");

        assert_eq!(updated.id_token, "id-1");
        assert_eq!(updated.refresh_token.as_deref(), Some("refresh-1"));
    }

    #[test]
    fn refresh_is_idempotent_for_identical_payloads() {
        let session = session();
        let refreshed_tokens = TokenSet {
            access_token: "access-2".to_string(),
            id_token: Some("id-2".to_string()),
            refresh_token: Some("refresh-2".to_string()),
            expires_in_secs: 1800,
        };

        let once = session
            .apply_refresh(&claims(), &refreshed_tokens, None)
            .expect("refresh");
        let twice = once
            .apply_refresh(&claims(), &refreshed_tokens, None)
            .expect("refresh");

        let mut once_pinned = once.clone();
        once_pinned.expires_at = twice.expires_at;
        assert_eq!(once_pinned, twice);
    }

    #[test]
    fn fresh_session_does_not_need_refresh() {
        assert!(!session().needs_refresh());
        assert!(!session().is_expired());
    }

    #[test]
    fn session_near_expiry_needs_refresh() {
        let mut session = session();
        session.expires_at = Utc::now() + Duration::seconds(30);

        assert!(session.needs_refresh());
        assert!(!session.is_expired());
    }

    #[test]
    fn expired_session_needs_refresh() {
        let mut session = session();
        session.expires_at = Utc::now() - Duration::seconds(1);

        assert!(session.needs_refresh());
        assert!(session.is_expired());
    }

    #[test]
    fn parses_relationships_from_raw_strings() {
        let session = session();

        let relationships = session.parsed_relationships();
        assert_eq!(relationships.len(), 2);
        assert!(relationships[0].is_current);

        let current = session.current_relationship().expect("current");
        assert_eq!(current.id, "rel-1");
        assert_eq!(current.organisation_name.as_deref(), Some("Acme Ltd"));
    }

    #[test]
    fn end_session_url_carries_hint_and_redirect() {
        let url = session()
            .end_session_url("https://app.example.com/")
            .expect("url");

        assert!(url.starts_with("https://idm.example.com/logout?"));
        assert!(url.contains("id_token_hint=id-1"));
        assert!(url.contains("post_logout_redirect_uri=https%3A%2F%2Fapp.example.com%2F"));
    }

    #[test]
    fn end_session_url_rejects_invalid_endpoint() {
        let mut session = session();
        session.logout_url = "not a url".to_string();

        assert!(session.end_session_url("https://app.example.com/").is_err());
    }

    #[test]
    fn serializes_camel_case_for_the_store() {
        let value = serde_json::to_value(session()).expect("serialize");

        let object = value.as_object().expect("object");
        for key in [
            "correlationId",
            "sessionId",
            "displayName",
            "currentRelationshipId",
            "isAuthenticated",
            "idToken",
            "refreshToken",
            "expiresIn",
            "expiresAt",
            "tokenUrl",
            "logoutUrl",
        ] {
            assert!(object.contains_key(key), "missing key {key}");
        }
        assert_eq!(value["expiresIn"], json!(3_600_000));
    }

    #[test]
    fn store_round_trip_preserves_tokens() {
        let session = session();

        let json = serde_json::to_string(&session).expect("serialize");
        let parsed: UserSession = serde_json::from_str(&json).expect("deserialize");

        assert_eq!(parsed, session);
    }

    #[test]
    fn context_is_derived_from_the_session() {
        let session = session();

        let context = SessionContext::from_session(&session);

        assert_eq!(context.user.id, "user-123");
        assert_eq!(context.user.name, "Jo Bloggs");
        assert_eq!(context.relationships.len(), 2);
        let current = context.current_relationship.expect("current");
        assert_eq!(current.id, "rel-1");
        assert_eq!(context.logout_url, "https://idm.example.com/logout");
    }

    #[test]
    fn context_has_no_current_relationship_without_match() {
        let mut session = session();
        session.current_relationship_id = Some("rel-9".to_string());

        let context = SessionContext::from_session(&session);

        assert!(context.current_relationship.is_none());
    }
}
