//! Defra ID authentication strategy.
//!
//! This module owns the OAuth2 authorization-code flow against Defra ID:
//! - `authorization_redirect` builds the provider URL a sign-in redirects to
//! - `exchange_code` swaps the returned code for tokens
//! - [`ProfileResolver`] decodes the access token into a [`UserSession`]
//!
//! Defra ID is a confidential client: the flow is protected by the CSRF
//! `state` parameter (round-tripped through the sign-in flow cookie), and
//! client credentials are sent in the token request body.

use epr_frontend_defra_id::{DefraIdConfig, IdentityClaims, ProfileError, TokenDecodeError, TokenSet, UserSession};
use oauth2::basic::{
    BasicErrorResponse, BasicRevocationErrorResponse, BasicTokenIntrospectionResponse,
    BasicTokenType,
};
use oauth2::{
    AuthType, AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, EndpointNotSet,
    EndpointSet, ExtraTokenFields, RedirectUrl, Scope, StandardRevocableToken,
    StandardTokenResponse, TokenResponse, TokenUrl,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::discovery::OidcConfiguration;

/// Scopes requested at sign-in and on refresh. `offline_access` yields the
/// refresh token.
pub(crate) const AUTH_SCOPES: &[&str] = &["openid", "offline_access"];

/// Fallback access-token lifetime when the provider omits `expires_in`.
const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 3600;

/// Extra token-endpoint fields Defra ID returns beyond the OAuth2 basics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdTokenFields {
    /// The OIDC identity token, replayed as `id_token_hint` at sign-out.
    pub id_token: Option<String>,
}

impl ExtraTokenFields for IdTokenFields {}

/// Token response carrying the `id_token` alongside the standard fields.
pub(crate) type DefraIdTokenResponse = StandardTokenResponse<IdTokenFields, BasicTokenType>;

/// OAuth2 client wired for the Defra ID token response shape.
pub(crate) type DefraIdOAuthClient<HasAuthUrl = EndpointNotSet, HasTokenUrl = EndpointNotSet> =
    oauth2::Client<
        BasicErrorResponse,
        DefraIdTokenResponse,
        BasicTokenIntrospectionResponse,
        StandardRevocableToken,
        BasicRevocationErrorResponse,
        HasAuthUrl,
        EndpointNotSet,
        EndpointNotSet,
        EndpointNotSet,
        HasTokenUrl,
    >;

/// Collapses a token response into the [`TokenSet`] the session layer keeps.
pub(crate) fn token_set_from_response(response: &DefraIdTokenResponse) -> TokenSet {
    TokenSet {
        access_token: response.access_token().secret().clone(),
        id_token: response.extra_fields().id_token.clone(),
        refresh_token: response.refresh_token().map(|t| t.secret().clone()),
        expires_in_secs: response
            .expires_in()
            .map_or(DEFAULT_TOKEN_LIFETIME_SECS, |d| d.as_secs() as i64),
    }
}

/// The Defra ID sign-in strategy, built once at startup from the discovered
/// endpoints.
#[derive(Clone)]
pub struct DefraIdStrategy {
    client: DefraIdOAuthClient<EndpointSet, EndpointSet>,
    http_client: reqwest::Client,
    service_id: String,
    resolver: ProfileResolver,
}

impl DefraIdStrategy {
    /// Creates the strategy from provider configuration and the discovered
    /// endpoints.
    ///
    /// # Errors
    ///
    /// Returns an error if an endpoint or the callback URL is not a valid
    /// URL, or the HTTP client cannot be built.
    pub fn new(
        config: &DefraIdConfig,
        oidc: &OidcConfiguration,
        app_base_url: &str,
        request_timeout: Duration,
    ) -> Result<Self, StrategyError> {
        let auth_url = AuthUrl::new(oidc.authorization_endpoint.clone())
            .map_err(|e| StrategyError::Configuration(format!("invalid authorization endpoint: {e}")))?;
        let token_url = TokenUrl::new(oidc.token_endpoint.clone())
            .map_err(|e| StrategyError::Configuration(format!("invalid token endpoint: {e}")))?;
        let redirect_url = RedirectUrl::new(format!("{app_base_url}/auth/callback"))
            .map_err(|e| StrategyError::Configuration(format!("invalid callback URL: {e}")))?;

        let client = DefraIdOAuthClient::new(ClientId::new(config.client_id().to_string()))
            .set_client_secret(ClientSecret::new(config.client_secret().to_string()))
            .set_auth_type(AuthType::RequestBody)
            .set_auth_uri(auth_url)
            .set_token_uri(token_url)
            .set_redirect_uri(redirect_url);

        // Token requests must not follow redirects
        let http_client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(request_timeout)
            .build()
            .map_err(|e| StrategyError::Configuration(format!("HTTP client error: {e}")))?;

        Ok(Self {
            client,
            http_client,
            service_id: config.service_id().to_string(),
            resolver: ProfileResolver::new(oidc, config.preferred_name_claim().map(str::to_string)),
        })
    }

    /// Builds the provider authorization URL for a sign-in.
    ///
    /// Returns the URL to redirect the user to and the CSRF `state` value to
    /// stash in the sign-in flow cookie.
    #[must_use]
    pub fn authorization_redirect(&self) -> (String, String) {
        let mut auth_request = self
            .client
            .authorize_url(CsrfToken::new_random)
            .add_extra_param("serviceId", &self.service_id);

        for scope in AUTH_SCOPES {
            auth_request = auth_request.add_scope(Scope::new((*scope).to_string()));
        }

        let (auth_url, csrf_token) = auth_request.url();

        (auth_url.to_string(), csrf_token.secret().clone())
    }

    /// Exchanges the authorization code for tokens.
    ///
    /// # Errors
    ///
    /// Returns an error if the token endpoint rejects the code or cannot be
    /// reached.
    pub async fn exchange_code(&self, code: &str) -> Result<TokenSet, StrategyError> {
        let token_result = self
            .client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .request_async(&self.http_client)
            .await
            .map_err(|e| StrategyError::Exchange(format!("token exchange failed: {e}")))?;

        Ok(token_set_from_response(&token_result))
    }

    /// Returns the resolver that turns token sets into session records.
    #[must_use]
    pub fn profile_resolver(&self) -> &ProfileResolver {
        &self.resolver
    }
}

/// Turns a token set into the session record persisted for the user.
///
/// Holds the token and end-session endpoints captured at startup so every
/// session embeds them without consulting shared state.
#[derive(Debug, Clone)]
pub struct ProfileResolver {
    token_url: String,
    logout_url: String,
    preferred_name_claim: Option<String>,
}

impl ProfileResolver {
    /// Creates a resolver from the discovered endpoints.
    #[must_use]
    pub fn new(oidc: &OidcConfiguration, preferred_name_claim: Option<String>) -> Self {
        Self {
            token_url: oidc.token_endpoint.clone(),
            logout_url: oidc.end_session_endpoint.clone(),
            preferred_name_claim,
        }
    }

    /// Decodes the access token and builds the session record.
    ///
    /// # Errors
    ///
    /// Returns an error if the access token payload cannot be decoded or the
    /// claims cannot be resolved into a profile.
    pub fn resolve(&self, tokens: &TokenSet) -> Result<UserSession, StrategyError> {
        let claims = IdentityClaims::from_token(&tokens.access_token)?;
        let session = UserSession::create(
            &claims,
            tokens,
            self.preferred_name_claim.as_deref(),
            self.token_url.clone(),
            self.logout_url.clone(),
        )?;
        Ok(session)
    }
}

/// Authentication strategy errors.
#[derive(Debug)]
pub enum StrategyError {
    /// Endpoint or callback configuration was invalid.
    Configuration(String),
    /// The token exchange failed.
    Exchange(String),
    /// The access token payload could not be decoded.
    TokenDecode(TokenDecodeError),
    /// The decoded claims could not be resolved into a session.
    Profile(ProfileError),
}

impl std::fmt::Display for StrategyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Configuration(msg) => write!(f, "Configuration error: {msg}"),
            Self::Exchange(msg) => write!(f, "Token exchange error: {msg}"),
            Self::TokenDecode(e) => write!(f, "Token decode error: {e}"),
            Self::Profile(e) => write!(f, "Profile error: {e}"),
        }
    }
}

impl std::error::Error for StrategyError {}

impl From<TokenDecodeError> for StrategyError {
    fn from(e: TokenDecodeError) -> Self {
        Self::TokenDecode(e)
    }
}

impl From<ProfileError> for StrategyError {
    fn from(e: ProfileError) -> Self {
        Self::Profile(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine as _;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use serde_json::json;
    use url::Url;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn oidc_configuration(base: &str) -> OidcConfiguration {
        OidcConfiguration {
            authorization_endpoint: format!("{base}/authorize"),
            token_endpoint: format!("{base}/token"),
            end_session_endpoint: format!("{base}/logout"),
        }
    }

    fn defra_id_config() -> DefraIdConfig {
        DefraIdConfig::new(
            "https://idm.example/.well-known/openid-configuration".to_string(),
            "service-1".to_string(),
            "client-1".to_string(),
            "secret-1".to_string(),
        )
    }

    fn strategy(base: &str) -> DefraIdStrategy {
        DefraIdStrategy::new(
            &defra_id_config(),
            &oidc_configuration(base),
            "http://app.example",
            Duration::from_secs(5),
        )
        .expect("build strategy")
    }

    fn token_with_payload(payload: serde_json::Value) -> String {
        let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"RS256","typ":"JWT"}"#);
        let body = URL_SAFE_NO_PAD.encode(payload.to_string());
        format!("{header}.{body}.signature")
    }

    #[test]
    fn authorization_redirect_carries_service_scope_and_state() {
        let strategy = strategy("https://idm.example");

        let (auth_url, state) = strategy.authorization_redirect();
        let url = Url::parse(&auth_url).expect("parse authorization URL");

        assert!(auth_url.starts_with("https://idm.example/authorize"));
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let value = |key: &str| {
            pairs
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone())
        };

        assert_eq!(value("client_id").as_deref(), Some("client-1"));
        assert_eq!(value("response_type").as_deref(), Some("code"));
        assert_eq!(value("serviceId").as_deref(), Some("service-1"));
        assert_eq!(value("scope").as_deref(), Some("openid offline_access"));
        assert_eq!(
            value("redirect_uri").as_deref(),
            Some("http://app.example/auth/callback")
        );
        assert_eq!(value("state").as_deref(), Some(state.as_str()));
        assert!(!state.is_empty());
    }

    #[test]
    fn each_redirect_gets_a_fresh_state() {
        let strategy = strategy("https://idm.example");

        let (_, first) = strategy.authorization_redirect();
        let (_, second) = strategy.authorization_redirect();

        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn exchange_code_captures_the_id_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=authorization_code"))
            .and(body_string_contains("client_id=client-1"))
            .and(body_string_contains("client_secret=secret-1"))
            .and(body_string_contains("code=code-123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "access-1",
                "token_type": "bearer",
                "expires_in": 900,
                "refresh_token": "refresh-1",
                "id_token": "id-token-1",
            })))
            .mount(&server)
            .await;

        let strategy = strategy(&server.uri());
        let tokens = strategy
            .exchange_code("code-123")
            .await
            .expect("exchange code");

        assert_eq!(tokens.access_token, "access-1");
        assert_eq!(tokens.id_token.as_deref(), Some("id-token-1"));
        assert_eq!(tokens.refresh_token.as_deref(), Some("refresh-1"));
        assert_eq!(tokens.expires_in_secs, 900);
    }

    #[tokio::test]
    async fn exchange_code_surfaces_provider_rejection() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": "invalid_grant",
            })))
            .mount(&server)
            .await;

        let strategy = strategy(&server.uri());
        let error = strategy
            .exchange_code("stale-code")
            .await
            .expect_err("exchange should fail");

        assert!(matches!(error, StrategyError::Exchange(_)));
    }

    #[test]
    fn resolver_builds_a_session_from_the_access_token() {
        let oidc = oidc_configuration("https://idm.example");
        let resolver = ProfileResolver::new(&oidc, None);

        let access_token = token_with_payload(json!({
            "sub": "user-1",
            "sessionId": "sess-1",
            "firstName": "Jo",
            "lastName": "Bloggs",
            "relationships": ["rel-1:org-1:Acme Ltd"],
            "currentRelationshipId": "rel-1",
        }));
        let tokens = TokenSet {
            access_token,
            id_token: Some("id-token-1".to_string()),
            refresh_token: Some("refresh-1".to_string()),
            expires_in_secs: 900,
        };

        let session = resolver.resolve(&tokens).expect("resolve profile");

        assert_eq!(session.id, "user-1");
        assert_eq!(session.session_id.as_str(), "sess-1");
        assert_eq!(session.display_name, "Jo Bloggs");
        assert_eq!(session.token_url, "https://idm.example/token");
        assert_eq!(session.logout_url, "https://idm.example/logout");
        assert!(session.is_authenticated);
    }

    #[test]
    fn resolver_rejects_an_opaque_access_token() {
        let oidc = oidc_configuration("https://idm.example");
        let resolver = ProfileResolver::new(&oidc, None);

        let tokens = TokenSet {
            access_token: "not-a-jwt".to_string(),
            id_token: Some("id-token-1".to_string()),
            refresh_token: None,
            expires_in_secs: 900,
        };

        let error = resolver.resolve(&tokens).expect_err("resolve should fail");

        assert!(matches!(error, StrategyError::TokenDecode(_)));
    }
}
