//! Decoding Defra ID token payloads into typed identity claims.
//!
//! Defra ID issues JWTs whose payload carries the user's identity and
//! organisation relationships as custom camelCase claims. This module
//! extracts and types that payload. It deliberately does not verify the
//! token signature: tokens reach this code only out of the provider's
//! token endpoint over TLS, and verification is the exchange layer's
//! concern. Treat any relaxation of that assumption as a hardening point.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::Deserialize;

use crate::error::TokenDecodeError;

/// The decoded payload of a Defra ID token.
///
/// All custom claims are optional-tolerant: the provider omits fields for
/// accounts without them (for example, accounts with no enrolments). Claims
/// this struct does not model are retained in `extra` so a configured
/// preferred-name claim can still be looked up.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityClaims {
    /// Subject identifier: the Defra ID user id.
    pub sub: String,
    #[serde(default)]
    pub correlation_id: Option<String>,
    /// Provider session identifier; this keys the server-side session.
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub contact_id: Option<String>,
    #[serde(default)]
    pub service_id: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub unique_reference: Option<String>,
    /// Level of assurance.
    #[serde(default)]
    pub loa: Option<i64>,
    /// Authenticator assurance level.
    #[serde(default)]
    pub aal: Option<i64>,
    #[serde(default)]
    pub enrolment_count: Option<i64>,
    #[serde(default)]
    pub enrolment_request_count: Option<i64>,
    /// Identifier of the relationship the user currently acts under.
    #[serde(default)]
    pub current_relationship_id: Option<String>,
    /// Raw `relationshipId:organisationId:organisationName` strings.
    #[serde(default)]
    pub relationships: Vec<String>,
    #[serde(default)]
    pub roles: Vec<String>,
    /// Claims not modelled above, keyed by their wire name.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl IdentityClaims {
    /// Decodes the payload segment of a JWT into identity claims.
    ///
    /// # Errors
    ///
    /// Returns a [`TokenDecodeError`] when the token is not three
    /// dot-separated segments, the payload is not base64url, or the decoded
    /// payload is not a claims document with a `sub`.
    pub fn from_token(token: &str) -> Result<Self, TokenDecodeError> {
        let segments: Vec<&str> = token.split('.').collect();
        if segments.len() != 3 {
            return Err(TokenDecodeError::MalformedToken {
                segments: segments.len(),
            });
        }

        let payload =
            URL_SAFE_NO_PAD
                .decode(segments[1])
                .map_err(|e| TokenDecodeError::InvalidEncoding {
                    reason: e.to_string(),
                })?;

        serde_json::from_slice(&payload).map_err(|e| TokenDecodeError::InvalidPayload {
            reason: e.to_string(),
        })
    }

    /// Looks up an unmodelled claim by wire name, as a string.
    ///
    /// Returns `None` when the claim is absent or not a JSON string.
    #[must_use]
    pub fn claim(&self, name: &str) -> Option<&str> {
        self.extra.get(name).and_then(serde_json::Value::as_str)
    }
}
