//! Defra ID OIDC discovery.
//!
//! The provider's discovery document is fetched once at startup. The three
//! endpoints it names are handed to the authentication strategy and embedded
//! into every session record, so nothing re-runs discovery after boot. A
//! failed fetch is fatal: without the endpoints no sign-in can work.

use serde::Deserialize;
use url::Url;

/// The subset of the OIDC discovery document the sign-in flow uses.
#[derive(Debug, Clone, Deserialize)]
pub struct OidcConfiguration {
    /// Where users are sent to authenticate.
    pub authorization_endpoint: String,
    /// Where authorization codes and refresh tokens are exchanged.
    pub token_endpoint: String,
    /// Where sessions are terminated at the provider.
    pub end_session_endpoint: String,
}

impl OidcConfiguration {
    /// Checks that every endpoint is a well-formed absolute URL.
    ///
    /// # Errors
    ///
    /// Returns an error naming the offending endpoint.
    pub fn validate(&self) -> Result<(), DiscoveryError> {
        for (name, endpoint) in [
            ("authorization_endpoint", &self.authorization_endpoint),
            ("token_endpoint", &self.token_endpoint),
            ("end_session_endpoint", &self.end_session_endpoint),
        ] {
            Url::parse(endpoint).map_err(|e| {
                DiscoveryError::InvalidDocument(format!("{name} is not a valid URL: {e}"))
            })?;
        }
        Ok(())
    }
}

/// Discovery errors.
#[derive(Debug)]
pub enum DiscoveryError {
    /// The discovery request could not be sent.
    Request(String),
    /// The discovery endpoint answered with a non-success status.
    Http { status: u16 },
    /// The discovery document was missing or malformed.
    InvalidDocument(String),
}

impl std::fmt::Display for DiscoveryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Request(msg) => write!(f, "OIDC discovery request failed: {msg}"),
            Self::Http { status } => {
                write!(f, "OIDC discovery endpoint returned status {status}")
            }
            Self::InvalidDocument(msg) => write!(f, "OIDC discovery document invalid: {msg}"),
        }
    }
}

impl std::error::Error for DiscoveryError {}

/// Fetches and validates the provider's discovery document.
///
/// # Errors
///
/// Returns an error if the request fails, the endpoint answers with a
/// non-success status, or the document is missing a required endpoint.
pub async fn fetch_oidc_configuration(
    http_client: &reqwest::Client,
    oidc_configuration_url: &str,
) -> Result<OidcConfiguration, DiscoveryError> {
    let response = http_client
        .get(oidc_configuration_url)
        .send()
        .await
        .map_err(|e| DiscoveryError::Request(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(DiscoveryError::Http {
            status: status.as_u16(),
        });
    }

    let configuration: OidcConfiguration = response
        .json()
        .await
        .map_err(|e| DiscoveryError::InvalidDocument(e.to_string()))?;
    configuration.validate()?;

    Ok(configuration)
}
