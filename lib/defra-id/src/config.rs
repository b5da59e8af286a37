//! Defra ID provider configuration.

use serde::{Deserialize, Serialize};

/// Configuration for connecting to the Defra ID identity provider.
///
/// Fields with defaults can be omitted when loading from environment
/// variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefraIdConfig {
    /// URL of the provider's OIDC discovery document.
    oidc_configuration_url: String,
    /// Service identifier sent as the `serviceId` authorization parameter,
    /// scoping the sign-in journey to this service.
    service_id: String,
    /// The OAuth2 client ID registered with the provider.
    client_id: String,
    /// The OAuth2 client secret.
    client_secret: String,
    /// Base URL of the provider's registration journeys (add organisation,
    /// switch relationship). Defaults to the local Defra ID stub.
    #[serde(default = "default_registration_base_url")]
    registration_base_url: String,
    /// Claim preferred over first/last name when deriving the display name.
    #[serde(default)]
    preferred_name_claim: Option<String>,
}

fn default_registration_base_url() -> String {
    "http://localhost:3200/cdp-defra-id-stub".to_string()
}

impl DefraIdConfig {
    /// Creates a new configuration with defaults for optional fields.
    #[must_use]
    pub fn new(
        oidc_configuration_url: String,
        service_id: String,
        client_id: String,
        client_secret: String,
    ) -> Self {
        Self {
            oidc_configuration_url,
            service_id,
            client_id,
            client_secret,
            registration_base_url: default_registration_base_url(),
            preferred_name_claim: None,
        }
    }

    /// Sets the registration journey base URL.
    #[must_use]
    pub fn with_registration_base_url(mut self, url: String) -> Self {
        self.registration_base_url = url;
        self
    }

    /// Sets the claim preferred when deriving the display name.
    #[must_use]
    pub fn with_preferred_name_claim(mut self, claim: Option<String>) -> Self {
        self.preferred_name_claim = claim;
        self
    }

    /// Returns the OIDC discovery document URL.
    #[must_use]
    pub fn oidc_configuration_url(&self) -> &str {
        &self.oidc_configuration_url
    }

    /// Returns the `serviceId` authorization parameter.
    #[must_use]
    pub fn service_id(&self) -> &str {
        &self.service_id
    }

    /// Returns the OAuth2 client ID.
    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Returns the OAuth2 client secret.
    #[must_use]
    pub fn client_secret(&self) -> &str {
        &self.client_secret
    }

    /// Returns the registration journey base URL.
    #[must_use]
    pub fn registration_base_url(&self) -> &str {
        &self.registration_base_url
    }

    /// Returns the preferred display-name claim, if configured.
    #[must_use]
    pub fn preferred_name_claim(&self) -> Option<&str> {
        self.preferred_name_claim.as_deref()
    }
}
