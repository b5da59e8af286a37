//! Bearer-authenticated backend calls with organisation-linking interception.
//!
//! Pages call the EPR backend with the session's access token. The backend
//! answers any such call with either ordinary data or a `link-organisations`
//! payload demanding the user link a Defra ID organisation first. The
//! intercepting fetch classifies the response into a [`FetchOutcome`] so
//! every page handles the detour the same way, and turns the payload into a
//! ready-to-render [`LinkOrganisationsPrompt`].

use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use epr_frontend_defra_id::UserSession;
use serde::Deserialize;

/// Backend fetch errors.
#[derive(Debug)]
pub enum FetchError {
    /// The backend rejected the call. Status detail stays in the logs; the
    /// user only ever sees the unauthorized page.
    Unauthorized,
    /// The backend response body was not valid JSON.
    InvalidBody(String),
    /// A linking payload arrived without any candidate organisation.
    InvalidLinkingPayload(String),
    /// The backend could not be reached.
    Request(String),
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unauthorized => write!(f, "Backend request was not authorized"),
            Self::InvalidBody(msg) => write!(f, "Backend response body invalid: {msg}"),
            Self::InvalidLinkingPayload(msg) => write!(f, "Linking payload invalid: {msg}"),
            Self::Request(msg) => write!(f, "Backend request failed: {msg}"),
        }
    }
}

impl std::error::Error for FetchError {}

impl IntoResponse for FetchError {
    fn into_response(self) -> Response {
        match &self {
            Self::Unauthorized => {
                tracing::info!("Backend call not authorized");
            }
            Self::InvalidBody(msg) | Self::InvalidLinkingPayload(msg) => {
                tracing::error!(error = %msg, "Unusable backend response");
            }
            Self::Request(msg) => {
                tracing::error!(error = %msg, "Backend unreachable");
            }
        }
        Redirect::to("/unauthorized").into_response()
    }
}

/// What an intercepted backend call produced.
#[derive(Debug)]
pub enum FetchOutcome {
    /// Ordinary data; the caller interprets it.
    Data(serde_json::Value),
    /// The backend requires an organisation-linking detour first.
    LinkingRequired(Box<LinkOrganisationsPrompt>),
}

/// A backend response body, classified.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum BackendPayload {
    Linking(LinkOrganisationsPayload),
    Data(serde_json::Value),
}

/// Discriminant of the linking payload. Parsing it as a unit enum means
/// only `action: "link-organisations"` matches the linking arm.
#[derive(Debug, Clone, Copy, Deserialize)]
enum LinkOrganisationsAction {
    #[serde(rename = "link-organisations")]
    LinkOrganisations,
}

/// The `link-organisations` payload as the backend sends it.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LinkOrganisationsPayload {
    #[allow(dead_code)]
    action: LinkOrganisationsAction,
    defra_id: LinkingIdentity,
    #[serde(default)]
    is_current_organisation_linked: bool,
    organisations: Vec<OrganisationCandidate>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LinkingIdentity {
    user_id: String,
    #[serde(default)]
    org_name: Option<String>,
    #[serde(default)]
    other_relationships: Vec<OtherRelationship>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OtherRelationship {
    #[serde(default)]
    defra_id_org_name: Option<String>,
    defra_id_relationship_id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrganisationCandidate {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    org_id: Option<String>,
}

/// Everything the link-organisations page needs, resolved from the payload.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkOrganisationsPrompt {
    /// Name of the user's current Defra ID organisation, if the backend
    /// knows it.
    pub defra_id_org_name: Option<String>,
    /// "organisation" or "organisations", for page copy.
    pub entity_name: &'static str,
    pub is_current_organisation_linked: bool,
    /// The user's other Defra ID relationships, each with a switch action.
    pub other_relationships: Vec<SwitchAction>,
    pub presentation: LinkingPresentation,
}

/// A relationship the user could switch to instead of linking.
#[derive(Debug, Clone, PartialEq)]
pub struct SwitchAction {
    pub organisation_name: Option<String>,
    pub switch_href: String,
}

/// How the linking choice is presented.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkingPresentation {
    /// Several candidates and none linked yet: one row per organisation,
    /// each with its own link action.
    UnlinkedTable { rows: Vec<OrganisationRow> },
    /// Otherwise: the first candidate with link and add actions.
    SingleOrganisation { organisation: OrganisationCard },
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrganisationRow {
    pub name: Option<String>,
    pub org_id: Option<String>,
    pub id: String,
    pub link_href: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrganisationCard {
    pub name: Option<String>,
    pub org_id: Option<String>,
    pub id: String,
    pub link_href: String,
    pub add_href: String,
}

fn organisation_link_href(id: &str, redirect_url: &str) -> String {
    format!("/organisations/{id}/link?redirectUrl={redirect_url}")
}

/// Client for the EPR backend API.
#[derive(Clone)]
pub struct BackendClient {
    http_client: reqwest::Client,
    base_url: String,
    registration_base_url: String,
}

impl BackendClient {
    /// Creates a client for the backend at `base_url`.
    ///
    /// `registration_base_url` is where the provider's add-organisation and
    /// switch-relationship journeys live; linking prompts point at it.
    #[must_use]
    pub fn new(
        http_client: reqwest::Client,
        base_url: String,
        registration_base_url: String,
    ) -> Self {
        Self {
            http_client,
            base_url,
            registration_base_url,
        }
    }

    /// Calls the backend with the session's access token as a bearer.
    ///
    /// Returns the response status and parsed body without interpreting
    /// either; callers branch on the status themselves.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend is unreachable or the body is not
    /// JSON.
    pub async fn fetch_with_auth_header(
        &self,
        path: &str,
        session: &UserSession,
    ) -> Result<(StatusCode, serde_json::Value), FetchError> {
        let url = format!("{}{path}", self.base_url);
        let response = self
            .http_client
            .get(&url)
            .bearer_auth(&session.token)
            .send()
            .await
            .map_err(|e| FetchError::Request(e.to_string()))?;

        let status = response.status();
        let data = response
            .json()
            .await
            .map_err(|e| FetchError::InvalidBody(e.to_string()))?;

        Ok((status, data))
    }

    /// Calls the backend and classifies the response.
    ///
    /// `request_path` is the page being served; a linking prompt's link
    /// actions redirect back to it once linking completes.
    ///
    /// # Errors
    ///
    /// Any non-success backend status becomes [`FetchError::Unauthorized`];
    /// nothing of the page renders in that case.
    pub async fn fetch_with_interception(
        &self,
        path: &str,
        request_path: &str,
        session: &UserSession,
    ) -> Result<FetchOutcome, FetchError> {
        let (status, data) = self.fetch_with_auth_header(path, session).await?;

        if !status.is_success() {
            return Err(FetchError::Unauthorized);
        }

        let payload: BackendPayload =
            serde_json::from_value(data).map_err(|e| FetchError::InvalidBody(e.to_string()))?;

        match payload {
            BackendPayload::Linking(linking) => {
                let prompt = self.linking_prompt(linking, request_path)?;
                Ok(FetchOutcome::LinkingRequired(Box::new(prompt)))
            }
            BackendPayload::Data(value) => Ok(FetchOutcome::Data(value)),
        }
    }

    /// Resolves a linking payload into its page presentation.
    fn linking_prompt(
        &self,
        payload: LinkOrganisationsPayload,
        request_path: &str,
    ) -> Result<LinkOrganisationsPrompt, FetchError> {
        let LinkOrganisationsPayload {
            defra_id,
            is_current_organisation_linked,
            organisations,
            ..
        } = payload;

        let has_many_organisations = organisations.len() > 1;
        let entity_name = if has_many_organisations {
            "organisations"
        } else {
            "organisation"
        };

        let other_relationships = defra_id
            .other_relationships
            .into_iter()
            .map(|relationship| SwitchAction {
                organisation_name: relationship.defra_id_org_name,
                switch_href: format!(
                    "{}/register/{}/relationship/{}/current",
                    self.registration_base_url,
                    defra_id.user_id,
                    relationship.defra_id_relationship_id
                ),
            })
            .collect();

        let presentation = if has_many_organisations && !is_current_organisation_linked {
            LinkingPresentation::UnlinkedTable {
                rows: organisations
                    .into_iter()
                    .map(|organisation| OrganisationRow {
                        link_href: organisation_link_href(&organisation.id, request_path),
                        name: organisation.name,
                        org_id: organisation.org_id,
                        id: organisation.id,
                    })
                    .collect(),
            }
        } else {
            let organisation = organisations.into_iter().next().ok_or_else(|| {
                FetchError::InvalidLinkingPayload("no candidate organisations".to_string())
            })?;
            LinkingPresentation::SingleOrganisation {
                organisation: OrganisationCard {
                    link_href: organisation_link_href(&organisation.id, request_path),
                    add_href: format!(
                        "{}/register/{}/relationship",
                        self.registration_base_url, defra_id.user_id
                    ),
                    name: organisation.name,
                    org_id: organisation.org_id,
                    id: organisation.id,
                },
            }
        };

        Ok(LinkOrganisationsPrompt {
            defra_id_org_name: defra_id.org_name,
            entity_name,
            is_current_organisation_linked,
            other_relationships,
            presentation,
        })
    }
}
