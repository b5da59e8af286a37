//! Organisation pages: the registration list and the linking action.

use axum::extract::{OriginalUri, Path, Query, State};
use axum::response::{IntoResponse, Redirect, Response};
use serde::Deserialize;
use std::sync::Arc;

use crate::auth::AppState;
use crate::auth::fetch::{FetchError, FetchOutcome};
use crate::auth::middleware::Authenticated;
use crate::pages::views;
use crate::pages::views::RegistrationRow;

/// Renders an organisation's registrations.
pub async fn organisation(
    State(state): State<Arc<AppState>>,
    Path(organisation_id): Path<String>,
    OriginalUri(uri): OriginalUri,
    auth: Authenticated,
) -> Result<Response, FetchError> {
    let path = format!("/v1/organisations/{organisation_id}");
    let outcome = state
        .backend
        .fetch_with_interception(&path, uri.path(), &auth.session)
        .await?;

    let data = match outcome {
        FetchOutcome::LinkingRequired(prompt) => {
            return Ok(views::link_organisations_page(&prompt).into_response());
        }
        FetchOutcome::Data(data) => data,
    };

    let name = data
        .get("companyDetails")
        .and_then(|details| details.get("name"))
        .and_then(serde_json::Value::as_str)
        .unwrap_or("Organisation");

    let registrations: Vec<RegistrationRow> = data
        .get("registrations")
        .and_then(serde_json::Value::as_array)
        .map(|registrations| {
            registrations
                .iter()
                .map(|registration| RegistrationRow {
                    id: string_field(registration, "id"),
                    material: string_field(registration, "material"),
                    status: string_field(registration, "status"),
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(views::organisation_page(name, &organisation_id, &registrations).into_response())
}

/// Query parameters for the linking action.
#[derive(Debug, Deserialize)]
pub struct LinkQuery {
    /// Page to return to once linking completes.
    #[serde(rename = "redirectUrl")]
    redirect_url: Option<String>,
}

/// Asks the backend to link the organisation to the user's Defra ID
/// organisation, then returns the user to where the prompt interrupted
/// them.
pub async fn organisation_link(
    State(state): State<Arc<AppState>>,
    Path(organisation_id): Path<String>,
    Query(query): Query<LinkQuery>,
    auth: Authenticated,
) -> Result<Redirect, FetchError> {
    let path = format!("/v1/organisations/{organisation_id}/link");
    let (status, _) = state
        .backend
        .fetch_with_auth_header(&path, &auth.session)
        .await
        .map_err(|e| {
            tracing::info!(error = %e, "Failed to link organisation");
            FetchError::Unauthorized
        })?;

    if !status.is_success() {
        tracing::info!(status = %status, "Failed to link organisation");
        return Err(FetchError::Unauthorized);
    }

    let destination = query
        .redirect_url
        .unwrap_or_else(|| format!("/organisations/{organisation_id}"));

    Ok(Redirect::to(&destination))
}

fn string_field(value: &serde_json::Value, field: &str) -> String {
    value
        .get(field)
        .and_then(serde_json::Value::as_str)
        .unwrap_or_default()
        .to_string()
}
