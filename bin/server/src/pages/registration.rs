//! Registration detail page.

use axum::extract::{OriginalUri, Path, State};
use axum::response::{IntoResponse, Response};
use std::sync::Arc;

use crate::auth::AppState;
use crate::auth::fetch::{FetchError, FetchOutcome};
use crate::auth::middleware::Authenticated;
use crate::pages::views;
use crate::pages::views::RegistrationDetails;

/// Renders one of an organisation's registrations.
///
/// The backend has no per-registration endpoint; the organisation is
/// fetched and the registration picked out of it. Asking for a
/// registration the organisation does not hold ends on the unauthorized
/// page, indistinguishable from any other refused backend call.
pub async fn registration(
    State(state): State<Arc<AppState>>,
    Path((organisation_id, registration_id)): Path<(String, String)>,
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

    let registrations = data
        .get("registrations")
        .and_then(serde_json::Value::as_array)
        .cloned()
        .unwrap_or_default();

    let Some(registration) = registrations
        .iter()
        .find(|registration| registration.get("id").and_then(serde_json::Value::as_str) == Some(registration_id.as_str()))
    else {
        tracing::info!(
            organisation = %organisation_id,
            registration = %registration_id,
            "Registration not found on organisation"
        );
        return Err(FetchError::Unauthorized);
    };

    let accreditation_id = registration
        .get("accreditationId")
        .and_then(serde_json::Value::as_str);
    let accreditation_status = accreditation_id.and_then(|accreditation_id| {
        data.get("accreditations")
            .and_then(serde_json::Value::as_array)
            .and_then(|accreditations| {
                accreditations.iter().find(|accreditation| {
                    accreditation.get("id").and_then(serde_json::Value::as_str)
                        == Some(accreditation_id)
                })
            })
            .and_then(|accreditation| accreditation.get("status"))
            .and_then(serde_json::Value::as_str)
            .map(str::to_string)
    });

    // TODO: title the page from activity/site/material info
    let details = RegistrationDetails {
        material: registration
            .get("material")
            .and_then(serde_json::Value::as_str)
            .map(str::to_string),
        status: registration
            .get("status")
            .and_then(serde_json::Value::as_str)
            .map(str::to_string),
        accreditation_status,
    };

    Ok(views::registration_page(&details).into_response())
}
