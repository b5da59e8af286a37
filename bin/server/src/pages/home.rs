//! Home page.

use axum::extract::{OriginalUri, State};
use axum::response::{IntoResponse, Redirect, Response};
use std::sync::Arc;

use crate::auth::AppState;
use crate::auth::fetch::{FetchError, FetchOutcome};
use crate::auth::middleware::MaybeAuthenticated;
use crate::pages::views;

/// Renders the home page.
///
/// For a signed-in user acting under an organisation relationship, the
/// backend is asked which of its organisations matches the Defra ID
/// organisation; a single match skips the home page entirely and lands the
/// user on that organisation.
pub async fn home(
    State(state): State<Arc<AppState>>,
    OriginalUri(uri): OriginalUri,
    MaybeAuthenticated(auth): MaybeAuthenticated,
) -> Result<Response, FetchError> {
    let Some(auth) = auth else {
        return Ok(views::home_page(None).into_response());
    };

    if let Some(current) = &auth.context.current_relationship {
        let path = format!(
            "/v1/organisations/{}/defra-id-org-id",
            current.organisation_id
        );
        let outcome = state
            .backend
            .fetch_with_interception(&path, uri.path(), &auth.session)
            .await?;

        match outcome {
            FetchOutcome::LinkingRequired(prompt) => {
                return Ok(views::link_organisations_page(&prompt).into_response());
            }
            FetchOutcome::Data(data) => {
                let matches = data.as_array().cloned().unwrap_or_default();
                if matches.len() == 1 {
                    if let Some(id) = matches[0].get("id").and_then(serde_json::Value::as_str) {
                        return Ok(Redirect::to(&format!("/organisations/{id}")).into_response());
                    }
                }
                // TODO: pick an organisation when several match the Defra ID organisation id
            }
        }
    }

    Ok(views::home_page(Some(&auth.context)).into_response())
}
