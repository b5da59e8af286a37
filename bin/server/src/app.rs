//! Router assembly.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::auth::{self, AppState};
use crate::pages;
use crate::pages::views;

/// Builds the application router over the shared state.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        // Auth routes
        .route("/login", get(auth::login))
        .route("/auth/callback", get(auth::callback))
        .route("/logout", get(auth::logout))
        // Pages
        .route("/", get(pages::home))
        .route("/organisations/{organisation_id}", get(pages::organisation))
        .route(
            "/organisations/{organisation_id}/link",
            get(pages::organisation_link),
        )
        .route(
            "/organisations/{organisation_id}/registrations/{registration_id}",
            get(pages::registration),
        )
        .route("/unauthorized", get(unauthorized))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Used by the platform to check the service is running; do not remove.
async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "message": "success" }))
}

async fn unauthorized() -> impl IntoResponse {
    (StatusCode::UNAUTHORIZED, views::unauthorized_page())
}
