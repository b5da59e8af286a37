use epr_frontend_server::app::build_router;
use epr_frontend_server::auth::{
    AppState, DefraIdStrategy, MemorySessionStore, PostgresSessionStore, SessionStore,
    fetch_oidc_configuration,
};
use epr_frontend_server::config::{ServerConfig, StoreEngine};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration from environment
    let config = ServerConfig::from_env().expect("failed to load configuration");
    tracing::info!("Loaded configuration");

    // Shared HTTP client for discovery and backend calls
    let http_client = reqwest::Client::builder()
        .timeout(config.http.request_timeout())
        .build()
        .expect("failed to build HTTP client");

    // Discover the Defra ID endpoints; without them no sign-in can work
    tracing::info!("Fetching Defra ID OIDC configuration...");
    let oidc = fetch_oidc_configuration(&http_client, config.defra_id.oidc_configuration_url())
        .await
        .expect("failed to fetch the Defra ID OIDC configuration");

    let session_store = build_session_store(&config).await;

    // Purge expired sessions on startup
    match session_store.purge_expired().await {
        Ok(count) if count > 0 => {
            tracing::info!(purged_sessions = count, "Purged expired sessions on startup");
        }
        Ok(_) => {}
        Err(e) => {
            tracing::warn!(error = %e, "Failed to purge expired sessions on startup");
        }
    }

    // Spawn periodic session purge task
    let purge_store = session_store.clone();
    let purge_interval_secs = config.session.cleanup_interval_seconds;
    tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(std::time::Duration::from_secs(purge_interval_secs));
        loop {
            interval.tick().await;
            match purge_store.purge_expired().await {
                Ok(count) if count > 0 => {
                    tracing::debug!(purged_sessions = count, "Periodic session purge");
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to purge expired sessions");
                }
            }
        }
    });

    // Build the sign-in strategy from the discovered endpoints
    let strategy = DefraIdStrategy::new(
        &config.defra_id,
        &oidc,
        &config.app_base_url,
        config.http.request_timeout(),
    )
    .expect("failed to configure the Defra ID strategy");

    let bind_address = config.bind_address.clone();

    // Create application state
    let app_state = Arc::new(AppState::new(config, session_store, strategy, http_client));

    let app = build_router(app_state);

    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .expect("failed to bind to address");

    tracing::info!("listening on http://{}", bind_address);

    axum::serve(listener, app.into_make_service())
        .await
        .expect("server error");
}

/// Builds the configured session store engine.
///
/// The postgres engine connects its pool and runs migrations; the memory
/// engine needs neither.
async fn build_session_store(config: &ServerConfig) -> Arc<dyn SessionStore> {
    let ttl = chrono::Duration::minutes(config.session.ttl_minutes);

    match config.session.store.engine {
        StoreEngine::Memory => {
            tracing::info!("Using the in-memory session store");
            Arc::new(MemorySessionStore::new(ttl))
        }
        StoreEngine::Postgres => {
            let database_url = config
                .session
                .store
                .database_url
                .as_deref()
                .expect("session.store.database_url is required by the postgres store engine");

            // Create database connection pool
            let pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(database_url)
                .await
                .expect("failed to connect to database");

            // Run migrations
            tracing::info!("Running database migrations...");
            sqlx::migrate!("./migrations")
                .run(&pool)
                .await
                .expect("failed to run migrations");

            tracing::info!("Using the postgres session store");
            Arc::new(PostgresSessionStore::new(pool, ttl))
        }
    }
}
