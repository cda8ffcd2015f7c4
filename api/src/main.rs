use anyhow::Result;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use shared::{Config, SnapshotStore};

mod routes;
mod state;

use state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting Stochastic RSI API server...");

    let config = Config::from_env()?;

    // Store unavailability is not fatal here: the read path degrades to
    // structured error payloads and retries the open on access.
    let store = match SnapshotStore::open(&config.database_path).await {
        Ok(store) => Some(store),
        Err(e) => {
            warn!(error = %e, path = %config.database_path, "store not available yet");
            None
        }
    };

    let state = AppState::new(store, &config);

    let app = Router::new()
        .merge(routes::api_router())
        .fallback_service(
            ServeDir::new(&config.ui_dir).append_index_html_on_directories(true),
        )
        .layer(CorsLayer::permissive())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!("API server listening on http://{}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
