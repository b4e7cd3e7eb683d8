use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{Router, routing::get};
use tower_http::cors::CorsLayer;
use tracing::info;

use super::api::{self, AppState, SharedState};
use super::jobs::JobManager;
use super::pipeline::RepoPipeline;
use super::ws;
use crate::config::MaintainerConfig;

/// Build the full application router: JSON API plus the log-follow socket.
pub fn build_router(state: SharedState) -> Router {
    api::api_router()
        .route("/ws/{job_id}", get(ws::ws_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the HTTP service on `host:port` and run until Ctrl+C.
pub async fn start_server(config: MaintainerConfig, host: &str, port: u16) -> Result<()> {
    let secrets = config.secrets();
    let pipeline = RepoPipeline::new(config).context("Invalid maintainer configuration")?;
    let state = Arc::new(AppState {
        manager: JobManager::new(Arc::new(pipeline), secrets),
    });

    let app = build_router(Arc::clone(&state));

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    let local_addr = listener.local_addr()?;
    info!(%local_addr, "maintainer listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    state.manager.shutdown().await;
    info!("server shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}
