// Main entry point - Dependency injection and server setup
#![recursion_limit = "256"]

mod domain;
mod application;
mod infrastructure;
mod presentation;

use std::{net::SocketAddr, sync::Arc};
use anyhow::Context;
use axum::{routing::get, Router};
use tower_http::compression::CompressionLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use crate::application::sync_loop::SyncLoop;
use crate::application::telemetry_api::TelemetryApi;
use crate::infrastructure::config::load_dashboard_config;
use crate::infrastructure::rectifier_client::RectifierClient;
use crate::presentation::app_state::AppState;
use crate::presentation::handlers::{
    chart_series, dashboard, dashboard_events, health_check, latest_record, records, stats,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = load_dashboard_config()?;

    // Create backend client (infrastructure layer)
    let client = RectifierClient::new(config.api.base_url.clone());
    tracing::info!("Polling rectifier backend at {}", client.base_url());
    let api: Arc<dyn TelemetryApi> = Arc::new(client);

    // Start the sync loop (application layer)
    let sync = SyncLoop::new(api.clone(), config.sync.interval()).spawn();

    // Create application state
    let state = Arc::new(AppState {
        view: sync.subscribe(),
        stopped: sync.stopped(),
        api,
    });

    // Build router (presentation layer)
    let router = Router::new()
        .route("/healthz", get(health_check))
        .route("/dashboard", get(dashboard))
        .route("/dashboard/events", get(dashboard_events))
        .route("/rectifier/latest", get(latest_record))
        .route("/rectifier/stats", get(stats))
        .route("/rectifier/chart", get(chart_series))
        .route("/rectifier/records", get(records))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start server
    let addr: SocketAddr = config
        .server
        .bind
        .parse()
        .with_context(|| format!("Invalid server.bind address {}", config.server.bind))?;
    tracing::info!("Starting rectifier-dashboard on {}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, router)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down");
            // Ends open event streams even if a poll is still hanging.
            drop(sync);
        })
        .await?;

    Ok(())
}
