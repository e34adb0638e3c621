//! OpsPulse - operations reliability service

mod alerts;
mod buffer;
mod config;
mod digest;
mod error;
mod forecast;
mod incidents;
mod models;
mod routes;
mod rules;
mod scan;
mod slo;
mod state;
mod store;
mod tasks;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::routes::{health, ingest, metrics};
use crate::rules::RuleEngine;
use crate::state::AppState;
use crate::store::{OpsStore, PgStore};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "opspulse=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Configuration
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            std::process::exit(1);
        }
    };

    // Connect to the store
    let store: Arc<dyn OpsStore> = match PgStore::new(&config.database_url).await {
        Ok(store) => Arc::new(store),
        Err(e) => {
            error!(error = %e, "Failed to connect to store");
            std::process::exit(1);
        }
    };

    // Create application state
    let state = AppState::new(
        store,
        config.buffer_capacity,
        config::default_slos(),
        config.capacity,
        RuleEngine::default(),
    );

    // Spawn background tasks
    // 1. Flush task - drains the event buffer into the store every 5s
    let flush_buffer = state.event_buffer.clone();
    let flush_store = state.store.clone();
    tokio::spawn(async move {
        tasks::flush::flush_task(flush_buffer, flush_store).await;
    });

    // 2. Scan task - runs the predictive pipeline periodically
    let scan_state = state.clone();
    let scan_interval = config.scan_interval_secs;
    tokio::spawn(async move {
        tasks::scan::scan_task(scan_state, scan_interval).await;
    });

    // Build router
    let app = Router::new()
        // Health and metrics (Kubernetes probes + Prometheus)
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route("/metrics", get(metrics::prometheus_metrics))
        // Ingestion
        .route("/api/v1/events/ingest", post(ingest::ingest_events))
        .route("/api/v1/snapshots", post(ingest::record_snapshot))
        // SLO burns
        .route("/api/v1/slo/burns", get(routes::slo::get_burns))
        // Predictive forecasting
        .route("/api/v1/forecast", get(routes::forecast::latest_forecast))
        .route("/api/v1/forecast/scan", post(routes::forecast::run_scan_now))
        // Incidents
        .route("/api/v1/incidents", get(routes::incidents::list_incidents))
        .route(
            "/api/v1/incidents/:id/status",
            post(routes::incidents::set_status),
        )
        .route(
            "/api/v1/incidents/:id/events",
            post(routes::incidents::append_event),
        )
        // Ops digest
        .route("/api/v1/digest", get(routes::digest::get_digest))
        // State and middleware
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    info!(
        "OpsPulse v{} starting on {}",
        env!("CARGO_PKG_VERSION"),
        config.listen_addr
    );
    info!(
        "Database: {}",
        config.database_url.split('@').last().unwrap_or("***")
    );
    info!("Buffer capacity: {}", config.buffer_capacity);
    info!("Scan interval: {}s", config.scan_interval_secs);

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .unwrap();
    axum::serve(listener, app).await.unwrap();
}
