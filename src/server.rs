//! HTTP exposition endpoint.
//!
//! Provides:
//! - /metrics - certificate gauges in the Prometheus text format
//! - /healthz - liveness check

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::task::JoinError;
use tracing::{error, info};

use crate::error::ExporterError;
use crate::scan::{CycleReport, Scanner};

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

/// Shared state of the exposition endpoints.
pub struct ServerState {
    scanner: Arc<Scanner>,
    /// Rescan on every `/metrics` request
    scan_on_scrape: bool,
    /// Held for the duration of a cycle so that cycles never overlap
    cycle: Mutex<()>,
}

impl ServerState {
    pub fn new(scanner: Scanner, scan_on_scrape: bool) -> Self {
        ServerState {
            scanner: Arc::new(scanner),
            scan_on_scrape,
            cycle: Mutex::new(()),
        }
    }

    /// Runs one cycle on the blocking pool, waiting for any running cycle
    /// to finish first.
    pub async fn run_cycle(&self) -> Result<CycleReport, ExporterError> {
        let _guard = self.cycle.lock().await;
        let scanner = Arc::clone(&self.scanner);
        tokio::task::spawn_blocking(move || scanner.run_cycle())
            .await
            .unwrap_or_else(|e| Err(scan_task_failure(e)))
    }
}

fn scan_task_failure(error: JoinError) -> ExporterError {
    ExporterError::ScanTask {
        reason: error.to_string(),
    }
}

async fn healthz() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

async fn metrics(State(state): State<Arc<ServerState>>) -> Response {
    if state.scan_on_scrape {
        if let Err(e) = state.run_cycle().await {
            error!(error = %e, "Certificate scan failed");
            return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response();
        }
    }

    let metrics = state.scanner.metrics();
    match metrics.encode() {
        Ok(body) => ([(header::CONTENT_TYPE, metrics.content_type())], body).into_response(),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

/// Create the exposition router
pub fn create_router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics))
        .with_state(state)
}

/// Runs a cycle every `interval` until the process ends.
async fn scan_periodically(state: Arc<ServerState>, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        if let Err(e) = state.run_cycle().await {
            error!(error = %e, "Scheduled certificate scan failed");
        }
    }
}

/// Serves the endpoints on `address` until Ctrl-C.
///
/// An initial cycle runs before the listener opens; without
/// `scan_on_scrape` further cycles run every `interval`.
pub async fn serve(
    state: Arc<ServerState>,
    address: SocketAddr,
    interval: Duration,
) -> Result<(), Box<dyn std::error::Error>> {
    if state.scan_on_scrape {
        state.run_cycle().await?;
    } else {
        tokio::spawn(scan_periodically(Arc::clone(&state), interval));
    }

    let listener = tokio::net::TcpListener::bind(address).await?;
    info!(address = %address, "Serving certificate metrics");

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await?;
    Ok(())
}
