//! Health server for hivewatch.
//!
//! Exposes liveness and scheduler progress over HTTP. Disabled unless a
//! `server` section is configured.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;
use tokio::sync::watch;
use tower_http::trace::{DefaultMakeSpan, TraceLayer};

use crate::scheduler::{AgentStatus, StatusHandle};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub status: StatusHandle,
}

/// Health check response.
#[derive(Serialize)]
struct HealthResponse {
    status: String,
    state: String,
}

/// Create the Axum router with all routes.
pub fn create_router(state: AppState) -> Router {
    let app_state = Arc::new(state);

    Router::new()
        .route("/healthz", get(healthz_handler))
        .route("/status", get(status_handler))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::default().include_headers(true)),
        )
        .with_state(app_state)
}

/// Bind `addr` and serve until `shutdown` turns `true`.
///
/// # Errors
/// Returns the bind or accept error.
pub async fn serve(
    addr: SocketAddr,
    state: AppState,
    mut shutdown: watch::Receiver<bool>,
) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Health server listening on: http://{}", listener.local_addr()?);

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(async move {
            let _ = shutdown.wait_for(|stop| *stop).await;
        })
        .await
}

/// Liveness probe.
async fn healthz_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let status = state.status.read().await;
    Json(HealthResponse {
        status: "ok".to_string(),
        state: status.state.to_string(),
    })
}

/// Scheduler progress, including the last sweep summary.
async fn status_handler(State(state): State<Arc<AppState>>) -> Json<AgentStatus> {
    Json(state.status.read().await.clone())
}
