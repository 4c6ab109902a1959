use std::net::SocketAddr;
use std::sync::Arc;

use arc_swap::ArcSwap;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use bridge_types::HealthState;
use prometheus::{Encoder, Registry, TextEncoder};
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Clone)]
struct ServerState {
    health: Arc<ArcSwap<HealthState>>,
    registry: Registry,
    max_heartbeat_age: chrono::Duration,
    lag_budget_blocks: i64,
}

async fn livez(State(state): State<ServerState>) -> impl IntoResponse {
    let snapshot = state.health.load_full();
    if snapshot.is_live(state.max_heartbeat_age) {
        (StatusCode::OK, Json(snapshot.as_ref().clone()))
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(snapshot.as_ref().clone()))
    }
}

async fn readyz(State(state): State<ServerState>) -> impl IntoResponse {
    let snapshot = state.health.load_full();
    if snapshot.is_live(state.max_heartbeat_age) && snapshot.is_ready(state.lag_budget_blocks) {
        (StatusCode::OK, Json(snapshot.as_ref().clone()))
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(snapshot.as_ref().clone()))
    }
}

async fn metrics(State(state): State<ServerState>) -> impl IntoResponse {
    let metric_families = state.registry.gather();
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        return (StatusCode::INTERNAL_SERVER_ERROR, format!("failed to encode metrics: {e}"));
    }
    (StatusCode::OK, String::from_utf8_lossy(&buffer).into_owned())
}

/// Serves `/livez`, `/readyz`, and `/metrics` until `cancel` fires.
pub async fn serve(
    addr: SocketAddr,
    health: Arc<ArcSwap<HealthState>>,
    registry: Registry,
    max_heartbeat_age: chrono::Duration,
    lag_budget_blocks: i64,
    cancel: CancellationToken,
) -> std::io::Result<()> {
    let state = ServerState {
        health,
        registry,
        max_heartbeat_age,
        lag_budget_blocks,
    };
    let app = Router::new()
        .route("/livez", get(livez))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "health server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
}
