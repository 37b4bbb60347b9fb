//! Liveness and storage reachability

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::Serialize;

use crate::http::server::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub storage: &'static str,
}

/// GET /health - 200 when storage answers, 503 otherwise
async fn health(State(state): State<Arc<AppState>>) -> (StatusCode, Json<HealthResponse>) {
    let (code, status, storage) = match state.store.ping().await {
        Ok(()) => (StatusCode::OK, "ok", "ok"),
        Err(e) => {
            tracing::warn!(error = %e, "health check: storage unreachable");
            (StatusCode::SERVICE_UNAVAILABLE, "degraded", "unavailable")
        }
    };

    let body = HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        storage,
    };
    (code, Json(body))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/health", get(health))
}
