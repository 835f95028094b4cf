//! Health and metrics route handlers.

use crate::state::AppState;
use axum::{extract::State, Json};
use secondbrain_orchestrator::MetricsSummary;
use serde::Serialize;
use std::sync::Arc;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_seconds: u64,
}

/// `GET /health`
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: state.uptime_seconds(),
    })
}

/// `GET /v1/metrics`
pub async fn metrics(State(state): State<Arc<AppState>>) -> Json<MetricsSummary> {
    Json(state.orchestrator.metrics().summary().await)
}
