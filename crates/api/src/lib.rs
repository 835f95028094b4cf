//! HTTP surface for Second Brain.
//!
//! # Endpoints
//!
//! - `POST /v1/chat/completions` - OpenAI-compatible chat (JSON or SSE)
//! - `GET /v1/models` - model listing
//! - `GET /v1/metrics` - interaction and coverage metrics
//! - `POST /mcp` - MCP (JSON-RPC 2.0) tool endpoint
//! - `POST /webhooks/generic` - signed webhook intake
//! - `GET /health` - health check
//!
//! # Architecture
//!
//! ```text
//! Client (OpenAI SDK / MCP host / webhook source)
//!    │
//!    ▼
//! ┌─────────────────┐
//! │   HTTP facade   │ ◄── this crate (axum)
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐      ┌─────────────────┐
//! │  Orchestrator   │ ───► │  Memory engine  │
//! │ (thought stream)│      │ (hybrid search) │
//! └────────┬────────┘      └─────────────────┘
//!          ▼
//!   reasoning engine (external, optional)
//! ```

pub mod config;
pub mod mcp;
pub mod openai;
pub mod routes;
pub mod state;
pub mod webhook;

use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

pub use config::ServerConfig;
pub use state::AppState;

/// Create the API router with all routes configured.
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(routes::health))
        .route("/v1/chat/completions", post(openai::chat_completions))
        .route("/v1/models", get(openai::list_models))
        .route("/v1/metrics", get(routes::metrics))
        .route("/mcp", post(mcp::handle))
        .route("/webhooks/generic", post(webhook::handle_generic))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Start the API server on the given address.
pub async fn serve(state: Arc<AppState>, addr: SocketAddr) -> anyhow::Result<()> {
    let router = create_router(state);

    info!(%addr, "Starting Second Brain API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}
