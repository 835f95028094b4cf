//! Second Brain API server binary.
//!
//! Usage:
//!   secondbrain-api --config config.toml
//!   secondbrain-api --port 8080
//!   secondbrain-api --port 8080 --bind 0.0.0.0
//!
//! # Environment Variables
//!
//! - `SECONDBRAIN_BIND_ADDR` - server bind address (default: 127.0.0.1)
//! - `SECONDBRAIN_WEBHOOK_SECRET` - webhook HMAC secret
//! - `OPENAI_API_KEY` - API key for the reasoning/embedder upstreams

use secondbrain_api::{serve, AppState, ServerConfig};
use secondbrain_memory::{Embedder, HttpEmbedder, InMemoryVectorStore, MemoryEngine, MockEmbedder};
use secondbrain_orchestrator::Orchestrator;
use secondbrain_reasoning::RemoteReasoningEngine;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,secondbrain_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args: Vec<String> = std::env::args().collect();
    let mut port_override: Option<u16> = None;
    let mut bind_override: Option<String> = None;
    let mut config_path: Option<String> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--port" | "-p" => {
                if i + 1 < args.len() {
                    port_override = Some(args[i + 1].parse().expect("Invalid port number"));
                    i += 1;
                }
            }
            "--bind" | "-b" => {
                if i + 1 < args.len() {
                    bind_override = Some(args[i + 1].clone());
                    i += 1;
                }
            }
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = Some(args[i + 1].clone());
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Second Brain API Server");
                println!();
                println!("Usage: secondbrain-api [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -p, --port <PORT>    Port to listen on (default: 8080)");
                println!(
                    "  -b, --bind <ADDR>    Bind address (default: 127.0.0.1, env: SECONDBRAIN_BIND_ADDR)"
                );
                println!("  -c, --config <FILE>  Path to config.toml file");
                println!("  -h, --help           Show this help message");
                println!();
                println!("Environment variables:");
                println!("  SECONDBRAIN_BIND_ADDR       Server bind address (overridden by --bind)");
                println!("  SECONDBRAIN_WEBHOOK_SECRET  Webhook HMAC secret");
                println!("  OPENAI_API_KEY              API key for upstream services");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    let mut config = if let Some(path) = config_path {
        tracing::info!(path = %path, "Loading configuration");
        ServerConfig::from_file(&path)?
    } else {
        tracing::info!("Using default configuration");
        ServerConfig::default()
    };

    // CLI flags > env vars > config file > defaults.
    if let Some(bind) = bind_override.or_else(|| std::env::var("SECONDBRAIN_BIND_ADDR").ok()) {
        config.bind = bind;
    }
    if let Some(port) = port_override {
        config.port = port;
    }
    if config.webhook_secret.is_none() {
        config.webhook_secret = std::env::var("SECONDBRAIN_WEBHOOK_SECRET").ok();
    }

    if config.bind == "0.0.0.0" {
        tracing::warn!(
            "Server binding to 0.0.0.0 — this exposes the API to all network interfaces. \
             Ensure a firewall is in place."
        );
    }
    if config.webhook_secret.is_none() {
        tracing::warn!(
            "SECONDBRAIN_WEBHOOK_SECRET not set — webhook signatures will not be verified. \
             This is acceptable for local development but NOT for production."
        );
    }

    let embedder: Arc<dyn Embedder> = match config.embedder {
        Some(ref upstream) => {
            tracing::info!(base_url = %upstream.base_url, model = %upstream.model, "Using remote embedder");
            Arc::new(HttpEmbedder::new(
                upstream.base_url.clone(),
                upstream.model.clone(),
                upstream.resolve_api_key(),
                config.memory.embedding_dimension,
            ))
        }
        None => {
            tracing::info!("Using deterministic mock embedder");
            Arc::new(MockEmbedder::new(config.memory.embedding_dimension))
        }
    };

    let memory = Arc::new(MemoryEngine::new(
        config.memory.clone(),
        Arc::new(InMemoryVectorStore::new()),
        embedder,
    ));

    let mut orchestrator = Orchestrator::new(memory, config.orchestrator.clone());
    if let Some(ref upstream) = config.reasoning {
        tracing::info!(base_url = %upstream.base_url, model = %upstream.model, "Connecting reasoning engine");
        orchestrator = orchestrator.with_downstream(Arc::new(RemoteReasoningEngine::new(
            Some(upstream.base_url.clone()),
            upstream.model.clone(),
            upstream.resolve_api_key(),
        )));
    } else {
        tracing::info!("No reasoning engine configured; queries get placeholder responses");
    }

    // Hourly sweep of sessions idle for more than a day.
    let sessions = orchestrator.sessions();
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(std::time::Duration::from_secs(3600));
        loop {
            tick.tick().await;
            let removed = sessions
                .cleanup_expired(std::time::Duration::from_secs(24 * 3600))
                .await;
            if removed > 0 {
                tracing::info!(removed, "expired idle sessions");
            }
        }
    });

    let state = AppState::new(orchestrator, config.models.clone(), config.webhook_secret.clone());

    let addr: SocketAddr = format!("{}:{}", config.bind, config.port).parse()?;
    serve(state, addr).await?;

    Ok(())
}
