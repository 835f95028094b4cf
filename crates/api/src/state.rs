//! Application state for the API server.

use secondbrain_common::InboxItem;
use secondbrain_orchestrator::Orchestrator;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Bounded buffer between the webhook edge and the ingestion proxy. On
/// overflow, items are dropped with a warning: backpressure policy for the
/// untrusted edge.
pub const INGEST_BUFFER: usize = 100;

/// Shared application state for the API server.
pub struct AppState {
    /// The orchestrator handling streams, ingestion, and metrics.
    pub orchestrator: Orchestrator,

    /// Models advertised on `/v1/models`.
    pub models: Vec<String>,

    /// Server start time (for health checks).
    pub start_time: std::time::Instant,

    /// Producer side of the ingestion channel.
    pub ingest_tx: mpsc::Sender<InboxItem>,

    /// Webhook HMAC secret; `None` disables signature verification.
    pub webhook_secret: Option<String>,
}

impl AppState {
    /// Create the application state and spawn the ingestion drain task.
    pub fn new(
        orchestrator: Orchestrator,
        models: Vec<String>,
        webhook_secret: Option<String>,
    ) -> Arc<Self> {
        let (ingest_tx, mut ingest_rx) = mpsc::channel::<InboxItem>(INGEST_BUFFER);

        let drain = orchestrator.clone();
        tokio::spawn(async move {
            while let Some(item) = ingest_rx.recv().await {
                match drain.ingest_item(item).await {
                    Ok(response) if !response.accepted => {
                        warn!(item_id = %response.item_id, message = %response.message, "item rejected");
                    }
                    Err(e) => warn!(error = %e, "ingestion failed"),
                    Ok(response) => {
                        info!(item_id = %response.item_id, "item ingested");
                    }
                }
            }
        });

        Arc::new(Self {
            orchestrator,
            models,
            start_time: std::time::Instant::now(),
            ingest_tx,
            webhook_secret,
        })
    }

    /// Get the uptime in seconds.
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
