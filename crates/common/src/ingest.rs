//! Ingestion item types for the webhook and polling edges.

use crate::now_millis;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// A normalized item of incoming content, ready for indexing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboxItem {
    /// Unique item id.
    pub id: String,

    /// Which edge produced the item ("webhook", "poller", ...).
    pub source: String,

    /// Source-specific identifier, when the origin has one.
    #[serde(default)]
    pub source_id: String,

    pub content: String,

    #[serde(default)]
    pub content_type: String,

    #[serde(default)]
    pub metadata: HashMap<String, String>,

    /// Unix millis.
    pub received_at: u64,
}

impl InboxItem {
    pub fn new(source: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            source: source.into(),
            source_id: String::new(),
            content: content.into(),
            content_type: "text/plain".into(),
            metadata: HashMap::new(),
            received_at: now_millis(),
        }
    }

    pub fn with_metadata(mut self, metadata: HashMap<String, String>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_source_id(mut self, source_id: impl Into<String>) -> Self {
        self.source_id = source_id.into();
        self
    }
}

/// Outcome of submitting an item for ingestion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestResponse {
    pub item_id: String,
    pub accepted: bool,
    pub message: String,
}
