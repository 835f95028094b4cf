//! Request and result types for the memory engine.

use crate::chunker::ChunkingStrategy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A vector with payload, keyed by chunk id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: String,
    pub vector: Vec<f32>,
    pub payload: HashMap<String, String>,
}

/// A vector search hit.
#[derive(Debug, Clone)]
pub struct VectorHit {
    pub id: String,
    pub score: f32,
    pub payload: HashMap<String, String>,
}

/// A search request against any of the retrieval modes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: String,

    /// Maximum results; values <= 0 fall back to 5.
    #[serde(default)]
    pub top_k: i32,

    /// Hits scoring below this are dropped, when > 0.
    #[serde(default)]
    pub min_score: f32,

    /// Equality filters over metadata.
    #[serde(default)]
    pub filters: HashMap<String, String>,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>, top_k: i32) -> Self {
        Self {
            query: query.into(),
            top_k,
            ..Default::default()
        }
    }

    /// Effective result cap: defaults to 5 when unset or non-positive.
    pub fn effective_top_k(&self) -> usize {
        if self.top_k <= 0 {
            5
        } else {
            self.top_k as usize
        }
    }
}

/// One ranked search result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    /// Chunk-level id for semantic hits; empty for document-level hits.
    #[serde(default)]
    pub chunk_id: String,
    pub document_id: String,
    pub content: String,
    pub score: f32,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// A request to index a document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexRequest {
    /// Generated when empty.
    #[serde(default)]
    pub document_id: String,
    pub content: String,
    #[serde(default)]
    pub strategy: ChunkingStrategy,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// Outcome of an indexing attempt. Rejections (empty content, embedding
/// failures) are reported here rather than as transport errors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexOutcome {
    pub document_id: String,
    pub chunks_created: usize,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl IndexOutcome {
    pub fn failure(document_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            document_id: document_id.into(),
            chunks_created: 0,
            success: false,
            error_message: Some(message.into()),
        }
    }
}

/// Outcome of a document deletion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteOutcome {
    pub success: bool,
    pub chunks_deleted: usize,
}

/// Index health counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryStats {
    pub total_documents: usize,
    pub total_chunks: usize,
    pub total_graph_triples: usize,
    /// Unix millis of the most recent successful index operation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_indexed_at: Option<u64>,
}
