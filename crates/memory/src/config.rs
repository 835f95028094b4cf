//! Configuration for the memory engine.

use serde::{Deserialize, Serialize};

/// Configuration for the memory engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Collection namespace that ingest and search operate on.
    #[serde(default = "default_collection_name")]
    pub collection_name: String,

    /// Embedding vector width.
    #[serde(default = "default_embedding_dimension")]
    pub embedding_dimension: usize,

    /// Chunker window size, in whitespace tokens.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Backward overlap between consecutive fixed-size chunks.
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,

    /// Hybrid search fusion parameters.
    #[serde(default)]
    pub hybrid: HybridConfig,
}

fn default_collection_name() -> String {
    "second_brain".into()
}

fn default_embedding_dimension() -> usize {
    384
}

fn default_chunk_size() -> usize {
    512
}

fn default_chunk_overlap() -> usize {
    50
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            collection_name: default_collection_name(),
            embedding_dimension: default_embedding_dimension(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            hybrid: HybridConfig::default(),
        }
    }
}

/// Parameters for the Reciprocal Rank Fusion stage of hybrid search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HybridConfig {
    /// RRF rank constant.
    #[serde(default = "default_rrf_k")]
    pub rrf_k: f64,

    /// Per-list weights: full-text first, vector second.
    #[serde(default = "default_weights")]
    pub weights: Vec<f64>,

    /// Bonus for the rank-1 document of each list.
    #[serde(default = "default_top_rank_bonus")]
    pub top_rank_bonus: f64,

    /// Bonus for documents at ranks 2-3 of each list.
    #[serde(default = "default_near_top_bonus")]
    pub near_top_bonus: f64,
}

fn default_rrf_k() -> f64 {
    60.0
}

fn default_weights() -> Vec<f64> {
    vec![2.0, 1.0]
}

fn default_top_rank_bonus() -> f64 {
    0.05
}

fn default_near_top_bonus() -> f64 {
    0.02
}

impl Default for HybridConfig {
    fn default() -> Self {
        Self {
            rrf_k: default_rrf_k(),
            weights: default_weights(),
            top_rank_bonus: default_top_rank_bonus(),
            near_top_bonus: default_near_top_bonus(),
        }
    }
}
