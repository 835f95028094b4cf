//! Common types shared across Second Brain crates.
//!
//! This crate provides the error type, the reasoning-stream message
//! envelopes, and the ingestion item types that every service layer
//! builds on.

pub mod agent;
pub mod error;
pub mod ingest;

pub use agent::{
    AgentInput, AgentOutput, Classification, ClassifyRequest, ClassifyResponse, ContextSnapshot,
    FeedbackSignal, GraphTriple, InputPayload, OutputPayload, SemanticChunk, Sentiment,
    StatusUpdate, ToolCall, ToolResult, WeeklyReviewRequest, WeeklyReviewResponse,
};
pub use error::{BrainError, Result};
pub use ingest::{InboxItem, IngestResponse};

/// Current Unix time in milliseconds.
pub fn now_millis() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
