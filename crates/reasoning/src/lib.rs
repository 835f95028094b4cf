//! Reasoning engine contract for Second Brain.
//!
//! The reasoning backend is an external collaborator; this crate defines
//! the bidirectional streaming interface the orchestrator consumes, plus a
//! client implementation backed by an OpenAI-compatible chat endpoint.

pub mod engine;
pub mod remote;

pub use engine::{drain, unary, ReasoningEngine, ThoughtStream, STREAM_BUFFER};
pub use remote::RemoteReasoningEngine;
