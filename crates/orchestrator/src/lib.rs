//! The orchestrator for Second Brain.
//!
//! Hosts the bidirectional reasoning streams: enriches user queries with
//! hybrid-search context from the memory engine, tracks per-session
//! episodic memory, records interaction metrics, and proxies to the
//! downstream reasoning engine when one is connected.

pub mod metrics;
pub mod orchestrator;
pub mod session;

pub use metrics::{FeedbackType, InteractionRecord, MetricsStore, MetricsSummary};
pub use orchestrator::{Orchestrator, OrchestratorConfig};
pub use session::{Session, SessionManager};
