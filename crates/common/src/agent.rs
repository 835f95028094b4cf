//! Message envelopes for the bidirectional reasoning stream.
//!
//! Inputs and outputs are tagged unions: exactly one payload variant is
//! active per message, and the serialized form preserves the discriminant.
//! An empty `user_query` string is a present-but-empty query, which is a
//! different thing from a message with no query variant at all.

use crate::now_millis;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// User feedback sentiment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Negative,
    Correction,
}

/// A feedback signal from the user about a prior response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackSignal {
    pub sentiment: Sentiment,

    /// Corrected text, when the sentiment is a correction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correction: Option<String>,
}

/// The result of a tool invocation, fed back into the reasoning loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub call_id: String,
    pub content: String,
    #[serde(default)]
    pub is_error: bool,
}

/// Payload variants for an inbound stream message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputPayload {
    UserQuery(String),
    ToolResult(ToolResult),
    UserFeedback(FeedbackSignal),
}

/// One message on the inbound side of the reasoning stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentInput {
    pub session_id: String,

    /// Unix millis.
    pub timestamp: u64,

    pub payload: InputPayload,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<ContextSnapshot>,
}

impl AgentInput {
    pub fn user_query(session_id: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            timestamp: now_millis(),
            payload: InputPayload::UserQuery(query.into()),
            context: None,
        }
    }

    pub fn feedback(session_id: impl Into<String>, signal: FeedbackSignal) -> Self {
        Self {
            session_id: session_id.into(),
            timestamp: now_millis(),
            payload: InputPayload::UserFeedback(signal),
            context: None,
        }
    }

    pub fn tool_result(session_id: impl Into<String>, result: ToolResult) -> Self {
        Self {
            session_id: session_id.into(),
            timestamp: now_millis(),
            payload: InputPayload::ToolResult(result),
            context: None,
        }
    }

    pub fn with_context(mut self, context: ContextSnapshot) -> Self {
        self.context = Some(context);
        self
    }
}

/// A tool the reasoning engine wants invoked on its behalf.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub tool_name: String,
    pub call_id: String,
    #[serde(default)]
    pub arguments: HashMap<String, String>,
    #[serde(default)]
    pub requires_confirmation: bool,
}

/// Progress status for long-running reasoning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub message: String,
    /// Progress in [0, 1].
    pub progress: f32,
}

/// Payload variants for an outbound stream message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputPayload {
    ThoughtChain(String),
    ToolCall(ToolCall),
    FinalResponse(String),
    Status(StatusUpdate),
}

/// One message on the outbound side of the reasoning stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentOutput {
    pub session_id: String,

    /// Unix millis.
    pub timestamp: u64,

    pub payload: OutputPayload,
}

impl AgentOutput {
    pub fn status(session_id: impl Into<String>, message: impl Into<String>, progress: f32) -> Self {
        Self {
            session_id: session_id.into(),
            timestamp: now_millis(),
            payload: OutputPayload::Status(StatusUpdate {
                message: message.into(),
                progress,
            }),
        }
    }

    pub fn thought_chain(session_id: impl Into<String>, thought: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            timestamp: now_millis(),
            payload: OutputPayload::ThoughtChain(thought.into()),
        }
    }

    pub fn final_response(session_id: impl Into<String>, response: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            timestamp: now_millis(),
            payload: OutputPayload::FinalResponse(response.into()),
        }
    }

    /// The final-response text, if this message carries one.
    pub fn final_response_text(&self) -> Option<&str> {
        match &self.payload {
            OutputPayload::FinalResponse(text) => Some(text),
            _ => None,
        }
    }

    /// The thought-chain text, if this message carries one.
    pub fn thought_chain_text(&self) -> Option<&str> {
        match &self.payload {
            OutputPayload::ThoughtChain(text) => Some(text),
            _ => None,
        }
    }
}

/// One retrieved chunk of semantic memory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SemanticChunk {
    pub chunk_id: String,
    pub content: String,
    pub relevance_score: f32,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// A knowledge-graph triple included in the context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphTriple {
    pub subject: String,
    pub predicate: String,
    pub object: String,
}

/// Context handed to the reasoning engine alongside a query.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContextSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,

    /// Recent turns within the session, oldest first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub episodic_memory: Vec<String>,

    /// Retrieval context, ranked by relevance.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub semantic_memory: Vec<SemanticChunk>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub graph_context: Vec<GraphTriple>,
}

/// Classification for an ingested item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    Actionable,
    Reference,
    Trash,
}

/// Request for the unary item-classification RPC.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifyRequest {
    pub content: String,
    pub source: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifyResponse {
    pub classification: Classification,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_project: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_area: Option<String>,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    pub confidence: f32,
}

/// Request for the weekly review generation RPC.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WeeklyReviewRequest {
    pub user_id: String,
    #[serde(default)]
    pub completed_tasks: Vec<String>,
    #[serde(default)]
    pub active_tasks: Vec<String>,
    #[serde(default)]
    pub blocked_tasks: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_range: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WeeklyReviewResponse {
    pub report_markdown: String,
    #[serde(default)]
    pub stalled_projects: Vec<String>,
    #[serde(default)]
    pub suggested_next_actions: Vec<String>,
    #[serde(default)]
    pub dormant_ideas: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_payload_preserves_discriminant() {
        let input = AgentInput::user_query("sess-1", "hello");
        let json = serde_json::to_value(&input).unwrap();
        assert_eq!(json["payload"]["user_query"], "hello");

        let roundtrip: AgentInput = serde_json::from_value(json).unwrap();
        match roundtrip.payload {
            InputPayload::UserQuery(q) => assert_eq!(q, "hello"),
            other => panic!("unexpected payload: {:?}", other),
        }
    }

    #[test]
    fn empty_query_is_still_a_query_variant() {
        let input = AgentInput::user_query("sess-1", "");
        let json = serde_json::to_string(&input).unwrap();
        let roundtrip: AgentInput = serde_json::from_str(&json).unwrap();
        assert!(matches!(roundtrip.payload, InputPayload::UserQuery(ref q) if q.is_empty()));
    }

    #[test]
    fn feedback_sentiment_serializes_lowercase() {
        let json = serde_json::to_string(&Sentiment::Correction).unwrap();
        assert_eq!(json, "\"correction\"");
    }

    #[test]
    fn output_accessors() {
        let out = AgentOutput::final_response("s", "done");
        assert_eq!(out.final_response_text(), Some("done"));
        assert_eq!(out.thought_chain_text(), None);

        let out = AgentOutput::thought_chain("s", "hmm");
        assert_eq!(out.thought_chain_text(), Some("hmm"));
        assert_eq!(out.final_response_text(), None);

        let out = AgentOutput::status("s", "working", 0.5);
        assert!(matches!(out.payload, OutputPayload::Status(ref st) if st.progress == 0.5));
    }

    #[test]
    fn context_snapshot_skips_empty_fields() {
        let snapshot = ContextSnapshot::default();
        let json = serde_json::to_string(&snapshot).unwrap();
        assert_eq!(json, "{}");
    }

    #[test]
    fn tool_result_roundtrip() {
        let input = AgentInput::tool_result(
            "sess-2",
            ToolResult {
                call_id: "call-7".into(),
                content: "42".into(),
                is_error: false,
            },
        );
        let json = serde_json::to_string(&input).unwrap();
        let roundtrip: AgentInput = serde_json::from_str(&json).unwrap();
        match roundtrip.payload {
            InputPayload::ToolResult(r) => {
                assert_eq!(r.call_id, "call-7");
                assert_eq!(r.content, "42");
                assert!(!r.is_error);
            }
            other => panic!("unexpected payload: {:?}", other),
        }
    }
}
