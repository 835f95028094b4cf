//! Reasoning engine backed by an OpenAI-compatible chat endpoint.

use crate::engine::{ReasoningEngine, ThoughtStream, STREAM_BUFFER};
use async_trait::async_trait;
use secondbrain_common::{
    AgentInput, AgentOutput, BrainError, Classification, ClassifyRequest, ClassifyResponse,
    ContextSnapshot, InputPayload, Result, WeeklyReviewRequest, WeeklyReviewResponse,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

const DEFAULT_BASE_URL: &str = "http://localhost:11434";

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

struct RemoteInner {
    base_url: String,
    model: String,
    api_key: Option<String>,
    http_client: reqwest::Client,
}

/// A reasoning engine that turns each user query into one chat-completion
/// round trip, narrating progress on the stream as it goes.
pub struct RemoteReasoningEngine {
    inner: Arc<RemoteInner>,
}

impl RemoteReasoningEngine {
    pub fn new(base_url: Option<String>, model: String, api_key: Option<String>) -> Self {
        Self {
            inner: Arc::new(RemoteInner {
                base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
                model,
                api_key,
                http_client: reqwest::Client::new(),
            }),
        }
    }
}

impl RemoteInner {
    async fn complete(&self, messages: Vec<ChatMessage>) -> Result<String> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = ChatRequest {
            model: self.model.clone(),
            messages,
            temperature: None,
        };

        let mut http_req = self.http_client.post(&url).json(&body);
        if let Some(ref key) = self.api_key {
            http_req = http_req.bearer_auth(key);
        }

        let response = http_req
            .send()
            .await
            .map_err(|e| BrainError::Internal(format!("chat request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(BrainError::Internal(format!(
                "chat API error {status}: {body_text}"
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| BrainError::Internal(format!("failed to parse chat response: {e}")))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| BrainError::Internal("no choices in chat response".into()))
    }

    async fn handle_input(&self, input: AgentInput, out_tx: &mpsc::Sender<AgentOutput>) {
        let session_id = input.session_id.clone();

        if out_tx
            .send(AgentOutput::status(&session_id, "Thinking...", 0.3))
            .await
            .is_err()
        {
            return;
        }

        match input.payload {
            InputPayload::UserQuery(query) => {
                let _ = out_tx
                    .send(AgentOutput::thought_chain(
                        &session_id,
                        "Analyzing the query and retrieving relevant context...",
                    ))
                    .await;

                let messages = build_messages(&query, input.context.as_ref());
                let response = match self.complete(messages).await {
                    Ok(content) => content,
                    Err(e) => {
                        warn!(error = %e, "chat completion failed");
                        "I encountered an error while processing your request.".to_string()
                    }
                };

                let _ = out_tx
                    .send(AgentOutput::final_response(&session_id, response))
                    .await;
            }
            InputPayload::ToolResult(result) => {
                debug!(call_id = %result.call_id, is_error = result.is_error, "received tool result");
                let _ = out_tx
                    .send(AgentOutput::thought_chain(
                        &session_id,
                        "Processing tool result...",
                    ))
                    .await;
            }
            InputPayload::UserFeedback(_) => {}
        }
    }
}

/// Flatten the context snapshot into chat messages.
fn build_messages(query: &str, context: Option<&ContextSnapshot>) -> Vec<ChatMessage> {
    let mut messages = Vec::new();
    let mut sections = Vec::new();

    if let Some(ctx) = context {
        if let Some(ref system) = ctx.system_prompt {
            messages.push(ChatMessage {
                role: "system".to_string(),
                content: system.clone(),
            });
        }
        if !ctx.episodic_memory.is_empty() {
            sections.push(format!(
                "Recent conversation:\n{}",
                ctx.episodic_memory.join("\n")
            ));
        }
        if !ctx.semantic_memory.is_empty() {
            let chunks: Vec<String> = ctx
                .semantic_memory
                .iter()
                .map(|c| format!("- {}", c.content))
                .collect();
            sections.push(format!("Relevant knowledge:\n{}", chunks.join("\n")));
        }
        if !ctx.graph_context.is_empty() {
            let triples: Vec<String> = ctx
                .graph_context
                .iter()
                .map(|t| format!("- {} {} {}", t.subject, t.predicate, t.object))
                .collect();
            sections.push(format!("Known relationships:\n{}", triples.join("\n")));
        }
    }

    let content = if sections.is_empty() {
        query.to_string()
    } else {
        format!("{}\n\n{}", sections.join("\n\n"), query)
    };

    messages.push(ChatMessage {
        role: "user".to_string(),
        content,
    });
    messages
}

#[async_trait]
impl ReasoningEngine for RemoteReasoningEngine {
    async fn open_stream(&self) -> Result<ThoughtStream> {
        let (in_tx, mut in_rx) = mpsc::channel::<AgentInput>(STREAM_BUFFER);
        let (out_tx, out_rx) = mpsc::channel(STREAM_BUFFER);

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            while let Some(input) = in_rx.recv().await {
                inner.handle_input(input, &out_tx).await;
            }
        });

        Ok(ThoughtStream {
            inputs: in_tx,
            outputs: out_rx,
        })
    }

    async fn classify_item(&self, request: ClassifyRequest) -> Result<ClassifyResponse> {
        let prompt = format!(
            "Classify the following {} item as exactly one of ACTIONABLE, REFERENCE, or TRASH.\n\
             Reply with the single word only.\n\n{}",
            request.source, request.content
        );
        let answer = self
            .inner
            .complete(vec![ChatMessage {
                role: "user".to_string(),
                content: prompt,
            }])
            .await?;

        let classification = match answer.trim().to_uppercase().as_str() {
            s if s.starts_with("ACTIONABLE") => Classification::Actionable,
            s if s.starts_with("TRASH") => Classification::Trash,
            _ => Classification::Reference,
        };

        Ok(ClassifyResponse {
            classification,
            suggested_project: None,
            suggested_area: None,
            priority: 0,
            metadata: request.metadata,
            confidence: 0.5,
        })
    }

    async fn generate_weekly_review(
        &self,
        request: WeeklyReviewRequest,
    ) -> Result<WeeklyReviewResponse> {
        let prompt = format!(
            "Write a short weekly review in markdown for user {}.\n\
             Completed tasks:\n{}\nActive tasks:\n{}\nBlocked tasks:\n{}",
            request.user_id,
            request.completed_tasks.join("\n"),
            request.active_tasks.join("\n"),
            request.blocked_tasks.join("\n"),
        );
        let report = self
            .inner
            .complete(vec![ChatMessage {
                role: "user".to_string(),
                content: prompt,
            }])
            .await?;

        Ok(WeeklyReviewResponse {
            report_markdown: report,
            ..Default::default()
        })
    }
}
