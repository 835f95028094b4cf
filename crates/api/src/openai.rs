//! OpenAI-compatible chat-completions facade.
//!
//! Translates the HTTP chat shape to and from the orchestrator's thought
//! stream: non-streaming requests use the stream unary-style, streaming
//! requests relay chunks as server-sent events.

use crate::state::AppState;
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::sse::{Event, Sse},
    response::{IntoResponse, Response},
    Json,
};
use secondbrain_common::{now_millis, AgentInput, ContextSnapshot};
use secondbrain_reasoning::{unary, ReasoningEngine, ThoughtStream};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::error;
use uuid::Uuid;

/// Upper bound for a whole completion round trip.
const COMPLETION_TIMEOUT: Duration = Duration::from_secs(300);

// --- Wire types ---

#[derive(Debug, Deserialize)]
pub struct ChatCompletionRequest {
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub stream: bool,
    #[serde(default)]
    pub user: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct ChatCompletionResponse {
    pub id: String,
    pub object: &'static str,
    pub created: u64,
    pub model: String,
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Serialize)]
pub struct ChatChoice {
    pub index: usize,
    pub message: ChatMessage,
    pub finish_reason: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ChatCompletionChunk {
    pub id: String,
    pub object: &'static str,
    pub created: u64,
    pub model: String,
    pub choices: Vec<ChatChunkChoice>,
}

#[derive(Debug, Serialize)]
pub struct ChatChunkChoice {
    pub index: usize,
    pub delta: ChatDelta,
    pub finish_reason: Option<&'static str>,
}

#[derive(Debug, Default, Serialize)]
pub struct ChatDelta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct Model {
    pub id: String,
    pub object: &'static str,
    pub created: u64,
    pub owned_by: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ModelList {
    pub object: &'static str,
    pub data: Vec<Model>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub message: String,
    #[serde(rename = "type")]
    pub error_type: &'static str,
    pub code: String,
}

fn error_response(status: StatusCode, error_type: &'static str, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: ErrorDetail {
                message: message.into(),
                error_type,
                code: status.as_u16().to_string(),
            },
        }),
    )
        .into_response()
}

impl ChatCompletionChunk {
    fn content(id: &str, model: &str, content: impl Into<String>) -> Self {
        Self {
            id: id.to_string(),
            object: "chat.completion.chunk",
            created: now_millis() / 1000,
            model: model.to_string(),
            choices: vec![ChatChunkChoice {
                index: 0,
                delta: ChatDelta {
                    role: None,
                    content: Some(content.into()),
                },
                finish_reason: None,
            }],
        }
    }

    fn role(id: &str, model: &str) -> Self {
        Self {
            id: id.to_string(),
            object: "chat.completion.chunk",
            created: now_millis() / 1000,
            model: model.to_string(),
            choices: vec![ChatChunkChoice {
                index: 0,
                delta: ChatDelta {
                    role: Some("assistant"),
                    content: None,
                },
                finish_reason: None,
            }],
        }
    }

    fn finish(id: &str, model: &str) -> Self {
        Self {
            id: id.to_string(),
            object: "chat.completion.chunk",
            created: now_millis() / 1000,
            model: model.to_string(),
            choices: vec![ChatChunkChoice {
                index: 0,
                delta: ChatDelta::default(),
                finish_reason: Some("stop"),
            }],
        }
    }
}

// --- Handlers ---

/// `GET /v1/models`
pub async fn list_models(State(state): State<Arc<AppState>>) -> Json<ModelList> {
    let data = state
        .models
        .iter()
        .map(|m| Model {
            id: m.clone(),
            object: "model",
            created: 1704067200, // 2024-01-01
            owned_by: "secondbrain",
        })
        .collect();

    Json(ModelList {
        object: "list",
        data,
    })
}

/// `POST /v1/chat/completions`
pub async fn chat_completions(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let request: ChatCompletionRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                "invalid_request_error",
                format!("Invalid JSON: {e}"),
            )
        }
    };

    if request.messages.is_empty() {
        return error_response(
            StatusCode::BAD_REQUEST,
            "invalid_request_error",
            "messages is required",
        );
    }

    if request.stream {
        streaming_completion(state, request).await
    } else {
        non_streaming_completion(state, request).await
    }
}

fn session_id_for(request: &ChatCompletionRequest) -> String {
    if request.user.is_empty() {
        format!("openai-compat-{}", Uuid::new_v4().simple())
    } else {
        request.user.clone()
    }
}

fn build_input(request: &ChatCompletionRequest, session_id: &str) -> AgentInput {
    let (query, system_prompt) = extract_query_and_system(&request.messages);
    let mut input = AgentInput::user_query(session_id, query);
    if !system_prompt.is_empty() {
        input = input.with_context(ContextSnapshot {
            system_prompt: Some(system_prompt),
            ..Default::default()
        });
    }
    input
}

async fn non_streaming_completion(
    state: Arc<AppState>,
    request: ChatCompletionRequest,
) -> Response {
    let session_id = session_id_for(&request);
    let input = build_input(&request, &session_id);

    let outputs = match tokio::time::timeout(
        COMPLETION_TIMEOUT,
        unary(&state.orchestrator, input),
    )
    .await
    {
        Ok(Ok(outputs)) => outputs,
        Ok(Err(e)) => {
            error!(error = %e, "reasoning stream failed");
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "server_error",
                "Internal server error",
            );
        }
        Err(_) => {
            error!("completion timed out");
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "server_error",
                "Request timed out",
            );
        }
    };

    let mut content = String::new();
    for output in &outputs {
        if let Some(text) = output.final_response_text() {
            content.push_str(text);
        }
    }
    if content.is_empty() {
        content = "No response generated.".to_string();
    }

    let response = ChatCompletionResponse {
        id: format!("chatcmpl-{}", Uuid::new_v4().simple()),
        object: "chat.completion",
        created: now_millis() / 1000,
        model: request.model,
        choices: vec![ChatChoice {
            index: 0,
            message: ChatMessage {
                role: "assistant".to_string(),
                content,
            },
            finish_reason: "stop",
        }],
    };

    Json(response).into_response()
}

async fn streaming_completion(state: Arc<AppState>, request: ChatCompletionRequest) -> Response {
    let session_id = session_id_for(&request);
    let input = build_input(&request, &session_id);
    let completion_id = format!("chatcmpl-{}", Uuid::new_v4().simple());
    let model = request.model.clone();

    let ThoughtStream {
        inputs,
        mut outputs,
    } = match state.orchestrator.open_stream().await {
        Ok(stream) => stream,
        Err(e) => {
            error!(error = %e, "failed to open reasoning stream");
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "server_error",
                "Internal server error",
            );
        }
    };
    if inputs.send(input).await.is_err() {
        return error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "server_error",
            "Internal server error",
        );
    }
    drop(inputs);

    let (event_tx, event_rx) = mpsc::channel::<Result<Event, Infallible>>(32);

    tokio::spawn(async move {
        // First frame carries the assistant role with no content.
        if send_json(&event_tx, &ChatCompletionChunk::role(&completion_id, &model))
            .await
            .is_err()
        {
            return;
        }

        while let Some(output) = outputs.recv().await {
            let content = if let Some(thought) = output.thought_chain_text() {
                Some(format!("{thought}\n"))
            } else {
                output.final_response_text().map(str::to_string)
            };

            if let Some(content) = content {
                let chunk = ChatCompletionChunk::content(&completion_id, &model, content);
                if send_json(&event_tx, &chunk).await.is_err() {
                    // Client disconnected; closing the stream propagates
                    // cancellation to the relay.
                    return;
                }
            }
        }

        let _ = send_json(&event_tx, &ChatCompletionChunk::finish(&completion_id, &model)).await;
        let _ = event_tx.send(Ok(Event::default().data("[DONE]"))).await;
    });

    Sse::new(ReceiverStream::new(event_rx)).into_response()
}

async fn send_json<T: Serialize>(
    event_tx: &mpsc::Sender<Result<Event, Infallible>>,
    payload: &T,
) -> Result<(), ()> {
    let data = serde_json::to_string(payload).map_err(|_| ())?;
    event_tx
        .send(Ok(Event::default().data(data)))
        .await
        .map_err(|_| ())
}

/// The query is the last user message; the system prompt is the last
/// system message.
fn extract_query_and_system(messages: &[ChatMessage]) -> (String, String) {
    let query = messages
        .iter()
        .rev()
        .find(|m| m.role == "user")
        .map(|m| m.content.clone())
        .unwrap_or_default();
    let system_prompt = messages
        .iter()
        .rev()
        .find(|m| m.role == "system")
        .map(|m| m.content.clone())
        .unwrap_or_default();
    (query, system_prompt)
}
