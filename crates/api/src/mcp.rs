//! MCP (Model Context Protocol) tool endpoint.
//!
//! A single JSON-RPC 2.0 route exposing the memory engine's search and
//! status operations as tools, so agentic clients can query the knowledge
//! base directly.

use crate::state::AppState;
use axum::{body::Bytes, extract::State, response::IntoResponse, Json};
use secondbrain_memory::SearchRequest;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

const PROTOCOL_VERSION: &str = "2024-11-05";
const SERVER_NAME: &str = "secondbrain";

#[derive(Debug, Deserialize)]
struct JsonRpcRequest {
    #[allow(dead_code)]
    #[serde(default)]
    jsonrpc: String,
    #[serde(default)]
    id: Value,
    method: String,
    #[serde(default)]
    params: Value,
}

#[derive(Debug, Serialize)]
struct JsonRpcResponse {
    jsonrpc: &'static str,
    id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<JsonRpcError>,
}

#[derive(Debug, Serialize)]
struct JsonRpcError {
    code: i32,
    message: String,
}

fn success(id: Value, result: Value) -> JsonRpcResponse {
    JsonRpcResponse {
        jsonrpc: "2.0",
        id,
        result: Some(result),
        error: None,
    }
}

fn failure(id: Value, code: i32, message: impl Into<String>) -> JsonRpcResponse {
    JsonRpcResponse {
        jsonrpc: "2.0",
        id,
        result: None,
        error: Some(JsonRpcError {
            code,
            message: message.into(),
        }),
    }
}

/// `POST /mcp`
pub async fn handle(State(state): State<Arc<AppState>>, body: Bytes) -> impl IntoResponse {
    let request: JsonRpcRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(_) => return Json(failure(Value::Null, -32700, "parse error")),
    };

    debug!(method = %request.method, "mcp request");

    let response = match request.method.as_str() {
        "initialize" => success(request.id, initialize_result()),
        "tools/list" => success(request.id, tools_list()),
        "tools/call" => match tools_call(&state, &request.params).await {
            Ok(result) => success(request.id, result),
            Err(message) => failure(request.id, -32603, message),
        },
        other => failure(request.id, -32601, format!("method not found: {other}")),
    };

    Json(response)
}

fn initialize_result() -> Value {
    json!({
        "protocolVersion": PROTOCOL_VERSION,
        "capabilities": { "tools": {} },
        "serverInfo": {
            "name": SERVER_NAME,
            "version": env!("CARGO_PKG_VERSION"),
        },
    })
}

fn search_schema(query_description: &str) -> Value {
    json!({
        "type": "object",
        "properties": {
            "query": { "type": "string", "description": query_description },
            "limit": { "type": "number", "description": "Maximum results (default: 5)" },
            "min_score": { "type": "number", "description": "Minimum relevance score 0-1" },
        },
        "required": ["query"],
    })
}

fn tools_list() -> Value {
    json!({
        "tools": [
            {
                "name": "search",
                "description": "Semantic vector search using embeddings. Finds conceptually related content even without exact keyword matches.",
                "inputSchema": search_schema("Natural language search query"),
            },
            {
                "name": "fts",
                "description": "Fast BM25 keyword-based full-text search. Best for finding documents with specific words or phrases.",
                "inputSchema": search_schema("Keyword search query"),
            },
            {
                "name": "hybrid",
                "description": "Highest quality search combining BM25 + vector + Reciprocal Rank Fusion. Slower but most accurate.",
                "inputSchema": search_schema("Natural language search query"),
            },
            {
                "name": "status",
                "description": "Show index health: document counts, chunk counts, and graph triple counts.",
                "inputSchema": { "type": "object", "properties": {} },
            },
        ],
    })
}

async fn tools_call(state: &AppState, params: &Value) -> Result<Value, String> {
    let name = params.get("name").and_then(Value::as_str).unwrap_or("");
    let args = params.get("arguments").cloned().unwrap_or(json!({}));

    match name {
        "search" | "fts" | "hybrid" => tool_search(state, name, &args).await,
        "status" => tool_status(state).await,
        other => Err(format!("unknown tool: {other}")),
    }
}

async fn tool_search(state: &AppState, mode: &str, args: &Value) -> Result<Value, String> {
    let query = args.get("query").and_then(Value::as_str).unwrap_or("");
    if query.is_empty() {
        // Missing arguments are an in-band tool error, not a protocol one.
        return Ok(error_content("query is required"));
    }

    let request = SearchRequest {
        query: query.to_string(),
        top_k: args.get("limit").and_then(Value::as_f64).unwrap_or(5.0) as i32,
        min_score: args.get("min_score").and_then(Value::as_f64).unwrap_or(0.0) as f32,
        filters: Default::default(),
    };

    let memory = state.orchestrator.memory();
    let results = match mode {
        "search" => memory.semantic_search(&request).await,
        "fts" => memory.full_text_search(&request).await,
        _ => memory.hybrid_search(&request).await,
    }
    .map_err(|e| format!("{mode} search: {e}"))?;

    Ok(format_search_results(&results, query))
}

async fn tool_status(state: &AppState) -> Result<Value, String> {
    let stats = state.orchestrator.memory().get_stats().await;

    let mut text = format!(
        "Second Brain Index Status:\n  Documents: {}\n  Chunks: {}\n  Graph Triples: {}",
        stats.total_documents, stats.total_chunks, stats.total_graph_triples,
    );
    if let Some(last_indexed) = stats.last_indexed_at {
        text.push_str(&format!("\n  Last Indexed: {last_indexed} (unix ms)"));
    }

    Ok(text_content(&text))
}

fn format_search_results(results: &[secondbrain_memory::SearchResult], query: &str) -> Value {
    if results.is_empty() {
        return text_content(&format!("No results found for {query:?}"));
    }

    let mut text = format!("Found {} result(s) for {query:?}:\n\n", results.len());
    for result in results {
        text.push_str(&format!(
            "  [{:.0}%] {}\n  {}\n\n",
            result.score * 100.0,
            result.document_id,
            truncate(&result.content, 200),
        ));
    }

    text_content(&text)
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max_chars).collect();
        format!("{cut}...")
    }
}

fn text_content(text: &str) -> Value {
    json!({ "content": [{ "type": "text", "text": text }] })
}

fn error_content(message: &str) -> Value {
    json!({
        "content": [{ "type": "text", "text": message }],
        "isError": true,
    })
}
