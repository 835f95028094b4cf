//! Integration tests for the HTTP surface.
//!
//! These tests spin up a real server on a random port and drive it with
//! reqwest, covering the chat-completions facade (JSON and SSE), the MCP
//! endpoint, metrics, and the webhook edge.

use secondbrain_api::webhook::sign_body;
use secondbrain_api::{create_router, AppState};
use secondbrain_memory::{InMemoryVectorStore, MemoryConfig, MemoryEngine, MockEmbedder};
use secondbrain_orchestrator::{Orchestrator, OrchestratorConfig};
use serde_json::Value;
use std::sync::Arc;

fn orchestrator() -> Orchestrator {
    let memory = Arc::new(MemoryEngine::new(
        MemoryConfig::default(),
        Arc::new(InMemoryVectorStore::new()),
        Arc::new(MockEmbedder::new(64)),
    ));
    Orchestrator::new(memory, OrchestratorConfig::default())
}

/// Spin up a test server on a random port and return the base URL.
async fn start_test_server(webhook_secret: Option<String>) -> (String, Orchestrator) {
    let orchestrator = orchestrator();
    let state = AppState::new(
        orchestrator.clone(),
        vec!["secondbrain".to_string()],
        webhook_secret,
    );
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    (format!("http://{}", addr), orchestrator)
}

async fn get(base: &str, path: &str) -> (u16, String) {
    let resp = reqwest::Client::new()
        .get(format!("{base}{path}"))
        .send()
        .await
        .unwrap();
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap();
    (status, body)
}

async fn post_json(base: &str, path: &str, json: &str) -> (u16, String) {
    let resp = reqwest::Client::new()
        .post(format!("{base}{path}"))
        .header("content-type", "application/json")
        .body(json.to_string())
        .send()
        .await
        .unwrap();
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap();
    (status, body)
}

// ============================================================================
// Health and models
// ============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let (base, _) = start_test_server(None).await;
    let (status, body) = get(&base, "/health").await;
    assert_eq!(status, 200);
    assert!(body.contains("healthy"));
}

#[tokio::test]
async fn test_models_listing() {
    let (base, _) = start_test_server(None).await;
    let (status, body) = get(&base, "/v1/models").await;
    assert_eq!(status, 200);

    let json: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["object"], "list");
    assert_eq!(json["data"][0]["id"], "secondbrain");
    assert_eq!(json["data"][0]["object"], "model");
    assert_eq!(json["data"][0]["owned_by"], "secondbrain");
}

// ============================================================================
// Chat completions (non-streaming)
// ============================================================================

#[tokio::test]
async fn test_chat_completion_non_streaming() {
    let (base, _) = start_test_server(None).await;
    let (status, body) = post_json(
        &base,
        "/v1/chat/completions",
        r#"{"model":"secondbrain","messages":[{"role":"user","content":"hi"}]}"#,
    )
    .await;
    assert_eq!(status, 200);

    let json: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["object"], "chat.completion");
    assert_eq!(json["choices"][0]["finish_reason"], "stop");
    assert_eq!(json["choices"][0]["message"]["role"], "assistant");
    assert_eq!(
        json["choices"][0]["message"]["content"],
        "Received query: hi (reasoning engine not connected)"
    );
}

#[tokio::test]
async fn test_chat_completion_invalid_json_is_400() {
    let (base, _) = start_test_server(None).await;
    let (status, body) = post_json(&base, "/v1/chat/completions", "{not json").await;
    assert_eq!(status, 400);

    let json: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["error"]["type"], "invalid_request_error");
    assert_eq!(json["error"]["code"], "400");
}

#[tokio::test]
async fn test_chat_completion_empty_messages_is_400() {
    let (base, _) = start_test_server(None).await;
    let (status, body) = post_json(
        &base,
        "/v1/chat/completions",
        r#"{"model":"secondbrain","messages":[]}"#,
    )
    .await;
    assert_eq!(status, 400);

    let json: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["error"]["type"], "invalid_request_error");
    assert!(json["error"]["message"]
        .as_str()
        .unwrap()
        .contains("messages"));
}

// ============================================================================
// Chat completions (streaming SSE)
// ============================================================================

#[tokio::test]
async fn test_chat_completion_streaming_framing() {
    let (base, _) = start_test_server(None).await;
    let resp = reqwest::Client::new()
        .post(format!("{base}/v1/chat/completions"))
        .header("content-type", "application/json")
        .body(r#"{"model":"secondbrain","stream":true,"messages":[{"role":"user","content":"hi"}]}"#)
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status().as_u16(), 200);
    let content_type = resp
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(
        content_type.starts_with("text/event-stream"),
        "unexpected content type {content_type}"
    );

    let body = resp.text().await.unwrap();
    let frames: Vec<&str> = body
        .split("\n\n")
        .filter(|f| !f.trim().is_empty())
        .collect();

    // First frame: assistant role, no content.
    let first: Value =
        serde_json::from_str(frames[0].strip_prefix("data: ").unwrap()).unwrap();
    assert_eq!(first["choices"][0]["delta"]["role"], "assistant");
    assert!(first["choices"][0]["delta"].get("content").is_none());

    // Terminal sentinel, preceded by the finish frame.
    assert_eq!(*frames.last().unwrap(), "data: [DONE]");
    let penultimate: Value =
        serde_json::from_str(frames[frames.len() - 2].strip_prefix("data: ").unwrap()).unwrap();
    assert_eq!(penultimate["choices"][0]["finish_reason"], "stop");
}

#[tokio::test]
async fn test_streaming_and_non_streaming_agree_on_content() {
    let (base, _) = start_test_server(None).await;
    let messages = r#"[{"role":"user","content":"compare me"}]"#;

    let (_, body) = post_json(
        &base,
        "/v1/chat/completions",
        &format!(r#"{{"model":"secondbrain","messages":{messages}}}"#),
    )
    .await;
    let json: Value = serde_json::from_str(&body).unwrap();
    let non_streaming = json["choices"][0]["message"]["content"]
        .as_str()
        .unwrap()
        .to_string();

    let resp = reqwest::Client::new()
        .post(format!("{base}/v1/chat/completions"))
        .header("content-type", "application/json")
        .body(format!(
            r#"{{"model":"secondbrain","stream":true,"messages":{messages}}}"#
        ))
        .send()
        .await
        .unwrap();
    let body = resp.text().await.unwrap();

    // Concatenate the delta contents of every streamed frame. The
    // placeholder engine emits no thought chains, so the streamed
    // content must equal the non-streaming body byte for byte.
    let mut streamed = String::new();
    for frame in body.split("\n\n") {
        let Some(data) = frame.strip_prefix("data: ") else {
            continue;
        };
        if data == "[DONE]" {
            continue;
        }
        let chunk: Value = serde_json::from_str(data).unwrap();
        if let Some(content) = chunk["choices"][0]["delta"]["content"].as_str() {
            streamed.push_str(content);
        }
    }

    assert_eq!(streamed, non_streaming);
}

// ============================================================================
// MCP endpoint
// ============================================================================

#[tokio::test]
async fn test_mcp_initialize() {
    let (base, _) = start_test_server(None).await;
    let (status, body) = post_json(
        &base,
        "/mcp",
        r#"{"jsonrpc":"2.0","id":1,"method":"initialize"}"#,
    )
    .await;
    assert_eq!(status, 200);

    let json: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["jsonrpc"], "2.0");
    assert_eq!(json["id"], 1);
    assert_eq!(json["result"]["protocolVersion"], "2024-11-05");
    assert_eq!(json["result"]["serverInfo"]["name"], "secondbrain");
}

#[tokio::test]
async fn test_mcp_tools_list_has_exactly_four_tools() {
    let (base, _) = start_test_server(None).await;
    let (status, body) = post_json(
        &base,
        "/mcp",
        r#"{"jsonrpc":"2.0","id":1,"method":"tools/list"}"#,
    )
    .await;
    assert_eq!(status, 200);

    let json: Value = serde_json::from_str(&body).unwrap();
    let names: Vec<&str> = json["result"]["tools"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["search", "fts", "hybrid", "status"]);
    for tool in json["result"]["tools"].as_array().unwrap() {
        assert!(tool["inputSchema"]["type"] == "object");
    }
}

#[tokio::test]
async fn test_mcp_tool_call_round_trip() {
    let (base, orchestrator) = start_test_server(None).await;
    orchestrator
        .memory()
        .index_document(secondbrain_memory::IndexRequest {
            document_id: "doc-1".into(),
            content: "seismic signal detection notes".into(),
            ..Default::default()
        })
        .await
        .unwrap();

    let (status, body) = post_json(
        &base,
        "/mcp",
        r#"{"jsonrpc":"2.0","id":7,"method":"tools/call","params":{"name":"fts","arguments":{"query":"seismic"}}}"#,
    )
    .await;
    assert_eq!(status, 200);

    let json: Value = serde_json::from_str(&body).unwrap();
    let text = json["result"]["content"][0]["text"].as_str().unwrap();
    assert!(text.contains("doc-1"));
    assert!(json["result"].get("isError").is_none());
}

#[tokio::test]
async fn test_mcp_empty_query_is_in_band_tool_error() {
    let (base, _) = start_test_server(None).await;
    let (status, body) = post_json(
        &base,
        "/mcp",
        r#"{"jsonrpc":"2.0","id":2,"method":"tools/call","params":{"name":"search","arguments":{}}}"#,
    )
    .await;
    assert_eq!(status, 200);

    let json: Value = serde_json::from_str(&body).unwrap();
    assert!(json.get("error").is_none(), "expected in-band error: {json}");
    assert_eq!(json["result"]["isError"], true);
}

#[tokio::test]
async fn test_mcp_unknown_method() {
    let (base, _) = start_test_server(None).await;
    let (_, body) = post_json(&base, "/mcp", r#"{"jsonrpc":"2.0","id":3,"method":"nope"}"#).await;
    let json: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["error"]["code"], -32601);
}

#[tokio::test]
async fn test_mcp_parse_error() {
    let (base, _) = start_test_server(None).await;
    let (_, body) = post_json(&base, "/mcp", "{broken").await;
    let json: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["error"]["code"], -32700);
}

#[tokio::test]
async fn test_mcp_status_tool() {
    let (base, _) = start_test_server(None).await;
    let (_, body) = post_json(
        &base,
        "/mcp",
        r#"{"jsonrpc":"2.0","id":4,"method":"tools/call","params":{"name":"status"}}"#,
    )
    .await;
    let json: Value = serde_json::from_str(&body).unwrap();
    let text = json["result"]["content"][0]["text"].as_str().unwrap();
    assert!(text.contains("Documents: 0"));
    assert!(text.contains("Graph Triples: 0"));
}

// ============================================================================
// Metrics endpoint
// ============================================================================

#[tokio::test]
async fn test_metrics_endpoint_shape() {
    let (base, _) = start_test_server(None).await;
    let (status, body) = get(&base, "/v1/metrics").await;
    assert_eq!(status, 200);

    let json: Value = serde_json::from_str(&body).unwrap();
    for key in [
        "total_interactions",
        "avg_response_quality",
        "avg_context_relevance",
        "user_satisfaction_rate",
        "knowledge_coverage",
        "feedback_counts",
        "topic_coverage",
    ] {
        assert!(json.get(key).is_some(), "missing key {key}");
    }
}

#[tokio::test]
async fn test_queries_show_up_in_metrics() {
    let (base, _) = start_test_server(None).await;
    post_json(
        &base,
        "/v1/chat/completions",
        r#"{"model":"secondbrain","messages":[{"role":"user","content":"count me"}]}"#,
    )
    .await;

    let (_, body) = get(&base, "/v1/metrics").await;
    let json: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["total_interactions"], 1);
}

// ============================================================================
// Webhook edge
// ============================================================================

#[tokio::test]
async fn test_webhook_without_secret_accepts_items() {
    let (base, orchestrator) = start_test_server(None).await;
    let (status, body) = post_json(
        &base,
        "/webhooks/generic",
        r#"{"content":"meeting notes from tuesday","source":"email"}"#,
    )
    .await;
    assert_eq!(status, 202);

    let json: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["accepted"], true);

    // The drain task indexes asynchronously; poll until it lands.
    let mut found = false;
    for _ in 0..50 {
        let stats = orchestrator.memory().get_stats().await;
        if stats.total_documents == 1 {
            found = true;
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert!(found, "webhook item never reached the memory engine");
}

#[tokio::test]
async fn test_webhook_rejects_bad_signature() {
    let (base, _) = start_test_server(Some("topsecret".into())).await;
    let body = r#"{"content":"spoofed"}"#;

    let resp = reqwest::Client::new()
        .post(format!("{base}/webhooks/generic"))
        .header("content-type", "application/json")
        .header("x-signature-256", "sha256=deadbeef")
        .body(body)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 401);

    // Missing header entirely is also rejected.
    let resp = reqwest::Client::new()
        .post(format!("{base}/webhooks/generic"))
        .header("content-type", "application/json")
        .body(body)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 401);
}

#[tokio::test]
async fn test_webhook_accepts_valid_signature() {
    let (base, _) = start_test_server(Some("topsecret".into())).await;
    let body = r#"{"content":"signed content"}"#;
    let signature = sign_body("topsecret", body.as_bytes());

    let resp = reqwest::Client::new()
        .post(format!("{base}/webhooks/generic"))
        .header("content-type", "application/json")
        .header("x-signature-256", signature)
        .body(body)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 202);
}

#[tokio::test]
async fn test_webhook_empty_content_is_400() {
    let (base, _) = start_test_server(None).await;
    let (status, _) = post_json(&base, "/webhooks/generic", r#"{"content":""}"#).await;
    assert_eq!(status, 400);

    let (status, _) = post_json(&base, "/webhooks/generic", "{oops").await;
    assert_eq!(status, 400);
}

// ============================================================================
// End-to-end: ingest then search through MCP
// ============================================================================

#[tokio::test]
async fn test_ingest_then_hybrid_search() {
    let (base, orchestrator) = start_test_server(None).await;
    for (id, content) in [
        ("doc-1", "seismic detection"),
        ("doc-2", "deep learning seismic"),
        ("doc-3", "cluster orchestration"),
    ] {
        orchestrator
            .memory()
            .index_document(secondbrain_memory::IndexRequest {
                document_id: id.into(),
                content: content.into(),
                ..Default::default()
            })
            .await
            .unwrap();
    }

    let (_, body) = post_json(
        &base,
        "/mcp",
        r#"{"jsonrpc":"2.0","id":9,"method":"tools/call","params":{"name":"hybrid","arguments":{"query":"seismic","limit":3}}}"#,
    )
    .await;
    let json: Value = serde_json::from_str(&body).unwrap();
    let text = json["result"]["content"][0]["text"].as_str().unwrap();
    assert!(text.contains("doc-1"));
    assert!(text.contains("doc-2"));

    // Sanity-check the fused scores directly too.
    let results = orchestrator
        .memory()
        .hybrid_search(&secondbrain_memory::SearchRequest::new("seismic", 3))
        .await
        .unwrap();
    assert_eq!(results[0].score, 1.0);
}
