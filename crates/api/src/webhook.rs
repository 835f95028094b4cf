//! Webhook intake with HMAC-SHA256 signature verification.
//!
//! The body is captured once as raw bytes; the signature is computed over
//! exactly those bytes before any parsing happens. Accepted items land on
//! the bounded ingestion channel; overflow drops the item with a warning.

use crate::state::AppState;
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use hmac::{Hmac, Mac};
use secondbrain_common::{InboxItem, IngestResponse};
use serde::Deserialize;
use serde_json::json;
use sha2::Sha256;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{info, warn};

type HmacSha256 = Hmac<Sha256>;

const SIGNATURE_HEADER: &str = "x-signature-256";

#[derive(Debug, Deserialize)]
struct GenericPayload {
    content: String,
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    source_id: Option<String>,
    #[serde(default)]
    metadata: Option<HashMap<String, String>>,
}

fn error_body(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

/// `POST /webhooks/generic`
pub async fn handle_generic(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Some(ref secret) = state.webhook_secret {
        if !verify_signature(secret, &body, &headers) {
            warn!("webhook signature verification failed");
            return error_body(StatusCode::UNAUTHORIZED, "invalid signature");
        }
    }

    let payload: GenericPayload = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => return error_body(StatusCode::BAD_REQUEST, &format!("invalid payload: {e}")),
    };

    if payload.content.is_empty() {
        return error_body(StatusCode::BAD_REQUEST, "content is required");
    }

    let mut item = InboxItem::new(
        payload.source.unwrap_or_else(|| "generic".to_string()),
        payload.content,
    );
    if let Some(source_id) = payload.source_id {
        item = item.with_source_id(source_id);
    }
    if let Some(metadata) = payload.metadata {
        item = item.with_metadata(metadata);
    }

    let item_id = item.id.clone();
    match state.ingest_tx.try_send(item) {
        Ok(()) => {
            info!(item_id = %item_id, "webhook item queued");
            (
                StatusCode::ACCEPTED,
                Json(IngestResponse {
                    item_id,
                    accepted: true,
                    message: "Item accepted for processing".into(),
                }),
            )
                .into_response()
        }
        Err(TrySendError::Full(_)) => {
            warn!(item_id = %item_id, "ingestion queue full, dropping item");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(IngestResponse {
                    item_id,
                    accepted: false,
                    message: "ingestion queue full".into(),
                }),
            )
                .into_response()
        }
        Err(TrySendError::Closed(_)) => {
            error_body(StatusCode::INTERNAL_SERVER_ERROR, "ingestion channel closed")
        }
    }
}

/// Check `X-Signature-256: sha256=<hex>` against an HMAC-SHA256 of the
/// body bytes. `Mac::verify_slice` compares in constant time.
fn verify_signature(secret: &str, body: &[u8], headers: &HeaderMap) -> bool {
    let Some(header) = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok()) else {
        return false;
    };
    let Some(signature_hex) = header.strip_prefix("sha256=") else {
        return false;
    };
    let Ok(signature) = hex::decode(signature_hex) else {
        return false;
    };

    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&signature).is_ok()
}

/// Compute the signature header value for a body. Used by tests and
/// outbound deliveries.
pub fn sign_body(secret: &str, body: &[u8]) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(body);
    format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
}
