//! Embedding generation for vector search.
//!
//! The embedder is an external collaborator: the engine only depends on
//! the [`Embedder`] trait. [`MockEmbedder`] provides deterministic vectors
//! for development and tests; [`HttpEmbedder`] calls an OpenAI-compatible
//! `/v1/embeddings` endpoint.

use async_trait::async_trait;
use secondbrain_common::{BrainError, Result};
use serde::{Deserialize, Serialize};

/// Generates vector embeddings from text. Vectors are expected to be
/// L2-normalized; cosine scoring tolerates deviations.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a batch of texts, one vector per input, in order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embedding vector width.
    fn dimension(&self) -> usize;
}

/// Deterministic hash-seeded embedder: the same text always maps to the
/// same L2-normalized vector, so similarity tests are reproducible without
/// a model.
pub struct MockEmbedder {
    dimension: usize,
    seed: u64,
}

impl MockEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension, seed: 42 }
    }

    fn embed_single(&self, text: &str) -> Vec<f32> {
        let mut state = self.seed;
        for b in text.bytes() {
            state = state.wrapping_mul(31).wrapping_add(u64::from(b));
        }

        let mut vector = Vec::with_capacity(self.dimension);
        let mut norm = 0f64;
        for _ in 0..self.dimension {
            let value = splitmix64(&mut state) as f64 / u64::MAX as f64 * 2.0 - 1.0;
            norm += value * value;
            vector.push(value as f32);
        }

        let norm = norm.sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v = (f64::from(*v) / norm) as f32;
            }
        }
        vector
    }
}

/// splitmix64 step; enough randomness for synthetic vectors without
/// pulling in a rand crate.
fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9E37_79B9_7F4A_7C15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

#[async_trait]
impl Embedder for MockEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_single(t)).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

#[derive(Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

/// Embedder backed by an OpenAI-compatible `/v1/embeddings` endpoint.
pub struct HttpEmbedder {
    base_url: String,
    model: String,
    api_key: Option<String>,
    dimension: usize,
    http_client: reqwest::Client,
}

impl HttpEmbedder {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
        dimension: usize,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            model: model.into(),
            api_key,
            dimension,
            http_client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/v1/embeddings", self.base_url);
        let body = EmbeddingsRequest {
            model: &self.model,
            input: texts,
        };

        let mut http_req = self.http_client.post(&url).json(&body);
        if let Some(ref key) = self.api_key {
            http_req = http_req.bearer_auth(key);
        }

        let response = http_req
            .send()
            .await
            .map_err(|e| BrainError::Internal(format!("embeddings request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(BrainError::Internal(format!(
                "embeddings API error {status}: {body_text}"
            )));
        }

        let parsed: EmbeddingsResponse = response
            .json()
            .await
            .map_err(|e| BrainError::Internal(format!("failed to parse embeddings response: {e}")))?;

        if parsed.data.len() != texts.len() {
            return Err(BrainError::Internal(format!(
                "embeddings response has {} vectors for {} inputs",
                parsed.data.len(),
                texts.len()
            )));
        }

        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_embedder_is_deterministic() {
        let embedder = MockEmbedder::new(64);
        let a = embedder.embed(&["hello world".to_string()]).await.unwrap();
        let b = embedder.embed(&["hello world".to_string()]).await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn mock_embedder_distinguishes_texts() {
        let embedder = MockEmbedder::new(64);
        let vectors = embedder
            .embed(&["alpha".to_string(), "omega".to_string()])
            .await
            .unwrap();
        assert_ne!(vectors[0], vectors[1]);
    }

    #[tokio::test]
    async fn mock_vectors_are_normalized() {
        let embedder = MockEmbedder::new(128);
        let vectors = embedder.embed(&["some text".to_string()]).await.unwrap();
        assert_eq!(vectors[0].len(), 128);
        let norm: f64 = vectors[0].iter().map(|v| f64::from(*v) * f64::from(*v)).sum();
        assert!((norm.sqrt() - 1.0).abs() < 1e-4);
    }

    #[test]
    fn embeddings_request_shape() {
        let input = vec!["a".to_string(), "b".to_string()];
        let body = EmbeddingsRequest {
            model: "text-embedding-3-small",
            input: &input,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["model"], "text-embedding-3-small");
        assert_eq!(json["input"].as_array().unwrap().len(), 2);
    }
}
