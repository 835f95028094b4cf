//! In-memory vector index with brute-force cosine search.

use crate::types::{VectorHit, VectorRecord};
use async_trait::async_trait;
use secondbrain_common::Result;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Storage backend for embedding vectors.
///
/// Implementations must be safe for concurrent readers with serialized
/// writers; none of the operations may suspend while holding a lock.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Add or replace records by id within a collection. Idempotent.
    async fn upsert(&self, collection: &str, records: Vec<VectorRecord>) -> Result<()>;

    /// Top-k cosine search over records whose payload matches every filter
    /// entry. Unknown collections yield an empty result.
    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        top_k: usize,
        filters: &HashMap<String, String>,
    ) -> Result<Vec<VectorHit>>;

    /// Remove records; returns how many ids were actually present.
    async fn delete(&self, collection: &str, ids: &[String]) -> Result<usize>;

    /// Number of records in a collection.
    async fn count(&self, collection: &str) -> usize;
}

/// Brute-force in-memory store: no persistence, exact cosine scan per
/// query.
#[derive(Default)]
pub struct InMemoryVectorStore {
    collections: RwLock<HashMap<String, HashMap<String, VectorRecord>>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn upsert(&self, collection: &str, records: Vec<VectorRecord>) -> Result<()> {
        let mut collections = self.collections.write().await;
        let coll = collections.entry(collection.to_string()).or_default();
        for record in records {
            coll.insert(record.id.clone(), record);
        }
        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        top_k: usize,
        filters: &HashMap<String, String>,
    ) -> Result<Vec<VectorHit>> {
        let collections = self.collections.read().await;
        let Some(coll) = collections.get(collection) else {
            return Ok(Vec::new());
        };

        let mut hits: Vec<VectorHit> = coll
            .values()
            .filter(|record| matches_filters(&record.payload, filters))
            .map(|record| VectorHit {
                id: record.id.clone(),
                score: cosine_similarity(vector, &record.vector),
                payload: record.payload.clone(),
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        hits.truncate(top_k);
        Ok(hits)
    }

    async fn delete(&self, collection: &str, ids: &[String]) -> Result<usize> {
        let mut collections = self.collections.write().await;
        let Some(coll) = collections.get_mut(collection) else {
            return Ok(0);
        };

        let mut deleted = 0;
        for id in ids {
            if coll.remove(id).is_some() {
                deleted += 1;
            }
        }
        Ok(deleted)
    }

    async fn count(&self, collection: &str) -> usize {
        self.collections
            .read()
            .await
            .get(collection)
            .map_or(0, |coll| coll.len())
    }
}

fn matches_filters(payload: &HashMap<String, String>, filters: &HashMap<String, String>) -> bool {
    filters
        .iter()
        .all(|(k, v)| payload.get(k).is_some_and(|pv| pv == v))
}

/// Cosine similarity of two vectors. Mismatched dimensions and zero-norm
/// vectors score 0 rather than erroring.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let mut dot = 0f64;
    let mut norm_a = 0f64;
    let mut norm_b = 0f64;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += f64::from(*x) * f64::from(*y);
        norm_a += f64::from(*x) * f64::from(*x);
        norm_b += f64::from(*y) * f64::from(*y);
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        return 0.0;
    }

    (dot / denom) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, vector: Vec<f32>, pairs: &[(&str, &str)]) -> VectorRecord {
        VectorRecord {
            id: id.to_string(),
            vector,
            payload: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    #[test]
    fn cosine_basic_cases() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[0.0, 0.0]), 0.0);
        // Mismatched dimensions score 0 instead of erroring.
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
    }

    #[tokio::test]
    async fn upsert_replaces_by_id() {
        let store = InMemoryVectorStore::new();
        store
            .upsert("c", vec![record("a", vec![1.0, 0.0], &[])])
            .await
            .unwrap();
        store
            .upsert("c", vec![record("a", vec![0.0, 1.0], &[])])
            .await
            .unwrap();

        assert_eq!(store.count("c").await, 1);
        let hits = store
            .search("c", &[0.0, 1.0], 10, &HashMap::new())
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert!((hits[0].score - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn search_ranks_by_similarity() {
        let store = InMemoryVectorStore::new();
        store
            .upsert(
                "c",
                vec![
                    record("close", vec![1.0, 0.1], &[]),
                    record("far", vec![0.0, 1.0], &[]),
                ],
            )
            .await
            .unwrap();

        let hits = store
            .search("c", &[1.0, 0.0], 2, &HashMap::new())
            .await
            .unwrap();
        assert_eq!(hits[0].id, "close");
        assert_eq!(hits[1].id, "far");
    }

    #[tokio::test]
    async fn search_applies_equality_filters() {
        let store = InMemoryVectorStore::new();
        store
            .upsert(
                "c",
                vec![
                    record("a", vec![1.0, 0.0], &[("source", "email")]),
                    record("b", vec![1.0, 0.0], &[("source", "slack")]),
                ],
            )
            .await
            .unwrap();

        let mut filters = HashMap::new();
        filters.insert("source".to_string(), "email".to_string());
        let hits = store.search("c", &[1.0, 0.0], 10, &filters).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "a");
    }

    #[tokio::test]
    async fn unknown_collection_is_empty() {
        let store = InMemoryVectorStore::new();
        let hits = store
            .search("missing", &[1.0], 5, &HashMap::new())
            .await
            .unwrap();
        assert!(hits.is_empty());
        assert_eq!(store.count("missing").await, 0);
    }

    #[tokio::test]
    async fn delete_reports_removed_count() {
        let store = InMemoryVectorStore::new();
        store
            .upsert(
                "c",
                vec![
                    record("a", vec![1.0], &[]),
                    record("b", vec![1.0], &[]),
                ],
            )
            .await
            .unwrap();

        let deleted = store
            .delete("c", &["a".to_string(), "ghost".to_string()])
            .await
            .unwrap();
        assert_eq!(deleted, 1);
        assert_eq!(store.count("c").await, 1);
    }

    #[tokio::test]
    async fn collections_do_not_interfere() {
        let store = InMemoryVectorStore::new();
        store
            .upsert("one", vec![record("a", vec![1.0], &[])])
            .await
            .unwrap();
        store
            .upsert("two", vec![record("a", vec![1.0], &[])])
            .await
            .unwrap();

        store.delete("one", &["a".to_string()]).await.unwrap();
        assert_eq!(store.count("one").await, 0);
        assert_eq!(store.count("two").await, 1);
    }
}
