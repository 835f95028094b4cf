//! In-memory BM25 full-text index.

use std::collections::HashMap;
use tokio::sync::RwLock;

const K1: f64 = 1.2;
const B: f64 = 0.75;

/// A full-text search hit. Scores are max-normalized to [0, 1]: the top
/// hit of a non-empty result always scores 1.0.
#[derive(Debug, Clone)]
pub struct TextHit {
    pub id: String,
    pub score: f64,
    pub content: String,
    pub metadata: HashMap<String, String>,
}

struct IndexedDoc {
    content: String,
    metadata: HashMap<String, String>,
    /// term -> frequency
    terms: HashMap<String, usize>,
    /// total token count
    length: usize,
}

/// BM25 index keyed by `(collection, document_id)`.
#[derive(Default)]
pub struct TextIndex {
    collections: RwLock<HashMap<String, HashMap<String, IndexedDoc>>>,
}

impl TextIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index a document for full-text search within a collection,
    /// replacing any previous content under the same id.
    pub async fn add(
        &self,
        collection: &str,
        id: &str,
        content: &str,
        metadata: HashMap<String, String>,
    ) {
        let terms = tokenize(content);
        let freq = term_frequency(&terms);

        let mut collections = self.collections.write().await;
        collections.entry(collection.to_string()).or_default().insert(
            id.to_string(),
            IndexedDoc {
                content: content.to_string(),
                metadata,
                length: terms.len(),
                terms: freq,
            },
        );
    }

    /// Remove a document; returns whether it was present.
    pub async fn delete(&self, collection: &str, id: &str) -> bool {
        let mut collections = self.collections.write().await;
        collections
            .get_mut(collection)
            .is_some_and(|coll| coll.remove(id).is_some())
    }

    /// BM25-ranked search within a collection. Empty queries yield an
    /// empty result without error.
    pub async fn search(
        &self,
        collection: &str,
        query: &str,
        top_k: usize,
        filters: &HashMap<String, String>,
    ) -> Vec<TextHit> {
        let query_terms = tokenize(query);
        if query_terms.is_empty() {
            return Vec::new();
        }

        let collections = self.collections.read().await;
        let Some(coll) = collections.get(collection) else {
            return Vec::new();
        };
        if coll.is_empty() {
            return Vec::new();
        }

        let n = coll.len() as f64;
        let avg_dl = coll.values().map(|d| d.length).sum::<usize>() as f64 / n;

        // IDF per query term: ln((N - df + 0.5) / (df + 0.5) + 1)
        let mut idf = HashMap::new();
        for term in &query_terms {
            let df = coll.values().filter(|d| d.terms.contains_key(term)).count() as f64;
            idf.insert(term.clone(), ((n - df + 0.5) / (df + 0.5) + 1.0).ln());
        }

        let mut scored: Vec<(&String, &IndexedDoc, f64)> = Vec::new();
        for (id, doc) in coll {
            if !matches_filters(&doc.metadata, filters) {
                continue;
            }

            let dl = doc.length as f64;
            let mut score = 0.0;
            for term in &query_terms {
                let tf = doc.terms.get(term).copied().unwrap_or(0) as f64;
                let num = tf * (K1 + 1.0);
                let denom = tf + K1 * (1.0 - B + B * dl / avg_dl);
                score += idf[term] * num / denom;
            }

            if score > 0.0 {
                scored.push((id, doc, score));
            }
        }

        scored.sort_by(|a, b| {
            b.2.partial_cmp(&a.2)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(b.0))
        });
        scored.truncate(top_k);

        let max_score = scored.first().map_or(0.0, |(_, _, s)| *s);
        scored
            .into_iter()
            .map(|(id, doc, score)| TextHit {
                id: id.clone(),
                score: if max_score > 0.0 { score / max_score } else { score },
                content: doc.content.clone(),
                metadata: doc.metadata.clone(),
            })
            .collect()
    }

    /// Number of documents in a collection.
    pub async fn count(&self, collection: &str) -> usize {
        self.collections
            .read()
            .await
            .get(collection)
            .map_or(0, |coll| coll.len())
    }
}

fn matches_filters(metadata: &HashMap<String, String>, filters: &HashMap<String, String>) -> bool {
    filters
        .iter()
        .all(|(k, v)| metadata.get(k).is_some_and(|mv| mv == v))
}

/// Lowercase and split on anything outside `[a-z0-9]`. No stemming, no
/// stopwords.
fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_ascii_lowercase() && !c.is_ascii_digit())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn term_frequency(terms: &[String]) -> HashMap<String, usize> {
    let mut freq = HashMap::new();
    for t in terms {
        *freq.entry(t.clone()).or_insert(0) += 1;
    }
    freq
}
