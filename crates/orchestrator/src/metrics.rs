//! Feedback metrics and knowledge-coverage indicators.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// The type of user feedback attached to an interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackType {
    Positive,
    Negative,
    Correction,
}

/// A single interaction, captured for metrics computation.
#[derive(Debug, Clone, Default)]
pub struct InteractionRecord {
    pub session_id: String,
    /// Unix millis.
    pub timestamp: u64,
    pub query: String,
    /// [0, 1] estimated quality, seeded from context relevance.
    pub response_quality: f64,
    /// [0, 1] how relevant the retrieved context was.
    pub context_relevance: f64,
    pub feedback: Option<FeedbackType>,
    /// topic -> weight, for the coverage entropy.
    pub topic_distribution: HashMap<String, f64>,
}

/// Aggregated metrics, shaped for the `/v1/metrics` endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSummary {
    pub total_interactions: usize,
    pub avg_response_quality: f64,
    pub avg_context_relevance: f64,
    pub user_satisfaction_rate: f64,
    pub knowledge_coverage: f64,
    pub feedback_counts: HashMap<FeedbackType, usize>,
    pub topic_coverage: HashMap<String, usize>,
}

#[derive(Default)]
struct MetricsState {
    records: Vec<InteractionRecord>,
    topic_counts: HashMap<String, usize>,
    feedback_counts: HashMap<FeedbackType, usize>,
}

/// Append-only store of interaction records. Owns its own lock so stat
/// reads never contend with ingest.
#[derive(Default)]
pub struct MetricsStore {
    state: RwLock<MetricsState>,
}

impl MetricsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an interaction record.
    pub async fn record(&self, record: InteractionRecord) {
        let mut state = self.state.write().await;

        if let Some(feedback) = record.feedback {
            *state.feedback_counts.entry(feedback).or_insert(0) += 1;
        }
        for (topic, weight) in &record.topic_distribution {
            if *weight > 0.0 {
                *state.topic_counts.entry(topic.clone()).or_insert(0) += 1;
            }
        }

        state.records.push(record);
    }

    /// Snapshot of the aggregated metrics.
    pub async fn summary(&self) -> MetricsSummary {
        let state = self.state.read().await;

        let mut summary = MetricsSummary {
            total_interactions: state.records.len(),
            avg_response_quality: 0.0,
            avg_context_relevance: 0.0,
            user_satisfaction_rate: 0.0,
            knowledge_coverage: knowledge_coverage(&state.topic_counts),
            feedback_counts: state.feedback_counts.clone(),
            topic_coverage: state.topic_counts.clone(),
        };

        if !state.records.is_empty() {
            let n = state.records.len() as f64;
            summary.avg_response_quality =
                state.records.iter().map(|r| r.response_quality).sum::<f64>() / n;
            summary.avg_context_relevance =
                state.records.iter().map(|r| r.context_relevance).sum::<f64>() / n;
        }

        let positives = state
            .feedback_counts
            .get(&FeedbackType::Positive)
            .copied()
            .unwrap_or(0);
        let total_feedback: usize = state.feedback_counts.values().sum();
        if total_feedback > 0 {
            summary.user_satisfaction_rate = positives as f64 / total_feedback as f64;
        }

        summary
    }

    /// Average response quality over the last `n` interactions.
    pub async fn recent_quality_trend(&self, n: usize) -> f64 {
        let state = self.state.read().await;
        if state.records.is_empty() {
            return 0.0;
        }

        let start = state.records.len().saturating_sub(n);
        let window = &state.records[start..];
        window.iter().map(|r| r.response_quality).sum::<f64>() / window.len() as f64
    }
}

/// Normalized Shannon entropy of the topic count distribution:
/// `-Σ p_i log2(p_i) / log2(N)`. Close to 1 means broad, even coverage;
/// close to 0 means the system is concentrated on a few topics, the
/// signature of a degenerate feedback loop. 0 when N <= 1.
fn knowledge_coverage(topic_counts: &HashMap<String, usize>) -> f64 {
    let n = topic_counts.len();
    if n <= 1 {
        return 0.0;
    }

    let total: usize = topic_counts.values().sum();
    if total == 0 {
        return 0.0;
    }

    let total_f = total as f64;
    let entropy: f64 = topic_counts
        .values()
        .filter(|&&count| count > 0)
        .map(|&count| {
            let p = count as f64 / total_f;
            -p * p.log2()
        })
        .sum();

    entropy / (n as f64).log2()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feedback_record(feedback: FeedbackType) -> InteractionRecord {
        InteractionRecord {
            session_id: "s".into(),
            feedback: Some(feedback),
            ..Default::default()
        }
    }

    fn topic_record(topics: &[&str]) -> InteractionRecord {
        InteractionRecord {
            session_id: "s".into(),
            topic_distribution: topics.iter().map(|t| (t.to_string(), 1.0)).collect(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn satisfaction_rate_is_positive_share_of_all_feedback() {
        let store = MetricsStore::new();
        for _ in 0..3 {
            store.record(feedback_record(FeedbackType::Negative)).await;
        }
        for _ in 0..7 {
            store.record(feedback_record(FeedbackType::Positive)).await;
        }

        let summary = store.summary().await;
        assert!((summary.user_satisfaction_rate - 0.7).abs() < 1e-9);
        assert_eq!(summary.feedback_counts[&FeedbackType::Positive], 7);
        assert_eq!(summary.feedback_counts[&FeedbackType::Negative], 3);
    }

    #[tokio::test]
    async fn corrections_count_against_satisfaction() {
        let store = MetricsStore::new();
        store.record(feedback_record(FeedbackType::Positive)).await;
        store.record(feedback_record(FeedbackType::Correction)).await;

        let summary = store.summary().await;
        assert!((summary.user_satisfaction_rate - 0.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn satisfaction_is_zero_without_feedback() {
        let store = MetricsStore::new();
        store
            .record(InteractionRecord {
                session_id: "s".into(),
                query: "q".into(),
                ..Default::default()
            })
            .await;
        assert_eq!(store.summary().await.user_satisfaction_rate, 0.0);
    }

    #[tokio::test]
    async fn averages_cover_all_records() {
        let store = MetricsStore::new();
        store
            .record(InteractionRecord {
                response_quality: 0.8,
                context_relevance: 0.6,
                ..Default::default()
            })
            .await;
        store
            .record(InteractionRecord {
                response_quality: 0.4,
                context_relevance: 0.2,
                ..Default::default()
            })
            .await;

        let summary = store.summary().await;
        assert!((summary.avg_response_quality - 0.6).abs() < 1e-9);
        assert!((summary.avg_context_relevance - 0.4).abs() < 1e-9);
        assert_eq!(summary.total_interactions, 2);
    }

    #[tokio::test]
    async fn coverage_is_zero_for_single_topic() {
        let store = MetricsStore::new();
        store.record(topic_record(&["rust"])).await;
        store.record(topic_record(&["rust"])).await;
        assert_eq!(store.summary().await.knowledge_coverage, 0.0);
    }

    #[tokio::test]
    async fn coverage_is_one_for_uniform_topics() {
        let store = MetricsStore::new();
        store.record(topic_record(&["rust"])).await;
        store.record(topic_record(&["go"])).await;
        store.record(topic_record(&["zig"])).await;
        store.record(topic_record(&["ml"])).await;

        let summary = store.summary().await;
        assert!((summary.knowledge_coverage - 1.0).abs() < 1e-9);
        assert_eq!(summary.topic_coverage.len(), 4);
    }

    #[tokio::test]
    async fn skewed_topics_lower_coverage() {
        let store = MetricsStore::new();
        for _ in 0..9 {
            store.record(topic_record(&["rust"])).await;
        }
        store.record(topic_record(&["go"])).await;

        let coverage = store.summary().await.knowledge_coverage;
        assert!(coverage > 0.0 && coverage < 1.0);
    }

    #[tokio::test]
    async fn recent_trend_windows_the_tail() {
        let store = MetricsStore::new();
        for quality in [0.0, 0.0, 1.0, 1.0] {
            store
                .record(InteractionRecord {
                    response_quality: quality,
                    ..Default::default()
                })
                .await;
        }

        assert!((store.recent_quality_trend(2).await - 1.0).abs() < 1e-9);
        assert!((store.recent_quality_trend(100).await - 0.5).abs() < 1e-9);
        let empty = MetricsStore::new();
        assert_eq!(empty.recent_quality_trend(5).await, 0.0);
    }

    #[tokio::test]
    async fn summary_serializes_with_wire_field_names() {
        let store = MetricsStore::new();
        store.record(feedback_record(FeedbackType::Positive)).await;
        let summary = store.summary().await;
        let json = serde_json::to_value(&summary).unwrap();

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
        assert_eq!(json["feedback_counts"]["positive"], 1);
    }
}
