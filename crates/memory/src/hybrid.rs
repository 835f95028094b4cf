//! Rank fusion for hybrid search.
//!
//! Combines independently ranked result lists (BM25, vector) with weighted
//! Reciprocal Rank Fusion: `score(d) = Σ weight_i / (k + rank_i(d))` with
//! 1-based ranks, plus a per-list top-rank bonus. RRF operates on ranks
//! rather than raw scores, so the component scores never need to be
//! commensurable.

use std::collections::HashMap;

/// A search result from any ranking backend, projected to a uniform shape.
#[derive(Debug, Clone)]
pub struct RankedResult {
    pub id: String,
    pub score: f64,
    pub content: String,
    pub metadata: HashMap<String, String>,
}

struct FusedDoc {
    score: f64,
    content: String,
    metadata: HashMap<String, String>,
    /// best (lowest) 1-based rank seen across lists
    best_rank: usize,
}

/// Fuse ranked lists with weighted RRF and per-list top-rank bonuses.
///
/// `weights` pairs with `lists` positionally; missing entries default to
/// 1.0. `k` falls back to 60 when non-positive. The rank-1 document of
/// each list gains `top_rank_bonus`, ranks 2-3 gain `near_top_bonus`; the
/// bonuses are additive across lists, so a document ranked first in every
/// list collects the bonus once per list. Content and metadata are taken
/// from the best-ranked occurrence.
pub fn reciprocal_rank_fusion(
    lists: &[Vec<RankedResult>],
    weights: &[f64],
    k: f64,
    top_rank_bonus: f64,
    near_top_bonus: f64,
) -> Vec<RankedResult> {
    let k = if k <= 0.0 { 60.0 } else { k };

    let mut docs: HashMap<String, FusedDoc> = HashMap::new();

    for (list_idx, list) in lists.iter().enumerate() {
        let weight = weights.get(list_idx).copied().unwrap_or(1.0);

        for (rank0, result) in list.iter().enumerate() {
            let rank = rank0 + 1;
            let rrf_score = weight / (k + rank as f64);

            docs.entry(result.id.clone())
                .and_modify(|doc| {
                    doc.score += rrf_score;
                    if rank < doc.best_rank {
                        doc.best_rank = rank;
                        doc.content = result.content.clone();
                        doc.metadata = result.metadata.clone();
                    }
                })
                .or_insert_with(|| FusedDoc {
                    score: rrf_score,
                    content: result.content.clone(),
                    metadata: result.metadata.clone(),
                    best_rank: rank,
                });
        }
    }

    // Top-rank bonus, per list: consensus at the head of any component
    // ranking outweighs long-tail noise.
    for list in lists {
        for (rank0, result) in list.iter().enumerate() {
            if let Some(doc) = docs.get_mut(&result.id) {
                match rank0 {
                    0 => doc.score += top_rank_bonus,
                    1 | 2 => doc.score += near_top_bonus,
                    _ => {}
                }
            }
        }
    }

    let mut results: Vec<RankedResult> = docs
        .into_iter()
        .map(|(id, doc)| RankedResult {
            id,
            score: doc.score,
            content: doc.content,
            metadata: doc.metadata,
        })
        .collect();

    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });

    results
}

/// Max-normalize scores to [0, 1]; the top result of a non-empty list
/// ends up at 1.0. Lists whose maximum is non-positive pass through.
pub fn normalize_scores(mut results: Vec<RankedResult>) -> Vec<RankedResult> {
    let max_score = results
        .iter()
        .map(|r| r.score)
        .fold(f64::NEG_INFINITY, f64::max);

    if max_score <= 0.0 {
        return results;
    }

    for result in &mut results {
        result.score /= max_score;
    }
    results
}
