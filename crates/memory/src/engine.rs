//! The memory engine: indexing and the four retrieval modes.

use crate::chunker::{self, Chunk};
use crate::config::MemoryConfig;
use crate::embedder::Embedder;
use crate::graph::{Edge, KnowledgeGraph, Node, Triple};
use crate::hybrid::{self, RankedResult};
use crate::text::TextIndex;
use crate::types::{
    DeleteOutcome, IndexOutcome, IndexRequest, MemoryStats, SearchRequest, SearchResult,
    VectorRecord,
};
use crate::vector::VectorStore;
use secondbrain_common::{now_millis, BrainError, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

/// Collection-scoped retrieval engine over a vector index, a BM25 text
/// index, and a knowledge graph.
pub struct MemoryEngine {
    config: MemoryConfig,
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    text_index: TextIndex,
    graph: KnowledgeGraph,
    /// document_id -> chunk ids currently in the vector index
    doc_chunks: RwLock<HashMap<String, Vec<String>>>,
    last_indexed_at: RwLock<Option<u64>>,
}

impl MemoryEngine {
    pub fn new(
        config: MemoryConfig,
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn Embedder>,
    ) -> Self {
        Self {
            config,
            store,
            embedder,
            text_index: TextIndex::new(),
            graph: KnowledgeGraph::new(),
            doc_chunks: RwLock::new(HashMap::new()),
            last_indexed_at: RwLock::new(None),
        }
    }

    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    /// Index a document: chunk, embed in one batch, upsert into the
    /// vector index, then add to the text index. Rejections are reported
    /// in the outcome, not as errors; nothing is recorded unless the
    /// vector upsert succeeds.
    pub async fn index_document(&self, request: IndexRequest) -> Result<IndexOutcome> {
        let document_id = if request.document_id.is_empty() {
            Uuid::new_v4().to_string()
        } else {
            request.document_id.clone()
        };

        if request.content.is_empty() {
            return Ok(IndexOutcome::failure(document_id, "content is empty"));
        }

        let chunks = match self.chunk_document(&document_id, &request) {
            Ok(chunks) => chunks,
            Err(e) => return Ok(IndexOutcome::failure(document_id, e.to_string())),
        };
        if chunks.is_empty() {
            return Ok(IndexOutcome::failure(document_id, "no chunks generated"));
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let embeddings = match self.embedder.embed(&texts).await {
            Ok(embeddings) => embeddings,
            Err(e) => {
                return Ok(IndexOutcome::failure(
                    document_id,
                    format!("embedding error: {e}"),
                ))
            }
        };

        let mut records = Vec::with_capacity(chunks.len());
        let mut chunk_ids = Vec::with_capacity(chunks.len());
        for (chunk, vector) in chunks.iter().zip(embeddings) {
            let mut payload = chunk.metadata.clone();
            payload.insert("content".to_string(), chunk.content.clone());
            payload.insert("document_id".to_string(), document_id.clone());

            chunk_ids.push(chunk.id.clone());
            records.push(VectorRecord {
                id: chunk.id.clone(),
                vector,
                payload,
            });
        }

        if let Err(e) = self
            .store
            .upsert(&self.config.collection_name, records)
            .await
        {
            return Ok(IndexOutcome::failure(
                document_id,
                format!("vector store error: {e}"),
            ));
        }

        // Replacing a document drops the chunks of its previous version.
        let stale_chunks = self
            .doc_chunks
            .write()
            .await
            .insert(document_id.clone(), chunk_ids);
        *self.last_indexed_at.write().await = Some(now_millis());
        if let Some(stale) = stale_chunks {
            self.store
                .delete(&self.config.collection_name, &stale)
                .await?;
        }

        self.text_index
            .add(
                &self.config.collection_name,
                &document_id,
                &request.content,
                request.metadata.clone(),
            )
            .await;

        info!(document_id = %document_id, chunks = chunks.len(), "indexed document");

        Ok(IndexOutcome {
            document_id,
            chunks_created: chunks.len(),
            success: true,
            error_message: None,
        })
    }

    fn chunk_document(&self, document_id: &str, request: &IndexRequest) -> Result<Vec<Chunk>> {
        let strategy = chunker::strategy_for(
            request.strategy,
            self.config.chunk_size,
            self.config.chunk_overlap,
        )?;

        let mut metadata = request.metadata.clone();
        metadata.insert("document_id".to_string(), document_id.to_string());

        Ok(strategy.chunk(document_id, &request.content, &metadata))
    }

    /// Remove a document's chunks from the vector index and its entry
    /// from the text index. Unknown ids succeed with zero deletions.
    pub async fn delete_document(&self, document_id: &str) -> Result<DeleteOutcome> {
        let chunk_ids = self.doc_chunks.write().await.remove(document_id);

        let mut deleted = 0;
        if let Some(chunk_ids) = chunk_ids {
            deleted = self
                .store
                .delete(&self.config.collection_name, &chunk_ids)
                .await?;
        }

        self.text_index
            .delete(&self.config.collection_name, document_id)
            .await;

        debug!(document_id = %document_id, chunks_deleted = deleted, "deleted document");

        Ok(DeleteOutcome {
            success: true,
            chunks_deleted: deleted,
        })
    }

    /// Embedding-based similarity search over chunks.
    pub async fn semantic_search(&self, request: &SearchRequest) -> Result<Vec<SearchResult>> {
        if request.query.is_empty() {
            return Err(BrainError::InvalidArgument("query is required".into()));
        }

        let embeddings = self.embedder.embed(std::slice::from_ref(&request.query)).await?;
        let hits = self
            .store
            .search(
                &self.config.collection_name,
                &embeddings[0],
                request.effective_top_k(),
                &request.filters,
            )
            .await?;

        Ok(hits
            .into_iter()
            .filter(|hit| request.min_score <= 0.0 || hit.score >= request.min_score)
            .map(|hit| SearchResult {
                chunk_id: hit.id,
                document_id: hit.payload.get("document_id").cloned().unwrap_or_default(),
                content: hit.payload.get("content").cloned().unwrap_or_default(),
                score: hit.score,
                metadata: hit.payload,
            })
            .collect())
    }

    /// BM25 full-text search over whole documents.
    pub async fn full_text_search(&self, request: &SearchRequest) -> Result<Vec<SearchResult>> {
        if request.query.is_empty() {
            return Err(BrainError::InvalidArgument("query is required".into()));
        }

        let hits = self
            .text_index
            .search(
                &self.config.collection_name,
                &request.query,
                request.effective_top_k(),
                &request.filters,
            )
            .await;

        Ok(hits
            .into_iter()
            .filter(|hit| request.min_score <= 0.0 || hit.score as f32 >= request.min_score)
            .map(|hit| SearchResult {
                chunk_id: String::new(),
                document_id: hit.id,
                content: hit.content,
                score: hit.score as f32,
                metadata: hit.metadata,
            })
            .collect())
    }

    /// Hybrid search: BM25 and vector lists fetched at `top_k * 2`, fused
    /// with weighted RRF plus top-rank bonuses, max-normalized, truncated.
    ///
    /// Vector hits are projected onto their parent document via the
    /// payload's `document_id`, so chunk-level vectors collapse into
    /// document-level entries of the fused ranking; only the rank reaches
    /// the fusion stage.
    pub async fn hybrid_search(&self, request: &SearchRequest) -> Result<Vec<SearchResult>> {
        if request.query.is_empty() {
            return Err(BrainError::InvalidArgument("query is required".into()));
        }

        let top_k = request.effective_top_k();
        let fetch_k = top_k * 2;

        let fts_hits = self
            .text_index
            .search(
                &self.config.collection_name,
                &request.query,
                fetch_k,
                &request.filters,
            )
            .await;
        let fts_list: Vec<RankedResult> = fts_hits
            .into_iter()
            .map(|hit| RankedResult {
                id: hit.id,
                score: hit.score,
                content: hit.content,
                metadata: hit.metadata,
            })
            .collect();

        let embeddings = self.embedder.embed(std::slice::from_ref(&request.query)).await?;
        let vec_hits = self
            .store
            .search(
                &self.config.collection_name,
                &embeddings[0],
                fetch_k,
                &request.filters,
            )
            .await?;
        let vec_list: Vec<RankedResult> = vec_hits
            .into_iter()
            .map(|hit| RankedResult {
                id: hit.payload.get("document_id").cloned().unwrap_or_default(),
                score: f64::from(hit.score),
                content: hit.payload.get("content").cloned().unwrap_or_default(),
                metadata: hit.payload,
            })
            .collect();

        let hybrid_cfg = &self.config.hybrid;
        let fused = hybrid::reciprocal_rank_fusion(
            &[fts_list, vec_list],
            &hybrid_cfg.weights,
            hybrid_cfg.rrf_k,
            hybrid_cfg.top_rank_bonus,
            hybrid_cfg.near_top_bonus,
        );

        let mut fused = hybrid::normalize_scores(fused);
        fused.truncate(top_k);

        Ok(fused
            .into_iter()
            .filter(|r| request.min_score <= 0.0 || r.score as f32 >= request.min_score)
            .map(|r| SearchResult {
                chunk_id: String::new(),
                document_id: r.id,
                content: r.content,
                score: r.score as f32,
                metadata: r.metadata,
            })
            .collect())
    }

    /// Append a triple to the knowledge graph.
    pub async fn add_graph_triple(
        &self,
        subject: &str,
        predicate: &str,
        object: &str,
        metadata: HashMap<String, String>,
    ) -> Result<String> {
        if subject.is_empty() || predicate.is_empty() || object.is_empty() {
            return Err(BrainError::InvalidArgument(
                "subject, predicate, and object are required".into(),
            ));
        }

        Ok(self
            .graph
            .add_triple(Triple {
                subject: subject.to_string(),
                predicate: predicate.to_string(),
                object: object.to_string(),
                metadata,
            })
            .await)
    }

    /// BFS neighborhood query. `max_hops <= 0` defaults to 2.
    pub async fn query_graph(
        &self,
        entity: &str,
        max_hops: i32,
        relationship_filter: &str,
    ) -> Result<(Vec<Node>, Vec<Edge>)> {
        if entity.is_empty() {
            return Err(BrainError::InvalidArgument("entity is required".into()));
        }

        let max_hops = if max_hops <= 0 { 2 } else { max_hops as usize };
        Ok(self.graph.query(entity, max_hops, relationship_filter).await)
    }

    /// Index health counters. Stats keep their own locks, so reads do not
    /// contend with ingest.
    pub async fn get_stats(&self) -> MemoryStats {
        let total_documents = self.doc_chunks.read().await.len();
        let last_indexed_at = *self.last_indexed_at.read().await;
        let total_chunks = self.store.count(&self.config.collection_name).await;
        let total_graph_triples = self.graph.triples_count().await;

        MemoryStats {
            total_documents,
            total_chunks,
            total_graph_triples,
            last_indexed_at,
        }
    }
}
