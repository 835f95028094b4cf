//! The orchestrator: stream handling, context enrichment, and proxying.

use crate::metrics::{FeedbackType, InteractionRecord, MetricsStore};
use crate::session::{Session, SessionManager};
use async_trait::async_trait;
use secondbrain_common::{
    now_millis, AgentInput, AgentOutput, BrainError, Classification, ClassifyRequest,
    ClassifyResponse, ContextSnapshot, InboxItem, IngestResponse, InputPayload, Result,
    SemanticChunk, Sentiment, WeeklyReviewRequest, WeeklyReviewResponse,
};
use secondbrain_memory::{IndexRequest, MemoryEngine, SearchRequest};
use secondbrain_reasoning::{ReasoningEngine, ThoughtStream, STREAM_BUFFER};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Configuration for the orchestrator.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct OrchestratorConfig {
    /// Wall-clock bound for the downstream relay, per inbound message.
    #[serde(default = "default_reasoning_timeout_secs")]
    pub reasoning_timeout_secs: u64,

    /// Episodic memory ring-buffer cap per session.
    #[serde(default = "default_session_max_episodic")]
    pub session_max_episodic: usize,
}

fn default_reasoning_timeout_secs() -> u64 {
    300
}

fn default_session_max_episodic() -> usize {
    50
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            reasoning_timeout_secs: default_reasoning_timeout_secs(),
            session_max_episodic: default_session_max_episodic(),
        }
    }
}

/// Coordinates sessions, memory, metrics, and the downstream reasoning
/// engine. Implements [`ReasoningEngine`] itself, so callers (the HTTP
/// facade, tests) consume the same streaming contract whether or not a
/// downstream engine is connected.
#[derive(Clone)]
pub struct Orchestrator {
    memory: Arc<MemoryEngine>,
    downstream: Option<Arc<dyn ReasoningEngine>>,
    sessions: Arc<SessionManager>,
    metrics: Arc<MetricsStore>,
    reasoning_timeout: Duration,
}

impl Orchestrator {
    pub fn new(memory: Arc<MemoryEngine>, config: OrchestratorConfig) -> Self {
        Self {
            memory,
            downstream: None,
            sessions: Arc::new(SessionManager::new(config.session_max_episodic)),
            metrics: Arc::new(MetricsStore::new()),
            reasoning_timeout: Duration::from_secs(config.reasoning_timeout_secs),
        }
    }

    /// Connect the downstream reasoning engine.
    pub fn with_downstream(mut self, engine: Arc<dyn ReasoningEngine>) -> Self {
        self.downstream = Some(engine);
        self
    }

    pub fn memory(&self) -> Arc<MemoryEngine> {
        Arc::clone(&self.memory)
    }

    pub fn metrics(&self) -> Arc<MetricsStore> {
        Arc::clone(&self.metrics)
    }

    pub fn sessions(&self) -> Arc<SessionManager> {
        Arc::clone(&self.sessions)
    }

    /// Index an incoming item into the memory engine. Accepted unless the
    /// content is empty; indexing failures are logged, not propagated.
    pub async fn ingest_item(&self, item: InboxItem) -> Result<IngestResponse> {
        if item.content.is_empty() {
            return Ok(IngestResponse {
                item_id: item.id,
                accepted: false,
                message: "content is empty".into(),
            });
        }

        info!(item_id = %item.id, source = %item.source, "ingesting item");

        let mut metadata = item.metadata.clone();
        metadata.insert("source".to_string(), item.source.clone());
        metadata.insert("source_id".to_string(), item.source_id.clone());
        metadata.insert("content_type".to_string(), item.content_type.clone());

        let outcome = self
            .memory
            .index_document(IndexRequest {
                document_id: item.id.clone(),
                content: item.content,
                metadata,
                ..Default::default()
            })
            .await;

        match outcome {
            Ok(outcome) if !outcome.success => {
                warn!(
                    item_id = %item.id,
                    error = outcome.error_message.as_deref().unwrap_or("unknown"),
                    "failed to index item"
                );
            }
            Err(e) => warn!(item_id = %item.id, error = %e, "failed to index item"),
            Ok(_) => {}
        }

        Ok(IngestResponse {
            item_id: item.id,
            accepted: true,
            message: "Item accepted for processing".into(),
        })
    }

    async fn process_input(
        &self,
        input: AgentInput,
        out_tx: &mpsc::Sender<AgentOutput>,
    ) -> std::result::Result<(), ()> {
        let session_id = input.session_id.clone();
        let session = self.sessions.get_or_create(&session_id, "default-user").await;

        // One status chunk before anything else, so the caller perceives
        // liveness for every inbound message.
        send(out_tx, AgentOutput::status(&session_id, "Processing input...", 0.1)).await?;

        match &input.payload {
            InputPayload::UserQuery(_) => self.handle_user_query(input, &session, out_tx).await,
            InputPayload::UserFeedback(signal) => {
                self.record_feedback(&session_id, signal.sentiment).await;
                Ok(())
            }
            InputPayload::ToolResult(_) => self.relay_downstream(input, out_tx).await,
        }
    }

    async fn handle_user_query(
        &self,
        mut input: AgentInput,
        session: &Arc<Session>,
        out_tx: &mpsc::Sender<AgentOutput>,
    ) -> std::result::Result<(), ()> {
        let query = match &input.payload {
            InputPayload::UserQuery(query) => query.clone(),
            _ => return Ok(()),
        };

        session.add_episodic_memory(format!("User: {query}")).await;

        let mut snapshot = input.context.take().unwrap_or_default();
        let context_relevance = self.enrich_from_memory(&mut snapshot, &query).await;
        snapshot.episodic_memory = session.episodic_snapshot().await;
        input.context = Some(snapshot);

        self.metrics
            .record(InteractionRecord {
                session_id: input.session_id.clone(),
                timestamp: now_millis(),
                query,
                context_relevance,
                // Initial estimate: context quality stands in for response
                // quality until feedback arrives.
                response_quality: context_relevance,
                ..Default::default()
            })
            .await;

        self.relay_downstream(input, out_tx).await
    }

    /// Search memory for context relevant to the query and append it to
    /// the snapshot. Hybrid search first; semantic-only on failure; an
    /// empty snapshot when both fail. Returns the mean hit score.
    async fn enrich_from_memory(&self, snapshot: &mut ContextSnapshot, query: &str) -> f64 {
        let request = SearchRequest::new(query, 5);

        let results = match self.memory.hybrid_search(&request).await {
            Ok(results) => results,
            Err(e) => {
                debug!(error = %e, "hybrid search unavailable, falling back to semantic");
                match self.memory.semantic_search(&request).await {
                    Ok(results) => results,
                    Err(e) => {
                        warn!(error = %e, "failed to search memory");
                        return 0.0;
                    }
                }
            }
        };

        if results.is_empty() {
            return 0.0;
        }

        let mut total_score = 0.0;
        for result in &results {
            total_score += f64::from(result.score);
            snapshot.semantic_memory.push(SemanticChunk {
                chunk_id: result.chunk_id.clone(),
                content: result.content.clone(),
                relevance_score: result.score,
                metadata: result.metadata.clone(),
            });
        }

        total_score / results.len() as f64
    }

    async fn record_feedback(&self, session_id: &str, sentiment: Sentiment) {
        let feedback = match sentiment {
            Sentiment::Positive => FeedbackType::Positive,
            Sentiment::Negative => FeedbackType::Negative,
            Sentiment::Correction => FeedbackType::Correction,
        };
        self.metrics
            .record(InteractionRecord {
                session_id: session_id.to_string(),
                timestamp: now_millis(),
                feedback: Some(feedback),
                ..Default::default()
            })
            .await;
    }

    /// Forward one input downstream and relay every output verbatim until
    /// downstream EOF, bounded by the reasoning timeout. Emits the
    /// deterministic unavailability placeholder when no downstream engine
    /// is connected; the orchestrator never synthesizes responses itself.
    async fn relay_downstream(
        &self,
        input: AgentInput,
        out_tx: &mpsc::Sender<AgentOutput>,
    ) -> std::result::Result<(), ()> {
        let session_id = input.session_id.clone();

        let Some(engine) = self.downstream.as_ref() else {
            return send(out_tx, placeholder_response(&session_id, &input)).await;
        };

        let relay = async {
            let ThoughtStream { inputs, mut outputs } = engine.open_stream().await?;
            inputs
                .send(input)
                .await
                .map_err(|_| BrainError::Unavailable)?;
            drop(inputs);

            while let Some(output) = outputs.recv().await {
                if out_tx.send(output).await.is_err() {
                    // Caller went away; stop relaying.
                    break;
                }
            }
            Ok::<(), BrainError>(())
        };

        match tokio::time::timeout(self.reasoning_timeout, relay).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                warn!(session_id = %session_id, error = %e, "downstream relay failed");
                send(
                    out_tx,
                    AgentOutput::final_response(
                        &session_id,
                        "I encountered an error while processing your request.",
                    ),
                )
                .await
            }
            Err(_) => {
                warn!(session_id = %session_id, "downstream relay timed out");
                send(
                    out_tx,
                    AgentOutput::final_response(&session_id, "The reasoning engine timed out."),
                )
                .await
            }
        }
    }
}

fn placeholder_response(session_id: &str, input: &AgentInput) -> AgentOutput {
    let text = match &input.payload {
        InputPayload::UserQuery(query) => {
            format!("Received query: {query} (reasoning engine not connected)")
        }
        _ => "Received input (reasoning engine not connected)".to_string(),
    };
    AgentOutput::final_response(session_id, text)
}

async fn send(
    out_tx: &mpsc::Sender<AgentOutput>,
    output: AgentOutput,
) -> std::result::Result<(), ()> {
    out_tx.send(output).await.map_err(|_| ())
}

#[async_trait]
impl ReasoningEngine for Orchestrator {
    async fn open_stream(&self) -> Result<ThoughtStream> {
        let (in_tx, mut in_rx) = mpsc::channel::<AgentInput>(STREAM_BUFFER);
        let (out_tx, out_rx) = mpsc::channel(STREAM_BUFFER);

        let orchestrator = self.clone();
        tokio::spawn(async move {
            while let Some(input) = in_rx.recv().await {
                if orchestrator.process_input(input, &out_tx).await.is_err() {
                    break;
                }
            }
        });

        Ok(ThoughtStream {
            inputs: in_tx,
            outputs: out_rx,
        })
    }

    /// Delegated verbatim downstream; a neutral placeholder when the
    /// engine is absent.
    async fn classify_item(&self, request: ClassifyRequest) -> Result<ClassifyResponse> {
        if let Some(ref engine) = self.downstream {
            return engine.classify_item(request).await;
        }
        Ok(ClassifyResponse {
            classification: Classification::Reference,
            suggested_project: None,
            suggested_area: None,
            priority: 0,
            metadata: Default::default(),
            confidence: 0.0,
        })
    }

    async fn generate_weekly_review(
        &self,
        request: WeeklyReviewRequest,
    ) -> Result<WeeklyReviewResponse> {
        if let Some(ref engine) = self.downstream {
            return engine.generate_weekly_review(request).await;
        }
        Ok(WeeklyReviewResponse {
            report_markdown: "Weekly review generation requires a connected reasoning engine."
                .into(),
            ..Default::default()
        })
    }
}
