//! The bidirectional reasoning-stream contract.

use async_trait::async_trait;
use secondbrain_common::{AgentInput, AgentOutput, ClassifyRequest, ClassifyResponse, Result,
    WeeklyReviewRequest, WeeklyReviewResponse};
use tokio::sync::mpsc;

/// Buffer size for each direction of a thought stream.
pub const STREAM_BUFFER: usize = 32;

/// One open bidirectional thought stream.
///
/// Dropping `inputs` is the close-send signal; the engine finishes
/// processing buffered inputs and then closes `outputs`.
pub struct ThoughtStream {
    pub inputs: mpsc::Sender<AgentInput>,
    pub outputs: mpsc::Receiver<AgentOutput>,
}

/// A reasoning backend: multiplexed thought streams plus two unary calls.
#[async_trait]
pub trait ReasoningEngine: Send + Sync {
    /// Open a new thought stream. Outputs are delivered in the order the
    /// engine emits them; separate streams are unordered relative to each
    /// other.
    async fn open_stream(&self) -> Result<ThoughtStream>;

    /// Classify a single ingested item.
    async fn classify_item(&self, request: ClassifyRequest) -> Result<ClassifyResponse>;

    /// Generate a weekly review report.
    async fn generate_weekly_review(
        &self,
        request: WeeklyReviewRequest,
    ) -> Result<WeeklyReviewResponse>;
}

/// Unary use of the stream: send one input, close-send, and collect every
/// output until the engine closes its side.
pub async fn unary(engine: &dyn ReasoningEngine, input: AgentInput) -> Result<Vec<AgentOutput>> {
    let ThoughtStream { inputs, outputs } = engine.open_stream().await?;
    inputs
        .send(input)
        .await
        .map_err(|_| secondbrain_common::BrainError::Unavailable)?;
    drop(inputs);
    Ok(drain(outputs).await)
}

/// Collect all remaining outputs from a stream.
pub async fn drain(mut outputs: mpsc::Receiver<AgentOutput>) -> Vec<AgentOutput> {
    let mut collected = Vec::new();
    while let Some(output) = outputs.recv().await {
        collected.push(output);
    }
    collected
}

#[cfg(test)]
mod tests {
    use super::*;
    use secondbrain_common::{Classification, InputPayload};

    /// Echoes every user query back as a final response.
    struct EchoEngine;

    #[async_trait]
    impl ReasoningEngine for EchoEngine {
        async fn open_stream(&self) -> Result<ThoughtStream> {
            let (in_tx, mut in_rx) = mpsc::channel::<AgentInput>(STREAM_BUFFER);
            let (out_tx, out_rx) = mpsc::channel(STREAM_BUFFER);

            tokio::spawn(async move {
                while let Some(input) = in_rx.recv().await {
                    if let InputPayload::UserQuery(query) = input.payload {
                        let _ = out_tx
                            .send(AgentOutput::final_response(input.session_id, query))
                            .await;
                    }
                }
            });

            Ok(ThoughtStream {
                inputs: in_tx,
                outputs: out_rx,
            })
        }

        async fn classify_item(&self, _request: ClassifyRequest) -> Result<ClassifyResponse> {
            Ok(ClassifyResponse {
                classification: Classification::Reference,
                suggested_project: None,
                suggested_area: None,
                priority: 0,
                metadata: Default::default(),
                confidence: 1.0,
            })
        }

        async fn generate_weekly_review(
            &self,
            _request: WeeklyReviewRequest,
        ) -> Result<WeeklyReviewResponse> {
            Ok(WeeklyReviewResponse::default())
        }
    }

    #[tokio::test]
    async fn unary_collects_until_close() {
        let outputs = unary(&EchoEngine, AgentInput::user_query("s", "ping"))
            .await
            .unwrap();
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].final_response_text(), Some("ping"));
    }

    #[tokio::test]
    async fn multiple_inputs_preserve_order() {
        let ThoughtStream { inputs, outputs } = EchoEngine.open_stream().await.unwrap();
        inputs.send(AgentInput::user_query("s", "one")).await.unwrap();
        inputs.send(AgentInput::user_query("s", "two")).await.unwrap();
        drop(inputs);

        let collected = drain(outputs).await;
        let texts: Vec<&str> = collected
            .iter()
            .filter_map(|o| o.final_response_text())
            .collect();
        assert_eq!(texts, vec!["one", "two"]);
    }
}
