//! Throughput benchmark for the admission broker: how many LIFO
//! enqueue/dispatch round trips it can sustain through the default
//! two-worker-slot pool against a mock LLM client.

use std::sync::Arc;

use async_trait::async_trait;
use criterion::{Criterion, criterion_group, criterion_main};
use taskctl::broker::{Broker, BrokerConfig, Priority};
use taskctl::llm::{
    CompletionRequest, CompletionResponse, LlmClient, LlmError, StopReason, StreamChunk, TokenUsage,
};
use taskstore::Store;
use tokio::runtime::Runtime;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Instant-echo client so the benchmark measures broker overhead, not
/// network latency.
struct EchoClient;

#[async_trait]
impl LlmClient for EchoClient {
    async fn complete(&self, _request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        Ok(CompletionResponse {
            content: Some("ok".to_string()),
            tool_calls: vec![],
            stop_reason: StopReason::EndTurn,
            usage: TokenUsage::default(),
        })
    }

    async fn stream(
        &self,
        request: CompletionRequest,
        _chunk_tx: mpsc::Sender<StreamChunk>,
    ) -> Result<CompletionResponse, LlmError> {
        self.complete(request).await
    }
}

fn bench_enqueue_dispatch(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();

    c.bench_function("broker_enqueue_dispatch_round_trip", |b| {
        b.iter(|| {
            rt.block_on(async {
                let store = Arc::new(Store::open_in_memory().unwrap());
                let client = Arc::new(EchoClient);
                let broker = Broker::new(BrokerConfig::default(), client, store);

                let request = CompletionRequest {
                    system_prompt: "bench".to_string(),
                    messages: vec![],
                    tools: vec![],
                    max_tokens: 16,
                };
                let id = broker.enqueue(request, Priority::High, "bench").await.unwrap();
                let _ = broker
                    .await_completion(&id, std::time::Duration::from_secs(5), CancellationToken::new())
                    .await;
            });
        });
    });
}

criterion_group!(benches, bench_enqueue_dispatch);
criterion_main!(benches);
