//! The LLM admission broker: a worker-slot pool serving two LIFO
//! priority classes, with backpressure and an auto-throttle monitor.
//!
//! Two separate stacks let HIGH and LOW each report their own occupancy
//! for the throttle check, woken by a `tokio::sync::Notify` whenever a
//! slot frees up, with a `tokio_util::sync::CancellationToken` shared
//! between shutdown and per-call cancellation. The auto-throttle monitor
//! is a `tokio::time::interval` loop that periodically samples queue
//! occupancy and flips a flag.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::Utc;
use taskstore::Store;
use tokio::sync::{Mutex, Notify, Semaphore, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::config::BrokerConfig;
use super::ticket::{Priority, Ticket};
use crate::llm::{CompletionRequest, CompletionResponse, LlmClient, LlmError};

#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    #[error("queue full: {class} at capacity {capacity}")]
    QueueFull { class: &'static str, capacity: usize },

    #[error("low-priority admission is throttled")]
    Throttled,

    #[error("cancelled")]
    Cancelled,

    #[error("await deadline elapsed")]
    DeadlineElapsed,

    #[error("unknown request id: {0}")]
    UnknownRequest(String),

    #[error("transport error: {0}")]
    Transport(#[from] LlmError),
}

impl From<BrokerError> for crate::error::Error {
    fn from(err: BrokerError) -> Self {
        match err {
            BrokerError::QueueFull { class, capacity } => crate::error::Error::queue_full(class, capacity),
            BrokerError::Throttled => crate::error::Error::queue_full("low", 0),
            BrokerError::Cancelled => crate::error::Error::Cancelled { reason: "broker ticket cancelled".into() },
            BrokerError::DeadlineElapsed => {
                crate::error::Error::transport("broker await deadline elapsed")
            }
            BrokerError::UnknownRequest(id) => crate::error::Error::not_found("ticket", id),
            BrokerError::Transport(e) => crate::error::Error::transport(e.to_string()),
        }
    }
}

type Completion = Result<CompletionResponse, BrokerError>;

struct QueuedTicket {
    ticket: Ticket,
    request: CompletionRequest,
}

/// Ordered purely by the wrapped `Ticket` (priority, then LIFO-within-class).
impl PartialEq for QueuedTicket {
    fn eq(&self, other: &Self) -> bool {
        self.ticket == other.ticket
    }
}
impl Eq for QueuedTicket {}
impl PartialOrd for QueuedTicket {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for QueuedTicket {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.ticket.cmp(&other.ticket)
    }
}

struct Inner {
    high: Vec<QueuedTicket>,
    low: Vec<QueuedTicket>,
    pending: HashMap<String, oneshot::Sender<Completion>>,
}

impl Inner {
    fn new() -> Self {
        Self { high: Vec::new(), low: Vec::new(), pending: HashMap::new() }
    }

    /// Pop the next ticket to serve: HIGH always wins, LOW only when not
    /// throttled. Stacks so within a class the ordering is LIFO.
    fn pop_next(&mut self, low_throttled: bool) -> Option<QueuedTicket> {
        if let Some(pos) = self.argmax(&self.high) {
            return Some(self.high.remove(pos));
        }
        if !low_throttled
            && let Some(pos) = self.argmax(&self.low)
        {
            return Some(self.low.remove(pos));
        }
        None
    }

    fn argmax(&self, stack: &[QueuedTicket]) -> Option<usize> {
        stack
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.cmp(b.1))
            .map(|(i, _)| i)
    }
}

/// Admits, queues, dispatches, and accounts for every LLM
/// call issued by any other component.
pub struct Broker {
    config: BrokerConfig,
    client: Arc<dyn LlmClient>,
    store: Arc<Store>,
    inner: Mutex<Inner>,
    /// Receivers live outside `inner` so `await_completion` doesn't
    /// contend with the dispatch loop's queue lock.
    pending_rx: Mutex<HashMap<String, oneshot::Receiver<Completion>>>,
    semaphore: Arc<Semaphore>,
    notify: Notify,
    low_throttled: AtomicBool,
    shutdown: CancellationToken,
}

impl Broker {
    pub fn new(config: BrokerConfig, client: Arc<dyn LlmClient>, store: Arc<Store>) -> Arc<Self> {
        let semaphore = Arc::new(Semaphore::new(config.worker_slots));
        let disable_low_priority = config.disable_low_priority;
        let broker = Arc::new(Self {
            config,
            client,
            store,
            inner: Mutex::new(Inner::new()),
            pending_rx: Mutex::new(HashMap::new()),
            semaphore,
            notify: Notify::new(),
            low_throttled: AtomicBool::new(disable_low_priority),
            shutdown: CancellationToken::new(),
        });
        tokio::spawn(broker.clone().run_dispatch_loop());
        tokio::spawn(broker.clone().run_throttle_monitor());
        broker
    }

    /// Queue a request and return its id immediately; call `await_completion`
    /// (or drop interest) separately — the two-phase split lets a caller
    /// enqueue many tickets before blocking on any of them.
    pub async fn enqueue(
        &self,
        request: CompletionRequest,
        priority: Priority,
        component: impl Into<String>,
    ) -> Result<String, BrokerError> {
        if self.shutdown.is_cancelled() {
            return Err(BrokerError::Cancelled);
        }
        let id = Uuid::now_v7().to_string();
        let ticket = Ticket::new(id.clone(), request.system_prompt.clone(), component, priority);
        let (tx, rx) = oneshot::channel();

        {
            let mut inner = self.inner.lock().await;
            match priority {
                Priority::High => {
                    if inner.high.len() >= self.config.high_capacity {
                        return Err(BrokerError::QueueFull { class: "high", capacity: self.config.high_capacity });
                    }
                    inner.high.push(QueuedTicket { ticket, request });
                }
                Priority::Low => {
                    if self.low_throttled.load(Ordering::Acquire) {
                        return Err(BrokerError::Throttled);
                    }
                    if inner.low.len() >= self.config.low_capacity {
                        return Err(BrokerError::QueueFull { class: "low", capacity: self.config.low_capacity });
                    }
                    inner.low.push(QueuedTicket { ticket, request });
                }
            }
            inner.pending.insert(id.clone(), tx);
        }
        self.pending_rx.lock().await.insert(id.clone(), rx);
        self.notify.notify_one();
        debug!(request_id = %id, "Broker::enqueue: queued");
        Ok(id)
    }

    /// Block until the ticket completes, the deadline elapses, or `cancel`
    /// fires — whichever comes first.
    pub async fn await_completion(
        &self,
        request_id: &str,
        deadline: Duration,
        cancel: CancellationToken,
    ) -> Result<CompletionResponse, BrokerError> {
        let rx = self
            .pending_rx
            .lock()
            .await
            .remove(request_id)
            .ok_or_else(|| BrokerError::UnknownRequest(request_id.to_string()))?;

        tokio::select! {
            result = rx => result.unwrap_or(Err(BrokerError::Cancelled)),
            _ = tokio::time::sleep(deadline) => {
                self.forget(request_id).await;
                Err(BrokerError::DeadlineElapsed)
            }
            _ = cancel.cancelled() => {
                self.forget(request_id).await;
                Err(BrokerError::Cancelled)
            }
        }
    }

    /// Remove a not-yet-dispatched ticket from its queue and fail its
    /// waiter with `Cancelled`. A no-op once the ticket is in flight —
    /// the in-flight LLM call always runs to completion.
    async fn forget(&self, request_id: &str) {
        let mut inner = self.inner.lock().await;
        inner.high.retain(|q| q.ticket.id != request_id);
        inner.low.retain(|q| q.ticket.id != request_id);
        if let Some(tx) = inner.pending.remove(request_id) {
            let _ = tx.send(Err(BrokerError::Cancelled));
        }
    }

    /// Stop accepting new tickets, fail everything still queued, wait for
    /// in-flight calls to drain, then return.
    pub async fn shutdown(self: &Arc<Self>) {
        self.shutdown.cancel();
        {
            let mut inner = self.inner.lock().await;
            for q in inner.high.drain(..).chain(inner.low.drain(..)) {
                if let Some(tx) = inner.pending.remove(&q.ticket.id) {
                    let _ = tx.send(Err(BrokerError::Cancelled));
                }
            }
        }
        self.notify.notify_waiters();
        let _ = self.semaphore.acquire_many(self.config.worker_slots as u32).await;
        info!("Broker::shutdown: drained");
    }

    async fn run_dispatch_loop(self: Arc<Self>) {
        loop {
            let permit = match self.semaphore.clone().acquire_owned().await {
                Ok(p) => p,
                Err(_) => return,
            };
            let queued = match self.wait_for_ticket().await {
                Some(q) => q,
                None => return,
            };
            let this = self.clone();
            tokio::spawn(async move {
                this.execute(queued).await;
                drop(permit);
            });
        }
    }

    /// Block until a ticket is claimable (HIGH first, LOW unless
    /// throttled) or the broker is shutting down with nothing left.
    async fn wait_for_ticket(&self) -> Option<QueuedTicket> {
        loop {
            {
                let mut inner = self.inner.lock().await;
                let throttled = self.low_throttled.load(Ordering::Acquire);
                if let Some(q) = inner.pop_next(throttled) {
                    return Some(q);
                }
                if self.shutdown.is_cancelled() && inner.high.is_empty() && inner.low.is_empty() {
                    return None;
                }
            }
            tokio::select! {
                _ = self.notify.notified() => {}
                _ = tokio::time::sleep(Duration::from_secs(1)) => {}
            }
        }
    }

    async fn execute(&self, queued: QueuedTicket) {
        let QueuedTicket { ticket, request } = queued;
        debug!(request_id = %ticket.id, component = %ticket.component, "Broker::execute: dispatching");
        let result = self.client.complete(request).await;
        if let Ok(response) = &result {
            self.record_token_usage(&ticket.component, &response.usage);
        }
        let mut inner = self.inner.lock().await;
        if let Some(tx) = inner.pending.remove(&ticket.id) {
            let _ = tx.send(result.map_err(BrokerError::from));
        }
    }

    fn record_token_usage(&self, component: &str, usage: &crate::llm::TokenUsage) {
        let day = Utc::now().format("%Y-%m-%d").to_string();
        let ttl_ms = self.config.token_usage_ttl_secs * 1000;
        let total = usage.input_tokens + usage.output_tokens;
        for (suffix, amount) in [
            ("prompt", usage.input_tokens as i64),
            ("completion", usage.output_tokens as i64),
            ("total", total as i64),
        ] {
            let key = format!("token_usage:{day}:{suffix}");
            if let Ok(new_total) = self.store.kv_incr(&key, amount) {
                debug!(%key, new_total, "Broker::record_token_usage: incremented");
            }
            let _ = self.store.kv_expire(&key, ttl_ms);
            let component_key = format!("token_usage:{day}:component:{component}:{suffix}");
            let _ = self.store.kv_incr(&component_key, amount);
            let _ = self.store.kv_expire(&component_key, ttl_ms);
        }
    }

    async fn run_throttle_monitor(self: Arc<Self>) {
        let mut interval = tokio::time::interval(Duration::from_secs(self.config.sample_interval_secs));
        loop {
            interval.tick().await;
            if self.shutdown.is_cancelled() {
                return;
            }
            let depth = {
                let inner = self.inner.lock().await;
                inner.low.len()
            };
            let utilization = depth as f64 / self.config.low_capacity.max(1) as f64;
            if self.config.disable_low_priority {
                continue;
            }
            let was_throttled = self.low_throttled.load(Ordering::Acquire);
            if !was_throttled && utilization >= self.config.throttle_disable {
                self.low_throttled.store(true, Ordering::Release);
                warn!(utilization, "Broker::run_throttle_monitor: LOW admission throttled");
            } else if was_throttled && utilization <= self.config.throttle_enable {
                self.low_throttled.store(false, Ordering::Release);
                info!(utilization, "Broker::run_throttle_monitor: LOW admission resumed");
            }
        }
    }

    pub fn is_low_throttled(&self) -> bool {
        self.low_throttled.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::client::mock::MockLlmClient;
    use crate::llm::{StopReason, TokenUsage};

    fn ok_response(text: &str) -> CompletionResponse {
        CompletionResponse {
            content: Some(text.to_string()),
            tool_calls: vec![],
            stop_reason: StopReason::EndTurn,
            usage: TokenUsage { input_tokens: 10, output_tokens: 5, ..Default::default() },
        }
    }

    fn request(prompt: &str) -> CompletionRequest {
        CompletionRequest {
            system_prompt: prompt.to_string(),
            messages: vec![],
            tools: vec![],
            max_tokens: 100,
        }
    }

    fn broker(responses: Vec<CompletionResponse>) -> Arc<Broker> {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let client = Arc::new(MockLlmClient::new(responses));
        Broker::new(BrokerConfig::default(), client, store)
    }

    #[tokio::test]
    async fn enqueue_and_await_round_trips() {
        let broker = broker(vec![ok_response("hi")]);
        let id = broker.enqueue(request("p"), Priority::High, "router").await.unwrap();
        let response = broker
            .await_completion(&id, Duration::from_secs(5), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(response.content, Some("hi".to_string()));
    }

    #[tokio::test]
    async fn high_capacity_is_enforced() {
        let config = BrokerConfig { high_capacity: 1, worker_slots: 0, ..BrokerConfig::default() };
        let store = Arc::new(Store::open_in_memory().unwrap());
        let client = Arc::new(MockLlmClient::new(vec![]));
        let broker = Broker::new(config, client, store);

        broker.enqueue(request("a"), Priority::High, "router").await.unwrap();
        let err = broker.enqueue(request("b"), Priority::High, "router").await.unwrap_err();
        assert!(matches!(err, BrokerError::QueueFull { class: "high", capacity: 1 }));
    }

    #[tokio::test]
    async fn await_unknown_request_errors() {
        let broker = broker(vec![]);
        let err = broker
            .await_completion("does-not-exist", Duration::from_millis(10), CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, BrokerError::UnknownRequest(_)));
    }

    #[tokio::test]
    async fn cancel_unblocks_await_promptly() {
        let config = BrokerConfig { worker_slots: 0, ..BrokerConfig::default() };
        let store = Arc::new(Store::open_in_memory().unwrap());
        let client = Arc::new(MockLlmClient::new(vec![]));
        let broker = Broker::new(config, client, store);

        let id = broker.enqueue(request("a"), Priority::High, "router").await.unwrap();
        let cancel = CancellationToken::new();
        let cancel_clone = cancel.clone();
        tokio::spawn(async move { cancel_clone.cancel() });

        let err = broker
            .await_completion(&id, Duration::from_secs(30), cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, BrokerError::Cancelled));
    }

    #[tokio::test]
    async fn throttle_monitor_flips_on_low_occupancy() {
        let config = BrokerConfig {
            worker_slots: 0,
            low_capacity: 2,
            sample_interval_secs: 1,
            throttle_disable: 0.5,
            throttle_enable: 0.0,
            ..BrokerConfig::default()
        };
        let store = Arc::new(Store::open_in_memory().unwrap());
        let client = Arc::new(MockLlmClient::new(vec![]));
        let broker = Broker::new(config, client, store);

        broker.enqueue(request("a"), Priority::Low, "router").await.unwrap();
        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert!(broker.is_low_throttled());
    }

    #[tokio::test]
    async fn low_enqueue_rejected_while_throttled() {
        let config = BrokerConfig {
            worker_slots: 0,
            low_capacity: 2,
            sample_interval_secs: 1,
            throttle_disable: 0.5,
            throttle_enable: 0.0,
            ..BrokerConfig::default()
        };
        let store = Arc::new(Store::open_in_memory().unwrap());
        let client = Arc::new(MockLlmClient::new(vec![]));
        let broker = Broker::new(config, client, store);

        broker.enqueue(request("a"), Priority::Low, "router").await.unwrap();
        tokio::time::sleep(Duration::from_millis(1100)).await;

        let err = broker.enqueue(request("b"), Priority::Low, "router").await.unwrap_err();
        assert!(matches!(err, BrokerError::Throttled));
    }

    #[tokio::test]
    async fn shutdown_cancels_queued_tickets() {
        let config = BrokerConfig { worker_slots: 0, ..BrokerConfig::default() };
        let store = Arc::new(Store::open_in_memory().unwrap());
        let client = Arc::new(MockLlmClient::new(vec![]));
        let broker = Broker::new(config, client, store);

        let id = broker.enqueue(request("a"), Priority::High, "router").await.unwrap();
        broker.shutdown().await;

        let err = broker
            .await_completion(&id, Duration::from_secs(1), CancellationToken::new())
            .await;
        // Either already failed via the drained oneshot, or the id was
        // already removed by shutdown's drain - both are acceptable
        // terminal outcomes for a cancelled ticket.
        assert!(err.is_err());
    }
}
