//! Upstream block-event subscription with automatic re-subscription.
//!
//! ```text
//! Disconnected → Initializing → Subscribed → (peer disconnect) → Disconnected → ...
//!                     │
//!                     └─ first attempt fails → Terminated
//! ```
//!
//! The first attempt is made by [`EventSubscription::start`]; its failure is
//! terminal. After that a supervising task owns the stream and reconnects
//! forever, spacing attempts with [`ReconnectPolicy`].

use futures_util::StreamExt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::ledger::{BlockEventStream, LedgerClient, LedgerError, LedgerResult, PeerEvent};
use crate::observability::metrics;
use crate::relay::registry::SubscriberRegistry;
use crate::resilience::ReconnectPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    Disconnected,
    Initializing,
    Subscribed,
    Terminated,
}

#[derive(Debug, Error)]
pub enum SubscriptionError {
    #[error("Initial block event subscription failed: {0}")]
    Initialization(#[source] LedgerError),
}

/// Keeps a block-event registration alive and feeds the registry.
pub struct EventSubscription {
    client: Arc<dyn LedgerClient>,
    registry: Arc<SubscriberRegistry>,
    policy: ReconnectPolicy,
    state: watch::Sender<SubscriptionState>,
    connections: AtomicU64,
    events: AtomicU64,
}

impl EventSubscription {
    pub fn new(
        client: Arc<dyn LedgerClient>,
        registry: Arc<SubscriberRegistry>,
        policy: ReconnectPolicy,
    ) -> Self {
        let (state, _) = watch::channel(SubscriptionState::Disconnected);
        Self {
            client,
            registry,
            policy,
            state,
            connections: AtomicU64::new(0),
            events: AtomicU64::new(0),
        }
    }

    pub fn state(&self) -> SubscriptionState {
        *self.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<SubscriptionState> {
        self.state.subscribe()
    }

    /// Successful registrations so far, including the first.
    pub fn connections(&self) -> u64 {
        self.connections.load(Ordering::Relaxed)
    }

    /// Block events forwarded to the registry.
    pub fn events_forwarded(&self) -> u64 {
        self.events.load(Ordering::Relaxed)
    }

    /// Make the first subscription and hand the stream to a supervising task.
    ///
    /// Returns once the subscription is live. A failure here is terminal.
    pub async fn start(self: Arc<Self>) -> Result<JoinHandle<()>, SubscriptionError> {
        match self.connect().await {
            Ok(stream) => Ok(tokio::spawn(self.supervise(stream))),
            Err(e) => {
                self.set_state(SubscriptionState::Terminated);
                tracing::error!(error = %e, "Initial block event subscription failed");
                Err(SubscriptionError::Initialization(e))
            }
        }
    }

    /// One init-then-register cycle.
    async fn connect(&self) -> LedgerResult<BlockEventStream> {
        self.set_state(SubscriptionState::Initializing);
        let attempt = async {
            if !self.client.init().await? {
                return Err(LedgerError::Configuration(
                    "ledger client refused initialization".to_string(),
                ));
            }
            self.client.register_for_block_event().await
        };
        match attempt.await {
            Ok(stream) => {
                let connections = self.connections.fetch_add(1, Ordering::Relaxed) + 1;
                self.set_state(SubscriptionState::Subscribed);
                tracing::info!(connections, "Registered for block events");
                Ok(stream)
            }
            Err(e) => {
                self.set_state(SubscriptionState::Disconnected);
                Err(e)
            }
        }
    }

    async fn supervise(self: Arc<Self>, mut stream: BlockEventStream) {
        loop {
            self.pump(&mut stream).await;
            self.set_state(SubscriptionState::Disconnected);
            metrics::record_reconnect();

            let mut failures: u32 = 0;
            stream = loop {
                let delay = self.policy.delay(failures);
                tracing::info!(delay_ms = delay.as_millis() as u64, failures, "Re-subscribing to block events");
                tokio::time::sleep(delay).await;
                match self.connect().await {
                    Ok(stream) => break stream,
                    Err(e) => {
                        failures = failures.saturating_add(1);
                        tracing::warn!(error = %e, failures, "Block event re-subscription failed");
                    }
                }
            };
        }
    }

    /// Forward events until the peer disconnects or the stream ends.
    async fn pump(&self, stream: &mut BlockEventStream) {
        while let Some(event) = stream.next().await {
            match event {
                PeerEvent::Block { peer_id, block } => {
                    let report = self.registry.broadcast(&block);
                    self.events.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!(
                        peer_id = %peer_id,
                        delivered = report.delivered,
                        dropped = report.dropped,
                        evicted = report.evicted,
                        "Block event broadcast"
                    );
                }
                PeerEvent::Disconnected { peer_id, reason } => {
                    tracing::warn!(peer_id = %peer_id, reason = %reason, "Peer disconnected, reconnecting");
                    return;
                }
            }
        }
        tracing::warn!("Block event stream ended, reconnecting");
    }

    fn set_state(&self, state: SubscriptionState) {
        self.state.send_replace(state);
    }
}

impl std::fmt::Debug for EventSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSubscription")
            .field("state", &self.state())
            .field("connections", &self.connections())
            .field("policy", &self.policy)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{ChainCodeResult, TransactionRequest};
    use crate::relay::registry::Outbound;
    use async_trait::async_trait;
    use futures_util::stream;
    use serde_json::{json, Value};
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Serves a scripted sequence of init outcomes and event streams.
    struct ScriptedClient {
        inits: Mutex<VecDeque<LedgerResult<bool>>>,
        streams: Mutex<VecDeque<Vec<PeerEvent>>>,
        init_calls: AtomicU64,
    }

    impl ScriptedClient {
        fn new(inits: Vec<LedgerResult<bool>>, streams: Vec<Vec<PeerEvent>>) -> Self {
            Self {
                inits: Mutex::new(inits.into()),
                streams: Mutex::new(streams.into()),
                init_calls: AtomicU64::new(0),
            }
        }
    }

    fn block(number: u64) -> PeerEvent {
        PeerEvent::Block {
            peer_id: "peer0".into(),
            block: json!({"number": number}),
        }
    }

    fn disconnect() -> PeerEvent {
        PeerEvent::Disconnected {
            peer_id: "peer0".into(),
            reason: "connection reset".into(),
        }
    }

    #[async_trait]
    impl LedgerClient for ScriptedClient {
        async fn init(&self) -> LedgerResult<bool> {
            self.init_calls.fetch_add(1, Ordering::SeqCst);
            self.inits.lock().unwrap().pop_front().unwrap_or(Ok(true))
        }

        async fn register_for_block_event(&self) -> LedgerResult<BlockEventStream> {
            let events = self.streams.lock().unwrap().pop_front();
            Ok(match events {
                // Last scripted stream stays open after its events.
                Some(events) if self.streams.lock().unwrap().is_empty() => {
                    stream::iter(events).chain(stream::pending()).boxed()
                }
                Some(events) => stream::iter(events).boxed(),
                None => stream::pending().boxed(),
            })
        }

        async fn invoke_transaction(&self, _: &TransactionRequest) -> LedgerResult<ChainCodeResult> {
            unimplemented!()
        }
        async fn query(&self, _: &TransactionRequest) -> LedgerResult<Value> {
            unimplemented!()
        }
        async fn get_channel_details(&self, _: &str, _: &str) -> LedgerResult<Value> {
            unimplemented!()
        }
        async fn get_installed_chaincode(&self, _: &str, _: &str) -> LedgerResult<Value> {
            unimplemented!()
        }
        async fn get_instantiated_chaincodes(&self, _: &str, _: &str, _: &str) -> LedgerResult<Value> {
            unimplemented!()
        }
        async fn get_block_details(&self, _: u64, _: &str, _: &str, _: &str) -> LedgerResult<Value> {
            unimplemented!()
        }
        async fn get_trxn_details(&self, _: &str, _: &str, _: &str, _: &str) -> LedgerResult<Value> {
            unimplemented!()
        }
    }

    fn subscription(client: Arc<ScriptedClient>, registry: Arc<SubscriberRegistry>) -> Arc<EventSubscription> {
        Arc::new(EventSubscription::new(
            client,
            registry,
            ReconnectPolicy::new(10, 40),
        ))
    }

    async fn wait_for(condition: impl Fn() -> bool) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !condition() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("condition not reached");
    }

    #[tokio::test]
    async fn test_first_attempt_failure_is_terminal() {
        let client = Arc::new(ScriptedClient::new(
            vec![Err(LedgerError::Transport("unreachable".into()))],
            vec![],
        ));
        let sub = subscription(client.clone(), Arc::new(SubscriberRegistry::new(8, 2)));

        let err = sub.clone().start().await.unwrap_err();
        assert!(matches!(err, SubscriptionError::Initialization(LedgerError::Transport(_))));
        assert_eq!(sub.state(), SubscriptionState::Terminated);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(client.init_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_refused_init_is_terminal() {
        let client = Arc::new(ScriptedClient::new(vec![Ok(false)], vec![]));
        let sub = subscription(client, Arc::new(SubscriberRegistry::new(8, 2)));
        let err = sub.clone().start().await.unwrap_err();
        assert!(matches!(err, SubscriptionError::Initialization(LedgerError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_disconnect_triggers_resubscription() {
        let client = Arc::new(ScriptedClient::new(
            vec![],
            vec![vec![block(1), disconnect()], vec![block(2)]],
        ));
        let registry = Arc::new(SubscriberRegistry::new(16, 2));
        let (_subscriber, mut rx) = registry.register();
        let sub = subscription(client.clone(), registry);

        let _task = sub.clone().start().await.unwrap();
        wait_for(|| sub.events_forwarded() == 2).await;

        assert_eq!(client.init_calls.load(Ordering::SeqCst), 2);
        assert_eq!(sub.connections(), 2);
        assert_eq!(sub.state(), SubscriptionState::Subscribed);

        let mut numbers = Vec::new();
        while let Ok(Outbound::Text(frame)) = rx.try_recv() {
            let value: Value = serde_json::from_str(&frame).unwrap();
            if value["message"] == json!("Block event broadcast") {
                numbers.push(value["result"]["number"].as_u64().unwrap());
            }
        }
        assert_eq!(numbers, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_failed_resubscription_is_retried() {
        let client = Arc::new(ScriptedClient::new(
            vec![
                Ok(true),
                Err(LedgerError::Transport("still down".into())),
                Ok(false),
                Ok(true),
            ],
            vec![vec![disconnect()], vec![block(9)]],
        ));
        let sub = subscription(client.clone(), Arc::new(SubscriberRegistry::new(8, 2)));

        let _task = sub.clone().start().await.unwrap();
        wait_for(|| sub.events_forwarded() == 1).await;

        assert_eq!(client.init_calls.load(Ordering::SeqCst), 4);
        assert_eq!(sub.connections(), 2);
    }

    #[tokio::test]
    async fn test_stream_end_counts_as_disconnect() {
        let client = Arc::new(ScriptedClient::new(
            vec![],
            vec![vec![block(1)], vec![block(2)]],
        ));
        let sub = subscription(client.clone(), Arc::new(SubscriberRegistry::new(8, 2)));

        let _task = sub.clone().start().await.unwrap();
        wait_for(|| sub.connections() == 2 && sub.events_forwarded() == 2).await;
        assert_eq!(client.init_calls.load(Ordering::SeqCst), 2);
    }
}
