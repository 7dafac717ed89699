//! Shared utilities for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use futures_util::{stream, StreamExt};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use ledger_gateway::config::{GatewayConfig, RelayConfig};
use ledger_gateway::ledger::{
    BlockEventStream, ChainCodeResult, ClientManagerHandle, ClientPaths, LedgerClient,
    LedgerError, LedgerResult, PeerEvent, TransactionRequest,
};
use ledger_gateway::relay::{EventSubscription, RelayError, SubscriberRegistry};
use ledger_gateway::{GatewayServer, RelayServer, Shutdown};

/// In-memory ledger client with scripted answers and call counters.
pub struct MockLedgerClient {
    pub init_calls: AtomicUsize,
    pub invoke_calls: AtomicUsize,
    pub query_calls: AtomicUsize,
    pub getter_calls: AtomicUsize,
    init_ok: AtomicBool,
    query_result: Mutex<Value>,
    getter_result: Mutex<Value>,
    invoke_result: Mutex<ChainCodeResult>,
    fault: Mutex<Option<String>>,
    getter_delay: Mutex<Option<Duration>>,
    last_request: Mutex<Option<TransactionRequest>>,
    events: Mutex<Option<mpsc::UnboundedReceiver<PeerEvent>>>,
}

impl MockLedgerClient {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            init_calls: AtomicUsize::new(0),
            invoke_calls: AtomicUsize::new(0),
            query_calls: AtomicUsize::new(0),
            getter_calls: AtomicUsize::new(0),
            init_ok: AtomicBool::new(true),
            query_result: Mutex::new(Value::Array(vec![])),
            getter_result: Mutex::new(Value::Array(vec![])),
            invoke_result: Mutex::new(ChainCodeResult::success("committed", Value::Null)),
            fault: Mutex::new(None),
            getter_delay: Mutex::new(None),
            last_request: Mutex::new(None),
            events: Mutex::new(None),
        })
    }

    pub fn set_init_ok(&self, ok: bool) {
        self.init_ok.store(ok, Ordering::SeqCst);
    }

    pub fn set_query_result(&self, value: Value) {
        *self.query_result.lock().unwrap() = value;
    }

    pub fn set_getter_result(&self, value: Value) {
        *self.getter_result.lock().unwrap() = value;
    }

    pub fn set_invoke_result(&self, result: ChainCodeResult) {
        *self.invoke_result.lock().unwrap() = result;
    }

    /// Make every data call fail with a transport error.
    pub fn set_fault(&self, reason: &str) {
        *self.fault.lock().unwrap() = Some(reason.to_string());
    }

    /// Hold every introspection call for `delay` before answering.
    pub fn set_getter_delay(&self, delay: Duration) {
        *self.getter_delay.lock().unwrap() = Some(delay);
    }

    pub fn last_request(&self) -> Option<TransactionRequest> {
        self.last_request.lock().unwrap().clone()
    }

    /// Sender feeding the next block-event registration.
    pub fn event_sender(&self) -> mpsc::UnboundedSender<PeerEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.events.lock().unwrap() = Some(rx);
        tx
    }

    pub fn total_data_calls(&self) -> usize {
        self.invoke_calls.load(Ordering::SeqCst)
            + self.query_calls.load(Ordering::SeqCst)
            + self.getter_calls.load(Ordering::SeqCst)
    }

    fn check_fault(&self) -> LedgerResult<()> {
        match self.fault.lock().unwrap().clone() {
            Some(reason) => Err(LedgerError::Transport(reason)),
            None => Ok(()),
        }
    }

    async fn getter(&self) -> LedgerResult<Value> {
        self.getter_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.getter_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.check_fault()?;
        Ok(self.getter_result.lock().unwrap().clone())
    }
}

#[async_trait]
impl LedgerClient for MockLedgerClient {
    async fn init(&self) -> LedgerResult<bool> {
        self.init_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.init_ok.load(Ordering::SeqCst))
    }

    async fn register_for_block_event(&self) -> LedgerResult<BlockEventStream> {
        match self.events.lock().unwrap().take() {
            Some(rx) => Ok(stream::unfold(rx, |mut rx| async move {
                rx.recv().await.map(|event| (event, rx))
            })
            .boxed()),
            None => Ok(stream::pending().boxed()),
        }
    }

    async fn invoke_transaction(&self, request: &TransactionRequest) -> LedgerResult<ChainCodeResult> {
        self.invoke_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some(request.clone());
        self.check_fault()?;
        Ok(self.invoke_result.lock().unwrap().clone())
    }

    async fn query(&self, request: &TransactionRequest) -> LedgerResult<Value> {
        self.query_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some(request.clone());
        self.check_fault()?;
        Ok(self.query_result.lock().unwrap().clone())
    }

    async fn get_channel_details(&self, _: &str, _: &str) -> LedgerResult<Value> {
        self.getter().await
    }

    async fn get_installed_chaincode(&self, _: &str, _: &str) -> LedgerResult<Value> {
        self.getter().await
    }

    async fn get_instantiated_chaincodes(&self, _: &str, _: &str, _: &str) -> LedgerResult<Value> {
        self.getter().await
    }

    async fn get_block_details(&self, _: u64, _: &str, _: &str, _: &str) -> LedgerResult<Value> {
        self.getter().await
    }

    async fn get_trxn_details(&self, _: &str, _: &str, _: &str, _: &str) -> LedgerResult<Value> {
        self.getter().await
    }
}

pub fn test_paths() -> ClientPaths {
    ClientPaths {
        network_config: "network-config.json".into(),
        credential_store: "/tmp/credstore".into(),
        user_credentials: "user-cred-config.json".into(),
    }
}

/// Manager whose factory always hands out `client`.
pub fn manager_for(client: Arc<MockLedgerClient>) -> Arc<ClientManagerHandle> {
    let factory = move |_: &ClientPaths| -> LedgerResult<Arc<dyn LedgerClient>> {
        Ok(client.clone() as Arc<dyn LedgerClient>)
    };
    Arc::new(ClientManagerHandle::new(Arc::new(factory), test_paths()))
}

/// Start the API on an ephemeral port.
pub async fn start_gateway(manager: Arc<ClientManagerHandle>, shutdown: &Shutdown) -> SocketAddr {
    let mut config = GatewayConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    let server = GatewayServer::new(config, manager);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server_shutdown = shutdown.subscribe();

    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });
    addr
}

pub fn relay_config() -> RelayConfig {
    RelayConfig {
        bind_address: "127.0.0.1:0".into(),
        reconnect_interval_ms: 10,
        reconnect_max_delay_ms: 50,
        ..RelayConfig::default()
    }
}

/// A relay running on an ephemeral port.
pub struct RelayHandle {
    pub addr: SocketAddr,
    pub registry: Arc<SubscriberRegistry>,
    pub subscription: Arc<EventSubscription>,
    pub task: JoinHandle<Result<(), RelayError>>,
}

/// Start the relay with a fast heartbeat.
pub async fn start_relay(
    client: Arc<MockLedgerClient>,
    heartbeat: Duration,
    shutdown: &Shutdown,
) -> RelayHandle {
    let relay = RelayServer::new(&relay_config(), client).with_heartbeat_interval(heartbeat);
    let registry = relay.registry();
    let subscription = relay.subscription();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let task = tokio::spawn(relay.run(listener, shutdown.subscribe()));
    RelayHandle {
        addr,
        registry,
        subscription,
        task,
    }
}

/// Poll `condition` until it holds or a few seconds pass.
pub async fn eventually(condition: impl Fn() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

pub fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
