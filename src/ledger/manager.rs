//! Process-wide handle to the ledger client.
//!
//! # Responsibilities
//! - Build and initialize the client lazily, on first use
//! - Guarantee at most one initialization attempt in flight
//! - Forget failed attempts so the next call retries
//! - Serve steady-state callers without locking
//!
//! # Design Decisions
//! - Construction is serialized by an async mutex; reads go through `ArcSwapOption`
//! - Callers queued behind an attempt take that attempt's result
//!   (tracked by an attempt counter) instead of starting their own
//! - No backoff: retry happens on the next call

use arc_swap::ArcSwapOption;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::ledger::client::{ClientPaths, LedgerClient, LedgerClientFactory};
use crate::ledger::types::{ChainCodeResult, LedgerError, LedgerResult, TransactionRequest};
use crate::observability::metrics;

/// Initialized client slot. `ArcSwapOption` needs a sized payload.
struct ActiveClient(Arc<dyn LedgerClient>);

/// Lazily-initialized, shared handle to the single ledger client.
pub struct ClientManagerHandle {
    factory: Arc<dyn LedgerClientFactory>,
    paths: ClientPaths,
    active: ArcSwapOption<ActiveClient>,
    init_lock: Mutex<()>,
    /// Completed initialization attempts, successful or not.
    attempts: AtomicU64,
}

impl ClientManagerHandle {
    pub fn new(factory: Arc<dyn LedgerClientFactory>, paths: ClientPaths) -> Self {
        Self {
            factory,
            paths,
            active: ArcSwapOption::empty(),
            init_lock: Mutex::new(()),
            attempts: AtomicU64::new(0),
        }
    }

    /// Make sure a client is initialized, initializing it if needed.
    pub async fn ensure_initialized(&self) -> bool {
        self.client().await.is_some()
    }

    /// Whether a client is currently held. Never triggers initialization.
    pub fn is_initialized(&self) -> bool {
        self.active.load().is_some()
    }

    /// Number of initialization attempts that have completed.
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::SeqCst)
    }

    async fn client(&self) -> Option<Arc<dyn LedgerClient>> {
        if let Some(active) = self.active.load_full() {
            return Some(active.0.clone());
        }

        let seen = self.attempts.load(Ordering::SeqCst);
        let _guard = self.init_lock.lock().await;

        if let Some(active) = self.active.load_full() {
            return Some(active.0.clone());
        }
        if self.attempts.load(Ordering::SeqCst) != seen {
            // The attempt we queued behind failed; report its result.
            return None;
        }

        let outcome = self.initialize().await;
        self.attempts.fetch_add(1, Ordering::SeqCst);
        metrics::record_client_init(outcome.is_some());

        if let Some(client) = &outcome {
            self.active.store(Some(Arc::new(ActiveClient(client.clone()))));
        }
        outcome
    }

    async fn initialize(&self) -> Option<Arc<dyn LedgerClient>> {
        tracing::info!(
            network_config = %self.paths.network_config,
            credential_store = %self.paths.credential_store,
            "Initializing ledger client"
        );

        let client = match self.factory.build(&self.paths) {
            Ok(client) => client,
            Err(e) => {
                tracing::error!(error = %e, "Unable to build ledger client");
                return None;
            }
        };

        match client.init().await {
            Ok(true) => {
                tracing::info!("Ledger client initialized");
                Some(client)
            }
            Ok(false) => {
                tracing::error!("Ledger client refused initialization");
                None
            }
            Err(e) => {
                tracing::error!(error = %e, "Ledger client initialization failed");
                None
            }
        }
    }

    async fn require(&self) -> LedgerResult<Arc<dyn LedgerClient>> {
        self.client()
            .await
            .ok_or_else(|| LedgerError::Configuration("ledger client is not initialized".into()))
    }

    pub async fn invoke_transaction(&self, request: &TransactionRequest) -> LedgerResult<ChainCodeResult> {
        let result = self.require().await?.invoke_transaction(request).await?;
        tracing::info!(
            channel = %request.channel,
            chaincode = %request.chaincode_id,
            method = %request.method,
            is_success = result.is_success,
            "Invoke result"
        );
        Ok(result)
    }

    pub async fn query(&self, request: &TransactionRequest) -> LedgerResult<Value> {
        self.require().await?.query(request).await
    }

    pub async fn get_channel_details(&self, org: &str, user_id: &str) -> LedgerResult<Value> {
        self.require().await?.get_channel_details(org, user_id).await
    }

    pub async fn get_installed_chaincode(&self, org: &str, user_id: &str) -> LedgerResult<Value> {
        self.require().await?.get_installed_chaincode(org, user_id).await
    }

    pub async fn get_instantiated_chaincodes(
        &self,
        channel_id: &str,
        org: &str,
        user_id: &str,
    ) -> LedgerResult<Value> {
        self.require()
            .await?
            .get_instantiated_chaincodes(channel_id, org, user_id)
            .await
    }

    pub async fn get_block_details(
        &self,
        block_number: u64,
        channel_id: &str,
        org: &str,
        user_id: &str,
    ) -> LedgerResult<Value> {
        self.require()
            .await?
            .get_block_details(block_number, channel_id, org, user_id)
            .await
    }

    pub async fn get_trxn_details(
        &self,
        trxn_id: &str,
        channel_id: &str,
        org: &str,
        user_id: &str,
    ) -> LedgerResult<Value> {
        self.require()
            .await?
            .get_trxn_details(trxn_id, channel_id, org, user_id)
            .await
    }
}

impl std::fmt::Debug for ClientManagerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientManagerHandle")
            .field("paths", &self.paths)
            .field("initialized", &self.is_initialized())
            .field("attempts", &self.attempts())
            .finish()
    }
}
