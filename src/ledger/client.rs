//! Ledger client capability.
//!
//! The gateway never talks to peers or orderers itself. Everything it needs
//! from the ledger network goes through [`LedgerClient`]; how a client is
//! built is the business of a [`LedgerClientFactory`].

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use serde_json::Value;
use std::sync::Arc;

use crate::config::LedgerConfig;
use crate::ledger::types::{ChainCodeResult, LedgerResult, PeerEvent, TransactionRequest};

/// Stream of events produced by a block-event registration.
///
/// The stream ending is treated the same as a `PeerEvent::Disconnected`.
pub type BlockEventStream = BoxStream<'static, PeerEvent>;

/// Asynchronous capability interface to the ledger network.
///
/// Implementations must be safe for concurrent use: once initialized, a
/// client is shared by every in-flight request without further locking.
/// `query` and the introspection getters return raw upstream values; shape
/// normalization happens in the dispatch layer.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Connect and load credentials. `Ok(false)` means a clean refusal.
    async fn init(&self) -> LedgerResult<bool>;

    /// Subscribe to block commits.
    async fn register_for_block_event(&self) -> LedgerResult<BlockEventStream>;

    async fn invoke_transaction(&self, request: &TransactionRequest) -> LedgerResult<ChainCodeResult>;

    async fn query(&self, request: &TransactionRequest) -> LedgerResult<Value>;

    async fn get_channel_details(&self, org: &str, user_id: &str) -> LedgerResult<Value>;

    async fn get_installed_chaincode(&self, org: &str, user_id: &str) -> LedgerResult<Value>;

    async fn get_instantiated_chaincodes(
        &self,
        channel_id: &str,
        org: &str,
        user_id: &str,
    ) -> LedgerResult<Value>;

    async fn get_block_details(
        &self,
        block_number: u64,
        channel_id: &str,
        org: &str,
        user_id: &str,
    ) -> LedgerResult<Value>;

    async fn get_trxn_details(
        &self,
        trxn_id: &str,
        channel_id: &str,
        org: &str,
        user_id: &str,
    ) -> LedgerResult<Value>;
}

/// Fixed file locations a client is constructed from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientPaths {
    /// Network topology file.
    pub network_config: String,
    /// Credential store directory.
    pub credential_store: String,
    /// User credential file.
    pub user_credentials: String,
}

impl From<&LedgerConfig> for ClientPaths {
    fn from(config: &LedgerConfig) -> Self {
        Self {
            network_config: config.network_config_path.clone(),
            credential_store: config.credential_store_path.clone(),
            user_credentials: config.user_credential_path.clone(),
        }
    }
}

/// Builds (but does not initialize) ledger clients.
pub trait LedgerClientFactory: Send + Sync {
    fn build(&self, paths: &ClientPaths) -> LedgerResult<Arc<dyn LedgerClient>>;
}

impl<F> LedgerClientFactory for F
where
    F: Fn(&ClientPaths) -> LedgerResult<Arc<dyn LedgerClient>> + Send + Sync,
{
    fn build(&self, paths: &ClientPaths) -> LedgerResult<Arc<dyn LedgerClient>> {
        self(paths)
    }
}
