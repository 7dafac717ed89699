//! Ledger client backed by a REST bridge and a WebSocket event hub.
//!
//! # Responsibilities
//! - Validate the network topology and user credential files on `init`
//! - Map capability calls onto the bridge's JSON endpoints
//! - Turn the event hub WebSocket into a stream of `PeerEvent`s

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::{Method, RequestBuilder};
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use url::Url;

use crate::config::LedgerConfig;
use crate::ledger::client::{BlockEventStream, ClientPaths, LedgerClient, LedgerClientFactory};
use crate::ledger::types::{ChainCodeResult, LedgerError, LedgerResult, PeerEvent, TransactionRequest};

/// Header carrying the organization a call is made on behalf of.
pub const ORG_HEADER: &str = "x-ledger-org";
/// Header carrying the enrolled user (or role) making the call.
pub const USER_HEADER: &str = "x-ledger-user";

/// Root key of the network topology file.
const NETWORK_CONFIG_KEY: &str = "network-config";

/// Ledger client speaking to a REST bridge in front of the peer network.
#[derive(Clone)]
pub struct RemoteLedgerClient {
    http: reqwest::Client,
    gateway_url: Url,
    events_url: Url,
    paths: ClientPaths,
    /// Organization whose section must exist in the topology, and whose
    /// peer feeds block events.
    org: Option<String>,
}

impl RemoteLedgerClient {
    pub fn new(config: &LedgerConfig, paths: ClientPaths, org: Option<String>) -> LedgerResult<Self> {
        let gateway_url = Url::parse(&config.gateway_url).map_err(|e| {
            LedgerError::Configuration(format!("Invalid gateway URL '{}': {}", config.gateway_url, e))
        })?;
        let events_url = Url::parse(&config.events_url).map_err(|e| {
            LedgerError::Configuration(format!("Invalid events URL '{}': {}", config.events_url, e))
        })?;

        Ok(Self {
            http: reqwest::Client::new(),
            gateway_url,
            events_url,
            paths,
            org,
        })
    }

    fn endpoint(&self, segments: &[&str]) -> LedgerResult<Url> {
        let mut url = self.gateway_url.clone();
        url.path_segments_mut()
            .map_err(|_| LedgerError::Configuration("gateway URL cannot be a base".into()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url, org: &str, user: &str) -> RequestBuilder {
        self.http
            .request(method, url)
            .header(ORG_HEADER, org)
            .header(USER_HEADER, user)
    }

    async fn send(&self, builder: RequestBuilder) -> LedgerResult<Value> {
        let response = builder
            .send()
            .await
            .map_err(|e| LedgerError::Transport(e.to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| LedgerError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(LedgerError::Upstream {
                status: status.as_u16(),
                message: upstream_message(&body),
            });
        }
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&body)?)
    }

    async fn load_json(path: &str) -> LedgerResult<Value> {
        let content = tokio::fs::read_to_string(Path::new(path))
            .await
            .map_err(|e| LedgerError::Configuration(format!("Unable to read '{}': {}", path, e)))?;
        Ok(serde_json::from_str(&content)?)
    }

    fn chaincode_body(request: &TransactionRequest) -> Value {
        json!({
            "fn": request.method,
            "args": request.args,
        })
    }
}

/// Prefer the bridge's `message` field; fall back to the raw body.
fn upstream_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

/// Split an event hub frame into `(peer_id, block)`.
///
/// Frames are either `{"peerId": .., "block": ..}` or a bare block.
fn parse_block_frame(text: &str, default_peer: &str) -> Result<(String, Value), serde_json::Error> {
    let mut frame: Value = serde_json::from_str(text)?;
    match frame.get_mut("block").map(Value::take) {
        Some(block) => {
            let peer = frame
                .get("peerId")
                .and_then(Value::as_str)
                .unwrap_or(default_peer)
                .to_string();
            Ok((peer, block))
        }
        None => Ok((default_peer.to_string(), frame)),
    }
}

#[async_trait]
impl LedgerClient for RemoteLedgerClient {
    async fn init(&self) -> LedgerResult<bool> {
        let topology = Self::load_json(&self.paths.network_config).await?;
        let Some(network) = topology.get(NETWORK_CONFIG_KEY) else {
            tracing::error!(path = %self.paths.network_config, "Topology file has no network-config section");
            return Ok(false);
        };
        if let Some(org) = &self.org {
            if network.get(org).is_none() {
                tracing::error!(org = %org, "Organization missing from network topology");
                return Ok(false);
            }
        }
        Self::load_json(&self.paths.user_credentials).await?;
        tracing::debug!(credential_store = %self.paths.credential_store, "Credentials loaded");

        let health = self.endpoint(&["health"])?;
        let response = self
            .http
            .get(health)
            .send()
            .await
            .map_err(|e| LedgerError::Transport(e.to_string()))?;
        Ok(response.status().is_success())
    }

    async fn register_for_block_event(&self) -> LedgerResult<BlockEventStream> {
        let mut url = self.events_url.clone();
        if let Some(org) = &self.org {
            url.query_pairs_mut().append_pair("org", org);
        }

        let (ws, _) = connect_async(url.as_str())
            .await
            .map_err(|e| LedgerError::Transport(format!("Event hub connect failed: {}", e)))?;
        tracing::info!(url = %url, "Registered for block events");

        let peer = url.host_str().unwrap_or("peer").to_string();
        let stream = futures_util::stream::unfold(Some(ws), move |state| {
            let peer = peer.clone();
            async move {
                let mut ws = state?;
                loop {
                    let event = match ws.next().await {
                        Some(Ok(Message::Text(text))) => match parse_block_frame(text.as_str(), &peer) {
                            Ok((peer_id, block)) => PeerEvent::Block { peer_id, block },
                            Err(e) => {
                                tracing::warn!(error = %e, "Skipping malformed block frame");
                                continue;
                            }
                        },
                        Some(Ok(Message::Close(frame))) => PeerEvent::Disconnected {
                            peer_id: peer,
                            reason: frame
                                .map(|f| f.reason.to_string())
                                .unwrap_or_else(|| "closed by peer".to_string()),
                        },
                        Some(Ok(_)) => continue,
                        Some(Err(e)) => PeerEvent::Disconnected {
                            peer_id: peer,
                            reason: e.to_string(),
                        },
                        None => PeerEvent::Disconnected {
                            peer_id: peer,
                            reason: "event stream ended".to_string(),
                        },
                    };
                    let next = match event {
                        PeerEvent::Block { .. } => Some(ws),
                        PeerEvent::Disconnected { .. } => None,
                    };
                    return Some((event, next));
                }
            }
        });

        Ok(stream.boxed())
    }

    async fn invoke_transaction(&self, request: &TransactionRequest) -> LedgerResult<ChainCodeResult> {
        let url = self.endpoint(&["channels", &request.channel, "chaincodes", &request.chaincode_id, "invoke"])?;
        let builder = self
            .request(Method::POST, url, &request.org, &request.invoker_role)
            .json(&Self::chaincode_body(request));

        match self.send(builder).await {
            Ok(value) => Ok(serde_json::from_value(value)?),
            Err(LedgerError::Upstream { message, .. }) => {
                Ok(ChainCodeResult::failure(message.clone(), Value::String(message)))
            }
            Err(e) => Err(e),
        }
    }

    async fn query(&self, request: &TransactionRequest) -> LedgerResult<Value> {
        let url = self.endpoint(&["channels", &request.channel, "chaincodes", &request.chaincode_id, "query"])?;
        let builder = self
            .request(Method::POST, url, &request.org, &request.invoker_role)
            .json(&Self::chaincode_body(request));
        self.send(builder).await
    }

    async fn get_channel_details(&self, org: &str, user_id: &str) -> LedgerResult<Value> {
        let url = self.endpoint(&["channels"])?;
        self.send(self.request(Method::GET, url, org, user_id)).await
    }

    async fn get_installed_chaincode(&self, org: &str, user_id: &str) -> LedgerResult<Value> {
        let url = self.endpoint(&["chaincodes", "installed"])?;
        self.send(self.request(Method::GET, url, org, user_id)).await
    }

    async fn get_instantiated_chaincodes(
        &self,
        channel_id: &str,
        org: &str,
        user_id: &str,
    ) -> LedgerResult<Value> {
        let url = self.endpoint(&["channels", channel_id, "chaincodes", "instantiated"])?;
        self.send(self.request(Method::GET, url, org, user_id)).await
    }

    async fn get_block_details(
        &self,
        block_number: u64,
        channel_id: &str,
        org: &str,
        user_id: &str,
    ) -> LedgerResult<Value> {
        let block = block_number.to_string();
        let url = self.endpoint(&["channels", channel_id, "blocks", &block])?;
        self.send(self.request(Method::GET, url, org, user_id)).await
    }

    async fn get_trxn_details(
        &self,
        trxn_id: &str,
        channel_id: &str,
        org: &str,
        user_id: &str,
    ) -> LedgerResult<Value> {
        let url = self.endpoint(&["channels", channel_id, "transactions", trxn_id])?;
        self.send(self.request(Method::GET, url, org, user_id)).await
    }
}

impl std::fmt::Debug for RemoteLedgerClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteLedgerClient")
            .field("gateway_url", &self.gateway_url.as_str())
            .field("events_url", &self.events_url.as_str())
            .field("org", &self.org)
            .finish()
    }
}

/// Factory handing out [`RemoteLedgerClient`]s for the client manager.
#[derive(Debug, Clone)]
pub struct RemoteLedgerFactory {
    config: LedgerConfig,
}

impl RemoteLedgerFactory {
    pub fn new(config: LedgerConfig) -> Self {
        Self { config }
    }
}

impl LedgerClientFactory for RemoteLedgerFactory {
    fn build(&self, paths: &ClientPaths) -> LedgerResult<Arc<dyn LedgerClient>> {
        Ok(Arc::new(RemoteLedgerClient::new(&self.config, paths.clone(), None)?))
    }
}
