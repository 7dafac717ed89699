//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the ledger gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Request/response API listener (bind address, TLS).
    pub listener: ListenerConfig,

    /// Block event relay settings.
    pub relay: RelayConfig,

    /// Upstream ledger client settings.
    pub ledger: LedgerConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Optional TLS configuration.
    pub tls: Option<TlsConfig>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            tls: None,
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// Block event relay configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Run the relay alongside the API.
    pub enabled: bool,

    /// WebSocket bind address for subscribers.
    pub bind_address: String,

    /// Organization whose peer feeds block events.
    pub org: String,

    /// Interval between liveness sweeps (ping probes) in seconds.
    pub heartbeat_interval_secs: u64,

    /// Per-subscriber outbound queue depth. Frames beyond it are dropped.
    pub outbound_queue_capacity: usize,

    /// Consecutive unanswered probes before a subscriber is dead.
    pub max_missed_probes: u32,

    /// Minimum wait before re-subscribing after a disconnect.
    pub reconnect_interval_ms: u64,

    /// Upper bound for the reconnect delay after repeated failures.
    pub reconnect_max_delay_ms: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_address: "0.0.0.0:9000".to_string(),
            org: "custodian".to_string(),
            heartbeat_interval_secs: 30,
            outbound_queue_capacity: 256,
            max_missed_probes: 2,
            reconnect_interval_ms: 1000,
            reconnect_max_delay_ms: 30_000,
        }
    }
}

/// Upstream ledger client configuration.
///
/// The three paths are handed to the client factory verbatim whenever the
/// client manager builds a new client.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Base URL of the ledger REST bridge.
    pub gateway_url: String,

    /// WebSocket URL of the peer event endpoint.
    pub events_url: String,

    /// Network topology file (JSON with a `network-config` root key).
    pub network_config_path: String,

    /// Credential store directory.
    pub credential_store_path: String,

    /// User credential file.
    pub user_credential_path: String,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            gateway_url: "http://localhost:7050".to_string(),
            events_url: "ws://localhost:7053/events".to_string(),
            network_config_path: "network-config.json".to_string(),
            credential_store_path: "~/credstore".to_string(),
            user_credential_path: "user-cred-config.json".to_string(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9091".to_string(),
        }
    }
}
