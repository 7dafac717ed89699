//! Ledger request/response types and error definitions.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// A validated chaincode invoke or query request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRequest {
    pub channel: String,
    #[serde(rename = "ccid")]
    pub chaincode_id: String,
    #[serde(rename = "fn")]
    pub method: String,
    pub org: String,
    #[serde(rename = "invokerRole")]
    pub invoker_role: String,
    pub args: Vec<Value>,
}

/// Outcome of a chaincode invocation as reported by the ledger client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainCodeResult {
    #[serde(rename = "isSuccess")]
    pub is_success: bool,
    pub message: String,
    #[serde(default)]
    pub result: Value,
}

impl ChainCodeResult {
    pub fn success(message: impl Into<String>, result: Value) -> Self {
        Self {
            is_success: true,
            message: message.into(),
            result,
        }
    }

    pub fn failure(message: impl Into<String>, result: Value) -> Self {
        Self {
            is_success: false,
            message: message.into(),
            result,
        }
    }
}

/// Opaque block payload, relayed verbatim.
pub type BlockEvent = Value;

/// Event delivered by an upstream block-event registration.
#[derive(Debug, Clone, PartialEq)]
pub enum PeerEvent {
    /// A block was committed on `peer_id`.
    Block { peer_id: String, block: BlockEvent },
    /// The event hub connection to `peer_id` dropped.
    Disconnected { peer_id: String, reason: String },
}

/// Errors surfaced by the ledger capability.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Client could not be built or initialized.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Connection-level failure talking to the ledger network.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The ledger network answered with an error.
    #[error("Upstream error ({status}): {message}")]
    Upstream { status: u16, message: String },

    /// Event stream protocol violation.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Payload could not be (de)serialized.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;
