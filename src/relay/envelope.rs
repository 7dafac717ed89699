//! Frames exchanged with relay subscribers.
//!
//! Every server → subscriber frame is a `MessageResponse` serialized as
//! `{"isSuccess": bool, "message": string, "result": any}`.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const CONNECTION_ESTABLISHED: &str = "Connection established";
pub const BLOCK_EVENT_BROADCAST: &str = "Block event broadcast";
pub const EXECUTION_SUCCESSFUL: &str = "Execution successful";
pub const INVALID_ACTION: &str = "Invalid action sent";
pub const INVALID_MESSAGE: &str = "Invalid message sent";

/// Envelope for every frame the relay sends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageResponse<T = Value> {
    #[serde(rename = "isSuccess")]
    pub is_success: bool,
    pub message: String,
    pub result: T,
}

/// Current time in the format subscribers receive it.
pub fn timestamp() -> Value {
    Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true))
}

impl MessageResponse {
    pub fn connection_established() -> Self {
        Self::ok(CONNECTION_ESTABLISHED, timestamp())
    }

    pub fn executed() -> Self {
        Self::ok(EXECUTION_SUCCESSFUL, timestamp())
    }

    pub fn invalid_action() -> Self {
        Self::rejected(INVALID_ACTION)
    }

    pub fn invalid_message() -> Self {
        Self::rejected(INVALID_MESSAGE)
    }

    fn ok(message: &str, result: Value) -> Self {
        Self {
            is_success: true,
            message: message.to_string(),
            result,
        }
    }

    fn rejected(message: &str) -> Self {
        Self {
            is_success: false,
            message: message.to_string(),
            result: Value::Null,
        }
    }
}

impl<'a> MessageResponse<&'a Value> {
    /// Wrap a block without copying it.
    pub fn block_broadcast(block: &'a Value) -> Self {
        Self {
            is_success: true,
            message: BLOCK_EVENT_BROADCAST.to_string(),
            result: block,
        }
    }
}

impl<T: Serialize> MessageResponse<T> {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Answer a subscriber's text frame.
///
/// Any JSON value whose `action` member is a string is acknowledged. Other
/// JSON (scalars, arrays, objects without a string `action`) is an invalid
/// action. Text that does not parse as JSON is an invalid message.
pub fn handle_command(text: &str) -> MessageResponse {
    let value = match serde_json::from_str::<Value>(text) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(error = %e, "Invalid message format from subscriber");
            return MessageResponse::invalid_message();
        }
    };

    match value.get("action").and_then(Value::as_str) {
        Some(action) => {
            tracing::debug!(action = %action, "Subscriber action received");
            MessageResponse::executed()
        }
        None => MessageResponse::invalid_action(),
    }
}
