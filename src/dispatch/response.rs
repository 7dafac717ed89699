//! Uniform service response envelope.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Outcome classification carried in every response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServiceStatus {
    Success,
    Error,
    #[serde(rename = "Input Error")]
    InputError,
}

/// Body returned by every API endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceResponse {
    pub status: ServiceStatus,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
}

/// A response body paired with the HTTP status it is written with.
///
/// Constructors keep the two consistent: success → 200, input and
/// business errors → 400, unexpected faults → 501.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceReply {
    pub http_status: StatusCode,
    pub body: ServiceResponse,
}

impl ServiceReply {
    pub fn success(message: impl Into<String>, result: Value) -> Self {
        Self::build(StatusCode::OK, ServiceStatus::Success, message, Some(result))
    }

    pub fn input_error(message: impl Into<String>) -> Self {
        Self::build(StatusCode::BAD_REQUEST, ServiceStatus::InputError, message, None)
    }

    pub fn error(message: impl Into<String>, result: Option<Value>) -> Self {
        Self::build(StatusCode::BAD_REQUEST, ServiceStatus::Error, message, result)
    }

    pub fn fault(message: impl Into<String>) -> Self {
        Self::build(StatusCode::NOT_IMPLEMENTED, ServiceStatus::Error, message, None)
    }

    fn build(
        http_status: StatusCode,
        status: ServiceStatus,
        message: impl Into<String>,
        result: Option<Value>,
    ) -> Self {
        Self {
            http_status,
            body: ServiceResponse {
                status,
                message: message.into(),
                result,
            },
        }
    }

    pub fn status(&self) -> ServiceStatus {
        self.body.status
    }
}

impl IntoResponse for ServiceReply {
    fn into_response(self) -> Response {
        (self.http_status, Json(self.body)).into_response()
    }
}
