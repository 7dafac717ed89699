//! Endpoint handlers.
//!
//! Handlers only adapt HTTP extraction onto [`RequestDispatcher`]; all
//! validation and status mapping lives in the dispatch layer. Bodies or
//! query strings that cannot be extracted at all are answered as input
//! errors.

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::any::Any;
use std::future::Future;
use std::time::Instant;

use crate::dispatch::{LedgerQuery, ServiceReply, TransactionPayload};
use crate::http::server::AppState;
use crate::observability::metrics;

const INVALID_INPUTS: &str = "Invalid inputs provided";

async fn timed(endpoint: &'static str, reply: impl Future<Output = ServiceReply>) -> ServiceReply {
    let start = Instant::now();
    let reply = reply.await;
    metrics::record_request(endpoint, reply.http_status.as_u16(), start);
    reply
}

fn unreadable(endpoint: &'static str, reason: String) -> ServiceReply {
    tracing::warn!(endpoint, reason = %reason, "Rejected unreadable request");
    metrics::record_request(endpoint, 400, Instant::now());
    ServiceReply::input_error(INVALID_INPUTS)
}

/// `POST /invoke`
pub async fn invoke(
    State(state): State<AppState>,
    payload: Result<Json<TransactionPayload>, JsonRejection>,
) -> ServiceReply {
    match payload {
        Ok(Json(payload)) => timed("invoke", state.dispatcher.invoke(payload)).await,
        Err(rejection) => unreadable("invoke", rejection.body_text()),
    }
}

/// `POST /query`
pub async fn query(
    State(state): State<AppState>,
    payload: Result<Json<TransactionPayload>, JsonRejection>,
) -> ServiceReply {
    match payload {
        Ok(Json(payload)) => timed("query", state.dispatcher.query(payload)).await,
        Err(rejection) => unreadable("query", rejection.body_text()),
    }
}

/// `PUT /init`
pub async fn init(State(state): State<AppState>) -> ServiceReply {
    timed("init", state.dispatcher.init()).await
}

/// `GET /channels?org&userId`
pub async fn channels(
    State(state): State<AppState>,
    params: Result<Query<LedgerQuery>, QueryRejection>,
) -> ServiceReply {
    match params {
        Ok(Query(params)) => timed("channels", state.dispatcher.channels(&params)).await,
        Err(rejection) => unreadable("channels", rejection.body_text()),
    }
}

/// `GET /chaincodes/installed?org&userId`
pub async fn installed_chaincodes(
    State(state): State<AppState>,
    params: Result<Query<LedgerQuery>, QueryRejection>,
) -> ServiceReply {
    match params {
        Ok(Query(params)) => {
            timed("installed_chaincodes", state.dispatcher.installed_chaincodes(&params)).await
        }
        Err(rejection) => unreadable("installed_chaincodes", rejection.body_text()),
    }
}

/// `GET /chaincodes/instantiated?org&userId&channelId`
pub async fn instantiated_chaincodes(
    State(state): State<AppState>,
    params: Result<Query<LedgerQuery>, QueryRejection>,
) -> ServiceReply {
    match params {
        Ok(Query(params)) => {
            timed("instantiated_chaincodes", state.dispatcher.instantiated_chaincodes(&params)).await
        }
        Err(rejection) => unreadable("instantiated_chaincodes", rejection.body_text()),
    }
}

/// `GET /block?org&userId&channelId&blockNum`
pub async fn block(
    State(state): State<AppState>,
    params: Result<Query<LedgerQuery>, QueryRejection>,
) -> ServiceReply {
    match params {
        Ok(Query(params)) => timed("block", state.dispatcher.block(&params)).await,
        Err(rejection) => unreadable("block", rejection.body_text()),
    }
}

/// `GET /trxn?org&userId&channelId&trxnId`
pub async fn transaction(
    State(state): State<AppState>,
    params: Result<Query<LedgerQuery>, QueryRejection>,
) -> ServiceReply {
    match params {
        Ok(Query(params)) => timed("transaction", state.dispatcher.transaction(&params)).await,
        Err(rejection) => unreadable("transaction", rejection.body_text()),
    }
}

/// `GET /health`. Liveness only; never touches the ledger.
pub async fn health(State(state): State<AppState>) -> Response {
    let manager = state.dispatcher.manager();
    Json(json!({
        "status": "ok",
        "ledgerInitialized": manager.is_initialized(),
        "initAttempts": manager.attempts(),
    }))
    .into_response()
}

/// Convert a handler panic into the uniform fault reply.
pub fn panic_reply(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    tracing::error!(detail, "Request handler panicked");
    ServiceReply::fault("Internal server error").into_response()
}
