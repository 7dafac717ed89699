//! Request validation and dispatch into the ledger client manager.
//!
//! Every operation follows the same shape: validate, call the manager,
//! normalize, and map the outcome onto a [`ServiceReply`]. Faults are
//! logged and reported, never retried.

use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

use crate::dispatch::normalize::normalize;
use crate::dispatch::response::ServiceReply;
use crate::ledger::{ClientManagerHandle, LedgerError, LedgerResult, TransactionRequest};

const INVALID_INPUTS: &str = "Invalid inputs provided";
const NO_RECORDS: &str = "No records found";
const QUERY_FAILED: &str = "Error in invoking query";
const CONFIGURATION_ERROR: &str = "Configuration error";

/// Raw invoke/query body as received on the wire. Validated into a
/// [`TransactionRequest`] before anything reaches the ledger.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransactionPayload {
    pub channel: Option<String>,
    pub ccid: Option<String>,
    #[serde(rename = "fn")]
    pub method: Option<String>,
    pub org: Option<String>,
    #[serde(rename = "invokerRole")]
    pub invoker_role: Option<String>,
    pub args: Option<Value>,
}

impl TransactionPayload {
    /// All six fields present, strings non-empty, `args` an array.
    pub fn validate(self) -> Option<TransactionRequest> {
        let args = match self.args {
            Some(Value::Array(args)) => args,
            _ => return None,
        };
        Some(TransactionRequest {
            channel: required(self.channel)?,
            chaincode_id: required(self.ccid)?,
            method: required(self.method)?,
            org: required(self.org)?,
            invoker_role: required(self.invoker_role)?,
            args,
        })
    }
}

/// Query-string parameters shared by the introspection endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerQuery {
    pub org: Option<String>,
    pub user_id: Option<String>,
    pub channel_id: Option<String>,
    pub block_num: Option<String>,
    pub trxn_id: Option<String>,
}

fn required(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

/// Validates requests and drives them through the client manager.
#[derive(Debug, Clone)]
pub struct RequestDispatcher {
    manager: Arc<ClientManagerHandle>,
}

impl RequestDispatcher {
    pub fn new(manager: Arc<ClientManagerHandle>) -> Self {
        Self { manager }
    }

    pub fn manager(&self) -> &Arc<ClientManagerHandle> {
        &self.manager
    }

    /// Submit a chaincode transaction.
    pub async fn invoke(&self, payload: TransactionPayload) -> ServiceReply {
        let Some(request) = payload.validate() else {
            return finish("invoke", ServiceReply::input_error(INVALID_INPUTS));
        };
        tracing::info!(
            channel = %request.channel,
            chaincode = %request.chaincode_id,
            method = %request.method,
            org = %request.org,
            "Invoke requested"
        );

        let reply = match self.manager.invoke_transaction(&request).await {
            Ok(outcome) if outcome.is_success => match serde_json::to_value(&outcome) {
                Ok(result) => ServiceReply::success("Chain code invoke completed successfully", result),
                Err(e) => fault("invoke", &e),
            },
            Ok(outcome) => ServiceReply::error("Unable to complete invoke chain code", Some(outcome.result)),
            Err(e) => ledger_failure("invoke", e),
        };
        finish("invoke", reply)
    }

    /// Evaluate a chaincode query.
    pub async fn query(&self, payload: TransactionPayload) -> ServiceReply {
        let Some(request) = payload.validate() else {
            return finish("query", ServiceReply::input_error(INVALID_INPUTS));
        };
        tracing::info!(
            channel = %request.channel,
            chaincode = %request.chaincode_id,
            method = %request.method,
            org = %request.org,
            "Query requested"
        );

        let result = self.manager.query(&request).await;
        finish("query", records("query", "Chain code query completed successfully", result))
    }

    /// Force client initialization.
    pub async fn init(&self) -> ServiceReply {
        let reply = if self.manager.ensure_initialized().await {
            ServiceReply::success("Ledger client initialized successfully", Value::Bool(true))
        } else {
            ServiceReply::error("Ledger client initialization failure", None)
        };
        finish("init", reply)
    }

    /// Channels the org's peers have joined.
    pub async fn channels(&self, params: &LedgerQuery) -> ServiceReply {
        let (Some(org), Some(user_id)) = (present(&params.org), present(&params.user_id)) else {
            return finish("channels", ServiceReply::input_error(INVALID_INPUTS));
        };
        tracing::info!(org, user_id, "Channel details requested");

        let result = self.manager.get_channel_details(org, user_id).await;
        finish("channels", records("channels", "Retrieved channel details successfully", result))
    }

    /// Chaincodes installed on the org's peers.
    pub async fn installed_chaincodes(&self, params: &LedgerQuery) -> ServiceReply {
        let (Some(org), Some(user_id)) = (present(&params.org), present(&params.user_id)) else {
            return finish("installed_chaincodes", ServiceReply::input_error(INVALID_INPUTS));
        };
        tracing::info!(org, user_id, "Installed chaincodes requested");

        let result = self.manager.get_installed_chaincode(org, user_id).await;
        finish(
            "installed_chaincodes",
            records(
                "installed_chaincodes",
                "Retrieved installed chain code details successfully",
                result,
            ),
        )
    }

    /// Chaincodes instantiated on a channel.
    pub async fn instantiated_chaincodes(&self, params: &LedgerQuery) -> ServiceReply {
        let (Some(org), Some(user_id), Some(channel_id)) = (
            present(&params.org),
            present(&params.user_id),
            present(&params.channel_id),
        ) else {
            return finish("instantiated_chaincodes", ServiceReply::input_error(INVALID_INPUTS));
        };
        tracing::info!(org, user_id, channel_id, "Instantiated chaincodes requested");

        let result = self
            .manager
            .get_instantiated_chaincodes(channel_id, org, user_id)
            .await;
        finish(
            "instantiated_chaincodes",
            records(
                "instantiated_chaincodes",
                "Retrieved instantiated chain code details successfully",
                result,
            ),
        )
    }

    /// A block by number.
    pub async fn block(&self, params: &LedgerQuery) -> ServiceReply {
        let block_number = present(&params.block_num).and_then(|n| n.trim().parse::<u64>().ok());
        let (Some(block_number), Some(org), Some(user_id), Some(channel_id)) = (
            block_number,
            present(&params.org),
            present(&params.user_id),
            present(&params.channel_id),
        ) else {
            return finish("block", ServiceReply::input_error("Invalid block number or inputs"));
        };
        tracing::info!(org, user_id, channel_id, block_number, "Block details requested");

        let result = self
            .manager
            .get_block_details(block_number, channel_id, org, user_id)
            .await;
        finish("block", records("block", "Retrieved block details successfully", result))
    }

    /// A transaction by id.
    pub async fn transaction(&self, params: &LedgerQuery) -> ServiceReply {
        let (Some(trxn_id), Some(org), Some(user_id), Some(channel_id)) = (
            present(&params.trxn_id),
            present(&params.org),
            present(&params.user_id),
            present(&params.channel_id),
        ) else {
            return finish("transaction", ServiceReply::input_error(INVALID_INPUTS));
        };
        tracing::info!(org, user_id, channel_id, trxn_id, "Transaction details requested");

        let result = self
            .manager
            .get_trxn_details(trxn_id, channel_id, org, user_id)
            .await;
        finish(
            "transaction",
            records("transaction", "Retrieved transaction details successfully", result),
        )
    }
}

/// Map a query-shaped upstream result onto a reply.
fn records(operation: &'static str, success_message: &str, result: LedgerResult<Value>) -> ServiceReply {
    let value = match result {
        Ok(value) => value,
        Err(e) => return ledger_failure(operation, e),
    };
    match normalize(value) {
        Ok(Some(records)) if records.is_empty() => ServiceReply::success(NO_RECORDS, Value::Array(records)),
        Ok(Some(records)) => {
            tracing::debug!(operation, count = records.len(), "Retrieved records");
            ServiceReply::success(success_message, Value::Array(records))
        }
        Ok(None) => ServiceReply::error(QUERY_FAILED, None),
        Err(e) => fault(operation, &e),
    }
}

fn ledger_failure(operation: &'static str, error: LedgerError) -> ServiceReply {
    match error {
        LedgerError::Configuration(reason) => {
            tracing::warn!(operation, reason = %reason, "Ledger client unavailable");
            ServiceReply::error(CONFIGURATION_ERROR, None)
        }
        other => fault(operation, &other),
    }
}

fn fault(operation: &'static str, error: &dyn std::error::Error) -> ServiceReply {
    tracing::error!(operation, error = %error, "Request failed");
    ServiceReply::fault(error.to_string())
}

fn finish(operation: &'static str, reply: ServiceReply) -> ServiceReply {
    tracing::info!(
        operation,
        status = ?reply.status(),
        http_status = reply.http_status.as_u16(),
        "Request completed"
    );
    reply
}
