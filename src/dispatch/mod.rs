//! Request/response dispatch subsystem.
//!
//! # Data Flow
//! ```text
//! HTTP handler (http/api.rs)
//!     → dispatcher.rs (validate, call ClientManagerHandle)
//!     → normalize.rs (array / JSON string / object / null → Option<Vec<Value>>)
//!     → response.rs (ServiceReply: body + consistent HTTP status)
//! ```
//!
//! # Design Decisions
//! - Validation failures never reach the ledger
//! - Absent results and empty results stay distinct end to end
//! - Faults are reported with their message (501), never retried

pub mod dispatcher;
pub mod normalize;
pub mod response;

pub use dispatcher::{LedgerQuery, RequestDispatcher, TransactionPayload};
pub use normalize::{normalize, NormalizeError};
pub use response::{ServiceReply, ServiceResponse, ServiceStatus};
