//! HTTP API.
//!
//! ```text
//! request
//!     → request.rs (x-request-id, span)
//!     → api.rs (extract body / query string)
//!     → dispatch::RequestDispatcher (validate, call ledger, normalize)
//!     → ServiceReply (status + {status, message, result})
//! ```

pub mod api;
pub mod request;
pub mod server;

pub use request::X_REQUEST_ID;
pub use server::{AppState, GatewayServer};
