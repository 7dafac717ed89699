//! Ledger Gateway Library
//!
//! Request/response façade over a ledger network client plus a real-time
//! relay that fans block-commit events out to WebSocket subscribers.

pub mod config;
pub mod dispatch;
pub mod http;
pub mod ledger;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod relay;
pub mod resilience;

pub use config::schema::GatewayConfig;
pub use http::GatewayServer;
pub use lifecycle::Shutdown;
pub use relay::RelayServer;
