//! Ledger integration subsystem.
//!
//! # Data Flow
//! ```text
//! API request
//!     → manager.rs (lazy init-once handle, shared by all requests)
//!     → client.rs (LedgerClient capability)
//!     → remote.rs (REST bridge + event hub WebSocket)
//!
//! Relay
//!     → client.rs register_for_block_event (stream of PeerEvent)
//! ```
//!
//! # Design Decisions
//! - The gateway never signs, endorses or orders; it only calls the capability
//! - Clients are built by a factory so tests can script the ledger
//! - No timeouts on ledger calls: a hung call hangs its request

pub mod client;
pub mod manager;
pub mod remote;
pub mod types;

pub use client::{BlockEventStream, ClientPaths, LedgerClient, LedgerClientFactory};
pub use manager::ClientManagerHandle;
pub use remote::{RemoteLedgerClient, RemoteLedgerFactory};
pub use types::{BlockEvent, ChainCodeResult, LedgerError, LedgerResult, PeerEvent, TransactionRequest};
