//! Process lifecycle.
//!
//! ```text
//! Ctrl+C / SIGTERM (signals.rs)
//!     → Shutdown::trigger (shutdown.rs)
//!     → HTTP server drains in-flight requests
//!     → relay stops accepting and closes subscribers
//! ```
//!
//! The upstream block-event subscription is not cancellable; it ends with
//! the process.

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
pub use signals::shutdown_signal;
