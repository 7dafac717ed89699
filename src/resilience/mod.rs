//! Resilience helpers.
//!
//! The gateway never retries client requests. The only automatic retry is
//! the relay's upstream block-event subscription, paced by
//! [`ReconnectPolicy`].

pub mod backoff;

pub use backoff::ReconnectPolicy;
