//! Block-event relay.
//!
//! ```text
//! ledger events_url ──► subscription.rs (init, register, reconnect)
//!                           │ PeerEvent::Block
//!                           ▼
//!                       registry.rs (fan-out, drop-new on full queues,
//!                                    missed-probe liveness)
//!                           │ MessageResponse frames
//!                           ▼
//!                       server.rs (WebSocket sessions, heartbeat sweep)
//! ```

pub mod envelope;
pub mod registry;
pub mod server;
pub mod subscription;

pub use envelope::{handle_command, MessageResponse};
pub use registry::{BroadcastReport, Outbound, Subscriber, SubscriberRegistry, SweepReport};
pub use server::{RelayError, RelayServer};
pub use subscription::{EventSubscription, SubscriptionError, SubscriptionState};
