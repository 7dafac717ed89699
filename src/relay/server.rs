//! Relay WebSocket listener.
//!
//! Consumers connect to `/`, receive a confirmation frame, and from then on
//! every block event the upstream subscription delivers.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
    routing::get,
    Router,
};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{debug, info, instrument, warn};

use crate::config::RelayConfig;
use crate::lifecycle::shutdown;
use crate::ledger::LedgerClient;
use crate::relay::envelope::{handle_command, MessageResponse};
use crate::relay::registry::{Outbound, Subscriber, SubscriberRegistry};
use crate::relay::subscription::{EventSubscription, SubscriptionError};
use crate::resilience::ReconnectPolicy;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error(transparent)]
    Subscription(#[from] SubscriptionError),

    #[error("Relay listener error: {0}")]
    Io(#[from] std::io::Error),
}

/// Block-event relay: upstream subscription plus downstream fan-out.
#[derive(Debug)]
pub struct RelayServer {
    registry: Arc<SubscriberRegistry>,
    subscription: Arc<EventSubscription>,
    heartbeat_interval: Duration,
}

impl RelayServer {
    /// `client` is dedicated to the event subscription.
    pub fn new(config: &RelayConfig, client: Arc<dyn LedgerClient>) -> Self {
        let registry = Arc::new(SubscriberRegistry::new(
            config.outbound_queue_capacity,
            config.max_missed_probes,
        ));
        let policy = ReconnectPolicy::new(config.reconnect_interval_ms, config.reconnect_max_delay_ms);
        let subscription = Arc::new(EventSubscription::new(client, registry.clone(), policy));
        Self {
            registry,
            subscription,
            heartbeat_interval: Duration::from_secs(config.heartbeat_interval_secs.max(1)),
        }
    }

    /// Override the liveness sweep period.
    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    pub fn registry(&self) -> Arc<SubscriberRegistry> {
        self.registry.clone()
    }

    pub fn subscription(&self) -> Arc<EventSubscription> {
        self.subscription.clone()
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/", get(ws_handler))
            .with_state(self.registry.clone())
    }

    /// Subscribe upstream, then accept consumers until shutdown.
    ///
    /// Consumers are only accepted once the first subscription is live; a
    /// failure of that first attempt is returned without ever serving.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown_rx: broadcast::Receiver<()>,
    ) -> Result<(), RelayError> {
        let _events = self.subscription.clone().start().await?;

        let sweep = tokio::spawn(heartbeat_loop(
            self.registry.clone(),
            self.heartbeat_interval,
            shutdown_rx.resubscribe(),
        ));

        info!(address = %listener.local_addr()?, "Relay accepting subscribers");
        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown::wait(shutdown_rx))
            .await?;

        sweep.abort();
        self.registry.close_all();
        info!("Relay stopped");
        Ok(())
    }
}

/// Periodic liveness sweep.
async fn heartbeat_loop(
    registry: Arc<SubscriberRegistry>,
    interval: Duration,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(interval);
    // Skip the immediate first tick
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let report = registry.sweep();
                debug!(
                    probed = report.probed,
                    evicted = report.evicted,
                    subscribers = registry.len(),
                    "Heartbeat sweep"
                );
            }
            _ = shutdown_rx.recv() => {
                debug!("Heartbeat sweep stopping");
                break;
            }
        }
    }
}

async fn ws_handler(ws: WebSocketUpgrade, State(registry): State<Arc<SubscriberRegistry>>) -> Response {
    ws.on_upgrade(move |socket| run_session(socket, registry))
}

/// Serve one subscriber from upgrade until disconnect or eviction.
#[instrument(skip_all)]
async fn run_session(socket: WebSocket, registry: Arc<SubscriberRegistry>) {
    let (subscriber, mut outbound) = registry.register();
    let subscriber_id = subscriber.id();
    let (mut ws_tx, mut ws_rx) = socket.split();
    let started = Instant::now();

    let writer_subscriber = subscriber.clone();
    let writer = tokio::spawn(async move {
        loop {
            tokio::select! {
                frame = outbound.recv() => {
                    let message = match frame {
                        Some(Outbound::Text(text)) => Message::Text(text.to_string().into()),
                        Some(Outbound::Ping) => Message::Ping(vec![].into()),
                        None => break,
                    };
                    if ws_tx.send(message).await.is_err() {
                        break;
                    }
                }
                _ = writer_subscriber.closed() => break,
            }
        }
        let _ = ws_tx.send(Message::Close(None)).await;
    });

    loop {
        tokio::select! {
            inbound = ws_rx.next() => match inbound {
                Some(Ok(message)) => {
                    if !handle_inbound(&subscriber, message) {
                        break;
                    }
                }
                Some(Err(e)) => {
                    warn!(subscriber_id = %subscriber_id, error = %e, "Subscriber socket error");
                    break;
                }
                None => break,
            },
            _ = subscriber.closed() => break,
        }
    }

    registry.remove(subscriber_id);
    subscriber.close();
    let _ = writer.await;
    debug!(
        subscriber_id = %subscriber_id,
        duration_secs = started.elapsed().as_secs_f64(),
        "Subscriber session ended"
    );
}

/// Handle one inbound frame. Returns `false` when the session should end.
fn handle_inbound(subscriber: &Subscriber, message: Message) -> bool {
    subscriber.mark_alive();
    let reply = match message {
        Message::Text(text) => handle_command(text.as_str()),
        Message::Binary(data) => match std::str::from_utf8(&data) {
            Ok(text) => handle_command(text),
            Err(_) => MessageResponse::invalid_message(),
        },
        Message::Ping(_) | Message::Pong(_) => return true,
        Message::Close(_) => {
            debug!(subscriber_id = %subscriber.id(), "Subscriber sent close frame");
            return false;
        }
    };

    match reply.to_json() {
        Ok(json) => {
            if subscriber.send(Outbound::Text(json.into())).is_err() {
                warn!(subscriber_id = %subscriber.id(), "Failed to enqueue reply");
            }
        }
        Err(e) => warn!(error = %e, "Failed to encode reply"),
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn text_frame(rx: &mut tokio::sync::mpsc::Receiver<Outbound>) -> Value {
        match rx.try_recv().unwrap() {
            Outbound::Text(text) => serde_json::from_str(&text).unwrap(),
            other => panic!("expected text frame, got {other:?}"),
        }
    }

    #[test]
    fn test_inbound_frames_reset_liveness_and_reply() {
        let registry = SubscriberRegistry::new(8, 2);
        let (subscriber, mut rx) = registry.register();
        text_frame(&mut rx);

        registry.sweep();
        assert_eq!(subscriber.missed_probes(), 1);
        assert_eq!(rx.try_recv().unwrap(), Outbound::Ping);

        assert!(handle_inbound(&subscriber, Message::Text(r#"{"action":"ping"}"#.to_string().into())));
        assert_eq!(subscriber.missed_probes(), 0);
        let ack = text_frame(&mut rx);
        assert_eq!(ack["isSuccess"], json!(true));
        assert_eq!(ack["message"], json!("Execution successful"));

        assert!(handle_inbound(&subscriber, Message::Text("garbage".to_string().into())));
        assert_eq!(text_frame(&mut rx)["message"], json!("Invalid message sent"));

        registry.sweep();
        assert!(handle_inbound(&subscriber, Message::Pong(vec![].into())));
        assert_eq!(subscriber.missed_probes(), 0);

        assert!(!handle_inbound(&subscriber, Message::Close(None)));
    }
}
