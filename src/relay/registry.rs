//! Connected subscriber tracking, fan-out and liveness.
//!
//! Each subscriber owns a bounded outbound queue drained by its writer task.
//! Broadcasts never block on a slow consumer: when a queue is full the new
//! frame is dropped for that subscriber only.
//!
//! Liveness uses a missed-probe counter. Every heartbeat sweep increments it
//! and sends a ping; any pong or inbound frame resets it to zero. Once the
//! counter reaches `max_missed_probes` the subscriber is dead and is removed
//! by the next broadcast or sweep.

use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::Notify;
use uuid::Uuid;

use crate::ledger::BlockEvent;
use crate::observability::metrics;
use crate::relay::envelope::MessageResponse;

/// Frame queued for a subscriber's writer task.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Text(Arc<str>),
    Ping,
}

/// One connected consumer.
#[derive(Debug)]
pub struct Subscriber {
    id: Uuid,
    tx: mpsc::Sender<Outbound>,
    missed_probes: AtomicU32,
    max_missed_probes: u32,
    dropped: AtomicU64,
    closed: AtomicBool,
    close_notify: Notify,
    connected_at: Instant,
}

impl Subscriber {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Record a sign of life: a pong or any inbound frame.
    pub fn mark_alive(&self) {
        self.missed_probes.store(0, Ordering::Relaxed);
    }

    pub fn is_alive(&self) -> bool {
        self.missed_probes.load(Ordering::Relaxed) < self.max_missed_probes
    }

    pub fn missed_probes(&self) -> u32 {
        self.missed_probes.load(Ordering::Relaxed)
    }

    /// Frames dropped because the outbound queue was full.
    pub fn dropped_frames(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Whether frames can still be delivered.
    pub fn is_open(&self) -> bool {
        !self.closed.load(Ordering::Acquire) && !self.tx.is_closed()
    }

    /// Queue a frame without waiting.
    pub fn send(&self, frame: Outbound) -> Result<(), TrySendError<Outbound>> {
        self.tx.try_send(frame)
    }

    /// Ask the connection tasks to terminate.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            self.close_notify.notify_waiters();
        }
    }

    /// Resolve once [`close`](Self::close) has been called.
    pub async fn closed(&self) {
        loop {
            let notified = self.close_notify.notified();
            if self.closed.load(Ordering::Acquire) {
                return;
            }
            notified.await;
        }
    }

    fn connected_for(&self) -> std::time::Duration {
        self.connected_at.elapsed()
    }
}

/// Outcome of fanning one event out.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub dropped: usize,
    pub evicted: usize,
}

/// Outcome of one heartbeat sweep.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub probed: usize,
    pub evicted: usize,
}

/// The set of currently connected subscribers.
#[derive(Debug)]
pub struct SubscriberRegistry {
    subscribers: DashMap<Uuid, Arc<Subscriber>>,
    queue_capacity: usize,
    max_missed_probes: u32,
}

impl SubscriberRegistry {
    pub fn new(queue_capacity: usize, max_missed_probes: u32) -> Self {
        Self {
            subscribers: DashMap::new(),
            queue_capacity: queue_capacity.max(1),
            max_missed_probes: max_missed_probes.max(1),
        }
    }

    /// Admit a new subscriber.
    ///
    /// The connection-confirmation frame is queued before the subscriber
    /// becomes visible to broadcasts, so it is always the first frame out.
    pub fn register(&self) -> (Arc<Subscriber>, mpsc::Receiver<Outbound>) {
        let (tx, rx) = mpsc::channel(self.queue_capacity);
        let subscriber = Arc::new(Subscriber {
            id: Uuid::new_v4(),
            tx,
            missed_probes: AtomicU32::new(0),
            max_missed_probes: self.max_missed_probes,
            dropped: AtomicU64::new(0),
            closed: AtomicBool::new(false),
            close_notify: Notify::new(),
            connected_at: Instant::now(),
        });

        match MessageResponse::connection_established().to_json() {
            Ok(greeting) => {
                let _ = subscriber.send(Outbound::Text(greeting.into()));
            }
            Err(e) => tracing::error!(error = %e, "Failed to encode connection confirmation"),
        }

        self.subscribers.insert(subscriber.id, subscriber.clone());
        let count = self.subscribers.len();
        metrics::record_subscriber_count(count);
        tracing::info!(subscriber_id = %subscriber.id, subscribers = count, "Subscriber connected");
        (subscriber, rx)
    }

    /// Remove a subscriber that disconnected on its own.
    pub fn remove(&self, id: Uuid) -> Option<Arc<Subscriber>> {
        let removed = self.subscribers.remove(&id).map(|(_, s)| s);
        if let Some(subscriber) = &removed {
            subscriber.close();
            let count = self.subscribers.len();
            metrics::record_subscriber_count(count);
            tracing::info!(
                subscriber_id = %id,
                subscribers = count,
                connected_secs = subscriber.connected_for().as_secs(),
                dropped_frames = subscriber.dropped_frames(),
                "Subscriber disconnected"
            );
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.subscribers.contains_key(&id)
    }

    /// Send a block event to every live subscriber.
    ///
    /// Dead or closed subscribers are evicted. A failure on one subscriber
    /// never prevents delivery to the others.
    pub fn broadcast(&self, block: &BlockEvent) -> BroadcastReport {
        let frame: Arc<str> = match MessageResponse::block_broadcast(block).to_json() {
            Ok(json) => json.into(),
            Err(e) => {
                tracing::error!(error = %e, "Failed to encode block event");
                return BroadcastReport::default();
            }
        };

        let mut report = BroadcastReport::default();
        let mut evictions = Vec::new();
        for entry in self.subscribers.iter() {
            let subscriber = entry.value();
            if !subscriber.is_alive() {
                evictions.push((subscriber.id, "unresponsive"));
                continue;
            }
            if !subscriber.is_open() {
                evictions.push((subscriber.id, "closed"));
                continue;
            }
            match subscriber.send(Outbound::Text(frame.clone())) {
                Ok(()) => report.delivered += 1,
                Err(TrySendError::Full(_)) => {
                    subscriber.dropped.fetch_add(1, Ordering::Relaxed);
                    report.dropped += 1;
                    metrics::record_dropped_frame();
                    tracing::warn!(subscriber_id = %subscriber.id, "Outbound queue full, dropping block event");
                }
                Err(TrySendError::Closed(_)) => {
                    tracing::warn!(subscriber_id = %subscriber.id, "Failed to deliver block event");
                    evictions.push((subscriber.id, "closed"));
                }
            }
        }

        // Removal happens after iteration; DashMap shards are read-locked above.
        report.evicted = self.evict_all(evictions);
        metrics::record_broadcast(report.delivered);
        report
    }

    /// One heartbeat pass: evict dead subscribers, probe the rest.
    pub fn sweep(&self) -> SweepReport {
        let mut report = SweepReport::default();
        let mut evictions = Vec::new();
        for entry in self.subscribers.iter() {
            let subscriber = entry.value();
            if !subscriber.is_alive() {
                evictions.push((subscriber.id, "unresponsive"));
                continue;
            }
            if !subscriber.is_open() {
                evictions.push((subscriber.id, "closed"));
                continue;
            }
            subscriber.missed_probes.fetch_add(1, Ordering::Relaxed);
            match subscriber.send(Outbound::Ping) {
                Ok(()) => report.probed += 1,
                // A backed-up subscriber still counts the probe as missed.
                Err(TrySendError::Full(_)) => {}
                Err(TrySendError::Closed(_)) => evictions.push((subscriber.id, "closed")),
            }
        }
        report.evicted = self.evict_all(evictions);
        report
    }

    /// Close and forget every subscriber.
    pub fn close_all(&self) {
        let ids: Vec<Uuid> = self.subscribers.iter().map(|e| *e.key()).collect();
        for id in ids {
            self.remove(id);
        }
    }

    fn evict_all(&self, evictions: Vec<(Uuid, &'static str)>) -> usize {
        let mut evicted = 0;
        for (id, reason) in evictions {
            if let Some((_, subscriber)) = self.subscribers.remove(&id) {
                subscriber.close();
                metrics::record_eviction(reason);
                tracing::info!(
                    subscriber_id = %id,
                    reason,
                    missed_probes = subscriber.missed_probes(),
                    "Subscriber evicted"
                );
                evicted += 1;
            }
        }
        if evicted > 0 {
            metrics::record_subscriber_count(self.subscribers.len());
        }
        evicted
    }
}
