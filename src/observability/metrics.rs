//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): API requests by endpoint, status
//! - `gateway_request_duration_seconds` (histogram): API latency by endpoint
//! - `relay_subscribers_active` (gauge): connected subscribers
//! - `relay_events_broadcast_total` (counter): block events fanned out
//! - `relay_frames_delivered_total` (counter): block frames queued to subscribers
//! - `relay_frames_dropped_total` (counter): frames dropped on full queues
//! - `relay_subscribers_evicted_total` (counter): removals by reason
//! - `relay_reconnects_total` (counter): upstream re-subscriptions
//! - `ledger_client_init_total` (counter): client initializations by outcome

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Instant;

/// Install the Prometheus exporter with its own HTTP listener.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record a completed API request.
pub fn record_request(endpoint: &'static str, status: u16, start: Instant) {
    counter!("gateway_requests_total", "endpoint" => endpoint, "status" => status.to_string())
        .increment(1);
    histogram!("gateway_request_duration_seconds", "endpoint" => endpoint)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_subscriber_count(count: usize) {
    gauge!("relay_subscribers_active").set(count as f64);
}

pub fn record_broadcast(delivered: usize) {
    counter!("relay_events_broadcast_total").increment(1);
    counter!("relay_frames_delivered_total").increment(delivered as u64);
}

pub fn record_dropped_frame() {
    counter!("relay_frames_dropped_total").increment(1);
}

pub fn record_eviction(reason: &'static str) {
    counter!("relay_subscribers_evicted_total", "reason" => reason).increment(1);
}

pub fn record_reconnect() {
    counter!("relay_reconnects_total").increment(1);
}

pub fn record_client_init(success: bool) {
    let outcome = if success { "success" } else { "failure" };
    counter!("ledger_client_init_total", "outcome" => outcome).increment(1);
}
