//! Metrics collection and exposition.
//!
//! # Metrics
//! - `nano_rpc_requests_total` (counter): node calls by action and outcome
//! - `nano_rpc_request_duration_seconds` (histogram): node call latency
//! - `nano_blocks_processed_total` (counter): submitted blocks by kind
//! - `nano_confirmations_total` (counter): resolved confirmations by trigger
//! - `nano_watched_accounts` (gauge): accounts registered with the event stream
//! - `nano_websocket_reconnects_total` (counter): event stream reconnects
//!
//! Recording is a no-op until a recorder is installed, so library users and
//! tests pay nothing unless the daemon calls [`init_metrics`].

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_rpc_request(action: &'static str, outcome: &'static str, start: Instant) {
    metrics::counter!("nano_rpc_requests_total", "action" => action, "outcome" => outcome).increment(1);
    metrics::histogram!("nano_rpc_request_duration_seconds", "action" => action)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_block_processed(kind: &'static str) {
    metrics::counter!("nano_blocks_processed_total", "kind" => kind).increment(1);
}

pub fn record_confirmation(trigger: &'static str) {
    metrics::counter!("nano_confirmations_total", "trigger" => trigger).increment(1);
}

pub fn record_watched_accounts(count: usize) {
    metrics::gauge!("nano_watched_accounts").set(count as f64);
}

pub fn record_websocket_reconnect() {
    metrics::counter!("nano_websocket_reconnects_total").increment(1);
}
