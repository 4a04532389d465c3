//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gate_requests_enqueued_total` (counter): submissions, by `deduplicated`
//! - `gate_requests_admitted_total` (counter): admissions, by host
//! - `gate_queue_wait_seconds` (histogram): enqueue → admission
//! - `gate_requests_settled_total` (counter): settlements, by host and outcome
//! - `gate_request_duration_seconds` (histogram): admission → settlement
//! - `gate_backoff_episodes_total` (counter): cooldowns armed, by host and signal
//! - `gate_queue_depth` (gauge), `gate_active_requests` (gauge)

use std::net::SocketAddr;
use std::time::Duration;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_enqueued(deduplicated: bool) {
    let label = if deduplicated { "true" } else { "false" };
    metrics::counter!("gate_requests_enqueued_total", "deduplicated" => label).increment(1);
}

pub fn record_admitted(host: &str, waited: Duration) {
    metrics::counter!("gate_requests_admitted_total", "host" => host.to_string()).increment(1);
    metrics::histogram!("gate_queue_wait_seconds").record(waited.as_secs_f64());
}

pub fn record_settled(host: &str, outcome: &'static str, elapsed: Duration) {
    metrics::counter!(
        "gate_requests_settled_total",
        "host" => host.to_string(),
        "outcome" => outcome
    )
    .increment(1);
    metrics::histogram!("gate_request_duration_seconds").record(elapsed.as_secs_f64());
}

pub fn record_backoff(host: &str, signal: &'static str) {
    metrics::counter!(
        "gate_backoff_episodes_total",
        "host" => host.to_string(),
        "signal" => signal
    )
    .increment(1);
}

pub fn record_load(queued: usize, active: usize) {
    metrics::gauge!("gate_queue_depth").set(queued as f64);
    metrics::gauge!("gate_active_requests").set(active as f64);
}
