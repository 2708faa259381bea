//! Metrics collection and exposition.
//!
//! # Metrics
//! - `adapter_dispatch_total` (counter): inbound calls by method, status
//! - `adapter_dispatch_duration_seconds` (histogram): handler latency
//! - `adapter_call_attempts_total` (counter): outbound attempts by kind, outcome
//! - `adapter_retries_total` (counter): outbound retries by kind
//! - `adapter_pool_leases` (gauge): pooled connections
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed
//! - Prometheus exporter serves its own scrape listener

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Duration;

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_dispatch(method: &str, status: &str, duration: Duration) {
    metrics::counter!(
        "adapter_dispatch_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!("adapter_dispatch_duration_seconds").record(duration.as_secs_f64());
}

pub fn record_call_attempt(kind: &'static str, outcome: &'static str) {
    metrics::counter!("adapter_call_attempts_total", "kind" => kind, "outcome" => outcome).increment(1);
}

pub fn record_retry(kind: &'static str) {
    metrics::counter!("adapter_retries_total", "kind" => kind).increment(1);
}

pub fn record_pool_size(size: usize) {
    metrics::gauge!("adapter_pool_leases").set(size as f64);
}
