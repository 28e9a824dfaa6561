//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_requests_total` (counter): requests by status and outcome
//! - `proxy_request_duration_seconds` (histogram): handler latency by outcome
//! - `proxy_rate_limited_total` (counter): requests refused by admission control
//! - `proxy_upstream_fetch_duration_seconds` (histogram): upstream latency by host
//!
//! Recording is a no-op until a recorder is installed with [`init_metrics`].

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(status: u16, outcome: &'static str, start: Instant) {
    counter!("proxy_requests_total", "status" => status.to_string(), "outcome" => outcome).increment(1);
    histogram!("proxy_request_duration_seconds", "outcome" => outcome)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_rate_limited() {
    counter!("proxy_rate_limited_total").increment(1);
}

pub fn record_upstream_fetch(host: &str, start: Instant) {
    histogram!("proxy_upstream_fetch_duration_seconds", "host" => host.to_string())
        .record(start.elapsed().as_secs_f64());
}
