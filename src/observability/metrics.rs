//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define balancer metrics (probe results, relay health, selections)
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `turn_balancer_endpoint_healthy` (gauge): 1=healthy, 0=unhealthy
//! - `turn_balancer_probe_total` (counter): probe results by endpoint, result
//! - `turn_balancer_selection_total` (counter): selections by outcome
//! - `turn_balancer_metrics_query_seconds` (histogram): Prometheus query latency
//!
//! Recording is a no-op until [`init_metrics`] installs the exporter.

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter with its own HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_probe(endpoint: &str, passed: bool) {
    let result = if passed { "passed" } else { "failed" };
    metrics::counter!(
        "turn_balancer_probe_total",
        "endpoint" => endpoint.to_string(),
        "result" => result
    )
    .increment(1);
}

pub fn record_endpoint_health(endpoint: &str, healthy: bool) {
    metrics::gauge!("turn_balancer_endpoint_healthy", "endpoint" => endpoint.to_string())
        .set(if healthy { 1.0 } else { 0.0 });
}

pub fn record_selection(outcome: &'static str) {
    metrics::counter!("turn_balancer_selection_total", "outcome" => outcome).increment(1);
}

pub fn record_query_duration(start: Instant) {
    metrics::histogram!("turn_balancer_metrics_query_seconds")
        .record(start.elapsed().as_secs_f64());
}
