//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): proxied requests by route, status
//! - `gateway_request_duration_seconds` (histogram): proxied request latency
//! - `gateway_rate_limited_total` (counter): requests rejected with 429
//! - `gateway_rate_limit_buckets` (gauge): distinct client identities tracked
//! - `gateway_circuit_state` (gauge): 0=closed, 1=half-open, 2=open
//! - `gateway_circuit_transitions_total` (counter): breaker phase changes
//! - `gateway_registry_calls_total` (counter): registry calls by op, outcome
//!
//! Updates go through the `metrics` facade and are no-ops until a recorder
//! is installed, so tests never need one.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16, route: &str, start: Instant) {
    counter!(
        "gateway_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "route" => route.to_string()
    )
    .increment(1);
    histogram!(
        "gateway_request_duration_seconds",
        "method" => method.to_string(),
        "route" => route.to_string()
    )
    .record(start.elapsed().as_secs_f64());
}

pub fn record_rate_limited() {
    counter!("gateway_rate_limited_total").increment(1);
}

pub fn record_rate_limit_buckets(count: usize) {
    gauge!("gateway_rate_limit_buckets").set(count as f64);
}

pub fn record_breaker_transition(upstream: &str, from: &'static str, to: &'static str, level: u8) {
    counter!(
        "gateway_circuit_transitions_total",
        "upstream" => upstream.to_string(),
        "from" => from,
        "to" => to
    )
    .increment(1);
    gauge!("gateway_circuit_state", "upstream" => upstream.to_string()).set(f64::from(level));
}

pub fn record_registry_call(op: &'static str, ok: bool) {
    let outcome = if ok { "ok" } else { "error" };
    counter!("gateway_registry_calls_total", "op" => op, "outcome" => outcome).increment(1);
}
