//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by action and status
//! - `gateway_request_duration_seconds` (histogram): pipeline latency
//! - `gateway_response_bytes` (histogram): payload sizes
//! - `gateway_rate_limited_total` (counter): admission rejections
//! - `gateway_cache_events_total` (counter): hit/miss/invalidate/error
//! - `gateway_security_events_total` (counter): authentication failures
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op, which keeps tests free of setup
//! - Prometheus exposition runs on its own listener

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Duration;

/// Install the Prometheus recorder and its HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(action: &str, status: u16, elapsed: Duration, payload_size: usize) {
    counter!(
        "gateway_requests_total",
        "action" => action.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("gateway_request_duration_seconds", "action" => action.to_string())
        .record(elapsed.as_secs_f64());
    histogram!("gateway_response_bytes").record(payload_size as f64);
}

pub fn record_rate_limited() {
    counter!("gateway_rate_limited_total").increment(1);
}

pub fn record_cache_event(event: &'static str) {
    counter!("gateway_cache_events_total", "event" => event).increment(1);
}

pub fn record_security_event(kind: &'static str) {
    counter!("gateway_security_events_total", "kind" => kind).increment(1);
}
