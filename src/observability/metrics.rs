//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define gateway metrics
//! - Expose a Prometheus-compatible endpoint when configured
//!
//! # Metrics
//! - `gateway_invocations_total` (counter): invocations by route, outcome
//! - `gateway_invocation_duration_seconds` (histogram): latency by route
//! - `gateway_unmatched_requests_total` (counter): 404/405 by status
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op
//! - Labels are route keys (`GET /items/{id}`), never raw paths

use std::net::SocketAddr;
use std::time::Duration;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(address: SocketAddr) -> Result<(), metrics_exporter_prometheus::BuildError> {
    PrometheusBuilder::new()
        .with_http_listener(address)
        .set_buckets(&[0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0])?
        .install()?;

    tracing::info!(address = %address, "Metrics endpoint listening");
    Ok(())
}

/// Record one finished invocation.
pub fn record_invocation(route: &str, outcome: &'static str, elapsed: Duration) {
    metrics::counter!(
        "gateway_invocations_total",
        "route" => route.to_string(),
        "outcome" => outcome
    )
    .increment(1);

    metrics::histogram!(
        "gateway_invocation_duration_seconds",
        "route" => route.to_string()
    )
    .record(elapsed.as_secs_f64());
}

/// Record a request no route accepted.
pub fn record_unmatched(status: u16) {
    metrics::counter!("gateway_unmatched_requests_total", "status" => status.to_string()).increment(1);
}
