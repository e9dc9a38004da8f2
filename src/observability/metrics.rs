//! Metrics collection and exposition.
//!
//! # Metrics
//! - `openapi_cop_exchanges_total` (counter): proxied exchanges by method, status, outcome
//! - `openapi_cop_validation_failures_total` (counter): failed checks by phase
//! - `openapi_cop_upstream_duration_seconds` (histogram): upstream call latency
//! - `openapi_cop_mock_responses_total` (counter): mock responses by status
//! - `openapi_cop_document_reloads_total` (counter): reload attempts by result
//!
//! Recording is a no-op until a recorder is installed.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .set_buckets(&[0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0])?
        .install()?;
    tracing::info!(address = %addr, "Prometheus metrics endpoint started");
    Ok(())
}

pub fn record_exchange(method: &str, status: u16, outcome: &'static str, started: Instant) {
    counter!(
        "openapi_cop_exchanges_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "outcome" => outcome
    )
    .increment(1);
    histogram!("openapi_cop_exchange_duration_seconds", "outcome" => outcome)
        .record(started.elapsed().as_secs_f64());
}

pub fn record_validation_failure(phase: &'static str) {
    counter!("openapi_cop_validation_failures_total", "phase" => phase).increment(1);
}

pub fn record_upstream_duration(started: Instant) {
    histogram!("openapi_cop_upstream_duration_seconds").record(started.elapsed().as_secs_f64());
}

pub fn record_mock_response(status: u16) {
    counter!("openapi_cop_mock_responses_total", "status" => status.to_string()).increment(1);
}

pub fn record_reload(result: &'static str) {
    counter!("openapi_cop_document_reloads_total", "result" => result).increment(1);
}
