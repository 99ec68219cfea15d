//! Metrics collection and exposition.
//!
//! # Metrics
//! - `forward_gate_requests_total` (counter): upstream responses by method, status
//! - `forward_gate_request_duration_seconds` (histogram): time to upstream response head
//! - `forward_gate_rejections_total` (counter): requests answered by the gate itself
//! - `forward_gate_in_flight` (gauge): admission permits currently held

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Start the Prometheus scrape endpoint. Needs a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_request(method: &str, status: u16, started: Instant) {
    counter!(
        "forward_gate_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("forward_gate_request_duration_seconds", "method" => method.to_string())
        .record(started.elapsed().as_secs_f64());
}

pub fn record_rejection(reason: &'static str) {
    counter!("forward_gate_rejections_total", "reason" => reason).increment(1);
}

pub fn permit_acquired() {
    gauge!("forward_gate_in_flight").increment(1.0);
}

pub fn permit_released() {
    gauge!("forward_gate_in_flight").decrement(1.0);
}
