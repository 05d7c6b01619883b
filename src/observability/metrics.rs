//! Metrics collection and exposition.
//!
//! # Metrics
//! - `sidecar_process_exits_total` (counter): supervised process exits by process
//! - `sidecar_process_signals_total` (counter): termination signals sent by process
//! - `sidecar_state_builds_total` (counter): sync batches by result
//! - `sidecar_route_errors_total` (counter): routes skipped by direction
//! - `sidecar_fragments` (gauge): fragments in the last built state
//! - `sidecar_pending_work` (gauge): units of work the shutdown is waiting on

use std::net::SocketAddr;

use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder with an HTTP scrape listener on `addr`.
///
/// Must be called inside a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    describe();
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

fn describe() {
    describe_counter!("sidecar_process_exits_total", "Supervised process exits");
    describe_counter!("sidecar_process_signals_total", "Termination signals sent to supervised processes");
    describe_counter!("sidecar_state_builds_total", "State synthesis batches by result");
    describe_counter!("sidecar_route_errors_total", "Routes left out of a batch");
    describe_gauge!("sidecar_fragments", "Fragments in the last built state");
    describe_gauge!("sidecar_pending_work", "Outstanding units of work");
}

pub fn record_process_exit(process: &str) {
    counter!("sidecar_process_exits_total", "process" => process.to_string()).increment(1);
}

pub fn record_process_signal(process: &str) {
    counter!("sidecar_process_signals_total", "process" => process.to_string()).increment(1);
}

pub fn record_state_build(ok: bool) {
    let result = if ok { "ok" } else { "error" };
    counter!("sidecar_state_builds_total", "result" => result).increment(1);
}

pub fn record_route_error(direction: &'static str) {
    counter!("sidecar_route_errors_total", "direction" => direction).increment(1);
}

pub fn set_fragments(count: usize) {
    gauge!("sidecar_fragments").set(count as f64);
}

pub fn set_pending_work(count: usize) {
    gauge!("sidecar_pending_work").set(count as f64);
}
