//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define balancer metrics (connections, health, rejections, bytes)
//! - Expose Prometheus-compatible metrics endpoint
//! - Track per-backend and aggregate metrics
//!
//! # Metrics
//! - `lb_connections_accepted_total` (counter)
//! - `lb_dispatch_rejected_total` (counter): no healthy backend
//! - `lb_backend_connect_failures_total` (counter): by backend, reason
//! - `lb_idle_timeouts_total` (counter)
//! - `lb_bytes_total` (counter): by direction
//! - `lb_backend_health` (gauge): 1=up, 0=down, -1=unknown
//! - `lb_backend_active_connections` (gauge)
//! - `lb_backends_added_total` / `lb_backends_removed_total` (counters)
//! - `lb_listener_up` (gauge)
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed
//! - Labels are backend address and direction only (bounded cardinality)

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

use crate::load_balancer::backend::{BackendEndpoint, HealthState};

/// Install the Prometheus exporter on `addr`. Must run inside a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_connection_accepted() {
    ::metrics::counter!("lb_connections_accepted_total").increment(1);
}

pub fn record_dispatch_rejected() {
    ::metrics::counter!("lb_dispatch_rejected_total").increment(1);
}

pub fn record_connect_failure(backend: &BackendEndpoint, reason: &'static str) {
    ::metrics::counter!(
        "lb_backend_connect_failures_total",
        "backend" => backend.to_string(),
        "reason" => reason
    )
    .increment(1);
}

pub fn record_idle_timeout() {
    ::metrics::counter!("lb_idle_timeouts_total").increment(1);
}

pub fn record_bytes(direction: &'static str, bytes: u64) {
    ::metrics::counter!("lb_bytes_total", "direction" => direction).increment(bytes);
}

pub fn record_backend_health(backend: &BackendEndpoint, state: HealthState) {
    let value = match state {
        HealthState::Up => 1.0,
        HealthState::Down => 0.0,
        HealthState::Unknown => -1.0,
    };
    ::metrics::gauge!("lb_backend_health", "backend" => backend.to_string()).set(value);
}

pub fn record_backend_connections(backend: &BackendEndpoint, active: usize) {
    ::metrics::gauge!("lb_backend_active_connections", "backend" => backend.to_string()).set(active as f64);
}

pub fn record_backend_added(backend: &BackendEndpoint) {
    ::metrics::counter!("lb_backends_added_total").increment(1);
    record_backend_health(backend, HealthState::Unknown);
}

pub fn record_backend_removed(backend: &BackendEndpoint) {
    ::metrics::counter!("lb_backends_removed_total").increment(1);
    ::metrics::gauge!("lb_backend_active_connections", "backend" => backend.to_string()).set(0.0);
}

pub fn record_listener_up(up: bool) {
    ::metrics::gauge!("lb_listener_up").set(if up { 1.0 } else { 0.0 });
}
