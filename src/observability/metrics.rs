//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_health_probes_total` (counter): probes by cluster, outcome
//! - `proxy_destination_health` (gauge): 1=healthy, 0=unhealthy, -1=unknown
//! - `proxy_config_reloads_total` (counter): reloads by result

use std::net::SocketAddr;
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::health::state::HealthState;

/// Install the Prometheus exporter with its own HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_probe(cluster: &str, outcome: &'static str) {
    metrics::counter!(
        "proxy_health_probes_total",
        "cluster" => cluster.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_destination_health(cluster: &str, destination: &str, state: HealthState) {
    metrics::gauge!(
        "proxy_destination_health",
        "cluster" => cluster.to_string(),
        "destination" => destination.to_string()
    )
    .set(state.as_gauge());
}

pub fn record_config_reload(result: &'static str) {
    metrics::counter!("proxy_config_reloads_total", "result" => result).increment(1);
}
