//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_requests_total` (counter): requests by route and status
//! - `proxy_request_duration_seconds` (histogram): time until the response head
//! - `proxy_tunnel_bytes_total` (counter): bytes relayed per tunnel direction
//! - `proxy_active_connections` (gauge): accepted client connections
//!
//! Without an installed exporter every call here is a no-op.

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::proxy::{Direction, Route};

/// Install the Prometheus exporter listening on `addr`.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_request(route: Route, status: u16, start: Instant) {
    metrics::counter!(
        "proxy_requests_total",
        "route" => route.as_str(),
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!("proxy_request_duration_seconds", "route" => route.as_str())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_tunnel_bytes(direction: Direction, bytes: u64) {
    metrics::counter!("proxy_tunnel_bytes_total", "direction" => direction.as_str()).increment(bytes);
}

pub fn set_active_connections(count: u64) {
    metrics::gauge!("proxy_active_connections").set(count as f64);
}
