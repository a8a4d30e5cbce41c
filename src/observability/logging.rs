//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the process-wide tracing subscriber (done once, by `main`)
//! - Define the logger the proxy core reports to
//!
//! # Design Decisions
//! - The proxy core only sees `ProxyLog`, handed to it at construction
//! - JSON to stdout by default, pretty format for development
//! - `RUST_LOG` overrides the level chosen by the `debug` flag

use std::io;

use axum::http::Method;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::schema::{LogFormat, ObservabilityConfig};
use crate::proxy::{Direction, ProxyError, Route};

/// Events the proxy core reports.
///
/// Only `dispatch` is mandatory; the rest default to doing nothing.
pub trait ProxyLog: Send + Sync + 'static {
    /// A request is about to be handed to the tunnel or forward path.
    fn dispatch(&self, route: Route, method: &Method, target: &str);

    /// The request failed before anything was sent to the client.
    fn upstream_failed(&self, _route: Route, _target: &str, _error: &ProxyError) {}

    /// The `200` of a tunnel was sent but the raw connection never arrived.
    fn tunnel_aborted(&self, _target: &str, _error: &ProxyError) {}

    /// One relay direction of a tunnel has ended.
    fn relay_finished(&self, _direction: Direction, _target: &str, _result: &io::Result<u64>) {}
}

/// `ProxyLog` backed by `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLog;

impl ProxyLog for TracingLog {
    fn dispatch(&self, route: Route, method: &Method, target: &str) {
        match route {
            Route::Tunnel => tracing::info!(%method, %target, "handling HTTP CONNECT"),
            Route::Forward => tracing::info!(%method, %target, "handling HTTP request"),
        }
    }

    fn upstream_failed(&self, route: Route, target: &str, error: &ProxyError) {
        tracing::warn!(
            %route,
            %target,
            status = error.status().as_u16(),
            error = %error,
            "Proxy request failed"
        );
    }

    fn tunnel_aborted(&self, target: &str, error: &ProxyError) {
        tracing::warn!(%target, error = %error, "Connection takeover failed after 200");
    }

    fn relay_finished(&self, direction: Direction, target: &str, result: &io::Result<u64>) {
        match result {
            Ok(bytes) => tracing::debug!(%direction, %target, bytes, "Relay finished"),
            Err(e) => tracing::debug!(%direction, %target, error = %e, "Relay ended with error"),
        }
    }
}

fn default_directives(debug: bool) -> String {
    let level = if debug { "debug" } else { "info" };
    format!("forward_proxy={level},tower_http={level}")
}

/// Install the global subscriber described by `config`.
pub fn init_tracing(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(config.debug)));

    let registry = tracing_subscriber::registry().with(filter);
    match config.log_format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(io::stdout))
            .init(),
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().pretty().with_writer(io::stdout))
            .init(),
    }
}
