//! HTTP server for the forward proxy.
//!
//! # Responsibilities
//! - Accept connections from the bounded listener
//! - Serve each one with hyper's HTTP/1.1 connection driver, upgrades enabled
//!   so CONNECT can take the socket over
//! - Wrap the dispatcher in tower-http request tracing
//! - Stop accepting on shutdown and drain open connections within the grace
//!   period

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use hyper::server::conn::http1;
use hyper_util::rt::TokioIo;
use hyper_util::service::TowerToHyperService;
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::config::ProxyConfig;
use crate::net::{ConnectionPermit, ConnectionTracker, Listener, ListenerError};
use crate::observability::logging::{ProxyLog, TracingLog};
use crate::proxy::ProxyHandler;

/// HTTP server for the forward proxy.
pub struct HttpServer {
    config: ProxyConfig,
    handler: ProxyHandler,
    builder: http1::Builder,
    tracker: ConnectionTracker,
}

impl HttpServer {
    /// Create a server logging through `tracing`.
    pub fn new(config: ProxyConfig) -> Self {
        Self::with_log(config, Arc::new(TracingLog))
    }

    /// Create a server reporting proxy events to `log`.
    pub fn with_log(config: ProxyConfig, log: Arc<dyn ProxyLog>) -> Self {
        let mut builder = http1::Builder::new();
        builder.preserve_header_case(true).title_case_headers(true);

        Self {
            config,
            handler: ProxyHandler::new(log),
            builder,
            tracker: ConnectionTracker::new(),
        }
    }

    /// Accept and serve connections until `shutdown` fires.
    ///
    /// A closed shutdown channel counts as a shutdown.
    pub async fn run(
        self,
        listener: Listener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ListenerError> {
        let addr = listener.local_addr().map_err(ListenerError::Accept)?;
        tracing::info!(
            address = %addr,
            max_connections = listener.max_connections(),
            "Starting proxy server"
        );

        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer, permit)) => {
                        self.spawn_connection(stream, peer, permit, shutdown.resubscribe());
                    }
                    Err(ListenerError::Closed) => break,
                    Err(e) => {
                        tracing::warn!(error = %e, "Accept failed");
                        tokio::time::sleep(Duration::from_millis(50)).await;
                    }
                },
                _ = shutdown.recv() => break,
            }
        }

        drop(listener);
        tracing::info!(
            active_connections = self.tracker.active_count(),
            "Stopped accepting, draining connections"
        );

        let grace = Duration::from_secs(self.config.timeouts.shutdown_grace_secs);
        if tokio::time::timeout(grace, self.tracker.wait_idle()).await.is_err() {
            tracing::warn!(
                remaining = self.tracker.active_count(),
                "Grace period elapsed with connections still open"
            );
        }

        tracing::info!("Proxy server stopped");
        Ok(())
    }

    fn spawn_connection(
        &self,
        stream: TcpStream,
        peer: SocketAddr,
        permit: ConnectionPermit,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        let guard = self.tracker.track();
        let builder = self.builder.clone();
        let service = ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .service(self.handler.clone());

        tokio::spawn(async move {
            let _permit = permit;
            let connection_id = guard.id();

            let conn = builder
                .serve_connection(TokioIo::new(stream), TowerToHyperService::new(service))
                .with_upgrades();
            tokio::pin!(conn);

            let result = tokio::select! {
                result = conn.as_mut() => result,
                _ = shutdown.recv() => {
                    conn.as_mut().graceful_shutdown();
                    conn.await
                }
            };

            if let Err(e) = result {
                tracing::debug!(
                    connection_id = %connection_id,
                    peer_addr = %peer,
                    error = %e,
                    "Connection ended with error"
                );
            }
            drop(guard);
        });
    }
}
