//! Proxy core: request dispatch, CONNECT tunnels and plain forwarding.
//!
//! # Data Flow
//! ```text
//! Request
//!     → ProxyHandler (Route::for_method, log entry)
//!         → CONNECT: tunnel.rs (dial, 200, takeover)
//!                        → relay.rs ×2 (client→target, target→client)
//!         → other:   forward.rs (round trip, copy status/headers, stream body)
//! ```
//!
//! # Design Decisions
//! - The method is the only routing input
//! - Every failure is answered with an HTTP response; the service is infallible
//! - The logger is injected, never looked up globally

pub mod error;
pub mod forward;
pub mod relay;
pub mod tunnel;

use std::convert::Infallible;
use std::fmt;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use axum::body::{Body, Bytes, HttpBody};
use axum::http::{Method, Request};
use axum::response::{IntoResponse, Response};
use axum::BoxError;
use futures_util::future::BoxFuture;
use tower::Service;

use crate::observability::logging::ProxyLog;
use crate::observability::metrics;

pub use error::ProxyError;
pub use forward::{copy_headers, HttpClient};
pub use relay::relay;
pub use tunnel::{Direction, Tunnel, CONNECT_TIMEOUT};

/// Where a request goes, decided once from its method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    /// CONNECT: open a raw tunnel to the target.
    Tunnel,
    /// Anything else: forward to the origin.
    Forward,
}

impl Route {
    pub fn for_method(method: &Method) -> Self {
        if method == Method::CONNECT {
            Route::Tunnel
        } else {
            Route::Forward
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Route::Tunnel => "connect",
            Route::Forward => "forward",
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request dispatcher for the forward proxy.
#[derive(Clone)]
pub struct ProxyHandler {
    client: HttpClient,
    log: Arc<dyn ProxyLog>,
}

impl ProxyHandler {
    /// Create a handler reporting to `log`.
    pub fn new(log: Arc<dyn ProxyLog>) -> Self {
        Self {
            client: forward::build_client(),
            log,
        }
    }

    /// Route one request and produce the response for the client.
    pub async fn handle(&self, req: Request<Body>) -> Response {
        let start = Instant::now();
        let route = Route::for_method(req.method());
        let target = req.uri().to_string();

        self.log.dispatch(route, req.method(), &target);

        let result = match route {
            Route::Tunnel => tunnel::establish(Arc::clone(&self.log), req).await,
            Route::Forward => forward::forward(&self.client, req).await,
        };

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                self.log.upstream_failed(route, &target, &e);
                e.into_response()
            }
        };

        metrics::record_request(route, response.status().as_u16(), start);
        response
    }
}

impl<B> Service<Request<B>> for ProxyHandler
where
    B: HttpBody<Data = Bytes> + Send + 'static,
    B::Error: Into<BoxError>,
{
    type Response = Response;
    type Error = Infallible;
    type Future = BoxFuture<'static, Result<Response, Infallible>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<B>) -> Self::Future {
        let handler = self.clone();
        Box::pin(async move { Ok(handler.handle(req.map(Body::new)).await) })
    }
}
