//! CONNECT tunnel establishment.
//!
//! # Responsibilities
//! - Dial the `host:port` target with a bounded connect timeout
//! - Check that the serving connection can be taken over raw
//! - Answer `200 OK` and, once hyper hands over the connection, start one
//!   relay task per direction
//!
//! # Design Decisions
//! - The takeover capability is checked before the `200` is produced; hyper
//!   only releases the upgraded stream after the response head is written
//! - The two directions share nothing: each task owns one read half and the
//!   opposite write half
//! - A direction that finishes closes both sockets, so the other direction's
//!   pending read ends with EOF; there is no half-open tunnel
//! - The establisher never joins the relay tasks; `Tunnel::closed` exists for
//!   callers that want to observe termination

use std::fmt;
use std::io::{self, Cursor};
use std::sync::Arc;
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::http::{Request, StatusCode};
use axum::response::{IntoResponse, Response};
use hyper::upgrade::{OnUpgrade, Upgraded};
use hyper_util::rt::TokioIo;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;

use super::relay::{relay, Close};
use super::ProxyError;
use crate::observability::logging::ProxyLog;
use crate::observability::metrics;

/// Deadline for reaching a CONNECT target.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// One half of a tunnel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    ClientToTarget,
    TargetToClient,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::ClientToTarget => "client_to_target",
            Direction::TargetToClient => "target_to_client",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A running tunnel: two independent relay tasks.
#[derive(Debug)]
pub struct Tunnel {
    client_to_target: JoinHandle<io::Result<u64>>,
    target_to_client: JoinHandle<io::Result<u64>>,
}

impl Tunnel {
    /// Split both sockets and spawn one relay task per direction.
    ///
    /// `buffered` holds client bytes already read off the socket; they reach
    /// the target before anything else. Returns immediately; dropping the
    /// returned value detaches the tasks.
    pub fn spawn(
        client: TcpStream,
        buffered: Bytes,
        target: TcpStream,
        log: Arc<dyn ProxyLog>,
        target_addr: Arc<str>,
    ) -> Self {
        let (client_read, client_write) = client.into_split();
        let (target_read, target_write) = target.into_split();

        let client_to_target = tokio::spawn(run_direction(
            Direction::ClientToTarget,
            Cursor::new(buffered).chain(client_read),
            target_write,
            Arc::clone(&log),
            Arc::clone(&target_addr),
        ));
        let target_to_client = tokio::spawn(run_direction(
            Direction::TargetToClient,
            target_read,
            client_write,
            log,
            target_addr,
        ));

        Self {
            client_to_target,
            target_to_client,
        }
    }

    /// True once both directions have finished.
    pub fn is_closed(&self) -> bool {
        self.client_to_target.is_finished() && self.target_to_client.is_finished()
    }

    /// Wait for both directions; results are `(client_to_target, target_to_client)`.
    pub async fn closed(self) -> (io::Result<u64>, io::Result<u64>) {
        let up = self.client_to_target.await.unwrap_or_else(|e| Err(io::Error::other(e)));
        let down = self.target_to_client.await.unwrap_or_else(|e| Err(io::Error::other(e)));
        (up, down)
    }
}

async fn run_direction<R, W>(
    direction: Direction,
    source: R,
    destination: W,
    log: Arc<dyn ProxyLog>,
    target: Arc<str>,
) -> io::Result<u64>
where
    R: AsyncRead + Close + Unpin,
    W: AsyncWrite + Close + Unpin,
{
    let result = relay(source, destination).await;
    if let Ok(bytes) = &result {
        metrics::record_tunnel_bytes(direction, *bytes);
    }
    log.relay_finished(direction, &target, &result);
    result
}

/// Open a TCP connection to `target`, giving up after `timeout`.
pub async fn dial(target: &str, timeout: Duration) -> Result<TcpStream, ProxyError> {
    match tokio::time::timeout(timeout, TcpStream::connect(target)).await {
        Ok(Ok(stream)) => Ok(stream),
        Ok(Err(source)) => Err(ProxyError::Dial {
            target: target.to_string(),
            source,
        }),
        Err(_) => Err(ProxyError::DialTimeout {
            target: target.to_string(),
            timeout,
        }),
    }
}

/// The `host:port` a CONNECT request asks for.
pub(crate) fn connect_target<B>(req: &Request<B>) -> Result<String, ProxyError> {
    req.uri()
        .authority()
        .map(|authority| authority.to_string())
        .ok_or_else(|| ProxyError::InvalidTarget(req.uri().to_string()))
}

/// Recover the client socket from an upgraded connection.
///
/// Returns the socket and any bytes hyper had already read past the request.
fn into_client_socket(upgraded: Upgraded) -> Result<(TcpStream, Bytes), ProxyError> {
    let parts = upgraded
        .downcast::<TokioIo<TcpStream>>()
        .map_err(|_| ProxyError::TakeoverUnsupported)?;
    Ok((parts.io.into_inner(), parts.read_buf))
}

/// Handle a CONNECT request.
///
/// Errors are returned before anything was sent to the client; the dialed
/// target stream is dropped (closed) on every error path.
pub(crate) async fn establish(
    log: Arc<dyn ProxyLog>,
    mut req: Request<Body>,
) -> Result<Response, ProxyError> {
    let target = connect_target(&req)?;
    let stream = dial(&target, CONNECT_TIMEOUT).await?;

    let Some(on_upgrade) = req.extensions_mut().remove::<OnUpgrade>() else {
        drop(stream);
        return Err(ProxyError::TakeoverUnsupported);
    };

    let target: Arc<str> = target.into();
    tokio::spawn(async move {
        let client = on_upgrade
            .await
            .map_err(ProxyError::Upgrade)
            .and_then(into_client_socket);
        match client {
            Ok((client, buffered)) => {
                Tunnel::spawn(client, buffered, stream, log, target);
            }
            Err(e) => log.tunnel_aborted(&target, &e),
        }
    });

    Ok(StatusCode::OK.into_response())
}
