//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::http::Method;
use forward_proxy::config::ProxyConfig;
use forward_proxy::net::Listener;
use forward_proxy::observability::ProxyLog;
use forward_proxy::proxy::Direction;
use forward_proxy::{HttpServer, ProxyError, Route, Shutdown};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// A proxy running on an ephemeral port.
pub struct TestProxy {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub server: JoinHandle<()>,
}

/// `ProxyLog` that keeps what it was told.
#[derive(Default)]
pub struct RecordingLog {
    pub dispatched: Mutex<Vec<(Route, String, String)>>,
    pub failures: Mutex<Vec<(Route, String, String)>>,
    pub relays: Mutex<Vec<Direction>>,
}

impl ProxyLog for RecordingLog {
    fn dispatch(&self, route: Route, method: &Method, target: &str) {
        self.dispatched
            .lock()
            .unwrap()
            .push((route, method.to_string(), target.to_string()));
    }

    fn upstream_failed(&self, route: Route, target: &str, error: &ProxyError) {
        self.failures
            .lock()
            .unwrap()
            .push((route, target.to_string(), error.to_string()));
    }

    fn relay_finished(&self, direction: Direction, _target: &str, _result: &io::Result<u64>) {
        self.relays.lock().unwrap().push(direction);
    }
}

pub async fn start_proxy() -> TestProxy {
    start_proxy_with_log(Arc::new(RecordingLog::default())).await
}

pub async fn start_proxy_with_log(log: Arc<dyn ProxyLog>) -> TestProxy {
    let mut config = ProxyConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.timeouts.shutdown_grace_secs = 1;

    let listener = Listener::bind(&config.listener).await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    let server = HttpServer::with_log(config, log);
    let server = tokio::spawn(async move {
        server.run(listener, server_shutdown).await.unwrap();
    });

    TestProxy { addr, shutdown, server }
}

/// Start an origin that answers every request with `response`, then closes.
pub async fn start_mock_backend(response: &'static [u8]) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    tokio::spawn(async move {
                        if read_head(&mut socket).await.is_none() {
                            return;
                        }
                        let _ = socket.write_all(response).await;
                        let _ = socket.shutdown().await;
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

/// Start an origin that sends `partial`, stalls, then drops the connection.
///
/// `partial` should promise more body than it carries.
pub async fn start_truncating_backend(partial: &'static [u8]) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                if read_head(&mut socket).await.is_none() {
                    return;
                }
                let _ = socket.write_all(partial).await;
                tokio::time::sleep(Duration::from_millis(200)).await;
            });
        }
    });

    addr
}

/// Start a TCP target that accepts and immediately closes.
pub async fn start_closing_target() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            drop(socket);
        }
    });

    addr
}

/// Start a TCP target that echoes every byte back.
pub async fn start_echo_target() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let (mut read, mut write) = socket.into_split();
                let _ = tokio::io::copy(&mut read, &mut write).await;
            });
        }
    });

    addr
}

/// An address nobody listens on.
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

/// Read up to and including the blank line ending an HTTP head.
pub async fn read_head(stream: &mut TcpStream) -> Option<String> {
    let mut head = Vec::new();
    let mut byte = [0u8; 1];
    while !head.ends_with(b"\r\n\r\n") {
        match stream.read(&mut byte).await {
            Ok(0) | Err(_) => return None,
            Ok(_) => head.push(byte[0]),
        }
    }
    String::from_utf8(head).ok()
}

/// Read a response head and its `Content-Length` body.
pub async fn read_response(stream: &mut TcpStream) -> (String, Vec<u8>) {
    let head = read_head(stream).await.expect("no response head");
    let length = head
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            name.eq_ignore_ascii_case("content-length")
                .then(|| value.trim().parse::<usize>().ok())
                .flatten()
        })
        .unwrap_or(0);
    let mut body = vec![0u8; length];
    stream.read_exact(&mut body).await.unwrap();
    (head, body)
}

/// Open a CONNECT tunnel through `proxy` and return the stream and response head.
pub async fn connect_through(proxy: SocketAddr, target: &str) -> (TcpStream, String) {
    let mut stream = TcpStream::connect(proxy).await.unwrap();
    let request = format!("CONNECT {target} HTTP/1.1\r\nHost: {target}\r\n\r\n");
    stream.write_all(request.as_bytes()).await.unwrap();
    let head = read_head(&mut stream).await.expect("no CONNECT response");
    (stream, head)
}

/// A reqwest client that sends plain HTTP through `proxy`.
pub fn proxied_client(proxy: SocketAddr) -> reqwest::Client {
    reqwest::Client::builder()
        .proxy(reqwest::Proxy::http(format!("http://{proxy}")).unwrap())
        .pool_max_idle_per_host(0)
        .build()
        .unwrap()
}
