//! HTTP forward proxy library.
//!
//! CONNECT requests become raw TCP tunnels; every other request is forwarded
//! to its origin and the response streamed back unmodified.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod proxy;

pub use config::ProxyConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use proxy::{ProxyError, ProxyHandler, Route};
