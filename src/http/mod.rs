//! HTTP serving subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (hyper HTTP/1.1, upgrades enabled, TraceLayer)
//!     → proxy::ProxyHandler
//!     → Send to client
//! ```

pub mod server;

pub use server::HttpServer;
