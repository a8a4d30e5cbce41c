//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Proxy core
//!     → logging.rs (ProxyLog events, injected at construction)
//!     → metrics.rs (request counters, tunnel byte counters)
//!
//! Serving layer
//!     → tower-http TraceLayer (per-request spans)
//!     → metrics.rs (active connection gauge)
//! ```

pub mod logging;
pub mod metrics;

pub use logging::{init_tracing, ProxyLog, TracingLog};
