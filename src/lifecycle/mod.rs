//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     trigger → server stops accepting → open connections drain → exit
//! ```
//!
//! # Design Decisions
//! - Shutdown has a deadline: draining is bounded by the configured grace
//! - Established tunnels are not drained; they end with their peers

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
