//! HTTP forward proxy.
//!
//! # Architecture Overview
//!
//! ```text
//!                     ┌──────────────────────────────────────────────┐
//!                     │                FORWARD PROXY                 │
//!   Client            │  ┌──────────┐   ┌──────────┐   ┌──────────┐  │
//!   ──────────────────┼─▶│   net    │──▶│   http   │──▶│  proxy   │  │
//!                     │  │ listener │   │  server  │   │ dispatch │  │
//!                     │  └──────────┘   └──────────┘   └────┬─────┘  │
//!                     │                        CONNECT ┌────┴────┐ other
//!                     │                                ▼         ▼   │
//!                     │                          ┌────────┐ ┌───────┐│
//!   ◀════ raw bytes ══┼══════════════════════════│ tunnel │ │forward│┼──▶ Origin
//!                     │                          │ relay×2│ │       ││
//!                     │                          └────────┘ └───────┘│
//!                     │  config · observability · lifecycle          │
//!                     └──────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use forward_proxy::config::{resolve_config, ConfigOverrides};
use forward_proxy::lifecycle::{signals, Shutdown};
use forward_proxy::net::Listener;
use forward_proxy::observability::{init_tracing, metrics};
use forward_proxy::HttpServer;

#[derive(Parser)]
#[command(name = "forward-proxy")]
#[command(about = "HTTP forward proxy with CONNECT tunneling", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address, overrides ADDR and the config file
    #[arg(long)]
    addr: Option<String>,

    /// Log at debug level
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let overrides = ConfigOverrides {
        bind_address: cli.addr,
        debug: cli.debug,
    };
    let config = resolve_config(cli.config.as_deref(), |name| std::env::var(name).ok(), &overrides)?;

    init_tracing(&config.observability);

    tracing::info!(
        bind_address = %config.listener.bind_address,
        max_connections = config.listener.max_connections,
        debug = config.observability.debug,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        let addr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr)?;
    }

    let listener = Listener::bind(&config.listener).await?;

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        signals::wait_for_signal().await;
        shutdown.trigger();
    });

    HttpServer::new(config).run(listener, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
