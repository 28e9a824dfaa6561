//! Cover image proxy.
//!
//! # Architecture Overview
//!
//! ```text
//!                         ┌───────────────────────────────────────────────┐
//!                         │                 COVER PROXY                    │
//!   GET /?url=<target>    │  ┌───────────┐   ┌──────────┐   ┌──────────┐  │
//!  ───────────────────────┼─▶│ admission │──▶│  target  │──▶│ upstream │──┼──▶ books.google.com
//!                         │  │ (per IP)  │   │validation│   │  fetch   │  │    covers.openlibrary.org
//!                         │  └───────────┘   └──────────┘   └────┬─────┘  │
//!                         │                                      ▼        │
//!  ◀──────────────────────┼──────────────────────────────── relay (CORS,  │
//!                         │                                 cache hint)   │
//!                         └───────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use cover_proxy::config::{load_config, ProxyConfig};
use cover_proxy::observability::{logging, metrics};
use cover_proxy::{HttpServer, Shutdown};

#[derive(Parser)]
#[command(name = "cover-proxy")]
#[command(about = "Allow-listed image proxy for book cover hosts", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override listener.bind_address.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ProxyConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }

    logging::init_logging(&config.observability);

    tracing::info!("cover-proxy v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        rate_limit = config.rate_limit.enabled,
        max_requests = config.rate_limit.max_requests,
        window_secs = config.rate_limit.window_secs,
        upstream_timeout_secs = config.timeouts.upstream_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config)?;
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
