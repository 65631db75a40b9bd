//! API Mirror
//!
//! A pass-through proxy that relays `/api/*` to a fixed upstream
//! movie-metadata API and normalizes what comes back.
//!
//! # Architecture Overview
//!
//! ```text
//!                       ┌───────────────────────────────────────────────┐
//!                       │                  API MIRROR                    │
//!                       │                                                │
//!  Client Request       │  ┌─────────┐   ┌───────────┐   ┌───────────┐  │
//!  ─────────────────────┼─▶│  http   │──▶│ forwarder │──▶│  reqwest  │──┼──▶ Upstream
//!                       │  │ server  │   │  url.rs   │   │  client   │  │    API
//!                       │  └─────────┘   └───────────┘   └─────┬─────┘  │
//!                       │                                      │        │
//!  Client Response      │  ┌─────────┐   ┌───────────┐         │        │
//!  ◀────────────────────┼──│response │◀──│ classify  │◀────────┘        │
//!                       │  └─────────┘   └───────────┘                  │
//!                       │                                                │
//!                       │  config · observability · lifecycle            │
//!                       └───────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use api_mirror::config::load_config;
use api_mirror::http::HttpServer;
use api_mirror::lifecycle::{signals, Shutdown};
use api_mirror::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "api-mirror", version, about = "Pass-through mirror for the movie metadata API")]
struct Args {
    /// Path to a TOML config file. Defaults apply when omitted.
    #[arg(short, long, env = "MIRROR_CONFIG")]
    config: Option<PathBuf>,

    /// Listening port, overriding config and `PORT`.
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let mut config = load_config(args.config.as_deref())?;
    if let Some(port) = args.port {
        config.listener.set_port(port);
    }

    logging::init_logging(&config.observability);

    tracing::info!("api-mirror v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstream = %config.upstream.base_url,
        request_timeout_ms = config.timeouts.request_ms,
        render = ?config.upstream.render,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr)?,
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let local_addr = listener.local_addr()?;
    tracing::info!(address = %local_addr, "API endpoint: http://{}/api/*", local_addr);
    tracing::info!("Health check: http://{}/health", local_addr);

    let shutdown = Arc::new(Shutdown::new());
    let server_shutdown = shutdown.subscribe();
    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        signals::trigger_on_signal(&signal_shutdown).await;
    });

    let server = HttpServer::new(config)?;
    server.run(listener, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
