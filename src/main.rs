//! HTTP Piping Server
//!
//! Streams data between two HTTP clients matched by a shared path.
//!
//! # Architecture Overview
//!
//! ```text
//!                    ┌───────────────────────────────────────────────┐
//!                    │                PIPING SERVER                  │
//!                    │                                               │
//!   Sender           │  ┌─────────┐   ┌──────────┐   ┌────────────┐ │
//!   POST /p/<id> ────┼─▶│  http   │──▶│ handler  │──▶│   pipe     │ │
//!                    │  │ server  │   │ dispatch │   │ registry + │ │
//!   Receiver         │  └─────────┘   └────┬─────┘   │ rendezvous │ │
//!   GET  /p/<id> ◀───┼────────────────────┐│         └─────┬──────┘ │
//!                    │                    ▼▼               ▼        │
//!                    │              ┌──────────┐   ┌─────────────┐  │
//!                    │              │  assets  │   │  transfer   │  │
//!                    │              │ (non-/p/)│   │ header+copy │  │
//!                    │              └──────────┘   └─────────────┘  │
//!                    │                                              │
//!                    │  cross-cutting: config · observability ·     │
//!                    │                 lifecycle · net/tls          │
//!                    └──────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use piping_server::config::{self, ServerConfig};
use piping_server::lifecycle::{signals, Shutdown};
use piping_server::{net, observability, HttpServer};

/// Stream data between two HTTP clients matched by a shared path.
#[derive(Parser)]
#[command(name = "piping-server", version)]
struct Args {
    /// Path to a TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the HTTP bind address (e.g., "0.0.0.0:8080").
    #[arg(long)]
    bind: Option<String>,

    /// Serve static assets from this directory instead of the bundled page.
    #[arg(long)]
    static_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => config::load_config(path)?,
        None => ServerConfig::default(),
    };
    if let Some(bind) = args.bind {
        config.listener.bind_address = bind;
    }
    if let Some(static_dir) = args.static_dir {
        config.assets.static_dir = Some(static_dir);
    }

    observability::logging::init(&config.observability.log_level);

    tracing::info!(
        bind_address = %config.listener.bind_address,
        https = config.listener.https.is_some(),
        "piping-server v0.1.0 starting"
    );

    let shutdown = Shutdown::new();
    signals::spawn_handler(shutdown.clone());

    let server = HttpServer::new(config.clone());

    // The HTTPS listener shares the router, and through it the registry:
    // a sender on one listener meets a receiver on the other.
    if let Some(https) = &config.listener.https {
        let tls = net::tls::load_tls_config(https).await?;
        let addr: std::net::SocketAddr = https.bind_address.parse()?;
        let router = server.router();

        tracing::info!(address = %addr, "HTTPS server starting");
        tokio::spawn(async move {
            if let Err(error) = axum_server::bind_rustls(addr, tls)
                .serve(router.into_make_service())
                .await
            {
                tracing::error!(error = %error, "HTTPS server failed");
            }
        });
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
