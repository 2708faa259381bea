//! Protocol adapter server.
//!
//! ```text
//!     HTTP request ──▶ ┌──────────┐
//!                      │  server  │──▶ dispatcher ──▶ handlers
//!     RPC frame ─────▶ └──────────┘        │
//!                                          ▼
//!                                   PeerClient ──▶ pool ──▶ remote peer
//! ```
//!
//! Serves the built-in `GET /health` and `GET /echo/:value` handlers.

use clap::Parser;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;

use protocol_adapter::config::{load_config, AdapterConfig};
use protocol_adapter::lifecycle::{wait_for_signal, Shutdown};
use protocol_adapter::observability::{logging, metrics};
use protocol_adapter::server::{AdapterServer, DispatcherBuilder, HandlerResult};
use protocol_adapter::{Method, RequestEnvelope, ResponseEnvelope};

#[derive(Parser)]
#[command(name = "protocol-adapter")]
#[command(about = "Serve handlers over HTTP and WebSocket RPC", long_about = None)]
struct Cli {
    /// Path to a TOML config file. Defaults are used when absent.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

async fn health(_req: RequestEnvelope) -> HandlerResult {
    Ok(ResponseEnvelope::ok(vec![json!({ "status": "ok" })], "healthy"))
}

async fn echo(req: RequestEnvelope) -> HandlerResult {
    let value = req.var("value").unwrap_or_default();
    Ok(ResponseEnvelope::ok(vec![json!(value)], "echo"))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => AdapterConfig::default(),
    };

    logging::init_logging(&config.observability.log_level);
    tracing::info!(
        bind_address = %config.server.bind_address,
        rpc_path = %config.server.rpc_path,
        hostname = %config.server.hostname,
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

    let dispatcher = DispatcherBuilder::from_config(&config.server)
        .register(Method::Get, "/health", health)
        .register(Method::Get, "/echo/:value", echo)
        .build();

    let shutdown = Shutdown::new();
    tokio::spawn(wait_for_signal(shutdown.clone()));

    AdapterServer::new(Arc::new(dispatcher), config.server.clone())
        .serve(&shutdown)
        .await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
