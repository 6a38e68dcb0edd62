//! æternity balance sweeper.
//!
//! ```text
//!   middleware WebSocket                         æternity node (HTTP)
//!          │                                            ▲
//!          ▼                                            │
//!   ┌─────────────┐   BlockEvent   ┌──────────────┐   ChainClient
//!   │  listener   │───────────────▶│    sweep     │──────────┘
//!   │ (reconnect) │                │  executor    │
//!   └─────────────┘                └──────────────┘
//!          ▲                               │
//!          │ shutdown                      ▼
//!   ┌─────────────┐                ┌──────────────┐
//!   │  lifecycle  │                │ observability│──▶ <logs_dir>/<start>.log
//!   │  (signals)  │                │              │──▶ /metrics (optional)
//!   └─────────────┘                └──────────────┘
//! ```

use chrono::Utc;
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;

use balance_sweeper::cli::Cli;
use balance_sweeper::lifecycle::{signals, startup, Shutdown};
use balance_sweeper::listener::ListenerExit;
use balance_sweeper::observability::{self, metrics};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let started_at = Utc::now();
    let args = Cli::parse().into_startup_args()?;
    // malformed input fails before the log directory exists
    startup::check_inputs(&args)?;
    let config = startup::load_settings(&args)?;

    observability::init_logging(&config.observability, started_at)?;
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        network = %config.network.name,
        node_url = %config.network.node_url(),
        ws_url = %config.network.ws_url(),
        "balance-sweeper starting"
    );

    let prepared = match startup::prepare(config, &args) {
        Ok(prepared) => prepared,
        Err(e) => {
            tracing::error!(error = %e, "Startup failed");
            return Err(e.into());
        }
    };
    drop(args);

    if prepared.config.observability.metrics_enabled {
        match prepared.config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %prepared.config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let executor = Arc::new(startup::build_executor(&prepared)?);
    let shutdown = Shutdown::new();
    tokio::spawn(signals::shutdown_on_signal(shutdown.clone()));

    let exit = startup::run_agent(&prepared.config, executor, &shutdown).await;
    if exit != ListenerExit::Shutdown {
        tracing::warn!(exit = ?exit, "Listener stopped; waiting for termination signal");
        shutdown.subscribe().recv().await.ok();
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
