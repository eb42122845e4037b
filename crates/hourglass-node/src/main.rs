//! # Hourglass Node
//!
//! Runs the relay service.
//!
//! ## Startup Sequence
//!
//! 1. Install the tracing subscriber (`RUST_LOG`, default `info`)
//! 2. Load configuration from `HOURGLASS_*` environment variables
//! 3. Build the relay service and serve until Ctrl+C
//!
//! On the rotation host a failed erase stops the process with a non-zero exit
//! status.

mod env;

use anyhow::{Context, Result};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use hourglass_relay::RelayService;

fn init_tracing(json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true);

    if json {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing(env::json_logs_from(|name| std::env::var(name).ok()))?;

    let config = env::load_config().context("failed to load configuration")?;
    info!(
        addr = %config.http_addr(),
        backend = ?config.stores.backend,
        rotation_host = config.rotation.enabled,
        "Starting Hourglass node v{}",
        env!("CARGO_PKG_VERSION")
    );

    let service = RelayService::new(config).context("invalid relay configuration")?;

    let shutdown = service.shutdown_token();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => error!(error = %e, "Cannot listen for Ctrl+C, shutting down"),
        }
        shutdown.cancel();
    });

    if let Err(e) = service.serve().await {
        error!(error = %e, "Relay stopped");
        return Err(e).context("relay failed");
    }

    info!("Hourglass node stopped");
    Ok(())
}
