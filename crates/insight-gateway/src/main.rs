//! Insight gateway binary.
//!
//! Configuration comes from the environment (see `GatewayConfig::from_env`).
//! `RUST_LOG` sets the log filter, `INSIGHT_LOG_JSON=1` switches to JSON lines.

use anyhow::{Context, Result};
use insight_gateway::{Collaborators, GatewayConfig, GatewayService};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn init_logging() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("INSIGHT_LOG_JSON").is_ok_and(|v| v == "1" || v == "true");

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    let installed = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| anyhow::anyhow!("failed to install log subscriber: {e}"))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for ctrl-c");
        return;
    }
    info!("Received shutdown signal");
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging()?;

    let config = GatewayConfig::from_env().context("invalid configuration")?;
    let collaborators = Collaborators::from_config(&config);
    let service = GatewayService::new(config, collaborators)?;

    if service.config().phone.endpoint.is_none() {
        warn!("PHONENUMBERSOCKET not set; /phonenumber lookups will fail");
    }

    let listener = service.bind().await?;
    service.serve(listener, shutdown_signal()).await?;
    Ok(())
}
