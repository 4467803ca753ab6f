//! Serve command - run the gateway server.

use std::path::PathBuf;

use anyhow::{Context, Result};
use poolgate_core::Config;

use crate::ui;

/// Serve command arguments.
#[derive(Debug, Clone, Default)]
pub struct ServeArgs {
    /// Port override.
    pub port: Option<u16>,
    /// Bind address override.
    pub bind: Option<String>,
    /// Config file override.
    pub config: Option<PathBuf>,
}

/// Run the gateway until it stops.
pub async fn run_serve(args: ServeArgs) -> Result<()> {
    let mut config =
        Config::resolve(args.config.as_deref()).context("Failed to load configuration")?;

    if let Some(port) = args.port {
        config.gateway.port = port;
    }
    if let Some(bind) = args.bind {
        config.gateway.bind_address = bind;
    }

    ui::header("Starting poolgate");
    ui::kv(
        "Address",
        &format!("{}:{}", config.gateway.bind_address, config.gateway.port),
    );
    ui::kv("User pool", &config.pool.user_pool_id);
    ui::kv("Issuer", &config.pool.issuer().unwrap_or_default());
    if config.backend.credentials.is_none() {
        ui::warning("No AWS credentials found, admin calls will be sent unsigned");
    }

    poolgate_gateway::start(config).await?;
    Ok(())
}
