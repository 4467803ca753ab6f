//! Check-config command - validate configuration without starting.

use std::path::PathBuf;

use anyhow::{Result, bail};
use poolgate_core::Config;

use crate::ui;

/// Load, override and validate the configuration, then print the result.
pub fn run_check_config(path: Option<PathBuf>) -> Result<()> {
    ui::header("Validating Configuration");

    let file = path.clone().unwrap_or_else(Config::default_path);
    if file.exists() {
        let content = std::fs::read_to_string(&file)?;
        match json5::from_str::<serde_json::Value>(&content) {
            Ok(_) => ui::success(&format!("Syntax: {} is valid JSON5", file.display())),
            Err(e) => {
                ui::error(&format!("Syntax error: {e}"));
                bail!("Invalid configuration file");
            }
        }
    } else if path.is_some() {
        ui::error(&format!("Config file not found: {}", file.display()));
        bail!("Invalid configuration file");
    } else {
        ui::info("No config file, using environment only");
    }

    let config = match Config::resolve(path.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            ui::error(&format!("Schema error: {e}"));
            bail!("Invalid configuration");
        }
    };

    ui::success("Configuration is valid");
    ui::kv("User pool", &config.pool.user_pool_id);
    ui::kv("Client id", &config.pool.client_id);
    ui::kv("Issuer", &config.pool.issuer().unwrap_or_default());
    ui::kv("Region", &config.pool.region().unwrap_or_else(|| "-".to_string()));
    ui::kv(
        "Backend",
        config.backend.endpoint.as_deref().unwrap_or("regional endpoint"),
    );
    ui::kv(
        "Signed",
        if config.backend.credentials.is_some() {
            "yes"
        } else {
            "no"
        },
    );
    ui::kv(
        "Listen",
        &format!("{}:{}", config.gateway.bind_address, config.gateway.port),
    );

    Ok(())
}
