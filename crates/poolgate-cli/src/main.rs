//! poolgate CLI - run and inspect the user pool gateway.

mod commands;
mod ui;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser)]
#[command(name = "poolgate")]
#[command(about = "poolgate - HTTP gateway for a managed user pool")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true, env = "POOLGATE_JSON_LOGS")]
    json_logs: bool,

    /// Configuration file (defaults to ~/.poolgate/poolgate.json)
    #[arg(short, long, global = true, env = "POOLGATE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the gateway server
    Serve {
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// Bind address
        #[arg(long)]
        bind: Option<String>,
    },

    /// Validate configuration and print the effective settings
    CheckConfig,

    /// Verify an access token against the configured pool
    ValidateToken {
        /// The access token, bare or as a `Bearer <token>` header value
        token: String,
    },
}

fn init_logging(verbose: bool, json: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().with_target(false)).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.json_logs);

    match cli.command {
        Commands::Serve { port, bind } => {
            let args = commands::serve::ServeArgs {
                port,
                bind,
                config: cli.config,
            };
            commands::run_serve(args).await?;
        }

        Commands::CheckConfig => {
            commands::run_check_config(cli.config)?;
        }

        Commands::ValidateToken { token } => {
            commands::run_validate_token(&token, cli.config).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_serve_flags() {
        let cli =
            Cli::try_parse_from(["poolgate", "serve", "--port", "9000", "--bind", "0.0.0.0"])
                .unwrap();
        match cli.command {
            Commands::Serve { port, bind } => {
                assert_eq!(port, Some(9000));
                assert_eq!(bind.as_deref(), Some("0.0.0.0"));
            }
            _ => panic!("expected serve"),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "poolgate",
            "validate-token",
            "abc.def.ghi",
            "--verbose",
            "--config",
            "/tmp/pg.json",
        ])
        .unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/pg.json")));
        assert!(matches!(cli.command, Commands::ValidateToken { ref token } if token == "abc.def.ghi"));
    }

    #[test]
    fn test_token_is_required() {
        assert!(Cli::try_parse_from(["poolgate", "validate-token"]).is_err());
    }
}
