//! Tideway - unified CLI entrypoint.
//!
//! Usage:
//!   tideway start --config config/tideway.toml
//!   tideway config validate --config config/tideway.toml
//!   tideway config show --config config/tideway.toml

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tideway::cli::commands::{run_config, run_start};
use tideway::cli::{Cli, Commands};
use tideway::core::config::ConfigOverrides;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Determine config path - use global --config or default
    let config_path = cli
        .config
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config/tideway.toml"));

    let overrides = ConfigOverrides {
        log_level: cli.log_level,
    };

    match cli.command {
        Commands::Start(_args) => run_start(&config_path, overrides).await,
        Commands::Config(args) => run_config(args, &config_path),
    }
}
