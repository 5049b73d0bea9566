//! Configuration commands.

use crate::core::config::Config;
use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use std::path::Path;

/// Arguments for config operations.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Validate a configuration file.
    Validate,
    /// Print the effective configuration as TOML.
    Show,
}

/// Run a config command against the given file.
pub fn run_config(args: ConfigArgs, config_path: &Path) -> Result<()> {
    let config = Config::from_file(config_path)?;
    match args.command {
        ConfigCommand::Validate => {
            println!("configuration ok: {}", config_path.display());
        }
        ConfigCommand::Show => {
            let rendered =
                toml::to_string_pretty(&config).context("failed to render configuration")?;
            print!("{rendered}");
        }
    }
    Ok(())
}
