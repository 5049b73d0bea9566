//! Command-line interface.
//!
//! Unified CLI for Tideway operations.

pub mod commands;

use clap::{Parser, Subcommand};

/// Tideway - record core of a realtime data-sync server.
#[derive(Parser, Debug)]
#[command(name = "tideway")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file path.
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the record core with in-memory backends.
    Start(commands::StartArgs),
    /// Configuration operations.
    Config(commands::ConfigArgs),
}
