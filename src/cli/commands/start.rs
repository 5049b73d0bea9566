//! Start command.
//!
//! Boots the record core with in-memory backends and open permissions and
//! runs until interrupted. Real deployments embed [`RecordHandler`] behind
//! their own transport, registries, and storage plugins; this command exists
//! to exercise a configuration end to end.

use crate::core::config::{Config, ConfigOverrides};
use crate::record::RecordHandler;
use crate::registry::{LocalListenerRegistry, LocalSubscriptionRegistry, OpenPermissions};
use crate::storage::MemoryStore;
use anyhow::Result;
use clap::Args;
use std::path::Path;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Arguments for the start command.
#[derive(Args, Debug)]
pub struct StartArgs {}

/// Start the record core and wait for ctrl-c.
pub async fn run_start(config_path: &Path, overrides: ConfigOverrides) -> Result<()> {
    let mut config = if config_path.exists() {
        Config::from_file(config_path)?
    } else {
        info!(path = %config_path.display(), "no config file found, using defaults");
        Config::default()
    };
    config.apply_overrides(&overrides);

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.telemetry.log_level.clone()))
        .init();

    let handler = RecordHandler::new(
        &config.records,
        Arc::new(MemoryStore::new()),
        Arc::new(MemoryStore::new()),
        Arc::new(LocalSubscriptionRegistry::new()),
        Arc::new(LocalListenerRegistry::new()),
        Arc::new(OpenPermissions),
    );

    info!(
        hot_path_prefixes = ?config.records.storage_hot_path_prefixes,
        exclusion_prefixes = ?config.records.storage_exclusion_prefixes,
        "record core ready"
    );

    tokio::signal::ctrl_c().await?;
    info!(
        active_transitions = handler.active_transition_count(),
        "shutting down"
    );
    Ok(())
}
