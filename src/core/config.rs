//! Configuration parsing and validation.
//!
//! Tideway configuration is loaded from TOML files with CLI overrides.
//! The `[records]` section carries the prefix lists that steer the hot-path
//! write bypass and the durable-storage exclusions.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level Tideway configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Record core configuration.
    #[serde(default)]
    pub records: RecordsConfig,

    /// Telemetry and observability configuration.
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            records: RecordsConfig::default(),
            telemetry: TelemetryConfig::default(),
        }
    }
}

/// Record core configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordsConfig {
    /// Name prefixes that activate the hot-path write bypass.
    ///
    /// A full update for a matching name is force-written to both tiers
    /// without a transition. Matching is prefix match.
    #[serde(default)]
    pub storage_hot_path_prefixes: Vec<String>,

    /// Name prefixes for which durable-storage writes are suppressed.
    ///
    /// Matching records live in the cache tier only.
    #[serde(default)]
    pub storage_exclusion_prefixes: Vec<String>,
}

/// Telemetry and observability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

// Default value functions

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config: Config =
            toml::from_str(&content).with_context(|| "failed to parse config file")?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).with_context(|| "failed to parse config")?;
        config.validate()?;
        Ok(config)
    }

    /// Apply CLI overrides to the configuration.
    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(ref log_level) = overrides.log_level {
            self.telemetry.log_level = log_level.clone();
        }
    }

    /// Validate configuration consistency.
    pub fn validate(&self) -> Result<()> {
        self.validate_records()?;
        self.validate_telemetry()?;
        Ok(())
    }

    fn validate_records(&self) -> Result<()> {
        for prefix in &self.records.storage_hot_path_prefixes {
            if prefix.is_empty() {
                anyhow::bail!("records.storage_hot_path_prefixes must not contain empty entries");
            }
        }
        for prefix in &self.records.storage_exclusion_prefixes {
            if prefix.is_empty() {
                anyhow::bail!("records.storage_exclusion_prefixes must not contain empty entries");
            }
        }
        Ok(())
    }

    fn validate_telemetry(&self) -> Result<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.telemetry.log_level.as_str()) {
            anyhow::bail!(
                "telemetry.log_level must be one of {:?}, got: {}",
                valid_levels,
                self.telemetry.log_level
            );
        }
        Ok(())
    }
}

/// CLI override options that can be applied to configuration.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// Override log level.
    pub log_level: Option<String>,
}
