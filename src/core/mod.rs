//! Core infrastructure: configuration and error types.

pub mod config;
pub mod error;

pub use config::{Config, ConfigOverrides, RecordsConfig, TelemetryConfig};
pub use error::{RecordError, RecordResult, Tier};
