//! Storage layer.
//!
//! Records persist through two tiers behind one capability trait: a fast
//! cache that every read and write touches, and a durable store that is kept
//! off the broadcast critical path. The facade gives the core a uniform
//! surface over both and owns the exclusion-prefix check.
//!
//! # Modules
//!
//! - [`facade`] - Uniform two-tier access with exclusion prefixes
//! - [`memory`] - In-memory reference store for tests and local runs

pub mod facade;
pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

pub use facade::StorageFacade;
pub use memory::MemoryStore;

/// The stored shape of a record: version plus data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordDocument {
    /// Record version.
    #[serde(rename = "_v")]
    pub version: i64,

    /// Record data, reproduced verbatim on the wire.
    #[serde(rename = "_d")]
    pub data: Value,
}

impl RecordDocument {
    /// Create a document at the given version.
    pub fn new(version: i64, data: Value) -> Self {
        Self { version, data }
    }

    /// The document written by an explicit create: version 0, empty object.
    pub fn fresh() -> Self {
        Self::new(0, Value::Object(Map::new()))
    }
}

/// Failure reported by a cache or storage plugin.
///
/// Plugins reduce their transport errors to a string; the facade attaches
/// tier and record context.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct StoreError(pub String);

impl StoreError {
    /// Create a store error from any displayable cause.
    pub fn new(message: impl std::fmt::Display) -> Self {
        Self(message.to_string())
    }
}

/// Capability surface of a cache or durable-storage plugin.
///
/// Both tiers expose the same shape; a missing record is `Ok(None)`, never an
/// error.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Fetch a record by name.
    async fn get(&self, name: &str) -> Result<Option<RecordDocument>, StoreError>;

    /// Write a record, replacing any previous value.
    async fn set(&self, name: &str, record: RecordDocument) -> Result<(), StoreError>;

    /// Remove a record. Removing a missing record succeeds.
    async fn delete(&self, name: &str) -> Result<(), StoreError>;
}
