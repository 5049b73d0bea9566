//! Uniform access to the cache and durable-storage tiers.
//!
//! The facade attaches tier and record context to plugin errors and owns the
//! exclusion-prefix list that keeps ephemeral records out of durable storage.
//! Durable-tier failures on the write path are logged here; whether they also
//! reach the sender is the caller's decision (they only do inside a requested
//! write-ack payload).

use crate::core::error::{RecordError, RecordResult, Tier};
use crate::storage::{RecordDocument, RecordStore};
use std::sync::Arc;
use tracing::{debug, error};

/// Two-tier storage facade.
pub struct StorageFacade {
    cache: Arc<dyn RecordStore>,
    storage: Arc<dyn RecordStore>,
    exclusion_prefixes: Vec<String>,
}

impl StorageFacade {
    /// Create a facade over the given tiers.
    pub fn new(
        cache: Arc<dyn RecordStore>,
        storage: Arc<dyn RecordStore>,
        exclusion_prefixes: Vec<String>,
    ) -> Self {
        Self {
            cache,
            storage,
            exclusion_prefixes,
        }
    }

    /// Whether durable-storage writes are suppressed for this name.
    pub fn is_excluded(&self, name: &str) -> bool {
        self.exclusion_prefixes
            .iter()
            .any(|prefix| name.starts_with(prefix))
    }

    /// Cache-first load: cache hit wins, durable storage covers the miss,
    /// a miss in both tiers is `Ok(None)`.
    ///
    /// Excluded names are never written to the durable tier, so their loads
    /// never consult it either.
    pub async fn load(&self, name: &str) -> RecordResult<Option<RecordDocument>> {
        if let Some(record) = self.cache_get(name).await? {
            return Ok(Some(record));
        }
        if self.is_excluded(name) {
            return Ok(None);
        }
        self.storage_get(name).await
    }

    /// Fetch from the cache tier.
    pub async fn cache_get(&self, name: &str) -> RecordResult<Option<RecordDocument>> {
        self.cache
            .get(name)
            .await
            .map_err(|err| RecordError::read(Tier::Cache, name, err))
    }

    /// Write to the cache tier.
    pub async fn cache_set(&self, name: &str, record: RecordDocument) -> RecordResult<()> {
        self.cache
            .set(name, record)
            .await
            .map_err(|err| RecordError::write(Tier::Cache, name, err))
    }

    /// Delete from the cache tier.
    pub async fn cache_delete(&self, name: &str) -> RecordResult<()> {
        self.cache
            .delete(name)
            .await
            .map_err(|err| RecordError::delete(Tier::Cache, name, err))
    }

    /// Fetch from the durable tier.
    pub async fn storage_get(&self, name: &str) -> RecordResult<Option<RecordDocument>> {
        self.storage
            .get(name)
            .await
            .map_err(|err| RecordError::read(Tier::Storage, name, err))
    }

    /// Write to the durable tier, honoring the exclusion prefixes.
    ///
    /// Failures are logged here; callers surface them only inside write-ack
    /// payloads.
    pub async fn storage_set(&self, name: &str, record: RecordDocument) -> RecordResult<()> {
        if self.is_excluded(name) {
            debug!(record = name, "durable write suppressed by exclusion prefix");
            return Ok(());
        }
        self.storage
            .set(name, record)
            .await
            .map_err(|err| {
                let err = RecordError::write(Tier::Storage, name, err);
                error!(record = name, error = %err, "durable write failed");
                err
            })
    }

    /// Delete from the durable tier, honoring the exclusion prefixes.
    pub async fn storage_delete(&self, name: &str) -> RecordResult<()> {
        if self.is_excluded(name) {
            debug!(record = name, "durable delete suppressed by exclusion prefix");
            return Ok(());
        }
        self.storage
            .delete(name)
            .await
            .map_err(|err| RecordError::delete(Tier::Storage, name, err))
    }
}
