//! In-memory record store.
//!
//! Reference implementation of the [`RecordStore`] capability, used for
//! tests and standalone runs. Failure injection lets tests exercise the
//! error paths without a real backend.

use crate::storage::{RecordDocument, RecordStore, StoreError};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// In-memory `RecordStore` backed by a hash map.
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<String, RecordDocument>>,
    failure: Mutex<Option<String>>,
    latency: Mutex<Option<Duration>>,
    operations: AtomicUsize,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent operation fail with the given message.
    pub fn fail_with(&self, message: impl Into<String>) {
        *self.failure.lock() = Some(message.into());
    }

    /// Clear any injected failure.
    pub fn heal(&self) {
        *self.failure.lock() = None;
    }

    /// Delay every subsequent operation by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock() = Some(latency);
    }

    async fn pause(&self) {
        let latency = *self.latency.lock();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }

    /// Number of operations issued against this store.
    pub fn operation_count(&self) -> usize {
        self.operations.load(Ordering::Relaxed)
    }

    /// Number of records currently held.
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    /// Whether the store holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    /// Whether a record is present.
    pub fn contains(&self, name: &str) -> bool {
        self.records.lock().contains_key(name)
    }

    /// Current value of a record, if present.
    pub fn snapshot(&self, name: &str) -> Option<RecordDocument> {
        self.records.lock().get(name).cloned()
    }

    fn check_failure(&self) -> Result<(), StoreError> {
        self.operations.fetch_add(1, Ordering::Relaxed);
        match self.failure.lock().as_ref() {
            Some(message) => Err(StoreError(message.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn get(&self, name: &str) -> Result<Option<RecordDocument>, StoreError> {
        self.pause().await;
        self.check_failure()?;
        Ok(self.records.lock().get(name).cloned())
    }

    async fn set(&self, name: &str, record: RecordDocument) -> Result<(), StoreError> {
        self.pause().await;
        self.check_failure()?;
        self.records.lock().insert(name.to_string(), record);
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<(), StoreError> {
        self.pause().await;
        self.check_failure()?;
        self.records.lock().remove(name);
        Ok(())
    }
}
