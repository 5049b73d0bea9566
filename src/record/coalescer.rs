//! Record request coalescing.
//!
//! At most one backend fetch is outstanding per record name. Concurrent
//! callers for the same name attach to the in-flight fetch and all receive
//! the same outcome, in registration order. A miss in both tiers is not an
//! error; it completes with `None`.

use crate::core::error::{RecordError, RecordResult, Tier};
use crate::record::stability::StabilityGate;
use crate::storage::{RecordDocument, StorageFacade};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::debug;

type LoadOutcome = RecordResult<Option<RecordDocument>>;

/// Deduplicating cache-first record loader.
pub struct RecordCoalescer {
    facade: Arc<StorageFacade>,
    waiters: Mutex<HashMap<String, Vec<oneshot::Sender<LoadOutcome>>>>,
}

impl RecordCoalescer {
    /// Create a coalescer over the given storage facade.
    pub fn new(facade: Arc<StorageFacade>) -> Self {
        Self {
            facade,
            waiters: Mutex::new(HashMap::new()),
        }
    }

    /// Load the current value of a record.
    ///
    /// Consults the cache first and durable storage on miss. While a fetch
    /// for `name` is outstanding, further callers wait on its outcome instead
    /// of issuing their own.
    pub async fn load(&self, name: &str) -> LoadOutcome {
        let attached = {
            let mut waiters = self.waiters.lock();
            match waiters.get_mut(name) {
                Some(pending) => {
                    let (resolve, outcome) = oneshot::channel();
                    pending.push(resolve);
                    Some(outcome)
                }
                None => {
                    waiters.insert(name.to_string(), Vec::new());
                    None
                }
            }
        };

        if let Some(outcome) = attached {
            debug!(record = name, "attached to in-flight record fetch");
            return outcome.await.unwrap_or_else(|_| {
                Err(RecordError::read(
                    Tier::Cache,
                    name,
                    "in-flight record fetch was dropped",
                ))
            });
        }

        let outcome = self.facade.load(name).await;

        let pending = self.waiters.lock().remove(name).unwrap_or_default();
        for resolve in pending {
            let _ = resolve.send(outcome.clone());
        }
        outcome
    }

    /// Number of callers attached to the in-flight fetch for `name`.
    pub fn attached_count(&self, name: &str) -> usize {
        self.waiters.lock().get(name).map_or(0, Vec::len)
    }
}

/// Record loader for permission rules.
///
/// Routes every read through the stability gate, so a rule evaluating a
/// write never observes record state older than the writes already
/// acknowledged for that name. All other callers use [`RecordCoalescer`]
/// directly.
#[derive(Clone)]
pub struct GatedRecordReader {
    gate: Arc<StabilityGate>,
    coalescer: Arc<RecordCoalescer>,
}

impl GatedRecordReader {
    /// Create a gated reader.
    pub fn new(gate: Arc<StabilityGate>, coalescer: Arc<RecordCoalescer>) -> Self {
        Self { gate, coalescer }
    }

    /// Load a record once all preceding requests for it have drained.
    pub async fn read(&self, name: &str) -> LoadOutcome {
        self.gate.run_when_record_stable(name).acquired().await;
        let outcome = self.coalescer.load(name).await;
        self.gate.remove_record_request(name);
        outcome
    }
}
