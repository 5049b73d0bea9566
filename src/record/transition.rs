//! Per-record write serialization.
//!
//! A transition linearizes every write for one record name: steps are
//! accepted at strictly increasing versions, applied in order to the resident
//! value, written to the cache tier, broadcast after the cache ack, and
//! mirrored to durable storage off the critical path. The transition owns the
//! in-memory working copy while it is alive; when its queue drains, ownership
//! reverts to the cache tier.

use crate::core::error::RecordError;
use crate::protocol::{RecordAction, RecordMessage, RecordPath, Sender};
use crate::record::coalescer::RecordCoalescer;
use crate::record::fanout::RecordFanout;
use crate::record::stability::StabilityGate;
use crate::storage::{RecordDocument, StorageFacade};
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Weak};
use tracing::{debug, error};

/// Result of offering a step to a transition.
#[derive(Debug)]
pub enum AddOutcome {
    /// The step was queued.
    Accepted,
    /// The version was already accepted; reply with `VERSION_EXISTS`.
    VersionExists,
    /// The version skips ahead; reply with `INVALID_VERSION`.
    InvalidVersion,
    /// The payload or path did not parse.
    Malformed(RecordError),
    /// The transition already finished; the caller must start a fresh one.
    Terminal,
}

/// One queued write step.
struct TransitionStep {
    sender: Sender,
    message: RecordMessage,
    version: i64,
    payload: Value,
    path: Option<RecordPath>,
    is_erase: bool,
    wants_write_ack: bool,
}

#[derive(Default)]
struct TransitionState {
    steps: VecDeque<TransitionStep>,
    record: Option<RecordDocument>,
    last_accepted: Option<i64>,
    pending_version_exists: Vec<(Sender, Option<String>)>,
    destroyed: bool,
    terminal: bool,
    worker_started: bool,
}

/// Per-record write serializer.
pub struct RecordTransition {
    name: String,
    upsert: bool,
    facade: Arc<StorageFacade>,
    coalescer: Arc<RecordCoalescer>,
    gate: Arc<StabilityGate>,
    fanout: RecordFanout,
    table: Arc<TransitionTable>,
    weak_self: Weak<RecordTransition>,
    state: Mutex<TransitionState>,
}

impl RecordTransition {
    /// Create a transition for `name`.
    ///
    /// With `upsert` set, a missing record is created on the fly and the
    /// first accepted version is whatever the client supplied.
    pub fn new(
        name: impl Into<String>,
        upsert: bool,
        facade: Arc<StorageFacade>,
        coalescer: Arc<RecordCoalescer>,
        gate: Arc<StabilityGate>,
        fanout: RecordFanout,
        table: Arc<TransitionTable>,
    ) -> Arc<Self> {
        let name = name.into();
        Arc::new_cyclic(|weak_self| Self {
            name,
            upsert,
            facade,
            coalescer,
            gate,
            fanout,
            table,
            weak_self: weak_self.clone(),
            state: Mutex::new(TransitionState::default()),
        })
    }

    /// The record name this transition serializes.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether `version` has already been accepted into the queue.
    pub fn has_version(&self, version: i64) -> bool {
        let state = self.state.lock();
        match state.last_accepted {
            Some(last) => version <= last,
            None => state
                .record
                .as_ref()
                .is_some_and(|record| version <= record.version),
        }
    }

    /// Reply `VERSION_EXISTS` to a sender that raced with an accepted write.
    ///
    /// If the record has not loaded yet, the reply is queued and flushed with
    /// the resident version once it has.
    pub fn send_version_exists(&self, sender: &Sender, message: &RecordMessage) {
        let reply = {
            let mut state = self.state.lock();
            match state.record.as_ref() {
                Some(record) => Some(RecordMessage::version_exists(
                    &self.name,
                    record.version,
                    record.data.clone(),
                    message.correlation_id.clone(),
                )),
                None => {
                    state
                        .pending_version_exists
                        .push((sender.clone(), message.correlation_id.clone()));
                    None
                }
            }
        };
        if let Some(reply) = reply {
            sender.send(reply);
        }
    }

    /// Offer a write step.
    ///
    /// The payload is parsed here, once; the decoded value rides along with
    /// the step. The first accepted step starts the worker that drains the
    /// queue.
    pub fn add(&self, sender: &Sender, message: &RecordMessage) -> AddOutcome {
        let mut message = message.clone();
        let Some(version) = message.version else {
            return AddOutcome::Malformed(RecordError::MalformedPayload {
                message: "versioned write without a version".to_string(),
            });
        };

        let is_erase = message.action == RecordAction::Erase;
        let payload = if is_erase {
            Value::Null
        } else {
            match message.parsed() {
                Ok(value) => value.clone(),
                Err(err) => return AddOutcome::Malformed(err),
            }
        };

        let path = if message.action.is_patch() {
            let Some(raw) = message.path.as_deref() else {
                return AddOutcome::Malformed(RecordError::MalformedPayload {
                    message: "partial write without a path".to_string(),
                });
            };
            match RecordPath::parse(raw) {
                Ok(path) => Some(path),
                Err(err) => return AddOutcome::Malformed(err),
            }
        } else {
            None
        };

        let spawn_worker = {
            let mut state = self.state.lock();
            if state.destroyed || state.terminal {
                return AddOutcome::Terminal;
            }
            if let Some(last) = state.last_accepted {
                if version <= last {
                    return AddOutcome::VersionExists;
                }
                if version > last + 1 {
                    return AddOutcome::InvalidVersion;
                }
            }
            let wants_write_ack = message.is_write_ack;
            state.steps.push_back(TransitionStep {
                sender: sender.clone(),
                message,
                version,
                payload,
                path,
                is_erase,
                wants_write_ack,
            });
            state.last_accepted = Some(version);
            let spawn = !state.worker_started;
            state.worker_started = true;
            spawn
        };

        if spawn_worker {
            if let Some(worker) = self.weak_self.upgrade() {
                tokio::spawn(worker.run());
            }
        }
        AddOutcome::Accepted
    }

    /// Whether this transition never accepted a step and never started.
    pub fn is_inert(&self) -> bool {
        let state = self.state.lock();
        !state.worker_started && state.steps.is_empty()
    }

    /// Abort the transition.
    ///
    /// Pending steps are discarded without persisting or broadcasting;
    /// senders awaiting a write-ack receive one carrying the abort error.
    pub fn destroy(&self, reason: &str) {
        let drained = {
            let mut state = self.state.lock();
            if state.destroyed {
                return;
            }
            state.destroyed = true;
            std::mem::take(&mut state.steps)
        };

        if !drained.is_empty() {
            debug!(record = %self.name, pending = drained.len(), reason, "transition aborted");
        }
        let abort = RecordError::TransitionAborted {
            name: self.name.clone(),
            reason: reason.to_string(),
        };
        for step in drained {
            if step.wants_write_ack {
                step.sender.send(RecordMessage::write_acknowledgement(
                    &self.name,
                    step.version,
                    Some(abort.wire_form()),
                ));
            }
        }
    }

    /// Worker: load the record, then drain the step queue in order.
    async fn run(self: Arc<Self>) {
        let loaded = self.coalescer.load(&self.name).await;

        let load_failure = {
            let mut state = self.state.lock();
            if state.destroyed {
                return;
            }
            match loaded {
                Ok(Some(record)) => {
                    state.last_accepted = Some(
                        state
                            .last_accepted
                            .map_or(record.version, |last| last.max(record.version)),
                    );
                    state.record = Some(record);
                    None
                }
                Ok(None) if self.upsert => {
                    // Fresh record: resident version sits one below the first
                    // queued step so the supplied version is the one applied.
                    let first_version = state.steps.front().map_or(0, |step| step.version);
                    state.record = Some(RecordDocument::new(
                        first_version - 1,
                        Value::Object(Map::new()),
                    ));
                    None
                }
                Ok(None) => Some("update of nonexistent record".to_string()),
                Err(err) => Some(err.wire_form()),
            }
        };

        if let Some(detail) = load_failure {
            self.fail_all(&detail);
            return;
        }

        self.flush_version_exists();

        loop {
            let step = {
                let mut state = self.state.lock();
                if state.destroyed {
                    return;
                }
                match state.steps.pop_front() {
                    Some(step) => step,
                    None => {
                        state.terminal = true;
                        state.record = None;
                        break;
                    }
                }
            };
            if !self.process_step(step).await {
                return;
            }
        }

        self.table.remove_if(&self.name, self.as_ref());
    }

    /// Apply one step: mutate the resident value, persist, broadcast, ack.
    ///
    /// Returns false when the transition aborted and the worker must stop.
    async fn process_step(&self, step: TransitionStep) -> bool {
        let applied = {
            let mut state = self.state.lock();
            let record = state.record.as_mut().expect("record resident after load");

            if step.version <= record.version {
                let reply = RecordMessage::version_exists(
                    &self.name,
                    record.version,
                    record.data.clone(),
                    step.message.correlation_id.clone(),
                );
                drop(state);
                step.sender.send(reply);
                return true;
            }
            if step.version > record.version + 1 {
                let reply = RecordMessage::record_error(
                    RecordAction::InvalidVersion,
                    &step.message,
                    format!(
                        "version {} skips ahead of current version {}",
                        step.version, record.version
                    ),
                );
                drop(state);
                step.sender.send(reply);
                return true;
            }

            if step.is_erase {
                step.path
                    .as_ref()
                    .expect("erase step carries a path")
                    .erase(&mut record.data);
            } else if let Some(path) = step.path.as_ref() {
                path.set(&mut record.data, step.payload.clone());
            } else {
                record.data = step.payload.clone();
            }
            record.version = step.version;
            RecordDocument::new(record.version, record.data.clone())
        };

        // Cache write; nothing is observable until it acknowledges.
        if let Err(err) = self.facade.cache_set(&self.name, applied.clone()).await {
            error!(record = %self.name, error = %err, "cache write failed, aborting transition");
            step.sender.send(RecordMessage::record_error(
                RecordAction::RecordUpdateError,
                &step.message,
                err.wire_form(),
            ));
            if step.wants_write_ack {
                step.sender.send(RecordMessage::write_acknowledgement(
                    &self.name,
                    step.version,
                    Some(err.wire_form()),
                ));
            }
            self.destroy("cache write failed");
            self.table.remove_if(&self.name, self);
            return false;
        }

        // Broadcast the original message, normalized, to local subscribers.
        self.fanout
            .broadcast(&self.name, &step.message, false, Some(&step.sender));

        // Durable write stays off the broadcast critical path.
        let storage_task = {
            let facade = Arc::clone(&self.facade);
            let name = self.name.clone();
            tokio::spawn(async move { facade.storage_set(&name, applied).await })
        };

        if step.wants_write_ack {
            let sender = step.sender.clone();
            let name = self.name.clone();
            let version = step.version;
            tokio::spawn(async move {
                let error = match storage_task.await {
                    Ok(Ok(())) => None,
                    Ok(Err(err)) => Some(err.wire_form()),
                    Err(join_error) => Some(format!("durable write task failed: {join_error}")),
                };
                sender.send(RecordMessage::write_acknowledgement(&name, version, error));
            });
        }

        // One gate waiter may proceed now that the cache ack landed.
        self.gate.remove_record_request(&self.name);
        true
    }

    /// Report a fatal pre-commit failure to every queued sender and abort.
    fn fail_all(&self, detail: &str) {
        let drained = {
            let mut state = self.state.lock();
            state.destroyed = true;
            std::mem::take(&mut state.steps)
        };
        for step in drained {
            step.sender.send(RecordMessage::record_error(
                RecordAction::RecordUpdateError,
                &step.message,
                detail,
            ));
            if step.wants_write_ack {
                step.sender.send(RecordMessage::write_acknowledgement(
                    &self.name,
                    step.version,
                    Some(detail.to_string()),
                ));
            }
        }
        self.table.remove_if(&self.name, self);
    }

    /// Flush `VERSION_EXISTS` replies queued before the record loaded.
    fn flush_version_exists(&self) {
        let (pending, version, data) = {
            let mut state = self.state.lock();
            let record = state.record.as_ref().expect("record resident after load");
            let version = record.version;
            let data = record.data.clone();
            (
                std::mem::take(&mut state.pending_version_exists),
                version,
                data,
            )
        };
        for (sender, correlation_id) in pending {
            sender.send(RecordMessage::version_exists(
                &self.name,
                version,
                data.clone(),
                correlation_id,
            ));
        }
    }
}

/// Table of active transitions, keyed by record name.
///
/// Shared between the handler (which routes steps) and the workers (which
/// retire themselves when their queue drains).
#[derive(Default)]
pub struct TransitionTable {
    map: Mutex<HashMap<String, Arc<RecordTransition>>>,
}

impl TransitionTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// The active transition for `name`, if any.
    pub fn get(&self, name: &str) -> Option<Arc<RecordTransition>> {
        self.map.lock().get(name).cloned()
    }

    /// Whether a transition is active for `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.map.lock().contains_key(name)
    }

    /// Fetch the transition for `name`, creating it if absent.
    pub fn get_or_insert_with(
        &self,
        name: &str,
        make: impl FnOnce() -> Arc<RecordTransition>,
    ) -> Arc<RecordTransition> {
        let mut map = self.map.lock();
        map.entry(name.to_string()).or_insert_with(make).clone()
    }

    /// Remove the entry for `name` if it still maps to `transition`.
    pub fn remove_if(&self, name: &str, transition: &RecordTransition) {
        let mut map = self.map.lock();
        if let Some(existing) = map.get(name) {
            if std::ptr::eq(Arc::as_ptr(existing), transition) {
                map.remove(name);
            }
        }
    }

    /// Abort and remove the transition for `name`, if any.
    ///
    /// Returns whether a transition was aborted.
    pub fn abort(&self, name: &str, reason: &str) -> bool {
        let removed = self.map.lock().remove(name);
        match removed {
            Some(transition) => {
                transition.destroy(reason);
                true
            }
            None => false,
        }
    }

    /// Number of active transitions.
    pub fn active_count(&self) -> usize {
        self.map.lock().len()
    }
}
