//! Common test utilities.
//!
//! This module contains shared helpers for integration tests.
//! Import with `mod common;` in test files.
#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tideway::core::config::RecordsConfig;
use tideway::core::error::{RecordError, RecordResult};
use tideway::protocol::{MessageSink, RecordAction, RecordMessage, Sender};
use tideway::record::{GatedRecordReader, RecordHandler};
use tideway::registry::{
    LocalListenerRegistry, LocalSubscriptionRegistry, OpenPermissions, PermissionGate,
};
use tideway::storage::MemoryStore;

/// Message sink that records everything sent to it.
pub struct MockSink {
    id: u64,
    user: String,
    auth_data: Value,
    remote: bool,
    outbox: Mutex<Vec<RecordMessage>>,
}

impl MockSink {
    /// Create a local client sink.
    pub fn new(id: u64, user: &str) -> Arc<Self> {
        Arc::new(Self {
            id,
            user: user.to_string(),
            auth_data: Value::Null,
            remote: false,
            outbox: Mutex::new(Vec::new()),
        })
    }

    /// Create a sink representing the peer message bus.
    pub fn remote(id: u64) -> Arc<Self> {
        Arc::new(Self {
            id,
            user: "peer".to_string(),
            auth_data: Value::Null,
            remote: true,
            outbox: Mutex::new(Vec::new()),
        })
    }

    /// Everything sent to this sink so far.
    pub fn sent(&self) -> Vec<RecordMessage> {
        self.outbox.lock().clone()
    }

    /// Messages with the given action, in arrival order.
    pub fn sent_with(&self, action: RecordAction) -> Vec<RecordMessage> {
        self.sent()
            .into_iter()
            .filter(|message| message.action == action)
            .collect()
    }

    /// Number of messages with the given action.
    pub fn count(&self, action: RecordAction) -> usize {
        self.sent_with(action).len()
    }

    /// Wait until a message with the given action arrives.
    pub async fn expect(&self, action: RecordAction) -> RecordMessage {
        let deadline = Duration::from_secs(2);
        let poll = async {
            loop {
                if let Some(message) = self.sent_with(action).into_iter().next() {
                    return message;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        };
        tokio::time::timeout(deadline, poll)
            .await
            .unwrap_or_else(|_| panic!("no {action} message arrived within {deadline:?}"))
    }
}

impl MessageSink for MockSink {
    fn id(&self) -> u64 {
        self.id
    }

    fn user(&self) -> &str {
        &self.user
    }

    fn auth_data(&self) -> &Value {
        &self.auth_data
    }

    fn is_remote(&self) -> bool {
        self.remote
    }

    fn send(&self, message: RecordMessage) {
        self.outbox.lock().push(message);
    }
}

/// Upcast a mock sink to the capability type the handler takes.
pub fn as_sender(sink: &Arc<MockSink>) -> Sender {
    sink.clone()
}

/// A wired record core with inspectable backends.
pub struct TestCore {
    pub handler: RecordHandler,
    pub cache: Arc<MemoryStore>,
    pub storage: Arc<MemoryStore>,
    pub subscriptions: Arc<LocalSubscriptionRegistry>,
    pub listeners: Arc<LocalListenerRegistry>,
}

/// Build a core with default config and open permissions.
pub fn core() -> TestCore {
    core_with(RecordsConfig::default(), Arc::new(OpenPermissions))
}

/// Build a core with the given config and permission gate.
pub fn core_with(config: RecordsConfig, permissions: Arc<dyn PermissionGate>) -> TestCore {
    let cache = Arc::new(MemoryStore::new());
    let storage = Arc::new(MemoryStore::new());
    let subscriptions = Arc::new(LocalSubscriptionRegistry::new());
    let listeners = Arc::new(LocalListenerRegistry::new());
    let handler = RecordHandler::new(
        &config,
        cache.clone(),
        storage.clone(),
        subscriptions.clone(),
        listeners.clone(),
        permissions,
    );
    TestCore {
        handler,
        cache,
        storage,
        subscriptions,
        listeners,
    }
}

/// Wait until a condition holds, or fail after two seconds.
pub async fn wait_until(what: &str, mut condition: impl FnMut() -> bool) {
    let deadline = Duration::from_secs(2);
    let poll = async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    };
    tokio::time::timeout(deadline, poll)
        .await
        .unwrap_or_else(|_| panic!("condition not reached within {deadline:?}: {what}"));
}

/// Permission gate denying a fixed set of actions.
pub struct DenyActions(pub Vec<RecordAction>);

#[async_trait]
impl PermissionGate for DenyActions {
    async fn can_perform_action(
        &self,
        _user: &str,
        message: &RecordMessage,
        _auth_data: &Value,
        _sender: &Sender,
    ) -> RecordResult<bool> {
        Ok(!self.0.contains(&message.action))
    }
}

/// Permission gate that always fails to evaluate.
pub struct FailingPermissions;

#[async_trait]
impl PermissionGate for FailingPermissions {
    async fn can_perform_action(
        &self,
        _user: &str,
        message: &RecordMessage,
        _auth_data: &Value,
        _sender: &Sender,
    ) -> RecordResult<bool> {
        Err(RecordError::Permission {
            name: message.name.clone(),
            message: "rule engine offline".to_string(),
        })
    }
}

/// Permission gate that allows everything and records the probes it saw.
#[derive(Default)]
pub struct RecordingPermissions {
    probes: Mutex<Vec<RecordAction>>,
}

impl RecordingPermissions {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn probes(&self) -> Vec<RecordAction> {
        self.probes.lock().clone()
    }
}

#[async_trait]
impl PermissionGate for RecordingPermissions {
    async fn can_perform_action(
        &self,
        _user: &str,
        message: &RecordMessage,
        _auth_data: &Value,
        _sender: &Sender,
    ) -> RecordResult<bool> {
        self.probes.lock().push(message.action);
        Ok(true)
    }
}

/// Permission gate whose write probes read the record through the stability
/// gate, recording the version each probe observed.
#[derive(Default)]
pub struct ReadingPermissions {
    reader: Mutex<Option<GatedRecordReader>>,
    observed: Mutex<Vec<i64>>,
}

impl ReadingPermissions {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn attach(&self, reader: GatedRecordReader) {
        *self.reader.lock() = Some(reader);
    }

    pub fn observed_versions(&self) -> Vec<i64> {
        self.observed.lock().clone()
    }
}

#[async_trait]
impl PermissionGate for ReadingPermissions {
    async fn can_perform_action(
        &self,
        _user: &str,
        message: &RecordMessage,
        _auth_data: &Value,
        _sender: &Sender,
    ) -> RecordResult<bool> {
        if message.action == RecordAction::Update {
            let reader = self.reader.lock().clone();
            if let Some(reader) = reader {
                let record = reader.read(&message.name).await?;
                self.observed
                    .lock()
                    .push(record.map_or(-1, |record| record.version));
            }
        }
        Ok(true)
    }
}
