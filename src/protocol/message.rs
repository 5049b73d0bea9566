//! Record message envelope and action space.
//!
//! Inbound and outbound traffic shares one envelope. The action space is a
//! closed enum with stable integer codes; write-ack variants normalize to
//! their base action with the `is_write_ack` flag set, so the rest of the
//! core only ever dispatches on base actions.

use crate::core::error::{RecordError, RecordResult};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Message topic. The record core only ever sees `Record`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Topic {
    /// Record subscribe/read/write/delete traffic.
    Record,
}

/// Actions understood or produced by the record core.
///
/// Codes are part of the wire contract and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordAction {
    // Inbound
    SubscribeCreateAndRead,
    CreateAndUpdate,
    CreateAndPatch,
    Read,
    Head,
    SubscribeAndHead,
    Update,
    Patch,
    Erase,
    Delete,
    DeleteSuccess,
    Unsubscribe,
    Listen,
    Unlisten,
    ListenAccept,
    ListenReject,
    CreateAndUpdateWithWriteAck,
    CreateAndPatchWithWriteAck,
    UpdateWithWriteAck,
    PatchWithWriteAck,
    EraseWithWriteAck,

    // Permission probe for the create half of compound actions
    Create,

    // Outbound
    ReadResponse,
    HeadResponse,
    WriteAcknowledgement,
    SubscribeAck,
    UnsubscribeAck,
    RecordNotFound,
    RecordLoadError,
    RecordCreateError,
    RecordUpdateError,
    RecordDeleteError,
    VersionExists,
    InvalidVersion,
    InvalidPatchOnHotpath,
    MessageDenied,
    MessagePermissionError,
}

impl RecordAction {
    /// Stable integer code for the wire.
    pub fn code(self) -> u8 {
        match self {
            Self::SubscribeCreateAndRead => 0,
            Self::CreateAndUpdate => 1,
            Self::CreateAndPatch => 2,
            Self::Read => 3,
            Self::Head => 4,
            Self::SubscribeAndHead => 5,
            Self::Update => 6,
            Self::Patch => 7,
            Self::Erase => 8,
            Self::Delete => 9,
            Self::DeleteSuccess => 10,
            Self::Unsubscribe => 11,
            Self::Listen => 12,
            Self::Unlisten => 13,
            Self::ListenAccept => 14,
            Self::ListenReject => 15,
            Self::CreateAndUpdateWithWriteAck => 16,
            Self::CreateAndPatchWithWriteAck => 17,
            Self::UpdateWithWriteAck => 18,
            Self::PatchWithWriteAck => 19,
            Self::EraseWithWriteAck => 20,
            Self::Create => 21,
            Self::ReadResponse => 32,
            Self::HeadResponse => 33,
            Self::WriteAcknowledgement => 34,
            Self::SubscribeAck => 35,
            Self::UnsubscribeAck => 36,
            Self::RecordNotFound => 40,
            Self::RecordLoadError => 41,
            Self::RecordCreateError => 42,
            Self::RecordUpdateError => 43,
            Self::RecordDeleteError => 44,
            Self::VersionExists => 45,
            Self::InvalidVersion => 46,
            Self::InvalidPatchOnHotpath => 47,
            Self::MessageDenied => 48,
            Self::MessagePermissionError => 49,
        }
    }

    /// Normalize a write-ack variant to its base action.
    ///
    /// Returns the base action and whether the sender requested an explicit
    /// write acknowledgement.
    pub fn normalized(self) -> (Self, bool) {
        match self {
            Self::CreateAndUpdateWithWriteAck => (Self::CreateAndUpdate, true),
            Self::CreateAndPatchWithWriteAck => (Self::CreateAndPatch, true),
            Self::UpdateWithWriteAck => (Self::Update, true),
            Self::PatchWithWriteAck => (Self::Patch, true),
            Self::EraseWithWriteAck => (Self::Erase, true),
            other => (other, false),
        }
    }

    /// Whether this action applies a partial change at a record path.
    pub fn is_patch(self) -> bool {
        matches!(self, Self::Patch | Self::Erase | Self::CreateAndPatch)
    }

    /// Whether this action mutates record state.
    pub fn is_write(self) -> bool {
        matches!(
            self,
            Self::CreateAndUpdate
                | Self::CreateAndPatch
                | Self::Update
                | Self::Patch
                | Self::Erase
                | Self::Delete
        )
    }
}

impl std::fmt::Display for RecordAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// The record message envelope, shared by both directions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordMessage {
    /// Message topic; always `Record` in this core.
    pub topic: Topic,

    /// The action to perform or being reported.
    pub action: RecordAction,

    /// Record name.
    pub name: String,

    /// Version for versioned writes and responses.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<i64>,

    /// Record path for partial writes (dot/bracket grammar).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// Raw payload as received from the wire.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Bytes>,

    /// Decoded payload; populated at most once per message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parsed_data: Option<Value>,

    /// Correlation identifier echoed back on replies.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,

    /// Whether the sender requested an explicit write acknowledgement.
    #[serde(default)]
    pub is_write_ack: bool,

    /// Inbound action echoed back on error replies.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_action: Option<RecordAction>,

    /// Set when the message arrived over the peer message bus.
    #[serde(default)]
    pub is_remote: bool,
}

impl RecordMessage {
    /// Start an inbound request message for the given action and name.
    pub fn request(action: RecordAction, name: impl Into<String>) -> Self {
        Self {
            topic: Topic::Record,
            action,
            name: name.into(),
            version: None,
            path: None,
            data: None,
            parsed_data: None,
            correlation_id: None,
            is_write_ack: false,
            original_action: None,
            is_remote: false,
        }
    }

    /// Set the version field.
    pub fn with_version(mut self, version: i64) -> Self {
        self.version = Some(version);
        self
    }

    /// Set the record path field.
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Attach a raw, undecoded payload.
    pub fn with_data(mut self, data: Bytes) -> Self {
        self.data = Some(data);
        self
    }

    /// Attach an already-decoded payload.
    pub fn with_parsed(mut self, value: Value) -> Self {
        self.parsed_data = Some(value);
        self
    }

    /// Set the correlation identifier.
    pub fn with_correlation(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }

    /// Mark the message as delivered over the peer bus.
    pub fn remote(mut self) -> Self {
        self.is_remote = true;
        self
    }

    /// Shallow copy with the action rewritten.
    ///
    /// Used to decompose compound actions into their constituent permission
    /// checks.
    pub fn with_action(&self, action: RecordAction) -> Self {
        let mut copy = self.clone();
        copy.action = action;
        copy
    }

    /// Decode the payload, parsing the raw bytes at most once.
    ///
    /// Subsequent calls reuse the decoded value.
    pub fn parsed(&mut self) -> RecordResult<&Value> {
        if self.parsed_data.is_none() {
            let raw = self.data.as_ref().ok_or_else(|| RecordError::MalformedPayload {
                message: "message carries no payload".to_string(),
            })?;
            let value: Value =
                serde_json::from_slice(raw).map_err(|err| RecordError::MalformedPayload {
                    message: err.to_string(),
                })?;
            self.parsed_data = Some(value);
        }
        Ok(self.parsed_data.as_ref().expect("just populated"))
    }

    // ------------------------------------------------------------------
    // Outbound constructors
    // ------------------------------------------------------------------

    /// One-shot snapshot reply.
    pub fn read_response(name: &str, version: i64, data: Value) -> Self {
        Self::request(RecordAction::ReadResponse, name)
            .with_version(version)
            .with_parsed(data)
    }

    /// Version-only reply; −1 signals a clean miss.
    pub fn head_response(name: &str, version: i64) -> Self {
        Self::request(RecordAction::HeadResponse, name).with_version(version)
    }

    /// Write acknowledgement carrying `[version, error]`.
    ///
    /// `error` is the canonical string form of whichever tier failed, or
    /// null when both tiers acknowledged.
    pub fn write_acknowledgement(name: &str, version: i64, error: Option<String>) -> Self {
        let error_value = match error {
            Some(text) => Value::String(text),
            None => Value::Null,
        };
        Self::request(RecordAction::WriteAcknowledgement, name)
            .with_parsed(Value::Array(vec![Value::from(version), error_value]))
    }

    /// Deletion acknowledgement / broadcast.
    pub fn delete_success(name: &str) -> Self {
        Self::request(RecordAction::DeleteSuccess, name)
    }

    /// Conflict reply carrying the current version and data.
    pub fn version_exists(name: &str, version: i64, data: Value, correlation_id: Option<String>) -> Self {
        let mut message = Self::request(RecordAction::VersionExists, name)
            .with_version(version)
            .with_parsed(data);
        message.correlation_id = correlation_id;
        message
    }

    /// Subscription acknowledgement.
    pub fn subscribe_ack(name: &str) -> Self {
        Self::request(RecordAction::SubscribeAck, name)
    }

    /// Unsubscription acknowledgement.
    pub fn unsubscribe_ack(name: &str) -> Self {
        Self::request(RecordAction::UnsubscribeAck, name)
    }

    /// Record-scoped error reply preserving the inbound action and
    /// correlation id of the request that failed.
    pub fn record_error(
        action: RecordAction,
        request: &RecordMessage,
        detail: impl Into<String>,
    ) -> Self {
        let mut message = Self::request(action, &request.name);
        message.original_action = Some(request.action);
        message.correlation_id = request.correlation_id.clone();
        message.parsed_data = Some(Value::String(detail.into()));
        message
    }

    /// Permission denial reply for the checked action.
    pub fn message_denied(probe: &RecordMessage) -> Self {
        let mut message = Self::request(RecordAction::MessageDenied, &probe.name);
        message.original_action = Some(probe.action);
        message.correlation_id = probe.correlation_id.clone();
        message
    }

    /// Permission evaluator failure reply.
    pub fn message_permission_error(probe: &RecordMessage) -> Self {
        let mut message = Self::request(RecordAction::MessagePermissionError, &probe.name);
        message.original_action = Some(probe.action);
        message.correlation_id = probe.correlation_id.clone();
        message
    }
}
