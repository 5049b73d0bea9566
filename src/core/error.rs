//! Error types for the record core.
//!
//! Every failure either leaves the core as an outbound record-scoped message
//! or as a log entry; `RecordError` is the internal currency between the
//! storage tiers, the coalescer, and the transition engine. The enum is
//! `Clone` so a single coalesced fetch outcome can be handed to every waiter.

use thiserror::Error;

/// Storage tier a failed operation was addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    /// The fast cache layer.
    Cache,
    /// The durable storage layer.
    Storage,
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cache => write!(f, "cache"),
            Self::Storage => write!(f, "storage"),
        }
    }
}

/// Failures produced inside the record core.
#[derive(Debug, Clone, Error)]
pub enum RecordError {
    /// A cache or storage read failed while loading a record.
    #[error("{tier} read failed for record {name}: {message}")]
    Read {
        tier: Tier,
        name: String,
        message: String,
    },

    /// A cache or storage write failed.
    #[error("{tier} write failed for record {name}: {message}")]
    Write {
        tier: Tier,
        name: String,
        message: String,
    },

    /// A cache or storage delete failed.
    #[error("{tier} delete failed for record {name}: {message}")]
    Delete {
        tier: Tier,
        name: String,
        message: String,
    },

    /// The permission evaluator itself failed (not a denial).
    #[error("permission evaluation failed for record {name}: {message}")]
    Permission { name: String, message: String },

    /// A write transition was aborted before the step could commit.
    #[error("record transition for {name} was aborted: {reason}")]
    TransitionAborted { name: String, reason: String },

    /// A record path did not parse under the dot/bracket grammar.
    #[error("invalid record path {path:?}: {message}")]
    InvalidPath { path: String, message: String },

    /// A raw payload was not valid JSON.
    #[error("malformed record payload: {message}")]
    MalformedPayload { message: String },
}

impl RecordError {
    /// Create a read error for the given tier.
    pub fn read(tier: Tier, name: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Read {
            tier,
            name: name.into(),
            message: message.to_string(),
        }
    }

    /// Create a write error for the given tier.
    pub fn write(tier: Tier, name: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Write {
            tier,
            name: name.into(),
            message: message.to_string(),
        }
    }

    /// Create a delete error for the given tier.
    pub fn delete(tier: Tier, name: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Delete {
            tier,
            name: name.into(),
            message: message.to_string(),
        }
    }

    /// The storage tier involved, if the error came from one.
    pub fn tier(&self) -> Option<Tier> {
        match self {
            Self::Read { tier, .. } | Self::Write { tier, .. } | Self::Delete { tier, .. } => {
                Some(*tier)
            }
            _ => None,
        }
    }

    /// Canonical string form used inside write-acknowledgement payloads.
    ///
    /// Acks carry `[version, error]` where `error` must survive the wire
    /// unchanged, so it is always a plain string.
    pub fn wire_form(&self) -> String {
        self.to_string()
    }
}

/// Result type using RecordError.
pub type RecordResult<T> = Result<T, RecordError>;
