//! Permission evaluator capability.
//!
//! Every inbound write-bearing action passes through `can_perform_action`
//! before the core touches record state. Evaluators that need the current
//! record contents read it through the gated reader exposed by the record
//! handler, so they never observe a value older than the write they gate.

use crate::core::error::RecordResult;
use crate::protocol::{RecordMessage, Sender};
use async_trait::async_trait;
use serde_json::Value;

/// Permission evaluator capability surface.
#[async_trait]
pub trait PermissionGate: Send + Sync {
    /// Decide whether `user` may perform `message.action` on `message.name`.
    ///
    /// `Ok(false)` is a denial; `Err` is an evaluator failure and is reported
    /// to the sender as a permission error, not a denial.
    async fn can_perform_action(
        &self,
        user: &str,
        message: &RecordMessage,
        auth_data: &Value,
        sender: &Sender,
    ) -> RecordResult<bool>;
}

/// Permission gate that allows everything.
///
/// The default for standalone runs and the baseline for tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct OpenPermissions;

#[async_trait]
impl PermissionGate for OpenPermissions {
    async fn can_perform_action(
        &self,
        _user: &str,
        _message: &RecordMessage,
        _auth_data: &Value,
        _sender: &Sender,
    ) -> RecordResult<bool> {
        Ok(true)
    }
}
