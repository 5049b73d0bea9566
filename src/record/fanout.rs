//! Broadcast fan-out.
//!
//! Thin adapter between the record core and the subscription registry's
//! delivery surface, so the transition engine and the deletion coordinator
//! never hold the registry trait object directly.

use crate::protocol::{RecordMessage, Sender};
use crate::registry::SubscriptionRegistry;
use std::sync::Arc;

/// Delivers committed record changes to local subscribers.
#[derive(Clone)]
pub struct RecordFanout {
    registry: Arc<dyn SubscriptionRegistry>,
}

impl RecordFanout {
    /// Create a fan-out over the given registry.
    pub fn new(registry: Arc<dyn SubscriptionRegistry>) -> Self {
        Self { registry }
    }

    /// Broadcast a message to every local subscriber of `name` except the
    /// originating sender.
    pub fn broadcast(
        &self,
        name: &str,
        message: &RecordMessage,
        no_delay: bool,
        origin: Option<&Sender>,
    ) {
        self.registry
            .send_to_subscribers(name, message, no_delay, origin);
    }

    /// The underlying subscription registry.
    pub fn registry(&self) -> &Arc<dyn SubscriptionRegistry> {
        &self.registry
    }
}
