//! Record deletion coordination.
//!
//! A delete aborts any active transition for the name, removes the record
//! from both storage tiers, broadcasts the deletion, silently unsubscribes
//! every local follower, and acknowledges the originator. Deletions applied
//! by a remote peer skip the storage tiers; the originating node already
//! removed them.

use crate::protocol::{RecordAction, RecordMessage, Sender};
use crate::record::fanout::RecordFanout;
use crate::record::transition::TransitionTable;
use crate::storage::StorageFacade;
use std::sync::Arc;
use tracing::{debug, warn};

/// Coordinates record deletion across storage, transitions, and followers.
pub struct DeletionCoordinator {
    facade: Arc<StorageFacade>,
    fanout: RecordFanout,
    transitions: Arc<TransitionTable>,
}

impl DeletionCoordinator {
    /// Create a coordinator.
    pub fn new(
        facade: Arc<StorageFacade>,
        fanout: RecordFanout,
        transitions: Arc<TransitionTable>,
    ) -> Self {
        Self {
            facade,
            fanout,
            transitions,
        }
    }

    /// Delete a record on behalf of a local sender.
    pub async fn delete(&self, sender: &Sender, message: &RecordMessage) {
        if self.transitions.abort(&message.name, "record deleted") {
            warn!(record = %message.name, "aborted active transition for deletion");
        }

        let (cache_outcome, storage_outcome) = tokio::join!(
            self.facade.cache_delete(&message.name),
            self.facade.storage_delete(&message.name),
        );
        if let Err(err) = cache_outcome.and(storage_outcome) {
            sender.send(RecordMessage::record_error(
                RecordAction::RecordDeleteError,
                message,
                err.wire_form(),
            ));
            return;
        }

        debug!(record = %message.name, user = sender.user(), "record deleted");
        self.finish(sender, message);
        sender.send(RecordMessage::delete_success(&message.name));
    }

    /// Apply a deletion that a remote peer already performed.
    ///
    /// Storage is not touched; the local duties are aborting the transition,
    /// telling the followers, and dropping their subscriptions.
    pub fn apply_remote(&self, sender: &Sender, message: &RecordMessage) {
        self.transitions.abort(&message.name, "record deleted remotely");
        debug!(record = %message.name, "applied remote deletion");
        self.finish(sender, message);
    }

    /// Broadcast the deletion and unsubscribe every local follower.
    fn finish(&self, sender: &Sender, message: &RecordMessage) {
        let notice = RecordMessage::delete_success(&message.name);
        self.fanout
            .broadcast(&message.name, &notice, true, Some(sender));

        let registry = self.fanout.registry();
        for follower in registry.local_subscribers(&message.name) {
            registry.unsubscribe(message, &follower, true);
        }
    }
}
