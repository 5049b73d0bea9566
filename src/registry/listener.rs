//! Pattern-listener registry capability and local reference implementation.
//!
//! Listen traffic lets a client discover and provide records whose names
//! match a pattern. The core delegates all four listen actions here without
//! inspecting them.

use crate::protocol::{RecordAction, RecordMessage, Sender};
use parking_lot::Mutex;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Listener registry capability surface.
pub trait ListenerRegistry: Send + Sync {
    /// Process a LISTEN / UNLISTEN / LISTEN_ACCEPT / LISTEN_REJECT message.
    fn handle(&self, sender: &Sender, message: &RecordMessage);
}

/// In-memory listener registry.
///
/// Tracks which senders listen to which patterns and which pattern/record
/// pairs have an accepted provider. Provider negotiation across the peer bus
/// lives outside the record core.
#[derive(Default)]
pub struct LocalListenerRegistry {
    listeners: Mutex<HashMap<String, Vec<Sender>>>,
    providers: Mutex<HashMap<String, u64>>,
}

impl LocalListenerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of patterns with at least one listener.
    pub fn pattern_count(&self) -> usize {
        self.listeners.lock().len()
    }

    /// Whether any sender currently provides `name`.
    pub fn has_provider(&self, name: &str) -> bool {
        self.providers.lock().contains_key(name)
    }
}

impl ListenerRegistry for LocalListenerRegistry {
    fn handle(&self, sender: &Sender, message: &RecordMessage) {
        match message.action {
            RecordAction::Listen => {
                let mut listeners = self.listeners.lock();
                let entries = listeners.entry(message.name.clone()).or_default();
                if !entries.iter().any(|existing| existing.id() == sender.id()) {
                    entries.push(sender.clone());
                }
                debug!(pattern = %message.name, user = sender.user(), "listener registered");
                sender.send(RecordMessage::subscribe_ack(&message.name));
            }
            RecordAction::Unlisten => {
                let mut listeners = self.listeners.lock();
                if let Some(entries) = listeners.get_mut(&message.name) {
                    entries.retain(|existing| existing.id() != sender.id());
                    if entries.is_empty() {
                        listeners.remove(&message.name);
                    }
                }
                debug!(pattern = %message.name, user = sender.user(), "listener removed");
                sender.send(RecordMessage::unsubscribe_ack(&message.name));
            }
            RecordAction::ListenAccept => {
                self.providers.lock().insert(message.name.clone(), sender.id());
                debug!(record = %message.name, user = sender.user(), "provider accepted");
            }
            RecordAction::ListenReject => {
                let mut providers = self.providers.lock();
                if providers.get(&message.name) == Some(&sender.id()) {
                    providers.remove(&message.name);
                }
                debug!(record = %message.name, user = sender.user(), "provider rejected");
            }
            other => {
                warn!(action = %other, "non-listen action routed to listener registry");
            }
        }
    }
}
