//! Subscription registry capability and local reference implementation.
//!
//! The core routes subscribe/unsubscribe traffic here and broadcasts new
//! record versions through `send_to_subscribers`. Internal bookkeeping is the
//! registry's own affair; the core only sees this surface.

use crate::protocol::{RecordMessage, Sender};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Hook invoked as record names gain or lose their local subscribers.
///
/// The pattern-listener machinery uses this to learn when a record becomes
/// interesting or goes quiet.
pub trait SubscriptionListener: Send + Sync {
    /// The first local subscriber arrived for `name`.
    fn on_first_subscription(&self, name: &str);

    /// The last local subscriber left `name`.
    fn on_last_subscription(&self, name: &str);
}

/// Subscription registry capability surface.
pub trait SubscriptionRegistry: Send + Sync {
    /// Register the sender as a subscriber of `message.name`.
    fn subscribe(&self, message: &RecordMessage, sender: &Sender);

    /// Remove the sender's subscription. `silent` suppresses the ack, used
    /// when the core unsubscribes followers of a deleted record.
    fn unsubscribe(&self, message: &RecordMessage, sender: &Sender, silent: bool);

    /// Deliver a message to every local subscriber of `name` except the
    /// originating sender. `no_delay` requests immediate flushing on
    /// implementations that batch.
    fn send_to_subscribers(
        &self,
        name: &str,
        message: &RecordMessage,
        no_delay: bool,
        origin: Option<&Sender>,
    );

    /// Current local subscribers of `name`.
    fn local_subscribers(&self, name: &str) -> Vec<Sender>;

    /// Install the subscription lifecycle hook.
    fn set_subscription_listener(&self, listener: Arc<dyn SubscriptionListener>);
}

/// In-memory subscription registry.
///
/// Delivery is immediate, so `no_delay` has no effect here.
#[derive(Default)]
pub struct LocalSubscriptionRegistry {
    subscriptions: Mutex<HashMap<String, Vec<Sender>>>,
    listener: Mutex<Option<Arc<dyn SubscriptionListener>>>,
}

impl LocalSubscriptionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of record names with at least one subscriber.
    pub fn subscribed_record_count(&self) -> usize {
        self.subscriptions.lock().len()
    }
}

impl SubscriptionRegistry for LocalSubscriptionRegistry {
    fn subscribe(&self, message: &RecordMessage, sender: &Sender) {
        let first = {
            let mut subscriptions = self.subscriptions.lock();
            let entries = subscriptions.entry(message.name.clone()).or_default();
            if !entries.iter().any(|existing| existing.id() == sender.id()) {
                entries.push(sender.clone());
            }
            entries.len() == 1
        };

        if first {
            if let Some(listener) = self.listener.lock().clone() {
                listener.on_first_subscription(&message.name);
            }
        }
        sender.send(RecordMessage::subscribe_ack(&message.name));
    }

    fn unsubscribe(&self, message: &RecordMessage, sender: &Sender, silent: bool) {
        let emptied = {
            let mut subscriptions = self.subscriptions.lock();
            match subscriptions.get_mut(&message.name) {
                Some(entries) => {
                    entries.retain(|existing| existing.id() != sender.id());
                    if entries.is_empty() {
                        subscriptions.remove(&message.name);
                        true
                    } else {
                        false
                    }
                }
                None => false,
            }
        };

        if emptied {
            if let Some(listener) = self.listener.lock().clone() {
                listener.on_last_subscription(&message.name);
            }
        }
        if !silent {
            sender.send(RecordMessage::unsubscribe_ack(&message.name));
        }
    }

    fn send_to_subscribers(
        &self,
        name: &str,
        message: &RecordMessage,
        _no_delay: bool,
        origin: Option<&Sender>,
    ) {
        let recipients = self.local_subscribers(name);
        let origin_id = origin.map(|sender| sender.id());
        for recipient in recipients {
            if Some(recipient.id()) == origin_id {
                continue;
            }
            recipient.send(message.clone());
        }
    }

    fn local_subscribers(&self, name: &str) -> Vec<Sender> {
        self.subscriptions
            .lock()
            .get(name)
            .cloned()
            .unwrap_or_default()
    }

    fn set_subscription_listener(&self, listener: Arc<dyn SubscriptionListener>) {
        *self.listener.lock() = Some(listener);
    }
}
