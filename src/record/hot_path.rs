//! Hot-path write bypass.
//!
//! Records whose names match a configured prefix skip the transition engine
//! entirely: the full value is force-written to both tiers in parallel at the
//! supplied version. The bypass trades version linearity for throughput, so
//! it only accepts full updates; partial writes are rejected before touching
//! storage.

use crate::protocol::{RecordAction, RecordMessage, Sender};
use crate::record::fanout::RecordFanout;
use crate::storage::{RecordDocument, StorageFacade};
use std::sync::Arc;
use tracing::{debug, error};

/// Force-writer for hot-path record names.
pub struct HotPathWriter {
    facade: Arc<StorageFacade>,
    fanout: RecordFanout,
    prefixes: Vec<String>,
}

impl HotPathWriter {
    /// Create a writer for the configured prefixes.
    pub fn new(facade: Arc<StorageFacade>, fanout: RecordFanout, prefixes: Vec<String>) -> Self {
        Self {
            facade,
            fanout,
            prefixes,
        }
    }

    /// Whether `name` takes the hot path. Matching is prefix match.
    pub fn matches(&self, name: &str) -> bool {
        self.prefixes.iter().any(|prefix| name.starts_with(prefix))
    }

    /// Write the full message value straight to cache and storage.
    ///
    /// Both tiers are written in parallel. The broadcast goes out on cache
    /// success only; a requested write-ack is sent once both tiers have
    /// responded, carrying whichever error occurred.
    pub async fn force_write(&self, sender: &Sender, message: &RecordMessage) {
        let mut message = message.clone();
        let version = message.version.unwrap_or(0);
        message.version = Some(version);
        message.action = RecordAction::Update;

        let payload = match message.parsed() {
            Ok(value) => value.clone(),
            Err(err) => {
                sender.send(RecordMessage::record_error(
                    RecordAction::RecordUpdateError,
                    &message,
                    err.wire_form(),
                ));
                return;
            }
        };

        let document = RecordDocument::new(version, payload);
        let (cache_outcome, storage_outcome) = tokio::join!(
            self.facade.cache_set(&message.name, document.clone()),
            self.facade.storage_set(&message.name, document),
        );

        match &cache_outcome {
            Ok(()) => {
                debug!(record = %message.name, version, "hot-path write committed");
                self.fanout
                    .broadcast(&message.name, &message, true, Some(sender));
            }
            Err(err) => {
                error!(record = %message.name, error = %err, "hot-path cache write failed");
                if !message.is_write_ack {
                    sender.send(RecordMessage::record_error(
                        RecordAction::RecordUpdateError,
                        &message,
                        err.wire_form(),
                    ));
                }
            }
        }

        if message.is_write_ack {
            let error = cache_outcome
                .err()
                .or(storage_outcome.err())
                .map(|err| err.wire_form());
            sender.send(RecordMessage::write_acknowledgement(
                &message.name,
                version,
                error,
            ));
        }
    }
}
