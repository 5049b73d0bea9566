//! Record request dispatching.
//!
//! The handler owns the transition table and drives every record operation:
//! it normalizes inbound actions, runs the permission checks (decomposing
//! compound actions into their constituent probes), and routes to the read
//! path, the transition engine, the hot-path writer, or the deletion
//! coordinator. Subscribe/unsubscribe and listen traffic is delegated to the
//! external registries untouched.

use crate::core::config::RecordsConfig;
use crate::protocol::{RecordAction, RecordMessage, Sender};
use crate::record::coalescer::{GatedRecordReader, RecordCoalescer};
use crate::record::deletion::DeletionCoordinator;
use crate::record::fanout::RecordFanout;
use crate::record::hot_path::HotPathWriter;
use crate::record::stability::StabilityGate;
use crate::record::transition::{AddOutcome, RecordTransition, TransitionTable};
use crate::registry::{ListenerRegistry, PermissionGate, SubscriptionRegistry};
use crate::storage::{RecordDocument, RecordStore, StorageFacade};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Record message dispatcher.
pub struct RecordHandler {
    facade: Arc<StorageFacade>,
    coalescer: Arc<RecordCoalescer>,
    gate: Arc<StabilityGate>,
    fanout: RecordFanout,
    subscriptions: Arc<dyn SubscriptionRegistry>,
    listeners: Arc<dyn ListenerRegistry>,
    permissions: Arc<dyn PermissionGate>,
    transitions: Arc<TransitionTable>,
    hot_path: HotPathWriter,
    deletion: DeletionCoordinator,
}

impl RecordHandler {
    /// Wire a handler over the given storage tiers and collaborators.
    pub fn new(
        config: &RecordsConfig,
        cache: Arc<dyn RecordStore>,
        storage: Arc<dyn RecordStore>,
        subscriptions: Arc<dyn SubscriptionRegistry>,
        listeners: Arc<dyn ListenerRegistry>,
        permissions: Arc<dyn PermissionGate>,
    ) -> Self {
        let facade = Arc::new(StorageFacade::new(
            cache,
            storage,
            config.storage_exclusion_prefixes.clone(),
        ));
        let coalescer = Arc::new(RecordCoalescer::new(Arc::clone(&facade)));
        let gate = Arc::new(StabilityGate::new());
        let fanout = RecordFanout::new(Arc::clone(&subscriptions));
        let transitions = Arc::new(TransitionTable::new());
        let hot_path = HotPathWriter::new(
            Arc::clone(&facade),
            fanout.clone(),
            config.storage_hot_path_prefixes.clone(),
        );
        let deletion = DeletionCoordinator::new(
            Arc::clone(&facade),
            fanout.clone(),
            Arc::clone(&transitions),
        );

        Self {
            facade,
            coalescer,
            gate,
            fanout,
            subscriptions,
            listeners,
            permissions,
            transitions,
            hot_path,
            deletion,
        }
    }

    /// Record loader for permission rules, routed through the stability gate.
    pub fn gated_reader(&self) -> GatedRecordReader {
        GatedRecordReader::new(Arc::clone(&self.gate), Arc::clone(&self.coalescer))
    }

    /// Number of transitions currently active.
    pub fn active_transition_count(&self) -> usize {
        self.transitions.active_count()
    }

    /// Dispatch one inbound record message.
    pub async fn handle(&self, sender: &Sender, message: RecordMessage) {
        let (action, wants_ack) = message.action.normalized();
        let mut message = message;
        message.action = action;
        message.is_write_ack = message.is_write_ack || wants_ack;

        debug!(record = %message.name, action = %action, user = sender.user(), "record message");
        match action {
            RecordAction::SubscribeCreateAndRead => self.create_or_read(sender, &message).await,
            RecordAction::CreateAndUpdate | RecordAction::CreateAndPatch => {
                self.create_and_update(sender, message).await
            }
            RecordAction::Read => self.read_snapshot(sender, &message).await,
            RecordAction::Head => self.read_head(sender, &message, false).await,
            RecordAction::SubscribeAndHead => self.read_head(sender, &message, true).await,
            RecordAction::Update | RecordAction::Patch | RecordAction::Erase => {
                if self.allowed(sender, &message, action).await {
                    self.update(sender, message, false).await;
                }
            }
            RecordAction::Delete => {
                if self.allowed(sender, &message, RecordAction::Delete).await {
                    self.deletion.delete(sender, &message).await;
                }
            }
            RecordAction::DeleteSuccess => {
                if sender.is_remote() || message.is_remote {
                    self.deletion.apply_remote(sender, &message);
                } else {
                    warn!(record = %message.name, "DELETE_SUCCESS from a local sender dropped");
                }
            }
            RecordAction::Unsubscribe => self.subscriptions.unsubscribe(&message, sender, false),
            RecordAction::Listen
            | RecordAction::Unlisten
            | RecordAction::ListenAccept
            | RecordAction::ListenReject => self.listeners.handle(sender, &message),
            other => {
                error!(record = %message.name, action = %other, "unroutable record action dropped");
            }
        }
    }

    /// Read-or-create, then subscribe and send the current value.
    async fn create_or_read(&self, sender: &Sender, message: &RecordMessage) {
        match self.coalescer.load(&message.name).await {
            Ok(Some(record)) => {
                if self.allowed(sender, message, RecordAction::Read).await {
                    self.read_and_subscribe(sender, message, record);
                }
            }
            Ok(None) => {
                if self.allowed(sender, message, RecordAction::Create).await {
                    self.create(sender, message).await;
                }
            }
            Err(err) => sender.send(RecordMessage::record_error(
                RecordAction::RecordLoadError,
                message,
                err.wire_form(),
            )),
        }
    }

    /// Write the fresh document, then read-and-subscribe.
    async fn create(&self, sender: &Sender, message: &RecordMessage) {
        let record = RecordDocument::fresh();
        if let Err(err) = self.facade.cache_set(&message.name, record.clone()).await {
            sender.send(RecordMessage::record_error(
                RecordAction::RecordCreateError,
                message,
                err.wire_form(),
            ));
            return;
        }

        // Durable tier stays off the critical path; failures are logged by
        // the facade.
        {
            let facade = Arc::clone(&self.facade);
            let name = message.name.clone();
            let document = record.clone();
            tokio::spawn(async move {
                let _ = facade.storage_set(&name, document).await;
            });
        }

        if self.allowed(sender, message, RecordAction::Read).await {
            self.read_and_subscribe(sender, message, record);
        }
    }

    fn read_and_subscribe(&self, sender: &Sender, message: &RecordMessage, record: RecordDocument) {
        self.subscriptions.subscribe(message, sender);
        sender.send(RecordMessage::read_response(
            &message.name,
            record.version,
            record.data,
        ));
    }

    /// One-shot snapshot reply.
    async fn read_snapshot(&self, sender: &Sender, message: &RecordMessage) {
        if !self.allowed(sender, message, RecordAction::Read).await {
            return;
        }
        match self.coalescer.load(&message.name).await {
            Ok(Some(record)) => sender.send(RecordMessage::read_response(
                &message.name,
                record.version,
                record.data,
            )),
            Ok(None) => sender.send(RecordMessage::record_error(
                RecordAction::RecordNotFound,
                message,
                "record not found",
            )),
            Err(err) => sender.send(RecordMessage::record_error(
                RecordAction::RecordLoadError,
                message,
                err.wire_form(),
            )),
        }
    }

    /// Version-only reply; −1 on a clean miss, optionally with subscription.
    ///
    /// Load errors surface as `RECORD_LOAD_ERROR` rather than collapsing into
    /// the miss marker.
    async fn read_head(&self, sender: &Sender, message: &RecordMessage, subscribe: bool) {
        if !self.allowed(sender, message, RecordAction::Read).await {
            return;
        }
        match self.coalescer.load(&message.name).await {
            Ok(found) => {
                if subscribe {
                    self.subscriptions.subscribe(message, sender);
                }
                let version = found.map_or(-1, |record| record.version);
                sender.send(RecordMessage::head_response(&message.name, version));
            }
            Err(err) => sender.send(RecordMessage::record_error(
                RecordAction::RecordLoadError,
                message,
                err.wire_form(),
            )),
        }
    }

    /// Upsert a whole or partial value without subscribing.
    async fn create_and_update(&self, sender: &Sender, mut message: RecordMessage) {
        let is_patch =
            message.action == RecordAction::CreateAndPatch || message.path.is_some();

        if self.hot_path.matches(&message.name) {
            if is_patch {
                sender.send(RecordMessage::record_error(
                    RecordAction::InvalidPatchOnHotpath,
                    &message,
                    "partial writes cannot take the hot path",
                ));
                return;
            }
            if self.allowed(sender, &message, RecordAction::Create).await
                && self.allowed(sender, &message, RecordAction::Update).await
            {
                self.hot_path.force_write(sender, &message).await;
            }
            return;
        }

        let effective = if is_patch {
            RecordAction::Patch
        } else {
            RecordAction::Update
        };
        message.action = effective;

        if self.transitions.contains(&message.name) {
            if self.allowed(sender, &message, effective).await {
                self.update(sender, message, true).await;
            }
            return;
        }

        if self.allowed(sender, &message, RecordAction::Create).await
            && self.allowed(sender, &message, effective).await
        {
            self.update(sender, message, true).await;
        }
    }

    /// Route a versioned write into the record's transition.
    async fn update(&self, sender: &Sender, message: RecordMessage, upsert: bool) {
        let Some(version) = message.version else {
            sender.send(RecordMessage::record_error(
                RecordAction::RecordUpdateError,
                &message,
                "versioned write without a version",
            ));
            return;
        };

        loop {
            let transition = self.transitions.get_or_insert_with(&message.name, || {
                RecordTransition::new(
                    message.name.clone(),
                    upsert,
                    Arc::clone(&self.facade),
                    Arc::clone(&self.coalescer),
                    Arc::clone(&self.gate),
                    self.fanout.clone(),
                    Arc::clone(&self.transitions),
                )
            });

            if transition.has_version(version) {
                transition.send_version_exists(sender, &message);
                return;
            }
            match transition.add(sender, &message) {
                AddOutcome::Accepted => return,
                AddOutcome::VersionExists => {
                    transition.send_version_exists(sender, &message);
                    return;
                }
                AddOutcome::InvalidVersion => {
                    sender.send(RecordMessage::record_error(
                        RecordAction::InvalidVersion,
                        &message,
                        format!("version {version} is not the next expected version"),
                    ));
                    return;
                }
                AddOutcome::Malformed(err) => {
                    sender.send(RecordMessage::record_error(
                        RecordAction::RecordUpdateError,
                        &message,
                        err.wire_form(),
                    ));
                    if transition.is_inert() {
                        self.transitions.remove_if(&message.name, &transition);
                    }
                    return;
                }
                AddOutcome::Terminal => {
                    // The worker retired between lookup and add; replace it.
                    self.transitions.remove_if(&message.name, &transition);
                }
            }
        }
    }

    /// Run one permission probe, reporting denial or evaluator failure.
    async fn allowed(&self, sender: &Sender, message: &RecordMessage, action: RecordAction) -> bool {
        let probe = message.with_action(action);
        match self
            .permissions
            .can_perform_action(sender.user(), &probe, sender.auth_data(), sender)
            .await
        {
            Ok(true) => true,
            Ok(false) => {
                sender.send(RecordMessage::message_denied(&probe));
                false
            }
            Err(err) => {
                error!(record = %probe.name, action = %action, error = %err, "permission evaluator failed");
                sender.send(RecordMessage::message_permission_error(&probe));
                false
            }
        }
    }
}
