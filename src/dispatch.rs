//! The notification dispatcher.
//!
//! Turns one dispatch event into zero or more persisted notifications plus
//! delivery attempts over the live registry and the push relay, aggregating
//! per-recipient outcomes. Recipients are independent: one recipient's
//! failure is recorded and the loop moves on.

use crate::{
    core::{
        BatchOutcome, DispatchEvent, DispatchOutcome, NewNotification, NotificationStore,
        Recipients,
    },
    deduplication::Deduplicator,
    push::PushDelivery,
    registry::{ConnectionRegistry, ServerMessage},
    storage::StoreError,
};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors that fail an entire dispatch call.
///
/// Everything else (a single recipient's store write, a dead channel, a
/// rejected push) is aggregated into the outcome instead.
#[derive(Error, Debug)]
pub enum DispatchError {
    /// The event is missing required fields; nothing was persisted.
    #[error("dispatch event is invalid: {0}")]
    Validation(String),

    /// The recipient set could not be resolved.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Resolves recipients, persists notifications, and fans out delivery.
pub struct Dispatcher {
    store: Arc<dyn NotificationStore>,
    registry: Arc<ConnectionRegistry>,
    push: Arc<PushDelivery>,
    deduplicator: Arc<Deduplicator>,
}

impl Dispatcher {
    pub fn new(
        store: Arc<dyn NotificationStore>,
        registry: Arc<ConnectionRegistry>,
        push: Arc<PushDelivery>,
        deduplicator: Arc<Deduplicator>,
    ) -> Self {
        Self {
            store,
            registry,
            push,
            deduplicator,
        }
    }

    /// Dispatches one event.
    ///
    /// Live and push delivery are both attempted for a recipient regardless
    /// of each other's outcome: the redundancy is intentional, and the push
    /// payload's `tag` lets the client collapse the duplicate.
    pub async fn dispatch(&self, event: DispatchEvent) -> Result<DispatchOutcome, DispatchError> {
        validate(&event)?;

        let mut outcome = DispatchOutcome::default();

        // Anti-storm window: scanner loops observe the same condition on
        // every tick, so a subject already notified within the window is
        // dropped before any persistence.
        if let Some(related_id) = event.related_id {
            if self.deduplicator.is_duplicate(event.kind, related_id).await {
                debug!(
                    kind = %event.kind,
                    related_id,
                    "Event suppressed by anti-storm window"
                );
                metrics::counter!("dispatch_suppressed_total").increment(1);
                outcome.suppressed = true;
                return Ok(outcome);
            }
        }

        let recipients = match &event.recipients {
            Recipients::Explicit(ids) => ids.clone(),
            Recipients::AllActive => self.store.active_recipients().await?,
        };

        for recipient_id in recipients {
            self.deliver_to_recipient(recipient_id, &event, &mut outcome)
                .await;
        }

        metrics::counter!("notifications_created_total")
            .increment(outcome.notifications_created);
        info!(
            kind = %event.kind,
            created = outcome.notifications_created,
            live = outcome.live_delivered,
            push_sent = outcome.push_sent,
            push_failed = outcome.push_failed,
            skipped = outcome.skipped_disabled,
            errors = outcome.errors.len(),
            "Dispatch complete"
        );
        Ok(outcome)
    }

    /// Processes each event independently through [`Self::dispatch`].
    pub async fn dispatch_batch(&self, events: Vec<DispatchEvent>) -> BatchOutcome {
        let mut batch = BatchOutcome {
            total: events.len(),
            ..BatchOutcome::default()
        };
        for (index, event) in events.into_iter().enumerate() {
            match self.dispatch(event).await {
                Ok(outcome) => {
                    batch.success += 1;
                    batch
                        .errors
                        .extend(outcome.errors.into_iter().map(|e| format!("event {index}: {e}")));
                }
                Err(e) => {
                    batch.failed += 1;
                    batch.errors.push(format!("event {index}: {e}"));
                }
            }
        }
        batch
    }

    async fn deliver_to_recipient(
        &self,
        recipient_id: i64,
        event: &DispatchEvent,
        outcome: &mut DispatchOutcome,
    ) {
        let setting = match self.store.notification_setting(recipient_id, event.kind).await {
            Ok(setting) => setting,
            Err(e) => {
                outcome
                    .errors
                    .push(format!("user {recipient_id}: settings lookup failed: {e}"));
                return;
            }
        };

        // No row means opted in for both channels.
        let (enabled, push_enabled) = setting
            .map(|s| (s.enabled, s.push_enabled))
            .unwrap_or((true, true));

        if !enabled {
            debug!(user_id = recipient_id, kind = %event.kind, "Recipient opted out; skipping");
            outcome.skipped_disabled += 1;
            return;
        }

        let notification = match self
            .store
            .insert_notification(NewNotification {
                recipient_id,
                kind: event.kind,
                title: event.title.clone(),
                message: event.message.clone(),
                related_id: event.related_id,
                related_type: event.related_type.clone(),
            })
            .await
        {
            Ok(notification) => notification,
            Err(e) => {
                outcome
                    .errors
                    .push(format!("user {recipient_id}: persist failed: {e}"));
                return;
            }
        };
        outcome.notifications_created += 1;

        // Live channel first: the new notification, then a fresh unread
        // count so the client badge stays accurate.
        if self.registry.send_to_user(
            recipient_id,
            ServerMessage::NewNotification {
                notification: notification.clone(),
            },
        ) {
            outcome.live_delivered += 1;
            match self.store.unread_count(recipient_id).await {
                Ok(count) => {
                    self.registry
                        .send_to_user(recipient_id, ServerMessage::UnreadCount { count });
                }
                Err(e) => {
                    warn!(user_id = recipient_id, error = %e, "Unread count refresh failed");
                }
            }
        }

        // Push fires even after a successful live send.
        if push_enabled {
            let report = self.push.send(recipient_id, &notification).await;
            outcome.push_sent += report.sent;
            outcome.push_failed += report.failed;
        }
    }
}

fn validate(event: &DispatchEvent) -> Result<(), DispatchError> {
    if event.title.trim().is_empty() {
        return Err(DispatchError::Validation("title must not be empty".into()));
    }
    if event.message.trim().is_empty() {
        return Err(DispatchError::Validation(
            "message must not be empty".into(),
        ));
    }
    Ok(())
}
