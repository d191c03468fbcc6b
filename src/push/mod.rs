//! Push delivery subsystem.
//!
//! Builds structured payloads and delivers them to every active
//! subscription of a recipient independently. Permanent rejections
//! deactivate the offending subscription; transient ones are logged and
//! counted. Nothing thrown by a single subscription escapes this boundary.

pub mod client;
pub mod payload;

pub use client::{HttpPushClient, PushError, PushRelay};
pub use payload::{PushAction, PushData, Urgency, WebPushPayload};

use crate::config::PushConfig;
use crate::core::{Notification, NotificationStore};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Aggregated outcome of one recipient's push fan-out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PushReport {
    pub sent: u64,
    pub failed: u64,
}

/// Delivers notifications through the push relay.
pub struct PushDelivery {
    store: Arc<dyn NotificationStore>,
    relay: Arc<dyn PushRelay>,
    config: PushConfig,
}

impl PushDelivery {
    pub fn new(
        store: Arc<dyn NotificationStore>,
        relay: Arc<dyn PushRelay>,
        config: PushConfig,
    ) -> Self {
        Self {
            store,
            relay,
            config,
        }
    }

    /// Attempts delivery of one notification to every active subscription of
    /// `user_id`.
    ///
    /// Each subscription is attempted independently: a permanent rejection
    /// deactivates that row, a transient one is logged, and neither stops
    /// the remaining subscriptions. Never returns an error.
    pub async fn send(&self, user_id: i64, notification: &Notification) -> PushReport {
        if !self.config.enabled {
            return PushReport::default();
        }

        let subscriptions = match self.store.active_subscriptions(user_id).await {
            Ok(subs) => subs,
            Err(e) => {
                warn!(user_id, error = %e, "Could not load push subscriptions");
                return PushReport::default();
            }
        };
        if subscriptions.is_empty() {
            return PushReport::default();
        }

        let payload = WebPushPayload::for_notification(notification);
        let urgency = Urgency::for_kind(notification.kind);
        let mut report = PushReport::default();

        for subscription in &subscriptions {
            match self
                .relay
                .deliver(subscription, &payload, urgency, self.config.ttl_seconds)
                .await
            {
                Ok(()) => {
                    metrics::counter!("push_sent_total").increment(1);
                    report.sent += 1;
                }
                Err(PushError::EndpointGone) => {
                    info!(
                        user_id,
                        subscription_id = subscription.id,
                        "Push endpoint gone; deactivating subscription"
                    );
                    if let Err(e) = self.store.deactivate_subscription(subscription.id).await {
                        warn!(
                            subscription_id = subscription.id,
                            error = %e,
                            "Failed to deactivate dead subscription"
                        );
                    }
                    metrics::counter!("push_failed_total").increment(1);
                    report.failed += 1;
                }
                Err(PushError::Delivery(reason)) => {
                    debug!(
                        user_id,
                        subscription_id = subscription.id,
                        reason,
                        "Push not delivered; subscription retained"
                    );
                    metrics::counter!("push_failed_total").increment(1);
                    report.failed += 1;
                }
            }
        }

        report
    }
}
