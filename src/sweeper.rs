//! Retention sweep for notifications and push subscriptions.

use crate::{config::RetentionConfig, core::NotificationStore};
use anyhow::Result;
use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::info;

/// Prunes expired notification rows and stale push subscriptions.
///
/// Read notifications expire sooner than unread ones: an unread item is
/// kept longer on the assumption the user has not seen it yet, but is still
/// eventually pruned to bound storage growth.
pub struct RetentionSweeper {
    store: Arc<dyn NotificationStore>,
    config: RetentionConfig,
}

impl RetentionSweeper {
    pub fn new(store: Arc<dyn NotificationStore>, config: RetentionConfig) -> Self {
        Self { store, config }
    }

    /// Runs one sweep and returns the total rows removed.
    ///
    /// Logs nothing when no rows were affected.
    pub async fn sweep(&self) -> Result<u64> {
        let now = Utc::now();

        let read_cutoff = now - Duration::days(self.config.read_max_days);
        let read_removed = self
            .store
            .delete_notifications_before(true, read_cutoff)
            .await?;

        let unread_cutoff = now - Duration::days(self.config.unread_max_days);
        let unread_removed = self
            .store
            .delete_notifications_before(false, unread_cutoff)
            .await?;

        let subscription_cutoff = now - Duration::days(self.config.subscription_max_days);
        let subscriptions_removed = self
            .store
            .delete_subscriptions_stale_before(subscription_cutoff)
            .await?;

        let total = read_removed + unread_removed + subscriptions_removed;
        if total > 0 {
            metrics::counter!("retention_rows_deleted_total").increment(total);
            info!(
                read_removed,
                unread_removed, subscriptions_removed, "Retention sweep removed rows"
            );
        }
        Ok(total)
    }
}
