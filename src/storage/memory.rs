//! In-memory notification store for tests.
//!
//! Implements [`NotificationStore`] over mutexed maps so the dispatcher,
//! sweeper, and registry suites run without a database. Seeding helpers
//! mirror the rows the Postgres implementation would hold.

use crate::{
    core::{
        NewNotification, Notification, NotificationKind, NotificationSetting, NotificationStore,
        PushSubscription,
    },
    storage::StoreError,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

#[derive(Default)]
struct Inner {
    notifications: Vec<Notification>,
    settings: HashMap<(i64, NotificationKind), NotificationSetting>,
    subscriptions: Vec<PushSubscription>,
    active_users: Vec<i64>,
    next_notification_id: i64,
    next_subscription_id: i64,
    fail_inserts_for: HashSet<i64>,
}

/// An in-memory [`NotificationStore`].
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an active account id.
    pub fn add_active_user(&self, user_id: i64) {
        self.inner.lock().unwrap().active_users.push(user_id);
    }

    /// Seeds a preference row for `(user, kind)`.
    pub fn set_setting(&self, user_id: i64, kind: NotificationKind, enabled: bool, push_enabled: bool) {
        self.inner.lock().unwrap().settings.insert(
            (user_id, kind),
            NotificationSetting {
                user_id,
                kind,
                enabled,
                push_enabled,
            },
        );
    }

    /// Seeds an active push subscription and returns its id.
    pub fn add_subscription(&self, user_id: i64, endpoint: &str) -> i64 {
        let mut inner = self.inner.lock().unwrap();
        inner.next_subscription_id += 1;
        let id = inner.next_subscription_id;
        inner.subscriptions.push(PushSubscription {
            id,
            user_id,
            endpoint: endpoint.to_string(),
            p256dh_key: "test-p256dh".to_string(),
            auth_key: "test-auth".to_string(),
            active: true,
            updated_at: Utc::now(),
        });
        id
    }

    /// Seeds a subscription with an explicit `updated_at`, for retention tests.
    pub fn add_subscription_updated_at(
        &self,
        user_id: i64,
        endpoint: &str,
        updated_at: DateTime<Utc>,
    ) -> i64 {
        let id = self.add_subscription(user_id, endpoint);
        let mut inner = self.inner.lock().unwrap();
        if let Some(sub) = inner.subscriptions.iter_mut().find(|s| s.id == id) {
            sub.updated_at = updated_at;
        }
        id
    }

    /// Seeds a notification row with an explicit age and read state.
    pub fn seed_notification(
        &self,
        recipient_id: i64,
        kind: NotificationKind,
        is_read: bool,
        created_at: DateTime<Utc>,
    ) -> i64 {
        let mut inner = self.inner.lock().unwrap();
        inner.next_notification_id += 1;
        let id = inner.next_notification_id;
        inner.notifications.push(Notification {
            id,
            recipient_id,
            kind,
            title: "seeded".to_string(),
            message: "seeded".to_string(),
            related_id: None,
            related_type: None,
            is_read,
            created_at,
        });
        id
    }

    /// Makes `insert_notification` fail for one recipient, to exercise
    /// partial-failure aggregation.
    pub fn fail_inserts_for(&self, user_id: i64) {
        self.inner.lock().unwrap().fail_inserts_for.insert(user_id);
    }

    /// Snapshot of every notification row.
    pub fn notifications(&self) -> Vec<Notification> {
        self.inner.lock().unwrap().notifications.clone()
    }

    /// Notification rows addressed to one user.
    pub fn notifications_for(&self, user_id: i64) -> Vec<Notification> {
        self.inner
            .lock()
            .unwrap()
            .notifications
            .iter()
            .filter(|n| n.recipient_id == user_id)
            .cloned()
            .collect()
    }

    /// Snapshot of one subscription row.
    pub fn subscription(&self, id: i64) -> Option<PushSubscription> {
        self.inner
            .lock()
            .unwrap()
            .subscriptions
            .iter()
            .find(|s| s.id == id)
            .cloned()
    }

    /// Snapshot of every subscription row.
    pub fn subscriptions(&self) -> Vec<PushSubscription> {
        self.inner.lock().unwrap().subscriptions.clone()
    }
}

#[async_trait]
impl NotificationStore for MemoryStore {
    async fn insert_notification(
        &self,
        new: NewNotification,
    ) -> Result<Notification, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.fail_inserts_for.contains(&new.recipient_id) {
            return Err(StoreError::Unavailable("seeded insert failure".to_string()));
        }
        inner.next_notification_id += 1;
        let notification = Notification {
            id: inner.next_notification_id,
            recipient_id: new.recipient_id,
            kind: new.kind,
            title: new.title,
            message: new.message,
            related_id: new.related_id,
            related_type: new.related_type,
            is_read: false,
            created_at: Utc::now(),
        };
        inner.notifications.push(notification.clone());
        Ok(notification)
    }

    async fn unread_count(&self, user_id: i64) -> Result<u64, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .notifications
            .iter()
            .filter(|n| n.recipient_id == user_id && !n.is_read)
            .count() as u64)
    }

    async fn mark_as_read(&self, notification_id: i64) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(n) = inner
            .notifications
            .iter_mut()
            .find(|n| n.id == notification_id)
        {
            n.is_read = true;
        }
        Ok(())
    }

    async fn mark_all_read(&self, user_id: i64) -> Result<u64, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let mut affected = 0;
        for n in inner
            .notifications
            .iter_mut()
            .filter(|n| n.recipient_id == user_id && !n.is_read)
        {
            n.is_read = true;
            affected += 1;
        }
        Ok(affected)
    }

    async fn notification_setting(
        &self,
        user_id: i64,
        kind: NotificationKind,
    ) -> Result<Option<NotificationSetting>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.settings.get(&(user_id, kind)).cloned())
    }

    async fn active_recipients(&self) -> Result<Vec<i64>, StoreError> {
        Ok(self.inner.lock().unwrap().active_users.clone())
    }

    async fn active_subscriptions(
        &self,
        user_id: i64,
    ) -> Result<Vec<PushSubscription>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .subscriptions
            .iter()
            .filter(|s| s.user_id == user_id && s.active)
            .cloned()
            .collect())
    }

    async fn deactivate_subscription(&self, subscription_id: i64) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(sub) = inner
            .subscriptions
            .iter_mut()
            .find(|s| s.id == subscription_id)
        {
            sub.active = false;
            sub.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn delete_notifications_before(
        &self,
        is_read: bool,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let before = inner.notifications.len();
        inner
            .notifications
            .retain(|n| !(n.is_read == is_read && n.created_at < cutoff));
        Ok((before - inner.notifications.len()) as u64)
    }

    async fn delete_subscriptions_stale_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let before = inner.subscriptions.len();
        inner.subscriptions.retain(|s| s.updated_at >= cutoff);
        Ok((before - inner.subscriptions.len()) as u64)
    }
}
