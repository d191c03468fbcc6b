//! Postgres-backed notification store.
//!
//! All access goes through parameterized queries against the logical tables
//! `notifications`, `notification_settings`, and `push_subscriptions` (plus
//! a read of `users` for active-recipient resolution). Queries are issued at
//! runtime so the crate builds without a live database.

use crate::{
    config::StoreConfig,
    core::{
        NewNotification, Notification, NotificationKind, NotificationSetting, NotificationStore,
        PushSubscription,
    },
    storage::StoreError,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{
    postgres::{PgPoolOptions, PgRow},
    PgPool, Row,
};

/// The production [`NotificationStore`] over a Postgres pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connects a new pool from the store configuration.
    pub async fn connect(config: &StoreConfig) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.database_url)
            .await?;
        Ok(Self { pool })
    }

    /// Wraps an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn notification_from_row(row: &PgRow) -> Result<Notification, StoreError> {
    let kind: String = row.try_get("kind")?;
    let kind = NotificationKind::parse(&kind)
        .ok_or_else(|| StoreError::Query(format!("unknown notification kind: {kind}")))?;
    Ok(Notification {
        id: row.try_get("id")?,
        recipient_id: row.try_get("recipient_id")?,
        kind,
        title: row.try_get("title")?,
        message: row.try_get("message")?,
        related_id: row.try_get("related_id")?,
        related_type: row.try_get("related_type")?,
        is_read: row.try_get("is_read")?,
        created_at: row.try_get("created_at")?,
    })
}

fn subscription_from_row(row: &PgRow) -> Result<PushSubscription, StoreError> {
    Ok(PushSubscription {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        endpoint: row.try_get("endpoint")?,
        p256dh_key: row.try_get("p256dh_key")?,
        auth_key: row.try_get("auth_key")?,
        active: row.try_get("active")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl NotificationStore for PgStore {
    async fn insert_notification(
        &self,
        new: NewNotification,
    ) -> Result<Notification, StoreError> {
        let row = sqlx::query(
            "INSERT INTO notifications \
                 (recipient_id, kind, title, message, related_id, related_type, is_read, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, FALSE, NOW()) \
             RETURNING id, recipient_id, kind, title, message, related_id, related_type, \
                       is_read, created_at",
        )
        .bind(new.recipient_id)
        .bind(new.kind.as_str())
        .bind(&new.title)
        .bind(&new.message)
        .bind(new.related_id)
        .bind(&new.related_type)
        .fetch_one(&self.pool)
        .await?;
        notification_from_row(&row)
    }

    async fn unread_count(&self, user_id: i64) -> Result<u64, StoreError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM notifications WHERE recipient_id = $1 AND is_read = FALSE",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count as u64)
    }

    async fn mark_as_read(&self, notification_id: i64) -> Result<(), StoreError> {
        // Idempotent: updating an already-read or missing row affects zero
        // rows and is not an error.
        sqlx::query("UPDATE notifications SET is_read = TRUE WHERE id = $1")
            .bind(notification_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn mark_all_read(&self, user_id: i64) -> Result<u64, StoreError> {
        let result = sqlx::query(
            "UPDATE notifications SET is_read = TRUE \
             WHERE recipient_id = $1 AND is_read = FALSE",
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn notification_setting(
        &self,
        user_id: i64,
        kind: NotificationKind,
    ) -> Result<Option<NotificationSetting>, StoreError> {
        let row = sqlx::query(
            "SELECT user_id, kind, enabled, push_enabled \
             FROM notification_settings WHERE user_id = $1 AND kind = $2",
        )
        .bind(user_id)
        .bind(kind.as_str())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            None => Ok(None),
            Some(row) => {
                let kind_str: String = row.try_get("kind")?;
                let kind = NotificationKind::parse(&kind_str).ok_or_else(|| {
                    StoreError::Query(format!("unknown notification kind: {kind_str}"))
                })?;
                Ok(Some(NotificationSetting {
                    user_id: row.try_get("user_id")?,
                    kind,
                    enabled: row.try_get("enabled")?,
                    push_enabled: row.try_get("push_enabled")?,
                }))
            }
        }
    }

    async fn active_recipients(&self) -> Result<Vec<i64>, StoreError> {
        let ids: Vec<i64> = sqlx::query_scalar("SELECT id FROM users WHERE active = TRUE")
            .fetch_all(&self.pool)
            .await?;
        Ok(ids)
    }

    async fn active_subscriptions(
        &self,
        user_id: i64,
    ) -> Result<Vec<PushSubscription>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, user_id, endpoint, p256dh_key, auth_key, active, updated_at \
             FROM push_subscriptions WHERE user_id = $1 AND active = TRUE",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(subscription_from_row).collect()
    }

    async fn deactivate_subscription(&self, subscription_id: i64) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE push_subscriptions SET active = FALSE, updated_at = NOW() WHERE id = $1",
        )
        .bind(subscription_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_notifications_before(
        &self,
        is_read: bool,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        let result =
            sqlx::query("DELETE FROM notifications WHERE is_read = $1 AND created_at < $2")
                .bind(is_read)
                .bind(cutoff)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected())
    }

    async fn delete_subscriptions_stale_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM push_subscriptions WHERE updated_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
