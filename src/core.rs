//! Core domain types and service traits for maintwatch
//!
//! This module defines the fundamental data structures and trait contracts
//! that govern component interactions throughout the service.

use crate::storage::StoreError;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The kinds of notification this service delivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    EquipmentFailure,
    MaintenanceDue,
    ServiceOrderUpdate,
    SystemAlert,
}

impl NotificationKind {
    /// The wire/store representation of this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::EquipmentFailure => "equipment_failure",
            NotificationKind::MaintenanceDue => "maintenance_due",
            NotificationKind::ServiceOrderUpdate => "service_order_update",
            NotificationKind::SystemAlert => "system_alert",
        }
    }

    /// Parses the store representation back into a kind.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "equipment_failure" => Some(NotificationKind::EquipmentFailure),
            "maintenance_due" => Some(NotificationKind::MaintenanceDue),
            "service_order_update" => Some(NotificationKind::ServiceOrderUpdate),
            "system_alert" => Some(NotificationKind::SystemAlert),
            _ => None,
        }
    }
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted, addressed notification row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Notification {
    pub id: i64,
    pub recipient_id: i64,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub related_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub related_type: Option<String>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// The fields required to insert a notification. Ids and timestamps are
/// assigned by the store.
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub recipient_id: i64,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub related_id: Option<i64>,
    pub related_type: Option<String>,
}

/// A per-user, per-kind delivery preference row.
///
/// Absence of a row is treated as `enabled = true, push_enabled = true`:
/// recipients are opted in until they opt out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationSetting {
    pub user_id: i64,
    pub kind: NotificationKind,
    pub enabled: bool,
    pub push_enabled: bool,
}

/// A durable, externally-registered push endpoint for one user.
#[derive(Debug, Clone, PartialEq)]
pub struct PushSubscription {
    pub id: i64,
    pub user_id: i64,
    pub endpoint: String,
    pub p256dh_key: String,
    pub auth_key: String,
    pub active: bool,
    pub updated_at: DateTime<Utc>,
}

/// The recipient set of a dispatch event.
#[derive(Debug, Clone)]
pub enum Recipients {
    /// An explicit list of user ids.
    Explicit(Vec<i64>),
    /// Every currently-active account.
    AllActive,
}

/// A domain event to be turned into notifications and delivered.
#[derive(Debug, Clone)]
pub struct DispatchEvent {
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub related_id: Option<i64>,
    pub related_type: Option<String>,
    pub recipients: Recipients,
}

/// Aggregated per-event outcome of a dispatch.
///
/// Disabled recipients are counted separately from failures; a recipient
/// that fails never stops the remaining recipients from being processed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DispatchOutcome {
    pub notifications_created: u64,
    pub live_delivered: u64,
    pub push_sent: u64,
    pub push_failed: u64,
    pub skipped_disabled: u64,
    /// True when the event was suppressed by the anti-storm window.
    pub suppressed: bool,
    pub errors: Vec<String>,
}

/// Aggregated outcome of a batch dispatch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchOutcome {
    pub total: usize,
    pub success: usize,
    pub failed: usize,
    pub errors: Vec<String>,
}

// =============================================================================
// Service Traits
// =============================================================================

/// The logical relational store backing notifications, settings, and push
/// subscriptions.
///
/// The schema and engine behind these rows are external concerns; this trait
/// covers exactly the parameterized reads and writes the delivery subsystem
/// issues.
#[async_trait]
pub trait NotificationStore: Send + Sync {
    /// Persists a new notification (`is_read = false`) and returns the row.
    async fn insert_notification(&self, new: NewNotification)
        -> Result<Notification, StoreError>;

    /// Number of unread notifications for a user.
    async fn unread_count(&self, user_id: i64) -> Result<u64, StoreError>;

    /// Marks one notification read. Idempotent: marking an already-read row
    /// succeeds without effect.
    async fn mark_as_read(&self, notification_id: i64) -> Result<(), StoreError>;

    /// Marks every unread notification of a user read; returns rows affected.
    async fn mark_all_read(&self, user_id: i64) -> Result<u64, StoreError>;

    /// The preference row for `(user, kind)`, if the user has one.
    async fn notification_setting(
        &self,
        user_id: i64,
        kind: NotificationKind,
    ) -> Result<Option<NotificationSetting>, StoreError>;

    /// Ids of every currently-active account.
    async fn active_recipients(&self) -> Result<Vec<i64>, StoreError>;

    /// Active push subscriptions registered for a user.
    async fn active_subscriptions(
        &self,
        user_id: i64,
    ) -> Result<Vec<PushSubscription>, StoreError>;

    /// Deactivates one subscription after a permanent delivery failure.
    async fn deactivate_subscription(&self, subscription_id: i64) -> Result<(), StoreError>;

    /// Deletes notifications with the given read state created before
    /// `cutoff`; returns rows removed.
    async fn delete_notifications_before(
        &self,
        is_read: bool,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, StoreError>;

    /// Deletes push subscriptions not updated since `cutoff`; returns rows
    /// removed.
    async fn delete_subscriptions_stale_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, StoreError>;
}

/// An equipment unit currently reporting a failure state.
#[derive(Debug, Clone, PartialEq)]
pub struct EquipmentAlarm {
    pub equipment_id: i64,
    pub name: String,
}

/// A service order requiring attention from its assignees.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceOrderAlarm {
    pub order_id: i64,
    pub title: String,
    pub assignee_ids: Vec<i64>,
}

/// The domain-state collaborator the condition scanners inspect.
///
/// Deciding *when* equipment fails or an order becomes overdue is business
/// logic outside this subsystem; scanners only read the current picture.
#[async_trait]
pub trait ConditionSource: Send + Sync {
    /// Equipment currently in a failure state.
    async fn equipment_in_failure(&self) -> Result<Vec<EquipmentAlarm>>;

    /// Service orders overdue for their assignees.
    async fn overdue_service_orders(&self) -> Result<Vec<ServiceOrderAlarm>>;
}
