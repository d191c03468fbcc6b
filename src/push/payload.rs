//! Structured payloads handed to the push relay.

use crate::core::{Notification, NotificationKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A client-side action button attached to a push payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PushAction {
    pub action: String,
    pub title: String,
}

/// Contextual data the client uses to route a tapped notification.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PushData {
    pub notification_id: i64,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub related_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub related_type: Option<String>,
    pub url: String,
    pub timestamp: DateTime<Utc>,
}

/// The complete payload delivered through the push relay.
///
/// `tag` is stable per notification id so the client replaces a re-delivered
/// payload instead of stacking duplicates.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WebPushPayload {
    pub title: String,
    pub body: String,
    pub icon: String,
    pub badge: String,
    pub tag: String,
    pub data: PushData,
    pub actions: Vec<PushAction>,
}

impl WebPushPayload {
    /// Builds the payload for one notification row.
    pub fn for_notification(notification: &Notification) -> Self {
        Self {
            title: notification.title.clone(),
            body: notification.message.clone(),
            icon: "/icons/icon-192.png".to_string(),
            badge: "/icons/badge-72.png".to_string(),
            tag: format!("notification-{}", notification.id),
            data: PushData {
                notification_id: notification.id,
                kind: notification.kind,
                related_id: notification.related_id,
                related_type: notification.related_type.clone(),
                url: notification_url(notification.kind, notification.related_id),
                timestamp: notification.created_at,
            },
            actions: actions_for(notification.kind),
        }
    }
}

/// Delivery urgency hint for the relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Urgency {
    Normal,
    High,
}

impl Urgency {
    /// System alerts are the only kind delivered with high urgency.
    pub fn for_kind(kind: NotificationKind) -> Self {
        match kind {
            NotificationKind::SystemAlert => Urgency::High,
            _ => Urgency::Normal,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Urgency::Normal => "normal",
            Urgency::High => "high",
        }
    }
}

/// Fixed mapping from `(kind, related_id)` to the path the client opens.
fn notification_url(kind: NotificationKind, related_id: Option<i64>) -> String {
    match (kind, related_id) {
        (NotificationKind::EquipmentFailure, Some(id)) => format!("/equipment/{id}"),
        (NotificationKind::MaintenanceDue, Some(id)) => format!("/maintenance/{id}"),
        (NotificationKind::ServiceOrderUpdate, Some(id)) => format!("/service-orders/{id}"),
        _ => "/notifications".to_string(),
    }
}

fn actions_for(kind: NotificationKind) -> Vec<PushAction> {
    let view = |title: &str| PushAction {
        action: "view".to_string(),
        title: title.to_string(),
    };
    let dismiss = PushAction {
        action: "dismiss".to_string(),
        title: "Dismiss".to_string(),
    };
    match kind {
        NotificationKind::EquipmentFailure => vec![view("View Equipment"), dismiss],
        NotificationKind::MaintenanceDue => vec![view("View Schedule"), dismiss],
        NotificationKind::ServiceOrderUpdate => vec![view("View Order"), dismiss],
        NotificationKind::SystemAlert => vec![dismiss],
    }
}
