//! JSON envelopes exchanged with realtime clients.
//!
//! Every envelope carries a `type` discriminator. Unknown types and
//! malformed envelopes are answered with an `error` envelope; they never
//! close the channel.

use crate::core::Notification;
use serde::{Deserialize, Serialize};

/// Client → server envelopes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Binds this channel to `user_id`, superseding any prior binding.
    Authenticate { user_id: i64 },
    GetUnreadCount { user_id: i64 },
    MarkAsRead { notification_id: i64 },
    MarkAllRead { user_id: i64 },
    Ping,
}

/// Server → client envelopes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Greeting sent as soon as the channel opens.
    Connected,
    Authenticated { user_id: i64 },
    UnreadCount { count: u64 },
    NewNotification { notification: Notification },
    /// Coarse invalidation signal: broadcast to every open channel, not
    /// scoped to the owner of the notification.
    NotificationRead { notification_id: i64 },
    AllMarkedRead,
    Pong,
    Error { message: String },
}
