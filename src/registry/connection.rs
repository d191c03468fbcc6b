//! Per-channel protocol state machine.
//!
//! Each realtime channel is modeled explicitly as
//! `Unauthenticated → Authenticated → Closed`, so the protocol handling can
//! be driven and asserted on without a live transport. The transport glue
//! in [`crate::registry::server`] only parses frames and forwards them here.

use crate::{
    core::NotificationStore,
    registry::{
        protocol::{ClientMessage, ServerMessage},
        registry::ConnectionRegistry,
    },
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Lifecycle state of one realtime channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Unauthenticated,
    Authenticated(i64),
    Closed,
}

/// One realtime channel: its state, its outbound sender, and the shared
/// registry/store collaborators.
pub struct Connection {
    conn_id: u64,
    state: ConnectionState,
    registry: Arc<ConnectionRegistry>,
    store: Arc<dyn NotificationStore>,
    tx: mpsc::UnboundedSender<ServerMessage>,
}

impl Connection {
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        store: Arc<dyn NotificationStore>,
        tx: mpsc::UnboundedSender<ServerMessage>,
    ) -> Self {
        let conn_id = registry.next_conn_id();
        Self {
            conn_id,
            state: ConnectionState::Unauthenticated,
            registry,
            store,
            tx,
        }
    }

    pub fn conn_id(&self) -> u64 {
        self.conn_id
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Handles one inbound text frame.
    ///
    /// Malformed or unknown envelopes are answered with an `error` envelope;
    /// bad input never closes the channel.
    pub async fn on_text(&mut self, text: &str) {
        if self.state == ConnectionState::Closed {
            return;
        }
        match serde_json::from_str::<ClientMessage>(text) {
            Ok(message) => self.handle(message).await,
            Err(e) => {
                debug!(conn = self.conn_id, error = %e, "Rejecting malformed envelope");
                self.reply(ServerMessage::Error {
                    message: format!("invalid message: {e}"),
                });
            }
        }
    }

    async fn handle(&mut self, message: ClientMessage) {
        match message {
            ClientMessage::Authenticate { user_id } => {
                self.registry.bind(user_id, self.conn_id, self.tx.clone());
                self.state = ConnectionState::Authenticated(user_id);
                self.reply(ServerMessage::Authenticated { user_id });
                // The unread count follows immediately so the client can
                // render its badge without a second round trip.
                match self.store.unread_count(user_id).await {
                    Ok(count) => self.reply(ServerMessage::UnreadCount { count }),
                    Err(e) => self.reply_store_error(e),
                }
            }
            ClientMessage::GetUnreadCount { user_id } => {
                match self.store.unread_count(user_id).await {
                    Ok(count) => self.reply(ServerMessage::UnreadCount { count }),
                    Err(e) => self.reply_store_error(e),
                }
            }
            ClientMessage::MarkAsRead { notification_id } => {
                match self.store.mark_as_read(notification_id).await {
                    Ok(()) => {
                        // Coarse invalidation: every open channel is told,
                        // not just the owner of the notification.
                        self.registry
                            .broadcast(&ServerMessage::NotificationRead { notification_id });
                    }
                    Err(e) => self.reply_store_error(e),
                }
            }
            ClientMessage::MarkAllRead { user_id } => {
                match self.store.mark_all_read(user_id).await {
                    Ok(affected) => {
                        debug!(user_id, affected, "Marked all notifications read");
                        self.reply(ServerMessage::AllMarkedRead);
                    }
                    Err(e) => self.reply_store_error(e),
                }
            }
            ClientMessage::Ping => self.reply(ServerMessage::Pong),
        }
    }

    /// Handles the channel closing, cleanly or otherwise.
    ///
    /// The registry entry is only removed if this channel still owns the
    /// binding for its user; a superseded channel closing late must not
    /// evict the newer one.
    pub fn on_close(&mut self) {
        if let ConnectionState::Authenticated(user_id) = self.state {
            self.registry.release(user_id, self.conn_id);
        }
        self.state = ConnectionState::Closed;
    }

    fn reply(&self, message: ServerMessage) {
        if self.tx.send(message).is_err() {
            warn!(conn = self.conn_id, "Reply dropped; outbound channel gone");
        }
    }

    fn reply_store_error(&self, e: crate::storage::StoreError) {
        warn!(conn = self.conn_id, error = %e, "Store call failed for realtime request");
        self.reply(ServerMessage::Error {
            message: e.to_string(),
        });
    }
}
