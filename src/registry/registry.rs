//! The in-memory map from authenticated user id to an open channel.

use crate::registry::protocol::ServerMessage;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use tokio::sync::mpsc;
use tracing::{debug, warn};

struct RegisteredClient {
    conn_id: u64,
    tx: mpsc::UnboundedSender<ServerMessage>,
}

/// Aggregated result of a multi-recipient send.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SendReport {
    pub sent: usize,
    pub failed: usize,
}

/// Connection statistics for operational visibility.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RegistryStats {
    pub connected: usize,
    pub user_ids: Vec<i64>,
}

/// Live connection registry: at most one channel per authenticated user.
///
/// A later `authenticate` for the same user supersedes the prior binding;
/// release only takes effect when the closing channel still owns the
/// binding, so a stale, superseded channel cannot evict a newer one.
#[derive(Default)]
pub struct ConnectionRegistry {
    clients: RwLock<HashMap<i64, RegisteredClient>>,
    conn_counter: AtomicU64,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hands out a process-unique id for a new channel.
    pub fn next_conn_id(&self) -> u64 {
        self.conn_counter.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Binds `user_id` to the given channel, superseding any prior binding.
    pub fn bind(&self, user_id: i64, conn_id: u64, tx: mpsc::UnboundedSender<ServerMessage>) {
        let mut clients = self.clients.write().unwrap();
        if let Some(prior) = clients.insert(user_id, RegisteredClient { conn_id, tx }) {
            debug!(
                user_id,
                superseded_conn = prior.conn_id,
                conn = conn_id,
                "Superseding existing realtime binding"
            );
        }
        metrics::gauge!("realtime_connected_clients").set(clients.len() as f64);
    }

    /// Clears the binding for `user_id`, but only if `conn_id` still owns it.
    ///
    /// Returns `true` if the entry was removed.
    pub fn release(&self, user_id: i64, conn_id: u64) -> bool {
        let mut clients = self.clients.write().unwrap();
        let owns = clients
            .get(&user_id)
            .map(|c| c.conn_id == conn_id)
            .unwrap_or(false);
        if owns {
            clients.remove(&user_id);
            metrics::gauge!("realtime_connected_clients").set(clients.len() as f64);
        } else {
            debug!(user_id, conn = conn_id, "Stale channel closed; binding kept");
        }
        owns
    }

    /// Sends one envelope to a user's channel.
    ///
    /// Returns `false`, without error, when the user has no open channel or
    /// the channel is no longer writable.
    pub fn send_to_user(&self, user_id: i64, message: ServerMessage) -> bool {
        let clients = self.clients.read().unwrap();
        match clients.get(&user_id) {
            Some(client) => match client.tx.send(message) {
                Ok(()) => true,
                Err(_) => {
                    warn!(user_id, "Live channel present but not writable");
                    false
                }
            },
            None => false,
        }
    }

    /// One delivery attempt per id; aggregates the outcome.
    pub fn send_to_users(&self, user_ids: &[i64], message: &ServerMessage) -> SendReport {
        let mut report = SendReport::default();
        for &user_id in user_ids {
            if self.send_to_user(user_id, message.clone()) {
                report.sent += 1;
            } else {
                report.failed += 1;
            }
        }
        report
    }

    /// Best-effort delivery to every open channel.
    ///
    /// A failure on one channel is logged and does not prevent delivery to
    /// the others. Returns the number of channels reached.
    pub fn broadcast(&self, message: &ServerMessage) -> usize {
        let clients = self.clients.read().unwrap();
        let mut delivered = 0;
        for (user_id, client) in clients.iter() {
            match client.tx.send(message.clone()) {
                Ok(()) => delivered += 1,
                Err(_) => warn!(user_id, "Broadcast skipped unwritable channel"),
            }
        }
        delivered
    }

    /// Connected-client count and identities.
    pub fn stats(&self) -> RegistryStats {
        let clients = self.clients.read().unwrap();
        let mut user_ids: Vec<i64> = clients.keys().copied().collect();
        user_ids.sort_unstable();
        RegistryStats {
            connected: user_ids.len(),
            user_ids,
        }
    }
}
