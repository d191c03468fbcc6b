//! WebSocket listener for realtime clients.
//!
//! Accepts inbound connections, greets each with a `connected` envelope,
//! and feeds inbound text frames to the per-channel state machine. Outbound
//! envelopes flow through a per-connection mpsc channel pumped into the
//! socket sink, so the registry can hand a sender to the dispatcher without
//! touching the transport.

use crate::{
    core::NotificationStore,
    registry::{connection::Connection, protocol::ServerMessage, registry::ConnectionRegistry},
};
use futures_util::{SinkExt, StreamExt};
use std::future::Future;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info};

/// The accepting side of the realtime protocol.
pub struct RealtimeServer {
    listener: TcpListener,
    registry: Arc<ConnectionRegistry>,
    store: Arc<dyn NotificationStore>,
    shutdown_rx: watch::Receiver<bool>,
}

impl RealtimeServer {
    /// Creates a new `RealtimeServer` over an already-bound listener.
    pub fn new(
        listener: TcpListener,
        registry: Arc<ConnectionRegistry>,
        store: Arc<dyn NotificationStore>,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            listener,
            registry,
            store,
            shutdown_rx,
        }
    }

    /// Returns a future that accepts connections until shutdown.
    pub fn run(mut self) -> impl Future<Output = ()> {
        async move {
            info!(
                addr = ?self.listener.local_addr().ok(),
                "Realtime listener accepting connections"
            );
            loop {
                tokio::select! {
                    biased;
                    _ = self.shutdown_rx.changed() => {
                        info!("Realtime listener received shutdown signal.");
                        break;
                    }
                    accepted = self.listener.accept() => {
                        match accepted {
                            Ok((stream, peer)) => {
                                debug!(%peer, "Accepted realtime connection");
                                let registry = self.registry.clone();
                                let store = self.store.clone();
                                tokio::spawn(async move {
                                    handle_socket(stream, registry, store).await;
                                });
                            }
                            Err(e) => {
                                error!(error = %e, "Failed to accept realtime connection");
                            }
                        }
                    }
                }
            }
            debug!("Realtime listener task finished.");
        }
    }
}

/// Runs one socket to completion: handshake, greeting, message loop, cleanup.
async fn handle_socket(
    stream: TcpStream,
    registry: Arc<ConnectionRegistry>,
    store: Arc<dyn NotificationStore>,
) {
    let websocket = match tokio_tungstenite::accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            debug!(error = %e, "WebSocket handshake failed");
            return;
        }
    };
    let (mut ws_tx, mut ws_rx) = websocket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();

    let mut connection = Connection::new(registry, store, tx.clone());
    let conn_id = connection.conn_id();

    if tx.send(ServerMessage::Connected).is_err() {
        return;
    }

    // Outbound pump: envelopes from the registry/state machine to the sink.
    let send_task = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            match serde_json::to_string(&message) {
                Ok(json) => {
                    if let Err(e) = ws_tx.send(Message::Text(json.into())).await {
                        debug!(conn = conn_id, error = %e, "Realtime send failed; closing pump");
                        break;
                    }
                }
                Err(e) => error!(conn = conn_id, error = %e, "Failed to serialize envelope"),
            }
        }
    });

    // Inbound loop: frames from the socket into the state machine.
    while let Some(frame) = ws_rx.next().await {
        match frame {
            Ok(Message::Text(text)) => connection.on_text(text.as_str()).await,
            Ok(Message::Close(_)) => {
                debug!(conn = conn_id, "Client closed realtime connection");
                break;
            }
            // Ping/pong keepalive is answered by the protocol layer.
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) | Ok(Message::Binary(_)) => {}
            Ok(Message::Frame(_)) => {}
            Err(e) => {
                debug!(conn = conn_id, error = %e, "Realtime connection error");
                break;
            }
        }
    }

    // Release the binding only if this channel still owns it, then drop
    // every outbound sender so the pump drains and exits.
    connection.on_close();
    drop(connection);
    drop(tx);
    let _ = send_task.await;
    debug!(conn = conn_id, "Realtime connection finished");
}
