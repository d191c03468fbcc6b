//! The live connection registry and its realtime transport.
//!
//! Connected clients speak a small JSON envelope protocol over WebSocket.
//! The pieces are deliberately separable: `protocol` defines the envelopes,
//! `connection` is a per-channel state machine that can be driven without a
//! live transport, `registry` is the in-memory map from authenticated user
//! id to an open channel, and `server` glues the state machine to real
//! sockets.
//!
//! The registry is process-local. A recipient connected to another process
//! will not receive anything dispatched from this one; that is a documented
//! scaling limit of the design, not something this module works around.

pub mod connection;
pub mod protocol;
#[allow(clippy::module_inception)]
pub mod registry;
pub mod server;

pub use connection::{Connection, ConnectionState};
pub use protocol::{ClientMessage, ServerMessage};
pub use registry::{ConnectionRegistry, RegistryStats, SendReport};
pub use server::RealtimeServer;
