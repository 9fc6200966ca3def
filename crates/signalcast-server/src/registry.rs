//! Registry of live client connections.
//!
//! Keyed by the transport's [`ConnectionHandle`], so lookup and removal are
//! O(1) and a handle can never appear twice. The registry is owned by the
//! event loop and touched only from its task.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use signalcast_types::{ConnectionHandle, ConnectionId, ProtocolKind};
use tracing::warn;

/// Byte prefix that marks an inbound echo message as a ping.
pub const PING_TOKEN: &[u8] = b"ping";

/// Whether an inbound payload is a ping (case-sensitive prefix match).
pub fn is_ping(payload: &str) -> bool {
    payload.as_bytes().starts_with(PING_TOKEN)
}

/// What an echo connection owes its client at the next writable
/// opportunity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WriteIntent {
    /// Nothing to send.
    #[default]
    Idle,
    /// A pong followed by an acknowledgement.
    PongThenAck,
    /// A single acknowledgement.
    AckOnly,
}

impl WriteIntent {
    /// Intent after an inbound message.
    ///
    /// The latest message decides: a ping asks for a pong then an ack,
    /// anything else for an ack only, replacing whatever was owed.
    pub const fn on_receive(ping: bool) -> Self {
        if ping {
            Self::PongThenAck
        } else {
            Self::AckOnly
        }
    }
}

/// One live client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    /// Registry-assigned sequence number.
    pub id: ConnectionId,
    /// Transport identity used for writes.
    pub handle: ConnectionHandle,
    /// Protocol negotiated at connect time.
    pub protocol: ProtocolKind,
    /// Pending echo replies.
    pub intent: WriteIntent,
    /// When the connection was established.
    pub connected_at: DateTime<Utc>,
}

/// The set of live connections.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: HashMap<ConnectionHandle, Connection>,
    last_id: u64,
}

impl ConnectionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection for `handle` and return its id.
    ///
    /// The transport reports each handle as established once. If it ever
    /// reports a live handle again, the existing entry and id are kept so
    /// the handle is not counted twice.
    pub fn register(&mut self, handle: ConnectionHandle, protocol: ProtocolKind) -> ConnectionId {
        if let Some(existing) = self.connections.get(&handle) {
            warn!(%handle, id = %existing.id, "Duplicate establish for live handle ignored");
            return existing.id;
        }
        self.last_id = self.last_id.saturating_add(1);
        let id = ConnectionId(self.last_id);
        self.connections.insert(
            handle,
            Connection {
                id,
                handle,
                protocol,
                intent: WriteIntent::Idle,
                connected_at: Utc::now(),
            },
        );
        id
    }

    /// Remove the connection for `handle`.
    ///
    /// Returns the removed entry, or `None` if the handle was not live.
    /// Removing an absent handle is not an error.
    pub fn unregister(&mut self, handle: ConnectionHandle) -> Option<Connection> {
        self.connections.remove(&handle)
    }

    /// Look up a connection.
    pub fn get(&self, handle: ConnectionHandle) -> Option<&Connection> {
        self.connections.get(&handle)
    }

    /// Look up a connection for mutation.
    pub fn get_mut(&mut self, handle: ConnectionHandle) -> Option<&mut Connection> {
        self.connections.get_mut(&handle)
    }

    /// Visit every live connection in unspecified order.
    pub fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(&Connection),
    {
        for connection in self.connections.values() {
            f(connection);
        }
    }

    /// Number of live connections.
    pub fn count(&self) -> usize {
        self.connections.len()
    }

    /// Whether no connection is live.
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}
