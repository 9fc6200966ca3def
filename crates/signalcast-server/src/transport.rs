//! Channel-backed transport between socket tasks and the event loop.
//!
//! The axum side holds an [`Acceptor`]: each WebSocket task mints a
//! [`ConnectionHandle`], announces itself, forwards inbound text, and drains
//! its own bounded outbound queue into the socket. The event loop holds the
//! [`ChannelTransport`], which turns those announcements into
//! [`ConnectionEvent`]s and implements the write side through [`Outbound`].
//!
//! Writable opportunities follow the request-then-fill pattern: a handler
//! calls [`Outbound::request_writable`], and the next
//! [`ChannelTransport::service`] call delivers exactly one
//! [`Event::Writable`] for that handle.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use signalcast_types::{ConnectionHandle, ProtocolKind};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::debug;

/// Errors from the write primitive. Each is scoped to one connection.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WriteError {
    /// The handle is not (or no longer) known to the transport.
    #[error("no live connection for handle {0}")]
    UnknownHandle(ConnectionHandle),

    /// The client is not draining its queue fast enough.
    #[error("outbound queue full for handle {0}")]
    QueueFull(ConnectionHandle),

    /// The socket task has gone away.
    #[error("outbound queue closed for handle {0}")]
    Closed(ConnectionHandle),
}

/// Errors from servicing the transport.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// Every acceptor has been dropped, so no further events can arrive.
    #[error("transport disconnected: no acceptors remain")]
    Disconnected,
}

/// What happened on one connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// The client connected using the given protocol.
    Established(ProtocolKind),
    /// The client sent a message.
    Receive(String),
    /// A previously requested writable opportunity.
    Writable,
    /// The connection is gone; its handle must not be used again.
    Closed,
}

/// An [`Event`] tagged with the connection it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionEvent {
    /// The connection.
    pub handle: ConnectionHandle,
    /// What happened.
    pub event: Event,
}

impl ConnectionEvent {
    /// Tag `event` with `handle`.
    pub const fn new(handle: ConnectionHandle, event: Event) -> Self {
        Self { handle, event }
    }
}

/// The write capabilities handlers get from the transport.
pub trait Outbound {
    /// Queue one text frame for `handle`.
    fn write(&mut self, handle: ConnectionHandle, frame: String) -> Result<(), WriteError>;

    /// Ask for one [`Event::Writable`] for `handle` on the next service call.
    /// Repeated requests before delivery collapse into one.
    fn request_writable(&mut self, handle: ConnectionHandle);

    /// Drop the connection. A [`Event::Closed`] follows on the next service
    /// call.
    fn close(&mut self, handle: ConnectionHandle);
}

/// Messages from socket tasks to the event loop.
#[derive(Debug)]
pub enum TransportEvent {
    /// A socket completed its handshake.
    Opened {
        /// Identity minted for the socket.
        handle: ConnectionHandle,
        /// Protocol chosen by the route.
        protocol: ProtocolKind,
        /// Sender half of the socket's outbound queue.
        outbound: mpsc::Sender<String>,
    },
    /// The client sent a message.
    Message {
        /// Sending socket.
        handle: ConnectionHandle,
        /// Message text.
        payload: String,
    },
    /// The socket closed or failed.
    Disconnected {
        /// The closed socket.
        handle: ConnectionHandle,
    },
}

/// Socket-task side of the transport. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Acceptor {
    events: mpsc::Sender<TransportEvent>,
    next_handle: Arc<AtomicU64>,
    outbound_capacity: usize,
}

impl Acceptor {
    /// Announce a new socket. Returns its handle and the receiver the
    /// socket task drains, or `None` if the event loop is gone.
    pub async fn open(
        &self,
        protocol: ProtocolKind,
    ) -> Option<(ConnectionHandle, mpsc::Receiver<String>)> {
        let handle = ConnectionHandle(self.next_handle.fetch_add(1, Ordering::Relaxed));
        let (outbound, frames) = mpsc::channel(self.outbound_capacity);
        self.events
            .send(TransportEvent::Opened {
                handle,
                protocol,
                outbound,
            })
            .await
            .ok()?;
        Some((handle, frames))
    }

    /// Forward an inbound message. Returns `false` if the event loop is gone.
    pub async fn deliver(&self, handle: ConnectionHandle, payload: String) -> bool {
        self.events
            .send(TransportEvent::Message { handle, payload })
            .await
            .is_ok()
    }

    /// Report that a socket closed.
    pub async fn disconnect(&self, handle: ConnectionHandle) {
        // A gone event loop has nothing left to clean up.
        let _ = self.events.send(TransportEvent::Disconnected { handle }).await;
    }
}

/// Event-loop side of the transport.
#[derive(Debug)]
pub struct ChannelTransport {
    events: mpsc::Receiver<TransportEvent>,
    peers: HashMap<ConnectionHandle, mpsc::Sender<String>>,
    writable: BTreeSet<ConnectionHandle>,
    closing: Vec<ConnectionHandle>,
}

/// Create a connected acceptor/transport pair.
///
/// `event_capacity` bounds the queue from socket tasks to the loop;
/// `outbound_capacity` bounds each connection's outbound queue. Both are
/// clamped to at least 1.
pub fn channel(event_capacity: usize, outbound_capacity: usize) -> (Acceptor, ChannelTransport) {
    let (tx, rx) = mpsc::channel(event_capacity.max(1));
    let acceptor = Acceptor {
        events: tx,
        next_handle: Arc::new(AtomicU64::new(1)),
        outbound_capacity: outbound_capacity.max(1),
    };
    let transport = ChannelTransport {
        events: rx,
        peers: HashMap::new(),
        writable: BTreeSet::new(),
        closing: Vec::new(),
    };
    (acceptor, transport)
}

impl ChannelTransport {
    /// Collect pending connection events, waiting at most `timeout`.
    ///
    /// Does not wait at all when writable opportunities or closes are
    /// already pending. Inbound events come first, in arrival order,
    /// followed by one [`Event::Writable`] per handle requested before this
    /// call that is still live.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Disconnected`] once every [`Acceptor`] has
    /// been dropped and the queue is drained.
    pub async fn service(&mut self, timeout: Duration) -> Result<Vec<ConnectionEvent>, TransportError> {
        let mut inbound = Vec::new();
        if self.writable.is_empty() && self.closing.is_empty() {
            match tokio::time::timeout(timeout, self.events.recv()).await {
                Ok(Some(event)) => inbound.push(event),
                Ok(None) => return Err(TransportError::Disconnected),
                Err(_elapsed) => {}
            }
        }
        while let Ok(event) = self.events.try_recv() {
            inbound.push(event);
        }

        let mut ready: Vec<ConnectionEvent> = self
            .closing
            .drain(..)
            .map(|handle| ConnectionEvent::new(handle, Event::Closed))
            .collect();

        for event in inbound {
            match event {
                TransportEvent::Opened {
                    handle,
                    protocol,
                    outbound,
                } => {
                    self.peers.insert(handle, outbound);
                    ready.push(ConnectionEvent::new(handle, Event::Established(protocol)));
                }
                TransportEvent::Message { handle, payload } => {
                    if self.peers.contains_key(&handle) {
                        ready.push(ConnectionEvent::new(handle, Event::Receive(payload)));
                    }
                }
                TransportEvent::Disconnected { handle } => {
                    if self.peers.remove(&handle).is_some() {
                        self.writable.remove(&handle);
                        ready.push(ConnectionEvent::new(handle, Event::Closed));
                    }
                }
            }
        }

        let requested = std::mem::take(&mut self.writable);
        ready.extend(
            requested
                .into_iter()
                .filter(|handle| self.peers.contains_key(handle))
                .map(|handle| ConnectionEvent::new(handle, Event::Writable)),
        );
        Ok(ready)
    }

    /// Number of sockets the transport currently writes to.
    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    /// Drop every outbound queue and stop accepting events. Socket tasks
    /// see their queue close and shut their sockets down.
    ///
    /// Returns the number of connections released.
    pub fn release(&mut self) -> usize {
        let released = self.peers.len();
        self.peers.clear();
        self.writable.clear();
        self.closing.clear();
        self.events.close();
        released
    }
}

impl Outbound for ChannelTransport {
    fn write(&mut self, handle: ConnectionHandle, frame: String) -> Result<(), WriteError> {
        let peer = self.peers.get(&handle).ok_or(WriteError::UnknownHandle(handle))?;
        peer.try_send(frame).map_err(|e| match e {
            TrySendError::Full(_) => WriteError::QueueFull(handle),
            TrySendError::Closed(_) => WriteError::Closed(handle),
        })
    }

    fn request_writable(&mut self, handle: ConnectionHandle) {
        if self.peers.contains_key(&handle) {
            self.writable.insert(handle);
        }
    }

    fn close(&mut self, handle: ConnectionHandle) {
        if self.peers.remove(&handle).is_some() {
            debug!(%handle, "Connection scheduled for close");
            self.writable.remove(&handle);
            self.closing.push(handle);
        }
    }
}
