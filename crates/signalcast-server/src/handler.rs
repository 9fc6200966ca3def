//! Protocol callbacks for connection events.
//!
//! The [`ConnectionHandler`] keeps the registry in step with the transport
//! (register on [`Event::Established`], unregister after [`Event::Closed`])
//! and hands every event to the [`Protocol`] the connection negotiated.
//! Protocols see the world only through a [`Context`]: the registry, a
//! read-only simulator, and the transport's [`Outbound`] capabilities.
//!
//! | Protocol | Receive | Writable |
//! |----------|---------|----------|
//! | [`EchoProtocol`] | record intent, request writable | pong then ack, or ack |
//! | [`TrafficProtocol`] | ignored | current traffic update |

use signalcast_core::simulator::SignalSimulator;
use signalcast_types::{ConnectionHandle, ProtocolKind, ServerMessage};
use tracing::{debug, error, info, warn};

use crate::encoder::{BroadcastEncoder, EncodeError};
use crate::registry::{ConnectionRegistry, WriteIntent, is_ping};
use crate::transport::{ConnectionEvent, Event, Outbound, WriteError};

/// Errors a protocol can report for one connection.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    /// Writing to the connection failed; the connection is closed.
    #[error("write failed: {source}")]
    Write {
        /// The underlying write error.
        #[from]
        source: WriteError,
    },

    /// A message could not be rendered.
    #[error("encode failed: {source}")]
    Encode {
        /// The underlying encoder error.
        #[from]
        source: EncodeError,
    },
}

/// State a protocol may touch while handling one event.
pub struct Context<'a> {
    /// Live connections, including the one the event belongs to.
    pub registry: &'a mut ConnectionRegistry,
    /// Current signal state.
    pub simulator: &'a SignalSimulator,
    /// Write side of the transport.
    pub outbound: &'a mut dyn Outbound,
}

/// One application protocol.
pub trait Protocol {
    /// Which protocol this is.
    fn kind(&self) -> ProtocolKind;

    /// React to one event on `handle`.
    ///
    /// Called after the connection is registered for
    /// [`Event::Established`] and before it is removed for
    /// [`Event::Closed`].
    fn handle(
        &self,
        handle: ConnectionHandle,
        event: &Event,
        cx: &mut Context<'_>,
    ) -> Result<(), HandlerError>;
}

/// Acknowledges every message; answers `ping` with a pong first.
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoProtocol {
    encoder: BroadcastEncoder,
}

impl EchoProtocol {
    /// Create the echo protocol.
    pub const fn new(encoder: BroadcastEncoder) -> Self {
        Self { encoder }
    }

    fn write(
        &self,
        handle: ConnectionHandle,
        message: &ServerMessage,
        outbound: &mut dyn Outbound,
    ) -> Result<(), HandlerError> {
        let frame = self.encoder.encode_message(message)?;
        outbound.write(handle, frame)?;
        Ok(())
    }
}

impl Protocol for EchoProtocol {
    fn kind(&self) -> ProtocolKind {
        ProtocolKind::Echo
    }

    fn handle(
        &self,
        handle: ConnectionHandle,
        event: &Event,
        cx: &mut Context<'_>,
    ) -> Result<(), HandlerError> {
        match event {
            Event::Receive(payload) => {
                let ping = is_ping(payload);
                if let Some(conn) = cx.registry.get_mut(handle) {
                    conn.intent = WriteIntent::on_receive(ping);
                    debug!(%handle, ping, len = payload.len(), "Echo message received");
                    cx.outbound.request_writable(handle);
                }
                Ok(())
            }
            Event::Writable => {
                let Some(conn) = cx.registry.get_mut(handle) else {
                    return Ok(());
                };
                match conn.intent {
                    WriteIntent::PongThenAck => {
                        self.write(handle, &ServerMessage::pong(), cx.outbound)?;
                        conn.intent = WriteIntent::AckOnly;
                        self.write(handle, &ServerMessage::received(), cx.outbound)?;
                        conn.intent = WriteIntent::Idle;
                    }
                    WriteIntent::AckOnly => {
                        self.write(handle, &ServerMessage::received(), cx.outbound)?;
                        conn.intent = WriteIntent::Idle;
                    }
                    WriteIntent::Idle => {}
                }
                Ok(())
            }
            Event::Established(_) | Event::Closed => Ok(()),
        }
    }
}

/// Pushes the signal state to receive-only clients.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrafficProtocol {
    encoder: BroadcastEncoder,
    push_on_connect: bool,
}

impl TrafficProtocol {
    /// Create the traffic protocol.
    ///
    /// With `push_on_connect`, a new client gets the current state at once
    /// instead of at the next tick.
    pub const fn new(encoder: BroadcastEncoder, push_on_connect: bool) -> Self {
        Self {
            encoder,
            push_on_connect,
        }
    }
}

impl Protocol for TrafficProtocol {
    fn kind(&self) -> ProtocolKind {
        ProtocolKind::Traffic
    }

    fn handle(
        &self,
        handle: ConnectionHandle,
        event: &Event,
        cx: &mut Context<'_>,
    ) -> Result<(), HandlerError> {
        match event {
            Event::Established(_) => {
                if self.push_on_connect {
                    cx.outbound.request_writable(handle);
                }
                Ok(())
            }
            Event::Receive(payload) => {
                debug!(%handle, len = payload.len(), "Ignoring message from receive-only client");
                Ok(())
            }
            Event::Writable => {
                let frame = self.encoder.encode(&cx.simulator.snapshot())?;
                cx.outbound.write(handle, frame)?;
                Ok(())
            }
            Event::Closed => Ok(()),
        }
    }
}

/// Routes connection events to protocols and keeps the registry current.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConnectionHandler {
    echo: EchoProtocol,
    traffic: TrafficProtocol,
}

impl ConnectionHandler {
    /// Create a handler with both protocols.
    pub fn new(push_on_connect: bool) -> Self {
        let encoder = BroadcastEncoder::new();
        Self {
            echo: EchoProtocol::new(encoder),
            traffic: TrafficProtocol::new(encoder, push_on_connect),
        }
    }

    fn protocol(&self, kind: ProtocolKind) -> &dyn Protocol {
        match kind {
            ProtocolKind::Echo => &self.echo,
            ProtocolKind::Traffic => &self.traffic,
        }
    }

    /// Handle one transport event.
    ///
    /// Never fails: a write failure closes only the affected connection, an
    /// encode failure is logged, and events for unknown handles (including
    /// repeated closes) are ignored.
    pub fn dispatch(&self, event: ConnectionEvent, cx: &mut Context<'_>) {
        let ConnectionEvent { handle, event } = event;

        let kind = if let Event::Established(kind) = event {
            let id = cx.registry.register(handle, kind);
            info!(
                %handle,
                %id,
                protocol = kind.as_str(),
                connections = cx.registry.count(),
                "Client connected"
            );
            kind
        } else if let Some(conn) = cx.registry.get(handle) {
            conn.protocol
        } else {
            debug!(%handle, ?event, "Event for unknown connection ignored");
            return;
        };

        let protocol = self.protocol(kind);
        match protocol.handle(handle, &event, cx) {
            Ok(()) => {}
            Err(HandlerError::Write { source }) => {
                warn!(%handle, error = %source, "Write failed, closing connection");
                cx.outbound.close(handle);
            }
            Err(HandlerError::Encode { source }) => {
                error!(%handle, error = %source, "Failed to encode outbound message");
            }
        }

        if event == Event::Closed
            && let Some(conn) = cx.registry.unregister(handle)
        {
            let session_secs = chrono::Utc::now()
                .signed_duration_since(conn.connected_at)
                .num_seconds();
            info!(
                %handle,
                id = %conn.id,
                session_secs,
                connections = cx.registry.count(),
                "Client disconnected"
            );
        }
    }
}
