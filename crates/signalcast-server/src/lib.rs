//! Real-time push server for the signalcast intersection.
//!
//! This crate provides:
//!
//! - the [`EventLoop`], a single task that owns every connection and the
//!   signal simulator, services socket I/O, and fans out one traffic update
//!   per tick;
//! - the [`ConnectionRegistry`] of live connections and the
//!   [`ConnectionHandler`] that drives the echo and traffic protocols;
//! - the [`BroadcastEncoder`] that renders wire messages;
//! - the axum router serving the entry page and both `WebSocket` routes.
//!
//! # Architecture
//!
//! Socket tasks spawned by axum never touch shared state. They talk to the
//! event loop through a channel pair ([`transport::channel`]): an
//! [`Acceptor`] on the socket side, a [`ChannelTransport`] on the loop
//! side. Every registry and simulator mutation therefore happens on one
//! task, and the registry needs no lock.

pub mod encoder;
pub mod event_loop;
pub mod handler;
pub mod handlers;
pub mod registry;
pub mod router;
pub mod server;
pub mod shutdown;
pub mod state;
pub mod transport;
pub mod ws;

// Re-export primary types for convenience.
pub use encoder::BroadcastEncoder;
pub use event_loop::{EventLoop, LoopState, LoopSummary, StopReason};
pub use handler::ConnectionHandler;
pub use registry::ConnectionRegistry;
pub use router::build_router;
pub use server::{ServerError, bind, serve};
pub use shutdown::ShutdownFlag;
pub use state::AppState;
pub use transport::{Acceptor, ChannelTransport};
