//! Shared application state for the HTTP server.
//!
//! The server holds no signal or connection state of its own. Everything
//! lives in the event loop; socket tasks reach it only through the
//! [`Acceptor`] stored here.

use crate::transport::Acceptor;

/// State shared by every axum handler.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Entry point into the event loop for new sockets.
    pub acceptor: Acceptor,
}

impl AppState {
    /// Wrap the acceptor half of a transport channel.
    pub const fn new(acceptor: Acceptor) -> Self {
        Self { acceptor }
    }
}
