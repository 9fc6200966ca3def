//! HTTP server lifecycle.
//!
//! Binding is split from serving so a bind failure surfaces at startup,
//! before the event loop starts. [`serve`] runs until the shutdown flag is
//! triggered.

use std::sync::Arc;

use signalcast_core::config::ServerConfig;
use tokio::net::TcpListener;
use tracing::info;

use crate::router::build_router;
use crate::shutdown::ShutdownFlag;
use crate::state::AppState;

/// Errors that can occur when starting or running the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Failed to bind to the network address.
    #[error("bind error: {0}")]
    Bind(String),

    /// The server encountered a fatal error while serving.
    #[error("serve error: {0}")]
    Serve(String),
}

/// Bind the listener described by `config`.
///
/// # Errors
///
/// Returns [`ServerError::Bind`] if the address is unavailable or invalid.
pub async fn bind(config: &ServerConfig) -> Result<TcpListener, ServerError> {
    let addr = config.bind_address();
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| ServerError::Bind(format!("bind failed on {addr}: {e}")))?;
    Ok(listener)
}

/// Serve requests on `listener` until `shutdown` is triggered.
///
/// # Errors
///
/// Returns [`ServerError::Serve`] if the server hits a fatal I/O error.
pub async fn serve(
    listener: TcpListener,
    state: Arc<AppState>,
    shutdown: ShutdownFlag,
) -> Result<(), ServerError> {
    let addr = listener
        .local_addr()
        .map_err(|e| ServerError::Serve(format!("listener has no address: {e}")))?;
    info!(%addr, "Signalcast server listening");

    let router = build_router(state);
    axum::serve(listener, router)
        .with_graceful_shutdown(async move { shutdown.wait().await })
        .await
        .map_err(|e| ServerError::Serve(format!("serve error: {e}")))?;

    info!("HTTP server stopped");
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn binds_ephemeral_port() {
        let config = ServerConfig {
            host: "127.0.0.1".to_owned(),
            port: 0,
            ..ServerConfig::default()
        };
        let listener = bind(&config).await.unwrap();
        assert_ne!(listener.local_addr().unwrap().port(), 0);
    }

    #[tokio::test]
    async fn occupied_port_is_a_bind_error() {
        let config = ServerConfig {
            host: "127.0.0.1".to_owned(),
            port: 0,
            ..ServerConfig::default()
        };
        let first = bind(&config).await.unwrap();
        let taken = ServerConfig {
            port: first.local_addr().unwrap().port(),
            ..config
        };
        assert!(matches!(bind(&taken).await, Err(ServerError::Bind(_))));
    }

    #[tokio::test]
    async fn serve_returns_after_shutdown() {
        let config = ServerConfig {
            host: "127.0.0.1".to_owned(),
            port: 0,
            ..ServerConfig::default()
        };
        let listener = bind(&config).await.unwrap();
        let (acceptor, _transport) = crate::transport::channel(8, 8);
        let shutdown = ShutdownFlag::new();
        let task = tokio::spawn(serve(
            listener,
            Arc::new(AppState::new(acceptor)),
            shutdown.clone(),
        ));

        shutdown.trigger();
        let result = tokio::time::timeout(std::time::Duration::from_secs(5), task).await;
        assert!(matches!(result, Ok(Ok(Ok(())))));
    }
}
