//! Process signal handling.
//!
//! Listens for SIGINT and SIGTERM (Ctrl-C on other platforms) and sets the
//! shared [`ShutdownFlag`]. The event loop notices the flag on its next
//! iteration and the HTTP server starts its graceful shutdown.

use signalcast_server::ShutdownFlag;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Spawn a task that triggers `shutdown` on the first termination signal.
pub fn spawn_signal_handler(shutdown: ShutdownFlag) -> JoinHandle<()> {
    tokio::spawn(async move {
        wait_for_signal().await;
        shutdown.trigger();
    })
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    let (mut sigint, mut sigterm) =
        match (signal(SignalKind::interrupt()), signal(SignalKind::terminate())) {
            (Ok(sigint), Ok(sigterm)) => (sigint, sigterm),
            (Err(e), _) | (_, Err(e)) => {
                warn!(error = %e, "Failed to install Unix signal handlers, falling back to Ctrl-C");
                ctrl_c().await;
                return;
            }
        };

    tokio::select! {
        _ = sigint.recv() => {
            info!("SIGINT received - initiating graceful shutdown");
        }
        _ = sigterm.recv() => {
            info!("SIGTERM received - initiating graceful shutdown");
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    ctrl_c().await;
}

async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for Ctrl-C, signal shutdown disabled");
        std::future::pending::<()>().await;
    }
    info!("Ctrl-C received - initiating graceful shutdown");
}
