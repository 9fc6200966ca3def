//! Signalcast server binary.
//!
//! Wires the configuration, the HTTP listener, and the event loop
//! together, then runs until SIGINT or SIGTERM.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `signalcast-config.yaml`
//! 2. Initialize structured logging (tracing)
//! 3. Create the signal simulator from the configured timings
//! 4. Bind the HTTP listener (fatal on failure)
//! 5. Create the transport channel and the shutdown flag
//! 6. Start the HTTP server and the signal handler
//! 7. Run the event loop until shutdown
//! 8. Wait for the HTTP server and log the result

mod error;
mod signals;

use std::sync::Arc;

use signalcast_core::clock::TickClock;
use signalcast_core::config::{LoggingConfig, SignalcastConfig};
use signalcast_core::simulator::SignalSimulator;
use signalcast_server::transport::channel;
use signalcast_server::{AppState, EventLoop, ShutdownFlag};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;

/// Application entry point.
///
/// # Errors
///
/// Returns an error if configuration is invalid, the listener cannot bind,
/// or the HTTP server fails.
#[tokio::main]
async fn main() -> Result<(), EngineError> {
    // 1. Load configuration.
    let config = SignalcastConfig::load_default()?;

    // 2. Initialize structured logging.
    init_logging(&config.logging);
    info!("signalcast-engine starting");
    info!(
        bind = config.server.bind_address(),
        service_timeout_ms = config.event_loop.service_timeout_ms,
        tick_policy = ?config.event_loop.tick_policy,
        push_on_connect = config.event_loop.push_on_connect,
        green = config.signals.green,
        yellow = config.signals.yellow,
        red = config.signals.red,
        "Configuration loaded"
    );

    // 3. Create the signal simulator.
    let simulator = SignalSimulator::new(config.signals)?;
    let initial = simulator.snapshot();
    info!(
        ns = %initial.ns.state,
        ns_timer = initial.ns.remaining,
        ew = %initial.ew.state,
        ew_timer = initial.ew.remaining,
        "Signal simulator initialized"
    );

    // 4. Bind the HTTP listener.
    let listener = signalcast_server::bind(&config.server).await?;

    // 5. Create the transport channel and the shutdown flag.
    let (acceptor, transport) = channel(
        config.server.event_queue_capacity,
        config.server.outbound_queue_capacity,
    );
    let shutdown = ShutdownFlag::new();

    // 6. Start the HTTP server and the signal handler.
    let server = tokio::spawn(signalcast_server::serve(
        listener,
        Arc::new(AppState::new(acceptor)),
        shutdown.clone(),
    ));
    signals::spawn_signal_handler(shutdown.clone());

    // 7. Run the event loop.
    let clock = TickClock::starting_now(
        config.event_loop.tick_policy,
        config.event_loop.max_catch_up_ticks,
    );
    let summary = EventLoop::new(
        transport,
        simulator,
        clock,
        &config.event_loop,
        shutdown.clone(),
    )
    .run()
    .await;

    // 8. Stop the HTTP server and log the result.
    shutdown.trigger();
    server.await.map_err(|e| EngineError::ServerTask {
        message: format!("{e}"),
    })??;

    info!(
        reason = ?summary.reason,
        total_ticks = summary.ticks,
        released_connections = summary.released_connections,
        "signalcast-engine shutdown complete"
    );

    Ok(())
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over the configured level.
fn init_logging(config: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    if config.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }
}
