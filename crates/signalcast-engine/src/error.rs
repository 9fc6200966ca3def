//! Error types for the engine binary.
//!
//! [`EngineError`] is the top-level error type that wraps all possible
//! failure modes during startup and shutdown.

/// Top-level error for the engine binary.
///
/// Each variant wraps a specific subsystem error, providing a single
/// error type that `main` can propagate with `?`.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: signalcast_core::config::ConfigError,
    },

    /// The signal simulator rejected its timings.
    #[error("simulator error: {source}")]
    Simulator {
        /// The underlying simulator error.
        #[from]
        source: signalcast_core::simulator::SimulatorError,
    },

    /// The HTTP server failed to bind or serve.
    #[error("server error: {source}")]
    Server {
        /// The underlying server error.
        #[from]
        source: signalcast_server::ServerError,
    },

    /// The HTTP server task panicked or was cancelled.
    #[error("server task failed: {message}")]
    ServerTask {
        /// Description of the task failure.
        message: String,
    },
}
