//! Configuration loading and typed config structures for Signalcast.
//!
//! The configuration lives in `signalcast-config.yaml` in the working
//! directory. Every section and field is optional; missing values fall back
//! to the defaults below. The loader parses, applies environment overrides,
//! and validates in one step so callers never see an inconsistent config.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::clock::TickPolicy;
use crate::simulator::{SignalTimings, SimulatorError};

/// Default file name looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "signalcast-config.yaml";

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// Signal timings cannot keep the axes exclusive.
    #[error("signal config: {source}")]
    Timings {
        /// The underlying validation error.
        #[from]
        source: SimulatorError,
    },

    /// A value is out of range or an override could not be parsed.
    #[error("invalid configuration: {reason}")]
    Invalid {
        /// Explanation of what is wrong.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SignalcastConfig {
    /// Listener and transport settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Event loop timing.
    #[serde(default)]
    pub event_loop: LoopConfig,

    /// Signal phase lengths.
    #[serde(default)]
    pub signals: SignalTimings,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl SignalcastConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Environment variables override YAML values for the listener:
    /// - `SIGNALCAST_HOST` overrides `server.host`
    /// - `SIGNALCAST_PORT` overrides `server.port`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, and
    /// [`ConfigError::Invalid`] or [`ConfigError::Timings`] if validation
    /// fails.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config = Self::parse_unchecked(&contents)?;
        config.server.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate configuration from a YAML string.
    ///
    /// No environment overrides are applied.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML, or a
    /// validation error.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let config = Self::parse_unchecked(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load `signalcast-config.yaml` from the working directory, or the
    /// defaults (plus environment overrides) when the file is absent.
    ///
    /// # Errors
    ///
    /// Same as [`SignalcastConfig::from_file`].
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = Path::new(CONFIG_FILE_NAME);
        if path.exists() {
            return Self::from_file(path);
        }
        let mut config = Self::default();
        config.server.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns the first violated constraint.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.signals.validate()?;
        if self.server.outbound_queue_capacity == 0 {
            return Err(ConfigError::Invalid {
                reason: "server.outbound_queue_capacity must be at least 1".to_owned(),
            });
        }
        if self.server.event_queue_capacity == 0 {
            return Err(ConfigError::Invalid {
                reason: "server.event_queue_capacity must be at least 1".to_owned(),
            });
        }
        // The tick check runs between service calls, so the wait must stay
        // well under one second.
        if self.event_loop.service_timeout_ms == 0 || self.event_loop.service_timeout_ms >= 1000 {
            return Err(ConfigError::Invalid {
                reason: format!(
                    "event_loop.service_timeout_ms must be in 1..1000, got {}",
                    self.event_loop.service_timeout_ms
                ),
            });
        }
        Ok(())
    }

    fn parse_unchecked(yaml: &str) -> Result<Self, ConfigError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yml::from_str(yaml)?)
    }
}

/// Listener and transport settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerConfig {
    /// The host address to bind to (e.g. `0.0.0.0`).
    #[serde(default = "default_host")]
    pub host: String,

    /// The TCP port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Frames that may queue for one client before a write counts as failed.
    #[serde(default = "default_outbound_queue_capacity")]
    pub outbound_queue_capacity: usize,

    /// Socket events that may queue for the event loop before socket tasks
    /// wait.
    #[serde(default = "default_event_queue_capacity")]
    pub event_queue_capacity: usize,
}

impl ServerConfig {
    /// Override listener settings with environment variables when set.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if `SIGNALCAST_PORT` is not a port
    /// number.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(
            std::env::var("SIGNALCAST_HOST").ok(),
            std::env::var("SIGNALCAST_PORT").ok(),
        )
    }

    /// Apply raw override values. `None` leaves the field unchanged; the
    /// config is untouched if `port` does not parse.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if `port` is not a port number.
    pub fn apply_overrides(
        &mut self,
        host: Option<String>,
        port: Option<String>,
    ) -> Result<(), ConfigError> {
        let port = port
            .map(|val| {
                val.parse::<u16>().map_err(|e| ConfigError::Invalid {
                    reason: format!("invalid SIGNALCAST_PORT {val:?}: {e}"),
                })
            })
            .transpose()?;
        if let Some(host) = host {
            self.host = host;
        }
        if let Some(port) = port {
            self.port = port;
        }
        Ok(())
    }

    /// `host:port` string for binding.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            outbound_queue_capacity: default_outbound_queue_capacity(),
            event_queue_capacity: default_event_queue_capacity(),
        }
    }
}

/// Event loop timing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoopConfig {
    /// Longest time one transport service call may wait for I/O.
    #[serde(default = "default_service_timeout_ms")]
    pub service_timeout_ms: u64,

    /// Push the current state to traffic clients as soon as they connect
    /// instead of waiting for the next tick.
    #[serde(default)]
    pub push_on_connect: bool,

    /// How to treat several elapsed seconds between two polls.
    #[serde(default)]
    pub tick_policy: TickPolicy,

    /// Cap on ticks run in one iteration under the catch-up policy.
    #[serde(default = "default_max_catch_up_ticks")]
    pub max_catch_up_ticks: u32,
}

impl LoopConfig {
    /// The service wait as a [`Duration`].
    pub const fn service_timeout(&self) -> Duration {
        Duration::from_millis(self.service_timeout_ms)
    }
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            service_timeout_ms: default_service_timeout_ms(),
            push_on_connect: false,
            tick_policy: TickPolicy::default(),
            max_catch_up_ticks: default_max_catch_up_ticks(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_owned()
}

const fn default_port() -> u16 {
    8080
}

const fn default_outbound_queue_capacity() -> usize {
    32
}

const fn default_event_queue_capacity() -> usize {
    1024
}

const fn default_service_timeout_ms() -> u64 {
    50
}

const fn default_max_catch_up_ticks() -> u32 {
    5
}

fn default_log_level() -> String {
    "info".to_owned()
}
