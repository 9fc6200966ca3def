//! Signal simulation, wall-clock tick detection, and configuration for
//! the Signalcast push server.
//!
//! Nothing in this crate does I/O apart from reading the config file. The
//! event loop in `signalcast-server` drives these pieces once per
//! iteration.
//!
//! # Modules
//!
//! - [`clock`] -- [`TickClock`] detects wall-clock second boundaries and
//!   applies the [`TickPolicy`] for multi-second gaps.
//! - [`config`] -- Configuration loading from `signalcast-config.yaml` into
//!   strongly-typed structs.
//! - [`simulator`] -- [`SignalSimulator`], the two-axis traffic signal state
//!   machine.
//!
//! [`TickClock`]: clock::TickClock
//! [`TickPolicy`]: clock::TickPolicy
//! [`SignalSimulator`]: simulator::SignalSimulator

pub mod clock;
pub mod config;
pub mod simulator;
