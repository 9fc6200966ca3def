//! Shared type definitions for the Signalcast push server.
//!
//! This crate is the single source of truth for the values that cross
//! crate boundaries: the signal state machine's values, connection
//! identifiers, and the JSON messages clients receive.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe wrappers for connection identifiers
//! - [`enums`] -- Signal states, axes, and protocol kinds
//! - [`structs`] -- Axis timers and the simulator snapshot
//! - [`wire`] -- Server-to-client messages

pub mod enums;
pub mod ids;
pub mod structs;
pub mod wire;

// Re-export all public types at crate root for convenience.
pub use enums::{Axis, ProtocolKind, SignalState};
pub use ids::{ConnectionHandle, ConnectionId};
pub use structs::{AxisTimer, SimulatorState};
pub use wire::{AxisReport, PONG_DATA, RECEIVED_DATA, ServerMessage};
