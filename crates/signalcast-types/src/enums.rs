//! Enumeration types shared by the simulator, the wire format, and the
//! connection layer.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Signal states
// ---------------------------------------------------------------------------

/// The aspect shown by one traffic signal.
///
/// Serialized in lowercase (`red`, `green`, `yellow`) because that is the
/// spelling clients receive in the `color` field of a traffic update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalState {
    /// Stop.
    Red,
    /// Proceed.
    Green,
    /// Clear the intersection.
    Yellow,
}

impl SignalState {
    /// The state that follows this one in the fixed signal cycle.
    pub const fn next(self) -> Self {
        match self {
            Self::Green => Self::Yellow,
            Self::Yellow => Self::Red,
            Self::Red => Self::Green,
        }
    }

    /// Lowercase name as it appears on the wire.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Red => "red",
            Self::Green => "green",
            Self::Yellow => "yellow",
        }
    }
}

impl core::fmt::Display for SignalState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Axes
// ---------------------------------------------------------------------------

/// One of the two perpendicular traffic flows through the intersection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Axis {
    /// North-south flow.
    NorthSouth,
    /// East-west flow.
    EastWest,
}

// ---------------------------------------------------------------------------
// Protocols
// ---------------------------------------------------------------------------

/// Application protocol negotiated for a connection.
///
/// Selected by the WebSocket route the client connected on and fixed for
/// the lifetime of the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtocolKind {
    /// Receive-only clients that get a traffic update every tick.
    Traffic,
    /// Request/response clients: every message is acknowledged, `ping`
    /// is answered with a pong first.
    Echo,
}

impl ProtocolKind {
    /// Short name used in logs.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Traffic => "traffic",
            Self::Echo => "echo",
        }
    }
}
