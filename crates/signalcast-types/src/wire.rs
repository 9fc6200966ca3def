//! Server-to-client wire messages.
//!
//! Every outbound WebSocket text frame is exactly one [`ServerMessage`]
//! rendered as compact JSON. The `type` tag comes first, followed by the
//! variant's fields in declaration order:
//!
//! ```text
//! {"type":"received","data":"received"}
//! {"type":"pong","data":"Server pong"}
//! {"type":"traffic_update","ns":{"color":"green","timer":30},"ew":{"color":"red","timer":33}}
//! ```

use serde::{Deserialize, Serialize};

use crate::enums::SignalState;
use crate::structs::{AxisTimer, SimulatorState};

/// Payload of the acknowledgement message.
pub const RECEIVED_DATA: &str = "received";

/// Payload of the pong message.
pub const PONG_DATA: &str = "Server pong";

/// One axis as rendered in a traffic update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AxisReport {
    /// Current aspect.
    pub color: SignalState,
    /// Seconds until the next transition.
    pub timer: u32,
}

impl From<AxisTimer> for AxisReport {
    fn from(timer: AxisTimer) -> Self {
        Self {
            color: timer.state,
            timer: timer.remaining,
        }
    }
}

/// A message pushed from the server to a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Acknowledges one inbound client message.
    Received {
        /// Always [`RECEIVED_DATA`].
        data: String,
    },
    /// Answer to an inbound `ping`.
    Pong {
        /// Always [`PONG_DATA`].
        data: String,
    },
    /// Signal state after a tick.
    TrafficUpdate {
        /// North-south axis.
        ns: AxisReport,
        /// East-west axis.
        ew: AxisReport,
    },
}

impl ServerMessage {
    /// The acknowledgement sent for every inbound echo message.
    pub fn received() -> Self {
        Self::Received {
            data: RECEIVED_DATA.to_owned(),
        }
    }

    /// The reply to a `ping`.
    pub fn pong() -> Self {
        Self::Pong {
            data: PONG_DATA.to_owned(),
        }
    }

    /// A traffic update for the given simulator snapshot.
    pub fn traffic_update(state: &SimulatorState) -> Self {
        Self::TrafficUpdate {
            ns: state.ns.into(),
            ew: state.ew.into(),
        }
    }
}
