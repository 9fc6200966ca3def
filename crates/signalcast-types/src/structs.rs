//! Simulation value types.
//!
//! These are plain `Copy` values: the simulator owns the live instances and
//! hands out copies, so nothing outside the simulator can mutate them.

use serde::{Deserialize, Serialize};

use crate::enums::{Axis, SignalState};

/// The signal on one axis and the whole seconds left before it changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AxisTimer {
    /// Current aspect.
    pub state: SignalState,
    /// Seconds until the next transition.
    pub remaining: u32,
}

impl AxisTimer {
    /// Create a timer showing `state` for `remaining` seconds.
    pub const fn new(state: SignalState, remaining: u32) -> Self {
        Self { state, remaining }
    }
}

/// Complete signal state of the intersection at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SimulatorState {
    /// North-south axis.
    pub ns: AxisTimer,
    /// East-west axis.
    pub ew: AxisTimer,
}

impl SimulatorState {
    /// Return the timer for the given axis.
    pub const fn axis(&self, axis: Axis) -> AxisTimer {
        match axis {
            Axis::NorthSouth => self.ns,
            Axis::EastWest => self.ew,
        }
    }

    /// Whether both axes show green at once.
    ///
    /// This must never be true for any state the simulator produces.
    pub const fn is_conflicting(&self) -> bool {
        matches!(
            (self.ns.state, self.ew.state),
            (SignalState::Green, SignalState::Green)
        )
    }
}
