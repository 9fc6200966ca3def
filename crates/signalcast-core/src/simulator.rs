//! Two-axis traffic signal state machine.
//!
//! The simulator models a single perpendicular intersection. Each axis runs
//! the same fixed cycle:
//!
//! | current | next | next duration |
//! |---------|------|---------------|
//! | Green | Yellow | `yellow` |
//! | Yellow | Red | `red` |
//! | Red | Green | `green` |
//!
//! The east-west axis starts on red with `green + yellow` seconds left, so
//! it turns green exactly when the north-south axis turns red. Provided
//! `red >= green`, the two axes are never green at the same time. That
//! constraint is checked when the simulator is built; nothing is enforced
//! at runtime.

use serde::Deserialize;
use signalcast_types::{Axis, AxisTimer, SignalState, SimulatorState};
use tracing::debug;

/// Errors that can occur when building a simulator.
#[derive(Debug, thiserror::Error)]
pub enum SimulatorError {
    /// The configured durations cannot keep the axes mutually exclusive,
    /// or one of them is zero.
    #[error("invalid signal timings: {reason}")]
    InvalidTimings {
        /// Explanation of what is wrong with the timings.
        reason: String,
    },
}

/// Seconds each aspect is shown for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct SignalTimings {
    /// Green phase length.
    #[serde(default = "default_green")]
    pub green: u32,

    /// Yellow phase length.
    #[serde(default = "default_yellow")]
    pub yellow: u32,

    /// Red phase length. Must be at least `green`.
    #[serde(default = "default_red")]
    pub red: u32,
}

impl Default for SignalTimings {
    fn default() -> Self {
        Self {
            green: default_green(),
            yellow: default_yellow(),
            red: default_red(),
        }
    }
}

impl SignalTimings {
    /// Check that every duration is non-zero and that the cross-axis offset
    /// keeps the two greens apart.
    ///
    /// # Errors
    ///
    /// Returns [`SimulatorError::InvalidTimings`] describing the first
    /// violated constraint.
    pub fn validate(&self) -> Result<(), SimulatorError> {
        if self.green == 0 || self.yellow == 0 || self.red == 0 {
            return Err(SimulatorError::InvalidTimings {
                reason: format!(
                    "durations must be at least 1s (green={}, yellow={}, red={})",
                    self.green, self.yellow, self.red
                ),
            });
        }
        if self.red < self.green {
            return Err(SimulatorError::InvalidTimings {
                reason: format!(
                    "red ({}s) shorter than green ({}s) would let both axes show green",
                    self.red, self.green
                ),
            });
        }
        if self.green.checked_add(self.yellow).is_none() {
            return Err(SimulatorError::InvalidTimings {
                reason: "green + yellow overflows".to_owned(),
            });
        }
        Ok(())
    }

    /// Duration the given aspect is shown for.
    pub const fn duration(&self, state: SignalState) -> u32 {
        match state {
            SignalState::Green => self.green,
            SignalState::Yellow => self.yellow,
            SignalState::Red => self.red,
        }
    }
}

/// The intersection's signal state machine.
///
/// Owns the only mutable copy of [`SimulatorState`]. Callers advance it once
/// per tick and read it through [`SignalSimulator::snapshot`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalSimulator {
    /// Live state of both axes.
    state: SimulatorState,

    /// Phase lengths, validated at construction.
    timings: SignalTimings,

    /// Number of advances performed since construction.
    ticks: u64,
}

impl SignalSimulator {
    /// Create a simulator in its initial state: north-south green for
    /// `green` seconds, east-west red for `green + yellow` seconds.
    ///
    /// # Errors
    ///
    /// Returns [`SimulatorError::InvalidTimings`] if the timings fail
    /// [`SignalTimings::validate`].
    pub fn new(timings: SignalTimings) -> Result<Self, SimulatorError> {
        timings.validate()?;
        let ew_offset = timings.green.saturating_add(timings.yellow);
        Ok(Self {
            state: SimulatorState {
                ns: AxisTimer::new(SignalState::Green, timings.green),
                ew: AxisTimer::new(SignalState::Red, ew_offset),
            },
            timings,
            ticks: 0,
        })
    }

    /// Advance both axes by one second.
    ///
    /// Each axis's remaining time is decremented; an axis that reaches zero
    /// moves to its next aspect with that aspect's full duration. After this
    /// returns, no axis has zero seconds remaining.
    pub fn advance(&mut self) {
        self.state.ns = step(Axis::NorthSouth, self.state.ns, &self.timings);
        self.state.ew = step(Axis::EastWest, self.state.ew, &self.timings);
        self.ticks = self.ticks.saturating_add(1);
    }

    /// Return a copy of the current state.
    pub const fn snapshot(&self) -> SimulatorState {
        self.state
    }

    /// Number of advances performed so far.
    pub const fn ticks(&self) -> u64 {
        self.ticks
    }

    /// The timings this simulator was built with.
    pub const fn timings(&self) -> SignalTimings {
        self.timings
    }
}

/// One second of progress for a single axis.
fn step(axis: Axis, timer: AxisTimer, timings: &SignalTimings) -> AxisTimer {
    let remaining = timer.remaining.saturating_sub(1);
    if remaining > 0 {
        return AxisTimer::new(timer.state, remaining);
    }
    let next = timer.state.next();
    let duration = timings.duration(next);
    debug!(?axis, from = %timer.state, to = %next, duration, "Signal transition");
    AxisTimer::new(next, duration)
}

const fn default_green() -> u32 {
    30
}

const fn default_yellow() -> u32 {
    3
}

const fn default_red() -> u32 {
    30
}
