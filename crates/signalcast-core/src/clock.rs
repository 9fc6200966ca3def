//! Wall-clock tick detection.
//!
//! The event loop wakes up every few tens of milliseconds and asks the
//! [`TickClock`] how many simulated seconds to run. The clock compares the
//! current Unix second to the last one it ticked on. How elapsed seconds
//! beyond the first are treated is a [`TickPolicy`] choice:
//!
//! - [`TickPolicy::Coarse`] runs one tick per detected boundary no matter
//!   how many seconds passed. A stalled loop drifts behind wall time.
//! - [`TickPolicy::CatchUp`] runs one tick per elapsed second, capped so a
//!   long stall cannot trigger an unbounded burst.
//!
//! A wall clock that steps backwards is followed rather than waited out.

use chrono::Utc;
use serde::Deserialize;
use tracing::warn;

/// How to treat more than one elapsed second between two polls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TickPolicy {
    /// At most one tick per detected boundary.
    #[default]
    Coarse,
    /// One tick per elapsed second, up to the configured cap.
    CatchUp,
}

/// Detects wall-clock second boundaries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickClock {
    /// The Unix second the clock last ticked on.
    last_second: i64,

    /// Policy for multi-second gaps.
    policy: TickPolicy,

    /// Upper bound on ticks returned by one poll under [`TickPolicy::CatchUp`].
    max_catch_up: u32,
}

impl TickClock {
    /// Create a clock that considers `start_second` already ticked.
    ///
    /// `max_catch_up` is clamped to at least 1.
    pub fn new(start_second: i64, policy: TickPolicy, max_catch_up: u32) -> Self {
        Self {
            last_second: start_second,
            policy,
            max_catch_up: max_catch_up.max(1),
        }
    }

    /// Create a clock starting at the current wall-clock second.
    pub fn starting_now(policy: TickPolicy, max_catch_up: u32) -> Self {
        Self::new(wall_clock_second(), policy, max_catch_up)
    }

    /// Return how many ticks to run for the wall-clock second `now`.
    ///
    /// Returns 0 when `now` is not past the last ticked second. A clock
    /// that stepped backwards is followed to `now`, so ticking resumes at
    /// the next second instead of waiting out the step. Otherwise records
    /// `now` as ticked.
    pub fn poll(&mut self, now: i64) -> u32 {
        let elapsed = now.saturating_sub(self.last_second);
        if elapsed < 0 {
            warn!(
                last_second = self.last_second,
                now,
                "Wall clock stepped backwards, resynchronizing"
            );
            self.last_second = now;
            return 0;
        }
        if elapsed == 0 {
            return 0;
        }
        self.last_second = now;
        match self.policy {
            TickPolicy::Coarse => 1,
            TickPolicy::CatchUp => {
                u32::try_from(elapsed).map_or(self.max_catch_up, |n| n.min(self.max_catch_up))
            }
        }
    }

    /// The last second this clock ticked on.
    pub const fn last_second(&self) -> i64 {
        self.last_second
    }

    /// The configured policy.
    pub const fn policy(&self) -> TickPolicy {
        self.policy
    }
}

/// Current Unix time in whole seconds.
pub fn wall_clock_second() -> i64 {
    Utc::now().timestamp()
}
