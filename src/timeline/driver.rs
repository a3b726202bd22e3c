//! Live timeline driver.
//!
//! [`Driver::tick`] is the whole per-tick rule set; the session engine only
//! decides *when* to call it (every `tick_interval` while RUNNING).

use std::time::Duration;

use super::schedule::{EvidenceSet, MAX_PROGRESS, Schedule, clamp_progress};

/// Reference tick cadence.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(100);

/// Reference progress increment per tick (200 ticks per run).
pub const DEFAULT_STEP: f64 = 0.5;

/// What a single tick did to the run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickOutcome {
    /// Progress was committed and the run continues.
    Advanced {
        /// Committed progress
        progress: f64,
        /// Event index at the committed progress
        event_index: usize,
        /// Set when this tick crossed into a new event
        entered_event: Option<usize>,
    },
    /// The decision threshold was reached with no outcome recorded.
    /// Progress is held at the threshold and ticking must stop.
    PausedForDecision {
        /// Progress the run is held at
        progress: f64,
        /// Index of the decision event
        event_index: usize,
    },
    /// The run reached the end of the day.
    Completed {
        /// Index of the final event
        event_index: usize,
    },
}

/// Fixed-step progress driver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Driver {
    step: f64,
    interval: Duration,
}

impl Driver {
    /// Creates a driver advancing `step` percent every `interval`.
    #[must_use]
    pub const fn new(step: f64, interval: Duration) -> Self {
        Self { step, interval }
    }

    /// Progress increment per tick.
    #[must_use]
    pub const fn step(&self) -> f64 {
        self.step
    }

    /// Time between ticks.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Estimated wall-clock length of an uninterrupted run.
    #[must_use]
    pub fn run_duration(&self) -> Duration {
        if self.step <= 0.0 {
            return Duration::MAX;
        }
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let ticks = (MAX_PROGRESS / self.step).ceil().min(f64::from(u32::MAX)) as u32;
        self.interval.saturating_mul(ticks)
    }

    /// Applies one tick to `progress`.
    ///
    /// The decision check precedes the completion check, so a run with no
    /// recorded outcome can never step over the decision event, regardless
    /// of step size.
    #[must_use]
    pub fn tick(&self, schedule: &Schedule, progress: f64, decision_made: bool) -> TickOutcome {
        let previous = clamp_progress(progress);
        let candidate = clamp_progress(previous + self.step);
        let previous_index = schedule.event_index_at(previous);

        let threshold = schedule.decision_threshold();
        if !decision_made && candidate >= threshold {
            return TickOutcome::PausedForDecision {
                progress: threshold.max(previous),
                event_index: schedule.decision_index(),
            };
        }

        if candidate >= MAX_PROGRESS {
            return TickOutcome::Completed {
                event_index: schedule.len() - 1,
            };
        }

        let event_index = schedule.event_index_at(candidate);
        TickOutcome::Advanced {
            progress: candidate,
            event_index,
            entered_event: (event_index != previous_index).then_some(event_index),
        }
    }
}

impl Default for Driver {
    fn default() -> Self {
        Self::new(DEFAULT_STEP, DEFAULT_TICK_INTERVAL)
    }
}

/// Live evidence: the union of what was already revealed with what the
/// current position unlocks. Never shrinks during a run.
#[must_use]
pub fn accumulate_evidence(
    revealed: EvidenceSet,
    schedule: &Schedule,
    progress: f64,
) -> EvidenceSet {
    revealed.union(schedule.event_state_at(progress).evidence)
}
