//! Replay scrubber.
//!
//! Every replay control resolves to a target progress; the derived state at
//! that target comes straight from [`Schedule::event_state_at`].

use serde::{Deserialize, Serialize};

use super::schedule::{EventState, MAX_PROGRESS, Schedule, clamp_progress};

/// Auto-advance speed multipliers offered during replay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackSpeed {
    /// 0.5×
    Half,
    /// 1×
    #[default]
    Normal,
    /// 2×
    Double,
    /// 4×
    Quadruple,
}

impl PlaybackSpeed {
    /// All speeds in ascending order.
    pub const ALL: [Self; 4] = [Self::Half, Self::Normal, Self::Double, Self::Quadruple];

    /// Numeric multiplier applied to the driver step.
    #[must_use]
    pub const fn multiplier(self) -> f64 {
        match self {
            Self::Half => 0.5,
            Self::Normal => 1.0,
            Self::Double => 2.0,
            Self::Quadruple => 4.0,
        }
    }

    /// Parses a multiplier value (`0.5`, `1`, `2`, `4`).
    #[must_use]
    pub fn from_multiplier(value: f64) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|s| (s.multiplier() - value).abs() < f64::EPSILON)
    }
}

impl std::fmt::Display for PlaybackSpeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x", self.multiplier())
    }
}

/// A resolved scrub position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrubPosition {
    /// Clamped target progress
    pub progress: f64,
    /// Derived event state at `progress`
    pub state: EventState,
}

/// Random-access navigation over a schedule.
#[derive(Debug, Clone, Copy)]
pub struct Scrubber<'a> {
    schedule: &'a Schedule,
}

impl<'a> Scrubber<'a> {
    /// Creates a scrubber over `schedule`.
    #[must_use]
    pub const fn new(schedule: &'a Schedule) -> Self {
        Self { schedule }
    }

    /// Resolves an arbitrary target. Out-of-range values are clamped.
    #[must_use]
    pub fn seek(&self, target: f64) -> ScrubPosition {
        let progress = clamp_progress(target);
        ScrubPosition {
            progress,
            state: self.schedule.event_state_at(progress),
        }
    }

    /// Target for "jump to next event"; stays at 100 at the end.
    #[must_use]
    pub fn next_event(&self, progress: f64) -> f64 {
        self.schedule
            .next_threshold_after(progress)
            .unwrap_or(MAX_PROGRESS)
    }

    /// Target for "jump to previous event"; stays at 0 at the start.
    #[must_use]
    pub fn previous_event(&self, progress: f64) -> f64 {
        self.schedule
            .previous_threshold_before(progress)
            .unwrap_or(0.0)
    }

    /// Target for one auto-advance step at `speed`.
    #[must_use]
    pub fn playback_step(&self, progress: f64, step: f64, speed: PlaybackSpeed) -> f64 {
        clamp_progress(progress + step * speed.multiplier())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::schedule::EvidenceSet;

    #[test]
    fn test_seek_recomputes_evidence() {
        let schedule = Schedule::standard();
        let scrubber = Scrubber::new(&schedule);

        let at_90 = scrubber.seek(90.0);
        // 90 is past the first evidence threshold (87.5) but short of 93.
        assert_eq!(at_90.state.evidence, [0].into_iter().collect::<EvidenceSet>());
        assert_eq!(at_90.state.event_index, 8);

        let at_40 = scrubber.seek(40.0);
        assert!(at_40.state.evidence.is_empty());
        assert_eq!(at_40.state.event_index, 3);
    }

    #[test]
    fn test_seek_is_order_independent() {
        let schedule = Schedule::standard();
        let scrubber = Scrubber::new(&schedule);
        let first = scrubber.seek(95.0);
        let _ = scrubber.seek(50.0);
        let again = scrubber.seek(95.0);
        assert_eq!(first, again);
    }

    #[test]
    fn test_seek_clamps() {
        let schedule = Schedule::standard();
        let scrubber = Scrubber::new(&schedule);
        assert!((scrubber.seek(140.0).progress - 100.0).abs() < f64::EPSILON);
        assert!(scrubber.seek(-3.0).progress.abs() < f64::EPSILON);
        assert_eq!(scrubber.seek(140.0).state.evidence, EvidenceSet::all());
    }

    #[test]
    fn test_step_navigation() {
        let schedule = Schedule::standard();
        let scrubber = Scrubber::new(&schedule);
        assert!((scrubber.next_event(50.0) - 62.5).abs() < f64::EPSILON);
        assert!((scrubber.next_event(100.0) - 100.0).abs() < f64::EPSILON);
        assert!((scrubber.previous_event(50.0) - 37.5).abs() < f64::EPSILON);
        assert!(scrubber.previous_event(0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_playback_step_uses_multiplier() {
        let schedule = Schedule::standard();
        let scrubber = Scrubber::new(&schedule);
        let target = scrubber.playback_step(10.0, 0.5, PlaybackSpeed::Quadruple);
        assert!((target - 12.0).abs() < f64::EPSILON);
        let capped = scrubber.playback_step(99.5, 0.5, PlaybackSpeed::Quadruple);
        assert!((capped - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_speed_parsing_and_display() {
        assert_eq!(PlaybackSpeed::from_multiplier(2.0), Some(PlaybackSpeed::Double));
        assert_eq!(PlaybackSpeed::from_multiplier(3.0), None);
        assert_eq!(PlaybackSpeed::Half.to_string(), "0.5x");
        assert_eq!(PlaybackSpeed::default(), PlaybackSpeed::Normal);
    }
}
