//! Event schedule and the pure progress → event-state mapping.
//!
//! Both the live driver and the replay scrubber derive the current event
//! index and unlocked evidence through [`Schedule::event_state_at`]; the
//! driver only layers a monotonic union on top of it.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use crate::error::SessionError;

/// Upper bound of the progress axis.
pub const MAX_PROGRESS: f64 = 100.0;

/// Progress thresholds that unlock evidence items 0, 1 and 2.
pub const EVIDENCE_THRESHOLDS: [f64; EVIDENCE_COUNT] = [87.5, 93.0, 100.0];

/// Number of evidence items a run can unlock.
pub const EVIDENCE_COUNT: usize = 3;

/// One checkpoint of the simulated business day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineEvent {
    /// Wall-clock label shown for the checkpoint (e.g. `"15:30"`).
    pub time: Cow<'static, str>,
    /// Progress percentage at which the checkpoint is reached.
    pub progress_threshold: f64,
    /// Whether the run must pause here for a user decision.
    #[serde(default)]
    pub is_decision_point: bool,
}

impl TimelineEvent {
    const fn fixed(time: &'static str, progress_threshold: f64, is_decision_point: bool) -> Self {
        Self {
            time: Cow::Borrowed(time),
            progress_threshold,
            is_decision_point,
        }
    }
}

/// 09:00 to 17:00, with the approval decision at 15:30.
const STANDARD_EVENTS: &[TimelineEvent] = &[
    TimelineEvent::fixed("09:00", 0.0, false),
    TimelineEvent::fixed("10:00", 12.5, false),
    TimelineEvent::fixed("11:00", 25.0, false),
    TimelineEvent::fixed("12:00", 37.5, false),
    TimelineEvent::fixed("13:00", 50.0, false),
    TimelineEvent::fixed("14:00", 62.5, false),
    TimelineEvent::fixed("15:00", 75.0, false),
    TimelineEvent::fixed("15:30", 81.25, true),
    TimelineEvent::fixed("16:00", 87.5, false),
    TimelineEvent::fixed("16:30", 93.75, false),
    TimelineEvent::fixed("17:00", 100.0, false),
];

// ============================================================================
// Evidence set
// ============================================================================

/// Set of unlocked evidence items, a subset of `{0, 1, 2}`.
///
/// Serialized as a sorted array of indices.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct EvidenceSet(u8);

impl EvidenceSet {
    const MASK: u8 = (1 << EVIDENCE_COUNT) - 1;

    /// The empty set.
    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    /// All evidence items.
    #[must_use]
    pub const fn all() -> Self {
        Self(Self::MASK)
    }

    /// Adds an item. Indices outside `0..EVIDENCE_COUNT` are ignored.
    pub const fn insert(&mut self, index: usize) {
        if index < EVIDENCE_COUNT {
            self.0 |= 1 << index;
        }
    }

    /// Returns whether the item is unlocked.
    #[must_use]
    pub const fn contains(self, index: usize) -> bool {
        index < EVIDENCE_COUNT && self.0 & (1 << index) != 0
    }

    /// Returns the union of both sets.
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Returns `true` if every item of `self` is also in `other`.
    #[must_use]
    pub const fn is_subset(self, other: Self) -> bool {
        self.0 & !other.0 == 0
    }

    /// Number of unlocked items.
    #[must_use]
    pub const fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    /// Returns `true` if nothing is unlocked.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Iterates unlocked indices in ascending order.
    pub fn iter(self) -> impl Iterator<Item = usize> {
        (0..EVIDENCE_COUNT).filter(move |&i| self.contains(i))
    }
}

impl FromIterator<usize> for EvidenceSet {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        let mut set = Self::empty();
        for index in iter {
            set.insert(index);
        }
        set
    }
}

impl Serialize for EvidenceSet {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}

impl<'de> Deserialize<'de> for EvidenceSet {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let indices = Vec::<usize>::deserialize(deserializer)?;
        if let Some(bad) = indices.iter().find(|&&i| i >= EVIDENCE_COUNT) {
            return Err(serde::de::Error::custom(format!(
                "evidence index {bad} out of range"
            )));
        }
        Ok(indices.into_iter().collect())
    }
}

impl std::fmt::Display for EvidenceSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let items: Vec<String> = self.iter().map(|i| i.to_string()).collect();
        write!(f, "{{{}}}", items.join(","))
    }
}

/// Evidence unlocked at `progress`, recomputed from scratch.
#[must_use]
pub fn evidence_at(progress: f64) -> EvidenceSet {
    EVIDENCE_THRESHOLDS
        .iter()
        .enumerate()
        .filter(|&(_, &threshold)| progress >= threshold)
        .map(|(i, _)| i)
        .collect()
}

/// Clamps an arbitrary value onto the progress axis. `NaN` maps to 0.
#[must_use]
pub fn clamp_progress(progress: f64) -> f64 {
    if progress.is_nan() {
        0.0
    } else {
        progress.clamp(0.0, MAX_PROGRESS)
    }
}

// ============================================================================
// Schedule
// ============================================================================

/// Derived state at one point of the progress axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventState {
    /// Index of the last event whose threshold is at or below the position.
    pub event_index: usize,
    /// Evidence unlocked at the position.
    pub evidence: EvidenceSet,
}

/// Validated, ordered event schedule.
#[derive(Debug, Clone, PartialEq)]
pub struct Schedule {
    events: Cow<'static, [TimelineEvent]>,
    decision_index: usize,
}

impl Schedule {
    /// The built-in 8-hour business day.
    #[must_use]
    pub fn standard() -> Self {
        Self {
            events: Cow::Borrowed(STANDARD_EVENTS),
            decision_index: 7,
        }
    }

    /// Builds a schedule from caller-supplied events.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidSchedule` if the list is empty, does not
    /// start at 0, is not strictly ascending, leaves `[0, 100]`, or does not
    /// contain exactly one decision point strictly inside `(0, 100)`.
    pub fn new(events: Vec<TimelineEvent>) -> Result<Self, SessionError> {
        let first = events
            .first()
            .ok_or_else(|| SessionError::InvalidSchedule("schedule is empty".to_string()))?;
        if first.progress_threshold != 0.0 {
            return Err(SessionError::InvalidSchedule(format!(
                "first event '{}' must start at 0",
                first.time
            )));
        }

        for pair in events.windows(2) {
            if pair[1].progress_threshold <= pair[0].progress_threshold {
                return Err(SessionError::InvalidSchedule(format!(
                    "event '{}' is not after '{}'",
                    pair[1].time, pair[0].time
                )));
            }
        }

        if let Some(out) = events
            .iter()
            .find(|e| !(0.0..=MAX_PROGRESS).contains(&e.progress_threshold))
        {
            return Err(SessionError::InvalidSchedule(format!(
                "event '{}' threshold {} outside [0, 100]",
                out.time, out.progress_threshold
            )));
        }

        let decisions: Vec<usize> = events
            .iter()
            .enumerate()
            .filter(|(_, e)| e.is_decision_point)
            .map(|(i, _)| i)
            .collect();
        let [decision_index] = decisions[..] else {
            return Err(SessionError::InvalidSchedule(format!(
                "expected exactly one decision point, found {}",
                decisions.len()
            )));
        };
        let threshold = events[decision_index].progress_threshold;
        if threshold <= 0.0 || threshold >= MAX_PROGRESS {
            return Err(SessionError::InvalidSchedule(format!(
                "decision point at {threshold} must lie strictly between 0 and 100"
            )));
        }

        Ok(Self {
            events: Cow::Owned(events),
            decision_index,
        })
    }

    /// All events in ascending order.
    #[must_use]
    pub fn events(&self) -> &[TimelineEvent] {
        &self.events
    }

    /// Number of events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Always `false`: validated schedules hold at least one event.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Returns the event at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&TimelineEvent> {
        self.events.get(index)
    }

    /// Index of the decision event.
    #[must_use]
    pub const fn decision_index(&self) -> usize {
        self.decision_index
    }

    /// Progress at which the run pauses for the decision.
    #[must_use]
    pub fn decision_threshold(&self) -> f64 {
        self.events[self.decision_index].progress_threshold
    }

    /// Last event index whose threshold is `<= progress`.
    #[must_use]
    pub fn event_index_at(&self, progress: f64) -> usize {
        let progress = clamp_progress(progress);
        self.events
            .partition_point(|e| e.progress_threshold <= progress)
            .saturating_sub(1)
    }

    /// Event index and evidence at `progress`. Pure: no hidden accumulation.
    #[must_use]
    pub fn event_state_at(&self, progress: f64) -> EventState {
        let progress = clamp_progress(progress);
        EventState {
            event_index: self.event_index_at(progress),
            evidence: evidence_at(progress),
        }
    }

    /// Threshold of the first event strictly after `progress`, if any.
    #[must_use]
    pub fn next_threshold_after(&self, progress: f64) -> Option<f64> {
        let progress = clamp_progress(progress);
        self.events
            .iter()
            .map(|e| e.progress_threshold)
            .find(|&t| t > progress)
    }

    /// Threshold of the last event strictly before `progress`, if any.
    #[must_use]
    pub fn previous_threshold_before(&self, progress: f64) -> Option<f64> {
        let progress = clamp_progress(progress);
        self.events
            .iter()
            .rev()
            .map(|e| e.progress_threshold)
            .find(|&t| t < progress)
    }
}

impl Default for Schedule {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(time: &str, threshold: f64, decision: bool) -> TimelineEvent {
        TimelineEvent {
            time: Cow::Owned(time.to_string()),
            progress_threshold: threshold,
            is_decision_point: decision,
        }
    }

    #[test]
    fn test_standard_schedule_is_valid() {
        let standard = Schedule::standard();
        let rebuilt = Schedule::new(standard.events().to_vec()).unwrap();
        assert_eq!(rebuilt.decision_index(), standard.decision_index());
        assert!((standard.decision_threshold() - 81.25).abs() < f64::EPSILON);
        assert_eq!(standard.len(), 11);
    }

    #[test]
    fn test_event_index_boundaries() {
        let s = Schedule::standard();
        assert_eq!(s.event_index_at(0.0), 0);
        assert_eq!(s.event_index_at(12.49), 0);
        assert_eq!(s.event_index_at(12.5), 1);
        assert_eq!(s.event_index_at(81.0), 6);
        assert_eq!(s.event_index_at(81.25), 7);
        assert_eq!(s.event_index_at(99.9), 9);
        assert_eq!(s.event_index_at(100.0), 10);
    }

    #[test]
    fn test_evidence_subset() {
        let first: EvidenceSet = [0].into_iter().collect();
        let both: EvidenceSet = [0, 1].into_iter().collect();
        assert!(first.is_subset(both));
        assert!(!both.is_subset(first));
        assert!(EvidenceSet::empty().is_subset(first));
    }

    #[test]
    fn test_event_index_clamps_out_of_range() {
        let s = Schedule::standard();
        assert_eq!(s.event_index_at(-5.0), 0);
        assert_eq!(s.event_index_at(250.0), 10);
        assert_eq!(s.event_index_at(f64::NAN), 0);
    }

    #[test]
    fn test_evidence_step_function() {
        assert_eq!(evidence_at(0.0), EvidenceSet::empty());
        assert_eq!(evidence_at(87.49), EvidenceSet::empty());
        assert_eq!(evidence_at(87.5), [0].into_iter().collect());
        assert_eq!(evidence_at(90.0), [0].into_iter().collect());
        assert_eq!(evidence_at(93.0), [0, 1].into_iter().collect());
        assert_eq!(evidence_at(99.99), [0, 1].into_iter().collect());
        assert_eq!(evidence_at(100.0), EvidenceSet::all());
    }

    #[test]
    fn test_evidence_set_operations() {
        let mut set = EvidenceSet::empty();
        assert!(set.is_empty());
        set.insert(1);
        set.insert(7);
        assert_eq!(set.len(), 1);
        assert!(set.contains(1));
        assert!(!set.contains(7));
        let merged = set.union([2].into_iter().collect());
        assert_eq!(merged.iter().collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(merged.to_string(), "{1,2}");
    }

    #[test]
    fn test_evidence_set_serde() {
        let set: EvidenceSet = [0, 2].into_iter().collect();
        let json = serde_json::to_string(&set).unwrap();
        assert_eq!(json, "[0,2]");
        let back: EvidenceSet = serde_json::from_str(&json).unwrap();
        assert_eq!(back, set);
        assert!(serde_json::from_str::<EvidenceSet>("[3]").is_err());
    }

    #[test]
    fn test_step_targets() {
        let s = Schedule::standard();
        assert_eq!(s.next_threshold_after(0.0), Some(12.5));
        assert_eq!(s.next_threshold_after(81.0), Some(81.25));
        assert_eq!(s.next_threshold_after(100.0), None);
        assert_eq!(s.previous_threshold_before(12.5), Some(0.0));
        assert_eq!(s.previous_threshold_before(90.0), Some(87.5));
        assert_eq!(s.previous_threshold_before(0.0), None);
    }

    #[test]
    fn test_rejects_empty_schedule() {
        assert!(matches!(
            Schedule::new(vec![]),
            Err(SessionError::InvalidSchedule(_))
        ));
    }

    #[test]
    fn test_rejects_unordered_schedule() {
        let events = vec![
            event("09:00", 0.0, false),
            event("12:00", 50.0, true),
            event("11:00", 40.0, false),
        ];
        assert!(Schedule::new(events).is_err());
    }

    #[test]
    fn test_rejects_missing_or_duplicate_decision() {
        let none = vec![event("09:00", 0.0, false), event("17:00", 100.0, false)];
        assert!(Schedule::new(none).is_err());

        let two = vec![
            event("09:00", 0.0, false),
            event("12:00", 50.0, true),
            event("14:00", 75.0, true),
        ];
        assert!(Schedule::new(two).is_err());
    }

    #[test]
    fn test_rejects_decision_at_edges() {
        let at_end = vec![event("09:00", 0.0, false), event("17:00", 100.0, true)];
        assert!(Schedule::new(at_end).is_err());
    }

    #[test]
    fn test_timeline_event_camel_case() {
        let json = serde_json::to_value(&STANDARD_EVENTS[7]).unwrap();
        assert_eq!(json["time"], "15:30");
        assert_eq!(json["progressThreshold"], 81.25);
        assert_eq!(json["isDecisionPoint"], true);
    }
}
