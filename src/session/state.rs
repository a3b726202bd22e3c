//! Demo session state.
//!
//! [`DemoSession`] is the single context object every consumer reads; it is
//! only mutated through [`SessionMachine::dispatch`](super::SessionMachine::dispatch).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::artifacts::{BusinessArtifacts, DemoMode};
use crate::timeline::{EvidenceSet, MAX_PROGRESS, PlaybackSpeed, Schedule, evidence_at};

/// Minimum prompt length (Unicode scalar values, trimmed) to leave EMPTY.
pub const MIN_PROMPT_CHARS: usize = 10;

/// Top-level phase of a demo session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    /// Nothing (or too little) typed yet.
    #[default]
    Empty,
    /// A launchable prompt is present.
    Typed,
    /// Waiting for the artifact generator.
    Launching,
    /// Artifacts generated; the test day can start.
    Artifacts,
    /// The timeline driver is ticking.
    Running,
    /// Paused on the decision point.
    Decision,
    /// Decision committed; about to resume.
    Decided,
    /// Run finished; evidence on display.
    Evidence,
    /// Completed run available for scrubbing.
    Replay,
}

impl Phase {
    /// Every phase in lifecycle order.
    pub const ALL: [Self; 9] = [
        Self::Empty,
        Self::Typed,
        Self::Launching,
        Self::Artifacts,
        Self::Running,
        Self::Decision,
        Self::Decided,
        Self::Evidence,
        Self::Replay,
    ];

    /// Upper-case name, matching the serialized form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Empty => "EMPTY",
            Self::Typed => "TYPED",
            Self::Launching => "LAUNCHING",
            Self::Artifacts => "ARTIFACTS",
            Self::Running => "RUNNING",
            Self::Decision => "DECISION",
            Self::Decided => "DECIDED",
            Self::Evidence => "EVIDENCE",
            Self::Replay => "REPLAY",
        }
    }

    /// Whether business data must be present in this phase.
    #[must_use]
    pub const fn requires_business_data(self) -> bool {
        matches!(
            self,
            Self::Artifacts
                | Self::Running
                | Self::Decision
                | Self::Decided
                | Self::Evidence
                | Self::Replay
        )
    }

    /// Whether a run is underway or finished (progress is meaningful).
    #[must_use]
    pub const fn is_in_run(self) -> bool {
        matches!(
            self,
            Self::Running | Self::Decision | Self::Decided | Self::Evidence | Self::Replay
        )
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolution chosen at the decision point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionOutcome {
    /// Approve the agent's request.
    Approve,
    /// Deny it.
    Deny,
    /// Ask for photo evidence first.
    Photo,
}

impl DecisionOutcome {
    /// Wire name of the outcome.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Deny => "deny",
            Self::Photo => "photo",
        }
    }
}

impl std::fmt::Display for DecisionOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caller-supplied parameters of a launch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchContext {
    /// UI locale
    pub locale: String,
    /// Demo mode
    pub mode: DemoMode,
    /// Region selector
    #[serde(default)]
    pub region_code: Option<String>,
    /// Currency, derived from the region catalog when absent
    #[serde(default)]
    pub currency: Option<String>,
    /// Industry selector
    #[serde(default)]
    pub industry_key: Option<String>,
}

impl Default for LaunchContext {
    fn default() -> Self {
        Self {
            locale: "en".to_string(),
            mode: DemoMode::Zero,
            region_code: None,
            currency: None,
            industry_key: None,
        }
    }
}

/// Replay auto-advance controls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayControls {
    /// Whether auto-advance is running
    pub playing: bool,
    /// Auto-advance speed
    pub speed: PlaybackSpeed,
}

/// Identity captured by every timer when it is armed.
///
/// A timer-originated action applies only if all three fields still match
/// the session; anything else is a stale timer and is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerGuard {
    /// Session the timer belongs to
    pub session_id: Uuid,
    /// Run the timer belongs to
    pub run_id: u64,
    /// Phase epoch the timer was armed in
    pub epoch: u64,
}

/// Identity of one generation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GenerationTicket {
    /// Session that issued the request
    pub session_id: Uuid,
    /// Launch sequence number within that session
    pub launch_seq: u64,
}

/// The demo session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DemoSession {
    pub(crate) session_id: Uuid,
    pub(crate) phase: Phase,
    pub(crate) prompt: String,
    #[serde(default)]
    pub(crate) business_data: Option<BusinessArtifacts>,
    #[serde(default)]
    pub(crate) timeline_progress: f64,
    #[serde(default)]
    pub(crate) current_event_index: usize,
    #[serde(default)]
    pub(crate) decision_outcome: Option<DecisionOutcome>,
    #[serde(default)]
    pub(crate) evidence_revealed: EvidenceSet,
    #[serde(default)]
    pub(crate) run_id: u64,
    #[serde(default)]
    pub(crate) epoch: u64,
    #[serde(default)]
    pub(crate) launch: Option<LaunchContext>,
    #[serde(default)]
    pub(crate) last_error: Option<String>,
    #[serde(default)]
    pub(crate) pending_decision: Option<DecisionOutcome>,
    #[serde(default)]
    pub(crate) replay: ReplayControls,
    #[serde(default)]
    pub(crate) launch_seq: u64,
    #[serde(skip)]
    pub(crate) in_flight: Option<GenerationTicket>,
}

impl DemoSession {
    /// Creates a fresh EMPTY session with a new identity.
    #[must_use]
    pub fn new() -> Self {
        Self {
            session_id: Uuid::new_v4(),
            phase: Phase::Empty,
            prompt: String::new(),
            business_data: None,
            timeline_progress: 0.0,
            current_event_index: 0,
            decision_outcome: None,
            evidence_revealed: EvidenceSet::empty(),
            run_id: 0,
            epoch: 0,
            launch: None,
            last_error: None,
            pending_decision: None,
            replay: ReplayControls::default(),
            launch_seq: 0,
            in_flight: None,
        }
    }

    /// Session identity; changes on start-over.
    #[must_use]
    pub const fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Current phase.
    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    /// Current prompt text.
    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    /// Generated business, present from ARTIFACTS onward.
    #[must_use]
    pub const fn business_data(&self) -> Option<&BusinessArtifacts> {
        self.business_data.as_ref()
    }

    /// Position on the timeline, in `[0, 100]`.
    #[must_use]
    pub const fn timeline_progress(&self) -> f64 {
        self.timeline_progress
    }

    /// Index of the current schedule event.
    #[must_use]
    pub const fn current_event_index(&self) -> usize {
        self.current_event_index
    }

    /// Committed decision of the current run.
    #[must_use]
    pub const fn decision_outcome(&self) -> Option<DecisionOutcome> {
        self.decision_outcome
    }

    /// Choice awaiting its confirmation delay.
    #[must_use]
    pub const fn pending_decision(&self) -> Option<DecisionOutcome> {
        self.pending_decision
    }

    /// Unlocked evidence.
    #[must_use]
    pub const fn evidence_revealed(&self) -> EvidenceSet {
        self.evidence_revealed
    }

    /// Run counter; increments whenever a fresh run starts.
    #[must_use]
    pub const fn run_id(&self) -> u64 {
        self.run_id
    }

    /// Phase-change counter.
    #[must_use]
    pub const fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Parameters of the last launch.
    #[must_use]
    pub const fn launch(&self) -> Option<&LaunchContext> {
        self.launch.as_ref()
    }

    /// Localized message of the last generation failure.
    #[must_use]
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Replay auto-advance controls.
    #[must_use]
    pub const fn replay(&self) -> ReplayControls {
        self.replay
    }

    /// Whether a generation request is outstanding.
    #[must_use]
    pub const fn generation_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Guard to stamp on timers armed in the current phase.
    #[must_use]
    pub const fn timer_guard(&self) -> TimerGuard {
        TimerGuard {
            session_id: self.session_id,
            run_id: self.run_id,
            epoch: self.epoch,
        }
    }

    /// Whether a timer armed with `guard` may still act on this session.
    #[must_use]
    pub fn accepts(&self, guard: TimerGuard) -> bool {
        guard == self.timer_guard()
    }

    /// Checks the structural invariants of a (typically deserialized) session.
    ///
    /// # Errors
    ///
    /// Returns a description of the first violated invariant.
    pub fn validate(&self, schedule: &Schedule) -> Result<(), String> {
        let progress = self.timeline_progress;
        if !progress.is_finite() || !(0.0..=MAX_PROGRESS).contains(&progress) {
            return Err(format!("progress {progress} outside [0, 100]"));
        }
        if self.current_event_index != schedule.event_index_at(progress) {
            return Err(format!(
                "event index {} does not match progress {progress}",
                self.current_event_index
            ));
        }
        if self.phase.requires_business_data() != self.business_data.is_some() {
            return Err(format!(
                "business data presence does not match phase {}",
                self.phase
            ));
        }
        let long_enough = prompt_length(&self.prompt) >= MIN_PROMPT_CHARS;
        match self.phase {
            Phase::Empty if long_enough => {
                return Err("empty phase with a launchable prompt".to_string());
            }
            Phase::Typed | Phase::Launching if !long_enough => {
                return Err(format!("phase {} with a prompt below the minimum", self.phase));
            }
            _ => {}
        }
        let threshold = schedule.decision_threshold();
        match self.phase {
            Phase::Empty | Phase::Typed | Phase::Launching | Phase::Artifacts => {
                if progress != 0.0
                    || self.decision_outcome.is_some()
                    || !self.evidence_revealed.is_empty()
                {
                    return Err(format!("phase {} carries run state", self.phase));
                }
            }
            Phase::Running => {
                if self.decision_outcome.is_none() && progress >= threshold {
                    return Err("running past the decision point without an outcome".to_string());
                }
            }
            Phase::Decision => {
                if self.decision_outcome.is_some() {
                    return Err("decision phase with a committed outcome".to_string());
                }
                if (progress - threshold).abs() > f64::EPSILON {
                    return Err(format!("decision phase at {progress}, not at {threshold}"));
                }
            }
            Phase::Decided => {
                if self.decision_outcome.is_none() {
                    return Err("decided phase without a decision outcome".to_string());
                }
                if (progress - threshold).abs() > f64::EPSILON {
                    return Err(format!("decided phase at {progress}, not at {threshold}"));
                }
            }
            Phase::Evidence | Phase::Replay => {
                if self.decision_outcome.is_none() {
                    return Err(format!("phase {} without a decision outcome", self.phase));
                }
                if self.phase == Phase::Evidence && progress < MAX_PROGRESS {
                    return Err(format!("evidence phase at {progress}, not at the end"));
                }
            }
        }
        let derived = evidence_at(progress);
        if self.phase == Phase::Replay {
            if self.evidence_revealed != derived {
                return Err("replay evidence does not match progress".to_string());
            }
        } else if !self.evidence_revealed.is_subset(derived) {
            return Err(format!(
                "phase {} reveals evidence beyond progress {progress}",
                self.phase
            ));
        }
        Ok(())
    }
}

impl Default for DemoSession {
    fn default() -> Self {
        Self::new()
    }
}

/// Prompt length as used by the phase gate.
#[must_use]
pub fn prompt_length(prompt: &str) -> usize {
    prompt.trim().chars().count()
}
