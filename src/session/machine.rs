//! Session reducer.
//!
//! [`SessionMachine::dispatch`] is the only mutation entry point for a
//! [`DemoSession`]. It never sleeps or performs I/O: timers and collaborator
//! calls come back as [`Effect`]s for the engine to carry out, and their
//! results re-enter as [`Action`]s carrying the guard or ticket they were
//! issued with.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::artifacts::{BusinessArtifacts, GenerationRequest, localized_failure};
use crate::error::{GenerationError, SessionError};
use crate::observability::metrics;
use crate::timeline::{
    Driver, EvidenceSet, PlaybackSpeed, Schedule, Scrubber, TickOutcome, accumulate_evidence,
};

use super::decision::{DecisionGate, GateResponse};
use super::state::{
    DecisionOutcome, DemoSession, GenerationTicket, LaunchContext, MIN_PROMPT_CHARS, Phase,
    TimerGuard, prompt_length,
};

// ============================================================================
// Actions and effects
// ============================================================================

/// Input to the reducer.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Replace the prompt text (typing or picking a suggestion).
    EditPrompt(String),
    /// Start artifact generation.
    Launch(LaunchContext),
    /// The generator answered successfully.
    GenerationSucceeded {
        /// Ticket the request was issued with
        ticket: GenerationTicket,
        /// Generated business
        artifacts: Box<BusinessArtifacts>,
    },
    /// The generator failed.
    GenerationFailed {
        /// Ticket the request was issued with
        ticket: GenerationTicket,
        /// Failure cause
        error: GenerationError,
    },
    /// Start the simulated day from ARTIFACTS.
    RunTestDay,
    /// Driver tick.
    Tick(TimerGuard),
    /// User picked a resolution at the decision point.
    ChooseDecision(DecisionOutcome),
    /// Confirmation delay elapsed.
    ConfirmDecision(TimerGuard),
    /// DECIDED auto-advance elapsed.
    ResumeRun(TimerGuard),
    /// EVIDENCE auto-advance elapsed.
    RevealReplay(TimerGuard),
    /// Move the replay to an arbitrary position.
    Scrub(f64),
    /// Jump to the next event in replay.
    StepNext,
    /// Jump to the previous event in replay.
    StepPrevious,
    /// Rewind the replay to 0.
    ResetReplay,
    /// Start replay auto-advance.
    Play,
    /// Stop replay auto-advance.
    Pause,
    /// Change replay auto-advance speed.
    SetSpeed(PlaybackSpeed),
    /// Replay auto-advance tick.
    PlaybackTick(TimerGuard),
    /// Start a fresh run from REPLAY.
    RunAgain,
    /// Leave REPLAY to edit the prompt.
    EditFromReplay,
    /// Discard everything and return to EMPTY.
    StartOver,
}

impl Action {
    /// Stable name used in logs and errors.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::EditPrompt(_) => "edit_prompt",
            Self::Launch(_) => "launch",
            Self::GenerationSucceeded { .. } => "generation_succeeded",
            Self::GenerationFailed { .. } => "generation_failed",
            Self::RunTestDay => "run_test_day",
            Self::Tick(_) => "tick",
            Self::ChooseDecision(_) => "choose_decision",
            Self::ConfirmDecision(_) => "confirm_decision",
            Self::ResumeRun(_) => "resume_run",
            Self::RevealReplay(_) => "reveal_replay",
            Self::Scrub(_) => "scrub",
            Self::StepNext => "step_next",
            Self::StepPrevious => "step_previous",
            Self::ResetReplay => "reset_replay",
            Self::Play => "play",
            Self::Pause => "pause",
            Self::SetSpeed(_) => "set_speed",
            Self::PlaybackTick(_) => "playback_tick",
            Self::RunAgain => "run_again",
            Self::EditFromReplay => "edit_from_replay",
            Self::StartOver => "start_over",
        }
    }
}

/// One-shot timers a phase can arm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// DECISION: commit the pending choice.
    ConfirmDecision,
    /// DECIDED: hand control back to the driver.
    ResumeRun,
    /// EVIDENCE: move on to REPLAY.
    RevealReplay,
}

impl TimerKind {
    /// The action the timer delivers when it fires.
    #[must_use]
    pub const fn action(self, guard: TimerGuard) -> Action {
        match self {
            Self::ConfirmDecision => Action::ConfirmDecision(guard),
            Self::ResumeRun => Action::ResumeRun(guard),
            Self::RevealReplay => Action::RevealReplay(guard),
        }
    }
}

/// Work the engine must carry out after a dispatch.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Cancel every timer armed so far.
    CancelTimers,
    /// Start the periodic driver tick.
    StartTicker(TimerGuard),
    /// Start the periodic replay auto-advance tick.
    StartPlayback(TimerGuard),
    /// Arm a one-shot timer.
    Schedule {
        /// What fires
        timer: TimerKind,
        /// After how long
        delay: Duration,
        /// Guard captured at arming time
        guard: TimerGuard,
    },
    /// Invoke the artifact generator.
    Generate {
        /// Ticket to hand back with the result
        ticket: GenerationTicket,
        /// Request payload
        request: GenerationRequest,
    },
    /// The phase changed.
    PhaseChanged {
        /// Previous phase
        from: Phase,
        /// New phase
        to: Phase,
    },
    /// The live run crossed into a new schedule event.
    EventEntered {
        /// Index of the event
        index: usize,
    },
    /// The replay position changed.
    Scrubbed {
        /// New position
        progress: f64,
    },
    /// The session should be persisted.
    Persist,
}

// ============================================================================
// Timing
// ============================================================================

/// Fixed delays of the auto-advancing phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    /// DECISION choice → DECIDED
    pub decision_confirm: Duration,
    /// DECIDED → RUNNING
    pub decided_resume: Duration,
    /// EVIDENCE → REPLAY
    pub evidence_reveal: Duration,
    /// Replay auto-advance cadence
    pub playback_interval: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            decision_confirm: Duration::from_millis(600),
            decided_resume: Duration::from_millis(400),
            evidence_reveal: Duration::from_millis(1500),
            playback_interval: Duration::from_millis(100),
        }
    }
}

// ============================================================================
// Machine
// ============================================================================

/// The demo session state machine.
#[derive(Debug, Clone)]
pub struct SessionMachine {
    session: DemoSession,
    schedule: Schedule,
    driver: Driver,
    timing: Timing,
    region_currencies: HashMap<String, String>,
    industries: HashSet<String>,
    replay_speeds: Vec<PlaybackSpeed>,
}

impl SessionMachine {
    /// Creates a machine around a fresh session.
    #[must_use]
    pub fn new(schedule: Schedule, driver: Driver, timing: Timing) -> Self {
        Self::with_session(DemoSession::new(), schedule, driver, timing)
    }

    /// Creates a machine around an existing (e.g. restored) session.
    #[must_use]
    pub fn with_session(
        session: DemoSession,
        schedule: Schedule,
        driver: Driver,
        timing: Timing,
    ) -> Self {
        Self {
            session,
            schedule,
            driver,
            timing,
            region_currencies: HashMap::new(),
            industries: HashSet::new(),
            replay_speeds: PlaybackSpeed::ALL.to_vec(),
        }
    }

    /// Sets the region code → currency catalog used to complete launches.
    #[must_use]
    pub fn with_region_currencies(mut self, catalog: HashMap<String, String>) -> Self {
        self.region_currencies = catalog;
        self
    }

    /// Sets the industry catalog launches are checked against.
    ///
    /// Keys compare case-insensitively. An empty catalog accepts any key.
    #[must_use]
    pub fn with_industries<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.industries = keys
            .into_iter()
            .map(|k| k.as_ref().to_ascii_lowercase())
            .collect();
        self
    }

    /// Restricts the speeds replay auto-advance may use.
    #[must_use]
    pub fn with_replay_speeds(mut self, speeds: Vec<PlaybackSpeed>) -> Self {
        self.replay_speeds = speeds;
        self
    }

    /// Speeds accepted by `SetSpeed`.
    #[must_use]
    pub fn replay_speeds(&self) -> &[PlaybackSpeed] {
        &self.replay_speeds
    }

    /// The session.
    #[must_use]
    pub const fn session(&self) -> &DemoSession {
        &self.session
    }

    /// The event schedule.
    #[must_use]
    pub const fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    /// The driver.
    #[must_use]
    pub const fn driver(&self) -> &Driver {
        &self.driver
    }

    /// The phase delays.
    #[must_use]
    pub const fn timing(&self) -> &Timing {
        &self.timing
    }

    /// Applies `action`.
    ///
    /// Timer and collaborator results whose guard or ticket no longer match
    /// the session are dropped and yield no effects.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidTransition` when `action` is not
    /// accepted in the current phase. Launching fails with
    /// `SessionError::PromptTooShort` or `SessionError::UnknownIndustry`,
    /// and `SetSpeed` with `SessionError::SpeedNotEnabled`. The session is
    /// unchanged on error.
    pub fn dispatch(&mut self, action: Action) -> Result<Vec<Effect>, SessionError> {
        let phase = self.session.phase;
        let name = action.name();
        let mut effects = Vec::new();

        match action {
            Action::EditPrompt(text) => self.edit_prompt(text, &mut effects)?,
            Action::Launch(ctx) => self.launch(ctx, &mut effects)?,
            Action::GenerationSucceeded { ticket, artifacts } => {
                if self.accept_ticket(ticket, name) {
                    self.session.in_flight = None;
                    self.session.business_data = Some(*artifacts);
                    self.clear_run();
                    self.enter(Phase::Artifacts, &mut effects);
                    metrics::record_generation("success");
                }
            }
            Action::GenerationFailed { ticket, error } => {
                if self.accept_ticket(ticket, name) {
                    warn!(error = %error, "artifact generation failed");
                    self.session.in_flight = None;
                    let locale = self
                        .session
                        .launch
                        .as_ref()
                        .map_or("en", |l| l.locale.as_str());
                    self.session.last_error = Some(localized_failure(locale).to_string());
                    self.enter(Phase::Typed, &mut effects);
                    metrics::record_generation("failure");
                }
            }
            Action::RunTestDay => {
                self.require(&[Phase::Artifacts], name)?;
                self.start_run(&mut effects);
            }
            Action::Tick(guard) => {
                if self.accept_timer(guard, Phase::Running, name) {
                    self.tick(&mut effects);
                }
            }
            Action::ChooseDecision(outcome) => {
                self.require(&[Phase::Decision], name)?;
                match DecisionGate::new(&mut self.session).choose(outcome) {
                    GateResponse::Armed(outcome) => {
                        info!(%outcome, "decision chosen");
                        let delay = self.timing.decision_confirm;
                        self.arm(TimerKind::ConfirmDecision, delay, &mut effects);
                    }
                    GateResponse::AlreadyChosen(existing) => {
                        debug!(%existing, ignored = %outcome, "decision already chosen");
                    }
                    GateResponse::Closed => {}
                }
            }
            Action::ConfirmDecision(guard) => {
                if self.accept_timer(guard, Phase::Decision, name) {
                    if let Some(outcome) = DecisionGate::new(&mut self.session).commit() {
                        metrics::record_decision(outcome.as_str());
                        self.enter(Phase::Decided, &mut effects);
                        self.arm(TimerKind::ResumeRun, self.timing.decided_resume, &mut effects);
                    }
                }
            }
            Action::ResumeRun(guard) => {
                if self.accept_timer(guard, Phase::Decided, name) {
                    info!(progress = self.session.timeline_progress, "resuming run");
                    self.enter(Phase::Running, &mut effects);
                    effects.push(Effect::StartTicker(self.session.timer_guard()));
                }
            }
            Action::RevealReplay(guard) => {
                if self.accept_timer(guard, Phase::Evidence, name) {
                    self.enter(Phase::Replay, &mut effects);
                    self.session.replay = super::state::ReplayControls::default();
                    self.seek(self.session.timeline_progress, &mut effects);
                }
            }
            Action::Scrub(target) => {
                self.require(&[Phase::Replay], name)?;
                self.seek(target, &mut effects);
                effects.push(Effect::Persist);
            }
            Action::StepNext => {
                self.require(&[Phase::Replay], name)?;
                let target =
                    Scrubber::new(&self.schedule).next_event(self.session.timeline_progress);
                self.seek(target, &mut effects);
                effects.push(Effect::Persist);
            }
            Action::StepPrevious => {
                self.require(&[Phase::Replay], name)?;
                let target =
                    Scrubber::new(&self.schedule).previous_event(self.session.timeline_progress);
                self.seek(target, &mut effects);
                effects.push(Effect::Persist);
            }
            Action::ResetReplay => {
                self.require(&[Phase::Replay], name)?;
                self.seek(0.0, &mut effects);
                effects.push(Effect::Persist);
            }
            Action::Play => {
                self.require(&[Phase::Replay], name)?;
                if !self.session.replay.playing {
                    if self.session.timeline_progress >= crate::timeline::MAX_PROGRESS {
                        self.seek(0.0, &mut effects);
                    }
                    self.session.replay.playing = true;
                    self.invalidate_timers(&mut effects);
                    effects.push(Effect::StartPlayback(self.session.timer_guard()));
                    effects.push(Effect::Persist);
                }
            }
            Action::Pause => {
                self.require(&[Phase::Replay], name)?;
                if self.session.replay.playing {
                    self.session.replay.playing = false;
                    self.invalidate_timers(&mut effects);
                    effects.push(Effect::Persist);
                }
            }
            Action::SetSpeed(speed) => {
                self.require(&[Phase::Replay], name)?;
                if !self.replay_speeds.contains(&speed) {
                    return Err(SessionError::SpeedNotEnabled(speed));
                }
                self.session.replay.speed = speed;
            }
            Action::PlaybackTick(guard) => {
                if self.accept_timer(guard, Phase::Replay, name) && self.session.replay.playing {
                    let target = Scrubber::new(&self.schedule).playback_step(
                        self.session.timeline_progress,
                        self.driver.step(),
                        self.session.replay.speed,
                    );
                    self.seek(target, &mut effects);
                    if target >= crate::timeline::MAX_PROGRESS {
                        self.session.replay.playing = false;
                        self.invalidate_timers(&mut effects);
                        effects.push(Effect::Persist);
                    }
                }
            }
            Action::RunAgain => {
                self.require(&[Phase::Replay], name)?;
                self.start_run(&mut effects);
            }
            Action::EditFromReplay => {
                self.require(&[Phase::Replay], name)?;
                self.session.business_data = None;
                self.clear_run();
                self.enter(Phase::Typed, &mut effects);
            }
            Action::StartOver => {
                info!(from = %phase, "starting over");
                let epoch = self.session.epoch;
                self.session = DemoSession::new();
                self.session.epoch = epoch;
                self.session.phase = phase;
                self.enter(Phase::Empty, &mut effects);
            }
        }

        Ok(effects)
    }

    /// Effects that re-arm the timers owned by the current phase.
    ///
    /// Used after restoring a persisted session, whose timers did not survive.
    #[must_use]
    pub fn rearm(&mut self) -> Vec<Effect> {
        let mut effects = Vec::new();
        self.invalidate_timers(&mut effects);
        match self.session.phase {
            Phase::Running => effects.push(Effect::StartTicker(self.session.timer_guard())),
            Phase::Decision if self.session.pending_decision.is_some() => {
                self.arm(TimerKind::ConfirmDecision, self.timing.decision_confirm, &mut effects);
            }
            Phase::Decided => {
                self.arm(TimerKind::ResumeRun, self.timing.decided_resume, &mut effects);
            }
            Phase::Evidence => {
                self.arm(TimerKind::RevealReplay, self.timing.evidence_reveal, &mut effects);
            }
            Phase::Replay if self.session.replay.playing => {
                effects.push(Effect::StartPlayback(self.session.timer_guard()));
            }
            _ => {}
        }
        effects
    }

    // ------------------------------------------------------------------------
    // Transition helpers
    // ------------------------------------------------------------------------

    fn require(&self, allowed: &[Phase], action: &'static str) -> Result<(), SessionError> {
        if allowed.contains(&self.session.phase) {
            Ok(())
        } else {
            Err(SessionError::InvalidTransition {
                phase: self.session.phase,
                action,
            })
        }
    }

    fn enter(&mut self, to: Phase, effects: &mut Vec<Effect>) {
        let from = self.session.phase;
        self.session.phase = to;
        self.invalidate_timers(effects);
        info!(%from, %to, run_id = self.session.run_id, "phase transition");
        metrics::record_phase_transition(from, to);
        effects.push(Effect::PhaseChanged { from, to });
        effects.push(Effect::Persist);
    }

    /// Bumps the epoch so every armed timer's guard goes stale.
    fn invalidate_timers(&mut self, effects: &mut Vec<Effect>) {
        self.session.epoch = self.session.epoch.wrapping_add(1);
        effects.push(Effect::CancelTimers);
    }

    fn arm(&self, timer: TimerKind, delay: Duration, effects: &mut Vec<Effect>) {
        effects.push(Effect::Schedule {
            timer,
            delay,
            guard: self.session.timer_guard(),
        });
    }

    fn accept_timer(&self, guard: TimerGuard, phase: Phase, action: &'static str) -> bool {
        if self.session.accepts(guard) && self.session.phase == phase {
            return true;
        }
        debug!(
            action,
            phase = %self.session.phase,
            guard_epoch = guard.epoch,
            epoch = self.session.epoch,
            "ignoring stale timer"
        );
        metrics::record_stale_action(action);
        false
    }

    fn accept_ticket(&self, ticket: GenerationTicket, action: &'static str) -> bool {
        if self.session.phase == Phase::Launching && self.session.in_flight == Some(ticket) {
            return true;
        }
        debug!(action, launch_seq = ticket.launch_seq, "discarding stale generation result");
        metrics::record_stale_action(action);
        false
    }

    fn clear_run(&mut self) {
        self.session.timeline_progress = 0.0;
        self.session.current_event_index = 0;
        self.session.decision_outcome = None;
        self.session.pending_decision = None;
        self.session.evidence_revealed = EvidenceSet::empty();
        self.session.replay = super::state::ReplayControls::default();
    }

    // ------------------------------------------------------------------------
    // Phase behaviour
    // ------------------------------------------------------------------------

    fn edit_prompt(&mut self, text: String, effects: &mut Vec<Effect>) -> Result<(), SessionError> {
        self.require(&[Phase::Empty, Phase::Typed], "edit_prompt")?;
        let long_enough = prompt_length(&text) >= MIN_PROMPT_CHARS;
        self.session.prompt = text;
        self.session.last_error = None;
        match (self.session.phase, long_enough) {
            (Phase::Empty, true) => self.enter(Phase::Typed, effects),
            (Phase::Typed, false) => self.enter(Phase::Empty, effects),
            _ => effects.push(Effect::Persist),
        }
        Ok(())
    }

    fn launch(
        &mut self,
        mut ctx: LaunchContext,
        effects: &mut Vec<Effect>,
    ) -> Result<(), SessionError> {
        if self.session.phase == Phase::Launching && self.session.in_flight.is_some() {
            debug!("launch already in flight; ignoring");
            return Ok(());
        }
        self.require(&[Phase::Typed], "launch")?;
        let length = prompt_length(&self.session.prompt);
        if length < MIN_PROMPT_CHARS {
            return Err(SessionError::PromptTooShort {
                length,
                minimum: MIN_PROMPT_CHARS,
            });
        }

        if let Some(key) = &ctx.industry_key {
            if !self.industries.is_empty()
                && !self.industries.contains(&key.to_ascii_lowercase())
            {
                return Err(SessionError::UnknownIndustry(key.clone()));
            }
        }

        if ctx.currency.is_none() {
            ctx.currency = ctx
                .region_code
                .as_ref()
                .and_then(|code| self.region_currencies.get(code))
                .cloned();
        }

        self.session.launch_seq += 1;
        let ticket = GenerationTicket {
            session_id: self.session.session_id,
            launch_seq: self.session.launch_seq,
        };
        let request = GenerationRequest {
            prompt: self.session.prompt.trim().to_string(),
            locale: ctx.locale.clone(),
            mode: ctx.mode,
            region_code: ctx.region_code.clone(),
            currency: ctx.currency.clone(),
            industry_key: ctx.industry_key.clone(),
        };
        self.session.in_flight = Some(ticket);
        self.session.launch = Some(ctx);
        self.session.last_error = None;
        self.enter(Phase::Launching, effects);
        effects.push(Effect::Generate { ticket, request });
        Ok(())
    }

    fn start_run(&mut self, effects: &mut Vec<Effect>) {
        self.clear_run();
        self.session.run_id = self.session.run_id.wrapping_add(1);
        self.enter(Phase::Running, effects);
        effects.push(Effect::StartTicker(self.session.timer_guard()));
    }

    fn tick(&mut self, effects: &mut Vec<Effect>) {
        let progress = self.session.timeline_progress;
        let decided = self.session.decision_outcome.is_some();
        match self.driver.tick(&self.schedule, progress, decided) {
            TickOutcome::Advanced {
                progress,
                event_index,
                entered_event,
            } => {
                self.commit_live(progress, event_index);
                if let Some(index) = entered_event {
                    debug!(index, progress, "entered event");
                    effects.push(Effect::EventEntered { index });
                }
            }
            TickOutcome::PausedForDecision {
                progress,
                event_index,
            } => {
                self.commit_live(progress, event_index);
                effects.push(Effect::EventEntered { index: event_index });
                self.enter(Phase::Decision, effects);
            }
            TickOutcome::Completed { event_index } => {
                self.commit_live(crate::timeline::MAX_PROGRESS, event_index);
                effects.push(Effect::EventEntered { index: event_index });
                metrics::record_run_completed();
                self.enter(Phase::Evidence, effects);
                self.arm(TimerKind::RevealReplay, self.timing.evidence_reveal, effects);
            }
        }
    }

    fn commit_live(&mut self, progress: f64, event_index: usize) {
        self.session.timeline_progress = progress;
        self.session.current_event_index = event_index;
        self.session.evidence_revealed =
            accumulate_evidence(self.session.evidence_revealed, &self.schedule, progress);
    }

    fn seek(&mut self, target: f64, effects: &mut Vec<Effect>) {
        let position = Scrubber::new(&self.schedule).seek(target);
        self.session.timeline_progress = position.progress;
        self.session.current_event_index = position.state.event_index;
        self.session.evidence_revealed = position.state.evidence;
        effects.push(Effect::Scrubbed {
            progress: position.progress,
        });
    }
}

impl Default for SessionMachine {
    fn default() -> Self {
        Self::new(Schedule::standard(), Driver::default(), Timing::default())
    }
}
