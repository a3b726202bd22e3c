//! Session engine.
//!
//! Runs [`SessionMachine`] effects on the tokio runtime: phase timers become
//! tasks tied to a [`CancellationToken`] that is swapped on every
//! `CancelTimers`, collaborator calls become tasks that feed their result
//! back through [`DemoEngine::dispatch`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::artifacts::{ArtifactGenerator, GenerationRequest};
use crate::error::SessionError;
use crate::observability::events::{DemoSummary, Event, EventEmitter, StopReason};
use crate::observability::metrics;
use crate::snapshot::SnapshotStore;

use super::machine::{Action, Effect, SessionMachine};
use super::state::{DemoSession, GenerationTicket, Phase, TimerGuard};

/// Notification published after a dispatch changed something observable.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionUpdate {
    /// The phase changed.
    PhaseChanged {
        /// Previous phase
        from: Phase,
        /// New phase
        to: Phase,
    },
    /// The live run entered a schedule event.
    EventEntered {
        /// Event index
        index: usize,
    },
    /// The replay position moved.
    Scrubbed {
        /// New position
        progress: f64,
    },
}

#[derive(Debug, Default)]
struct Stats {
    transitions: AtomicU64,
    runs: AtomicU64,
    generations: AtomicU64,
}

/// Async driver of one demo session.
pub struct DemoEngine {
    machine: Mutex<SessionMachine>,
    generator: Arc<dyn ArtifactGenerator>,
    /// Parent of every task the engine spawns
    root: CancellationToken,
    /// Token of the timers armed in the current phase
    timers: Mutex<CancellationToken>,
    update_tx: mpsc::UnboundedSender<SessionUpdate>,
    update_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<SessionUpdate>>,
    phase_tx: watch::Sender<Phase>,
    emitter: Option<Arc<EventEmitter>>,
    snapshots: Option<SnapshotStore>,
    stats: Stats,
    started: Instant,
}

impl std::fmt::Debug for DemoEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DemoEngine")
            .field("phase", &*self.phase_tx.borrow())
            .field("snapshots", &self.snapshots)
            .finish_non_exhaustive()
    }
}

impl DemoEngine {
    /// Creates an engine around `machine`.
    #[must_use]
    pub fn new(machine: SessionMachine, generator: Arc<dyn ArtifactGenerator>) -> Self {
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        let (phase_tx, _) = watch::channel(machine.session().phase());
        let root = CancellationToken::new();
        let timers = root.child_token();
        Self {
            machine: Mutex::new(machine),
            generator,
            root,
            timers: Mutex::new(timers),
            update_tx,
            update_rx: tokio::sync::Mutex::new(update_rx),
            phase_tx,
            emitter: None,
            snapshots: None,
            stats: Stats::default(),
            started: Instant::now(),
        }
    }

    /// Writes structured events to `emitter`.
    #[must_use]
    pub fn with_events(mut self, emitter: Arc<EventEmitter>) -> Self {
        self.emitter = Some(emitter);
        self
    }

    /// Persists the session to `store` after every transition.
    #[must_use]
    pub fn with_snapshots(mut self, store: SnapshotStore) -> Self {
        self.snapshots = Some(store);
        self
    }

    /// Announces the session and re-arms the timers of its current phase.
    ///
    /// Call once after wrapping the engine in an `Arc`.
    pub fn start(self: &Arc<Self>) {
        let mut machine = self.lock_machine();
        self.emit(|| Event::SessionStarted {
            timestamp: Utc::now(),
            session_id: machine.session().session_id(),
        });
        metrics::set_current_phase(machine.session().phase(), None);
        let effects = machine.rearm();
        self.apply(&machine, effects);
    }

    /// Applies `action` and carries out the resulting effects.
    ///
    /// # Errors
    ///
    /// Returns the reducer's [`SessionError`]; the session is unchanged.
    pub fn dispatch(self: &Arc<Self>, action: Action) -> Result<Vec<Effect>, SessionError> {
        let mut machine = self.lock_machine();
        let before = machine.session().session_id();
        let effects = machine.dispatch(action)?;
        if machine.session().session_id() != before {
            self.emit(|| Event::SessionStarted {
                timestamp: Utc::now(),
                session_id: machine.session().session_id(),
            });
        }
        self.apply(&machine, effects.clone());
        Ok(effects)
    }

    /// Copy of the current session.
    #[must_use]
    pub fn session(&self) -> DemoSession {
        self.lock_machine().session().clone()
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> Phase {
        *self.phase_tx.borrow()
    }

    /// Waits until the phase satisfies `predicate`; returns that phase.
    ///
    /// Returns `None` if the engine shut down first.
    pub async fn wait_for_phase(&self, predicate: impl Fn(Phase) -> bool) -> Option<Phase> {
        let mut rx = self.phase_tx.subscribe();
        tokio::select! {
            () = self.root.cancelled() => None,
            result = rx.wait_for(|p| predicate(*p)) => result.ok().map(|p| *p),
        }
    }

    /// Receives the next update.
    ///
    /// Returns `None` once the engine shut down.
    pub async fn recv_update(&self) -> Option<SessionUpdate> {
        let mut rx = self.update_rx.lock().await;
        tokio::select! {
            () = self.root.cancelled() => None,
            update = rx.recv() => update,
        }
    }

    /// Activity summary so far.
    #[must_use]
    pub fn summary(&self) -> DemoSummary {
        DemoSummary {
            phase_transitions: self.stats.transitions.load(Ordering::Relaxed),
            runs_completed: self.stats.runs.load(Ordering::Relaxed),
            generations: self.stats.generations.load(Ordering::Relaxed),
            uptime_secs: self.started.elapsed().as_secs_f64(),
        }
    }

    /// Cancels every task and reports why the session stopped.
    pub fn shutdown(&self, reason: StopReason) {
        if self.root.is_cancelled() {
            return;
        }
        self.root.cancel();
        metrics::set_uptime(self.started.elapsed());
        let summary = self.summary();
        info!(?reason, %summary, "session stopped");
        self.emit(|| Event::SessionStopped {
            timestamp: Utc::now(),
            reason,
            summary,
        });
    }

    // ------------------------------------------------------------------------
    // Effect execution
    // ------------------------------------------------------------------------

    fn lock_machine(&self) -> MutexGuard<'_, SessionMachine> {
        self.machine.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Carries out `effects` while the reducer lock is held, so effects of
    /// concurrent dispatches never interleave. Nothing here awaits.
    fn apply(self: &Arc<Self>, machine: &SessionMachine, effects: Vec<Effect>) {
        let session = machine.session();
        for effect in effects {
            match effect {
                Effect::CancelTimers => self.reset_timers(),
                Effect::StartTicker(guard) => {
                    let interval = machine.driver().interval();
                    self.spawn_periodic(interval, guard, Action::Tick);
                }
                Effect::StartPlayback(guard) => {
                    let interval = machine.timing().playback_interval;
                    self.spawn_periodic(interval, guard, Action::PlaybackTick);
                }
                Effect::Schedule {
                    timer,
                    delay,
                    guard,
                } => self.spawn_delayed(delay, timer.action(guard)),
                Effect::Generate { ticket, request } => {
                    self.stats.generations.fetch_add(1, Ordering::Relaxed);
                    self.emit(|| Event::GenerationRequested {
                        timestamp: Utc::now(),
                        launch_seq: ticket.launch_seq,
                        locale: request.locale.clone(),
                        mode: request.mode,
                    });
                    self.spawn_generation(ticket, request);
                }
                Effect::PhaseChanged { from, to } => {
                    self.on_phase_changed(session, from, to);
                }
                Effect::EventEntered { index } => {
                    let time = machine
                        .schedule()
                        .get(index)
                        .map_or_else(String::new, |e| e.time.to_string());
                    debug!(index, %time, "timeline event entered");
                    self.emit(|| Event::TimelineEventEntered {
                        timestamp: Utc::now(),
                        index,
                        time,
                    });
                    let _ = self.update_tx.send(SessionUpdate::EventEntered { index });
                }
                Effect::Scrubbed { progress } => {
                    metrics::record_scrub();
                    self.emit(|| Event::Scrubbed {
                        timestamp: Utc::now(),
                        progress,
                        event_index: session.current_event_index(),
                        evidence: session.evidence_revealed().iter().collect(),
                    });
                    let _ = self.update_tx.send(SessionUpdate::Scrubbed { progress });
                }
                Effect::Persist => self.persist(session),
            }
        }
        metrics::set_timeline_progress(session.timeline_progress());
    }

    fn on_phase_changed(&self, session: &DemoSession, from: Phase, to: Phase) {
        self.stats.transitions.fetch_add(1, Ordering::Relaxed);
        self.emit(|| Event::PhaseEntered {
            timestamp: Utc::now(),
            from,
            to,
            run_id: session.run_id(),
            progress: session.timeline_progress(),
        });
        match to {
            Phase::Decided => {
                if let Some(outcome) = session.decision_outcome() {
                    self.emit(|| Event::DecisionMade {
                        timestamp: Utc::now(),
                        outcome,
                    });
                }
            }
            Phase::Evidence => {
                self.stats.runs.fetch_add(1, Ordering::Relaxed);
                self.emit(|| Event::RunCompleted {
                    timestamp: Utc::now(),
                    run_id: session.run_id(),
                    outcome: session.decision_outcome(),
                });
            }
            _ => {}
        }
        self.phase_tx.send_replace(to);
        let _ = self.update_tx.send(SessionUpdate::PhaseChanged { from, to });
    }

    fn reset_timers(&self) {
        let mut timers = self.timers.lock().unwrap_or_else(PoisonError::into_inner);
        timers.cancel();
        *timers = self.root.child_token();
    }

    fn current_timer_token(&self) -> CancellationToken {
        self.timers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn spawn_periodic(
        self: &Arc<Self>,
        period: Duration,
        guard: TimerGuard,
        action: fn(TimerGuard) -> Action,
    ) {
        let engine = Arc::clone(self);
        let cancel = self.current_timer_token();
        tokio::spawn(async move {
            let start = tokio::time::Instant::now() + period;
            let mut interval = tokio::time::interval_at(start, period);
            loop {
                tokio::select! {
                    () = cancel.cancelled() => {
                        debug!("periodic timer cancelled");
                        break;
                    }
                    _ = interval.tick() => {
                        if let Err(e) = engine.dispatch(action(guard)) {
                            debug!(error = %e, "periodic timer action rejected");
                        }
                    }
                }
            }
        });
    }

    fn spawn_delayed(self: &Arc<Self>, delay: Duration, action: Action) {
        let engine = Arc::clone(self);
        let cancel = self.current_timer_token();
        tokio::spawn(async move {
            tokio::select! {
                () = cancel.cancelled() => {
                    debug!(action = action.name(), "delayed timer cancelled");
                }
                () = tokio::time::sleep(delay) => {
                    if let Err(e) = engine.dispatch(action) {
                        debug!(error = %e, "delayed timer action rejected");
                    }
                }
            }
        });
    }

    /// Generation is tied to the engine, not the phase: a response that
    /// outlives its launch is delivered and then discarded by ticket.
    fn spawn_generation(
        self: &Arc<Self>,
        ticket: GenerationTicket,
        request: GenerationRequest,
    ) {
        let engine = Arc::clone(self);
        let generator = Arc::clone(&self.generator);
        let cancel = self.root.clone();
        tokio::spawn(async move {
            let started = Instant::now();
            let result = tokio::select! {
                () = cancel.cancelled() => return,
                result = generator.generate(&request) => result,
            };
            let elapsed = started.elapsed();
            metrics::record_generation_duration(elapsed);
            engine.emit(|| Event::GenerationCompleted {
                timestamp: Utc::now(),
                launch_seq: ticket.launch_seq,
                success: result.is_ok(),
                duration_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            });
            let action = match result {
                Ok(artifacts) => Action::GenerationSucceeded {
                    ticket,
                    artifacts: Box::new(artifacts),
                },
                Err(error) => {
                    metrics::record_error("generation");
                    Action::GenerationFailed { ticket, error }
                }
            };
            if let Err(e) = engine.dispatch(action) {
                warn!(error = %e, "generation result rejected");
            }
        });
    }

    fn persist(&self, session: &DemoSession) {
        if let Some(store) = &self.snapshots {
            if let Err(e) = store.save(session) {
                warn!(error = %e, "failed to persist session snapshot");
                metrics::record_error("snapshot");
            }
        }
    }

    fn emit(&self, event: impl FnOnce() -> Event) {
        if let Some(emitter) = &self.emitter {
            emitter.emit(event());
        }
    }
}

impl Drop for DemoEngine {
    fn drop(&mut self) {
        self.root.cancel();
    }
}
