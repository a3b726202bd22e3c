//! Structured demo event stream.
//!
//! Typed events describing what a demo session did, written as
//! newline-delimited JSON with a monotonically increasing sequence number.

use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::artifacts::DemoMode;
use crate::session::{DecisionOutcome, Phase};

// ---------------------------------------------------------------------------
// Supporting types
// ---------------------------------------------------------------------------

/// Why a session stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The scripted flow reached its end.
    Completed,
    /// Interrupted by SIGINT.
    Interrupted,
    /// Terminated by SIGTERM.
    Terminated,
    /// Unrecoverable error.
    Error,
}

/// Summary statistics emitted when a session stops.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DemoSummary {
    /// Number of phase transitions.
    pub phase_transitions: u64,
    /// Number of completed runs.
    pub runs_completed: u64,
    /// Number of generation requests sent.
    pub generations: u64,
    /// Wall-clock time in seconds.
    pub uptime_secs: f64,
}

impl std::fmt::Display for DemoSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "transitions={} runs={} generations={} uptime={:.1}s",
            self.phase_transitions, self.runs_completed, self.generations, self.uptime_secs,
        )
    }
}

// ---------------------------------------------------------------------------
// Event variants
// ---------------------------------------------------------------------------

/// A discrete event emitted during a demo session.
///
/// Tagged with `"type"` when serialized.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum Event {
    /// A session was created (initially or by starting over).
    SessionStarted {
        /// When it started.
        timestamp: DateTime<Utc>,
        /// Session identity.
        session_id: Uuid,
    },

    /// The session changed phase.
    PhaseEntered {
        /// When the transition occurred.
        timestamp: DateTime<Utc>,
        /// Previous phase.
        from: Phase,
        /// New phase.
        to: Phase,
        /// Run counter at the time.
        run_id: u64,
        /// Timeline position at the time.
        progress: f64,
    },

    /// The live run crossed into a schedule event.
    TimelineEventEntered {
        /// When the event was entered.
        timestamp: DateTime<Utc>,
        /// Index of the schedule event.
        index: usize,
        /// Clock label of the event.
        time: String,
    },

    /// A generation request was sent.
    GenerationRequested {
        /// When the request was sent.
        timestamp: DateTime<Utc>,
        /// Launch sequence number.
        launch_seq: u64,
        /// Request locale.
        locale: String,
        /// Demo mode.
        mode: DemoMode,
    },

    /// A generation request finished.
    GenerationCompleted {
        /// When the answer arrived.
        timestamp: DateTime<Utc>,
        /// Launch sequence number.
        launch_seq: u64,
        /// Whether artifacts were produced.
        success: bool,
        /// Time spent waiting in milliseconds.
        duration_ms: u64,
    },

    /// A decision was committed.
    DecisionMade {
        /// When it was committed.
        timestamp: DateTime<Utc>,
        /// The committed outcome.
        outcome: DecisionOutcome,
    },

    /// A run reached 100%.
    RunCompleted {
        /// When the run finished.
        timestamp: DateTime<Utc>,
        /// Run counter.
        run_id: u64,
        /// Outcome the run was resolved with.
        #[serde(skip_serializing_if = "Option::is_none")]
        outcome: Option<DecisionOutcome>,
    },

    /// The replay position moved.
    Scrubbed {
        /// When the position moved.
        timestamp: DateTime<Utc>,
        /// New position.
        progress: f64,
        /// Event index at the new position.
        event_index: usize,
        /// Revealed evidence indices at the new position.
        evidence: Vec<usize>,
    },

    /// The session stopped.
    SessionStopped {
        /// When it stopped.
        timestamp: DateTime<Utc>,
        /// Why it stopped.
        reason: StopReason,
        /// Activity summary.
        summary: DemoSummary,
    },
}

// ---------------------------------------------------------------------------
// Envelope (adds sequence number via serde flatten)
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct EventEnvelope {
    sequence: u64,
    #[serde(flatten)]
    event: Event,
}

// ---------------------------------------------------------------------------
// Emitter
// ---------------------------------------------------------------------------

/// Thread-safe, buffered JSONL event writer.
///
/// Serialization or I/O failures are dropped; the event stream never
/// interrupts a demo.
pub struct EventEmitter {
    writer: Mutex<BufWriter<Box<dyn Write + Send>>>,
    sequence: AtomicU64,
}

impl std::fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEmitter")
            .field("sequence", &self.sequence.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl EventEmitter {
    /// Creates an emitter that writes to `writer`.
    #[must_use]
    pub fn new(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer: Mutex::new(BufWriter::new(writer)),
            sequence: AtomicU64::new(0),
        }
    }

    /// Creates an emitter that writes to stdout.
    #[must_use]
    pub fn stdout() -> Self {
        Self::new(Box::new(std::io::stdout()))
    }

    /// Creates an emitter that writes to stderr.
    #[must_use]
    pub fn stderr() -> Self {
        Self::new(Box::new(std::io::stderr()))
    }

    /// Creates an emitter that discards everything.
    #[must_use]
    pub fn noop() -> Self {
        Self::new(Box::new(std::io::sink()))
    }

    /// Creates an emitter that writes to a file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be created.
    pub fn from_file(path: &Path) -> std::io::Result<Self> {
        let file = std::fs::File::create(path)?;
        Ok(Self::new(Box::new(file)))
    }

    /// Emits an event as a single JSONL line.
    pub fn emit(&self, event: Event) {
        let seq = self.sequence.fetch_add(1, Ordering::SeqCst);
        let envelope = EventEnvelope {
            sequence: seq,
            event,
        };

        if let Ok(mut w) = self.writer.lock() {
            if let Ok(line) = serde_json::to_string(&envelope) {
                let _ = writeln!(w, "{line}");
                let _ = w.flush();
            }
        }
    }

    /// Number of events emitted so far.
    #[must_use]
    pub fn event_count(&self) -> u64 {
        self.sequence.load(Ordering::Relaxed)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex as StdMutex};

    use super::*;

    #[derive(Clone)]
    struct TestWriter(Arc<StdMutex<Vec<u8>>>);

    impl TestWriter {
        fn new() -> Self {
            Self(Arc::new(StdMutex::new(Vec::new())))
        }

        fn contents(&self) -> String {
            let buf = self.0.lock().unwrap();
            String::from_utf8_lossy(&buf).into_owned()
        }
    }

    impl Write for TestWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn phase_entered() -> Event {
        Event::PhaseEntered {
            timestamp: DateTime::parse_from_rfc3339("2026-03-02T09:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
            from: Phase::Running,
            to: Phase::Decision,
            run_id: 1,
            progress: 81.25,
        }
    }

    #[test]
    fn phase_entered_serializes_with_type_tag() {
        let json = serde_json::to_string(&phase_entered()).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["type"], "PhaseEntered");
        assert_eq!(parsed["from"], "RUNNING");
        assert_eq!(parsed["to"], "DECISION");
        assert_eq!(parsed["progress"], 81.25);
    }

    #[test]
    fn emitter_writes_sequenced_jsonl() {
        let tw = TestWriter::new();
        let emitter = EventEmitter::new(Box::new(tw.clone()));
        emitter.emit(phase_entered());
        emitter.emit(Event::DecisionMade {
            timestamp: Utc::now(),
            outcome: DecisionOutcome::Deny,
        });
        assert_eq!(emitter.event_count(), 2);

        let lines: Vec<serde_json::Value> = tw
            .contents()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines[0]["sequence"], 0);
        assert_eq!(lines[1]["sequence"], 1);
        assert_eq!(lines[1]["outcome"], "deny");
        assert!(lines[1].get("event").is_none());
    }

    #[test]
    fn session_stopped_carries_summary() {
        let event = Event::SessionStopped {
            timestamp: Utc::now(),
            reason: StopReason::Interrupted,
            summary: DemoSummary {
                phase_transitions: 9,
                runs_completed: 1,
                generations: 1,
                uptime_secs: 21.4,
            },
        };
        let parsed: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&event).unwrap()).unwrap();
        assert_eq!(parsed["reason"], "interrupted");
        assert_eq!(parsed["summary"]["runs_completed"], 1);
    }

    #[test]
    fn summary_display() {
        let summary = DemoSummary {
            phase_transitions: 3,
            runs_completed: 0,
            generations: 1,
            uptime_secs: 2.04,
        };
        assert_eq!(
            summary.to_string(),
            "transitions=3 runs=0 generations=1 uptime=2.0s"
        );
    }
}
