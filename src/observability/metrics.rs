//! Prometheus metrics for demo sessions.
//!
//! Every recording function is a no-op until [`init_metrics`] installs a
//! recorder, so library users and tests pay nothing for them.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::error::TestDayError;
use crate::session::Phase;

static METRICS_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Reducer action names accepted as metric labels.
const KNOWN_ACTIONS: [&str; 21] = [
    "edit_prompt",
    "launch",
    "generation_succeeded",
    "generation_failed",
    "run_test_day",
    "tick",
    "choose_decision",
    "confirm_decision",
    "resume_run",
    "reveal_replay",
    "scrub",
    "step_next",
    "step_previous",
    "reset_replay",
    "play",
    "pause",
    "set_speed",
    "playback_tick",
    "run_again",
    "edit_from_replay",
    "start_over",
];

/// Returns `action` when it is a known reducer action, `"__unknown__"`
/// otherwise.
#[must_use]
pub fn sanitize_action_label(action: &str) -> &str {
    if KNOWN_ACTIONS.contains(&action) {
        action
    } else {
        "__unknown__"
    }
}

/// Installs the global metrics recorder.
///
/// With `Some(port)` a Prometheus scrape endpoint is served on
/// `127.0.0.1:<port>`. Calling this twice is a no-op.
///
/// # Errors
///
/// Returns `TestDayError::Io` if the recorder or listener cannot be
/// installed (e.g. port already in use).
pub fn init_metrics(port: Option<u16>) -> Result<(), TestDayError> {
    if METRICS_INITIALIZED.swap(true, Ordering::SeqCst) {
        tracing::debug!("metrics already initialized, skipping");
        return Ok(());
    }
    port.map_or_else(
        || PrometheusBuilder::new().install_recorder().map(|_| ()),
        |p| {
            PrometheusBuilder::new()
                .with_http_listener(([127, 0, 0, 1], p))
                .install()
        },
    )
    .map_err(|e| TestDayError::Io(std::io::Error::other(e.to_string())))?;

    describe_metrics();
    Ok(())
}

fn describe_metrics() {
    describe_counter!(
        "testday_phase_transitions_total",
        "Total number of session phase transitions"
    );
    describe_gauge!("testday_current_phase", "Currently active phase (1 = active)");
    describe_gauge!("testday_timeline_progress", "Timeline position in percent");
    describe_counter!(
        "testday_generations_total",
        "Artifact generation requests by status"
    );
    describe_histogram!(
        "testday_generation_duration_ms",
        "Artifact generation latency in milliseconds"
    );
    describe_counter!("testday_decisions_total", "Committed decisions by outcome");
    describe_counter!("testday_runs_completed_total", "Runs that reached 100%");
    describe_counter!(
        "testday_stale_actions_total",
        "Timer and collaborator results dropped as stale"
    );
    describe_counter!("testday_scrubs_total", "Replay position changes");
    describe_counter!("testday_lookups_total", "Reality-check lookups by result");
    describe_counter!("testday_voice_briefings_total", "Voice briefings by status");
    describe_counter!("testday_errors_total", "Errors by category");
    describe_gauge!("testday_uptime_seconds", "Process uptime in seconds");
}

/// Records a phase transition.
pub fn record_phase_transition(from: Phase, to: Phase) {
    counter!(
        "testday_phase_transitions_total",
        "from" => from.as_str(),
        "to" => to.as_str()
    )
    .increment(1);
    set_current_phase(to, Some(from));
}

/// Sets the active-phase gauge, zeroing the previous phase first.
pub fn set_current_phase(phase: Phase, previous: Option<Phase>) {
    if let Some(prev) = previous {
        gauge!("testday_current_phase", "phase" => prev.as_str()).set(0.0);
    }
    gauge!("testday_current_phase", "phase" => phase.as_str()).set(1.0);
}

/// Sets the timeline position gauge.
pub fn set_timeline_progress(progress: f64) {
    gauge!("testday_timeline_progress").set(progress);
}

/// Records the result of a generation request (`"success"`/`"failure"`).
pub fn record_generation(status: &'static str) {
    counter!("testday_generations_total", "status" => status).increment(1);
}

/// Records how long a generation request took.
pub fn record_generation_duration(duration: Duration) {
    histogram!("testday_generation_duration_ms").record(duration.as_secs_f64() * 1000.0);
}

/// Records a committed decision.
pub fn record_decision(outcome: &'static str) {
    counter!("testday_decisions_total", "outcome" => outcome).increment(1);
}

/// Records a completed run.
pub fn record_run_completed() {
    counter!("testday_runs_completed_total").increment(1);
}

/// Records a dropped stale action.
pub fn record_stale_action(action: &str) {
    let label = sanitize_action_label(action);
    counter!("testday_stale_actions_total", "action" => label.to_owned()).increment(1);
}

/// Records a replay position change.
pub fn record_scrub() {
    counter!("testday_scrubs_total").increment(1);
}

/// Records a reality-check lookup (`"hit"`, `"miss"`, `"exhausted"`, `"error"`).
pub fn record_lookup(result: &'static str) {
    counter!("testday_lookups_total", "result" => result).increment(1);
}

/// Records a voice briefing request.
pub fn record_voice(status: &'static str) {
    counter!("testday_voice_briefings_total", "status" => status).increment(1);
}

/// Records an error by category.
pub fn record_error(category: &'static str) {
    counter!("testday_errors_total", "category" => category).increment(1);
}

/// Sets the uptime gauge.
pub fn set_uptime(duration: Duration) {
    gauge!("testday_uptime_seconds").set(duration.as_secs_f64());
}
