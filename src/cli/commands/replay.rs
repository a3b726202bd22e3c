//! `replay` command handler.

use serde_json::json;

use crate::cli::args::{OutputFormat, ReplayArgs};
use crate::error::TestDayError;
use crate::session::{Action, DemoSession, SessionMachine, Timing};
use crate::snapshot::{RestoreStatus, SnapshotStore};
use crate::timeline::{Driver, Schedule};

/// Restore a saved session, optionally move its replay position, and
/// print the state at that position.
///
/// The moved position is written back to the snapshot.
///
/// # Errors
///
/// Returns an I/O error if the snapshot is missing, a usage error if it is
/// unusable, or a session error if the session is not in REPLAY.
#[allow(clippy::unused_async)] // dispatched alongside the async handlers
pub async fn run(args: &ReplayArgs) -> Result<(), TestDayError> {
    let schedule = Schedule::standard();
    let store = SnapshotStore::new(&args.snapshot);
    let (session, status) = store.restore(&schedule);
    match status {
        RestoreStatus::Restored => {}
        RestoreStatus::Missing => {
            return Err(TestDayError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("snapshot not found: {}", args.snapshot.display()),
            )));
        }
        RestoreStatus::Discarded => {
            return Err(TestDayError::Usage(format!(
                "snapshot is unusable: {}",
                args.snapshot.display()
            )));
        }
    }

    let mut machine =
        SessionMachine::with_session(session, schedule, Driver::default(), Timing::default());
    let action = if let Some(target) = args.at {
        Some(Action::Scrub(target))
    } else if args.next {
        Some(Action::StepNext)
    } else if args.prev {
        Some(Action::StepPrevious)
    } else {
        None
    };
    if let Some(action) = action {
        machine.dispatch(action)?;
        store.save(machine.session())?;
    }

    print_state(machine.session(), machine.schedule(), args.format)?;
    Ok(())
}

fn print_state(
    session: &DemoSession,
    schedule: &Schedule,
    format: OutputFormat,
) -> Result<(), TestDayError> {
    let index = session.current_event_index();
    let time = schedule.get(index).map_or("", |e| e.time.as_ref());
    let evidence: Vec<usize> = session.evidence_revealed().iter().collect();
    match format {
        OutputFormat::Human => {
            println!("phase:    {}", session.phase());
            println!("progress: {:.2}%", session.timeline_progress());
            println!("event:    {index} ({time})");
            println!("evidence: {evidence:?}");
            if let Some(outcome) = session.decision_outcome() {
                println!("decision: {outcome}");
            }
        }
        OutputFormat::Json => {
            let state = json!({
                "phase": session.phase(),
                "progress": session.timeline_progress(),
                "event_index": index,
                "time": time,
                "evidence": evidence,
                "decision": session.decision_outcome(),
            });
            println!("{}", serde_json::to_string_pretty(&state)?);
        }
    }
    Ok(())
}
