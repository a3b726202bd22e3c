//! `schedule` command handler.

use crate::cli::args::{OutputFormat, ScheduleArgs};
use crate::error::TestDayError;
use crate::timeline::{EVIDENCE_THRESHOLDS, Schedule};

/// Print the built-in event schedule and evidence thresholds.
///
/// # Errors
///
/// Returns a JSON error if serialization fails.
pub fn run(args: &ScheduleArgs) -> Result<(), TestDayError> {
    let schedule = Schedule::standard();
    match args.format {
        OutputFormat::Human => {
            for (index, event) in schedule.events().iter().enumerate() {
                let marker = if event.is_decision_point {
                    "  <- decision"
                } else {
                    ""
                };
                println!(
                    "{index}  {}  {:>6.2}%{marker}",
                    event.time, event.progress_threshold
                );
            }
            let thresholds = EVIDENCE_THRESHOLDS
                .iter()
                .map(|t| format!("{t}%"))
                .collect::<Vec<_>>()
                .join(", ");
            println!("evidence unlocks at {thresholds}");
        }
        OutputFormat::Json => {
            let doc = serde_json::json!({
                "events": schedule.events(),
                "evidence_thresholds": EVIDENCE_THRESHOLDS,
            });
            println!("{}", serde_json::to_string_pretty(&doc)?);
        }
    }
    Ok(())
}
