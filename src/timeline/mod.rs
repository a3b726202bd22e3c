//! Business-day timeline
//!
//! - [`Schedule`]: ordered checkpoints and the pure progress → state mapping
//! - [`Driver`]: fixed-step live progression with pause-on-decision
//! - [`Scrubber`]: random access over a finished run

pub mod driver;
pub mod schedule;
pub mod scrubber;

pub use driver::{Driver, TickOutcome, accumulate_evidence};
pub use schedule::{
    EVIDENCE_THRESHOLDS, EventState, EvidenceSet, MAX_PROGRESS, Schedule, TimelineEvent,
    clamp_progress, evidence_at,
};
pub use scrubber::{PlaybackSpeed, ScrubPosition, Scrubber};
