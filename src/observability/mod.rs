//! Logging, metrics, and the structured event stream.

pub mod events;
pub mod logging;
pub mod metrics;

pub use events::{DemoSummary, Event, EventEmitter, StopReason};
pub use logging::{LogFormat, init_logging};
pub use metrics::init_metrics;
