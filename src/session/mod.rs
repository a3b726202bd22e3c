//! Demo session
//!
//! - [`DemoSession`]: the context object and its phase
//! - [`SessionMachine`]: pure reducer producing [`Effect`]s
//! - [`DemoEngine`]: runs effects as tokio tasks

pub mod decision;
pub mod engine;
pub mod machine;
pub mod state;

pub use decision::{CHOICES, DecisionGate, GateResponse};
pub use engine::{DemoEngine, SessionUpdate};
pub use machine::{Action, Effect, SessionMachine, TimerKind, Timing};
pub use state::{
    DecisionOutcome, DemoSession, GenerationTicket, LaunchContext, MIN_PROMPT_CHARS, Phase,
    ReplayControls, TimerGuard, prompt_length,
};
