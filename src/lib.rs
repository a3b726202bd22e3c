//! `testday` - scripted business-day demo engine
//!
//! A demo session moves from a typed business prompt through artifact
//! generation, a simulated business day with one decision point, an
//! evidence reveal, and finally a scrubbable replay of the day.

pub mod artifacts;
pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod inflight;
pub mod lookup;
pub mod observability;
pub mod session;
pub mod snapshot;
pub mod timeline;
pub mod voice;
