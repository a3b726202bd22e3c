//! Command-line interface
//!
//! - [`args`]: Clap derive definitions
//! - [`commands`]: handlers and dispatch

pub mod args;
pub mod commands;
