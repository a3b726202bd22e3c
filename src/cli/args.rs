//! CLI argument definitions.
//!
//! All Clap derive structs for `testday` command-line parsing.

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};

use crate::artifacts::DemoMode;
use crate::observability::LogFormat;
use crate::session::DecisionOutcome;

// ============================================================================
// Root CLI
// ============================================================================

/// Scripted business-day demo engine.
#[derive(Parser, Debug)]
#[command(name = "testday", author, version, about)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all non-error output.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output control.
    #[arg(long, default_value = "auto", global = true, env = "TESTDAY_COLOR")]
    pub color: ColorChoice,

    /// Log output format.
    #[arg(long, default_value = "human", global = true, env = "TESTDAY_LOG_FORMAT")]
    pub log_format: LogFormat,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Drive a complete demo session headlessly.
    Run(RunArgs),

    /// Restore a saved session and move through its replay.
    Replay(ReplayArgs),

    /// Print the business-day event schedule.
    Schedule(ScheduleArgs),

    /// Generate shell completion scripts.
    Completions(CompletionsArgs),

    /// Display version information.
    Version(VersionArgs),
}

// ============================================================================
// Run / Replay / Schedule
// ============================================================================

/// Arguments for `run`.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Business description to launch.
    #[arg(short, long)]
    pub prompt: String,

    /// UI locale; defaults to the configured locale.
    #[arg(short, long)]
    pub locale: Option<String>,

    /// Demo mode.
    #[arg(short, long, default_value = "zero")]
    pub mode: ModeArg,

    /// Region code from the region catalog.
    #[arg(long)]
    pub region: Option<String>,

    /// Industry key.
    #[arg(long)]
    pub industry: Option<String>,

    /// Resolution chosen at the decision point.
    #[arg(short, long, default_value = "approve")]
    pub decision: DecisionArg,

    /// Use the built-in generator instead of the configured service.
    #[arg(long)]
    pub offline: bool,

    /// Path to YAML configuration file.
    #[arg(short, long, env = "TESTDAY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Write JSONL session events to this file.
    #[arg(long)]
    pub events: Option<PathBuf>,

    /// Persist the session to this file.
    #[arg(long)]
    pub snapshot: Option<PathBuf>,

    /// Serve Prometheus metrics on this port.
    #[arg(long, env = "TESTDAY_METRICS_PORT")]
    pub metrics_port: Option<u16>,

    /// Replay positions to scrub to once the run finished.
    #[arg(long, value_delimiter = ',')]
    pub scrub: Vec<f64>,

    /// Run a market reality check on the prompt after launch.
    #[arg(long)]
    pub reality_check: bool,

    /// Write a voice briefing of the business to this file.
    #[arg(long)]
    pub voice: Option<PathBuf>,

    /// Output format.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,
}

/// Arguments for `replay`.
#[derive(Args, Debug)]
#[command(group = clap::ArgGroup::new("motion").multiple(false))]
pub struct ReplayArgs {
    /// Snapshot file written by `run --snapshot`.
    pub snapshot: PathBuf,

    /// Scrub to this progress position.
    #[arg(long, group = "motion", allow_negative_numbers = true)]
    pub at: Option<f64>,

    /// Jump to the next event.
    #[arg(long, group = "motion")]
    pub next: bool,

    /// Jump to the previous event.
    #[arg(long, group = "motion")]
    pub prev: bool,

    /// Output format.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,
}

/// Arguments for `schedule`.
#[derive(Args, Debug)]
pub struct ScheduleArgs {
    /// Output format.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,
}

// ============================================================================
// Completions / Version
// ============================================================================

/// Arguments for shell completion generation.
#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// Target shell for completion script.
    pub shell: Shell,
}

/// Arguments for version display.
#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Output format.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,
}

// ============================================================================
// CLI-Local Enums
// ============================================================================

/// Color output choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ColorChoice {
    /// Auto-detect terminal support.
    #[default]
    Auto,
    /// Always use color.
    Always,
    /// Never use color.
    Never,
}

/// Demo mode argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ModeArg {
    /// Start a business from zero.
    #[default]
    Zero,
    /// Digitize an existing business.
    Digitize,
}

impl From<ModeArg> for DemoMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Zero => Self::Zero,
            ModeArg::Digitize => Self::Digitize,
        }
    }
}

/// Decision argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum DecisionArg {
    /// Approve the agent's request.
    #[default]
    Approve,
    /// Deny it.
    Deny,
    /// Ask for photo evidence first.
    Photo,
}

impl From<DecisionArg> for DecisionOutcome {
    fn from(decision: DecisionArg) -> Self {
        match decision {
            DecisionArg::Approve => Self::Approve,
            DecisionArg::Deny => Self::Deny,
            DecisionArg::Photo => Self::Photo,
        }
    }
}

/// Output format for structured output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output.
    #[default]
    Human,
    /// JSON output.
    Json,
}

/// Shell type for completion generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Shell {
    /// Bash shell.
    Bash,
    /// Zsh shell.
    Zsh,
    /// Fish shell.
    Fish,
    /// `PowerShell`.
    #[value(name = "powershell")]
    PowerShell,
    /// Elvish shell.
    Elvish,
}

// ============================================================================
// Tests
// ============================================================================
