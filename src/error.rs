//! Error types for `testday`
//!
//! Each domain owns a `thiserror` enum; [`TestDayError`] aggregates them and
//! maps every variant to a CLI exit code.

use std::path::PathBuf;
use thiserror::Error;

use crate::session::Phase;
use crate::timeline::PlaybackSpeed;

// ============================================================================
// Exit Codes
// ============================================================================

/// Exit codes for `testday` CLI operations.
pub struct ExitCode;

impl ExitCode {
    /// Successful execution
    pub const SUCCESS: i32 = 0;

    /// General error
    pub const ERROR: i32 = 1;

    /// Configuration error (invalid YAML, validation failure)
    pub const CONFIG_ERROR: i32 = 2;

    /// I/O error (file not found, permission denied)
    pub const IO_ERROR: i32 = 3;

    /// Collaborator error (generation, lookup, or voice service failed)
    pub const SERVICE_ERROR: i32 = 4;

    /// Session error (rejected transition, prompt too short)
    pub const SESSION_ERROR: i32 = 5;

    /// Usage error (invalid arguments, missing required options)
    pub const USAGE_ERROR: i32 = 64;

    /// Interrupted by SIGINT (Ctrl+C)
    pub const INTERRUPTED: i32 = 130;

    /// Terminated by SIGTERM
    pub const TERMINATED: i32 = 143;
}

// ============================================================================
// Top-Level Error
// ============================================================================

/// Top-level error type for `testday` operations.
#[derive(Debug, Error)]
pub enum TestDayError {
    /// Configuration loading or validation error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Session state machine rejected an action
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Artifact generation failed
    #[error(transparent)]
    Generation(#[from] GenerationError),

    /// Reality-check lookup failed
    #[error(transparent)]
    Lookup(#[from] LookupError),

    /// Voice briefing failed
    #[error(transparent)]
    Voice(#[from] VoiceError),

    /// Snapshot persistence failed
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    /// Invalid command-line usage
    #[error("usage error: {0}")]
    Usage(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl TestDayError {
    /// Returns the appropriate exit code for this error.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Json(_) | Self::Yaml(_) => ExitCode::CONFIG_ERROR,
            Self::Session(_) => ExitCode::SESSION_ERROR,
            Self::Generation(_) | Self::Lookup(_) | Self::Voice(_) => ExitCode::SERVICE_ERROR,
            Self::Snapshot(_) | Self::Io(_) => ExitCode::IO_ERROR,
            Self::Usage(_) => ExitCode::USAGE_ERROR,
        }
    }
}

// ============================================================================
// Configuration Errors
// ============================================================================

/// Configuration loading and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// YAML parsing failed
    #[error("parse error in {path}{}: {message}", line.map_or_else(String::new, |l| format!(" (line {l})")))]
    ParseError {
        /// Path to the configuration file
        path: PathBuf,
        /// Line number where the error occurred (if available)
        line: Option<usize>,
        /// Error message from the parser
        message: String,
    },

    /// Configuration validation failed
    #[error("validation failed for {path}: {}", errors.iter().map(ToString::to_string).collect::<Vec<_>>().join("; "))]
    ValidationError {
        /// Path to the configuration file
        path: String,
        /// List of validation issues found
        errors: Vec<ValidationIssue>,
    },

    /// Referenced configuration file not found
    #[error("file not found: {path}")]
    MissingFile {
        /// Path to the missing file
        path: PathBuf,
    },

    /// Required environment variable is not set
    #[error("environment variable '{var}' is not set: {location}")]
    EnvVarNotSet {
        /// Name of the variable
        var: String,
        /// Message supplied with the `${VAR:?message}` reference
        location: String,
    },

    /// Field has an invalid value
    #[error("invalid value for '{field}': got '{value}', expected {expected}")]
    InvalidValue {
        /// Name of the field with invalid value
        field: String,
        /// The actual value provided
        value: String,
        /// Description of what was expected
        expected: String,
    },
}

// ============================================================================
// Validation Types
// ============================================================================

/// A single validation issue found during configuration validation.
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    /// Dotted path to the problematic field (e.g., "delays.decision_confirm")
    pub path: String,
    /// Description of the validation issue
    pub message: String,
    /// Severity level of the issue
    pub severity: Severity,
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let prefix = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{}: {} at {}", prefix, self.message, self.path)
    }
}

/// Severity level for validation issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Error - validation failure that prevents configuration from being used
    Error,
    /// Warning - potential issue that does not prevent configuration loading
    Warning,
}

// ============================================================================
// Session Errors
// ============================================================================

/// Demo session state machine errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    /// The action is not accepted in the current phase
    #[error("invalid transition: '{action}' is not accepted in phase {phase}")]
    InvalidTransition {
        /// Phase the session was in
        phase: Phase,
        /// Name of the rejected action
        action: &'static str,
    },

    /// Launch requested with a prompt below the minimum length
    #[error("prompt too short: {length} characters (minimum {minimum})")]
    PromptTooShort {
        /// Measured prompt length
        length: usize,
        /// Required minimum
        minimum: usize,
    },

    /// Launch names an industry missing from the catalog
    #[error("unknown industry '{0}'")]
    UnknownIndustry(String),

    /// Replay speed not offered by the configuration
    #[error("replay speed {0} is not enabled")]
    SpeedNotEnabled(PlaybackSpeed),

    /// Event schedule violates its ordering or decision-point rules
    #[error("invalid schedule: {0}")]
    InvalidSchedule(String),
}

// ============================================================================
// Collaborator Errors
// ============================================================================

/// Artifact generation errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GenerationError {
    /// The service answered with `success: false`
    #[error("generation rejected: {0}")]
    Rejected(String),

    /// The service answered with a payload we cannot use
    #[error("malformed generation payload: {0}")]
    Malformed(String),

    /// Network-level failure
    #[error("network error: {0}")]
    Network(String),

    /// Non-2xx HTTP status
    #[error("generation service returned HTTP {0}")]
    HttpStatus(u16),

    /// The request exceeded its timeout
    #[error("generation timed out")]
    Timeout,
}

/// Reality-check lookup errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LookupError {
    /// Provider returned an error message
    #[error("lookup failed: {0}")]
    Failed(String),

    /// Network-level failure
    #[error("network error: {0}")]
    Network(String),

    /// Non-2xx HTTP status
    #[error("lookup service returned HTTP {0}")]
    HttpStatus(u16),

    /// The request exceeded its timeout
    #[error("lookup timed out")]
    Timeout,

    /// Another lookup is already in flight for this session
    #[error("a lookup is already in progress")]
    Busy,
}

/// Voice briefing errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VoiceError {
    /// Synthesis service failure
    #[error("voice synthesis failed: {0}")]
    Failed(String),

    /// Network-level failure
    #[error("network error: {0}")]
    Network(String),

    /// Non-2xx HTTP status
    #[error("voice service returned HTTP {0}")]
    HttpStatus(u16),

    /// The request exceeded its timeout
    #[error("voice synthesis timed out")]
    Timeout,

    /// `audioContent` was not valid base64
    #[error("invalid audio payload: {0}")]
    InvalidAudio(String),

    /// Another synthesis is already in flight
    #[error("a voice briefing is already in progress")]
    Busy,
}

/// Snapshot persistence errors.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// Writing the snapshot failed
    #[error("snapshot I/O error at {path}: {source}")]
    Io {
        /// Snapshot file path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Serializing the session failed
    #[error("snapshot serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

// ============================================================================
// Result Type Alias
// ============================================================================

/// Result type alias for `testday` operations.
pub type Result<T> = std::result::Result<T, TestDayError>;

// ============================================================================
// Tests
// ============================================================================
