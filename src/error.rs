//! Error types with fix suggestions
//!
//! [`FlowError`] covers everything the combinators can reject on their own:
//! bad concurrency limits, malformed configuration, panicking spawned tasks.
//! Task failures are never wrapped in it; they come back as the task's own
//! error type.

use std::convert::Infallible;

use thiserror::Error;

/// Trait for errors that provide fix suggestions
pub trait FixSuggestion {
    fn fix_suggestion(&self) -> Option<&str>;
}

/// Errors raised by the combinators themselves.
///
/// Pools convert these into the caller's error type through
/// `E: From<FlowError>`, which `anyhow::Error` satisfies for free.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FlowError {
    // ─────────────────────────────────────────────────────────────
    // Configuration errors (FLOW-001 to FLOW-003)
    // ─────────────────────────────────────────────────────────────
    #[error("FLOW-001: concurrency must be at least 1, got {value}")]
    InvalidConcurrency { value: i64 },

    #[error("FLOW-002: Config error: {reason}")]
    ConfigError { reason: String },

    #[error("FLOW-003: Environment variable {var}='{value}' is not a positive integer")]
    InvalidEnvVar { var: String, value: String },

    // ─────────────────────────────────────────────────────────────
    // Execution errors (FLOW-010 to FLOW-011)
    // ─────────────────────────────────────────────────────────────
    #[error("FLOW-010: Task {index} panicked: {reason}")]
    TaskPanicked { index: usize, reason: String },

    #[error("FLOW-011: Spawned task was cancelled: {reason}")]
    TaskCancelled { reason: String },
}

impl FlowError {
    /// Stable error code (e.g. `FLOW-001`)
    pub fn code(&self) -> &'static str {
        match self {
            FlowError::InvalidConcurrency { .. } => "FLOW-001",
            FlowError::ConfigError { .. } => "FLOW-002",
            FlowError::InvalidEnvVar { .. } => "FLOW-003",
            FlowError::TaskPanicked { .. } => "FLOW-010",
            FlowError::TaskCancelled { .. } => "FLOW-011",
        }
    }

    /// True for errors raised before any task was started
    pub fn is_config_error(&self) -> bool {
        !matches!(
            self,
            FlowError::TaskPanicked { .. } | FlowError::TaskCancelled { .. }
        )
    }
}

impl FixSuggestion for FlowError {
    fn fix_suggestion(&self) -> Option<&str> {
        match self {
            FlowError::InvalidConcurrency { .. } => {
                Some("Pass a concurrency of 1 or more (1 runs tasks one at a time)")
            }
            FlowError::ConfigError { .. } => {
                Some("Check the TOML syntax and that `concurrency` is a positive integer")
            }
            FlowError::InvalidEnvVar { .. } => {
                Some("Set TASKLINE_CONCURRENCY to a positive integer or unset it")
            }
            FlowError::TaskPanicked { .. } => {
                Some("Return an Err from the task instead of panicking")
            }
            FlowError::TaskCancelled { .. } => {
                Some("Keep the tokio runtime alive until the pool finishes")
            }
        }
    }
}

impl From<Infallible> for FlowError {
    fn from(never: Infallible) -> Self {
        match never {}
    }
}

pub type Result<T, E = FlowError> = std::result::Result<T, E>;
