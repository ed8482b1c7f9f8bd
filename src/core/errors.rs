use crate::run::{RunId, RunState};
use thiserror::Error;

/// Unified error type for the handoff registry
#[derive(Debug, Error)]
pub enum HandoffError {
    /// The run identity has no registered record (never created, or retired)
    #[error("Unknown run: {run_id}")]
    UnknownRun { run_id: RunId },

    /// `create_run` was called twice for the same identity
    #[error("Run already registered: {run_id}")]
    DuplicateRun { run_id: RunId },

    /// A single-assignment slot was written a second time
    #[error("Slot '{slot}' already written{}", run_suffix(.run_id))]
    DoubleWrite {
        run_id: Option<RunId>,
        slot: &'static str,
    },

    /// The operation is not legal in the run's current protocol state
    #[error("Invalid state for {operation} on run {run_id}: {state}")]
    InvalidState {
        run_id: RunId,
        state: RunState,
        operation: String,
    },

    /// Retirement requested before the outcome was published
    #[error("Run {run_id} has not completed (state: {state})")]
    RunNotComplete { run_id: RunId, state: RunState },

    /// Bounded wait expired
    #[error("Operation timed out: {operation} (timeout: {timeout_ms}ms)")]
    Timeout { operation: String, timeout_ms: u64 },

    /// Wait aborted through a cancel token
    #[error("Operation was cancelled: {operation}")]
    Cancelled { operation: String },

    #[error("Registry full: {limit} active runs")]
    RegistryFull { limit: usize },

    #[error("Ready queue full: capacity {capacity} reached")]
    QueueFull { capacity: usize },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("IO operation failed: {operation}")]
    Io {
        operation: String,
        #[source]
        source: std::io::Error,
    },

    /// Generic internal errors
    #[error("Internal error: {message}")]
    Internal { message: String },
}

fn run_suffix(run_id: &Option<RunId>) -> String {
    match run_id {
        Some(id) => format!(" for run {}", id),
        None => String::new(),
    }
}

impl HandoffError {
    pub fn unknown_run(run_id: &RunId) -> Self {
        Self::UnknownRun {
            run_id: run_id.clone(),
        }
    }

    pub fn duplicate_run(run_id: &RunId) -> Self {
        Self::DuplicateRun {
            run_id: run_id.clone(),
        }
    }

    /// Create a double-write error for a standalone cell
    pub fn double_write(slot: &'static str) -> Self {
        Self::DoubleWrite { run_id: None, slot }
    }

    pub fn invalid_state<S: Into<String>>(run_id: &RunId, state: RunState, operation: S) -> Self {
        Self::InvalidState {
            run_id: run_id.clone(),
            state,
            operation: operation.into(),
        }
    }

    pub fn timeout<S: Into<String>>(operation: S, timeout_ms: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout_ms,
        }
    }

    pub fn cancelled<S: Into<String>>(operation: S) -> Self {
        Self::Cancelled {
            operation: operation.into(),
        }
    }

    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn io<S: Into<String>>(operation: S, source: std::io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            source,
        }
    }

    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Attach a run identity to a cell-level error
    pub fn for_run(self, run_id: &RunId) -> Self {
        match self {
            Self::DoubleWrite { run_id: None, slot } => Self::DoubleWrite {
                run_id: Some(run_id.clone()),
                slot,
            },
            other => other,
        }
    }

    /// Check if the caller may retry the same call later
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::Cancelled { .. } | Self::QueueFull { .. } => true,
            _ => false,
        }
    }

    /// Get error category for metrics/logging
    pub fn category(&self) -> &'static str {
        match self {
            Self::UnknownRun { .. } => "unknown_run",
            Self::DuplicateRun { .. } => "duplicate_run",
            Self::DoubleWrite { .. } => "double_write",
            Self::InvalidState { .. } => "invalid_state",
            Self::RunNotComplete { .. } => "run_not_complete",
            Self::Timeout { .. } => "timeout",
            Self::Cancelled { .. } => "cancelled",
            Self::RegistryFull { .. } => "registry_full",
            Self::QueueFull { .. } => "queue_full",
            Self::Configuration { .. } => "configuration",
            Self::Io { .. } => "io",
            Self::Internal { .. } => "internal",
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, HandoffError>;

impl From<serde_json::Error> for HandoffError {
    fn from(err: serde_json::Error) -> Self {
        Self::configuration(format!("invalid JSON: {}", err))
    }
}

impl From<serde_yaml::Error> for HandoffError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::configuration(format!("invalid YAML: {}", err))
    }
}

impl From<anyhow::Error> for HandoffError {
    fn from(err: anyhow::Error) -> Self {
        Self::internal(format!("{:#}", err))
    }
}
