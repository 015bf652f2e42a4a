//! Error types for the scanflow executor.
//!
//! Configuration problems are rejected before any stage starts. Stage
//! failures and cancellations are terminal run states; they only surface as
//! errors when a caller asks a finished run for its results.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use crate::core::CancelReason;

/// The main error type for scanflow operations.
#[derive(Debug, Error)]
pub enum ScanflowError {
    /// The stage table or executor configuration was rejected.
    #[error("{0}")]
    Configuration(#[from] ConfigurationError),

    /// A stage worker failed and the run halted.
    #[error("{0}")]
    StageFailure(#[from] StageFailure),

    /// The run was cancelled before it produced results.
    #[error("Run {run_id} cancelled ({reason})")]
    Cancelled {
        /// The cancelled run.
        run_id: Uuid,
        /// Why the run was cancelled.
        reason: CancelReason,
    },

    /// A run is already active and the overlap policy rejects new ones.
    #[error("Run {run_id} is still in progress")]
    RunInProgress {
        /// The run that is still active.
        run_id: Uuid,
    },

    /// A scan result violates the result invariants.
    #[error("Invalid scan result for {url}: {reason}")]
    InvalidResult {
        /// The offending target.
        url: String,
        /// Which invariant failed.
        reason: String,
    },

    /// The run state machine refused a transition.
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    /// No async runtime was available to drive the run.
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ScanflowError {
    /// Returns true if the error is a user-facing cancellation rather than a fault.
    #[must_use]
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

/// Machine-readable details attached to a configuration error.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct ErrorInfo {
    /// Stable error code (e.g., "TABLE-EMPTY").
    pub code: String,
    /// Short summary of the error.
    pub summary: String,
    /// Hint for fixing the error.
    pub fix_hint: Option<String>,
    /// Additional context key-value pairs.
    #[serde(default)]
    pub context: HashMap<String, String>,
}

impl ErrorInfo {
    /// Creates a new error info.
    #[must_use]
    pub fn new(code: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            summary: summary.into(),
            fix_hint: None,
            context: HashMap::new(),
        }
    }

    /// Sets the fix hint.
    #[must_use]
    pub fn with_fix_hint(mut self, hint: impl Into<String>) -> Self {
        self.fix_hint = Some(hint.into());
        self
    }

    /// Adds a single context entry.
    #[must_use]
    pub fn with_context_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }
}

/// Error raised when a run is requested with an unusable configuration.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ConfigurationError {
    /// The error message.
    pub message: String,
    /// The stages involved in the error.
    pub stages: Vec<String>,
    /// Optional structured details.
    pub error_info: Option<ErrorInfo>,
}

impl ConfigurationError {
    /// Creates a new configuration error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stages: Vec::new(),
            error_info: None,
        }
    }

    /// Sets the stages involved.
    #[must_use]
    pub fn with_stages(mut self, stages: Vec<String>) -> Self {
        self.stages = stages;
        self
    }

    /// Sets the structured error info.
    #[must_use]
    pub fn with_error_info(mut self, info: ErrorInfo) -> Self {
        self.error_info = Some(info);
        self
    }

    /// Returns the error code, if one was attached.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        self.error_info.as_ref().map(|info| info.code.as_str())
    }
}

/// How a stage failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The worker returned an error.
    Error,
    /// The worker panicked.
    Panic,
    /// The stage exceeded its maximum duration.
    Timeout,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Panic => write!(f, "panic"),
            Self::Timeout => write!(f, "timeout"),
        }
    }
}

/// A stage failure, surfaced to observers with the failing stage's id.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("Stage '{stage_id}' failed ({kind}): {message}")]
pub struct StageFailure {
    /// The stage that failed.
    pub stage_id: String,
    /// What went wrong.
    pub message: String,
    /// How it failed.
    pub kind: FailureKind,
}

impl StageFailure {
    /// Creates a new stage failure.
    #[must_use]
    pub fn new(stage_id: impl Into<String>, message: impl Into<String>, kind: FailureKind) -> Self {
        Self {
            stage_id: stage_id.into(),
            message: message.into(),
            kind,
        }
    }
}

/// Error reported by a stage worker.
///
/// The executor attaches the stage id when converting this into a
/// [`StageFailure`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct StageError {
    /// The error message.
    pub message: String,
}

impl StageError {
    /// Creates a new stage error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<anyhow::Error> for StageError {
    fn from(err: anyhow::Error) -> Self {
        Self::new(format!("{err:#}"))
    }
}
