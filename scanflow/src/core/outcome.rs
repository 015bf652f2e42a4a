//! Terminal outcomes of a run.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

use crate::errors::{ScanflowError, StageFailure};
use crate::results::ScanResult;

/// Why a run was cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelReason {
    /// The user asked for it.
    User,
    /// A newer run on the same executor replaced it.
    Superseded,
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Superseded => write!(f, "superseded"),
        }
    }
}

/// The signal that ends a run's event stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TerminalSignal {
    /// Every stage completed and results were published.
    Completed {
        /// Number of published results.
        result_count: usize,
    },
    /// The run was cancelled.
    Cancelled {
        /// Why.
        reason: CancelReason,
    },
    /// A stage failed.
    Failed {
        /// The failure.
        failure: StageFailure,
    },
}

impl TerminalSignal {
    /// Short name of the outcome: `completed`, `cancelled` or `failed`.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed { .. } => "completed",
            Self::Cancelled { .. } => "cancelled",
            Self::Failed { .. } => "failed",
        }
    }
}

/// The final outcome of a run, as returned to the caller that awaits it.
#[derive(Debug, Clone)]
pub enum RunOutcome {
    /// The run completed with these results.
    Completed {
        /// The published result set.
        results: Arc<Vec<ScanResult>>,
    },
    /// The run was cancelled; no results exist.
    Cancelled {
        /// Why.
        reason: CancelReason,
    },
    /// A stage failed; no results exist.
    Failed(StageFailure),
}

impl RunOutcome {
    /// Returns the terminal signal observers saw for this outcome.
    #[must_use]
    pub fn signal(&self) -> TerminalSignal {
        match self {
            Self::Completed { results } => TerminalSignal::Completed {
                result_count: results.len(),
            },
            Self::Cancelled { reason } => TerminalSignal::Cancelled { reason: *reason },
            Self::Failed(failure) => TerminalSignal::Failed {
                failure: failure.clone(),
            },
        }
    }

    /// Returns true if the run completed.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }

    /// Converts the outcome into the result set, or the error that prevented it.
    pub fn into_result(self, run_id: Uuid) -> Result<Arc<Vec<ScanResult>>, ScanflowError> {
        match self {
            Self::Completed { results } => Ok(results),
            Self::Cancelled { reason } => Err(ScanflowError::Cancelled { run_id, reason }),
            Self::Failed(failure) => Err(ScanflowError::StageFailure(failure)),
        }
    }
}
