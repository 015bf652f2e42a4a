//! Per-stage state and progress steps.

use serde::{Deserialize, Serialize};

use super::StageStatus;
use crate::utils::Timestamp;

/// Progress value of a completed stage.
pub const MAX_PROGRESS: f64 = 100.0;

/// A progress report from a stage worker.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ProgressStep {
    /// Add this amount to the current progress.
    By(f64),
    /// Report an absolute progress value.
    To(f64),
}

impl ProgressStep {
    /// Resolves the step against the current progress.
    ///
    /// The result never decreases below `current` and never exceeds
    /// [`MAX_PROGRESS`]. Non-finite inputs leave progress unchanged.
    #[must_use]
    pub fn apply(self, current: f64) -> f64 {
        let target = match self {
            Self::By(delta) if delta.is_finite() => current + delta.max(0.0),
            Self::To(value) if value.is_finite() => value,
            _ => current,
        };
        target.max(current).min(MAX_PROGRESS)
    }
}

/// Observable state of one stage within a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageState {
    /// Stable identifier, unique within the run.
    pub id: String,
    /// Human-readable label.
    pub title: String,
    /// Current status.
    pub status: StageStatus,
    /// Progress in `[0, 100]`.
    pub progress: f64,
    /// Wall time of the stage, recorded on completion.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed_seconds: Option<f64>,
    /// Failure message, recorded when the stage fails.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StageState {
    /// Creates a pending stage.
    #[must_use]
    pub fn pending(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            status: StageStatus::Pending,
            progress: 0.0,
            elapsed_seconds: None,
            error: None,
        }
    }
}

/// One entry in a run's status-transition log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusTransition {
    /// Position in the transition log.
    pub seq: u64,
    /// The stage that changed status.
    pub stage_id: String,
    /// Status before the change.
    pub from: StageStatus,
    /// Status after the change.
    pub to: StageStatus,
    /// When the change happened.
    pub at: Timestamp,
}
