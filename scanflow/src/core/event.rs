//! Events streamed to run observers.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{LogEntry, TerminalSignal};
use crate::errors::StageFailure;

/// A live update from a running scan.
///
/// Every event a run emits is delivered, in order, to every subscriber and
/// to the executor's [`EventSink`](crate::events::EventSink).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunEvent {
    /// The run was created with these stage ids, in execution order.
    RunStarted {
        /// The run.
        run_id: Uuid,
        /// Stage ids in execution order.
        stages: Vec<String>,
    },
    /// A stage became active.
    StageStarted {
        /// The stage.
        stage_id: String,
        /// Position in the stage table.
        index: usize,
    },
    /// A stage's progress moved forward.
    Progress {
        /// The stage.
        stage_id: String,
        /// New progress in `[0, 100]`.
        progress: f64,
    },
    /// A log line was appended.
    Log(LogEntry),
    /// A stage completed.
    StageCompleted {
        /// The stage.
        stage_id: String,
        /// Wall time of the stage.
        elapsed_seconds: f64,
    },
    /// A stage was skipped.
    StageSkipped {
        /// The stage.
        stage_id: String,
    },
    /// A stage failed.
    StageFailed {
        /// The failure.
        failure: StageFailure,
    },
    /// The run ended. No further events follow.
    Finished {
        /// How it ended.
        signal: TerminalSignal,
    },
}

impl RunEvent {
    /// Returns the dotted event type name used by event sinks.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::RunStarted { .. } => "run.started",
            Self::StageStarted { .. } => "stage.started",
            Self::Progress { .. } => "stage.progress",
            Self::Log(_) => "run.log",
            Self::StageCompleted { .. } => "stage.completed",
            Self::StageSkipped { .. } => "stage.skipped",
            Self::StageFailed { .. } => "stage.failed",
            Self::Finished { .. } => "run.finished",
        }
    }

    /// Returns the stage the event concerns, if any.
    #[must_use]
    pub fn stage_id(&self) -> Option<&str> {
        match self {
            Self::StageStarted { stage_id, .. }
            | Self::Progress { stage_id, .. }
            | Self::StageCompleted { stage_id, .. }
            | Self::StageSkipped { stage_id } => Some(stage_id),
            Self::StageFailed { failure } => Some(&failure.stage_id),
            Self::Log(entry) => entry.stage_id.as_deref(),
            Self::RunStarted { .. } | Self::Finished { .. } => None,
        }
    }

    /// Returns true if this is the run's last event.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished { .. })
    }
}
