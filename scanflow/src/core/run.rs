//! The run state machine.
//!
//! `RunState` is the single owner of a run's stage list, log buffer and
//! transition log. Every mutation checks the ordering invariants and returns
//! the events observers must see; it never emits anything itself.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{
    LogEntry, ProgressStep, RunEvent, RunStatus, StageState, StageStatus, StatusTransition,
    TerminalSignal, MAX_PROGRESS,
};
use crate::errors::{ScanflowError, StageFailure};
use crate::utils::{now_utc, Timestamp};

/// A read-only copy of a run's observable state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSnapshot {
    /// The run.
    pub run_id: Uuid,
    /// Run status.
    pub status: RunStatus,
    /// Stages in execution order.
    pub stages: Vec<StageState>,
    /// Every status change so far.
    pub transitions: Vec<StatusTransition>,
    /// When the run was created.
    pub started_at: Timestamp,
    /// The terminal signal, once the run has ended.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signal: Option<TerminalSignal>,
}

impl RunSnapshot {
    /// Returns the active stage, if any.
    #[must_use]
    pub fn active_stage(&self) -> Option<&StageState> {
        self.stages.iter().find(|s| s.status == StageStatus::Active)
    }

    /// Looks up a stage by id.
    #[must_use]
    pub fn stage(&self, stage_id: &str) -> Option<&StageState> {
        self.stages.iter().find(|s| s.id == stage_id)
    }

    /// Returns the statuses of all stages in order.
    #[must_use]
    pub fn statuses(&self) -> Vec<StageStatus> {
        self.stages.iter().map(|s| s.status).collect()
    }

    /// Returns the overall progress across all stages, in `[0, 100]`.
    #[must_use]
    pub fn overall_progress(&self) -> f64 {
        if self.stages.is_empty() {
            return 0.0;
        }
        let total: f64 = self
            .stages
            .iter()
            .map(|s| if s.status == StageStatus::Skipped { MAX_PROGRESS } else { s.progress })
            .sum();
        total / self.stages.len() as f64
    }
}

/// Mutable state of one run.
#[derive(Debug, Clone)]
pub struct RunState {
    run_id: Uuid,
    status: RunStatus,
    stages: Vec<StageState>,
    log: Vec<LogEntry>,
    transitions: Vec<StatusTransition>,
    started_at: Timestamp,
    signal: Option<TerminalSignal>,
}

impl RunState {
    /// Creates a running state with every stage pending.
    #[must_use]
    pub fn new(run_id: Uuid, stages: Vec<StageState>) -> Self {
        let stages = stages
            .into_iter()
            .map(|s| StageState::pending(s.id, s.title))
            .collect();

        Self {
            run_id,
            status: RunStatus::Running,
            stages,
            log: Vec::new(),
            transitions: Vec::new(),
            started_at: now_utc(),
            signal: None,
        }
    }

    /// Returns the run id.
    #[must_use]
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Returns the run status.
    #[must_use]
    pub fn status(&self) -> RunStatus {
        self.status
    }

    /// Returns true while stages may still change.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.status == RunStatus::Running
    }

    /// Returns the stages in order.
    #[must_use]
    pub fn stages(&self) -> &[StageState] {
        &self.stages
    }

    /// Returns the log buffer.
    #[must_use]
    pub fn log(&self) -> &[LogEntry] {
        &self.log
    }

    /// Returns a read-only copy of the observable state.
    #[must_use]
    pub fn snapshot(&self) -> RunSnapshot {
        RunSnapshot {
            run_id: self.run_id,
            status: self.status,
            stages: self.stages.clone(),
            transitions: self.transitions.clone(),
            started_at: self.started_at,
            signal: self.signal.clone(),
        }
    }

    /// Returns the event announcing the run.
    #[must_use]
    pub fn started_event(&self) -> RunEvent {
        RunEvent::RunStarted {
            run_id: self.run_id,
            stages: self.stages.iter().map(|s| s.id.clone()).collect(),
        }
    }

    /// Appends a log line.
    pub fn push_log(&mut self, stage_id: Option<&str>, message: impl Into<String>) -> RunEvent {
        let entry = LogEntry::new(self.log.len() as u64, message, stage_id);
        self.log.push(entry.clone());
        RunEvent::Log(entry)
    }

    /// Moves a pending stage to `Active` with progress reset to zero.
    pub fn activate(&mut self, index: usize) -> Result<RunEvent, ScanflowError> {
        self.ensure_ready(index, "activate")?;

        let stage = &mut self.stages[index];
        stage.progress = 0.0;
        self.record_transition(index, StageStatus::Active);

        Ok(RunEvent::StageStarted {
            stage_id: self.stages[index].id.clone(),
            index,
        })
    }

    /// Moves a pending stage straight to `Skipped`.
    pub fn skip(&mut self, index: usize) -> Result<RunEvent, ScanflowError> {
        self.ensure_ready(index, "skip")?;
        self.record_transition(index, StageStatus::Skipped);

        Ok(RunEvent::StageSkipped {
            stage_id: self.stages[index].id.clone(),
        })
    }

    /// Applies a progress step to the active stage.
    ///
    /// Returns `None` when the step does not move progress forward, so that
    /// repeated identical reports produce no events.
    pub fn advance(&mut self, index: usize, step: ProgressStep) -> Result<Option<RunEvent>, ScanflowError> {
        self.ensure_active(index, "advance")?;

        let stage = &mut self.stages[index];
        let next = step.apply(stage.progress);
        if next <= stage.progress {
            return Ok(None);
        }
        stage.progress = next;

        Ok(Some(RunEvent::Progress {
            stage_id: stage.id.clone(),
            progress: next,
        }))
    }

    /// Completes the active stage. Its progress must have reached 100.
    pub fn complete(&mut self, index: usize, elapsed_seconds: f64) -> Result<RunEvent, ScanflowError> {
        self.ensure_active(index, "complete")?;

        let stage = &mut self.stages[index];
        if stage.progress < MAX_PROGRESS {
            return Err(ScanflowError::InvalidTransition(format!(
                "cannot complete stage '{}' at {:.1}%",
                stage.id, stage.progress
            )));
        }
        stage.progress = MAX_PROGRESS;
        stage.elapsed_seconds = Some(elapsed_seconds);
        self.record_transition(index, StageStatus::Completed);

        Ok(RunEvent::StageCompleted {
            stage_id: self.stages[index].id.clone(),
            elapsed_seconds,
        })
    }

    /// Marks the active stage as failed. Progress keeps its last value.
    pub fn fail(&mut self, index: usize, failure: &StageFailure) -> Result<RunEvent, ScanflowError> {
        self.ensure_active(index, "fail")?;

        self.stages[index].error = Some(failure.message.clone());
        self.record_transition(index, StageStatus::Failed);

        Ok(RunEvent::StageFailed {
            failure: failure.clone(),
        })
    }

    /// Enters the finalizing phase once every stage is done.
    ///
    /// From here on the run can no longer be cancelled.
    pub fn begin_finalizing(&mut self) -> Result<(), ScanflowError> {
        if self.status != RunStatus::Running {
            return Err(ScanflowError::InvalidTransition(format!(
                "cannot finalize a run that is {}",
                self.status
            )));
        }
        if let Some(stage) = self.stages.iter().find(|s| !s.status.is_done()) {
            return Err(ScanflowError::InvalidTransition(format!(
                "cannot finalize while stage '{}' is {}",
                stage.id, stage.status
            )));
        }
        self.status = RunStatus::Finalizing;
        Ok(())
    }

    /// Ends the run. Returns `None` if it had already ended.
    pub fn finish(&mut self, signal: TerminalSignal) -> Option<RunEvent> {
        if self.status.is_terminal() {
            return None;
        }
        self.status = match signal {
            TerminalSignal::Completed { .. } => RunStatus::Completed,
            TerminalSignal::Cancelled { .. } => RunStatus::Cancelled,
            TerminalSignal::Failed { .. } => RunStatus::Failed,
        };
        self.signal = Some(signal.clone());
        Some(RunEvent::Finished { signal })
    }

    fn ensure_ready(&self, index: usize, action: &str) -> Result<(), ScanflowError> {
        let stage = self.stage_at(index, action)?;
        if !self.is_running() {
            return Err(ScanflowError::InvalidTransition(format!(
                "cannot {action} stage '{}' in a {} run",
                stage.id, self.status
            )));
        }
        if stage.status != StageStatus::Pending {
            return Err(ScanflowError::InvalidTransition(format!(
                "cannot {action} stage '{}' from {}",
                stage.id, stage.status
            )));
        }
        if let Some(blocker) = self.stages[..index].iter().find(|s| !s.status.is_done()) {
            return Err(ScanflowError::InvalidTransition(format!(
                "cannot {action} stage '{}' before '{}' is done",
                stage.id, blocker.id
            )));
        }
        Ok(())
    }

    fn ensure_active(&self, index: usize, action: &str) -> Result<(), ScanflowError> {
        let stage = self.stage_at(index, action)?;
        if !self.is_running() || stage.status != StageStatus::Active {
            return Err(ScanflowError::InvalidTransition(format!(
                "cannot {action} stage '{}' from {} in a {} run",
                stage.id, stage.status, self.status
            )));
        }
        Ok(())
    }

    fn stage_at(&self, index: usize, action: &str) -> Result<&StageState, ScanflowError> {
        self.stages.get(index).ok_or_else(|| {
            ScanflowError::InvalidTransition(format!("cannot {action} unknown stage #{index}"))
        })
    }

    fn record_transition(&mut self, index: usize, to: StageStatus) {
        let stage = &mut self.stages[index];
        let from = stage.status;
        stage.status = to;
        self.transitions.push(StatusTransition {
            seq: self.transitions.len() as u64,
            stage_id: stage.id.clone(),
            from,
            to,
            at: now_utc(),
        });
    }
}
