//! Stage workers and stage definitions.
//!
//! A worker drives one stage's progress. The executor calls
//! [`StageWorker::advance`] once per tick and applies the returned step;
//! workers never touch run state directly.

mod simulated;
mod table;

pub use simulated::SimulatedWorker;
pub use table::{scan_stage_table, seeded_scan_stage_table, StageCondition, StageDefinition, StageTable, StageTableBuilder};

pub use crate::core::ProgressStep;

use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::Arc;
use uuid::Uuid;

use crate::context::ScanConfig;
use crate::errors::StageError;

/// What a worker sees on each tick.
#[derive(Debug, Clone)]
pub struct WorkerContext {
    /// The run.
    pub run_id: Uuid,
    /// The stage being advanced.
    pub stage_id: String,
    /// Position of the stage in the table.
    pub stage_index: usize,
    /// Current progress of the stage, in `[0, 100)`.
    pub progress: f64,
    /// Zero-based tick count within this stage.
    pub tick: u64,
    /// The scan being run.
    pub config: Arc<ScanConfig>,
}

/// The result of one tick: a progress step and any log lines.
#[derive(Debug, Clone, PartialEq)]
pub struct Advance {
    /// How progress moves.
    pub step: ProgressStep,
    /// Log lines to append, in order.
    pub logs: Vec<String>,
}

impl Advance {
    /// Adds `delta` to the current progress.
    #[must_use]
    pub fn by(delta: f64) -> Self {
        Self {
            step: ProgressStep::By(delta),
            logs: Vec::new(),
        }
    }

    /// Reports an absolute progress value.
    #[must_use]
    pub fn to(progress: f64) -> Self {
        Self {
            step: ProgressStep::To(progress),
            logs: Vec::new(),
        }
    }

    /// Appends a log line.
    #[must_use]
    pub fn with_log(mut self, message: impl Into<String>) -> Self {
        self.logs.push(message.into());
        self
    }
}

/// Drives the progress of one stage.
#[async_trait]
pub trait StageWorker: Send + Sync + Debug {
    /// Performs one unit of work and reports how far the stage has come.
    ///
    /// Returning an error fails the stage and halts the run.
    async fn advance(&self, ctx: &WorkerContext) -> Result<Advance, StageError>;
}

/// A closure-backed worker.
pub struct FnWorker<F>
where
    F: Fn(&WorkerContext) -> Result<Advance, StageError> + Send + Sync,
{
    func: F,
}

impl<F> FnWorker<F>
where
    F: Fn(&WorkerContext) -> Result<Advance, StageError> + Send + Sync,
{
    /// Creates a new closure-backed worker.
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

impl<F> Debug for FnWorker<F>
where
    F: Fn(&WorkerContext) -> Result<Advance, StageError> + Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnWorker").finish_non_exhaustive()
    }
}

#[async_trait]
impl<F> StageWorker for FnWorker<F>
where
    F: Fn(&WorkerContext) -> Result<Advance, StageError> + Send + Sync,
{
    async fn advance(&self, ctx: &WorkerContext) -> Result<Advance, StageError> {
        (self.func)(ctx)
    }
}
