//! Stage workers with scripted behavior.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::errors::StageError;
use crate::stages::{Advance, StageWorker, WorkerContext};

/// Advances by a scripted delta on each tick.
///
/// Tick `n` uses the `n`-th delta; once the script runs out the last delta
/// repeats.
#[derive(Debug)]
pub struct ScriptedWorker {
    deltas: Vec<f64>,
    log_ticks: bool,
    calls: AtomicUsize,
}

impl ScriptedWorker {
    /// Creates a worker from a list of deltas.
    #[must_use]
    pub fn steps(deltas: Vec<f64>) -> Self {
        Self {
            deltas,
            log_ticks: false,
            calls: AtomicUsize::new(0),
        }
    }

    /// Creates a worker that always advances by `delta`.
    #[must_use]
    pub fn constant(delta: f64) -> Self {
        Self::steps(vec![delta])
    }

    /// Emits one log line per tick.
    #[must_use]
    pub fn with_tick_logs(mut self) -> Self {
        self.log_ticks = true;
        self
    }

    /// Returns how many times the worker was called.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StageWorker for ScriptedWorker {
    async fn advance(&self, ctx: &WorkerContext) -> Result<Advance, StageError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let index = usize::try_from(ctx.tick).unwrap_or(usize::MAX);
        let delta = self
            .deltas
            .get(index)
            .or_else(|| self.deltas.last())
            .copied()
            .unwrap_or(0.0);

        let advance = Advance::by(delta);
        if self.log_ticks {
            Ok(advance.with_log(format!("{} tick {}", ctx.stage_id, ctx.tick)))
        } else {
            Ok(advance)
        }
    }
}

/// Advances normally for a number of ticks, then fails.
#[derive(Debug)]
pub struct FailingWorker {
    message: String,
    healthy_ticks: u64,
    delta: f64,
}

impl FailingWorker {
    /// Creates a worker that fails on its first tick.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            healthy_ticks: 0,
            delta: 0.0,
        }
    }

    /// Advances by `delta` for `ticks` ticks before failing.
    #[must_use]
    pub fn after(mut self, ticks: u64, delta: f64) -> Self {
        self.healthy_ticks = ticks;
        self.delta = delta;
        self
    }
}

#[async_trait]
impl StageWorker for FailingWorker {
    async fn advance(&self, ctx: &WorkerContext) -> Result<Advance, StageError> {
        if ctx.tick < self.healthy_ticks {
            Ok(Advance::by(self.delta))
        } else {
            Err(StageError::new(self.message.clone()))
        }
    }
}

/// Never returns from `advance`.
#[derive(Debug, Clone, Copy, Default)]
pub struct StallingWorker;

#[async_trait]
impl StageWorker for StallingWorker {
    async fn advance(&self, _ctx: &WorkerContext) -> Result<Advance, StageError> {
        std::future::pending().await
    }
}

/// Panics on every tick.
#[derive(Debug)]
pub struct PanickingWorker {
    message: String,
}

impl PanickingWorker {
    /// Creates a worker that panics with `message`.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[async_trait]
impl StageWorker for PanickingWorker {
    async fn advance(&self, _ctx: &WorkerContext) -> Result<Advance, StageError> {
        panic!("{}", self.message);
    }
}
