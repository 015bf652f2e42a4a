//! A worker that fakes progress with random increments.

use async_trait::async_trait;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{Advance, StageWorker, WorkerContext};
use crate::core::MAX_PROGRESS;
use crate::errors::{ConfigurationError, ErrorInfo, StageError};

const DEFAULT_MIN_INCREMENT: f64 = 0.5;
const DEFAULT_MAX_INCREMENT: f64 = 15.0;

/// Adds a random increment in `[min, max)` on every tick.
///
/// Milestone lines are logged on the tick that first carries progress to or
/// past their threshold.
#[derive(Debug)]
pub struct SimulatedWorker {
    rng: Mutex<StdRng>,
    min_increment: f64,
    max_increment: f64,
    milestones: Vec<(f64, String)>,
}

impl Default for SimulatedWorker {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedWorker {
    /// Creates a worker seeded from system entropy.
    #[must_use]
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Creates a worker with a fixed seed, for reproducible runs.
    #[must_use]
    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            rng: Mutex::new(rng),
            min_increment: DEFAULT_MIN_INCREMENT,
            max_increment: DEFAULT_MAX_INCREMENT,
            milestones: Vec::new(),
        }
    }

    /// Sets the increment range. `min` must be positive and below `max`.
    pub fn with_increment_range(mut self, min: f64, max: f64) -> Result<Self, ConfigurationError> {
        if !(min > 0.0 && min < max && max.is_finite()) {
            return Err(ConfigurationError::new(format!(
                "Invalid increment range [{min}, {max})"
            ))
            .with_error_info(
                ErrorInfo::new("CONFIG-INVALID", "increment range must be positive and non-empty")
                    .with_fix_hint("Use 0 < min < max."),
            ));
        }
        self.min_increment = min;
        self.max_increment = max;
        Ok(self)
    }

    /// Adds a milestone log line at a progress threshold.
    #[must_use]
    pub fn with_milestone(mut self, threshold: f64, message: impl Into<String>) -> Self {
        self.milestones.push((threshold, message.into()));
        self.milestones.sort_by(|a, b| a.0.total_cmp(&b.0));
        self
    }

    /// Returns the increment range.
    #[must_use]
    pub fn increment_range(&self) -> (f64, f64) {
        (self.min_increment, self.max_increment)
    }
}

#[async_trait]
impl StageWorker for SimulatedWorker {
    async fn advance(&self, ctx: &WorkerContext) -> Result<Advance, StageError> {
        let delta = self.rng.lock().gen_range(self.min_increment..self.max_increment);
        let next = (ctx.progress + delta).min(MAX_PROGRESS);

        let mut advance = Advance::by(delta);
        for (threshold, message) in &self.milestones {
            if ctx.progress < *threshold && next >= *threshold {
                advance = advance.with_log(message.clone());
            }
        }
        Ok(advance)
    }
}
