//! Executor configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::errors::{ConfigurationError, ErrorInfo, ScanflowError};

/// What to do when a run is started while another is still active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlapPolicy {
    /// Cancel the active run (reason `Superseded`) and start the new one.
    #[default]
    Supersede,
    /// Refuse the new run with `ScanflowError::RunInProgress`.
    Reject,
}

/// Timing and policy settings for a [`PipelineExecutor`](crate::pipeline::PipelineExecutor).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Fixed interval between progress ticks, in milliseconds.
    #[serde(default = "default_tick_interval")]
    pub tick_interval_ms: u64,
    /// Pause after a stage completes before the next one starts, in milliseconds.
    #[serde(default = "default_stage_pause")]
    pub stage_pause_ms: u64,
    /// Maximum duration of any one stage, in milliseconds.
    #[serde(default)]
    pub stage_timeout_ms: Option<u64>,
    /// Policy for overlapping runs.
    #[serde(default)]
    pub overlap_policy: OverlapPolicy,
}

fn default_tick_interval() -> u64 {
    200
}

fn default_stage_pause() -> u64 {
    500
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval(),
            stage_pause_ms: default_stage_pause(),
            stage_timeout_ms: None,
            overlap_policy: OverlapPolicy::default(),
        }
    }
}

impl ExecutorConfig {
    /// Creates a new configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a configuration with no delays, for tests and benchmarks.
    #[must_use]
    pub fn immediate() -> Self {
        Self {
            tick_interval_ms: 0,
            stage_pause_ms: 0,
            ..Self::default()
        }
    }

    /// Sets the tick interval.
    #[must_use]
    pub fn with_tick_interval_ms(mut self, ms: u64) -> Self {
        self.tick_interval_ms = ms;
        self
    }

    /// Sets the pause between stages.
    #[must_use]
    pub fn with_stage_pause_ms(mut self, ms: u64) -> Self {
        self.stage_pause_ms = ms;
        self
    }

    /// Sets the per-stage timeout.
    #[must_use]
    pub fn with_stage_timeout_ms(mut self, ms: u64) -> Self {
        self.stage_timeout_ms = Some(ms);
        self
    }

    /// Sets the overlap policy.
    #[must_use]
    pub fn with_overlap_policy(mut self, policy: OverlapPolicy) -> Self {
        self.overlap_policy = policy;
        self
    }

    /// Gets the tick interval as Duration.
    #[must_use]
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Gets the stage pause as Duration.
    #[must_use]
    pub fn stage_pause(&self) -> Duration {
        Duration::from_millis(self.stage_pause_ms)
    }

    /// Gets the stage timeout as Duration.
    #[must_use]
    pub fn stage_timeout(&self) -> Option<Duration> {
        self.stage_timeout_ms.map(Duration::from_millis)
    }

    /// Checks the configuration for values the executor cannot honour.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.stage_timeout_ms == Some(0) {
            return Err(ConfigurationError::new("Stage timeout must be positive").with_error_info(
                ErrorInfo::new("CONFIG-INVALID", "stage_timeout_ms is zero")
                    .with_fix_hint("Omit stage_timeout_ms to disable the timeout."),
            ));
        }
        Ok(())
    }

    /// Parses and validates a JSON configuration.
    pub fn from_json_str(json: &str) -> Result<Self, ScanflowError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }
}
