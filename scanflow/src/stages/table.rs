//! The stage definition table.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use super::{SimulatedWorker, StageWorker};
use crate::context::ScanConfig;
use crate::core::StageState;
use crate::errors::{ConfigurationError, ErrorInfo};

/// Predicate deciding whether a stage runs for a given scan.
pub type StageCondition = Arc<dyn Fn(&ScanConfig) -> bool + Send + Sync>;

/// One row of the stage table.
#[derive(Clone)]
pub struct StageDefinition {
    /// Stable stage id.
    pub id: String,
    /// Human-readable title.
    pub title: String,
    /// The worker that drives this stage.
    pub worker: Arc<dyn StageWorker>,
    /// Maximum duration, overriding the executor default.
    pub timeout: Option<Duration>,
    /// Runs the stage only when this returns true.
    pub condition: Option<StageCondition>,
}

impl fmt::Debug for StageDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StageDefinition")
            .field("id", &self.id)
            .field("title", &self.title)
            .field("worker", &self.worker)
            .field("timeout", &self.timeout)
            .field("conditional", &self.condition.is_some())
            .finish()
    }
}

impl StageDefinition {
    /// Creates a definition.
    pub fn new(id: impl Into<String>, title: impl Into<String>, worker: Arc<dyn StageWorker>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            worker,
            timeout: None,
            condition: None,
        }
    }

    /// Sets the stage timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Runs the stage only when `condition` holds.
    #[must_use]
    pub fn with_condition<F>(mut self, condition: F) -> Self
    where
        F: Fn(&ScanConfig) -> bool + Send + Sync + 'static,
    {
        self.condition = Some(Arc::new(condition));
        self
    }

    /// Returns true if the stage should run for this scan.
    #[must_use]
    pub fn should_run(&self, config: &ScanConfig) -> bool {
        self.condition.as_ref().map_or(true, |c| c(config))
    }
}

/// An ordered, validated list of stages.
#[derive(Debug, Clone)]
pub struct StageTable {
    stages: Vec<StageDefinition>,
}

impl StageTable {
    /// Starts building a table.
    #[must_use]
    pub fn builder() -> StageTableBuilder {
        StageTableBuilder::default()
    }

    /// Validates a list of definitions.
    pub fn new(stages: Vec<StageDefinition>) -> Result<Self, ConfigurationError> {
        validate(&stages)?;
        Ok(Self { stages })
    }

    /// Returns the definitions in execution order.
    #[must_use]
    pub fn stages(&self) -> &[StageDefinition] {
        &self.stages
    }

    /// Returns the number of stages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Always false; a table has at least one stage.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Returns the stage ids in order.
    #[must_use]
    pub fn ids(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.id.as_str()).collect()
    }

    /// Returns the all-pending initial state of every stage.
    #[must_use]
    pub fn initial_states(&self) -> Vec<StageState> {
        self.stages
            .iter()
            .map(|s| StageState::pending(s.id.clone(), s.title.clone()))
            .collect()
    }
}

/// Builder for [`StageTable`].
#[derive(Debug, Default)]
pub struct StageTableBuilder {
    stages: Vec<StageDefinition>,
}

impl StageTableBuilder {
    /// Appends a stage.
    #[must_use]
    pub fn stage(mut self, definition: StageDefinition) -> Self {
        self.stages.push(definition);
        self
    }

    /// Appends a stage from its parts.
    #[must_use]
    pub fn add(self, id: impl Into<String>, title: impl Into<String>, worker: Arc<dyn StageWorker>) -> Self {
        self.stage(StageDefinition::new(id, title, worker))
    }

    /// Validates and builds the table.
    pub fn build(self) -> Result<StageTable, ConfigurationError> {
        StageTable::new(self.stages)
    }
}

fn validate(stages: &[StageDefinition]) -> Result<(), ConfigurationError> {
    if stages.is_empty() {
        return Err(ConfigurationError::new("Stage table is empty").with_error_info(
            ErrorInfo::new("TABLE-EMPTY", "A run needs at least one stage")
                .with_fix_hint("Add a stage to the table before starting a run."),
        ));
    }

    let mut seen = HashSet::new();
    for (index, stage) in stages.iter().enumerate() {
        if stage.id.trim().is_empty() {
            return Err(ConfigurationError::new(format!("Stage #{index} has a blank id"))
                .with_error_info(
                    ErrorInfo::new("TABLE-BLANK-ID", "Stage ids must not be blank")
                        .with_context_entry("index", index.to_string()),
                ));
        }
        if stage.title.trim().is_empty() {
            return Err(ConfigurationError::new(format!("Stage '{}' has a blank title", stage.id))
                .with_stages(vec![stage.id.clone()])
                .with_error_info(ErrorInfo::new("TABLE-BLANK-TITLE", "Stage titles must not be blank")));
        }
        if !seen.insert(stage.id.as_str()) {
            return Err(ConfigurationError::new(format!("Duplicate stage id '{}'", stage.id))
                .with_stages(vec![stage.id.clone()])
                .with_error_info(
                    ErrorInfo::new("TABLE-DUPLICATE-ID", "Stage ids must be unique")
                        .with_fix_hint("Rename one of the stages."),
                ));
        }
    }
    Ok(())
}

/// Stage ids, titles and milestone lines of the default scan pipeline.
const SCAN_STAGES: &[(&str, &str, &[(f64, &str)])] = &[
    (
        "validate",
        "Validating input",
        &[(40.0, "Resolving target host"), (90.0, "Target URL is reachable")],
    ),
    (
        "crawl",
        "Crawling website",
        &[(30.0, "Discovered linked pages"), (80.0, "Crawl frontier exhausted")],
    ),
    ("check_live", "Checking live URLs", &[(50.0, "Filtering unreachable URLs")]),
    (
        "extract",
        "Extracting DOM features",
        &[(25.0, "Collecting script sources"), (60.0, "Tracing DOM sinks")],
    ),
    ("analyze", "Analyzing with AI model", &[(50.0, "Scoring extracted features")]),
    ("report", "Generating report", &[(70.0, "Compiling findings")]),
];

fn simulated_table(mut worker_for: impl FnMut(usize) -> SimulatedWorker) -> StageTable {
    let stages = SCAN_STAGES
        .iter()
        .enumerate()
        .map(|(index, &(id, title, milestones))| {
            let worker = milestones
                .iter()
                .fold(worker_for(index), |worker, &(threshold, message)| {
                    worker.with_milestone(threshold, message)
                });
            StageDefinition::new(id, title, Arc::new(worker))
        })
        .collect();
    StageTable { stages }
}

/// Returns the default scan pipeline: six simulated stages.
#[must_use]
pub fn scan_stage_table() -> StageTable {
    simulated_table(|_| SimulatedWorker::new())
}

/// Returns the default scan pipeline with reproducible progress.
///
/// Stage `i` draws its increments from `seed + i`.
#[must_use]
pub fn seeded_scan_stage_table(seed: u64) -> StageTable {
    simulated_table(|index| SimulatedWorker::seeded(seed.wrapping_add(index as u64)))
}
