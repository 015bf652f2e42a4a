//! Helpers for building tables and reading runs.

use std::sync::Arc;

use crate::core::RunEvent;
use crate::errors::ConfigurationError;
use crate::events::Subscription;
use crate::stages::{StageDefinition, StageTable, StageWorker};

/// Builds a table whose stages all share one worker. Titles equal ids.
pub fn uniform_table(ids: &[&str], worker: Arc<dyn StageWorker>) -> Result<StageTable, ConfigurationError> {
    ids.iter()
        .fold(StageTable::builder(), |builder, id| {
            builder.stage(StageDefinition::new(*id, *id, Arc::clone(&worker)))
        })
        .build()
}

/// Reads a subscription until the run ends.
pub async fn collect_events(mut subscription: Subscription) -> Vec<RunEvent> {
    subscription.drain().await
}

/// Returns the progress values reported for one stage, in order.
#[must_use]
pub fn progress_of(events: &[RunEvent], stage_id: &str) -> Vec<f64> {
    events
        .iter()
        .filter_map(|event| match event {
            RunEvent::Progress {
                stage_id: id,
                progress,
            } if id == stage_id => Some(*progress),
            _ => None,
        })
        .collect()
}
