//! Testing utilities for scanflow runs.
//!
//! This module provides:
//! - Scripted, failing, stalling and panicking stage workers
//! - Helpers for building tables and collecting a run's events
//! - Assertions for the ordering guarantees of a run

mod assertions;
mod fixtures;
mod workers;

pub use assertions::{
    assert_monotonic_progress, assert_sequential_transitions, assert_stage_statuses,
    assert_terminal_last,
};
pub use fixtures::{collect_events, progress_of, uniform_table};
pub use workers::{FailingWorker, PanickingWorker, ScriptedWorker, StallingWorker};
