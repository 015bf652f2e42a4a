//! Pipeline execution.
//!
//! This module provides:
//! - `PipelineExecutor`, which starts runs and enforces the overlap policy
//! - `RunHandle`, the caller's and observers' view of one run
//! - The driver that advances a run's stages strictly in order

mod driver;
mod executor;
mod handle;

#[cfg(test)]
mod integration_tests;

pub use executor::PipelineExecutor;
pub use handle::RunHandle;
