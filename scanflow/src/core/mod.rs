//! Core domain model types for scanflow.
//!
//! This module contains the fundamental types used throughout the executor:
//! - Stage and run status enums
//! - Per-stage state, progress steps and the status-transition log
//! - Log entries and the run event stream
//! - Terminal outcomes
//! - The run state machine

mod event;
mod log;
mod outcome;
mod run;
mod stage;
mod status;

pub use event::RunEvent;
pub use log::LogEntry;
pub use outcome::{CancelReason, RunOutcome, TerminalSignal};
pub use run::{RunSnapshot, RunState};
pub use stage::{ProgressStep, StageState, StatusTransition, MAX_PROGRESS};
pub use status::{RunStatus, StageStatus};
