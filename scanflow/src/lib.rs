//! # Scanflow
//!
//! A staged scan pipeline executor with live progress, logs and result
//! publishing.
//!
//! Scanflow runs an ordered table of stages strictly one after another:
//!
//! - **Sequential stages**: exactly one stage is active at a time, and a stage
//!   starts only after every earlier stage has completed or been skipped
//! - **Live observation**: subscribers get a snapshot, the log backlog and
//!   then every event in order
//! - **Cancellation**: a cancelled run goes silent immediately and never
//!   produces results
//! - **Failure isolation**: worker errors, panics and timeouts become a failed
//!   run instead of crashing the process
//! - **Result publishing**: the latest completed run's results stay available
//!   to late readers until the next run starts
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use scanflow::prelude::*;
//! use std::sync::Arc;
//!
//! let executor = PipelineExecutor::new(ExecutorConfig::default());
//! let handle = executor.start(
//!     &scan_stage_table(),
//!     ScanConfig::new("https://example.com"),
//!     Arc::new(DemoResultProducer),
//! )?;
//!
//! let mut updates = handle.subscribe();
//! while let Some(event) = updates.next().await {
//!     println!("{}", event.event_type());
//! }
//! let results = handle.results().await?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod cancellation;
pub mod config;
pub mod context;
pub mod core;
pub mod errors;
pub mod events;
pub mod history;
pub mod observability;
pub mod pipeline;
pub mod responder;
pub mod results;
pub mod stages;
pub mod testing;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cancellation::CancellationToken;
    pub use crate::config::{ExecutorConfig, OverlapPolicy};
    pub use crate::context::{RunIdentity, ScanConfig, ScanOptions, ScanRequest, ScanType, SessionContext};
    pub use crate::core::{
        CancelReason, LogEntry, ProgressStep, RunEvent, RunOutcome, RunSnapshot, RunStatus,
        StageState, StageStatus, TerminalSignal,
    };
    pub use crate::errors::{
        ConfigurationError, FailureKind, ScanflowError, StageError, StageFailure,
    };
    pub use crate::events::{
        CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink, Subscription,
    };
    pub use crate::history::{HistoryEntry, HistoryQuery, ScanHistory};
    pub use crate::observability::{init_tracing, LogFormat};
    pub use crate::pipeline::{PipelineExecutor, RunHandle};
    pub use crate::responder::{ResponseRule, Responder};
    pub use crate::results::{
        DemoResultProducer, FnProducer, PublishedResults, ResultProducer, ResultPublisher,
        ScanReport, ScanResult, ScanSummary, Severity, TargetType,
    };
    pub use crate::stages::{
        scan_stage_table, seeded_scan_stage_table, Advance, FnWorker, SimulatedWorker, StageDefinition, StageTable,
        StageWorker, WorkerContext,
    };
    pub use crate::utils::{iso_timestamp, Timestamp};
}
