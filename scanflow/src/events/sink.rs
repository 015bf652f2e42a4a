//! Event sink trait and implementations.

use parking_lot::RwLock;
use std::fmt::Debug;
use tracing::{debug, info, Level};
use uuid::Uuid;

use crate::core::RunEvent;

/// Receives every event of every run started by an executor.
///
/// Sinks are invoked synchronously while the run's state lock is held, so
/// they see events in emission order. They must return quickly and must not
/// call back into the run. A sink that needs async I/O should hand events to
/// its own channel.
pub trait EventSink: Send + Sync + Debug {
    /// Emits an event without blocking.
    ///
    /// This method should never fail. Errors are logged but suppressed.
    fn try_emit(&self, run_id: Uuid, event: &RunEvent);
}

/// A no-op event sink that discards all events.
///
/// Used as the default when no sink is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpEventSink;

impl EventSink for NoOpEventSink {
    fn try_emit(&self, _run_id: Uuid, _event: &RunEvent) {}
}

/// An event sink that logs events using the tracing framework.
#[derive(Debug, Clone)]
pub struct LoggingEventSink {
    level: Level,
}

impl Default for LoggingEventSink {
    fn default() -> Self {
        Self { level: Level::INFO }
    }
}

impl LoggingEventSink {
    /// Creates a new logging event sink with the specified level.
    #[must_use]
    pub fn new(level: Level) -> Self {
        Self { level }
    }

    /// Creates a debug-level logging sink.
    #[must_use]
    pub fn debug() -> Self {
        Self::new(Level::DEBUG)
    }

    /// Creates an info-level logging sink.
    #[must_use]
    pub fn info() -> Self {
        Self::new(Level::INFO)
    }

    fn log_event(&self, run_id: Uuid, event: &RunEvent) {
        let event_type = event.event_type();
        let data = serde_json::to_string(event).unwrap_or_default();
        let stage_id = event.stage_id().unwrap_or("-");

        if self.level == Level::DEBUG {
            debug!(run_id = %run_id, event_type, stage_id, event_data = %data, "Event: {}", event_type);
        } else {
            info!(run_id = %run_id, event_type, stage_id, event_data = %data, "Event: {}", event_type);
        }
    }
}

impl EventSink for LoggingEventSink {
    fn try_emit(&self, run_id: Uuid, event: &RunEvent) {
        self.log_event(run_id, event);
    }
}

/// A sink that keeps every event it receives.
#[derive(Debug, Default)]
pub struct CollectingEventSink {
    events: RwLock<Vec<(Uuid, RunEvent)>>,
}

impl CollectingEventSink {
    /// Creates a new collecting sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all collected events.
    #[must_use]
    pub fn events(&self) -> Vec<(Uuid, RunEvent)> {
        self.events.read().clone()
    }

    /// Returns the events of one run.
    #[must_use]
    pub fn events_for(&self, run_id: Uuid) -> Vec<RunEvent> {
        self.events
            .read()
            .iter()
            .filter(|(id, _)| *id == run_id)
            .map(|(_, event)| event.clone())
            .collect()
    }

    /// Returns the number of collected events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    /// Returns true if no events have been collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    /// Clears all collected events.
    pub fn clear(&self) {
        self.events.write().clear();
    }

    /// Returns events whose type starts with a prefix, such as `"stage."`.
    #[must_use]
    pub fn events_of_type(&self, type_prefix: &str) -> Vec<RunEvent> {
        self.events
            .read()
            .iter()
            .filter(|(_, e)| e.event_type().starts_with(type_prefix))
            .map(|(_, e)| e.clone())
            .collect()
    }
}

impl EventSink for CollectingEventSink {
    fn try_emit(&self, run_id: Uuid, event: &RunEvent) {
        self.events.write().push((run_id, event.clone()));
    }
}
