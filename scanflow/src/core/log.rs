//! Log entries shown in the live scan log.

use serde::{Deserialize, Serialize};

use crate::utils::{clock_time, now_utc, Timestamp};

/// A timestamped line in a run's log.
///
/// Entries are append-only; `seq` gives their strict emission order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Position in the run's log.
    pub seq: u64,
    /// The log line.
    pub message: String,
    /// Local wall-clock time, `HH:MM:SS`.
    pub timestamp: String,
    /// The stage that produced the line, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage_id: Option<String>,
    /// Exact emission time.
    pub at: Timestamp,
}

impl LogEntry {
    /// Creates a log entry stamped with the current time.
    #[must_use]
    pub fn new(seq: u64, message: impl Into<String>, stage_id: Option<&str>) -> Self {
        let at = now_utc();
        Self {
            seq,
            message: message.into(),
            timestamp: clock_time(&at),
            stage_id: stage_id.map(str::to_string),
            at,
        }
    }
}

impl std::fmt::Display for LogEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.timestamp, self.message)
    }
}
