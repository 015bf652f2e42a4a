//! In-memory scan history.
//!
//! Completed scans are recorded by run id. Queries filter by URL substring,
//! severity and target type, and return entries newest first.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::context::{ScanConfig, ScanType};
use crate::results::{PublishedResults, Severity, TargetType};
use crate::utils::Timestamp;

/// One completed scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    /// The run.
    pub run_id: Uuid,
    /// When the results were published.
    pub recorded_at: Timestamp,
    /// The scanned URL.
    pub target_url: String,
    /// Page or domain scan.
    #[serde(rename = "type")]
    pub target_type: TargetType,
    /// Findings across all targets.
    pub vulnerabilities: u64,
    /// Worst severity found, `Low` when nothing was found.
    pub severity: Severity,
}

impl HistoryEntry {
    /// Summarizes a published run.
    #[must_use]
    pub fn from_published(published: &PublishedResults, config: &ScanConfig) -> Self {
        let target_type = match config.scan_type {
            ScanType::Single => TargetType::Page,
            ScanType::Full => TargetType::Domain,
        };
        Self {
            run_id: published.run_id,
            recorded_at: published.published_at,
            target_url: config.url.clone(),
            target_type,
            vulnerabilities: published.summary.total_vulnerabilities,
            severity: published.summary.highest_severity.unwrap_or(Severity::Low),
        }
    }
}

/// Filters for [`ScanHistory::query`]. Empty filters match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryQuery {
    search: Option<String>,
    severity: Option<Severity>,
    target_type: Option<TargetType>,
}

impl HistoryQuery {
    /// Creates a query matching every entry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Keeps entries whose URL contains `text`, ignoring case.
    #[must_use]
    pub fn search(mut self, text: impl Into<String>) -> Self {
        let text = text.into().trim().to_lowercase();
        self.search = (!text.is_empty()).then_some(text);
        self
    }

    /// Keeps entries of one severity.
    #[must_use]
    pub fn severity(mut self, severity: Severity) -> Self {
        self.severity = Some(severity);
        self
    }

    /// Keeps entries of one target type.
    #[must_use]
    pub fn target_type(mut self, target_type: TargetType) -> Self {
        self.target_type = Some(target_type);
        self
    }

    /// Returns true if the entry passes every filter.
    #[must_use]
    pub fn matches(&self, entry: &HistoryEntry) -> bool {
        self.search
            .as_ref()
            .map_or(true, |s| entry.target_url.to_lowercase().contains(s.as_str()))
            && self.severity.map_or(true, |s| entry.severity == s)
            && self.target_type.map_or(true, |t| entry.target_type == t)
    }
}

/// A concurrent store of completed scans.
#[derive(Debug, Clone, Default)]
pub struct ScanHistory {
    entries: Arc<DashMap<Uuid, HistoryEntry>>,
}

impl ScanHistory {
    /// Creates an empty history.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an entry, replacing any earlier entry for the same run.
    pub fn record(&self, entry: HistoryEntry) {
        self.entries.insert(entry.run_id, entry);
    }

    /// Records a published run and returns its entry.
    pub fn record_published(&self, published: &PublishedResults, config: &ScanConfig) -> HistoryEntry {
        let entry = HistoryEntry::from_published(published, config);
        self.record(entry.clone());
        entry
    }

    /// Looks up a run.
    #[must_use]
    pub fn get(&self, run_id: Uuid) -> Option<HistoryEntry> {
        self.entries.get(&run_id).map(|e| e.value().clone())
    }

    /// Removes a run.
    pub fn remove(&self, run_id: Uuid) -> Option<HistoryEntry> {
        self.entries.remove(&run_id).map(|(_, entry)| entry)
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the matching entries, newest first.
    #[must_use]
    pub fn query(&self, query: &HistoryQuery) -> Vec<HistoryEntry> {
        let mut matching: Vec<HistoryEntry> = self
            .entries
            .iter()
            .filter(|e| query.matches(e.value()))
            .map(|e| e.value().clone())
            .collect();
        matching.sort_by(|a, b| {
            b.recorded_at
                .cmp(&a.recorded_at)
                .then_with(|| a.run_id.cmp(&b.run_id))
        });
        matching
    }
}
