//! Aggregate view of a result set.

use serde::{Deserialize, Serialize};

use super::{ScanResult, Severity};

/// Totals shown above a result listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanSummary {
    /// Number of analysed targets.
    pub total_targets: usize,
    /// Targets with at least one finding.
    pub vulnerable_targets: usize,
    /// Findings across all targets.
    pub total_vulnerabilities: u64,
    /// Worst severity across vulnerable targets, if any.
    pub highest_severity: Option<Severity>,
    /// Sum of stage durations, in seconds.
    pub scan_seconds: f64,
}

impl ScanSummary {
    /// Summarizes a result set.
    #[must_use]
    pub fn from_results(results: &[ScanResult], scan_seconds: f64) -> Self {
        let vulnerable: Vec<&ScanResult> = results.iter().filter(|r| r.vulnerable).collect();

        Self {
            total_targets: results.len(),
            vulnerable_targets: vulnerable.len(),
            total_vulnerabilities: results.iter().map(|r| u64::from(r.vulnerability_count)).sum(),
            highest_severity: vulnerable.iter().map(|r| r.severity).max(),
            scan_seconds,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ScanConfig;
    use crate::results::DemoResultProducer;

    #[test]
    fn test_summary_of_demo_results() {
        let results = DemoResultProducer::results_for(&ScanConfig::new("https://example.com"));
        let summary = ScanSummary::from_results(&results, 12.5);

        assert_eq!(summary.total_targets, 3);
        assert_eq!(summary.vulnerable_targets, 2);
        assert_eq!(summary.total_vulnerabilities, 4);
        assert_eq!(summary.highest_severity, Some(Severity::High));
    }

    #[test]
    fn test_summary_of_empty_set() {
        let summary = ScanSummary::from_results(&[], 0.0);
        assert_eq!(summary.total_targets, 0);
        assert!(summary.highest_severity.is_none());
    }
}
