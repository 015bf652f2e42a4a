//! Scan results and their delivery.
//!
//! This module provides:
//! - The `ScanResult` record and severity derivation
//! - The `ResultProducer` seam the executor calls on completion
//! - The `ResultPublisher` that holds the latest completed result set
//! - Summary and JSON report views of a result set

mod producer;
mod publisher;
mod report;
mod severity;
mod summary;

pub use producer::{DemoResultProducer, FnProducer, ResultProducer};
pub use publisher::{PublishedResults, ResultPublisher};
pub use report::ScanReport;
pub use severity::{classify_risk_factor, derive_severity, RiskCategory};
pub use summary::ScanSummary;

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::ScanflowError;

/// What kind of target a result describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TargetType {
    /// A single page.
    Page,
    /// A whole domain.
    Domain,
}

impl fmt::Display for TargetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Page => write!(f, "Page"),
            Self::Domain => write!(f, "Domain"),
        }
    }
}

/// Severity of a result. Ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    /// Nothing exploitable was found.
    Low,
    /// Untrusted data reaches the DOM.
    Medium,
    /// Untrusted data reaches a script-execution sink.
    High,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "Low"),
            Self::Medium => write!(f, "Medium"),
            Self::High => write!(f, "High"),
        }
    }
}

/// Evidence attached to a result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanDetails {
    /// Risk factors, in the order they were found.
    #[serde(default)]
    pub risk_factors: Vec<String>,
    /// The payload source that triggered the finding.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
}

/// The analysis result for one target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResult {
    /// The analysed URL.
    pub url: String,
    /// Page or domain.
    #[serde(rename = "type")]
    pub target_type: TargetType,
    /// Whether any risk factor was found.
    pub vulnerable: bool,
    /// Number of findings.
    #[serde(alias = "vulnerabilities")]
    pub vulnerability_count: u32,
    /// Worst risk-factor category.
    pub severity: Severity,
    /// Evidence.
    pub details: ScanDetails,
}

impl ScanResult {
    /// Builds a result from its risk factors.
    ///
    /// `vulnerable`, `vulnerability_count` and `severity` are derived from
    /// the factors, so the result always satisfies [`validate`](Self::validate).
    #[must_use]
    pub fn from_findings(
        url: impl Into<String>,
        target_type: TargetType,
        risk_factors: Vec<String>,
        payload: Option<String>,
    ) -> Self {
        let severity = derive_severity(&risk_factors);
        Self {
            url: url.into(),
            target_type,
            vulnerable: !risk_factors.is_empty(),
            vulnerability_count: u32::try_from(risk_factors.len()).unwrap_or(u32::MAX),
            severity,
            details: ScanDetails {
                risk_factors,
                payload,
            },
        }
    }

    /// Builds a clean result.
    #[must_use]
    pub fn clean(url: impl Into<String>, target_type: TargetType) -> Self {
        Self::from_findings(url, target_type, Vec::new(), None)
    }

    /// Checks the result invariants.
    ///
    /// A non-vulnerable result has no findings and no risk factors; a
    /// vulnerable one has at least one of each; severity matches the worst
    /// risk factor.
    pub fn validate(&self) -> Result<(), ScanflowError> {
        let invalid = |reason: &str| ScanflowError::InvalidResult {
            url: self.url.clone(),
            reason: reason.to_string(),
        };

        if self.vulnerable {
            if self.vulnerability_count == 0 || self.details.risk_factors.is_empty() {
                return Err(invalid("vulnerable result without findings"));
            }
        } else if self.vulnerability_count != 0 || !self.details.risk_factors.is_empty() {
            return Err(invalid("non-vulnerable result with findings"));
        }

        if self.severity != derive_severity(&self.details.risk_factors) {
            return Err(invalid("severity does not match the worst risk factor"));
        }
        Ok(())
    }

    /// Re-derives the computed fields from the risk factors.
    #[must_use]
    pub fn normalized(self) -> Self {
        Self::from_findings(
            self.url,
            self.target_type,
            self.details.risk_factors,
            self.details.payload,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_findings_derives_fields() {
        let result = ScanResult::from_findings(
            "https://example.com/login",
            TargetType::Page,
            vec!["Unsanitized inputs from localStorage used in DOM".to_string()],
            None,
        );

        assert!(result.vulnerable);
        assert_eq!(result.vulnerability_count, 1);
        assert_eq!(result.severity, Severity::Medium);
        assert!(result.validate().is_ok());
    }

    #[test]
    fn test_clean_result() {
        let result = ScanResult::clean("https://example.com/about", TargetType::Page);
        assert!(!result.vulnerable);
        assert_eq!(result.vulnerability_count, 0);
        assert_eq!(result.severity, Severity::Low);
        assert!(result.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_inconsistent_flags() {
        let mut result = ScanResult::clean("https://example.com", TargetType::Page);
        result.vulnerability_count = 2;

        assert!(matches!(
            result.validate(),
            Err(ScanflowError::InvalidResult { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_wrong_severity() {
        let mut result = ScanResult::from_findings(
            "https://example.com",
            TargetType::Page,
            vec!["User input injected into innerHTML".to_string()],
            None,
        );
        result.severity = Severity::Low;

        assert!(result.validate().is_err());
        assert_eq!(result.normalized().severity, Severity::High);
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::High > Severity::Medium);
        assert!(Severity::Medium > Severity::Low);
    }

    #[test]
    fn test_result_wire_format() {
        let json = serde_json::json!({
            "url": "https://example.com",
            "type": "Page",
            "vulnerable": true,
            "vulnerabilities": 1,
            "severity": "Medium",
            "details": {"riskFactors": ["Unsanitized inputs from localStorage used in DOM"]}
        });
        let result: ScanResult = serde_json::from_value(json).unwrap();

        assert_eq!(result.vulnerability_count, 1);
        assert_eq!(result.target_type, TargetType::Page);
        assert!(result.validate().is_ok());

        let out = serde_json::to_value(&result).unwrap();
        assert_eq!(out["vulnerabilityCount"], serde_json::json!(1));
        assert!(out["details"].get("payload").is_none());
    }
}
