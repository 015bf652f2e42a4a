//! JSON report export.
//!
//! A report bundles the scan configuration, the summary and the results,
//! plus a SHA-256 digest of the serialized results so a stored report can be
//! checked for tampering.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use super::{PublishedResults, ScanResult, ScanSummary};
use crate::context::ScanConfig;
use crate::errors::ScanflowError;
use crate::utils::{now_utc, Timestamp};

/// An exportable scan report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanReport {
    /// The run that produced the results.
    pub run_id: Uuid,
    /// When the report was generated.
    pub generated_at: Timestamp,
    /// The scan configuration.
    pub config: ScanConfig,
    /// Totals.
    pub summary: ScanSummary,
    /// The results.
    pub results: Vec<ScanResult>,
    /// Hex SHA-256 of the serialized results.
    pub digest: String,
}

impl ScanReport {
    /// Builds a report from published results.
    pub fn new(published: &PublishedResults, config: &ScanConfig) -> Result<Self, ScanflowError> {
        let results = published.results.as_ref().clone();
        let digest = results_digest(&results)?;

        Ok(Self {
            run_id: published.run_id,
            generated_at: now_utc(),
            config: config.clone(),
            summary: published.summary.clone(),
            results,
            digest,
        })
    }

    /// Returns true if the digest matches the results.
    pub fn verify(&self) -> Result<bool, ScanflowError> {
        Ok(results_digest(&self.results)? == self.digest)
    }

    /// Serializes the report as pretty JSON.
    pub fn to_json_pretty(&self) -> Result<String, ScanflowError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parses a report from JSON.
    pub fn from_json_str(json: &str) -> Result<Self, ScanflowError> {
        Ok(serde_json::from_str(json)?)
    }
}

fn results_digest(results: &[ScanResult]) -> Result<String, ScanflowError> {
    let bytes = serde_json::to_vec(results)?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}
