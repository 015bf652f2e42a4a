//! Result producers.
//!
//! A producer is called exactly once per completed run, after the last stage
//! has finished. It is never called for a cancelled or failed run.

use async_trait::async_trait;
use std::fmt::Debug;

use super::{ScanResult, TargetType};
use crate::context::{ScanConfig, ScanType};
use crate::errors::StageError;

/// Produces the final result set of a run.
#[async_trait]
pub trait ResultProducer: Send + Sync + Debug {
    /// Produces results for the given scan configuration.
    async fn produce(&self, config: &ScanConfig) -> Result<Vec<ScanResult>, StageError>;
}

/// A function-based result producer.
pub struct FnProducer<F>
where
    F: Fn(&ScanConfig) -> Result<Vec<ScanResult>, StageError> + Send + Sync,
{
    func: F,
}

impl<F> FnProducer<F>
where
    F: Fn(&ScanConfig) -> Result<Vec<ScanResult>, StageError> + Send + Sync,
{
    /// Creates a new function-based producer.
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

impl<F> Debug for FnProducer<F>
where
    F: Fn(&ScanConfig) -> Result<Vec<ScanResult>, StageError> + Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnProducer").finish_non_exhaustive()
    }
}

#[async_trait]
impl<F> ResultProducer for FnProducer<F>
where
    F: Fn(&ScanConfig) -> Result<Vec<ScanResult>, StageError> + Send + Sync,
{
    async fn produce(&self, config: &ScanConfig) -> Result<Vec<ScanResult>, StageError> {
        (self.func)(config)
    }
}

/// Produces a fixed set of three findings rooted at the scanned URL.
///
/// The base URL has three high-severity findings, `/login` one medium
/// finding and `/about` none.
#[derive(Debug, Clone, Copy, Default)]
pub struct DemoResultProducer;

impl DemoResultProducer {
    /// Builds the demo results for a configuration.
    #[must_use]
    pub fn results_for(config: &ScanConfig) -> Vec<ScanResult> {
        let base = config.url.trim_end_matches('/');
        let base_type = match config.scan_type {
            ScanType::Full => TargetType::Domain,
            ScanType::Single => TargetType::Page,
        };

        vec![
            ScanResult::from_findings(
                base,
                base_type,
                vec![
                    "Unsanitized user input directly injected into innerHTML".to_string(),
                    "Event handlers constructed from query parameters".to_string(),
                    "DOM manipulation with untrusted data sources".to_string(),
                ],
                Some("location.hash.substring(1)".to_string()),
            ),
            ScanResult::from_findings(
                format!("{base}/login"),
                TargetType::Page,
                vec!["Unsanitized inputs from localStorage used in DOM".to_string()],
                None,
            ),
            ScanResult::clean(format!("{base}/about"), TargetType::Page),
        ]
    }
}

#[async_trait]
impl ResultProducer for DemoResultProducer {
    async fn produce(&self, config: &ScanConfig) -> Result<Vec<ScanResult>, StageError> {
        Ok(Self::results_for(config))
    }
}
