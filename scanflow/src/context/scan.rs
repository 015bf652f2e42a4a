//! Scan configuration as submitted by the scan form.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::SessionContext;
use crate::errors::ScanflowError;

/// Whether to scan a single page or a whole domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanType {
    /// Scan only the given page.
    #[default]
    Single,
    /// Crawl the full domain.
    Full,
}

impl fmt::Display for ScanType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single => write!(f, "single"),
            Self::Full => write!(f, "full"),
        }
    }
}

/// Optional scan features.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanOptions {
    /// Run the AI detection model.
    #[serde(default = "default_true")]
    pub ai_detection: bool,
    /// Confirm findings with live payloads.
    #[serde(default)]
    pub real_testing: bool,
    /// Produce an AI-written report.
    #[serde(default = "default_true")]
    pub ai_report: bool,
}

fn default_true() -> bool {
    true
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            ai_detection: true,
            real_testing: false,
            ai_report: true,
        }
    }
}

/// Configuration of one scan.
///
/// The executor does not interpret it; it is handed to stage workers and to
/// the result producer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanConfig {
    /// The target URL.
    pub url: String,
    /// Single page or full domain.
    #[serde(default)]
    pub scan_type: ScanType,
    /// Optional features.
    #[serde(default)]
    pub options: ScanOptions,
}

impl ScanConfig {
    /// Creates a single-page scan with default options.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            scan_type: ScanType::Single,
            options: ScanOptions::default(),
        }
    }

    /// Sets the scan type.
    #[must_use]
    pub fn with_scan_type(mut self, scan_type: ScanType) -> Self {
        self.scan_type = scan_type;
        self
    }

    /// Sets the options.
    #[must_use]
    pub fn with_options(mut self, options: ScanOptions) -> Self {
        self.options = options;
        self
    }

    /// Parses the JSON form payload.
    pub fn from_json_str(json: &str) -> Result<Self, ScanflowError> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Everything needed to start a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRequest {
    /// The scan configuration.
    pub config: ScanConfig,
    /// The requesting session, if known.
    pub session: Option<SessionContext>,
}

impl ScanRequest {
    /// Creates a request without session context.
    #[must_use]
    pub fn new(config: ScanConfig) -> Self {
        Self {
            config,
            session: None,
        }
    }

    /// Attaches the requesting session.
    #[must_use]
    pub fn with_session(mut self, session: SessionContext) -> Self {
        self.session = Some(session);
        self
    }
}

impl From<ScanConfig> for ScanRequest {
    fn from(config: ScanConfig) -> Self {
        Self::new(config)
    }
}
