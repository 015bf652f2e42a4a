//! Inputs a scan run is started with.
//!
//! This module provides:
//! - The scan configuration collected by the scan form
//! - Explicit session context (instead of ambient "logged in" state)
//! - The run identity derived from both

mod identity;
mod scan;

pub use identity::{RunIdentity, SessionContext};
pub use scan::{ScanConfig, ScanOptions, ScanRequest, ScanType};
