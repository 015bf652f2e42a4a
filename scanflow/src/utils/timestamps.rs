//! Timestamp utilities.
//!
//! Log entries are stamped with local wall-clock time as `HH:MM:SS`; every
//! other timestamp in the crate is UTC.

use chrono::{DateTime, Local, Utc};

/// Represents a timestamp that can be serialized/deserialized.
pub type Timestamp = DateTime<Utc>;

/// Returns the current UTC time as an ISO 8601 formatted string.
///
/// # Examples
///
/// ```
/// use scanflow::utils::iso_timestamp;
///
/// let ts = iso_timestamp();
/// assert!(ts.contains('T'));
/// assert!(ts.ends_with("+00:00"));
/// ```
#[must_use]
pub fn iso_timestamp() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S%.6f+00:00").to_string()
}

/// Returns the current UTC timestamp.
#[must_use]
pub fn now_utc() -> Timestamp {
    Utc::now()
}

/// Formats a timestamp as local wall-clock time, `HH:MM:SS`.
///
/// # Examples
///
/// ```
/// use scanflow::utils::{clock_time, now_utc};
///
/// let text = clock_time(&now_utc());
/// assert_eq!(text.len(), 8);
/// assert_eq!(text.matches(':').count(), 2);
/// ```
#[must_use]
pub fn clock_time(ts: &Timestamp) -> String {
    ts.with_timezone(&Local).format("%H:%M:%S").to_string()
}

/// Rounds a duration in seconds to one decimal place.
#[must_use]
pub fn round_tenths(seconds: f64) -> f64 {
    (seconds * 10.0).round() / 10.0
}
