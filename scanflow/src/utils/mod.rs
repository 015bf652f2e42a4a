//! Time formatting helpers shared by the log buffer, results and history.

pub mod timestamps;

pub use timestamps::{clock_time, iso_timestamp, now_utc, round_tenths, Timestamp};
