//! Live run events.
//!
//! This module provides:
//! - The `EventSink` seam that receives every event of every run
//! - `RunFeed`, the lock-guarded owner of a run's state that fans events
//!   out to subscribers in order
//! - `Subscription`, a snapshot plus the ordered live event stream

mod feed;
mod sink;

pub use feed::{RunFeed, Subscription};
pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
