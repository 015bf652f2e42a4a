//! Cooperative cancellation for scan runs.
//!
//! Every run owns one [`CancellationToken`]. The executor races each of its
//! suspension points against [`CancellationToken::cancelled`], so a cancelled
//! run stops at the next tick or pause instead of finishing it.

mod token;

pub use token::CancellationToken;
