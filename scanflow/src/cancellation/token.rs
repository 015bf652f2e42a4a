//! Cancellation token for cooperative cancellation.

use tokio::sync::watch;
use tracing::debug;

use crate::core::CancelReason;

/// A token for cooperative cancellation.
///
/// Cancellation is idempotent - only the first cancellation reason is kept.
#[derive(Debug)]
pub struct CancellationToken {
    state: watch::Sender<Option<CancelReason>>,
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancellationToken {
    /// Creates a new cancellation token.
    #[must_use]
    pub fn new() -> Self {
        let (state, _) = watch::channel(None);
        Self { state }
    }

    /// Requests cancellation with a reason.
    ///
    /// Returns true if this call cancelled the token, false if it was
    /// already cancelled. Waiters in [`cancelled`](Self::cancelled) wake up
    /// immediately.
    pub fn cancel(&self, reason: CancelReason) -> bool {
        let won = self.state.send_if_modified(|slot| {
            if slot.is_some() {
                false
            } else {
                *slot = Some(reason);
                true
            }
        });
        if won {
            debug!(%reason, "Cancellation requested");
        }
        won
    }

    /// Returns whether cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.state.borrow().is_some()
    }

    /// Returns the cancellation reason, if any.
    #[must_use]
    pub fn reason(&self) -> Option<CancelReason> {
        *self.state.borrow()
    }

    /// Waits until the token is cancelled and returns the reason.
    pub async fn cancelled(&self) -> CancelReason {
        let mut rx = self.state.subscribe();
        loop {
            if let Some(reason) = *rx.borrow_and_update() {
                return reason;
            }
            if rx.changed().await.is_err() {
                // The sender lives in `self`, so this only happens during teardown.
                std::future::pending::<()>().await;
            }
        }
    }
}
