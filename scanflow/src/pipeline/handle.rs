//! The handle to a started run.

use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::cancellation::CancellationToken;
use crate::context::{RunIdentity, ScanConfig};
use crate::core::{CancelReason, LogEntry, RunOutcome, RunSnapshot};
use crate::errors::ScanflowError;
use crate::events::{RunFeed, Subscription};
use crate::results::ScanResult;

#[derive(Debug)]
pub(crate) struct RunShared {
    pub(crate) identity: RunIdentity,
    pub(crate) config: Arc<ScanConfig>,
    pub(crate) feed: RunFeed,
    pub(crate) token: CancellationToken,
}

/// A cloneable handle to one run.
///
/// Dropping every handle does not stop the run; call [`cancel`](Self::cancel)
/// for that.
#[derive(Debug, Clone)]
pub struct RunHandle {
    shared: Arc<RunShared>,
}

impl RunHandle {
    pub(crate) fn new(identity: RunIdentity, config: Arc<ScanConfig>, feed: RunFeed) -> Self {
        Self {
            shared: Arc::new(RunShared {
                identity,
                config,
                feed,
                token: CancellationToken::new(),
            }),
        }
    }

    pub(crate) fn shared(&self) -> Arc<RunShared> {
        Arc::clone(&self.shared)
    }

    /// Returns the run id.
    #[must_use]
    pub fn run_id(&self) -> Uuid {
        self.shared.identity.run_id
    }

    /// Returns the run identity.
    #[must_use]
    pub fn identity(&self) -> &RunIdentity {
        &self.shared.identity
    }

    /// Returns the scan configuration.
    #[must_use]
    pub fn config(&self) -> &ScanConfig {
        &self.shared.config
    }

    /// Subscribes to live updates.
    #[must_use]
    pub fn subscribe(&self) -> Subscription {
        self.shared.feed.subscribe()
    }

    /// Returns a snapshot of the run.
    #[must_use]
    pub fn snapshot(&self) -> RunSnapshot {
        self.shared.feed.snapshot()
    }

    /// Returns the log buffer.
    #[must_use]
    pub fn log(&self) -> Vec<LogEntry> {
        self.shared.feed.log_entries()
    }

    /// Cancels the run.
    ///
    /// Returns false if the run has already ended or is producing results.
    pub fn cancel(&self) -> bool {
        self.cancel_with(CancelReason::User)
    }

    pub(crate) fn cancel_with(&self, reason: CancelReason) -> bool {
        if !self.shared.feed.cancel(reason) {
            return false;
        }
        self.shared.token.cancel(reason);
        info!(run_id = %self.run_id(), %reason, "Run cancelled");
        true
    }

    /// Returns true once the run has ended.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.shared.feed.outcome().is_some()
    }

    /// Returns the outcome, if the run has ended.
    #[must_use]
    pub fn outcome(&self) -> Option<RunOutcome> {
        self.shared.feed.outcome()
    }

    /// Waits for the run to end.
    pub async fn wait(&self) -> RunOutcome {
        self.shared.feed.wait().await
    }

    /// Waits for the run to end and returns its results.
    pub async fn results(&self) -> Result<Arc<Vec<ScanResult>>, ScanflowError> {
        self.wait().await.into_result(self.run_id())
    }
}
