//! Delivery of completed result sets.
//!
//! The publisher holds at most one result set: the latest completed run's.
//! Observers subscribed before publication are woken once; late subscribers
//! read the held value directly. Starting a new run clears it.

use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info};
use uuid::Uuid;

use super::{ScanResult, ScanSummary};
use crate::utils::{now_utc, Timestamp};

/// A published result set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublishedResults {
    /// The run that produced the results.
    pub run_id: Uuid,
    /// The results.
    pub results: Arc<Vec<ScanResult>>,
    /// Totals over the results.
    pub summary: ScanSummary,
    /// When the results were published.
    pub published_at: Timestamp,
}

/// Holds the latest completed run's results.
#[derive(Debug, Clone)]
pub struct ResultPublisher {
    slot: Arc<watch::Sender<Option<PublishedResults>>>,
}

impl Default for ResultPublisher {
    fn default() -> Self {
        Self::new()
    }
}

impl ResultPublisher {
    /// Creates an empty publisher.
    #[must_use]
    pub fn new() -> Self {
        let (slot, _) = watch::channel(None);
        Self {
            slot: Arc::new(slot),
        }
    }

    /// Publishes a run's results.
    ///
    /// Returns false if results for the same run were already published.
    pub fn publish(&self, run_id: Uuid, results: Arc<Vec<ScanResult>>, scan_seconds: f64) -> bool {
        let summary = ScanSummary::from_results(&results, scan_seconds);
        let published = self.slot.send_if_modified(|slot| {
            if slot.as_ref().is_some_and(|p| p.run_id == run_id) {
                return false;
            }
            *slot = Some(PublishedResults {
                run_id,
                results: Arc::clone(&results),
                summary: summary.clone(),
                published_at: now_utc(),
            });
            true
        });

        if published {
            info!(
                run_id = %run_id,
                targets = summary.total_targets,
                vulnerable = summary.vulnerable_targets,
                "Published scan results"
            );
        }
        published
    }

    /// Drops the held results, if any.
    pub fn clear(&self) {
        let cleared = self.slot.send_if_modified(|slot| slot.take().is_some());
        if cleared {
            debug!("Cleared published results");
        }
    }

    /// Returns the held results.
    #[must_use]
    pub fn latest(&self) -> Option<PublishedResults> {
        self.slot.borrow().clone()
    }

    /// Returns a receiver that observes every publish and clear.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<PublishedResults>> {
        self.slot.subscribe()
    }

    /// Waits until results for the given run are published.
    ///
    /// Returns `None` if the publisher is dropped first.
    pub async fn wait_for_run(&self, run_id: Uuid) -> Option<PublishedResults> {
        let mut rx = self.slot.subscribe();
        let published = rx
            .wait_for(|slot| slot.as_ref().is_some_and(|p| p.run_id == run_id))
            .await
            .ok()?;
        published.clone()
    }
}
