//! The pipeline executor.

use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{info, warn};

use super::driver::RunDriver;
use super::RunHandle;
use crate::config::{ExecutorConfig, OverlapPolicy};
use crate::context::{RunIdentity, ScanRequest};
use crate::core::{CancelReason, RunState};
use crate::errors::ScanflowError;
use crate::events::{EventSink, NoOpEventSink, RunFeed};
use crate::results::{ResultProducer, ResultPublisher};
use crate::stages::StageTable;

/// Starts scan runs and owns the result publisher they deliver to.
///
/// At most one run is active per executor. What happens when a run is
/// started while another is active is decided by the configured
/// [`OverlapPolicy`].
#[derive(Debug)]
pub struct PipelineExecutor {
    config: ExecutorConfig,
    sink: Arc<dyn EventSink>,
    publisher: ResultPublisher,
    active: Mutex<Option<RunHandle>>,
}

impl Default for PipelineExecutor {
    fn default() -> Self {
        Self::new(ExecutorConfig::default())
    }
}

impl PipelineExecutor {
    /// Creates an executor.
    #[must_use]
    pub fn new(config: ExecutorConfig) -> Self {
        Self {
            config,
            sink: Arc::new(NoOpEventSink),
            publisher: ResultPublisher::new(),
            active: Mutex::new(None),
        }
    }

    /// Sets the sink that receives every event of every run.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Returns the publisher completed runs deliver to.
    #[must_use]
    pub fn publisher(&self) -> &ResultPublisher {
        &self.publisher
    }

    /// Returns the active run, if one has not yet ended.
    #[must_use]
    pub fn active_run(&self) -> Option<RunHandle> {
        self.active.lock().as_ref().filter(|h| !h.is_finished()).cloned()
    }

    /// Starts a run of `table` on the current tokio runtime.
    ///
    /// Every stage starts `Pending`. The run advances in the background; use
    /// the returned handle to observe, cancel or await it. `producer` is
    /// called once, after the last stage, unless the run was cancelled first.
    ///
    /// With [`OverlapPolicy::Supersede`] an active run is cancelled with
    /// [`CancelReason::Superseded`]. If that run is already producing
    /// results, its producer has been called and keeps running to
    /// completion, but the run ends `Cancelled` and its results are
    /// discarded unpublished.
    ///
    /// # Errors
    ///
    /// - `Configuration` if the executor configuration is invalid
    /// - `Runtime` if called outside a tokio runtime
    /// - `RunInProgress` if a run is active and the policy is `Reject`
    pub fn start(
        &self,
        table: &StageTable,
        request: impl Into<ScanRequest>,
        producer: Arc<dyn ResultProducer>,
    ) -> Result<RunHandle, ScanflowError> {
        self.config.validate()?;
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| ScanflowError::Runtime(e.to_string()))?;

        let mut active = self.active.lock();
        if let Some(prior) = active.as_ref().filter(|h| !h.is_finished()) {
            match self.config.overlap_policy {
                OverlapPolicy::Reject => {
                    warn!(run_id = %prior.run_id(), "Rejecting run: another run is in progress");
                    return Err(ScanflowError::RunInProgress {
                        run_id: prior.run_id(),
                    });
                }
                OverlapPolicy::Supersede => {
                    prior.cancel_with(CancelReason::Superseded);
                }
            }
        }
        self.publisher.clear();

        let request = request.into();
        let identity = RunIdentity::for_session(request.session.as_ref());
        let run_id = identity.run_id;
        let state = RunState::new(run_id, table.initial_states());
        let feed = RunFeed::new(state, Arc::clone(&self.sink));
        feed.log(
            None,
            format!("Starting {} scan of {}", request.config.scan_type, request.config.url),
        );

        let handle = RunHandle::new(identity, Arc::new(request.config), feed);
        let driver = RunDriver {
            shared: handle.shared(),
            stages: table.stages().to_vec(),
            producer,
            publisher: self.publisher.clone(),
            config: self.config.clone(),
        };
        runtime.spawn(driver.run());

        info!(
            run_id = %run_id,
            url = %handle.config().url,
            stages = table.len(),
            "Run started"
        );
        *active = Some(handle.clone());
        Ok(handle)
    }

    /// Cancels a run. Equivalent to [`RunHandle::cancel`].
    pub fn cancel(&self, handle: &RunHandle) -> bool {
        handle.cancel()
    }
}
