//! Drives one run's stages to completion.
//!
//! The driver is a single task per run. It sleeps between ticks, asks the
//! active stage's worker to advance, and applies the result through the
//! run feed. Every suspension point races the run's cancellation token, and
//! every mutation goes through [`RunFeed::update`], which refuses changes
//! once the run has ended. Together these keep a cancelled run silent.

use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, info_span, warn, Instrument};

use super::handle::RunShared;
use crate::config::ExecutorConfig;
use crate::core::{RunEvent, RunOutcome, MAX_PROGRESS};
use crate::errors::{FailureKind, StageFailure};
use crate::events::RunFeed;
use crate::observability::StageTimer;
use crate::results::{ResultProducer, ResultPublisher, ScanResult};
use crate::stages::{StageDefinition, WorkerContext};

/// Stage id reported when the result producer fails.
pub(crate) const RESULTS_STAGE_ID: &str = "results";

enum StageEnd {
    Completed(f64),
    Skipped,
    Stopped,
}

enum Ticking {
    Done,
    Stopped,
}

pub(crate) struct RunDriver {
    pub(crate) shared: Arc<RunShared>,
    pub(crate) stages: Vec<StageDefinition>,
    pub(crate) producer: Arc<dyn ResultProducer>,
    pub(crate) publisher: ResultPublisher,
    pub(crate) config: ExecutorConfig,
}

impl RunDriver {
    pub(crate) async fn run(self) {
        let span = info_span!(
            "scan_run",
            run_id = %self.shared.identity.run_id,
            url = %self.shared.config.url
        );
        self.drive().instrument(span).await;
    }

    fn feed(&self) -> &RunFeed {
        &self.shared.feed
    }

    async fn drive(&self) {
        let mut scan_seconds = 0.0;
        for (index, definition) in self.stages.iter().enumerate() {
            match self.run_stage(index, definition).await {
                StageEnd::Completed(elapsed) => scan_seconds += elapsed,
                StageEnd::Skipped => continue,
                StageEnd::Stopped => return,
            }
            if !self.pause(self.config.stage_pause()).await {
                return;
            }
        }
        self.finalize(scan_seconds).await;
    }

    async fn run_stage(&self, index: usize, definition: &StageDefinition) -> StageEnd {
        let stage_id = definition.id.as_str();

        if !definition.should_run(&self.shared.config) {
            let skipped = self.feed().update(|state| {
                Ok(vec![
                    state.skip(index)?,
                    state.push_log(Some(stage_id), format!("Skipped {}", definition.title)),
                ])
            });
            return match skipped {
                Ok(true) => {
                    info!(stage_id, index, "Stage skipped");
                    StageEnd::Skipped
                }
                Ok(false) => StageEnd::Stopped,
                Err(e) => {
                    self.fail(index, StageFailure::new(stage_id, e.to_string(), FailureKind::Error));
                    StageEnd::Stopped
                }
            };
        }

        let started = self.feed().update(|state| {
            Ok(vec![
                state.activate(index)?,
                state.push_log(Some(stage_id), format!("Starting {}...", definition.title)),
            ])
        });
        match started {
            Ok(true) => info!(stage_id, index, "Stage started"),
            Ok(false) => return StageEnd::Stopped,
            Err(e) => {
                self.fail(index, StageFailure::new(stage_id, e.to_string(), FailureKind::Error));
                return StageEnd::Stopped;
            }
        }

        let timer = StageTimer::start(stage_id);
        let ticking = self.tick_until_done(index, definition);
        let outcome = match definition.timeout.or_else(|| self.config.stage_timeout()) {
            Some(limit) => tokio::time::timeout(limit, ticking)
                .await
                .unwrap_or_else(|_| Err(timeout_failure(stage_id, limit))),
            None => ticking.await,
        };

        match outcome {
            Ok(Ticking::Done) => {
                let elapsed = timer.finish();
                let completed = self.feed().update(|state| {
                    Ok(vec![
                        state.complete(index, elapsed)?,
                        state.push_log(
                            Some(stage_id),
                            format!("{} completed in {elapsed:.1}s", definition.title),
                        ),
                    ])
                });
                match completed {
                    Ok(true) => {
                        info!(stage_id, index, elapsed_seconds = elapsed, "Stage completed");
                        StageEnd::Completed(elapsed)
                    }
                    Ok(false) => StageEnd::Stopped,
                    Err(e) => {
                        self.fail(index, StageFailure::new(stage_id, e.to_string(), FailureKind::Error));
                        StageEnd::Stopped
                    }
                }
            }
            Ok(Ticking::Stopped) => StageEnd::Stopped,
            Err(failure) => {
                self.fail(index, failure);
                StageEnd::Stopped
            }
        }
    }

    async fn tick_until_done(
        &self,
        index: usize,
        definition: &StageDefinition,
    ) -> Result<Ticking, StageFailure> {
        let stage_id = definition.id.as_str();
        let mut tick = 0;

        loop {
            if !self.pause(self.config.tick_interval()).await {
                return Ok(Ticking::Stopped);
            }
            let Some(progress) = self.feed().stage_progress(index) else {
                return Ok(Ticking::Stopped);
            };
            let ctx = WorkerContext {
                run_id: self.shared.identity.run_id,
                stage_id: definition.id.clone(),
                stage_index: index,
                progress,
                tick,
                config: Arc::clone(&self.shared.config),
            };

            let advance = tokio::select! {
                biased;
                _ = self.shared.token.cancelled() => return Ok(Ticking::Stopped),
                result = AssertUnwindSafe(definition.worker.advance(&ctx)).catch_unwind() => match result {
                    Ok(Ok(advance)) => advance,
                    Ok(Err(err)) => {
                        return Err(StageFailure::new(stage_id, err.message, FailureKind::Error));
                    }
                    Err(panic) => {
                        return Err(StageFailure::new(stage_id, panic_message(&*panic), FailureKind::Panic));
                    }
                },
            };

            let mut reached = false;
            let applied = self
                .feed()
                .update(|state| {
                    let mut events: Vec<RunEvent> =
                        state.advance(index, advance.step)?.into_iter().collect();
                    for message in &advance.logs {
                        events.push(state.push_log(Some(stage_id), message.clone()));
                    }
                    reached = state
                        .stages()
                        .get(index)
                        .is_some_and(|s| s.progress >= MAX_PROGRESS);
                    Ok(events)
                })
                .map_err(|e| StageFailure::new(stage_id, e.to_string(), FailureKind::Error))?;

            if !applied {
                return Ok(Ticking::Stopped);
            }
            if reached {
                return Ok(Ticking::Done);
            }
            tick += 1;
        }
    }

    /// Sleeps unless the run is cancelled first. Returns false on cancel.
    async fn pause(&self, duration: Duration) -> bool {
        if duration.is_zero() {
            tokio::task::yield_now().await;
            return !self.shared.token.is_cancelled();
        }
        tokio::select! {
            biased;
            _ = self.shared.token.cancelled() => false,
            () = tokio::time::sleep(duration) => true,
        }
    }

    async fn finalize(&self, scan_seconds: f64) {
        let run_id = self.shared.identity.run_id;
        self.feed().log(None, "All stages completed, collecting results");

        match self.feed().begin_finalizing() {
            Ok(true) => {}
            Ok(false) => return,
            Err(e) => {
                self.abort_finalizing(FailureKind::Error, e.to_string());
                return;
            }
        }

        let produced = AssertUnwindSafe(self.producer.produce(&self.shared.config))
            .catch_unwind()
            .await;
        let results = match produced {
            Ok(Ok(results)) => results,
            Ok(Err(err)) => return self.abort_finalizing(FailureKind::Error, err.message),
            Err(panic) => return self.abort_finalizing(FailureKind::Panic, panic_message(&*panic)),
        };

        let results: Arc<Vec<ScanResult>> = Arc::new(
            results
                .into_iter()
                .map(|result| match result.validate() {
                    Ok(()) => result,
                    Err(e) => {
                        warn!(error = %e, "Normalizing inconsistent scan result");
                        result.normalized()
                    }
                })
                .collect(),
        );

        let count = results.len();
        let publisher = &self.publisher;
        let finished = self.feed().finish_with(
            RunOutcome::Completed {
                results: Arc::clone(&results),
            },
            |_| {
                publisher.publish(run_id, Arc::clone(&results), scan_seconds);
            },
        );
        if finished {
            info!(result_count = count, scan_seconds, "Scan completed");
        } else {
            debug!("Run superseded while producing results; results discarded");
        }
    }

    fn abort_finalizing(&self, kind: FailureKind, message: String) {
        let failure = StageFailure::new(RESULTS_STAGE_ID, message, kind);
        error!(error = %failure, "Result production failed");
        self.feed().finish(RunOutcome::Failed(failure));
    }

    fn fail(&self, index: usize, failure: StageFailure) {
        self.feed().log(
            Some(failure.stage_id.as_str()),
            format!("{} failed: {}", failure.stage_id, failure.message),
        );
        error!(stage_id = %failure.stage_id, kind = %failure.kind, error = %failure.message, "Stage failed");
        self.feed().fail(index, failure);
    }
}

fn timeout_failure(stage_id: &str, limit: Duration) -> StageFailure {
    StageFailure::new(
        stage_id,
        format!("stage exceeded its {} ms limit", limit.as_millis()),
        FailureKind::Timeout,
    )
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "worker panicked".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(&*payload), "boom");

        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(&*payload), "bang");

        let payload: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(&*payload), "worker panicked");
    }

    #[test]
    fn test_timeout_failure() {
        let failure = timeout_failure("crawl", Duration::from_millis(1500));
        assert_eq!(failure.kind, FailureKind::Timeout);
        assert!(failure.message.contains("1500 ms"));
    }
}
