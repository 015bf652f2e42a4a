//! Ordered fan-out of one run's events.
//!
//! `RunFeed` owns the run's [`RunState`] behind a single lock. A mutation and
//! the delivery of the events it produces happen under that lock, so a
//! subscriber's snapshot and its live stream never overlap or miss an event,
//! and nothing is delivered once the run has ended.

use futures::Stream;
use parking_lot::Mutex;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};
use uuid::Uuid;

use super::EventSink;
use crate::core::{CancelReason, LogEntry, RunEvent, RunOutcome, RunSnapshot, RunState, RunStatus};
use crate::errors::{ScanflowError, StageFailure};

struct FeedInner {
    state: RunState,
    subscribers: Vec<mpsc::UnboundedSender<RunEvent>>,
}

/// The shared, observable state of one run.
pub struct RunFeed {
    run_id: Uuid,
    inner: Mutex<FeedInner>,
    sink: Arc<dyn EventSink>,
    outcome: watch::Sender<Option<RunOutcome>>,
}

impl std::fmt::Debug for RunFeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunFeed")
            .field("run_id", &self.run_id)
            .field("status", &self.inner.lock().state.status())
            .finish_non_exhaustive()
    }
}

impl RunFeed {
    /// Wraps a fresh run state and announces it to the sink.
    #[must_use]
    pub fn new(state: RunState, sink: Arc<dyn EventSink>) -> Self {
        let run_id = state.run_id();
        let started = state.started_event();
        let (outcome, _) = watch::channel(None);

        let feed = Self {
            run_id,
            inner: Mutex::new(FeedInner {
                state,
                subscribers: Vec::new(),
            }),
            sink,
            outcome,
        };
        feed.emit_to_sink(&started);
        feed
    }

    /// Returns the run id.
    #[must_use]
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Applies a mutation while the run is still running.
    ///
    /// Returns `Ok(false)` without calling `f` once the run has been
    /// cancelled or has otherwise left the running phase.
    pub fn update<F>(&self, f: F) -> Result<bool, ScanflowError>
    where
        F: FnOnce(&mut RunState) -> Result<Vec<RunEvent>, ScanflowError>,
    {
        let mut inner = self.inner.lock();
        if !inner.state.is_running() {
            return Ok(false);
        }
        let events = f(&mut inner.state)?;
        for event in &events {
            self.dispatch(&mut inner, event);
        }
        Ok(true)
    }

    /// Appends a log line while the run is still running.
    pub fn log(&self, stage_id: Option<&str>, message: impl Into<String>) -> bool {
        let message = message.into();
        self.update(|state| Ok(vec![state.push_log(stage_id, message)]))
            .unwrap_or(false)
    }

    /// Enters the finalizing phase. After this the run can no longer be
    /// cancelled.
    pub fn begin_finalizing(&self) -> Result<bool, ScanflowError> {
        let mut inner = self.inner.lock();
        if !inner.state.is_running() {
            return Ok(false);
        }
        inner.state.begin_finalizing()?;
        Ok(true)
    }

    /// Cancels the run.
    ///
    /// A user cancel is refused once the run is finalizing. A superseding
    /// run ends it in any non-terminal phase. When that phase is
    /// `Finalizing` the result producer has already been called; the run
    /// still ends `Cancelled` and whatever it produces is never published.
    /// The terminal event is delivered before this returns.
    pub fn cancel(&self, reason: CancelReason) -> bool {
        let mut inner = self.inner.lock();
        let status = inner.state.status();
        let cancellable = match reason {
            CancelReason::User => status == RunStatus::Running,
            CancelReason::Superseded => !status.is_terminal(),
        };
        if !cancellable {
            return false;
        }
        self.finish_locked(&mut inner, RunOutcome::Cancelled { reason })
    }

    /// Marks a stage failed and ends the run.
    pub fn fail(&self, index: usize, failure: StageFailure) -> bool {
        let mut inner = self.inner.lock();
        if !inner.state.is_running() {
            return false;
        }
        match inner.state.fail(index, &failure) {
            Ok(event) => self.dispatch(&mut inner, &event),
            Err(e) => warn!(run_id = %self.run_id, error = %e, "Could not mark stage failed"),
        }
        self.finish_locked(&mut inner, RunOutcome::Failed(failure))
    }

    /// Ends the run with the given outcome. Returns false if it had already
    /// ended.
    pub fn finish(&self, outcome: RunOutcome) -> bool {
        self.finish_with(outcome, |_| {})
    }

    /// Ends the run, calling `on_finish` first while the lock is held.
    ///
    /// `on_finish` only runs if the run had not already ended, so a
    /// concurrent cancel either wins outright or sees the finished run.
    pub fn finish_with<F>(&self, outcome: RunOutcome, on_finish: F) -> bool
    where
        F: FnOnce(&RunOutcome),
    {
        let mut inner = self.inner.lock();
        if inner.state.status().is_terminal() {
            return false;
        }
        on_finish(&outcome);
        self.finish_locked(&mut inner, outcome)
    }

    /// Subscribes to the run.
    ///
    /// The subscription starts with a snapshot and the log backlog; its
    /// stream then yields every later event, in order, and ends after the
    /// terminal event.
    #[must_use]
    pub fn subscribe(&self) -> Subscription {
        let (tx, receiver) = mpsc::unbounded_channel();
        let mut inner = self.inner.lock();
        let snapshot = inner.state.snapshot();
        let backlog = inner.state.log().to_vec();
        if !inner.state.status().is_terminal() {
            inner.subscribers.push(tx);
        }

        Subscription {
            snapshot,
            backlog,
            receiver,
        }
    }

    /// Returns a snapshot of the run.
    #[must_use]
    pub fn snapshot(&self) -> RunSnapshot {
        self.inner.lock().state.snapshot()
    }

    /// Returns the progress of one stage.
    #[must_use]
    pub fn stage_progress(&self, index: usize) -> Option<f64> {
        self.inner.lock().state.stages().get(index).map(|s| s.progress)
    }

    /// Returns a copy of the log buffer.
    #[must_use]
    pub fn log_entries(&self) -> Vec<LogEntry> {
        self.inner.lock().state.log().to_vec()
    }

    /// Returns true while the run can still be cancelled.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.inner.lock().state.is_running()
    }

    /// Returns the outcome, if the run has ended.
    #[must_use]
    pub fn outcome(&self) -> Option<RunOutcome> {
        self.outcome.borrow().clone()
    }

    /// Waits until the run has ended.
    pub async fn wait(&self) -> RunOutcome {
        let mut rx = self.outcome.subscribe();
        loop {
            if let Some(outcome) = rx.borrow_and_update().clone() {
                return outcome;
            }
            // The sender lives in `self`, so the channel stays open.
            let _ = rx.changed().await;
        }
    }

    fn finish_locked(&self, inner: &mut FeedInner, outcome: RunOutcome) -> bool {
        let Some(event) = inner.state.finish(outcome.signal()) else {
            return false;
        };
        self.dispatch(inner, &event);
        inner.subscribers.clear();
        self.outcome.send_replace(Some(outcome));
        debug!(run_id = %self.run_id, status = %inner.state.status(), "Run finished");
        true
    }

    fn dispatch(&self, inner: &mut FeedInner, event: &RunEvent) {
        inner.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
        self.emit_to_sink(event);
    }

    fn emit_to_sink(&self, event: &RunEvent) {
        let sink = &self.sink;
        if catch_unwind(AssertUnwindSafe(|| sink.try_emit(self.run_id, event))).is_err() {
            warn!(
                run_id = %self.run_id,
                event_type = event.event_type(),
                "Event sink panicked; event dropped"
            );
        }
    }
}

/// A live view of one run.
#[derive(Debug)]
pub struct Subscription {
    /// State at the moment of subscribing.
    pub snapshot: RunSnapshot,
    /// Log entries emitted before subscribing.
    pub backlog: Vec<LogEntry>,
    receiver: mpsc::UnboundedReceiver<RunEvent>,
}

impl Subscription {
    /// Waits for the next event. Returns `None` once the run has ended and
    /// every event has been read.
    pub async fn next(&mut self) -> Option<RunEvent> {
        self.receiver.recv().await
    }

    /// Returns the next event if one is already queued.
    pub fn try_next(&mut self) -> Option<RunEvent> {
        self.receiver.try_recv().ok()
    }

    /// Reads every remaining event until the stream ends.
    pub async fn drain(&mut self) -> Vec<RunEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.receiver.recv().await {
            events.push(event);
        }
        events
    }
}

impl Stream for Subscription {
    type Item = RunEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ProgressStep, StageState, TerminalSignal};
    use crate::errors::FailureKind;
    use crate::events::CollectingEventSink;
    use futures::StreamExt;
    use pretty_assertions::assert_eq;

    fn feed_with_sink() -> (RunFeed, Arc<CollectingEventSink>) {
        let sink = Arc::new(CollectingEventSink::new());
        let state = RunState::new(
            Uuid::new_v4(),
            vec![StageState::pending("a", "A"), StageState::pending("b", "B")],
        );
        (RunFeed::new(state, sink.clone()), sink)
    }

    #[tokio::test]
    async fn test_subscriber_gets_events_in_order() {
        let (feed, _) = feed_with_sink();
        let mut sub = feed.subscribe();

        feed.update(|s| Ok(vec![s.activate(0)?])).unwrap();
        feed.log(Some("a"), "working");
        feed.update(|s| Ok(s.advance(0, ProgressStep::To(50.0))?.into_iter().collect()))
            .unwrap();

        let types: Vec<&str> = vec![
            sub.next().await.unwrap().event_type(),
            sub.next().await.unwrap().event_type(),
            sub.next().await.unwrap().event_type(),
        ];
        assert_eq!(types, vec!["stage.started", "run.log", "stage.progress"]);
    }

    #[tokio::test]
    async fn test_late_subscriber_gets_backlog() {
        let (feed, _) = feed_with_sink();
        feed.log(None, "one");
        feed.log(None, "two");

        let mut sub = feed.subscribe();
        assert_eq!(sub.backlog.len(), 2);
        assert!(sub.try_next().is_none());

        feed.log(None, "three");
        match sub.next().await {
            Some(RunEvent::Log(entry)) => assert_eq!(entry.seq, 2),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_cancel_closes_stream_and_blocks_updates() {
        let (feed, sink) = feed_with_sink();
        let mut sub = feed.subscribe();
        feed.update(|s| Ok(vec![s.activate(0)?])).unwrap();

        assert!(feed.cancel(CancelReason::User));
        assert!(!feed.cancel(CancelReason::User));
        assert!(!feed.update(|s| Ok(vec![s.push_log(None, "late")])).unwrap());
        assert!(!feed.log(None, "late"));

        let events = sub.drain().await;
        assert_eq!(events.len(), 2);
        assert_eq!(
            events[1],
            RunEvent::Finished {
                signal: TerminalSignal::Cancelled {
                    reason: CancelReason::User
                }
            }
        );
        assert_eq!(sink.events_of_type("run.finished").len(), 1);
        assert!(matches!(feed.outcome(), Some(RunOutcome::Cancelled { .. })));
    }

    #[tokio::test]
    async fn test_cancel_refused_while_finalizing() {
        let (feed, _) = feed_with_sink();
        for i in 0..2 {
            feed.update(|s| {
                let mut events = vec![s.activate(i)?];
                events.extend(s.advance(i, ProgressStep::To(100.0))?);
                events.push(s.complete(i, 0.1)?);
                Ok(events)
            })
            .unwrap();
        }

        assert!(feed.begin_finalizing().unwrap());
        assert!(!feed.cancel(CancelReason::User));
        assert_eq!(feed.snapshot().status, RunStatus::Finalizing);

        assert!(feed.cancel(CancelReason::Superseded));
        let mut published = false;
        assert!(!feed.finish_with(
            RunOutcome::Completed {
                results: Arc::new(Vec::new())
            },
            |_| published = true,
        ));
        assert!(!published);
    }

    #[tokio::test]
    async fn test_finish_with_runs_hook_before_terminal_event() {
        let (feed, sink) = feed_with_sink();
        let before = Arc::new(parking_lot::Mutex::new(0));
        let seen = Arc::clone(&before);

        assert!(feed.finish_with(RunOutcome::Cancelled { reason: CancelReason::User }, |_| {
            *seen.lock() = sink.events_of_type("run.finished").len();
        }));
        assert_eq!(*before.lock(), 0);
        assert_eq!(sink.events_of_type("run.finished").len(), 1);
    }

    #[tokio::test]
    async fn test_fail_ends_run() {
        let (feed, _) = feed_with_sink();
        feed.update(|s| Ok(vec![s.activate(0)?])).unwrap();

        let failure = StageFailure::new("a", "boom", FailureKind::Error);
        assert!(feed.fail(0, failure.clone()));

        let outcome = feed.wait().await;
        assert!(matches!(outcome, RunOutcome::Failed(f) if f == failure));
        assert_eq!(feed.snapshot().status, RunStatus::Failed);
    }

    #[tokio::test]
    async fn test_subscribe_after_finish_yields_nothing() {
        let (feed, _) = feed_with_sink();
        feed.cancel(CancelReason::Superseded);

        let sub = feed.subscribe();
        assert_eq!(sub.snapshot.status, RunStatus::Cancelled);
        let events: Vec<RunEvent> = sub.collect().await;
        assert!(events.is_empty());
    }

    #[test]
    fn test_sink_sees_run_started() {
        let (feed, sink) = feed_with_sink();
        let events = sink.events_for(feed.run_id());
        assert_eq!(events[0].event_type(), "run.started");
    }

    #[derive(Debug)]
    struct PanickingSink;

    impl EventSink for PanickingSink {
        fn try_emit(&self, _run_id: Uuid, _event: &RunEvent) {
            panic!("sink exploded");
        }
    }

    #[tokio::test]
    async fn test_panicking_sink_does_not_break_run() {
        let state = RunState::new(Uuid::new_v4(), vec![StageState::pending("a", "A")]);
        let feed = RunFeed::new(state, Arc::new(PanickingSink));
        let mut sub = feed.subscribe();

        assert!(feed.log(None, "still delivered"));
        assert!(matches!(sub.next().await, Some(RunEvent::Log(_))));
    }
}
