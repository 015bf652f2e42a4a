//! Scenario tests for whole runs.

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use crate::config::{ExecutorConfig, OverlapPolicy};
    use crate::context::{ScanConfig, SessionContext, ScanRequest};
    use crate::core::{CancelReason, RunEvent, RunOutcome, RunStatus, StageStatus, TerminalSignal};
    use crate::errors::{FailureKind, ScanflowError, StageError};
    use crate::events::CollectingEventSink;
    use crate::pipeline::PipelineExecutor;
    use crate::results::{DemoResultProducer, ResultProducer, ScanResult, TargetType};
    use crate::stages::{
        seeded_scan_stage_table, SimulatedWorker, StageDefinition, StageTable, StageWorker,
    };
    use crate::testing::{
        assert_monotonic_progress, assert_sequential_transitions, assert_stage_statuses,
        assert_terminal_last, collect_events, progress_of, uniform_table, FailingWorker,
        PanickingWorker, ScriptedWorker, StallingWorker,
    };

    const STAGES: [&str; 5] = ["Validate", "Crawl", "Extract", "Analyze", "Report"];

    #[derive(Debug, Default)]
    struct CountingProducer {
        calls: AtomicUsize,
        delay: Duration,
    }

    impl CountingProducer {
        fn slow(delay: Duration) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                delay,
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ResultProducer for CountingProducer {
        async fn produce(&self, config: &ScanConfig) -> Result<Vec<ScanResult>, StageError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            Ok(DemoResultProducer::results_for(config))
        }
    }

    fn table_with(worker: Arc<dyn StageWorker>) -> StageTable {
        uniform_table(&STAGES, worker).unwrap()
    }

    fn scan() -> ScanConfig {
        ScanConfig::new("https://example.com")
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_completes_all_stages_in_order() {
        let sink = Arc::new(CollectingEventSink::new());
        let executor = PipelineExecutor::default().with_event_sink(sink.clone());
        let producer = Arc::new(CountingProducer::default());
        let table = table_with(Arc::new(ScriptedWorker::constant(20.0)));

        let handle = executor.start(&table, scan(), producer.clone()).unwrap();
        let subscription = handle.subscribe();
        assert_stage_statuses(&subscription.snapshot, &[StageStatus::Pending; 5]);

        let events = collect_events(subscription).await;
        let outcome = handle.wait().await;

        let results = match outcome {
            RunOutcome::Completed { results } => results,
            other => panic!("expected completion, got {other:?}"),
        };
        assert!(!results.is_empty());
        assert_eq!(producer.calls(), 1);

        let snapshot = handle.snapshot();
        assert_eq!(snapshot.status, RunStatus::Completed);
        assert_stage_statuses(&snapshot, &[StageStatus::Completed; 5]);
        assert_sequential_transitions(&snapshot);
        assert_monotonic_progress(&events);
        assert_terminal_last(&events);

        let completed: Vec<&str> = events
            .iter()
            .filter_map(|e| match e {
                RunEvent::StageCompleted { stage_id, .. } => Some(stage_id.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(completed, STAGES.to_vec());

        let finished: Vec<&RunEvent> = events.iter().filter(|e| e.is_terminal()).collect();
        assert_eq!(
            finished,
            vec![&RunEvent::Finished {
                signal: TerminalSignal::Completed {
                    result_count: results.len()
                }
            }]
        );

        let published = executor.publisher().latest().unwrap();
        assert_eq!(published.run_id, handle.run_id());
        assert_eq!(published.results, results);
        assert_eq!(sink.events_of_type("run.finished").len(), 1);
        assert!(executor.active_run().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_elapsed_seconds_follow_tick_interval() {
        let executor = PipelineExecutor::default();
        let table = table_with(Arc::new(ScriptedWorker::constant(20.0)));

        let handle = executor
            .start(&table, scan(), Arc::new(DemoResultProducer))
            .unwrap();
        handle.wait().await;

        let snapshot = handle.snapshot();
        for stage in &snapshot.stages {
            assert_eq!(stage.elapsed_seconds, Some(1.0), "stage {}", stage.id);
        }
        let published = executor.publisher().latest().unwrap();
        assert!((published.summary.scan_seconds - 5.0).abs() < 1e-9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_extract_at_forty_percent() {
        let sink = Arc::new(CollectingEventSink::new());
        let executor = PipelineExecutor::default().with_event_sink(sink.clone());
        let producer = Arc::new(CountingProducer::default());
        let table = table_with(Arc::new(ScriptedWorker::constant(20.0)));

        let handle = executor.start(&table, scan(), producer.clone()).unwrap();
        let mut subscription = handle.subscribe();

        let mut seen = Vec::new();
        while let Some(event) = subscription.next().await {
            let at_forty = matches!(
                &event,
                RunEvent::Progress { stage_id, progress }
                    if stage_id == "Extract" && (*progress - 40.0).abs() < f64::EPSILON
            );
            seen.push(event);
            if at_forty {
                assert!(handle.cancel());
                break;
            }
        }

        let after_cancel = subscription.drain().await;
        assert_eq!(
            after_cancel,
            vec![RunEvent::Finished {
                signal: TerminalSignal::Cancelled {
                    reason: CancelReason::User
                }
            }]
        );

        let log_len = handle.log().len();
        let sink_len = sink.len();
        tokio::time::sleep(Duration::from_secs(30)).await;

        let snapshot = handle.snapshot();
        assert_eq!(snapshot.status, RunStatus::Cancelled);
        assert_stage_statuses(
            &snapshot,
            &[
                StageStatus::Completed,
                StageStatus::Completed,
                StageStatus::Active,
                StageStatus::Pending,
                StageStatus::Pending,
            ],
        );
        let extract = snapshot.stage("Extract").unwrap();
        assert!((extract.progress - 40.0).abs() < f64::EPSILON);
        assert_eq!(progress_of(&seen, "Extract"), vec![20.0, 40.0]);
        assert_sequential_transitions(&snapshot);

        assert_eq!(handle.log().len(), log_len);
        assert_eq!(sink.len(), sink_len);
        assert_eq!(producer.calls(), 0);
        assert!(executor.publisher().latest().is_none());
        assert!(matches!(
            handle.wait().await,
            RunOutcome::Cancelled {
                reason: CancelReason::User
            }
        ));
        assert!(!handle.cancel());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_run_results_error() {
        let executor = PipelineExecutor::default();
        let table = table_with(Arc::new(ScriptedWorker::constant(20.0)));
        let handle = executor
            .start(&table, scan(), Arc::new(DemoResultProducer))
            .unwrap();

        tokio::time::sleep(Duration::from_millis(700)).await;
        assert!(executor.cancel(&handle));

        let err = handle.results().await.unwrap_err();
        assert!(err.is_cancellation());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stage_failure_halts_run() {
        let ok: Arc<dyn StageWorker> = Arc::new(ScriptedWorker::constant(50.0));
        let table = StageTable::builder()
            .add("validate", "Validate", Arc::clone(&ok))
            .add("crawl", "Crawl", Arc::clone(&ok))
            .add(
                "extract",
                "Extract",
                Arc::new(FailingWorker::new("DOM parser crashed").after(2, 10.0)),
            )
            .add("analyze", "Analyze", Arc::clone(&ok))
            .build()
            .unwrap();

        let executor = PipelineExecutor::default();
        let producer = Arc::new(CountingProducer::default());
        let handle = executor.start(&table, scan(), producer.clone()).unwrap();
        let events = collect_events(handle.subscribe()).await;

        let snapshot = handle.snapshot();
        assert_eq!(snapshot.status, RunStatus::Failed);
        assert_stage_statuses(
            &snapshot,
            &[
                StageStatus::Completed,
                StageStatus::Completed,
                StageStatus::Failed,
                StageStatus::Pending,
            ],
        );
        let extract = snapshot.stage("extract").unwrap();
        assert!((extract.progress - 20.0).abs() < f64::EPSILON);
        assert_eq!(extract.error.as_deref(), Some("DOM parser crashed"));

        assert!(events.iter().any(|e| matches!(
            e,
            RunEvent::StageFailed { failure } if failure.stage_id == "extract"
        )));
        assert_terminal_last(&events);
        assert_eq!(producer.calls(), 0);
        assert!(executor.publisher().latest().is_none());

        match handle.results().await {
            Err(ScanflowError::StageFailure(failure)) => {
                assert_eq!(failure.stage_id, "extract");
                assert_eq!(failure.kind, FailureKind::Error);
            }
            other => panic!("expected stage failure, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_worker_becomes_failure() {
        let table = StageTable::builder()
            .add("validate", "Validate", Arc::new(ScriptedWorker::constant(100.0)))
            .add("crawl", "Crawl", Arc::new(PanickingWorker::new("crawler exploded")))
            .build()
            .unwrap();

        let executor = PipelineExecutor::default();
        let handle = executor
            .start(&table, scan(), Arc::new(DemoResultProducer))
            .unwrap();

        match handle.wait().await {
            RunOutcome::Failed(failure) => {
                assert_eq!(failure.stage_id, "crawl");
                assert_eq!(failure.kind, FailureKind::Panic);
                assert_eq!(failure.message, "crawler exploded");
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_stage_timeout() {
        let table = StageTable::builder()
            .stage(
                StageDefinition::new("crawl", "Crawl", Arc::new(StallingWorker))
                    .with_timeout(Duration::from_secs(3)),
            )
            .build()
            .unwrap();

        let executor = PipelineExecutor::default();
        let handle = executor
            .start(&table, scan(), Arc::new(DemoResultProducer))
            .unwrap();

        match handle.wait().await {
            RunOutcome::Failed(failure) => {
                assert_eq!(failure.kind, FailureKind::Timeout);
                assert_eq!(failure.stage_id, "crawl");
            }
            other => panic!("expected timeout, got {other:?}"),
        }
        assert_eq!(handle.snapshot().stages[0].status, StageStatus::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_executor_timeout_applies_to_slow_stage() {
        let config = ExecutorConfig::default().with_stage_timeout_ms(1_000);
        let executor = PipelineExecutor::new(config);
        let table = uniform_table(&["slow"], Arc::new(ScriptedWorker::constant(1.0))).unwrap();

        let handle = executor
            .start(&table, scan(), Arc::new(DemoResultProducer))
            .unwrap();
        let outcome = handle.wait().await;
        assert!(matches!(outcome, RunOutcome::Failed(f) if f.kind == FailureKind::Timeout));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stalled_worker() {
        let table = uniform_table(&["stall"], Arc::new(StallingWorker)).unwrap();
        let executor = PipelineExecutor::default();
        let handle = executor
            .start(&table, scan(), Arc::new(DemoResultProducer))
            .unwrap();

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(handle.cancel());
        assert!(matches!(handle.wait().await, RunOutcome::Cancelled { .. }));
        assert_eq!(handle.snapshot().stages[0].status, StageStatus::Active);
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_run_supersedes_active_run() {
        let sink = Arc::new(CollectingEventSink::new());
        let executor = PipelineExecutor::default().with_event_sink(sink.clone());
        let producer = Arc::new(CountingProducer::default());
        let table = table_with(Arc::new(ScriptedWorker::constant(20.0)));

        let first = executor.start(&table, scan(), producer.clone()).unwrap();
        let first_sub = first.subscribe();
        tokio::time::sleep(Duration::from_millis(1_300)).await;

        let second = executor
            .start(&table, ScanConfig::new("https://second.test"), producer.clone())
            .unwrap();
        let first_events_at_switch = sink.events_for(first.run_id()).len();
        assert_eq!(executor.active_run().map(|h| h.run_id()), Some(second.run_id()));

        let first_events = collect_events(first_sub).await;
        assert_eq!(
            first_events.last(),
            Some(&RunEvent::Finished {
                signal: TerminalSignal::Cancelled {
                    reason: CancelReason::Superseded
                }
            })
        );

        assert!(second.wait().await.is_completed());
        assert_eq!(sink.events_for(first.run_id()).len(), first_events_at_switch);
        assert!(matches!(
            first.wait().await,
            RunOutcome::Cancelled {
                reason: CancelReason::Superseded
            }
        ));
        assert_eq!(producer.calls(), 1);
        assert_eq!(
            executor.publisher().latest().map(|p| p.run_id),
            Some(second.run_id())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_reject_policy_refuses_overlap() {
        let config = ExecutorConfig::default().with_overlap_policy(OverlapPolicy::Reject);
        let executor = PipelineExecutor::new(config);
        let table = table_with(Arc::new(ScriptedWorker::constant(50.0)));

        let first = executor
            .start(&table, scan(), Arc::new(DemoResultProducer))
            .unwrap();
        let err = executor
            .start(&table, scan(), Arc::new(DemoResultProducer))
            .unwrap_err();
        assert!(matches!(err, ScanflowError::RunInProgress { run_id } if run_id == first.run_id()));

        first.wait().await;
        assert!(executor
            .start(&table, scan(), Arc::new(DemoResultProducer))
            .is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_run_clears_published_results() {
        let executor = PipelineExecutor::default();
        let table = table_with(Arc::new(ScriptedWorker::constant(100.0)));

        let first = executor
            .start(&table, scan(), Arc::new(DemoResultProducer))
            .unwrap();
        first.wait().await;
        assert!(executor.publisher().latest().is_some());

        let second = executor
            .start(&table, scan(), Arc::new(DemoResultProducer))
            .unwrap();
        assert!(executor.publisher().latest().is_none());

        second.wait().await;
        assert_eq!(
            executor.publisher().latest().map(|p| p.run_id),
            Some(second.run_id())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_refused_while_producing_results() {
        let executor = PipelineExecutor::default();
        let producer = Arc::new(CountingProducer::slow(Duration::from_secs(2)));
        let table = uniform_table(&["only"], Arc::new(ScriptedWorker::constant(100.0))).unwrap();

        let handle = executor.start(&table, scan(), producer.clone()).unwrap();
        while handle.snapshot().status == RunStatus::Running {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        assert_eq!(handle.snapshot().status, RunStatus::Finalizing);
        assert!(!handle.cancel());
        assert!(handle.wait().await.is_completed());
        assert_eq!(producer.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_supersede_while_producing_results_discards_them() {
        let executor = PipelineExecutor::default();
        let slow = Arc::new(CountingProducer::slow(Duration::from_secs(2)));
        let table = uniform_table(&["only"], Arc::new(ScriptedWorker::constant(100.0))).unwrap();

        let first = executor.start(&table, scan(), slow.clone()).unwrap();
        while first.snapshot().status == RunStatus::Running {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert_eq!(first.snapshot().status, RunStatus::Finalizing);

        let second = executor
            .start(&table, ScanConfig::new("https://second.test"), Arc::new(DemoResultProducer))
            .unwrap();
        assert!(matches!(
            first.outcome(),
            Some(RunOutcome::Cancelled {
                reason: CancelReason::Superseded
            })
        ));
        assert_eq!(slow.calls(), 1);

        assert!(second.wait().await.is_completed());
        // Let the first producer finish; its results must stay unpublished.
        tokio::time::sleep(Duration::from_secs(3)).await;

        assert_eq!(slow.calls(), 1);
        assert_eq!(first.snapshot().status, RunStatus::Cancelled);
        assert!(first.results().await.unwrap_err().is_cancellation());
        assert_eq!(
            executor.publisher().latest().map(|p| p.run_id),
            Some(second.run_id())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_default_scan_table_runs_to_completion() {
        let executor = PipelineExecutor::default();
        let table = seeded_scan_stage_table(17);

        let handle = executor
            .start(&table, scan(), Arc::new(DemoResultProducer))
            .unwrap();
        let events = collect_events(handle.subscribe()).await;
        assert!(handle.wait().await.is_completed());

        let snapshot = handle.snapshot();
        assert_stage_statuses(&snapshot, &[StageStatus::Completed; 6]);
        assert_sequential_transitions(&snapshot);
        assert_monotonic_progress(&events);
        assert_terminal_last(&events);
        for stage in &snapshot.stages {
            assert_eq!(stage.progress, 100.0, "stage {}", stage.id);
        }

        let messages: Vec<String> = handle.log().into_iter().map(|entry| entry.message).collect();
        let expected = [
            "Starting Validating input...",
            "Resolving target host",
            "Target URL is reachable",
            "Starting Crawling website...",
            "Discovered linked pages",
            "Crawl frontier exhausted",
            "Starting Checking live URLs...",
            "Filtering unreachable URLs",
            "Starting Extracting DOM features...",
            "Collecting script sources",
            "Tracing DOM sinks",
            "Starting Analyzing with AI model...",
            "Scoring extracted features",
            "Starting Generating report...",
            "Compiling findings",
        ];
        let mut last = None;
        for line in expected {
            let hits: Vec<usize> = messages
                .iter()
                .enumerate()
                .filter(|(_, m)| m.as_str() == line)
                .map(|(i, _)| i)
                .collect();
            assert_eq!(hits.len(), 1, "{line:?} should be logged once: {messages:?}");
            assert!(last < Some(hits[0]), "{line:?} is out of order: {messages:?}");
            last = Some(hits[0]);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_simulated_tables_of_every_length_complete() {
        for len in 1..=8_u64 {
            let table = (0..len)
                .fold(StageTable::builder(), |builder, i| {
                    let worker = SimulatedWorker::seeded(len * 100 + i)
                        .with_increment_range(0.5 + i as f64, 12.0 + len as f64)
                        .unwrap();
                    builder.add(format!("stage-{i}"), format!("Stage {i}"), Arc::new(worker))
                })
                .build()
                .unwrap();

            let executor = PipelineExecutor::default();
            let handle = executor
                .start(&table, scan(), Arc::new(DemoResultProducer))
                .unwrap();
            let events = collect_events(handle.subscribe()).await;
            assert!(handle.wait().await.is_completed(), "table of {len} stages");

            let snapshot = handle.snapshot();
            assert_stage_statuses(&snapshot, &vec![StageStatus::Completed; table.len()]);
            assert_sequential_transitions(&snapshot);
            assert_monotonic_progress(&events);
            assert_terminal_last(&events);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_conditional_stage_is_skipped() {
        let worker: Arc<dyn StageWorker> = Arc::new(ScriptedWorker::constant(100.0));
        let table = StageTable::builder()
            .add("crawl", "Crawl", Arc::clone(&worker))
            .stage(
                StageDefinition::new("check_live", "Check live URLs", Arc::clone(&worker))
                    .with_condition(|config| config.options.real_testing),
            )
            .add("report", "Report", Arc::clone(&worker))
            .build()
            .unwrap();

        let executor = PipelineExecutor::default();
        let handle = executor
            .start(&table, scan(), Arc::new(DemoResultProducer))
            .unwrap();
        let events = collect_events(handle.subscribe()).await;

        let snapshot = handle.snapshot();
        assert_stage_statuses(
            &snapshot,
            &[StageStatus::Completed, StageStatus::Skipped, StageStatus::Completed],
        );
        assert_sequential_transitions(&snapshot);
        assert!(events.contains(&RunEvent::StageSkipped {
            stage_id: "check_live".to_string()
        }));
        assert!(progress_of(&events, "check_live").is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_logs_are_ordered_and_include_worker_lines() {
        let executor = PipelineExecutor::default();
        let table = uniform_table(
            &["validate", "crawl"],
            Arc::new(ScriptedWorker::constant(50.0).with_tick_logs()),
        )
        .unwrap();
        let handle = executor
            .start(&table, scan(), Arc::new(DemoResultProducer))
            .unwrap();
        handle.wait().await;

        let log = handle.log();
        let seqs: Vec<u64> = log.iter().map(|e| e.seq).collect();
        let expected: Vec<u64> = (0..log.len() as u64).collect();
        assert_eq!(seqs, expected);

        let messages: Vec<&str> = log.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(
            messages,
            vec![
                "Starting single scan of https://example.com",
                "Starting validate...",
                "validate tick 0",
                "validate tick 1",
                "validate completed in 0.4s",
                "Starting crawl...",
                "crawl tick 0",
                "crawl tick 1",
                "crawl completed in 0.4s",
                "All stages completed, collecting results",
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_subscriber_sees_final_state() {
        let executor = PipelineExecutor::default();
        let table = table_with(Arc::new(ScriptedWorker::constant(100.0)));
        let handle = executor
            .start(&table, scan(), Arc::new(DemoResultProducer))
            .unwrap();
        handle.wait().await;

        let mut late = handle.subscribe();
        assert_eq!(late.snapshot.status, RunStatus::Completed);
        assert!(!late.backlog.is_empty());
        assert!(late.next().await.is_none());

        let mut published = executor.publisher().subscribe();
        assert!(published.borrow_and_update().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_is_folded_into_identity() {
        let executor = PipelineExecutor::default();
        let table = table_with(Arc::new(ScriptedWorker::constant(100.0)));
        let session = SessionContext::signed_in("analyst@example.com");
        let request = ScanRequest::new(scan()).with_session(session.clone());

        let handle = executor
            .start(&table, request, Arc::new(DemoResultProducer))
            .unwrap();
        assert_eq!(handle.identity().session_id, Some(session.session_id));
        assert_eq!(handle.identity().user.as_deref(), Some("analyst@example.com"));
        handle.wait().await;
    }

    #[tokio::test]
    async fn test_immediate_config_runs_without_delays() {
        let executor = PipelineExecutor::new(ExecutorConfig::immediate());
        let table = table_with(Arc::new(ScriptedWorker::constant(25.0)));
        let handle = executor
            .start(&table, scan(), Arc::new(DemoResultProducer))
            .unwrap();

        let results = handle.results().await.unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[2].target_type, TargetType::Page);
    }

    #[test]
    fn test_start_outside_runtime_fails() {
        let executor = PipelineExecutor::default();
        let table = table_with(Arc::new(ScriptedWorker::constant(100.0)));
        let err = executor
            .start(&table, scan(), Arc::new(DemoResultProducer))
            .unwrap_err();
        assert!(matches!(err, ScanflowError::Runtime(_)));
    }
}
