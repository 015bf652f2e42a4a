//! Assertions for run ordering guarantees.

use std::collections::HashMap;

use crate::core::{RunEvent, RunSnapshot, StageStatus, MAX_PROGRESS};

/// Asserts that the stages have the expected statuses, in order.
pub fn assert_stage_statuses(snapshot: &RunSnapshot, expected: &[StageStatus]) {
    assert_eq!(
        snapshot.statuses(),
        expected,
        "Unexpected stage statuses for run {}",
        snapshot.run_id
    );
}

/// Replays the transition log and asserts the sequential ordering guarantee.
///
/// At most one stage is active at any point, and a stage only leaves
/// `Pending` once every earlier stage is `Completed` or `Skipped`.
pub fn assert_sequential_transitions(snapshot: &RunSnapshot) {
    let mut statuses: Vec<StageStatus> = vec![StageStatus::Pending; snapshot.stages.len()];
    let index_of: HashMap<&str, usize> = snapshot
        .stages
        .iter()
        .enumerate()
        .map(|(i, s)| (s.id.as_str(), i))
        .collect();

    let mut last_seq = None;
    for transition in &snapshot.transitions {
        assert!(
            last_seq.map_or(true, |seq| transition.seq > seq),
            "Transition sequence numbers must increase: {transition:?}"
        );
        last_seq = Some(transition.seq);

        let index = *index_of
            .get(transition.stage_id.as_str())
            .unwrap_or_else(|| panic!("Transition for unknown stage: {transition:?}"));
        assert_eq!(
            statuses[index], transition.from,
            "Transition does not start from the current status: {transition:?}"
        );

        if transition.from == StageStatus::Pending {
            assert!(
                statuses[..index].iter().all(StageStatus::is_done),
                "Stage '{}' left Pending before earlier stages were done: {statuses:?}",
                transition.stage_id
            );
        }
        statuses[index] = transition.to;

        let active = statuses.iter().filter(|s| **s == StageStatus::Active).count();
        assert!(active <= 1, "More than one stage active: {statuses:?}");
    }

    assert_eq!(
        statuses,
        snapshot.statuses(),
        "Transition log does not replay to the current statuses"
    );
}

/// Asserts that each stage's reported progress never decreases and never
/// exceeds 100.
pub fn assert_monotonic_progress(events: &[RunEvent]) {
    let mut last: HashMap<&str, f64> = HashMap::new();
    for event in events {
        match event {
            RunEvent::StageStarted { stage_id, .. } => {
                last.insert(stage_id.as_str(), 0.0);
            }
            RunEvent::Progress { stage_id, progress } => {
                let previous = last.get(stage_id.as_str()).copied().unwrap_or(0.0);
                assert!(
                    *progress >= previous,
                    "Progress of '{stage_id}' went from {previous} to {progress}"
                );
                assert!(
                    *progress <= MAX_PROGRESS,
                    "Progress of '{stage_id}' exceeded {MAX_PROGRESS}: {progress}"
                );
                last.insert(stage_id.as_str(), *progress);
            }
            _ => {}
        }
    }
}

/// Asserts that exactly one terminal event was seen and that it came last.
pub fn assert_terminal_last(events: &[RunEvent]) {
    let terminal: Vec<usize> = events
        .iter()
        .enumerate()
        .filter(|(_, e)| e.is_terminal())
        .map(|(i, _)| i)
        .collect();
    assert_eq!(terminal.len(), 1, "Expected exactly one terminal event: {events:?}");
    assert_eq!(
        terminal[0],
        events.len() - 1,
        "Events followed the terminal event: {events:?}"
    );
}
