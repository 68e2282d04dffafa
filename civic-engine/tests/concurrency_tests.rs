//! Races between engine calls on shared rows.
//!
//! Threads share one engine over one in-memory store. Optimistic commits
//! must let exactly one writer win and never lose an update silently.

use std::sync::Barrier;
use std::thread;

use civic_test_utils::fixtures::*;
use civic_test_utils::{
    assert_invariants, AgentId, CivicResult, ComplaintId, ErrorKind, IncidentId,
};

/// Retry an operation while it fails with a retryable conflict.
fn with_retry<T>(mut op: impl FnMut() -> CivicResult<T>) -> CivicResult<T> {
    loop {
        match op() {
            Err(e) if e.is_retryable() => continue,
            other => return other,
        }
    }
}

#[test]
fn test_parallel_assign_has_one_winner() {
    let engine = seeded_engine();

    for round in 0..50 {
        let id = engine
            .receive_complaint(submission(&format!("race {}", round)))
            .unwrap()
            .complaint_id;
        let barrier = Barrier::new(2);

        let results: Vec<(AgentId, CivicResult<_>)> = thread::scope(|s| {
            let handles: Vec<_> = [AgentId(1), AgentId(2)]
                .into_iter()
                .map(|agent| {
                    let engine = &engine;
                    let barrier = &barrier;
                    s.spawn(move || {
                        barrier.wait();
                        (agent, engine.assign(id, agent))
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let winners: Vec<AgentId> = results
            .iter()
            .filter(|(_, r)| r.is_ok())
            .map(|(agent, _)| *agent)
            .collect();
        assert_eq!(winners.len(), 1, "round {}: {:?}", round, results);

        for (_, result) in &results {
            if let Err(e) = result {
                assert!(
                    matches!(e.kind(), ErrorKind::InvalidTransition | ErrorKind::ConflictingWrite),
                    "unexpected loser error: {}",
                    e
                );
            }
        }
        assert_eq!(engine.complaint(id).unwrap().assigned_agent, Some(winners[0]));
    }
    assert_invariants(engine.storage());
}

#[test]
fn test_parallel_moves_converge_on_count() {
    let engine = seeded_engine();
    let seed = engine.receive_complaint(submission("seed")).unwrap().complaint_id;
    let target: IncidentId = engine
        .create_from_selection(&[seed], Some("Target".to_string()))
        .unwrap()
        .incident_id;

    let movers: Vec<ComplaintId> = (0..8)
        .map(|i| {
            engine
                .receive_complaint(submission(&format!("mover {}", i)))
                .unwrap()
                .complaint_id
        })
        .collect();
    let barrier = Barrier::new(movers.len());

    thread::scope(|s| {
        for id in &movers {
            let engine = &engine;
            let barrier = &barrier;
            s.spawn(move || {
                barrier.wait();
                with_retry(|| engine.move_members(&[*id], target)).unwrap();
            });
        }
    });

    let incident = engine.incident(target).unwrap();
    assert_eq!(incident.member_count, 1 + movers.len() as u64);
    assert_eq!(engine.incident_members(target).unwrap().len(), 1 + movers.len());
    assert_invariants(engine.storage());
}

#[test]
fn test_cancel_racing_move_keeps_aggregates_consistent() {
    let engine = seeded_engine();
    let done = closed(&engine, "done", AgentId(1));
    let open = in_progress(&engine, "open", AgentId(1));
    let other = engine.receive_complaint(submission("other")).unwrap().complaint_id;
    let source = engine.create_from_selection(&[done, open], None).unwrap();
    let target = engine.create_from_selection(&[other], None).unwrap();
    let barrier = Barrier::new(2);

    thread::scope(|s| {
        s.spawn(|| {
            barrier.wait();
            with_retry(|| engine.cancel(open)).unwrap();
        });
        s.spawn(|| {
            barrier.wait();
            with_retry(|| engine.move_members(&[open], target.incident_id)).unwrap();
        });
    });

    assert_invariants(engine.storage());
    assert_eq!(
        engine.incident(source.incident_id).unwrap().member_count
            + engine.incident(target.incident_id).unwrap().member_count,
        3
    );
}
