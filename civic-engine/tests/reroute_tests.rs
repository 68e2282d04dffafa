//! Reroute request and review workflow.

use civic_test_utils::fixtures::*;
use civic_test_utils::{
    assert_invariants, kind_of, AgentId, ComplaintId, ComplaintStatus, DepartmentId, ErrorKind,
    IncidentStatus, RerouteStatus,
};

const ALICE: AgentId = AgentId(1);
const REVIEWER: AgentId = AgentId(50);

fn in_department(
    engine: &civic_test_utils::CivicEngine<civic_test_utils::MemoryStorage>,
    dept: DepartmentId,
) -> ComplaintId {
    let c = engine.receive_complaint(submission("illegal dumping")).unwrap();
    engine
        .apply_normalization(c.complaint_id, normalization("dumping", &["waste"], Some(dept)))
        .unwrap();
    engine.assign(c.complaint_id, ALICE).unwrap();
    c.complaint_id
}

#[test]
fn test_request_is_only_a_proposal() {
    let engine = seeded_engine();
    let id = in_department(&engine, DepartmentId(3));

    let request = engine
        .request_reroute(id, DepartmentId(9), "belongs to sanitation", ALICE)
        .unwrap();
    assert_eq!(request.status, RerouteStatus::Pending);
    assert_eq!(request.data.origin_department, Some(DepartmentId(3)));

    let c = engine.complaint(id).unwrap();
    assert_eq!(c.status, ComplaintStatus::ReroutePending);
    assert_eq!(c.department_id, Some(DepartmentId(3)));
    assert_eq!(c.assigned_agent, Some(ALICE));
}

#[test]
fn test_reject_restores_in_progress() {
    let engine = seeded_engine();
    let id = in_department(&engine, DepartmentId(3));
    let request = engine
        .request_reroute(id, DepartmentId(9), "not ours", ALICE)
        .unwrap();

    let decision = engine
        .decide(request.data.reroute_id, false, REVIEWER)
        .unwrap();
    assert!(decision.applied);
    assert_eq!(decision.request.status, RerouteStatus::Rejected);
    assert_eq!(decision.request.data.reviewer, Some(REVIEWER));
    assert!(decision.request.data.decided_at.is_some());

    let c = engine.complaint(id).unwrap();
    assert_eq!(c.status, ComplaintStatus::InProgress);
    assert_eq!(c.department_id, Some(DepartmentId(3)));
    assert_eq!(c.assigned_agent, Some(ALICE));
}

#[test]
fn test_approve_moves_department_and_clears_assignee() {
    let engine = seeded_engine();
    let id = in_department(&engine, DepartmentId(3));
    let request = engine
        .request_reroute(id, DepartmentId(9), "not ours", ALICE)
        .unwrap();

    engine.decide(request.data.reroute_id, true, REVIEWER).unwrap();

    let c = engine.complaint(id).unwrap();
    assert_eq!(c.status, ComplaintStatus::Received);
    assert_eq!(c.department_id, Some(DepartmentId(9)));
    assert!(c.assigned_agent.is_none());
    assert_eq!(
        engine.reroute_request(request.data.reroute_id).unwrap().status,
        RerouteStatus::Approved
    );
}

#[test]
fn test_second_decision_is_already_decided() {
    let engine = seeded_engine();
    let id = in_department(&engine, DepartmentId(3));
    let request = engine
        .request_reroute(id, DepartmentId(9), "not ours", ALICE)
        .unwrap();
    engine.decide(request.data.reroute_id, false, REVIEWER).unwrap();
    assert_eq!(
        kind_of(engine.decide(request.data.reroute_id, true, REVIEWER)),
        ErrorKind::AlreadyDecided
    );
    assert_eq!(engine.complaint(id).unwrap().department_id, Some(DepartmentId(3)));
}

#[test]
fn test_only_one_pending_request_per_complaint() {
    let engine = seeded_engine();
    let id = in_department(&engine, DepartmentId(3));
    engine
        .request_reroute(id, DepartmentId(9), "not ours", ALICE)
        .unwrap();
    assert_eq!(
        kind_of(engine.request_reroute(id, DepartmentId(8), "or theirs", ALICE)),
        ErrorKind::InvalidTransition
    );
    assert_eq!(engine.reroutes_for_complaint(id).unwrap().len(), 1);
}

#[test]
fn test_request_requires_in_progress() {
    let engine = seeded_engine();
    let c = engine.receive_complaint(submission("unassigned")).unwrap();
    assert_eq!(
        kind_of(engine.request_reroute(c.complaint_id, DepartmentId(9), "x", ALICE)),
        ErrorKind::InvalidTransition
    );
}

#[test]
fn test_request_to_current_department_is_invalid() {
    let engine = seeded_engine();
    let id = in_department(&engine, DepartmentId(3));
    assert_eq!(
        kind_of(engine.request_reroute(id, DepartmentId(3), "same", ALICE)),
        ErrorKind::Invalid
    );
    assert_eq!(engine.complaint(id).unwrap().status, ComplaintStatus::InProgress);
}

#[test]
fn test_decision_after_cancel_records_only() {
    let engine = seeded_engine();
    let id = in_department(&engine, DepartmentId(3));
    let request = engine
        .request_reroute(id, DepartmentId(9), "not ours", ALICE)
        .unwrap();
    engine.cancel(id).unwrap();

    let decision = engine.decide(request.data.reroute_id, true, REVIEWER).unwrap();
    assert!(!decision.applied);
    assert_eq!(decision.request.status, RerouteStatus::Approved);
    let c = engine.complaint(id).unwrap();
    assert_eq!(c.status, ComplaintStatus::Canceled);
    assert_eq!(c.department_id, Some(DepartmentId(3)));
}

#[test]
fn test_pending_queue_is_oldest_first() {
    let engine = seeded_engine();
    let first = in_department(&engine, DepartmentId(1));
    let second = in_department(&engine, DepartmentId(1));
    let r1 = engine.request_reroute(first, DepartmentId(2), "a", ALICE).unwrap();
    let r2 = engine.request_reroute(second, DepartmentId(2), "b", ALICE).unwrap();

    let queue: Vec<_> = engine
        .pending_reroutes()
        .unwrap()
        .into_iter()
        .map(|r| r.data.reroute_id)
        .collect();
    assert_eq!(queue, vec![r1.data.reroute_id, r2.data.reroute_id]);

    engine.decide(r1.data.reroute_id, false, REVIEWER).unwrap();
    assert_eq!(engine.pending_reroutes().unwrap().len(), 1);
}

#[test]
fn test_reroute_keeps_incident_open() {
    let engine = seeded_engine();
    let done = closed(&engine, "dumping a", ALICE);
    let id = in_department(&engine, DepartmentId(3));
    let incident = engine.create_from_selection(&[done, id], None).unwrap();
    assert_eq!(incident.status, IncidentStatus::Open);

    let request = engine
        .request_reroute(id, DepartmentId(9), "not ours", ALICE)
        .unwrap();
    engine.decide(request.data.reroute_id, true, REVIEWER).unwrap();

    assert_eq!(engine.incident(incident.incident_id).unwrap().status, IncidentStatus::Open);
    assert_invariants(engine.storage());
}
