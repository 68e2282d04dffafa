//! Civic Test Utilities
//!
//! Shared test infrastructure for the civic workspace:
//! - Fixtures for submissions, classifications and seeded engines
//! - Proptest generators for entities and engine operation sequences
//! - Whole-store invariant assertions

// Re-export core types for convenience
pub use civic_core::{
    AgentId, ChildInquiry, CivicError, CivicResult, Complaint, ComplaintId, ComplaintStatus,
    ComplaintSubmission, DepartmentId, EmbeddingVector, EngineConfig, ErrorKind, GeoPoint,
    Incident, IncidentId, IncidentStatus, NormalizationResult, RerouteId, RerouteStatus,
    StaticDirectory, Timestamp,
};
pub use civic_engine::CivicEngine;
pub use civic_storage::{MemoryStorage, StorageTx, TransactionalStorage};

use civic_core::derive_status;
use std::sync::Once;

// ============================================================================
// TRACING
// ============================================================================

static TRACING: Once = Once::new();

/// Install an env-filtered fmt subscriber once per test binary.
///
/// Honors `RUST_LOG`; defaults to `warn` so test output stays quiet.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

// ============================================================================
// FIXTURES
// ============================================================================

pub mod fixtures {
    //! Ready-made inputs and engine states.

    use super::*;

    /// An engine over a fresh in-memory store with default config.
    pub fn seeded_engine() -> CivicEngine<MemoryStorage> {
        init_tracing();
        CivicEngine::new(MemoryStorage::new(), EngineConfig::default())
            .expect("default config is valid")
    }

    pub fn submission(title: &str) -> ComplaintSubmission {
        ComplaintSubmission::new(title, format!("{} - details from the applicant", title))
    }

    pub fn submission_at(title: &str, latitude: f64, longitude: f64) -> ComplaintSubmission {
        ComplaintSubmission {
            location: Some(GeoPoint { latitude, longitude }),
            ..submission(title)
        }
    }

    /// Deterministic unit-length embedding derived from the bytes of `text`.
    pub fn fixture_embedding(text: &str, dimensions: usize) -> EmbeddingVector {
        let mut data = vec![0.0f32; dimensions];
        for (i, byte) in text.bytes().enumerate() {
            data[i % dimensions] += byte as f32 / 255.0;
        }
        let norm: f32 = data.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut data {
                *x /= norm;
            }
        }
        EmbeddingVector::new(data, "fixture")
    }

    pub fn normalization(
        text: &str,
        keywords: &[&str],
        department: Option<DepartmentId>,
    ) -> NormalizationResult {
        NormalizationResult {
            topic: keywords.first().map(|k| k.to_string()),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            recommended_department: department,
            embedding: Some(fixture_embedding(text, 16)),
        }
    }

    /// A complaint held IN_PROGRESS by `agent`.
    pub fn in_progress(
        engine: &CivicEngine<MemoryStorage>,
        title: &str,
        agent: AgentId,
    ) -> ComplaintId {
        let c = engine.receive_complaint(submission(title)).expect("receive");
        engine.assign(c.complaint_id, agent).expect("assign");
        c.complaint_id
    }

    /// A complaint answered by `agent` (RESOLVED).
    pub fn resolved(engine: &CivicEngine<MemoryStorage>, title: &str, agent: AgentId) -> ComplaintId {
        let id = in_progress(engine, title, agent);
        engine
            .save_answer(id, agent, "answered", false)
            .expect("final answer");
        id
    }

    /// A complaint answered and closed.
    pub fn closed(engine: &CivicEngine<MemoryStorage>, title: &str, agent: AgentId) -> ComplaintId {
        let id = resolved(engine, title, agent);
        engine.close(id).expect("close");
        id
    }
}

pub use fixtures::seeded_engine;

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for civic entities and operation sequences.

    use super::*;
    use proptest::prelude::*;

    /// Small agent pool so ownership collisions actually happen.
    pub fn arb_agent_id() -> impl Strategy<Value = AgentId> {
        (1u64..4).prop_map(AgentId)
    }

    pub fn arb_department_id() -> impl Strategy<Value = DepartmentId> {
        (1u64..5).prop_map(DepartmentId)
    }

    pub fn arb_complaint_status() -> impl Strategy<Value = ComplaintStatus> {
        proptest::sample::select(ComplaintStatus::ALL.to_vec())
    }

    pub fn arb_submission() -> impl Strategy<Value = ComplaintSubmission> {
        (
            "[a-z]{3,12}( [a-z]{3,8}){0,3}",
            "[a-z ]{5,40}",
            prop::option::of((-90.0f64..=90.0, -180.0f64..=180.0)),
        )
            .prop_map(|(title, body, loc)| ComplaintSubmission {
                location: loc.map(|(latitude, longitude)| GeoPoint { latitude, longitude }),
                ..ComplaintSubmission::new(title, format!("body {}", body))
            })
    }

    /// One engine call. Indexes pick among existing rows modulo their count.
    #[derive(Debug, Clone)]
    pub enum EngineOp {
        Receive(ComplaintSubmission),
        Normalize(usize, Option<DepartmentId>),
        Assign(usize, AgentId),
        Answer(usize, AgentId, bool),
        Release(usize, AgentId),
        Cancel(usize),
        Close(usize),
        FileInquiry(usize),
        RequestReroute(usize, DepartmentId, AgentId),
        Decide(usize, bool),
        CreateIncident(Vec<usize>),
        MoveMembers(Vec<usize>, usize),
    }

    pub fn arb_engine_op() -> impl Strategy<Value = EngineOp> {
        let idx = 0usize..16;
        prop_oneof![
            3 => arb_submission().prop_map(EngineOp::Receive),
            1 => (idx.clone(), prop::option::of(arb_department_id()))
                .prop_map(|(i, d)| EngineOp::Normalize(i, d)),
            3 => (idx.clone(), arb_agent_id()).prop_map(|(i, a)| EngineOp::Assign(i, a)),
            3 => (idx.clone(), arb_agent_id(), any::<bool>())
                .prop_map(|(i, a, d)| EngineOp::Answer(i, a, d)),
            1 => (idx.clone(), arb_agent_id()).prop_map(|(i, a)| EngineOp::Release(i, a)),
            2 => idx.clone().prop_map(EngineOp::Cancel),
            2 => idx.clone().prop_map(EngineOp::Close),
            1 => idx.clone().prop_map(EngineOp::FileInquiry),
            1 => (idx.clone(), arb_department_id(), arb_agent_id())
                .prop_map(|(i, d, a)| EngineOp::RequestReroute(i, d, a)),
            1 => (idx.clone(), any::<bool>()).prop_map(|(i, b)| EngineOp::Decide(i, b)),
            2 => prop::collection::vec(idx.clone(), 1..4).prop_map(EngineOp::CreateIncident),
            2 => (prop::collection::vec(idx.clone(), 1..4), idx)
                .prop_map(|(ids, t)| EngineOp::MoveMembers(ids, t)),
        ]
    }

    pub fn arb_engine_ops(max: usize) -> impl Strategy<Value = Vec<EngineOp>> {
        prop::collection::vec(arb_engine_op(), 0..max)
    }

    fn pick<T: Copy>(items: &[T], idx: usize) -> Option<T> {
        if items.is_empty() {
            None
        } else {
            Some(items[idx % items.len()])
        }
    }

    /// Run one operation. Domain rejections come back as `Err`.
    ///
    /// Ops that reference rows when none exist are skipped with `Ok`.
    pub fn apply_op(engine: &CivicEngine<MemoryStorage>, op: &EngineOp) -> CivicResult<()> {
        let (complaints, incidents, pending) = {
            let mut tx = engine.storage().begin()?;
            let complaints: Vec<ComplaintId> =
                tx.complaint_list()?.iter().map(|c| c.complaint_id).collect();
            let incidents: Vec<IncidentId> =
                tx.incident_list()?.iter().map(|i| i.incident_id).collect();
            let pending: Vec<RerouteId> = tx
                .reroute_list_pending()?
                .iter()
                .map(|r| r.data.reroute_id)
                .collect();
            (complaints, incidents, pending)
        };
        let complaint = |i: usize| pick(&complaints, i);

        match op {
            EngineOp::Receive(s) => engine.receive_complaint(s.clone()).map(|_| ()),
            EngineOp::Normalize(i, dept) => match complaint(*i) {
                Some(id) => {
                    let mut result = fixtures::normalization("normalized", &["road"], *dept);
                    result.topic = Some("roads".to_string());
                    engine.apply_normalization(id, result).map(|_| ())
                }
                None => Ok(()),
            },
            EngineOp::Assign(i, agent) => match complaint(*i) {
                Some(id) => engine.assign(id, *agent).map(|_| ()),
                None => Ok(()),
            },
            EngineOp::Answer(i, agent, draft) => match complaint(*i) {
                Some(id) => engine.save_answer(id, *agent, "answer", *draft).map(|_| ()),
                None => Ok(()),
            },
            EngineOp::Release(i, agent) => match complaint(*i) {
                Some(id) => engine.release(id, *agent).map(|_| ()),
                None => Ok(()),
            },
            EngineOp::Cancel(i) => match complaint(*i) {
                Some(id) => engine.cancel(id).map(|_| ()),
                None => Ok(()),
            },
            EngineOp::Close(i) => match complaint(*i) {
                Some(id) => engine.close(id).map(|_| ()),
                None => Ok(()),
            },
            EngineOp::FileInquiry(i) => match complaint(*i) {
                Some(id) => engine
                    .file_child_inquiry(id, "follow-up", "still broken")
                    .map(|_| ()),
                None => Ok(()),
            },
            EngineOp::RequestReroute(i, dept, agent) => match complaint(*i) {
                Some(id) => engine
                    .request_reroute(id, *dept, "wrong department", *agent)
                    .map(|_| ()),
                None => Ok(()),
            },
            EngineOp::Decide(i, approve) => match pick(&pending, *i) {
                Some(request) => engine.decide(request, *approve, AgentId(99)).map(|_| ()),
                None => Ok(()),
            },
            EngineOp::CreateIncident(picks) => {
                let ids: Vec<ComplaintId> = picks.iter().filter_map(|i| complaint(*i)).collect();
                if ids.is_empty() {
                    return Ok(());
                }
                engine.create_from_selection(&ids, None).map(|_| ())
            }
            EngineOp::MoveMembers(picks, target) => {
                let ids: Vec<ComplaintId> = picks.iter().filter_map(|i| complaint(*i)).collect();
                match pick(&incidents, *target) {
                    Some(target) if !ids.is_empty() => engine.move_members(&ids, target).map(|_| ()),
                    _ => Ok(()),
                }
            }
        }
    }
}

// ============================================================================
// INVARIANT ASSERTIONS
// ============================================================================

/// Assert the record and aggregate invariants over every committed row.
///
/// - `closed_at` is set iff the complaint is CLOSED
/// - pre-assignment complaints have no assignee; working ones have one
/// - every incident's `member_count` equals its live membership
/// - every non-empty incident's status equals the derived status
///
/// # Panics
/// Panics with a description of the first violated invariant.
pub fn assert_invariants(storage: &MemoryStorage) {
    let mut tx = storage.begin().expect("begin read transaction");
    let complaints = tx.complaint_list().expect("list complaints");

    for c in &complaints {
        assert_eq!(
            c.closed_at.is_some(),
            c.status == ComplaintStatus::Closed,
            "complaint {} is {} with closed_at {:?}",
            c.complaint_id,
            c.status,
            c.closed_at
        );
        if c.status.is_pre_assignment() {
            assert!(
                c.assigned_agent.is_none(),
                "complaint {} is {} but held by {:?}",
                c.complaint_id,
                c.status,
                c.assigned_agent
            );
        }
        if matches!(
            c.status,
            ComplaintStatus::InProgress | ComplaintStatus::ReroutePending | ComplaintStatus::Resolved
        ) {
            assert!(
                c.assigned_agent.is_some(),
                "complaint {} is {} without an assignee",
                c.complaint_id,
                c.status
            );
        }
    }

    for incident in tx.incident_list().expect("list incidents") {
        let members: Vec<&Complaint> = complaints
            .iter()
            .filter(|c| c.incident_id == Some(incident.incident_id))
            .collect();
        assert_eq!(
            incident.member_count,
            members.len() as u64,
            "incident {} member_count drifted",
            incident.incident_id
        );
        if let Some(derived) = derive_status(members.iter().map(|c| c.status)) {
            assert_eq!(
                incident.status, derived,
                "incident {} status disagrees with its members",
                incident.incident_id
            );
        }
    }
}

/// Error kind of a result, for terse assertions.
pub fn kind_of<T: std::fmt::Debug>(result: CivicResult<T>) -> ErrorKind {
    result.expect_err("expected an error").kind()
}
