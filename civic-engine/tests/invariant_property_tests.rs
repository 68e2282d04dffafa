//! Property-Based Tests for Store-Wide Invariants
//!
//! For any sequence of engine operations, whether each one succeeds or is
//! rejected, the committed store SHALL satisfy:
//! - `closed_at` is set iff a complaint is CLOSED
//! - every non-empty incident's status equals the status derived from its
//!   live members, and its member count equals the live membership
//!
//! Rejections must be typed domain errors, never internal failures.

use civic_test_utils::fixtures::*;
use civic_test_utils::generators::{apply_op, arb_engine_ops, arb_submission};
use civic_test_utils::{assert_invariants, ComplaintStatus, ErrorKind, IncidentStatus};
use proptest::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_invariants_hold_after_every_operation(ops in arb_engine_ops(40)) {
        let engine = seeded_engine();
        for op in &ops {
            if let Err(e) = apply_op(&engine, op) {
                prop_assert_ne!(e.kind(), ErrorKind::Internal, "{:?} failed with {}", op, e);
                prop_assert_ne!(e.kind(), ErrorKind::ConflictingWrite, "{:?} conflicted alone", op);
            }
            assert_invariants(engine.storage());
        }
    }

    #[test]
    fn prop_cancel_is_idempotent(ops in arb_engine_ops(20), submission in arb_submission()) {
        let engine = seeded_engine();
        let id = engine.receive_complaint(submission).unwrap().complaint_id;
        for op in &ops {
            let _ = apply_op(&engine, op);
        }
        let before = engine.complaint(id).unwrap();
        prop_assume!(before.status != ComplaintStatus::Closed);

        let once = engine.cancel(id).unwrap();
        let twice = engine.cancel(id).unwrap();
        prop_assert_eq!(once.status, ComplaintStatus::Canceled);
        prop_assert_eq!(once, twice);
        assert_invariants(engine.storage());
    }

    #[test]
    fn prop_fresh_selection_is_open_with_full_count(
        submissions in prop::collection::vec(arb_submission(), 1..8)
    ) {
        let engine = seeded_engine();
        let ids: Vec<_> = submissions
            .into_iter()
            .map(|s| engine.receive_complaint(s).unwrap().complaint_id)
            .collect();
        let created = engine.create_from_selection(&ids, Some("T".to_string())).unwrap();
        let read = engine.incident(created.incident_id).unwrap();
        prop_assert_eq!(read.member_count, ids.len() as u64);
        prop_assert_eq!(read.status, IncidentStatus::Open);
    }
}
