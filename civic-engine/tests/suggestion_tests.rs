//! Advisory incident suggestions.

use civic_engine::{IncidentCandidate, IncidentRanker, IncidentSuggestion};
use civic_test_utils::fixtures::*;
use civic_test_utils::{AgentId, CivicEngine, CivicResult, Complaint, ComplaintId, MemoryStorage};

fn classified(engine: &CivicEngine<MemoryStorage>, text: &str, keywords: &[&str]) -> ComplaintId {
    let id = engine.receive_complaint(submission(text)).unwrap().complaint_id;
    engine
        .apply_normalization(id, normalization(text, keywords, None))
        .unwrap();
    id
}

#[test]
fn test_similar_open_incident_is_suggested() {
    let engine = seeded_engine();
    let a = classified(&engine, "water leak on main street", &["water", "leak"]);
    let b = classified(&engine, "water leak on main street", &["water", "leak"]);
    let incident = engine.create_from_selection(&[a, b], None).unwrap();
    let unrelated = classified(&engine, "loud music at night", &["noise"]);
    let noise = engine.create_from_selection(&[unrelated], None).unwrap();

    let query = classified(&engine, "water leak on main street", &["water", "leak"]);
    let suggestions = engine.suggest_incidents(query).unwrap();

    assert_eq!(suggestions[0].incident_id, incident.incident_id);
    assert!((suggestions[0].score - 1.0).abs() < 1e-5);
    assert!(suggestions.iter().all(|s| s.incident_id != noise.incident_id));
    assert!(engine.complaint(query).unwrap().incident_id.is_none());
}

#[test]
fn test_closed_and_own_incidents_are_not_suggested() {
    let engine = seeded_engine();
    let a = classified(&engine, "broken swing", &["playground"]);
    let done = closed(&engine, "broken swing", AgentId(1));
    engine
        .apply_normalization(done, normalization("broken swing", &["playground"], None))
        .unwrap();
    let closed_incident = engine.create_from_selection(&[done], None).unwrap();
    let own = engine.create_from_selection(&[a], None).unwrap();

    let suggestions = engine.suggest_incidents(a).unwrap();
    assert!(suggestions
        .iter()
        .all(|s| s.incident_id != closed_incident.incident_id && s.incident_id != own.incident_id));
}

#[test]
fn test_suggestions_are_capped_and_sorted() {
    let engine = seeded_engine();
    for _ in 0..7 {
        let id = classified(&engine, "fallen tree", &["tree"]);
        engine.create_from_selection(&[id], None).unwrap();
    }
    let query = classified(&engine, "fallen tree", &["tree"]);
    let suggestions = engine.suggest_incidents(query).unwrap();
    assert_eq!(suggestions.len(), engine.config().max_suggestions);
    assert!(suggestions.windows(2).all(|w| w[0].score >= w[1].score));
}

struct FixedRanker;

impl IncidentRanker for FixedRanker {
    fn rank(
        &self,
        _complaint: &Complaint,
        candidates: &[IncidentCandidate],
    ) -> CivicResult<Vec<IncidentSuggestion>> {
        Ok(candidates
            .iter()
            .map(|c| IncidentSuggestion {
                incident_id: c.incident.incident_id,
                title: c.incident.title.clone(),
                score: c.members.len() as f32,
                embedding_score: 0.0,
                keyword_score: 0.0,
            })
            .collect())
    }
}

#[test]
fn test_custom_ranker_sees_members_without_the_query() {
    let engine = seeded_engine().with_ranker(FixedRanker);
    let a = engine.receive_complaint(submission("a")).unwrap().complaint_id;
    let b = engine.receive_complaint(submission("b")).unwrap().complaint_id;
    let incident = engine.create_from_selection(&[a, b], None).unwrap();
    let q = engine.receive_complaint(submission("q")).unwrap().complaint_id;

    let suggestions = engine.suggest_incidents(q).unwrap();
    assert_eq!(suggestions.len(), 1);
    assert_eq!(suggestions[0].incident_id, incident.incident_id);
    assert_eq!(suggestions[0].score, 2.0);
}
