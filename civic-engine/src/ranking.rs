//! Advisory incident suggestions.
//!
//! Ranking never changes membership. It only tells an agent which open
//! incidents a complaint most likely belongs to.

use civic_core::{keyword_jaccard, CivicResult, Complaint, EngineConfig, Incident, IncidentId};
use serde::{Deserialize, Serialize};

/// An incident with its live members, offered to a ranker.
#[derive(Debug, Clone)]
pub struct IncidentCandidate {
    pub incident: Incident,
    pub members: Vec<Complaint>,
}

/// A ranked suggestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncidentSuggestion {
    pub incident_id: IncidentId,
    pub title: String,
    pub score: f32,
    pub embedding_score: f32,
    pub keyword_score: f32,
}

/// Similarity search over candidate incidents.
pub trait IncidentRanker: Send + Sync {
    /// Rank `candidates` for `complaint`, best first.
    fn rank(
        &self,
        complaint: &Complaint,
        candidates: &[IncidentCandidate],
    ) -> CivicResult<Vec<IncidentSuggestion>>;
}

/// Weighted mix of embedding cosine and keyword Jaccard.
///
/// `score = w * max_cosine(member embeddings) + (1 - w) * jaccard(keywords)`
#[derive(Debug, Clone, PartialEq)]
pub struct HybridRanker {
    pub threshold: f32,
    pub embedding_weight: f32,
    pub limit: usize,
}

impl HybridRanker {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            threshold: config.similarity_threshold,
            embedding_weight: config.embedding_weight,
            limit: config.max_suggestions,
        }
    }

    fn embedding_score(complaint: &Complaint, members: &[Complaint]) -> f32 {
        let Some(query) = complaint.embedding() else {
            return 0.0;
        };
        members
            .iter()
            .filter(|m| m.complaint_id != complaint.complaint_id)
            .filter_map(|m| m.embedding())
            .filter(|e| e.dimensions == query.dimensions)
            .filter_map(|e| query.cosine_similarity(e).ok())
            .fold(0.0f32, f32::max)
    }

    fn keyword_score(complaint: &Complaint, candidate: &IncidentCandidate) -> f32 {
        match &candidate.incident.keywords {
            Some(summary) => keyword_jaccard(complaint.keywords(), summary),
            None => {
                let pooled: Vec<String> = candidate
                    .members
                    .iter()
                    .filter(|m| m.complaint_id != complaint.complaint_id)
                    .flat_map(|m| m.keywords().iter().cloned())
                    .collect();
                keyword_jaccard(complaint.keywords(), &pooled)
            }
        }
    }
}

impl Default for HybridRanker {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

impl IncidentRanker for HybridRanker {
    fn rank(
        &self,
        complaint: &Complaint,
        candidates: &[IncidentCandidate],
    ) -> CivicResult<Vec<IncidentSuggestion>> {
        let w = self.embedding_weight;
        let mut ranked: Vec<IncidentSuggestion> = candidates
            .iter()
            .map(|candidate| {
                let embedding_score = Self::embedding_score(complaint, &candidate.members);
                let keyword_score = Self::keyword_score(complaint, candidate);
                IncidentSuggestion {
                    incident_id: candidate.incident.incident_id,
                    title: candidate.incident.title.clone(),
                    score: w * embedding_score + (1.0 - w) * keyword_score,
                    embedding_score,
                    keyword_score,
                }
            })
            .filter(|s| s.score >= self.threshold)
            .collect();

        ranked.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.incident_id.cmp(&b.incident_id))
        });
        ranked.truncate(self.limit);
        Ok(ranked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use civic_core::{
        Classification, ComplaintId, ComplaintSubmission, EmbeddingVector,
    };

    fn classified(id: u64, embedding: Vec<f32>, keywords: &[&str]) -> Complaint {
        let mut c = Complaint::received(ComplaintId(id), ComplaintSubmission::new("t", "b"), Utc::now());
        c.classification = Some(Classification {
            topic: None,
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            recommended_department: None,
            embedding: Some(EmbeddingVector::new(embedding, "test")),
        });
        c
    }

    fn candidate(id: u64, members: Vec<Complaint>) -> IncidentCandidate {
        IncidentCandidate {
            incident: Incident::open(IncidentId(id), format!("incident {}", id), Utc::now()),
            members,
        }
    }

    #[test]
    fn test_identical_complaint_scores_one() {
        let query = classified(1, vec![1.0, 0.0], &["pothole"]);
        let ranker = HybridRanker::default();
        let out = ranker
            .rank(&query, &[candidate(10, vec![classified(2, vec![1.0, 0.0], &["pothole"])])])
            .unwrap();
        assert_eq!(out.len(), 1);
        assert!((out[0].score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_threshold_filters_and_sorts() {
        let query = classified(1, vec![1.0, 0.0], &["pothole", "road"]);
        let ranker = HybridRanker {
            threshold: 0.5,
            embedding_weight: 0.6,
            limit: 5,
        };
        let out = ranker
            .rank(
                &query,
                &[
                    candidate(10, vec![classified(2, vec![0.0, 1.0], &["noise"])]),
                    candidate(11, vec![classified(3, vec![0.8, 0.6], &["road"])]),
                    candidate(12, vec![classified(4, vec![1.0, 0.0], &["pothole", "road"])]),
                ],
            )
            .unwrap();
        let ids: Vec<_> = out.iter().map(|s| s.incident_id).collect();
        assert_eq!(ids, vec![IncidentId(12), IncidentId(11)]);
    }

    #[test]
    fn test_limit_caps_results() {
        let query = classified(1, vec![1.0, 0.0], &["a"]);
        let ranker = HybridRanker {
            threshold: 0.0,
            embedding_weight: 0.5,
            limit: 2,
        };
        let candidates: Vec<_> = (10..15)
            .map(|i| candidate(i, vec![classified(i + 100, vec![1.0, 0.0], &["a"])]))
            .collect();
        assert_eq!(ranker.rank(&query, &candidates).unwrap().len(), 2);
    }

    #[test]
    fn test_unclassified_complaint_scores_zero() {
        let query = Complaint::received(ComplaintId(1), ComplaintSubmission::new("t", "b"), Utc::now());
        let out = HybridRanker::default()
            .rank(&query, &[candidate(10, vec![classified(2, vec![1.0], &["x"])])])
            .unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_incident_keyword_summary_preferred() {
        let query = classified(1, vec![0.0, 1.0], &["flood"]);
        let mut cand = candidate(10, vec![classified(2, vec![1.0, 0.0], &["noise"])]);
        cand.incident.keywords = Some(vec!["flood".to_string()]);
        let ranker = HybridRanker {
            threshold: 0.0,
            embedding_weight: 0.0,
            limit: 5,
        };
        let out = ranker.rank(&query, &[cand]).unwrap();
        assert!((out[0].keyword_score - 1.0).abs() < 1e-6);
    }
}
