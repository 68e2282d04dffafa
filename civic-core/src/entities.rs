//! Entity structures

use crate::{
    AgentId, ApplicantId, ComplaintId, ComplaintStatus, DepartmentId, EmbeddingVector,
    IncidentId, IncidentStatus, InquiryId, Timestamp, ValidationError, CivicResult,
};
use serde::{Deserialize, Serialize};

/// A latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    /// Arithmetic mean of the given points, `None` when there are none.
    pub fn centroid<I>(points: I) -> Option<GeoPoint>
    where
        I: IntoIterator<Item = GeoPoint>,
    {
        let mut count = 0usize;
        let mut lat = 0.0f64;
        let mut lon = 0.0f64;
        for p in points {
            count += 1;
            lat += p.latitude;
            lon += p.longitude;
        }
        if count == 0 {
            return None;
        }
        Some(GeoPoint {
            latitude: lat / count as f64,
            longitude: lon / count as f64,
        })
    }
}

/// Classification fields written by the external normalizer.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Classification {
    pub topic: Option<String>,
    pub keywords: Vec<String>,
    pub recommended_department: Option<DepartmentId>,
    pub embedding: Option<EmbeddingVector>,
}

/// A citizen complaint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Complaint {
    pub complaint_id: ComplaintId,
    pub applicant_id: Option<ApplicantId>,
    pub title: String,
    pub body: String,
    pub address: Option<String>,
    pub location: Option<GeoPoint>,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub submitted_at: Timestamp,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub updated_at: Timestamp,
    /// Set exactly when status is CLOSED
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "date-time"))]
    pub closed_at: Option<Timestamp>,
    pub status: ComplaintStatus,
    pub department_id: Option<DepartmentId>,
    pub ai_predicted_department: Option<DepartmentId>,
    pub assigned_agent: Option<AgentId>,
    pub answer: Option<String>,
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "date-time"))]
    pub answered_at: Option<Timestamp>,
    pub incident_id: Option<IncidentId>,
    pub classification: Option<Classification>,
}

impl Complaint {
    /// Build a freshly received complaint from a validated submission.
    pub fn received(id: ComplaintId, submission: ComplaintSubmission, now: Timestamp) -> Self {
        Self {
            complaint_id: id,
            applicant_id: submission.applicant_id,
            title: submission.title,
            body: submission.body,
            address: submission.address,
            location: submission.location,
            submitted_at: now,
            updated_at: now,
            closed_at: None,
            status: ComplaintStatus::Received,
            department_id: None,
            ai_predicted_department: None,
            assigned_agent: None,
            answer: None,
            answered_at: None,
            incident_id: None,
            classification: None,
        }
    }

    pub fn keywords(&self) -> &[String] {
        self.classification
            .as_ref()
            .map(|c| c.keywords.as_slice())
            .unwrap_or(&[])
    }

    pub fn embedding(&self) -> Option<&EmbeddingVector> {
        self.classification.as_ref().and_then(|c| c.embedding.as_ref())
    }
}

/// A follow-up inquiry filed against an answered complaint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ChildInquiry {
    pub inquiry_id: InquiryId,
    pub parent_id: ComplaintId,
    pub title: String,
    pub body: String,
    pub status: ComplaintStatus,
    pub answer: Option<String>,
    pub answered_by: Option<AgentId>,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub created_at: Timestamp,
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "date-time"))]
    pub answered_at: Option<Timestamp>,
}

/// A cluster of complaints describing the same underlying issue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Incident {
    pub incident_id: IncidentId,
    pub title: String,
    /// Derived from member statuses, never set directly by callers
    pub status: IncidentStatus,
    pub member_count: u64,
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "date-time"))]
    pub first_occurred_at: Option<Timestamp>,
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "date-time"))]
    pub last_occurred_at: Option<Timestamp>,
    pub centroid: Option<GeoPoint>,
    /// Keyword summary, maintained externally
    pub keywords: Option<Vec<String>>,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub opened_at: Timestamp,
}

impl Incident {
    /// A new, empty, OPEN incident.
    pub fn open(id: IncidentId, title: String, now: Timestamp) -> Self {
        Self {
            incident_id: id,
            title,
            status: IncidentStatus::Open,
            member_count: 0,
            first_occurred_at: None,
            last_occurred_at: None,
            centroid: None,
            keywords: None,
            opened_at: now,
        }
    }
}

// ============================================================================
// INPUTS
// ============================================================================

/// Intake payload for a new complaint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ComplaintSubmission {
    pub applicant_id: Option<ApplicantId>,
    pub title: String,
    pub body: String,
    pub address: Option<String>,
    pub location: Option<GeoPoint>,
}

impl ComplaintSubmission {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            applicant_id: None,
            title: title.into(),
            body: body.into(),
            address: None,
            location: None,
        }
    }

    pub fn validate(&self) -> CivicResult<()> {
        if self.title.trim().is_empty() {
            return Err(ValidationError::RequiredFieldMissing {
                field: "title".to_string(),
            }
            .into());
        }
        if self.body.trim().is_empty() {
            return Err(ValidationError::RequiredFieldMissing {
                field: "body".to_string(),
            }
            .into());
        }
        if let Some(p) = self.location {
            if !(-90.0..=90.0).contains(&p.latitude) || !(-180.0..=180.0).contains(&p.longitude) {
                return Err(ValidationError::InvalidValue {
                    field: "location".to_string(),
                    reason: format!("({}, {}) is not a valid coordinate", p.latitude, p.longitude),
                }
                .into());
            }
        }
        Ok(())
    }
}

/// Post-hoc result of the external normalization pipeline.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct NormalizationResult {
    pub topic: Option<String>,
    pub keywords: Vec<String>,
    pub recommended_department: Option<DepartmentId>,
    pub embedding: Option<EmbeddingVector>,
}

impl From<NormalizationResult> for Classification {
    fn from(result: NormalizationResult) -> Self {
        Classification {
            topic: result.topic,
            keywords: result.keywords,
            recommended_department: result.recommended_department,
            embedding: result.embedding,
        }
    }
}
