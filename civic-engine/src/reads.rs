//! Read accessors.
//!
//! Reads go through a transaction like everything else, so a read that
//! races a writer fails with `ConflictingWrite` instead of returning a torn
//! view.

use std::cmp::Reverse;

use civic_core::{
    AgentId, ChildInquiry, CivicResult, Complaint, ComplaintId, ComplaintStatus, DepartmentDirectory,
    DepartmentId, Incident, IncidentId, IncidentStatus, RerouteId, StoredReroute,
};
use civic_storage::StorageTx;
use serde::{Deserialize, Serialize};

use crate::services::{require_complaint, require_incident, require_reroute};

/// Presentation view of a complaint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplaintSummary {
    pub complaint_id: ComplaintId,
    pub title: String,
    pub status: ComplaintStatus,
    pub department_id: Option<DepartmentId>,
    /// Resolved through the department directory, if known
    pub department_name: Option<String>,
    pub assigned_agent: Option<AgentId>,
    pub incident_id: Option<IncidentId>,
    pub inquiry_count: usize,
}

pub fn complaint(tx: &mut dyn StorageTx, id: ComplaintId) -> CivicResult<Complaint> {
    require_complaint(tx, id)
}

/// Follow-up inquiries, oldest first.
pub fn child_inquiries(tx: &mut dyn StorageTx, id: ComplaintId) -> CivicResult<Vec<ChildInquiry>> {
    require_complaint(tx, id)?;
    tx.inquiries_for(id)
}

pub fn incident(tx: &mut dyn StorageTx, id: IncidentId) -> CivicResult<Incident> {
    require_incident(tx, id)
}

pub fn incident_members(tx: &mut dyn StorageTx, id: IncidentId) -> CivicResult<Vec<Complaint>> {
    require_incident(tx, id)?;
    tx.complaints_in_incident(id)
}

pub fn reroute_request(tx: &mut dyn StorageTx, id: RerouteId) -> CivicResult<StoredReroute> {
    require_reroute(tx, id)
}

pub fn reroutes_for_complaint(
    tx: &mut dyn StorageTx,
    id: ComplaintId,
) -> CivicResult<Vec<StoredReroute>> {
    require_complaint(tx, id)?;
    tx.reroutes_for_complaint(id)
}

/// Reviewer queue: every PENDING request, oldest first.
pub fn pending_reroutes(tx: &mut dyn StorageTx) -> CivicResult<Vec<StoredReroute>> {
    let mut pending = tx.reroute_list_pending()?;
    pending.sort_by_key(|r| (r.data.requested_at, r.data.reroute_id));
    Ok(pending)
}

/// Incident listing.
///
/// Only incidents with at least `min_members` members are listed. `query`
/// matches a title substring (case-insensitive) or, when numeric, the id.
/// Most recent occurrence first; incidents with no occurrence sort last.
pub fn search_incidents(
    tx: &mut dyn StorageTx,
    query: Option<&str>,
    status: Option<IncidentStatus>,
    min_members: u64,
) -> CivicResult<Vec<Incident>> {
    let needle = query
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .map(str::to_lowercase);
    let numeric: Option<u64> = needle.as_deref().and_then(|q| q.parse().ok());

    let mut found: Vec<Incident> = tx
        .incident_list()?
        .into_iter()
        .filter(|i| i.member_count >= min_members)
        .filter(|i| status.map_or(true, |s| i.status == s))
        .filter(|i| match &needle {
            None => true,
            Some(q) => {
                numeric == Some(i.incident_id.0) || i.title.to_lowercase().contains(q.as_str())
            }
        })
        .collect();

    sort_by_recency(&mut found);
    Ok(found)
}

/// OPEN incidents with at least `min_members` members, most recent first.
pub fn major_incidents(tx: &mut dyn StorageTx, min_members: u64) -> CivicResult<Vec<Incident>> {
    let mut found: Vec<Incident> = tx
        .incident_list()?
        .into_iter()
        .filter(|i| i.status == IncidentStatus::Open && i.member_count >= min_members)
        .collect();
    sort_by_recency(&mut found);
    Ok(found)
}

fn sort_by_recency(incidents: &mut [Incident]) {
    // None < Some, so reversing puts missing occurrences last
    incidents.sort_by_key(|i| (Reverse(i.last_occurred_at), i.incident_id));
}

pub fn complaint_summary(
    tx: &mut dyn StorageTx,
    id: ComplaintId,
    directory: &dyn DepartmentDirectory,
) -> CivicResult<ComplaintSummary> {
    let complaint = require_complaint(tx, id)?;
    let inquiry_count = tx.inquiries_for(id)?.len();
    Ok(ComplaintSummary {
        complaint_id: complaint.complaint_id,
        department_name: complaint
            .department_id
            .and_then(|d| directory.display_name(d)),
        title: complaint.title,
        status: complaint.status,
        department_id: complaint.department_id,
        assigned_agent: complaint.assigned_agent,
        incident_id: complaint.incident_id,
        inquiry_count,
    })
}
