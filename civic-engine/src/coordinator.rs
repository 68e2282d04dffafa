//! Consistency coordinator.
//!
//! The one place that re-derives incident state. Complaint and reroute
//! operations call [`refresh_aggregate_after`] after any status change;
//! membership operations call [`rollup_incident`] for every incident whose
//! member set changed. Both run inside the caller's transaction.

use crate::services::{require_complaint, require_incident};
use civic_core::{CivicResult, ComplaintId, Incident, IncidentId, IncidentStatus, Rollup};
use civic_storage::StorageTx;

/// What a status refresh did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The complaint belongs to no incident
    Unclustered,
    /// Derived status already matched
    Unchanged {
        incident_id: IncidentId,
        status: IncidentStatus,
    },
    /// Derived status flipped and was persisted
    Changed {
        incident_id: IncidentId,
        from: IncidentStatus,
        to: IncidentStatus,
    },
}

/// Re-evaluate the derived status of the incident the complaint belongs to.
///
/// Writes the incident only if its status changed. A complaint pointing at
/// a missing incident is reported as NotFound.
pub fn refresh_aggregate_after(
    tx: &mut dyn StorageTx,
    complaint_id: ComplaintId,
) -> CivicResult<RefreshOutcome> {
    let complaint = require_complaint(tx, complaint_id)?;
    let Some(incident_id) = complaint.incident_id else {
        tracing::debug!(%complaint_id, "complaint unclustered, nothing to refresh");
        return Ok(RefreshOutcome::Unclustered);
    };

    let mut incident = require_incident(tx, incident_id)?;
    let members = tx.complaints_in_incident(incident_id)?;
    let from = incident.status;

    if incident.refresh_status(&members) {
        tx.incident_put(&incident)?;
        tracing::debug!(
            %incident_id,
            %from,
            to = %incident.status,
            members = members.len(),
            "incident status re-derived"
        );
        return Ok(RefreshOutcome::Changed {
            incident_id,
            from,
            to: incident.status,
        });
    }

    tracing::debug!(%incident_id, status = %from, "incident status unchanged");
    Ok(RefreshOutcome::Unchanged {
        incident_id,
        status: from,
    })
}

/// Recount an incident from live membership and persist it.
///
/// Always writes the incident row, even when nothing changed, so that two
/// concurrent membership changes on the same incident conflict at commit.
pub fn rollup_incident(tx: &mut dyn StorageTx, incident_id: IncidentId) -> CivicResult<Incident> {
    let mut incident = require_incident(tx, incident_id)?;
    let members = tx.complaints_in_incident(incident_id)?;
    let from = incident.status;
    let changed = incident.apply_rollup(Rollup::compute(&members));
    tx.incident_put(&incident)?;

    tracing::debug!(
        %incident_id,
        members = incident.member_count,
        %from,
        to = %incident.status,
        changed,
        "incident rolled up"
    );
    Ok(incident)
}
