//! Incident Service
//!
//! Creation, membership moves and renaming of incidents. Membership changes
//! always end with an authoritative rollup of every incident involved.

use std::collections::BTreeSet;

use civic_core::{
    CivicError, CivicResult, Complaint, ComplaintId, EntityType, Incident, IncidentId, Timestamp,
    ValidationError,
};
use civic_storage::StorageTx;

use super::{require_complaint, require_incident};
use crate::coordinator::rollup_incident;

fn dedup(ids: &[ComplaintId]) -> Vec<ComplaintId> {
    let mut seen = BTreeSet::new();
    ids.iter().copied().filter(|id| seen.insert(*id)).collect()
}

/// Create an OPEN incident from selected complaints and move them into it.
///
/// Unknown ids are skipped. A blank `title` becomes `title_prefix` followed
/// by the first selected complaint's title.
///
/// # Errors
/// - Validation error if `complaint_ids` is empty
/// - `NotFound` if none of the ids exist
pub fn create_from_selection(
    tx: &mut dyn StorageTx,
    complaint_ids: &[ComplaintId],
    title: Option<String>,
    title_prefix: &str,
    now: Timestamp,
) -> CivicResult<Incident> {
    let Some(&first_requested) = complaint_ids.first() else {
        return Err(ValidationError::EmptySelection {
            reason: "an incident needs at least one complaint".to_string(),
        }
        .into());
    };

    let mut selected: Vec<Complaint> = Vec::new();
    for id in dedup(complaint_ids) {
        match tx.complaint_get(id)? {
            Some(complaint) => selected.push(complaint),
            None => tracing::warn!(complaint_id = %id, "selected complaint does not exist, skipped"),
        }
    }
    let Some(first) = selected.first() else {
        return Err(CivicError::not_found(EntityType::Complaint, first_requested.0));
    };

    let title = match title {
        Some(t) if !t.trim().is_empty() => t.trim().to_string(),
        _ => format!("{}{}", title_prefix, first.title),
    };

    let incident_id = tx.next_incident_id();
    tx.incident_insert(&Incident::open(incident_id, title, now))?;
    tracing::info!(%incident_id, selected = selected.len(), "incident created");

    let ids: Vec<ComplaintId> = selected.iter().map(|c| c.complaint_id).collect();
    move_members(tx, &ids, incident_id)
}

/// Move complaints into `target`, re-deriving every incident involved.
///
/// # Errors
/// - Validation error if `complaint_ids` is empty
/// - `NotFound` if the target or any complaint does not exist
pub fn move_members(
    tx: &mut dyn StorageTx,
    complaint_ids: &[ComplaintId],
    target: IncidentId,
) -> CivicResult<Incident> {
    if complaint_ids.is_empty() {
        return Err(ValidationError::EmptySelection {
            reason: "nothing to move".to_string(),
        }
        .into());
    }
    require_incident(tx, target)?;

    let mut members = Vec::new();
    for id in dedup(complaint_ids) {
        members.push(require_complaint(tx, id)?);
    }

    let mut sources: BTreeSet<IncidentId> = BTreeSet::new();
    for mut complaint in members {
        if complaint.incident_id == Some(target) {
            continue;
        }
        if let Some(old) = complaint.incident_id {
            sources.insert(old);
        }
        tracing::info!(
            complaint_id = %complaint.complaint_id,
            from = ?complaint.incident_id,
            to = %target,
            "complaint moved"
        );
        complaint.incident_id = Some(target);
        tx.complaint_put(&complaint)?;
    }

    for source in sources {
        rollup_incident(tx, source)?;
    }
    rollup_incident(tx, target)
}

/// Add one complaint to an incident.
pub fn merge_into_incident(
    tx: &mut dyn StorageTx,
    complaint_id: ComplaintId,
    incident_id: IncidentId,
) -> CivicResult<Incident> {
    move_members(tx, &[complaint_id], incident_id)
}

/// Rename an incident. No status side effects.
///
/// # Errors
/// Validation error if `title` is blank.
pub fn rename_title(
    tx: &mut dyn StorageTx,
    incident_id: IncidentId,
    title: String,
) -> CivicResult<Incident> {
    if title.trim().is_empty() {
        return Err(ValidationError::RequiredFieldMissing {
            field: "title".to_string(),
        }
        .into());
    }
    let mut incident = require_incident(tx, incident_id)?;
    incident.title = title.trim().to_string();
    tx.incident_put(&incident)?;
    tracing::info!(%incident_id, title = %incident.title, "incident renamed");
    Ok(incident)
}
