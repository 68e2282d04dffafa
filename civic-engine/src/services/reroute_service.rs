//! Reroute Service
//!
//! Proposal and review of department changes. A request only proposes; the
//! complaint's department and assignee change when a reviewer approves.

use civic_core::{
    AgentId, CivicResult, Complaint, ComplaintId, ComplaintStatus, DepartmentId, LifecycleError,
    Reroute, RerouteData, RerouteId, StoredReroute, Timestamp,
};
use civic_storage::StorageTx;

use super::{require_complaint, require_reroute};
use crate::coordinator::refresh_aggregate_after;

/// Result of a reviewer decision.
#[derive(Debug, Clone)]
pub struct RerouteDecision {
    pub request: StoredReroute,
    pub complaint: Complaint,
    /// False when the complaint had left REROUTE_PENDING before the decision
    pub applied: bool,
}

/// Request a department change (IN_PROGRESS → REROUTE_PENDING).
///
/// # Errors
/// - `ReroutePending` if the complaint already has a pending request
/// - `InvalidTransition` if the complaint is not IN_PROGRESS
/// - Validation error if the target is the current department
pub fn request_reroute(
    tx: &mut dyn StorageTx,
    complaint_id: ComplaintId,
    target_department: DepartmentId,
    reason: String,
    requester: AgentId,
    now: Timestamp,
) -> CivicResult<StoredReroute> {
    let mut complaint = require_complaint(tx, complaint_id)?;

    if let Some(pending) = tx
        .reroutes_for_complaint(complaint_id)?
        .into_iter()
        .find(StoredReroute::is_pending)
    {
        return Err(LifecycleError::ReroutePending {
            complaint_id,
            request_id: pending.data.reroute_id,
        }
        .into());
    }

    let change = complaint.begin_reroute(target_department, now)?;

    let request = Reroute::request(RerouteData {
        reroute_id: tx.next_reroute_id(),
        complaint_id,
        origin_department: complaint.department_id,
        target_department,
        reason,
        requester,
        reviewer: None,
        requested_at: now,
        decided_at: None,
    })
    .into_stored();

    tx.reroute_insert(&request)?;
    tx.complaint_put(&complaint)?;
    tracing::info!(
        %complaint_id,
        request_id = %request.data.reroute_id,
        %target_department,
        from = %change.from,
        to = %change.to,
        "reroute requested"
    );
    refresh_aggregate_after(tx, complaint_id)?;
    Ok(request)
}

/// Approve or reject a pending request.
///
/// Approval moves the complaint to the target department, clears the
/// assignee and returns it to RECEIVED. Rejection restores IN_PROGRESS
/// (or RECEIVED when nobody holds it). If the complaint was canceled in
/// the meantime only the request is updated.
///
/// # Errors
/// `AlreadyDecided` if the request is no longer PENDING.
pub fn decide_reroute(
    tx: &mut dyn StorageTx,
    request_id: RerouteId,
    approve: bool,
    reviewer: AgentId,
    now: Timestamp,
) -> CivicResult<RerouteDecision> {
    let pending = require_reroute(tx, request_id)?.into_pending()?;
    let mut complaint = require_complaint(tx, pending.complaint_id())?;
    let target = pending.target_department();

    let request = if approve {
        pending.approve(reviewer, now).into_stored()
    } else {
        pending.reject(reviewer, now).into_stored()
    };
    tx.reroute_put(&request)?;

    if complaint.status != ComplaintStatus::ReroutePending {
        tracing::info!(
            %request_id,
            complaint_id = %complaint.complaint_id,
            status = %complaint.status,
            decision = %request.status,
            "complaint no longer awaiting reroute, decision recorded only"
        );
        return Ok(RerouteDecision {
            request,
            complaint,
            applied: false,
        });
    }

    let change = if approve {
        complaint.approve_reroute(target, now)?
    } else {
        complaint.reject_reroute(now)?
    };
    tx.complaint_put(&complaint)?;
    tracing::info!(
        %request_id,
        complaint_id = %complaint.complaint_id,
        decision = %request.status,
        from = %change.from,
        to = %change.to,
        "reroute decided"
    );
    refresh_aggregate_after(tx, complaint.complaint_id)?;

    Ok(RerouteDecision {
        request,
        complaint,
        applied: true,
    })
}
