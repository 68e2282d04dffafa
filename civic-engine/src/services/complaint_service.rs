//! Complaint Service
//!
//! Intake, classification and the per-complaint lifecycle operations.

use civic_core::{
    AgentId, ChildInquiry, CivicResult, Complaint, ComplaintId, ComplaintStatus,
    ComplaintSubmission, InquiryId, NormalizationResult, StatusChange, Timestamp, ValidationError,
};
use civic_storage::StorageTx;

use super::require_complaint;
use crate::coordinator::refresh_aggregate_after;

/// Which record a `save_answer` call wrote to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerTarget {
    /// The complaint itself
    Root(ComplaintId),
    /// The most recent follow-up inquiry
    Inquiry(InquiryId),
}

/// Persist a transition and re-derive the owning incident if the status moved.
fn commit_transition(
    tx: &mut dyn StorageTx,
    complaint: &Complaint,
    change: StatusChange,
    operation: &'static str,
) -> CivicResult<()> {
    tx.complaint_put(complaint)?;
    tracing::info!(
        complaint_id = %complaint.complaint_id,
        from = %change.from,
        to = %change.to,
        operation,
        "complaint transition"
    );
    if !change.is_noop() {
        refresh_aggregate_after(tx, complaint.complaint_id)?;
    }
    Ok(())
}

/// File a new complaint in RECEIVED.
///
/// # Errors
/// Validation error if title or body is blank or the location is out of range.
pub fn receive_complaint(
    tx: &mut dyn StorageTx,
    submission: ComplaintSubmission,
    now: Timestamp,
) -> CivicResult<Complaint> {
    submission.validate()?;
    let id = tx.next_complaint_id();
    let complaint = Complaint::received(id, submission, now);
    tx.complaint_insert(&complaint)?;
    tracing::info!(complaint_id = %id, "complaint received");
    Ok(complaint)
}

/// Record the external classification on a complaint.
///
/// Never fails because of the complaint's status.
pub fn apply_normalization(
    tx: &mut dyn StorageTx,
    complaint_id: ComplaintId,
    result: NormalizationResult,
    now: Timestamp,
) -> CivicResult<Complaint> {
    if let Some(embedding) = &result.embedding {
        embedding.validate()?;
    }
    let mut complaint = require_complaint(tx, complaint_id)?;
    let change = complaint.apply_normalization(result, now);
    commit_transition(tx, &complaint, change, "apply normalization")?;
    Ok(complaint)
}

/// Assign an agent (pre-assignment → IN_PROGRESS).
///
/// # Errors
/// `InvalidTransition` if another agent holds the complaint or it is past assignment.
pub fn assign(
    tx: &mut dyn StorageTx,
    complaint_id: ComplaintId,
    agent: AgentId,
    now: Timestamp,
) -> CivicResult<Complaint> {
    let mut complaint = require_complaint(tx, complaint_id)?;
    let change = complaint.assign(agent, now)?;
    if change.is_noop() {
        tracing::debug!(%complaint_id, %agent, "already assigned to this agent");
        return Ok(complaint);
    }
    commit_transition(tx, &complaint, change, "assign")?;
    Ok(complaint)
}

/// Write an answer, as a draft or final.
///
/// Once the complaint has follow-up inquiries the answer goes to the most
/// recent one. A final answer resolves that inquiry and moves the complaint
/// IN_PROGRESS → RESOLVED. Drafts never change status.
///
/// # Errors
/// - `NotAssigned` if nobody holds the complaint
/// - `NotOwner` if `actor` is not the holder
/// - `InvalidTransition` if the complaint is not IN_PROGRESS
pub fn save_answer(
    tx: &mut dyn StorageTx,
    complaint_id: ComplaintId,
    actor: AgentId,
    text: String,
    is_draft: bool,
    now: Timestamp,
) -> CivicResult<AnswerTarget> {
    let mut complaint = require_complaint(tx, complaint_id)?;
    complaint.ensure_answerable_by(actor)?;

    let latest = tx
        .inquiries_for(complaint_id)?
        .into_iter()
        .max_by_key(|inquiry| inquiry.inquiry_id);

    let (target, change) = match (latest, is_draft) {
        (Some(mut inquiry), true) => {
            inquiry.write_draft(text);
            tx.inquiry_put(&inquiry)?;
            (AnswerTarget::Inquiry(inquiry.inquiry_id), None)
        }
        (Some(mut inquiry), false) => {
            inquiry.complete_answer(text, actor, now);
            tx.inquiry_put(&inquiry)?;
            let change = complaint.resolve(now)?;
            (AnswerTarget::Inquiry(inquiry.inquiry_id), Some(change))
        }
        (None, true) => {
            complaint.write_draft(text, now);
            (AnswerTarget::Root(complaint_id), None)
        }
        (None, false) => {
            let change = complaint.complete_answer(text, now)?;
            (AnswerTarget::Root(complaint_id), Some(change))
        }
    };

    match change {
        Some(change) => commit_transition(tx, &complaint, change, "save answer")?,
        None => {
            tx.complaint_put(&complaint)?;
            tracing::info!(%complaint_id, ?target, "answer draft saved");
        }
    }
    Ok(target)
}

/// Give an assigned complaint back to the queue (IN_PROGRESS → RECEIVED).
///
/// # Errors
/// - `NotOwner` if `actor` is not the holder
/// - `InvalidTransition` if the complaint is not IN_PROGRESS
pub fn release(
    tx: &mut dyn StorageTx,
    complaint_id: ComplaintId,
    actor: AgentId,
    now: Timestamp,
) -> CivicResult<Complaint> {
    let mut complaint = require_complaint(tx, complaint_id)?;
    let change = complaint.release(actor, now)?;
    commit_transition(tx, &complaint, change, "release")?;
    Ok(complaint)
}

/// Withdraw a complaint. Canceling twice is a no-op.
///
/// # Errors
/// `InvalidTransition` if the complaint is CLOSED.
pub fn cancel(
    tx: &mut dyn StorageTx,
    complaint_id: ComplaintId,
    now: Timestamp,
) -> CivicResult<Complaint> {
    let mut complaint = require_complaint(tx, complaint_id)?;
    let change = complaint.cancel(now)?;
    if change.is_noop() {
        tracing::debug!(%complaint_id, "already canceled");
        return Ok(complaint);
    }
    commit_transition(tx, &complaint, change, "cancel")?;
    Ok(complaint)
}

/// Close a resolved complaint.
///
/// # Errors
/// `InvalidTransition` unless the complaint is RESOLVED.
pub fn close(
    tx: &mut dyn StorageTx,
    complaint_id: ComplaintId,
    now: Timestamp,
) -> CivicResult<Complaint> {
    let mut complaint = require_complaint(tx, complaint_id)?;
    let change = complaint.close(now)?;
    commit_transition(tx, &complaint, change, "close")?;
    Ok(complaint)
}

/// File a follow-up inquiry on an answered complaint and re-open it.
///
/// # Errors
/// - `PendingAnswerExists` unless the complaint is RESOLVED or CLOSED
/// - Validation error if title or body is blank
pub fn file_child_inquiry(
    tx: &mut dyn StorageTx,
    complaint_id: ComplaintId,
    title: String,
    body: String,
    now: Timestamp,
) -> CivicResult<ChildInquiry> {
    for (field, value) in [("title", &title), ("body", &body)] {
        if value.trim().is_empty() {
            return Err(ValidationError::RequiredFieldMissing {
                field: field.to_string(),
            }
            .into());
        }
    }

    let mut complaint = require_complaint(tx, complaint_id)?;
    let change = complaint.reopen_for_inquiry(now)?;

    let inquiry = ChildInquiry {
        inquiry_id: tx.next_inquiry_id(),
        parent_id: complaint_id,
        title,
        body,
        status: ComplaintStatus::Received,
        answer: None,
        answered_by: None,
        created_at: now,
        answered_at: None,
    };
    tx.inquiry_insert(&inquiry)?;
    tracing::info!(%complaint_id, inquiry_id = %inquiry.inquiry_id, "child inquiry filed");

    commit_transition(tx, &complaint, change, "file child inquiry")?;
    Ok(inquiry)
}
