//! Complaint status state machine.
//!
//! ```text
//! RECEIVED ─┐
//! NORMALIZED ├─ assign() ──→ IN_PROGRESS ── answer ──→ RESOLVED ── close() ──→ CLOSED
//! RECOMMENDED┘    ↑              │  ↑                     │                      │
//!                 └─ release() ──┘  └── file inquiry ─────┴──────────────────────┘
//! ```
//!
//! Every transition validates the current status and returns a
//! [`StatusChange`] so callers can log and decide whether aggregates
//! need a refresh. Nothing here touches storage.

use crate::{
    AgentId, ChildInquiry, CivicResult, Classification, Complaint, ComplaintStatus, DepartmentId,
    LifecycleError, NormalizationResult, Timestamp,
};

/// Outcome of a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusChange {
    pub from: ComplaintStatus,
    pub to: ComplaintStatus,
}

impl StatusChange {
    fn new(from: ComplaintStatus, to: ComplaintStatus) -> Self {
        Self { from, to }
    }

    /// True when the status did not move.
    pub fn is_noop(&self) -> bool {
        self.from == self.to
    }
}

impl Complaint {
    fn invalid(&self, operation: &'static str) -> LifecycleError {
        LifecycleError::InvalidTransition {
            complaint_id: self.complaint_id,
            from: self.status,
            operation,
        }
    }

    fn set_status(&mut self, to: ComplaintStatus, now: Timestamp) -> StatusChange {
        let change = StatusChange::new(self.status, to);
        self.status = to;
        self.updated_at = now;
        change
    }

    /// Take the complaint. Re-assigning to the current holder is a no-op.
    pub fn assign(&mut self, agent: AgentId, now: Timestamp) -> CivicResult<StatusChange> {
        if self.status == ComplaintStatus::InProgress && self.assigned_agent == Some(agent) {
            return Ok(StatusChange::new(self.status, self.status));
        }
        if !self.status.is_pre_assignment() {
            return Err(self.invalid("assign").into());
        }
        self.assigned_agent = Some(agent);
        Ok(self.set_status(ComplaintStatus::InProgress, now))
    }

    /// Check that `actor` may write an answer right now.
    pub fn ensure_answerable_by(&self, actor: AgentId) -> CivicResult<()> {
        match self.assigned_agent {
            None => Err(LifecycleError::NotAssigned {
                complaint_id: self.complaint_id,
            }
            .into()),
            Some(holder) if holder != actor => Err(LifecycleError::NotOwner {
                complaint_id: self.complaint_id,
                actor,
                holder: Some(holder),
            }
            .into()),
            Some(_) if self.status != ComplaintStatus::InProgress => {
                Err(self.invalid("save answer").into())
            }
            Some(_) => Ok(()),
        }
    }

    /// Store a draft answer. Status never changes.
    pub fn write_draft(&mut self, text: String, now: Timestamp) {
        self.answer = Some(text);
        self.updated_at = now;
    }

    /// Final answer on the complaint itself: IN_PROGRESS → RESOLVED.
    pub fn complete_answer(&mut self, text: String, now: Timestamp) -> CivicResult<StatusChange> {
        let change = self.resolve(now)?;
        self.answer = Some(text);
        Ok(change)
    }

    /// IN_PROGRESS → RESOLVED without touching the answer text, used when
    /// the answer went to a follow-up inquiry.
    pub fn resolve(&mut self, now: Timestamp) -> CivicResult<StatusChange> {
        if self.status != ComplaintStatus::InProgress {
            return Err(self.invalid("complete answer").into());
        }
        self.answered_at = Some(now);
        Ok(self.set_status(ComplaintStatus::Resolved, now))
    }

    /// Give the complaint back: IN_PROGRESS → RECEIVED.
    pub fn release(&mut self, actor: AgentId, now: Timestamp) -> CivicResult<StatusChange> {
        if self.assigned_agent != Some(actor) {
            return Err(LifecycleError::NotOwner {
                complaint_id: self.complaint_id,
                actor,
                holder: self.assigned_agent,
            }
            .into());
        }
        if self.status != ComplaintStatus::InProgress {
            return Err(self.invalid("release").into());
        }
        self.assigned_agent = None;
        Ok(self.set_status(ComplaintStatus::Received, now))
    }

    /// Withdraw the complaint. Idempotent once CANCELED.
    pub fn cancel(&mut self, now: Timestamp) -> CivicResult<StatusChange> {
        match self.status {
            ComplaintStatus::Canceled => Ok(StatusChange::new(self.status, self.status)),
            ComplaintStatus::Closed => Err(self.invalid("cancel").into()),
            _ => Ok(self.set_status(ComplaintStatus::Canceled, now)),
        }
    }

    /// RESOLVED → CLOSED, stamping `closed_at`.
    pub fn close(&mut self, now: Timestamp) -> CivicResult<StatusChange> {
        if self.status != ComplaintStatus::Resolved {
            return Err(self.invalid("close").into());
        }
        self.closed_at = Some(now);
        Ok(self.set_status(ComplaintStatus::Closed, now))
    }

    /// Re-open an answered complaint because a follow-up inquiry arrived.
    pub fn reopen_for_inquiry(&mut self, now: Timestamp) -> CivicResult<StatusChange> {
        if !matches!(
            self.status,
            ComplaintStatus::Resolved | ComplaintStatus::Closed
        ) {
            return Err(LifecycleError::PendingAnswerExists {
                complaint_id: self.complaint_id,
                status: self.status,
            }
            .into());
        }
        self.closed_at = None;
        Ok(self.set_status(ComplaintStatus::InProgress, now))
    }

    /// IN_PROGRESS → REROUTE_PENDING. Department and assignee stay put.
    pub fn begin_reroute(
        &mut self,
        target: DepartmentId,
        now: Timestamp,
    ) -> CivicResult<StatusChange> {
        if self.status != ComplaintStatus::InProgress {
            return Err(self.invalid("request reroute").into());
        }
        if self.department_id == Some(target) {
            return Err(crate::ValidationError::InvalidValue {
                field: "target_department".to_string(),
                reason: format!("complaint already belongs to department {}", target),
            }
            .into());
        }
        Ok(self.set_status(ComplaintStatus::ReroutePending, now))
    }

    /// Approved reroute: move to `target`, drop the assignee, back to RECEIVED.
    pub fn approve_reroute(
        &mut self,
        target: DepartmentId,
        now: Timestamp,
    ) -> CivicResult<StatusChange> {
        if self.status != ComplaintStatus::ReroutePending {
            return Err(self.invalid("approve reroute").into());
        }
        self.department_id = Some(target);
        self.assigned_agent = None;
        Ok(self.set_status(ComplaintStatus::Received, now))
    }

    /// Rejected reroute: back to IN_PROGRESS with the assignee, or RECEIVED without one.
    pub fn reject_reroute(&mut self, now: Timestamp) -> CivicResult<StatusChange> {
        if self.status != ComplaintStatus::ReroutePending {
            return Err(self.invalid("reject reroute").into());
        }
        let to = if self.assigned_agent.is_some() {
            ComplaintStatus::InProgress
        } else {
            ComplaintStatus::Received
        };
        Ok(self.set_status(to, now))
    }

    /// Record the external classification. Only a RECEIVED complaint moves,
    /// to RECOMMENDED with a department recommendation, else to NORMALIZED.
    pub fn apply_normalization(&mut self, result: NormalizationResult, now: Timestamp) -> StatusChange {
        if let Some(dept) = result.recommended_department {
            if self.department_id.is_none() {
                self.department_id = Some(dept);
                self.ai_predicted_department = Some(dept);
            }
        }
        let to = match (self.status, result.recommended_department) {
            (ComplaintStatus::Received, Some(_)) => ComplaintStatus::Recommended,
            (ComplaintStatus::Received, None) => ComplaintStatus::Normalized,
            (current, _) => current,
        };
        self.classification = Some(Classification::from(result));
        self.set_status(to, now)
    }
}

impl ChildInquiry {
    pub fn write_draft(&mut self, text: String) {
        self.answer = Some(text);
    }

    /// Final answer on the inquiry, attributed to `agent`.
    pub fn complete_answer(&mut self, text: String, agent: AgentId, now: Timestamp) {
        self.answer = Some(text);
        self.answered_by = Some(agent);
        self.answered_at = Some(now);
        self.status = ComplaintStatus::Resolved;
    }
}

// =============================================================================
// TESTS
// =============================================================================
