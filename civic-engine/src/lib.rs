//! Civic Engine - Complaint Lifecycle and Incident Aggregation
//!
//! [`CivicEngine`] is the entry point for the service layer above it. Every
//! method opens one storage transaction, runs a single use case from
//! [`services`] inside it and commits. Incident state is re-derived by the
//! [`coordinator`] inside that same transaction, so a complaint transition
//! and the incident refresh it causes commit or roll back together.
//!
//! The acting agent is always an explicit parameter; the engine keeps no
//! ambient session state.

pub mod coordinator;
pub mod ranking;
pub mod reads;
pub mod services;

pub use coordinator::{refresh_aggregate_after, rollup_incident, RefreshOutcome};
pub use ranking::{HybridRanker, IncidentCandidate, IncidentRanker, IncidentSuggestion};
pub use reads::ComplaintSummary;
pub use services::{AnswerTarget, RerouteDecision};

use chrono::Utc;
use civic_core::{
    AgentId, ChildInquiry, CivicResult, Complaint, ComplaintId, ComplaintSubmission,
    DepartmentDirectory, DepartmentId, EngineConfig, Incident, IncidentId, IncidentStatus,
    NormalizationResult, RerouteId, StaticDirectory, StoredReroute,
};
use civic_storage::{StorageTx, TransactionalStorage};

/// Transactional facade over the use cases.
pub struct CivicEngine<S: TransactionalStorage> {
    storage: S,
    config: EngineConfig,
    ranker: Box<dyn IncidentRanker>,
    directory: Box<dyn DepartmentDirectory>,
}

impl<S: TransactionalStorage> std::fmt::Debug for CivicEngine<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CivicEngine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<S: TransactionalStorage> CivicEngine<S> {
    /// Create an engine with the hybrid ranker and an empty directory.
    ///
    /// # Errors
    /// Returns a config error if `config` fails validation.
    pub fn new(storage: S, config: EngineConfig) -> CivicResult<Self> {
        config.validate()?;
        Ok(Self {
            ranker: Box::new(HybridRanker::from_config(&config)),
            directory: Box::new(StaticDirectory::new()),
            storage,
            config,
        })
    }

    pub fn with_ranker(mut self, ranker: impl IncidentRanker + 'static) -> Self {
        self.ranker = Box::new(ranker);
        self
    }

    pub fn with_directory(mut self, directory: impl DepartmentDirectory + 'static) -> Self {
        self.directory = Box::new(directory);
        self
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run `f` in a fresh transaction and commit if it succeeds.
    ///
    /// On error the transaction is dropped, which discards every buffered
    /// write including aggregate refreshes.
    fn run<T>(
        &self,
        op: &'static str,
        f: impl FnOnce(&mut dyn StorageTx) -> CivicResult<T>,
    ) -> CivicResult<T> {
        let mut tx = self.storage.begin()?;
        let span = tracing::info_span!("civic_op", op, tx_id = %tx.tx_id());
        let _enter = span.enter();

        match f(tx.as_mut()) {
            Ok(value) => {
                if let Err(e) = tx.commit() {
                    tracing::warn!(error = %e, kind = ?e.kind(), "commit rejected");
                    return Err(e);
                }
                Ok(value)
            }
            Err(e) => {
                tracing::warn!(error = %e, kind = ?e.kind(), "operation failed, rolling back");
                Err(e)
            }
        }
    }

    // ========================================================================
    // COMPLAINT LIFECYCLE
    // ========================================================================

    pub fn receive_complaint(&self, submission: ComplaintSubmission) -> CivicResult<Complaint> {
        self.run("receive_complaint", |tx| {
            services::receive_complaint(tx, submission, Utc::now())
        })
    }

    pub fn apply_normalization(
        &self,
        complaint_id: ComplaintId,
        result: NormalizationResult,
    ) -> CivicResult<Complaint> {
        self.run("apply_normalization", |tx| {
            services::apply_normalization(tx, complaint_id, result, Utc::now())
        })
    }

    pub fn assign(&self, complaint_id: ComplaintId, agent: AgentId) -> CivicResult<Complaint> {
        self.run("assign", |tx| services::assign(tx, complaint_id, agent, Utc::now()))
    }

    pub fn save_answer(
        &self,
        complaint_id: ComplaintId,
        actor: AgentId,
        text: impl Into<String>,
        is_draft: bool,
    ) -> CivicResult<AnswerTarget> {
        let text = text.into();
        self.run("save_answer", |tx| {
            services::save_answer(tx, complaint_id, actor, text, is_draft, Utc::now())
        })
    }

    pub fn release(&self, complaint_id: ComplaintId, actor: AgentId) -> CivicResult<Complaint> {
        self.run("release", |tx| services::release(tx, complaint_id, actor, Utc::now()))
    }

    pub fn cancel(&self, complaint_id: ComplaintId) -> CivicResult<Complaint> {
        self.run("cancel", |tx| services::cancel(tx, complaint_id, Utc::now()))
    }

    pub fn close(&self, complaint_id: ComplaintId) -> CivicResult<Complaint> {
        self.run("close", |tx| services::close(tx, complaint_id, Utc::now()))
    }

    pub fn file_child_inquiry(
        &self,
        complaint_id: ComplaintId,
        title: impl Into<String>,
        body: impl Into<String>,
    ) -> CivicResult<ChildInquiry> {
        let (title, body) = (title.into(), body.into());
        self.run("file_child_inquiry", |tx| {
            services::file_child_inquiry(tx, complaint_id, title, body, Utc::now())
        })
    }

    // ========================================================================
    // REROUTE WORKFLOW
    // ========================================================================

    pub fn request_reroute(
        &self,
        complaint_id: ComplaintId,
        target_department: DepartmentId,
        reason: impl Into<String>,
        requester: AgentId,
    ) -> CivicResult<StoredReroute> {
        let reason = reason.into();
        self.run("request_reroute", |tx| {
            services::request_reroute(tx, complaint_id, target_department, reason, requester, Utc::now())
        })
    }

    pub fn decide(
        &self,
        request_id: RerouteId,
        approve: bool,
        reviewer: AgentId,
    ) -> CivicResult<RerouteDecision> {
        self.run("decide_reroute", |tx| {
            services::decide_reroute(tx, request_id, approve, reviewer, Utc::now())
        })
    }

    // ========================================================================
    // INCIDENT AGGREGATION
    // ========================================================================

    pub fn create_from_selection(
        &self,
        complaint_ids: &[ComplaintId],
        title: Option<String>,
    ) -> CivicResult<Incident> {
        let prefix = self.config.new_incident_title_prefix.as_str();
        self.run("create_from_selection", |tx| {
            services::create_from_selection(tx, complaint_ids, title, prefix, Utc::now())
        })
    }

    pub fn move_members(
        &self,
        complaint_ids: &[ComplaintId],
        target: IncidentId,
    ) -> CivicResult<Incident> {
        self.run("move_members", |tx| services::move_members(tx, complaint_ids, target))
    }

    pub fn merge_into_incident(
        &self,
        complaint_id: ComplaintId,
        incident_id: IncidentId,
    ) -> CivicResult<Incident> {
        self.run("merge_into_incident", |tx| {
            services::merge_into_incident(tx, complaint_id, incident_id)
        })
    }

    pub fn rename_title(
        &self,
        incident_id: IncidentId,
        title: impl Into<String>,
    ) -> CivicResult<Incident> {
        let title = title.into();
        self.run("rename_title", |tx| services::rename_title(tx, incident_id, title))
    }

    /// Rank OPEN incidents the complaint could belong to. Advisory only.
    pub fn suggest_incidents(&self, complaint_id: ComplaintId) -> CivicResult<Vec<IncidentSuggestion>> {
        let ranker = self.ranker.as_ref();
        self.run("suggest_incidents", |tx| {
            let complaint = reads::complaint(tx, complaint_id)?;
            let mut candidates = Vec::new();
            for incident in tx.incident_list()? {
                if incident.status != IncidentStatus::Open
                    || complaint.incident_id == Some(incident.incident_id)
                {
                    continue;
                }
                let members: Vec<Complaint> = tx
                    .complaints_in_incident(incident.incident_id)?
                    .into_iter()
                    .filter(|m| m.complaint_id != complaint_id)
                    .collect();
                candidates.push(IncidentCandidate { incident, members });
            }
            let ranked = ranker.rank(&complaint, &candidates)?;
            tracing::debug!(
                %complaint_id,
                candidates = candidates.len(),
                suggested = ranked.len(),
                "incident suggestions ranked"
            );
            Ok(ranked)
        })
    }

    // ========================================================================
    // READS
    // ========================================================================

    pub fn complaint(&self, id: ComplaintId) -> CivicResult<Complaint> {
        self.run("complaint", |tx| reads::complaint(tx, id))
    }

    pub fn child_inquiries(&self, id: ComplaintId) -> CivicResult<Vec<ChildInquiry>> {
        self.run("child_inquiries", |tx| reads::child_inquiries(tx, id))
    }

    pub fn incident(&self, id: IncidentId) -> CivicResult<Incident> {
        self.run("incident", |tx| reads::incident(tx, id))
    }

    pub fn incident_members(&self, id: IncidentId) -> CivicResult<Vec<Complaint>> {
        self.run("incident_members", |tx| reads::incident_members(tx, id))
    }

    pub fn reroute_request(&self, id: RerouteId) -> CivicResult<StoredReroute> {
        self.run("reroute_request", |tx| reads::reroute_request(tx, id))
    }

    pub fn reroutes_for_complaint(&self, id: ComplaintId) -> CivicResult<Vec<StoredReroute>> {
        self.run("reroutes_for_complaint", |tx| reads::reroutes_for_complaint(tx, id))
    }

    pub fn pending_reroutes(&self) -> CivicResult<Vec<StoredReroute>> {
        self.run("pending_reroutes", |tx| reads::pending_reroutes(tx))
    }

    pub fn search_incidents(
        &self,
        query: Option<&str>,
        status: Option<IncidentStatus>,
    ) -> CivicResult<Vec<Incident>> {
        let min = self.config.listing_min_members;
        self.run("search_incidents", |tx| reads::search_incidents(tx, query, status, min))
    }

    pub fn major_incidents(&self) -> CivicResult<Vec<Incident>> {
        let min = self.config.major_min_members;
        self.run("major_incidents", |tx| reads::major_incidents(tx, min))
    }

    pub fn complaint_summary(&self, id: ComplaintId) -> CivicResult<ComplaintSummary> {
        let directory = self.directory.as_ref();
        self.run("complaint_summary", |tx| reads::complaint_summary(tx, id, directory))
    }
}
