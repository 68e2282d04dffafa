//! Civic Storage - Transactional Storage Traits and In-Memory Backend
//!
//! The engine runs every use case inside one [`StorageTx`]. A transaction
//! either commits all of its writes or none: dropping it without calling
//! [`StorageTx::commit`] discards everything it buffered.

pub mod memory;

pub use memory::MemoryStorage;

use civic_core::{
    ChildInquiry, CivicResult, Complaint, ComplaintId, Incident, IncidentId, InquiryId,
    RerouteId, StoredReroute, TransactionId,
};

// ============================================================================
// STORAGE TRAITS
// ============================================================================

/// A store that can open transactions.
pub trait TransactionalStorage: Send + Sync {
    /// Start a new transaction.
    fn begin(&self) -> CivicResult<Box<dyn StorageTx + '_>>;
}

/// One unit of work against the store.
///
/// Reads take `&mut self` because the transaction records what it has seen
/// so that a concurrent change can be detected at commit. Writes are
/// buffered and visible to later reads of the same transaction.
pub trait StorageTx: Send {
    /// Correlation id of this transaction.
    fn tx_id(&self) -> TransactionId;

    // === Id Allocation ===
    // Sequences are never rolled back, so ids may have gaps.

    fn next_complaint_id(&mut self) -> ComplaintId;
    fn next_inquiry_id(&mut self) -> InquiryId;
    fn next_reroute_id(&mut self) -> RerouteId;
    fn next_incident_id(&mut self) -> IncidentId;

    // === Complaint Operations ===

    fn complaint_get(&mut self, id: ComplaintId) -> CivicResult<Option<Complaint>>;

    /// Insert a new complaint. Fails if the id is taken.
    fn complaint_insert(&mut self, complaint: &Complaint) -> CivicResult<()>;

    /// Overwrite an existing complaint. Fails with NotFound if absent.
    fn complaint_put(&mut self, complaint: &Complaint) -> CivicResult<()>;

    /// Live members of an incident, ordered by id.
    fn complaints_in_incident(&mut self, incident_id: IncidentId) -> CivicResult<Vec<Complaint>>;

    /// All complaints, ordered by id.
    fn complaint_list(&mut self) -> CivicResult<Vec<Complaint>>;

    // === Child Inquiry Operations ===

    fn inquiry_insert(&mut self, inquiry: &ChildInquiry) -> CivicResult<()>;
    fn inquiry_put(&mut self, inquiry: &ChildInquiry) -> CivicResult<()>;

    /// Inquiries of a complaint, ordered by id (oldest first).
    fn inquiries_for(&mut self, parent_id: ComplaintId) -> CivicResult<Vec<ChildInquiry>>;

    // === Reroute Operations ===

    fn reroute_get(&mut self, id: RerouteId) -> CivicResult<Option<StoredReroute>>;
    fn reroute_insert(&mut self, reroute: &StoredReroute) -> CivicResult<()>;
    fn reroute_put(&mut self, reroute: &StoredReroute) -> CivicResult<()>;

    /// Every request ever filed for a complaint, ordered by id.
    fn reroutes_for_complaint(&mut self, complaint_id: ComplaintId)
        -> CivicResult<Vec<StoredReroute>>;

    /// All PENDING requests, ordered by id.
    fn reroute_list_pending(&mut self) -> CivicResult<Vec<StoredReroute>>;

    // === Incident Operations ===

    fn incident_get(&mut self, id: IncidentId) -> CivicResult<Option<Incident>>;
    fn incident_insert(&mut self, incident: &Incident) -> CivicResult<()>;
    fn incident_put(&mut self, incident: &Incident) -> CivicResult<()>;

    /// All incidents, ordered by id.
    fn incident_list(&mut self) -> CivicResult<Vec<Incident>>;

    // === Completion ===

    /// Validate and apply the buffered writes atomically.
    fn commit(self: Box<Self>) -> CivicResult<()>;
}
