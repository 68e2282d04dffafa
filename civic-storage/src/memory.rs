//! In-memory storage with optimistic concurrency control.
//!
//! Every committed row carries a version. A transaction remembers the
//! version of each row it reads or overwrites and buffers its writes. At
//! commit, under the table write lock, every remembered version must still
//! match, otherwise the commit fails with `ConflictingWrite` and nothing is
//! applied. Rows that did not exist are remembered as version 0.

use crate::{StorageTx, TransactionalStorage};
use civic_core::{
    new_transaction_id, ChildInquiry, CivicError, CivicResult, Complaint, ComplaintId,
    EntityIdType, EntityType, Incident, IncidentId, InquiryId, RerouteId, StorageError,
    StoredReroute, TransactionId,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

// ============================================================================
// COMMITTED STATE
// ============================================================================

#[derive(Debug, Clone)]
struct Versioned<T> {
    version: u64,
    value: T,
}

type Table<K, V> = HashMap<K, Versioned<V>>;

#[derive(Debug, Default)]
struct Tables {
    complaints: Table<ComplaintId, Complaint>,
    inquiries: Table<InquiryId, ChildInquiry>,
    reroutes: Table<RerouteId, StoredReroute>,
    incidents: Table<IncidentId, Incident>,
}

#[derive(Debug, Default)]
struct Sequences {
    complaint: AtomicU64,
    inquiry: AtomicU64,
    reroute: AtomicU64,
    incident: AtomicU64,
}

fn next(seq: &AtomicU64) -> u64 {
    seq.fetch_add(1, Ordering::SeqCst) + 1
}

/// In-memory transactional store.
#[derive(Debug, Default, Clone)]
pub struct MemoryStorage {
    tables: Arc<RwLock<Tables>>,
    sequences: Arc<Sequences>,
}

impl MemoryStorage {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> CivicResult<RwLockReadGuard<'_, Tables>> {
        self.tables
            .read()
            .map_err(|_| CivicError::Storage(StorageError::LockPoisoned))
    }

    fn write(&self) -> CivicResult<RwLockWriteGuard<'_, Tables>> {
        self.tables
            .write()
            .map_err(|_| CivicError::Storage(StorageError::LockPoisoned))
    }

    /// Number of committed complaints.
    pub fn complaint_count(&self) -> CivicResult<usize> {
        Ok(self.read()?.complaints.len())
    }

    /// Number of committed incidents.
    pub fn incident_count(&self) -> CivicResult<usize> {
        Ok(self.read()?.incidents.len())
    }

    /// Committed version of a complaint row, 0 if absent.
    pub fn complaint_version(&self, id: ComplaintId) -> CivicResult<u64> {
        Ok(self
            .read()?
            .complaints
            .get(&id)
            .map(|row| row.version)
            .unwrap_or(0))
    }
}

impl TransactionalStorage for MemoryStorage {
    fn begin(&self) -> CivicResult<Box<dyn StorageTx + '_>> {
        Ok(Box::new(MemoryTx {
            storage: self,
            tx_id: new_transaction_id(),
            complaints: TableTx::new(EntityType::Complaint),
            inquiries: TableTx::new(EntityType::ChildInquiry),
            reroutes: TableTx::new(EntityType::Reroute),
            incidents: TableTx::new(EntityType::Incident),
            committed: false,
        }))
    }
}

// ============================================================================
// PER-TABLE TRANSACTION STATE
// ============================================================================

/// Read versions and buffered writes of one table.
#[derive(Debug)]
struct TableTx<K, V> {
    entity_type: EntityType,
    reads: HashMap<K, u64>,
    writes: BTreeMap<K, V>,
}

impl<K, V> TableTx<K, V>
where
    K: EntityIdType + Ord,
    V: Clone,
{
    fn new(entity_type: EntityType) -> Self {
        Self {
            entity_type,
            reads: HashMap::new(),
            writes: BTreeMap::new(),
        }
    }

    fn observe(&mut self, id: K, committed: &Table<K, V>) {
        let version = committed.get(&id).map(|row| row.version).unwrap_or(0);
        self.reads.entry(id).or_insert(version);
    }

    fn get(&mut self, committed: &Table<K, V>, id: K) -> Option<V> {
        if let Some(value) = self.writes.get(&id) {
            return Some(value.clone());
        }
        self.observe(id, committed);
        committed.get(&id).map(|row| row.value.clone())
    }

    /// Rows matching `keep`, own writes overriding committed rows, ordered by id.
    fn scan<F>(&mut self, committed: &Table<K, V>, keep: F) -> Vec<V>
    where
        F: Fn(&V) -> bool,
    {
        let mut out: BTreeMap<K, V> = BTreeMap::new();
        for (id, row) in committed {
            if self.writes.contains_key(id) || !keep(&row.value) {
                continue;
            }
            self.reads.entry(*id).or_insert(row.version);
            out.insert(*id, row.value.clone());
        }
        for (id, value) in &self.writes {
            if keep(value) {
                out.insert(*id, value.clone());
            }
        }
        out.into_values().collect()
    }

    fn insert(&mut self, committed: &Table<K, V>, id: K, value: V) -> CivicResult<()> {
        if self.writes.contains_key(&id) || committed.contains_key(&id) {
            return Err(CivicError::Storage(StorageError::InsertFailed {
                entity_type: self.entity_type,
                reason: format!("id {} already exists", id),
            }));
        }
        self.observe(id, committed);
        self.writes.insert(id, value);
        Ok(())
    }

    fn put(&mut self, committed: &Table<K, V>, id: K, value: V) -> CivicResult<()> {
        if !self.writes.contains_key(&id) {
            if !committed.contains_key(&id) {
                return Err(CivicError::not_found(self.entity_type, id.raw()));
            }
            self.observe(id, committed);
        }
        self.writes.insert(id, value);
        Ok(())
    }

    fn validate(&self, committed: &Table<K, V>) -> CivicResult<()> {
        for (id, expected) in &self.reads {
            let found = committed.get(id).map(|row| row.version).unwrap_or(0);
            if found != *expected {
                return Err(CivicError::Storage(StorageError::ConflictingWrite {
                    entity_type: self.entity_type,
                    id: id.raw(),
                    expected: *expected,
                    found,
                }));
            }
        }
        Ok(())
    }

    fn apply(self, committed: &mut Table<K, V>) -> usize {
        let written = self.writes.len();
        for (id, value) in self.writes {
            let version = committed.get(&id).map(|row| row.version).unwrap_or(0) + 1;
            committed.insert(id, Versioned { version, value });
        }
        written
    }
}

// ============================================================================
// TRANSACTION
// ============================================================================

struct MemoryTx<'a> {
    storage: &'a MemoryStorage,
    tx_id: TransactionId,
    complaints: TableTx<ComplaintId, Complaint>,
    inquiries: TableTx<InquiryId, ChildInquiry>,
    reroutes: TableTx<RerouteId, StoredReroute>,
    incidents: TableTx<IncidentId, Incident>,
    committed: bool,
}

impl Drop for MemoryTx<'_> {
    fn drop(&mut self) {
        if !self.committed {
            tracing::debug!(tx_id = %self.tx_id, "transaction rolled back");
        }
    }
}

impl StorageTx for MemoryTx<'_> {
    fn tx_id(&self) -> TransactionId {
        self.tx_id
    }

    fn next_complaint_id(&mut self) -> ComplaintId {
        ComplaintId(next(&self.storage.sequences.complaint))
    }

    fn next_inquiry_id(&mut self) -> InquiryId {
        InquiryId(next(&self.storage.sequences.inquiry))
    }

    fn next_reroute_id(&mut self) -> RerouteId {
        RerouteId(next(&self.storage.sequences.reroute))
    }

    fn next_incident_id(&mut self) -> IncidentId {
        IncidentId(next(&self.storage.sequences.incident))
    }

    // === Complaint Operations ===

    fn complaint_get(&mut self, id: ComplaintId) -> CivicResult<Option<Complaint>> {
        let storage = self.storage;
        let tables = storage.read()?;
        Ok(self.complaints.get(&tables.complaints, id))
    }

    fn complaint_insert(&mut self, complaint: &Complaint) -> CivicResult<()> {
        let storage = self.storage;
        let tables = storage.read()?;
        self.complaints
            .insert(&tables.complaints, complaint.complaint_id, complaint.clone())
    }

    fn complaint_put(&mut self, complaint: &Complaint) -> CivicResult<()> {
        let storage = self.storage;
        let tables = storage.read()?;
        self.complaints
            .put(&tables.complaints, complaint.complaint_id, complaint.clone())
    }

    fn complaints_in_incident(&mut self, incident_id: IncidentId) -> CivicResult<Vec<Complaint>> {
        let storage = self.storage;
        let tables = storage.read()?;
        Ok(self
            .complaints
            .scan(&tables.complaints, |c| c.incident_id == Some(incident_id)))
    }

    fn complaint_list(&mut self) -> CivicResult<Vec<Complaint>> {
        let storage = self.storage;
        let tables = storage.read()?;
        Ok(self.complaints.scan(&tables.complaints, |_| true))
    }

    // === Child Inquiry Operations ===

    fn inquiry_insert(&mut self, inquiry: &ChildInquiry) -> CivicResult<()> {
        let storage = self.storage;
        let tables = storage.read()?;
        self.inquiries
            .insert(&tables.inquiries, inquiry.inquiry_id, inquiry.clone())
    }

    fn inquiry_put(&mut self, inquiry: &ChildInquiry) -> CivicResult<()> {
        let storage = self.storage;
        let tables = storage.read()?;
        self.inquiries
            .put(&tables.inquiries, inquiry.inquiry_id, inquiry.clone())
    }

    fn inquiries_for(&mut self, parent_id: ComplaintId) -> CivicResult<Vec<ChildInquiry>> {
        let storage = self.storage;
        let tables = storage.read()?;
        Ok(self
            .inquiries
            .scan(&tables.inquiries, |i| i.parent_id == parent_id))
    }

    // === Reroute Operations ===

    fn reroute_get(&mut self, id: RerouteId) -> CivicResult<Option<StoredReroute>> {
        let storage = self.storage;
        let tables = storage.read()?;
        Ok(self.reroutes.get(&tables.reroutes, id))
    }

    fn reroute_insert(&mut self, reroute: &StoredReroute) -> CivicResult<()> {
        let storage = self.storage;
        let tables = storage.read()?;
        self.reroutes
            .insert(&tables.reroutes, reroute.data.reroute_id, reroute.clone())
    }

    fn reroute_put(&mut self, reroute: &StoredReroute) -> CivicResult<()> {
        let storage = self.storage;
        let tables = storage.read()?;
        self.reroutes
            .put(&tables.reroutes, reroute.data.reroute_id, reroute.clone())
    }

    fn reroutes_for_complaint(
        &mut self,
        complaint_id: ComplaintId,
    ) -> CivicResult<Vec<StoredReroute>> {
        let storage = self.storage;
        let tables = storage.read()?;
        Ok(self
            .reroutes
            .scan(&tables.reroutes, |r| r.data.complaint_id == complaint_id))
    }

    fn reroute_list_pending(&mut self) -> CivicResult<Vec<StoredReroute>> {
        let storage = self.storage;
        let tables = storage.read()?;
        Ok(self.reroutes.scan(&tables.reroutes, |r| r.is_pending()))
    }

    // === Incident Operations ===

    fn incident_get(&mut self, id: IncidentId) -> CivicResult<Option<Incident>> {
        let storage = self.storage;
        let tables = storage.read()?;
        Ok(self.incidents.get(&tables.incidents, id))
    }

    fn incident_insert(&mut self, incident: &Incident) -> CivicResult<()> {
        let storage = self.storage;
        let tables = storage.read()?;
        self.incidents
            .insert(&tables.incidents, incident.incident_id, incident.clone())
    }

    fn incident_put(&mut self, incident: &Incident) -> CivicResult<()> {
        let storage = self.storage;
        let tables = storage.read()?;
        self.incidents
            .put(&tables.incidents, incident.incident_id, incident.clone())
    }

    fn incident_list(&mut self) -> CivicResult<Vec<Incident>> {
        let storage = self.storage;
        let tables = storage.read()?;
        Ok(self.incidents.scan(&tables.incidents, |_| true))
    }

    // === Completion ===

    fn commit(mut self: Box<Self>) -> CivicResult<()> {
        let storage = self.storage;
        let mut tables = storage.write()?;

        self.complaints.validate(&tables.complaints)?;
        self.inquiries.validate(&tables.inquiries)?;
        self.reroutes.validate(&tables.reroutes)?;
        self.incidents.validate(&tables.incidents)?;

        let complaints = std::mem::replace(&mut self.complaints, TableTx::new(EntityType::Complaint));
        let inquiries = std::mem::replace(&mut self.inquiries, TableTx::new(EntityType::ChildInquiry));
        let reroutes = std::mem::replace(&mut self.reroutes, TableTx::new(EntityType::Reroute));
        let incidents = std::mem::replace(&mut self.incidents, TableTx::new(EntityType::Incident));

        let written = complaints.apply(&mut tables.complaints)
            + inquiries.apply(&mut tables.inquiries)
            + reroutes.apply(&mut tables.reroutes)
            + incidents.apply(&mut tables.incidents);

        self.committed = true;
        tracing::debug!(tx_id = %self.tx_id, rows = written, "transaction committed");
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use civic_core::{ComplaintStatus, ComplaintSubmission, ErrorKind, IncidentStatus};

    fn make_complaint(id: ComplaintId) -> Complaint {
        Complaint::received(id, ComplaintSubmission::new("Noise", "Construction at night"), Utc::now())
    }

    fn seed(storage: &MemoryStorage) -> ComplaintId {
        let mut tx = storage.begin().unwrap();
        let c = make_complaint(tx.next_complaint_id());
        tx.complaint_insert(&c).unwrap();
        tx.commit().unwrap();
        c.complaint_id
    }

    #[test]
    fn test_insert_commit_get() {
        let storage = MemoryStorage::new();
        let id = seed(&storage);

        let mut tx = storage.begin().unwrap();
        let loaded = tx.complaint_get(id).unwrap().unwrap();
        assert_eq!(loaded.complaint_id, id);
        assert_eq!(storage.complaint_count().unwrap(), 1);
        assert_eq!(storage.complaint_version(id).unwrap(), 1);
    }

    #[test]
    fn test_get_missing_returns_none() {
        let storage = MemoryStorage::new();
        let mut tx = storage.begin().unwrap();
        assert!(tx.complaint_get(ComplaintId(404)).unwrap().is_none());
        assert!(tx.incident_get(IncidentId(404)).unwrap().is_none());
    }

    #[test]
    fn test_duplicate_insert_fails() {
        let storage = MemoryStorage::new();
        let id = seed(&storage);
        let mut tx = storage.begin().unwrap();
        let dup = Complaint::received(id, ComplaintSubmission::new("a", "b"), Utc::now());
        let err = tx.complaint_insert(&dup).unwrap_err();
        assert!(matches!(err, CivicError::Storage(StorageError::InsertFailed { .. })));
    }

    #[test]
    fn test_put_missing_is_not_found() {
        let storage = MemoryStorage::new();
        let mut tx = storage.begin().unwrap();
        let ghost = Complaint::received(ComplaintId(9), ComplaintSubmission::new("a", "b"), Utc::now());
        assert_eq!(tx.complaint_put(&ghost).unwrap_err().kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_drop_rolls_back() {
        let storage = MemoryStorage::new();
        {
            let mut tx = storage.begin().unwrap();
            let c = make_complaint(tx.next_complaint_id());
            tx.complaint_insert(&c).unwrap();
        }
        assert_eq!(storage.complaint_count().unwrap(), 0);
    }

    #[test]
    fn test_sequences_survive_rollback() {
        let storage = MemoryStorage::new();
        {
            let mut tx = storage.begin().unwrap();
            assert_eq!(tx.next_complaint_id(), ComplaintId(1));
        }
        let mut tx = storage.begin().unwrap();
        assert_eq!(tx.next_complaint_id(), ComplaintId(2));
    }

    #[test]
    fn test_reads_see_own_writes() {
        let storage = MemoryStorage::new();
        let id = seed(&storage);
        let mut tx = storage.begin().unwrap();
        let mut c = tx.complaint_get(id).unwrap().unwrap();
        c.status = ComplaintStatus::Canceled;
        tx.complaint_put(&c).unwrap();
        assert_eq!(
            tx.complaint_get(id).unwrap().unwrap().status,
            ComplaintStatus::Canceled
        );
    }

    #[test]
    fn test_concurrent_writers_conflict() {
        let storage = MemoryStorage::new();
        let id = seed(&storage);

        let mut first = storage.begin().unwrap();
        let mut second = storage.begin().unwrap();

        let mut a = first.complaint_get(id).unwrap().unwrap();
        let mut b = second.complaint_get(id).unwrap().unwrap();
        a.status = ComplaintStatus::InProgress;
        b.status = ComplaintStatus::Canceled;
        first.complaint_put(&a).unwrap();
        second.complaint_put(&b).unwrap();

        first.commit().unwrap();
        let err = second.commit().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConflictingWrite);
        assert!(err.is_retryable());

        let mut check = storage.begin().unwrap();
        assert_eq!(
            check.complaint_get(id).unwrap().unwrap().status,
            ComplaintStatus::InProgress
        );
        assert_eq!(storage.complaint_version(id).unwrap(), 2);
    }

    #[test]
    fn test_stale_read_conflicts_even_without_write() {
        let storage = MemoryStorage::new();
        let id = seed(&storage);

        let mut reader = storage.begin().unwrap();
        reader.complaint_get(id).unwrap();

        let mut writer = storage.begin().unwrap();
        let mut c = writer.complaint_get(id).unwrap().unwrap();
        c.title = "changed".to_string();
        writer.complaint_put(&c).unwrap();
        writer.commit().unwrap();

        assert_eq!(reader.commit().unwrap_err().kind(), ErrorKind::ConflictingWrite);
    }

    #[test]
    fn test_membership_scan_overlays_writes() {
        let storage = MemoryStorage::new();
        let a = seed(&storage);
        let b = seed(&storage);

        let mut tx = storage.begin().unwrap();
        let incident_id = tx.next_incident_id();
        tx.incident_insert(&Incident::open(incident_id, "Noise".to_string(), Utc::now()))
            .unwrap();
        for id in [a, b] {
            let mut c = tx.complaint_get(id).unwrap().unwrap();
            c.incident_id = Some(incident_id);
            tx.complaint_put(&c).unwrap();
        }
        let members = tx.complaints_in_incident(incident_id).unwrap();
        assert_eq!(
            members.iter().map(|c| c.complaint_id).collect::<Vec<_>>(),
            vec![a, b]
        );
        tx.commit().unwrap();

        let mut tx = storage.begin().unwrap();
        let incident = tx.incident_get(incident_id).unwrap().unwrap();
        assert_eq!(incident.status, IncidentStatus::Open);
        assert_eq!(tx.complaints_in_incident(incident_id).unwrap().len(), 2);
        assert_eq!(storage.incident_count().unwrap(), 1);
    }

    #[test]
    fn test_concurrent_insert_of_same_id_conflicts() {
        let storage = MemoryStorage::new();
        let mut first = storage.begin().unwrap();
        let mut second = storage.begin().unwrap();
        let c = Complaint::received(ComplaintId(77), ComplaintSubmission::new("a", "b"), Utc::now());
        first.complaint_insert(&c).unwrap();
        second.complaint_insert(&c).unwrap();
        first.commit().unwrap();
        assert_eq!(second.commit().unwrap_err().kind(), ErrorKind::ConflictingWrite);
    }
}

#[cfg(test)]
mod prop_tests {
    use super::*;
    use chrono::Utc;
    use civic_core::ComplaintSubmission;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Committed row versions equal one plus the number of committed overwrites.
        #[test]
        fn prop_versions_count_commits(updates in 0usize..10) {
            let storage = MemoryStorage::new();
            let mut tx = storage.begin().unwrap();
            let id = tx.next_complaint_id();
            tx.complaint_insert(&Complaint::received(id, ComplaintSubmission::new("a", "b"), Utc::now())).unwrap();
            tx.commit().unwrap();

            for n in 0..updates {
                let mut tx = storage.begin().unwrap();
                let mut c = tx.complaint_get(id).unwrap().unwrap();
                c.title = format!("rev {}", n);
                tx.complaint_put(&c).unwrap();
                tx.commit().unwrap();
            }
            prop_assert_eq!(storage.complaint_version(id).unwrap(), updates as u64 + 1);
        }

        /// Rolled-back transactions leave no rows behind.
        #[test]
        fn prop_rollback_leaves_no_rows(n in 1usize..8) {
            let storage = MemoryStorage::new();
            {
                let mut tx = storage.begin().unwrap();
                for _ in 0..n {
                    let id = tx.next_complaint_id();
                    tx.complaint_insert(&Complaint::received(id, ComplaintSubmission::new("a", "b"), Utc::now())).unwrap();
                }
            }
            prop_assert_eq!(storage.complaint_count().unwrap(), 0);
        }
    }
}
