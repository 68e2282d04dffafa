//! Service Layer
//!
//! Use-case logic. Every function here runs against an open transaction and
//! leaves committing to the caller, so a failure anywhere discards the
//! triggering mutation together with any aggregate refresh.

mod complaint_service;
mod incident_service;
mod reroute_service;

pub use complaint_service::*;
pub use incident_service::*;
pub use reroute_service::*;

use civic_core::{
    CivicError, CivicResult, Complaint, ComplaintId, EntityType, Incident, IncidentId, RerouteId,
    StoredReroute,
};
use civic_storage::StorageTx;

pub(crate) fn require_complaint(tx: &mut dyn StorageTx, id: ComplaintId) -> CivicResult<Complaint> {
    tx.complaint_get(id)?
        .ok_or_else(|| CivicError::not_found(EntityType::Complaint, id.0))
}

pub(crate) fn require_incident(tx: &mut dyn StorageTx, id: IncidentId) -> CivicResult<Incident> {
    tx.incident_get(id)?
        .ok_or_else(|| CivicError::not_found(EntityType::Incident, id.0))
}

pub(crate) fn require_reroute(tx: &mut dyn StorageTx, id: RerouteId) -> CivicResult<StoredReroute> {
    tx.reroute_get(id)?
        .ok_or_else(|| CivicError::not_found(EntityType::Reroute, id.0))
}
