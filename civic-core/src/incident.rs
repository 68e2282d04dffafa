//! Incident derived state.
//!
//! Status, member count, occurrence window and centroid are always
//! recomputed from the live member list, never tracked incrementally.

use crate::{Complaint, ComplaintStatus, GeoPoint, Incident, IncidentStatus, Timestamp};

/// Derived status for a member list. `None` when there are no members,
/// in which case the incident keeps whatever status it had.
pub fn derive_status<I>(member_statuses: I) -> Option<IncidentStatus>
where
    I: IntoIterator<Item = ComplaintStatus>,
{
    let mut any = false;
    for status in member_statuses {
        any = true;
        if !status.is_terminal() {
            return Some(IncidentStatus::Open);
        }
    }
    any.then_some(IncidentStatus::Closed)
}

/// Statistics recomputed from live membership.
#[derive(Debug, Clone, PartialEq)]
pub struct Rollup {
    pub member_count: u64,
    pub status: Option<IncidentStatus>,
    pub first_occurred_at: Option<Timestamp>,
    pub last_occurred_at: Option<Timestamp>,
    pub centroid: Option<GeoPoint>,
}

impl Rollup {
    pub fn compute(members: &[Complaint]) -> Self {
        Self {
            member_count: members.len() as u64,
            status: derive_status(members.iter().map(|c| c.status)),
            first_occurred_at: members.iter().map(|c| c.submitted_at).min(),
            last_occurred_at: members.iter().map(|c| c.submitted_at).max(),
            centroid: GeoPoint::centroid(members.iter().filter_map(|c| c.location)),
        }
    }
}

impl Incident {
    /// Re-evaluate only the derived status. Returns true if it changed.
    pub fn refresh_status(&mut self, members: &[Complaint]) -> bool {
        match derive_status(members.iter().map(|c| c.status)) {
            Some(status) if status != self.status => {
                self.status = status;
                true
            }
            _ => false,
        }
    }

    /// Overwrite count and statistics from a rollup. Returns true if anything changed.
    ///
    /// An empty rollup only zeroes the count; status, window and centroid stay.
    pub fn apply_rollup(&mut self, rollup: Rollup) -> bool {
        let before = self.clone();
        self.member_count = rollup.member_count;
        if let Some(status) = rollup.status {
            self.status = status;
            self.first_occurred_at = rollup.first_occurred_at;
            self.last_occurred_at = rollup.last_occurred_at;
            self.centroid = rollup.centroid;
        }
        *self != before
    }
}
