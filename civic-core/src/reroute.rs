//! Reroute request typestate.
//!
//! A reroute is decided exactly once. The typestate makes a second decision
//! uncompilable; requests loaded from storage go through [`StoredReroute`].
//!
//! ```text
//! request() → Pending ──┬── approve() ──→ Approved (terminal)
//!                       └── reject() ───→ Rejected (terminal)
//! ```

use crate::{
    AgentId, ComplaintId, DepartmentId, LifecycleError, RerouteId, Timestamp,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;

// ============================================================================
// REROUTE STATUS
// ============================================================================

/// Status of a reroute request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RerouteStatus {
    /// Awaiting a reviewer
    Pending,
    /// Department change applied
    Approved,
    /// Department change refused
    Rejected,
}

impl RerouteStatus {
    /// Convert to database string representation.
    pub fn as_db_str(&self) -> &'static str {
        match self {
            RerouteStatus::Pending => "PENDING",
            RerouteStatus::Approved => "APPROVED",
            RerouteStatus::Rejected => "REJECTED",
        }
    }

    /// Parse from database string representation.
    pub fn from_db_str(s: &str) -> Result<Self, RerouteStatusParseError> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(RerouteStatus::Pending),
            "approved" => Ok(RerouteStatus::Approved),
            "rejected" => Ok(RerouteStatus::Rejected),
            _ => Err(RerouteStatusParseError(s.to_string())),
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, RerouteStatus::Pending)
    }
}

impl fmt::Display for RerouteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_db_str())
    }
}

impl FromStr for RerouteStatus {
    type Err = RerouteStatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_db_str(s)
    }
}

/// Error when parsing an invalid reroute status string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RerouteStatusParseError(pub String);

impl fmt::Display for RerouteStatusParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid reroute status: {}", self.0)
    }
}

impl std::error::Error for RerouteStatusParseError {}

// ============================================================================
// REROUTE DATA (persisted, state-independent)
// ============================================================================

/// Persisted fields of a reroute request, independent of typestate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct RerouteData {
    pub reroute_id: RerouteId,
    pub complaint_id: ComplaintId,
    pub origin_department: Option<DepartmentId>,
    pub target_department: DepartmentId,
    pub reason: String,
    pub requester: AgentId,
    /// Set once decided
    pub reviewer: Option<AgentId>,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub requested_at: Timestamp,
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "date-time"))]
    pub decided_at: Option<Timestamp>,
}

// ============================================================================
// TYPESTATE MARKERS
// ============================================================================

/// Marker trait for reroute states.
pub trait RerouteState: private::Sealed + Send + Sync {
    const STATUS: RerouteStatus;
}

/// Awaiting review.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pending;
impl RerouteState for Pending {
    const STATUS: RerouteStatus = RerouteStatus::Pending;
}

/// Approved (terminal).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Approved;
impl RerouteState for Approved {
    const STATUS: RerouteStatus = RerouteStatus::Approved;
}

/// Rejected (terminal).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rejected;
impl RerouteState for Rejected {
    const STATUS: RerouteStatus = RerouteStatus::Rejected;
}

mod private {
    pub trait Sealed {}
    impl Sealed for super::Pending {}
    impl Sealed for super::Approved {}
    impl Sealed for super::Rejected {}
}

// ============================================================================
// REROUTE TYPESTATE WRAPPER
// ============================================================================

/// A reroute request with compile-time state tracking.
///
/// Only `Reroute<Pending>` can be decided.
#[derive(Debug, Clone)]
pub struct Reroute<S: RerouteState> {
    data: RerouteData,
    _state: PhantomData<S>,
}

impl<S: RerouteState> Reroute<S> {
    pub fn data(&self) -> &RerouteData {
        &self.data
    }

    pub fn reroute_id(&self) -> RerouteId {
        self.data.reroute_id
    }

    pub fn complaint_id(&self) -> ComplaintId {
        self.data.complaint_id
    }

    pub fn target_department(&self) -> DepartmentId {
        self.data.target_department
    }

    pub fn status(&self) -> RerouteStatus {
        S::STATUS
    }

    /// Back to the storage representation.
    pub fn into_stored(self) -> StoredReroute {
        StoredReroute {
            data: self.data,
            status: S::STATUS,
        }
    }
}

impl Reroute<Pending> {
    /// Open a new request.
    pub fn request(data: RerouteData) -> Self {
        Reroute {
            data,
            _state: PhantomData,
        }
    }

    pub fn approve(mut self, reviewer: AgentId, decided_at: Timestamp) -> Reroute<Approved> {
        self.data.reviewer = Some(reviewer);
        self.data.decided_at = Some(decided_at);
        Reroute {
            data: self.data,
            _state: PhantomData,
        }
    }

    pub fn reject(mut self, reviewer: AgentId, decided_at: Timestamp) -> Reroute<Rejected> {
        self.data.reviewer = Some(reviewer);
        self.data.decided_at = Some(decided_at);
        Reroute {
            data: self.data,
            _state: PhantomData,
        }
    }
}

// ============================================================================
// DATABASE BOUNDARY: STORED REROUTE
// ============================================================================

/// A reroute request as stored (status-agnostic).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct StoredReroute {
    pub data: RerouteData,
    pub status: RerouteStatus,
}

/// Runtime view of a stored request.
#[derive(Debug, Clone)]
pub enum LoadedReroute {
    Pending(Reroute<Pending>),
    Approved(Reroute<Approved>),
    Rejected(Reroute<Rejected>),
}

impl StoredReroute {
    /// Convert to a typed request based on the stored status.
    pub fn into_typed(self) -> LoadedReroute {
        match self.status {
            RerouteStatus::Pending => LoadedReroute::Pending(Reroute {
                data: self.data,
                _state: PhantomData,
            }),
            RerouteStatus::Approved => LoadedReroute::Approved(Reroute {
                data: self.data,
                _state: PhantomData,
            }),
            RerouteStatus::Rejected => LoadedReroute::Rejected(Reroute {
                data: self.data,
                _state: PhantomData,
            }),
        }
    }

    /// Try to convert to a pending request; a decided one yields `AlreadyDecided`.
    pub fn into_pending(self) -> Result<Reroute<Pending>, LifecycleError> {
        if self.status != RerouteStatus::Pending {
            return Err(LifecycleError::AlreadyDecided {
                request_id: self.data.reroute_id,
                status: self.status,
            });
        }
        Ok(Reroute {
            data: self.data,
            _state: PhantomData,
        })
    }

    pub fn is_pending(&self) -> bool {
        self.status == RerouteStatus::Pending
    }
}
