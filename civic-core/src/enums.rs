//! Enum types for civic entities

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// ENTITY TYPE
// ============================================================================

/// Entity type discriminator used in errors and storage keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub enum EntityType {
    Complaint,
    ChildInquiry,
    Incident,
    Reroute,
    Department,
}

// ============================================================================
// COMPLAINT STATUS
// ============================================================================

/// Lifecycle status of a complaint.
///
/// ```text
/// RECEIVED → NORMALIZED → RECOMMENDED → IN_PROGRESS → RESOLVED → CLOSED
///                                          │   ↑
///                            request ──────┘   └── reject
///                                 REROUTE_PENDING ── approve ──→ RECEIVED
/// any non-terminal ── cancel() ──→ CANCELED
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComplaintStatus {
    /// Filed, not yet classified or assigned
    Received,
    /// Normalized by the AI pipeline
    Normalized,
    /// AI pipeline recommended a department
    Recommended,
    /// An agent holds the complaint
    InProgress,
    /// A department change is awaiting review
    ReroutePending,
    /// Final answer written
    Resolved,
    /// Closed after resolution (terminal)
    Closed,
    /// Withdrawn (terminal)
    Canceled,
}

impl ComplaintStatus {
    /// All statuses, in lifecycle order.
    pub const ALL: [ComplaintStatus; 8] = [
        ComplaintStatus::Received,
        ComplaintStatus::Normalized,
        ComplaintStatus::Recommended,
        ComplaintStatus::InProgress,
        ComplaintStatus::ReroutePending,
        ComplaintStatus::Resolved,
        ComplaintStatus::Closed,
        ComplaintStatus::Canceled,
    ];

    /// Convert to database string representation.
    pub fn as_db_str(&self) -> &'static str {
        match self {
            ComplaintStatus::Received => "RECEIVED",
            ComplaintStatus::Normalized => "NORMALIZED",
            ComplaintStatus::Recommended => "RECOMMENDED",
            ComplaintStatus::InProgress => "IN_PROGRESS",
            ComplaintStatus::ReroutePending => "REROUTE_PENDING",
            ComplaintStatus::Resolved => "RESOLVED",
            ComplaintStatus::Closed => "CLOSED",
            ComplaintStatus::Canceled => "CANCELED",
        }
    }

    /// Parse from database string representation.
    pub fn from_db_str(s: &str) -> Result<Self, ComplaintStatusParseError> {
        match s.to_lowercase().as_str() {
            "received" => Ok(ComplaintStatus::Received),
            "normalized" => Ok(ComplaintStatus::Normalized),
            "recommended" => Ok(ComplaintStatus::Recommended),
            "in_progress" | "inprogress" | "in-progress" => Ok(ComplaintStatus::InProgress),
            "reroute_pending" | "reroutepending" | "reroute-pending" => {
                Ok(ComplaintStatus::ReroutePending)
            }
            "resolved" | "done" => Ok(ComplaintStatus::Resolved),
            "closed" => Ok(ComplaintStatus::Closed),
            "canceled" | "cancelled" => Ok(ComplaintStatus::Canceled),
            _ => Err(ComplaintStatusParseError(s.to_string())),
        }
    }

    /// Check if this is a terminal state (no further transitions possible).
    pub fn is_terminal(&self) -> bool {
        matches!(self, ComplaintStatus::Closed | ComplaintStatus::Canceled)
    }

    /// Statuses in which an agent may take the complaint.
    pub fn is_pre_assignment(&self) -> bool {
        matches!(
            self,
            ComplaintStatus::Received | ComplaintStatus::Normalized | ComplaintStatus::Recommended
        )
    }
}

impl fmt::Display for ComplaintStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_db_str())
    }
}

impl FromStr for ComplaintStatus {
    type Err = ComplaintStatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_db_str(s)
    }
}

/// Error when parsing an invalid complaint status string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComplaintStatusParseError(pub String);

impl fmt::Display for ComplaintStatusParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid complaint status: {}", self.0)
    }
}

impl std::error::Error for ComplaintStatusParseError {}

// ============================================================================
// INCIDENT STATUS
// ============================================================================

/// Derived status of an incident.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IncidentStatus {
    /// At least one member still needs work
    Open,
    /// Every member is closed or canceled
    Closed,
}

impl IncidentStatus {
    /// Convert to database string representation.
    pub fn as_db_str(&self) -> &'static str {
        match self {
            IncidentStatus::Open => "OPEN",
            IncidentStatus::Closed => "CLOSED",
        }
    }

    /// Parse from database string representation.
    pub fn from_db_str(s: &str) -> Result<Self, IncidentStatusParseError> {
        match s.to_lowercase().as_str() {
            "open" => Ok(IncidentStatus::Open),
            "closed" => Ok(IncidentStatus::Closed),
            _ => Err(IncidentStatusParseError(s.to_string())),
        }
    }
}

impl fmt::Display for IncidentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_db_str())
    }
}

impl FromStr for IncidentStatus {
    type Err = IncidentStatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_db_str(s)
    }
}

/// Error when parsing an invalid incident status string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncidentStatusParseError(pub String);

impl fmt::Display for IncidentStatusParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid incident status: {}", self.0)
    }
}

impl std::error::Error for IncidentStatusParseError {}
