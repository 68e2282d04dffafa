//! Identity types for civic entities

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Correlation id attached to every engine transaction for log tracing.
/// UUIDv7 keeps transaction ids sortable by start time.
pub type TransactionId = Uuid;

/// Generate a new UUIDv7 transaction id.
pub fn new_transaction_id() -> TransactionId {
    Uuid::now_v7()
}

/// Common behaviour of the numeric entity identifiers.
pub trait EntityIdType: Copy + Eq + std::hash::Hash + fmt::Display {
    /// Wrap a raw row id.
    fn from_raw(raw: u64) -> Self;

    /// The raw row id.
    fn raw(&self) -> u64;
}

/// Error when parsing an entity id from text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityIdParseError(pub String);

impl fmt::Display for EntityIdParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid entity id: {}", self.0)
    }
}

impl std::error::Error for EntityIdParseError {}

macro_rules! define_entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl EntityIdType for $name {
            fn from_raw(raw: u64) -> Self {
                Self(raw)
            }

            fn raw(&self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = EntityIdParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim()
                    .parse::<u64>()
                    .map(Self)
                    .map_err(|_| EntityIdParseError(s.to_string()))
            }
        }

        impl From<u64> for $name {
            fn from(raw: u64) -> Self {
                Self(raw)
            }
        }
    };
}

define_entity_id!(
    /// Identifier of a citizen complaint.
    ComplaintId
);
define_entity_id!(
    /// Identifier of a follow-up inquiry filed against a complaint.
    InquiryId
);
define_entity_id!(
    /// Identifier of an incident (cluster of complaints).
    IncidentId
);
define_entity_id!(
    /// Identifier of a reroute request.
    RerouteId
);
define_entity_id!(
    /// Identifier of an agent (municipal staff member).
    AgentId
);
define_entity_id!(
    /// Identifier of a municipal department.
    DepartmentId
);
define_entity_id!(
    /// Identifier of a citizen who filed complaints.
    ApplicantId
);
