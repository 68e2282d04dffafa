//! Civic Core - Entity Types and Lifecycle Rules
//!
//! Data structures for complaints, reroute requests and incidents, plus the
//! pure rules that govern them. No storage, no I/O. All other crates depend
//! on this.

pub mod config;
pub mod directory;
pub mod embedding;
pub mod entities;
pub mod enums;
pub mod error;
pub mod identity;
pub mod incident;
pub mod lifecycle;
pub mod reroute;

pub use config::EngineConfig;
pub use directory::{DepartmentDirectory, StaticDirectory};
pub use embedding::{keyword_jaccard, EmbeddingVector};
pub use entities::{
    ChildInquiry, Classification, Complaint, ComplaintSubmission, GeoPoint, Incident,
    NormalizationResult,
};
pub use enums::{
    ComplaintStatus, ComplaintStatusParseError, EntityType, IncidentStatus,
    IncidentStatusParseError,
};
pub use error::{
    CivicError, CivicResult, ConfigError, ErrorKind, LifecycleError, StorageError,
    ValidationError, VectorError,
};
pub use identity::{
    new_transaction_id, AgentId, ApplicantId, ComplaintId, DepartmentId, EntityIdParseError,
    EntityIdType, IncidentId, InquiryId, RerouteId, Timestamp, TransactionId,
};
pub use incident::{derive_status, Rollup};
pub use lifecycle::StatusChange;
pub use reroute::{
    LoadedReroute, Reroute, RerouteData, RerouteState, RerouteStatus, RerouteStatusParseError,
    StoredReroute,
};
