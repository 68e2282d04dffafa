//! Error types for civic routing operations

use crate::{AgentId, ComplaintId, ComplaintStatus, EntityType, RerouteId, RerouteStatus};
use thiserror::Error;

/// Storage layer errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Entity not found: {entity_type:?} with id {id}")]
    NotFound { entity_type: EntityType, id: u64 },

    #[error("Insert failed for {entity_type:?}: {reason}")]
    InsertFailed { entity_type: EntityType, reason: String },

    #[error("Conflicting write on {entity_type:?} {id}: read version {expected}, found {found}")]
    ConflictingWrite {
        entity_type: EntityType,
        id: u64,
        expected: u64,
        found: u64,
    },

    #[error("Transaction failed: {reason}")]
    TransactionFailed { reason: String },

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// Complaint and reroute lifecycle errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("Invalid transition for complaint {complaint_id}: cannot {operation} from {from}")]
    InvalidTransition {
        complaint_id: ComplaintId,
        from: ComplaintStatus,
        operation: &'static str,
    },

    #[error("Complaint {complaint_id} has no assigned agent")]
    NotAssigned { complaint_id: ComplaintId },

    #[error("Agent {actor} does not hold complaint {complaint_id} (holder: {holder:?})")]
    NotOwner {
        complaint_id: ComplaintId,
        actor: AgentId,
        holder: Option<AgentId>,
    },

    #[error("Reroute request {request_id} already decided: {status}")]
    AlreadyDecided {
        request_id: RerouteId,
        status: RerouteStatus,
    },

    #[error("Complaint {complaint_id} is not answered yet ({status}), follow-up not allowed")]
    PendingAnswerExists {
        complaint_id: ComplaintId,
        status: ComplaintStatus,
    },

    #[error("Complaint {complaint_id} already has pending reroute request {request_id}")]
    ReroutePending {
        complaint_id: ComplaintId,
        request_id: RerouteId,
    },
}

/// Validation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    RequiredFieldMissing { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Selection is empty: {reason}")]
    EmptySelection { reason: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Vector operation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum VectorError {
    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("Invalid vector: {reason}")]
    InvalidVector { reason: String },
}

/// Caller-facing error taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    InvalidTransition,
    NotOwner,
    NotAssigned,
    AlreadyDecided,
    PendingAnswerExists,
    ConflictingWrite,
    Invalid,
    Internal,
}

/// Master error type for all civic routing errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CivicError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Lifecycle error: {0}")]
    Lifecycle(#[from] LifecycleError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Vector error: {0}")]
    Vector(#[from] VectorError),
}

impl CivicError {
    /// Shorthand for a missing entity.
    pub fn not_found(entity_type: EntityType, id: u64) -> Self {
        CivicError::Storage(StorageError::NotFound { entity_type, id })
    }

    /// Classify the error for the caller.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CivicError::Storage(StorageError::NotFound { .. }) => ErrorKind::NotFound,
            CivicError::Storage(StorageError::ConflictingWrite { .. }) => ErrorKind::ConflictingWrite,
            CivicError::Storage(_) => ErrorKind::Internal,
            CivicError::Lifecycle(err) => match err {
                LifecycleError::InvalidTransition { .. } | LifecycleError::ReroutePending { .. } => {
                    ErrorKind::InvalidTransition
                }
                LifecycleError::NotAssigned { .. } => ErrorKind::NotAssigned,
                LifecycleError::NotOwner { .. } => ErrorKind::NotOwner,
                LifecycleError::AlreadyDecided { .. } => ErrorKind::AlreadyDecided,
                LifecycleError::PendingAnswerExists { .. } => ErrorKind::PendingAnswerExists,
            },
            CivicError::Validation(_) | CivicError::Vector(_) => ErrorKind::Invalid,
            CivicError::Config(_) => ErrorKind::Internal,
        }
    }

    /// Only optimistic-lock conflicts may succeed when retried unchanged.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::ConflictingWrite
    }
}

/// Result type alias for civic routing operations.
pub type CivicResult<T> = Result<T, CivicError>;

// =============================================================================
// TESTS
// =============================================================================
