//! Engine configuration

use crate::{CivicError, CivicResult, ConfigError};
use serde::{Deserialize, Serialize};

/// Tunables for incident suggestion and listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct EngineConfig {
    /// Minimum hybrid score for an incident suggestion, in [0, 1]
    pub similarity_threshold: f32,
    /// Weight of embedding cosine vs keyword Jaccard, in [0, 1]
    pub embedding_weight: f32,
    /// Cap on suggestions returned per complaint
    pub max_suggestions: usize,
    /// Incidents listed by search need at least this many members
    pub listing_min_members: u64,
    /// OPEN incidents with at least this many members are major
    pub major_min_members: u64,
    /// Prefix of generated incident titles
    pub new_incident_title_prefix: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.65,
            embedding_weight: 0.6,
            max_suggestions: 5,
            listing_min_members: 3,
            major_min_members: 5,
            new_incident_title_prefix: "[New] ".to_string(),
        }
    }
}

impl EngineConfig {
    /// Create from environment variables with fallback to defaults.
    ///
    /// Environment variables:
    /// - `CIVIC_SIMILARITY_THRESHOLD` (default: 0.65)
    /// - `CIVIC_EMBEDDING_WEIGHT` (default: 0.6)
    /// - `CIVIC_MAX_SUGGESTIONS` (default: 5)
    /// - `CIVIC_LISTING_MIN_MEMBERS` (default: 3)
    /// - `CIVIC_MAJOR_MIN_MEMBERS` (default: 5)
    /// - `CIVIC_NEW_INCIDENT_PREFIX` (default: "[New] ")
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            similarity_threshold: std::env::var("CIVIC_SIMILARITY_THRESHOLD")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.similarity_threshold),
            embedding_weight: std::env::var("CIVIC_EMBEDDING_WEIGHT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.embedding_weight),
            max_suggestions: std::env::var("CIVIC_MAX_SUGGESTIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_suggestions),
            listing_min_members: std::env::var("CIVIC_LISTING_MIN_MEMBERS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.listing_min_members),
            major_min_members: std::env::var("CIVIC_MAJOR_MIN_MEMBERS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.major_min_members),
            new_incident_title_prefix: std::env::var("CIVIC_NEW_INCIDENT_PREFIX")
                .unwrap_or(defaults.new_incident_title_prefix),
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> CivicResult<()> {
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(CivicError::Config(ConfigError::InvalidValue {
                field: "similarity_threshold".to_string(),
                value: self.similarity_threshold.to_string(),
                reason: "similarity_threshold must be between 0.0 and 1.0".to_string(),
            }));
        }

        if !(0.0..=1.0).contains(&self.embedding_weight) {
            return Err(CivicError::Config(ConfigError::InvalidValue {
                field: "embedding_weight".to_string(),
                value: self.embedding_weight.to_string(),
                reason: "embedding_weight must be between 0.0 and 1.0".to_string(),
            }));
        }

        if self.max_suggestions == 0 {
            return Err(CivicError::Config(ConfigError::InvalidValue {
                field: "max_suggestions".to_string(),
                value: self.max_suggestions.to_string(),
                reason: "max_suggestions must be greater than 0".to_string(),
            }));
        }

        if self.major_min_members == 0 {
            return Err(CivicError::Config(ConfigError::InvalidValue {
                field: "major_min_members".to_string(),
                value: self.major_min_members.to_string(),
                reason: "major_min_members must be greater than 0".to_string(),
            }));
        }

        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================
