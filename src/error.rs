//! Error types for teamplan
//!
//! Centralized error handling using thiserror. Only structural failures live
//! here; everything the planner can work around is reported as a
//! `PlanningWarning` on the result instead.

use thiserror::Error;

/// All error types that can escape a planning call
#[derive(Debug, Error)]
pub enum PlanError {
    /// Team id not present in the snapshot
    #[error("Team not found: {0}")]
    TeamNotFound(String),

    /// Snapshot content violates a structural rule (duplicate keys, bad levels, ...)
    #[error("Malformed snapshot: {0}")]
    MalformedSnapshot(String),

    /// Planner configuration is unusable
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Result type alias for teamplan operations
pub type Result<T> = std::result::Result<T, PlanError>;
