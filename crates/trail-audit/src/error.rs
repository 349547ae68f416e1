//! Error types for the audit crate.

use thiserror::Error;

/// Errors that can occur while capturing or reading audit trails.
#[derive(Debug, Error)]
pub enum TrailError {
    /// No audit entry could be resolved for the current operation.
    #[error("audit entry unavailable: {0}")]
    ConfigurationMissing(String),

    /// Failed to write trail rows.
    #[error("failed to persist audit trail: {0}")]
    Persistence(String),

    /// Failed to query trail rows.
    #[error("failed to query audit trail: {0}")]
    Query(String),

    /// Failed to format the `created` timestamp.
    #[error("failed to format timestamp: {0}")]
    Timestamp(String),

    /// Storage backend could not be created.
    #[error("failed to initialize audit storage: {0}")]
    Initialization(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TrailError {
    /// Whether this failure happened while producing or writing rows.
    ///
    /// These are the failures a create/update audit discards.
    pub fn is_persistence_failure(&self) -> bool {
        matches!(
            self,
            Self::Persistence(_) | Self::Serialization(_) | Self::Timestamp(_) | Self::Io(_)
        )
    }
}
