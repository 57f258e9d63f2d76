//! Error types for the update pipeline.

use thiserror::Error;
use warrant_storage::StorageError;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// No schema registered for the kind.
    #[error("unknown resource kind: {0}")]
    UnknownKind(String),

    /// The kind's handler refused the write.
    #[error("{kind}/{id} rejected: {reason}")]
    Rejected {
        kind: String,
        id: String,
        reason: String,
    },

    /// The command could not be decoded into an operation.
    #[error("invalid command: {0}")]
    InvalidCommand(String),
}

impl PipelineError {
    /// True when a conditional write lost against a concurrent writer.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Storage(StorageError::Conflict { .. }))
    }

    /// True when the addressed entry does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Storage(StorageError::NotFound(_)))
    }
}
