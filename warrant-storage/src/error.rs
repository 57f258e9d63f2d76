//! Error types for the storage layer.

use std::fmt;
use thiserror::Error;
use warrant_query::QueryError;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur in storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Entry, index or alias not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// The entry exists but the caller's rights filter excludes it.
    #[error("access denied: {0}")]
    AccessDenied(String),

    /// Malformed request (selection, pagination parameters, mapping).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// A conditional write lost against a concurrent writer.
    #[error("version conflict on {index}/{id}")]
    Conflict { index: String, id: String },

    /// Backend failure that retries did not resolve.
    #[error("backend error: {0}")]
    Backend(String),

    /// The operation exceeded its time bound.
    #[error("timed out: {0}")]
    Timeout(String),

    /// A step of an index migration failed.
    #[error("migration of {kind} failed at {step}: {message}")]
    MigrationFailure {
        kind: String,
        step: MigrationStep,
        message: String,
    },

    /// An alias is bound to something other than exactly one index.
    #[error("alias {alias} is bound to {} indices: {indices:?}", .indices.len())]
    Inconsistent { alias: String, indices: Vec<String> },

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<QueryError> for StorageError {
    fn from(err: QueryError) -> Self {
        Self::BadRequest(err.to_string())
    }
}

/// The step of a mapping migration that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationStep {
    /// Refused to start: a next-version index already exists.
    Precheck,
    CreateIndex,
    Reindex,
    SwapAlias,
    DeleteOld,
}

impl fmt::Display for MigrationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Precheck => "precheck",
            Self::CreateIndex => "create-index",
            Self::Reindex => "reindex",
            Self::SwapAlias => "swap-alias",
            Self::DeleteOld => "delete-old",
        };
        f.write_str(name)
    }
}
