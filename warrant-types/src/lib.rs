//! Core type definitions for Warrant.
//!
//! This crate defines the fundamental types shared by every layer:
//! - Resource and command identifiers
//! - The [`Rights`] flag set and its single-character wire form
//! - Principals (users and groups)
//! - Optimistic-concurrency [`VersionToken`]s
//! - Mutation [`Command`]s delivered by the ingestion transport
//!
//! Feature documents are plain JSON; their structure belongs to the
//! per-kind configuration, not to this crate.

mod command;
mod ids;
mod rights;
mod version;

pub use command::{Command, CommandId, CommandPayload};
pub use ids::{Principal, PrincipalKind, ResourceId};
pub use rights::{Right, Rights};
pub use version::VersionToken;

/// A generic ordered JSON document (features, annotations).
pub type Document = serde_json::Map<String, serde_json::Value>;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid UUID: {0}")]
    InvalidUuid(#[from] uuid::Error),

    #[error("unknown right character: {0:?}")]
    UnknownRight(char),

    #[error("invalid resource id: {0}")]
    InvalidResourceId(String),
}
