//! Entry persistence on top of a [`DocumentStore`].

use crate::{DocumentStore, StorageError, StorageResult};
use std::sync::Arc;
use tracing::debug;
use warrant_model::Entry;
use warrant_types::VersionToken;

/// An entry as read, with the token a later write must present.
#[derive(Debug, Clone, PartialEq)]
pub struct VersionedEntry {
    pub entry: Entry,
    pub version: VersionToken,
}

/// Reads and writes entries through each kind's alias.
#[derive(Clone)]
pub struct EntryStore {
    documents: Arc<dyn DocumentStore>,
}

impl EntryStore {
    pub fn new(documents: Arc<dyn DocumentStore>) -> Self {
        Self { documents }
    }

    /// Loads an entry with its current version token.
    pub async fn get_entry(&self, kind: &str, id: &str) -> StorageResult<Option<VersionedEntry>> {
        let Some(doc) = self.documents.get(kind, id).await? else {
            return Ok(None);
        };
        let entry = Entry::from_document(doc.source)?;
        Ok(Some(VersionedEntry {
            entry,
            version: doc.version,
        }))
    }

    /// Like [`get_entry`](Self::get_entry) but a missing entry is an error.
    pub async fn require_entry(&self, kind: &str, id: &str) -> StorageResult<VersionedEntry> {
        self.get_entry(kind, id)
            .await?
            .ok_or_else(|| StorageError::NotFound(format!("{kind}/{id}")))
    }

    /// Writes an entry. With `expected` the write fails with a conflict if
    /// the stored entry changed since it was read.
    pub async fn save_entry(
        &self,
        kind: &str,
        entry: &Entry,
        expected: Option<VersionToken>,
    ) -> StorageResult<VersionToken> {
        let doc = entry.to_document()?;
        let version = self.documents.put(kind, &entry.id, &doc, expected).await?;
        debug!(kind, id = %entry.id, %version, conditional = expected.is_some(), "saved entry");
        Ok(version)
    }

    /// Writes a new entry. Fails with a conflict if the id is taken.
    pub async fn create_entry(&self, kind: &str, entry: &Entry) -> StorageResult<VersionToken> {
        let doc = entry.to_document()?;
        let version = self.documents.create(kind, &entry.id, &doc).await?;
        debug!(kind, id = %entry.id, %version, "created entry");
        Ok(version)
    }

    /// Returns true if the entry existed.
    pub async fn delete_entry(&self, kind: &str, id: &str) -> StorageResult<bool> {
        self.documents.delete(kind, id).await
    }
}
