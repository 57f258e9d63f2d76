//! Read, mutate, conditional write.
//!
//! Every mutation of an existing entry reads it together with its version
//! token, changes it in memory and writes it back conditioned on that
//! token. If another writer got there first the backend rejects the write
//! and the conflict is returned to the caller as is.
//!
//! Ordering precondition: mutations for one (kind, id) must not run
//! concurrently. The ingestion transport guarantees this. With
//! [`IngestConfig::serialize_per_key`] set the pipeline additionally holds
//! a per-key lock around each mutation.
//!
//! A feature update for an unseen id creates the entry without a version
//! precondition, but only if the id is still free: when two first updates
//! race for the same new id the first writer wins and the other gets a
//! conflict.

use crate::{KeyedLocks, KindRegistry, PipelineError, PipelineResult};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::MutexGuard;
use tracing::{debug, info};
use warrant_model::{Entry, KindSchema};
use warrant_storage::{DocumentStore, EntryStore, StorageError, VersionedEntry};
use warrant_types::{Document, Principal, Rights};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Hold a sharded per-key lock around every mutation.
    pub serialize_per_key: bool,
    pub lock_shards: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            serialize_per_key: false,
            lock_shards: KeyedLocks::DEFAULT_SHARDS,
        }
    }
}

/// A change to one principal's rights on an entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RightMutation {
    pub principal: Principal,
    pub change: RightChange,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RightChange {
    Grant(Rights),
    Revoke(Rights),
    /// Remove the principal from every list of its kind.
    RevokeAll,
}

impl RightMutation {
    pub fn grant(principal: Principal, rights: Rights) -> Self {
        Self {
            principal,
            change: RightChange::Grant(rights),
        }
    }

    pub fn revoke(principal: Principal, rights: Rights) -> Self {
        Self {
            principal,
            change: RightChange::Revoke(rights),
        }
    }

    pub fn revoke_all(principal: Principal) -> Self {
        Self {
            principal,
            change: RightChange::RevokeAll,
        }
    }

    /// Applies the change to the entry's grant lists. Returns true if any
    /// list changed.
    pub fn apply_to(&self, entry: &mut Entry) -> bool {
        match self.change {
            RightChange::Grant(rights) => entry.grants.grant(&self.principal, rights),
            RightChange::Revoke(rights) => entry.grants.revoke(&self.principal, rights),
            RightChange::RevokeAll => entry.grants.revoke_all(&self.principal),
        }
    }
}

/// Applies entry mutations against the backend.
pub struct UpdatePipeline {
    store: EntryStore,
    kinds: Arc<KindRegistry>,
    locks: Option<KeyedLocks>,
}

impl UpdatePipeline {
    pub fn new(documents: Arc<dyn DocumentStore>, kinds: Arc<KindRegistry>, config: &IngestConfig) -> Self {
        let locks = config
            .serialize_per_key
            .then(|| KeyedLocks::new(config.lock_shards));
        Self {
            store: EntryStore::new(documents),
            kinds,
            locks,
        }
    }

    pub fn store(&self) -> &EntryStore {
        &self.store
    }

    pub fn kinds(&self) -> &KindRegistry {
        &self.kinds
    }

    /// Replaces an entry's features, creating the entry with default rights
    /// for `owner_if_new` when it does not exist yet.
    pub async fn apply_feature_update(
        &self,
        kind: &str,
        id: &str,
        features: Document,
        owner_if_new: &str,
    ) -> PipelineResult<Entry> {
        let schema = self.schema(kind)?;
        let _guard = self.lock(kind, id).await;

        match self.store.get_entry(kind, id).await? {
            Some(VersionedEntry { mut entry, version }) => {
                entry.features = features;
                self.validate(kind, &entry)?;
                self.store.save_entry(kind, &entry, Some(version)).await?;
                debug!(kind, id, "features replaced");
                Ok(entry)
            }
            None => {
                let entry = Entry::new(id, owner_if_new, features, &schema.initial_group_rights());
                self.validate(kind, &entry)?;
                self.store.create_entry(kind, &entry).await?;
                info!(kind, id, creator = owner_if_new, "entry created");
                Ok(entry)
            }
        }
    }

    /// Grants or revokes rights of one principal on an existing entry.
    pub async fn apply_right_mutation(
        &self,
        kind: &str,
        id: &str,
        mutation: &RightMutation,
    ) -> PipelineResult<Entry> {
        self.schema(kind)?;
        let _guard = self.lock(kind, id).await;

        let VersionedEntry { mut entry, version } = self.store.require_entry(kind, id).await?;
        if !mutation.apply_to(&mut entry) {
            debug!(kind, id, principal = %mutation.principal, "rights unchanged, write skipped");
            return Ok(entry);
        }
        self.validate(kind, &entry)?;
        self.store.save_entry(kind, &entry, Some(version)).await?;
        debug!(kind, id, principal = %mutation.principal, change = ?mutation.change, "rights updated");
        Ok(entry)
    }

    /// Replaces the annotations of an existing entry.
    pub async fn apply_annotations(
        &self,
        kind: &str,
        id: &str,
        annotations: Document,
    ) -> PipelineResult<Entry> {
        self.schema(kind)?;
        let _guard = self.lock(kind, id).await;

        let VersionedEntry { mut entry, version } = self.store.require_entry(kind, id).await?;
        entry.annotations = annotations;
        self.validate(kind, &entry)?;
        self.store.save_entry(kind, &entry, Some(version)).await?;
        debug!(kind, id, "annotations replaced");
        Ok(entry)
    }

    /// Deletes an entry. Fails with not found if it does not exist.
    pub async fn delete_entry(&self, kind: &str, id: &str) -> PipelineResult<()> {
        self.schema(kind)?;
        let _guard = self.lock(kind, id).await;

        self.store.require_entry(kind, id).await?;
        if !self.store.delete_entry(kind, id).await? {
            // Removed between the check and the delete.
            return Err(StorageError::NotFound(format!("{kind}/{id}")).into());
        }
        info!(kind, id, "entry deleted");
        Ok(())
    }

    fn schema(&self, kind: &str) -> PipelineResult<&KindSchema> {
        self.kinds
            .schema(kind)
            .ok_or_else(|| PipelineError::UnknownKind(kind.to_string()))
    }

    fn validate(&self, kind: &str, entry: &Entry) -> PipelineResult<()> {
        let Some(handler) = self.kinds.handler(kind) else {
            return Ok(());
        };
        handler.validate(entry).map_err(|reason| {
            debug!(kind, id = %entry.id, %reason, "write rejected by handler");
            PipelineError::Rejected {
                kind: kind.to_string(),
                id: entry.id.clone(),
                reason,
            }
        })
    }

    async fn lock(&self, kind: &str, id: &str) -> Option<MutexGuard<'_, ()>> {
        match &self.locks {
            Some(locks) => Some(locks.lock(kind, id).await),
            None => None,
        }
    }
}
