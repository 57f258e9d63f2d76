//! Zero-downtime mapping changes through alias indirection.
//!
//! Each kind is read and written through an alias named after the kind,
//! bound to exactly one physical index `<kind>_v<N>`. A mapping change
//! builds `<kind>_v<N+1>` next to it and moves the alias in one atomic
//! request:
//!
//! 1. create `<kind>_v<N+1>` with the new mapping
//! 2. reindex v<N> → v<N+1>; any per-document failure aborts
//! 3. swap the alias (remove v<N>, add v<N+1>) in a single request
//! 4. delete v<N>
//!
//! Failures in steps 1–2 leave the alias untouched. A failure from step 2
//! onward leaves v<N+1> behind; it is reported by [`IndexMigrator::inspect`]
//! as [`IndexState::Migrating`] and only removed on request with
//! [`IndexMigrator::remove_orphan`]. Two migrations of one kind must not run
//! at the same time; nothing here prevents it.

use crate::{AliasAction, IndexAdmin, MigrationStep, StorageError, StorageResult};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

/// Observed binding of a kind's alias.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexState {
    NoIndex,
    Stable { index: String, version: u32 },
    /// A next-version index exists beside the bound one: a migration is
    /// running or was interrupted.
    Migrating { from: String, to: String },
}

impl fmt::Display for IndexState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoIndex => f.write_str("no index"),
            Self::Stable { index, .. } => write!(f, "stable on {index}"),
            Self::Migrating { from, to } => write!(f, "migrating {from} -> {to}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationReport {
    pub kind: String,
    pub from: String,
    pub to: String,
    /// Documents copied into the new index.
    pub documents: u64,
}

/// Manages index versions and alias bindings.
#[derive(Clone)]
pub struct IndexMigrator {
    admin: Arc<dyn IndexAdmin>,
}

impl IndexMigrator {
    pub fn new(admin: Arc<dyn IndexAdmin>) -> Self {
        Self { admin }
    }

    /// Physical index name of a kind at a version.
    pub fn index_name(kind: &str, version: u32) -> String {
        format!("{kind}_v{version}")
    }

    /// Version from the trailing integer of an index name.
    pub fn parse_version(index: &str) -> Option<u32> {
        let digits = index.len() - index.trim_end_matches(|c: char| c.is_ascii_digit()).len();
        if digits == 0 {
            return None;
        }
        index[index.len() - digits..].parse().ok()
    }

    /// Creates `<kind>_v1` and binds the alias if the alias does not exist.
    /// Otherwise reports the current state without changing anything.
    pub async fn bootstrap(&self, kind: &str, mapping: &Value) -> StorageResult<IndexState> {
        if self.bound_index(kind).await?.is_some() {
            let state = self.inspect(kind).await?;
            info!(kind, %state, "bootstrap skipped, alias already bound");
            return Ok(state);
        }

        let index = Self::index_name(kind, 1);
        if self.admin.index_exists(&index).await? {
            warn!(kind, %index, "unbound first index found, binding it");
        } else {
            self.admin.create_index(&index, mapping).await?;
        }
        self.admin
            .update_aliases(&[AliasAction::Add {
                index: index.clone(),
                alias: kind.to_string(),
            }])
            .await?;
        info!(kind, %index, "bootstrapped");
        Ok(IndexState::Stable { index, version: 1 })
    }

    pub async fn inspect(&self, kind: &str) -> StorageResult<IndexState> {
        let Some((index, version)) = self.bound_index(kind).await? else {
            return Ok(IndexState::NoIndex);
        };
        // At the top of the version space there is no next index to find.
        let Some(next) = version.checked_add(1).map(|v| Self::index_name(kind, v)) else {
            return Ok(IndexState::Stable { index, version });
        };
        if self.admin.index_exists(&next).await? {
            return Ok(IndexState::Migrating { from: index, to: next });
        }
        Ok(IndexState::Stable { index, version })
    }

    /// Moves the kind to `mapping` via a new index version.
    pub async fn migrate_mapping(&self, kind: &str, mapping: &Value) -> StorageResult<MigrationReport> {
        let (from, version) = self
            .bound_index(kind)
            .await?
            .ok_or_else(|| StorageError::NotFound(format!("alias {kind}; bootstrap the kind first")))?;
        let fail = |step: MigrationStep, message: String| StorageError::MigrationFailure {
            kind: kind.to_string(),
            step,
            message,
        };
        let Some(next) = version.checked_add(1) else {
            return Err(fail(
                MigrationStep::Precheck,
                format!("{from} is the last version a kind can reach"),
            ));
        };
        let to = Self::index_name(kind, next);

        if self.admin.index_exists(&to).await? {
            return Err(fail(
                MigrationStep::Precheck,
                format!("{to} already exists; remove the orphan before migrating"),
            ));
        }

        info!(kind, %from, %to, "migration started");
        self.admin
            .create_index(&to, mapping)
            .await
            .map_err(|e| fail(MigrationStep::CreateIndex, e.to_string()))?;

        let report = self
            .admin
            .reindex(&from, &to)
            .await
            .map_err(|e| fail(MigrationStep::Reindex, format!("{e}; {to} left in place")))?;
        if !report.failures.is_empty() {
            return Err(fail(
                MigrationStep::Reindex,
                format!(
                    "{} of {} documents failed to copy ({}); {to} left in place",
                    report.failures.len(),
                    report.total,
                    report.failures.join("; ")
                ),
            ));
        }

        self.admin
            .update_aliases(&[
                AliasAction::Remove {
                    index: from.clone(),
                    alias: kind.to_string(),
                },
                AliasAction::Add {
                    index: to.clone(),
                    alias: kind.to_string(),
                },
            ])
            .await
            .map_err(|e| fail(MigrationStep::SwapAlias, format!("{e}; {to} left orphaned")))?;

        self.admin.delete_index(&from).await.map_err(|e| {
            fail(
                MigrationStep::DeleteOld,
                format!("{e}; alias already points at {to}, {from} must be removed by hand"),
            )
        })?;

        info!(kind, %from, %to, documents = report.created, "migration finished");
        Ok(MigrationReport {
            kind: kind.to_string(),
            from,
            to,
            documents: report.created,
        })
    }

    /// Deletes a leftover next-version index. Returns its name, or `None`
    /// when the kind is not in the migrating state.
    pub async fn remove_orphan(&self, kind: &str) -> StorageResult<Option<String>> {
        match self.inspect(kind).await? {
            IndexState::Migrating { to, .. } => {
                self.admin.delete_index(&to).await?;
                warn!(kind, index = %to, "removed orphaned index");
                Ok(Some(to))
            }
            _ => Ok(None),
        }
    }

    /// The single index bound to the kind's alias, with its version.
    async fn bound_index(&self, kind: &str) -> StorageResult<Option<(String, u32)>> {
        let mut bound = self.admin.get_alias(kind).await?;
        match bound.len() {
            0 => Ok(None),
            1 => {
                let index = bound.remove(0);
                let version = Self::parse_version(&index).ok_or_else(|| StorageError::Inconsistent {
                    alias: kind.to_string(),
                    indices: vec![index.clone()],
                })?;
                Ok(Some((index, version)))
            }
            _ => Err(StorageError::Inconsistent {
                alias: kind.to_string(),
                indices: bound,
            }),
        }
    }
}
