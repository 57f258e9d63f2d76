//! Index administration for every configured kind.

use anyhow::{Context, Result, anyhow};
use serde_json::Value;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::info;
use warrant_model::KindSchema;
use warrant_storage::{IndexAdmin, IndexMigrator, IndexState, MigrationReport};

/// What `status` reports for one kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KindStatus {
    pub kind: String,
    pub state: IndexState,
    /// Documents behind the alias; `None` when nothing is bound.
    pub documents: Option<u64>,
}

pub struct Admin {
    admin: Arc<dyn IndexAdmin>,
    migrator: IndexMigrator,
    kinds: Vec<KindSchema>,
}

impl Admin {
    pub fn new(admin: Arc<dyn IndexAdmin>, kinds: Vec<KindSchema>) -> Self {
        Self {
            migrator: IndexMigrator::new(admin.clone()),
            admin,
            kinds,
        }
    }

    /// Creates the first index and alias of every kind that has none.
    pub async fn bootstrap(&self) -> Result<Vec<(String, IndexState)>> {
        let mut states = Vec::with_capacity(self.kinds.len());
        for schema in &self.kinds {
            let state = self
                .migrator
                .bootstrap(&schema.kind, &schema.mapping())
                .await
                .with_context(|| format!("bootstrap of {} failed", schema.kind))?;
            states.push((schema.kind.clone(), state));
        }
        Ok(states)
    }

    pub async fn status(&self) -> Result<Vec<KindStatus>> {
        let mut out = Vec::with_capacity(self.kinds.len());
        for schema in &self.kinds {
            let state = self.migrator.inspect(&schema.kind).await?;
            let documents = match state {
                IndexState::NoIndex => None,
                _ => Some(self.admin.doc_count(&schema.kind).await?),
            };
            out.push(KindStatus {
                kind: schema.kind.clone(),
                state,
                documents,
            });
        }
        Ok(out)
    }

    /// Moves a kind to a new mapping; the kind's configured mapping when
    /// none is given.
    pub async fn migrate(&self, kind: &str, mapping: Option<Value>) -> Result<MigrationReport> {
        let schema = self.schema(kind)?;
        let mapping = mapping.unwrap_or_else(|| schema.mapping());
        let report = self.migrator.migrate_mapping(kind, &mapping).await?;
        info!(kind, from = %report.from, to = %report.to, documents = report.documents, "migrated");
        Ok(report)
    }

    pub async fn remove_orphan(&self, kind: &str) -> Result<Option<String>> {
        self.schema(kind)?;
        Ok(self.migrator.remove_orphan(kind).await?)
    }

    fn schema(&self, kind: &str) -> Result<&KindSchema> {
        self.kinds
            .iter()
            .find(|k| k.kind == kind)
            .ok_or_else(|| anyhow!("kind '{kind}' is not configured"))
    }
}

/// Reads an index mapping from a JSON file.
pub fn load_mapping<P: AsRef<Path>>(path: P) -> Result<Value> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read mapping {}", path.display()))?;
    let mapping: Value = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse mapping {}", path.display()))?;
    if !mapping.is_object() {
        return Err(anyhow!("mapping {} must be a JSON object", path.display()));
    }
    Ok(mapping)
}
