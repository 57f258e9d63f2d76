//! Backend capability traits.
//!
//! Index arguments may name either a physical index or an alias bound to
//! one; the read and write paths always go through the kind's alias.

use crate::StorageResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use warrant_query::Query;
use warrant_types::VersionToken;

/// A stored document together with the token required to overwrite it.
#[derive(Debug, Clone, PartialEq)]
pub struct VersionedDocument {
    pub id: String,
    pub source: Value,
    pub version: VersionToken,
}

/// Get, put and delete single documents.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Returns `None` if the document does not exist.
    async fn get(&self, index: &str, id: &str) -> StorageResult<Option<VersionedDocument>>;

    /// Writes a document. With `expected` set the write only succeeds if
    /// the stored version still matches, otherwise it fails with
    /// [`StorageError::Conflict`](crate::StorageError::Conflict). Without
    /// it the write is unconditional.
    async fn put(
        &self,
        index: &str,
        id: &str,
        source: &Value,
        expected: Option<VersionToken>,
    ) -> StorageResult<VersionToken>;

    /// Writes a document only if no document with that id exists yet.
    /// An existing document fails the write with
    /// [`StorageError::Conflict`](crate::StorageError::Conflict).
    async fn create(&self, index: &str, id: &str, source: &Value) -> StorageResult<VersionToken>;

    /// Returns true if a document was deleted.
    async fn delete(&self, index: &str, id: &str) -> StorageResult<bool>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

/// One sort criterion. Documents without a value sort last in either order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub field: String,
    pub order: SortOrder,
}

impl SortKey {
    pub fn new(field: impl Into<String>, order: SortOrder) -> Self {
        Self {
            field: field.into(),
            order,
        }
    }

    pub fn to_dsl(&self) -> Value {
        json!({
            self.field.as_str(): {
                "order": self.order.as_str(),
                "missing": "_last",
                "unmapped_type": "keyword"
            }
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub query: Query,
    pub sort: Vec<SortKey>,
    pub from: usize,
    pub size: usize,
    /// Sort values of the last hit already seen; results start strictly
    /// after it.
    pub search_after: Option<Vec<Value>>,
}

impl SearchRequest {
    pub fn new(query: Query, size: usize) -> Self {
        Self {
            query,
            sort: Vec::new(),
            from: 0,
            size,
            search_after: None,
        }
    }

    /// The request body for `_search`.
    pub fn to_body(&self) -> Value {
        let mut body = json!({
            "query": self.query.to_dsl(),
            "from": self.from,
            "size": self.size,
            "track_total_hits": true,
        });
        if !self.sort.is_empty() {
            body["sort"] = Value::Array(self.sort.iter().map(SortKey::to_dsl).collect());
        }
        if let Some(after) = &self.search_after {
            body["search_after"] = Value::Array(after.clone());
        }
        body
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Hit {
    pub id: String,
    pub source: Value,
    /// Sort values, usable as the next `search_after`.
    pub sort: Vec<Value>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchHits {
    /// Every document matching the query, independent of paging.
    pub total: u64,
    pub hits: Vec<Hit>,
}

/// One bucket of a terms aggregation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermBucket {
    pub key: Value,
    pub count: u64,
}

/// Query execution.
#[async_trait]
pub trait SearchEngine: Send + Sync {
    async fn search(&self, index: &str, request: &SearchRequest) -> StorageResult<SearchHits>;

    async fn count(&self, index: &str, query: &Query) -> StorageResult<u64>;

    /// Most frequent values of `field` among matching documents, by
    /// descending count.
    async fn terms(
        &self,
        index: &str,
        query: &Query,
        field: &str,
        size: usize,
    ) -> StorageResult<Vec<TermBucket>>;
}

/// Outcome of a server-side reindex.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReindexReport {
    pub total: u64,
    pub created: u64,
    /// One message per document that failed to copy.
    pub failures: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AliasAction {
    Add { index: String, alias: String },
    Remove { index: String, alias: String },
}

impl AliasAction {
    pub fn to_dsl(&self) -> Value {
        match self {
            Self::Add { index, alias } => json!({ "add": { "index": index, "alias": alias } }),
            Self::Remove { index, alias } => {
                json!({ "remove": { "index": index, "alias": alias } })
            }
        }
    }
}

/// Index lifecycle and alias management.
#[async_trait]
pub trait IndexAdmin: Send + Sync {
    async fn index_exists(&self, index: &str) -> StorageResult<bool>;

    async fn create_index(&self, index: &str, mapping: &Value) -> StorageResult<()>;

    async fn delete_index(&self, index: &str) -> StorageResult<()>;

    /// Copies every document of `source` into `dest`, which must exist.
    async fn reindex(&self, source: &str, dest: &str) -> StorageResult<ReindexReport>;

    /// Indices the alias is bound to; empty when the alias does not exist.
    async fn get_alias(&self, alias: &str) -> StorageResult<Vec<String>>;

    /// Applies all actions atomically.
    async fn update_aliases(&self, actions: &[AliasAction]) -> StorageResult<()>;

    /// Number of documents in an index or alias.
    async fn doc_count(&self, index: &str) -> StorageResult<u64>;
}
