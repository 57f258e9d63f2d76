//! Bounded, totally ordered reads.
//!
//! Every read sorts by the requested field and then by resource id, so the
//! order is total and two pages never overlap. Two modes share that order:
//!
//! - offset: skip N, take M, limited to the backend's result window
//! - cursor: take M strictly after the last (sort value, id) seen, at any depth
//!
//! Concatenating offset pages yields exactly the sequence a cursor
//! traversal yields.

use crate::backend::{SearchRequest, SortKey, SortOrder, TermBucket};
use crate::{DocumentStore, SearchEngine, StorageError, StorageResult};
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use warrant_model::{Entry, EntryHandler};
use warrant_query::Query;

/// Read-side limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Largest `offset + limit` an offset read may reach.
    pub max_result_window: usize,
    pub max_page_size: usize,
    /// Page size when the caller gives none.
    pub default_page_size: usize,
    /// Upper bound on every backend read.
    pub read_timeout_ms: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_result_window: 10_000,
            max_page_size: 1_000,
            default_page_size: 50,
            read_timeout_ms: 5_000,
        }
    }
}

impl SearchConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

/// The caller-chosen ordering. Ties always break on ascending id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    /// Document path (e.g. `features.title`).
    pub field: String,
    pub order: SortOrder,
}

impl Sort {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            order: SortOrder::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            order: SortOrder::Desc,
        }
    }

    /// Sort by a feature, e.g. `Sort::feature("title", SortOrder::Asc)`.
    pub fn feature(name: &str, order: SortOrder) -> Self {
        Self {
            field: format!("features.{name}"),
            order,
        }
    }

    /// Parses a request parameter: `title` sorts ascending by the feature,
    /// `-title` descending. `id`, `creator` and full `features.`/`annotations.`
    /// paths are taken as document paths.
    pub fn from_param(param: &str) -> StorageResult<Self> {
        let (name, order) = match param.strip_prefix('-') {
            Some(rest) => (rest, SortOrder::Desc),
            None => (param, SortOrder::Asc),
        };
        if name.is_empty() {
            return Err(StorageError::BadRequest("empty sort field".into()));
        }
        let field = if matches!(name, "id" | "creator")
            || name.starts_with("features.")
            || name.starts_with("annotations.")
        {
            name.to_string()
        } else {
            format!("features.{name}")
        };
        Ok(Self { field, order })
    }

    fn keys(&self) -> Vec<SortKey> {
        let mut keys = vec![SortKey::new(self.field.clone(), self.order)];
        if self.field != "id" {
            keys.push(SortKey::new("id", SortOrder::Asc));
        }
        keys
    }
}

/// Position after the last entry of a page: its sort values.
#[derive(Debug, Clone, PartialEq)]
pub struct Cursor(Vec<Value>);

impl Cursor {
    pub fn new(values: Vec<Value>) -> Self {
        Self(values)
    }

    pub fn values(&self) -> &[Value] {
        &self.0
    }

    /// Opaque, URL-safe form.
    pub fn encode(&self) -> String {
        URL_SAFE_NO_PAD.encode(Value::Array(self.0.clone()).to_string())
    }

    pub fn decode(s: &str) -> StorageResult<Self> {
        let bad = || StorageError::BadRequest(format!("malformed cursor {s:?}"));
        let bytes = URL_SAFE_NO_PAD.decode(s).map_err(|_| bad())?;
        match serde_json::from_slice::<Value>(&bytes).map_err(|_| bad())? {
            Value::Array(values) if !values.is_empty() => Ok(Self(values)),
            _ => Err(bad()),
        }
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PageRequest {
    Offset { offset: usize, limit: usize },
    /// `cursor: None` starts a traversal from the beginning.
    After { cursor: Option<Cursor>, limit: usize },
}

impl PageRequest {
    pub fn limit(&self) -> usize {
        match self {
            Self::Offset { limit, .. } | Self::After { limit, .. } => *limit,
        }
    }

    /// Builds a request from raw query parameters.
    ///
    /// `after` selects cursor mode (an empty value starts at the
    /// beginning) and cannot be combined with `offset`.
    pub fn from_params(
        offset: Option<&str>,
        limit: Option<&str>,
        after: Option<&str>,
        config: &SearchConfig,
    ) -> StorageResult<Self> {
        let limit = match limit {
            Some(raw) => parse_count("limit", raw)?,
            None => config.default_page_size,
        };
        match (offset, after) {
            (Some(_), Some(_)) => Err(StorageError::BadRequest(
                "offset and cursor cannot be combined".into(),
            )),
            (_, Some(raw)) => {
                let cursor = match raw.trim() {
                    "" => None,
                    token => Some(Cursor::decode(token)?),
                };
                Ok(Self::After { cursor, limit })
            }
            (Some(raw), None) => Ok(Self::Offset {
                offset: parse_count("offset", raw)?,
                limit,
            }),
            (None, None) => Ok(Self::Offset { offset: 0, limit }),
        }
    }
}

fn parse_count(name: &str, raw: &str) -> StorageResult<usize> {
    raw.trim()
        .parse()
        .map_err(|_| StorageError::BadRequest(format!("{name} must be a non-negative integer, got {raw:?}")))
}

/// One page of entries.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub entries: Vec<Entry>,
    /// Entries matching the filter, across all pages.
    pub total: u64,
    /// Position of the last entry; `None` for an empty page.
    pub next_cursor: Option<Cursor>,
}

/// Runs reads for all kinds against a search engine.
pub struct Paginator {
    engine: Arc<dyn SearchEngine>,
    documents: Arc<dyn DocumentStore>,
    config: SearchConfig,
    handlers: HashMap<String, Arc<dyn EntryHandler>>,
}

impl Paginator {
    pub fn new(
        engine: Arc<dyn SearchEngine>,
        documents: Arc<dyn DocumentStore>,
        config: SearchConfig,
    ) -> Self {
        Self {
            engine,
            documents,
            config,
            handlers: HashMap::new(),
        }
    }

    /// Registers the post-load hook for a kind.
    #[must_use]
    pub fn with_handler(mut self, kind: impl Into<String>, handler: Arc<dyn EntryHandler>) -> Self {
        self.handlers.insert(kind.into(), handler);
        self
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Returns one page of entries of `kind` matching `filter`.
    pub async fn paginate(
        &self,
        kind: &str,
        filter: &Query,
        sort: &Sort,
        request: &PageRequest,
    ) -> StorageResult<Page> {
        let limit = request.limit();
        if limit == 0 || limit > self.config.max_page_size {
            return Err(StorageError::BadRequest(format!(
                "limit must be between 1 and {}, got {limit}",
                self.config.max_page_size
            )));
        }

        let keys = sort.keys();
        let mut search = SearchRequest::new(filter.clone(), limit);
        match request {
            PageRequest::Offset { offset, .. } => {
                let end = offset.saturating_add(limit);
                if end > self.config.max_result_window {
                    return Err(StorageError::BadRequest(format!(
                        "offset + limit ({end}) exceeds the result window of {}; use a cursor",
                        self.config.max_result_window
                    )));
                }
                search.from = *offset;
            }
            PageRequest::After { cursor, .. } => {
                if let Some(cursor) = cursor {
                    if cursor.values().len() != keys.len() {
                        return Err(StorageError::BadRequest(
                            "cursor does not match the requested sort".into(),
                        ));
                    }
                    search.search_after = Some(cursor.values().to_vec());
                }
            }
        }
        search.sort = keys;

        let hits = self.bounded(kind, self.engine.search(kind, &search)).await?;
        debug!(kind, total = hits.total, returned = hits.hits.len(), "page fetched");

        let next_cursor = hits.hits.last().map(|hit| Cursor::new(hit.sort.clone()));
        let entries = hits
            .hits
            .into_iter()
            .map(|hit| self.load(kind, hit.source))
            .collect::<StorageResult<Vec<_>>>()?;
        Ok(Page {
            entries,
            total: hits.total,
            next_cursor,
        })
    }

    /// Reads one entry, distinguishing an absent id from one the filter
    /// hides.
    pub async fn fetch_entry(&self, kind: &str, id: &str, filter: &Query) -> StorageResult<Entry> {
        let doc = self
            .bounded(kind, self.documents.get(kind, id))
            .await?
            .ok_or_else(|| StorageError::NotFound(format!("{kind}/{id}")))?;

        let visible = Query::all(vec![Query::term("id", id), filter.clone()]);
        if self.bounded(kind, self.engine.count(kind, &visible)).await? == 0 {
            return Err(StorageError::AccessDenied(format!("{kind}/{id}")));
        }
        self.load(kind, doc.source)
    }

    /// Value counts for `field` over entries matching `filter`.
    pub async fn facets(
        &self,
        kind: &str,
        filter: &Query,
        field: &str,
        size: usize,
    ) -> StorageResult<Vec<TermBucket>> {
        if size == 0 || size > self.config.max_page_size {
            return Err(StorageError::BadRequest(format!(
                "facet size must be between 1 and {}",
                self.config.max_page_size
            )));
        }
        self.bounded(kind, self.engine.terms(kind, filter, field, size))
            .await
    }

    /// Number of entries matching `filter`.
    pub async fn count(&self, kind: &str, filter: &Query) -> StorageResult<u64> {
        self.bounded(kind, self.engine.count(kind, filter)).await
    }

    fn load(&self, kind: &str, source: Value) -> StorageResult<Entry> {
        let mut entry = Entry::from_document(source)?;
        if let Some(handler) = self.handlers.get(kind) {
            handler.on_after_load(&mut entry);
        }
        Ok(entry)
    }

    async fn bounded<T>(
        &self,
        kind: &str,
        fut: impl Future<Output = StorageResult<T>>,
    ) -> StorageResult<T> {
        let limit = self.config.read_timeout();
        match tokio::time::timeout(limit, fut).await {
            Ok(result) => result,
            Err(_) => {
                warn!(kind, ?limit, "read timed out");
                Err(StorageError::Timeout(format!("read on {kind} exceeded {limit:?}")))
            }
        }
    }
}
