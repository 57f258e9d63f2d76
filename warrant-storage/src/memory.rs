//! In-process backend.
//!
//! Evaluates [`Query`] trees with [`Query::matches`] and mimics the engine's
//! observable behaviour: per-index sequence numbers for conditional writes,
//! aliases resolved on every call, `missing: _last` sorting and
//! `search_after` paging. Faults can be armed to exercise failure paths.

use crate::backend::{
    AliasAction, DocumentStore, Hit, IndexAdmin, ReindexReport, SearchEngine, SearchHits,
    SearchRequest, SortKey, SortOrder, TermBucket, VersionedDocument,
};
use crate::{StorageError, StorageResult};
use async_trait::async_trait;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;
use warrant_query::{Query, field_values};
use warrant_types::VersionToken;

const PRIMARY_TERM: u64 = 1;

/// An operation that can be made to fail once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultPoint {
    CreateIndex,
    /// The reindex call itself errors.
    Reindex,
    /// The reindex succeeds but reports one failed document.
    ReindexDocument,
    UpdateAliases,
    DeleteIndex,
    Put,
    Search,
}

#[derive(Default)]
struct MemIndex {
    docs: BTreeMap<String, StoredDoc>,
    next_seq: u64,
    mapping: Value,
}

struct StoredDoc {
    source: Value,
    seq_no: u64,
}

#[derive(Default)]
struct State {
    indices: BTreeMap<String, MemIndex>,
    aliases: BTreeMap<String, BTreeSet<String>>,
}

impl State {
    /// Indices addressed by a name: the index itself, or an alias's targets.
    fn resolve(&self, name: &str) -> StorageResult<Vec<String>> {
        if self.indices.contains_key(name) {
            return Ok(vec![name.to_string()]);
        }
        match self.aliases.get(name) {
            Some(bound) if !bound.is_empty() => Ok(bound.iter().cloned().collect()),
            _ => Err(StorageError::NotFound(format!("index {name}"))),
        }
    }

    /// The single index a write or get goes to.
    fn resolve_one(&self, name: &str) -> StorageResult<String> {
        let mut indices = self.resolve(name)?;
        if indices.len() > 1 {
            return Err(StorageError::BadRequest(format!(
                "alias {name} points to more than one index"
            )));
        }
        Ok(indices.remove(0))
    }

    fn matching(&self, name: &str, query: &Query) -> StorageResult<Vec<(String, &Value)>> {
        let mut out = Vec::new();
        for index in self.resolve(name)? {
            if let Some(idx) = self.indices.get(&index) {
                for (id, doc) in &idx.docs {
                    if query.matches(&doc.source) {
                        out.push((id.clone(), &doc.source));
                    }
                }
            }
        }
        Ok(out)
    }
}

/// Backend held entirely in memory.
#[derive(Default)]
pub struct MemoryBackend {
    state: RwLock<State>,
    faults: Mutex<HashSet<FaultPoint>>,
    search_delay: Mutex<Option<Duration>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next call at `point` fail.
    pub fn inject_fault(&self, point: FaultPoint) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.insert(point);
        }
    }

    /// Delays every search, count and aggregation.
    pub fn set_search_delay(&self, delay: Option<Duration>) {
        if let Ok(mut slot) = self.search_delay.lock() {
            *slot = delay;
        }
    }

    /// Names of all physical indices.
    pub async fn indices(&self) -> Vec<String> {
        self.state.read().await.indices.keys().cloned().collect()
    }

    /// The mapping an index was created with.
    pub async fn mapping(&self, index: &str) -> Option<Value> {
        self.state
            .read()
            .await
            .indices
            .get(index)
            .map(|idx| idx.mapping.clone())
    }

    fn take_fault(&self, point: FaultPoint) -> bool {
        self.faults
            .lock()
            .map(|mut faults| faults.remove(&point))
            .unwrap_or(false)
    }

    fn check_fault(&self, point: FaultPoint) -> StorageResult<()> {
        if self.take_fault(point) {
            debug!(?point, "injected fault");
            return Err(StorageError::Backend(format!("injected fault at {point:?}")));
        }
        Ok(())
    }

    async fn delay(&self) {
        let delay = self.search_delay.lock().ok().and_then(|d| *d);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl DocumentStore for MemoryBackend {
    async fn get(&self, index: &str, id: &str) -> StorageResult<Option<VersionedDocument>> {
        let state = self.state.read().await;
        let index = state.resolve_one(index)?;
        Ok(state.indices.get(&index).and_then(|idx| idx.docs.get(id)).map(|doc| {
            VersionedDocument {
                id: id.to_string(),
                source: doc.source.clone(),
                version: VersionToken::new(doc.seq_no, PRIMARY_TERM),
            }
        }))
    }

    async fn put(
        &self,
        index: &str,
        id: &str,
        source: &Value,
        expected: Option<VersionToken>,
    ) -> StorageResult<VersionToken> {
        self.check_fault(FaultPoint::Put)?;
        let mut state = self.state.write().await;
        let name = state.resolve_one(index)?;
        let idx = state
            .indices
            .get_mut(&name)
            .ok_or_else(|| StorageError::NotFound(format!("index {name}")))?;

        if let Some(expected) = expected {
            let current = idx
                .docs
                .get(id)
                .map(|doc| VersionToken::new(doc.seq_no, PRIMARY_TERM));
            if current != Some(expected) {
                return Err(StorageError::Conflict {
                    index: name,
                    id: id.to_string(),
                });
            }
        }

        let seq_no = idx.next_seq;
        idx.next_seq += 1;
        idx.docs.insert(
            id.to_string(),
            StoredDoc {
                source: source.clone(),
                seq_no,
            },
        );
        Ok(VersionToken::new(seq_no, PRIMARY_TERM))
    }

    async fn create(&self, index: &str, id: &str, source: &Value) -> StorageResult<VersionToken> {
        self.check_fault(FaultPoint::Put)?;
        let mut state = self.state.write().await;
        let name = state.resolve_one(index)?;
        let idx = state
            .indices
            .get_mut(&name)
            .ok_or_else(|| StorageError::NotFound(format!("index {name}")))?;
        if idx.docs.contains_key(id) {
            return Err(StorageError::Conflict {
                index: name,
                id: id.to_string(),
            });
        }
        let seq_no = idx.next_seq;
        idx.next_seq += 1;
        idx.docs.insert(
            id.to_string(),
            StoredDoc {
                source: source.clone(),
                seq_no,
            },
        );
        Ok(VersionToken::new(seq_no, PRIMARY_TERM))
    }

    async fn delete(&self, index: &str, id: &str) -> StorageResult<bool> {
        let mut state = self.state.write().await;
        let name = state.resolve_one(index)?;
        Ok(state
            .indices
            .get_mut(&name)
            .is_some_and(|idx| idx.docs.remove(id).is_some()))
    }
}

#[async_trait]
impl SearchEngine for MemoryBackend {
    async fn search(&self, index: &str, request: &SearchRequest) -> StorageResult<SearchHits> {
        self.check_fault(FaultPoint::Search)?;
        self.delay().await;
        let state = self.state.read().await;
        let matched = state.matching(index, &request.query)?;
        let total = matched.len() as u64;

        let mut hits: Vec<Hit> = matched
            .into_iter()
            .map(|(id, source)| Hit {
                sort: sort_values(source, &request.sort),
                id,
                source: source.clone(),
            })
            .collect();
        hits.sort_by(|a, b| compare_sort(&a.sort, &b.sort, &request.sort));

        if let Some(after) = &request.search_after {
            hits.retain(|hit| compare_sort(&hit.sort, after, &request.sort) == Ordering::Greater);
        }

        let hits = hits.into_iter().skip(request.from).take(request.size).collect();
        Ok(SearchHits { total, hits })
    }

    async fn count(&self, index: &str, query: &Query) -> StorageResult<u64> {
        self.delay().await;
        let state = self.state.read().await;
        Ok(state.matching(index, query)?.len() as u64)
    }

    async fn terms(
        &self,
        index: &str,
        query: &Query,
        field: &str,
        size: usize,
    ) -> StorageResult<Vec<TermBucket>> {
        self.delay().await;
        let state = self.state.read().await;
        let mut counts: Vec<(Value, u64)> = Vec::new();
        for (_, source) in state.matching(index, query)? {
            // A document counts once per distinct value.
            let mut seen: Vec<&Value> = Vec::new();
            for value in field_values(source, field) {
                if seen.contains(&value) {
                    continue;
                }
                seen.push(value);
                match counts.iter_mut().find(|(key, _)| key == value) {
                    Some((_, n)) => *n += 1,
                    None => counts.push((value.clone(), 1)),
                }
            }
        }
        counts.sort_by(|(ka, na), (kb, nb)| nb.cmp(na).then_with(|| compare_values(ka, kb)));
        Ok(counts
            .into_iter()
            .take(size)
            .map(|(key, count)| TermBucket { key, count })
            .collect())
    }
}

#[async_trait]
impl IndexAdmin for MemoryBackend {
    async fn index_exists(&self, index: &str) -> StorageResult<bool> {
        Ok(self.state.read().await.indices.contains_key(index))
    }

    async fn create_index(&self, index: &str, mapping: &Value) -> StorageResult<()> {
        self.check_fault(FaultPoint::CreateIndex)?;
        let mut state = self.state.write().await;
        if state.indices.contains_key(index) || state.aliases.contains_key(index) {
            return Err(StorageError::BadRequest(format!("index {index} already exists")));
        }
        state.indices.insert(
            index.to_string(),
            MemIndex {
                mapping: mapping.clone(),
                ..MemIndex::default()
            },
        );
        Ok(())
    }

    async fn delete_index(&self, index: &str) -> StorageResult<()> {
        self.check_fault(FaultPoint::DeleteIndex)?;
        let mut state = self.state.write().await;
        if state.indices.remove(index).is_none() {
            return Err(StorageError::NotFound(format!("index {index}")));
        }
        for bound in state.aliases.values_mut() {
            bound.remove(index);
        }
        state.aliases.retain(|_, bound| !bound.is_empty());
        Ok(())
    }

    async fn reindex(&self, source: &str, dest: &str) -> StorageResult<ReindexReport> {
        self.check_fault(FaultPoint::Reindex)?;
        let fail_one = self.take_fault(FaultPoint::ReindexDocument);

        let mut state = self.state.write().await;
        let dest = state.resolve_one(dest)?;
        let mut copied = Vec::new();
        for index in state.resolve(source)? {
            if let Some(idx) = state.indices.get(&index) {
                copied.extend(idx.docs.iter().map(|(id, doc)| (id.clone(), doc.source.clone())));
            }
        }

        let target = state
            .indices
            .get_mut(&dest)
            .ok_or_else(|| StorageError::NotFound(format!("index {dest}")))?;
        let mut report = ReindexReport {
            total: copied.len() as u64,
            ..ReindexReport::default()
        };
        for (i, (id, source)) in copied.into_iter().enumerate() {
            if fail_one && i == 0 {
                report.failures.push(format!("{id}: mapper_parsing_exception"));
                continue;
            }
            let seq_no = target.next_seq;
            target.next_seq += 1;
            target.docs.insert(id, StoredDoc { source, seq_no });
            report.created += 1;
        }
        Ok(report)
    }

    async fn get_alias(&self, alias: &str) -> StorageResult<Vec<String>> {
        let state = self.state.read().await;
        Ok(state
            .aliases
            .get(alias)
            .map(|bound| bound.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn update_aliases(&self, actions: &[AliasAction]) -> StorageResult<()> {
        self.check_fault(FaultPoint::UpdateAliases)?;
        let mut state = self.state.write().await;

        // Validate everything before touching anything.
        for action in actions {
            let (AliasAction::Add { index, .. } | AliasAction::Remove { index, .. }) = action;
            if !state.indices.contains_key(index) {
                return Err(StorageError::NotFound(format!("index {index}")));
            }
            if let AliasAction::Add { alias, .. } = action {
                if state.indices.contains_key(alias) {
                    return Err(StorageError::BadRequest(format!(
                        "an index named {alias} already exists"
                    )));
                }
            }
        }

        for action in actions {
            match action {
                AliasAction::Add { index, alias } => {
                    state.aliases.entry(alias.clone()).or_default().insert(index.clone());
                }
                AliasAction::Remove { index, alias } => {
                    if let Some(bound) = state.aliases.get_mut(alias) {
                        bound.remove(index);
                    }
                }
            }
        }
        state.aliases.retain(|_, bound| !bound.is_empty());
        Ok(())
    }

    async fn doc_count(&self, index: &str) -> StorageResult<u64> {
        let state = self.state.read().await;
        Ok(state.matching(index, &Query::MatchAll)?.len() as u64)
    }
}

/// The value a document sorts by for each key: the smallest leaf for
/// ascending order, the largest for descending, null when missing.
fn sort_values(source: &Value, keys: &[SortKey]) -> Vec<Value> {
    keys.iter()
        .map(|key| {
            let leaves = field_values(source, &key.field);
            let pick = match key.order {
                SortOrder::Asc => leaves.into_iter().min_by(|a, b| compare_values(a, b)),
                SortOrder::Desc => leaves.into_iter().max_by(|a, b| compare_values(a, b)),
            };
            pick.cloned().unwrap_or(Value::Null)
        })
        .collect()
}

fn compare_sort(a: &[Value], b: &[Value], keys: &[SortKey]) -> Ordering {
    for (i, key) in keys.iter().enumerate() {
        let (x, y) = (a.get(i).unwrap_or(&Value::Null), b.get(i).unwrap_or(&Value::Null));
        let ord = match (x.is_null(), y.is_null()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => match key.order {
                SortOrder::Asc => compare_values(x, y),
                SortOrder::Desc => compare_values(y, x),
            },
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.total_cmp(&y)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}
