//! Elasticsearch REST backend.
//!
//! Speaks the plain HTTP API with `reqwest`. Transient failures (connect
//! errors, timeouts, 429/502/503/504) are retried with capped exponential
//! backoff; whatever still fails surfaces as a final [`StorageError`].

use crate::backend::{
    AliasAction, DocumentStore, Hit, IndexAdmin, ReindexReport, SearchEngine, SearchHits,
    SearchRequest, TermBucket, VersionedDocument,
};
use crate::{StorageError, StorageResult};
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, warn};
use warrant_query::Query;
use warrant_types::VersionToken;

/// Connection settings for the Elasticsearch cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ElasticConfig {
    /// Base URL of the cluster (e.g. `http://localhost:9200`).
    pub url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Per-request timeout.
    pub request_timeout_ms: u64,
    /// Retries after the first attempt for transient failures.
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
    pub retry_max_delay_ms: u64,
    /// `refresh` parameter sent with writes (`"false"`, `"true"`, `"wait_for"`).
    pub refresh: String,
    /// How often a running reindex task is polled.
    pub task_poll_interval_ms: u64,
    /// Longest a reindex task may run before the copy is reported as
    /// timed out. The task itself keeps running on the cluster.
    pub reindex_timeout_ms: u64,
}

impl Default for ElasticConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:9200".to_string(),
            username: None,
            password: None,
            request_timeout_ms: 30_000,
            max_retries: 3,
            retry_base_delay_ms: 200,
            retry_max_delay_ms: 5_000,
            refresh: "wait_for".to_string(),
            task_poll_interval_ms: 1_000,
            reindex_timeout_ms: 3_600_000,
        }
    }
}

#[derive(Debug, Deserialize)]
struct GetResponse {
    #[serde(rename = "_id")]
    id: String,
    #[serde(default)]
    found: bool,
    #[serde(rename = "_seq_no")]
    seq_no: Option<u64>,
    #[serde(rename = "_primary_term")]
    primary_term: Option<u64>,
    #[serde(rename = "_source")]
    source: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct WriteResponse {
    #[serde(rename = "_seq_no")]
    seq_no: u64,
    #[serde(rename = "_primary_term")]
    primary_term: u64,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    hits: HitsEnvelope,
    #[serde(default)]
    aggregations: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct HitsEnvelope {
    total: TotalHits,
    #[serde(default)]
    hits: Vec<RawHit>,
}

#[derive(Debug, Deserialize)]
struct TotalHits {
    value: u64,
}

#[derive(Debug, Deserialize)]
struct RawHit {
    #[serde(rename = "_id")]
    id: String,
    #[serde(rename = "_source", default)]
    source: Value,
    #[serde(default)]
    sort: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct CountResponse {
    count: u64,
}

#[derive(Debug, Deserialize)]
struct RawBucket {
    key: Value,
    doc_count: u64,
}

#[derive(Debug, Deserialize)]
struct TaskStarted {
    task: String,
}

#[derive(Debug, Deserialize)]
struct TaskStatus {
    #[serde(default)]
    completed: bool,
    #[serde(default)]
    response: Option<Value>,
    #[serde(default)]
    error: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct RawReindex {
    #[serde(default)]
    total: u64,
    #[serde(default)]
    created: u64,
    #[serde(default)]
    failures: Vec<Value>,
}

/// Backend talking to an Elasticsearch cluster.
pub struct ElasticBackend {
    config: ElasticConfig,
    client: Client,
}

impl ElasticBackend {
    pub fn new(config: ElasticConfig) -> StorageResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|e| StorageError::Backend(format!("failed to create HTTP client: {e}")))?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &ElasticConfig {
        &self.config
    }

    fn url(&self, segments: &[&str]) -> String {
        let mut url = self.config.url.trim_end_matches('/').to_string();
        for segment in segments {
            url.push('/');
            url.push_str(&urlencoding::encode(segment));
        }
        url
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.config.username {
            Some(user) => builder.basic_auth(user, self.config.password.as_ref()),
            None => builder,
        }
    }

    /// Sends a request, retrying transient failures.
    async fn send(&self, build: impl Fn() -> RequestBuilder) -> StorageResult<Response> {
        self.send_retrying(build, true).await
    }

    /// Like [`send`](Self::send) but a timed-out request is not resent: the
    /// cluster may already be acting on it.
    async fn send_once_on_timeout(&self, build: impl Fn() -> RequestBuilder) -> StorageResult<Response> {
        self.send_retrying(build, false).await
    }

    async fn send_retrying(
        &self,
        build: impl Fn() -> RequestBuilder,
        retry_timeouts: bool,
    ) -> StorageResult<Response> {
        let max = self.config.max_retries;
        let mut attempt = 0;
        loop {
            match build().send().await {
                Ok(resp) => {
                    let status = resp.status();
                    if attempt < max && should_retry_status(status) {
                        let delay = self.backoff(attempt);
                        debug!("backend HTTP {status}, retry {}/{max} after {delay:?}", attempt + 1);
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                        continue;
                    }
                    return Ok(resp);
                }
                Err(e) => {
                    let transient = e.is_connect() || (retry_timeouts && e.is_timeout());
                    if attempt < max && transient {
                        let delay = self.backoff(attempt);
                        debug!("backend transport error, retry {}/{max} after {delay:?}: {e}", attempt + 1);
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                        continue;
                    }
                    if e.is_timeout() {
                        return Err(StorageError::Timeout(e.to_string()));
                    }
                    return Err(StorageError::Backend(e.to_string()));
                }
            }
        }
    }

    fn backoff(&self, attempt: u32) -> Duration {
        exponential_backoff(
            self.config.retry_base_delay_ms,
            self.config.retry_max_delay_ms,
            attempt,
        )
    }

    /// Polls a background task until it completes and returns its
    /// response body.
    async fn await_task(&self, task: &str) -> StorageResult<Value> {
        let url = self.url(&["_tasks", task]);
        let poll = Duration::from_millis(self.config.task_poll_interval_ms);
        let limit = Duration::from_millis(self.config.reindex_timeout_ms);
        let deadline = tokio::time::Instant::now() + limit;
        loop {
            let resp = self.send(|| self.request(Method::GET, &url)).await?;
            let resp = Self::ensure_success(resp, task).await?;
            let status: TaskStatus = Self::json_body(resp).await?;
            if status.completed {
                if let Some(error) = status.error {
                    return Err(StorageError::Backend(format!("task {task} failed: {error}")));
                }
                return status
                    .response
                    .ok_or_else(|| StorageError::Backend(format!("task {task} completed without a response")));
            }
            if tokio::time::Instant::now() >= deadline {
                warn!(task, ?limit, "task still running, giving up on it");
                return Err(StorageError::Timeout(format!("task {task} still running after {limit:?}")));
            }
            tokio::time::sleep(poll).await;
        }
    }

    async fn json_body<T: serde::de::DeserializeOwned>(resp: Response) -> StorageResult<T> {
        let text = resp
            .text()
            .await
            .map_err(|e| StorageError::Backend(format!("failed to read response: {e}")))?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Fails with the error body for any non-success status.
    async fn ensure_success(resp: Response, what: &str) -> StorageResult<Response> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(status_error(status, what, &body))
    }
}

#[async_trait]
impl DocumentStore for ElasticBackend {
    async fn get(&self, index: &str, id: &str) -> StorageResult<Option<VersionedDocument>> {
        let url = self.url(&[index, "_doc", id]);
        let resp = self.send(|| self.request(Method::GET, &url)).await?;
        if resp.status() == StatusCode::NOT_FOUND {
            let body = resp.text().await.unwrap_or_default();
            // A missing index also answers 404, without a `found` flag.
            return match serde_json::from_str::<GetResponse>(&body) {
                Ok(_) => Ok(None),
                Err(_) => Err(StorageError::NotFound(format!("index {index}"))),
            };
        }
        let resp = Self::ensure_success(resp, index).await?;
        let doc: GetResponse = Self::json_body(resp).await?;
        if !doc.found {
            return Ok(None);
        }
        let (Some(seq_no), Some(primary_term), Some(source)) =
            (doc.seq_no, doc.primary_term, doc.source)
        else {
            return Err(StorageError::Backend(format!(
                "document {index}/{id} returned without version or source"
            )));
        };
        Ok(Some(VersionedDocument {
            id: doc.id,
            source,
            version: VersionToken::new(seq_no, primary_term),
        }))
    }

    async fn put(
        &self,
        index: &str,
        id: &str,
        source: &Value,
        expected: Option<VersionToken>,
    ) -> StorageResult<VersionToken> {
        let url = self.url(&[index, "_doc", id]);
        let mut params = vec![("refresh", self.config.refresh.clone())];
        if let Some(token) = expected {
            params.push(("if_seq_no", token.seq_no.to_string()));
            params.push(("if_primary_term", token.primary_term.to_string()));
        }
        let resp = self
            .send(|| self.request(Method::PUT, &url).query(&params).json(source))
            .await?;
        if resp.status() == StatusCode::CONFLICT {
            debug!(index, id, "conditional write rejected");
            return Err(StorageError::Conflict {
                index: index.to_string(),
                id: id.to_string(),
            });
        }
        let resp = Self::ensure_success(resp, index).await?;
        let written: WriteResponse = Self::json_body(resp).await?;
        Ok(VersionToken::new(written.seq_no, written.primary_term))
    }

    async fn create(&self, index: &str, id: &str, source: &Value) -> StorageResult<VersionToken> {
        let url = self.url(&[index, "_create", id]);
        let refresh = [("refresh", self.config.refresh.clone())];
        let resp = self
            .send(|| self.request(Method::PUT, &url).query(&refresh).json(source))
            .await?;
        if resp.status() == StatusCode::CONFLICT {
            debug!(index, id, "create rejected, document exists");
            return Err(StorageError::Conflict {
                index: index.to_string(),
                id: id.to_string(),
            });
        }
        let resp = Self::ensure_success(resp, index).await?;
        let written: WriteResponse = Self::json_body(resp).await?;
        Ok(VersionToken::new(written.seq_no, written.primary_term))
    }

    async fn delete(&self, index: &str, id: &str) -> StorageResult<bool> {
        let url = self.url(&[index, "_doc", id]);
        let refresh = [("refresh", self.config.refresh.clone())];
        let resp = self
            .send(|| self.request(Method::DELETE, &url).query(&refresh))
            .await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        Self::ensure_success(resp, index).await?;
        Ok(true)
    }
}

#[async_trait]
impl SearchEngine for ElasticBackend {
    async fn search(&self, index: &str, request: &SearchRequest) -> StorageResult<SearchHits> {
        let url = self.url(&[index, "_search"]);
        let body = request.to_body();
        let resp = self
            .send(|| self.request(Method::POST, &url).json(&body))
            .await?;
        let resp = Self::ensure_success(resp, index).await?;
        let parsed: SearchResponse = Self::json_body(resp).await?;
        Ok(SearchHits {
            total: parsed.hits.total.value,
            hits: parsed
                .hits
                .hits
                .into_iter()
                .map(|h| Hit {
                    id: h.id,
                    source: h.source,
                    sort: h.sort,
                })
                .collect(),
        })
    }

    async fn count(&self, index: &str, query: &Query) -> StorageResult<u64> {
        let url = self.url(&[index, "_count"]);
        let body = json!({ "query": query.to_dsl() });
        let resp = self
            .send(|| self.request(Method::POST, &url).json(&body))
            .await?;
        let resp = Self::ensure_success(resp, index).await?;
        let parsed: CountResponse = Self::json_body(resp).await?;
        Ok(parsed.count)
    }

    async fn terms(
        &self,
        index: &str,
        query: &Query,
        field: &str,
        size: usize,
    ) -> StorageResult<Vec<TermBucket>> {
        let url = self.url(&[index, "_search"]);
        let body = json!({
            "size": 0,
            "query": query.to_dsl(),
            "aggs": { "facet": { "terms": { "field": field, "size": size } } }
        });
        let resp = self
            .send(|| self.request(Method::POST, &url).json(&body))
            .await?;
        let resp = Self::ensure_success(resp, index).await?;
        let parsed: SearchResponse = Self::json_body(resp).await?;
        let buckets = parsed
            .aggregations
            .and_then(|mut aggs| {
                aggs.pointer_mut("/facet/buckets")
                    .and_then(Value::as_array_mut)
                    .map(std::mem::take)
            })
            .unwrap_or_default();
        buckets
            .into_iter()
            .map(|b| -> StorageResult<TermBucket> {
                let raw: RawBucket = serde_json::from_value(b)?;
                Ok(TermBucket {
                    key: raw.key,
                    count: raw.doc_count,
                })
            })
            .collect()
    }
}

#[async_trait]
impl IndexAdmin for ElasticBackend {
    async fn index_exists(&self, index: &str) -> StorageResult<bool> {
        let url = self.url(&[index]);
        let resp = self.send(|| self.request(Method::HEAD, &url)).await?;
        match resp.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => Err(status_error(status, index, "")),
        }
    }

    async fn create_index(&self, index: &str, mapping: &Value) -> StorageResult<()> {
        let url = self.url(&[index]);
        let body = json!({ "mappings": mapping });
        let resp = self
            .send(|| self.request(Method::PUT, &url).json(&body))
            .await?;
        Self::ensure_success(resp, index).await?;
        debug!(index, "created index");
        Ok(())
    }

    async fn delete_index(&self, index: &str) -> StorageResult<()> {
        let url = self.url(&[index]);
        let resp = self.send(|| self.request(Method::DELETE, &url)).await?;
        Self::ensure_success(resp, index).await?;
        debug!(index, "deleted index");
        Ok(())
    }

    async fn reindex(&self, source: &str, dest: &str) -> StorageResult<ReindexReport> {
        let url = self.url(&["_reindex"]);
        let body = json!({ "source": { "index": source }, "dest": { "index": dest } });
        // Runs as a background task; a long copy would outlive any
        // request timeout.
        let params = [("wait_for_completion", "false"), ("refresh", "true")];
        let resp = self
            .send_once_on_timeout(|| self.request(Method::POST, &url).query(&params).json(&body))
            .await?;
        let resp = Self::ensure_success(resp, dest).await?;
        let started: TaskStarted = Self::json_body(resp).await?;
        debug!(source, dest, task = %started.task, "reindex started");
        let raw: RawReindex = serde_json::from_value(self.await_task(&started.task).await?)?;
        if !raw.failures.is_empty() {
            warn!(source, dest, failures = raw.failures.len(), "reindex reported failures");
        }
        Ok(ReindexReport {
            total: raw.total,
            created: raw.created,
            failures: raw.failures.iter().map(Value::to_string).collect(),
        })
    }

    async fn get_alias(&self, alias: &str) -> StorageResult<Vec<String>> {
        let url = self.url(&["_alias", alias]);
        let resp = self.send(|| self.request(Method::GET, &url)).await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        let resp = Self::ensure_success(resp, alias).await?;
        let body: Value = Self::json_body(resp).await?;
        let mut indices: Vec<String> = body
            .as_object()
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default();
        indices.sort();
        Ok(indices)
    }

    async fn update_aliases(&self, actions: &[AliasAction]) -> StorageResult<()> {
        let url = self.url(&["_aliases"]);
        let body = json!({ "actions": actions.iter().map(AliasAction::to_dsl).collect::<Vec<_>>() });
        let resp = self
            .send(|| self.request(Method::POST, &url).json(&body))
            .await?;
        Self::ensure_success(resp, "_aliases").await?;
        Ok(())
    }

    async fn doc_count(&self, index: &str) -> StorageResult<u64> {
        self.count(index, &Query::MatchAll).await
    }
}

/// Maps a final HTTP status to the error taxonomy.
fn status_error(status: StatusCode, what: &str, body: &str) -> StorageError {
    let detail = truncate_for_error(body, 512);
    match status {
        StatusCode::NOT_FOUND => StorageError::NotFound(format!("{what}: {detail}")),
        StatusCode::BAD_REQUEST => StorageError::BadRequest(format!("{what}: {detail}")),
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => {
            StorageError::Timeout(format!("{what}: HTTP {status}"))
        }
        _ => StorageError::Backend(format!("{what}: HTTP {status}: {detail}")),
    }
}

fn should_retry_status(status: StatusCode) -> bool {
    matches!(status.as_u16(), 429 | 502 | 503 | 504)
}

/// `base`, `2 * base`, `4 * base`, ... capped at `max`.
fn exponential_backoff(base_ms: u64, max_ms: u64, attempt: u32) -> Duration {
    let delay_ms = base_ms.saturating_mul(2u64.saturating_pow(attempt));
    Duration::from_millis(delay_ms.min(max_ms))
}

fn truncate_for_error(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
