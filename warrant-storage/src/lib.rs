//! Document-index storage layer for Warrant.
//!
//! Everything that talks to the search backend lives here. The backend is
//! consumed through three small capability traits so each component only
//! sees what it needs:
//!
//! - [`DocumentStore`]: get-by-id with version token, conditional put, delete
//! - [`SearchEngine`]: filtered, sorted, paginated search; count; terms aggregation
//! - [`IndexAdmin`]: index lifecycle, reindex and atomic alias updates
//!
//! Two implementations ship: [`ElasticBackend`] speaks the Elasticsearch REST
//! API and [`MemoryBackend`] evaluates queries in process for tests and
//! local tooling.
//!
//! # Architecture
//!
//! - Every kind is addressed through an alias named after the kind, bound to
//!   exactly one physical index `<kind>_v<N>`
//! - [`EntryStore`] reads and writes [`Entry`](warrant_model::Entry) documents
//!   under optimistic concurrency
//! - [`Paginator`] runs bounded, totally ordered reads in offset or cursor mode
//! - [`IndexMigrator`] moves a kind to a new mapping without downtime

mod backend;
mod elastic;
mod entry_store;
mod error;
mod memory;
mod migrate;
mod paginate;

pub use backend::{
    AliasAction, DocumentStore, Hit, IndexAdmin, ReindexReport, SearchEngine, SearchHits,
    SearchRequest, SortKey, SortOrder, TermBucket, VersionedDocument,
};
pub use elastic::{ElasticBackend, ElasticConfig};
pub use entry_store::{EntryStore, VersionedEntry};
pub use error::{MigrationStep, StorageError, StorageResult};
pub use memory::{FaultPoint, MemoryBackend};
pub use migrate::{IndexMigrator, IndexState, MigrationReport};
pub use paginate::{Cursor, Page, PageRequest, Paginator, SearchConfig, Sort};
