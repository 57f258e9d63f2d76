//! Query compilation for Warrant.
//!
//! Turns the caller-facing descriptions of a read into a backend-native
//! [`Query`]:
//! - [`compile_rights_filter`]: rights string × identity → one clause per right
//! - [`compile_selection_filter`]: a [`Selection`](warrant_model::Selection) tree → equivalent query
//! - [`compile_read_filter`]: rights, selection and free text combined for one kind
//!
//! The [`Query`] AST renders to the Elasticsearch query DSL and can also be
//! evaluated directly against a stored document, which the in-memory
//! backend and the property tests rely on.

mod error;
mod query;
mod read;
mod rights;
mod selection;

pub use error::{QueryError, QueryResult};
pub use query::{BoolQuery, Query, field_values};
pub use read::{ReadRequest, compile_read_filter};
pub use rights::{compile_rights_filter, rights_clauses, rights_filter};
pub use selection::compile_selection_filter;
