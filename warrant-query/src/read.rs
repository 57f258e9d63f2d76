use tracing::debug;
use warrant_model::{Identity, KindSchema, Selection};
use warrant_types::Rights;

use crate::{BoolQuery, Query, QueryResult, compile_selection_filter, rights_clauses};

/// Everything that narrows one read: the rights the caller must hold, an
/// optional selection and an optional free-text term.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReadRequest {
    pub rights: Rights,
    pub identity: Identity,
    pub selection: Option<Selection>,
    pub text: Option<String>,
}

impl ReadRequest {
    pub fn new(rights: Rights, identity: Identity) -> Self {
        Self {
            rights,
            identity,
            selection: None,
            text: None,
        }
    }

    /// Builds a request from a wire rights string such as `"ra"`.
    pub fn from_wire(rights: &str, identity: Identity) -> Self {
        Self::new(Rights::from_chars(rights), identity)
    }

    #[must_use]
    pub fn with_selection(mut self, selection: Selection) -> Self {
        self.selection = Some(selection);
        self
    }

    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }
}

/// Combines rights clauses, the compiled selection and the free-text term.
///
/// Rights and selection are non-scoring filters. Free text searches the
/// kind's searchable fields; a kind without any matches nothing.
pub fn compile_read_filter(request: &ReadRequest, schema: &KindSchema) -> QueryResult<Query> {
    let mut filter = rights_clauses(request.rights, &request.identity);
    if let Some(selection) = &request.selection {
        filter.push(compile_selection_filter(selection, &request.identity)?);
    }

    let text = request.text.as_deref().map(str::trim).filter(|t| !t.is_empty());
    let Some(text) = text else {
        return Ok(Query::all(filter));
    };

    let fields = schema.searchable_paths();
    if fields.is_empty() {
        debug!(kind = %schema.kind, "free-text read on a kind without searchable fields");
        return Ok(Query::MatchNone);
    }
    Ok(Query::Bool(BoolQuery {
        must: vec![Query::Match {
            fields,
            text: text.to_string(),
        }],
        filter,
        ..BoolQuery::default()
    }))
}
