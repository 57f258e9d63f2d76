//! Backend-native query AST.
//!
//! The variants mirror the subset of the Elasticsearch query DSL the
//! compilers emit. [`Query::matches`] evaluates a query against a stored
//! document with the same semantics the engine applies to keyword fields:
//! - a field path resolves to every leaf value, flattening arrays
//! - `exists` means at least one non-null leaf
//! - `term`/`terms` match if any leaf equals any requested value
//! - a `bool` with only `should` clauses needs at least one of them

use serde::{Serialize, Serializer};
use serde_json::{Map, Value, json};

#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    MatchAll,
    MatchNone,
    /// Exact value on a keyword, number or boolean field.
    Term { field: String, value: Value },
    /// Any of the given values.
    Terms { field: String, values: Vec<Value> },
    Exists { field: String },
    /// Full-text match: every token of `text` must occur in one of `fields`.
    Match { fields: Vec<String>, text: String },
    Bool(BoolQuery),
}

/// A boolean combination of clauses.
///
/// `must` and `filter` are both conjunctive; `filter` clauses do not
/// contribute to relevance scoring.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoolQuery {
    pub must: Vec<Query>,
    pub filter: Vec<Query>,
    pub should: Vec<Query>,
    pub must_not: Vec<Query>,
    pub minimum_should_match: Option<usize>,
}

impl Query {
    pub fn term(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Term {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn terms(field: impl Into<String>, values: impl IntoIterator<Item = impl Into<Value>>) -> Self {
        Self::Terms {
            field: field.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn exists(field: impl Into<String>) -> Self {
        Self::Exists { field: field.into() }
    }

    /// Conjunction. No clauses matches everything; a single clause is
    /// returned unchanged.
    #[must_use]
    pub fn all(mut clauses: Vec<Query>) -> Self {
        match clauses.len() {
            0 => Self::MatchAll,
            1 => clauses.remove(0),
            _ => Self::Bool(BoolQuery {
                filter: clauses,
                ..BoolQuery::default()
            }),
        }
    }

    /// Disjunction. No clauses matches nothing; a single clause is
    /// returned unchanged.
    #[must_use]
    pub fn any(mut clauses: Vec<Query>) -> Self {
        match clauses.len() {
            0 => Self::MatchNone,
            1 => clauses.remove(0),
            _ => Self::Bool(BoolQuery {
                should: clauses,
                minimum_should_match: Some(1),
                ..BoolQuery::default()
            }),
        }
    }

    /// Complement. Negating a bare negation unwraps it.
    #[allow(clippy::should_implement_trait)]
    #[must_use]
    pub fn not(query: Query) -> Self {
        match query {
            Self::MatchAll => Self::MatchNone,
            Self::MatchNone => Self::MatchAll,
            Self::Bool(mut b) if b.is_single_negation() => b.must_not.remove(0),
            other => Self::Bool(BoolQuery {
                must_not: vec![other],
                ..BoolQuery::default()
            }),
        }
    }

    /// Renders the query as Elasticsearch query DSL.
    #[must_use]
    pub fn to_dsl(&self) -> Value {
        match self {
            Self::MatchAll => json!({ "match_all": {} }),
            Self::MatchNone => json!({ "match_none": {} }),
            Self::Term { field, value } => json!({ "term": { field.as_str(): value } }),
            Self::Terms { field, values } => json!({ "terms": { field.as_str(): values } }),
            Self::Exists { field } => json!({ "exists": { "field": field } }),
            Self::Match { fields, text } => json!({
                "multi_match": {
                    "query": text,
                    "fields": fields,
                    "operator": "and"
                }
            }),
            Self::Bool(b) => {
                let mut body = Map::new();
                for (name, clauses) in [
                    ("must", &b.must),
                    ("filter", &b.filter),
                    ("should", &b.should),
                    ("must_not", &b.must_not),
                ] {
                    if !clauses.is_empty() {
                        let rendered: Vec<Value> = clauses.iter().map(Query::to_dsl).collect();
                        body.insert(name.into(), Value::Array(rendered));
                    }
                }
                if let Some(n) = b.minimum_should_match {
                    body.insert("minimum_should_match".into(), json!(n));
                }
                json!({ "bool": body })
            }
        }
    }

    /// Evaluates the query against a stored document.
    #[must_use]
    pub fn matches(&self, doc: &Value) -> bool {
        match self {
            Self::MatchAll => true,
            Self::MatchNone => false,
            Self::Term { field, value } => {
                field_values(doc, field).into_iter().any(|v| values_equal(v, value))
            }
            Self::Terms { field, values } => field_values(doc, field)
                .into_iter()
                .any(|v| values.iter().any(|want| values_equal(v, want))),
            Self::Exists { field } => !field_values(doc, field).is_empty(),
            Self::Match { fields, text } => {
                let wanted = tokenize(text);
                !wanted.is_empty()
                    && fields.iter().any(|field| {
                        let have: Vec<String> = field_values(doc, field)
                            .into_iter()
                            .filter_map(Value::as_str)
                            .flat_map(tokenize)
                            .collect();
                        wanted.iter().all(|t| have.contains(t))
                    })
            }
            Self::Bool(b) => b.matches(doc),
        }
    }
}

impl BoolQuery {
    fn is_single_negation(&self) -> bool {
        self.must.is_empty()
            && self.filter.is_empty()
            && self.should.is_empty()
            && self.must_not.len() == 1
    }

    fn matches(&self, doc: &Value) -> bool {
        if !self.must.iter().chain(&self.filter).all(|q| q.matches(doc)) {
            return false;
        }
        if self.must_not.iter().any(|q| q.matches(doc)) {
            return false;
        }
        let required = match self.minimum_should_match {
            Some(n) => n,
            None if self.must.is_empty() && self.filter.is_empty() && !self.should.is_empty() => 1,
            None => 0,
        };
        required == 0 || self.should.iter().filter(|q| q.matches(doc)).count() >= required
    }
}

impl Serialize for Query {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_dsl().serialize(serializer)
    }
}

/// Every non-null leaf value at a dotted path, with arrays flattened.
///
/// A trailing `.text` sub-field resolves to its parent when the document
/// has no such key, matching how multi-fields index the same source value.
#[must_use]
pub fn field_values<'a>(doc: &'a Value, path: &str) -> Vec<&'a Value> {
    let mut out = Vec::new();
    collect(doc, &path.split('.').collect::<Vec<_>>(), &mut out);
    if out.is_empty() {
        if let Some(parent) = path.strip_suffix(".text") {
            collect(doc, &parent.split('.').collect::<Vec<_>>(), &mut out);
        }
    }
    out
}

fn collect<'a>(value: &'a Value, path: &[&str], out: &mut Vec<&'a Value>) {
    match value {
        Value::Array(items) => {
            for item in items {
                collect(item, path, out);
            }
        }
        Value::Null => {}
        _ => match path.split_first() {
            None => out.push(value),
            Some((head, rest)) => {
                if let Some(child) = value.get(*head) {
                    collect(child, rest, out);
                }
            }
        },
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}
