//! Selection tree → query.

use serde_json::Value;
use tracing::debug;
use warrant_model::{Condition, Identity, IdentityRef, Operator, Selection};

use crate::{Query, QueryError, QueryResult};

/// Compiles a selection, resolving identity references against `identity`.
///
/// - `and` of nothing matches everything; `or` of nothing matches nothing
/// - `== ""` (or a missing value) matches entries lacking the field
/// - `!= ""` matches entries having it
/// - `in` takes a list or a comma-separated string
///
/// Any other operator fails the whole compilation.
pub fn compile_selection_filter(selection: &Selection, identity: &Identity) -> QueryResult<Query> {
    match selection {
        Selection::And(children) => Ok(Query::all(compile_all(children, identity)?)),
        Selection::Or(children) => Ok(Query::any(compile_all(children, identity)?)),
        Selection::Not(child) => Ok(Query::not(compile_selection_filter(child, identity)?)),
        Selection::Condition(condition) => compile_condition(condition, identity).inspect_err(|e| {
            debug!(field = %condition.field, error = %e, "rejected selection condition");
        }),
    }
}

fn compile_all(children: &[Selection], identity: &Identity) -> QueryResult<Vec<Query>> {
    children
        .iter()
        .map(|child| compile_selection_filter(child, identity))
        .collect()
}

fn compile_condition(condition: &Condition, identity: &Identity) -> QueryResult<Query> {
    let field = condition.field.as_str();
    if field.is_empty() {
        return Err(QueryError::MissingField);
    }
    let operator = Operator::parse(&condition.operator).ok_or_else(|| QueryError::UnknownOperator {
        field: field.to_string(),
        operator: condition.operator.clone(),
    })?;
    let value = resolve_value(condition, identity);

    match operator {
        Operator::Equals => equals(field, value),
        Operator::NotEquals => {
            if is_blank(value.as_ref()) {
                Ok(Query::exists(field))
            } else {
                Ok(Query::not(equals(field, value)?))
            }
        }
        Operator::AnyIn => {
            let set = value_set(field, value)?;
            if set.is_empty() {
                Ok(Query::MatchNone)
            } else {
                Ok(Query::Terms {
                    field: field.to_string(),
                    values: set,
                })
            }
        }
    }
}

fn equals(field: &str, value: Option<Value>) -> QueryResult<Query> {
    match value {
        v if is_blank(v.as_ref()) => Ok(Query::not(Query::exists(field))),
        Some(Value::Array(items)) => Ok(Query::Terms {
            field: field.to_string(),
            values: items,
        }),
        Some(Value::Object(_)) => Err(invalid(field, "objects cannot be compared")),
        Some(scalar) => Ok(Query::term(field, scalar)),
        None => Ok(Query::not(Query::exists(field))),
    }
}

/// The literal value, or the caller identity it refers to.
fn resolve_value(condition: &Condition, identity: &Identity) -> Option<Value> {
    match (&condition.value, condition.reference) {
        (Some(v), _) if !v.is_null() => Some(v.clone()),
        (_, Some(IdentityRef::CurrentUser)) => Some(Value::String(identity.user.clone())),
        (_, Some(IdentityRef::CurrentGroups)) => Some(Value::Array(
            identity.groups.iter().cloned().map(Value::String).collect(),
        )),
        _ => None,
    }
}

fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(Value::Array(items)) => items.is_empty(),
        Some(_) => false,
    }
}

fn value_set(field: &str, value: Option<Value>) -> QueryResult<Vec<Value>> {
    match value {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::String(s)) => Ok(s
            .split(',')
            .map(str::trim)
            .filter(|segment| !segment.is_empty())
            .map(|segment| Value::String(segment.to_string()))
            .collect()),
        Some(Value::Array(items)) => Ok(items.into_iter().filter(|v| !v.is_null()).collect()),
        Some(Value::Object(_)) => Err(invalid(field, "expected a list or comma-separated string")),
        Some(scalar) => Ok(vec![scalar]),
    }
}

fn invalid(field: &str, reason: &str) -> QueryError {
    QueryError::InvalidValue {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}
