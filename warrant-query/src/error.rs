use thiserror::Error;

/// Errors raised while compiling a selection.
///
/// All of them describe a malformed request; the storage layer reports
/// them to callers as bad requests.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("unknown operator {operator:?} on field {field:?}")]
    UnknownOperator { field: String, operator: String },

    #[error("invalid value for field {field:?}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("condition has an empty field path")]
    MissingField,
}

pub type QueryResult<T> = Result<T, QueryError>;
