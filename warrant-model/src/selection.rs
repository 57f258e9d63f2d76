//! Caller-supplied boolean filter trees.
//!
//! A selection arrives from the request layer in its JSON form:
//!
//! ```json
//! {"and": [
//!     {"condition": {"field": "features.type", "op": "==", "value": "x"}},
//!     {"not": {"condition": {"field": "features.owner", "op": "==", "ref": "$user"}}}
//! ]}
//! ```
//!
//! Operators stay as raw strings until compilation, where an unknown
//! operator becomes a bad-request error instead of being dropped.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A node of the selection tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Selection {
    And(Vec<Selection>),
    Or(Vec<Selection>),
    Not(Box<Selection>),
    Condition(Condition),
}

impl Selection {
    pub fn and(children: impl IntoIterator<Item = Selection>) -> Self {
        Self::And(children.into_iter().collect())
    }

    pub fn or(children: impl IntoIterator<Item = Selection>) -> Self {
        Self::Or(children.into_iter().collect())
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(child: Selection) -> Self {
        Self::Not(Box::new(child))
    }
}

impl From<Condition> for Selection {
    fn from(condition: Condition) -> Self {
        Self::Condition(condition)
    }
}

/// A leaf test on one document field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    /// Dotted document path (e.g. `"features.type"`).
    pub field: String,
    /// Wire operator; see [`Operator::parse`].
    #[serde(rename = "op")]
    pub operator: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    /// Used when `value` is absent.
    #[serde(default, rename = "ref", skip_serializing_if = "Option::is_none")]
    pub reference: Option<IdentityRef>,
}

impl Condition {
    pub fn new(field: impl Into<String>, operator: impl Into<String>, value: Option<Value>) -> Self {
        Self {
            field: field.into(),
            operator: operator.into(),
            value,
            reference: None,
        }
    }

    pub fn equals(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, "==", Some(value.into()))
    }

    pub fn not_equals(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, "!=", Some(value.into()))
    }

    pub fn any_in(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, "in", Some(value.into()))
    }

    /// A condition whose value is the caller's identity.
    pub fn with_reference(
        field: impl Into<String>,
        operator: impl Into<String>,
        reference: IdentityRef,
    ) -> Self {
        Self {
            reference: Some(reference),
            ..Self::new(field, operator, None)
        }
    }
}

/// Symbolic reference to the caller, resolved at compile time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IdentityRef {
    #[serde(rename = "$user")]
    CurrentUser,
    #[serde(rename = "$groups")]
    CurrentGroups,
}

/// Comparison performed by a condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Equals,
    NotEquals,
    /// The field's value intersects the given set.
    AnyIn,
}

impl Operator {
    /// Parses a wire operator. Returns `None` for anything unrecognised.
    #[must_use]
    pub fn parse(op: &str) -> Option<Self> {
        match op {
            "==" | "eq" => Some(Self::Equals),
            "!=" | "ne" => Some(Self::NotEquals),
            "in" => Some(Self::AnyIn),
            _ => None,
        }
    }
}
