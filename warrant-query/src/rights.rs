//! Rights → filter clauses.
//!
//! For every requested right the caller must either be named in the
//! right's user list or share at least one group with its group list.
//! Requested rights combine by conjunction: `"ra"` needs read AND admin.

use serde_json::Value;
use warrant_model::{Grants, Identity};
use warrant_types::{PrincipalKind, Right, Rights};

use crate::Query;

/// Compiles a wire rights string for a caller given as user id and groups.
///
/// Characters outside `r`, `w`, `x`, `a` are skipped. Each returned clause
/// is meant to be AND-ed with the rest of the read filter.
#[must_use]
pub fn compile_rights_filter(rights: &str, user: &str, groups: &[String]) -> Vec<Query> {
    rights_clauses(Rights::from_chars(rights), &Identity::new(user, groups))
}

/// One clause per right in the set, in canonical `rwxa` order.
#[must_use]
pub fn rights_clauses(rights: Rights, identity: &Identity) -> Vec<Query> {
    rights.rights().map(|right| holder_clause(right, identity)).collect()
}

/// The conjunction of [`rights_clauses`] as a single query.
#[must_use]
pub fn rights_filter(rights: Rights, identity: &Identity) -> Query {
    Query::all(rights_clauses(rights, identity))
}

fn holder_clause(right: Right, identity: &Identity) -> Query {
    let mut holders = Vec::with_capacity(2);
    if !identity.user.is_empty() {
        holders.push(Query::term(
            Grants::field_name(right, PrincipalKind::User),
            identity.user.as_str(),
        ));
    }
    if !identity.groups.is_empty() {
        holders.push(Query::Terms {
            field: Grants::field_name(right, PrincipalKind::Group),
            values: identity.groups.iter().cloned().map(Value::String).collect(),
        });
    }
    // An anonymous caller holds nothing.
    Query::any(holders)
}
