use pretty_assertions::assert_eq;
use serde_json::json;
use warrant_model::{Condition, Identity, IdentityRef, Operator, Selection};

// ── Wire form ────────────────────────────────────────────────────

#[test]
fn parses_nested_wire_form() {
    let selection: Selection = serde_json::from_value(json!({
        "and": [
            {"condition": {"field": "features.type", "op": "==", "value": "x"}},
            {"not": {"condition": {"field": "features.owner", "op": "==", "ref": "$user"}}},
            {"or": []}
        ]
    }))
    .unwrap();

    assert_eq!(
        selection,
        Selection::and([
            Condition::equals("features.type", "x").into(),
            Selection::not(Condition::with_reference("features.owner", "==", IdentityRef::CurrentUser).into()),
            Selection::or([]),
        ])
    );
}

#[test]
fn unknown_operator_still_parses() {
    let selection: Selection = serde_json::from_value(json!({
        "condition": {"field": "features.n", "op": ">=", "value": 3}
    }))
    .unwrap();
    match selection {
        Selection::Condition(c) => assert_eq!(c.operator, ">="),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn groups_reference_wire_name() {
    let c = Condition::with_reference("features.team", "in", IdentityRef::CurrentGroups);
    let json = serde_json::to_value(&c).unwrap();
    assert_eq!(json, json!({"field": "features.team", "op": "in", "ref": "$groups"}));
}

// ── Operators ────────────────────────────────────────────────────

#[test]
fn operator_parse() {
    assert_eq!(Operator::parse("=="), Some(Operator::Equals));
    assert_eq!(Operator::parse("eq"), Some(Operator::Equals));
    assert_eq!(Operator::parse("!="), Some(Operator::NotEquals));
    assert_eq!(Operator::parse("ne"), Some(Operator::NotEquals));
    assert_eq!(Operator::parse("in"), Some(Operator::AnyIn));
    assert_eq!(Operator::parse("like"), None);
}

// ── Identity ─────────────────────────────────────────────────────

#[test]
fn identity_constructors() {
    assert!(Identity::default().is_anonymous());
    assert!(!Identity::user("alice").is_anonymous());
    let id = Identity::groups(["moderator"]);
    assert_eq!(id.user, "");
    assert_eq!(id.groups, vec!["moderator"]);
}
