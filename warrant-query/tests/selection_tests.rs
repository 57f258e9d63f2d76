use pretty_assertions::assert_eq;
use proptest::prelude::*;
use serde_json::{Value, json};
use warrant_model::{Condition, Identity, IdentityRef, Selection};
use warrant_query::{Query, QueryError, compile_selection_filter};

fn compile(selection: &Selection) -> Query {
    compile_selection_filter(selection, &Identity::new("alice", ["staff"])).unwrap()
}

fn docs() -> Vec<Value> {
    vec![
        json!({"id": "a", "features": {"type": "x", "team": "staff", "owner": "alice"}}),
        json!({"id": "b", "features": {"type": "y", "team": "ops"}}),
        json!({"id": "c", "features": {"type": ["x", "z"]}}),
        json!({"id": "d", "features": {}}),
        json!({"id": "e", "features": {"type": null, "owner": "bob"}}),
    ]
}

fn matching_ids(query: &Query) -> Vec<String> {
    docs()
        .iter()
        .filter(|d| query.matches(d))
        .map(|d| d["id"].as_str().unwrap().to_string())
        .collect()
}

// ── Conjunction and disjunction ──────────────────────────────────

#[test]
fn exclusive_equalities_under_and_match_nothing() {
    let selection = Selection::and([
        Condition::equals("features.type", "x").into(),
        Condition::equals("features.type", "y").into(),
    ]);
    assert_eq!(matching_ids(&compile(&selection)), Vec::<String>::new());
}

#[test]
fn or_is_a_union() {
    let selection = Selection::or([
        Condition::equals("features.type", "x").into(),
        Condition::equals("features.type", "y").into(),
    ]);
    assert_eq!(matching_ids(&compile(&selection)), vec!["a", "b", "c"]);
}

#[test]
fn empty_and_matches_everything() {
    assert_eq!(compile(&Selection::and([])), Query::MatchAll);
}

#[test]
fn empty_or_matches_nothing() {
    assert_eq!(compile(&Selection::or([])), Query::MatchNone);
}

#[test]
fn and_renders_filter_clauses() {
    let selection = Selection::and([
        Condition::equals("features.type", "x").into(),
        Condition::not_equals("features.team", "ops").into(),
    ]);
    assert_eq!(
        compile(&selection).to_dsl(),
        json!({
            "bool": {
                "filter": [
                    {"term": {"features.type": "x"}},
                    {"bool": {"must_not": [{"term": {"features.team": "ops"}}]}}
                ]
            }
        })
    );
}

// ── Equality ─────────────────────────────────────────────────────

#[test]
fn equals_empty_means_missing() {
    let query = compile(&Condition::equals("features.owner", "").into());
    assert_eq!(query.to_dsl(), json!({"bool": {"must_not": [{"exists": {"field": "features.owner"}}]}}));
    assert_eq!(matching_ids(&query), vec!["b", "c", "d"]);
}

#[test]
fn not_equals_empty_means_present() {
    let query = compile(&Condition::not_equals("features.owner", "").into());
    assert_eq!(query, Query::exists("features.owner"));
    assert_eq!(matching_ids(&query), vec!["a", "e"]);
}

#[test]
fn absent_value_behaves_like_empty() {
    let missing = Condition::new("features.type", "==", None);
    assert_eq!(matching_ids(&compile(&missing.into())), vec!["d", "e"]);
}

#[test]
fn equals_list_matches_any_element() {
    let query = compile(&Condition::equals("features.type", json!(["y", "z"])).into());
    assert_eq!(matching_ids(&query), vec!["b", "c"]);
}

#[test]
fn multi_valued_field_matches_any_element() {
    let query = compile(&Condition::equals("features.type", "z").into());
    assert_eq!(matching_ids(&query), vec!["c"]);
}

#[test]
fn not_equals_value_includes_missing() {
    let query = compile(&Condition::not_equals("features.type", "x").into());
    assert_eq!(matching_ids(&query), vec!["b", "d", "e"]);
}

#[test]
fn numbers_compare_numerically() {
    let doc = json!({"features": {"n": 3.0}});
    let query = compile(&Condition::equals("features.n", 3).into());
    assert!(query.matches(&doc));
}

#[test]
fn equals_object_is_invalid() {
    let err = compile_selection_filter(
        &Condition::equals("features.type", json!({"a": 1})).into(),
        &Identity::default(),
    )
    .unwrap_err();
    assert!(matches!(err, QueryError::InvalidValue { .. }));
}

// ── Set membership ───────────────────────────────────────────────

#[test]
fn in_splits_comma_separated_strings() {
    let query = compile(&Condition::any_in("features.type", " y , ,z,").into());
    assert_eq!(
        query,
        Query::Terms {
            field: "features.type".into(),
            values: vec![json!("y"), json!("z")],
        }
    );
    assert_eq!(matching_ids(&query), vec!["b", "c"]);
}

#[test]
fn in_accepts_lists() {
    let query = compile(&Condition::any_in("features.team", json!(["ops", "staff"])).into());
    assert_eq!(matching_ids(&query), vec!["a", "b"]);
}

#[test]
fn in_with_empty_set_matches_nothing() {
    assert_eq!(compile(&Condition::any_in("features.type", " , ").into()), Query::MatchNone);
}

// ── Identity references ──────────────────────────────────────────

#[test]
fn user_reference_resolves_to_caller() {
    let condition = Condition::with_reference("features.owner", "==", IdentityRef::CurrentUser);
    assert_eq!(matching_ids(&compile(&condition.into())), vec!["a"]);
}

#[test]
fn groups_reference_resolves_to_caller_groups() {
    let condition = Condition::with_reference("features.team", "in", IdentityRef::CurrentGroups);
    assert_eq!(matching_ids(&compile(&condition.into())), vec!["a"]);
}

#[test]
fn literal_value_wins_over_reference() {
    let mut condition = Condition::equals("features.owner", "bob");
    condition.reference = Some(IdentityRef::CurrentUser);
    assert_eq!(matching_ids(&compile(&condition.into())), vec!["e"]);
}

// ── Errors ───────────────────────────────────────────────────────

#[test]
fn unknown_operator_fails_whole_tree() {
    let selection = Selection::and([
        Condition::equals("features.type", "x").into(),
        Selection::not(Condition::new("features.n", ">=", Some(json!(3))).into()),
    ]);
    let err = compile_selection_filter(&selection, &Identity::default()).unwrap_err();
    assert_eq!(
        err,
        QueryError::UnknownOperator {
            field: "features.n".into(),
            operator: ">=".into(),
        }
    );
}

#[test]
fn empty_field_is_rejected() {
    let err = compile_selection_filter(&Condition::equals("", "x").into(), &Identity::default())
        .unwrap_err();
    assert_eq!(err, QueryError::MissingField);
}

// ── Properties ───────────────────────────────────────────────────

fn arb_condition() -> impl Strategy<Value = Selection> {
    let field = proptest::sample::select(vec!["features.type", "features.team", "features.owner"]);
    let value = proptest::sample::select(vec!["", "x", "y", "staff", "ops", "alice", "x,y"]);
    let op = proptest::sample::select(vec!["==", "!=", "in"]);
    (field, op, value).prop_map(|(f, o, v)| Condition::new(f, o, Some(json!(v))).into())
}

fn arb_selection() -> impl Strategy<Value = Selection> {
    arb_condition().prop_recursive(3, 16, 4, |inner| {
        prop_oneof![
            proptest::collection::vec(inner.clone(), 0..4).prop_map(Selection::And),
            proptest::collection::vec(inner.clone(), 0..4).prop_map(Selection::Or),
            inner.prop_map(Selection::not),
        ]
    })
}

proptest! {
    #[test]
    fn double_negation_is_identity(selection in arb_selection()) {
        let plain = compile(&selection);
        let doubled = compile(&Selection::not(Selection::not(selection)));
        for doc in docs() {
            prop_assert_eq!(plain.matches(&doc), doubled.matches(&doc));
        }
    }

    #[test]
    fn negation_is_a_complement(selection in arb_selection()) {
        let plain = compile(&selection);
        let negated = compile(&Selection::not(selection));
        for doc in docs() {
            prop_assert_ne!(plain.matches(&doc), negated.matches(&doc));
        }
    }

    #[test]
    fn and_is_intersection(a in arb_selection(), b in arb_selection()) {
        let both = compile(&Selection::and([a.clone(), b.clone()]));
        let (qa, qb) = (compile(&a), compile(&b));
        for doc in docs() {
            prop_assert_eq!(both.matches(&doc), qa.matches(&doc) && qb.matches(&doc));
        }
    }
}
