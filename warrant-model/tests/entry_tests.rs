use pretty_assertions::assert_eq;
use serde_json::json;
use std::collections::BTreeMap;
use warrant_model::{Entry, Grants};
use warrant_types::{Document, Principal, PrincipalKind, Right, Rights};

fn doc(value: serde_json::Value) -> Document {
    value.as_object().unwrap().clone()
}

fn new_entry(initial: &[(&str, &str)]) -> Entry {
    let initial: BTreeMap<String, Rights> = initial
        .iter()
        .map(|(g, r)| (g.to_string(), Rights::from_chars(r)))
        .collect();
    Entry::new("w1", "alice", doc(json!({"type": "x"})), &initial)
}

// ── Creation defaults ────────────────────────────────────────────

#[test]
fn creator_holds_every_right() {
    let entry = new_entry(&[]);
    assert_eq!(entry.creator, "alice");
    for right in Right::ALL {
        assert_eq!(entry.grants.list(right, PrincipalKind::User), ["alice".to_string()]);
        assert!(entry.grants.list(right, PrincipalKind::Group).is_empty());
    }
}

#[test]
fn initial_group_rights_are_applied() {
    let entry = new_entry(&[("moderator", "rw"), ("auditors", "r")]);
    assert_eq!(entry.grants.read_groups, vec!["auditors", "moderator"]);
    assert_eq!(entry.grants.write_groups, vec!["moderator"]);
    assert!(entry.grants.admin_groups.is_empty());
    assert!(entry.grants.execute_groups.is_empty());

    let mut expected = BTreeMap::new();
    expected.insert("auditors".to_string(), Rights::READ);
    expected.insert("moderator".to_string(), Rights::READ | Rights::WRITE);
    assert_eq!(entry.grants.group_rights(), expected);
}

#[test]
fn new_entry_has_no_annotations() {
    assert!(new_entry(&[]).annotations.is_empty());
}

// ── Feature access ───────────────────────────────────────────────

#[test]
fn feature_lookup_by_dotted_path() {
    let mut entry = new_entry(&[]);
    entry.features = doc(json!({"size": {"width": 3}, "type": "x"}));
    assert_eq!(entry.feature("size.width"), Some(&json!(3)));
    assert_eq!(entry.feature_str("type"), Some("x"));
    assert_eq!(entry.feature("size.height"), None);
    assert_eq!(entry.feature("missing"), None);
}

#[test]
fn features_keep_insertion_order() {
    let mut entry = new_entry(&[]);
    entry.features = doc(json!({"zeta": 1, "alpha": 2}));
    let keys: Vec<&String> = entry.features.keys().collect();
    assert_eq!(keys, vec!["zeta", "alpha"]);
}

// ── Grants ───────────────────────────────────────────────────────

#[test]
fn grant_is_idempotent() {
    let mut grants = Grants::default();
    let bob = Principal::user("bob");
    assert!(grants.grant(&bob, Rights::READ));
    assert!(!grants.grant(&bob, Rights::READ));
    assert_eq!(grants.read_users, vec!["bob"]);
}

#[test]
fn revoke_removes_duplicates() {
    let mut grants = Grants {
        read_groups: vec!["g".into(), "h".into(), "g".into()],
        ..Default::default()
    };
    assert!(grants.revoke(&Principal::group("g"), Rights::READ));
    assert_eq!(grants.read_groups, vec!["h"]);
}

#[test]
fn revoke_only_touches_requested_rights() {
    let mut grants = Grants::default();
    let bob = Principal::user("bob");
    grants.grant(&bob, Rights::all());
    grants.revoke(&bob, Rights::WRITE | Rights::ADMIN);
    assert_eq!(grants.rights_of(&bob), Rights::READ | Rights::EXECUTE);
}

#[test]
fn revoke_all_clears_principal() {
    let mut grants = Grants::default();
    let group = Principal::group("moderator");
    grants.grant(&group, Rights::all());
    assert!(grants.revoke_all(&group));
    assert!(grants.rights_of(&group).is_empty());
    assert!(!grants.revoke_all(&group));
}

#[test]
fn user_and_group_with_same_name_are_distinct() {
    let mut grants = Grants::default();
    grants.grant(&Principal::user("ops"), Rights::READ);
    assert!(grants.rights_of(&Principal::group("ops")).is_empty());
}

#[test]
fn field_names() {
    assert_eq!(Grants::field_name(Right::Read, PrincipalKind::User), "read_users");
    assert_eq!(Grants::field_name(Right::Admin, PrincipalKind::Group), "admin_groups");
}

// ── Document layout ──────────────────────────────────────────────

#[test]
fn document_layout_flattens_grants() {
    let entry = new_entry(&[("moderator", "r")]);
    let document = entry.to_document().unwrap();
    assert_eq!(
        document,
        json!({
            "id": "w1",
            "features": {"type": "x"},
            "annotations": {},
            "creator": "alice",
            "admin_users": ["alice"],
            "admin_groups": [],
            "read_users": ["alice"],
            "read_groups": ["moderator"],
            "write_users": ["alice"],
            "write_groups": [],
            "execute_users": ["alice"],
            "execute_groups": []
        })
    );
    assert_eq!(Entry::from_document(document).unwrap(), entry);
}

#[test]
fn sparse_document_parses_with_defaults() {
    let entry = Entry::from_document(json!({"id": "w2"})).unwrap();
    assert_eq!(entry.id, "w2");
    assert!(entry.features.is_empty());
    assert_eq!(entry.grants, Grants::default());
}
