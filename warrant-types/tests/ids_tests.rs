use warrant_types::{Principal, PrincipalKind, ResourceId};

#[test]
fn resource_id_rejects_empty() {
    assert!(ResourceId::new("").is_err());
    assert!("".parse::<ResourceId>().is_err());
}

#[test]
fn resource_id_display_and_parse() {
    let id: ResourceId = "w1".parse().unwrap();
    assert_eq!(id.as_str(), "w1");
    assert_eq!(id.to_string(), "w1");
}

#[test]
fn resource_id_serializes_transparently() {
    let id = ResourceId::new("w1").unwrap();
    assert_eq!(serde_json::to_string(&id).unwrap(), "\"w1\"");
}

#[test]
fn principal_accessors() {
    let user = Principal::user("alice");
    assert_eq!(user.kind(), PrincipalKind::User);
    assert_eq!(user.id(), "alice");
    assert_eq!(user.to_string(), "user:alice");

    let group = Principal::group("moderator");
    assert_eq!(group.kind(), PrincipalKind::Group);
    assert_eq!(group.kind().list_suffix(), "groups");
}

#[test]
fn principal_wire_form() {
    let json = serde_json::to_value(Principal::group("moderator")).unwrap();
    assert_eq!(json, serde_json::json!({"kind": "group", "id": "moderator"}));
}
