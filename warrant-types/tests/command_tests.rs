use serde_json::json;
use warrant_types::{Command, CommandId, CommandPayload, Principal, ResourceId};

fn rid(s: &str) -> ResourceId {
    ResourceId::new(s).unwrap()
}

#[test]
fn command_ids_are_unique_and_ordered() {
    let a = CommandId::new();
    let b = CommandId::new();
    assert_ne!(a, b);
    assert!(a.as_uuid() <= b.as_uuid());
}

#[test]
fn features_replaced_constructor() {
    let features = json!({"type": "x"}).as_object().unwrap().clone();
    let cmd = Command::features_replaced("widgets", rid("w1"), "alice", features.clone());
    assert_eq!(cmd.kind, "widgets");
    assert_eq!(cmd.issuer, "alice");
    assert_eq!(cmd.payload, CommandPayload::FeaturesReplaced { features });
    assert!(!cmd.is_rights_mutation());
}

#[test]
fn rights_commands_are_rights_mutations() {
    let grant = Command::rights_granted("widgets", rid("w1"), "alice", Principal::group("moderator"), "rw");
    let revoke = Command::rights_revoked("widgets", rid("w1"), "alice", Principal::user("bob"), None);
    assert!(grant.is_rights_mutation());
    assert!(revoke.is_rights_mutation());
    assert!(!Command::deleted("widgets", rid("w1"), "alice").is_rights_mutation());
}

#[test]
fn decodes_wire_form() {
    let json = r#"{
        "id": "01890a5d-ac96-774b-bcce-b302099a8057",
        "kind": "widgets",
        "resource_id": "w1",
        "issuer": "alice",
        "issued_at": "2024-01-01T00:00:00Z",
        "payload": {"op": "rights_revoked", "data": {"principal": {"kind": "user", "id": "bob"}}}
    }"#;
    let cmd = Command::from_json(json).unwrap();
    assert_eq!(cmd.resource_id.as_str(), "w1");
    assert_eq!(
        cmd.payload,
        CommandPayload::RightsRevoked {
            principal: Principal::user("bob"),
            rights: None,
        }
    );
}

#[test]
fn decodes_deleted_without_data() {
    let json = r#"{
        "id": "01890a5d-ac96-774b-bcce-b302099a8057",
        "kind": "widgets",
        "resource_id": "w1",
        "issuer": "alice",
        "issued_at": "2024-01-01T00:00:00Z",
        "payload": {"op": "deleted"}
    }"#;
    let cmd = Command::from_json(json).unwrap();
    assert_eq!(cmd.payload, CommandPayload::Deleted);
}

#[test]
fn rejects_malformed_json() {
    assert!(Command::from_json("not json").is_err());
}
