use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use warrant_ingest::{
    Applied, CommandApplicator, CommandHandler, IngestConfig, KindRegistry, PipelineError,
    UpdatePipeline,
};
use warrant_model::KindSchema;
use warrant_storage::{AliasAction, IndexAdmin, MemoryBackend};
use warrant_types::{Command, Document, Principal, ResourceId, Rights};

async fn applicator() -> CommandApplicator {
    let backend = Arc::new(MemoryBackend::new());
    backend.create_index("widgets_v1", &json!({})).await.unwrap();
    backend
        .update_aliases(&[AliasAction::Add {
            index: "widgets_v1".into(),
            alias: "widgets".into(),
        }])
        .await
        .unwrap();
    let kinds = KindRegistry::from_schemas([KindSchema::new("widgets")]);
    let pipeline = UpdatePipeline::new(backend, Arc::new(kinds), &IngestConfig::default());
    CommandApplicator::new(Arc::new(pipeline))
}

fn w1() -> ResourceId {
    ResourceId::new("w1").unwrap()
}

fn features() -> Document {
    json!({"title": "Gear"}).as_object().cloned().unwrap()
}

fn entry_of(applied: Applied) -> warrant_model::Entry {
    match applied {
        Applied::Entry(entry) => entry,
        Applied::Deleted => panic!("expected an entry"),
    }
}

// ── Dispatch ────────────────────────────────────────────────────

#[tokio::test]
async fn features_command_creates_with_issuer_as_creator() {
    let app = applicator().await;
    let applied = app
        .apply(&Command::features_replaced("widgets", w1(), "alice", features()))
        .await
        .unwrap();
    let entry = entry_of(applied);
    assert_eq!(entry.creator, "alice");
    assert_eq!(entry.grants.rights_of(&Principal::user("alice")), Rights::all());
}

#[tokio::test]
async fn grant_and_revoke_commands() {
    let app = applicator().await;
    app.apply(&Command::features_replaced("widgets", w1(), "alice", features()))
        .await
        .unwrap();

    let entry = entry_of(
        app.apply(&Command::rights_granted("widgets", w1(), "alice", Principal::group("moderator"), "rw"))
            .await
            .unwrap(),
    );
    assert_eq!(
        entry.grants.rights_of(&Principal::group("moderator")),
        Rights::READ | Rights::WRITE
    );

    let entry = entry_of(
        app.apply(&Command::rights_revoked(
            "widgets",
            w1(),
            "alice",
            Principal::group("moderator"),
            Some("w".into()),
        ))
        .await
        .unwrap(),
    );
    assert_eq!(entry.grants.rights_of(&Principal::group("moderator")), Rights::READ);

    let entry = entry_of(
        app.apply(&Command::rights_revoked("widgets", w1(), "alice", Principal::group("moderator"), None))
            .await
            .unwrap(),
    );
    assert!(entry.grants.rights_of(&Principal::group("moderator")).is_empty());
}

#[tokio::test]
async fn annotations_and_delete_commands() {
    let app = applicator().await;
    app.apply(&Command::features_replaced("widgets", w1(), "alice", features()))
        .await
        .unwrap();

    let annotations = json!({"score": 3}).as_object().cloned().unwrap();
    let entry = entry_of(
        app.apply(&Command::annotations_replaced("widgets", w1(), "bob", annotations))
            .await
            .unwrap(),
    );
    assert_eq!(entry.annotations.get("score"), Some(&json!(3)));

    let applied = app.apply(&Command::deleted("widgets", w1(), "alice")).await.unwrap();
    assert_eq!(applied, Applied::Deleted);
    assert!(app.pipeline().store().get_entry("widgets", "w1").await.unwrap().is_none());
}

#[tokio::test]
async fn decoded_wire_command_applies() {
    let app = applicator().await;
    let wire = json!({
        "id": "01900000-0000-7000-8000-000000000001",
        "kind": "widgets",
        "resource_id": "w1",
        "issuer": "carol",
        "issued_at": "2026-01-01T00:00:00Z",
        "payload": {"op": "features_replaced", "data": {"features": {"title": "Gear"}}}
    });
    let command = Command::from_json(&wire.to_string()).unwrap();
    let entry = entry_of(app.apply(&command).await.unwrap());
    assert_eq!(entry.creator, "carol");
    assert_eq!(entry.feature_str("title"), Some("Gear"));
}

#[tokio::test]
async fn handler_trait_object_dispatches() {
    let handler: Arc<dyn CommandHandler> = Arc::new(applicator().await);
    let applied = handler
        .handle(&Command::features_replaced("widgets", w1(), "alice", features()))
        .await
        .unwrap();
    assert!(matches!(applied, Applied::Entry(_)));
}

// ── Invalid commands ────────────────────────────────────────────

#[tokio::test]
async fn unknown_right_character_is_invalid() {
    let app = applicator().await;
    app.apply(&Command::features_replaced("widgets", w1(), "alice", features()))
        .await
        .unwrap();
    let err = app
        .apply(&Command::rights_granted("widgets", w1(), "alice", Principal::user("bob"), "rq"))
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::InvalidCommand(_)));
}

#[tokio::test]
async fn empty_rights_are_invalid() {
    let app = applicator().await;
    let err = app
        .apply(&Command::rights_revoked(
            "widgets",
            w1(),
            "alice",
            Principal::user("bob"),
            Some(String::new()),
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::InvalidCommand(_)));
}

#[tokio::test]
async fn grant_on_unseen_entry_is_not_found() {
    let app = applicator().await;
    let err = app
        .apply(&Command::rights_granted("widgets", w1(), "alice", Principal::user("bob"), "r"))
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn unknown_kind_command() {
    let app = applicator().await;
    let err = app
        .apply(&Command::deleted("gadgets", w1(), "alice"))
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::UnknownKind(_)));
}
