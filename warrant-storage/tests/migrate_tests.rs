use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use std::sync::Arc;
use warrant_storage::{
    AliasAction, DocumentStore, FaultPoint, IndexAdmin, IndexMigrator, IndexState, MemoryBackend,
    MigrationStep, StorageError,
};

fn mapping(version: u32) -> Value {
    json!({"properties": {"id": {"type": "keyword"}}, "_meta": {"version": version}})
}

async fn bootstrapped() -> (Arc<MemoryBackend>, IndexMigrator) {
    let backend = Arc::new(MemoryBackend::new());
    let migrator = IndexMigrator::new(backend.clone());
    migrator.bootstrap("widgets", &mapping(1)).await.unwrap();
    (backend, migrator)
}

async fn fill(backend: &MemoryBackend, count: usize) {
    for i in 0..count {
        let id = format!("w{i}");
        backend
            .put("widgets", &id, &json!({"id": id, "features": {"n": i}}), None)
            .await
            .unwrap();
    }
}

fn step_of(err: StorageError) -> MigrationStep {
    match err {
        StorageError::MigrationFailure { step, .. } => step,
        other => panic!("expected migration failure, got {other:?}"),
    }
}

// ── Naming ───────────────────────────────────────────────────────

#[test]
fn versions_come_from_trailing_digits() {
    assert_eq!(IndexMigrator::index_name("widgets", 3), "widgets_v3");
    assert_eq!(IndexMigrator::parse_version("widgets_v3"), Some(3));
    assert_eq!(IndexMigrator::parse_version("my_kind_v12"), Some(12));
    assert_eq!(IndexMigrator::parse_version("widgets"), None);
}

// ── Bootstrap ────────────────────────────────────────────────────

#[tokio::test]
async fn bootstrap_creates_first_version() {
    let backend = Arc::new(MemoryBackend::new());
    let migrator = IndexMigrator::new(backend.clone());
    assert_eq!(migrator.inspect("widgets").await.unwrap(), IndexState::NoIndex);

    let state = migrator.bootstrap("widgets", &mapping(1)).await.unwrap();
    assert_eq!(
        state,
        IndexState::Stable {
            index: "widgets_v1".into(),
            version: 1
        }
    );
    assert_eq!(backend.get_alias("widgets").await.unwrap(), vec!["widgets_v1"]);
    assert_eq!(backend.mapping("widgets_v1").await, Some(mapping(1)));
}

#[tokio::test]
async fn bootstrap_is_a_no_op_when_bound() {
    let (backend, migrator) = bootstrapped().await;
    fill(&backend, 3).await;
    let state = migrator.bootstrap("widgets", &mapping(9)).await.unwrap();
    assert_eq!(
        state,
        IndexState::Stable {
            index: "widgets_v1".into(),
            version: 1
        }
    );
    assert_eq!(backend.indices().await, vec!["widgets_v1"]);
    assert_eq!(backend.doc_count("widgets").await.unwrap(), 3);
}

#[tokio::test]
async fn bootstrap_binds_leftover_first_index() {
    let backend = Arc::new(MemoryBackend::new());
    backend.create_index("widgets_v1", &mapping(1)).await.unwrap();
    let migrator = IndexMigrator::new(backend.clone());
    migrator.bootstrap("widgets", &mapping(1)).await.unwrap();
    assert_eq!(backend.get_alias("widgets").await.unwrap(), vec!["widgets_v1"]);
}

// ── Mapping migration ────────────────────────────────────────────

#[tokio::test]
async fn migration_preserves_every_document() {
    let (backend, migrator) = bootstrapped().await;
    fill(&backend, 5_000).await;

    let report = migrator.migrate_mapping("widgets", &mapping(2)).await.unwrap();
    assert_eq!(report.from, "widgets_v1");
    assert_eq!(report.to, "widgets_v2");
    assert_eq!(report.documents, 5_000);

    assert_eq!(backend.get_alias("widgets").await.unwrap(), vec!["widgets_v2"]);
    assert_eq!(backend.doc_count("widgets_v2").await.unwrap(), 5_000);
    assert!(!backend.index_exists("widgets_v1").await.unwrap());
    assert_eq!(backend.mapping("widgets_v2").await, Some(mapping(2)));
}

#[tokio::test]
async fn successive_migrations_increment_version() {
    let (backend, migrator) = bootstrapped().await;
    fill(&backend, 10).await;
    migrator.migrate_mapping("widgets", &mapping(2)).await.unwrap();
    let report = migrator.migrate_mapping("widgets", &mapping(3)).await.unwrap();
    assert_eq!(report.to, "widgets_v3");
    assert_eq!(backend.indices().await, vec!["widgets_v3"]);
    assert_eq!(
        migrator.inspect("widgets").await.unwrap(),
        IndexState::Stable {
            index: "widgets_v3".into(),
            version: 3
        }
    );
}

#[tokio::test]
async fn migration_without_alias_is_not_found() {
    let backend = Arc::new(MemoryBackend::new());
    let migrator = IndexMigrator::new(backend);
    assert!(matches!(
        migrator.migrate_mapping("widgets", &mapping(2)).await.unwrap_err(),
        StorageError::NotFound(_)
    ));
}

// ── Failure handling ─────────────────────────────────────────────

#[tokio::test]
async fn create_failure_leaves_everything_untouched() {
    let (backend, migrator) = bootstrapped().await;
    backend.inject_fault(FaultPoint::CreateIndex);
    let err = migrator.migrate_mapping("widgets", &mapping(2)).await.unwrap_err();
    assert_eq!(step_of(err), MigrationStep::CreateIndex);
    assert_eq!(backend.indices().await, vec!["widgets_v1"]);
    assert_eq!(backend.get_alias("widgets").await.unwrap(), vec!["widgets_v1"]);
}

#[tokio::test]
async fn reindex_document_failure_aborts_before_swap() {
    let (backend, migrator) = bootstrapped().await;
    fill(&backend, 5).await;
    backend.inject_fault(FaultPoint::ReindexDocument);

    let err = migrator.migrate_mapping("widgets", &mapping(2)).await.unwrap_err();
    assert_eq!(step_of(err), MigrationStep::Reindex);
    assert_eq!(backend.get_alias("widgets").await.unwrap(), vec!["widgets_v1"]);
    assert_eq!(
        migrator.inspect("widgets").await.unwrap(),
        IndexState::Migrating {
            from: "widgets_v1".into(),
            to: "widgets_v2".into()
        }
    );
}

#[tokio::test]
async fn swap_failure_orphans_new_index() {
    let (backend, migrator) = bootstrapped().await;
    fill(&backend, 5).await;
    backend.inject_fault(FaultPoint::UpdateAliases);

    let err = migrator.migrate_mapping("widgets", &mapping(2)).await.unwrap_err();
    assert_eq!(step_of(err), MigrationStep::SwapAlias);
    assert_eq!(backend.get_alias("widgets").await.unwrap(), vec!["widgets_v1"]);
    assert!(backend.index_exists("widgets_v2").await.unwrap());
}

#[tokio::test]
async fn delete_failure_is_reported_after_cutover() {
    let (backend, migrator) = bootstrapped().await;
    fill(&backend, 5).await;
    backend.inject_fault(FaultPoint::DeleteIndex);

    let err = migrator.migrate_mapping("widgets", &mapping(2)).await.unwrap_err();
    assert_eq!(step_of(err), MigrationStep::DeleteOld);
    assert_eq!(backend.get_alias("widgets").await.unwrap(), vec!["widgets_v2"]);
    assert!(backend.index_exists("widgets_v1").await.unwrap());
}

#[tokio::test]
async fn interrupted_migration_blocks_the_next_one() {
    let (backend, migrator) = bootstrapped().await;
    backend.inject_fault(FaultPoint::UpdateAliases);
    migrator.migrate_mapping("widgets", &mapping(2)).await.unwrap_err();

    let err = migrator.migrate_mapping("widgets", &mapping(2)).await.unwrap_err();
    assert_eq!(step_of(err), MigrationStep::Precheck);

    assert_eq!(
        migrator.remove_orphan("widgets").await.unwrap(),
        Some("widgets_v2".to_string())
    );
    assert_eq!(migrator.remove_orphan("widgets").await.unwrap(), None);
    migrator.migrate_mapping("widgets", &mapping(2)).await.unwrap();
}

#[tokio::test]
async fn alias_on_two_indices_is_inconsistent() {
    let (backend, migrator) = bootstrapped().await;
    backend.create_index("widgets_v2", &mapping(2)).await.unwrap();
    backend
        .update_aliases(&[AliasAction::Add {
            index: "widgets_v2".into(),
            alias: "widgets".into(),
        }])
        .await
        .unwrap();

    match migrator.inspect("widgets").await.unwrap_err() {
        StorageError::Inconsistent { alias, indices } => {
            assert_eq!(alias, "widgets");
            assert_eq!(indices, vec!["widgets_v1", "widgets_v2"]);
        }
        other => panic!("expected inconsistency, got {other:?}"),
    }
    assert!(matches!(
        migrator.migrate_mapping("widgets", &mapping(3)).await.unwrap_err(),
        StorageError::Inconsistent { .. }
    ));
}

#[tokio::test]
async fn last_possible_version_cannot_migrate() {
    let backend = Arc::new(MemoryBackend::new());
    let migrator = IndexMigrator::new(backend.clone());
    let last = IndexMigrator::index_name("widgets", u32::MAX);
    backend.create_index(&last, &mapping(1)).await.unwrap();
    backend
        .update_aliases(&[AliasAction::Add {
            index: last.clone(),
            alias: "widgets".into(),
        }])
        .await
        .unwrap();

    assert_eq!(
        migrator.inspect("widgets").await.unwrap(),
        IndexState::Stable {
            index: "widgets_v4294967295".into(),
            version: u32::MAX
        }
    );
    let err = migrator.migrate_mapping("widgets", &mapping(2)).await.unwrap_err();
    assert_eq!(step_of(err), MigrationStep::Precheck);
    assert_eq!(backend.get_alias("widgets").await.unwrap(), vec![last]);
}
