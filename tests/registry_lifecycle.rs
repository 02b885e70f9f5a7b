//! Registry lifecycle semantics: the uniqueness guard, pause/resume/stop
//! transitions, idempotent stop, and crash recovery.

use docload::registry::store::{MemoryRegistryStore, RegistryStore};
use docload::registry::{LoaderRegistry, RegistryError, ResumeOutcome, StopOutcome};
use loader_core::{BackendKind, ContainerId, LoaderRecord, LoaderState, LoaderStatus};
use serde_json::json;
use std::sync::Arc;

fn hotels_container() -> ContainerId {
    ContainerId::Collection {
        database: "travel".to_string(),
        collection: "hotels".to_string(),
    }
}

fn registry() -> LoaderRegistry {
    LoaderRegistry::new(Arc::new(MemoryRegistryStore::new()))
}

#[tokio::test]
async fn test_at_most_one_running_loader_per_container() {
    let registry = registry();
    let (first, _handle) = registry
        .start(BackendKind::Mongo, hotels_container(), json!({}))
        .await
        .unwrap();

    let err = registry
        .start(BackendKind::Mongo, hotels_container(), json!({}))
        .await
        .unwrap_err();
    match err {
        RegistryError::AlreadyRunning(existing) => {
            assert_eq!(existing.loader_id, first.loader_id)
        }
        other => panic!("expected AlreadyRunning, got {other:?}"),
    }

    // A different collection is a different pair and may run concurrently.
    let other = ContainerId::Collection {
        database: "travel".to_string(),
        collection: "flights".to_string(),
    };
    registry
        .start(BackendKind::Mongo, other, json!({}))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_stop_flips_handle_and_persists() {
    let registry = registry();
    let (record, handle) = registry
        .start(BackendKind::Mysql, hotels_container(), json!({}))
        .await
        .unwrap();

    match registry.stop(&record.loader_id).await.unwrap() {
        StopOutcome::Stopped(stopped) => assert_eq!(stopped.status, LoaderStatus::Stopped),
        other => panic!("expected Stopped, got {other:?}"),
    }
    assert!(handle.is_stopped());
    // The handle table no longer tracks a terminal loader.
    assert!(registry.handle(&record.loader_id).is_none());

    // Stop is idempotent once stopped.
    match registry.stop(&record.loader_id).await.unwrap() {
        StopOutcome::NotRunning(existing) => {
            assert_eq!(existing.status, LoaderStatus::Stopped)
        }
        other => panic!("expected NotRunning, got {other:?}"),
    }
}

#[tokio::test]
async fn test_stop_of_unknown_loader_is_soft() {
    let registry = registry();
    match registry.stop("no-such-loader").await.unwrap() {
        StopOutcome::Unknown => {}
        other => panic!("expected Unknown, got {other:?}"),
    }
}

#[tokio::test]
async fn test_pause_resume_cycle() {
    let registry = registry();
    let (record, handle) = registry
        .start(BackendKind::Mongo, hotels_container(), json!({}))
        .await
        .unwrap();

    let paused = registry.pause(&record.loader_id).await.unwrap();
    assert_eq!(paused.status, LoaderStatus::Paused);
    assert_eq!(handle.state(), LoaderState::Paused);
    // Paused loaders keep their handle.
    assert!(registry.handle(&record.loader_id).is_some());

    match registry.resume(&record.loader_id).await.unwrap() {
        ResumeOutcome::Resumed(resumed) => assert_eq!(resumed.status, LoaderStatus::Running),
        other => panic!("expected Resumed, got {other:?}"),
    }
    assert_eq!(handle.state(), LoaderState::Running);

    // Resuming a running loader is an idempotent observation.
    match registry.resume(&record.loader_id).await.unwrap() {
        ResumeOutcome::AlreadyRunning(running) => {
            assert_eq!(running.status, LoaderStatus::Running)
        }
        other => panic!("expected AlreadyRunning, got {other:?}"),
    }
}

#[tokio::test]
async fn test_stopped_is_terminal() {
    let registry = registry();
    let (record, _handle) = registry
        .start(BackendKind::Mongo, hotels_container(), json!({}))
        .await
        .unwrap();
    registry.stop(&record.loader_id).await.unwrap();

    let err = registry.resume(&record.loader_id).await.unwrap_err();
    assert!(matches!(
        err,
        RegistryError::Terminal(_, LoaderStatus::Stopped)
    ));

    // The container is free again: a fresh start gets a fresh id.
    let (fresh, _handle) = registry
        .start(BackendKind::Mongo, hotels_container(), json!({}))
        .await
        .unwrap();
    assert_ne!(fresh.loader_id, record.loader_id);
}

#[tokio::test]
async fn test_resume_of_unknown_loader_errors() {
    let registry = registry();
    let err = registry.resume("no-such-loader").await.unwrap_err();
    assert!(matches!(err, RegistryError::UnknownLoader(_)));
}

#[tokio::test]
async fn test_mark_failed_removes_handle() {
    let registry = registry();
    let (record, handle) = registry
        .start(BackendKind::Dynamo, hotels_container(), json!({}))
        .await
        .unwrap();

    registry.mark_failed(&record.loader_id).await.unwrap();
    assert!(handle.is_stopped());
    assert!(registry.handle(&record.loader_id).is_none());
    let failed = registry.get(&record.loader_id).await.unwrap().unwrap();
    assert_eq!(failed.status, LoaderStatus::Failed);
}

#[tokio::test]
async fn test_recovery_demotes_orphaned_rows() {
    // Simulate a restart: rows say running/paused but no process holds
    // their handles anymore.
    let store = Arc::new(MemoryRegistryStore::new());
    let orphan = LoaderRecord::new(BackendKind::Mongo, hotels_container(), json!({}));
    store.insert(&orphan).await.unwrap();
    let mut paused = LoaderRecord::new(
        BackendKind::Mysql,
        ContainerId::Table {
            database: "shop".to_string(),
            table: "orders".to_string(),
        },
        json!({}),
    );
    paused.status = LoaderStatus::Paused;
    store.insert(&paused).await.unwrap();

    let registry = LoaderRegistry::with_recovery(store).await.unwrap();
    for loader_id in [&orphan.loader_id, &paused.loader_id] {
        let record = registry.get(loader_id).await.unwrap().unwrap();
        assert_eq!(record.status, LoaderStatus::Failed);
    }

    // The demoted container is free for a fresh loader.
    registry
        .start(BackendKind::Mongo, hotels_container(), json!({}))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_list_and_get() {
    let registry = registry();
    assert!(registry.list().await.unwrap().is_empty());

    let (record, _handle) = registry
        .start(BackendKind::S3, ContainerId::Buckets {
            buckets: vec!["bucket-a".to_string(), "bucket-b".to_string()],
        }, json!({"num_buckets": 2}))
        .await
        .unwrap();

    let all = registry.list().await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].loader_id, record.loader_id);

    let fetched = registry.get(&record.loader_id).await.unwrap().unwrap();
    assert_eq!(fetched.container, record.container);
    assert!(registry.get("missing").await.unwrap().is_none());
}

#[tokio::test]
async fn test_stop_all_clears_every_handle() {
    let registry = registry();
    let (a, handle_a) = registry
        .start(BackendKind::Mongo, hotels_container(), json!({}))
        .await
        .unwrap();
    let (b, handle_b) = registry
        .start(
            BackendKind::Mysql,
            ContainerId::Table {
                database: "shop".to_string(),
                table: "orders".to_string(),
            },
            json!({}),
        )
        .await
        .unwrap();

    registry.stop_all().await;
    assert!(handle_a.is_stopped());
    assert!(handle_b.is_stopped());
    for loader_id in [&a.loader_id, &b.loader_id] {
        let record = registry.get(loader_id).await.unwrap().unwrap();
        assert_eq!(record.status, LoaderStatus::Stopped);
        assert!(registry.handle(loader_id).is_none());
    }
}
