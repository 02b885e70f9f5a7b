//! End-to-end engine behavior over the in-memory adapter: convergence,
//! band maintenance, cancellation liveness, and fatal-error handling.

use docload::engine::{CrudEngine, EngineConfig};
use docload::testing::MemoryAdapter;
use loader_core::{AdapterError, BackendAdapter, LoaderHandle};
use std::sync::Arc;
use std::time::Duration;

fn engine_over(adapter: Arc<MemoryAdapter>, config: EngineConfig) -> CrudEngine {
    CrudEngine::new(adapter, config)
}

#[tokio::test]
async fn test_phase_a_converges_up_to_exact_target() {
    let adapter = Arc::new(MemoryAdapter::document_db());
    let engine = engine_over(
        adapter.clone(),
        EngineConfig::new(250, 0).with_document_size(512),
    );
    engine.reconcile(&LoaderHandle::new()).await.unwrap();
    assert_eq!(adapter.len(), 250);
}

#[tokio::test]
async fn test_phase_a_converges_down_to_exact_target() {
    let adapter = Arc::new(MemoryAdapter::document_db());
    adapter.perturb_add(300);
    let engine = engine_over(
        adapter.clone(),
        EngineConfig::new(100, 0).with_document_size(512),
    );
    engine.reconcile(&LoaderHandle::new()).await.unwrap();
    assert_eq!(adapter.len(), 100);
}

#[tokio::test]
async fn test_time_budget_ends_with_exact_population() {
    let adapter = Arc::new(MemoryAdapter::document_db());
    let engine = engine_over(
        adapter.clone(),
        EngineConfig::new(60, 10)
            .with_document_size(512)
            .with_time_budget(Some(Duration::from_millis(300))),
    );
    let exit = engine.run(LoaderHandle::new()).await.unwrap();
    assert_eq!(exit, docload::engine::EngineExit::Completed);
    // The final reconciliation insists the population equals the target.
    assert_eq!(adapter.len(), 60);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_stop_is_observed_promptly() {
    let adapter = Arc::new(MemoryAdapter::document_db());
    let engine = engine_over(
        adapter.clone(),
        EngineConfig::new(40, 5).with_document_size(512),
    );
    let handle = LoaderHandle::new();
    let task_handle = handle.clone();
    let task = tokio::spawn(async move { engine.run(task_handle).await });

    // Let the loader converge and run some steady-state iterations.
    tokio::time::sleep(Duration::from_millis(200)).await;
    handle.stop();

    let exit = tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("stop was not observed in time")
        .unwrap()
        .unwrap();
    assert_eq!(exit, docload::engine::EngineExit::Stopped);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_band_recovers_from_external_perturbation() {
    let adapter = Arc::new(MemoryAdapter::document_db());
    let engine = engine_over(
        adapter.clone(),
        EngineConfig::new(100, 10).with_document_size(512),
    );
    let handle = LoaderHandle::new();
    let task_handle = handle.clone();
    let task = tokio::spawn(async move { engine.run(task_handle).await });

    // Wait for initial convergence into the band.
    wait_until(
        || {
            let len = adapter.len();
            (90..=110).contains(&len)
        },
        Duration::from_secs(10),
    )
    .await;

    // An external writer floods the container; the loop must pull the
    // population back inside [90, 110].
    adapter.perturb_add(500);
    wait_until(
        || {
            let len = adapter.len();
            (90..=110).contains(&len)
        },
        Duration::from_secs(10),
    )
    .await;

    // And the same from below.
    adapter.perturb_remove(80);
    wait_until(
        || {
            let len = adapter.len();
            (90..=110).contains(&len)
        },
        Duration::from_secs(10),
    )
    .await;

    handle.stop();
    let _ = tokio::time::timeout(Duration::from_secs(5), task).await;
}

#[tokio::test]
async fn test_fatal_error_terminates_the_run() {
    let adapter = Arc::new(MemoryAdapter::document_db());
    adapter.fail_counts_fatally();
    let engine = engine_over(adapter, EngineConfig::new(50, 0).with_document_size(512));
    let err = engine.run(LoaderHandle::new()).await.unwrap_err();
    assert!(err.is_fatal());
    assert!(matches!(err, AdapterError::Auth(_)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_paused_engine_still_honors_stop() {
    let adapter = Arc::new(MemoryAdapter::document_db());
    let engine = engine_over(
        adapter.clone(),
        EngineConfig::new(20, 5).with_document_size(512),
    );
    let handle = LoaderHandle::new();
    handle.pause();
    let task_handle = handle.clone();
    let task = tokio::spawn(async move { engine.run(task_handle).await });

    // Phase A still converges; Phase B then idles in the paused state.
    wait_until(|| adapter.len() == 20, Duration::from_secs(10)).await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    handle.stop();
    let exit = tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("stop was not observed while paused")
        .unwrap()
        .unwrap();
    assert_eq!(exit, docload::engine::EngineExit::Stopped);
}

#[tokio::test]
async fn test_generated_documents_reach_the_backend_intact() {
    let adapter = Arc::new(MemoryAdapter::document_db());
    let engine = engine_over(
        adapter.clone(),
        EngineConfig::new(5, 0).with_document_size(2048),
    );
    engine.reconcile(&LoaderHandle::new()).await.unwrap();

    let key = adapter.pick_random_key().await.unwrap().unwrap();
    let document = adapter.get(&key.to_string()).unwrap();
    assert_eq!(document["type"], "Hotel");
    let serialized = serde_json::to_string(&document).unwrap();
    assert!(serialized.len().abs_diff(2048) <= 1);
}

async fn wait_until<F: Fn() -> bool>(predicate: F, timeout: Duration) {
    let started = std::time::Instant::now();
    while !predicate() {
        if started.elapsed() > timeout {
            panic!("condition not reached within {timeout:?}");
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
