//! Control-surface tests driven through the router in process: greeting,
//! request validation, registry-backed listing, and the soft stop paths.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use docload::registry::store::MemoryRegistryStore;
use docload::registry::LoaderRegistry;
use docload::server::{router, AppState};
use loader_core::{BackendKind, ContainerId};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::util::ServiceExt;

fn test_app() -> (Router, Arc<LoaderRegistry>) {
    let registry = Arc::new(LoaderRegistry::new(Arc::new(MemoryRegistryStore::new())));
    let app = router(AppState {
        registry: registry.clone(),
    });
    (app, registry)
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Vec<u8>) {
    let request = match body {
        Some(body) => Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, bytes.to_vec())
}

async fn send_json(app: &Router, method: &str, uri: &str, body: Value) -> (StatusCode, Value) {
    let (status, bytes) = send(app, method, uri, Some(body)).await;
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

#[tokio::test]
async fn test_root_greeting() {
    let (app, _registry) = test_app();
    let (status, bytes) = send(&app, "GET", "/", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        String::from_utf8(bytes).unwrap(),
        "Welcome to the docload server"
    );
}

#[tokio::test]
async fn test_missing_fields_yield_422_with_checklist() {
    let (app, _registry) = test_app();
    let (status, body) = send_json(
        &app,
        "POST",
        "/mongo/start_loader",
        json!({"ip": "127.0.0.1", "port": 27017}),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["response"], "username is a required parameter");
    let checklist = body["required_parameters"].as_array().unwrap();
    assert!(checklist.iter().any(|f| f == "target_num_docs"));
}

#[tokio::test]
async fn test_stop_requires_loader_id() {
    let (app, _registry) = test_app();
    for path in [
        "/mongo/stop_loader",
        "/dynamo/stop_loader",
        "/mysql/stop_loader",
        "/s3/stop_loader",
    ] {
        let (status, body) = send_json(&app, "POST", path, json!({})).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["response"], "loader_id is a required parameter");
    }
}

#[tokio::test]
async fn test_stop_of_unknown_loader_is_a_soft_200() {
    let (app, _registry) = test_app();
    let loader_id = "3f2b54e0-0000-0000-0000-000000000000";
    let (status, body) = send_json(
        &app,
        "POST",
        "/mongo/stop_loader",
        json!({"loader_id": loader_id}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["response"],
        format!("No loader found with ID {loader_id}")
    );
}

#[tokio::test]
async fn test_stop_and_restop_of_registered_loader() {
    let (app, registry) = test_app();
    let (record, _handle) = registry
        .start(
            BackendKind::Mongo,
            ContainerId::Collection {
                database: "travel".to_string(),
                collection: "hotels".to_string(),
            },
            json!({}),
        )
        .await
        .unwrap();

    let (status, body) = send_json(
        &app,
        "POST",
        "/mongo/stop_loader",
        json!({"loader_id": record.loader_id}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "stopped");
    assert_eq!(body["database"], "travel");
    assert_eq!(body["collection"], "hotels");

    // Idempotent second stop.
    let (status, body) = send_json(
        &app,
        "POST",
        "/mongo/stop_loader",
        json!({"loader_id": record.loader_id}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["response"],
        format!("Loader {} is not running", record.loader_id)
    );
}

#[tokio::test]
async fn test_restart_of_stopped_loader_is_rejected() {
    let (app, registry) = test_app();
    let (record, _handle) = registry
        .start(
            BackendKind::Mongo,
            ContainerId::Collection {
                database: "travel".to_string(),
                collection: "hotels".to_string(),
            },
            json!({}),
        )
        .await
        .unwrap();
    registry.stop(&record.loader_id).await.unwrap();

    let (status, body) = send_json(
        &app,
        "POST",
        "/mongo/start_loader",
        json!({
            "ip": "127.0.0.1",
            "port": 27017,
            "username": "",
            "password": "",
            "database_name": "travel",
            "collection_name": "hotels",
            "target_num_docs": 100,
            "loader_id": record.loader_id,
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["status"], "failed");
}

#[tokio::test]
async fn test_resume_of_unknown_loader_is_409() {
    let (app, _registry) = test_app();
    let (status, body) = send_json(
        &app,
        "POST",
        "/mysql/start_loader",
        json!({
            "host": "127.0.0.1",
            "port": 3306,
            "username": "root",
            "password": "root",
            "database_name": "shop",
            "table_name": "orders",
            "table_columns": "id CHAR(36) PRIMARY KEY",
            "loader_id": "not-a-known-loader",
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(
        body["ERROR"],
        "No loader found for loader_id not-a-known-loader"
    );
}

#[tokio::test]
async fn test_resume_of_paused_loader_via_start() {
    let (app, registry) = test_app();
    let (record, handle) = registry
        .start(
            BackendKind::Mongo,
            ContainerId::Collection {
                database: "travel".to_string(),
                collection: "hotels".to_string(),
            },
            json!({}),
        )
        .await
        .unwrap();
    registry.pause(&record.loader_id).await.unwrap();

    let (status, body) = send_json(
        &app,
        "POST",
        "/mongo/start_loader",
        json!({
            "ip": "127.0.0.1",
            "port": 27017,
            "username": "",
            "password": "",
            "database_name": "travel",
            "collection_name": "hotels",
            "target_num_docs": 100,
            "loader_id": record.loader_id,
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "running");
    assert_eq!(
        body["response"],
        format!("Loader {} restarted successfully", record.loader_id)
    );
    assert_eq!(handle.state(), loader_core::LoaderState::Running);
}

#[tokio::test]
async fn test_loaders_listing_and_lookup() {
    let (app, registry) = test_app();
    let (status, body) = send_json(&app, "GET", "/loaders", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));

    let (record, _handle) = registry
        .start(
            BackendKind::S3,
            ContainerId::Buckets {
                buckets: vec!["docloadxxabcxx000".to_string()],
            },
            json!({"num_buckets": 1}),
        )
        .await
        .unwrap();

    let (status, body) = send_json(&app, "GET", "/loaders", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["loader_id"], record.loader_id);
    assert_eq!(body[0]["status"], "running");
    // Bucket lists persist as arrays in the container fields.
    assert_eq!(body[0]["database"], json!(["docloadxxabcxx000"]));

    let (status, body) = send_json(
        &app,
        "GET",
        &format!("/loaders/{}", record.loader_id),
        json!({}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["loader_id"], record.loader_id);

    let (status, body) = send_json(&app, "GET", "/loaders/unknown-id", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["response"], "No loader found with ID unknown-id");
}

#[tokio::test]
async fn test_duplicate_start_is_rejected_with_409() {
    let (app, registry) = test_app();
    // A loader already running on the pair; the HTTP start must lose the
    // uniqueness guard before it ever touches the backend.
    let (existing, _handle) = registry
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

    let (status, body) = send_json(
        &app,
        "POST",
        "/mysql/start_loader",
        json!({
            "host": "127.0.0.1",
            "port": 3306,
            "username": "root",
            "password": "root",
            "database_name": "shop",
            "table_name": "orders",
            "table_columns": "id CHAR(36) PRIMARY KEY",
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["loader_id"], existing.loader_id);
    assert_eq!(body["status"], "failed");
    assert_eq!(body["database"], "shop");
    assert_eq!(body["table"], "orders");
    assert!(body["ERROR"]
        .as_str()
        .unwrap()
        .starts_with("There is already a loader running on"));
}
