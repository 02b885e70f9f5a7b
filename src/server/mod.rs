//! HTTP control surface: thin axum routes translating requests into
//! registry and engine actions.

pub mod dynamo;
pub mod loaders;
pub mod mongo;
pub mod mysql;
pub mod params;
pub mod s3;

use crate::engine::CrudEngine;
use crate::registry::{LoaderRegistry, RegistryError, ResumeOutcome};
use axum::response::Response;
use axum::routing::{delete, get, post};
use axum::Router;
use loader_core::LoaderHandle;
use params::{conflict, internal_error, loader_body, str_param};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<LoaderRegistry>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(welcome))
        .route("/loaders", get(loaders::list_loaders))
        .route("/loaders/:loader_id", get(loaders::get_loader))
        .route("/mongo/start_loader", post(mongo::start_loader))
        .route("/mongo/stop_loader", post(loaders::stop_loader))
        .route("/mongo/count", get(mongo::count))
        .route("/mongo/delete_database", delete(mongo::delete_database))
        .route("/mongo/delete_collection", delete(mongo::delete_collection))
        .route("/dynamo/start_loader", post(dynamo::start_loader))
        .route("/dynamo/stop_loader", post(loaders::stop_loader))
        .route("/dynamo/count", get(dynamo::count))
        .route("/dynamo/delete_table", delete(dynamo::delete_table))
        .route("/mysql/start_loader", post(mysql::start_loader))
        .route("/mysql/stop_loader", post(loaders::stop_loader))
        .route("/mysql/count", get(mysql::count))
        .route("/mysql/delete_database", delete(mysql::delete_database))
        .route("/mysql/delete_table", delete(mysql::delete_table))
        .route("/mysql/restore", post(mysql::restore))
        .route("/s3/start_loader", post(s3::start_loader))
        .route("/s3/stop_loader", post(loaders::stop_loader))
        .route("/s3/count", get(s3::count))
        .route("/s3/delete_bucket", delete(s3::delete_bucket))
        .route("/s3/restore", post(s3::restore))
        .with_state(state)
}

async fn welcome() -> &'static str {
    "Welcome to the docload server"
}

/// Resume path shared by every `start_loader` handler when the request
/// names a `loader_id`: paused loaders resume, running loaders are an
/// idempotent success, terminal and unknown loaders are 409s.
pub(crate) async fn resume_by_id(state: &AppState, params: &Value) -> Response {
    let loader_id = str_param(params, "loader_id");
    match state.registry.resume(&loader_id).await {
        Ok(ResumeOutcome::Resumed(record)) => params::ok(loader_body(
            &record,
            Some(format!("Loader {loader_id} restarted successfully")),
        )),
        Ok(ResumeOutcome::AlreadyRunning(record)) => params::ok(loader_body(
            &record,
            Some(format!("Loader {loader_id} is already running")),
        )),
        Err(RegistryError::UnknownLoader(_)) => conflict(json!({
            "ERROR": format!("No loader found for loader_id {loader_id}"),
            "status": "failed",
        })),
        Err(RegistryError::Terminal(_, status)) => conflict(json!({
            "ERROR": format!(
                "Loader {loader_id} is {status} and cannot be restarted. Start a new loader."
            ),
            "status": "failed",
        })),
        Err(err) => internal_error(err),
    }
}

/// 409 body for a start request that lost the uniqueness guard.
pub(crate) fn duplicate_loader_response(existing: &loader_core::LoaderRecord) -> Response {
    let mut body = serde_json::Map::new();
    body.insert(
        "ERROR".to_string(),
        json!(format!(
            "There is already a loader running on {}. You can poll for the loader to be stopped",
            existing.container
        )),
    );
    body.insert("loader_id".to_string(), json!(existing.loader_id));
    body.extend(params::container_fields(existing));
    body.insert("status".to_string(), json!("failed"));
    conflict(Value::Object(body))
}

/// Detach a CRUD engine as the loader's background task. The task writes
/// the terminal status itself: `stopped` for a clean exit, `failed` when a
/// fatal adapter error surfaced.
pub(crate) fn spawn_engine(
    registry: Arc<LoaderRegistry>,
    loader_id: String,
    engine: CrudEngine,
    handle: LoaderHandle,
) {
    tokio::spawn(async move {
        match engine.run(handle).await {
            Ok(exit) => {
                info!("loader {loader_id} finished: {exit:?}");
                if let Err(err) = registry.mark_stopped(&loader_id).await {
                    warn!("could not persist stop of {loader_id}: {err}");
                }
            }
            Err(err) => {
                error!("loader {loader_id} failed: {err}");
                if let Err(err) = registry.mark_failed(&loader_id).await {
                    warn!("could not persist failure of {loader_id}: {err}");
                }
            }
        }
    });
}
