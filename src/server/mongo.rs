//! Document database routes.

use super::params::{
    check_request_body, minutes_param, ok, soft_error, str_param, u64_param, usize_param,
};
use super::{duplicate_loader_response, resume_by_id, spawn_engine, AppState};
use crate::engine::{CrudEngine, EngineConfig};
use crate::registry::RegistryError;
use axum::extract::State;
use axum::response::Response;
use axum::Json;
use loader_core::{BackendKind, ContainerId};
use mongodb_adapter::{MongoAdapter, MongoEndpoint};
use serde_json::{json, Value};
use std::sync::Arc;

const START_CHECKLIST: [&str; 7] = [
    "ip",
    "port",
    "username",
    "password",
    "database_name",
    "collection_name",
    "target_num_docs",
];

const ADDRESS_CHECKLIST: [&str; 6] = [
    "ip",
    "port",
    "username",
    "password",
    "database_name",
    "collection_name",
];

fn parse_endpoint(params: &Value) -> Result<MongoEndpoint, Response> {
    serde_json::from_value(params.clone()).map_err(|err| soft_error(err))
}

pub async fn start_loader(State(state): State<AppState>, Json(params): Json<Value>) -> Response {
    if let Err(response) = check_request_body(&params, &START_CHECKLIST) {
        return response;
    }
    if params.get("loader_id").is_some() {
        return resume_by_id(&state, &params).await;
    }

    let endpoint = match parse_endpoint(&params) {
        Ok(endpoint) => endpoint,
        Err(response) => return response,
    };
    let collection_name = str_param(&params, "collection_name");
    let target = u64_param(&params, "target_num_docs", 0);
    let buffer = u64_param(&params, "num_buffer", 500);
    let document_size = usize_param(&params, "document_size", docgen::DEFAULT_DOCUMENT_SIZE);
    let budget = minutes_param(&params, "time_for_crud_in_mins");

    let container = ContainerId::Collection {
        database: endpoint.database_name.clone(),
        collection: collection_name.clone(),
    };
    // Reject duplicates before touching the backend; start() re-checks
    // under its gate.
    match state.registry.peek_running(BackendKind::Mongo, &container).await {
        Ok(Some(existing)) => return duplicate_loader_response(&existing),
        Ok(None) => {}
        Err(err) => return super::params::internal_error(err),
    }

    let adapter = match MongoAdapter::connect(&endpoint, &collection_name).await {
        Ok(adapter) => adapter,
        Err(err) => return ok(json!({"ERROR": err.to_string(), "status": "failed"})),
    };
    let config_digest = json!({
        "target_num_docs": target,
        "num_buffer": buffer,
        "document_size": document_size,
        "time_for_crud_in_mins": params.get("time_for_crud_in_mins"),
    });
    let (record, handle) = match state
        .registry
        .start(BackendKind::Mongo, container, config_digest)
        .await
    {
        Ok(started) => started,
        Err(RegistryError::AlreadyRunning(existing)) => {
            return duplicate_loader_response(&existing)
        }
        Err(err) => return super::params::internal_error(err),
    };

    let engine_config = EngineConfig::new(target, buffer)
        .with_document_size(document_size)
        .with_time_budget(budget);
    let engine = CrudEngine::new(Arc::new(adapter), engine_config);
    spawn_engine(
        state.registry.clone(),
        record.loader_id.clone(),
        engine,
        handle,
    );

    ok(super::params::loader_body(&record, None))
}

pub async fn count(State(_state): State<AppState>, Json(params): Json<Value>) -> Response {
    if let Err(response) = check_request_body(&params, &ADDRESS_CHECKLIST) {
        return response;
    }
    let endpoint = match parse_endpoint(&params) {
        Ok(endpoint) => endpoint,
        Err(response) => return response,
    };
    let collection_name = str_param(&params, "collection_name");
    let adapter = match MongoAdapter::connect(&endpoint, &collection_name).await {
        Ok(adapter) => adapter,
        Err(err) => return soft_error(err),
    };
    match loader_core::BackendAdapter::count(&adapter).await {
        Ok(count) => ok(json!({"count": count})),
        Err(err) => soft_error(err),
    }
}

pub async fn delete_database(State(_state): State<AppState>, Json(params): Json<Value>) -> Response {
    if let Err(response) =
        check_request_body(&params, &["ip", "port", "username", "password", "database_name"])
    {
        return response;
    }
    let endpoint = match parse_endpoint(&params) {
        Ok(endpoint) => endpoint,
        Err(response) => return response,
    };
    let adapter = match MongoAdapter::connect(&endpoint, "").await {
        Ok(adapter) => adapter,
        Err(err) => return soft_error(err),
    };
    match adapter.drop_database().await {
        Ok(()) => ok(json!({"response": "SUCCESS"})),
        Err(err) => soft_error(err),
    }
}

pub async fn delete_collection(
    State(_state): State<AppState>,
    Json(params): Json<Value>,
) -> Response {
    if let Err(response) = check_request_body(&params, &ADDRESS_CHECKLIST) {
        return response;
    }
    let endpoint = match parse_endpoint(&params) {
        Ok(endpoint) => endpoint,
        Err(response) => return response,
    };
    let collection_name = str_param(&params, "collection_name");
    let adapter = match MongoAdapter::connect(&endpoint, &collection_name).await {
        Ok(adapter) => adapter,
        Err(err) => return soft_error(err),
    };
    match loader_core::BackendAdapter::drop_container(&adapter).await {
        Ok(()) => ok(json!({"response": "SUCCESS"})),
        Err(err) => soft_error(err),
    }
}
