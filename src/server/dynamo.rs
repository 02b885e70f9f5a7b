//! Wide-column (DynamoDB) routes.

use super::params::{
    check_request_body, conflict, minutes_param, ok, soft_error, str_param, u64_param, usize_param,
};
use super::{duplicate_loader_response, resume_by_id, spawn_engine, AppState};
use crate::engine::{CrudEngine, EngineConfig};
use crate::registry::RegistryError;
use axum::extract::State;
use axum::response::Response;
use axum::Json;
use dynamodb_adapter::{DynamoAdapter, DynamoEndpoint};
use loader_core::{BackendKind, ContainerId};
use serde_json::{json, Value};
use std::sync::Arc;

const START_CHECKLIST: [&str; 6] = [
    "access_key",
    "secret_key",
    "region",
    "primary_key_field",
    "table_name",
    "target_num_docs",
];

const ADDRESS_CHECKLIST: [&str; 4] = ["access_key", "secret_key", "region", "table_name"];

fn parse_endpoint(params: &Value) -> Result<DynamoEndpoint, Response> {
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
    let table_name = str_param(&params, "table_name");
    let primary_key = str_param(&params, "primary_key_field");
    let target = u64_param(&params, "target_num_docs", 0);
    let buffer = u64_param(&params, "num_buffer", 500);
    let document_size = usize_param(&params, "document_size", docgen::DEFAULT_DOCUMENT_SIZE);
    let budget = minutes_param(&params, "time_for_crud_in_mins");

    let container = ContainerId::DynamoTable {
        table: table_name.clone(),
    };
    // Reject duplicates before touching the backend; start() re-checks
    // under its gate.
    match state
        .registry
        .peek_running(BackendKind::Dynamo, &container)
        .await
    {
        Ok(Some(existing)) => return duplicate_loader_response(&existing),
        Ok(None) => {}
        Err(err) => return super::params::internal_error(err),
    }

    let adapter = match DynamoAdapter::connect(&endpoint, &table_name, &primary_key).await {
        Ok(adapter) => adapter,
        Err(err) => return ok(json!({"ERROR": err.to_string(), "status": "failed"})),
    };
    // Bad credentials are rejected before the loader is registered.
    if let Err(err) = adapter.probe_credentials().await {
        return conflict(json!({"ERROR": err.to_string(), "status": "failed"}));
    }
    let config_digest = json!({
        "target_num_docs": target,
        "num_buffer": buffer,
        "document_size": document_size,
        "primary_key_field": primary_key,
        "time_for_crud_in_mins": params.get("time_for_crud_in_mins"),
    });
    let (record, handle) = match state
        .registry
        .start(BackendKind::Dynamo, container, config_digest)
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
    let table_name = str_param(&params, "table_name");
    let adapter = match DynamoAdapter::connect(&endpoint, &table_name, "id").await {
        Ok(adapter) => adapter,
        Err(err) => return soft_error(err),
    };
    match loader_core::BackendAdapter::count(&adapter).await {
        Ok(count) => ok(json!({"count": count})),
        Err(err) => soft_error(err),
    }
}

pub async fn delete_table(State(_state): State<AppState>, Json(params): Json<Value>) -> Response {
    if let Err(response) = check_request_body(&params, &ADDRESS_CHECKLIST) {
        return response;
    }
    let endpoint = match parse_endpoint(&params) {
        Ok(endpoint) => endpoint,
        Err(response) => return response,
    };
    let table_name = str_param(&params, "table_name");
    let adapter = match DynamoAdapter::connect(&endpoint, &table_name, "id").await {
        Ok(adapter) => adapter,
        Err(err) => return soft_error(err),
    };
    match loader_core::BackendAdapter::drop_container(&adapter).await {
        Ok(()) => ok(json!({
            "response": format!("SUCCESS, table {table_name} deleted successfully")
        })),
        Err(err) => soft_error(err),
    }
}
