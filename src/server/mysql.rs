//! Relational database routes.

use super::params::{
    bool_param, check_request_body, minutes_param, ok, soft_error, str_param, u64_param,
    usize_param,
};
use super::{duplicate_loader_response, resume_by_id, spawn_engine, AppState};
use crate::engine::{CrudEngine, EngineConfig};
use crate::registry::RegistryError;
use axum::extract::State;
use axum::response::Response;
use axum::Json;
use loader_core::{BackendKind, ContainerId, LoaderHandle};
use mysql_adapter::{MysqlAdapter, MysqlEndpoint};
use serde_json::{json, Value};
use std::sync::Arc;

const START_CHECKLIST: [&str; 7] = [
    "host",
    "port",
    "username",
    "password",
    "database_name",
    "table_name",
    "table_columns",
];

const ADDRESS_CHECKLIST: [&str; 6] = [
    "host",
    "port",
    "username",
    "password",
    "database_name",
    "table_name",
];

const RESTORE_CHECKLIST: [&str; 8] = [
    "host",
    "port",
    "username",
    "password",
    "doc_count",
    "database_name",
    "table_name",
    "table_columns",
];

fn parse_endpoint(params: &Value) -> Result<MysqlEndpoint, Response> {
    serde_json::from_value(params.clone()).map_err(|err| soft_error(err))
}

fn table_columns(params: &Value) -> Option<String> {
    params
        .get("table_columns")
        .and_then(Value::as_str)
        .map(|columns| columns.to_string())
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
    let database_name = str_param(&params, "database_name");
    let table_name = str_param(&params, "table_name");
    let init_config = bool_param(&params, "init_config", true);
    let target = u64_param(&params, "target_num_docs", 100);
    let buffer = u64_param(&params, "num_buffer", 500);
    let document_size = usize_param(&params, "document_size", docgen::DEFAULT_DOCUMENT_SIZE);
    let budget = minutes_param(&params, "duration_minutes");

    let container = ContainerId::Table {
        database: database_name.clone(),
        table: table_name.clone(),
    };
    // Reject duplicates before touching the backend; start() re-checks
    // under its gate.
    match state
        .registry
        .peek_running(BackendKind::Mysql, &container)
        .await
    {
        Ok(Some(existing)) => return duplicate_loader_response(&existing),
        Ok(None) => {}
        Err(err) => return super::params::internal_error(err),
    }

    let adapter = match MysqlAdapter::connect(
        &endpoint,
        &database_name,
        &table_name,
        table_columns(&params),
        init_config,
    )
    .await
    {
        Ok(adapter) => adapter,
        Err(err) => return ok(json!({"ERROR": err.to_string(), "status": "failed"})),
    };
    let config_digest = json!({
        "target_num_docs": target,
        "num_buffer": buffer,
        "document_size": document_size,
        "duration_minutes": params.get("duration_minutes"),
    });
    let (record, handle) = match state
        .registry
        .start(BackendKind::Mysql, container, config_digest)
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
    let adapter = match MysqlAdapter::connect(
        &endpoint,
        &str_param(&params, "database_name"),
        &str_param(&params, "table_name"),
        None,
        false,
    )
    .await
    {
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
        check_request_body(&params, &["host", "port", "username", "password", "database_name"])
    {
        return response;
    }
    let endpoint = match parse_endpoint(&params) {
        Ok(endpoint) => endpoint,
        Err(response) => return response,
    };
    let adapter = match MysqlAdapter::connect(
        &endpoint,
        &str_param(&params, "database_name"),
        "",
        None,
        false,
    )
    .await
    {
        Ok(adapter) => adapter,
        Err(err) => return soft_error(err),
    };
    match adapter.drop_database().await {
        Ok(()) => ok(json!({"response": "SUCCESS"})),
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
    let adapter = match MysqlAdapter::connect(
        &endpoint,
        &str_param(&params, "database_name"),
        &str_param(&params, "table_name"),
        None,
        false,
    )
    .await
    {
        Ok(adapter) => adapter,
        Err(err) => return soft_error(err),
    };
    match loader_core::BackendAdapter::drop_container(&adapter).await {
        Ok(()) => ok(json!({"response": "SUCCESS"})),
        Err(err) => soft_error(err),
    }
}

/// Re-converge the table onto `doc_count` rows, synchronously within the
/// request.
pub async fn restore(State(_state): State<AppState>, Json(params): Json<Value>) -> Response {
    if let Err(response) = check_request_body(&params, &RESTORE_CHECKLIST) {
        return response;
    }
    let endpoint = match parse_endpoint(&params) {
        Ok(endpoint) => endpoint,
        Err(response) => return response,
    };
    let doc_count = u64_param(&params, "doc_count", 0);
    let document_size = usize_param(&params, "document_size", docgen::DEFAULT_DOCUMENT_SIZE);
    let adapter = match MysqlAdapter::connect(
        &endpoint,
        &str_param(&params, "database_name"),
        &str_param(&params, "table_name"),
        table_columns(&params),
        true,
    )
    .await
    {
        Ok(adapter) => adapter,
        Err(err) => return soft_error(err),
    };
    if let Err(err) = loader_core::BackendAdapter::initialize_container(&adapter).await {
        return soft_error(err);
    }
    let engine = CrudEngine::new(
        Arc::new(adapter),
        EngineConfig::new(doc_count, 0).with_document_size(document_size),
    );
    match engine.reconcile(&LoaderHandle::new()).await {
        Ok(()) => ok(json!({"response": "SUCCESS"})),
        Err(err) => soft_error(err),
    }
}
