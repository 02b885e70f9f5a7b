//! Generic registry routes: listing, lookup, and the shared stop handler.

use super::params::{check_request_body, internal_error, loader_body, ok, str_param};
use super::AppState;
use crate::registry::StopOutcome;
use axum::extract::{Path, State};
use axum::response::Response;
use axum::Json;
use serde_json::{json, Value};

pub async fn list_loaders(State(state): State<AppState>) -> Response {
    match state.registry.list().await {
        Ok(records) => ok(json!(records)),
        Err(err) => internal_error(err),
    }
}

pub async fn get_loader(
    State(state): State<AppState>,
    Path(loader_id): Path<String>,
) -> Response {
    match state.registry.get(&loader_id).await {
        Ok(Some(record)) => ok(json!(record)),
        Ok(None) => ok(json!({
            "response": format!("No loader found with ID {loader_id}")
        })),
        Err(err) => internal_error(err),
    }
}

/// Stop is idempotent and soft: stopping an unknown or already stopped
/// loader reports the fact with a 200.
pub async fn stop_loader(State(state): State<AppState>, Json(params): Json<Value>) -> Response {
    if let Err(response) = check_request_body(&params, &["loader_id"]) {
        return response;
    }
    let loader_id = str_param(&params, "loader_id");
    match state.registry.stop(&loader_id).await {
        Ok(StopOutcome::Stopped(record)) => ok(loader_body(
            &record,
            Some(format!("Loader {loader_id} stopped successfully")),
        )),
        Ok(StopOutcome::NotRunning(_)) => ok(json!({
            "response": format!("Loader {loader_id} is not running")
        })),
        Ok(StopOutcome::Unknown) => ok(json!({
            "response": format!("No loader found with ID {loader_id}")
        })),
        Err(err) => internal_error(err),
    }
}
