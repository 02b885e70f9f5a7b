//! Request validation and shared response shapes.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use loader_core::{ContainerId, LoaderRecord};
use serde_json::{json, Map, Value};
use std::time::Duration;

/// Verify that every field in `checklist` is present in the request body.
/// The first missing field produces the 422 response, which repeats the
/// whole checklist so callers can fix their request in one round.
pub fn check_request_body(params: &Value, checklist: &[&str]) -> Result<(), Response> {
    for field in checklist {
        if params.get(field).is_none() {
            return Err((
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({
                    "required_parameters": checklist,
                    "response": format!("{field} is a required parameter"),
                })),
            )
                .into_response());
        }
    }
    Ok(())
}

pub fn ok(body: Value) -> Response {
    (StatusCode::OK, Json(body)).into_response()
}

pub fn conflict(body: Value) -> Response {
    (StatusCode::CONFLICT, Json(body)).into_response()
}

pub fn internal_error(message: impl std::fmt::Display) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({"ERROR": message.to_string()})),
    )
        .into_response()
}

/// A 200 whose body carries the failure; most backend errors on the query
/// endpoints are reported this way rather than as HTTP failures.
pub fn soft_error(message: impl std::fmt::Display) -> Response {
    ok(json!({"error": message.to_string()}))
}

/// Container identifiers under their backend-specific response keys.
pub fn container_fields(record: &LoaderRecord) -> Map<String, Value> {
    let mut fields = Map::new();
    match &record.container {
        ContainerId::Collection {
            database,
            collection,
        } => {
            fields.insert("database".to_string(), json!(database));
            fields.insert("collection".to_string(), json!(collection));
        }
        ContainerId::Table { database, table } => {
            fields.insert("database".to_string(), json!(database));
            fields.insert("table".to_string(), json!(table));
        }
        ContainerId::DynamoTable { table } => {
            fields.insert("table".to_string(), json!(table));
        }
        ContainerId::Buckets { buckets } => {
            fields.insert("buckets".to_string(), json!(buckets));
        }
    }
    fields
}

/// Start/stop/resume response body: loader id, status, and the container
/// identifiers.
pub fn loader_body(record: &LoaderRecord, response: Option<String>) -> Value {
    let mut body = Map::new();
    if let Some(response) = response {
        body.insert("response".to_string(), json!(response));
    }
    body.insert("loader_id".to_string(), json!(record.loader_id));
    body.extend(container_fields(record));
    body.insert("status".to_string(), json!(record.status.as_str()));
    Value::Object(body)
}

pub fn str_param(params: &Value, key: &str) -> String {
    params
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Integer parameter that tolerates both JSON numbers and numeric strings.
pub fn u64_param(params: &Value, key: &str, default: u64) -> u64 {
    match params.get(key) {
        Some(Value::Number(n)) => n.as_u64().unwrap_or(default),
        Some(Value::String(s)) => s.parse().unwrap_or(default),
        _ => default,
    }
}

pub fn usize_param(params: &Value, key: &str, default: usize) -> usize {
    u64_param(params, key, default as u64) as usize
}

pub fn bool_param(params: &Value, key: &str, default: bool) -> bool {
    params.get(key).and_then(Value::as_bool).unwrap_or(default)
}

/// An optional duration given in (possibly fractional) minutes. Missing,
/// non-positive, and non-finite values all mean "no budget".
pub fn minutes_param(params: &Value, key: &str) -> Option<Duration> {
    let minutes = match params.get(key) {
        Some(Value::Number(n)) => n.as_f64()?,
        Some(Value::String(s)) => s.parse().ok()?,
        _ => return None,
    };
    if minutes.is_finite() && minutes > 0.0 {
        Some(Duration::from_secs_f64(minutes * 60.0))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checklist_names_first_missing_field() {
        let params = json!({"ip": "127.0.0.1"});
        let err = check_request_body(&params, &["ip", "port", "database_name"]).unwrap_err();
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);

        assert!(check_request_body(&params, &["ip"]).is_ok());
    }

    #[test]
    fn test_numeric_params_accept_strings() {
        let params = json!({"target_num_docs": "2500", "num_buffer": 10});
        assert_eq!(u64_param(&params, "target_num_docs", 0), 2500);
        assert_eq!(u64_param(&params, "num_buffer", 0), 10);
        assert_eq!(u64_param(&params, "missing", 7), 7);
    }

    #[test]
    fn test_minutes_param() {
        assert_eq!(
            minutes_param(&json!({"t": 2}), "t"),
            Some(Duration::from_secs(120))
        );
        assert_eq!(
            minutes_param(&json!({"t": 0.5}), "t"),
            Some(Duration::from_secs(30))
        );
        assert_eq!(minutes_param(&json!({"t": 0}), "t"), None);
        assert_eq!(minutes_param(&json!({}), "t"), None);
    }
}
