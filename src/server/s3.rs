//! Object-store routes.

use super::params::{check_request_body, minutes_param, ok, soft_error, str_param, usize_param};
use super::{duplicate_loader_response, resume_by_id, AppState};
use crate::engine::object_store::{ObjectStoreEngine, ObjectStoreEngineConfig};
use crate::registry::RegistryError;
use axum::extract::State;
use axum::response::Response;
use axum::Json;
use loader_core::{BackendKind, ContainerId};
use rand::Rng;
use s3_adapter::{ObjectStoreConfig, S3Client, TreeBuilder};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, info, warn};

const START_CHECKLIST: [&str; 7] = [
    "access_key",
    "secret_key",
    "region",
    "num_buckets",
    "depth_level",
    "num_folders_per_level",
    "num_files_per_level",
];

const RESTORE_CHECKLIST: [&str; 8] = [
    "access_key",
    "secret_key",
    "region",
    "num_buckets",
    "depth_level",
    "num_folders_per_level",
    "num_files_per_level",
    "bucket_name",
];

fn parse_config(params: &Value) -> Result<ObjectStoreConfig, Response> {
    serde_json::from_value(params.clone()).map_err(|err| soft_error(err))
}

async fn client_for(config: &ObjectStoreConfig) -> Arc<S3Client> {
    Arc::new(
        S3Client::connect(
            &config.access_key,
            &config.secret_key,
            config.session_token.clone(),
            &config.region,
        )
        .await,
    )
}

fn bucket_name(index: u32) -> String {
    let mut rng = rand::rng();
    let tag: String = (0..10)
        .map(|_| {
            let set = b"abcdefghijklmnopqrstuvwxyz0123456789";
            set[rng.random_range(0..set.len())] as char
        })
        .collect();
    format!("docloadxx{tag}xx{index}{index}{index}")
}

pub async fn start_loader(State(state): State<AppState>, Json(params): Json<Value>) -> Response {
    if let Err(response) = check_request_body(&params, &START_CHECKLIST) {
        return response;
    }
    if params.get("loader_id").is_some() {
        return resume_by_id(&state, &params).await;
    }

    let config = match parse_config(&params) {
        Ok(config) => config,
        Err(response) => return response,
    };
    let max_files = usize_param(
        &params,
        "max_files",
        config.num_files_per_level as usize + 10,
    );
    let min_files = usize_param(&params, "min_files", 1);
    let budget = minutes_param(&params, "duration_minutes");

    let client = client_for(&config).await;

    // Seed the buckets and their trees before any CRUD begins.
    let mut buckets = Vec::with_capacity(config.num_buckets as usize);
    for index in 0..config.num_buckets {
        let bucket = bucket_name(index);
        match client.create_bucket(&bucket).await {
            Ok(_) => buckets.push(bucket),
            Err(err) => {
                return ok(json!({
                    "response": "Failed to create bucket",
                    "error": err.to_string(),
                }))
            }
        }
    }
    let builder = TreeBuilder::new(client.clone(), config.clone());
    for bucket in &buckets {
        if let Err(err) = builder.build_bucket(bucket).await {
            return ok(json!({
                "response": format!("Failed to seed bucket {bucket}"),
                "error": err.to_string(),
            }));
        }
    }
    info!("created and seeded buckets {buckets:?}");

    let container = ContainerId::Buckets {
        buckets: buckets.clone(),
    };
    let config_digest = json!({
        "num_buckets": config.num_buckets,
        "depth_level": config.depth_level,
        "num_folders_per_level": config.num_folders_per_level,
        "num_files_per_level": config.num_files_per_level,
        "file_size": config.file_size,
        "max_files": max_files,
        "min_files": min_files,
        "duration_minutes": params.get("duration_minutes"),
    });
    let (record, handle) = match state
        .registry
        .start(BackendKind::S3, container, config_digest)
        .await
    {
        Ok(started) => started,
        Err(RegistryError::AlreadyRunning(existing)) => {
            return duplicate_loader_response(&existing)
        }
        Err(err) => return super::params::internal_error(err),
    };

    let engine = ObjectStoreEngine::new(
        client,
        config,
        ObjectStoreEngineConfig {
            max_files,
            min_files,
            time_budget: budget,
        },
        buckets,
    );
    let registry = state.registry.clone();
    let loader_id = record.loader_id.clone();
    tokio::spawn(async move {
        match engine.run(handle).await {
            Ok(()) => {
                if let Err(err) = registry.mark_stopped(&loader_id).await {
                    warn!("could not persist stop of {loader_id}: {err}");
                }
            }
            Err(err) => {
                error!("s3 loader {loader_id} failed: {err}");
                if let Err(err) = registry.mark_failed(&loader_id).await {
                    warn!("could not persist failure of {loader_id}: {err}");
                }
            }
        }
    });

    ok(super::params::loader_body(&record, None))
}

pub async fn count(State(_state): State<AppState>, Json(params): Json<Value>) -> Response {
    if let Err(response) =
        check_request_body(&params, &["access_key", "secret_key", "bucket_name"])
    {
        return response;
    }
    let region = match params.get("region").and_then(Value::as_str) {
        Some(region) => region.to_string(),
        None => "us-east-1".to_string(),
    };
    let client = S3Client::connect(
        &str_param(&params, "access_key"),
        &str_param(&params, "secret_key"),
        params
            .get("session_token")
            .and_then(Value::as_str)
            .map(String::from),
        &region,
    )
    .await;
    match client.count_objects(&str_param(&params, "bucket_name")).await {
        Ok(count) => ok(json!({"count": count})),
        Err(err) => soft_error(err),
    }
}

pub async fn delete_bucket(State(_state): State<AppState>, Json(params): Json<Value>) -> Response {
    if let Err(response) =
        check_request_body(&params, &["access_key", "secret_key", "bucket_name"])
    {
        return response;
    }
    let bucket = str_param(&params, "bucket_name");
    let region = match params.get("region").and_then(Value::as_str) {
        Some(region) => region.to_string(),
        None => "us-east-1".to_string(),
    };
    let client = S3Client::connect(
        &str_param(&params, "access_key"),
        &str_param(&params, "secret_key"),
        params
            .get("session_token")
            .and_then(Value::as_str)
            .map(String::from),
        &region,
    )
    .await;
    match client.delete_bucket(&bucket).await {
        Ok(()) => ok(json!({"response": format!("SUCCESS dropped bucket {bucket}")})),
        Err(err) => soft_error(err),
    }
}

/// Re-seed a drifted bucket back to its configured tree. The rebuild runs
/// detached; the response only acknowledges the kickoff.
pub async fn restore(State(_state): State<AppState>, Json(params): Json<Value>) -> Response {
    if let Err(response) = check_request_body(&params, &RESTORE_CHECKLIST) {
        return response;
    }
    let config = match parse_config(&params) {
        Ok(config) => config,
        Err(response) => return response,
    };
    let bucket = str_param(&params, "bucket_name");
    let client = client_for(&config).await;
    let builder = TreeBuilder::new(client.clone(), config);
    tokio::spawn(async move {
        if let Err(err) = client.log_bucket_structure(&bucket).await {
            warn!("could not list {bucket}: {err}");
        }
        if let Err(err) = builder.rebalance(&bucket).await {
            error!("restore of {bucket} failed: {err}");
        }
    });
    ok(json!({"response": "Success, restore started successfully"}))
}
