//! Object-store variant of the CRUD loop.
//!
//! Instead of one flat container, the loader drives every bucket in
//! parallel. Each per-bucket task repeatedly picks a folder path at a
//! random depth, lists it, and inserts or deletes a file using the band
//! logic against that folder's file count. The bucket tree is logged when
//! the task starts and again after every pause/resume cycle; when the
//! wall-clock budget runs out the bucket is rebalanced back to its seeded
//! shape.

use loader_core::{AdapterError, LoaderHandle, LoaderState};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use s3_adapter::{files, random_folder_path, ObjectStoreConfig, S3Client, TreeBuilder};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

const PAUSE_POLL: Duration = Duration::from_millis(250);
const ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Per-folder population band and optional wall-clock budget.
#[derive(Debug, Clone)]
pub struct ObjectStoreEngineConfig {
    pub max_files: usize,
    pub min_files: usize,
    pub time_budget: Option<Duration>,
}

/// Drives CRUD over every bucket concurrently until cancellation (or the
/// budget elapses, which triggers a rebalance of each bucket).
pub struct ObjectStoreEngine {
    client: Arc<S3Client>,
    store_config: ObjectStoreConfig,
    engine_config: ObjectStoreEngineConfig,
    buckets: Vec<String>,
}

impl ObjectStoreEngine {
    pub fn new(
        client: Arc<S3Client>,
        store_config: ObjectStoreConfig,
        engine_config: ObjectStoreEngineConfig,
        buckets: Vec<String>,
    ) -> Self {
        Self {
            client,
            store_config,
            engine_config,
            buckets,
        }
    }

    pub async fn run(&self, handle: LoaderHandle) -> Result<(), AdapterError> {
        let mut tasks = Vec::with_capacity(self.buckets.len());
        for bucket in &self.buckets {
            let client = self.client.clone();
            let store_config = self.store_config.clone();
            let engine_config = self.engine_config.clone();
            let bucket = bucket.clone();
            let handle = handle.clone();
            tasks.push(tokio::spawn(async move {
                bucket_crud(client, store_config, engine_config, bucket, handle).await;
            }));
        }
        for task in tasks {
            if let Err(err) = task.await {
                warn!("bucket task aborted: {err}");
            }
        }
        info!("object-store CRUD complete for all buckets");
        Ok(())
    }
}

async fn log_structure(client: &S3Client, bucket: &str) {
    if let Err(err) = client.log_bucket_structure(bucket).await {
        warn!("could not list {bucket}: {err}");
    }
}

async fn bucket_crud(
    client: Arc<S3Client>,
    store_config: ObjectStoreConfig,
    engine_config: ObjectStoreEngineConfig,
    bucket: String,
    handle: LoaderHandle,
) {
    log_structure(&client, &bucket).await;

    let formats = store_config.formats();
    let started = Instant::now();
    let mut rng = StdRng::from_os_rng();
    // The tree listing is reprinted once after each pause/resume cycle.
    let mut printed_since_resume = true;

    loop {
        match handle.state() {
            LoaderState::Stopped => return,
            LoaderState::Paused => {
                printed_since_resume = false;
                tokio::select! {
                    _ = handle.cancelled() => {}
                    _ = tokio::time::sleep(PAUSE_POLL) => {}
                }
                continue;
            }
            LoaderState::Running => {
                if !printed_since_resume {
                    log_structure(&client, &bucket).await;
                    printed_since_resume = true;
                }
            }
        }
        if let Some(budget) = engine_config.time_budget {
            if started.elapsed() >= budget {
                break;
            }
        }

        let depth = rng.random_range(0..store_config.depth_level.max(1));
        let folder_path = random_folder_path(&mut rng, store_config.num_folders_per_level, depth);

        let existing = match client.list_files_in_folder(&bucket, &folder_path).await {
            Ok(files) => files,
            Err(err) => {
                warn!("listing {bucket}/{folder_path}: {err}");
                tokio::time::sleep(ERROR_BACKOFF).await;
                continue;
            }
        };

        let insert = rng.random_bool(0.5);
        if insert && existing.len() < engine_config.max_files {
            let format = formats[rng.random_range(0..formats.len())];
            let file_name = format!("{}.{}", rng.random_range(0..=100), format.extension());
            let record = files::generate(&mut rng, store_config.file_size);
            let content = match files::render(format, &record) {
                Ok(content) => content,
                Err(err) => {
                    warn!("rendering {format:?} file: {err}");
                    continue;
                }
            };
            let key = format!("{folder_path}{file_name}");
            info!("inserting file {file_name} at {bucket}/{key}");
            if let Err(err) = client.upload_object(&bucket, &key, content).await {
                warn!("upload of {key}: {err}");
            }
        } else if !insert && existing.len() > engine_config.min_files {
            if let Some(key) = existing.get(rng.random_range(0..existing.len())) {
                info!("deleting file at {bucket}/{key}");
                if let Err(err) = client.delete_object(&bucket, key).await {
                    warn!("delete of {key}: {err}");
                }
            }
        }
    }

    // Budget elapsed: show the drifted tree, then restore the seeded shape.
    info!("CRUD complete for bucket {bucket}");
    log_structure(&client, &bucket).await;
    let builder = TreeBuilder::new(client.clone(), store_config);
    if let Err(err) = builder.rebalance(&bucket).await {
        warn!("rebalance of {bucket}: {err}");
    }
    log_structure(&client, &bucket).await;
}
