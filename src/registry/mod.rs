//! Loader registry: id issuance, durable status records, the in-memory
//! cancellation-handle table, and the at-most-one-running-loader guard.

pub mod store;

use loader_core::{BackendKind, ContainerId, LoaderHandle, LoaderRecord, LoaderStatus};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use store::{RegistryStore, StoreError};
use thiserror::Error;
use tracing::{info, warn};

/// Registry operation failures, mapped onto HTTP statuses by the control
/// surface (conflicts and unknown ids are 409s, store failures are 500s).
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("a loader is already running on {}", .0.container)]
    AlreadyRunning(LoaderRecord),

    #[error("no loader found for loader_id {0}")]
    UnknownLoader(String),

    #[error("loader {0} is {1} and cannot be restarted")]
    Terminal(String, LoaderStatus),

    #[error("registry store error: {0}")]
    Store(#[from] StoreError),
}

/// Result of a stop request. Unknown loaders and already stopped loaders
/// are soft outcomes, not errors: stop is idempotent.
#[derive(Debug)]
pub enum StopOutcome {
    Stopped(LoaderRecord),
    NotRunning(LoaderRecord),
    Unknown,
}

/// Result of resuming via a start request that named a loader id.
#[derive(Debug)]
pub enum ResumeOutcome {
    Resumed(LoaderRecord),
    AlreadyRunning(LoaderRecord),
}

/// Process-wide bookkeeping of all known loaders.
///
/// Invariants:
/// - at most one `running` record per `(backend, container)` pair, enforced
///   under `start_gate` so concurrent start requests serialize;
/// - a handle is present in the in-memory table iff the persisted status is
///   `running` or `paused`.
///
/// The handle table uses a sync mutex and is never held across I/O.
pub struct LoaderRegistry {
    store: Arc<dyn RegistryStore>,
    handles: Mutex<HashMap<String, LoaderHandle>>,
    start_gate: tokio::sync::Mutex<()>,
}

impl LoaderRegistry {
    pub fn new(store: Arc<dyn RegistryStore>) -> Self {
        Self {
            store,
            handles: Mutex::new(HashMap::new()),
            start_gate: tokio::sync::Mutex::new(()),
        }
    }

    /// Build the registry and demote any `running`/`paused` rows left over
    /// from a previous process: their cancellation handles died with it,
    /// so the rows are marked `failed` to keep the handle/status invariant.
    pub async fn with_recovery(store: Arc<dyn RegistryStore>) -> Result<Self, RegistryError> {
        let registry = Self::new(store);
        for record in registry.store.find_all().await? {
            if !record.status.is_terminal() {
                warn!(
                    "demoting orphaned loader {} ({} on {}) to failed",
                    record.loader_id, record.backend, record.container
                );
                registry
                    .store
                    .update_status(&record.loader_id, LoaderStatus::Failed)
                    .await?;
            }
        }
        Ok(registry)
    }

    fn lock_handles(&self) -> std::sync::MutexGuard<'_, HashMap<String, LoaderHandle>> {
        match self.handles.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// The live handle for a loader, if one exists in this process.
    pub fn handle(&self, loader_id: &str) -> Option<LoaderHandle> {
        self.lock_handles().get(loader_id).cloned()
    }

    /// Unguarded read of the running loader for a pair, used by the
    /// control surface to reject duplicates before doing expensive
    /// backend work; [`LoaderRegistry::start`] re-checks under the gate.
    pub async fn peek_running(
        &self,
        backend: BackendKind,
        container: &ContainerId,
    ) -> Result<Option<LoaderRecord>, RegistryError> {
        Ok(self.store.find_running(backend, container).await?)
    }

    /// Register a new loader: reject when a running loader already owns the
    /// `(backend, container)` pair, otherwise allocate an id, persist the
    /// record, and hand back a fresh cancellation handle.
    ///
    /// The guard check and the insert happen under one async mutex so two
    /// concurrent starts cannot both pass the guard.
    pub async fn start(
        &self,
        backend: BackendKind,
        container: ContainerId,
        config: Value,
    ) -> Result<(LoaderRecord, LoaderHandle), RegistryError> {
        let _gate = self.start_gate.lock().await;
        if let Some(existing) = self.store.find_running(backend, &container).await? {
            return Err(RegistryError::AlreadyRunning(existing));
        }
        let record = LoaderRecord::new(backend, container, config);
        self.store.insert(&record).await?;
        let handle = LoaderHandle::new();
        self.lock_handles()
            .insert(record.loader_id.clone(), handle.clone());
        info!(
            "loader {} started ({} on {})",
            record.loader_id, record.backend, record.container
        );
        Ok((record, handle))
    }

    /// Resume a paused loader (or observe that it is already running).
    /// Terminal loaders cannot be resumed; a fresh start is required.
    pub async fn resume(&self, loader_id: &str) -> Result<ResumeOutcome, RegistryError> {
        let record = self
            .store
            .find(loader_id)
            .await?
            .ok_or_else(|| RegistryError::UnknownLoader(loader_id.to_string()))?;
        if record.status.is_terminal() {
            return Err(RegistryError::Terminal(loader_id.to_string(), record.status));
        }
        let handle = match self.handle(loader_id) {
            Some(handle) => handle,
            None => {
                // Status says live but the handle is gone (lost to a
                // restart); repair the invariant by failing the record.
                self.store
                    .update_status(loader_id, LoaderStatus::Failed)
                    .await?;
                return Err(RegistryError::Terminal(
                    loader_id.to_string(),
                    LoaderStatus::Failed,
                ));
            }
        };
        if record.status == LoaderStatus::Running {
            return Ok(ResumeOutcome::AlreadyRunning(record));
        }
        handle.resume();
        self.store
            .update_status(loader_id, LoaderStatus::Running)
            .await?;
        let mut record = record;
        record.status = LoaderStatus::Running;
        info!("loader {loader_id} resumed");
        Ok(ResumeOutcome::Resumed(record))
    }

    /// Pause a running loader: the handle flips first, then the status is
    /// persisted. The engine idles at its next iteration boundary.
    pub async fn pause(&self, loader_id: &str) -> Result<LoaderRecord, RegistryError> {
        let record = self
            .store
            .find(loader_id)
            .await?
            .ok_or_else(|| RegistryError::UnknownLoader(loader_id.to_string()))?;
        if record.status != LoaderStatus::Running {
            return Err(RegistryError::Terminal(loader_id.to_string(), record.status));
        }
        let handle = self
            .handle(loader_id)
            .ok_or_else(|| RegistryError::UnknownLoader(loader_id.to_string()))?;
        handle.pause();
        self.store
            .update_status(loader_id, LoaderStatus::Paused)
            .await?;
        let mut record = record;
        record.status = LoaderStatus::Paused;
        info!("loader {loader_id} paused");
        Ok(record)
    }

    /// Stop a loader. The status commit happens here, synchronously with
    /// the request; the loader task observes the flipped handle at its
    /// next iteration. Idempotent once stopped.
    pub async fn stop(&self, loader_id: &str) -> Result<StopOutcome, RegistryError> {
        let Some(record) = self.store.find(loader_id).await? else {
            return Ok(StopOutcome::Unknown);
        };
        if record.status.is_terminal() {
            return Ok(StopOutcome::NotRunning(record));
        }
        if let Some(handle) = self.lock_handles().remove(loader_id) {
            handle.stop();
        }
        self.store
            .update_status(loader_id, LoaderStatus::Stopped)
            .await?;
        let mut record = record;
        record.status = LoaderStatus::Stopped;
        info!("loader {loader_id} stopped");
        Ok(StopOutcome::Stopped(record))
    }

    /// Terminal status write for a loader task that ran to completion.
    pub async fn mark_stopped(&self, loader_id: &str) -> Result<(), RegistryError> {
        self.lock_handles().remove(loader_id);
        self.store
            .update_status(loader_id, LoaderStatus::Stopped)
            .await?;
        Ok(())
    }

    /// Terminal status write for a loader task that hit a fatal error.
    pub async fn mark_failed(&self, loader_id: &str) -> Result<(), RegistryError> {
        if let Some(handle) = self.lock_handles().remove(loader_id) {
            handle.stop();
        }
        self.store
            .update_status(loader_id, LoaderStatus::Failed)
            .await?;
        Ok(())
    }

    pub async fn list(&self) -> Result<Vec<LoaderRecord>, RegistryError> {
        Ok(self.store.find_all().await?)
    }

    pub async fn get(&self, loader_id: &str) -> Result<Option<LoaderRecord>, RegistryError> {
        Ok(self.store.find(loader_id).await?)
    }

    /// Stop every live loader; used at server shutdown.
    pub async fn stop_all(&self) {
        let ids: Vec<String> = {
            let mut handles = self.lock_handles();
            let ids = handles.keys().cloned().collect();
            for handle in handles.values() {
                handle.stop();
            }
            handles.clear();
            ids
        };
        for loader_id in ids {
            if let Err(err) = self
                .store
                .update_status(&loader_id, LoaderStatus::Stopped)
                .await
            {
                warn!("could not persist stop of {loader_id} at shutdown: {err}");
            }
        }
    }
}
