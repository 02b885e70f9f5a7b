//! The persisted registry entity.

use crate::container::{BackendKind, ContainerId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Lifecycle status of a loader.
///
/// Valid transitions: `(none) -> Running`, `Running <-> Paused`,
/// `{Running, Paused} -> Stopped`, any `-> Failed`. `Stopped` and `Failed`
/// are terminal; restarting requires a fresh loader id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoaderStatus {
    Running,
    Paused,
    Stopped,
    Failed,
}

impl LoaderStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, LoaderStatus::Stopped | LoaderStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LoaderStatus::Running => "running",
            LoaderStatus::Paused => "paused",
            LoaderStatus::Stopped => "stopped",
            LoaderStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for LoaderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the loader registry.
///
/// Serialized to the flat `{loader_id, backend, database, collection,
/// status, config}` layout; the container round-trips through the
/// backend-agnostic `database`/`collection` pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "PersistedRecord", from = "PersistedRecord")]
pub struct LoaderRecord {
    pub loader_id: String,
    pub backend: BackendKind,
    pub container: ContainerId,
    pub status: LoaderStatus,
    pub config: Value,
}

impl LoaderRecord {
    /// A fresh `Running` record with a newly assigned loader id.
    pub fn new(backend: BackendKind, container: ContainerId, config: Value) -> Self {
        Self {
            loader_id: uuid::Uuid::new_v4().to_string(),
            backend,
            container,
            status: LoaderStatus::Running,
            config,
        }
    }
}

#[derive(Serialize, Deserialize)]
struct PersistedRecord {
    loader_id: String,
    backend: BackendKind,
    database: Value,
    collection: Value,
    status: LoaderStatus,
    #[serde(default)]
    config: Value,
}

impl From<LoaderRecord> for PersistedRecord {
    fn from(record: LoaderRecord) -> Self {
        Self {
            loader_id: record.loader_id,
            backend: record.backend,
            database: record.container.database_value(),
            collection: record.container.collection_value(),
            status: record.status,
            config: record.config,
        }
    }
}

impl From<PersistedRecord> for LoaderRecord {
    fn from(doc: PersistedRecord) -> Self {
        let container = ContainerId::from_persisted(doc.backend, &doc.database, &doc.collection);
        Self {
            loader_id: doc.loader_id,
            backend: doc.backend,
            container,
            status: doc.status,
            config: doc.config,
        }
    }
}
