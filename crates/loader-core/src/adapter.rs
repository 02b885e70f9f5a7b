//! The uniform capability surface implemented by every backend adapter.

use crate::container::BackendKind;
use crate::error::AdapterError;
use async_trait::async_trait;
use serde_json::Value;

/// The CRUD operations a loader may pick from during steady state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    Insert,
    Update,
    Delete,
}

/// A primary-key value as seen by the engine.
///
/// Adapters translate this into their native key representation (a Mongo
/// `ObjectId`, a `CHAR(36)` column value, a Dynamo partition-key attribute).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordKey {
    Text(String),
    Int(i64),
}

impl std::fmt::Display for RecordKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordKey::Text(s) => f.write_str(s),
            RecordKey::Int(i) => write!(f, "{i}"),
        }
    }
}

/// A single failed slot in a batch insert.
#[derive(Debug, Clone)]
pub struct BatchFailure {
    pub index: usize,
    pub message: String,
}

/// Result of a batch insert. Batches are atomic per record, never per
/// batch: `inserted` may be less than the submitted count, with the failed
/// slots reported individually.
#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    pub inserted: u64,
    pub failures: Vec<BatchFailure>,
}

/// Capability surface the CRUD loop engine drives.
///
/// One adapter instance is bound to one container. No method holds state
/// across calls; cancellation is handled by the engine between calls, so
/// implementations do not need to be cancellation-aware.
#[async_trait]
pub trait BackendAdapter: Send + Sync {
    /// Which backend this adapter fronts.
    fn kind(&self) -> BackendKind;

    /// The operation subset this backend supports; the engine picks
    /// uniformly from this set.
    fn supported_ops(&self) -> &[OpKind];

    /// Current population of the container. May be an estimate for backends
    /// that only expose approximate counts (documented per adapter).
    async fn count(&self) -> Result<u64, AdapterError>;

    /// Insert a single record; duplicate-key errors are surfaced.
    async fn insert_one(&self, record: Value) -> Result<(), AdapterError>;

    /// Insert a batch of records, atomic per record.
    async fn insert_batch(&self, records: Vec<Value>) -> Result<BatchOutcome, AdapterError>;

    /// An existing primary key, or `None` for an empty container. Selection
    /// need not be uniformly random.
    async fn pick_random_key(&self) -> Result<Option<RecordKey>, AdapterError>;

    /// Replace the record stored under `key`; missing keys are surfaced.
    async fn update_by_key(&self, key: &RecordKey, record: Value) -> Result<(), AdapterError>;

    /// Delete by key. Idempotent: a missing key is success.
    async fn delete_by_key(&self, key: &RecordKey) -> Result<(), AdapterError>;

    /// Create the backing container if absent.
    async fn initialize_container(&self) -> Result<(), AdapterError>;

    /// Best-effort teardown of the backing container.
    async fn drop_container(&self) -> Result<(), AdapterError>;
}
