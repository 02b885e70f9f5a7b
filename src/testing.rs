//! Test infrastructure: an in-memory backend adapter that lets engine and
//! registry behavior be exercised without a real datastore.

use async_trait::async_trait;
use loader_core::{
    AdapterError, BackendAdapter, BackendKind, BatchFailure, BatchOutcome, OpKind, RecordKey,
};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

/// A [`BackendAdapter`] over a process-local map.
///
/// Keys are monotonically numbered strings, so `pick_random_key` (first
/// key) is deterministic enough for tests while honoring the "no ordering
/// guarantees" contract.
pub struct MemoryAdapter {
    kind: BackendKind,
    ops: Vec<OpKind>,
    records: Mutex<BTreeMap<String, Value>>,
    next_key: AtomicU64,
    fail_counts: AtomicBool,
}

impl MemoryAdapter {
    pub fn new(kind: BackendKind, ops: &[OpKind]) -> Self {
        Self {
            kind,
            ops: ops.to_vec(),
            records: Mutex::new(BTreeMap::new()),
            next_key: AtomicU64::new(0),
            fail_counts: AtomicBool::new(false),
        }
    }

    /// A document-db-shaped adapter supporting the full operation mix.
    pub fn document_db() -> Self {
        Self::new(
            BackendKind::Mongo,
            &[OpKind::Insert, OpKind::Update, OpKind::Delete],
        )
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, Value>> {
        match self.records.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Make every subsequent `count` fail fatally (auth), as a stand-in
    /// for a backend that rejects the loader's credentials.
    pub fn fail_counts_fatally(&self) {
        self.fail_counts.store(true, Ordering::SeqCst);
    }

    /// Simulate an external writer adding `extra` records.
    pub fn perturb_add(&self, extra: usize) {
        let mut records = self.lock();
        for _ in 0..extra {
            let key = format!("external-{}", self.next_key.fetch_add(1, Ordering::SeqCst));
            records.insert(key, Value::Null);
        }
    }

    /// Simulate an external writer removing up to `removed` records.
    pub fn perturb_remove(&self, removed: usize) {
        let mut records = self.lock();
        let keys: Vec<String> = records.keys().take(removed).cloned().collect();
        for key in keys {
            records.remove(&key);
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.lock().get(key).cloned()
    }
}

#[async_trait]
impl BackendAdapter for MemoryAdapter {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    fn supported_ops(&self) -> &[OpKind] {
        &self.ops
    }

    async fn count(&self) -> Result<u64, AdapterError> {
        if self.fail_counts.load(Ordering::SeqCst) {
            return Err(AdapterError::Auth("credentials rejected".to_string()));
        }
        Ok(self.lock().len() as u64)
    }

    async fn insert_one(&self, record: Value) -> Result<(), AdapterError> {
        let key = format!("doc-{}", self.next_key.fetch_add(1, Ordering::SeqCst));
        self.lock().insert(key, record);
        Ok(())
    }

    async fn insert_batch(&self, records: Vec<Value>) -> Result<BatchOutcome, AdapterError> {
        let mut outcome = BatchOutcome::default();
        for (index, record) in records.into_iter().enumerate() {
            match self.insert_one(record).await {
                Ok(()) => outcome.inserted += 1,
                Err(err) => outcome.failures.push(BatchFailure {
                    index,
                    message: err.to_string(),
                }),
            }
        }
        Ok(outcome)
    }

    async fn pick_random_key(&self) -> Result<Option<RecordKey>, AdapterError> {
        Ok(self
            .lock()
            .keys()
            .next()
            .cloned()
            .map(RecordKey::Text))
    }

    async fn update_by_key(&self, key: &RecordKey, record: Value) -> Result<(), AdapterError> {
        let mut records = self.lock();
        match records.get_mut(&key.to_string()) {
            Some(slot) => {
                *slot = record;
                Ok(())
            }
            None => Err(AdapterError::KeyNotFound(key.to_string())),
        }
    }

    async fn delete_by_key(&self, key: &RecordKey) -> Result<(), AdapterError> {
        self.lock().remove(&key.to_string());
        Ok(())
    }

    async fn initialize_container(&self) -> Result<(), AdapterError> {
        Ok(())
    }

    async fn drop_container(&self) -> Result<(), AdapterError> {
        self.lock().clear();
        Ok(())
    }
}
