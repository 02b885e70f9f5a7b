//! Persistence behind the loader registry.
//!
//! The registry is best-effort durable: the MongoDB store keeps loader
//! rows in a single collection, and the in-memory store backs tests and
//! registry-less single-process runs.

use async_trait::async_trait;
use bson::{doc, Document};
use loader_core::{BackendKind, ContainerId, LoaderRecord, LoaderStatus};
use mongodb::{Client, Collection};
use std::collections::HashMap;
use std::sync::Mutex;
use thiserror::Error;

/// A registry store failure; surfaces to HTTP as an internal error.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct StoreError(pub String);

impl From<mongodb::error::Error> for StoreError {
    fn from(err: mongodb::error::Error) -> Self {
        StoreError(err.to_string())
    }
}

impl From<bson::ser::Error> for StoreError {
    fn from(err: bson::ser::Error) -> Self {
        StoreError(err.to_string())
    }
}

impl From<bson::de::Error> for StoreError {
    fn from(err: bson::de::Error) -> Self {
        StoreError(err.to_string())
    }
}

/// Storage operations the registry needs. The uniqueness guard lives in
/// the registry (under its start mutex), not here: the backing store is
/// not assumed to offer conditional writes.
#[async_trait]
pub trait RegistryStore: Send + Sync {
    async fn insert(&self, record: &LoaderRecord) -> Result<(), StoreError>;

    async fn update_status(&self, loader_id: &str, status: LoaderStatus) -> Result<(), StoreError>;

    async fn find(&self, loader_id: &str) -> Result<Option<LoaderRecord>, StoreError>;

    async fn find_all(&self) -> Result<Vec<LoaderRecord>, StoreError>;

    /// The record with `status = running` for this `(backend, container)`
    /// pair, if any. The registry invariant allows at most one.
    async fn find_running(
        &self,
        backend: BackendKind,
        container: &ContainerId,
    ) -> Result<Option<LoaderRecord>, StoreError>;
}

/// In-memory store used by tests and registry-less runs.
#[derive(Default)]
pub struct MemoryRegistryStore {
    records: Mutex<HashMap<String, LoaderRecord>>,
}

impl MemoryRegistryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, LoaderRecord>> {
        match self.records.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[async_trait]
impl RegistryStore for MemoryRegistryStore {
    async fn insert(&self, record: &LoaderRecord) -> Result<(), StoreError> {
        self.lock().insert(record.loader_id.clone(), record.clone());
        Ok(())
    }

    async fn update_status(&self, loader_id: &str, status: LoaderStatus) -> Result<(), StoreError> {
        if let Some(record) = self.lock().get_mut(loader_id) {
            record.status = status;
        }
        Ok(())
    }

    async fn find(&self, loader_id: &str) -> Result<Option<LoaderRecord>, StoreError> {
        Ok(self.lock().get(loader_id).cloned())
    }

    async fn find_all(&self) -> Result<Vec<LoaderRecord>, StoreError> {
        Ok(self.lock().values().cloned().collect())
    }

    async fn find_running(
        &self,
        backend: BackendKind,
        container: &ContainerId,
    ) -> Result<Option<LoaderRecord>, StoreError> {
        Ok(self
            .lock()
            .values()
            .find(|record| {
                record.backend == backend
                    && record.container == *container
                    && record.status == LoaderStatus::Running
            })
            .cloned())
    }
}

/// MongoDB-backed store: one collection keyed by `loader_id`.
pub struct MongoRegistryStore {
    collection: Collection<Document>,
}

impl MongoRegistryStore {
    /// Connect and bind to the registry collection, probing the deployment
    /// so a bad URI fails at startup rather than on the first request.
    pub async fn connect(uri: &str, database: &str, collection: &str) -> Result<Self, StoreError> {
        let client = Client::with_uri_str(uri).await?;
        let db = client.database(database);
        db.list_collection_names().await?;
        Ok(Self {
            collection: db.collection(collection),
        })
    }

    fn to_document(record: &LoaderRecord) -> Result<Document, StoreError> {
        Ok(bson::to_document(record)?)
    }

    fn from_document(document: Document) -> Result<LoaderRecord, StoreError> {
        Ok(bson::from_document(document)?)
    }
}

#[async_trait]
impl RegistryStore for MongoRegistryStore {
    async fn insert(&self, record: &LoaderRecord) -> Result<(), StoreError> {
        self.collection
            .insert_one(Self::to_document(record)?)
            .await?;
        Ok(())
    }

    async fn update_status(&self, loader_id: &str, status: LoaderStatus) -> Result<(), StoreError> {
        self.collection
            .update_one(
                doc! {"loader_id": loader_id},
                doc! {"$set": {"status": status.as_str()}},
            )
            .await?;
        Ok(())
    }

    async fn find(&self, loader_id: &str) -> Result<Option<LoaderRecord>, StoreError> {
        match self
            .collection
            .find_one(doc! {"loader_id": loader_id})
            .await?
        {
            Some(document) => Ok(Some(Self::from_document(document)?)),
            None => Ok(None),
        }
    }

    async fn find_all(&self) -> Result<Vec<LoaderRecord>, StoreError> {
        let mut cursor = self.collection.find(doc! {}).await?;
        let mut records = Vec::new();
        while cursor.advance().await? {
            let document: Document = cursor
                .deserialize_current()
                .map_err(|e| StoreError(e.to_string()))?;
            records.push(Self::from_document(document)?);
        }
        Ok(records)
    }

    async fn find_running(
        &self,
        backend: BackendKind,
        container: &ContainerId,
    ) -> Result<Option<LoaderRecord>, StoreError> {
        let database = bson::to_bson(&container.database_value())
            .map_err(|e| StoreError(e.to_string()))?;
        let collection = bson::to_bson(&container.collection_value())
            .map_err(|e| StoreError(e.to_string()))?;
        let filter = doc! {
            "backend": backend.as_str(),
            "database": database,
            "collection": collection,
            "status": LoaderStatus::Running.as_str(),
        };
        match self.collection.find_one(filter).await? {
            Some(document) => Ok(Some(Self::from_document(document)?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(database: &str, collection: &str) -> LoaderRecord {
        LoaderRecord::new(
            BackendKind::Mongo,
            ContainerId::Collection {
                database: database.to_string(),
                collection: collection.to_string(),
            },
            json!({"target_num_docs": 100}),
        )
    }

    #[tokio::test]
    async fn test_memory_store_roundtrip() {
        let store = MemoryRegistryStore::new();
        let rec = record("travel", "hotels");
        store.insert(&rec).await.unwrap();

        let found = store.find(&rec.loader_id).await.unwrap().unwrap();
        assert_eq!(found, rec);
        assert_eq!(store.find_all().await.unwrap().len(), 1);

        store
            .update_status(&rec.loader_id, LoaderStatus::Stopped)
            .await
            .unwrap();
        let found = store.find(&rec.loader_id).await.unwrap().unwrap();
        assert_eq!(found.status, LoaderStatus::Stopped);
    }

    #[tokio::test]
    async fn test_memory_store_find_running() {
        let store = MemoryRegistryStore::new();
        let rec = record("travel", "hotels");
        store.insert(&rec).await.unwrap();

        let running = store
            .find_running(BackendKind::Mongo, &rec.container)
            .await
            .unwrap();
        assert!(running.is_some());

        // A different collection is a different pair.
        let other = ContainerId::Collection {
            database: "travel".to_string(),
            collection: "flights".to_string(),
        };
        assert!(store
            .find_running(BackendKind::Mongo, &other)
            .await
            .unwrap()
            .is_none());

        // Stopped records do not trip the guard.
        store
            .update_status(&rec.loader_id, LoaderStatus::Stopped)
            .await
            .unwrap();
        assert!(store
            .find_running(BackendKind::Mongo, &rec.container)
            .await
            .unwrap()
            .is_none());
    }
}
