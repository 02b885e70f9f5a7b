//! [`BackendAdapter`] implementation over the MongoDB driver.

use crate::config::MongoEndpoint;
use async_trait::async_trait;
use loader_core::{
    AdapterError, BackendAdapter, BackendKind, BatchFailure, BatchOutcome, OpKind, RecordKey,
};
use mongodb::bson::{doc, oid::ObjectId, Bson, Document};
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::ClientOptions;
use mongodb::{Client, Collection};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

const SUPPORTED_OPS: [OpKind; 3] = [OpKind::Insert, OpKind::Update, OpKind::Delete];

/// Adapter bound to one `database.collection` pair.
pub struct MongoAdapter {
    client: Client,
    database: String,
    collection: String,
}

impl MongoAdapter {
    /// Connect and bind to a collection. Connection and server-selection
    /// timeouts are capped so an unreachable deployment fails fast instead
    /// of hanging a start request.
    pub async fn connect(endpoint: &MongoEndpoint, collection: &str) -> Result<Self, AdapterError> {
        let mut options = ClientOptions::parse(endpoint.connection_uri())
            .await
            .map_err(classify)?;
        options.connect_timeout = Some(Duration::from_secs(10));
        options.server_selection_timeout = Some(Duration::from_secs(10));
        let client = Client::with_options(options).map_err(classify)?;
        Ok(Self {
            client,
            database: endpoint.database_name.clone(),
            collection: collection.to_string(),
        })
    }

    fn collection(&self) -> Collection<Document> {
        self.client
            .database(&self.database)
            .collection(&self.collection)
    }

    /// Drop the whole database this adapter is bound to.
    pub async fn drop_database(&self) -> Result<(), AdapterError> {
        self.client
            .database(&self.database)
            .drop()
            .await
            .map_err(classify)
    }
}

fn classify(err: mongodb::error::Error) -> AdapterError {
    match err.kind.as_ref() {
        ErrorKind::Authentication { message, .. } => AdapterError::Auth(message.clone()),
        ErrorKind::ServerSelection { message, .. } => AdapterError::Unavailable(message.clone()),
        ErrorKind::Io(io) => AdapterError::Unavailable(io.to_string()),
        ErrorKind::Write(WriteFailure::WriteError(write_err)) if write_err.code == 11000 => {
            AdapterError::DuplicateKey(write_err.message.clone())
        }
        ErrorKind::Command(cmd) if cmd.code == 13 || cmd.code == 18 => {
            AdapterError::Auth(cmd.message.clone())
        }
        ErrorKind::Command(cmd) if cmd.code == 26 => {
            AdapterError::ContainerMissing(cmd.message.clone())
        }
        _ => AdapterError::Backend(err.to_string()),
    }
}

fn to_document(record: &Value) -> Result<Document, AdapterError> {
    mongodb::bson::to_document(record).map_err(|e| AdapterError::Backend(e.to_string()))
}

fn key_to_bson(key: &RecordKey) -> Bson {
    match key {
        RecordKey::Text(text) => match ObjectId::parse_str(text) {
            Ok(oid) => Bson::ObjectId(oid),
            Err(_) => Bson::String(text.clone()),
        },
        RecordKey::Int(i) => Bson::Int64(*i),
    }
}

fn bson_to_key(id: &Bson) -> RecordKey {
    match id {
        Bson::ObjectId(oid) => RecordKey::Text(oid.to_hex()),
        Bson::String(s) => RecordKey::Text(s.clone()),
        Bson::Int32(i) => RecordKey::Int(i64::from(*i)),
        Bson::Int64(i) => RecordKey::Int(*i),
        other => RecordKey::Text(other.to_string()),
    }
}

#[async_trait]
impl BackendAdapter for MongoAdapter {
    fn kind(&self) -> BackendKind {
        BackendKind::Mongo
    }

    fn supported_ops(&self) -> &[OpKind] {
        &SUPPORTED_OPS
    }

    /// Exact population via `countDocuments` (not the estimated fast path).
    async fn count(&self) -> Result<u64, AdapterError> {
        self.collection()
            .count_documents(doc! {})
            .await
            .map_err(classify)
    }

    async fn insert_one(&self, record: Value) -> Result<(), AdapterError> {
        let document = to_document(&record)?;
        self.collection()
            .insert_one(document)
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn insert_batch(&self, records: Vec<Value>) -> Result<BatchOutcome, AdapterError> {
        if records.is_empty() {
            return Ok(BatchOutcome::default());
        }
        let mut documents = Vec::with_capacity(records.len());
        for record in &records {
            documents.push(to_document(record)?);
        }
        match self
            .collection()
            .insert_many(documents)
            .ordered(false)
            .await
        {
            Ok(result) => Ok(BatchOutcome {
                inserted: result.inserted_ids.len() as u64,
                failures: Vec::new(),
            }),
            Err(err) => match err.kind.as_ref() {
                // Unordered writes keep going past failed slots; report
                // them per index instead of failing the whole batch.
                ErrorKind::InsertMany(insert_err) => {
                    let failures: Vec<BatchFailure> = insert_err
                        .write_errors
                        .as_deref()
                        .unwrap_or_default()
                        .iter()
                        .map(|write_err| BatchFailure {
                            index: write_err.index,
                            message: write_err.message.clone(),
                        })
                        .collect();
                    Ok(BatchOutcome {
                        inserted: insert_err.inserted_ids.len() as u64,
                        failures,
                    })
                }
                _ => Err(classify(err)),
            },
        }
    }

    /// A `$sample`-selected `_id`; `None` when the collection is empty.
    async fn pick_random_key(&self) -> Result<Option<RecordKey>, AdapterError> {
        let mut cursor = self
            .collection()
            .aggregate(vec![doc! {"$sample": {"size": 1}}])
            .await
            .map_err(classify)?;
        if cursor.advance().await.map_err(classify)? {
            let document: Document = cursor.deserialize_current().map_err(classify)?;
            return Ok(document.get("_id").map(bson_to_key));
        }
        Ok(None)
    }

    async fn update_by_key(&self, key: &RecordKey, record: Value) -> Result<(), AdapterError> {
        let mut document = to_document(&record)?;
        document.remove("_id");
        let result = self
            .collection()
            .replace_one(doc! {"_id": key_to_bson(key)}, document)
            .await
            .map_err(classify)?;
        if result.matched_count == 0 {
            return Err(AdapterError::KeyNotFound(key.to_string()));
        }
        Ok(())
    }

    async fn delete_by_key(&self, key: &RecordKey) -> Result<(), AdapterError> {
        self.collection()
            .delete_one(doc! {"_id": key_to_bson(key)})
            .await
            .map_err(classify)?;
        Ok(())
    }

    /// MongoDB creates collections implicitly on first write, so an
    /// existing-collection failure here is not an error.
    async fn initialize_container(&self) -> Result<(), AdapterError> {
        if let Err(err) = self
            .client
            .database(&self.database)
            .create_collection(&self.collection)
            .await
        {
            debug!(
                "create_collection {}.{}: {err}",
                self.database, self.collection
            );
        }
        Ok(())
    }

    async fn drop_container(&self) -> Result<(), AdapterError> {
        self.collection().drop().await.map_err(classify)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_mapping_roundtrip() {
        let oid = ObjectId::new();
        let key = bson_to_key(&Bson::ObjectId(oid));
        assert_eq!(key, RecordKey::Text(oid.to_hex()));
        assert_eq!(key_to_bson(&key), Bson::ObjectId(oid));

        let key = RecordKey::Text("not-an-object-id".to_string());
        assert_eq!(key_to_bson(&key), Bson::String("not-an-object-id".into()));

        assert_eq!(key_to_bson(&RecordKey::Int(42)), Bson::Int64(42));
        assert_eq!(bson_to_key(&Bson::Int32(7)), RecordKey::Int(7));
    }

    #[test]
    fn test_record_to_document() {
        let record = serde_json::json!({"name": "Oakhurst Inn", "price": 3000.0});
        let document = to_document(&record).unwrap();
        assert_eq!(document.get_str("name").unwrap(), "Oakhurst Inn");
        assert_eq!(document.get_f64("price").unwrap(), 3000.0);
    }

    #[test]
    fn test_non_object_record_is_rejected() {
        assert!(to_document(&serde_json::json!(42)).is_err());
    }
}
