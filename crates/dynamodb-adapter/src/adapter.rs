//! [`BackendAdapter`] implementation over the DynamoDB SDK.

use crate::attr::to_item;
use crate::config::DynamoEndpoint;
use async_trait::async_trait;
use aws_sdk_dynamodb::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_dynamodb::types::{
    AttributeDefinition, AttributeValue, KeySchemaElement, KeyType, ProvisionedThroughput,
    PutRequest, ScalarAttributeType, Select, StreamSpecification, StreamViewType, TableStatus,
    WriteRequest,
};
use aws_sdk_dynamodb::Client;
use loader_core::{
    AdapterError, BackendAdapter, BackendKind, BatchFailure, BatchOutcome, OpKind, RecordKey,
};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

/// DynamoDB never sees updates: the engine's operation mix for the
/// wide-column backend is insert/delete only.
const SUPPORTED_OPS: [OpKind; 2] = [OpKind::Insert, OpKind::Delete];

/// BatchWriteItem accepts at most this many requests per call.
const BATCH_WRITE_CHUNK: usize = 25;

const READ_CAPACITY_UNITS: i64 = 10_000;
const WRITE_CAPACITY_UNITS: i64 = 10_000;

/// Adapter bound to one table and its partition-key attribute.
pub struct DynamoAdapter {
    client: Client,
    table: String,
    primary_key: String,
}

impl DynamoAdapter {
    pub async fn connect(
        endpoint: &DynamoEndpoint,
        table: &str,
        primary_key: &str,
    ) -> Result<Self, AdapterError> {
        let config = endpoint.sdk_config().await;
        Ok(Self {
            client: Client::new(&config),
            table: table.to_string(),
            primary_key: primary_key.to_string(),
        })
    }

    /// Cheap round-trip that validates the supplied credentials before a
    /// loader is registered.
    pub async fn probe_credentials(&self) -> Result<(), AdapterError> {
        self.client
            .list_tables()
            .limit(1)
            .send()
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn wait_until_active(&self) -> Result<(), AdapterError> {
        for _ in 0..60 {
            let output = self
                .client
                .describe_table()
                .table_name(&self.table)
                .send()
                .await
                .map_err(classify)?;
            if output
                .table()
                .and_then(|t| t.table_status())
                .is_some_and(|status| *status == TableStatus::Active)
            {
                return Ok(());
            }
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
        Err(AdapterError::Unavailable(format!(
            "table {} did not become active",
            self.table
        )))
    }

    async fn enable_image_streaming(&self) {
        let spec = StreamSpecification::builder()
            .stream_enabled(true)
            .stream_view_type(StreamViewType::NewImage)
            .build();
        let result = match spec {
            Ok(spec) => {
                self.client
                    .update_table()
                    .table_name(&self.table)
                    .stream_specification(spec)
                    .send()
                    .await
            }
            Err(err) => {
                debug!("stream specification build failed: {err}");
                return;
            }
        };
        // Re-enabling an already streaming table is a ValidationException;
        // either way the table is usable.
        if let Err(err) = result {
            debug!("enable stream on {}: {}", self.table, DisplayErrorContext(&err));
        }
    }
}

fn classify<E>(err: SdkError<E>) -> AdapterError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    let message = DisplayErrorContext(&err).to_string();
    match &err {
        SdkError::DispatchFailure(_) | SdkError::TimeoutError(_) => {
            AdapterError::Unavailable(message)
        }
        _ => match err.code() {
            Some(
                "UnrecognizedClientException"
                | "InvalidSignatureException"
                | "AccessDeniedException"
                | "ExpiredTokenException"
                | "MissingAuthenticationTokenException",
            ) => AdapterError::Auth(message),
            Some("ResourceNotFoundException") => AdapterError::ContainerMissing(message),
            Some("ConditionalCheckFailedException") => AdapterError::DuplicateKey(message),
            _ => AdapterError::Backend(message),
        },
    }
}

fn key_attribute(wr: &WriteRequest, primary_key: &str) -> Option<String> {
    wr.put_request()
        .and_then(|put| put.item().get(primary_key))
        .and_then(|attr| attr.as_s().ok())
        .cloned()
}

#[async_trait]
impl BackendAdapter for DynamoAdapter {
    fn kind(&self) -> BackendKind {
        BackendKind::Dynamo
    }

    fn supported_ops(&self) -> &[OpKind] {
        &SUPPORTED_OPS
    }

    /// Live item count via a paginated `Scan Select=COUNT`. Reads are
    /// eventually consistent, so the figure can trail recent writes.
    async fn count(&self) -> Result<u64, AdapterError> {
        let mut total: u64 = 0;
        let mut start_key: Option<HashMap<String, AttributeValue>> = None;
        loop {
            let output = self
                .client
                .scan()
                .table_name(&self.table)
                .select(Select::Count)
                .set_exclusive_start_key(start_key.clone())
                .send()
                .await
                .map_err(classify)?;
            total += output.count() as u64;
            match output.last_evaluated_key() {
                Some(key) if !key.is_empty() => start_key = Some(key.clone()),
                _ => return Ok(total),
            }
        }
    }

    async fn insert_one(&self, record: Value) -> Result<(), AdapterError> {
        let item = to_item(&record, &self.primary_key);
        self.client
            .put_item()
            .table_name(&self.table)
            .set_item(Some(item))
            .condition_expression("attribute_not_exists(#pk)")
            .expression_attribute_names("#pk", &self.primary_key)
            .send()
            .await
            .map_err(classify)?;
        Ok(())
    }

    /// 25-request BatchWriteItem chunks; requests the service leaves
    /// unprocessed are reported against their submitted slot.
    async fn insert_batch(&self, records: Vec<Value>) -> Result<BatchOutcome, AdapterError> {
        let mut outcome = BatchOutcome::default();
        for (chunk_start, chunk) in records
            .chunks(BATCH_WRITE_CHUNK)
            .enumerate()
            .map(|(i, c)| (i * BATCH_WRITE_CHUNK, c))
        {
            let mut requests = Vec::with_capacity(chunk.len());
            let mut key_index: HashMap<String, usize> = HashMap::new();
            for (offset, record) in chunk.iter().enumerate() {
                let item = to_item(record, &self.primary_key);
                if let Some(AttributeValue::S(key)) = item.get(&self.primary_key) {
                    key_index.insert(key.clone(), chunk_start + offset);
                }
                let put = PutRequest::builder()
                    .set_item(Some(item))
                    .build()
                    .map_err(|e| AdapterError::Backend(e.to_string()))?;
                requests.push(WriteRequest::builder().put_request(put).build());
            }
            let submitted = requests.len() as u64;
            let output = self
                .client
                .batch_write_item()
                .request_items(&self.table, requests)
                .send()
                .await
                .map_err(classify)?;
            let unprocessed: Vec<&WriteRequest> = output
                .unprocessed_items()
                .and_then(|items| items.get(&self.table))
                .map(|reqs| reqs.iter().collect())
                .unwrap_or_default();
            outcome.inserted += submitted - unprocessed.len() as u64;
            for wr in unprocessed {
                let index = key_attribute(wr, &self.primary_key)
                    .and_then(|key| key_index.get(&key).copied())
                    .unwrap_or(chunk_start);
                outcome.failures.push(BatchFailure {
                    index,
                    message: "write request left unprocessed".to_string(),
                });
            }
        }
        Ok(outcome)
    }

    /// A key from the first scan page, chosen at random; pages are in key
    /// order, so selection is deliberately not uniform.
    async fn pick_random_key(&self) -> Result<Option<RecordKey>, AdapterError> {
        let output = self
            .client
            .scan()
            .table_name(&self.table)
            .projection_expression("#pk")
            .expression_attribute_names("#pk", &self.primary_key)
            .limit(100)
            .send()
            .await
            .map_err(classify)?;
        let keys: Vec<String> = output
            .items()
            .iter()
            .filter_map(|item| item.get(&self.primary_key))
            .filter_map(|attr| attr.as_s().ok())
            .cloned()
            .collect();
        if keys.is_empty() {
            return Ok(None);
        }
        let picked = {
            use rand::seq::IndexedRandom;
            let mut rng = rand::rng();
            keys.choose(&mut rng).cloned()
        };
        Ok(picked.map(RecordKey::Text))
    }

    async fn update_by_key(&self, key: &RecordKey, _record: Value) -> Result<(), AdapterError> {
        Err(AdapterError::Backend(format!(
            "update is not supported on the wide-column backend (key {key})"
        )))
    }

    async fn delete_by_key(&self, key: &RecordKey) -> Result<(), AdapterError> {
        self.client
            .delete_item()
            .table_name(&self.table)
            .key(&self.primary_key, AttributeValue::S(key.to_string()))
            .send()
            .await
            .map_err(classify)?;
        Ok(())
    }

    /// Create the table (string hash key, provisioned throughput), wait for
    /// it to become active, then enable NEW_IMAGE streaming. An existing
    /// table short-circuits to success.
    async fn initialize_container(&self) -> Result<(), AdapterError> {
        let key_schema = KeySchemaElement::builder()
            .attribute_name(&self.primary_key)
            .key_type(KeyType::Hash)
            .build()
            .map_err(|e| AdapterError::Backend(e.to_string()))?;
        let attribute = AttributeDefinition::builder()
            .attribute_name(&self.primary_key)
            .attribute_type(ScalarAttributeType::S)
            .build()
            .map_err(|e| AdapterError::Backend(e.to_string()))?;
        let throughput = ProvisionedThroughput::builder()
            .read_capacity_units(READ_CAPACITY_UNITS)
            .write_capacity_units(WRITE_CAPACITY_UNITS)
            .build()
            .map_err(|e| AdapterError::Backend(e.to_string()))?;
        let result = self
            .client
            .create_table()
            .table_name(&self.table)
            .key_schema(key_schema)
            .attribute_definitions(attribute)
            .provisioned_throughput(throughput)
            .send()
            .await;
        match result {
            Ok(_) => {
                self.wait_until_active().await?;
                self.enable_image_streaming().await;
                Ok(())
            }
            Err(err) if err.code() == Some("ResourceInUseException") => {
                debug!("table {} already exists", self.table);
                Ok(())
            }
            Err(err) => Err(classify(err)),
        }
    }

    async fn drop_container(&self) -> Result<(), AdapterError> {
        match self
            .client
            .delete_table()
            .table_name(&self.table)
            .send()
            .await
        {
            Ok(_) => Ok(()),
            Err(err) if err.code() == Some("ResourceNotFoundException") => {
                warn!("drop of missing table {}", self.table);
                Ok(())
            }
            Err(err) => Err(classify(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attr::to_attribute_value;

    #[test]
    fn test_supported_ops_exclude_update() {
        assert!(SUPPORTED_OPS.contains(&OpKind::Insert));
        assert!(SUPPORTED_OPS.contains(&OpKind::Delete));
        assert!(!SUPPORTED_OPS.contains(&OpKind::Update));
    }

    #[test]
    fn test_attribute_roundtrip_for_coerced_record() {
        // Coerced records carry no floats; everything lands as S/N/Bool.
        let record = serde_json::json!({
            "price": "3000.0",
            "free_parking": 1,
            "reviews": [{"rating": {"overall": 9}}],
        });
        let attr = to_attribute_value(&record);
        let AttributeValue::M(map) = attr else {
            panic!("expected a map");
        };
        assert_eq!(map["price"], AttributeValue::S("3000.0".to_string()));
        assert_eq!(map["free_parking"], AttributeValue::N("1".to_string()));
    }
}
