//! Backend and container identity.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The storage backends a loader can drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Document database (MongoDB).
    Mongo,
    /// Wide-column NoSQL service (DynamoDB).
    Dynamo,
    /// Relational database (MySQL).
    Mysql,
    /// Object store (S3).
    S3,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Mongo => "mongo",
            BackendKind::Dynamo => "dynamo",
            BackendKind::Mysql => "mysql",
            BackendKind::S3 => "s3",
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The backend-native logical grouping a loader acts on.
///
/// Persisted as the backend-agnostic `{database, collection}` pair: Dynamo
/// stores its table name in both fields, and the object store encodes its
/// bucket list as an array in both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainerId {
    /// MongoDB database + collection.
    Collection { database: String, collection: String },
    /// MySQL database + table.
    Table { database: String, table: String },
    /// DynamoDB table.
    DynamoTable { table: String },
    /// One or more S3 buckets driven by a single loader.
    Buckets { buckets: Vec<String> },
}

impl ContainerId {
    /// Value stored in the registry's `database` field.
    pub fn database_value(&self) -> Value {
        match self {
            ContainerId::Collection { database, .. } => Value::String(database.clone()),
            ContainerId::Table { database, .. } => Value::String(database.clone()),
            ContainerId::DynamoTable { table } => Value::String(table.clone()),
            ContainerId::Buckets { buckets } => {
                Value::Array(buckets.iter().cloned().map(Value::String).collect())
            }
        }
    }

    /// Value stored in the registry's `collection` field.
    pub fn collection_value(&self) -> Value {
        match self {
            ContainerId::Collection { collection, .. } => Value::String(collection.clone()),
            ContainerId::Table { table, .. } => Value::String(table.clone()),
            ContainerId::DynamoTable { table } => Value::String(table.clone()),
            ContainerId::Buckets { buckets } => {
                Value::Array(buckets.iter().cloned().map(Value::String).collect())
            }
        }
    }

    /// Rebuild a container from its persisted `{database, collection}` pair.
    pub fn from_persisted(kind: BackendKind, database: &Value, collection: &Value) -> Self {
        let text = |v: &Value| v.as_str().unwrap_or_default().to_string();
        match kind {
            BackendKind::Mongo => ContainerId::Collection {
                database: text(database),
                collection: text(collection),
            },
            BackendKind::Mysql => ContainerId::Table {
                database: text(database),
                table: text(collection),
            },
            BackendKind::Dynamo => ContainerId::DynamoTable {
                table: text(database),
            },
            BackendKind::S3 => ContainerId::Buckets {
                buckets: database
                    .as_array()
                    .map(|items| items.iter().map(|b| text(b)).collect())
                    .unwrap_or_default(),
            },
        }
    }
}

impl std::fmt::Display for ContainerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContainerId::Collection {
                database,
                collection,
            } => write!(f, "{database}.{collection}"),
            ContainerId::Table { database, table } => write!(f, "{database}.{table}"),
            ContainerId::DynamoTable { table } => f.write_str(table),
            ContainerId::Buckets { buckets } => write!(f, "{}", buckets.join(", ")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_kind_serde() {
        let json = serde_json::to_string(&BackendKind::Mongo).unwrap();
        assert_eq!(json, "\"mongo\"");
        let kind: BackendKind = serde_json::from_str("\"dynamo\"").unwrap();
        assert_eq!(kind, BackendKind::Dynamo);
    }

    #[test]
    fn test_container_persisted_roundtrip() {
        let container = ContainerId::Collection {
            database: "travel".to_string(),
            collection: "hotels".to_string(),
        };
        let rebuilt = ContainerId::from_persisted(
            BackendKind::Mongo,
            &container.database_value(),
            &container.collection_value(),
        );
        assert_eq!(container, rebuilt);
    }

    #[test]
    fn test_bucket_list_encodes_as_array() {
        let container = ContainerId::Buckets {
            buckets: vec!["b0".to_string(), "b1".to_string()],
        };
        assert_eq!(
            container.database_value(),
            serde_json::json!(["b0", "b1"])
        );
        let rebuilt = ContainerId::from_persisted(
            BackendKind::S3,
            &container.database_value(),
            &container.collection_value(),
        );
        assert_eq!(container, rebuilt);
    }
}
