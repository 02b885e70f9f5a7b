//! [`BackendAdapter`] implementation over `mysql_async`.

use crate::config::MysqlEndpoint;
use async_trait::async_trait;
use loader_core::{
    AdapterError, BackendAdapter, BackendKind, BatchFailure, BatchOutcome, OpKind, RecordKey,
};
use mysql_async::prelude::Queryable;
use mysql_async::{Params, Pool};
use serde_json::Value;
use tracing::debug;

const SUPPORTED_OPS: [OpKind; 3] = [OpKind::Insert, OpKind::Update, OpKind::Delete];

/// Columns the hotel record maps onto, in insert order. `id` comes first
/// and is always a generated UUID.
const HOTEL_COLUMNS: [&str; 15] = [
    "id",
    "name",
    "address",
    "city",
    "country",
    "email",
    "phone",
    "url",
    "price",
    "avg_rating",
    "free_parking",
    "free_breakfast",
    "public_likes",
    "reviews",
    "padding",
];

/// Default DDL used when the caller does not supply its own column list.
pub const HOTEL_TABLE_COLUMNS: &str = "id CHAR(36) NOT NULL PRIMARY KEY, \
     name VARCHAR(255), address VARCHAR(255), city VARCHAR(255), \
     country VARCHAR(255), email VARCHAR(255), phone VARCHAR(64), \
     url VARCHAR(255), price DOUBLE, avg_rating DOUBLE, \
     free_parking TINYINT(1), free_breakfast TINYINT(1), \
     public_likes JSON, reviews JSON, padding TEXT";

/// Adapter bound to one `database.table` pair.
pub struct MysqlAdapter {
    pool: Pool,
    database: String,
    table: String,
    columns_ddl: String,
    init_schema: bool,
}

impl MysqlAdapter {
    /// Connect and bind to a table. The connection is probed eagerly so bad
    /// credentials fail the start request instead of the loader task.
    ///
    /// `columns_ddl` overrides the table definition used by
    /// `initialize_container`; `init_schema = false` skips database/table
    /// creation entirely (the caller owns the schema).
    pub async fn connect(
        endpoint: &MysqlEndpoint,
        database: &str,
        table: &str,
        columns_ddl: Option<String>,
        init_schema: bool,
    ) -> Result<Self, AdapterError> {
        let pool = Pool::from_url(endpoint.url())
            .map_err(|e| AdapterError::Unavailable(e.to_string()))?;
        let mut conn = pool.get_conn().await.map_err(classify)?;
        conn.ping().await.map_err(classify)?;
        Ok(Self {
            pool,
            database: database.to_string(),
            table: table.to_string(),
            columns_ddl: columns_ddl.unwrap_or_else(|| HOTEL_TABLE_COLUMNS.to_string()),
            init_schema,
        })
    }

    fn qualified_table(&self) -> String {
        format!("`{}`.`{}`", self.database, self.table)
    }

    async fn insert_row(&self, record: &Value) -> Result<(), AdapterError> {
        let mut conn = self.pool.get_conn().await.map_err(classify)?;
        let placeholders = vec!["?"; HOTEL_COLUMNS.len()].join(", ");
        let columns = HOTEL_COLUMNS
            .iter()
            .map(|c| format!("`{c}`"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.qualified_table(),
            columns,
            placeholders
        );
        let id = uuid::Uuid::new_v4().to_string();
        conn.exec_drop(sql, Params::Positional(row_params(&id, record)))
            .await
            .map_err(classify)?;
        Ok(())
    }

    /// Drop the whole database this adapter is bound to.
    pub async fn drop_database(&self) -> Result<(), AdapterError> {
        let mut conn = self.pool.get_conn().await.map_err(classify)?;
        conn.query_drop(format!("DROP DATABASE IF EXISTS `{}`", self.database))
            .await
            .map_err(classify)
    }
}

fn classify(err: mysql_async::Error) -> AdapterError {
    match &err {
        mysql_async::Error::Server(server) => match server.code {
            1044 | 1045 | 1698 => AdapterError::Auth(server.message.clone()),
            1049 | 1146 => AdapterError::ContainerMissing(server.message.clone()),
            1062 => AdapterError::DuplicateKey(server.message.clone()),
            _ => AdapterError::Backend(server.message.clone()),
        },
        mysql_async::Error::Io(io) => AdapterError::Unavailable(io.to_string()),
        _ => AdapterError::Backend(err.to_string()),
    }
}

fn text_field(record: &Value, field: &str) -> mysql_async::Value {
    mysql_async::Value::from(record.get(field).and_then(Value::as_str).unwrap_or_default())
}

fn float_field(record: &Value, field: &str) -> mysql_async::Value {
    mysql_async::Value::from(record.get(field).and_then(Value::as_f64).unwrap_or_default())
}

fn bool_field(record: &Value, field: &str) -> mysql_async::Value {
    mysql_async::Value::from(record.get(field).and_then(Value::as_i64).unwrap_or_default())
}

fn json_field(record: &Value, field: &str) -> mysql_async::Value {
    let rendered = record
        .get(field)
        .map(|v| v.to_string())
        .unwrap_or_else(|| "[]".to_string());
    mysql_async::Value::from(rendered)
}

fn row_params(id: &str, record: &Value) -> Vec<mysql_async::Value> {
    vec![
        mysql_async::Value::from(id),
        text_field(record, "name"),
        text_field(record, "address"),
        text_field(record, "city"),
        text_field(record, "country"),
        text_field(record, "email"),
        text_field(record, "phone"),
        text_field(record, "url"),
        float_field(record, "price"),
        float_field(record, "avg_rating"),
        bool_field(record, "free_parking"),
        bool_field(record, "free_breakfast"),
        json_field(record, "public_likes"),
        json_field(record, "reviews"),
        text_field(record, "padding"),
    ]
}

#[async_trait]
impl BackendAdapter for MysqlAdapter {
    fn kind(&self) -> BackendKind {
        BackendKind::Mysql
    }

    fn supported_ops(&self) -> &[OpKind] {
        &SUPPORTED_OPS
    }

    async fn count(&self) -> Result<u64, AdapterError> {
        let mut conn = self.pool.get_conn().await.map_err(classify)?;
        let count: Option<u64> = conn
            .query_first(format!("SELECT COUNT(*) FROM {}", self.qualified_table()))
            .await
            .map_err(classify)?;
        Ok(count.unwrap_or(0))
    }

    async fn insert_one(&self, record: Value) -> Result<(), AdapterError> {
        self.insert_row(&record).await
    }

    /// Rows are inserted one statement at a time so a bad row only costs
    /// its own slot; MySQL multi-row inserts would fail the whole batch.
    async fn insert_batch(&self, records: Vec<Value>) -> Result<BatchOutcome, AdapterError> {
        let mut outcome = BatchOutcome::default();
        for (index, record) in records.iter().enumerate() {
            match self.insert_row(record).await {
                Ok(()) => outcome.inserted += 1,
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => outcome.failures.push(BatchFailure {
                    index,
                    message: err.to_string(),
                }),
            }
        }
        Ok(outcome)
    }

    /// `ORDER BY RAND() LIMIT 1`; acceptable at loader populations, and
    /// explicitly not required to be uniform.
    async fn pick_random_key(&self) -> Result<Option<RecordKey>, AdapterError> {
        let mut conn = self.pool.get_conn().await.map_err(classify)?;
        let id: Option<String> = conn
            .query_first(format!(
                "SELECT id FROM {} ORDER BY RAND() LIMIT 1",
                self.qualified_table()
            ))
            .await
            .map_err(classify)?;
        Ok(id.map(RecordKey::Text))
    }

    async fn update_by_key(&self, key: &RecordKey, record: Value) -> Result<(), AdapterError> {
        let mut conn = self.pool.get_conn().await.map_err(classify)?;
        let assignments = HOTEL_COLUMNS
            .iter()
            .skip(1)
            .map(|c| format!("`{c}` = ?"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "UPDATE {} SET {} WHERE id = ?",
            self.qualified_table(),
            assignments
        );
        let mut params = row_params(&key.to_string(), &record);
        // Shift the id from the column list to the WHERE clause.
        params.remove(0);
        params.push(mysql_async::Value::from(key.to_string()));
        conn.exec_drop(sql, Params::Positional(params))
            .await
            .map_err(classify)?;
        if conn.affected_rows() == 0 {
            return Err(AdapterError::KeyNotFound(key.to_string()));
        }
        Ok(())
    }

    async fn delete_by_key(&self, key: &RecordKey) -> Result<(), AdapterError> {
        let mut conn = self.pool.get_conn().await.map_err(classify)?;
        conn.exec_drop(
            format!("DELETE FROM {} WHERE id = ?", self.qualified_table()),
            Params::Positional(vec![mysql_async::Value::from(key.to_string())]),
        )
        .await
        .map_err(classify)?;
        Ok(())
    }

    async fn initialize_container(&self) -> Result<(), AdapterError> {
        if !self.init_schema {
            debug!("schema init disabled for {}", self.qualified_table());
            return Ok(());
        }
        let mut conn = self.pool.get_conn().await.map_err(classify)?;
        conn.query_drop(format!("CREATE DATABASE IF NOT EXISTS `{}`", self.database))
            .await
            .map_err(classify)?;
        conn.query_drop(format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            self.qualified_table(),
            self.columns_ddl
        ))
        .await
        .map_err(classify)?;
        Ok(())
    }

    async fn drop_container(&self) -> Result<(), AdapterError> {
        let mut conn = self.pool.get_conn().await.map_err(classify)?;
        conn.query_drop(format!("DROP TABLE IF EXISTS {}", self.qualified_table()))
            .await
            .map_err(classify)
    }
}
