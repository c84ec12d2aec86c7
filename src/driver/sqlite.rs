//! SQLite driver implementation.
//!
//! Provides the `SqliteConnection` struct that implements the
//! `DriverConnection` trait for SQLite databases using sqlx.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use sqlx::query::Query;
use sqlx::sqlite::{
    Sqlite, SqliteArguments, SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow,
};
use sqlx::{Column as SqlxColumn, Row as SqlxRow, TypeInfo};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};

use super::{DriverConnection, RowStream};
use crate::config::ConnectInfo;
use crate::error::{MapperError, Result};
use crate::params::Parameters;
use crate::types::{ColumnInfo, Row, Value};

/// Statement timeout in seconds. For queries this bounds each row fetch.
const QUERY_TIMEOUT_SECS: u64 = 30;

/// Row prefetch bound for streamed queries.
const ROW_CHANNEL_CAPACITY: usize = 64;

/// SQLite driver connection.
#[derive(Debug)]
pub struct SqliteConnection {
    pool: SqlitePool,
}

impl SqliteConnection {
    /// Opens a SQLite database for the given configuration.
    pub async fn connect(info: &ConnectInfo) -> Result<Self> {
        let options = match info.database.as_deref() {
            None | Some(":memory:") => SqliteConnectOptions::new().in_memory(true),
            Some(path) => SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(info.create_if_missing),
        };

        // One pooled connection: in-memory databases and temporary state
        // live per connection, and the mapping layer serializes statements
        // per connection anyway.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(options)
            .await
            .map_err(|e| map_open_error(e, info))?;

        debug!("Opened {}", info.display_string());
        Ok(Self { pool })
    }

    /// Creates a new SqliteConnection from an existing connection pool.
    ///
    /// This is primarily useful for testing.
    #[allow(dead_code)]
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DriverConnection for SqliteConnection {
    async fn query_raw(&mut self, sql: &str, params: &Parameters) -> Result<RowStream> {
        // Resolve bindings up front so binding failures surface before any
        // rows are produced.
        reject_outputs(params)?;
        params.ordered_for(sql)?;

        let pool = self.pool.clone();
        let sql = sql.to_string();
        let params = params.clone();
        let (tx, rx) = mpsc::channel(ROW_CHANNEL_CAPACITY);

        tokio::spawn(async move {
            let query = match bind_statement(&sql, &params) {
                Ok(query) => query,
                Err(e) => {
                    let _ = tx.send(Err(e)).await;
                    return;
                }
            };

            let mut rows = query.fetch(&pool);
            let mut columns: Option<Arc<Vec<ColumnInfo>>> = None;

            loop {
                let next = match tokio::time::timeout(
                    Duration::from_secs(QUERY_TIMEOUT_SECS),
                    rows.next(),
                )
                .await
                {
                    Ok(next) => next,
                    Err(_) => {
                        warn!("Query timed out after {QUERY_TIMEOUT_SECS} seconds");
                        let _ = tx
                            .send(Err(MapperError::execution(format!(
                                "Statement timed out after {QUERY_TIMEOUT_SECS} seconds"
                            ))))
                            .await;
                        return;
                    }
                };

                let Some(next) = next else {
                    return;
                };

                let message = match next {
                    Ok(row) => Ok(convert_row(&row, &mut columns)),
                    Err(e) => Err(MapperError::execution(format_statement_error(e))),
                };
                let failed = message.is_err();

                // A closed receiver means the caller dropped the stream;
                // abandon the rest of the result.
                if tx.send(message).await.is_err() || failed {
                    return;
                }
            }
        });

        Ok(ReceiverStream::new(rx).boxed())
    }

    async fn execute_raw(&mut self, sql: &str, params: &Parameters) -> Result<u64> {
        reject_outputs(params)?;
        let query = bind_statement(sql, params)?;

        let result = tokio::time::timeout(
            Duration::from_secs(QUERY_TIMEOUT_SECS),
            query.execute(&self.pool),
        )
        .await
        .map_err(|_| {
            warn!("Statement timed out after {QUERY_TIMEOUT_SECS} seconds");
            MapperError::execution(format!(
                "Statement timed out after {QUERY_TIMEOUT_SECS} seconds"
            ))
        })?
        .map_err(|e| MapperError::execution(format_statement_error(e)))?;

        Ok(result.rows_affected())
    }

    async fn close(&mut self) -> Result<()> {
        self.pool.close().await;
        Ok(())
    }
}

/// Rejects parameter sets carrying output-direction entries.
///
/// SQLite statements cannot assign to parameters, so output values can never
/// be produced.
fn reject_outputs(params: &Parameters) -> Result<()> {
    if params.has_outputs() {
        return Err(MapperError::binding(
            "output parameters are not supported by the sqlite backend",
        ));
    }
    Ok(())
}

/// Builds a sqlx query for `sql` with the referenced parameters bound.
///
/// SQLite numbers named placeholders by first occurrence, and repeated
/// occurrences of one token share a slot, so binding the distinct references
/// in scan order lines values up with their names.
fn bind_statement<'q>(
    sql: &'q str,
    params: &'q Parameters,
) -> Result<Query<'q, Sqlite, SqliteArguments<'q>>> {
    let ordered = params.ordered_for(sql)?;
    let mut query = sqlx::query(sql);
    for param in ordered {
        query = match &param.value {
            Value::Null => query.bind(None::<i64>),
            Value::Bool(b) => query.bind(*b),
            Value::Int(i) => query.bind(*i),
            Value::Float(f) => query.bind(*f),
            Value::Text(s) => query.bind(s.as_str()),
            Value::Bytes(b) => query.bind(b.as_slice()),
        };
    }
    Ok(query)
}

/// Converts a sqlx SqliteRow to our Row type.
///
/// Column metadata is built once per result and shared across its rows.
fn convert_row(row: &SqliteRow, columns: &mut Option<Arc<Vec<ColumnInfo>>>) -> Row {
    let shared = columns
        .get_or_insert_with(|| {
            Arc::new(
                row.columns()
                    .iter()
                    .map(|col| ColumnInfo::new(col.name(), col.type_info().name()))
                    .collect(),
            )
        })
        .clone();

    let values = row
        .columns()
        .iter()
        .enumerate()
        .map(|(i, col)| convert_value(row, i, col.type_info().name()))
        .collect();

    Row::new(shared, values)
}

/// Converts a single column value from a SqliteRow to our Value type.
fn convert_value(row: &SqliteRow, index: usize, type_name: &str) -> Value {
    match type_name.to_uppercase().as_str() {
        "BOOLEAN" | "BOOL" => row
            .try_get::<Option<bool>, _>(index)
            .ok()
            .flatten()
            .map(Value::Bool)
            .unwrap_or(Value::Null),

        "INTEGER" | "INT" | "INT4" | "INT8" | "BIGINT" => row
            .try_get::<Option<i64>, _>(index)
            .ok()
            .flatten()
            .map(Value::Int)
            .unwrap_or(Value::Null),

        "REAL" | "FLOAT" | "DOUBLE" => row
            .try_get::<Option<f64>, _>(index)
            .ok()
            .flatten()
            .map(Value::Float)
            .unwrap_or(Value::Null),

        "BLOB" => row
            .try_get::<Option<Vec<u8>>, _>(index)
            .ok()
            .flatten()
            .map(Value::Bytes)
            .unwrap_or(Value::Null),

        "TEXT" => row
            .try_get::<Option<String>, _>(index)
            .ok()
            .flatten()
            .map(Value::Text)
            .unwrap_or(Value::Null),

        // Expression columns carry no declared type ("NULL"), and table
        // columns are dynamically typed anyway; decode from the stored value.
        _ => decode_any(row, index),
    }
}

/// Decodes a value of unknown declared type by trying each storage class.
fn decode_any(row: &SqliteRow, index: usize) -> Value {
    if let Ok(Some(v)) = row.try_get::<Option<i64>, _>(index) {
        return Value::Int(v);
    }
    if let Ok(Some(v)) = row.try_get::<Option<f64>, _>(index) {
        return Value::Float(v);
    }
    if let Ok(Some(v)) = row.try_get::<Option<String>, _>(index) {
        return Value::Text(v);
    }
    if let Ok(Some(v)) = row.try_get::<Option<Vec<u8>>, _>(index) {
        return Value::Bytes(v);
    }
    Value::Null
}

/// Maps sqlx open errors to user-friendly messages.
fn map_open_error(error: sqlx::Error, info: &ConnectInfo) -> MapperError {
    let path = info.database.as_deref().unwrap_or(":memory:");
    let error_str = error.to_string().to_lowercase();

    if error_str.contains("unable to open") || error_str.contains("no such file") {
        MapperError::connection(format!(
            "Cannot open database file '{path}'. Check that the path exists and is writable."
        ))
    } else if error_str.contains("locked") || error_str.contains("busy") {
        MapperError::connection(format!(
            "Database '{path}' is locked by another process."
        ))
    } else if error_str.contains("timed out") || error_str.contains("timeout") {
        MapperError::connection(format!("Opening database '{path}' timed out."))
    } else {
        MapperError::connection(error.to_string())
    }
}

/// Formats a statement error with the database message when available.
fn format_statement_error(error: sqlx::Error) -> String {
    if let Some(db_error) = error.as_database_error() {
        format!("ERROR: {}", db_error.message())
    } else {
        error.to_string()
    }
}
