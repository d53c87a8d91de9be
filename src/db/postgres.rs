//! PostgreSQL connector implementation.
//!
//! Each `PgConnector` owns a lazily-connected sqlx pool built from the
//! credentials of a single profile. Statements always go through the
//! extended protocol, so the submitted text is prepared as exactly one
//! statement and never spliced into another.

use crate::config::ConnectionConfig;
use crate::db::{ColumnInfo, Connector, EngineConnection, Profile, Row, TabularResult, Value};
use crate::error::{ConnectivityError, EngineError, LookoutError, Result};
use async_trait::async_trait;
use futures::TryStreamExt;
use sqlx::pool::PoolConnection;
use sqlx::postgres::types::{Oid, PgMoney};
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions, PgRow, PgSslMode};
use sqlx::types::chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use sqlx::types::{Decimal, Uuid};
use sqlx::{Column as SqlxColumn, Connection, Executor, Postgres, Row as SqlxRow, Statement, TypeInfo};
use std::str::FromStr;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Maximum pooled connections per profile.
const MAX_CONNECTIONS: u32 = 5;

/// Time allowed to check out or open a connection.
const ACQUIRE_TIMEOUT_SECS: u64 = 10;

/// Connection settings derived from configuration for one profile.
#[derive(Debug, Clone)]
pub struct PgConnectorOptions {
    /// Server-side statement timeout.
    pub statement_timeout: Duration,
    /// Start every transaction read-only.
    pub read_only: bool,
}

/// PostgreSQL connector bound to one credential profile.
#[derive(Debug)]
pub struct PgConnector {
    profile: Profile,
    pool: PgPool,
    target: String,
}

impl PgConnector {
    /// Builds a connector from the credentials of `profile` only.
    ///
    /// No connection is opened until the first acquire.
    pub fn new(
        profile: Profile,
        config: &ConnectionConfig,
        options: PgConnectorOptions,
    ) -> Result<Self> {
        let connect_options = connect_options(profile, config, &options)?;
        let pool = PgPoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .acquire_timeout(Duration::from_secs(ACQUIRE_TIMEOUT_SECS))
            .connect_lazy_with(connect_options);

        debug!(
            "Configured {} connector for {}{}",
            profile,
            config.display_string(),
            if options.read_only { " (read-only)" } else { "" }
        );

        Ok(Self {
            profile,
            pool,
            target: config.display_string(),
        })
    }

    /// Closes the pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn connect_options(
    profile: Profile,
    config: &ConnectionConfig,
    options: &PgConnectorOptions,
) -> Result<PgConnectOptions> {
    let database = config.database.as_deref().ok_or_else(|| {
        LookoutError::config(format!("Database name is required for the {profile} profile"))
    })?;

    let mut connect = PgConnectOptions::new()
        .host(config.host.as_deref().unwrap_or("localhost"))
        .port(config.port())
        .database(database)
        .application_name("db-lookout");

    if let Some(user) = &config.user {
        connect = connect.username(user);
    }
    if let Some(password) = &config.password {
        connect = connect.password(password);
    }
    if let Some(mode) = &config.sslmode {
        let mode = PgSslMode::from_str(mode)
            .map_err(|e| LookoutError::config(format!("Invalid sslmode '{mode}': {e}")))?;
        connect = connect.ssl_mode(mode);
    }

    let timeout_ms = options.statement_timeout.as_millis().to_string();
    let mut runtime = vec![("statement_timeout", timeout_ms)];
    if options.read_only {
        runtime.push(("default_transaction_read_only", "on".to_string()));
    }

    Ok(connect.options(runtime))
}

#[async_trait]
impl Connector for PgConnector {
    fn profile(&self) -> Profile {
        self.profile
    }

    async fn connect(&self) -> std::result::Result<Box<dyn EngineConnection>, ConnectivityError> {
        let conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| map_connection_error(self.profile, &self.target, e))?;
        Ok(Box::new(PgEngineConnection { conn }))
    }
}

/// A pooled connection; returned to its pool when dropped.
struct PgEngineConnection {
    conn: PoolConnection<Postgres>,
}

#[async_trait]
impl EngineConnection for PgEngineConnection {
    async fn fetch_all(
        &mut self,
        sql: &str,
        max_rows: usize,
    ) -> std::result::Result<TabularResult, EngineError> {
        let start = Instant::now();
        let mut rows: Vec<Row> = Vec::new();
        let mut columns: Vec<ColumnInfo> = Vec::new();
        let mut total_rows = 0usize;

        {
            let mut stream = sqlx::query(sql).fetch(&mut *self.conn);
            while let Some(row) = stream.try_next().await.map_err(map_engine_error)? {
                if total_rows == 0 {
                    columns = column_info(&row);
                }
                total_rows += 1;
                if rows.len() < max_rows {
                    rows.push(convert_row(&row)?);
                }
            }
        }

        if total_rows == 0 {
            // Empty results still have a shape; the prepared statement knows it.
            columns = match (&mut *self.conn).prepare(sql).await {
                Ok(statement) => statement
                    .columns()
                    .iter()
                    .map(|col| ColumnInfo::new(col.name(), col.type_info().name()))
                    .collect(),
                Err(e) => {
                    debug!("Could not describe empty result: {}", e);
                    Vec::new()
                }
            };
        }

        if total_rows > max_rows {
            warn!(
                "Query returned {} rows, truncating to {} rows",
                total_rows, max_rows
            );
        }

        Ok(TabularResult::new(columns, rows)
            .truncated_from(total_rows)
            .with_execution_time(start.elapsed()))
    }

    async fn execute_atomic(
        &mut self,
        statement: &str,
        params: &[String],
    ) -> std::result::Result<u64, EngineError> {
        let mut tx = self.conn.begin().await.map_err(map_engine_error)?;

        let mut query = sqlx::query(statement);
        for param in params {
            query = query.bind(param.as_str());
        }

        // Dropping `tx` on the error path rolls the transaction back.
        let done = query.execute(&mut *tx).await.map_err(map_engine_error)?;
        tx.commit().await.map_err(map_engine_error)?;

        Ok(done.rows_affected())
    }
}

fn column_info(row: &PgRow) -> Vec<ColumnInfo> {
    row.columns()
        .iter()
        .map(|col| ColumnInfo::new(col.name(), col.type_info().name()))
        .collect()
}

/// Converts a sqlx PgRow to our Row type.
fn convert_row(row: &PgRow) -> std::result::Result<Row, EngineError> {
    row.columns()
        .iter()
        .enumerate()
        .map(|(i, col)| convert_value(row, i, col.type_info().name()))
        .collect()
}

/// Converts a single column value from a PgRow to our Value type.
///
/// Exact numerics become floats when that loses nothing and text otherwise.
/// Temporal, UUID and JSON values become their canonical text. A value that
/// cannot be decoded is an error, never a NULL.
fn convert_value(
    row: &PgRow,
    index: usize,
    type_name: &str,
) -> std::result::Result<Value, EngineError> {
    let value = match type_name.to_uppercase().as_str() {
        "BOOL" | "BOOLEAN" => decode::<bool>(row, index)?.map(Value::Bool),
        "INT2" | "SMALLINT" => decode::<i16>(row, index)?.map(|v| Value::Int(v as i64)),
        "INT4" | "INT" | "INTEGER" => decode::<i32>(row, index)?.map(|v| Value::Int(v as i64)),
        "INT8" | "BIGINT" => decode::<i64>(row, index)?.map(Value::Int),
        "OID" => decode::<Oid>(row, index)?.map(|v| Value::Int(v.0 as i64)),
        "FLOAT4" | "REAL" => decode::<f32>(row, index)?.map(|v| Value::Float(v as f64)),
        "FLOAT8" | "DOUBLE PRECISION" => decode::<f64>(row, index)?.map(Value::Float),
        "NUMERIC" | "DECIMAL" => decode::<Decimal>(row, index)?.map(decimal_value),
        "MONEY" => decode::<PgMoney>(row, index)?.map(|v| decimal_value(v.to_decimal(2))),
        "DATE" => decode::<NaiveDate>(row, index)?.map(|v| Value::String(v.to_string())),
        "TIME" => decode::<NaiveTime>(row, index)?.map(|v| Value::String(v.to_string())),
        "TIMESTAMP" => decode::<NaiveDateTime>(row, index)?.map(|v| Value::String(v.to_string())),
        "TIMESTAMPTZ" => {
            decode::<DateTime<Utc>>(row, index)?.map(|v| Value::String(v.to_rfc3339()))
        }
        "UUID" => decode::<Uuid>(row, index)?.map(|v| Value::String(v.to_string())),
        "JSON" | "JSONB" => {
            decode::<serde_json::Value>(row, index)?.map(|v| Value::String(v.to_string()))
        }
        "BYTEA" => decode::<Vec<u8>>(row, index)?.map(Value::Bytes),
        // pg_sleep() and friends
        "VOID" => None,
        _ => decode::<String>(row, index)?.map(Value::String),
    };
    Ok(value.unwrap_or(Value::Null))
}

/// Decodes one nullable column.
fn decode<'r, T>(row: &'r PgRow, index: usize) -> std::result::Result<Option<T>, EngineError>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get::<Option<T>, _>(index).map_err(|e| {
        let (name, type_name) = row
            .columns()
            .get(index)
            .map(|col| (col.name(), col.type_info().name()))
            .unwrap_or(("?column?", "UNKNOWN"));
        warn!("Cannot decode column {} ({}): {}", name, type_name, e);
        EngineError::Other(format!(
            "Cannot display column \"{name}\" of type {type_name}; cast it to text ({name}::text)"
        ))
    })
}

/// Keeps a NUMERIC as a float only when the float prints back identically.
fn decimal_value(decimal: Decimal) -> Value {
    let exact = decimal.normalize().to_string();
    match exact.parse::<f64>() {
        Ok(float) if float.to_string() == exact => Value::Float(float),
        _ => Value::String(decimal.to_string()),
    }
}

/// Maps a failed acquire to a user-facing connectivity error.
fn map_connection_error(profile: Profile, target: &str, error: sqlx::Error) -> ConnectivityError {
    let error_str = error.to_string().to_lowercase();

    let message = if error_str.contains("connection refused") || error_str.contains("could not connect") {
        format!("Cannot connect to {target}. Check that the server is running.")
    } else if error_str.contains("password authentication failed")
        || error_str.contains("authentication failed")
    {
        format!("Authentication failed for the {profile} profile. Check its credentials.")
    } else if error_str.contains("does not exist") && error_str.contains("database") {
        format!("Database for the {profile} profile does not exist ({target}).")
    } else if matches!(error, sqlx::Error::PoolTimedOut)
        || error_str.contains("timed out")
        || error_str.contains("timeout")
    {
        format!("Connection to {target} timed out. The server may be overloaded or unreachable.")
    } else {
        error.to_string()
    };

    warn!("{} connection failed: {}", profile, message);
    ConnectivityError::new(profile, message)
}

/// Classifies a sqlx error raised while a connection is in use.
fn map_engine_error(error: sqlx::Error) -> EngineError {
    match error {
        sqlx::Error::Database(db_error) => EngineError::Database {
            code: db_error.code().map(|c| c.into_owned()),
            message: format_database_error(db_error.as_ref()),
        },
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => EngineError::Connectivity(error.to_string()),
        other => EngineError::Other(other.to_string()),
    }
}

/// Formats a database error with the PostgreSQL detail and hint, if any.
fn format_database_error(db_error: &dyn sqlx::error::DatabaseError) -> String {
    let mut result = String::from(db_error.message());

    if let Some(pg_error) = db_error.try_downcast_ref::<sqlx::postgres::PgDatabaseError>() {
        if let Some(detail) = pg_error.detail() {
            result.push_str("\n  DETAIL: ");
            result.push_str(detail);
        }
        if let Some(hint) = pg_error.hint() {
            result.push_str("\n  HINT: ");
            result.push_str(hint);
        }
        if let Some(column) = pg_error.column() {
            result.push_str("\n  COLUMN: ");
            result.push_str(column);
        }
    }

    result
}
