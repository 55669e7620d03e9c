//! MySQL executor backed by an `sqlx` connection pool

use crate::config::DatabaseConfig;
use crate::error::Result;
use crate::executor::{QueryExecutor, QuerySession};
use crate::params::bind_named;
use crate::table::{Params, ResultSet, Value};
use async_trait::async_trait;
use sqlx::mysql::types::MySqlTime;
use sqlx::mysql::{MySql, MySqlArguments, MySqlConnection, MySqlPool, MySqlPoolOptions, MySqlRow};
use sqlx::query::Query;
use sqlx::{Column, Executor, Row, Statement, Transaction, TypeInfo, ValueRef};
use std::time::Duration;
use tracing::{debug, info, instrument};

pub struct MySqlExecutor {
    pool: MySqlPool,
}

impl MySqlExecutor {
    /// Connect a pool using the given settings
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        config.validate()?;

        let pool = MySqlPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
            .max_lifetime(Duration::from_secs(config.max_lifetime_secs))
            .test_before_acquire(true)
            .connect(&config.url)
            .await?;

        info!(max_connections = config.max_connections, "Connected to database");
        Ok(Self { pool })
    }
}

#[async_trait]
impl QueryExecutor for MySqlExecutor {
    async fn fetch(&self, sql: &str, params: &Params) -> Result<ResultSet> {
        let mut conn = self.pool.acquire().await?;
        fetch_on(&mut conn, sql, params).await
    }

    async fn begin(&self) -> Result<Box<dyn QuerySession + '_>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(MySqlSession { tx }))
    }
}

/// Transaction-scoped session; rolled back when dropped uncommitted
pub struct MySqlSession {
    tx: Transaction<'static, MySql>,
}

#[async_trait]
impl QuerySession for MySqlSession {
    async fn fetch(&mut self, sql: &str, params: &Params) -> Result<ResultSet> {
        fetch_on(&mut self.tx, sql, params).await
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }
}

#[instrument(level = "debug", skip_all, fields(params = params.len()))]
async fn fetch_on(conn: &mut MySqlConnection, sql: &str, params: &Params) -> Result<ResultSet> {
    let bound = bind_named(sql, params)?;

    let mut query = sqlx::query(&bound.sql);
    for value in &bound.values {
        query = bind_value(query, value);
    }
    let rows = query.fetch_all(&mut *conn).await?;

    // An empty result still needs its header, so ask the server for the columns.
    let columns: Vec<String> = match rows.first() {
        Some(row) => row.columns().iter().map(|c| c.name().to_string()).collect(),
        None => {
            let statement = (&mut *conn).prepare(&bound.sql).await?;
            statement
                .columns()
                .iter()
                .map(|c| c.name().to_string())
                .collect()
        },
    };

    let mut result = ResultSet::new(columns);
    for row in &rows {
        result.push_row(decode_row(row)?);
    }

    debug!(rows = result.len(), "Query returned");
    Ok(result)
}

fn bind_value<'q>(
    query: Query<'q, MySql, MySqlArguments>,
    value: &Value,
) -> Query<'q, MySql, MySqlArguments> {
    match value {
        Value::Null => query.bind(None::<String>),
        Value::Bool(v) => query.bind(*v),
        Value::Int(v) => query.bind(*v),
        Value::UInt(v) => query.bind(*v),
        Value::Float(v) => query.bind(*v),
        Value::Text(v) => query.bind(v.clone()),
        Value::Bytes(v) => query.bind(v.clone()),
    }
}

fn decode_row(row: &MySqlRow) -> Result<Vec<Value>> {
    (0..row.columns().len())
        .map(|i| decode_cell(row, i).map_err(Into::into))
        .collect()
}

/// How a cell is read, decided from the column's type name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CellKind {
    Bool,
    Int,
    UInt,
    Float,
    Double,
    Decimal,
    Date,
    DateTime,
    Timestamp,
    Time,
    /// YEAR and BIT arrive as unsigned integers
    Unsigned,
    Binary,
    /// Text when the server sends a string type, raw bytes otherwise
    Other,
}

fn cell_kind(type_name: &str) -> CellKind {
    let type_name = type_name.to_ascii_uppercase();
    let base = type_name.split_whitespace().next().unwrap_or_default();
    let unsigned = type_name.contains("UNSIGNED");

    match base {
        "BOOLEAN" => CellKind::Bool,
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" if unsigned => CellKind::UInt,
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" => CellKind::Int,
        "FLOAT" => CellKind::Float,
        "DOUBLE" => CellKind::Double,
        "DECIMAL" => CellKind::Decimal,
        "DATE" => CellKind::Date,
        "DATETIME" => CellKind::DateTime,
        "TIMESTAMP" => CellKind::Timestamp,
        "TIME" => CellKind::Time,
        "YEAR" | "BIT" => CellKind::Unsigned,
        "BINARY" | "VARBINARY" | "BLOB" | "TINYBLOB" | "MEDIUMBLOB" | "LONGBLOB" => {
            CellKind::Binary
        },
        _ => CellKind::Other,
    }
}

/// Map a MySQL cell onto [`Value`] by its declared column type.
fn decode_cell(row: &MySqlRow, i: usize) -> std::result::Result<Value, sqlx::Error> {
    if row.try_get_raw(i)?.is_null() {
        return Ok(Value::Null);
    }

    let value = match cell_kind(row.columns()[i].type_info().name()) {
        CellKind::Bool => Value::Bool(row.try_get(i)?),
        CellKind::UInt => Value::UInt(row.try_get(i)?),
        CellKind::Int => Value::Int(row.try_get(i)?),
        CellKind::Float => Value::Float(f64::from(row.try_get::<f32, _>(i)?)),
        CellKind::Double => Value::Float(row.try_get(i)?),
        CellKind::Decimal => {
            Value::Text(row.try_get::<sqlx::types::BigDecimal, _>(i)?.to_string())
        },
        CellKind::Date => Value::Text(row.try_get::<chrono::NaiveDate, _>(i)?.to_string()),
        CellKind::DateTime => Value::Text(
            row.try_get::<chrono::NaiveDateTime, _>(i)?
                .format("%Y-%m-%d %H:%M:%S%.f")
                .to_string(),
        ),
        CellKind::Timestamp => Value::Text(
            row.try_get::<chrono::DateTime<chrono::Utc>, _>(i)?
                .format("%Y-%m-%d %H:%M:%S%.f")
                .to_string(),
        ),
        CellKind::Time => Value::Text(format_time(&row.try_get::<MySqlTime, _>(i)?)),
        // The unsigned flag is not guaranteed on these, so skip the type check.
        CellKind::Unsigned => Value::UInt(row.try_get_unchecked::<u64, _>(i)?),
        CellKind::Binary => Value::Bytes(row.try_get(i)?),
        CellKind::Other => match row.try_get::<String, _>(i) {
            Ok(text) => Value::Text(text),
            Err(_) => {
                let raw = row.try_get_unchecked::<Vec<u8>, _>(i)?;
                match String::from_utf8(raw) {
                    Ok(text) => Value::Text(text),
                    Err(e) => Value::Bytes(e.into_bytes()),
                }
            },
        },
    };

    Ok(value)
}

/// `HH:MM:SS[.ffffff]`; TIME spans -838:59:59 to 838:59:59.
fn format_time(time: &MySqlTime) -> String {
    // `MySqlTime::is_negative` reports the inverse sign in sqlx 0.8, so ask the sign directly.
    let sign = if time.sign().is_negative() { "-" } else { "" };
    let mut text = format!(
        "{}{:02}:{:02}:{:02}",
        sign,
        time.hours(),
        time.minutes(),
        time.seconds()
    );
    if time.microseconds() != 0 {
        text.push_str(&format!(".{:06}", time.microseconds()));
    }
    text
}
