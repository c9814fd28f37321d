//! # Statement Execution
//!
//! The connection-level half of the data layer. A [`Runner`] holds one
//! borrowed connection (pooled, or the one an open transaction owns) and
//! carries every DML and query operation, so [`crate::DataStore`] and
//! [`crate::Session`] share a single implementation.
//!
//! ## Two Wire Paths
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Params::None (or empty)          Params::Positional / Params::Named    │
//! │       │                                  │                              │
//! │       ▼                                  ▼                              │
//! │  conn.fetch_all(&str)              Statement::positional / ::named      │
//! │  simple query protocol                   │                              │
//! │  (unprepared, sent as-is)                ▼                              │
//! │                                    sqlx::query(sql).bind(..)..          │
//! │                                    prepared, bound server-side          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Column Decoding
//! Rows are read with each engine's own driver, so every column arrives
//! with its native type:
//!
//! | Column type                         | `SqlValue`                     |
//! |-------------------------------------|--------------------------------|
//! | integer types, MySQL `YEAR`/`BIT`   | `Int` (`Text` past `i64::MAX`) |
//! | boolean (`BOOL`, `TINYINT(1)`)      | `Bool`                         |
//! | float / double                      | `Float`                        |
//! | decimal / numeric                   | `Text`, digits as stored       |
//! | date / time / timestamp             | `Text`, `YYYY-MM-DD HH:MM:SS`  |
//! | uuid / json                         | `Text`                         |
//! | binary / blob / bytea               | `Bytes`                        |
//! | everything else                     | `Text`                         |
//!
//! SQLite is dynamically typed: the stored value's class decides, and a
//! column declared `BOOLEAN` turns integers into `Bool`.
//!
//! Postgres types outside the table (`INTERVAL`, `TIMETZ`, arrays) are read
//! as text and fail to decode on the prepared path; cast them in the query.

use sqlx::encode::IsNull;
use sqlx::error::BoxDynError;
use sqlx::mysql::{MySql, MySqlConnection, MySqlRow};
use sqlx::pool::PoolConnection;
use sqlx::postgres::types::Oid;
use sqlx::postgres::{PgArgumentBuffer, PgConnection, PgRow, PgTypeInfo, Postgres};
use sqlx::query::Query;
use sqlx::sqlite::{Sqlite, SqliteConnection, SqliteRow};
use sqlx::types::chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use sqlx::types::{Decimal, JsonValue, Uuid};
use sqlx::{Column, Connection, Encode, Executor, Row as _, Transaction, Type, TypeInfo, ValueRef};
use tracing::{debug, warn};

use kasir_core::{Dialect, Fields, Params, Row, SqlValue, Statement};

use crate::error::{DbError, DbResult};

/// Evaluates `$body` with `$c` bound to the engine's concrete connection.
macro_rules! on_conn {
    ($conn:expr, $c:ident => $body:expr) => {
        match $conn {
            Conn::MySql($c) => $body,
            Conn::Postgres($c) => $body,
            Conn::Sqlite($c) => $body,
        }
    };
}

// =============================================================================
// Connections
// =============================================================================

/// A borrowed connection to one of the supported engines.
pub(crate) enum Conn<'c> {
    MySql(&'c mut MySqlConnection),
    Postgres(&'c mut PgConnection),
    Sqlite(&'c mut SqliteConnection),
}

/// A connection checked out of the pool; returned on drop.
pub(crate) enum PooledConn {
    MySql(PoolConnection<MySql>),
    Postgres(PoolConnection<Postgres>),
    Sqlite(PoolConnection<Sqlite>),
}

impl PooledConn {
    pub(crate) fn as_conn(&mut self) -> Conn<'_> {
        match self {
            PooledConn::MySql(conn) => Conn::MySql(&mut **conn),
            PooledConn::Postgres(conn) => Conn::Postgres(&mut **conn),
            PooledConn::Sqlite(conn) => Conn::Sqlite(&mut **conn),
        }
    }
}

/// An open transaction. Dropping it without commit rolls back.
pub(crate) enum OpenTx {
    MySql(Transaction<'static, MySql>),
    Postgres(Transaction<'static, Postgres>),
    Sqlite(Transaction<'static, Sqlite>),
}

impl OpenTx {
    pub(crate) fn as_conn(&mut self) -> Conn<'_> {
        match self {
            OpenTx::MySql(tx) => Conn::MySql(&mut **tx),
            OpenTx::Postgres(tx) => Conn::Postgres(&mut **tx),
            OpenTx::Sqlite(tx) => Conn::Sqlite(&mut **tx),
        }
    }

    pub(crate) async fn commit(self) -> Result<(), sqlx::Error> {
        match self {
            OpenTx::MySql(tx) => tx.commit().await,
            OpenTx::Postgres(tx) => tx.commit().await,
            OpenTx::Sqlite(tx) => tx.commit().await,
        }
    }

    pub(crate) async fn rollback(self) -> Result<(), sqlx::Error> {
        match self {
            OpenTx::MySql(tx) => tx.rollback().await,
            OpenTx::Postgres(tx) => tx.rollback().await,
            OpenTx::Sqlite(tx) => tx.rollback().await,
        }
    }
}

// =============================================================================
// Runner
// =============================================================================

/// Every DML and query operation, run on one borrowed connection.
pub(crate) struct Runner<'c> {
    conn: Conn<'c>,
    dialect: Dialect,
    persistent: bool,
}

impl<'c> Runner<'c> {
    pub(crate) fn new(conn: Conn<'c>, dialect: Dialect, persistent: bool) -> Self {
        Runner {
            conn,
            dialect,
            persistent,
        }
    }

    pub(crate) async fn insert(&mut self, table: &str, fields: &Fields) -> DbResult<u64> {
        let statement = Statement::insert(self.dialect, table, fields)?;
        self.run(&statement).await
    }

    pub(crate) async fn insert_many(&mut self, table: &str, rows: &[Fields]) -> DbResult<u64> {
        let statements = Statement::insert_many(self.dialect, table, rows)?;
        self.run_all(&statements).await
    }

    pub(crate) async fn update(
        &mut self,
        table: &str,
        set: &Fields,
        conditions: &Fields,
    ) -> DbResult<u64> {
        let statement = Statement::update(self.dialect, table, set, conditions)?;
        self.run(&statement).await
    }

    pub(crate) async fn delete(&mut self, table: &str, conditions: &Fields) -> DbResult<u64> {
        let statement = Statement::delete(self.dialect, table, conditions)?;
        self.run(&statement).await
    }

    pub(crate) async fn delete_many(&mut self, table: &str, groups: &[Fields]) -> DbResult<u64> {
        let statements = Statement::delete_many(self.dialect, table, groups)?;
        self.run_all(&statements).await
    }

    pub(crate) async fn query(&mut self, sql: &str, params: Params) -> DbResult<Vec<Row>> {
        match prepare(self.dialect, sql, params)? {
            Some(statement) => self.fetch(&statement).await,
            None => self.fetch_raw(sql).await,
        }
    }

    pub(crate) async fn query_first_name(&mut self, sql: &str, params: Params) -> DbResult<String> {
        let rows = self.query(sql, params).await?;
        Ok(first_name(&rows))
    }

    pub(crate) async fn execute(&mut self, sql: &str, params: Params) -> DbResult<u64> {
        match prepare(self.dialect, sql, params)? {
            Some(statement) => self.run(&statement).await,
            None => self.run_raw(sql).await,
        }
    }

    async fn run(&mut self, statement: &Statement) -> DbResult<u64> {
        debug!(sql = %statement.sql, binds = statement.binds.len(), "Executing statement");
        let persistent = self.persistent;
        let affected = on_conn!(&mut self.conn, conn => {
            bind_all(sqlx::query(&statement.sql), &statement.binds)
                .persistent(persistent)
                .execute(&mut **conn)
                .await?
                .rows_affected()
        });
        Ok(affected)
    }

    /// Runs a chunked batch; more than one chunk runs in its own
    /// transaction (a savepoint when one is already open).
    async fn run_all(&mut self, statements: &[Statement]) -> DbResult<u64> {
        let statement = match statements {
            [] => return Ok(0),
            [statement] => statement,
            _ => return self.run_chunks(statements).await,
        };
        self.run(statement).await
    }

    async fn run_chunks(&mut self, statements: &[Statement]) -> DbResult<u64> {
        debug!(chunks = statements.len(), "Executing batch in chunks");
        let persistent = self.persistent;
        on_conn!(&mut self.conn, conn => {
            let mut tx = Connection::begin(&mut **conn).await?;
            let mut affected = 0u64;
            let mut failure = None;
            for statement in statements {
                let outcome = bind_all(sqlx::query(&statement.sql), &statement.binds)
                    .persistent(persistent)
                    .execute(&mut *tx)
                    .await;
                match outcome {
                    Ok(result) => affected += result.rows_affected(),
                    Err(err) => {
                        failure = Some(err);
                        break;
                    }
                }
            }
            match failure {
                None => {
                    tx.commit().await?;
                    Ok(affected)
                }
                Some(err) => {
                    if let Err(rollback_err) = tx.rollback().await {
                        warn!(error = %rollback_err, "Batch rollback failed");
                    }
                    Err(DbError::from(err))
                }
            }
        })
    }

    async fn fetch(&mut self, statement: &Statement) -> DbResult<Vec<Row>> {
        debug!(sql = %statement.sql, binds = statement.binds.len(), "Fetching rows");
        let persistent = self.persistent;
        on_conn!(&mut self.conn, conn => {
            let rows = bind_all(sqlx::query(&statement.sql), &statement.binds)
                .persistent(persistent)
                .fetch_all(&mut **conn)
                .await?;
            rows.iter().map(decode_row).collect()
        })
    }

    async fn run_raw(&mut self, sql: &str) -> DbResult<u64> {
        debug!(sql = %sql, "Executing raw SQL");
        let affected = on_conn!(&mut self.conn, conn => {
            (&mut **conn).execute(sql).await?.rows_affected()
        });
        Ok(affected)
    }

    async fn fetch_raw(&mut self, sql: &str) -> DbResult<Vec<Row>> {
        debug!(sql = %sql, "Fetching rows with raw SQL");
        on_conn!(&mut self.conn, conn => {
            let rows = (&mut **conn).fetch_all(sql).await?;
            rows.iter().map(decode_row).collect()
        })
    }
}

/// Turns raw SQL plus parameters into a bound statement.
///
/// Returns `None` when there is nothing to bind; such SQL is sent unprepared.
pub(crate) fn prepare(dialect: Dialect, sql: &str, params: Params) -> DbResult<Option<Statement>> {
    if params.is_empty() {
        return Ok(None);
    }
    let statement = match params {
        Params::None => return Ok(None),
        Params::Positional(values) => Statement::positional(dialect, sql, values)?,
        Params::Named(values) => Statement::named(dialect, sql, &values)?,
    };
    Ok(Some(statement))
}

/// Text of the `name` column in the first row; empty when absent.
fn first_name(rows: &[Row]) -> String {
    rows.first()
        .and_then(|row| row.get_text("name"))
        .unwrap_or_default()
}

// =============================================================================
// Binding
// =============================================================================

/// How an engine binds a NULL that must fit any column type.
pub(crate) trait BindNull: sqlx::Database {
    fn bind_null<'q>(
        query: Query<'q, Self, <Self as sqlx::Database>::Arguments<'q>>,
    ) -> Query<'q, Self, <Self as sqlx::Database>::Arguments<'q>>;
}

impl BindNull for MySql {
    fn bind_null<'q>(
        query: Query<'q, Self, <Self as sqlx::Database>::Arguments<'q>>,
    ) -> Query<'q, Self, <Self as sqlx::Database>::Arguments<'q>> {
        query.bind(None::<String>)
    }
}

impl BindNull for Sqlite {
    fn bind_null<'q>(
        query: Query<'q, Self, <Self as sqlx::Database>::Arguments<'q>>,
    ) -> Query<'q, Self, <Self as sqlx::Database>::Arguments<'q>> {
        query.bind(None::<String>)
    }
}

impl BindNull for Postgres {
    fn bind_null<'q>(
        query: Query<'q, Self, <Self as sqlx::Database>::Arguments<'q>>,
    ) -> Query<'q, Self, <Self as sqlx::Database>::Arguments<'q>> {
        query.bind(UntypedNull)
    }
}

/// Postgres NULL sent with an unspecified type, so the server infers it
/// from the target column instead of rejecting `text` into `integer`.
struct UntypedNull;

impl Type<Postgres> for UntypedNull {
    fn type_info() -> PgTypeInfo {
        PgTypeInfo::with_oid(Oid(0))
    }
}

impl Encode<'_, Postgres> for UntypedNull {
    fn encode_by_ref(&self, _buf: &mut PgArgumentBuffer) -> Result<IsNull, BoxDynError> {
        Ok(IsNull::Yes)
    }
}

fn bind_all<'q, DB>(
    mut query: Query<'q, DB, <DB as sqlx::Database>::Arguments<'q>>,
    binds: &[SqlValue],
) -> Query<'q, DB, <DB as sqlx::Database>::Arguments<'q>>
where
    DB: BindNull,
    bool: Encode<'q, DB> + Type<DB>,
    i64: Encode<'q, DB> + Type<DB>,
    f64: Encode<'q, DB> + Type<DB>,
    String: Encode<'q, DB> + Type<DB>,
    Vec<u8>: Encode<'q, DB> + Type<DB>,
{
    for value in binds {
        query = match value {
            SqlValue::Null => DB::bind_null(query),
            SqlValue::Bool(v) => query.bind(*v),
            SqlValue::Int(v) => query.bind(*v),
            SqlValue::Float(v) => query.bind(*v),
            SqlValue::Text(v) => query.bind(v.clone()),
            SqlValue::Bytes(v) => query.bind(v.clone()),
        };
    }
    query
}

// =============================================================================
// Decoding
// =============================================================================

/// Reads one column of a driver row as a [`SqlValue`].
pub(crate) trait NativeRow: sqlx::Row {
    fn value_at(&self, index: usize) -> Result<SqlValue, sqlx::Error>;
}

/// Converts a driver row into a name → value row, keeping select-list order.
pub(crate) fn decode_row<R: NativeRow>(row: &R) -> DbResult<Row> {
    let columns = row
        .columns()
        .iter()
        .map(|column| {
            let value = row
                .value_at(column.ordinal())
                .map_err(|err| DbError::Decode {
                    column: column.name().to_string(),
                    message: err.to_string(),
                })?;
            Ok((column.name().to_string(), value))
        })
        .collect::<DbResult<Vec<_>>>()?;
    Ok(Row::new(columns))
}

fn unsigned(value: u64) -> SqlValue {
    i64::try_from(value).map_or_else(|_| SqlValue::Text(value.to_string()), SqlValue::Int)
}

fn timestamp_tz(value: DateTime<Utc>) -> SqlValue {
    SqlValue::Text(value.format("%Y-%m-%d %H:%M:%S%.f%:z").to_string())
}

impl NativeRow for SqliteRow {
    fn value_at(&self, index: usize) -> Result<SqlValue, sqlx::Error> {
        let raw = self.try_get_raw(index)?;
        if raw.is_null() {
            return Ok(SqlValue::Null);
        }
        let storage = raw.type_info().name().to_string();
        let declared_bool = self
            .columns()
            .get(index)
            .is_some_and(|column| column.type_info().name() == "BOOLEAN");

        Ok(match storage.as_str() {
            "INTEGER" => {
                let value: i64 = self.try_get_unchecked(index)?;
                if declared_bool {
                    SqlValue::Bool(value != 0)
                } else {
                    SqlValue::Int(value)
                }
            }
            "REAL" => SqlValue::Float(self.try_get_unchecked(index)?),
            "BLOB" => SqlValue::Bytes(self.try_get_unchecked(index)?),
            _ => SqlValue::Text(self.try_get_unchecked(index)?),
        })
    }
}

impl NativeRow for MySqlRow {
    fn value_at(&self, index: usize) -> Result<SqlValue, sqlx::Error> {
        let raw = self.try_get_raw(index)?;
        if raw.is_null() {
            return Ok(SqlValue::Null);
        }
        let type_name = raw.type_info().name().to_string();

        Ok(match type_name.as_str() {
            "BOOLEAN" => SqlValue::Bool(self.try_get_unchecked(index)?),
            "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" | "YEAR" => {
                SqlValue::Int(self.try_get_unchecked(index)?)
            }
            name if name == "BIT" || name.ends_with(" UNSIGNED") => {
                unsigned(self.try_get_unchecked(index)?)
            }
            "FLOAT" => SqlValue::Float(self.try_get_unchecked::<f32, _>(index)?.into()),
            "DOUBLE" => SqlValue::Float(self.try_get_unchecked(index)?),
            "DATE" => SqlValue::Text(self.try_get_unchecked::<NaiveDate, _>(index)?.to_string()),
            "TIME" => SqlValue::Text(self.try_get_unchecked::<NaiveTime, _>(index)?.to_string()),
            "DATETIME" | "TIMESTAMP" => {
                SqlValue::Text(self.try_get_unchecked::<NaiveDateTime, _>(index)?.to_string())
            }
            "BINARY" | "VARBINARY" | "TINYBLOB" | "BLOB" | "MEDIUMBLOB" | "LONGBLOB"
            | "GEOMETRY" => SqlValue::Bytes(self.try_get_unchecked(index)?),
            // DECIMAL and JSON travel as text in both protocols.
            _ => SqlValue::Text(self.try_get_unchecked(index)?),
        })
    }
}

impl NativeRow for PgRow {
    fn value_at(&self, index: usize) -> Result<SqlValue, sqlx::Error> {
        let raw = self.try_get_raw(index)?;
        if raw.is_null() {
            return Ok(SqlValue::Null);
        }
        let type_name = raw.type_info().name().to_string();

        Ok(match type_name.as_str() {
            "BOOL" => SqlValue::Bool(self.try_get_unchecked(index)?),
            "INT2" => SqlValue::Int(self.try_get_unchecked::<i16, _>(index)?.into()),
            "INT4" => SqlValue::Int(self.try_get_unchecked::<i32, _>(index)?.into()),
            "INT8" => SqlValue::Int(self.try_get_unchecked(index)?),
            "FLOAT4" => SqlValue::Float(self.try_get_unchecked::<f32, _>(index)?.into()),
            "FLOAT8" => SqlValue::Float(self.try_get_unchecked(index)?),
            "NUMERIC" => SqlValue::Text(self.try_get_unchecked::<Decimal, _>(index)?.to_string()),
            "BYTEA" => SqlValue::Bytes(self.try_get_unchecked(index)?),
            "DATE" => SqlValue::Text(self.try_get_unchecked::<NaiveDate, _>(index)?.to_string()),
            "TIME" => SqlValue::Text(self.try_get_unchecked::<NaiveTime, _>(index)?.to_string()),
            "TIMESTAMP" => {
                SqlValue::Text(self.try_get_unchecked::<NaiveDateTime, _>(index)?.to_string())
            }
            "TIMESTAMPTZ" => timestamp_tz(self.try_get_unchecked(index)?),
            "UUID" => SqlValue::Text(self.try_get_unchecked::<Uuid, _>(index)?.to_string()),
            "JSON" | "JSONB" => {
                SqlValue::Text(self.try_get_unchecked::<JsonValue, _>(index)?.to_string())
            }
            _ => SqlValue::Text(self.try_get_unchecked(index)?),
        })
    }
}
