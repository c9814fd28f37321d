//! # Data-Access Facade
//!
//! `DataStore` turns structured requests into bound statements, runs raw
//! SQL with optional parameters and carries the string codec.
//!
//! ## Operation Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  insert / insert_many          ──► Statement::insert / insert_many      │
//! │  update                        ──► Statement::update                    │
//! │  delete / delete_many          ──► Statement::delete / delete_many      │
//! │  query / execute (Params)      ──► raw, or positional / named binding   │
//! │  query_first_name              ──► query, then row[0]["name"]           │
//! │  encode / decode               ──► Codec (no database round trip)       │
//! │  transaction                   ──► Database::transaction                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Empty batches for `insert_many` and `delete_many` return `Ok(0)` without
//! touching the database.

use futures_util::future::BoxFuture;

use kasir_core::{Codec, CodecError, Fields, Params, Row, SqlValue};

use crate::error::{DbError, DbResult};
use crate::exec::{PooledConn, Runner};
use crate::pool::Database;
use crate::session::Session;

/// Facade over a [`Database`] handle.
#[derive(Debug, Clone)]
pub struct DataStore {
    db: Database,
    codec: std::sync::Arc<Codec>,
}

impl DataStore {
    /// Creates a facade over `database`, keying the codec with `secret`.
    pub fn new(database: Database, secret: impl Into<String>) -> Self {
        DataStore {
            db: database,
            codec: std::sync::Arc::new(Codec::new(secret)),
        }
    }

    /// The underlying connection handle.
    pub fn database(&self) -> &Database {
        &self.db
    }

    fn runner<'c>(&self, conn: &'c mut PooledConn) -> Runner<'c> {
        Runner::new(conn.as_conn(), self.db.dialect(), self.db.options().persistent)
    }

    // =========================================================================
    // Structured DML
    // =========================================================================

    /// Inserts one row; returns the affected row count.
    ///
    /// ## Example
    /// ```rust,ignore
    /// let user = Fields::new().with("name", "Ned").with("role", "user");
    /// store.insert("users", &user).await?;
    /// ```
    pub async fn insert(&self, table: &str, fields: &Fields) -> DbResult<u64> {
        let mut conn = self.db.acquire().await?;
        self.runner(&mut conn).insert(table, fields).await
    }

    /// Inserts a batch with multi-row statements.
    ///
    /// Every row must have the first row's column set. A batch too large
    /// for one statement is split at the engine's bind limit and the
    /// pieces run in one transaction, so it lands whole or not at all.
    pub async fn insert_many(&self, table: &str, rows: &[Fields]) -> DbResult<u64> {
        if rows.is_empty() {
            return Ok(0);
        }
        let mut conn = self.db.acquire().await?;
        self.runner(&mut conn).insert_many(table, rows).await
    }

    /// Updates rows matching every condition.
    pub async fn update(&self, table: &str, set: &Fields, conditions: &Fields) -> DbResult<u64> {
        let mut conn = self.db.acquire().await?;
        self.runner(&mut conn).update(table, set, conditions).await
    }

    /// Deletes rows matching every condition.
    pub async fn delete(&self, table: &str, conditions: &Fields) -> DbResult<u64> {
        let mut conn = self.db.acquire().await?;
        self.runner(&mut conn).delete(table, conditions).await
    }

    /// Deletes rows matching any of the condition groups.
    ///
    /// Split and wrapped in a transaction the same way as `insert_many`.
    pub async fn delete_many(&self, table: &str, groups: &[Fields]) -> DbResult<u64> {
        if groups.is_empty() {
            return Ok(0);
        }
        let mut conn = self.db.acquire().await?;
        self.runner(&mut conn).delete_many(table, groups).await
    }

    // =========================================================================
    // Raw SQL
    // =========================================================================

    /// Runs a query; `Params::None` sends the SQL unprepared.
    pub async fn query(&self, sql: &str, params: Params) -> DbResult<Vec<Row>> {
        let mut conn = self.db.acquire().await?;
        self.runner(&mut conn).query(sql, params).await
    }

    /// [`DataStore::query`] with `?` placeholders.
    pub async fn query_positional<I, V>(&self, sql: &str, values: I) -> DbResult<Vec<Row>>
    where
        I: IntoIterator<Item = V>,
        V: Into<SqlValue>,
    {
        self.query(sql, Params::positional(values)).await
    }

    /// [`DataStore::query`] with `:name` references.
    pub async fn query_named<I, K, V>(&self, sql: &str, values: I) -> DbResult<Vec<Row>>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<SqlValue>,
    {
        self.query(sql, Params::named(values)).await
    }

    /// The `name` column of the first row as text.
    ///
    /// Empty string when nothing matched or the column is absent.
    pub async fn query_first_name(&self, sql: &str, params: Params) -> DbResult<String> {
        let mut conn = self.db.acquire().await?;
        self.runner(&mut conn).query_first_name(sql, params).await
    }

    /// Runs a statement and returns the affected row count.
    pub async fn execute(&self, sql: &str, params: Params) -> DbResult<u64> {
        let mut conn = self.db.acquire().await?;
        self.runner(&mut conn).execute(sql, params).await
    }

    /// Escapes `value` for embedding in hand-built SQL, without quotes.
    ///
    /// ## Warning
    /// Discouraged. Concatenated SQL can still break on adjacent syntax;
    /// bind parameters through [`DataStore::query`] instead. Kept for
    /// callers that still assemble SQL by hand.
    pub fn escape_literal(&self, value: &str) -> String {
        kasir_core::escape_literal(self.db.dialect(), value)
    }

    // =========================================================================
    // Codec
    // =========================================================================

    pub fn encode(&self, plaintext: &str) -> String {
        self.codec.encode(plaintext)
    }

    pub fn decode(&self, encoded: &str) -> Result<String, CodecError> {
        self.codec.decode(encoded)
    }

    /// See [`Database::transaction`].
    pub async fn transaction<F, T, E>(&self, operation: F) -> Result<T, E>
    where
        F: for<'c> FnOnce(&'c mut Session) -> BoxFuture<'c, Result<T, E>>,
        E: From<DbError>,
    {
        self.db.transaction(operation).await
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    async fn test_store() -> DataStore {
        let db = Database::connect("sqlite::memory:", "", "", &BTreeMap::new())
            .await
            .unwrap();
        let store = DataStore::new(db, "test-secret");
        store
            .execute(
                "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL UNIQUE, role TEXT, score REAL)",
                Params::None,
            )
            .await
            .unwrap();
        store
    }

    fn user(name: &str, role: &str) -> Fields {
        Fields::new().with("name", name).with("role", role)
    }

    async fn names(store: &DataStore) -> Vec<String> {
        store
            .query("SELECT name FROM users ORDER BY name", Params::None)
            .await
            .unwrap()
            .iter()
            .filter_map(|row| row.get_text("name"))
            .collect()
    }

    #[tokio::test]
    async fn test_insert_then_select_returns_same_fields() {
        let store = test_store().await;
        let fields = Fields::new()
            .with("name", "Ned")
            .with("role", "user")
            .with("score", 4.5);

        assert_eq!(store.insert("users", &fields).await.unwrap(), 1);

        let rows = store
            .query_named("SELECT name, role, score FROM users WHERE name = :name", [("name", "Ned")])
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].clone().into_fields(), fields);
    }

    #[tokio::test]
    async fn test_update_only_touches_matching_rows() {
        let store = test_store().await;
        store
            .insert_many("users", &[user("Ned", "user"), user("Olivia", "user")])
            .await
            .unwrap();

        let affected = store
            .update(
                "users",
                &Fields::new().with("role", "admin"),
                &Fields::new().with("name", "Ned"),
            )
            .await
            .unwrap();
        assert_eq!(affected, 1);

        let ned = store
            .query_positional("SELECT role FROM users WHERE name = ?", ["Ned"])
            .await
            .unwrap();
        let olivia = store
            .query_positional("SELECT role FROM users WHERE name = ?", ["Olivia"])
            .await
            .unwrap();
        assert_eq!(ned[0].get_text("role").as_deref(), Some("admin"));
        assert_eq!(olivia[0].get_text("role").as_deref(), Some("user"));
    }

    #[tokio::test]
    async fn test_delete_many_removes_every_group() {
        let store = test_store().await;
        store
            .insert_many(
                "users",
                &[user("A", "user"), user("B", "admin"), user("C", "user")],
            )
            .await
            .unwrap();

        let affected = store
            .delete_many(
                "users",
                &[
                    Fields::new().with("name", "A").with("role", "user"),
                    Fields::new().with("name", "B").with("role", "admin"),
                ],
            )
            .await
            .unwrap();

        assert_eq!(affected, 2);
        assert_eq!(names(&store).await, vec!["C".to_string()]);
    }

    #[tokio::test]
    async fn test_empty_batches_are_noops() {
        let store = test_store().await;
        assert_eq!(store.insert_many("users", &[]).await.unwrap(), 0);
        assert_eq!(store.delete_many("users", &[]).await.unwrap(), 0);
        // Not even the table name is checked when there is nothing to do.
        assert_eq!(store.insert_many("no such table", &[]).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_insert_many_rejects_mixed_columns() {
        let store = test_store().await;
        let rows = [user("A", "user"), Fields::new().with("name", "B")];
        let err = store.insert_many("users", &rows).await.unwrap_err();
        assert!(matches!(err, DbError::Statement(_)));
        assert!(names(&store).await.is_empty());
    }

    #[tokio::test]
    async fn test_insert_many_keys_rows_by_column_name() {
        let store = test_store().await;
        let rows = [
            user("A", "user"),
            Fields::new().with("role", "admin").with("name", "B"),
        ];
        store.insert_many("users", &rows).await.unwrap();

        let role = store
            .query_first_name("SELECT role AS name FROM users WHERE name = 'B'", Params::None)
            .await
            .unwrap();
        assert_eq!(role, "admin");
    }

    #[tokio::test]
    async fn test_unique_violation_is_classified() {
        let store = test_store().await;
        store.insert("users", &user("Ned", "user")).await.unwrap();
        let err = store.insert("users", &user("Ned", "admin")).await.unwrap_err();
        assert!(err.is_constraint_violation());
    }

    #[tokio::test]
    async fn test_query_first_name() {
        let store = test_store().await;
        store.insert("users", &user("Ned", "user")).await.unwrap();

        let name = store
            .query_first_name("SELECT name FROM users WHERE role = ?", Params::positional(["user"]))
            .await
            .unwrap();
        assert_eq!(name, "Ned");

        let none = store
            .query_first_name("SELECT name FROM users WHERE role = ?", Params::positional(["ghost"]))
            .await
            .unwrap();
        assert_eq!(none, "");

        let no_column = store
            .query_first_name("SELECT role FROM users", Params::None)
            .await
            .unwrap();
        assert_eq!(no_column, "");
    }

    #[tokio::test]
    async fn test_execute_returns_affected_rows() {
        let store = test_store().await;
        store
            .insert_many("users", &[user("A", "user"), user("B", "user")])
            .await
            .unwrap();

        let affected = store
            .execute(
                "UPDATE users SET role = :role WHERE role = :old",
                Params::named([("role", "staff"), (":old", "user")]),
            )
            .await
            .unwrap();
        assert_eq!(affected, 2);
    }

    #[tokio::test]
    async fn test_transaction_commits_on_ok() {
        let store = test_store().await;
        let inserted: DbResult<u64> = store
            .transaction(|session| {
                Box::pin(async move {
                    session.insert("users", &user("A", "user")).await?;
                    session.insert("users", &user("B", "user")).await
                })
            })
            .await;

        assert_eq!(inserted.unwrap(), 1);
        assert_eq!(names(&store).await, vec!["A".to_string(), "B".to_string()]);
    }

    #[tokio::test]
    async fn test_transaction_rolls_back_and_returns_original_error() {
        #[derive(Debug, PartialEq)]
        enum AppError {
            Db(String),
            Rejected(&'static str),
        }
        impl From<DbError> for AppError {
            fn from(err: DbError) -> Self {
                AppError::Db(err.to_string())
            }
        }

        let store = test_store().await;
        let result: Result<(), AppError> = store
            .transaction(|session| {
                Box::pin(async move {
                    session.insert("users", &user("A", "user")).await?;
                    Err(AppError::Rejected("stop"))
                })
            })
            .await;

        assert_eq!(result, Err(AppError::Rejected("stop")));
        assert!(names(&store).await.is_empty());
    }

    #[tokio::test]
    async fn test_transaction_passes_none_through() {
        let store = test_store().await;
        let value: DbResult<Option<String>> = store
            .transaction(|session| {
                Box::pin(async move {
                    let name = session
                        .query_first_name("SELECT name FROM users", Params::None)
                        .await?;
                    Ok((!name.is_empty()).then_some(name))
                })
            })
            .await;

        assert_eq!(value.unwrap(), None);
        // The connection is released after commit.
        assert!(store.database().health_check().await);
    }

    #[tokio::test]
    async fn test_codec_roundtrip_through_store() {
        let store = test_store().await;
        let encoded = store.encode("token-123");
        assert_ne!(encoded, "token-123");
        assert_eq!(store.decode(&encoded).unwrap(), "token-123");
        assert!(store.decode("garbage!").is_err());
    }

    #[tokio::test]
    async fn test_escape_literal_uses_dialect() {
        let store = test_store().await;
        assert_eq!(store.escape_literal("O'Brien"), "O''Brien");
    }

    #[tokio::test]
    async fn test_null_values_roundtrip() {
        let store = test_store().await;
        let fields = Fields::new()
            .with("name", "Ned")
            .with("role", SqlValue::Null);
        store.insert("users", &fields).await.unwrap();

        let deleted = store
            .delete("users", &Fields::new().with("role", SqlValue::Null))
            .await
            .unwrap();
        assert_eq!(deleted, 1);
    }

    fn numbered_users(count: usize) -> Vec<Fields> {
        (0..count)
            .map(|i| {
                Fields::new()
                    .with("id", i as i64)
                    .with("name", format!("user-{i}"))
                    .with("role", "user")
                    .with("score", 1.5)
            })
            .collect()
    }

    async fn count_users(store: &DataStore) -> Option<i64> {
        store
            .query("SELECT COUNT(*) AS n FROM users", Params::None)
            .await
            .unwrap()[0]
            .get("n")
            .and_then(SqlValue::as_i64)
    }

    #[tokio::test]
    async fn test_boolean_datetime_and_decimal_columns_decode() {
        let store = test_store().await;
        store
            .execute(
                "CREATE TABLE pos_last_date (id INTEGER, last_date DATETIME, price DECIMAL(10,2), active BOOLEAN)",
                Params::None,
            )
            .await
            .unwrap();
        store
            .insert(
                "pos_last_date",
                &Fields::new()
                    .with("id", 1)
                    .with("last_date", "2024-01-01 10:00:00")
                    .with("price", 12.5)
                    .with("active", true),
            )
            .await
            .unwrap();
        store
            .insert(
                "pos_last_date",
                &Fields::new()
                    .with("id", 2)
                    .with("last_date", SqlValue::Null)
                    .with("price", SqlValue::Null)
                    .with("active", false),
            )
            .await
            .unwrap();

        // Raw path.
        let rows = store
            .query("SELECT * FROM pos_last_date ORDER BY id", Params::None)
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("id"), Some(&SqlValue::Int(1)));
        assert_eq!(
            rows[0].get("last_date"),
            Some(&SqlValue::from("2024-01-01 10:00:00"))
        );
        assert_eq!(rows[0].get("price"), Some(&SqlValue::Float(12.5)));
        assert_eq!(rows[0].get("active"), Some(&SqlValue::Bool(true)));
        assert_eq!(rows[1].get("last_date"), Some(&SqlValue::Null));
        assert_eq!(rows[1].get("active"), Some(&SqlValue::Bool(false)));

        // Prepared path.
        let rows = store
            .query_positional("SELECT active, last_date FROM pos_last_date WHERE id = ?", [1])
            .await
            .unwrap();
        assert_eq!(rows[0].get("active"), Some(&SqlValue::Bool(true)));
        assert_eq!(
            rows[0].get_text("last_date").as_deref(),
            Some("2024-01-01 10:00:00")
        );
    }

    #[tokio::test]
    async fn test_insert_many_past_bind_limit() {
        let store = test_store().await;
        // 4 columns × 10 000 rows is more binds than SQLite takes at once.
        let inserted = store.insert_many("users", &numbered_users(10_000)).await.unwrap();
        assert_eq!(inserted, 10_000);
        assert_eq!(count_users(&store).await, Some(10_000));

        let groups: Vec<Fields> = (0..1_200)
            .map(|i| Fields::new().with("id", i as i64))
            .collect();
        assert_eq!(store.delete_many("users", &groups).await.unwrap(), 1_200);
        assert_eq!(count_users(&store).await, Some(8_800));
    }

    #[tokio::test]
    async fn test_split_batch_is_all_or_nothing() {
        let store = test_store().await;
        let mut rows = numbered_users(10_000);
        // Fails in the second chunk, after the first one already ran.
        rows[9_500].set("name", "user-0");

        let err = store.insert_many("users", &rows).await.unwrap_err();
        assert!(err.is_constraint_violation());
        assert_eq!(count_users(&store).await, Some(0));
    }

    #[tokio::test]
    async fn test_split_batch_inside_transaction_rolls_back_with_it() {
        let store = test_store().await;
        let rows = numbered_users(10_000);

        let result: DbResult<()> = store
            .transaction(|session| {
                Box::pin(async move {
                    assert_eq!(session.insert_many("users", &rows).await?, 10_000);
                    Err(DbError::TransactionFailed("abandon".into()))
                })
            })
            .await;

        assert!(result.is_err());
        assert_eq!(count_users(&store).await, Some(0));
    }
}
