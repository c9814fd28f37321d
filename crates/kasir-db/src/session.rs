//! # Transaction Session
//!
//! The handle a [`crate::Database::transaction`] callback works through.
//!
//! ## Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Database::transaction(op)                                              │
//! │       │                                                                 │
//! │       ├── BEGIN ─────────► Session { tx }                               │
//! │       │                        │                                        │
//! │       │                        ▼                                        │
//! │       │                    op(&mut session)  insert / update / query    │
//! │       │                        │                                        │
//! │       │             ┌──────────┴──────────┐                             │
//! │       │            Ok(v)                Err(e)                          │
//! │       │             │                     │                             │
//! │       │          COMMIT               ROLLBACK                          │
//! │       │             │                     │                             │
//! │       ▼             ▼                     ▼                             │
//! │                  Ok(v)                 Err(e)  (unchanged)              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A `Session` has no way to open another transaction, so nesting cannot be
//! expressed. Using the outer `Database` inside the callback is not
//! supported: with the default single connection it waits for the
//! connection the session holds and fails with `PoolExhausted`.

use kasir_core::{Dialect, Fields, Params, Row};

use crate::error::{DbError, DbResult};
use crate::exec::{OpenTx, Runner};

/// Data operations bound to one open transaction.
pub struct Session {
    tx: OpenTx,
    dialect: Dialect,
    persistent: bool,
}

impl Session {
    pub(crate) fn new(tx: OpenTx, dialect: Dialect, persistent: bool) -> Self {
        Session {
            tx,
            dialect,
            persistent,
        }
    }

    /// SQL dialect of the underlying connection.
    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn runner(&mut self) -> Runner<'_> {
        Runner::new(self.tx.as_conn(), self.dialect, self.persistent)
    }

    pub async fn insert(&mut self, table: &str, fields: &Fields) -> DbResult<u64> {
        self.runner().insert(table, fields).await
    }

    /// Inserts every row; `Ok(0)` for an empty batch.
    ///
    /// Batches past the bind limit are split and run under a savepoint.
    pub async fn insert_many(&mut self, table: &str, rows: &[Fields]) -> DbResult<u64> {
        self.runner().insert_many(table, rows).await
    }

    pub async fn update(&mut self, table: &str, set: &Fields, conditions: &Fields) -> DbResult<u64> {
        self.runner().update(table, set, conditions).await
    }

    pub async fn delete(&mut self, table: &str, conditions: &Fields) -> DbResult<u64> {
        self.runner().delete(table, conditions).await
    }

    /// Deletes rows matching any condition group; `Ok(0)` for an empty batch.
    pub async fn delete_many(&mut self, table: &str, groups: &[Fields]) -> DbResult<u64> {
        self.runner().delete_many(table, groups).await
    }

    pub async fn query(&mut self, sql: &str, params: Params) -> DbResult<Vec<Row>> {
        self.runner().query(sql, params).await
    }

    /// The `name` column of the first row, or an empty string.
    pub async fn query_first_name(&mut self, sql: &str, params: Params) -> DbResult<String> {
        self.runner().query_first_name(sql, params).await
    }

    pub async fn execute(&mut self, sql: &str, params: Params) -> DbResult<u64> {
        self.runner().execute(sql, params).await
    }

    pub(crate) async fn commit(self) -> DbResult<()> {
        self.tx
            .commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))
    }

    pub(crate) async fn rollback(self) -> DbResult<()> {
        self.tx
            .rollback()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("dialect", &self.dialect)
            .field("persistent", &self.persistent)
            .finish_non_exhaustive()
    }
}
