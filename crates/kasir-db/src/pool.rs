//! # Connection Management
//!
//! Builds the database handle for whichever engine the DSN names and runs
//! work inside transactions.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Database Connection Handle                         │
//! │                                                                         │
//! │  DSN + credentials + options                                           │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  DriverKind::from_dsn ← mysql: / postgres: / sqlite:                   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SessionOptions::with_overrides ← defaults, then caller options        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────┐                           │
//! │  │   DbPool::{MySql, Postgres, Sqlite}     │                           │
//! │  │  ┌─────┐                                 │  max_connections = 1     │
//! │  │  │Conn1│  (raise via options for         │  by default: one shared  │
//! │  │  └─────┘   concurrent callers)           │  database handle         │
//! │  └─────────────────────────────────────────┘                           │
//! │       │                                                                 │
//! │       ├──► DataStore (facade)                                           │
//! │       └──► transaction(|session| ..) ← BEGIN / COMMIT / ROLLBACK        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Shared Handle
//! [`Database::shared`] hands out one process-wide handle. The first caller
//! connects; every later caller gets a clone of that handle and its
//! arguments are ignored.

use futures_util::future::BoxFuture;
use sqlx::mysql::{MySql, MySqlPool};
use sqlx::pool::PoolOptions;
use sqlx::postgres::{PgPool, Postgres};
use sqlx::sqlite::{Sqlite, SqlitePool};
use std::collections::BTreeMap;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use url::Url;

use kasir_core::Dialect;

use crate::config::{DbConfig, DriverKind, SessionOptions};
use crate::error::{DbError, DbResult};
use crate::exec::{OpenTx, PooledConn};
use crate::session::Session;

static SHARED: Mutex<Option<Database>> = Mutex::const_new(None);

// =============================================================================
// DbPool
// =============================================================================

/// Connection pool of the engine the DSN named.
///
/// Each engine keeps its own sqlx driver, so rows decode with native column
/// types. Match on it to run engine-specific sqlx code directly.
#[derive(Debug, Clone)]
pub enum DbPool {
    MySql(MySqlPool),
    Postgres(PgPool),
    Sqlite(SqlitePool),
}

impl DbPool {
    async fn connect(
        driver: DriverKind,
        url: &str,
        options: &SessionOptions,
        in_memory: bool,
    ) -> Result<Self, sqlx::Error> {
        Ok(match driver {
            DriverKind::MySql => {
                DbPool::MySql(pool_options::<MySql>(options, in_memory).connect(url).await?)
            }
            DriverKind::Postgres => {
                DbPool::Postgres(pool_options::<Postgres>(options, in_memory).connect(url).await?)
            }
            DriverKind::Sqlite => {
                DbPool::Sqlite(pool_options::<Sqlite>(options, in_memory).connect(url).await?)
            }
        })
    }

    pub(crate) async fn acquire(&self) -> Result<PooledConn, sqlx::Error> {
        Ok(match self {
            DbPool::MySql(pool) => PooledConn::MySql(pool.acquire().await?),
            DbPool::Postgres(pool) => PooledConn::Postgres(pool.acquire().await?),
            DbPool::Sqlite(pool) => PooledConn::Sqlite(pool.acquire().await?),
        })
    }

    async fn begin(&self) -> Result<OpenTx, sqlx::Error> {
        Ok(match self {
            DbPool::MySql(pool) => OpenTx::MySql(pool.begin().await?),
            DbPool::Postgres(pool) => OpenTx::Postgres(pool.begin().await?),
            DbPool::Sqlite(pool) => OpenTx::Sqlite(pool.begin().await?),
        })
    }

    async fn ping(&self) -> Result<(), sqlx::Error> {
        match self {
            DbPool::MySql(pool) => sqlx::query("SELECT 1").execute(pool).await.map(drop),
            DbPool::Postgres(pool) => sqlx::query("SELECT 1").execute(pool).await.map(drop),
            DbPool::Sqlite(pool) => sqlx::query("SELECT 1").execute(pool).await.map(drop),
        }
    }

    async fn close(&self) {
        match self {
            DbPool::MySql(pool) => pool.close().await,
            DbPool::Postgres(pool) => pool.close().await,
            DbPool::Sqlite(pool) => pool.close().await,
        }
    }
}

fn pool_options<DB: sqlx::Database>(options: &SessionOptions, in_memory: bool) -> PoolOptions<DB> {
    let pool_options = PoolOptions::new()
        .max_connections(options.max_connections)
        .acquire_timeout(options.connect_timeout());

    if !in_memory {
        return pool_options;
    }
    // Each connection to :memory: is its own database.
    pool_options
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
}

// =============================================================================
// Database
// =============================================================================

/// Database handle for MySQL, Postgres or SQLite.
///
/// Cheap to clone; clones share the same pool.
#[derive(Debug, Clone)]
pub struct Database {
    pool: DbPool,
    driver: DriverKind,
    options: SessionOptions,
}

impl Database {
    /// Connects using an explicit DSN.
    ///
    /// ## Arguments
    /// * `dsn` - `mysql://host:port/db?charset=..`, `postgres://..`, `pgsql://..`,
    ///   `sqlite://path` or `sqlite::memory:`
    /// * `username` / `password` - injected into the URL for network drivers
    ///   (empty means "leave the DSN's own")
    /// * `options` - overlaid on [`SessionOptions::default`]
    ///
    /// ## Errors
    /// * `InvalidConfig` - unsupported scheme, malformed DSN or bad option
    /// * `ConnectionFailed` - the server rejected or could not be reached
    pub async fn connect(
        dsn: &str,
        username: &str,
        password: &str,
        options: &BTreeMap<String, String>,
    ) -> DbResult<Self> {
        let driver = DriverKind::from_dsn(dsn)?;
        let options = SessionOptions::with_overrides(options)?;
        let url = build_url(dsn, driver, username, password, &options)?;
        let in_memory = driver == DriverKind::Sqlite && is_memory_dsn(url.as_str());

        info!(
            driver = %driver,
            dsn = %redacted(&url),
            max_connections = options.max_connections,
            "Initializing database connection"
        );

        let pool = DbPool::connect(driver, url.as_str(), &options, in_memory)
            .await
            .map_err(connect_error)?;

        info!(driver = %driver, "Database connection established");

        Ok(Database {
            pool,
            driver,
            options,
        })
    }

    /// Connects using structured configuration.
    pub async fn from_config(config: &DbConfig) -> DbResult<Self> {
        let dsn = config.to_dsn()?;
        Database::connect(&dsn, &config.username, &config.password, &config.options).await
    }

    /// Connects using `DB_*` environment variables.
    pub async fn from_env() -> DbResult<Self> {
        let config = DbConfig::from_env()?;
        Database::from_config(&config).await
    }

    /// Returns the process-wide handle, connecting on first use.
    ///
    /// ## Note
    /// Once a handle exists the arguments of later calls are ignored, even
    /// if they name a different database.
    pub async fn shared(
        dsn: &str,
        username: &str,
        password: &str,
        options: &BTreeMap<String, String>,
    ) -> DbResult<Self> {
        let mut guard = SHARED.lock().await;
        if let Some(existing) = guard.as_ref() {
            debug!("Reusing shared database handle; connection arguments ignored");
            return Ok(existing.clone());
        }

        let database = Database::connect(dsn, username, password, options).await?;
        *guard = Some(database.clone());
        Ok(database)
    }

    /// Drops the process-wide handle so the next `shared` call reconnects.
    #[cfg(any(test, feature = "test-util"))]
    pub async fn reset_shared() {
        if let Some(previous) = SHARED.lock().await.take() {
            previous.close().await;
        }
    }

    /// Runs `operation` inside one transaction.
    ///
    /// ## Behavior
    /// - `Ok(v)`: commits and returns `v` (including `None`-like values)
    /// - `Err(e)`: rolls back and returns `e` unchanged; a rollback failure
    ///   is logged but never replaces `e`
    ///
    /// ## Example
    /// ```rust,ignore
    /// let count = db
    ///     .transaction(|session| {
    ///         Box::pin(async move {
    ///             session.insert("users", &user).await?;
    ///             session.insert("audit", &entry).await
    ///         })
    ///     })
    ///     .await?;
    /// ```
    pub async fn transaction<F, T, E>(&self, operation: F) -> Result<T, E>
    where
        F: for<'c> FnOnce(&'c mut Session) -> BoxFuture<'c, Result<T, E>>,
        E: From<DbError>,
    {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;
        let mut session = Session::new(tx, self.dialect(), self.options.persistent);

        debug!("Transaction started");
        let outcome = operation(&mut session).await;

        match outcome {
            Ok(value) => {
                session.commit().await?;
                debug!("Transaction committed");
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = session.rollback().await {
                    warn!(error = %rollback_err, "Transaction rollback failed");
                } else {
                    debug!("Transaction rolled back");
                }
                Err(err)
            }
        }
    }

    /// Checks if the database answers a trivial query.
    pub async fn health_check(&self) -> bool {
        self.pool.ping().await.is_ok()
    }

    /// Closes every connection. Later operations fail.
    pub async fn close(&self) {
        info!(driver = %self.driver, "Closing database connection pool");
        self.pool.close().await;
    }

    /// Engine behind this handle.
    pub fn driver(&self) -> DriverKind {
        self.driver
    }

    /// SQL dialect used for statement building.
    pub fn dialect(&self) -> Dialect {
        self.driver.dialect()
    }

    /// Effective options after the caller's overlay.
    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// Checks a connection out of the pool.
    pub(crate) async fn acquire(&self) -> DbResult<PooledConn> {
        Ok(self.pool.acquire().await?)
    }
}

// =============================================================================
// DSN Handling
// =============================================================================

fn build_url(
    dsn: &str,
    driver: DriverKind,
    username: &str,
    password: &str,
    options: &SessionOptions,
) -> DbResult<Url> {
    let mut url =
        Url::parse(dsn).map_err(|e| DbError::InvalidConfig(format!("Malformed DSN: {e}")))?;

    let scheme = match driver {
        DriverKind::MySql => "mysql",
        DriverKind::Postgres => "postgres",
        DriverKind::Sqlite => "sqlite",
    };
    if url.scheme() != scheme {
        url.set_scheme(scheme)
            .map_err(|_| DbError::InvalidConfig(format!("Cannot use scheme '{scheme}'")))?;
    }

    if driver != DriverKind::Sqlite {
        if !username.is_empty() {
            url.set_username(username)
                .map_err(|_| DbError::InvalidConfig("DSN cannot carry a username".into()))?;
        }
        if !password.is_empty() {
            url.set_password(Some(password))
                .map_err(|_| DbError::InvalidConfig("DSN cannot carry a password".into()))?;
        }
    }

    if !options.params.is_empty() {
        let kept: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(key, _)| !options.params.contains_key(key.as_ref()))
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect();
        let mut pairs = url.query_pairs_mut();
        pairs.clear();
        pairs.extend_pairs(kept);
        pairs.extend_pairs(&options.params);
    }

    Ok(url)
}

fn is_memory_dsn(dsn: &str) -> bool {
    dsn.contains(":memory:") || dsn.contains("mode=memory")
}

/// The DSN with its credentials removed, for logs.
fn redacted(url: &Url) -> String {
    let mut url = url.clone();
    let _ = url.set_password(None);
    let _ = url.set_username("");
    url.to_string()
}

fn connect_error(err: sqlx::Error) -> DbError {
    match DbError::from(err) {
        err @ DbError::InvalidConfig(_) => err,
        other => DbError::ConnectionFailed(other.to_string()),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn no_options() -> BTreeMap<String, String> {
        BTreeMap::new()
    }

    #[tokio::test]
    async fn test_in_memory_database() {
        let db = Database::connect("sqlite::memory:", "", "", &no_options())
            .await
            .unwrap();

        assert!(db.health_check().await);
        assert_eq!(db.driver(), DriverKind::Sqlite);
        assert_eq!(db.dialect(), Dialect::Sqlite);
        assert!(!db.options().persistent);
    }

    #[tokio::test]
    async fn test_from_config_in_memory() {
        let db = Database::from_config(&DbConfig::in_memory()).await.unwrap();
        assert!(db.health_check().await);

        db.close().await;
        assert!(!db.health_check().await);
    }

    #[tokio::test]
    async fn test_unknown_scheme_is_config_error() {
        let err = Database::connect("oracle://db/pos", "", "", &no_options())
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::InvalidConfig(_)));
    }

    #[tokio::test]
    async fn test_emulated_prepares_rejected() {
        let mut options = BTreeMap::new();
        options.insert("emulate_prepares".to_string(), "true".to_string());
        let err = Database::connect("sqlite::memory:", "", "", &options)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::InvalidConfig(_)));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_connection_error() {
        let mut options = BTreeMap::new();
        options.insert("connect_timeout_secs".to_string(), "2".to_string());
        let err = Database::connect("mysql://127.0.0.1:1/pos", "kasir", "pw", &options)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::ConnectionFailed(_)));
    }

    #[test]
    fn test_build_url_injects_credentials_and_params() {
        let mut overrides = BTreeMap::new();
        overrides.insert("charset".to_string(), "latin1".to_string());
        let options = SessionOptions::with_overrides(&overrides).unwrap();

        let url = build_url(
            "mysql://127.0.0.1:3306/pos?charset=utf8mb4",
            DriverKind::MySql,
            "kasir",
            "s3cret",
            &options,
        )
        .unwrap();

        assert_eq!(url.username(), "kasir");
        assert_eq!(url.password(), Some("s3cret"));
        assert_eq!(url.query(), Some("charset=latin1"));
        assert_eq!(redacted(&url), "mysql://127.0.0.1:3306/pos?charset=latin1");
    }

    #[test]
    fn test_build_url_normalizes_pgsql_scheme() {
        let url = build_url(
            "pgsql://db.local:5432/pos",
            DriverKind::Postgres,
            "",
            "",
            &SessionOptions::default(),
        )
        .unwrap();
        assert_eq!(url.as_str(), "postgres://db.local:5432/pos");
    }

    #[tokio::test]
    async fn test_shared_handle_first_caller_wins() {
        Database::reset_shared().await;

        let first = Database::shared("sqlite::memory:", "", "", &no_options())
            .await
            .unwrap();
        let DbPool::Sqlite(pool) = first.pool() else {
            panic!("expected a SQLite pool");
        };
        sqlx::query("CREATE TABLE marker (id INTEGER)")
            .execute(pool)
            .await
            .unwrap();

        // Different arguments, same handle.
        let second = Database::shared("mysql://unreachable:1/x", "u", "p", &no_options())
            .await
            .unwrap();
        assert_eq!(second.driver(), DriverKind::Sqlite);
        let DbPool::Sqlite(pool) = second.pool() else {
            panic!("expected a SQLite pool");
        };
        assert!(sqlx::query("SELECT id FROM marker")
            .fetch_all(pool)
            .await
            .is_ok());

        Database::reset_shared().await;
    }
}
