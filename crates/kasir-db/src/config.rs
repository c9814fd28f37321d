//! # Database Configuration
//!
//! Structured configuration, environment loading and DSN construction.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Three Ways to a Connection                           │
//! │                                                                         │
//! │  1. Explicit DSN       Database::connect("mysql://h:3306/db", ..)      │
//! │                                                                         │
//! │  2. Structured config  DbConfig { driver, host, port, name, .. }       │
//! │                             │ to_dsn()                                  │
//! │                             ▼                                           │
//! │                        mysql://127.0.0.1:3306/pos?charset=utf8mb4      │
//! │                                                                         │
//! │  3. Environment        DB_DRIVER, DB_HOST, DB_PORT, DB_NAME,           │
//! │                        DB_CHARSET, DB_USER, DB_PASSWORD                │
//! │                             │ DbConfig::from_env()                      │
//! │                             ▼                                           │
//! │                        (same as 2)                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Default Ports
//! An unset port always falls back to the driver's own default (3306 for
//! MySQL, 5432 for Postgres). SQLite has no network fields at all.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

use kasir_core::Dialect;

use crate::error::{DbError, DbResult};

// =============================================================================
// Driver Kind
// =============================================================================

/// The supported database engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriverKind {
    /// MySQL / MariaDB (network, default port 3306).
    #[default]
    MySql,
    /// PostgreSQL (network, default port 5432).
    Postgres,
    /// SQLite (embedded file, path only).
    Sqlite,
}

impl DriverKind {
    /// Default TCP port, `None` for embedded engines.
    pub fn default_port(&self) -> Option<u16> {
        match self {
            DriverKind::MySql => Some(3306),
            DriverKind::Postgres => Some(5432),
            DriverKind::Sqlite => None,
        }
    }

    /// SQL dialect used for statement building.
    pub fn dialect(&self) -> Dialect {
        match self {
            DriverKind::MySql => Dialect::MySql,
            DriverKind::Postgres => Dialect::Postgres,
            DriverKind::Sqlite => Dialect::Sqlite,
        }
    }

    /// Detects the driver from a DSN's scheme.
    pub fn from_dsn(dsn: &str) -> DbResult<Self> {
        let scheme = dsn.split(':').next().unwrap_or_default();
        scheme.parse().map_err(|_| {
            DbError::InvalidConfig(format!("Unsupported DSN scheme: '{scheme}'"))
        })
    }

    fn url_scheme(&self) -> &'static str {
        match self {
            DriverKind::MySql => "mysql",
            DriverKind::Postgres => "postgres",
            DriverKind::Sqlite => "sqlite",
        }
    }
}

impl std::fmt::Display for DriverKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DriverKind::MySql => write!(f, "mysql"),
            DriverKind::Postgres => write!(f, "pgsql"),
            DriverKind::Sqlite => write!(f, "sqlite"),
        }
    }
}

impl std::str::FromStr for DriverKind {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mysql" | "mariadb" => Ok(DriverKind::MySql),
            "pgsql" | "postgres" | "postgresql" => Ok(DriverKind::Postgres),
            "sqlite" | "sqlite3" => Ok(DriverKind::Sqlite),
            other => Err(DbError::InvalidConfig(format!(
                "Unsupported driver: '{}'. Valid options: mysql, pgsql, sqlite",
                other
            ))),
        }
    }
}

// =============================================================================
// Session Options
// =============================================================================

/// Behavior options applied when a connection is built.
///
/// ## Fixed Behavior
/// Errors always surface as `Err`, rows are always name → value maps and
/// parameters are always bound server-side. Those three are properties of
/// the API and not options. What remains tunable is listed below.
///
/// ## Overlay
/// Built-in defaults first, then the caller's map; the caller wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionOptions {
    /// Keep prepared statements cached on the connection.
    /// Default: false
    #[serde(default)]
    pub persistent: bool,

    /// Upper bound on open connections.
    /// Default: 1 (one shared handle; raise for real concurrent use)
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// How long to wait for a connection.
    /// Default: 30 seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Extra driver parameters appended to the DSN query string.
    #[serde(default)]
    pub params: BTreeMap<String, String>,
}

fn default_max_connections() -> u32 {
    1
}

fn default_connect_timeout() -> u64 {
    30
}

impl Default for SessionOptions {
    fn default() -> Self {
        SessionOptions {
            persistent: false,
            max_connections: default_max_connections(),
            connect_timeout_secs: default_connect_timeout(),
            params: BTreeMap::new(),
        }
    }
}

impl SessionOptions {
    /// Defaults overlaid with caller-supplied key/value options.
    ///
    /// ## Recognized Keys
    /// - `persistent` - bool
    /// - `max_connections` - positive integer
    /// - `connect_timeout_secs` - integer seconds
    /// - `emulate_prepares` - only `false` is accepted
    /// - anything else - passed to the driver as a DSN parameter
    pub fn with_overrides(overrides: &BTreeMap<String, String>) -> DbResult<Self> {
        let mut options = SessionOptions::default();
        for (key, value) in overrides {
            match key.as_str() {
                "persistent" => options.persistent = parse_bool(key, value)?,
                "max_connections" => {
                    options.max_connections = parse_number(key, value)?;
                    if options.max_connections == 0 {
                        return Err(DbError::InvalidConfig(
                            "max_connections must be greater than 0".into(),
                        ));
                    }
                }
                "connect_timeout_secs" => options.connect_timeout_secs = parse_number(key, value)?,
                "emulate_prepares" => {
                    if parse_bool(key, value)? {
                        return Err(DbError::InvalidConfig(
                            "emulate_prepares is not supported; parameters are always bound server-side"
                                .into(),
                        ));
                    }
                }
                _ => {
                    options.params.insert(key.clone(), value.clone());
                }
            }
        }
        Ok(options)
    }

    /// Connection acquire timeout.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

fn parse_bool(key: &str, value: &str) -> DbResult<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(DbError::InvalidConfig(format!(
            "Option '{key}' expects a boolean, got '{other}'"
        ))),
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> DbResult<T> {
    value.trim().parse().map_err(|_| {
        DbError::InvalidConfig(format!("Option '{key}' expects a number, got '{value}'"))
    })
}

// =============================================================================
// Structured Configuration
// =============================================================================

/// Structured database configuration.
///
/// ## Example (TOML)
/// ```toml
/// [database]
/// driver = "mysql"
/// host = "127.0.0.1"
/// name = "pos"
/// charset = "utf8mb4"
/// username = "kasir"
/// password = "..."
/// ```
#[derive(Clone, Serialize, Deserialize)]
pub struct DbConfig {
    /// Driver name: `mysql`, `pgsql` or `sqlite`.
    /// Kept as text so an unsupported value is reported with the value itself.
    #[serde(default = "default_driver")]
    pub driver: String,

    /// Server host (network drivers).
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port; the driver default when unset.
    #[serde(default)]
    pub port: Option<u16>,

    /// Database name, or file path for SQLite (`:memory:` for in-memory).
    #[serde(default)]
    pub name: String,

    /// Connection charset (MySQL only).
    #[serde(default = "default_charset")]
    pub charset: String,

    #[serde(default)]
    pub username: String,

    #[serde(default)]
    pub password: String,

    /// Caller options overlaid on the defaults (see [`SessionOptions`]).
    #[serde(default)]
    pub options: BTreeMap<String, String>,
}

fn default_driver() -> String {
    DriverKind::MySql.to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_charset() -> String {
    "utf8mb4".to_string()
}

impl Default for DbConfig {
    fn default() -> Self {
        DbConfig {
            driver: default_driver(),
            host: default_host(),
            port: None,
            name: String::new(),
            charset: default_charset(),
            username: String::new(),
            password: String::new(),
            options: BTreeMap::new(),
        }
    }
}

impl std::fmt::Debug for DbConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbConfig")
            .field("driver", &self.driver)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("name", &self.name)
            .field("charset", &self.charset)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("options", &self.options)
            .finish()
    }
}

impl DbConfig {
    /// SQLite configuration for a file path (or `:memory:`).
    pub fn sqlite(path: impl Into<String>) -> Self {
        DbConfig {
            driver: DriverKind::Sqlite.to_string(),
            name: path.into(),
            ..DbConfig::default()
        }
    }

    /// In-memory SQLite configuration (for testing).
    pub fn in_memory() -> Self {
        DbConfig::sqlite(":memory:")
    }

    /// Reads configuration from the environment.
    ///
    /// ## Variables and Fallbacks
    /// - `DB_DRIVER` - `mysql`
    /// - `DB_HOST` - `127.0.0.1`
    /// - `DB_PORT` - driver default (3306 for mysql)
    /// - `DB_NAME` - empty
    /// - `DB_CHARSET` - `utf8mb4`
    /// - `DB_USER` / `DB_PASSWORD` - empty
    pub fn from_env() -> DbResult<Self> {
        let mut config = DbConfig::default();
        config.overlay_env(|name| std::env::var(name).ok())?;

        debug!(driver = %config.driver, host = %config.host, name = %config.name, "Database config read from environment");
        Ok(config)
    }

    /// Overwrites each field whose `DB_*` variable is set and non-empty.
    ///
    /// `lookup` maps a variable name to its value; [`DbConfig::from_env`]
    /// passes the process environment.
    ///
    /// ## Errors
    /// `InvalidConfig` if `DB_PORT` is not a port number. Nothing is
    /// changed in that case.
    pub fn overlay_env<F>(&mut self, lookup: F) -> DbResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.is_empty());

        let port = match var("DB_PORT") {
            Some(raw) => Some(raw.parse::<u16>().map_err(|_| {
                DbError::InvalidConfig(format!("DB_PORT is not a valid port: '{raw}'"))
            })?),
            None => self.port,
        };
        self.port = port;

        if let Some(driver) = var("DB_DRIVER") {
            self.driver = driver;
        }
        if let Some(host) = var("DB_HOST") {
            self.host = host;
        }
        if let Some(name) = var("DB_NAME") {
            self.name = name;
        }
        if let Some(charset) = var("DB_CHARSET") {
            self.charset = charset;
        }
        if let Some(user) = var("DB_USER") {
            self.username = user;
        }
        if let Some(password) = var("DB_PASSWORD") {
            self.password = password;
        }
        Ok(())
    }

    /// Parses the configured driver name.
    pub fn driver_kind(&self) -> DbResult<DriverKind> {
        self.driver.parse()
    }

    /// Builds the driver-specific DSN (without credentials).
    ///
    /// ## Examples
    /// ```text
    /// mysql    → mysql://127.0.0.1:3306/pos?charset=utf8mb4
    /// pgsql    → postgres://127.0.0.1:5432/pos
    /// sqlite   → sqlite://data/pos.db?mode=rwc   (sqlite::memory: for :memory:)
    /// ```
    pub fn to_dsn(&self) -> DbResult<String> {
        let driver = self.driver_kind()?;
        let dsn = match driver {
            DriverKind::Sqlite => {
                if self.name.is_empty() || self.name == ":memory:" {
                    "sqlite::memory:".to_string()
                } else {
                    format!("sqlite://{}?mode=rwc", self.name)
                }
            }
            DriverKind::MySql | DriverKind::Postgres => {
                let port = self.port.or(driver.default_port()).unwrap_or_default();
                let mut dsn = format!(
                    "{}://{}:{}/{}",
                    driver.url_scheme(),
                    self.host,
                    port,
                    self.name
                );
                if driver == DriverKind::MySql && !self.charset.is_empty() {
                    dsn.push_str(&format!("?charset={}", self.charset));
                }
                dsn
            }
        };
        Ok(dsn)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_driver_parsing() {
        assert_eq!("mysql".parse::<DriverKind>().unwrap(), DriverKind::MySql);
        assert_eq!("pgsql".parse::<DriverKind>().unwrap(), DriverKind::Postgres);
        assert_eq!("PostgreSQL".parse::<DriverKind>().unwrap(), DriverKind::Postgres);
        assert_eq!("sqlite".parse::<DriverKind>().unwrap(), DriverKind::Sqlite);

        let err = "oracle".parse::<DriverKind>().unwrap_err();
        assert!(matches!(err, DbError::InvalidConfig(_)));
        assert!(err.to_string().contains("oracle"));
    }

    #[test]
    fn test_driver_from_dsn() {
        assert_eq!(DriverKind::from_dsn("mysql://h/db").unwrap(), DriverKind::MySql);
        assert_eq!(DriverKind::from_dsn("postgres://h/db").unwrap(), DriverKind::Postgres);
        assert_eq!(DriverKind::from_dsn("sqlite::memory:").unwrap(), DriverKind::Sqlite);
        assert!(DriverKind::from_dsn("mssql://h/db").is_err());
    }

    #[test]
    fn test_mysql_dsn_uses_default_port() {
        let config = DbConfig {
            name: "pos".to_string(),
            ..DbConfig::default()
        };
        assert_eq!(
            config.to_dsn().unwrap(),
            "mysql://127.0.0.1:3306/pos?charset=utf8mb4"
        );
    }

    #[test]
    fn test_postgres_dsn_uses_its_own_default_port() {
        let config = DbConfig {
            driver: "pgsql".to_string(),
            host: "db.local".to_string(),
            name: "pos".to_string(),
            ..DbConfig::default()
        };
        assert_eq!(config.to_dsn().unwrap(), "postgres://db.local:5432/pos");

        let config = DbConfig {
            port: Some(6543),
            ..config
        };
        assert_eq!(config.to_dsn().unwrap(), "postgres://db.local:6543/pos");
    }

    #[test]
    fn test_sqlite_dsn() {
        assert_eq!(DbConfig::in_memory().to_dsn().unwrap(), "sqlite::memory:");
        assert_eq!(
            DbConfig::sqlite("data/pos.db").to_dsn().unwrap(),
            "sqlite://data/pos.db?mode=rwc"
        );
    }

    #[test]
    fn test_unknown_driver_in_config() {
        let config = DbConfig {
            driver: "oracle".to_string(),
            ..DbConfig::default()
        };
        let err = config.to_dsn().unwrap_err();
        assert!(err.to_string().contains("'oracle'"));
    }

    #[test]
    fn test_session_option_overlay() {
        let defaults = SessionOptions::with_overrides(&BTreeMap::new()).unwrap();
        assert_eq!(defaults, SessionOptions::default());
        assert!(!defaults.persistent);
        assert_eq!(defaults.max_connections, 1);

        let mut overrides = BTreeMap::new();
        overrides.insert("persistent".to_string(), "true".to_string());
        overrides.insert("max_connections".to_string(), "4".to_string());
        overrides.insert("sslmode".to_string(), "disable".to_string());
        let options = SessionOptions::with_overrides(&overrides).unwrap();
        assert!(options.persistent);
        assert_eq!(options.max_connections, 4);
        assert_eq!(options.params.get("sslmode").map(String::as_str), Some("disable"));
    }

    #[test]
    fn test_session_option_errors() {
        let mut overrides = BTreeMap::new();
        overrides.insert("emulate_prepares".to_string(), "1".to_string());
        assert!(SessionOptions::with_overrides(&overrides).is_err());

        let mut overrides = BTreeMap::new();
        overrides.insert("max_connections".to_string(), "lots".to_string());
        assert!(SessionOptions::with_overrides(&overrides).is_err());
    }

    #[test]
    fn test_debug_redacts_password() {
        let config = DbConfig {
            password: "hunter2".to_string(),
            ..DbConfig::default()
        };
        assert!(!format!("{config:?}").contains("hunter2"));
    }

    const DB_VARS: [&str; 7] = [
        "DB_DRIVER",
        "DB_HOST",
        "DB_PORT",
        "DB_NAME",
        "DB_CHARSET",
        "DB_USER",
        "DB_PASSWORD",
    ];

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: BTreeMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_from_env_fallbacks_and_overrides() {
        // The only test in this crate that touches DB_* variables.
        for name in DB_VARS {
            std::env::remove_var(name);
        }

        let config = DbConfig::from_env().unwrap();
        assert_eq!(config.driver, "mysql");
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, None);
        assert_eq!(config.charset, "utf8mb4");
        assert_eq!(config.username, "");
        assert_eq!(config.password, "");
        assert_eq!(config.to_dsn().unwrap(), "mysql://127.0.0.1:3306/?charset=utf8mb4");

        std::env::set_var("DB_DRIVER", "pgsql");
        std::env::set_var("DB_HOST", "db.local");
        std::env::set_var("DB_PORT", "6543");
        std::env::set_var("DB_NAME", "pos");
        std::env::set_var("DB_USER", "kasir");
        std::env::set_var("DB_PASSWORD", "pw");
        let config = DbConfig::from_env().unwrap();
        assert_eq!(config.to_dsn().unwrap(), "postgres://db.local:6543/pos");
        assert_eq!(config.username, "kasir");
        assert_eq!(config.password, "pw");

        std::env::set_var("DB_PORT", "not-a-port");
        let err = DbConfig::from_env().unwrap_err();
        assert!(matches!(err, DbError::InvalidConfig(_)));
        assert!(err.to_string().contains("not-a-port"));

        for name in DB_VARS {
            std::env::remove_var(name);
        }
    }

    #[test]
    fn test_overlay_env_keeps_unset_fields() {
        let mut config = DbConfig {
            name: "pos".to_string(),
            port: Some(3307),
            ..DbConfig::default()
        };
        config
            .overlay_env(lookup(&[("DB_HOST", "10.0.0.5"), ("DB_USER", "")]))
            .unwrap();
        assert_eq!(config.host, "10.0.0.5");
        assert_eq!(config.port, Some(3307));
        assert_eq!(config.name, "pos");
        assert_eq!(config.username, "");
    }

    #[test]
    fn test_overlay_env_rejects_bad_port_without_changes() {
        let mut config = DbConfig::default();
        let err = config
            .overlay_env(lookup(&[("DB_PORT", "70000"), ("DB_HOST", "elsewhere")]))
            .unwrap_err();
        assert!(matches!(err, DbError::InvalidConfig(_)));
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, None);
    }
}
