//! # Application Configuration
//!
//! Configuration for the integrator client, the local database and the codec.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     KASIR_BASE_URL=https://pos.example.com                             │
//! │     KASIR_PC_LOCATION=kasir-01                                         │
//! │     DB_DRIVER / DB_HOST / DB_NAME / DB_USER / DB_PASSWORD ...          │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/kasir/kasir.toml (Linux)                                 │
//! │     ~/Library/Application Support/com.kasir.kasir/kasir.toml (macOS)   │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # kasir.toml
//! [database]
//! driver = "mysql"
//! host = "127.0.0.1"
//! name = "pos"
//! username = "kasir"
//! password = "..."
//!
//! [integrator]
//! base_url = "https://pos.example.com"
//! pc_location = "kasir-01"
//! timeout_secs = 30
//! local_table = "pos_last_date"
//!
//! [codec]
//! secret = "..."
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use kasir_db::DbConfig;

use crate::error::{ClientError, ClientResult};

// =============================================================================
// Integrator Settings
// =============================================================================

/// Remote POS-group service settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegratorConfig {
    /// Service root; endpoints live under `<base_url>/server/`.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Location sent as `pc_location` when a caller leaves it out.
    #[serde(default)]
    pub pc_location: String,

    /// Per-request timeout.
    /// Default: 30 seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Local table `save_to_local` writes into.
    /// Default: pos_last_date
    #[serde(default = "default_local_table")]
    pub local_table: String,
}

fn default_base_url() -> String {
    "http://localhost".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_local_table() -> String {
    "pos_last_date".to_string()
}

impl Default for IntegratorConfig {
    fn default() -> Self {
        IntegratorConfig {
            base_url: default_base_url(),
            pc_location: String::new(),
            timeout_secs: default_timeout(),
            local_table: default_local_table(),
        }
    }
}

impl IntegratorConfig {
    /// Settings for a service root, everything else defaulted.
    pub fn new(base_url: impl Into<String>) -> Self {
        IntegratorConfig {
            base_url: base_url.into(),
            ..IntegratorConfig::default()
        }
    }

    /// Sets the default `pc_location`.
    pub fn pc_location(mut self, location: impl Into<String>) -> Self {
        self.pc_location = location.into();
        self
    }

    /// Request timeout as a `Duration`.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Parses and checks the base URL.
    pub fn parsed_base_url(&self) -> ClientResult<Url> {
        let url = Url::parse(&self.base_url)?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ClientError::InvalidUrl(format!(
                "Integrator URL must start with http:// or https://, got: {}",
                self.base_url
            )));
        }
        Ok(url)
    }

    /// Validates the integrator settings.
    pub fn validate(&self) -> ClientResult<()> {
        self.parsed_base_url()?;

        if self.timeout_secs == 0 {
            return Err(ClientError::InvalidConfig(
                "timeout_secs must be greater than 0".into(),
            ));
        }

        kasir_core::validate_identifier(&self.local_table)
            .map_err(|e| ClientError::InvalidConfig(format!("local_table: {e}")))?;

        Ok(())
    }
}

// =============================================================================
// Codec Settings
// =============================================================================

/// Secret keying the reversible string codec.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct CodecConfig {
    #[serde(default)]
    pub secret: String,
}

impl std::fmt::Debug for CodecConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodecConfig")
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

// =============================================================================
// Application Config
// =============================================================================

/// Complete application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Local database connection.
    #[serde(default)]
    pub database: DbConfig,

    /// Remote service settings.
    #[serde(default)]
    pub integrator: IntegratorConfig,

    /// Codec secret.
    #[serde(default)]
    pub codec: CodecConfig,
}

impl AppConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (kasir.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> ClientResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides(|name| std::env::var(name).ok())?;
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> ClientResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| ClientError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ClientError::ConfigSaveFailed(e.to_string()))?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents).map_err(|e| ClientError::ConfigSaveFailed(e.to_string()))?;

        info!(?path, "Config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> ClientResult<()> {
        self.integrator.validate()?;

        self.database
            .driver_kind()
            .map_err(|e| ClientError::InvalidConfig(e.to_string()))?;

        Ok(())
    }

    /// Applies environment variable overrides.
    ///
    /// `lookup` maps a variable name to its value. Empty values are
    /// ignored; values that do not parse are errors, here and in
    /// [`DbConfig::overlay_env`] alike.
    fn apply_env_overrides<F>(&mut self, lookup: F) -> ClientResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.is_empty());

        if let Some(url) = var("KASIR_BASE_URL") {
            debug!(url = %url, "Overriding integrator URL from environment");
            self.integrator.base_url = url;
        }

        if let Some(location) = var("KASIR_PC_LOCATION") {
            self.integrator.pc_location = location;
        }

        if let Some(timeout) = var("KASIR_TIMEOUT_SECS") {
            self.integrator.timeout_secs = timeout.parse().map_err(|_| {
                ClientError::InvalidConfig(format!(
                    "KASIR_TIMEOUT_SECS is not a number of seconds: '{timeout}'"
                ))
            })?;
        }

        if let Some(table) = var("KASIR_LOCAL_TABLE") {
            self.integrator.local_table = table;
        }

        if let Some(secret) = var("KASIR_SECRET") {
            debug!("Overriding codec secret from environment");
            self.codec.secret = secret;
        }

        self.database
            .overlay_env(&lookup)
            .map_err(|e| ClientError::InvalidConfig(e.to_string()))
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "kasir", "kasir")
            .map(|dirs| dirs.config_dir().join("kasir.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("kasir-config-test-{}", std::process::id()))
            .join(name)
    }

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.integrator.timeout_secs, 30);
        assert_eq!(config.integrator.local_table, "pos_last_date");
        assert_eq!(config.database.driver, "mysql");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = AppConfig::default();

        config.integrator.base_url = "ftp://pos.example.com".to_string();
        assert!(matches!(config.validate(), Err(ClientError::InvalidUrl(_))));

        config.integrator.base_url = "not a url".to_string();
        assert!(matches!(config.validate(), Err(ClientError::InvalidUrl(_))));

        config.integrator.base_url = "https://pos.example.com".to_string();
        assert!(config.validate().is_ok());

        config.integrator.local_table = "pos; DROP TABLE x".to_string();
        assert!(config.validate().unwrap_err().is_config_error());

        config.integrator.local_table = "pos_last_date".to_string();
        config.database.driver = "oracle".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_serialization() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[database]"));
        assert!(toml_str.contains("[integrator]"));
        assert!(toml_str.contains("[codec]"));
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [integrator]
            base_url = "https://pos.example.com"
            "#,
        )
        .unwrap();
        assert_eq!(config.integrator.base_url, "https://pos.example.com");
        assert_eq!(config.integrator.timeout_secs, 30);
        assert_eq!(config.database.host, "127.0.0.1");
    }

    #[test]
    fn test_save_then_load() {
        let path = temp_path("roundtrip.toml");
        let mut config = AppConfig::default();
        config.integrator = IntegratorConfig::new("https://pos.example.com").pc_location("kasir-01");
        config.database = DbConfig::sqlite("pos.db");

        config.save(Some(path.clone())).unwrap();
        let loaded = AppConfig::load(Some(path.clone())).unwrap();

        assert_eq!(loaded.integrator.pc_location, "kasir-01");
        assert_eq!(loaded.database.name, "pos.db");

        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn test_debug_redacts_secret() {
        let mut config = AppConfig::default();
        config.codec.secret = "very-secret".to_string();
        assert!(!format!("{config:?}").contains("very-secret"));
    }

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: std::collections::BTreeMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_env_overrides() {
        let mut config = AppConfig::default();
        config
            .apply_env_overrides(lookup(&[
                ("KASIR_BASE_URL", "https://pos.example.com"),
                ("KASIR_TIMEOUT_SECS", "5"),
                ("KASIR_SECRET", ""),
                ("DB_DRIVER", "sqlite"),
                ("DB_NAME", "pos.db"),
            ]))
            .unwrap();

        assert_eq!(config.integrator.base_url, "https://pos.example.com");
        assert_eq!(config.integrator.timeout_secs, 5);
        assert_eq!(config.codec.secret, "");
        assert_eq!(config.database.driver, "sqlite");
        assert_eq!(config.database.name, "pos.db");
    }

    #[test]
    fn test_invalid_env_numbers_are_config_errors() {
        let mut config = AppConfig::default();
        let err = config
            .apply_env_overrides(lookup(&[("DB_PORT", "abc")]))
            .unwrap_err();
        assert!(err.is_config_error());
        assert!(err.to_string().contains("DB_PORT"));

        let err = config
            .apply_env_overrides(lookup(&[("KASIR_TIMEOUT_SECS", "soon")]))
            .unwrap_err();
        assert!(err.is_config_error());
        assert_eq!(config.integrator.timeout_secs, 30);
    }
}
