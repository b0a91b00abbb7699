//! # Back Office Configuration
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     TILL_DB_PATH=/var/lib/till/till.db                                 │
//! │     TILL_DB_MAX_CONNECTIONS=8                                          │
//! │     TILL_DB_BUSY_TIMEOUT_SECS=10                                       │
//! │     TILL_IDENTIFIER_ATTEMPTS=5                                         │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/till/till.toml (Linux)                                   │
//! │     ~/Library/Application Support/com.till.backoffice/till.toml (macOS)│
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [database]
//! path = "/var/lib/till/till.db"
//! max_connections = 5
//! min_connections = 1
//! busy_timeout_secs = 5
//! run_migrations = true
//!
//! [settlement]
//! identifier_attempts = 3
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use till_db::DbConfig;
use tracing::{debug, info, warn};

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to load configuration: {0}")]
    LoadFailed(String),
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::LoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::LoadFailed(err.to_string())
    }
}

pub type ConfigResult<T> = Result<T, ConfigError>;

// =============================================================================
// Database Settings
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// SQLite file. Created on first open.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// How long a writer waits on another writer before failing with
    /// INFRASTRUCTURE.
    #[serde(default = "default_busy_timeout")]
    pub busy_timeout_secs: u64,

    #[serde(default = "default_true")]
    pub run_migrations: bool,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_db_path(),
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            busy_timeout_secs: default_busy_timeout(),
            run_migrations: default_true(),
        }
    }
}

fn default_db_path() -> PathBuf {
    project_dirs()
        .map(|dirs| dirs.data_dir().join("till.db"))
        .unwrap_or_else(|| PathBuf::from("till.db"))
}

fn default_max_connections() -> u32 {
    5
}

fn default_min_connections() -> u32 {
    1
}

fn default_busy_timeout() -> u64 {
    5
}

fn default_true() -> bool {
    true
}

// =============================================================================
// Settlement Settings
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementSettings {
    /// Commits tried with freshly generated identifiers before CONFLICT.
    #[serde(default = "default_identifier_attempts")]
    pub identifier_attempts: u32,
}

impl Default for SettlementSettings {
    fn default() -> Self {
        SettlementSettings {
            identifier_attempts: default_identifier_attempts(),
        }
    }
}

fn default_identifier_attempts() -> u32 {
    3
}

// =============================================================================
// Back Office Configuration
// =============================================================================

/// Complete back-office configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BackOfficeConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub settlement: SettlementSettings,
}

impl BackOfficeConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (till.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> ConfigResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading back office config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load back office config: {}. Using defaults.", e);
            Self::default()
        })
    }

    pub fn validate(&self) -> ConfigResult<()> {
        let db = &self.database;

        if db.path.as_os_str().is_empty() {
            return Err(ConfigError::InvalidConfig("database.path must not be empty".into()));
        }

        if db.max_connections == 0 {
            return Err(ConfigError::InvalidConfig(
                "database.max_connections must be greater than 0".into(),
            ));
        }

        if db.min_connections > db.max_connections {
            return Err(ConfigError::InvalidConfig(format!(
                "database.min_connections ({}) exceeds max_connections ({})",
                db.min_connections, db.max_connections
            )));
        }

        if self.settlement.identifier_attempts == 0 {
            return Err(ConfigError::InvalidConfig(
                "settlement.identifier_attempts must be at least 1".into(),
            ));
        }

        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Applies `TILL_*` overrides read through `lookup`. Unparseable
    /// values are ignored with a warning.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(path) = lookup("TILL_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        if let Some(max) = lookup("TILL_DB_MAX_CONNECTIONS") {
            match max.parse::<u32>() {
                Ok(n) => self.database.max_connections = n,
                Err(_) => warn!(value = %max, "Ignoring invalid TILL_DB_MAX_CONNECTIONS"),
            }
        }

        if let Some(secs) = lookup("TILL_DB_BUSY_TIMEOUT_SECS") {
            match secs.parse::<u64>() {
                Ok(n) => self.database.busy_timeout_secs = n,
                Err(_) => warn!(value = %secs, "Ignoring invalid TILL_DB_BUSY_TIMEOUT_SECS"),
            }
        }

        if let Some(attempts) = lookup("TILL_IDENTIFIER_ATTEMPTS") {
            match attempts.parse::<u32>() {
                Ok(n) => {
                    debug!(attempts = n, "Overriding identifier attempts from environment");
                    self.settlement.identifier_attempts = n;
                }
                Err(_) => warn!(value = %attempts, "Ignoring invalid TILL_IDENTIFIER_ATTEMPTS"),
            }
        }
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        project_dirs().map(|dirs| dirs.config_dir().join("till.toml"))
    }

    /// Pool settings for [`till_db::Database::new`].
    pub fn to_db_config(&self) -> DbConfig {
        let db = &self.database;
        DbConfig::new(db.path.clone())
            .max_connections(db.max_connections)
            .min_connections(db.min_connections)
            .busy_timeout(Duration::from_secs(db.busy_timeout_secs))
            .run_migrations(db.run_migrations)
    }
}

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("com", "till", "backoffice")
}
