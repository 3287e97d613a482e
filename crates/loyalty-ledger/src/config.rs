//! # Loyalty Ledger Configuration
//!
//! Configuration for the point service and the expiry worker.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority (Highest First)               │
//! │                                                                         │
//! │  1. Environment Variables                                               │
//! │     LOYALTY_DATABASE_PATH, LOYALTY_REDIS_URL, LOYALTY_CACHE_TTL_SECS,   │
//! │     LOYALTY_SWEEP_INTERVAL_SECS, LOYALTY_SWEEP_BATCH_SIZE               │
//! │                                                                         │
//! │  2. Config File (loyalty.toml)                                          │
//! │     explicit path, else $LOYALTY_CONFIG, else                           │
//! │     Linux: ~/.config/loyalty-ledger/loyalty.toml                        │
//! │                                                                         │
//! │  3. Defaults                                                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example loyalty.toml
//! ```toml
//! [database]
//! path = "/var/lib/loyalty/points.db"
//! max_connections = 8
//!
//! [cache]
//! redis_url = "redis://localhost:6379"
//! ttl_secs = 300
//!
//! [policy]
//! earn_rate_bps = 500
//! expiry_months = 12
//!
//! [sweep]
//! interval_secs = 86400
//! batch_size = 1000
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use loyalty_core::PointPolicy;
use loyalty_db::DbConfig;

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read or parse the config file.
    #[error("Failed to load config: {0}")]
    LoadFailed(String),

    /// Failed to write the config file.
    #[error("Failed to save config: {0}")]
    SaveFailed(String),

    /// A value is out of range.
    #[error("Invalid configuration: {0}")]
    Invalid(String),
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

impl From<toml::ser::Error> for ConfigError {
    fn from(err: toml::ser::Error) -> Self {
        ConfigError::SaveFailed(err.to_string())
    }
}

pub type ConfigResult<T> = Result<T, ConfigError>;

// =============================================================================
// Main Configuration
// =============================================================================

/// Complete loyalty ledger configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PointsConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub cache: CacheSettings,

    #[serde(default)]
    pub service: ServiceSettings,

    /// Earn, use and expiry rules.
    #[serde(default)]
    pub policy: PointPolicy,

    #[serde(default)]
    pub sweep: SweepSettings,
}

// =============================================================================
// Database Settings
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// SQLite database file.
    #[serde(default = "default_database_path")]
    pub path: PathBuf,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// How long a unit of work waits for another writer's lock.
    #[serde(default = "default_busy_timeout_secs")]
    pub busy_timeout_secs: u64,

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

fn default_database_path() -> PathBuf {
    PathBuf::from("loyalty.db")
}

fn default_max_connections() -> u32 {
    5
}

fn default_min_connections() -> u32 {
    1
}

fn default_busy_timeout_secs() -> u64 {
    5
}

fn default_connect_timeout_secs() -> u64 {
    30
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_database_path(),
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            busy_timeout_secs: default_busy_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

// =============================================================================
// Cache Settings
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheSettings {
    /// Redis URL. Without one the in-memory cache is used.
    #[serde(default)]
    pub redis_url: Option<String>,

    /// Freshness window of a balance snapshot.
    #[serde(default = "default_cache_ttl_secs")]
    pub ttl_secs: u64,
}

fn default_cache_ttl_secs() -> u64 {
    300
}

impl Default for CacheSettings {
    fn default() -> Self {
        CacheSettings {
            redis_url: None,
            ttl_secs: default_cache_ttl_secs(),
        }
    }
}

impl CacheSettings {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

// =============================================================================
// Service Settings
// =============================================================================

/// Tuning of the point operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceSettings {
    /// How many earned batches the FIFO walk of a use reads at most.
    #[serde(default = "default_fifo_scan_limit")]
    pub fifo_scan_limit: i64,
}

fn default_fifo_scan_limit() -> i64 {
    100
}

impl Default for ServiceSettings {
    fn default() -> Self {
        ServiceSettings {
            fifo_scan_limit: default_fifo_scan_limit(),
        }
    }
}

// =============================================================================
// Sweep Settings
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepSettings {
    /// Seconds between sweeps.
    #[serde(default = "default_sweep_interval_secs")]
    pub interval_secs: u64,

    /// Entries fetched per sweep.
    #[serde(default = "default_sweep_batch_size")]
    pub batch_size: i64,

    /// Deadline around one whole sweep.
    #[serde(default = "default_sweep_deadline_secs")]
    pub deadline_secs: u64,
}

fn default_sweep_interval_secs() -> u64 {
    86_400
}

fn default_sweep_batch_size() -> i64 {
    1000
}

fn default_sweep_deadline_secs() -> u64 {
    300
}

impl Default for SweepSettings {
    fn default() -> Self {
        SweepSettings {
            interval_secs: default_sweep_interval_secs(),
            batch_size: default_sweep_batch_size(),
            deadline_secs: default_sweep_deadline_secs(),
        }
    }
}

impl SweepSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.deadline_secs)
    }
}

// =============================================================================
// Loading
// =============================================================================

impl PointsConfig {
    /// Loads configuration from file and environment.
    ///
    /// ## Load Order
    /// 1. Start with defaults
    /// 2. Override with config file (if exists)
    /// 3. Override with environment variables
    /// 4. Validate
    pub fn load(config_path: Option<PathBuf>) -> ConfigResult<Self> {
        let mut config = Self::default();

        let path = config_path
            .or_else(|| std::env::var("LOYALTY_CONFIG").ok().map(PathBuf::from))
            .or_else(Self::default_config_path);

        if let Some(path) = path {
            if path.exists() {
                info!(?path, "Loading loyalty config from file");
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

    /// Loads configuration, falling back to defaults on error.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load loyalty config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Writes the configuration as TOML.
    pub fn save(&self, config_path: Option<PathBuf>) -> ConfigResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| ConfigError::SaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::SaveFailed(e.to_string()))?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents).map_err(|e| ConfigError::SaveFailed(e.to_string()))?;

        info!(?path, "Loyalty config saved");
        Ok(())
    }

    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "loyalty", "loyalty-ledger")
            .map(|dirs| dirs.config_dir().join("loyalty.toml"))
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Applies overrides from any key lookup; `apply_env_overrides` passes
    /// the process environment.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(path) = lookup("LOYALTY_DATABASE_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        if let Some(url) = lookup("LOYALTY_REDIS_URL") {
            debug!("Overriding Redis URL from environment");
            self.cache.redis_url = if url.is_empty() { None } else { Some(url) };
        }

        if let Some(ttl) = lookup("LOYALTY_CACHE_TTL_SECS") {
            match ttl.parse::<u64>() {
                Ok(secs) => self.cache.ttl_secs = secs,
                Err(_) => warn!(value = %ttl, "Ignoring invalid LOYALTY_CACHE_TTL_SECS"),
            }
        }

        if let Some(interval) = lookup("LOYALTY_SWEEP_INTERVAL_SECS") {
            match interval.parse::<u64>() {
                Ok(secs) => self.sweep.interval_secs = secs,
                Err(_) => warn!(value = %interval, "Ignoring invalid LOYALTY_SWEEP_INTERVAL_SECS"),
            }
        }

        if let Some(size) = lookup("LOYALTY_SWEEP_BATCH_SIZE") {
            match size.parse::<i64>() {
                Ok(n) => self.sweep.batch_size = n,
                Err(_) => warn!(value = %size, "Ignoring invalid LOYALTY_SWEEP_BATCH_SIZE"),
            }
        }
    }

    /// Validates the configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.database.path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("database.path must not be empty".into()));
        }

        if self.database.max_connections == 0 || self.database.min_connections > self.database.max_connections {
            return Err(ConfigError::Invalid(format!(
                "database pool sizes invalid: min {}, max {}",
                self.database.min_connections, self.database.max_connections
            )));
        }

        if let Some(ref url) = self.cache.redis_url {
            if !url.starts_with("redis://") && !url.starts_with("rediss://") {
                return Err(ConfigError::Invalid(format!(
                    "Redis URL must start with redis:// or rediss://, got: {}",
                    url
                )));
            }
        }

        if self.cache.ttl_secs == 0 {
            return Err(ConfigError::Invalid("cache.ttl_secs must be greater than 0".into()));
        }

        if self.service.fifo_scan_limit <= 0 {
            return Err(ConfigError::Invalid(
                "service.fifo_scan_limit must be greater than 0".into(),
            ));
        }

        if self.sweep.interval_secs == 0 || self.sweep.deadline_secs == 0 {
            return Err(ConfigError::Invalid(
                "sweep.interval_secs and sweep.deadline_secs must be greater than 0".into(),
            ));
        }

        if self.sweep.batch_size <= 0 {
            return Err(ConfigError::Invalid("sweep.batch_size must be greater than 0".into()));
        }

        self.policy
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        Ok(())
    }

    /// Database pool configuration for [`loyalty_db::Database::new`].
    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(&self.database.path)
            .max_connections(self.database.max_connections)
            .min_connections(self.database.min_connections)
            .busy_timeout(Duration::from_secs(self.database.busy_timeout_secs))
            .connect_timeout(Duration::from_secs(self.database.connect_timeout_secs))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
