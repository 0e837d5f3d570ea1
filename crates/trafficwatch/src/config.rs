//! Configuration management for trafficwatch.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::net::SocketAddr;
use std::path::PathBuf;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::auth::ApiKey;
use crate::error::{Error, Result};
use crate::query::MAX_WINDOW_HOURS;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "trafficwatch";

/// Default database file name.
const DATABASE_FILE_NAME: &str = "traffic.db";

/// Prefix for environment overrides.
const ENV_PREFIX: &str = "TRAFFICWATCH_";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `TRAFFICWATCH_`, sections
///    separated by `__`, e.g. `TRAFFICWATCH_SENSORS__API_KEY`)
/// 2. TOML config file at `~/.config/trafficwatch/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage configuration.
    pub storage: StorageConfig,
    /// HTTP server configuration.
    pub server: ServerConfig,
    /// Sensor ingestion configuration.
    pub sensors: SensorsConfig,
    /// Observation query configuration.
    pub observations: ObservationsConfig,
}

/// Storage-related configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the database file.
    /// Defaults to `~/.local/share/trafficwatch/traffic.db`
    pub database_path: Option<PathBuf>,
}

/// HTTP server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Socket address to listen on.
    pub bind: String,
}

/// Sensor ingestion configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorsConfig {
    /// Shared secret sensors send in `X-API-KEY`.
    /// Ingestion is refused while unset.
    pub api_key: Option<String>,
}

/// Observation query configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservationsConfig {
    /// How many hours back the recent-observations query looks by default.
    pub window_hours: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8000".to_string(),
        }
    }
}

impl Default for ObservationsConfig {
    fn default() -> Self {
        Self { window_hours: 24 }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading, parsing or validation fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config = Self::figment(config_path).extract::<Config>()?;
        config.validate()?;
        Ok(config)
    }

    fn figment(config_path: Option<PathBuf>) -> Figment {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(config_file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        self.bind_addr()?;

        if self
            .sensors
            .api_key
            .as_deref()
            .is_some_and(|key| key.trim().is_empty())
        {
            return Err(Error::ConfigValidation {
                message: "sensors.api_key must not be empty when set".to_string(),
            });
        }

        if self.observations.window_hours == 0 {
            return Err(Error::ConfigValidation {
                message: "observations.window_hours must be greater than 0".to_string(),
            });
        }

        if self.observations.window_hours > MAX_WINDOW_HOURS {
            return Err(Error::ConfigValidation {
                message: format!("observations.window_hours must be at most {MAX_WINDOW_HOURS}"),
            });
        }

        Ok(())
    }

    /// Get the database path, resolving defaults if not set.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.storage
            .database_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(DATABASE_FILE_NAME))
    }

    /// Get the address the server listens on.
    ///
    /// # Errors
    ///
    /// Returns an error if `server.bind` is not a socket address.
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        self.server
            .bind
            .parse()
            .map_err(|e| Error::ConfigValidation {
                message: format!("server.bind {:?} is not a socket address: {e}", self.server.bind),
            })
    }

    /// Get the sensor key, if one is configured.
    #[must_use]
    pub fn api_key(&self) -> Option<ApiKey> {
        self.sensors.api_key.as_deref().map(ApiKey::new)
    }

    /// Get the default recent-observations window.
    #[must_use]
    pub fn window(&self) -> chrono::Duration {
        chrono::Duration::hours(i64::from(self.observations.window_hours))
    }

    /// A copy that is safe to print.
    #[must_use]
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        if config.sensors.api_key.is_some() {
            config.sensors.api_key = Some("<redacted>".to_string());
        }
        config
    }
}
