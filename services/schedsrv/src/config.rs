//! schedsrv configuration
//!
//! Layers: built-in defaults, then the YAML file, then `SCHEDSRV_` environment
//! variables (`SCHEDSRV_MODBUS__RETRIES=5`).

use common::LogConfig;
use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use utility_schedule::{HistoryPolicy, SessionSettings};

pub const DEFAULT_CONFIG_PATH: &str = "config/schedsrv.yaml";
pub const ENV_PREFIX: &str = "SCHEDSRV_";
pub const SERVICE_NAME: &str = "schedsrv";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "data/schedsrv.db".to_string(),
        }
    }
}

/// Session settings applied to the stored controller address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModbusConfig {
    pub timeout_secs: u64,
    pub retries: u32,
    pub retry_interval_ms: u64,
    pub unit_id: u8,
}

impl Default for ModbusConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            retries: 3,
            retry_interval_ms: 1000,
            unit_id: 1,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub policy: HistoryPolicy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSection {
    pub level: String,
    pub json: bool,
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub modbus: ModbusConfig,
    pub history: HistoryConfig,
    pub log: LogSection,
}

impl Config {
    /// Load from `path`, or from the default location when `None`.
    /// An explicit path must exist; a missing default file leaves the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match path {
            Some(p) if !p.exists() => return Err(ConfigError::NotFound(p.to_path_buf())),
            Some(p) => p.to_path_buf(),
            None => PathBuf::from(DEFAULT_CONFIG_PATH),
        };

        let config: Config = Figment::from(Serialized::defaults(Config::default()))
            .merge(Yaml::file(&file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(Box::new)?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.path.trim().is_empty() {
            return Err(ConfigError::Invalid("database.path is empty".to_string()));
        }
        if self.modbus.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "modbus.timeout_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            timeout: Duration::from_secs(self.modbus.timeout_secs),
            retries: self.modbus.retries,
            retry_interval: Duration::from_millis(self.modbus.retry_interval_ms),
            unit_id: self.modbus.unit_id,
        }
    }

    pub fn log_config(&self) -> LogConfig {
        LogConfig {
            service_name: SERVICE_NAME.to_string(),
            level: self.log.level.clone(),
            enable_json: self.log.json,
            ..LogConfig::default()
        }
    }
}
