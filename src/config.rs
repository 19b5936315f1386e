//! Configuration loading for the bridge.
//!
//! Settings live in a single TOML file with a `[broker]` and an `[http]`
//! section. Every field has a default, so a missing or partial file still
//! yields a runnable configuration. The default search location is
//! `<config dir>/opendash/config.toml`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

/// Top-level configuration, one section per subsystem.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub broker: BrokerConfig,
    pub http: HttpConfig,
}

/// Connection parameters for the MQTT broker plus the fixed subscription
/// list. Credentials are only applied when a username is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub client_id: String,
    pub keep_alive_secs: u64,
    pub topics: Vec<String>,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 1883,
            username: String::new(),
            password: String::new(),
            client_id: "opendash".to_string(),
            keep_alive_secs: 5,
            topics: default_topics(),
        }
    }
}

/// Listen address for the dashboard gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

impl HttpConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// The topics the device is known to publish on.
fn default_topics() -> Vec<String> {
    [
        "esp32/zisterne",
        "esp32/temperature",
        "esp32/pressure",
        "esp32/humidity",
        "bodenfeuchte",
        "steuerungstemperatur",
        "status",
        "send_settings",
        "ext1/temperature",
        "ext1/humidity",
        "innen",
        "test",
    ]
    .iter()
    .map(|t| t.to_string())
    .collect()
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl BridgeConfig {
    /// Loads configuration from an explicit TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Default config file location, if the platform has a config directory.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("opendash").join("config.toml"))
    }

    /// Loads the default config file, falling back to built-in defaults when
    /// the file is missing or unreadable. Never fails; a broken file is
    /// logged and ignored.
    pub fn load_or_default() -> Self {
        match Self::default_path() {
            Some(path) if path.exists() => match Self::load(&path) {
                Ok(config) => {
                    info!(path = %path.display(), "loaded configuration");
                    config
                }
                Err(err) => {
                    warn!(error = %err, "ignoring broken config file, using defaults");
                    Self::default()
                }
            },
            _ => {
                info!("no config file found, using defaults");
                Self::default()
            }
        }
    }
}
