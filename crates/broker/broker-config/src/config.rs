use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file at {path}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
}

mod defaults {
    pub fn listen_host() -> String {
        "127.0.0.1".to_string()
    }

    pub fn listen_port() -> u16 {
        7790
    }

    pub fn base_path() -> String {
        "./data".to_string()
    }

    pub fn max_message_size() -> u32 {
        1 << 20
    }

    pub fn log_filter() -> String {
        "info".to_string()
    }
}

/// The broker's on-disk configuration, loaded from TOML at process start.
#[derive(Debug, Clone, Deserialize)]
pub struct BrokerConfig {
    #[serde(default = "defaults::listen_host")]
    pub listen_host: String,

    #[serde(default = "defaults::listen_port")]
    pub listen_port: u16,

    #[serde(default = "defaults::base_path")]
    pub base_path: String,

    /// Preshared key clients must present as the first frame on a new
    /// connection.
    pub auth_key: String,

    #[serde(default = "defaults::max_message_size")]
    pub max_message_size: u32,

    #[serde(default = "defaults::log_filter")]
    pub log_filter: String,
}

impl BrokerConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config: BrokerConfig = toml::from_str(&raw)?;
        Ok(config)
    }

    pub fn base_path(&self) -> PathBuf {
        PathBuf::from(&self.base_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_in_missing_fields() {
        let config: BrokerConfig = toml::from_str("auth_key = \"secret\"\n").unwrap();
        assert_eq!(config.listen_host, "127.0.0.1");
        assert_eq!(config.listen_port, 7790);
        assert_eq!(config.auth_key, "secret");
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let err = BrokerConfig::load("/nonexistent/path/broker.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
