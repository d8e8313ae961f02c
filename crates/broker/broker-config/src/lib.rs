mod config;

pub use config::{BrokerConfig, ConfigError};
