//! WalShip Configuration
//!
//! Configuration structures for the primary-side log shipping
//! coordinator.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main WalShip configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalshipConfig {
    /// Replication coordination configuration
    #[serde(default)]
    pub replication: ReplicationConfig,

    /// Network transport configuration
    #[serde(default)]
    pub network: NetworkConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Replication coordination configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplicationConfig {
    /// Maximum number of registered replicas
    #[serde(default = "default_max_replicas")]
    pub max_replicas: usize,

    /// Timeout for shipping a log range to a replica, in milliseconds
    #[serde(default = "default_log_sync_timeout_ms")]
    pub log_sync_timeout_ms: u64,

    /// Maximum number of in-flight fan-out dispatches tracked by the
    /// ack aggregator
    #[serde(default = "default_ack_window_size")]
    pub ack_window_size: usize,

    /// Timeout for a single keep-alive probe, in milliseconds
    #[serde(default = "default_keep_alive_timeout_ms")]
    pub keep_alive_timeout_ms: u64,
}

/// Network transport configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// TCP connect timeout in milliseconds
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (pretty, json)
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions
fn default_max_replicas() -> usize {
    8
}

fn default_log_sync_timeout_ms() -> u64 {
    1000
}

fn default_ack_window_size() -> usize {
    256
}

fn default_keep_alive_timeout_ms() -> u64 {
    1000
}

fn default_connect_timeout_ms() -> u64 {
    3000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for ReplicationConfig {
    fn default() -> Self {
        Self {
            max_replicas: default_max_replicas(),
            log_sync_timeout_ms: default_log_sync_timeout_ms(),
            ack_window_size: default_ack_window_size(),
            keep_alive_timeout_ms: default_keep_alive_timeout_ms(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Default for WalshipConfig {
    fn default() -> Self {
        Self {
            replication: ReplicationConfig::default(),
            network: NetworkConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl WalshipConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &std::path::Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Load configuration from a TOML string
    pub fn from_str(content: &str) -> crate::Result<Self> {
        let config: WalshipConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> crate::Result<()> {
        if self.replication.max_replicas == 0 {
            return Err(crate::Error::Config(
                "replication.max_replicas must be at least 1".into(),
            ));
        }

        if self.replication.ack_window_size == 0 {
            return Err(crate::Error::Config(
                "replication.ack_window_size must be at least 1".into(),
            ));
        }

        if self.replication.log_sync_timeout_ms == 0 {
            return Err(crate::Error::Config(
                "replication.log_sync_timeout_ms must be positive".into(),
            ));
        }

        Ok(())
    }

    /// Get the log sync timeout as Duration
    pub fn log_sync_timeout(&self) -> Duration {
        Duration::from_millis(self.replication.log_sync_timeout_ms)
    }

    /// Get the keep-alive probe timeout as Duration
    pub fn keep_alive_timeout(&self) -> Duration {
        Duration::from_millis(self.replication.keep_alive_timeout_ms)
    }

    /// Get the TCP connect timeout as Duration
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.network.connect_timeout_ms)
    }
}
