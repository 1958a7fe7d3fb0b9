//! WalShip Error Types

use thiserror::Error;

/// Result type alias for WalShip operations
pub type Result<T> = std::result::Result<T, Error>;

/// WalShip error types
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(#[from] toml::de::Error),

    // Argument/state errors
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Coordinator not initialized")]
    NotInitialized,

    // Registry errors
    #[error("Replica registry full: limit is {limit}")]
    RegistryFull { limit: usize },

    #[error("Too many replicas: {count} registered, limit {limit}")]
    TooManyReplicas { count: usize, limit: usize },

    #[error("Replica already registered: {0}")]
    AlreadyRegistered(String),

    #[error("Replica not found: {0}")]
    ReplicaNotFound(String),

    // Replication errors
    #[error("Ack aggregator error: {0}")]
    Aggregator(String),

    #[error("Keep-alive partially failed: {failed}/{attempted} probes failed, last: {last}")]
    KeepAlivePartial {
        failed: usize,
        attempted: usize,
        last: String,
    },

    #[error("Quorum did not acknowledge offset {offset} within {waited_ms}ms")]
    AckTimeout { offset: u64, waited_ms: u64 },

    // Network errors
    #[error("Network error: {0}")]
    Network(String),

    #[error("Connection failed to {address}: {reason}")]
    ConnectionFailed { address: String, reason: String },

    #[error("Connection timeout to {0}")]
    ConnectionTimeout(String),

    #[error("Message serialization error: {0}")]
    MessageSerialization(#[from] bincode::Error),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::ConnectionTimeout(_)
                | Error::ConnectionFailed { .. }
                | Error::Network(_)
                | Error::KeepAlivePartial { .. }
                | Error::AckTimeout { .. }
        )
    }

    /// Check if this error signals a per-replica failure rather than a
    /// coordinator-level one
    pub fn is_partial(&self) -> bool {
        matches!(self, Error::KeepAlivePartial { .. })
    }
}
