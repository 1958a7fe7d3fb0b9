//! Shipping Protocol
//!
//! Defines the wire messages exchanged between the primary and its
//! replicas. The payload carried by a `ShipLog` message is an opaque WAL
//! byte range; its internal format belongs to the log storage layer.

use serde::{Deserialize, Serialize};

/// Protocol messages for primary/replica communication
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Message {
    // ========== Log Shipping ==========
    /// A contiguous WAL byte range shipped from the primary
    ShipLog {
        start_offset: u64,
        end_offset: u64,
        payload: Vec<u8>,
    },

    /// Replica acknowledgment of a shipped range
    ShipLogAck {
        address: String,
        acked_offset: u64,
        success: bool,
    },

    // ========== Liveness ==========
    /// Keep-alive probe from the primary
    KeepAlive { timestamp_us: i64 },

    /// Keep-alive acknowledgment
    KeepAliveAck { address: String },

    // ========== Error ==========
    /// Error response
    Error { code: ErrorCode, message: String },
}

/// Error codes for protocol errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    /// Receiving node is not a replica
    NotReplica,
    /// Shipped range does not follow the replica's log tail
    LogGap,
    /// Timeout
    Timeout,
    /// Internal error
    Internal,
}

impl Message {
    /// Serialize message to bytes
    pub fn serialize(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    /// Deserialize message from bytes
    pub fn deserialize(bytes: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(bytes)
    }

    /// Get the message type name (for logging)
    pub fn type_name(&self) -> &'static str {
        match self {
            Message::ShipLog { .. } => "ShipLog",
            Message::ShipLogAck { .. } => "ShipLogAck",
            Message::KeepAlive { .. } => "KeepAlive",
            Message::KeepAliveAck { .. } => "KeepAliveAck",
            Message::Error { .. } => "Error",
        }
    }
}

/// Frame header for length-prefixed messages
#[derive(Debug, Clone, Copy)]
pub struct FrameHeader {
    /// Message length
    pub length: u32,
    /// Message checksum
    pub checksum: u32,
}

impl FrameHeader {
    /// Header size in bytes
    pub const SIZE: usize = 8;

    /// Create a new frame header
    pub fn new(data: &[u8]) -> Self {
        Self {
            length: data.len() as u32,
            checksum: crc32fast::hash(data),
        }
    }

    /// Serialize header to bytes
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        bytes[0..4].copy_from_slice(&self.length.to_le_bytes());
        bytes[4..8].copy_from_slice(&self.checksum.to_le_bytes());
        bytes
    }

    /// Deserialize header from bytes
    pub fn from_bytes(bytes: &[u8; Self::SIZE]) -> Self {
        Self {
            length: u32::from_le_bytes(bytes[0..4].try_into().unwrap()),
            checksum: u32::from_le_bytes(bytes[4..8].try_into().unwrap()),
        }
    }
}
