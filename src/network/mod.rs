//! Network Module
//!
//! Framed TCP communication with replicas, behind the `ReplicaTransport`
//! trait so the shipping core can be exercised without a network.

mod client;

pub use client::TcpTransport;

use std::time::Duration;

use bytes::Bytes;

use crate::error::{Error, Result};
use crate::registry::ReplicaEndpoint;
use crate::replication::protocol::{FrameHeader, Message};

/// Transport boundary consumed by the shipping core
///
/// Every call carries an explicit timeout; a timed-out replica is a failed
/// attempt for that call only and is never removed from the registry here.
#[async_trait::async_trait]
pub trait ReplicaTransport: Send + Sync {
    /// Ship a WAL byte range to one replica and wait for its ack.
    /// Returns the offset the replica reports as durably received.
    async fn ship_log(
        &self,
        endpoint: &ReplicaEndpoint,
        start_offset: u64,
        end_offset: u64,
        payload: Bytes,
        timeout: Duration,
    ) -> Result<u64>;

    /// Send a keep-alive probe to one replica
    async fn send_keep_alive(&self, endpoint: &ReplicaEndpoint, timeout: Duration) -> Result<()>;
}

/// Read a framed message from a reader
pub async fn read_message<R: tokio::io::AsyncRead + Unpin>(reader: &mut R) -> Result<Message> {
    use tokio::io::AsyncReadExt;

    // Read header
    let mut header_bytes = [0u8; FrameHeader::SIZE];
    reader.read_exact(&mut header_bytes).await?;
    let header = FrameHeader::from_bytes(&header_bytes);

    // Read body
    let mut body = vec![0u8; header.length as usize];
    reader.read_exact(&mut body).await?;

    // Verify checksum
    let computed_checksum = crc32fast::hash(&body);
    if computed_checksum != header.checksum {
        return Err(Error::Network("Message checksum mismatch".into()));
    }

    // Deserialize
    let message = Message::deserialize(&body)?;
    Ok(message)
}

/// Write a framed message to a writer
pub async fn write_message<W: tokio::io::AsyncWrite + Unpin>(
    writer: &mut W,
    message: &Message,
) -> Result<()> {
    use tokio::io::AsyncWriteExt;

    let body = message.serialize()?;
    let header = FrameHeader::new(&body);

    writer.write_all(&header.to_bytes()).await?;
    writer.write_all(&body).await?;
    writer.flush().await?;

    Ok(())
}
