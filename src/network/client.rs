//! TCP Transport
//!
//! Per-call TCP client implementing `ReplicaTransport`. Each request opens
//! a connection, performs one framed request/response exchange under the
//! caller's deadline, and closes.

use std::time::Duration;

use bytes::Bytes;
use tokio::net::TcpStream;
use tokio::time::timeout;

use super::{read_message, write_message, ReplicaTransport};
use crate::error::{Error, Result};
use crate::registry::ReplicaEndpoint;
use crate::replication::protocol::{ErrorCode, Message};

/// TCP transport to replica nodes
pub struct TcpTransport {
    /// Connection timeout
    connect_timeout: Duration,
}

impl TcpTransport {
    /// Create a new transport
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }

    /// Connect to an address
    async fn connect(&self, address: &str) -> Result<TcpStream> {
        let result = timeout(self.connect_timeout, TcpStream::connect(address)).await;

        match result {
            Ok(Ok(stream)) => {
                stream.set_nodelay(true)?;
                Ok(stream)
            }
            Ok(Err(e)) => Err(Error::ConnectionFailed {
                address: address.to_string(),
                reason: e.to_string(),
            }),
            Err(_) => Err(Error::ConnectionTimeout(address.to_string())),
        }
    }

    /// One framed request/response exchange under a deadline
    async fn request(
        &self,
        address: &str,
        message: Message,
        deadline: Duration,
    ) -> Result<Message> {
        let result = timeout(deadline, async {
            let mut stream = self.connect(address).await?;
            let (mut reader, mut writer) = stream.split();
            write_message(&mut writer, &message).await?;
            read_message(&mut reader).await
        })
        .await;

        match result {
            Ok(inner) => inner,
            Err(_) => Err(Error::ConnectionTimeout(address.to_string())),
        }
    }
}

#[async_trait::async_trait]
impl ReplicaTransport for TcpTransport {
    async fn ship_log(
        &self,
        endpoint: &ReplicaEndpoint,
        start_offset: u64,
        end_offset: u64,
        payload: Bytes,
        timeout: Duration,
    ) -> Result<u64> {
        let msg = Message::ShipLog {
            start_offset,
            end_offset,
            payload: payload.to_vec(),
        };

        match self.request(&endpoint.address, msg, timeout).await? {
            Message::ShipLogAck {
                acked_offset,
                success: true,
                ..
            } => Ok(acked_offset),
            Message::ShipLogAck {
                acked_offset,
                success: false,
                ..
            } => Err(Error::Network(format!(
                "replica {} rejected log range [{}, {}] at offset {}",
                endpoint, start_offset, end_offset, acked_offset
            ))),
            Message::Error { code, message } => Err(map_protocol_error(endpoint, code, message)),
            other => Err(Error::Network(format!(
                "unexpected response to ShipLog from {}: {}",
                endpoint,
                other.type_name()
            ))),
        }
    }

    async fn send_keep_alive(&self, endpoint: &ReplicaEndpoint, timeout: Duration) -> Result<()> {
        let msg = Message::KeepAlive {
            timestamp_us: chrono::Utc::now().timestamp_micros(),
        };

        match self.request(&endpoint.address, msg, timeout).await? {
            Message::KeepAliveAck { .. } => Ok(()),
            Message::Error { code, message } => Err(map_protocol_error(endpoint, code, message)),
            other => Err(Error::Network(format!(
                "unexpected response to KeepAlive from {}: {}",
                endpoint,
                other.type_name()
            ))),
        }
    }
}

fn map_protocol_error(endpoint: &ReplicaEndpoint, code: ErrorCode, message: String) -> Error {
    match code {
        ErrorCode::Timeout => Error::ConnectionTimeout(endpoint.address.clone()),
        _ => Error::Network(format!("replica {} error ({:?}): {}", endpoint, code, message)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_connection_failure() {
        let transport = TcpTransport::new(Duration::from_millis(100));
        let endpoint = ReplicaEndpoint::new("127.0.0.1:1");

        let result = transport
            .send_keep_alive(&endpoint, Duration::from_millis(500))
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_ship_log_against_stub_replica() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        // Stub replica: ack whatever range arrives
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let (mut reader, mut writer) = stream.split();
            let msg = read_message(&mut reader).await.unwrap();
            if let Message::ShipLog { end_offset, .. } = msg {
                let ack = Message::ShipLogAck {
                    address: addr.to_string(),
                    acked_offset: end_offset,
                    success: true,
                };
                write_message(&mut writer, &ack).await.unwrap();
            }
        });

        let transport = TcpTransport::new(Duration::from_secs(1));
        let endpoint = ReplicaEndpoint::new(addr.to_string());

        let acked = transport
            .ship_log(
                &endpoint,
                100,
                200,
                Bytes::from_static(b"wal bytes"),
                Duration::from_secs(1),
            )
            .await
            .unwrap();
        assert_eq!(acked, 200);
    }
}
