//! WalShip - Primary-Side WAL Shipping Coordinator
//!
//! The replica-coordination core of a primary database node's
//! log-replication subsystem: maintains the live set of replica endpoints,
//! broadcasts committed write-ahead-log byte ranges to all of them, tracks
//! the highest log offset durably acknowledged by a quorum of replicas, and
//! probes replica liveness with keep-alive RPCs.
//!
//! # Architecture
//!
//! A log-writer component asks the [`replication::ReplicaCoordinator`] to
//! post a committed byte range. The coordinator snapshots the
//! [`registry::ReplicaRegistry`] under its lock, releases the lock, and
//! hands the snapshot to the ack aggregator for fan-out. Acknowledgment
//! flows back asynchronously and is queried later via the coordinator's
//! quorum-acked position, which only ever advances.
//!
//! WalShip deliberately does not implement leader election, replica
//! promotion, or log storage; it delivers a given byte range to the current
//! replica set and reports acknowledgment progress.

pub mod config;
pub mod error;
pub mod network;
pub mod registry;
pub mod replication;
pub mod role;

pub use config::WalshipConfig;
pub use error::{Error, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::WalshipConfig;
    pub use crate::error::{Error, Result};
    pub use crate::network::{ReplicaTransport, TcpTransport};
    pub use crate::registry::{ReplicaEndpoint, ReplicaRegistry};
    pub use crate::replication::{AckAggregator, AckObserver, Message, ReplicaCoordinator};
    pub use crate::role::{ReplicationRole, RoleManager};
}
