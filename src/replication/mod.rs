//! Replication Module
//!
//! Log fan-out and acknowledgment coordination on the primary side.

pub mod protocol;
mod aggregator;
mod coordinator;

pub use aggregator::{AckAggregator, AckObserver, NullObserver, WindowedAckAggregator};
pub use coordinator::ReplicaCoordinator;
pub use protocol::{FrameHeader, Message};
