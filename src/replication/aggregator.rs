//! Ack Aggregation
//!
//! Fans a WAL byte range out to a set of replicas and derives the highest
//! log offset acknowledged by a majority of them. Dispatch is decoupled
//! from acknowledgment: `fan_out` returns once every send has been issued,
//! and acks are folded into the quorum offset as they arrive.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::RwLock;

use crate::error::{Error, Result};
use crate::network::ReplicaTransport;
use crate::registry::ReplicaEndpoint;

/// Callback invoked as per-replica acknowledgment outcomes arrive
pub trait AckObserver: Send + Sync {
    /// A replica acknowledged a log offset
    fn on_ack(&self, endpoint: &ReplicaEndpoint, acked_offset: u64);

    /// A dispatch to a replica failed or timed out
    fn on_failure(&self, endpoint: &ReplicaEndpoint, error: &Error);
}

/// Observer that ignores all outcomes
pub struct NullObserver;

impl AckObserver for NullObserver {
    fn on_ack(&self, _endpoint: &ReplicaEndpoint, _acked_offset: u64) {}
    fn on_failure(&self, _endpoint: &ReplicaEndpoint, _error: &Error) {}
}

/// Contract consumed by the coordinator: dispatch a range to a replica set
/// and expose the quorum-acknowledged offset
#[async_trait::async_trait]
pub trait AckAggregator: Send + Sync {
    /// Dispatch a log range to every endpoint in `replicas`. Returns once
    /// dispatch is issued; acknowledgment is observed via `quorum_offset`.
    async fn fan_out(
        &self,
        replicas: Vec<ReplicaEndpoint>,
        start_offset: u64,
        end_offset: u64,
        payload: Bytes,
        timeout: Duration,
    ) -> Result<()>;

    /// Highest offset acknowledged by a majority of known replicas.
    /// Monotonically non-decreasing.
    fn quorum_offset(&self) -> u64;
}

/// Ack aggregator with a bounded in-flight dispatch window
///
/// Tracks the highest acked offset per replica and publishes the offset a
/// majority of tracked replicas have reached. The published offset only
/// advances; it resets only when the aggregator itself is rebuilt.
pub struct WindowedAckAggregator {
    /// Transport used for dispatch
    transport: Arc<dyn ReplicaTransport>,
    /// Per-replica highest acknowledged offset
    matched: Arc<RwLock<HashMap<String, u64>>>,
    /// Published quorum-acknowledged offset
    quorum: Arc<AtomicU64>,
    /// Outstanding dispatches
    in_flight: Arc<AtomicUsize>,
    /// Maximum outstanding dispatches
    window_size: usize,
    /// Ack outcome observer
    observer: Arc<dyn AckObserver>,
}

impl WindowedAckAggregator {
    /// Create an aggregator over the given transport
    pub fn new(
        transport: Arc<dyn ReplicaTransport>,
        observer: Arc<dyn AckObserver>,
        window_size: usize,
    ) -> Self {
        Self {
            transport,
            matched: Arc::new(RwLock::new(HashMap::new())),
            quorum: Arc::new(AtomicU64::new(0)),
            in_flight: Arc::new(AtomicUsize::new(0)),
            window_size,
            observer,
        }
    }

    /// Number of dispatches currently outstanding
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Fold one replica ack into the matched map and republish the quorum
    /// offset if a majority has advanced past it
    async fn record_ack(
        matched: &RwLock<HashMap<String, u64>>,
        quorum: &AtomicU64,
        endpoint: &ReplicaEndpoint,
        acked_offset: u64,
    ) {
        let mut map = matched.write().await;
        let entry = map.entry(endpoint.address.clone()).or_insert(0);
        if acked_offset > *entry {
            *entry = acked_offset;
        }

        // Majority offset: sort descending, take the (n/2 + 1)th value
        let mut offsets: Vec<u64> = map.values().copied().collect();
        offsets.sort_unstable_by(|a, b| b.cmp(a));
        let majority = offsets.len() / 2 + 1;
        let reached = offsets[majority - 1];
        drop(map);

        let prev = quorum.fetch_max(reached, Ordering::AcqRel);
        if reached > prev {
            tracing::trace!("quorum-acked offset advanced {} -> {}", prev, reached);
        }
    }
}

#[async_trait::async_trait]
impl AckAggregator for WindowedAckAggregator {
    async fn fan_out(
        &self,
        replicas: Vec<ReplicaEndpoint>,
        start_offset: u64,
        end_offset: u64,
        payload: Bytes,
        timeout: Duration,
    ) -> Result<()> {
        if replicas.is_empty() {
            tracing::debug!(
                "fan_out of [{}, {}] with no replicas registered",
                start_offset,
                end_offset
            );
            return Ok(());
        }

        let outstanding = self.in_flight.load(Ordering::Acquire);
        if outstanding + replicas.len() > self.window_size {
            return Err(Error::Aggregator(format!(
                "ack window full: {} in flight, {} requested, window {}",
                outstanding,
                replicas.len(),
                self.window_size
            )));
        }

        // The tracked set follows the dispatch target set: replicas no longer
        // targeted stop counting toward the majority, and every targeted
        // replica counts even before its first ack. The published offset
        // never regresses regardless.
        {
            let mut map = self.matched.write().await;
            map.retain(|addr, _| replicas.iter().any(|r| r.address == *addr));
            for endpoint in &replicas {
                map.entry(endpoint.address.clone()).or_insert(0);
            }
        }

        for endpoint in replicas {
            self.in_flight.fetch_add(1, Ordering::AcqRel);

            let transport = self.transport.clone();
            let matched = self.matched.clone();
            let quorum = self.quorum.clone();
            let in_flight = self.in_flight.clone();
            let observer = self.observer.clone();
            let payload = payload.clone();

            tokio::spawn(async move {
                let result = transport
                    .ship_log(&endpoint, start_offset, end_offset, payload, timeout)
                    .await;

                match result {
                    Ok(acked_offset) => {
                        Self::record_ack(&matched, &quorum, &endpoint, acked_offset).await;
                        observer.on_ack(&endpoint, acked_offset);
                    }
                    Err(e) => {
                        tracing::warn!(
                            "ship of [{}, {}] to replica {} failed: {}",
                            start_offset,
                            end_offset,
                            endpoint,
                            e
                        );
                        observer.on_failure(&endpoint, &e);
                    }
                }

                in_flight.fetch_sub(1, Ordering::AcqRel);
            });
        }

        Ok(())
    }

    fn quorum_offset(&self) -> u64 {
        self.quorum.load(Ordering::Acquire)
    }
}
