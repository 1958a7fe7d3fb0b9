//! Replica Coordinator
//!
//! The orchestrating facade of the shipping core: owns the replica
//! registry and the ack aggregator, ships committed WAL ranges to the
//! current replica set, reports quorum acknowledgment progress, and probes
//! replica liveness.
//!
//! Concurrency contract: the registry lock covers only the snapshot copy
//! and registry mutation. Fan-out and keep-alive RPCs always run outside
//! it, so a slow replica never stalls membership changes or a concurrent
//! dispatch to a different log range.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::RwLock;

use super::aggregator::{AckAggregator, AckObserver, WindowedAckAggregator};
use crate::config::ReplicationConfig;
use crate::error::{Error, Result};
use crate::network::ReplicaTransport;
use crate::registry::{ReplicaEndpoint, ReplicaRegistry};
use crate::role::RoleManager;

/// Collaborators installed at initialization
struct Collaborators {
    aggregator: Arc<dyn AckAggregator>,
    transport: Arc<dyn ReplicaTransport>,
    #[allow(dead_code)]
    role_manager: Arc<RoleManager>,
    log_sync_timeout: Duration,
}

/// Primary-side coordinator for log shipping and replica acknowledgment
///
/// Constructed once at node startup and used for the lifetime of the
/// process. Shipping operations fail with `NotInitialized` until
/// `initialize` succeeds; registry administration is available from
/// construction.
pub struct ReplicaCoordinator {
    /// Live replica set
    registry: ReplicaRegistry,
    /// Configuration
    config: ReplicationConfig,
    /// Collaborators, installed by `initialize`
    inner: RwLock<Option<Collaborators>>,
}

impl ReplicaCoordinator {
    /// Create an uninitialized coordinator
    pub fn new(config: ReplicationConfig) -> Self {
        Self {
            registry: ReplicaRegistry::new(config.max_replicas),
            config,
            inner: RwLock::new(None),
        }
    }

    /// Install collaborators and transition to ready
    ///
    /// Builds the ack aggregator over the given transport with the
    /// configured ack window. Re-initializing replaces the aggregator, which
    /// restarts quorum tracking from zero.
    pub async fn initialize(
        &self,
        observer: Arc<dyn AckObserver>,
        role_manager: Arc<RoleManager>,
        transport: Arc<dyn ReplicaTransport>,
        log_sync_timeout: Duration,
    ) -> Result<()> {
        if log_sync_timeout.is_zero() {
            return Err(Error::InvalidArgument(
                "log_sync_timeout must be positive".into(),
            ));
        }

        let aggregator = Arc::new(WindowedAckAggregator::new(
            transport.clone(),
            observer,
            self.config.ack_window_size,
        ));

        let mut inner = self.inner.write().await;
        if inner.is_some() {
            tracing::warn!("re-initializing coordinator: quorum tracking restarts from zero");
        }
        *inner = Some(Collaborators {
            aggregator,
            transport,
            role_manager,
            log_sync_timeout,
        });

        tracing::info!(
            "coordinator initialized: max_replicas={}, ack_window={}, log_sync_timeout={:?}",
            self.config.max_replicas,
            self.config.ack_window_size,
            log_sync_timeout
        );
        Ok(())
    }

    /// Adjust the fan-out timeout applied to subsequent posts
    pub async fn set_log_sync_timeout(&self, timeout: Duration) -> Result<()> {
        let mut inner = self.inner.write().await;
        match inner.as_mut() {
            Some(c) => {
                c.log_sync_timeout = timeout;
                Ok(())
            }
            None => Err(Error::NotInitialized),
        }
    }

    /// Ship a committed WAL byte range to every registered replica
    ///
    /// Fire-and-forget with respect to acknowledgment: the call returns once
    /// dispatch has been issued to the snapshot of replicas taken at entry.
    /// Progress is observed separately via `acked_position`. An empty
    /// registry dispatches to zero replicas and succeeds.
    pub async fn post_log(
        &self,
        start_cursor: u64,
        end_cursor: u64,
        payload: Bytes,
    ) -> Result<()> {
        if end_cursor < start_cursor {
            return Err(Error::InvalidArgument(format!(
                "log range end {} precedes start {}",
                end_cursor, start_cursor
            )));
        }

        let (aggregator, timeout) = {
            let inner = self.inner.read().await;
            match inner.as_ref() {
                Some(c) => (c.aggregator.clone(), c.log_sync_timeout),
                None => return Err(Error::NotInitialized),
            }
        };

        // Snapshot under the registry lock, dispatch without it
        let replicas = self.registry.snapshot(self.config.max_replicas).await?;

        tracing::debug!(
            "posting log range [{}, {}] to {} replicas",
            start_cursor,
            end_cursor,
            replicas.len()
        );

        aggregator
            .fan_out(replicas, start_cursor, end_cursor, payload, timeout)
            .await
    }

    /// Highest log offset acknowledged by a quorum of replicas
    ///
    /// Pure read, monotonically non-decreasing, safe to call concurrently
    /// with `post_log`.
    pub async fn acked_position(&self) -> Result<u64> {
        let inner = self.inner.read().await;
        match inner.as_ref() {
            Some(c) => Ok(c.aggregator.quorum_offset()),
            None => Err(Error::NotInitialized),
        }
    }

    /// Block until a quorum of replicas has acknowledged `offset`
    ///
    /// Explicit opt-in companion to the fire-and-forget `post_log`: polls
    /// the quorum-acked position and returns it once it reaches `offset`,
    /// or `AckTimeout` if the deadline passes first. `post_log` itself
    /// never waits for acknowledgment.
    pub async fn wait_for_ack(&self, offset: u64, deadline: Duration) -> Result<u64> {
        const POLL_INTERVAL: Duration = Duration::from_millis(10);

        let started = tokio::time::Instant::now();
        loop {
            let position = self.acked_position().await?;
            if position >= offset {
                return Ok(position);
            }
            if started.elapsed() >= deadline {
                return Err(Error::AckTimeout {
                    offset,
                    waited_ms: deadline.as_millis() as u64,
                });
            }
            tokio::time::sleep(POLL_INTERVAL.min(deadline.saturating_sub(started.elapsed()))).await;
        }
    }

    /// Probe every registered replica with a keep-alive RPC
    ///
    /// Best-effort: a failed probe is logged and does not prevent probing
    /// the remaining replicas. If any probe failed the result carries the
    /// last failure; callers must not read it as "all replicas unreachable".
    pub async fn send_keep_alive(&self) -> Result<()> {
        let (transport, timeout) = {
            let inner = self.inner.read().await;
            match inner.as_ref() {
                Some(c) => (
                    c.transport.clone(),
                    Duration::from_millis(self.config.keep_alive_timeout_ms),
                ),
                None => return Err(Error::NotInitialized),
            }
        };

        let replicas = self.registry.snapshot(self.config.max_replicas).await?;
        let attempted = replicas.len();
        let mut failed = 0usize;
        let mut last_error = None;

        for endpoint in &replicas {
            tracing::debug!("sending keep-alive to replica {}", endpoint);
            if let Err(e) = transport.send_keep_alive(endpoint, timeout).await {
                tracing::warn!("keep-alive to replica {} failed: {}", endpoint, e);
                failed += 1;
                last_error = Some(e);
            }
        }

        match last_error {
            Some(last) => Err(Error::KeepAlivePartial {
                failed,
                attempted,
                last: last.to_string(),
            }),
            None => Ok(()),
        }
    }

    /// Register a replica
    pub async fn add_replica(&self, endpoint: ReplicaEndpoint) -> Result<()> {
        self.registry.add(endpoint).await
    }

    /// Unregister a replica
    pub async fn remove_replica(&self, endpoint: &ReplicaEndpoint) -> Result<()> {
        self.registry.remove(endpoint).await
    }

    /// Remove every registered replica
    pub async fn reset_replicas(&self) {
        self.registry.reset().await
    }

    /// Current registered replica count
    pub async fn replica_count(&self) -> usize {
        self.registry.count().await
    }

    /// Append a human-readable dump of coordinator state to `out`
    pub async fn describe(&self, out: &mut String) {
        use std::fmt::Write as _;

        self.registry.describe(out).await;
        if let Some(c) = self.inner.read().await.as_ref() {
            let _ = writeln!(out, "quorum-acked offset: {}", c.aggregator.quorum_offset());
        } else {
            let _ = writeln!(out, "coordinator: uninitialized");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::testing::MockTransport;
    use crate::replication::aggregator::NullObserver;
    use crate::role::ReplicationRole;

    fn test_config(max_replicas: usize) -> ReplicationConfig {
        ReplicationConfig {
            max_replicas,
            log_sync_timeout_ms: 1000,
            ack_window_size: 1024,
            keep_alive_timeout_ms: 100,
        }
    }

    async fn initialized(
        max_replicas: usize,
    ) -> (ReplicaCoordinator, Arc<MockTransport>) {
        let coordinator = ReplicaCoordinator::new(test_config(max_replicas));
        let transport = Arc::new(MockTransport::new());
        coordinator
            .initialize(
                Arc::new(NullObserver),
                Arc::new(RoleManager::new(ReplicationRole::Primary)),
                transport.clone(),
                Duration::from_secs(1),
            )
            .await
            .unwrap();
        (coordinator, transport)
    }

    // Fan-out acks arrive on spawned tasks; poll until they are folded in
    async fn wait_for_acked(coordinator: &ReplicaCoordinator, expected: u64) {
        for _ in 0..400 {
            if coordinator.acked_position().await.unwrap() >= expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("acked position did not reach {}", expected);
    }

    #[tokio::test]
    async fn test_operations_require_initialization() {
        let coordinator = ReplicaCoordinator::new(test_config(4));

        let err = coordinator
            .post_log(0, 10, Bytes::from_static(b"x"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotInitialized));
        assert!(matches!(
            coordinator.acked_position().await.unwrap_err(),
            Error::NotInitialized
        ));
        assert!(matches!(
            coordinator.send_keep_alive().await.unwrap_err(),
            Error::NotInitialized
        ));
        assert!(matches!(
            coordinator
                .set_log_sync_timeout(Duration::from_secs(1))
                .await
                .unwrap_err(),
            Error::NotInitialized
        ));

        // Registry administration is available from construction
        coordinator
            .add_replica(ReplicaEndpoint::new("10.0.0.1:7654"))
            .await
            .unwrap();
        assert_eq!(coordinator.replica_count().await, 1);
    }

    #[tokio::test]
    async fn test_invalid_range_performs_no_dispatch() {
        let (coordinator, transport) = initialized(4).await;
        coordinator
            .add_replica(ReplicaEndpoint::new("10.0.0.1:7654"))
            .await
            .unwrap();

        let err = coordinator
            .post_log(200, 100, Bytes::from_static(b"x"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
        assert!(transport.ship_calls().await.is_empty());
    }

    #[tokio::test]
    async fn test_post_log_with_empty_registry_succeeds() {
        let (coordinator, transport) = initialized(4).await;

        coordinator
            .post_log(100, 200, Bytes::from_static(b"x"))
            .await
            .unwrap();
        assert!(transport.ship_calls().await.is_empty());
        assert_eq!(coordinator.acked_position().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_post_log_dispatches_to_all_replicas() {
        let (coordinator, transport) = initialized(4).await;
        for i in 1..=3 {
            coordinator
                .add_replica(ReplicaEndpoint::new(format!("10.0.0.{}:7654", i)))
                .await
                .unwrap();
        }

        coordinator
            .post_log(0, 100, Bytes::from_static(b"wal"))
            .await
            .unwrap();
        wait_for_acked(&coordinator, 100).await;

        let calls = transport.ship_calls().await;
        assert_eq!(calls.len(), 3);
        assert!(calls.iter().all(|c| c.start_offset == 0 && c.end_offset == 100));
    }

    #[tokio::test]
    async fn test_acked_position_is_monotone() {
        let (coordinator, _transport) = initialized(4).await;
        for i in 1..=3 {
            coordinator
                .add_replica(ReplicaEndpoint::new(format!("10.0.0.{}:7654", i)))
                .await
                .unwrap();
        }

        let mut observed = 0;
        for (start, end) in [(0u64, 50u64), (50, 120), (120, 300)] {
            coordinator
                .post_log(start, end, Bytes::from_static(b"x"))
                .await
                .unwrap();
            wait_for_acked(&coordinator, end).await;

            let position = coordinator.acked_position().await.unwrap();
            assert!(position >= observed, "acked position regressed");
            observed = position;
        }
        assert_eq!(observed, 300);
    }

    #[tokio::test]
    async fn test_wait_for_ack_reaches_offset() {
        let (coordinator, _transport) = initialized(4).await;
        for i in 1..=3 {
            coordinator
                .add_replica(ReplicaEndpoint::new(format!("10.0.0.{}:7654", i)))
                .await
                .unwrap();
        }

        coordinator
            .post_log(0, 500, Bytes::from_static(b"x"))
            .await
            .unwrap();

        let position = coordinator
            .wait_for_ack(500, Duration::from_secs(2))
            .await
            .unwrap();
        assert!(position >= 500);
    }

    #[tokio::test]
    async fn test_wait_for_ack_times_out_without_quorum() {
        let (coordinator, transport) = initialized(4).await;
        coordinator
            .add_replica(ReplicaEndpoint::new("10.0.0.1:7654"))
            .await
            .unwrap();
        coordinator
            .add_replica(ReplicaEndpoint::new("10.0.0.2:7654"))
            .await
            .unwrap();
        // Both replicas down: no ack can arrive
        transport.fail_endpoint("10.0.0.1:7654").await;
        transport.fail_endpoint("10.0.0.2:7654").await;

        coordinator
            .post_log(0, 100, Bytes::from_static(b"x"))
            .await
            .unwrap();

        let err = coordinator
            .wait_for_ack(100, Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AckTimeout { offset: 100, .. }));
    }

    #[tokio::test]
    async fn test_keep_alive_probes_all_despite_failure() {
        let (coordinator, transport) = initialized(4).await;
        coordinator
            .add_replica(ReplicaEndpoint::new("10.0.0.1:7654"))
            .await
            .unwrap();
        coordinator
            .add_replica(ReplicaEndpoint::new("10.0.0.2:7654"))
            .await
            .unwrap();
        transport.fail_endpoint("10.0.0.2:7654").await;

        let err = coordinator.send_keep_alive().await.unwrap_err();
        match err {
            Error::KeepAlivePartial {
                failed, attempted, ..
            } => {
                assert_eq!(failed, 1);
                assert_eq!(attempted, 2);
            }
            other => panic!("expected KeepAlivePartial, got {}", other),
        }

        // The reachable replica was still probed
        let calls = transport.keep_alive_calls().await;
        assert_eq!(calls.len(), 2);
        assert!(calls.contains(&"10.0.0.1:7654".to_string()));
    }

    #[tokio::test]
    async fn test_keep_alive_all_reachable() {
        let (coordinator, transport) = initialized(4).await;
        coordinator
            .add_replica(ReplicaEndpoint::new("10.0.0.1:7654"))
            .await
            .unwrap();

        coordinator.send_keep_alive().await.unwrap();
        assert_eq!(transport.keep_alive_calls().await.len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_membership_and_posts() {
        let (coordinator, _transport) = initialized(64).await;
        let coordinator = Arc::new(coordinator);

        let mut tasks = Vec::new();
        for t in 0..4 {
            let c = coordinator.clone();
            tasks.push(tokio::spawn(async move {
                for i in 0..25 {
                    let ep = ReplicaEndpoint::new(format!("10.0.{}.{}:7654", t, i % 8));
                    if c.add_replica(ep.clone()).await.is_ok() {
                        tokio::task::yield_now().await;
                        let _ = c.remove_replica(&ep).await;
                    }
                }
            }));
        }
        for i in 0..4u64 {
            let c = coordinator.clone();
            tasks.push(tokio::spawn(async move {
                for j in 0..25u64 {
                    let start = (i * 25 + j) * 10;
                    c.post_log(start, start + 10, Bytes::from_static(b"x"))
                        .await
                        .unwrap();
                    tokio::task::yield_now().await;
                }
            }));
        }

        for task in tasks {
            task.await.unwrap();
        }
        assert_eq!(coordinator.replica_count().await, 0);
    }

    #[tokio::test]
    async fn test_describe_reports_registry_and_progress() {
        let (coordinator, _transport) = initialized(4).await;
        coordinator
            .add_replica(ReplicaEndpoint::new("10.0.0.1:7654"))
            .await
            .unwrap();

        let mut out = String::new();
        coordinator.describe(&mut out).await;
        assert!(out.contains("replicas: 1/4"));
        assert!(out.contains("quorum-acked offset: 0"));
    }
}
