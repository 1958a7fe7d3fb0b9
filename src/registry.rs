//! Replica Registry
//!
//! Tracks the live set of replica endpoints on the primary. The registry
//! is the only shared structure requiring mutual exclusion in the shipping
//! core: mutations and snapshots take a single internal lock, and the lock
//! is never held across RPC dispatch.

use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::{Error, Result};

/// Network identity of one replica. Immutable once registered; two
/// endpoints are equal when their addresses are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReplicaEndpoint {
    /// Replica address (host:port)
    pub address: String,
}

impl ReplicaEndpoint {
    /// Create an endpoint from an address
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
        }
    }
}

impl std::fmt::Display for ReplicaEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.address)
    }
}

/// Registry-owned record for one replica
#[derive(Debug, Clone)]
struct ReplicaEntry {
    endpoint: ReplicaEndpoint,
    registered_at: DateTime<Utc>,
}

/// Bounded, ordered set of replica endpoints
///
/// Entries keep their traversal order from registration; removals close the
/// gap, so insertion order is not preserved across the lifetime of the set.
pub struct ReplicaRegistry {
    /// Registered replicas, in traversal order
    replicas: RwLock<Vec<ReplicaEntry>>,
    /// Maximum number of replicas
    max_replicas: usize,
}

impl ReplicaRegistry {
    /// Create an empty registry with the given capacity
    pub fn new(max_replicas: usize) -> Self {
        Self {
            replicas: RwLock::new(Vec::with_capacity(max_replicas)),
            max_replicas,
        }
    }

    /// Register a replica at the tail of the set
    pub async fn add(&self, endpoint: ReplicaEndpoint) -> Result<()> {
        let mut replicas = self.replicas.write().await;

        if replicas.iter().any(|e| e.endpoint == endpoint) {
            return Err(Error::AlreadyRegistered(endpoint.address));
        }

        if replicas.len() >= self.max_replicas {
            tracing::error!(
                "cannot register replica {}: registry full ({} replicas)",
                endpoint,
                self.max_replicas
            );
            return Err(Error::RegistryFull {
                limit: self.max_replicas,
            });
        }

        tracing::info!("registered replica {}", endpoint);
        replicas.push(ReplicaEntry {
            endpoint,
            registered_at: Utc::now(),
        });
        Ok(())
    }

    /// Unregister a replica
    pub async fn remove(&self, endpoint: &ReplicaEndpoint) -> Result<()> {
        let mut replicas = self.replicas.write().await;

        match replicas.iter().position(|e| &e.endpoint == endpoint) {
            Some(idx) => {
                replicas.remove(idx);
                tracing::info!("unregistered replica {}", endpoint);
                Ok(())
            }
            None => Err(Error::ReplicaNotFound(endpoint.address.clone())),
        }
    }

    /// Remove every registered replica
    pub async fn reset(&self) {
        let mut replicas = self.replicas.write().await;
        if !replicas.is_empty() {
            tracing::info!("resetting replica registry ({} replicas)", replicas.len());
        }
        replicas.clear();
    }

    /// Copy up to `limit` endpoints in traversal order
    ///
    /// The returned snapshot is independent of the live registry: the lock is
    /// released before the caller uses it, so replicas added or removed after
    /// this call are not reflected. More live replicas than `limit` is a
    /// logic error, not a partial result.
    pub async fn snapshot(&self, limit: usize) -> Result<Vec<ReplicaEndpoint>> {
        let replicas = self.replicas.read().await;

        if replicas.len() > limit {
            tracing::error!("too many replicas: {} registered, limit {}", replicas.len(), limit);
            return Err(Error::TooManyReplicas {
                count: replicas.len(),
                limit,
            });
        }

        Ok(replicas.iter().map(|e| e.endpoint.clone()).collect())
    }

    /// Current number of registered replicas
    pub async fn count(&self) -> usize {
        self.replicas.read().await.len()
    }

    /// Check whether an endpoint is registered
    pub async fn contains(&self, endpoint: &ReplicaEndpoint) -> bool {
        self.replicas
            .read()
            .await
            .iter()
            .any(|e| &e.endpoint == endpoint)
    }

    /// Registry capacity
    pub fn capacity(&self) -> usize {
        self.max_replicas
    }

    /// Append a human-readable dump of the registry to `out`
    pub async fn describe(&self, out: &mut String) {
        let replicas = self.replicas.read().await;
        let _ = writeln!(
            out,
            "replicas: {}/{}",
            replicas.len(),
            self.max_replicas
        );
        for entry in replicas.iter() {
            let _ = writeln!(
                out,
                "  {} (registered {})",
                entry.endpoint,
                entry.registered_at.format("%Y-%m-%d %H:%M:%S UTC")
            );
        }
    }
}
