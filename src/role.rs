//! Replication Role
//!
//! Tracks which side of the replication relationship this node is on.
//! The shipping core only requires the manager's presence at
//! initialization; it makes no role-based decisions itself.

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

/// Role of a node in the replication relationship
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReplicationRole {
    /// Node accepts writes and ships log ranges to replicas
    Primary,
    /// Node receives replicated log data
    Replica,
}

impl std::fmt::Display for ReplicationRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReplicationRole::Primary => write!(f, "PRIMARY"),
            ReplicationRole::Replica => write!(f, "REPLICA"),
        }
    }
}

/// Holder for the node's current replication role
pub struct RoleManager {
    role: RwLock<ReplicationRole>,
}

impl RoleManager {
    /// Create a role manager with the given initial role
    pub fn new(role: ReplicationRole) -> Self {
        Self {
            role: RwLock::new(role),
        }
    }

    /// Get the current role
    pub async fn role(&self) -> ReplicationRole {
        *self.role.read().await
    }

    /// Set the current role
    pub async fn set_role(&self, role: ReplicationRole) {
        let mut current = self.role.write().await;
        if *current != role {
            tracing::info!("replication role changed: {} -> {}", current, role);
            *current = role;
        }
    }
}
