//! The controller's record of where the workload runs.

use serde::{Deserialize, Serialize};

use mantle_core::{NodeEndpoint, NodeId, PathKey};

/// Where the workload currently is. Owned by the placement controller and
/// replaced only after a relocation succeeds. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacementRecord {
    pub tracked_path: PathKey,
    pub owner_node: NodeId,
    /// Owner's address at placement time, so the instance can still be
    /// removed after the node drops out of cluster status.
    pub owner_address: String,
    pub workload_instance_id: String,
}

impl PlacementRecord {
    pub fn owner_endpoint(&self) -> NodeEndpoint {
        NodeEndpoint::new(self.owner_node.clone(), self.owner_address.clone())
    }
}
