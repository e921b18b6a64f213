//! The cluster administration seam.
//!
//! Everything the snapshot builder needs from the cluster goes through
//! [`ClusterAdmin`], so the transport (CLI, RPC, remote exec) can change
//! without touching resolution. Implementations are injected, which is
//! also how tests script topology changes.

use std::future::Future;
use std::pin::Pin;

use mantle_core::NodeEndpoint;

use crate::error::TopologyResult;

/// Boxed future alias for admin query results.
pub type AdminFuture<'a, T> = Pin<Box<dyn Future<Output = TopologyResult<T>> + Send + 'a>>;

/// A subtree entry exactly as a node reported it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportedSubtree {
    pub path: String,
    pub is_authoritative: bool,
}

impl ReportedSubtree {
    pub fn new(path: impl Into<String>, is_authoritative: bool) -> Self {
        Self {
            path: path.into(),
            is_authoritative,
        }
    }
}

/// Read-only access to cluster membership and per-node subtree claims.
pub trait ClusterAdmin: Send + Sync {
    /// Enumerate live nodes, in the order the cluster lists them.
    fn cluster_status(&self) -> AdminFuture<'_, Vec<NodeEndpoint>>;

    /// Ask one node which subtrees it knows about.
    fn query_node_claims<'a>(
        &'a self,
        node: &'a NodeEndpoint,
    ) -> AdminFuture<'a, Vec<ReportedSubtree>>;
}
