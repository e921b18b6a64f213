//! Topology error types.

use thiserror::Error;

use mantle_core::CoreError;

/// Result type alias for topology operations.
pub type TopologyResult<T> = Result<T, TopologyError>;

/// Errors raised while querying the cluster or assembling a snapshot.
#[derive(Debug, Error)]
pub enum TopologyError {
    #[error("cluster unreachable: {0}")]
    ClusterUnreachable(String),

    #[error("cluster reports no live nodes")]
    NoLiveNodes,

    #[error("malformed cluster status: {0}")]
    MalformedStatus(String),

    #[error("admin query to {node} failed: {reason}")]
    NodeQuery { node: String, reason: String },

    #[error("malformed subtree report from {node}: {reason}")]
    MalformedSubtrees { node: String, reason: String },

    #[error("snapshot rejected: {0}")]
    Snapshot(#[from] CoreError),
}
