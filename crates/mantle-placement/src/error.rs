//! Placement error types.

use std::fmt;

use thiserror::Error;

use mantle_cluster::TopologyError;
use mantle_core::NodeId;
use mantle_runtime::RuntimeError;

/// Result type alias for controller operations.
pub type PlacementResult<T> = Result<T, PlacementError>;

/// A step of the relocation sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelocationStep {
    Remove,
    Create,
    Start,
    Verify,
}

impl fmt::Display for RelocationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Remove => "remove",
            Self::Create => "create",
            Self::Start => "start",
            Self::Verify => "verify",
        })
    }
}

/// A relocation that stopped at `step` on `node`.
#[derive(Debug, Error)]
#[error("relocation failed at {step} on {node}: {reason}")]
pub struct RelocationError {
    pub step: RelocationStep,
    pub node: NodeId,
    pub reason: String,
    /// False when removing the previous instance failed, so it may still
    /// be running on its old node.
    pub previous_removed: bool,
    #[source]
    pub source: Option<RuntimeError>,
}

impl RelocationError {
    pub fn new(step: RelocationStep, node: &NodeId, reason: impl Into<String>) -> Self {
        Self {
            step,
            node: node.clone(),
            reason: reason.into(),
            previous_removed: true,
            source: None,
        }
    }

    pub fn runtime(step: RelocationStep, node: &NodeId, source: RuntimeError) -> Self {
        Self {
            step,
            node: node.clone(),
            reason: source.to_string(),
            previous_removed: true,
            source: Some(source),
        }
    }

    pub fn with_previous_removed(mut self, removed: bool) -> Self {
        self.previous_removed = removed;
        self
    }
}

/// Errors that stop the controller. Only bootstrap produces these.
#[derive(Debug, Error)]
pub enum PlacementError {
    #[error("failed to create anchor {path}: {source}")]
    Anchor {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("topology unavailable: {0}")]
    Topology(#[from] TopologyError),

    #[error("initial placement failed: {0}")]
    InitialPlacement(#[from] RelocationError),

    #[error("resolved owner {0} has no endpoint in the snapshot")]
    MissingEndpoint(NodeId),
}
