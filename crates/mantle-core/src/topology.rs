//! Immutable per-poll view of which node claims which subtree.

use std::collections::BTreeMap;

use crate::error::{CoreError, CoreResult};
use crate::types::{NodeEndpoint, NodeId, SubtreeClaim};

/// One poll's worth of cluster topology.
///
/// Built fresh each tick and never mutated afterwards. Claims keep the
/// order they were reported in; overlapping or duplicate claims are kept
/// as-is and left to the resolver's tie-break.
#[derive(Debug, Clone)]
pub struct TopologySnapshot {
    nodes: BTreeMap<NodeId, NodeEndpoint>,
    claims: Vec<SubtreeClaim>,
    observed_at: u64,
    /// Lowest node id, cached at construction.
    fallback: NodeId,
}

impl TopologySnapshot {
    /// Assemble a snapshot.
    ///
    /// Fails if `nodes` is empty or a claim names a node that is not in
    /// `nodes`. A later endpoint with the same id replaces an earlier one.
    pub fn new(
        observed_at: u64,
        nodes: impl IntoIterator<Item = NodeEndpoint>,
        claims: Vec<SubtreeClaim>,
    ) -> CoreResult<Self> {
        let nodes: BTreeMap<NodeId, NodeEndpoint> =
            nodes.into_iter().map(|n| (n.id.clone(), n)).collect();

        let fallback = nodes
            .keys()
            .next()
            .cloned()
            .ok_or(CoreError::EmptyTopology)?;
        if let Some(stray) = claims.iter().find(|c| !nodes.contains_key(&c.owner)) {
            return Err(CoreError::UnknownOwner {
                owner: stray.owner.to_string(),
                root: stray.root.to_string(),
            });
        }

        Ok(Self {
            nodes,
            claims,
            observed_at,
            fallback,
        })
    }

    pub fn claims(&self) -> &[SubtreeClaim] {
        &self.claims
    }

    /// Logical tick this snapshot was taken at.
    pub fn observed_at(&self) -> u64 {
        self.observed_at
    }

    /// Known node ids in sorted order.
    pub fn node_ids(&self) -> impl Iterator<Item = &NodeId> {
        self.nodes.keys()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn endpoint(&self, id: &NodeId) -> Option<&NodeEndpoint> {
        self.nodes.get(id)
    }

    /// First node in sorted id order.
    pub fn first_node(&self) -> &NodeId {
        &self.fallback
    }

    pub fn authoritative_claims(&self) -> impl Iterator<Item = &SubtreeClaim> {
        self.claims.iter().filter(|c| c.is_authoritative)
    }
}
