//! Identifiers and claims shared by every Mantle crate.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque identifier for a metadata cluster node.
///
/// Stable for the node's lifetime within a cluster epoch. Ordering is
/// lexicographic and is used for the resolver's fallback enumeration.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A namespace path held as its ordered components.
///
/// Prefix relationships are component-wise, so `/foo` is never treated as
/// an ancestor of `/foobar`. Empty components are dropped on parse, which
/// makes `"/a//b/"`, `"a/b"` and `"/a/b"` the same key. The root is the
/// empty sequence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PathKey {
    components: Vec<String>,
}

impl PathKey {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn parse(raw: &str) -> Self {
        Self {
            components: raw
                .split('/')
                .filter(|c| !c.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }

    pub fn components(&self) -> &[String] {
        &self.components
    }

    /// Number of components; the root has depth 0.
    pub fn depth(&self) -> usize {
        self.components.len()
    }

    pub fn is_root(&self) -> bool {
        self.components.is_empty()
    }

    /// True when `self` is `other` or one of its ancestors.
    pub fn is_prefix_of(&self, other: &PathKey) -> bool {
        self.depth() <= other.depth()
            && self
                .components
                .iter()
                .zip(&other.components)
                .all(|(a, b)| a == b)
    }

    /// True when `self` is an ancestor of `other` and not equal to it.
    ///
    /// A candidate longer than the target is never an ancestor, whatever
    /// its leading components.
    pub fn is_strict_ancestor_of(&self, other: &PathKey) -> bool {
        self.depth() < other.depth() && self.is_prefix_of(other)
    }
}

impl fmt::Display for PathKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.components.is_empty() {
            return f.write_str("/");
        }
        for c in &self.components {
            write!(f, "/{c}")?;
        }
        Ok(())
    }
}

impl From<&str> for PathKey {
    fn from(raw: &str) -> Self {
        Self::parse(raw)
    }
}

/// One subtree entry reported by a node.
///
/// Only claims with `is_authoritative` set take part in resolution;
/// the rest are replica or cached views.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtreeClaim {
    pub owner: NodeId,
    pub root: PathKey,
    pub is_authoritative: bool,
}

impl SubtreeClaim {
    pub fn new(owner: impl Into<NodeId>, root: impl Into<PathKey>, is_authoritative: bool) -> Self {
        Self {
            owner: owner.into(),
            root: root.into(),
            is_authoritative,
        }
    }
}

/// A live node and the host it can be reached at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeEndpoint {
    pub id: NodeId,
    /// Host part of the node's advertised address (no port).
    pub address: String,
}

impl NodeEndpoint {
    pub fn new(id: impl Into<NodeId>, address: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            address: address.into(),
        }
    }
}
