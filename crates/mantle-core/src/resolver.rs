//! Authority resolution: maps a path to the node that owns it.
//!
//! A path belongs to the deepest authoritative subtree claim covering it:
//!
//! 1. An authoritative claim whose root equals the target wins outright.
//! 2. Otherwise the authoritative claim with the deepest root that is a
//!    strict ancestor of the target wins.
//! 3. Otherwise the lowest node id in the snapshot is returned as a
//!    low-confidence guess.
//!
//! Duplicate exact matches and equal-depth ancestors should not occur in a
//! healthy cluster; when they do, the claim reported last wins.

use std::fmt;

use tracing::debug;

use crate::topology::TopologySnapshot;
use crate::types::{NodeId, PathKey};

/// How a [`Resolution`] was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionBasis {
    /// A claim's root is the target itself.
    Exact,
    /// A claim's root is an ancestor of the target, `depth` components deep.
    Ancestor { depth: usize },
    /// Nothing covered the target; the owner is the first known node.
    Fallback,
}

impl fmt::Display for ResolutionBasis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact => f.write_str("exact"),
            Self::Ancestor { depth } => write!(f, "ancestor(depth={depth})"),
            Self::Fallback => f.write_str("fallback"),
        }
    }
}

/// Result of resolving a path against a snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub owner: NodeId,
    pub basis: ResolutionBasis,
}

impl Resolution {
    /// Fallback results are a guess and may be corrected by a later tick.
    pub fn is_low_confidence(&self) -> bool {
        self.basis == ResolutionBasis::Fallback
    }
}

/// Resolve the owner of `target`. Pure and total.
pub fn resolve(snapshot: &TopologySnapshot, target: &PathKey) -> Resolution {
    let mut exact: Option<&NodeId> = None;
    let mut ancestor: Option<(&NodeId, usize)> = None;

    for claim in snapshot.authoritative_claims() {
        if claim.root == *target {
            exact = Some(&claim.owner);
        } else if claim.root.is_strict_ancestor_of(target) {
            let depth = claim.root.depth();
            // `>=` so the later of two equal-depth claims wins.
            if ancestor.is_none_or(|(_, best)| depth >= best) {
                ancestor = Some((&claim.owner, depth));
            }
        }
    }

    let resolution = if let Some(owner) = exact {
        Resolution {
            owner: owner.clone(),
            basis: ResolutionBasis::Exact,
        }
    } else if let Some((owner, depth)) = ancestor {
        Resolution {
            owner: owner.clone(),
            basis: ResolutionBasis::Ancestor { depth },
        }
    } else {
        Resolution {
            owner: snapshot.first_node().clone(),
            basis: ResolutionBasis::Fallback,
        }
    };

    debug!(
        path = %target,
        owner = %resolution.owner,
        basis = %resolution.basis,
        tick = snapshot.observed_at(),
        "resolved authority"
    );
    resolution
}
