//! mantle-cluster: cluster topology for Mantle.
//!
//! Turns one round of cluster queries into an immutable
//! [`mantle_core::TopologySnapshot`].
//!
//! # Architecture
//!
//! ```text
//! SnapshotBuilder
//!   └── ClusterAdmin (trait, injected)
//!       ├── cluster_status()      → live NodeEndpoints
//!       └── query_node_claims(n)  → ReportedSubtrees, one call per node
//!
//! CephCli: ClusterAdmin
//!   ├── `ceph mds stat --format json`
//!   └── `[remote_shell... addr] ceph daemon mds.<name> get subtrees`
//! ```

pub mod admin;
pub mod ceph;
pub mod error;
pub mod snapshot;

pub use admin::{AdminFuture, ClusterAdmin, ReportedSubtree};
pub use ceph::CephCli;
pub use error::{TopologyError, TopologyResult};
pub use snapshot::SnapshotBuilder;
