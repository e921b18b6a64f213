//! Topology snapshot builder.
//!
//! One build is one round of queries: a cluster status call, then one admin
//! query per live node. Node queries run concurrently (bounded by a
//! semaphore) and are joined before the snapshot is returned. A failed or
//! malformed node report counts as "claims nothing"; only a failed status
//! call fails the build.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use mantle_core::{NodeEndpoint, PathKey, SubtreeClaim, TopologySnapshot};

use crate::admin::{ClusterAdmin, ReportedSubtree};
use crate::error::{TopologyError, TopologyResult};

/// Builds a fresh [`TopologySnapshot`] per poll.
pub struct SnapshotBuilder<A> {
    admin: Arc<A>,
    max_concurrent_queries: usize,
}

impl<A: ClusterAdmin + 'static> SnapshotBuilder<A> {
    /// Create a builder with the default query concurrency of 8.
    pub fn new(admin: Arc<A>) -> Self {
        Self {
            admin,
            max_concurrent_queries: 8,
        }
    }

    /// Cap the number of in-flight node queries. Values below 1 are raised to 1.
    pub fn with_max_concurrent_queries(mut self, limit: usize) -> Self {
        self.max_concurrent_queries = limit.max(1);
        self
    }

    /// Query the cluster and assemble a snapshot stamped with `tick`.
    pub async fn build(&self, tick: u64) -> TopologyResult<TopologySnapshot> {
        let nodes = self.admin.cluster_status().await?;
        if nodes.is_empty() {
            return Err(TopologyError::NoLiveNodes);
        }

        let reports = self.query_all(&nodes).await;

        let mut claims = Vec::new();
        let mut failed = 0usize;
        for (node, report) in nodes.iter().zip(reports) {
            match report {
                Some(subtrees) => {
                    debug!(node = %node.id, subtrees = subtrees.len(), "node reported subtrees");
                    claims.extend(subtrees.into_iter().map(|s| SubtreeClaim {
                        owner: node.id.clone(),
                        root: PathKey::parse(&s.path),
                        is_authoritative: s.is_authoritative,
                    }));
                }
                None => failed += 1,
            }
        }

        if failed > 0 {
            warn!(
                tick,
                nodes = nodes.len(),
                failed,
                "partial topology, resolution confidence reduced"
            );
        }

        let snapshot = TopologySnapshot::new(tick, nodes, claims)?;
        info!(
            tick,
            nodes = snapshot.node_count(),
            claims = snapshot.claims().len(),
            "topology snapshot built"
        );
        Ok(snapshot)
    }

    /// Query every node, returning reports in `nodes` order.
    ///
    /// `None` marks a node whose query failed or whose output was malformed.
    async fn query_all(&self, nodes: &[NodeEndpoint]) -> Vec<Option<Vec<ReportedSubtree>>> {
        let permits = Arc::new(Semaphore::new(self.max_concurrent_queries));
        let mut tasks = JoinSet::new();

        for (idx, node) in nodes.iter().cloned().enumerate() {
            let admin = self.admin.clone();
            let permits = permits.clone();
            tasks.spawn(async move {
                // The semaphore is never closed, so acquire only fails if it is.
                let _permit = permits.acquire_owned().await.ok();
                let result = admin.query_node_claims(&node).await;
                (idx, node, result)
            });
        }

        let mut reports = vec![None; nodes.len()];
        while let Some(joined) = tasks.join_next().await {
            let (idx, node, result) = match joined {
                Ok(done) => done,
                Err(e) => {
                    warn!(error = %e, "node query task failed");
                    continue;
                }
            };
            match result {
                Ok(subtrees) => reports[idx] = Some(subtrees),
                Err(TopologyError::MalformedSubtrees { reason, .. }) => {
                    warn!(node = %node.id, %reason, "malformed subtree report, treating as no claims");
                }
                Err(e) => {
                    warn!(node = %node.id, error = %e, "node query failed, treating as no claims");
                }
            }
        }

        reports
    }
}
