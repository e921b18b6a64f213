//! Placement controller: keeps the workload on the node that owns the
//! tracked path.
//!
//! # Phases
//!
//! ```text
//! Bootstrapping → Steady ⇄ Relocating → Steady … → Cancelled
//!                      ↘ Unplaced   (relocation failed after the old instance
//!                                    was removed, or the first placement failed)
//!                      ↘ Displaced  (relocation failed and the old instance
//!                                    could not be removed, so it may still run)
//! ```
//!
//! Each tick builds a fresh topology snapshot and resolves the tracked
//! path. A tick whose owner matches the current placement makes no runtime
//! calls. A changed owner drives the relocation sequencer; the placement
//! record is replaced only when that succeeds.
//!
//! Cancellation is checked between ticks only. A relocation that has
//! started always runs to completion.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use mantle_cluster::{ClusterAdmin, SnapshotBuilder};
use mantle_core::{NodeId, PathKey, Resolution, TopologySnapshot, resolve};
use mantle_runtime::{WorkloadRuntime, WorkloadSpec};

use crate::anchor::NamespaceAnchor;
use crate::backoff::RelocationBackoff;
use crate::error::{PlacementError, PlacementResult, RelocationStep};
use crate::record::PlacementRecord;
use crate::sequencer::RelocationSequencer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Bootstrapping,
    Steady,
    Relocating,
    /// No instance is known to be running for the tracked path.
    Unplaced,
    /// The last relocation failed, but the previous instance may still be
    /// running on a node that no longer owns the path.
    Displaced,
    Cancelled,
}

/// Observable controller state, published after every transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ControllerStatus {
    pub phase: Phase,
    pub placement: Option<PlacementRecord>,
    pub consecutive_failures: u32,
    pub last_tick: u64,
}

/// What a single tick did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// No usable snapshot; nothing was resolved or changed.
    Skipped,
    /// Placement already matches authority.
    Steady,
    /// A relocation towards `target` is held back by backoff.
    BackingOff { target: NodeId, remaining: u32 },
    Relocated { from: Option<NodeId>, to: NodeId },
    RelocationFailed { step: RelocationStep, target: NodeId },
}

pub struct PlacementController<A, R> {
    topology: SnapshotBuilder<A>,
    sequencer: RelocationSequencer<R>,
    anchor: Arc<dyn NamespaceAnchor>,
    tracked: PathKey,
    spec: WorkloadSpec,
    record: Option<PlacementRecord>,
    /// Set when a relocation failed after the recorded instance was
    /// removed; the record then names an instance that no longer runs.
    unplaced: bool,
    backoff: RelocationBackoff,
    interval: Duration,
    tick: u64,
    status: watch::Sender<ControllerStatus>,
}

impl<A, R> PlacementController<A, R>
where
    A: ClusterAdmin + 'static,
    R: WorkloadRuntime,
{
    pub fn new(
        topology: SnapshotBuilder<A>,
        runtime: Arc<R>,
        anchor: Arc<dyn NamespaceAnchor>,
        tracked: PathKey,
        spec: WorkloadSpec,
    ) -> Self {
        let (status, _) = watch::channel(ControllerStatus {
            phase: Phase::Bootstrapping,
            placement: None,
            consecutive_failures: 0,
            last_tick: 0,
        });
        Self {
            topology,
            sequencer: RelocationSequencer::new(runtime),
            anchor,
            tracked,
            spec,
            record: None,
            unplaced: false,
            backoff: RelocationBackoff::new(32),
            interval: Duration::from_secs(1),
            tick: 0,
            status,
        }
    }

    /// Set the pause between ticks.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Cap the number of ticks skipped after repeated failures.
    pub fn with_max_backoff_ticks(mut self, max: u32) -> Self {
        self.backoff = RelocationBackoff::new(max);
        self
    }

    pub fn subscribe(&self) -> watch::Receiver<ControllerStatus> {
        self.status.subscribe()
    }

    pub fn status(&self) -> ControllerStatus {
        self.status.borrow().clone()
    }

    pub fn record(&self) -> Option<&PlacementRecord> {
        self.record.as_ref()
    }

    pub fn is_unplaced(&self) -> bool {
        self.unplaced
    }

    /// Create the anchor and place the workload for the first time.
    ///
    /// An unreachable cluster, a failed anchor, or a create step that
    /// yields no instance id are fatal. Any other placement failure leaves
    /// the controller unplaced and the first tick retries it.
    pub async fn bootstrap(&mut self) -> PlacementResult<()> {
        self.set_phase(Phase::Bootstrapping);
        info!(path = %self.tracked, workload = %self.spec.name, "bootstrapping placement");

        self.anchor
            .create_directory(&self.tracked)
            .await
            .map_err(|source| PlacementError::Anchor {
                path: self.tracked.to_string(),
                source,
            })?;

        self.tick += 1;
        let snapshot = self.topology.build(self.tick).await?;
        let resolution = self.resolve(&snapshot);
        let target = snapshot
            .endpoint(&resolution.owner)
            .cloned()
            .ok_or_else(|| PlacementError::MissingEndpoint(resolution.owner.clone()))?;

        match self
            .sequencer
            .relocate(None, &target, &self.spec, &self.tracked)
            .await
        {
            Ok(instance_id) => {
                info!(path = %self.tracked, node = %target.id, instance = %instance_id, "initial placement done");
                self.place(&target.id, &target.address, instance_id);
                Ok(())
            }
            Err(e) if e.step == RelocationStep::Create => Err(PlacementError::InitialPlacement(e)),
            Err(e) => {
                warn!(
                    path = %self.tracked,
                    node = %e.node,
                    step = %e.step,
                    error = %e,
                    "initial placement failed, will retry on next tick"
                );
                self.backoff.record_failure(&target.id);
                self.unplaced = true;
                self.set_phase(Phase::Unplaced);
                Ok(())
            }
        }
    }

    /// Run one tick: snapshot, resolve, relocate if authority moved.
    pub async fn tick(&mut self) -> TickOutcome {
        self.tick += 1;
        let tick = self.tick;

        let snapshot = match self.topology.build(tick).await {
            Ok(s) => s,
            Err(e) => {
                warn!(tick, path = %self.tracked, error = %e, "no usable snapshot, skipping tick");
                self.publish();
                return TickOutcome::Skipped;
            }
        };

        let resolution = self.resolve(&snapshot);
        let in_place = match &self.record {
            Some(record) => !self.unplaced && record.owner_node == resolution.owner,
            None => false,
        };
        if in_place {
            debug!(tick, path = %self.tracked, node = %resolution.owner, "placement matches authority");
            self.set_phase(Phase::Steady);
            return TickOutcome::Steady;
        }

        let Some(target) = snapshot.endpoint(&resolution.owner).cloned() else {
            // Snapshots only admit claims from known nodes.
            warn!(tick, node = %resolution.owner, "resolved owner missing from snapshot, skipping tick");
            self.publish();
            return TickOutcome::Skipped;
        };

        if let Err(remaining) = self.backoff.check(&target.id) {
            info!(
                tick,
                path = %self.tracked,
                node = %target.id,
                remaining,
                "relocation backing off"
            );
            self.publish();
            return TickOutcome::BackingOff {
                target: target.id,
                remaining,
            };
        }

        let from = self.record.as_ref().map(|r| r.owner_node.clone());
        info!(
            tick,
            path = %self.tracked,
            from = from.as_ref().map(NodeId::as_str).unwrap_or("<none>"),
            to = %target.id,
            "authority moved, relocating workload"
        );
        self.set_phase(Phase::Relocating);

        match self
            .sequencer
            .relocate(self.record.as_ref(), &target, &self.spec, &self.tracked)
            .await
        {
            Ok(instance_id) => {
                self.backoff.record_success();
                self.place(&target.id, &target.address, instance_id);
                TickOutcome::Relocated {
                    from,
                    to: target.id,
                }
            }
            Err(e) => {
                error!(
                    tick,
                    path = %self.tracked,
                    step = %e.step,
                    from = from.as_ref().map(NodeId::as_str).unwrap_or("<none>"),
                    to = %target.id,
                    error = %e,
                    "relocation failed, keeping previous placement record"
                );
                self.backoff.record_failure(&target.id);
                // Once the recorded instance is gone it stays gone.
                self.unplaced = self.unplaced || e.previous_removed;
                let phase = if self.unplaced {
                    Phase::Unplaced
                } else {
                    Phase::Displaced
                };
                self.set_phase(phase);
                TickOutcome::RelocationFailed {
                    step: e.step,
                    target: target.id,
                }
            }
        }
    }

    /// Tick until `shutdown` flips to true (or its sender is dropped).
    ///
    /// The flag is read at the top of every tick; the pause between ticks
    /// wakes early on a change so the next check happens promptly.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) {
        info!(path = %self.tracked, interval = ?self.interval, "placement controller started");

        loop {
            if *shutdown.borrow_and_update() {
                break;
            }

            self.tick().await;

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        debug!("shutdown channel closed");
                        break;
                    }
                }
            }
        }

        self.set_phase(Phase::Cancelled);
        info!(path = %self.tracked, ticks = self.tick, "placement controller stopped");
    }

    fn resolve(&self, snapshot: &TopologySnapshot) -> Resolution {
        let resolution = resolve(snapshot, &self.tracked);
        if resolution.is_low_confidence() {
            warn!(
                tick = snapshot.observed_at(),
                path = %self.tracked,
                node = %resolution.owner,
                "no claim covers tracked path, using fallback node"
            );
        }
        resolution
    }

    fn place(&mut self, node: &NodeId, address: &str, instance_id: String) {
        self.record = Some(PlacementRecord {
            tracked_path: self.tracked.clone(),
            owner_node: node.clone(),
            owner_address: address.to_string(),
            workload_instance_id: instance_id,
        });
        self.unplaced = false;
        self.set_phase(Phase::Steady);
    }

    fn set_phase(&self, phase: Phase) {
        self.status.send_modify(|s| s.phase = phase);
        self.publish();
    }

    fn publish(&self) {
        let placement = self.record.clone();
        let failures = self.backoff.consecutive_failures();
        let tick = self.tick;
        self.status.send_modify(|s| {
            s.placement = placement;
            s.consecutive_failures = failures;
            s.last_tick = tick;
        });
    }
}
