//! Relocation sequencer: moves the workload from one node to another.
//!
//! The sequence is remove-old, create-new, start-new, verify. It is not
//! transactional: once the old instance is removed nothing brings it back,
//! and the workload stays unplaced until a later relocation succeeds.
//!
//! | Step   | On failure                                              |
//! |--------|---------------------------------------------------------|
//! | remove | logged, sequence continues (the instance may be gone)   |
//! | create | relocation fails; an empty instance id counts as failure |
//! | start  | created instance removed best-effort, relocation fails  |
//! | verify | logged only                                             |
//!
//! Instance names are fixed per workload, so a leftover instance from an
//! earlier run (or an old removal that failed) makes the runtime refuse the
//! create with a conflict. The leftover is force-removed by name and the
//! create retried once.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use mantle_core::{NodeEndpoint, PathKey};
use mantle_runtime::{RuntimeError, RuntimeResult, WorkloadRuntime, WorkloadSpec};

use crate::error::{RelocationError, RelocationStep};
use crate::record::PlacementRecord;

const NAME_CONFLICT: u16 = 409;

pub struct RelocationSequencer<R> {
    runtime: Arc<R>,
}

impl<R: WorkloadRuntime> RelocationSequencer<R> {
    pub fn new(runtime: Arc<R>) -> Self {
        Self { runtime }
    }

    /// Relocate the workload for `path` to `target`.
    ///
    /// `old` is the current placement, if any. Returns the new instance id.
    pub async fn relocate(
        &self,
        old: Option<&PlacementRecord>,
        target: &NodeEndpoint,
        spec: &WorkloadSpec,
        path: &PathKey,
    ) -> Result<String, RelocationError> {
        let previous_removed = match old {
            Some(old) => self.remove_old(old, path).await,
            None => true,
        };

        let instance_id = match self.create(target, spec, path).await {
            Ok(id) if !id.trim().is_empty() => id,
            Ok(_) => {
                error!(
                    step = %RelocationStep::Create,
                    node = %target.id,
                    %path,
                    "runtime returned no instance id"
                );
                return Err(RelocationError::new(
                    RelocationStep::Create,
                    &target.id,
                    "runtime returned no instance id",
                )
                .with_previous_removed(previous_removed));
            }
            Err(e) => {
                error!(step = %RelocationStep::Create, node = %target.id, %path, error = %e, "create failed");
                return Err(RelocationError::runtime(RelocationStep::Create, &target.id, e)
                    .with_previous_removed(previous_removed));
            }
        };
        info!(node = %target.id, instance = %instance_id, %path, "instance created");

        if let Err(e) = self.runtime.start_instance(target, &instance_id).await {
            error!(
                step = %RelocationStep::Start,
                node = %target.id,
                instance = %instance_id,
                %path,
                error = %e,
                "start failed, discarding created instance"
            );
            if let Err(cleanup) = self.runtime.remove_instance(target, &instance_id, true).await {
                warn!(node = %target.id, instance = %instance_id, error = %cleanup, "cleanup of unstarted instance failed");
            }
            return Err(RelocationError::runtime(RelocationStep::Start, &target.id, e)
                .with_previous_removed(previous_removed));
        }
        info!(node = %target.id, instance = %instance_id, %path, "instance started");

        self.verify(target, &instance_id, path).await;
        Ok(instance_id)
    }

    /// Create the instance, clearing a leftover with the same name once.
    async fn create(
        &self,
        target: &NodeEndpoint,
        spec: &WorkloadSpec,
        path: &PathKey,
    ) -> RuntimeResult<String> {
        match self.runtime.create_instance(target, spec).await {
            Err(RuntimeError::Status { status, message, .. }) if status == NAME_CONFLICT => {
                warn!(
                    node = %target.id,
                    name = %spec.name,
                    %path,
                    %message,
                    "instance name already in use, removing leftover instance"
                );
                if let Err(e) = self.runtime.remove_instance(target, &spec.name, true).await {
                    warn!(node = %target.id, name = %spec.name, error = %e, "removing leftover instance failed");
                }
                self.runtime.create_instance(target, spec).await
            }
            other => other,
        }
    }

    /// Best-effort removal of the previous instance. Returns whether it
    /// is known to be gone.
    async fn remove_old(&self, old: &PlacementRecord, path: &PathKey) -> bool {
        let node = old.owner_endpoint();
        match self
            .runtime
            .remove_instance(&node, &old.workload_instance_id, true)
            .await
        {
            Ok(()) => {
                info!(
                    node = %node.id,
                    instance = %old.workload_instance_id,
                    %path,
                    "old instance removed"
                );
                true
            }
            Err(e) => {
                warn!(
                    step = %RelocationStep::Remove,
                    node = %node.id,
                    instance = %old.workload_instance_id,
                    %path,
                    error = %e,
                    "removing old instance failed, continuing"
                );
                false
            }
        }
    }

    /// List instances on the new node. Observability only.
    async fn verify(&self, target: &NodeEndpoint, instance_id: &str, path: &PathKey) {
        match self.runtime.list_instances(target).await {
            Ok(instances) => {
                let present = instances.iter().any(|i| i.id == instance_id);
                if present {
                    debug!(node = %target.id, running = instances.len(), %path, "new instance listed");
                } else {
                    warn!(
                        step = %RelocationStep::Verify,
                        node = %target.id,
                        instance = %instance_id,
                        %path,
                        "new instance missing from listing"
                    );
                }
            }
            Err(e) => warn!(
                step = %RelocationStep::Verify,
                node = %target.id,
                %path,
                error = %e,
                "listing instances failed"
            ),
        }
    }
}
