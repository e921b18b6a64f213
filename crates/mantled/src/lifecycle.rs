//! Daemon lifecycle: wiring, bootstrap, signal-driven shutdown.

use std::sync::Arc;

use anyhow::Context;
use tokio::sync::watch;
use tracing::{error, info};

use mantle_cluster::{CephCli, ClusterAdmin, SnapshotBuilder};
use mantle_core::MantleConfig;
use mantle_placement::{
    ControllerStatus, MountedNamespace, PlacementController, PlacementResult,
};
use mantle_runtime::{DockerRuntime, WorkloadRuntime, WorkloadSpec};

use crate::loadgen::LoadGenerator;

/// Build the production controller and run it until a signal arrives.
///
/// With `once` set, or `controller.poll = false`, the daemon exits after
/// the initial placement. Returns the final controller status.
pub async fn run(config: MantleConfig, once: bool) -> anyhow::Result<ControllerStatus> {
    config.validate().context("invalid configuration")?;

    let tracked = config.tracked_path();
    let interval = config.poll_interval()?;

    let admin = Arc::new(
        CephCli::new(config.cluster.ceph_bin.clone())
            .with_remote_shell(config.cluster.remote_shell.clone()),
    );
    let topology = SnapshotBuilder::new(admin)
        .with_max_concurrent_queries(config.cluster.max_concurrent_queries);
    let runtime = Arc::new(DockerRuntime::new(config.runtime.port));
    let namespace = Arc::new(MountedNamespace::new(config.tracking.mount.clone()));

    let controller = PlacementController::new(
        topology,
        runtime,
        namespace.clone(),
        tracked.clone(),
        WorkloadSpec::from(&config.workload),
    )
    .with_interval(interval)
    .with_max_backoff_ticks(config.controller.max_backoff_ticks);

    let loadgen = if config.loadgen.enabled {
        Some(LoadGenerator::new(
            namespace.local_path(&tracked),
            config.loadgen.mode,
            config.loadgen_interval()?,
        ))
    } else {
        None
    };

    info!(
        path = %tracked,
        mount = %namespace.mount().display(),
        workload = %config.workload.name,
        runtime_port = config.runtime.port,
        "mantle daemon starting"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let signals = tokio::spawn(async move {
        shutdown_signal().await;
        info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    let single_shot = once || !config.controller.poll;
    let result = supervise(controller, loadgen, single_shot, shutdown_rx).await;
    signals.abort();

    let status = result.context("placement bootstrap failed")?;
    info!(phase = ?status.phase, "mantle daemon stopped");
    Ok(status)
}

/// Bootstrap the controller, then run it and the load generator until
/// `shutdown` flips. Both tasks are finished when this returns.
pub async fn supervise<A, R>(
    mut controller: PlacementController<A, R>,
    loadgen: Option<LoadGenerator>,
    once: bool,
    shutdown: watch::Receiver<bool>,
) -> PlacementResult<ControllerStatus>
where
    A: ClusterAdmin + 'static,
    R: WorkloadRuntime,
{
    controller.bootstrap().await?;

    if once {
        info!("single-shot mode, skipping control loop");
        return Ok(controller.status());
    }

    let loadgen = loadgen.map(|load| tokio::spawn(load.run(shutdown.clone())));

    controller.run(shutdown).await;

    if let Some(handle) = loadgen {
        if let Err(e) = handle.await {
            error!(error = %e, "load generator task failed");
        }
    }

    Ok(controller.status())
}

/// Resolves on Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "unable to install ctrl-c handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "unable to install sigterm handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
