//! End-to-end controller scenarios against Ceph-shaped admin output.
//!
//! The cluster is scripted as raw `ceph mds stat` / `get subtrees` JSON and
//! goes through the real parsers; the runtime is an in-memory recorder.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::json;
use tokio::sync::watch;

use mantle_cluster::ceph::{parse_mds_stat, parse_subtrees};
use mantle_cluster::{AdminFuture, ClusterAdmin, ReportedSubtree, SnapshotBuilder, TopologyError};
use mantle_core::{LoadgenMode, NodeEndpoint, PathKey};
use mantle_placement::{
    ControllerStatus, MountedNamespace, Phase, PlacementController, PlacementError,
};
use mantle_runtime::{
    InstanceSummary, RuntimeError, RuntimeFuture, WorkloadRuntime, WorkloadSpec,
};
use mantled::lifecycle::supervise;
use mantled::loadgen::LoadGenerator;

// ── Cluster fixture ────────────────────────────────────────────

fn mds_stat(active: &[(&str, &str)]) -> String {
    let ranks: Vec<usize> = (0..active.len()).collect();
    let mut up = serde_json::Map::new();
    let mut info = serde_json::Map::new();
    for (rank, (name, addr)) in active.iter().enumerate() {
        let gid = 4100 + rank;
        up.insert(format!("mds_{rank}"), json!(gid));
        info.insert(
            format!("gid_{gid}"),
            json!({"gid": gid, "name": name, "rank": rank, "state": "up:active", "addr": addr}),
        );
    }
    json!({
        "fsmap": {
            "epoch": 12,
            "filesystems": [{
                "mdsmap": {"fs_name": "cephfs", "in": ranks, "up": up, "info": info}
            }]
        }
    })
    .to_string()
}

fn subtrees(entries: &[(&str, bool)]) -> String {
    let list: Vec<_> = entries
        .iter()
        .map(|(path, auth)| json!({"is_auth": auth, "auth_first": 0, "dir": {"path": path}}))
        .collect();
    serde_json::Value::Array(list).to_string()
}

struct CephFixture {
    status: Mutex<Option<String>>,
    subtrees: Mutex<HashMap<String, String>>,
}

impl CephFixture {
    fn new(active: &[(&str, &str)]) -> Self {
        Self {
            status: Mutex::new(Some(mds_stat(active))),
            subtrees: Mutex::new(HashMap::new()),
        }
    }

    fn set_status(&self, active: &[(&str, &str)]) {
        *self.status.lock().unwrap() = Some(mds_stat(active));
    }

    fn set_unreachable(&self) {
        *self.status.lock().unwrap() = None;
    }

    fn set_subtrees(&self, node: &str, entries: &[(&str, bool)]) {
        self.subtrees
            .lock()
            .unwrap()
            .insert(node.to_string(), subtrees(entries));
    }
}

impl ClusterAdmin for CephFixture {
    fn cluster_status(&self) -> AdminFuture<'_, Vec<NodeEndpoint>> {
        let raw = self.status.lock().unwrap().clone();
        Box::pin(async move {
            match raw {
                Some(raw) => parse_mds_stat(raw.as_bytes()),
                None => Err(TopologyError::ClusterUnreachable(
                    "monclient: hunting for new mon".to_string(),
                )),
            }
        })
    }

    fn query_node_claims<'a>(
        &'a self,
        node: &'a NodeEndpoint,
    ) -> AdminFuture<'a, Vec<ReportedSubtree>> {
        let raw = self
            .subtrees
            .lock()
            .unwrap()
            .get(node.id.as_str())
            .cloned()
            .unwrap_or_else(|| "[]".to_string());
        Box::pin(async move { parse_subtrees(node.id.as_str(), raw.as_bytes()) })
    }
}

// ── Runtime recorder ───────────────────────────────────────────

#[derive(Default)]
struct RecordingRuntime {
    calls: Mutex<Vec<String>>,
    no_id_on: Mutex<HashSet<String>>,
    /// node id → name of a container left over from an earlier run.
    leftover: Mutex<HashMap<String, String>>,
    next_id: AtomicUsize,
}

impl RecordingRuntime {
    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

impl WorkloadRuntime for RecordingRuntime {
    fn list_instances<'a>(
        &'a self,
        node: &'a NodeEndpoint,
    ) -> RuntimeFuture<'a, Vec<InstanceSummary>> {
        Box::pin(async move {
            self.record(format!("list {}", node.address));
            Ok(Vec::new())
        })
    }

    fn create_instance<'a>(
        &'a self,
        node: &'a NodeEndpoint,
        spec: &'a WorkloadSpec,
    ) -> RuntimeFuture<'a, String> {
        Box::pin(async move {
            self.record(format!("create {} {}", node.address, spec.name));
            if self.leftover.lock().unwrap().get(node.id.as_str()) == Some(&spec.name) {
                return Err(RuntimeError::Status {
                    node: node.id.to_string(),
                    status: 409,
                    message: format!(
                        "Conflict. The container name \"/{}\" is already in use",
                        spec.name
                    ),
                });
            }
            if self.no_id_on.lock().unwrap().contains(node.id.as_str()) {
                return Ok(String::new());
            }
            let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(format!("c{n}"))
        })
    }

    fn start_instance<'a>(&'a self, node: &'a NodeEndpoint, id: &'a str) -> RuntimeFuture<'a, ()> {
        Box::pin(async move {
            self.record(format!("start {} {id}", node.address));
            Ok(())
        })
    }

    fn remove_instance<'a>(
        &'a self,
        node: &'a NodeEndpoint,
        id: &'a str,
        force: bool,
    ) -> RuntimeFuture<'a, ()> {
        Box::pin(async move {
            self.record(format!("remove {} {id} force={force}", node.address));
            let mut leftover = self.leftover.lock().unwrap();
            if leftover.get(node.id.as_str()).is_some_and(|name| name == id) {
                leftover.remove(node.id.as_str());
            }
            Ok(())
        })
    }
}

// ── Harness ────────────────────────────────────────────────────

const A: (&str, &str) = ("a", "v2:10.0.0.1:6800/100");
const B: (&str, &str) = ("b", "v2:10.0.0.2:6800/200");

struct Harness {
    ceph: Arc<CephFixture>,
    runtime: Arc<RecordingRuntime>,
    mount: tempfile::TempDir,
}

impl Harness {
    fn new() -> Self {
        Self {
            ceph: Arc::new(CephFixture::new(&[A, B])),
            runtime: Arc::new(RecordingRuntime::default()),
            mount: tempfile::tempdir().unwrap(),
        }
    }

    fn controller(&self) -> PlacementController<CephFixture, RecordingRuntime> {
        PlacementController::new(
            SnapshotBuilder::new(self.ceph.clone()),
            self.runtime.clone(),
            Arc::new(MountedNamespace::new(self.mount.path())),
            PathKey::parse("/data"),
            WorkloadSpec::new("db", "postgres:16"),
        )
        .with_interval(Duration::from_millis(10))
    }
}

async fn wait_for(
    rx: &mut watch::Receiver<ControllerStatus>,
    what: &str,
    pred: impl FnMut(&ControllerStatus) -> bool,
) {
    tokio::time::timeout(Duration::from_secs(5), rx.wait_for(pred))
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {what}"))
        .unwrap();
}

fn owner(status: &ControllerStatus) -> Option<&str> {
    status.placement.as_ref().map(|p| p.owner_node.as_str())
}

// ── Scenarios ──────────────────────────────────────────────────

#[tokio::test]
async fn once_mode_places_on_authoritative_node() {
    let h = Harness::new();
    h.ceph.set_subtrees("a", &[("", true), ("/data", false)]);
    h.ceph.set_subtrees("b", &[("/data", true)]);
    let (_tx, rx) = watch::channel(false);

    let status = supervise(h.controller(), None, true, rx).await.unwrap();

    assert_eq!(status.phase, Phase::Steady);
    let placement = status.placement.unwrap();
    assert_eq!(placement.owner_node.as_str(), "b");
    assert_eq!(placement.owner_address, "10.0.0.2");
    assert_eq!(placement.workload_instance_id, "c1");
    assert!(h.mount.path().join("data").is_dir());
    assert_eq!(
        h.runtime.calls(),
        vec!["create 10.0.0.2 db", "start 10.0.0.2 c1", "list 10.0.0.2"]
    );
}

#[tokio::test]
async fn restart_with_leftover_container_still_places() {
    let h = Harness::new();
    h.ceph.set_subtrees("a", &[("/data", true)]);
    h.runtime
        .leftover
        .lock()
        .unwrap()
        .insert("a".to_string(), "db".to_string());
    let (_tx, rx) = watch::channel(false);

    let status = supervise(h.controller(), None, true, rx).await.unwrap();

    assert_eq!(status.phase, Phase::Steady);
    assert_eq!(owner(&status), Some("a"));
    assert_eq!(
        h.runtime.calls(),
        vec![
            "create 10.0.0.1 db",
            "remove 10.0.0.1 db force=true",
            "create 10.0.0.1 db",
            "start 10.0.0.1 c1",
            "list 10.0.0.1",
        ]
    );
}

#[tokio::test]
async fn unreachable_cluster_is_fatal_at_bootstrap() {
    let h = Harness::new();
    h.ceph.set_unreachable();
    let (_tx, rx) = watch::channel(false);

    let err = supervise(h.controller(), None, false, rx).await.unwrap_err();

    assert!(matches!(err, PlacementError::Topology(TopologyError::ClusterUnreachable(_))));
    assert!(h.runtime.calls().is_empty());
}

#[tokio::test]
async fn missing_instance_id_is_fatal_at_bootstrap() {
    let h = Harness::new();
    h.ceph.set_subtrees("a", &[("/data", true)]);
    h.runtime.no_id_on.lock().unwrap().insert("a".to_string());
    let (_tx, rx) = watch::channel(false);

    let err = supervise(h.controller(), None, false, rx).await.unwrap_err();
    assert!(matches!(err, PlacementError::InitialPlacement(_)));
}

#[tokio::test]
async fn follows_authority_migration_under_load() {
    let h = Harness::new();
    h.ceph.set_subtrees("a", &[("", true), ("/data", true)]);
    let controller = h.controller();
    let mut status_rx = controller.subscribe();
    let loadgen = LoadGenerator::new(
        h.mount.path().join("data"),
        LoadgenMode::CreateDelete,
        Duration::from_millis(5),
    );
    let (tx, rx) = watch::channel(false);

    let (result, ()) = tokio::join!(supervise(controller, Some(loadgen), false, rx), async {
        wait_for(&mut status_rx, "initial placement", |s| owner(s) == Some("a")).await;
        h.ceph.set_subtrees("a", &[("", true), ("/data", false)]);
        h.ceph.set_subtrees("b", &[("/data", true)]);
        wait_for(&mut status_rx, "migration to b", |s| owner(s) == Some("b")).await;
        tx.send(true).unwrap();
    });

    let status = result.unwrap();
    assert_eq!(status.phase, Phase::Cancelled);
    assert_eq!(status.placement.unwrap().workload_instance_id, "c2");
    assert_eq!(
        h.runtime.calls(),
        vec![
            "create 10.0.0.1 db",
            "start 10.0.0.1 c1",
            "list 10.0.0.1",
            "remove 10.0.0.1 c1 force=true",
            "create 10.0.0.2 db",
            "start 10.0.0.2 c2",
            "list 10.0.0.2",
        ]
    );
    // Load generator cleaned up after itself.
    assert_eq!(std::fs::read_dir(h.mount.path().join("data")).unwrap().count(), 0);
}

#[tokio::test]
async fn failover_removes_old_instance_at_recorded_address() {
    let h = Harness::new();
    h.ceph.set_subtrees("a", &[("/data", true)]);
    let controller = h.controller();
    let mut status_rx = controller.subscribe();
    let (tx, rx) = watch::channel(false);

    let (result, ()) = tokio::join!(supervise(controller, None, false, rx), async {
        wait_for(&mut status_rx, "initial placement", |s| owner(s) == Some("a")).await;
        // a fails; b takes rank 0 and everything a owned.
        h.ceph.set_status(&[B]);
        h.ceph.set_subtrees("b", &[("", true), ("/data", true)]);
        wait_for(&mut status_rx, "failover to b", |s| owner(s) == Some("b")).await;
        tx.send(true).unwrap();
    });

    result.unwrap();
    assert!(
        h.runtime
            .calls()
            .contains(&"remove 10.0.0.1 c1 force=true".to_string())
    );
}

#[tokio::test]
async fn failed_create_keeps_record_and_never_recreates_old() {
    let h = Harness::new();
    h.ceph.set_subtrees("a", &[("/data", true)]);
    let controller = h.controller();
    let mut status_rx = controller.subscribe();
    let (tx, rx) = watch::channel(false);

    let (result, ()) = tokio::join!(supervise(controller, None, false, rx), async {
        wait_for(&mut status_rx, "initial placement", |s| owner(s) == Some("a")).await;
        h.runtime.no_id_on.lock().unwrap().insert("b".to_string());
        h.ceph.set_subtrees("a", &[]);
        h.ceph.set_subtrees("b", &[("/data", true)]);
        wait_for(&mut status_rx, "failed relocation", |s| s.phase == Phase::Unplaced).await;
        tx.send(true).unwrap();
    });

    let status = result.unwrap();
    assert_eq!(owner(&status), Some("a"));
    assert!(status.consecutive_failures >= 1);
    let creates_on_a = h
        .runtime
        .calls()
        .iter()
        .filter(|c| c.starts_with("create 10.0.0.1"))
        .count();
    assert_eq!(creates_on_a, 1, "old node must not be recreated");
}

#[tokio::test]
async fn malformed_node_report_falls_back_without_relocating() {
    let h = Harness::new();
    h.ceph.set_subtrees("a", &[("/data", true)]);
    let mut controller = h.controller();
    controller.bootstrap().await.unwrap();
    let before = h.runtime.calls().len();

    // a's admin socket answers garbage; nobody else claims /data, and a
    // remains the fallback node, so placement does not move.
    h.ceph
        .subtrees
        .lock()
        .unwrap()
        .insert("a".to_string(), "admin_socket: exception".to_string());
    controller.tick().await;

    assert_eq!(h.runtime.calls().len(), before);
    assert_eq!(controller.record().unwrap().owner_node.as_str(), "a");
}

#[tokio::test]
async fn cancellation_before_first_tick_makes_no_further_calls() {
    let h = Harness::new();
    h.ceph.set_subtrees("a", &[("/data", true)]);
    let (_tx, rx) = watch::channel(true);

    let status = supervise(h.controller(), None, false, rx).await.unwrap();

    assert_eq!(status.phase, Phase::Cancelled);
    assert_eq!(h.runtime.calls().len(), 3);
}
