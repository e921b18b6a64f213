//! Scripted collaborators shared by the sequencer and controller tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use mantle_cluster::{AdminFuture, ClusterAdmin, ReportedSubtree, TopologyError};
use mantle_core::{NodeEndpoint, PathKey};
use mantle_runtime::{InstanceSummary, RuntimeError, RuntimeFuture, WorkloadRuntime, WorkloadSpec};

use crate::anchor::{AnchorFuture, NamespaceAnchor};

/// A runtime call as the scripted runtime saw it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Remove(String, String),
    Create(String),
    Start(String, String),
    List(String),
}

#[derive(Default)]
struct RuntimeState {
    calls: Vec<Call>,
    live: HashMap<String, Vec<String>>,
    created: HashMap<String, usize>,
    fail_remove: HashSet<String>,
    fail_create: HashSet<String>,
    empty_id: HashSet<String>,
    fail_start: HashSet<String>,
    fail_list: HashSet<String>,
    /// node → name of an instance left over from an earlier run.
    leftover: HashMap<String, String>,
}

/// In-memory runtime. Instance ids are `<node>-<n>`, counted per node.
#[derive(Default)]
pub struct ScriptedRuntime {
    state: Mutex<RuntimeState>,
    on_create: Mutex<Option<Box<dyn Fn() + Send + Sync>>>,
}

impl ScriptedRuntime {
    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    pub fn create_count(&self, node: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|c| matches!(c, Call::Create(n) if n == node))
            .count()
    }

    pub fn fail_remove_on(&self, node: &str) {
        self.state.lock().unwrap().fail_remove.insert(node.to_string());
    }

    pub fn fail_create_on(&self, node: &str) {
        self.state.lock().unwrap().fail_create.insert(node.to_string());
    }

    pub fn return_empty_id_on(&self, node: &str) {
        self.state.lock().unwrap().empty_id.insert(node.to_string());
    }

    pub fn fail_start_on(&self, node: &str) {
        self.state.lock().unwrap().fail_start.insert(node.to_string());
    }

    pub fn fail_list_on(&self, node: &str) {
        self.state.lock().unwrap().fail_list.insert(node.to_string());
    }

    /// Leave an instance called `name` on `node`; creates with that name
    /// conflict until it is removed.
    pub fn leave_leftover_on(&self, node: &str, name: &str) {
        self.state
            .lock()
            .unwrap()
            .leftover
            .insert(node.to_string(), name.to_string());
    }

    pub fn has_leftover_on(&self, node: &str) -> bool {
        self.state.lock().unwrap().leftover.contains_key(node)
    }

    pub fn clear_failures(&self) {
        let mut state = self.state.lock().unwrap();
        state.fail_remove.clear();
        state.fail_create.clear();
        state.empty_id.clear();
        state.fail_start.clear();
        state.fail_list.clear();
    }

    /// Run `hook` whenever a create call arrives.
    pub fn on_create(&self, hook: impl Fn() + Send + Sync + 'static) {
        *self.on_create.lock().unwrap() = Some(Box::new(hook));
    }
}

fn refused(node: &NodeEndpoint) -> RuntimeError {
    RuntimeError::Transport {
        node: node.id.to_string(),
        reason: "connection refused".to_string(),
    }
}

impl WorkloadRuntime for ScriptedRuntime {
    fn list_instances<'a>(
        &'a self,
        node: &'a NodeEndpoint,
    ) -> RuntimeFuture<'a, Vec<InstanceSummary>> {
        Box::pin(async move {
            let mut state = self.state.lock().unwrap();
            let key = node.id.to_string();
            state.calls.push(Call::List(key.clone()));
            if state.fail_list.contains(&key) {
                return Err(refused(node));
            }
            Ok(state
                .live
                .get(&key)
                .into_iter()
                .flatten()
                .map(|id| InstanceSummary {
                    id: id.clone(),
                    names: vec![format!("/{id}")],
                    image: "busybox".to_string(),
                    state: "running".to_string(),
                })
                .collect())
        })
    }

    fn create_instance<'a>(
        &'a self,
        node: &'a NodeEndpoint,
        spec: &'a WorkloadSpec,
    ) -> RuntimeFuture<'a, String> {
        Box::pin(async move {
            if let Some(hook) = self.on_create.lock().unwrap().as_ref() {
                hook();
            }
            let mut state = self.state.lock().unwrap();
            let key = node.id.to_string();
            state.calls.push(Call::Create(key.clone()));
            if state.fail_create.contains(&key) {
                return Err(RuntimeError::Status {
                    node: key,
                    status: 500,
                    message: "no space left on device".to_string(),
                });
            }
            if state.leftover.get(&key) == Some(&spec.name) {
                return Err(RuntimeError::Status {
                    node: key,
                    status: 409,
                    message: format!(
                        "Conflict. The container name \"/{}\" is already in use",
                        spec.name
                    ),
                });
            }
            if state.empty_id.contains(&key) {
                return Ok(String::new());
            }
            let n = state.created.entry(key.clone()).or_default();
            *n += 1;
            let id = format!("{key}-{n}");
            state.live.entry(key).or_default().push(id.clone());
            Ok(id)
        })
    }

    fn start_instance<'a>(&'a self, node: &'a NodeEndpoint, id: &'a str) -> RuntimeFuture<'a, ()> {
        Box::pin(async move {
            let mut state = self.state.lock().unwrap();
            let key = node.id.to_string();
            state.calls.push(Call::Start(key.clone(), id.to_string()));
            if state.fail_start.contains(&key) {
                return Err(refused(node));
            }
            Ok(())
        })
    }

    fn remove_instance<'a>(
        &'a self,
        node: &'a NodeEndpoint,
        id: &'a str,
        _force: bool,
    ) -> RuntimeFuture<'a, ()> {
        Box::pin(async move {
            let mut state = self.state.lock().unwrap();
            let key = node.id.to_string();
            state.calls.push(Call::Remove(key.clone(), id.to_string()));
            if state.fail_remove.contains(&key) {
                return Err(refused(node));
            }
            if state.leftover.get(&key).is_some_and(|name| name == id) {
                state.leftover.remove(&key);
            }
            if let Some(live) = state.live.get_mut(&key) {
                live.retain(|i| i != id);
            }
            Ok(())
        })
    }
}

/// Fixed membership with claims that tests change between ticks.
pub struct ScriptedAdmin {
    nodes: Vec<NodeEndpoint>,
    claims: Mutex<HashMap<String, Vec<ReportedSubtree>>>,
    unreachable: AtomicBool,
    status_calls: AtomicUsize,
}

impl ScriptedAdmin {
    pub fn new(nodes: &[&str]) -> Self {
        Self {
            nodes: nodes
                .iter()
                .map(|n| NodeEndpoint::new(*n, format!("{n}.local")))
                .collect(),
            claims: Mutex::new(HashMap::new()),
            unreachable: AtomicBool::new(false),
            status_calls: AtomicUsize::new(0),
        }
    }

    pub fn set_claims(&self, node: &str, claims: Vec<ReportedSubtree>) {
        self.claims.lock().unwrap().insert(node.to_string(), claims);
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }
}

impl ClusterAdmin for ScriptedAdmin {
    fn cluster_status(&self) -> AdminFuture<'_, Vec<NodeEndpoint>> {
        Box::pin(async move {
            self.status_calls.fetch_add(1, Ordering::SeqCst);
            if self.unreachable.load(Ordering::SeqCst) {
                return Err(TopologyError::ClusterUnreachable("mon unreachable".to_string()));
            }
            Ok(self.nodes.clone())
        })
    }

    fn query_node_claims<'a>(
        &'a self,
        node: &'a NodeEndpoint,
    ) -> AdminFuture<'a, Vec<ReportedSubtree>> {
        Box::pin(async move {
            Ok(self
                .claims
                .lock()
                .unwrap()
                .get(node.id.as_str())
                .cloned()
                .unwrap_or_default())
        })
    }
}

/// Anchor that only remembers what it was asked to create.
#[derive(Default)]
pub struct RecordingAnchor {
    created: Mutex<Vec<PathKey>>,
}

impl RecordingAnchor {
    pub fn created(&self) -> Vec<PathKey> {
        self.created.lock().unwrap().clone()
    }
}

impl NamespaceAnchor for RecordingAnchor {
    fn create_directory<'a>(&'a self, path: &'a PathKey) -> AnchorFuture<'a> {
        Box::pin(async move {
            self.created.lock().unwrap().push(path.clone());
            Ok(())
        })
    }
}
