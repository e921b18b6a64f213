//! Ceph MDS bindings: `ceph mds stat` and `ceph daemon mds.<name> get subtrees`.
//!
//! Node ids are MDS daemon names. Live nodes are the ranks in the first
//! filesystem's `mdsmap.in`, resolved through `up` (rank → gid) and
//! `info` (gid → name, addr).

use std::collections::HashMap;
use std::process::Stdio;

use serde::Deserialize;
use serde_json::Value;
use tokio::process::Command;
use tracing::{debug, warn};

use mantle_core::NodeEndpoint;

use crate::admin::{AdminFuture, ClusterAdmin, ReportedSubtree};
use crate::error::{TopologyError, TopologyResult};

#[derive(Debug, Deserialize)]
struct MdsStat {
    fsmap: FsMap,
}

#[derive(Debug, Deserialize)]
struct FsMap {
    #[serde(default)]
    filesystems: Vec<Filesystem>,
}

#[derive(Debug, Deserialize)]
struct Filesystem {
    mdsmap: MdsMap,
}

#[derive(Debug, Deserialize)]
struct MdsMap {
    #[serde(rename = "in", default)]
    ranks_in: Vec<u64>,
    #[serde(default)]
    up: HashMap<String, u64>,
    #[serde(default)]
    info: HashMap<String, MdsInfo>,
}

#[derive(Debug, Deserialize)]
struct MdsInfo {
    name: String,
    #[serde(default)]
    addr: String,
}

/// Parse `ceph mds stat --format json` output into live endpoints.
///
/// Ranks whose gid or info entry is missing are skipped with a warning;
/// a status with no filesystem at all is malformed.
pub fn parse_mds_stat(raw: &[u8]) -> TopologyResult<Vec<NodeEndpoint>> {
    let stat: MdsStat = serde_json::from_slice(raw)
        .map_err(|e| TopologyError::MalformedStatus(e.to_string()))?;

    let fs = stat
        .fsmap
        .filesystems
        .into_iter()
        .next()
        .ok_or_else(|| TopologyError::MalformedStatus("no filesystems in fsmap".to_string()))?;
    let map = fs.mdsmap;

    let mut nodes = Vec::with_capacity(map.ranks_in.len());
    for rank in &map.ranks_in {
        let Some(gid) = map.up.get(&format!("mds_{rank}")) else {
            warn!(rank, "rank is in but not up, skipping");
            continue;
        };
        let Some(info) = map.info.get(&format!("gid_{gid}")) else {
            warn!(rank, gid, "no info for gid, skipping");
            continue;
        };
        nodes.push(NodeEndpoint::new(info.name.as_str(), address_host(&info.addr)));
    }

    Ok(nodes)
}

/// Parse `get subtrees` admin-socket output.
///
/// Entries without a string `dir.path` are skipped; a missing `is_auth`
/// reads as non-authoritative. Anything other than a JSON array is
/// malformed.
pub fn parse_subtrees(node: &str, raw: &[u8]) -> TopologyResult<Vec<ReportedSubtree>> {
    let malformed = |reason: String| TopologyError::MalformedSubtrees {
        node: node.to_string(),
        reason,
    };

    if raw.iter().all(u8::is_ascii_whitespace) {
        return Err(malformed("empty response".to_string()));
    }
    let value: Value = serde_json::from_slice(raw).map_err(|e| malformed(e.to_string()))?;
    let Value::Array(entries) = value else {
        return Err(malformed("expected a JSON array".to_string()));
    };

    let mut subtrees = Vec::with_capacity(entries.len());
    for entry in &entries {
        let Some(path) = entry
            .get("dir")
            .and_then(|d| d.get("path"))
            .and_then(Value::as_str)
        else {
            debug!(%node, "subtree entry without dir.path, skipping");
            continue;
        };
        let is_auth = entry.get("is_auth").and_then(Value::as_bool).unwrap_or(false);
        subtrees.push(ReportedSubtree::new(path, is_auth));
    }

    Ok(subtrees)
}

/// Host part of a Ceph entity address such as `v2:10.0.0.1:6800/1234`.
pub fn address_host(addr: &str) -> String {
    let addr = addr
        .strip_prefix("v2:")
        .or_else(|| addr.strip_prefix("v1:"))
        .unwrap_or(addr);
    let addr = addr.split('/').next().unwrap_or(addr);
    match addr.rsplit_once(':') {
        Some((host, _port)) => host.to_string(),
        None => addr.to_string(),
    }
}

/// [`ClusterAdmin`] backed by the `ceph` CLI.
///
/// Admin sockets are only reachable on the node that hosts the daemon, so
/// per-node queries are wrapped in `<remote_shell argv...> <address>` when
/// a remote shell is configured.
#[derive(Debug, Clone)]
pub struct CephCli {
    ceph_bin: String,
    remote_shell: Vec<String>,
}

impl CephCli {
    pub fn new(ceph_bin: impl Into<String>) -> Self {
        Self {
            ceph_bin: ceph_bin.into(),
            remote_shell: Vec::new(),
        }
    }

    /// Program and leading arguments of the remote shell. Empty runs
    /// admin queries locally.
    pub fn with_remote_shell(mut self, argv: Vec<String>) -> Self {
        self.remote_shell = argv;
        self
    }

    fn status_command(&self) -> (String, Vec<String>) {
        (
            self.ceph_bin.clone(),
            ["mds", "stat", "--format", "json"]
                .map(str::to_string)
                .to_vec(),
        )
    }

    fn subtrees_command(&self, node: &NodeEndpoint) -> (String, Vec<String>) {
        let daemon = vec![
            "daemon".to_string(),
            format!("mds.{}", node.id),
            "get".to_string(),
            "subtrees".to_string(),
        ];
        match self.remote_shell.split_first() {
            Some((shell, shell_args)) => {
                let mut args = shell_args.to_vec();
                args.push(node.address.clone());
                args.push(self.ceph_bin.clone());
                args.extend(daemon);
                (shell.clone(), args)
            }
            None => (self.ceph_bin.clone(), daemon),
        }
    }
}

/// Run a command to completion and return its stdout.
async fn run_command(program: &str, args: &[String]) -> Result<Vec<u8>, String> {
    debug!(%program, ?args, "running admin command");
    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| format!("spawn {program}: {e}"))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(format!("{program} exited with {}: {}", output.status, stderr.trim()));
    }
    Ok(output.stdout)
}

impl ClusterAdmin for CephCli {
    fn cluster_status(&self) -> AdminFuture<'_, Vec<NodeEndpoint>> {
        Box::pin(async move {
            let (program, args) = self.status_command();
            let stdout = run_command(&program, &args)
                .await
                .map_err(TopologyError::ClusterUnreachable)?;
            parse_mds_stat(&stdout)
        })
    }

    fn query_node_claims<'a>(
        &'a self,
        node: &'a NodeEndpoint,
    ) -> AdminFuture<'a, Vec<ReportedSubtree>> {
        Box::pin(async move {
            let (program, args) = self.subtrees_command(node);
            let stdout = run_command(&program, &args)
                .await
                .map_err(|reason| TopologyError::NodeQuery {
                    node: node.id.to_string(),
                    reason,
                })?;
            parse_subtrees(node.id.as_str(), &stdout)
        })
    }
}
