//! mantle.toml configuration parser.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::types::PathKey;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MantleConfig {
    pub tracking: TrackingConfig,
    pub workload: WorkloadConfig,
    pub runtime: RuntimeConfig,
    pub cluster: ClusterConfig,
    pub controller: ControllerConfig,
    pub loadgen: LoadgenConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// Namespace path whose authority the workload follows.
    pub path: String,
    /// Local mount point of the shared namespace.
    pub mount: PathBuf,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            path: "/mantle".to_string(),
            mount: PathBuf::from("/mnt/cephfs"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkloadConfig {
    pub name: String,
    pub image: String,
    pub command: Vec<String>,
    pub env: HashMap<String, String>,
    /// Host:container bind mounts, passed through to the runtime.
    pub binds: Vec<String>,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            name: "mantle-workload".to_string(),
            image: "busybox:latest".to_string(),
            command: vec!["sleep".to_string(), "infinity".to_string()],
            env: HashMap::new(),
            binds: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Port of the workload runtime API on every node.
    pub port: u16,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self { port: 2375 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// Path or name of the `ceph` CLI.
    pub ceph_bin: String,
    /// Remote shell argv used to reach a node's admin socket, e.g.
    /// `["ssh", "-i", "/etc/mantle/id_ed25519"]`. The node address is
    /// appended. When empty, admin queries run locally.
    pub remote_shell: Vec<String>,
    pub max_concurrent_queries: usize,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            ceph_bin: "ceph".to_string(),
            remote_shell: Vec::new(),
            max_concurrent_queries: 8,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Keep polling after the initial placement.
    pub poll: bool,
    /// Pause between the end of one tick and the start of the next.
    pub interval: String,
    pub max_backoff_ticks: u32,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            poll: true,
            interval: "1s".to_string(),
            max_backoff_ticks: 32,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LoadgenMode {
    CreateDelete,
    Read,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadgenConfig {
    pub enabled: bool,
    pub mode: LoadgenMode,
    pub interval: String,
}

impl Default for LoadgenConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            mode: LoadgenMode::CreateDelete,
            interval: "100ms".to_string(),
        }
    }
}

impl MantleConfig {
    pub fn from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| CoreError::ConfigRead {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> CoreResult<Self> {
        let config: MantleConfig = toml::from_str(content)?;
        Ok(config)
    }

    /// Reject configurations the daemon cannot run with.
    pub fn validate(&self) -> CoreResult<()> {
        if self.tracked_path().is_root() {
            return Err(CoreError::InvalidConfig(
                "tracking.path must name a directory below the root".to_string(),
            ));
        }
        if !is_valid_instance_name(&self.workload.name) {
            return Err(CoreError::InvalidConfig(format!(
                "workload.name {:?} must match [a-zA-Z0-9][a-zA-Z0-9_.-]+",
                self.workload.name
            )));
        }
        if self.workload.image.trim().is_empty() {
            return Err(CoreError::InvalidConfig("workload.image is empty".to_string()));
        }
        if self.cluster.max_concurrent_queries == 0 {
            return Err(CoreError::InvalidConfig(
                "cluster.max_concurrent_queries must be at least 1".to_string(),
            ));
        }
        self.poll_interval()?;
        self.loadgen_interval()?;
        Ok(())
    }

    pub fn tracked_path(&self) -> PathKey {
        PathKey::parse(&self.tracking.path)
    }

    pub fn poll_interval(&self) -> CoreResult<Duration> {
        parse_duration(&self.controller.interval).ok_or_else(|| {
            CoreError::InvalidConfig(format!(
                "controller.interval: bad duration {:?}",
                self.controller.interval
            ))
        })
    }

    pub fn loadgen_interval(&self) -> CoreResult<Duration> {
        parse_duration(&self.loadgen.interval).ok_or_else(|| {
            CoreError::InvalidConfig(format!(
                "loadgen.interval: bad duration {:?}",
                self.loadgen.interval
            ))
        })
    }
}

/// Instance names the runtime accepts: `[a-zA-Z0-9][a-zA-Z0-9_.-]+`.
pub fn is_valid_instance_name(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    let rest = chars.as_str();
    first.is_ascii_alphanumeric()
        && !rest.is_empty()
        && rest
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
}

/// Parse a duration string like "5s", "500ms", "1m". Bare numbers are seconds.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Some(secs) = s.strip_suffix('s') {
        if let Some(ms) = secs.strip_suffix('m') {
            ms.parse::<u64>().ok().map(Duration::from_millis)
        } else {
            secs.parse::<u64>().ok().map(Duration::from_secs)
        }
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.parse::<u64>()
            .ok()
            .and_then(|m| m.checked_mul(60))
            .map(Duration::from_secs)
    } else {
        s.parse::<u64>().ok().map(Duration::from_secs)
    }
}
