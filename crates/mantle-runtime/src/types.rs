//! Workload descriptions and runtime listings.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use mantle_core::config::WorkloadConfig;

/// What to run. `name` is the instance name handed to the runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkloadSpec {
    pub name: String,
    pub image: String,
    pub command: Vec<String>,
    pub env: HashMap<String, String>,
    pub binds: Vec<String>,
}

impl WorkloadSpec {
    pub fn new(name: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            image: image.into(),
            command: Vec::new(),
            env: HashMap::new(),
            binds: Vec::new(),
        }
    }

    /// Environment as sorted `KEY=value` pairs.
    pub fn env_pairs(&self) -> Vec<String> {
        let mut pairs: Vec<String> = self.env.iter().map(|(k, v)| format!("{k}={v}")).collect();
        pairs.sort();
        pairs
    }
}

impl From<&WorkloadConfig> for WorkloadSpec {
    fn from(cfg: &WorkloadConfig) -> Self {
        Self {
            name: cfg.name.clone(),
            image: cfg.image.clone(),
            command: cfg.command.clone(),
            env: cfg.env.clone(),
            binds: cfg.binds.clone(),
        }
    }
}

/// One instance as listed by a runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceSummary {
    pub id: String,
    pub names: Vec<String>,
    pub image: String,
    pub state: String,
}
