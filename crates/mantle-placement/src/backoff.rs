//! Bounded backoff for repeated relocation failures.
//!
//! Counted in ticks rather than wall time, since the controller already
//! runs on a fixed cadence. After `k` consecutive failures towards a node,
//! `min(2^(k-1) - 1, max_skip)` relocation attempts towards that node are
//! skipped, so the first retry still happens on the very next tick.
//!
//! Failures are tracked per target node. Authority flapping between two
//! broken nodes backs off on both; only a successful relocation clears the
//! state.

use std::collections::HashMap;

use tracing::debug;

use mantle_core::NodeId;

#[derive(Debug, Default, Clone, Copy)]
struct TargetState {
    failures: u32,
    skip_remaining: u32,
}

#[derive(Debug)]
pub struct RelocationBackoff {
    targets: HashMap<NodeId, TargetState>,
    /// Failures since the last success, across all targets.
    consecutive: u32,
    max_skip: u32,
}

impl RelocationBackoff {
    pub fn new(max_skip: u32) -> Self {
        Self {
            targets: HashMap::new(),
            consecutive: 0,
            max_skip,
        }
    }

    /// Whether a relocation towards `target` may run this tick.
    ///
    /// Returns `Err(remaining)` with the number of attempts towards
    /// `target` still to skip, including this one.
    pub fn check(&mut self, target: &NodeId) -> Result<(), u32> {
        match self.targets.get_mut(target) {
            Some(state) if state.skip_remaining > 0 => {
                let remaining = state.skip_remaining;
                state.skip_remaining -= 1;
                Err(remaining)
            }
            _ => Ok(()),
        }
    }

    pub fn record_failure(&mut self, target: &NodeId) {
        let state = self.targets.entry(target.clone()).or_default();
        state.failures = state.failures.saturating_add(1);
        let exp = 1u32.checked_shl(state.failures - 1).unwrap_or(u32::MAX);
        state.skip_remaining = exp.saturating_sub(1).min(self.max_skip);
        self.consecutive = self.consecutive.saturating_add(1);
        debug!(
            %target,
            failures = state.failures,
            skip = state.skip_remaining,
            "relocation failure recorded"
        );
    }

    pub fn record_success(&mut self) {
        self.targets.clear();
        self.consecutive = 0;
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive
    }
}
