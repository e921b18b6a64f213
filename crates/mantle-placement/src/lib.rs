//! mantle-placement: keeps one workload co-located with the metadata node
//! that is authoritative for a tracked path.
//!
//! # Architecture
//!
//! ```text
//! PlacementController (one per tracked path)
//!   ├── SnapshotBuilder      fresh topology every tick
//!   ├── resolve()            tracked path → owning node
//!   ├── RelocationBackoff    holds back retries towards a failing node
//!   └── RelocationSequencer  remove old → create → start → verify
//!         └── WorkloadRuntime (trait, injected)
//! ```
//!
//! The controller is the only writer of its [`PlacementRecord`]. Status is
//! published on a `tokio::sync::watch` channel for anyone who wants to
//! observe it.

pub mod anchor;
pub mod backoff;
pub mod controller;
pub mod error;
pub mod record;
pub mod sequencer;

#[cfg(test)]
mod testing;

pub use anchor::{AnchorFuture, MountedNamespace, NamespaceAnchor};
pub use backoff::RelocationBackoff;
pub use controller::{ControllerStatus, Phase, PlacementController, TickOutcome};
pub use error::{PlacementError, PlacementResult, RelocationError, RelocationStep};
pub use record::PlacementRecord;
pub use sequencer::RelocationSequencer;
