//! mantled: process shell around the Mantle placement controller.
//!
//! Wires the Ceph topology source, the Docker runtime and the mounted
//! namespace into a [`mantle_placement::PlacementController`], and runs it
//! next to an optional load generator until Ctrl-C or SIGTERM.

pub mod lifecycle;
pub mod loadgen;
