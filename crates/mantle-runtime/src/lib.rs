//! mantle-runtime: the workload runtime Mantle places instances on.
//!
//! The relocation sequencer only needs four calls per node: list, create,
//! start and remove. They sit behind [`WorkloadRuntime`]; [`DockerRuntime`]
//! is the production binding.

pub mod client;
pub mod error;
pub mod types;

pub use client::{DockerRuntime, RuntimeFuture, WorkloadRuntime};
pub use error::{RuntimeError, RuntimeResult};
pub use types::{InstanceSummary, WorkloadSpec};
