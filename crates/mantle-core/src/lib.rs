//! mantle-core: the pure half of Mantle.
//!
//! Holds the types shared by every crate and the authority resolver.
//! Nothing here performs I/O apart from reading the config file.
//!
//! # Components
//!
//! - **`types`**: `NodeId`, `PathKey`, `SubtreeClaim`, `NodeEndpoint`
//! - **`topology`**: `TopologySnapshot`, one immutable poll of the cluster
//! - **`resolver`**: maps a tracked path to its authoritative node
//! - **`config`**: `mantle.toml` parsing and validation

pub mod config;
pub mod error;
pub mod resolver;
pub mod topology;
pub mod types;

pub use config::{LoadgenMode, MantleConfig};
pub use error::{CoreError, CoreResult};
pub use resolver::{Resolution, ResolutionBasis, resolve};
pub use topology::TopologySnapshot;
pub use types::*;
