//! Workload runtime error types.

use thiserror::Error;

/// Result type alias for runtime calls.
pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// Errors returned by a workload runtime.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("runtime at {node} unreachable: {reason}")]
    Transport { node: String, reason: String },

    #[error("runtime at {node} returned {status}: {message}")]
    Status {
        node: String,
        status: u16,
        message: String,
    },

    #[error("undecodable response from {node}: {reason}")]
    Decode { node: String, reason: String },

    #[error("failed to build request: {0}")]
    Request(String),
}
