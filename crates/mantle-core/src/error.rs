//! Error types for core types and configuration.

use thiserror::Error;

/// Result type alias for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors raised while constructing snapshots or loading configuration.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("topology has no known nodes")]
    EmptyTopology,

    #[error("claim on {root} names unknown node {owner}")]
    UnknownOwner { owner: String, root: String },

    #[error("failed to read config {path}: {source}")]
    ConfigRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    InvalidConfig(String),
}
